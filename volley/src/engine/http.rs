pub use self::{
    cfg::{Config, Timeouts},
    tls::Tls,
    worker::Worker,
};

mod cfg;
mod conn;
mod tls;
mod worker;
