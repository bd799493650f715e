pub mod cfg;
pub mod cmd;
pub mod engine;
pub mod expand;
pub mod logging;
pub mod report;
pub mod stat;
pub mod target;
#[cfg(test)]
mod testing;
