use core::time::Duration;

use bytes::Bytes;
use http::{header::HOST, HeaderMap, Method, Request};
use http_body_util::Full;

use crate::{
    engine::Termination,
    target::{Target, TargetSet},
};

/// I/O timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Bounds TCP connect together with TLS and HTTP handshakes.
    pub connect: Duration,
    /// Maximum time without a successful read on an established connection.
    pub read: Duration,
    /// Maximum time without a successful write on an established connection.
    pub write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        let timeout = Duration::from_secs(5);

        Self {
            connect: timeout,
            read: timeout,
            write: timeout,
        }
    }
}

/// HTTP engine config.
///
/// Built once before dispatch and shared read-only by all workers.
#[derive(Debug, Clone)]
pub struct Config {
    /// Targets every worker cycles through, in order.
    pub targets: TargetSet,
    pub method: Method,
    /// Request body, empty for GET.
    pub body: Bytes,
    /// Headers sent with every request.
    ///
    /// `Host` is derived from the target unless present here.
    pub headers: HeaderMap,
    /// Whether to reuse connections between requests.
    pub keep_alive: bool,
    pub termination: Termination,
    pub timeouts: Timeouts,
    /// Enable TCP_NODELAY socket option.
    pub tcp_no_delay: bool,
}

impl Config {
    /// Builds the request for the given target.
    pub fn request(&self, target: &Target) -> Request<Full<Bytes>> {
        let mut req = Request::new(Full::new(self.body.clone()));
        *req.method_mut() = self.method.clone();
        *req.uri_mut() = target.path.clone();
        *req.headers_mut() = self.headers.clone();
        req.headers_mut()
            .entry(HOST)
            .or_insert_with(|| target.host.clone());

        req
    }
}
