use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, Error};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_util::sync::CancellationToken;

use super::{cfg::Config, conn::InstrumentedStream, tls::Tls};
use crate::{
    stat::WorkerStat,
    target::{Origin, Protocol, Target},
};

type Sender = SendRequest<Full<Bytes>>;

/// Classified result of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    BadStatus,
    /// Failed before response headers were received.
    NetworkFailure,
    /// Failed while draining the response body.
    IoFailure,
    /// Abandoned in flight because the run was stopped.
    Cancelled,
}

/// Per-task worker.
///
/// Cycles through the target set, issuing one request at a time, until its
/// request budget is exhausted or the stop signal is tripped.
#[derive(Debug)]
pub struct Worker {
    cfg: Arc<Config>,
    tls: Tls,
    /// Idle keep-alive connections, at most one per origin.
    idle: HashMap<Origin, Sender>,
    /// Cooperative stop signal.
    stop: CancellationToken,
    /// Runtime statistics, written by this worker only.
    stat: Arc<WorkerStat>,
}

impl Worker {
    pub fn new(cfg: Arc<Config>, tls: Tls, stop: CancellationToken, stat: Arc<WorkerStat>) -> Self {
        Self {
            cfg,
            tls,
            idle: HashMap::new(),
            stop,
            stat,
        }
    }

    pub async fn run(mut self) {
        let cfg = self.cfg.clone();
        let budget = cfg.termination.requests();

        if cfg.targets.is_empty() {
            return;
        }

        'run: loop {
            for target in cfg.targets.iter() {
                if self.stop.is_cancelled() {
                    break 'run;
                }
                if budget.is_some_and(|n| self.stat.num_requests() >= n) {
                    break 'run;
                }

                self.execute(target).await;
            }
        }
    }

    /// Performs a single request and records its outcome.
    ///
    /// A request still in flight when the stop signal is tripped is abandoned
    /// and recorded as cancelled, not as a failure.
    pub async fn execute(&mut self, target: &Target) {
        let stop = self.stop.clone();

        let outcome = tokio::select! {
            biased;
            _ = stop.cancelled() => Outcome::Cancelled,
            outcome = self.perform(target) => outcome,
        };

        match outcome {
            Outcome::Success => self.stat.on_success(),
            Outcome::BadStatus => self.stat.on_bad_status(),
            Outcome::NetworkFailure => self.stat.on_network_failure(),
            Outcome::IoFailure => self.stat.on_io_failure(),
            Outcome::Cancelled => self.stat.on_cancelled(),
        }
    }

    async fn perform(&mut self, target: &Target) -> Outcome {
        let mut sender = match self.checkout(&target.origin).await {
            Ok(sender) => sender,
            Err(err) => {
                log::debug!("failed to connect to {}: {err:#}", target.origin);
                return Outcome::NetworkFailure;
            }
        };

        let resp = match sender.send_request(self.cfg.request(target)).await {
            Ok(resp) => resp,
            Err(err) => {
                log::debug!("request to {} failed: {err}", target.origin);
                return Outcome::NetworkFailure;
            }
        };

        // Always drain the body, whatever the status, to allow connection
        // reuse.
        let status = resp.status();
        let mut body = resp.into_body();
        while let Some(frame) = body.frame().await {
            if let Err(err) = frame {
                log::debug!("failed to read response from {}: {err}", target.origin);
                return Outcome::IoFailure;
            }
        }

        if self.cfg.keep_alive {
            self.idle.insert(target.origin.clone(), sender);
        }

        if status.is_success() {
            Outcome::Success
        } else {
            log::trace!("{} responded with {status}", target.origin);
            Outcome::BadStatus
        }
    }

    /// Returns a ready connection to the given origin, reusing an idle one
    /// when possible.
    async fn checkout(&mut self, origin: &Origin) -> Result<Sender, Error> {
        if let Some(mut sender) = self.idle.remove(origin) {
            // The peer or the idle timeout may have closed it meanwhile.
            if sender.ready().await.is_ok() {
                return Ok(sender);
            }
        }

        match tokio::time::timeout(self.cfg.timeouts.connect, self.connect(origin)).await {
            Ok(rc) => rc,
            Err(..) => Err(anyhow!("connect timed out")),
        }
    }

    async fn connect(&self, origin: &Origin) -> Result<Sender, Error> {
        let stream = TcpStream::connect((origin.host.as_str(), origin.port)).await?;
        if self.cfg.tcp_no_delay {
            stream.set_nodelay(true)?;
        }

        let timeouts = self.cfg.timeouts;
        let stream = InstrumentedStream::new(stream, timeouts.read, timeouts.write, self.stat.clone());

        match origin.protocol {
            Protocol::Http => handshake(stream).await,
            Protocol::Https => {
                let stream = self.tls.connect(&origin.host, stream).await?;
                handshake(stream).await
            }
        }
    }
}

async fn handshake<S>(stream: S) -> Result<Sender, Error>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (sender, conn) = http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(err) = conn.await {
            log::debug!("connection failed: {err}");
        }
    });

    Ok(sender)
}
