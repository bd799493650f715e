use core::{future::Future, num::NonZero, time::Duration};
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Stopping criterion of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Each worker issues exactly this number of requests.
    Requests(NonZero<u64>),
    /// All workers run until this much time has elapsed since dispatch.
    Duration(Duration),
}

impl Termination {
    /// Returns the per-worker request budget, if any.
    #[inline]
    pub fn requests(&self) -> Option<u64> {
        match self {
            Self::Requests(n) => Some(n.get()),
            Self::Duration(..) => None,
        }
    }
}

/// Why a run was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StopReason {
    /// All workers exhausted their request budget.
    Completed,
    /// The configured duration elapsed.
    Deadline,
    /// The operator asked to stop.
    Interrupted,
}

/// Owns the cooperative stop signal shared by all workers.
///
/// Both the duration timer and the external interrupt trip the same token.
/// Only the first stop is recorded; subsequent ones are no-op.
#[derive(Debug, Clone, Default)]
pub struct Controller {
    token: CancellationToken,
    reason: Arc<OnceLock<StopReason>>,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the token workers poll.
    #[inline]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trips the stop signal.
    ///
    /// Returns `true` if this call was the one that stopped the run.
    pub fn stop(&self, reason: StopReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        if first {
            log::debug!("stopping: {reason:?}");
        }
        self.token.cancel();

        first
    }

    #[cfg(test)]
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns the reason recorded by the first stop, if any.
    #[inline]
    pub fn reason(&self) -> Option<StopReason> {
        self.reason.get().copied()
    }

    /// Completes once the stop signal has been tripped.
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }

    /// Starts the duration timer.
    ///
    /// Must be called once, at dispatch time.
    pub fn arm_deadline(&self, duration: Duration) -> JoinHandle<()> {
        let this = self.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    this.stop(StopReason::Deadline);
                }
                _ = this.stopped() => {}
            }
        })
    }

    /// Stops the run once the given future completes.
    pub fn arm_interrupt<F>(&self, interrupt: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let this = self.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = interrupt => {
                    this.stop(StopReason::Interrupted);
                }
                _ = this.stopped() => {}
            }
        })
    }
}
