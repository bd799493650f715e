use core::{
    iter::Sum,
    ops::{Add, AddAssign},
    sync::atomic::{AtomicU64, Ordering},
};
use std::sync::Arc;

use serde::Serialize;

/// Byte-level transfer accounting.
///
/// Implemented by whatever owns the counters an instrumented connection
/// reports to.
pub trait TransferStat {
    fn on_recv(&self, n: u64);
    fn on_send(&self, n: u64);
}

/// Per-worker result.
///
/// Each worker exclusively owns its [`WorkerStat`] and is the only writer.
/// Counters are atomics only to allow reading a snapshot from another thread
/// while the worker is still running.
#[derive(Debug, Default)]
pub struct WorkerStat {
    /// Number of requests with a classified outcome.
    num_requests: AtomicU64,
    /// Number of 2xx responses.
    num_success: AtomicU64,
    /// Number of non-2xx responses.
    num_bad_status: AtomicU64,
    /// Number of requests failed before response headers were received.
    ///
    /// This includes connect, TLS handshake and timeout errors.
    num_network_failures: AtomicU64,
    /// Number of requests failed while draining the response body.
    num_io_failures: AtomicU64,
    /// Number of requests abandoned in flight because the run was stopped.
    ///
    /// These are not counted as requests.
    num_cancelled: AtomicU64,
    bytes_rx: AtomicU64,
    bytes_tx: AtomicU64,
}

impl WorkerStat {
    #[inline]
    fn incr(counter: &AtomicU64, v: u64) {
        counter.fetch_add(v, Ordering::Relaxed);
    }

    #[inline]
    pub fn on_success(&self) {
        Self::incr(&self.num_requests, 1);
        Self::incr(&self.num_success, 1);
    }

    #[inline]
    pub fn on_bad_status(&self) {
        Self::incr(&self.num_requests, 1);
        Self::incr(&self.num_bad_status, 1);
    }

    #[inline]
    pub fn on_network_failure(&self) {
        Self::incr(&self.num_requests, 1);
        Self::incr(&self.num_network_failures, 1);
    }

    #[inline]
    pub fn on_io_failure(&self) {
        Self::incr(&self.num_requests, 1);
        Self::incr(&self.num_io_failures, 1);
    }

    #[inline]
    pub fn on_cancelled(&self) {
        Self::incr(&self.num_cancelled, 1);
    }

    /// Returns the number of requests with a classified outcome.
    #[inline]
    pub fn num_requests(&self) -> u64 {
        self.num_requests.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Totals {
        Totals {
            requests: self.num_requests.load(Ordering::Relaxed),
            success: self.num_success.load(Ordering::Relaxed),
            bad_status: self.num_bad_status.load(Ordering::Relaxed),
            network_failures: self.num_network_failures.load(Ordering::Relaxed),
            io_failures: self.num_io_failures.load(Ordering::Relaxed),
            cancelled: self.num_cancelled.load(Ordering::Relaxed),
            bytes_rx: self.bytes_rx.load(Ordering::Relaxed),
            bytes_tx: self.bytes_tx.load(Ordering::Relaxed),
        }
    }
}

impl TransferStat for WorkerStat {
    #[inline]
    fn on_recv(&self, n: u64) {
        Self::incr(&self.bytes_rx, n);
    }

    #[inline]
    fn on_send(&self, n: u64) {
        Self::incr(&self.bytes_tx, n);
    }
}

/// Field-wise counters of one or more workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub requests: u64,
    pub success: u64,
    pub bad_status: u64,
    pub network_failures: u64,
    pub io_failures: u64,
    pub cancelled: u64,
    pub bytes_rx: u64,
    pub bytes_tx: u64,
}

impl Add for Totals {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign for Totals {
    fn add_assign(&mut self, rhs: Self) {
        self.requests += rhs.requests;
        self.success += rhs.success;
        self.bad_status += rhs.bad_status;
        self.network_failures += rhs.network_failures;
        self.io_failures += rhs.io_failures;
        self.cancelled += rhs.cancelled;
        self.bytes_rx += rhs.bytes_rx;
        self.bytes_tx += rhs.bytes_tx;
    }
}

impl Sum for Totals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Engine-wide statistics, i.e. the collection of all per-worker results.
#[derive(Debug)]
pub struct Stat {
    pub stats: Vec<Arc<WorkerStat>>,
}

impl Stat {
    pub fn new(num_workers: usize) -> Self {
        let stats = (0..num_workers).map(|_| Arc::new(WorkerStat::default())).collect();

        Self { stats }
    }

    /// Sums all workers' counters.
    ///
    /// Safe to call while workers are running, in which case the result is a
    /// possibly slightly stale snapshot.
    pub fn totals(&self) -> Totals {
        self.stats.iter().map(|v| v.snapshot()).sum()
    }
}
