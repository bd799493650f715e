use core::{
    fmt::{self, Display, Formatter},
    time::Duration,
};

use serde::Serialize;

use crate::{engine::StopReason, stat::Totals};

/// Final run summary.
///
/// Built from a snapshot of counters and the elapsed time, so building it
/// twice from the same inputs yields the same report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    #[serde(flatten)]
    pub totals: Totals,
    /// Elapsed wall-clock time in whole seconds, never zero.
    pub elapsed_secs: u64,
    pub requests_per_sec: u64,
    pub success_per_sec: u64,
    pub bytes_rx_per_sec: u64,
    pub bytes_tx_per_sec: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

impl Report {
    pub fn new(totals: Totals, elapsed: Duration, stop_reason: Option<StopReason>) -> Self {
        let elapsed_secs = elapsed.as_secs().max(1);

        Self {
            totals,
            elapsed_secs,
            requests_per_sec: totals.requests / elapsed_secs,
            success_per_sec: totals.success / elapsed_secs,
            bytes_rx_per_sec: totals.bytes_rx / elapsed_secs,
            bytes_tx_per_sec: totals.bytes_tx / elapsed_secs,
            stop_reason,
        }
    }

    #[inline]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Display for Report {
    fn fmt(&self, fmt: &mut Formatter) -> Result<(), fmt::Error> {
        let t = &self.totals;
        let rows: [(&str, u64, &str); 13] = [
            ("Requests:", t.requests, "hits"),
            ("Successful requests:", t.success, "hits"),
            ("Network failed:", t.network_failures, "hits"),
            ("Bad requests failed (!2xx):", t.bad_status, "hits"),
            ("I/O failed:", t.io_failures, "hits"),
            ("Cancelled in flight:", t.cancelled, "hits"),
            ("Requests rate:", self.requests_per_sec, "hits/sec"),
            ("Successful requests rate:", self.success_per_sec, "hits/sec"),
            ("Read transferred:", t.bytes_rx, "bytes"),
            ("Write transferred:", t.bytes_tx, "bytes"),
            ("Read speed:", self.bytes_rx_per_sec, "bytes/sec"),
            ("Write speed:", self.bytes_tx_per_sec, "bytes/sec"),
            ("Test time:", self.elapsed_secs, "sec"),
        ];

        writeln!(fmt)?;
        for (label, value, unit) in rows {
            writeln!(fmt, "{label:<32}{value:>10} {unit}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn totals() -> Totals {
        Totals {
            requests: 1000,
            success: 990,
            bad_status: 4,
            network_failures: 3,
            io_failures: 3,
            cancelled: 2,
            bytes_rx: 123_457,
            bytes_tx: 45_000,
        }
    }

    #[test]
    fn test_rates_truncate() {
        let r = Report::new(totals(), Duration::from_millis(3900), Some(StopReason::Deadline));
        assert_eq!(3, r.elapsed_secs);
        assert_eq!(333, r.requests_per_sec);
        assert_eq!(330, r.success_per_sec);
        assert_eq!(41_152, r.bytes_rx_per_sec);
        assert_eq!(15_000, r.bytes_tx_per_sec);
    }

    #[test]
    fn test_elapsed_floor() {
        let r = Report::new(totals(), Duration::ZERO, None);
        assert_eq!(1, r.elapsed_secs);
        assert_eq!(1000, r.requests_per_sec);
    }

    #[test]
    fn test_idempotent() {
        let a = Report::new(totals(), Duration::from_secs(10), Some(StopReason::Completed));
        let b = Report::new(totals(), Duration::from_secs(10), Some(StopReason::Completed));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_text_layout() {
        let out = Report::new(totals(), Duration::from_secs(10), None).to_string();
        assert!(out.contains("Requests:                             1000 hits\n"));
        assert!(out.contains("I/O failed:                              3 hits\n"));
        assert!(out.contains("Test time:                              10 sec\n"));
    }

    #[test]
    fn test_json() {
        let out = Report::new(totals(), Duration::from_secs(10), Some(StopReason::Interrupted))
            .to_json()
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(1000, v["requests"]);
        assert_eq!(3, v["io_failures"]);
        assert_eq!(100, v["requests_per_sec"]);
        assert_eq!("interrupted", v["stop_reason"]);
    }
}
