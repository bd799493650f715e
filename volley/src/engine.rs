use core::{future::Future, time::Duration};
use std::{sync::Arc, time::Instant};

use anyhow::Error;

pub use self::stop::{Controller, StopReason, Termination};
use self::{
    http::{Tls, Worker},
    runtime::{TaskSet, ThreadPool},
};
use crate::{cfg::Config, report::Report, stat::Stat};

pub mod http;
mod runtime;
mod stop;

/// How long workers are given to wind down once the stop signal fires.
///
/// Workers abandon in-flight requests promptly, so this is only hit when a
/// thread is stuck outside of the async runtime.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Dispatches workers and collects their results.
#[derive(Debug)]
pub struct Runtime {
    cfg: Config,
}

impl Runtime {
    pub fn new(cfg: Config) -> Self {
        Self { cfg }
    }

    /// Runs the load until the stopping criterion fires, or the given
    /// interrupt future completes, whichever comes first.
    ///
    /// Returns the final report, produced exactly once.
    pub async fn run<F>(self, interrupt: F) -> Result<Report, Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Config { http, concurrency, threads, .. } = self.cfg;
        let num_threads = threads.min(concurrency);
        let termination = http.termination;
        let cfg = Arc::new(http);
        let tls = Tls::new()?;
        let controller = Controller::new();
        let stat = Stat::new(concurrency.get());

        log::debug!(
            "dispatching {} workers over {} threads against {} targets",
            concurrency,
            num_threads,
            cfg.targets.len()
        );

        let pool = {
            let stats = stat.stats.clone();
            let stop = controller.token();

            // Workers are distributed round-robin among threads.
            ThreadPool::new(num_threads, move |tid: usize| {
                let cfg = cfg.clone();
                let tls = tls.clone();
                let stop = stop.clone();
                let stats: Vec<_> = stats.iter().skip(tid).step_by(num_threads.get()).cloned().collect();

                move || {
                    let set = TaskSet::new(stats.len(), move |idx: usize| {
                        let worker = Worker::new(cfg.clone(), tls.clone(), stop.clone(), stats[idx].clone());

                        worker.run()
                    });

                    set.run()
                }
            })
        };

        let started = Instant::now();
        if let Termination::Duration(duration) = termination {
            controller.arm_deadline(duration);
        }
        controller.arm_interrupt(interrupt);

        let mut pool = tokio::task::spawn_blocking(move || pool.run());

        let elapsed = tokio::select! {
            rc = &mut pool => {
                rc??;
                controller.stop(StopReason::Completed);
                started.elapsed()
            }
            _ = controller.stopped() => {
                let elapsed = started.elapsed();
                match tokio::time::timeout(DRAIN_TIMEOUT, &mut pool).await {
                    Ok(rc) => rc??,
                    Err(..) => {
                        log::warn!("workers did not stop within {DRAIN_TIMEOUT:?}, reporting partial results");
                    }
                }
                elapsed
            }
        };

        let report = Report::new(stat.totals(), elapsed, controller.reason());

        Ok(report)
    }
}

#[cfg(test)]
mod test {
    use core::{future, num::NonZero};

    use bytes::Bytes;
    use ::http::{
        header::{HeaderValue, CONNECTION},
        HeaderMap, Method,
    };

    use super::*;
    use crate::{
        cmd::OutputFormat,
        engine::http::{Config as HttpConfig, Timeouts},
        target::TargetSet,
        testing,
    };

    fn config(urls: &[String], termination: Termination, concurrency: usize, threads: usize) -> Config {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        Config {
            http: HttpConfig {
                targets: TargetSet::parse(urls).unwrap(),
                method: Method::GET,
                body: Bytes::new(),
                headers,
                keep_alive: true,
                termination,
                timeouts: Timeouts::default(),
                tcp_no_delay: false,
            },
            concurrency: NonZero::new(concurrency).unwrap(),
            threads: NonZero::new(threads).unwrap(),
            output: OutputFormat::Text,
        }
    }

    #[tokio::test]
    async fn test_fixed_count_total() {
        let server = testing::serve(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").await;
        let cfg = config(
            &[server.url("/")],
            Termination::Requests(NonZero::new(5).unwrap()),
            4,
            2,
        );

        let report = Runtime::new(cfg).run(future::pending()).await.unwrap();
        assert_eq!(20, report.totals.requests);
        assert_eq!(20, report.totals.success);
        assert_eq!(Some(StopReason::Completed), report.stop_reason);
    }

    #[tokio::test]
    async fn test_deadline_excludes_in_flight() {
        let server = testing::blackhole().await;
        let cfg = config(
            &[server.url("/")],
            Termination::Duration(Duration::from_millis(300)),
            2,
            2,
        );

        let report = Runtime::new(cfg).run(future::pending()).await.unwrap();
        assert_eq!(0, report.totals.requests);
        assert_eq!(0, report.totals.network_failures);
        assert_eq!(2, report.totals.cancelled);
        assert_eq!(Some(StopReason::Deadline), report.stop_reason);
    }

    #[tokio::test]
    async fn test_interrupt() {
        let server = testing::blackhole().await;
        let cfg = config(
            &[server.url("/")],
            Termination::Requests(NonZero::new(1).unwrap()),
            1,
            1,
        );

        let interrupt = tokio::time::sleep(Duration::from_millis(200));
        let report = Runtime::new(cfg).run(interrupt).await.unwrap();
        assert_eq!(0, report.totals.requests);
        assert_eq!(1, report.totals.cancelled);
        assert_eq!(Some(StopReason::Interrupted), report.stop_reason);
    }

    #[tokio::test]
    async fn test_empty_target_set() {
        let cfg = config(&[], Termination::Requests(NonZero::new(10).unwrap()), 3, 2);

        let report = Runtime::new(cfg).run(future::pending()).await.unwrap();
        assert_eq!(0, report.totals.requests);
        assert_eq!(1, report.elapsed_secs);
    }
}
