use core::{future::Future, num::NonZero};
use std::thread::Builder;

use anyhow::{anyhow, Error};

/// Represents a thread pool for running workers each in a separate thread.
#[derive(Debug)]
pub struct ThreadPool<F> {
    num_threads: NonZero<usize>,
    factory: F,
}

impl<F> ThreadPool<F> {
    pub fn new(num_threads: NonZero<usize>, factory: F) -> Self {
        Self { num_threads, factory }
    }
}

impl<F, U> ThreadPool<F>
where
    F: FnMut(usize) -> U,
    U: FnOnce() -> Result<(), Error> + Send + 'static,
{
    /// Runs this [`ThreadPool`] by spawning threads and waiting for them to
    /// complete.
    ///
    /// Returns the first error, after all threads are joined.
    pub fn run(mut self) -> Result<(), Error> {
        let num_threads = self.num_threads.get();
        let mut threads = Vec::with_capacity(num_threads);

        let name = "volley:w".to_string();
        for idx in 0..num_threads {
            let thread = {
                let worker = (self.factory)(idx);

                Builder::new().name(name.clone()).spawn(worker)?
            };

            threads.push(thread);
        }

        let mut rc = Ok(());
        for thread in threads {
            let result = thread.join().unwrap_or_else(|_| Err(anyhow!("worker thread panicked")));
            if rc.is_ok() {
                rc = result;
            }
        }

        rc
    }
}

/// Per-thread task set.
///
/// Hosts its tasks on a single-threaded runtime owned by the calling thread.
#[derive(Debug)]
pub struct TaskSet<F> {
    num_tasks: usize,
    factory: F,
}

impl<F> TaskSet<F> {
    pub fn new(num_tasks: usize, factory: F) -> Self {
        Self { num_tasks, factory }
    }
}

impl<F, T> TaskSet<F>
where
    F: FnMut(usize) -> T,
    T: Future<Output = ()> + Send + 'static,
{
    /// Runs all tasks to completion, blocking the current thread.
    pub fn run(mut self) -> Result<(), Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()?;

        let mut jobs = Vec::with_capacity(self.num_tasks);
        for idx in 0..self.num_tasks {
            let job = runtime.spawn((self.factory)(idx));

            jobs.push(job);
        }

        let future = async move {
            for job in jobs {
                job.await?;
            }

            Ok::<_, Error>(())
        };

        runtime.block_on(future)
    }
}
