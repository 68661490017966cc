// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::deferred::Deferred;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc;
use verif_core::{ExecutorConfig, VerifError};

/// The two worker pools: one for pool slicing, one for metric computation.
///
/// Cloning shares the underlying pools.
#[derive(Clone, Debug)]
pub struct Executors {
    slicing: Arc<ThreadPool>,
    metrics: Arc<ThreadPool>,
}

fn build_pool(threads: Option<usize>, prefix: &'static str) -> Result<ThreadPool, VerifError> {
    let mut builder = ThreadPoolBuilder::new().thread_name(move |idx| format!("{prefix}-{idx}"));
    if let Some(threads) = threads {
        builder = builder.num_threads(threads);
    }
    builder.build().map_err(|err| {
        VerifError::resource_limit(format!("failed to build {prefix} thread pool: {err}"))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| (*msg).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

impl Executors {
    pub fn new(config: &ExecutorConfig) -> Result<Self, VerifError> {
        config.validate()?;
        Ok(Self {
            slicing: Arc::new(build_pool(config.slicing_threads, "verif-slicing")?),
            metrics: Arc::new(build_pool(config.metric_threads, "verif-metrics")?),
        })
    }

    /// Shares caller-owned pools.
    pub fn from_pools(slicing: Arc<ThreadPool>, metrics: Arc<ThreadPool>) -> Self {
        Self { slicing, metrics }
    }

    pub fn slicing_threads(&self) -> usize {
        self.slicing.current_num_threads()
    }

    pub fn metric_threads(&self) -> usize {
        self.metrics.current_num_threads()
    }

    /// Runs slicing work on the slicing pool and waits for it. Used to prepare a pool before
    /// dispatch starts.
    pub fn run_slicing<R, F>(&self, work: F) -> Result<R, VerifError>
    where
        R: Send,
        F: FnOnce() -> Result<R, VerifError> + Send,
    {
        self.slicing.install(work)
    }

    /// Schedules slicing work on the slicing pool without waiting for it.
    pub fn spawn_slicing<R, F>(&self, work: F) -> Deferred<R>
    where
        R: Send + 'static,
        F: FnOnce() -> Result<R, VerifError> + Send + 'static,
    {
        spawn_on(&self.slicing, "slicing", work)
    }

    /// Schedules metric work on the metric pool. A panic in `work` is reported as a
    /// computation error when the result is awaited.
    pub fn submit<R, F>(&self, work: F) -> Deferred<R>
    where
        R: Send + 'static,
        F: FnOnce() -> Result<R, VerifError> + Send + 'static,
    {
        spawn_on(&self.metrics, "metric", work)
    }
}

fn spawn_on<R, F>(pool: &ThreadPool, task: &'static str, work: F) -> Deferred<R>
where
    R: Send + 'static,
    F: FnOnce() -> Result<R, VerifError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    pool.spawn(move || {
        let outcome = catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| {
            Err(VerifError::computation(format!(
                "{task} task panicked: {}",
                panic_message(payload.as_ref())
            )))
        });
        // The receiver is gone only when the store was dropped without building.
        let _ = tx.send(outcome);
    });
    Deferred::pending(rx)
}

#[cfg(test)]
mod tests {
    use super::Executors;
    use verif_core::{ExecutorConfig, VerifError};

    fn executors() -> Executors {
        Executors::new(&ExecutorConfig {
            slicing_threads: Some(1),
            metric_threads: Some(2),
        })
        .expect("pools should build")
    }

    #[test]
    fn pools_respect_configured_sizes() {
        let executors = executors();
        assert_eq!(executors.slicing_threads(), 1);
        assert_eq!(executors.metric_threads(), 2);
        assert!(
            Executors::new(&ExecutorConfig {
                slicing_threads: Some(0),
                metric_threads: None,
            })
            .is_err()
        );
    }

    #[test]
    fn run_slicing_executes_on_slicing_pool() {
        let name = executors()
            .run_slicing(|| Ok(std::thread::current().name().map(str::to_owned)))
            .expect("slicing work should succeed");
        assert_eq!(name.as_deref(), Some("verif-slicing-0"));
    }

    #[test]
    fn spawn_slicing_returns_before_the_work_runs() {
        let executors = executors();
        let (release, gate) = std::sync::mpsc::channel::<()>();
        let deferred = executors.spawn_slicing(move || {
            gate.recv().map_err(|_| VerifError::computation("gate dropped"))?;
            Ok(std::thread::current().name().map(str::to_owned))
        });
        assert!(!deferred.is_ready());
        release.send(()).expect("slicing task is waiting");
        let name = deferred.wait().expect("slicing work should succeed");
        assert_eq!(name.as_deref(), Some("verif-slicing-0"));

        let err = executors
            .spawn_slicing(|| -> Result<u8, VerifError> { panic!("slice exploded") })
            .wait()
            .expect_err("panic becomes an error");
        assert!(err.to_string().contains("slicing task panicked: slice exploded"));
    }

    #[test]
    fn submit_surfaces_errors_and_panics() {
        let executors = executors();
        assert_eq!(executors.submit(|| Ok(21 * 2)).wait().expect("value"), 42);

        let err = executors
            .submit(|| Err::<u8, _>(VerifError::computation("bad pool")))
            .wait()
            .expect_err("error propagates");
        assert_eq!(err, VerifError::computation("bad pool"));

        let err = executors
            .submit(|| -> Result<u8, VerifError> { panic!("metric exploded") })
            .wait()
            .expect_err("panic becomes an error");
        assert!(err.to_string().contains("metric exploded"));
    }
}
