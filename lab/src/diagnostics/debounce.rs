//! Quiet-period scheduling.
//!
//! Each [`Debouncer::schedule`] call aborts the pending run and starts a new
//! timer. Runs are numbered; a consumer receiving results from several runs
//! keeps only the one whose generation is still [`Debouncer::is_current`].

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

pub struct Debouncer {
    delay: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, generation: 0, pending: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `work(generation)` once `delay` passes without another call.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&mut self, work: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let delay = self.delay;
        trace!(generation, ?delay, "debounce scheduled");

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work(generation).await;
        }));
        generation
    }

    /// Abort the pending run, if any. Results of aborted runs become stale.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Whether results tagged `generation` come from the latest schedule.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
