//! Per-request latency measurement.
//!
//! Latest-value storage only; no aggregation or percentiles.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct TimerInner {
    marks: HashMap<String, Instant>,
    measurements: HashMap<String, Duration>,
}

/// Records start marks and elapsed measurements by name.
#[derive(Debug, Default)]
pub struct RequestTimer {
    inner: Mutex<TimerInner>,
}

impl RequestTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current instant under `name`, replacing any prior mark.
    pub fn mark(&self, name: &str) {
        self.inner
            .lock()
            .expect("request timer lock is not poisoned")
            .marks
            .insert(name.to_string(), Instant::now());
    }

    /// Store and return the elapsed time since `start_mark` under `name`.
    ///
    /// The start mark is consumed. Returns `None` when it does not exist.
    pub fn measure(&self, name: &str, start_mark: &str) -> Option<Duration> {
        let mut inner = self
            .inner
            .lock()
            .expect("request timer lock is not poisoned");
        let start = inner.marks.remove(start_mark)?;
        let elapsed = start.elapsed();
        inner.measurements.insert(name.to_string(), elapsed);
        tracing::debug!(
            measurement = name,
            elapsed_ms = elapsed.as_millis() as u64,
            "request timing"
        );
        Some(elapsed)
    }

    /// The latest stored measurement for `name`.
    pub fn elapsed(&self, name: &str) -> Option<Duration> {
        self.inner
            .lock()
            .expect("request timer lock is not poisoned")
            .measurements
            .get(name)
            .copied()
    }

    pub fn clear(&self) {
        let mut inner = self
            .inner
            .lock()
            .expect("request timer lock is not poisoned");
        inner.marks.clear();
        inner.measurements.clear();
    }

    /// Time a fallible future, recording `<name>-success` or `<name>-error`
    /// depending on the outcome, and propagate the result unchanged.
    pub async fn observe<T, E, F>(&self, name: &str, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.mark(name);
        match fut.await {
            Ok(value) => {
                self.measure(&format!("{name}-success"), name);
                Ok(value)
            }
            Err(error) => {
                self.measure(&format!("{name}-error"), name);
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_consumes_mark_and_stores_elapsed() {
        let timer = RequestTimer::new();

        timer.mark("req");
        let elapsed = timer.measure("req-total", "req");
        assert!(elapsed.is_some());
        assert!(timer.elapsed("req-total").is_some());

        // Mark was consumed.
        assert!(timer.measure("req-total", "req").is_none());
    }

    #[test]
    fn measure_without_mark_returns_none() {
        let timer = RequestTimer::new();
        assert!(timer.measure("anything", "missing").is_none());
    }

    #[test]
    fn remark_replaces_previous_start() {
        let timer = RequestTimer::new();

        timer.mark("req");
        timer.mark("req");
        assert!(timer.measure("req-total", "req").is_some());
    }

    #[tokio::test]
    async fn observe_records_success_measurement() {
        let timer = RequestTimer::new();

        let result: Result<u32, ()> = timer.observe("fetch", async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
        assert!(timer.elapsed("fetch-success").is_some());
        assert!(timer.elapsed("fetch-error").is_none());
    }

    #[tokio::test]
    async fn observe_records_error_measurement_and_rethrows() {
        let timer = RequestTimer::new();

        let result: Result<(), &str> = timer.observe("fetch", async { Err("boom") }).await;
        assert_eq!(result, Err("boom"));
        assert!(timer.elapsed("fetch-error").is_some());
        assert!(timer.elapsed("fetch-success").is_none());
    }
}
