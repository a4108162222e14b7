//! Timeout and circuit breaker around a [`StatsSource`].
//!
//! See [`GuardedSource`] for details.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::source::{SourceError, StatsSource};
use crate::stats::StatsRow;

/// Settings of a [`GuardedSource`].
#[derive(Clone, Copy, Debug)]
pub struct BreakerOptions {
    /// Upper bound for a single fetch.
    pub timeout: Duration,
    /// Consecutive failures after which the breaker opens.
    pub failure_threshold: u32,
    /// How long an open breaker rejects calls before letting one through.
    pub cooldown: Duration,
}

impl Default for BreakerOptions {
    fn default() -> Self {
        BreakerOptions {
            timeout: Duration::from_secs(5),
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed { failures: u32 },
    Open { until: Instant },
    HalfOpen { since: Instant },
}

/// Failure bookkeeping of one fetch operation.
#[derive(Debug)]
struct Circuit {
    operation: &'static str,
    state: Mutex<State>,
}

impl Circuit {
    fn new(operation: &'static str) -> Self {
        Circuit {
            operation,
            state: Mutex::new(State::Closed { failures: 0 }),
        }
    }

    fn is_open(&self) -> bool {
        matches!(*self.state.lock(), State::Open { until } if Instant::now() < until)
    }

    fn acquire(&self, options: &BreakerOptions) -> Result<(), SourceError> {
        let mut state = self.state.lock();
        match *state {
            State::Closed { .. } => Ok(()),
            State::Open { until } if Instant::now() >= until => {
                *state = State::HalfOpen {
                    since: Instant::now(),
                };
                tracing::info!(
                    operation = self.operation,
                    "stats source circuit half-open, trying one fetch"
                );
                Ok(())
            }
            // A trial that was cancelled never records its outcome.
            State::HalfOpen { since } if since.elapsed() >= options.timeout => {
                *state = State::HalfOpen {
                    since: Instant::now(),
                };
                Ok(())
            }
            State::Open { .. } | State::HalfOpen { .. } => Err(SourceError::CircuitOpen),
        }
    }

    fn record<T>(&self, options: &BreakerOptions, result: &Result<T, SourceError>) {
        let mut state = self.state.lock();
        match (result, *state) {
            (Ok(_), State::HalfOpen { .. }) => {
                tracing::info!(
                    operation = self.operation,
                    "stats source recovered, circuit closed"
                );
                *state = State::Closed { failures: 0 };
            }
            (Ok(_), _) => *state = State::Closed { failures: 0 },
            (Err(_), State::Closed { failures })
                if failures + 1 < options.failure_threshold =>
            {
                *state = State::Closed {
                    failures: failures + 1,
                };
            }
            (Err(error), _) => {
                tracing::warn!(
                    operation = self.operation,
                    %error,
                    cooldown_secs = options.cooldown.as_secs(),
                    "stats source circuit opened"
                );
                *state = State::Open {
                    until: Instant::now() + options.cooldown,
                };
            }
        }
    }
}

/// Wraps a [`StatsSource`] so that a slow or failing database cannot stall
/// concurrent scrapes.
///
/// Every fetch is bounded by [`BreakerOptions::timeout`]. After
/// [`BreakerOptions::failure_threshold`] consecutive failures the breaker
/// opens and fetches fail with [`SourceError::CircuitOpen`] without touching
/// the database. Once [`BreakerOptions::cooldown`] has elapsed a single trial
/// fetch is let through; its outcome closes or reopens the breaker.
///
/// Rows and the memory figure are tracked by separate breakers, so a server
/// without `MEMORY_USED` never blocks the per-user statistics.
#[derive(Debug)]
pub struct GuardedSource<S> {
    inner: S,
    options: BreakerOptions,
    rows: Circuit,
    memory_used: Circuit,
}

impl<S: StatsSource> GuardedSource<S> {
    /// Wraps `inner`.
    pub fn new(inner: S, options: BreakerOptions) -> Self {
        GuardedSource {
            inner,
            options,
            rows: Circuit::new("fetch_rows"),
            memory_used: Circuit::new("fetch_memory_used"),
        }
    }

    /// Whether row fetches are currently short-circuited.
    pub fn is_open(&self) -> bool {
        self.rows.is_open()
    }

    /// Whether memory fetches are currently short-circuited.
    pub fn is_memory_open(&self) -> bool {
        self.memory_used.is_open()
    }

    async fn guarded<T, F>(&self, circuit: &Circuit, fetch: F) -> Result<T, SourceError>
    where
        F: Future<Output = Result<T, SourceError>>,
    {
        circuit.acquire(&self.options)?;

        let result = match tokio::time::timeout(self.options.timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(self.options.timeout)),
        };

        circuit.record(&self.options, &result);
        result
    }
}

#[async_trait]
impl<S: StatsSource> StatsSource for GuardedSource<S> {
    async fn fetch_rows(&self) -> Result<Vec<StatsRow>, SourceError> {
        self.guarded(&self.rows, self.inner.fetch_rows()).await
    }

    async fn fetch_memory_used(&self) -> Result<f64, SourceError> {
        self.guarded(&self.memory_used, self.inner.fetch_memory_used())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MEMORY_USED;
    use crate::collector::{Collector, StatsCollector};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Flaky {
        failing: AtomicBool,
        memory_missing: AtomicBool,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl StatsSource for Flaky {
        async fn fetch_rows(&self) -> Result<Vec<StatsRow>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                Err(SourceError::Missing("USER_STATISTICS"))
            } else {
                Ok(vec![StatsRow::default()])
            }
        }

        async fn fetch_memory_used(&self) -> Result<f64, SourceError> {
            if self.memory_missing.load(Ordering::SeqCst) {
                Err(SourceError::Missing("MEMORY_USED"))
            } else {
                Ok(1.0)
            }
        }
    }

    fn options(cooldown: Duration) -> BreakerOptions {
        BreakerOptions {
            timeout: Duration::from_secs(1),
            failure_threshold: 2,
            cooldown,
        }
    }

    #[tokio::test]
    async fn passes_through_when_healthy() {
        let source = GuardedSource::new(Flaky::default(), options(Duration::from_secs(60)));

        assert_eq!(1, source.fetch_rows().await.unwrap().len());
        assert_eq!(1.0, source.fetch_memory_used().await.unwrap());
        assert!(!source.is_open());
    }

    #[tokio::test]
    async fn opens_after_threshold_and_short_circuits() {
        let flaky = Flaky::default();
        flaky.failing.store(true, Ordering::SeqCst);
        let source = GuardedSource::new(flaky, options(Duration::from_secs(60)));

        assert!(source.fetch_rows().await.is_err());
        assert!(!source.is_open());
        assert!(source.fetch_rows().await.is_err());
        assert!(source.is_open());

        let result = source.fetch_rows().await;
        assert!(matches!(result, Err(SourceError::CircuitOpen)));
        assert_eq!(2, source.inner.calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let source = GuardedSource::new(Flaky::default(), options(Duration::from_secs(60)));

        source.inner.failing.store(true, Ordering::SeqCst);
        assert!(source.fetch_rows().await.is_err());
        source.inner.failing.store(false, Ordering::SeqCst);
        assert!(source.fetch_rows().await.is_ok());
        source.inner.failing.store(true, Ordering::SeqCst);
        assert!(source.fetch_rows().await.is_err());

        assert!(!source.is_open());
    }

    #[tokio::test]
    async fn half_open_trial_closes_on_success() {
        let source = GuardedSource::new(Flaky::default(), options(Duration::from_millis(20)));

        source.inner.failing.store(true, Ordering::SeqCst);
        assert!(source.fetch_rows().await.is_err());
        assert!(source.fetch_rows().await.is_err());
        assert!(source.is_open());

        tokio::time::sleep(Duration::from_millis(40)).await;
        source.inner.failing.store(false, Ordering::SeqCst);

        assert!(source.fetch_rows().await.is_ok());
        assert!(!source.is_open());
        assert_eq!(3, source.inner.calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn half_open_trial_reopens_on_failure() {
        let source = GuardedSource::new(Flaky::default(), options(Duration::from_millis(20)));

        source.inner.failing.store(true, Ordering::SeqCst);
        assert!(source.fetch_rows().await.is_err());
        assert!(source.fetch_rows().await.is_err());

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(source.fetch_rows().await.is_err());
        assert!(source.is_open());
        assert!(matches!(
            source.fetch_rows().await,
            Err(SourceError::CircuitOpen)
        ));
    }

    #[tokio::test]
    async fn slow_fetch_times_out() {
        let flaky = Flaky {
            delay: Some(Duration::from_secs(10)),
            ..Default::default()
        };
        let source = GuardedSource::new(
            flaky,
            BreakerOptions {
                timeout: Duration::from_millis(20),
                ..options(Duration::from_secs(60))
            },
        );

        let result = source.fetch_rows().await;
        assert!(matches!(result, Err(SourceError::Timeout(_))));
    }

    #[tokio::test]
    async fn memory_failures_do_not_block_rows() {
        let flaky = Flaky::default();
        flaky.memory_missing.store(true, Ordering::SeqCst);
        let source = GuardedSource::new(
            flaky,
            BreakerOptions {
                failure_threshold: 1,
                ..options(Duration::from_secs(60))
            },
        );

        for _ in 0..3 {
            assert!(source.fetch_memory_used().await.is_err());
            assert_eq!(1, source.fetch_rows().await.unwrap().len());
        }

        assert!(source.is_memory_open());
        assert!(!source.is_open());
        assert_eq!(3, source.inner.calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn row_failures_do_not_block_memory() {
        let flaky = Flaky::default();
        flaky.failing.store(true, Ordering::SeqCst);
        let source = GuardedSource::new(
            flaky,
            BreakerOptions {
                failure_threshold: 1,
                ..options(Duration::from_secs(60))
            },
        );

        assert!(source.fetch_rows().await.is_err());
        assert!(source.is_open());
        assert_eq!(1.0, source.fetch_memory_used().await.unwrap());
        assert!(!source.is_memory_open());
    }

    #[tokio::test]
    async fn user_samples_survive_missing_memory() {
        let flaky = Flaky::default();
        flaky.memory_missing.store(true, Ordering::SeqCst);
        let source = GuardedSource::new(
            flaky,
            BreakerOptions {
                failure_threshold: 1,
                ..options(Duration::from_secs(60))
            },
        );
        let collector = StatsCollector::new(source, "db1");

        for _ in 0..3 {
            let samples = collector.collect().await;
            assert_eq!(24, samples.len());
            assert!(samples.iter().all(|s| s.definition.name() != MEMORY_USED));
        }
    }
}
