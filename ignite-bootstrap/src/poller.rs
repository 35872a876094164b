use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};

/// The number of probes a bounded convergence point gets by default.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// The fixed spacing between two probes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ConvergenceError {
    #[error("{name} did not converge after {attempts} attempts: {diagnostic}")]
    /// The attempt budget was used up without the predicate holding.
    Exhausted {
        name: String,
        attempts: u32,
        diagnostic: String,
    },

    #[error("{name} did not converge within {ceiling:?} ({attempts} attempts): {diagnostic}")]
    /// An unbounded wait hit the operator configured ceiling.
    CeilingExceeded {
        name: String,
        ceiling: Duration,
        attempts: u32,
        diagnostic: String,
    },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
/// How a single convergence point is polled.
///
/// The interval is fixed, there is no backoff: everything waited on is
/// expected to settle within a few seconds and a longer wait is a fault.
pub struct ConvergencePolicy {
    max_attempts: Option<u32>,
    interval: Duration,
    ceiling: Option<Duration>,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self::bounded(DEFAULT_MAX_ATTEMPTS, DEFAULT_INTERVAL)
    }
}

impl ConvergencePolicy {
    /// A policy giving up after `max_attempts` probes.
    pub fn bounded(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            interval,
            ceiling: None,
        }
    }

    /// A policy polling until the predicate holds.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            max_attempts: None,
            interval,
            ceiling: None,
        }
    }

    /// Sets a wall-clock limit on the wait, `None` disables it.
    pub fn with_ceiling(mut self, ceiling: Option<Duration>) -> Self {
        self.ceiling = ceiling;
        self
    }

    #[inline]
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[inline]
    pub fn ceiling(&self) -> Option<Duration> {
        self.ceiling
    }

    /// Probes the cluster until `is_satisfied` holds for the observed value.
    ///
    /// Returns the satisfying observation. A probe which errors counts as an
    /// unsatisfied attempt. Once the budget is used up `on_exhausted` is given
    /// the last successful observation to build the diagnostic, followed by
    /// the last probe error if the final attempt failed.
    ///
    /// The poller only observes, any corrective action belongs to the probe
    /// supplied by the call site.
    pub async fn converge<O, E, P, Fut, S, D>(
        &self,
        name: &str,
        mut probe: P,
        is_satisfied: S,
        on_exhausted: D,
    ) -> Result<O, ConvergenceError>
    where
        P: FnMut() -> Fut,
        Fut: Future<Output = Result<O, E>>,
        E: Display,
        S: Fn(&O) -> bool,
        D: FnOnce(Option<&O>) -> String,
    {
        let start = Instant::now();
        let mut attempt = 1;
        let mut last_observed = None;
        let mut last_error = None;

        loop {
            match probe().await {
                Ok(observed) if is_satisfied(&observed) => {
                    debug!(
                        name = name,
                        attempt = attempt,
                        time_taken = ?start.elapsed(),
                        "Converged."
                    );
                    return Ok(observed);
                },
                Ok(observed) => {
                    last_observed = Some(observed);
                    last_error = None;
                },
                Err(e) => {
                    warn!(
                        name = name,
                        attempt = attempt,
                        error = %e,
                        "Convergence probe failed."
                    );
                    last_error = Some(e.to_string());
                },
            }

            if let Some(max_attempts) = self.max_attempts {
                if attempt >= max_attempts {
                    return Err(ConvergenceError::Exhausted {
                        name: name.to_string(),
                        attempts: attempt,
                        diagnostic: diagnose(on_exhausted, last_observed.as_ref(), last_error),
                    });
                }
            }

            if let Some(ceiling) = self.ceiling {
                if start.elapsed() + self.interval > ceiling {
                    return Err(ConvergenceError::CeilingExceeded {
                        name: name.to_string(),
                        ceiling,
                        attempts: attempt,
                        diagnostic: diagnose(on_exhausted, last_observed.as_ref(), last_error),
                    });
                }
            }

            info!(
                name = name,
                attempt = attempt,
                max_attempts = ?self.max_attempts,
                "Waiting for convergence."
            );
            sleep(self.interval).await;
            attempt += 1;
        }
    }
}

fn diagnose<O, D>(
    on_exhausted: D,
    last_observed: Option<&O>,
    last_error: Option<String>,
) -> String
where
    D: FnOnce(Option<&O>) -> String,
{
    let diagnostic = on_exhausted(last_observed);
    match last_error {
        Some(e) => format!("{diagnostic}; last error: {e}"),
        None => diagnostic,
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// A probe which reports how many times it was called.
    fn counting_probe(
        calls: &AtomicU32,
    ) -> impl FnMut() -> std::future::Ready<Result<u32, Infallible>> + '_ {
        move || std::future::ready(Ok(calls.fetch_add(1, Ordering::SeqCst) + 1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_on_attempt_k() {
        let policy = ConvergencePolicy::default();

        for k in 1..=DEFAULT_MAX_ATTEMPTS {
            let calls = AtomicU32::new(0);
            let start = Instant::now();
            let observed = policy
                .converge("test", counting_probe(&calls), |n| *n >= k, |_| String::new())
                .await
                .expect("Probe is satisfied within budget.");

            assert_eq!(observed, k);
            assert_eq!(calls.load(Ordering::SeqCst), k, "Exactly k probes.");
            assert_eq!(
                start.elapsed(),
                DEFAULT_INTERVAL * (k - 1),
                "Exactly k - 1 sleeps."
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_attempts() {
        let policy = ConvergencePolicy::bounded(5, Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let err = policy
            .converge(
                "membership",
                counting_probe(&calls),
                |_| false,
                |last| format!("last observed {last:?}"),
            )
            .await
            .expect_err("Probe never satisfies.");

        assert_eq!(calls.load(Ordering::SeqCst), 5, "Never max + 1 probes.");
        match err {
            ConvergenceError::Exhausted {
                name,
                attempts,
                diagnostic,
            } => {
                assert_eq!(name, "membership");
                assert_eq!(attempts, 5);
                assert_eq!(diagnostic, "last observed Some(5)");
            },
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_errors_count_as_attempts() {
        let policy = ConvergencePolicy::bounded(3, Duration::from_millis(100));
        let calls = AtomicU32::new(0);

        let err = policy
            .converge(
                "agent",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    std::future::ready(Err::<u32, _>("connection refused"))
                },
                |_| true,
                |last| format!("{last:?}"),
            )
            .await
            .expect_err("Probe always errors.");

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(
            err.to_string().ends_with("None; last error: connection refused"),
            "{err}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_error_follows_last_observation() {
        let policy = ConvergencePolicy::unbounded(Duration::from_secs(1))
            .with_ceiling(Some(Duration::from_secs(3)));
        let calls = AtomicU32::new(0);

        let err = policy
            .converge(
                "leader",
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    let result = if n == 1 { Ok(n) } else { Err("agent restarting") };
                    std::future::ready(result)
                },
                |_| false,
                |last| format!("last observed {last:?}"),
            )
            .await
            .expect_err("Ceiling stops the wait.");

        match err {
            ConvergenceError::CeilingExceeded { diagnostic, .. } => assert_eq!(
                diagnostic,
                "last observed Some(1); last error: agent restarting"
            ),
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovered_errors_are_not_reported() {
        let policy = ConvergencePolicy::bounded(3, Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let err = policy
            .converge(
                "membership",
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    let result = if n == 1 { Err("timed out") } else { Ok(n) };
                    std::future::ready(result)
                },
                |_| false,
                |last| format!("last observed {last:?}"),
            )
            .await
            .expect_err("Probe never satisfies.");

        assert_eq!(
            err.to_string(),
            "membership did not converge after 3 attempts: last observed Some(3)"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_policy_keeps_polling() {
        let policy = ConvergencePolicy::unbounded(Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let observed = policy
            .converge("leader", counting_probe(&calls), |n| *n == 40, |_| String::new())
            .await
            .expect("Unbounded wait eventually converges.");
        assert_eq!(observed, 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_policy_respects_ceiling() {
        let policy = ConvergencePolicy::unbounded(Duration::from_secs(1))
            .with_ceiling(Some(Duration::from_secs(10)));
        let calls = AtomicU32::new(0);

        let err = policy
            .converge(
                "leader",
                counting_probe(&calls),
                |_| false,
                |_| "no leader".to_string(),
            )
            .await
            .expect_err("Ceiling stops the wait.");

        assert!(matches!(err, ConvergenceError::CeilingExceeded { .. }));
        assert!(calls.load(Ordering::SeqCst) <= 11);
    }
}
