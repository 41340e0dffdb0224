//! Capped retry with backoff for analysis that is not ready yet.

use std::{sync::Arc, time::Duration};

use tracing::{info, instrument, warn};

use crate::{AnalysisSource, FetchError, LoadedAnalysis, SnapshotCell};
use engine::AnalysisSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Growth of the delay after every failed attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the failed `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Fetches `track_id`, retrying transient failures with the policy's delays.
///
/// Stops at the first non-transient error; after `max_attempts` the last
/// error is returned.
#[instrument(skip(source, policy), level = "debug")]
pub async fn fetch_with_retry<S>(
    source: &S,
    track_id: &str,
    policy: &RetryPolicy,
) -> Result<AnalysisSnapshot, FetchError>
where
    S: AnalysisSource + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match source.fetch(track_id).await {
            Ok(snapshot) => return Ok(snapshot),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(attempt, ?delay, %err, "analysis fetch failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Fetches `track_id` and swaps it into `cell`.
///
/// On failure the cell is cleared, so nobody keeps syncing to the previous
/// song's analysis.
pub async fn load_into<S>(
    cell: &SnapshotCell,
    source: &S,
    track_id: &str,
    policy: &RetryPolicy,
) -> Result<Arc<LoadedAnalysis>, FetchError>
where
    S: AnalysisSource + ?Sized,
{
    match fetch_with_retry(source, track_id, policy).await {
        Ok(snapshot) => {
            info!(track_id, beats = snapshot.beats().len(), "analysis loaded");
            let loaded = Arc::new(LoadedAnalysis {
                track_id: track_id.to_string(),
                snapshot,
            });
            cell.replace_arc(loaded.clone());
            Ok(loaded)
        }
        Err(err) => {
            cell.clear();
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use futures::future::BoxFuture;

    use super::*;

    /// Fails with `error` until `failures` attempts were made.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        error: fn(&str) -> FetchError,
    }

    impl Flaky {
        fn new(failures: u32, error: fn(&str) -> FetchError) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                error,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl AnalysisSource for Flaky {
        fn fetch<'a>(&'a self, track_id: &'a str) -> BoxFuture<'a, Result<AnalysisSnapshot, FetchError>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                if call <= self.failures {
                    Err((self.error)(track_id))
                } else {
                    Ok(AnalysisSnapshot::default())
                }
            })
        }
    }

    fn not_ready(track_id: &str) -> FetchError {
        FetchError::NotReady(track_id.to_string())
    }

    fn broken(track_id: &str) -> FetchError {
        FetchError::Parse {
            path: track_id.into(),
            source: serde_json::from_str::<()>("{").unwrap_err(),
        }
    }

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            multiplier: 2.0,
        }
    }

    #[test]
    fn delays_grow_and_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for(5), Duration::from_secs(2));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let source = Flaky::new(2, not_ready);
        fetch_with_retry(&source, "song", &quick()).await.unwrap();
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let source = Flaky::new(10, not_ready);
        let err = fetch_with_retry(&source, "song", &quick()).await.unwrap_err();
        assert!(matches!(err, FetchError::NotReady(_)));
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn does_not_retry_fatal_errors() {
        let source = Flaky::new(1, broken);
        let err = fetch_with_retry(&source, "song", &quick()).await.unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn load_into_swaps_or_clears() {
        let cell = SnapshotCell::new();

        let loaded = load_into(&cell, &Flaky::new(1, not_ready), "first", &quick())
            .await
            .unwrap();
        assert_eq!(loaded.track_id, "first");
        assert_eq!(cell.current_track_id().as_deref(), Some("first"));

        load_into(&cell, &Flaky::new(10, not_ready), "second", &quick())
            .await
            .unwrap_err();
        assert!(cell.load().is_none());
    }
}
