//! Share Availability Waiter
//!
//! Manila creates shares asynchronously. The waiter polls the share status
//! with exponential backoff until it reports `available` or the wall-clock
//! budget runs out.

use crate::domain::ports::{Share, STATUS_AVAILABLE};
use crate::error::{Error, Result};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Poll schedule for share readiness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before the second poll
    pub initial_interval: Duration,
    /// Upper bound for a single delay
    pub max_interval: Duration,
    /// Total wall-clock budget
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(120),
        }
    }
}

impl PollPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval,
            initial_interval: self.initial_interval,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.max_interval,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }
}

/// Poll `fetch_status` until the share is available and return the
/// available share.
///
/// A fetch error aborts the wait immediately. Each delay is clamped to the
/// remaining budget and a last poll is made at the deadline, so the wait
/// never overruns `policy.timeout` by more than one fetch.
pub async fn wait_until_available<F, Fut>(
    mut fetch_status: F,
    share_id: &str,
    policy: &PollPolicy,
) -> Result<Share>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Share>>,
{
    let deadline = Instant::now() + policy.timeout;
    let mut backoff = policy.backoff();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let share = fetch_status().await?;
        if share.status == STATUS_AVAILABLE {
            info!("Share {} is available after {} polls", share_id, attempts);
            return Ok(share);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::ShareNotAvailable {
                share_id: share_id.to_string(),
                timeout: policy.timeout,
            });
        }

        let delay = backoff
            .next_backoff()
            .unwrap_or(policy.max_interval)
            .min(deadline - now);
        debug!(
            "Share {} is {} after {} polls, next poll in {:?}",
            share_id, share.status, attempts, delay
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn share(status: &str) -> Share {
        Share {
            id: "share-1".into(),
            status: status.into(),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediately_available() {
        let polls = AtomicU32::new(0);
        let start = Instant::now();

        wait_until_available(
            || async {
                polls.fetch_add(1, Ordering::SeqCst);
                Ok(share("available"))
            },
            "share-1",
            &PollPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(polls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_available_after_backoff() {
        let polls = AtomicU32::new(0);
        let start = Instant::now();

        let ready = wait_until_available(
            || async {
                let n = polls.fetch_add(1, Ordering::SeqCst);
                Ok(share(if n < 3 { "creating" } else { "available" }))
            },
            "share-1",
            &PollPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(ready.status, "available");
        assert_eq!(ready.id, "share-1");
        assert_eq!(polls.load(Ordering::SeqCst), 4);
        // 1s + 2s + 4s
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(7));
        assert!(elapsed < Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_within_budget() {
        let policy = PollPolicy {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(120),
        };
        let start = Instant::now();

        let result =
            wait_until_available(|| async { Ok(share("creating")) }, "share-1", &policy).await;

        assert_matches!(
            result,
            Err(Error::ShareNotAvailable { share_id, timeout })
                if share_id == "share-1" && timeout == policy.timeout
        );
        let elapsed = start.elapsed();
        assert!(elapsed >= policy.timeout);
        assert!(elapsed <= policy.timeout + policy.max_interval);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_is_capped() {
        let policy = PollPolicy {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(4),
            timeout: Duration::from_secs(20),
        };
        let polls = AtomicU32::new(0);

        let result = wait_until_available(
            || async {
                polls.fetch_add(1, Ordering::SeqCst);
                Ok(share("creating"))
            },
            "share-1",
            &policy,
        )
        .await;

        assert!(result.is_err());
        // Polls at 0, 1, 3, 7, 11, 15, 19, 20
        assert_eq!(polls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_aborts_wait() {
        let polls = AtomicU32::new(0);

        let result = wait_until_available(
            || async {
                let n = polls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Ok(share("creating"))
                } else {
                    Err(Error::OpenStackApi {
                        service: "manila".into(),
                        reason: "404 Not Found".into(),
                    })
                }
            },
            "share-1",
            &PollPolicy::default(),
        )
        .await;

        assert_matches!(result, Err(Error::OpenStackApi { .. }));
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_keeps_polling_until_timeout() {
        let policy = PollPolicy {
            timeout: Duration::from_secs(5),
            ..PollPolicy::default()
        };
        let result =
            wait_until_available(|| async { Ok(share("error")) }, "share-9", &policy).await;
        assert_matches!(
            result,
            Err(Error::ShareNotAvailable { share_id, .. }) if share_id == "share-9"
        );
    }
}
