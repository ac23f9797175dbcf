use crate::config::RetryConfig;
use crate::error::ApiError;
use std::future::Future;
use tokio::time::timeout;
use tracing::warn;

/// Runs `op` with a per-attempt deadline, retrying on failure with linear
/// backoff. Attempt `i` gets `base_timeout * (i + 1)` before it is abandoned
/// and the caller sleeps `backoff * (i + 1)` before trying again.
///
/// Every read that feeds a snapshot goes through here so the timeout/retry
/// policy lives in exactly one place.
pub async fn bounded<T, F, Fut>(cfg: &RetryConfig, name: &str, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut last_err: Option<anyhow::Error> = None;
    for attempt in 0..=cfg.attempts {
        let deadline = cfg.base_timeout() * (attempt + 1);
        match timeout(deadline, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                warn!(%name, attempt, error = %e, "attempt failed");
                last_err = Some(e);
            }
            Err(_) => {
                warn!(%name, attempt, ?deadline, "attempt timed out");
                if attempt == cfg.attempts {
                    return Err(ApiError::Timeout {
                        name: name.to_string(),
                        elapsed: deadline,
                    });
                }
            }
        }
        if attempt < cfg.attempts {
            tokio::time::sleep(cfg.backoff() * (attempt + 1)).await;
        }
    }
    Err(ApiError::Internal(last_err.unwrap_or_else(|| {
        anyhow::anyhow!("'{name}' failed after {} attempts", cfg.attempts + 1)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn cfg() -> RetryConfig {
        RetryConfig {
            attempts: 2,
            base_timeout_ms: 50,
            backoff_ms: 1,
        }
    }

    #[tokio::test]
    async fn returns_first_success() {
        let result = bounded(&cfg(), "ok", || async { Ok::<_, anyhow::Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = bounded(&cfg(), "flaky", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                anyhow::bail!("transient")
            }
            Ok(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = bounded(&cfg(), "down", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("still broken")
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn slow_operation_times_out() {
        let cfg = RetryConfig {
            attempts: 0,
            base_timeout_ms: 10,
            backoff_ms: 1,
        };
        let result: Result<u32, _> = bounded(&cfg, "slow", || async {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok(1)
        })
        .await;
        match result {
            Err(ApiError::Timeout { name, .. }) => assert_eq!(name, "slow"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
