use super::CapabilityError;
use crate::config::Provider;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(p: &Provider) -> Self {
        Self {
            max_retries: p.max_retries,
            backoff: Duration::from_millis(p.backoff_ms),
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Runs `op` up to `1 + max_retries` times, sleeping with exponential backoff
/// between attempts. Only retryable errors trigger another attempt.
pub fn call_with_retry<T, F>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, CapabilityError>
where
    F: FnMut() -> Result<T, CapabilityError>,
{
    let mut attempt = 0u32;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    call = label,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "capability call failed, retrying: {err}"
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast(retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries: retries,
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn retries_once_then_succeeds() {
        let calls = Cell::new(0);
        let out = call_with_retry(fast(1), "test", || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(CapabilityError::Timeout(1))
            } else {
                Ok(42)
            }
        });
        assert_eq!(out.unwrap(), 42);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn gives_up_after_budget() {
        let calls = Cell::new(0);
        let out: Result<(), _> = call_with_retry(fast(1), "test", || {
            calls.set(calls.get() + 1);
            Err(CapabilityError::Transport("down".into()))
        });
        assert!(out.is_err());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn does_not_retry_auth_failures() {
        let calls = Cell::new(0);
        let out: Result<(), _> = call_with_retry(fast(3), "test", || {
            calls.set(calls.get() + 1);
            Err(CapabilityError::Status {
                code: 401,
                body: "bad key".into(),
            })
        });
        assert!(out.is_err());
        assert_eq!(calls.get(), 1);
    }
}
