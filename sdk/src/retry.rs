use {
    crate::error::Result,
    std::{future::Future, time::Duration},
    tokio::time::sleep,
    tracing::warn,
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Waits `base * attempt` after the failed attempt number `attempt` (1-based).
    Linear { base: Duration },
    Fixed(Duration),
    None,
}

impl Backoff {
    #[must_use]
    #[inline]
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Linear { base } => base.saturating_mul(attempt),
            Self::Fixed(delay) => delay,
            Self::None => Duration::ZERO,
        }
    }
}

/// Retries a fallible async call while it fails with a transient error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self::linear(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY)
    }
}

impl RetryPolicy {
    #[must_use]
    #[inline]
    pub fn linear(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear { base },
        }
    }

    /// Calls `f` once.
    #[must_use]
    #[inline]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::None,
        }
    }

    /// Runs `f` with the 1-based attempt number until it succeeds, fails with
    /// a non-transient error, or the attempts are exhausted. The last error is returned.
    #[inline]
    pub async fn run<T, F, Fut>(&self, mut f: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match f(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !err.is_transient() || attempt >= max_attempts {
                return Err(err);
            }
            let delay = self.backoff.delay(attempt);
            warn!(error = %err, attempt, ?delay, "transient failure, will retry");
            sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::error::Error,
        anyhow::anyhow,
        std::{
            future::ready,
            sync::atomic::{AtomicU32, Ordering},
        },
        tokio::time::Instant,
    };

    fn failing_times(
        failures: u32,
        make_err: fn() -> Error,
    ) -> (AtomicU32, impl Fn(&AtomicU32) -> Result<u32>) {
        (AtomicU32::new(0), move |calls: &AtomicU32| {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= failures {
                Err(make_err())
            } else {
                Ok(call)
            }
        })
    }

    fn network() -> Error {
        Error::network(anyhow!("connection reset"))
    }

    #[test]
    fn linear_delays() {
        let backoff = Backoff::Linear {
            base: Duration::from_secs(1),
        };
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(Backoff::None.delay(5), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_with_backoff() {
        let (calls, f) = failing_times(2, network);
        let started = Instant::now();
        let result = RetryPolicy::default()
            .run(|_| ready(f(&calls)))
            .await
            .unwrap();
        assert_eq!(result, 3);
        // 1s after the first failure, 2s after the second.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let (calls, f) = failing_times(4, network);
        let err = RetryPolicy::default()
            .run(|_| ready(f(&calls)))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_final_errors() {
        let (calls, f) = failing_times(1, || Error::Authentication);
        let err = RetryPolicy::default()
            .run(|_| ready(f(&calls)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authentication));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn passes_attempt_number() {
        let mut seen = Vec::new();
        let _ = RetryPolicy::linear(4, Duration::ZERO)
            .run(|attempt| {
                seen.push(attempt);
                ready(Err::<(), _>(network()))
            })
            .await;
        assert_eq!(seen, [1, 2, 3, 4]);
    }
}
