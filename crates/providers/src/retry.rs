//! Provider retry: bounded re-attempts with exponential backoff.
//!
//! Wraps any provider and re-sends a decision request when it fails with a
//! transient error (network, timeout, rate limit, 5xx). Permanent errors such
//! as bad credentials are returned immediately.

use async_trait::async_trait;
use loopwright_core::error::ProviderError;
use loopwright_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A provider that retries its inner provider on transient failures.
pub struct RetryProvider {
    inner: Arc<dyn Provider>,
    max_retries: u32,
    base_delay: Duration,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn Provider>) -> Self {
        Self {
            inner,
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }

    /// Extra attempts after the first failure.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before the first retry; doubles on each subsequent retry.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn delay_for(&self, retry: u32, error: &ProviderError) -> Duration {
        let backoff = self.base_delay.saturating_mul(2u32.saturating_pow(retry));
        match error {
            ProviderError::RateLimited { retry_after_secs } => {
                backoff.max(Duration::from_secs(*retry_after_secs))
            }
            _ => backoff,
        }
    }
}

#[async_trait]
impl Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut retry = 0;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => {
                    if retry > 0 {
                        info!(provider = %self.inner.name(), retries = retry, "Retry: request succeeded");
                    }
                    return Ok(response);
                }
                Err(e) if e.is_transient() && retry < self.max_retries => {
                    let delay = self.delay_for(retry, &e);
                    warn!(
                        provider = %self.inner.name(),
                        error = %e,
                        attempt = retry + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retry: transient provider failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopwright_core::transcript::Turn;
    use std::sync::Mutex;

    /// Fails with the queued errors, then succeeds.
    struct FlakyProvider {
        errors: Mutex<Vec<ProviderError>>,
        call_count: Mutex<usize>,
    }

    impl FlakyProvider {
        fn new(mut errors: Vec<ProviderError>) -> Self {
            errors.reverse();
            Self {
                errors: Mutex::new(errors),
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            *self.call_count.lock().unwrap() += 1;
            if let Some(err) = self.errors.lock().unwrap().pop() {
                return Err(err);
            }
            Ok(ProviderResponse {
                turn: Turn::assistant("success"),
                usage: None,
                model: "test-model".into(),
            })
        }
    }

    fn test_request() -> ProviderRequest {
        ProviderRequest {
            model: "test".into(),
            turns: vec![Turn::user("hello")],
            temperature: 0.7,
            max_tokens: None,
            actions: vec![],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures() {
        let inner = Arc::new(FlakyProvider::new(vec![
            ProviderError::Network("conn reset".into()),
            ProviderError::ApiError {
                status_code: 502,
                message: "Bad Gateway".into(),
            },
        ]));
        let provider = RetryProvider::new(inner.clone()).with_max_retries(2);

        let response = provider.complete(test_request()).await.unwrap();
        assert_eq!(response.turn.content, "success");
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let inner = Arc::new(FlakyProvider::new(vec![
            ProviderError::Timeout("slow".into()),
            ProviderError::Timeout("slow".into()),
            ProviderError::Timeout("slow".into()),
        ]));
        let provider = RetryProvider::new(inner.clone()).with_max_retries(1);

        let err = provider.complete(test_request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let inner = Arc::new(FlakyProvider::new(vec![ProviderError::AuthenticationFailed(
            "bad key".into(),
        )]));
        let provider = RetryProvider::new(inner.clone()).with_max_retries(5);

        let err = provider.complete(test_request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
        assert_eq!(inner.calls(), 1);
    }

    #[test]
    fn backoff_doubles_and_honours_retry_after() {
        let inner = Arc::new(FlakyProvider::new(vec![]));
        let provider = RetryProvider::new(inner).with_base_delay(Duration::from_millis(100));
        let network = ProviderError::Network("x".into());

        assert_eq!(provider.delay_for(0, &network), Duration::from_millis(100));
        assert_eq!(provider.delay_for(2, &network), Duration::from_millis(400));
        assert_eq!(
            provider.delay_for(0, &ProviderError::RateLimited { retry_after_secs: 3 }),
            Duration::from_secs(3)
        );
    }
}
