use crate::errors::{ErrorPrompt, ServiceError};
use crate::session::Connectivity;
use futures::future::BoxFuture;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for automatic retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Factor to multiply delay by after each attempt
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn from_app_config(config: &crate::config::AppConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts,
            initial_delay: config.retry_initial_delay(),
            ..Self::default()
        }
    }
}

/// Retry policy for determining if an error is retryable
pub trait RetryPolicy<E> {
    fn is_retryable(&self, error: &E) -> bool;
}

/// Retries only transport failures: lost connectivity and timeouts.
/// Server faults are not retried automatically since the write may have landed.
pub struct TransportRetryPolicy;

impl RetryPolicy<ServiceError> for TransportRetryPolicy {
    fn is_retryable(&self, error: &ServiceError) -> bool {
        matches!(
            error,
            ServiceError::NetworkError(_) | ServiceError::TimeoutError(_)
        )
    }
}

/// Execute an async function with retries
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    policy: impl RetryPolicy<E>,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = config.initial_delay;
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!("Operation succeeded after {} attempts", attempts);
                }
                return Ok(result);
            }
            Err(error) => {
                if attempts >= config.max_attempts || !policy.is_retryable(&error) {
                    if attempts > 1 {
                        warn!("Operation failed after {} attempts: {}", attempts, error);
                    }
                    return Err(error);
                }

                warn!(
                    "Attempt {} failed: {}. Retrying in {:?}...",
                    attempts, error, delay
                );

                sleep(delay).await;

                // Calculate next delay with exponential backoff
                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_factor)
                        .min(config.max_delay.as_secs_f64()),
                );
            }
        }
    }
}

/// Outcome of running a [`RetryableAction`].
#[derive(Debug)]
pub enum ActionOutcome<T> {
    Completed(T),
    /// A prompt offering "Retry"; calling [`RetryableAction::retry`] re-runs the same closure.
    RetryOffered {
        prompt: ErrorPrompt,
        error: ServiceError,
    },
    /// Not retryable: show the prompt (inline or dismiss-only) and stop.
    Failed {
        prompt: ErrorPrompt,
        error: ServiceError,
    },
}

impl<T> ActionOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, ActionOutcome::Completed(_))
    }

    pub fn prompt(&self) -> Option<&ErrorPrompt> {
        match self {
            ActionOutcome::Completed(_) => None,
            ActionOutcome::RetryOffered { prompt, .. } | ActionOutcome::Failed { prompt, .. } => {
                Some(prompt)
            }
        }
    }
}

/// A user-triggered action that can be re-invoked verbatim from a retry prompt.
pub struct RetryableAction<'a, T> {
    label: String,
    action: Box<dyn FnMut() -> BoxFuture<'a, Result<T, ServiceError>> + Send + 'a>,
    attempts: u32,
    retry_available: bool,
    connectivity: Option<Connectivity>,
}

impl<'a, T> RetryableAction<'a, T> {
    pub fn new<F>(label: impl Into<String>, action: F) -> Self
    where
        F: FnMut() -> BoxFuture<'a, Result<T, ServiceError>> + Send + 'a,
    {
        Self {
            label: label.into(),
            action: Box::new(action),
            attempts: 0,
            retry_available: false,
            connectivity: None,
        }
    }

    /// A retry re-checks the connection instead of failing on the offline flag.
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Runs the action for the first time.
    pub async fn run(&mut self) -> ActionOutcome<T> {
        self.invoke().await
    }

    /// Re-runs the exact same closure after the user confirmed "Retry".
    pub async fn retry(&mut self) -> Result<ActionOutcome<T>, ServiceError> {
        if !self.retry_available {
            return Err(ServiceError::ValidationError(format!(
                "{} cannot be retried",
                self.label
            )));
        }
        if let Some(connectivity) = &self.connectivity {
            connectivity.allow_retry();
        }
        Ok(self.invoke().await)
    }

    async fn invoke(&mut self) -> ActionOutcome<T> {
        self.attempts += 1;
        match (self.action)().await {
            Ok(value) => {
                self.retry_available = false;
                ActionOutcome::Completed(value)
            }
            Err(error) => {
                let prompt = ErrorPrompt::for_error(&error);
                tracing::error!(
                    action = %self.label,
                    attempt = self.attempts,
                    kind = %error.kind(),
                    "Action failed: {}",
                    error
                );
                self.retry_available = prompt.offers_retry();
                if self.retry_available {
                    ActionOutcome::RetryOffered { prompt, error }
                } else {
                    ActionOutcome::Failed { prompt, error }
                }
            }
        }
    }
}
