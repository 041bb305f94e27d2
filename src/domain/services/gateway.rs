#[cfg(test)]
#[path = "gateway_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::models::BackendBox;
use crate::domain::models::BackendName;
use crate::domain::models::ConversationHistory;
use crate::domain::models::Event;
use crate::domain::models::GenerationConfig;
use crate::domain::models::RetryPolicy;

/// Error text fragments the model service uses when it is temporarily unable
/// to serve a request. Matched case-insensitively against the whole error
/// chain.
const TRANSIENT_SIGNATURES: [&str; 4] = ["overloaded", "503", "unavailable", "resource_exhausted"];

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Failed after {retries} retries due to persistent model unavailability.")]
    ExhaustedRetries { retries: u32 },
    #[error("Cancelled while waiting to retry the model request.")]
    Cancelled,
}

pub fn is_transient(err: &anyhow::Error) -> bool {
    let message = format!("{err:#}").to_lowercase();
    return TRANSIENT_SIGNATURES
        .iter()
        .any(|signature| return message.contains(signature));
}

/// The only way the application talks to a model service.
pub struct ModelGateway {
    backend: BackendBox,
    policy: RetryPolicy,
}

impl ModelGateway {
    pub fn new(backend: BackendBox, policy: RetryPolicy) -> ModelGateway {
        return ModelGateway { backend, policy };
    }

    pub fn backend_name(&self) -> BackendName {
        return self.backend.name();
    }

    pub fn policy(&self) -> &RetryPolicy {
        return &self.policy;
    }

    /// Single attempt. Errors are returned untouched.
    pub async fn generate(
        &self,
        history: &ConversationHistory,
        config: &GenerationConfig,
    ) -> Result<String> {
        tracing::debug!(
            backend = %self.backend.name(),
            turns = history.len(),
            temperature = config.temperature,
            max_output_tokens = config.max_output_tokens,
            "Requesting completion"
        );

        return self.backend.generate(history.turns(), config).await;
    }

    /// Retries only while the service reports overload or unavailability,
    /// sleeping with exponential backoff and jitter in between. Any other
    /// error ends the loop after the attempt that raised it.
    pub async fn generate_with_retry(
        &self,
        history: &ConversationHistory,
        config: &GenerationConfig,
        tx: &mpsc::UnboundedSender<Event>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let attempts = self.policy.attempts();

        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled.into());
            }

            let err = match self.generate(history, config).await {
                Ok(text) => return Ok(text),
                Err(err) => err,
            };

            if !is_transient(&err) {
                tracing::error!(error = ?err, attempt = attempt, "Model request failed");
                return Err(err);
            }

            if attempt == attempts {
                tracing::error!(error = ?err, attempts = attempts, "Model stayed unavailable");
                break;
            }

            let wait = self.policy.delay_after(attempt) + self.jitter();
            tracing::warn!(
                error = %err,
                attempt = attempt,
                wait_ms = wait.as_millis() as u64,
                "Model busy, retrying"
            );
            tx.send(Event::Retrying {
                attempt,
                max_retries: attempts,
                delay: wait,
                error: err.to_string(),
            })?;

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(GatewayError::Cancelled.into());
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        return Err(GatewayError::ExhaustedRetries { retries: attempts }.into());
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.policy.max_jitter.as_millis() as u64;
        return Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms));
    }
}
