#[cfg(test)]
#[path = "feedback_test.rs"]
mod tests;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::ModelGateway;
use super::Prompts;
use super::FEEDBACK_PROMPT;
use crate::domain::models::ConversationHistory;
use crate::domain::models::Event;
use crate::domain::models::FeedbackReport;
use crate::domain::models::GenerationConfig;
use crate::domain::models::Turn;

pub const FEEDBACK_UNAVAILABLE: &str = "Could not generate text feedback.";

pub struct FeedbackGenerator<'a> {
    gateway: &'a ModelGateway,
    prompts: &'a Prompts,
}

impl<'a> FeedbackGenerator<'a> {
    pub fn new(gateway: &'a ModelGateway, prompts: &'a Prompts) -> FeedbackGenerator<'a> {
        return FeedbackGenerator { gateway, prompts };
    }

    /// Asks the model to assess the transcript. This is the one request that
    /// is retried while the service reports overload.
    pub async fn generate(
        &self,
        history: &ConversationHistory,
        tx: &mpsc::UnboundedSender<Event>,
        cancel: &CancellationToken,
    ) -> Result<FeedbackReport> {
        let prompt = self.prompts.load_or_warn(FEEDBACK_PROMPT, tx).await?;
        let request = history.with_appended(Turn::user(&prompt.text));

        let text = self
            .gateway
            .generate_with_retry(&request, &GenerationConfig::FEEDBACK, tx, cancel)
            .await?;

        if text.trim().is_empty() {
            tracing::warn!(turns = history.len(), "Model returned empty feedback");
            tx.send(Event::Warning(FEEDBACK_UNAVAILABLE.to_string()))?;
            return Ok(FeedbackReport { text: None });
        }

        return Ok(FeedbackReport { text: Some(text) });
    }
}
