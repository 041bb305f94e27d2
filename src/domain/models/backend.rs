#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;

use super::GenerationConfig;
use super::Turn;

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BackendName {
    Gemini,
    Ollama,
}

impl BackendName {
    pub fn parse(text: String) -> Result<BackendName> {
        if let Some(name) = BackendName::iter().find(|name| {
            return name.to_string() == text;
        }) {
            return Ok(name);
        }

        bail!(format!("No backend named {text}"))
    }
}

/// A language model service able to continue a conversation.
#[async_trait]
pub trait Backend {
    fn name(&self) -> BackendName;

    /// Used by `doctor` to verify the service is reachable with the
    /// configured credentials and model.
    async fn health_check(&self) -> Result<()>;

    /// Sends every turn, oldest first, and returns the model's next reply.
    /// Failures carry the service's status and error body so callers can
    /// tell overload from fatal errors.
    async fn generate(&self, turns: &[Turn], config: &GenerationConfig) -> Result<String>;
}

pub type BackendBox = Box<dyn Backend + Send + Sync>;
