#[cfg(test)]
#[path = "ollama_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Backend;
use crate::domain::models::BackendName;
use crate::domain::models::GenerationConfig;
use crate::domain::models::Speaker;
use crate::domain::models::Turn;

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> ChatMessage {
        let role = match turn.role() {
            Speaker::User => "user",
            Speaker::Model => "assistant",
        };

        return ChatMessage {
            role: role.to_string(),
            content: turn.text().to_string(),
        };
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
}

pub struct Ollama {
    url: String,
    model: String,
    timeout: String,
}

impl Default for Ollama {
    fn default() -> Ollama {
        return Ollama {
            url: Config::get(ConfigKey::OllamaURL),
            model: Config::get(ConfigKey::Model),
            timeout: Config::get(ConfigKey::BackendHealthCheckTimeout),
        };
    }
}

#[async_trait]
impl Backend for Ollama {
    fn name(&self) -> BackendName {
        return BackendName::Ollama;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        let res = reqwest::Client::new()
            .get(&self.url)
            .timeout(Duration::from_millis(self.timeout.parse::<u64>()?))
            .send()
            .await;

        if let Err(err) = &res {
            tracing::error!(error = ?err, "Ollama is not running");
            bail!("Ollama is not running");
        }

        let status = res?.status();
        if status != 200 {
            tracing::error!(status = status.as_u16(), "Ollama health check failed");
            bail!("Ollama health check failed");
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn generate(&self, turns: &[Turn], config: &GenerationConfig) -> Result<String> {
        let req = ChatRequest {
            model: self.model.to_string(),
            messages: turns.iter().map(ChatMessage::from).collect(),
            stream: false,
            options: ChatOptions {
                temperature: config.temperature,
                num_predict: config.max_output_tokens,
            },
        };

        let res = reqwest::Client::new()
            .post(format!("{url}/api/chat", url = self.url))
            .json(&req)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body = %body,
                "Failed to make completion request to Ollama"
            );
            bail!(format!(
                "Failed to make completion request to Ollama, {}: {}",
                status.as_u16(),
                body.trim()
            ));
        }

        let ores = res.json::<ChatResponse>().await?;
        tracing::debug!(done = ores.done, "Completion response");

        return Ok(ores
            .message
            .map(|message| return message.content)
            .unwrap_or_default());
    }
}
