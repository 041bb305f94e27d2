#[cfg(test)]
#[path = "gemini_test.rs"]
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
struct ContentPart {
    #[serde(default)]
    text: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<ContentPart>,
}

impl From<&Turn> for Content {
    fn from(turn: &Turn) -> Content {
        let role = match turn.role() {
            Speaker::User => "user",
            Speaker::Model => "model",
        };

        return Content {
            role: role.to_string(),
            parts: vec![ContentPart {
                text: turn.text().to_string(),
            }],
        };
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SamplingConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest {
    contents: Vec<Content>,
    generation_config: SamplingConfig,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    finish_reason: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Text of the first candidate. Blocked or empty responses have none.
    fn text(&self) -> String {
        return self
            .candidates
            .first()
            .map(|candidate| {
                return candidate
                    .content
                    .parts
                    .iter()
                    .map(|part| return part.text.as_str())
                    .collect::<Vec<&str>>()
                    .join("");
            })
            .unwrap_or_default();
    }
}

pub struct Gemini {
    url: String,
    token: String,
    model: String,
    timeout: String,
}

/// Keeps the API key out of request URLs and the errors that quote them.
const API_KEY_HEADER: &str = "x-goog-api-key";

impl Gemini {
    pub fn new(url: &str, token: &str, model: &str, timeout: &str) -> Gemini {
        return Gemini {
            url: url.to_string(),
            token: token.to_string(),
            model: model.to_string(),
            timeout: timeout.to_string(),
        };
    }

    pub fn from_config() -> Result<Gemini> {
        let token = Config::get(ConfigKey::GeminiToken);
        if token.is_empty() {
            bail!("Gemini token is not defined");
        }

        return Ok(Gemini::new(
            &Config::get(ConfigKey::GeminiURL),
            &token,
            &Config::get(ConfigKey::Model),
            &Config::get(ConfigKey::BackendHealthCheckTimeout),
        ));
    }

    fn model_path(&self) -> String {
        if self.model.starts_with("models/") {
            return self.model.to_string();
        }

        return format!("models/{}", self.model);
    }
}

#[async_trait]
impl Backend for Gemini {
    fn name(&self) -> BackendName {
        return BackendName::Gemini;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        if self.url.is_empty() {
            bail!("Gemini URL is not defined");
        }
        if self.token.is_empty() {
            bail!("Gemini token is not defined");
        }

        let url = format!(
            "{url}/v1beta/{model}",
            url = self.url,
            model = self.model_path(),
        );

        let res = reqwest::Client::new()
            .get(&url)
            .header(API_KEY_HEADER, &self.token)
            .timeout(Duration::from_millis(self.timeout.parse::<u64>()?))
            .send()
            .await
            .map_err(|err| return err.without_url());

        let status = match res {
            Ok(res) => res.status().as_u16(),
            Err(err) => {
                tracing::error!(error = ?err, "Gemini is not reachable");
                bail!("Gemini is not reachable");
            }
        };
        if status >= 400 {
            tracing::error!(status = status, "Gemini health check failed");
            bail!(format!(
                "Gemini health check failed with status {status}. Check that the API key is valid and has access to model {}",
                self.model
            ));
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn generate(&self, turns: &[Turn], config: &GenerationConfig) -> Result<String> {
        let req = CompletionRequest {
            contents: turns.iter().map(Content::from).collect(),
            generation_config: SamplingConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
            },
        };

        let res = reqwest::Client::new()
            .post(format!(
                "{url}/v1beta/{model}:generateContent",
                url = self.url,
                model = self.model_path(),
            ))
            .header(API_KEY_HEADER, &self.token)
            .json(&req)
            .send()
            .await
            .map_err(|err| return err.without_url())?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body = %body,
                "Failed to make completion request to Gemini"
            );
            bail!(format!(
                "Failed to make completion request to Gemini, {}: {}",
                status.as_u16(),
                body.trim()
            ));
        }

        let ores = res
            .json::<GenerateContentResponse>()
            .await
            .map_err(|err| return err.without_url())?;
        if let Some(candidate) = ores.candidates.first() {
            tracing::debug!(finish_reason = ?candidate.finish_reason, "Completion response");
        }

        return Ok(ores.text());
    }
}
