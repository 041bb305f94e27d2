#[cfg(test)]
#[path = "prompts_test.rs"]
mod tests;

use std::path;

use anyhow::Result;
use tokio::fs;
use tokio::sync::mpsc;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Event;

pub const PATIENT_INSTRUCTION_PROMPT: &str = "patient_system_instruction.txt";
pub const FEEDBACK_PROMPT: &str = "feedback_prompt.txt";

pub const FALLBACK_PROMPT: &str = "You are a helpful assistant. Please respond to user queries.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    pub name: String,
    pub text: String,
    /// Set when the template could not be read and `FALLBACK_PROMPT` was
    /// used instead.
    pub is_fallback: bool,
}

pub struct Prompts {
    pub dir: path::PathBuf,
}

impl Default for Prompts {
    fn default() -> Prompts {
        return Prompts::new(path::PathBuf::from(Config::get(ConfigKey::PromptsDir)));
    }
}

impl Prompts {
    pub fn new(dir: path::PathBuf) -> Prompts {
        return Prompts { dir };
    }

    pub fn path(&self, name: &str) -> path::PathBuf {
        return self.dir.join(name);
    }

    /// Reads a template from disk on every call. Never fails: unreadable
    /// templates resolve to a generic instruction.
    pub async fn load(&self, name: &str) -> Prompt {
        let file_path = self.path(name);
        match fs::read_to_string(&file_path).await {
            Ok(text) => {
                return Prompt {
                    name: name.to_string(),
                    text,
                    is_fallback: false,
                };
            }
            Err(err) => {
                tracing::warn!(
                    path = %file_path.display(),
                    error = %err,
                    "Prompt file not found, using fallback instruction"
                );
                return Prompt {
                    name: name.to_string(),
                    text: FALLBACK_PROMPT.to_string(),
                    is_fallback: true,
                };
            }
        }
    }

    /// Same as `load`, but also tells the user when the fallback was used.
    pub async fn load_or_warn(
        &self,
        name: &str,
        tx: &mpsc::UnboundedSender<Event>,
    ) -> Result<Prompt> {
        let prompt = self.load(name).await;
        if prompt.is_fallback {
            tx.send(Event::Warning(format!(
                "Prompt file not found at '{}'. Please ensure the prompts folder and file exist. Continuing with a generic instruction.",
                self.path(name).display()
            )))?;
        }

        return Ok(prompt);
    }
}
