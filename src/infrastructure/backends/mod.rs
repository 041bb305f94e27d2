pub mod gemini;
pub mod ollama;
#[cfg(test)]
pub mod scripted;

use anyhow::Result;

use crate::domain::models::BackendBox;
use crate::domain::models::BackendName;

pub struct BackendManager {}

impl BackendManager {
    pub fn get(name: BackendName) -> Result<BackendBox> {
        match name {
            BackendName::Gemini => return Ok(Box::new(gemini::Gemini::from_config()?)),
            BackendName::Ollama => return Ok(Box::<ollama::Ollama>::default()),
        }
    }
}
