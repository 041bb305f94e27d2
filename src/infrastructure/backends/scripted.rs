use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::anyhow;
use anyhow::Result;
use async_trait::async_trait;
use tokio::time::Instant;

use crate::domain::models::Backend;
use crate::domain::models::BackendName;
use crate::domain::models::GenerationConfig;
use crate::domain::models::Turn;

/// One request received by a [`Scripted`] backend.
#[derive(Clone, Debug)]
pub struct Call {
    pub turns: Vec<Turn>,
    pub config: GenerationConfig,
    pub at: Instant,
}

/// In-memory backend replaying queued replies in order. Errors are queued as
/// their message text.
#[derive(Clone, Default)]
pub struct Scripted {
    replies: Arc<Mutex<VecDeque<Result<String, String>>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Scripted {
    pub fn reply(self, text: &str) -> Scripted {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        return self;
    }

    pub fn fail(self, error: &str) -> Scripted {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(error.to_string()));
        return self;
    }

    pub fn fail_times(self, error: &str, times: usize) -> Scripted {
        let mut backend = self;
        for _ in 0..times {
            backend = backend.fail(error);
        }
        return backend;
    }

    pub fn calls(&self) -> Vec<Call> {
        return self.calls.lock().unwrap().clone();
    }
}

#[async_trait]
impl Backend for Scripted {
    fn name(&self) -> BackendName {
        return BackendName::Gemini;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn generate(&self, turns: &[Turn], config: &GenerationConfig) -> Result<String> {
        self.calls.lock().unwrap().push(Call {
            turns: turns.to_vec(),
            config: *config,
            at: Instant::now(),
        });

        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => return Ok(text),
            Some(Err(error)) => return Err(anyhow!(error)),
            None => return Err(anyhow!("scripted backend has no replies left")),
        }
    }
}
