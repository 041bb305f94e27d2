#[cfg(test)]
#[path = "consultation_test.rs"]
mod tests;

use anyhow::Result;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::FeedbackGenerator;
use super::ModelGateway;
use super::Prompts;
use super::ScenarioSelector;
use super::PATIENT_INSTRUCTION_PROMPT;
use crate::domain::models::strip_end_marker;
use crate::domain::models::ConsultationState;
use crate::domain::models::ConversationHistory;
use crate::domain::models::EndReason;
use crate::domain::models::Event;
use crate::domain::models::FeedbackReport;
use crate::domain::models::GenerationConfig;
use crate::domain::models::ScenarioTopic;
use crate::domain::models::USER_ENDED_MARKER;

pub const QUIT_COMMAND: &str = "quit";

#[derive(Debug, thiserror::Error)]
pub enum ConsultationError {
    #[error("Cannot {action} while the consultation is in state {state}")]
    InvalidTransition { action: &'static str, state: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing was typed. History is untouched.
    EmptyInput,
    /// `quit` before any real dialogue. The consultation was reset without
    /// feedback.
    Discarded,
    Reply(String),
    /// The consultation is over and feedback should be generated next.
    /// `reply` holds the patient's closing words when the patient ended it.
    Concluded {
        reply: Option<String>,
        ended_by: EndReason,
    },
}

pub struct Consultation {
    gateway: ModelGateway,
    prompts: Prompts,
    topics: Vec<ScenarioTopic>,
    rng: StdRng,
    tx: mpsc::UnboundedSender<Event>,
    state: ConsultationState,
}

impl Consultation {
    pub fn new(
        gateway: ModelGateway,
        prompts: Prompts,
        rng: StdRng,
        tx: mpsc::UnboundedSender<Event>,
    ) -> Consultation {
        return Consultation {
            gateway,
            prompts,
            topics: ScenarioTopic::all(),
            rng,
            tx,
            state: ConsultationState::NotStarted,
        };
    }

    pub fn state(&self) -> &ConsultationState {
        return &self.state;
    }

    pub fn history(&self) -> Option<&ConversationHistory> {
        return self.state.history();
    }

    fn invalid(&self, action: &'static str) -> anyhow::Error {
        return ConsultationError::InvalidTransition {
            action,
            state: self.state.to_string(),
        }
        .into();
    }

    pub fn start(&mut self, topic: ScenarioTopic) -> Result<()> {
        if self.state != ConsultationState::NotStarted {
            return Err(self.invalid("start a consultation"));
        }

        tracing::info!(topic = %topic, "Consultation started");
        self.state = ConsultationState::ScenarioPending { topic };

        return Ok(());
    }

    /// Seeds the history and asks the model for the opening presentation.
    /// A failed call leaves the consultation pending with nothing recorded.
    pub async fn generate_scenario(&mut self) -> Result<String> {
        let topic = match &self.state {
            ConsultationState::ScenarioPending { topic } => *topic,
            _ => return Err(self.invalid("generate a scenario")),
        };

        let base = self
            .prompts
            .load_or_warn(PATIENT_INSTRUCTION_PROMPT, &self.tx)
            .await?;
        let resolved = ScenarioSelector::resolve(topic, &self.topics, &mut self.rng);
        tracing::info!(requested = %topic, resolved = resolved.label(), "Generating scenario");

        let mut history =
            ConversationHistory::seed(&ScenarioSelector::seed_instruction(&base.text, resolved));
        let opening = self
            .gateway
            .generate(&history, &GenerationConfig::OPENING)
            .await?;
        history.push_model(&opening);

        self.state = ConsultationState::InDialogue { topic, history };

        return Ok(opening);
    }

    pub async fn submit(&mut self, input: &str) -> Result<TurnOutcome> {
        let command = input.trim();
        let (topic, history) = match &mut self.state {
            ConsultationState::InDialogue { topic, history } => (*topic, history),
            _ => return Err(self.invalid("send a message")),
        };

        if command.is_empty() {
            return Ok(TurnOutcome::EmptyInput);
        }

        if command.eq_ignore_ascii_case(QUIT_COMMAND) {
            if !history.has_dialogue() {
                tracing::info!("Consultation quit before any dialogue, discarding");
                self.reset();
                return Ok(TurnOutcome::Discarded);
            }

            tracing::info!(
                dialogue_turns = history.dialogue().len(),
                "Trainee ended the consultation"
            );
            history.push_user(USER_ENDED_MARKER);
            let history = std::mem::take(history);
            self.state = ConsultationState::Concluding {
                topic,
                history,
                ended_by: EndReason::User,
            };

            return Ok(TurnOutcome::Concluded {
                reply: None,
                ended_by: EndReason::User,
            });
        }

        history.push_user(input);
        let reply = match self
            .gateway
            .generate(history, &GenerationConfig::DIALOGUE)
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                history.pop();
                return Err(err);
            }
        };

        if let Some(closing) = strip_end_marker(&reply) {
            history.push_model(&closing);
            let history = std::mem::take(history);
            tracing::info!(turns = history.len(), "Patient ended the consultation");
            self.state = ConsultationState::Concluding {
                topic,
                history,
                ended_by: EndReason::Patient,
            };

            return Ok(TurnOutcome::Concluded {
                reply: Some(closing),
                ended_by: EndReason::Patient,
            });
        }

        history.push_model(&reply);

        return Ok(TurnOutcome::Reply(reply));
    }

    /// Moves a concluded consultation to `FeedbackReady`. On failure the
    /// consultation stays concluded so feedback can be requested again.
    pub async fn generate_feedback(&mut self, cancel: &CancellationToken) -> Result<FeedbackReport> {
        let history = match &self.state {
            ConsultationState::Concluding { history, .. } => history,
            _ => return Err(self.invalid("generate feedback")),
        };
        tracing::info!(topic = ?self.state.topic(), turns = history.len(), "Generating feedback");

        let report = FeedbackGenerator::new(&self.gateway, &self.prompts)
            .generate(history, &self.tx, cancel)
            .await?;

        if let ConsultationState::Concluding { topic, history, .. } =
            std::mem::take(&mut self.state)
        {
            self.state = ConsultationState::FeedbackReady {
                topic,
                history,
                feedback: report.clone(),
            };
        }

        return Ok(report);
    }

    /// Drops everything about the current consultation.
    pub fn reset(&mut self) {
        self.state = ConsultationState::NotStarted;
    }
}
