use super::ConversationHistory;
use super::ScenarioTopic;

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum EndReason {
    /// The trainee typed `quit`.
    User,
    /// The model emitted the end-of-consultation marker.
    Patient,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedbackReport {
    /// `None` when the model returned no usable text.
    pub text: Option<String>,
}

/// Lifecycle of one consultation. Every variant owns exactly the data that is
/// valid in it, so a history can't exist before the scenario was generated
/// and feedback can't exist before the consultation concluded.
#[derive(Clone, Debug, Default, PartialEq, Eq, strum::Display)]
pub enum ConsultationState {
    #[default]
    NotStarted,
    ScenarioPending {
        topic: ScenarioTopic,
    },
    InDialogue {
        topic: ScenarioTopic,
        history: ConversationHistory,
    },
    Concluding {
        topic: ScenarioTopic,
        history: ConversationHistory,
        ended_by: EndReason,
    },
    FeedbackReady {
        topic: ScenarioTopic,
        history: ConversationHistory,
        feedback: FeedbackReport,
    },
}

impl ConsultationState {
    pub fn history(&self) -> Option<&ConversationHistory> {
        match self {
            ConsultationState::NotStarted | ConsultationState::ScenarioPending { .. } => {
                return None
            }
            ConsultationState::InDialogue { history, .. }
            | ConsultationState::Concluding { history, .. }
            | ConsultationState::FeedbackReady { history, .. } => return Some(history),
        }
    }

    pub fn topic(&self) -> Option<ScenarioTopic> {
        match self {
            ConsultationState::NotStarted => return None,
            ConsultationState::ScenarioPending { topic }
            | ConsultationState::InDialogue { topic, .. }
            | ConsultationState::Concluding { topic, .. }
            | ConsultationState::FeedbackReady { topic, .. } => return Some(*topic),
        }
    }
}
