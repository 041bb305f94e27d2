#[cfg(test)]
#[path = "turn_test.rs"]
mod tests;

use serde::Deserialize;
use serde::Serialize;

use super::Speaker;

/// Appended by the trainee's `quit` command so the feedback prompt can tell
/// who closed the consultation.
pub const USER_ENDED_MARKER: &str = "[CONSULTATION ENDED BY USER]";

/// Emitted by the patient model when it considers the consultation over.
pub const END_CONSULTATION_MARKER: &str = "[END_CONSULTATION]";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Speaker,
    text: String,
}

impl Turn {
    pub fn new(role: Speaker, text: &str) -> Turn {
        return Turn {
            role,
            text: text.to_string(),
        };
    }

    pub fn user(text: &str) -> Turn {
        return Turn::new(Speaker::User, text);
    }

    pub fn model(text: &str) -> Turn {
        return Turn::new(Speaker::Model, text);
    }

    pub fn role(&self) -> Speaker {
        return self.role;
    }

    pub fn text(&self) -> &str {
        return &self.text;
    }
}

/// Removes every end-of-consultation marker from a model reply. Returns
/// `None` when the reply carries no marker.
pub fn strip_end_marker(text: &str) -> Option<String> {
    if !text.contains(END_CONSULTATION_MARKER) {
        return None;
    }

    return Some(
        text.replace(END_CONSULTATION_MARKER, "")
            .trim()
            .to_string(),
    );
}
