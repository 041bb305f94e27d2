#[cfg(test)]
#[path = "history_test.rs"]
mod tests;

use serde::Deserialize;
use serde::Serialize;

use super::Turn;

/// Number of turns present once the opening scenario has been generated: the
/// seed instruction and the patient's presentation.
pub const OPENING_EXCHANGE_LEN: usize = 2;

/// Ordered, append-only transcript sent in full to the model on every call.
/// The first turn is always the seed instruction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn seed(instruction: &str) -> ConversationHistory {
        return ConversationHistory {
            turns: vec![Turn::user(instruction)],
        };
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn push_user(&mut self, text: &str) {
        self.push(Turn::user(text));
    }

    pub fn push_model(&mut self, text: &str) {
        self.push(Turn::model(text));
    }

    /// Drops the most recent turn. Only used to roll back a user turn whose
    /// model call failed.
    pub(crate) fn pop(&mut self) -> Option<Turn> {
        return self.turns.pop();
    }

    pub fn turns(&self) -> &[Turn] {
        return &self.turns;
    }

    pub fn last(&self) -> Option<&Turn> {
        return self.turns.last();
    }

    pub fn len(&self) -> usize {
        return self.turns.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.turns.is_empty();
    }

    /// True once anything beyond the seed and opening presentation was said.
    pub fn has_dialogue(&self) -> bool {
        return self.turns.len() > OPENING_EXCHANGE_LEN;
    }

    /// Turns exchanged after the opening presentation, in order.
    pub fn dialogue(&self) -> &[Turn] {
        if self.turns.len() <= OPENING_EXCHANGE_LEN {
            return &[];
        }

        return &self.turns[OPENING_EXCHANGE_LEN..];
    }

    pub fn with_appended(&self, turn: Turn) -> ConversationHistory {
        let mut copy = self.clone();
        copy.push(turn);
        return copy;
    }
}
