#[cfg(test)]
#[path = "scenario_test.rs"]
mod tests;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::models::ResolvedTopic;
use crate::domain::models::ScenarioTopic;

pub struct ScenarioSelector {}

impl ScenarioSelector {
    /// Draws a concrete topic for the random sentinel; any other topic is
    /// returned as is.
    pub fn resolve<R: Rng + ?Sized>(
        requested: ScenarioTopic,
        topic_set: &[ScenarioTopic],
        rng: &mut R,
    ) -> ResolvedTopic {
        if !requested.is_random() {
            return ResolvedTopic::Topic(requested);
        }

        let pool = topic_set
            .iter()
            .filter(|topic| return !topic.is_random())
            .copied()
            .collect::<Vec<ScenarioTopic>>();

        return match pool.choose(rng) {
            Some(topic) => ResolvedTopic::Topic(*topic),
            None => ResolvedTopic::GeneralMinorAilment,
        };
    }

    /// The topic is appended as free text after the base patient instruction.
    pub fn seed_instruction(base: &str, resolved: ResolvedTopic) -> String {
        match resolved {
            ResolvedTopic::Topic(topic) => {
                return format!(
                    "{base}\n\nYour specific ailment for this consultation will be related to: {}",
                    topic.label()
                );
            }
            ResolvedTopic::GeneralMinorAilment => {
                return format!(
                    "{base}\n\nYour specific ailment for this consultation will be a general minor ailment."
                );
            }
        }
    }
}
