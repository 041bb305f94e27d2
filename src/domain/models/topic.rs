#[cfg(test)]
#[path = "topic_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumVariantNames,
    strum::Display,
)]
#[strum(serialize_all = "kebab-case")]
pub enum ScenarioTopic {
    Random,
    Respiratory,
    Dermatological,
    Gastrointestinal,
    PainManagement,
    EyeEarNoseThroat,
    GeneralWellbeing,
    MedicationQueries,
    Paediatric,
    WomensHealth,
}

impl ScenarioTopic {
    pub fn parse(text: &str) -> Result<ScenarioTopic> {
        if let Some(topic) = ScenarioTopic::iter().find(|topic| {
            return topic.to_string() == text || topic.label() == text;
        }) {
            return Ok(topic);
        }

        bail!(format!("No scenario topic named {text}"))
    }

    /// Every topic in menu order, sentinel first.
    pub fn all() -> Vec<ScenarioTopic> {
        return ScenarioTopic::iter().collect();
    }

    pub fn is_random(&self) -> bool {
        return *self == ScenarioTopic::Random;
    }

    /// Menu label. Concrete labels are also the free text handed to the
    /// patient model, so the examples steer which ailment it picks.
    pub fn label(&self) -> &'static str {
        match self {
            ScenarioTopic::Random => return "Random (select from list)",
            ScenarioTopic::Respiratory => return "Respiratory (e.g., cough, cold, flu, asthma)",
            ScenarioTopic::Dermatological => {
                return "Dermatological (e.g., skin rash, eczema, fungal infection)"
            }
            ScenarioTopic::Gastrointestinal => {
                return "Gastrointestinal (e.g., indigestion, constipation, diarrhea, nausea)"
            }
            ScenarioTopic::PainManagement => {
                return "Pain Management (e.g., headache, back pain, minor sprain)"
            }
            ScenarioTopic::EyeEarNoseThroat => {
                return "Eye/Ear/Nose/Throat (e.g., sore throat, earache, conjunctivitis)"
            }
            ScenarioTopic::GeneralWellbeing => {
                return "General Wellbeing (e.g., fatigue, sleep issues, mild anxiety)"
            }
            ScenarioTopic::MedicationQueries => {
                return "Medication Queries (e.g., side effects, missed dose, interaction check)"
            }
            ScenarioTopic::Paediatric => {
                return "Paediatric (minor ailments in children, from a parent's perspective)"
            }
            ScenarioTopic::WomensHealth => {
                return "Women's Health (e.g., period pain, minor thrush, contraception advice)"
            }
        }
    }
}

/// A topic after the random sentinel has been drawn.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResolvedTopic {
    Topic(ScenarioTopic),
    /// Only reached when the random pool holds nothing but the sentinel.
    GeneralMinorAilment,
}

impl ResolvedTopic {
    pub fn label(&self) -> &'static str {
        match self {
            ResolvedTopic::Topic(topic) => return topic.label(),
            ResolvedTopic::GeneralMinorAilment => return "General minor ailment",
        }
    }
}
