use serde::Deserialize;
use serde::Serialize;

/// Sampling parameters sent with a single generate call.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationConfig {
    /// Patient presentation that opens the consultation.
    pub const OPENING: GenerationConfig = GenerationConfig {
        temperature: 0.8,
        max_output_tokens: 300,
    };

    /// Patient replies during the consultation. Kept low so the patient stays
    /// consistent with the case it presented.
    pub const DIALOGUE: GenerationConfig = GenerationConfig {
        temperature: 0.2,
        max_output_tokens: 300,
    };

    pub const FEEDBACK: GenerationConfig = GenerationConfig {
        temperature: 0.7,
        max_output_tokens: 1000,
    };
}
