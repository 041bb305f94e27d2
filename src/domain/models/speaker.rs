use serde::Deserialize;
use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum Speaker {
    #[strum(serialize = "You")]
    User,
    #[strum(serialize = "Patient")]
    Model,
}
