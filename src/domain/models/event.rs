use std::time::Duration;

/// Notices raised while an operation is in flight, rendered by the front end
/// as they arrive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Warning(String),
    Retrying {
        attempt: u32,
        max_retries: u32,
        delay: Duration,
        error: String,
    },
}
