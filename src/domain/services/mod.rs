mod consultation;
mod feedback;
mod gateway;
mod prompts;
mod scenario;

pub use consultation::*;
pub use feedback::*;
pub use gateway::*;
pub use prompts::*;
pub use scenario::*;
