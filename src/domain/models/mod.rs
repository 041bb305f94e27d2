mod backend;
mod consultation;
mod event;
mod generation;
mod history;
mod retry;
mod speaker;
mod topic;
mod turn;

pub use backend::*;
pub use consultation::*;
pub use event::*;
pub use generation::*;
pub use history::*;
pub use retry::*;
pub use speaker::*;
pub use topic::*;
pub use turn::*;
