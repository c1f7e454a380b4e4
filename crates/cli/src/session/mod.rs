//! Live session orchestration module.

mod control;
mod orchestrator;
mod stats;

pub use orchestrator::{Session, SessionConfig};
pub use stats::{EndReason, SessionStats};
