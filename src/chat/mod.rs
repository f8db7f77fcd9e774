// src/chat/mod.rs
// Turn orchestration and session summarization.

pub mod orchestrator;
pub mod summarize;

pub use orchestrator::{handle_turn, handle_turn_stream, resolve_session, ChatTurnRequest, ChatTurnResponse};
pub use summarize::summarize_session;
