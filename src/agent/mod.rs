//! Agent module - the tool-calling loop and its conversation seeding
//!
//! The agent is responsible for:
//!
//! - Seeding a conversation with the system prompt and the instruction
//! - Calling the LLM provider and recording its replies
//! - Nudging the model when it answers with prose only
//! - Dispatching tool invocations and feeding results back
//! - Stopping when the model invokes `finished`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Instruction │────>│  AgentLoop  │────>│ LLMProvider │
//! │  (CLI/REPL) │     │             │     │ (+ retries) │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │    Tools    │────>│ Guard/Gate  │
//!                     │  Registry   │     │  (safety)   │
//!                     └─────────────┘     └─────────────┘
//! ```

mod context;
mod r#loop;

pub use context::{ContextBuilder, RuntimeContext};
pub use r#loop::{
    AgentLoop, LoopState, RunOutcome, DEFAULT_MAX_TURNS, NUDGE_MESSAGE, SKIPPED_MESSAGE,
};
