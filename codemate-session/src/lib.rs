//! # Codemate Session Core
//!
//! Drives one LLM round-trip at a time: send a prompt with the accumulated
//! conversation, split the reply into prose and fenced Python code, optionally
//! run the code in a persistent embedded interpreter, and record the outcome.
//!
//! ## Core Concepts
//! - **Parse**: two-state line scanner separating fenced code from explanation
//! - **Runner**: embedded Python interpreter with a namespace that survives
//!   across executions, stdout captured per call
//! - **Context**: ordered user/assistant turns giving the model memory
//! - **History**: append-only log of executed round-trips
//! - **SessionController**: the orchestrator owning all of the above

pub mod history;
pub mod parse;
pub mod runner;
pub mod session;

pub use history::{History, QueryResult};
pub use runner::{CodeRunner, Execution, ExecutionEnvironment};
pub use session::{
    ConversationContext, Presenter, QueryOptions, SessionController, API_KEY_VAR,
};
