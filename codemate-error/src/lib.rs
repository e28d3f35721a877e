//! # codemate-error
//!
//! Unified error handling for codemate - following OpenDAL's error handling practices.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what error occurred (e.g., MissingApiKey, NetworkFailed)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use codemate_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::NetworkFailed, "connection reset by peer")
//!         .with_operation("session::query")
//!         .with_context("model", "claude-3-5-sonnet-20240620")
//!         .with_context("context_messages", "7"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All fallible session operations return `Result<T, codemate_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage
//! - Faults in LLM-generated code are NOT errors: they travel as data in the
//!   query result, never through this type

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using codemate Error
pub type Result<T> = std::result::Result<T, Error>;
