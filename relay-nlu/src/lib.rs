//! HTTP client for the NLU engine's single-turn query API.
//!
//! Pure HTTP client; session state lives with the caller.

mod client;
mod error;
mod types;

pub use client::NluClient;
pub use error::{NluError, Result};
pub use types::NluReply;
