//! Tool resolution and executor payload construction.
//!
//! Everything here is pure: a request is either turned into an
//! `(endpoint, body)` pair or rejected with a [`DispatchError`] before any
//! network traffic happens.

mod error;
pub mod payload;
pub mod resolve;

pub use error::DispatchError;
pub use payload::{build, ExecutionRequest, ExecutorEndpoint};
pub use resolve::{resolve, ResolvedTool, TARGET_PLACEHOLDER};

use serde::Deserialize;

/// Client parameters of a tool invocation (`/stream` query string).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolRequest {
    pub tool: String,
    pub target: String,
    #[serde(default)]
    pub scan: Option<String>,
}
