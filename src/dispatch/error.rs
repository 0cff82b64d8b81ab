/// Reasons a tool request is rejected before anything is sent to the executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("{}", invalid_scan_message(.tool, .scan, .available))]
    InvalidScan {
        tool: String,
        scan: Option<String>,
        available: Vec<String>,
    },

    #[error("tool '{tool}' has unsupported type '{kind}'")]
    UnsupportedToolType { tool: String, kind: String },

    #[error("tool '{tool}' is misconfigured: {reason}")]
    MalformedDefinition { tool: String, reason: String },

    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

fn invalid_scan_message(tool: &str, scan: &Option<String>, available: &[String]) -> String {
    let available = available.join(", ");
    match scan {
        Some(scan) => format!("tool '{tool}' has no scan '{scan}' (available: {available})"),
        None => format!("tool '{tool}' requires a scan parameter (available: {available})"),
    }
}

impl DispatchError {
    /// Stable machine-readable identifier for clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::InvalidScan { .. } => "invalid_scan",
            Self::UnsupportedToolType { .. } => "unsupported_tool_type",
            Self::MalformedDefinition { .. } => "malformed_definition",
            Self::InvalidTarget(_) => "invalid_target",
        }
    }
}
