/// Failures while talking to the sandbox executor. Each one ends the stream
/// with a single error frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForwardError {
    #[error("executor unreachable: {0}")]
    ExecutorUnreachable(String),

    #[error("executor returned HTTP {status}: {body}")]
    ExecutorError { status: u16, body: String },

    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("executor sent no output for {secs}s")]
    ExecutorIdle { secs: u64 },
}

impl ForwardError {
    /// Stable machine-readable identifier carried in the error frame.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExecutorUnreachable(_) => "executor_unreachable",
            Self::ExecutorError { .. } => "executor_error",
            Self::StreamInterrupted(_) => "stream_interrupted",
            Self::ExecutorIdle { .. } => "executor_idle",
        }
    }

    pub(crate) fn from_send_error(err: &reqwest::Error) -> Self {
        if err.is_connect() || (err.is_timeout() && !err.is_body()) {
            Self::ExecutorUnreachable(describe(err))
        } else {
            Self::StreamInterrupted(describe(err))
        }
    }

    pub(crate) fn from_body_error(err: &reqwest::Error) -> Self {
        Self::StreamInterrupted(describe(err))
    }
}

/// reqwest's top-level message is terse ("error sending request for url");
/// the useful part is usually the innermost source.
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    let mut root = None;
    while let Some(inner) = source {
        root = Some(inner.to_string());
        source = inner.source();
    }
    if let Some(root) = root {
        if !message.contains(&root) {
            message = format!("{message}: {root}");
        }
    }
    message
}
