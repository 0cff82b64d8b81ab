use super::ResolvedTool;
use serde::Serialize;
use std::fmt;

/// Executor routes the router is allowed to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorEndpoint {
    RunWasm,
    RunSystem,
}

impl ExecutorEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::RunWasm => "run-wasm",
            Self::RunSystem => "run-system",
        }
    }
}

impl fmt::Display for ExecutorEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// JSON body posted to the executor. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExecutionRequest {
    Wasm {
        module: String,
        target: String,
    },
    SystemLegacy {
        cmd: String,
    },
    SystemModern {
        tool: String,
        binary: String,
        args: Vec<String>,
        target: String,
        profile: String,
    },
}

/// Map a resolved tool onto its executor endpoint and request body.
pub fn build(tool: ResolvedTool) -> (ExecutorEndpoint, ExecutionRequest) {
    match tool {
        ResolvedTool::Wasm { module, target, .. } => (
            ExecutorEndpoint::RunWasm,
            ExecutionRequest::Wasm { module, target },
        ),
        ResolvedTool::SystemLegacy { cmd, .. } => (
            ExecutorEndpoint::RunSystem,
            ExecutionRequest::SystemLegacy { cmd },
        ),
        ResolvedTool::SystemModern {
            tool,
            binary,
            args,
            target,
            profile,
        } => (
            ExecutorEndpoint::RunSystem,
            ExecutionRequest::SystemModern {
                tool,
                binary,
                args,
                target,
                profile,
            },
        ),
    }
}
