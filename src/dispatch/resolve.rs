use super::{DispatchError, ToolRequest};
use crate::catalog::{CatalogSnapshot, LegacyToolEntry, ToolDefinition};
use crate::security::{check_target, TargetUse};

/// The only placeholder substituted into legacy command templates.
pub const TARGET_PLACEHOLDER: &str = "{TARGET}";

/// A tool request after lookup and validation, ready to be turned into an
/// executor payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTool {
    /// Legacy WASM module.
    Wasm {
        tool: String,
        module: String,
        target: String,
    },
    /// Legacy shell template with the target already substituted.
    SystemLegacy { tool: String, cmd: String },
    /// Per-tool definition: binary + scan args, target kept separate.
    SystemModern {
        tool: String,
        binary: String,
        args: Vec<String>,
        target: String,
        profile: String,
    },
}

impl ResolvedTool {
    pub fn tool_id(&self) -> &str {
        match self {
            Self::Wasm { tool, .. }
            | Self::SystemLegacy { tool, .. }
            | Self::SystemModern { tool, .. } => tool,
        }
    }

    pub fn transport(&self) -> &'static str {
        match self {
            Self::Wasm { .. } => "wasm",
            Self::SystemLegacy { .. } => "system-legacy",
            Self::SystemModern { .. } => "system",
        }
    }
}

/// Resolve a request against the snapshot.
///
/// A per-tool definition always wins; the legacy catalog is only consulted
/// when no definition file exists for the id. A definition file that failed
/// to load still claims its id, so the request is rejected instead of falling
/// back to the legacy shell template.
pub fn resolve(
    snapshot: &CatalogSnapshot,
    request: &ToolRequest,
) -> Result<ResolvedTool, DispatchError> {
    if let Some(definition) = snapshot.definitions.get(&request.tool) {
        return resolve_modern(definition, request);
    }
    if let Some(reason) = snapshot.definitions.broken(&request.tool) {
        return Err(DispatchError::MalformedDefinition {
            tool: request.tool.clone(),
            reason: reason.to_string(),
        });
    }

    let entry = snapshot
        .legacy
        .find(&request.tool)
        .ok_or_else(|| DispatchError::UnknownTool(request.tool.clone()))?;
    resolve_legacy(entry, &request.target)
}

fn resolve_modern(
    definition: &ToolDefinition,
    request: &ToolRequest,
) -> Result<ResolvedTool, DispatchError> {
    let scan = request
        .scan
        .as_deref()
        .and_then(|name| definition.scan(name))
        .ok_or_else(|| DispatchError::InvalidScan {
            tool: definition.id.clone(),
            scan: request.scan.clone(),
            available: definition.scan_names().map(str::to_string).collect(),
        })?;

    check_target(&request.target, TargetUse::Argument).map_err(DispatchError::InvalidTarget)?;

    Ok(ResolvedTool::SystemModern {
        tool: definition.id.clone(),
        binary: definition.binary.clone(),
        args: scan.args.clone(),
        target: request.target.clone(),
        profile: definition.profile.clone(),
    })
}

fn resolve_legacy(entry: &LegacyToolEntry, target: &str) -> Result<ResolvedTool, DispatchError> {
    let malformed = |reason: &str| DispatchError::MalformedDefinition {
        tool: entry.id.clone(),
        reason: reason.to_string(),
    };

    match entry.kind.as_str() {
        "wasm" => {
            let module = match (&entry.module, &entry.cmd) {
                (Some(module), None) if !module.trim().is_empty() => module,
                (_, Some(_)) => return Err(malformed("wasm tools must not define 'cmd'")),
                _ => return Err(malformed("wasm tools must define 'module'")),
            };
            check_target(target, TargetUse::ModuleInput).map_err(DispatchError::InvalidTarget)?;
            Ok(ResolvedTool::Wasm {
                tool: entry.id.clone(),
                module: module.clone(),
                target: target.to_string(),
            })
        }
        "system" => {
            let template = match (&entry.cmd, &entry.module) {
                (Some(cmd), None) if !cmd.trim().is_empty() => cmd,
                (_, Some(_)) => return Err(malformed("system tools must not define 'module'")),
                _ => return Err(malformed("system tools must define 'cmd'")),
            };
            check_target(target, TargetUse::ShellTemplate).map_err(DispatchError::InvalidTarget)?;
            if !template.contains(TARGET_PLACEHOLDER) {
                tracing::debug!(
                    tool = %entry.id,
                    "command template has no {TARGET_PLACEHOLDER} placeholder"
                );
            }
            Ok(ResolvedTool::SystemLegacy {
                tool: entry.id.clone(),
                cmd: template.replace(TARGET_PLACEHOLDER, target),
            })
        }
        other => Err(DispatchError::UnsupportedToolType {
            tool: entry.id.clone(),
            kind: other.to_string(),
        }),
    }
}
