//! Per-tool definition files (`tool_definitions/<id>.json` or `.toml`).
//!
//! A definition names the binary, the sandbox profile chosen by its author,
//! and a set of named scans, each an ordered argument list.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanDef {
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Falls back to the file stem when omitted.
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub binary: String,
    pub profile: String,
    pub scans: BTreeMap<String, ScanDef>,
}

impl ToolDefinition {
    /// Exact, case-sensitive scan lookup.
    pub fn scan(&self, name: &str) -> Option<&ScanDef> {
        self.scans.get(name)
    }

    pub fn scan_names(&self) -> impl Iterator<Item = &str> {
        self.scans.keys().map(String::as_str)
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            bail!("definition has no id");
        }
        let binary = self.binary.trim();
        if binary.is_empty() || binary.chars().any(char::is_whitespace) {
            bail!("binary must be a single non-empty word (got {:?})", self.binary);
        }
        if self.profile.trim().is_empty() {
            bail!("profile must not be empty");
        }
        if self.scans.is_empty() {
            bail!("at least one scan must be defined");
        }
        if self.scans.keys().any(|name| name.trim().is_empty()) {
            bail!("scan names must not be empty");
        }
        Ok(())
    }
}

/// Modern definitions keyed by id.
///
/// Ids whose definition file failed to load are kept as broken: they still
/// shadow the legacy catalog but cannot be dispatched.
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    by_id: BTreeMap<String, ToolDefinition>,
    broken: BTreeMap<String, String>,
}

impl DefinitionSet {
    pub fn get(&self, id: &str) -> Option<&ToolDefinition> {
        self.by_id.get(id)
    }

    /// Why the definition for `id` is unusable, if its file was rejected.
    pub fn broken(&self, id: &str) -> Option<&str> {
        self.broken.get(id).map(String::as_str)
    }

    pub fn broken_ids(&self) -> impl Iterator<Item = &str> {
        self.broken.keys().map(String::as_str)
    }

    /// Record `id` as having a rejected definition file. The first reason wins.
    pub fn mark_broken(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        self.broken.entry(id.into()).or_insert_with(|| reason.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Insert a definition unless the id is already taken. Returns whether it was added.
    pub fn insert(&mut self, definition: ToolDefinition) -> bool {
        if self.by_id.contains_key(&definition.id) {
            return false;
        }
        self.by_id.insert(definition.id.clone(), definition);
        true
    }
}

impl FromIterator<ToolDefinition> for DefinitionSet {
    fn from_iter<I: IntoIterator<Item = ToolDefinition>>(iter: I) -> Self {
        let mut set = Self::default();
        for definition in iter {
            set.insert(definition);
        }
        set
    }
}

fn parse_definition_file(path: &Path) -> Result<ToolDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut definition: ToolDefinition = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content).context("invalid TOML definition")?,
        _ => serde_json::from_str(&content).context("invalid JSON definition")?,
    };
    if definition.id.trim().is_empty() {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            definition.id = stem.to_string();
        }
    }
    definition.validate()?;
    Ok(definition)
}

/// Best-effort id of a file that failed to load: its `id` field when the
/// document still parses, otherwise the file stem.
fn rejected_definition_id(path: &Path) -> Option<String> {
    let declared = std::fs::read_to_string(path).ok().and_then(|content| {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str::<toml::Table>(&content)
                .ok()
                .and_then(|table| table.get("id")?.as_str().map(str::to_string)),
            _ => serde_json::from_str::<serde_json::Value>(&content)
                .ok()
                .and_then(|value| value.get("id")?.as_str().map(str::to_string)),
        }
    });
    declared
        .filter(|id| !id.trim().is_empty())
        .or_else(|| path.file_stem()?.to_str().map(str::to_string))
}

fn is_definition_file(path: &Path) -> bool {
    path.is_file()
        && matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("json" | "toml")
        )
}

/// Load every definition file in `dir`, in file-name order.
///
/// Files that fail to parse or validate, and later files reusing an id, are
/// skipped; each skip is logged and returned as a problem line. A missing
/// directory is an empty set.
pub fn load_definitions(dir: &Path) -> Result<(DefinitionSet, Vec<String>)> {
    let mut set = DefinitionSet::default();
    let mut problems = Vec::new();

    if !dir.exists() {
        return Ok((set, problems));
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read definitions directory {}", dir.display()))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| is_definition_file(path))
        .collect();
    paths.sort();

    for path in paths {
        match parse_definition_file(&path) {
            Ok(definition) => {
                let id = definition.id.clone();
                if !set.insert(definition) {
                    let problem = format!(
                        "{}: duplicate tool id '{id}', keeping the first definition",
                        path.display()
                    );
                    tracing::warn!("skipping tool definition: {problem}");
                    problems.push(problem);
                }
            }
            Err(err) => {
                let problem = format!("{}: {err:#}", path.display());
                tracing::warn!("skipping tool definition: {problem}");
                problems.push(problem);
                if let Some(id) = rejected_definition_id(&path) {
                    let file = path.file_name().map_or_else(
                        || path.display().to_string(),
                        |name| name.to_string_lossy().into_owned(),
                    );
                    set.mark_broken(id, format!("definition file {file} failed to load"));
                }
            }
        }
    }

    Ok((set, problems))
}
