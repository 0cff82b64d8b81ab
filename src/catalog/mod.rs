//! Tool catalog: the legacy grouped listing plus per-tool definitions, held as
//! an immutable snapshot that is swapped wholesale on reload.

pub mod definition;
pub mod legacy;

pub use definition::{load_definitions, DefinitionSet, ScanDef, ToolDefinition};
pub use legacy::{LegacyCatalog, LegacyCategory, LegacyToolEntry};

use crate::config::{CatalogConfig, Config};
use crate::dispatch::{self, ToolRequest};
use crate::ToolCommands;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Everything the resolver reads, loaded at one point in time.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub legacy: LegacyCatalog,
    pub definitions: DefinitionSet,
    /// Definition files that were skipped, and duplicate legacy ids.
    pub problems: Vec<String>,
    pub loaded_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    pub fn new(legacy: LegacyCatalog, definitions: DefinitionSet) -> Self {
        Self {
            legacy,
            definitions,
            problems: Vec::new(),
            loaded_at: Utc::now(),
        }
    }

    pub fn load(config: &CatalogConfig) -> Result<Self> {
        let legacy = LegacyCatalog::load(&config.legacy_path)?;
        let (definitions, mut problems) = load_definitions(&config.definitions_dir)?;

        for id in legacy.duplicate_ids() {
            let problem = format!(
                "{}: legacy id '{id}' appears more than once; only the first entry is used",
                config.legacy_path.display()
            );
            tracing::warn!("{problem}");
            problems.push(problem);
        }

        let shadowed = definitions
            .iter()
            .map(|definition| definition.id.as_str())
            .chain(definitions.broken_ids())
            .filter(|id| legacy.find(id).is_some())
            .count();

        tracing::info!(
            legacy_tools = legacy.len(),
            definitions = definitions.len(),
            shadowed_legacy = shadowed,
            skipped = problems.len(),
            "Tool catalog loaded"
        );

        Ok(Self {
            legacy,
            definitions,
            problems,
            loaded_at: Utc::now(),
        })
    }
}

/// Process-wide handle to the current snapshot.
///
/// Readers take an `Arc` and keep using it for the rest of their request;
/// `reload` replaces the pointer only after a complete, successful load.
#[derive(Debug)]
pub struct CatalogStore {
    config: CatalogConfig,
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl CatalogStore {
    pub fn open(config: &CatalogConfig) -> Result<Self> {
        let snapshot = CatalogSnapshot::load(config).context("Failed to load tool catalog")?;
        Ok(Self {
            config: config.clone(),
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Store over a prebuilt snapshot; `reload` re-reads `config`.
    pub fn with_snapshot(config: CatalogConfig, snapshot: CatalogSnapshot) -> Self {
        Self {
            config,
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Re-read the catalog. On failure the previous snapshot stays active.
    pub fn reload(&self) -> Result<Arc<CatalogSnapshot>> {
        let snapshot = Arc::new(CatalogSnapshot::load(&self.config)?);
        *self.current.write() = Arc::clone(&snapshot);
        Ok(snapshot)
    }
}

/// Handle `toolgate tools ...` subcommands.
pub fn handle_command(command: ToolCommands, config: &Config) -> Result<()> {
    let snapshot = CatalogSnapshot::load(&config.catalog)?;

    match command {
        ToolCommands::List => {
            println!("Legacy catalog ({}):", config.catalog.legacy_path.display());
            if snapshot.legacy.is_empty() {
                println!("  (empty)");
            }
            for category in snapshot.legacy.categories() {
                println!("  {}", category.name);
                for tool in &category.tools {
                    let shadowed = if snapshot.definitions.get(&tool.id).is_some() {
                        "  [superseded by definition]"
                    } else if snapshot.definitions.broken(&tool.id).is_some() {
                        "  [blocked by broken definition]"
                    } else {
                        ""
                    };
                    println!("    {:<20} {:<8}{shadowed}", tool.id, tool.kind);
                }
            }
            println!();
            println!(
                "Tool definitions ({}):",
                config.catalog.definitions_dir.display()
            );
            if snapshot.definitions.is_empty() {
                println!("  (none)");
            }
            for definition in snapshot.definitions.iter() {
                let scans: Vec<&str> = definition.scan_names().collect();
                println!(
                    "    {:<20} {} (profile {}) scans: {}",
                    definition.id,
                    definition.binary,
                    definition.profile,
                    scans.join(", ")
                );
            }
            for id in snapshot.definitions.broken_ids() {
                println!("    {id:<20} (broken; run `toolgate tools check`)");
            }
            Ok(())
        }
        ToolCommands::Check => {
            if snapshot.problems.is_empty() {
                println!(
                    "✅ {} legacy tools, {} definitions, no problems",
                    snapshot.legacy.len(),
                    snapshot.definitions.len()
                );
                return Ok(());
            }
            for problem in &snapshot.problems {
                println!("❌ {problem}");
            }
            anyhow::bail!("{} catalog problem(s) found", snapshot.problems.len())
        }
        ToolCommands::Resolve { tool, target, scan } => {
            let request = ToolRequest { tool, target, scan };
            let resolved = dispatch::resolve(&snapshot, &request)?;
            let (endpoint, payload) = dispatch::build(resolved);
            println!("POST {}", endpoint.path());
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
    }
}
