//! Grouped legacy catalog (`tools.json`): `{category: [entry, ...], ...}`.
//!
//! The raw document text is kept alongside the parsed entries so `/tools` can
//! serve it byte-for-byte.

use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// One entry of the legacy catalog.
///
/// `kind` is kept as a plain string so unrecognised types survive parsing and
/// can be reported at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegacyToolEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyCategory {
    pub name: String,
    pub tools: Vec<LegacyToolEntry>,
}

/// Categories in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Categories(Vec<LegacyCategory>);

impl<'de> Deserialize<'de> for Categories {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CategoriesVisitor;

        impl<'de> Visitor<'de> for CategoriesVisitor {
            type Value = Categories;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category name to a list of tools")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Categories, A::Error> {
                let mut categories = Vec::new();
                while let Some((name, tools)) = map.next_entry::<String, Vec<LegacyToolEntry>>()? {
                    categories.push(LegacyCategory { name, tools });
                }
                Ok(Categories(categories))
            }
        }

        deserializer.deserialize_map(CategoriesVisitor)
    }
}

#[derive(Debug, Clone)]
pub struct LegacyCatalog {
    raw: Arc<str>,
    categories: Vec<LegacyCategory>,
}

impl Default for LegacyCatalog {
    fn default() -> Self {
        Self {
            raw: Arc::from("{}"),
            categories: Vec::new(),
        }
    }
}

impl LegacyCatalog {
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw: String = raw.into();
        let Categories(categories) =
            serde_json::from_str(&raw).context("legacy catalog is not a valid tool listing")?;
        Ok(Self {
            raw: Arc::from(raw),
            categories,
        })
    }

    /// Read and parse the catalog. A missing file yields an empty catalog.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "legacy catalog not found; serving an empty listing"
            );
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read legacy catalog {}", path.display()))?;
        Self::parse(raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// The document exactly as it was read.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn categories(&self) -> &[LegacyCategory] {
        &self.categories
    }

    /// First entry with a matching id, searching categories in document order.
    pub fn find(&self, id: &str) -> Option<&LegacyToolEntry> {
        self.categories
            .iter()
            .flat_map(|category| category.tools.iter())
            .find(|tool| tool.id == id)
    }

    pub fn len(&self) -> usize {
        self.categories.iter().map(|c| c.tools.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids that appear more than once. Only the first occurrence is reachable.
    pub fn duplicate_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for tool in self.categories.iter().flat_map(|c| c.tools.iter()) {
            if !seen.insert(tool.id.as_str()) && !duplicates.contains(&tool.id) {
                duplicates.push(tool.id.clone());
            }
        }
        duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
  "Network": [
    {"id": "ping", "name": "Ping", "type": "system", "cmd": "ping -c 4 {TARGET}"},
    {"id": "dns", "name": "DNS Lookup", "type": "wasm", "module": "dns.wasm", "description": "Resolve a host"}
  ],
  "Archive": [
    {"id": "ping", "name": "Old Ping", "type": "system", "cmd": "ping {TARGET}"},
    {"id": "odd", "name": "Odd", "type": "docker"}
  ]
}"#;

    #[test]
    fn parse_keeps_document_order_and_raw_text() {
        let catalog = LegacyCatalog::parse(SAMPLE).unwrap();
        let names: Vec<&str> = catalog
            .categories()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["Network", "Archive"]);
        assert_eq!(catalog.raw(), SAMPLE);
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn find_returns_first_match_in_document_order() {
        let catalog = LegacyCatalog::parse(SAMPLE).unwrap();
        let ping = catalog.find("ping").unwrap();
        assert_eq!(ping.cmd.as_deref(), Some("ping -c 4 {TARGET}"));
        assert_eq!(catalog.duplicate_ids(), vec!["ping".to_string()]);
    }

    #[test]
    fn unknown_types_survive_parsing() {
        let catalog = LegacyCatalog::parse(SAMPLE).unwrap();
        let odd = catalog.find("odd").unwrap();
        assert_eq!(odd.kind, "docker");
        assert!(odd.module.is_none() && odd.cmd.is_none());
    }

    #[test]
    fn find_is_exact_match() {
        let catalog = LegacyCatalog::parse(SAMPLE).unwrap();
        assert!(catalog.find("PING").is_none());
        assert!(catalog.find("pin").is_none());
    }

    #[test]
    fn non_listing_documents_are_rejected() {
        assert!(LegacyCatalog::parse("[]").is_err());
        assert!(LegacyCatalog::parse(r#"{"Network": [{"name": "no id"}]}"#).is_err());
    }

    #[test]
    fn missing_file_loads_as_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = LegacyCatalog::load(&dir.path().join("tools.json")).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.raw(), "{}");
    }
}
