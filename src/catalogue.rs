//! Picon pack catalogue
//!
//! The catalogue is a JSON list of pack entries. Entries are grouped by their
//! category into an ordered mapping; "Satellite" always comes first and the
//! rest follow alphabetically. Entries keep their file order inside a group.

use crate::error::{InstallError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Category assigned to entries that do not name one
pub const DEFAULT_CATEGORY: &str = "Satellite";

/// Category shown when the catalogue could not be loaded
pub const ERROR_CATEGORY: &str = "Error";

/// Satellite positions covered by a pack, as written in the catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Satellites {
    List(Vec<String>),
    Single(String),
}

impl Satellites {
    fn is_empty(&self) -> bool {
        match self {
            Self::List(items) => items.is_empty(),
            Self::Single(s) => s.trim().is_empty(),
        }
    }

    fn joined(&self) -> String {
        match self {
            Self::List(items) => items.join(", "),
            Self::Single(s) => s.clone(),
        }
    }
}

/// One installable picon pack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogueEntry {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satellites: Option<Satellites>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

impl CatalogueEntry {
    /// Text shown next to the preview: name plus covered satellites
    pub fn description(&self) -> String {
        let mut text = self.name.clone();
        if let Some(sats) = self.satellites.as_ref().filter(|s| !s.is_empty()) {
            text.push_str("\nSat: ");
            text.push_str(&sats.joined());
        }
        text
    }

    /// Non-empty archive URL, if any
    pub fn archive_url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

/// Entries grouped by category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalogue {
    groups: Vec<(String, Vec<CatalogueEntry>)>,
}

impl Catalogue {
    /// Group entries by category, keeping file order within each group
    pub fn from_entries(entries: Vec<CatalogueEntry>) -> Self {
        let mut groups: Vec<(String, Vec<CatalogueEntry>)> = Vec::new();
        for entry in entries {
            match groups.iter_mut().find(|(name, _)| *name == entry.category) {
                Some((_, bucket)) => bucket.push(entry),
                None => groups.push((entry.category.clone(), vec![entry])),
            }
        }

        groups.sort_by(|(a, _), (b, _)| {
            let a_first = a == DEFAULT_CATEGORY;
            let b_first = b == DEFAULT_CATEGORY;
            b_first.cmp(&a_first).then_with(|| a.cmp(b))
        });

        Self { groups }
    }

    /// Parse catalogue JSON text
    pub fn parse(json: &str) -> Result<Self> {
        let entries: Vec<CatalogueEntry> = serde_json::from_str(json)
            .map_err(|e| InstallError::catalogue(format!("invalid catalogue JSON: {}", e)))?;
        Ok(Self::from_entries(entries))
    }

    /// Load the catalogue from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            InstallError::catalogue(format!("cannot read {}: {}", path.display(), e))
        })?;
        let catalogue = Self::parse(&content)?;
        debug!(
            "Loaded catalogue {} with {} categories",
            path.display(),
            catalogue.category_count()
        );
        Ok(catalogue)
    }

    /// Load the catalogue, degrading to a single empty "Error" category
    pub fn load_or_degraded(path: &Path) -> Self {
        match Self::load(path) {
            Ok(catalogue) => catalogue,
            Err(e) => {
                warn!("Catalogue unavailable, showing error category: {}", e);
                Self::degraded()
            }
        }
    }

    pub fn degraded() -> Self {
        Self {
            groups: vec![(ERROR_CATEGORY.to_string(), Vec::new())],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn category_count(&self) -> usize {
        self.groups.len()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(name, _)| name.as_str())
    }

    pub fn category_name(&self, idx: usize) -> Option<&str> {
        self.groups.get(idx).map(|(name, _)| name.as_str())
    }

    /// Entries of the category at `idx` (empty when out of range)
    pub fn entries(&self, idx: usize) -> &[CatalogueEntry] {
        self.groups
            .get(idx)
            .map(|(_, entries)| entries.as_slice())
            .unwrap_or(&[])
    }

    pub fn entry(&self, category_idx: usize, entry_idx: usize) -> Option<&CatalogueEntry> {
        self.entries(category_idx).get(entry_idx)
    }

    /// Find an entry by exact name across all categories
    pub fn find(&self, name: &str) -> Option<&CatalogueEntry> {
        self.groups
            .iter()
            .flat_map(|(_, entries)| entries.iter())
            .find(|e| e.name == name)
    }

    pub fn total_entries(&self) -> usize {
        self.groups.iter().map(|(_, entries)| entries.len()).sum()
    }

    /// Label for the "next category" button; empty with one category or none
    pub fn next_category_label(&self, current: usize) -> String {
        if self.groups.len() <= 1 {
            return String::new();
        }
        let next = (current + 1) % self.groups.len();
        match self.category_name(next) {
            Some(DEFAULT_CATEGORY) => "SAT".to_string(),
            Some(name) => name.to_string(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, category: Option<&str>) -> CatalogueEntry {
        CatalogueEntry {
            name: name.to_string(),
            category: category.unwrap_or(DEFAULT_CATEGORY).to_string(),
            preview: String::new(),
            url: Some(format!("https://example.org/{}.tar.xz", name)),
            satellites: None,
        }
    }

    #[test]
    fn test_satellite_first_then_alphabetical() {
        let catalogue = Catalogue::from_entries(vec![
            entry("iptv-a", Some("IPTV")),
            entry("astra", None),
            entry("cable", Some("Cable")),
        ]);
        let names: Vec<&str> = catalogue.categories().collect();
        assert_eq!(names, vec!["Satellite", "Cable", "IPTV"]);
    }

    #[test]
    fn test_entries_keep_file_order() {
        let catalogue = Catalogue::from_entries(vec![
            entry("zeta", None),
            entry("alpha", None),
            entry("mid", None),
        ]);
        let names: Vec<&str> = catalogue.entries(0).iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_missing_category_defaults_to_satellite() {
        let catalogue =
            Catalogue::parse(r#"[{"name": "Hotbird 13E", "preview": "", "url": "x.ipk"}]"#)
                .unwrap();
        assert_eq!(catalogue.category_name(0), Some(DEFAULT_CATEGORY));
    }

    #[test]
    fn test_satellites_accepts_string_or_list() {
        let catalogue = Catalogue::parse(
            r#"[
                {"name": "a", "preview": "", "url": "a.ipk", "satellites": ["19.2E", "13.0E"]},
                {"name": "b", "preview": "", "url": "b.ipk", "satellites": "28.2E"}
            ]"#,
        )
        .unwrap();
        assert_eq!(catalogue.entry(0, 0).unwrap().description(), "a\nSat: 19.2E, 13.0E");
        assert_eq!(catalogue.entry(0, 1).unwrap().description(), "b\nSat: 28.2E");
    }

    #[test]
    fn test_description_without_satellites_is_name() {
        assert_eq!(entry("plain", None).description(), "plain");
    }

    #[test]
    fn test_malformed_json_is_catalogue_error() {
        let err = Catalogue::parse("{not json").unwrap_err();
        assert!(matches!(err, InstallError::CatalogueLoad(_)));
    }

    #[test]
    fn test_missing_file_degrades() {
        let catalogue = Catalogue::load_or_degraded(Path::new("/nonexistent/picons.json"));
        assert_eq!(catalogue.category_count(), 1);
        assert_eq!(catalogue.category_name(0), Some(ERROR_CATEGORY));
        assert!(catalogue.entries(0).is_empty());
    }

    #[test]
    fn test_next_category_label() {
        let catalogue = Catalogue::from_entries(vec![
            entry("astra", None),
            entry("iptv", Some("IPTV")),
        ]);
        assert_eq!(catalogue.next_category_label(0), "IPTV");
        assert_eq!(catalogue.next_category_label(1), "SAT");

        let single = Catalogue::from_entries(vec![entry("astra", None)]);
        assert_eq!(single.next_category_label(0), "");
    }

    #[test]
    fn test_blank_url_is_none() {
        let mut e = entry("x", None);
        e.url = Some("   ".into());
        assert!(e.archive_url().is_none());
    }
}
