//! NamedClusters document parser.
//!
//! A NamedClusters document lists groups (modules) with nested item leaves
//! giving file paths. Parsing assigns each module a uid of `name#occurrence`
//! where the occurrence index is first-seen order per display name, builds
//! the file→module map (first writer wins), and records the per-name uid
//! queues later consumed during component resolution.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

use serde_json::Value;

use crate::config::DiffConfig;

/// A named, versioned cluster of source files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Identity: `name#occurrence`, unique within one snapshot.
    pub uid: String,
    /// Display name (may repeat within a snapshot).
    pub name: String,
    /// 1-based first-seen occurrence index of `name`.
    pub occurrence: usize,
    /// Normalized file paths.
    pub files: BTreeSet<String>,
    /// `files.len()`, kept for cheap access in event detail.
    pub file_count: usize,
}

/// Parsed NamedClusters document for one version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedClustersIndex {
    /// Modules in document order.
    pub modules: Vec<Module>,
    /// File to owning module uid; first assignment wins.
    pub file_to_module_uid: BTreeMap<String, String>,
    /// Per-name FIFO of uids, in document order, for occurrence
    /// disambiguation during component resolution.
    pub name_to_uids: BTreeMap<String, VecDeque<String>>,
    /// Display names occurring more than once.
    pub duplicate_module_names: Vec<String>,
    /// Uids of modules with zero files.
    pub empty_modules: Vec<String>,
    /// Top-level `name` of the document, when present.
    pub raw_name: Option<String>,
    /// Top-level `@schemaVersion`, when present.
    pub schema_version: Option<String>,
}

impl NamedClustersIndex {
    /// Looks up a module by uid.
    #[must_use]
    pub fn module(&self, uid: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.uid == uid)
    }

    /// The full file universe of this version.
    #[must_use]
    pub fn files(&self) -> BTreeSet<String> {
        self.file_to_module_uid.keys().cloned().collect()
    }
}

/// Canonicalizes a file path: separators, traversal prefixes, duplicate
/// slashes.
#[must_use]
pub fn normalize_path(raw: &str, cfg: &DiffConfig) -> String {
    let mut s = raw.trim().to_string();
    if cfg.normalize_path_separators {
        s = s.replace('\\', "/");
    }
    while let Some(stripped) = s.strip_prefix("./") {
        s = stripped.to_string();
    }
    while s.contains("//") {
        s = s.replace("//", "/");
    }
    s
}

/// Parses a NamedClusters document from a file.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, not JSON, or lacks a
/// top-level `structure` array.
pub fn parse_named_clusters(path: &Path, cfg: &DiffConfig) -> Result<NamedClustersIndex, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read NamedClusters {}: {e}", path.display()))?;
    let data: Value = serde_json::from_str(&text)
        .map_err(|e| format!("Failed to parse NamedClusters {}: {e}", path.display()))?;
    parse_named_clusters_value(&data, cfg)
        .map_err(|e| format!("Invalid NamedClusters {}: {e}", path.display()))
}

/// Parses a NamedClusters document from an already-loaded JSON value.
///
/// # Errors
///
/// Returns an error if the top-level `structure` field is not an array.
pub fn parse_named_clusters_value(
    data: &Value,
    cfg: &DiffConfig,
) -> Result<NamedClustersIndex, String> {
    let structure = data
        .get("structure")
        .and_then(Value::as_array)
        .ok_or_else(|| "top-level 'structure' must be a list".to_string())?;

    let mut occurrence_counter: BTreeMap<String, usize> = BTreeMap::new();
    let mut modules: Vec<Module> = Vec::new();
    let mut file_to_module_uid: BTreeMap<String, String> = BTreeMap::new();

    for node in structure {
        if node.get("@type").and_then(Value::as_str) != Some("group") {
            continue;
        }
        let name = node
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();

        let occ = occurrence_counter.entry(name.clone()).or_insert(0);
        *occ += 1;
        let occurrence = *occ;
        let uid = format!("{name}#{occurrence}");

        let mut files: BTreeSet<String> = BTreeSet::new();
        if let Some(nested) = node.get("nested").and_then(Value::as_array) {
            for item in nested {
                if item.get("@type").and_then(Value::as_str) != Some("item") {
                    continue;
                }
                if let Some(f) = item.get("name").and_then(Value::as_str) {
                    let nf = normalize_path(f, cfg);
                    if !nf.is_empty() {
                        files.insert(nf);
                    }
                }
            }
        }

        // First writer wins; a later module claiming the same file is a
        // latent data-quality issue, not an error.
        for f in &files {
            file_to_module_uid.entry(f.clone()).or_insert_with(|| uid.clone());
        }

        let file_count = files.len();
        modules.push(Module { uid, name, occurrence, files, file_count });
    }

    let mut name_to_uids: BTreeMap<String, VecDeque<String>> = BTreeMap::new();
    for m in &modules {
        name_to_uids.entry(m.name.clone()).or_default().push_back(m.uid.clone());
    }

    let duplicate_module_names: Vec<String> = occurrence_counter
        .iter()
        .filter(|(_, c)| **c > 1)
        .map(|(n, _)| n.clone())
        .collect();
    let empty_modules: Vec<String> =
        modules.iter().filter(|m| m.file_count == 0).map(|m| m.uid.clone()).collect();

    Ok(NamedClustersIndex {
        modules,
        file_to_module_uid,
        name_to_uids,
        duplicate_module_names,
        empty_modules,
        raw_name: data.get("name").and_then(Value::as_str).map(String::from),
        schema_version: data.get("@schemaVersion").and_then(Value::as_str).map(String::from),
    })
}

/// Strips the `#occurrence` suffix from a module uid.
#[must_use]
pub fn base_name(uid: &str) -> &str {
    uid.split_once('#').map_or(uid, |(name, _)| name)
}
