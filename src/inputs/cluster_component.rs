//! ClusterComponent document parser.
//!
//! Components reference clusters by display name only. Names are resolved to
//! module uids by consuming, in document order, the per-name uid queues built
//! while parsing NamedClusters: the first unconsumed occurrence wins.
//! Resolution works on a copy of the caller's queues, so it is a pure
//! function of (document, queue snapshot). Unresolvable or already-claimed
//! references are recorded, never silently discarded.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

use serde_json::Value;

use crate::config::DiffConfig;

/// A cluster reference that could not be resolved to a module uid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedClusterRef {
    /// Component that referenced the cluster.
    pub component: String,
    /// The cluster display name as written in the document.
    pub cluster_name: String,
    /// Why resolution failed.
    pub reason: String,
}

/// Occurrence-resolved module→component mapping for one version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentMapping {
    /// Module uid to owning component name.
    pub module_uid_to_component: BTreeMap<String, String>,
    /// Component name to member module uids, in document order.
    pub component_to_module_uids: BTreeMap<String, Vec<String>>,
    /// References that failed to resolve.
    pub unresolved: Vec<UnresolvedClusterRef>,
    /// Top-level `name` of the document, when present.
    pub raw_name: Option<String>,
    /// Top-level `@schemaVersion`, when present.
    pub schema_version: Option<String>,
}

impl ComponentMapping {
    /// The component owning `uid`, if resolved.
    #[must_use]
    pub fn component_of(&self, uid: &str) -> Option<&str> {
        self.module_uid_to_component.get(uid).map(String::as_str)
    }
}

/// Parses a ClusterComponent document from a file.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, not JSON, or lacks a
/// top-level `structure` array.
pub fn parse_cluster_component(
    path: &Path,
    name_to_uids: &BTreeMap<String, VecDeque<String>>,
    cfg: &DiffConfig,
) -> Result<ComponentMapping, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read ClusterComponent {}: {e}", path.display()))?;
    let data: Value = serde_json::from_str(&text)
        .map_err(|e| format!("Failed to parse ClusterComponent {}: {e}", path.display()))?;
    parse_cluster_component_value(&data, name_to_uids, cfg)
        .map_err(|e| format!("Invalid ClusterComponent {}: {e}", path.display()))
}

/// Parses a ClusterComponent document from an already-loaded JSON value.
///
/// # Errors
///
/// Returns an error if the top-level `structure` field is not an array.
pub fn parse_cluster_component_value(
    data: &Value,
    name_to_uids: &BTreeMap<String, VecDeque<String>>,
    cfg: &DiffConfig,
) -> Result<ComponentMapping, String> {
    let structure = data
        .get("structure")
        .and_then(Value::as_array)
        .ok_or_else(|| "top-level 'structure' must be a list".to_string())?;

    // Resolution consumes a private copy; the caller's queues stay intact.
    let mut queues: BTreeMap<String, VecDeque<String>> = if cfg.enable_occurrence_disambiguation {
        name_to_uids.clone()
    } else {
        BTreeMap::new()
    };

    let mut module_uid_to_component: BTreeMap<String, String> = BTreeMap::new();
    let mut component_to_module_uids: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut unresolved: Vec<UnresolvedClusterRef> = Vec::new();

    for comp_node in structure {
        if comp_node.get("@type").and_then(Value::as_str) != Some("component") {
            continue;
        }
        let comp_name = comp_node
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();

        let Some(nested) = comp_node.get("nested").and_then(Value::as_array) else {
            continue;
        };

        for cl in nested {
            if cl.get("@type").and_then(Value::as_str) != Some("cluster") {
                continue;
            }
            let Some(cluster_name) = cl.get("name").and_then(Value::as_str) else {
                continue;
            };
            let cluster_name = cluster_name.trim().to_string();

            let module_uid = if cfg.enable_occurrence_disambiguation {
                match queues.get_mut(&cluster_name).and_then(VecDeque::pop_front) {
                    Some(uid) => uid,
                    None => {
                        unresolved.push(UnresolvedClusterRef {
                            component: comp_name.clone(),
                            cluster_name,
                            reason: "No remaining occurrence in NamedClusters queue for this cluster name.".to_string(),
                        });
                        continue;
                    }
                }
            } else {
                // No disambiguation: the raw name stands in for the uid.
                cluster_name.clone()
            };

            if let Some(existing) = module_uid_to_component.get(&module_uid) {
                if existing != &comp_name {
                    unresolved.push(UnresolvedClusterRef {
                        component: comp_name.clone(),
                        cluster_name,
                        reason: format!("Module UID {module_uid} already mapped to {existing}."),
                    });
                    continue;
                }
            }

            module_uid_to_component.insert(module_uid.clone(), comp_name.clone());
            component_to_module_uids.entry(comp_name.clone()).or_default().push(module_uid);
        }
    }

    Ok(ComponentMapping {
        module_uid_to_component,
        component_to_module_uids,
        unresolved,
        raw_name: data.get("name").and_then(Value::as_str).map(String::from),
        schema_version: data.get("@schemaVersion").and_then(Value::as_str).map(String::from),
    })
}
