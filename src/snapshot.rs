//! Per-version snapshots and the file-universe diff.

use std::collections::BTreeSet;

use crate::inputs::cluster_component::ComponentMapping;
use crate::inputs::named_clusters::{Module, NamedClustersIndex};

/// One version's full structural picture, built once and read-only after.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Human-facing version label (e.g. `"v1.49.0"`).
    pub version_label: String,
    /// Parsed NamedClusters index.
    pub named: NamedClustersIndex,
    /// Occurrence-resolved component mapping.
    pub comp: ComponentMapping,
    /// The full file universe.
    pub files: BTreeSet<String>,
}

impl Snapshot {
    /// Builds a snapshot from parsed inputs.
    #[must_use]
    pub fn build(version_label: &str, named: NamedClustersIndex, comp: ComponentMapping) -> Self {
        let files = named.files();
        Self { version_label: version_label.to_string(), named, comp, files }
    }

    /// The snapshot's modules, in document order.
    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.named.modules
    }

    /// The module owning `file`, if any.
    #[must_use]
    pub fn module_of_file(&self, file: &str) -> Option<&str> {
        self.named.file_to_module_uid.get(file).map(String::as_str)
    }

    /// The component owning module `uid`, if resolved.
    #[must_use]
    pub fn component_of_module(&self, uid: &str) -> Option<&str> {
        self.comp.component_of(uid)
    }
}

/// Set-difference view over two snapshots' file universes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileUniverseDiff {
    /// Files present only in B, sorted.
    pub added: Vec<String>,
    /// Files present only in A, sorted.
    pub removed: Vec<String>,
    /// Common files owned by different modules: (file, uid in A, uid in B).
    pub reassigned: Vec<(String, String, String)>,
}

/// Computes the file-universe diff between two snapshots.
#[must_use]
pub fn diff_file_universe(a: &Snapshot, b: &Snapshot) -> FileUniverseDiff {
    let added: Vec<String> = b.files.difference(&a.files).cloned().collect();
    let removed: Vec<String> = a.files.difference(&b.files).cloned().collect();

    let mut reassigned = Vec::new();
    for f in a.files.intersection(&b.files) {
        if let (Some(ma), Some(mb)) = (a.module_of_file(f), b.module_of_file(f)) {
            if ma != mb {
                reassigned.push((f.clone(), ma.to_string(), mb.to_string()));
            }
        }
    }
    FileUniverseDiff { added, removed, reassigned }
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Snapshot builders shared by generator and pipeline tests.

    use super::*;
    use crate::config::DiffConfig;
    use crate::inputs::named_clusters::parse_named_clusters_value;
    use serde_json::json;

    /// Builds a snapshot from `(module name, files)` pairs with no component
    /// mapping.
    pub fn snapshot(label: &str, modules: &[(&str, &[&str])]) -> Snapshot {
        snapshot_with_components(label, modules, &[])
    }

    /// Builds a snapshot and assigns components by module uid.
    pub fn snapshot_with_components(
        label: &str,
        modules: &[(&str, &[&str])],
        components: &[(&str, &str)],
    ) -> Snapshot {
        let structure: Vec<_> = modules
            .iter()
            .map(|(name, files)| {
                json!({
                    "@type": "group",
                    "name": name,
                    "nested": files
                        .iter()
                        .map(|f| json!({"@type": "item", "name": f}))
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        let named = parse_named_clusters_value(&json!({"structure": structure}), &DiffConfig::default())
            .expect("build named index");

        let mut comp = ComponentMapping::default();
        for (uid, component) in components {
            comp.module_uid_to_component.insert((*uid).to_string(), (*component).to_string());
            comp.component_to_module_uids
                .entry((*component).to_string())
                .or_default()
                .push((*uid).to_string());
        }
        Snapshot::build(label, named, comp)
    }
}
