//! Diff intermediate representation.
//!
//! The IR is the sole contract with downstream report renderers: a `meta` /
//! `quality` / `entities` / `changes` document where every factual claim can
//! be traced back to a change event by its `CHG-XXXX` id.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::denoise::DenoiseStats;

/// Fixed vocabulary of change event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// Module present in B but unmatched from A.
    ModuleAdded,
    /// Module present in A but unmatched in B.
    ModuleRemoved,
    /// Matched module pair whose file sets differ.
    ModuleChanged,
    /// Matched module pair whose base names differ.
    ModuleRenamed,
    /// One A-module covered by several B-modules.
    ModuleSplit,
    /// Several A-modules covered by one B-module.
    ModuleMerge,
    /// Matched module pair assigned to different components.
    ModuleComponentChanged,
    /// Legacy: same uid in both versions, component differs.
    ModuleMovedBetweenComponents,
    /// File present only in B.
    FileAdded,
    /// File present only in A.
    FileRemoved,
    /// File owned by different modules in A and B.
    FileReassigned,
    /// Version-pair-level reliability caveat.
    QualityWarning,
}

impl ChangeType {
    /// Snake-case wire label, as used in the IR JSON.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ModuleAdded => "module_added",
            Self::ModuleRemoved => "module_removed",
            Self::ModuleChanged => "module_changed",
            Self::ModuleRenamed => "module_renamed",
            Self::ModuleSplit => "module_split",
            Self::ModuleMerge => "module_merge",
            Self::ModuleComponentChanged => "module_component_changed",
            Self::ModuleMovedBetweenComponents => "module_moved_between_components",
            Self::FileAdded => "file_added",
            Self::FileRemoved => "file_removed",
            Self::FileReassigned => "file_reassigned",
            Self::QualityWarning => "quality_warning",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provenance record attached to a change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Source kind, e.g. `"NamedClusters"`, `"ClusterComponent"`, `"Derived"`.
    pub kind: String,
    /// Reference, e.g. `"module:libuv#1"` or `"file:src/uv-common.c"`.
    #[serde(rename = "ref")]
    pub reference: String,
    /// Short free-text note.
    #[serde(default)]
    pub note: String,
}

impl EvidenceItem {
    /// Builds an evidence record.
    #[must_use]
    pub fn new(kind: &str, reference: String, note: &str) -> Self {
        Self { kind: kind.to_string(), reference, note: note.to_string() }
    }
}

/// Aggregate file-delta counts for a `module_changed` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeCounts {
    /// Files present only in the target module.
    pub added_files: usize,
    /// Files present only in the source module.
    pub removed_files: usize,
    /// Files present on both sides.
    pub retained_files: usize,
    /// Source module size.
    pub file_count_a: usize,
    /// Target module size.
    pub file_count_b: usize,
    /// `added_files + removed_files`.
    pub delta: usize,
    /// `delta / |union|`, rounded to 6 digits.
    pub delta_ratio: f64,
}

/// Bounded path samples shown as evidence for a `module_changed` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileExamples {
    /// Top-K added file paths.
    pub added_files_top: Vec<String>,
    /// Top-K removed file paths.
    pub removed_files_top: Vec<String>,
}

/// A file path paired with its semantic description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescription {
    /// Normalized file path.
    pub path: String,
    /// Free-text description from the CodeSem document.
    pub desc: String,
}

/// Per-file semantic enrichment for a `module_changed` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSemantics {
    /// Descriptions for sampled added files.
    pub added_files: Vec<FileDescription>,
    /// Descriptions for sampled removed files.
    pub removed_files: Vec<FileDescription>,
}

/// Component-level semantic context for a `module_changed` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchContext {
    /// Source component name, when resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_component: Option<String>,
    /// Target component name, when resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_component: Option<String>,
    /// Source component summary from the ArchSem document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_component_summary: Option<String>,
    /// Target component summary from the ArchSem document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_component_summary: Option<String>,
    /// Leading architectural patterns of version A.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns_a_top: Vec<String>,
    /// Leading architectural patterns of version B.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns_b_top: Vec<String>,
}

/// Semantic enrichment attached to a `module_changed` event.
///
/// Absent semantic inputs degrade this to empty structures; nothing else in
/// the pipeline depends on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticContext {
    /// File-level descriptions.
    pub code: CodeSemantics,
    /// Component-level context.
    pub arch: ArchContext,
}

/// One qualifying overlap candidate inside a split/merge event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapEntry {
    /// The candidate module on the other side.
    pub module_uid: String,
    /// Containment overlap with the pivot module, rounded to 4 digits.
    pub overlap: f64,
    /// Intersection size in files.
    pub intersect_files: usize,
}

/// Type-specific structured payload of a change event.
///
/// The variant is fixed by the event's [`ChangeType`]; constructors in the
/// generator modules uphold that pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeDetail {
    /// Payload for `module_added` / `module_removed`.
    ModuleLifecycle {
        /// The unmatched module.
        module_uid: String,
        /// Its base display name.
        module_name: String,
        /// Its size in files.
        file_count: usize,
        /// Composite importance score, attached by the significance scorer.
        #[serde(skip_serializing_if = "Option::is_none")]
        architecture_significance: Option<f64>,
    },
    /// Payload for `module_changed`.
    ModuleChanged {
        /// Source module uid.
        from_module_uid: String,
        /// Target module uid.
        to_module_uid: String,
        /// Source base name.
        from_name: String,
        /// Target base name.
        to_name: String,
        /// Mapping weight, rounded to 6 digits.
        jaccard: f64,
        /// Aggregate delta counts.
        counts: ChangeCounts,
        /// Bounded path samples.
        examples: FileExamples,
        /// Opportunistic semantic enrichment.
        semantics: SemanticContext,
        /// Composite importance score, attached by the significance scorer.
        #[serde(skip_serializing_if = "Option::is_none")]
        architecture_significance: Option<f64>,
    },
    /// Payload for `module_renamed` (both passes).
    ModuleRenamed {
        /// Source module uid.
        from_module_uid: String,
        /// Target module uid.
        to_module_uid: String,
        /// Source base name.
        from_name: String,
        /// Target base name.
        to_name: String,
        /// Mapping weight, rounded to 6 digits.
        jaccard: f64,
        /// Containment overlap (overlap-driven pass only).
        #[serde(skip_serializing_if = "Option::is_none")]
        overlap: Option<f64>,
        /// Intersection size (overlap-driven pass only).
        #[serde(skip_serializing_if = "Option::is_none")]
        intersect_files: Option<usize>,
    },
    /// Payload for `module_component_changed`.
    ComponentChanged {
        /// Source module uid.
        from_module_uid: String,
        /// Target module uid.
        to_module_uid: String,
        /// Component owning the source module.
        from_component: String,
        /// Component owning the target module.
        to_component: String,
        /// Mapping weight, rounded to 6 digits.
        jaccard: f64,
        /// Composite importance score, attached by the significance scorer.
        #[serde(skip_serializing_if = "Option::is_none")]
        architecture_significance: Option<f64>,
    },
    /// Payload for `module_split`.
    ModuleSplit {
        /// The source module that was split.
        from_module_uid: String,
        /// Target modules covering it.
        to_module_uids: Vec<String>,
        /// Fraction of source files covered by the target union.
        coverage: f64,
        /// Per-target overlap records.
        overlaps: Vec<OverlapEntry>,
    },
    /// Payload for `module_merge`.
    ModuleMerge {
        /// Source modules absorbed into the target.
        from_module_uids: Vec<String>,
        /// The target module.
        to_module_uid: String,
        /// Fraction of target files covered by the source union.
        coverage: f64,
        /// Per-source overlap records.
        overlaps: Vec<OverlapEntry>,
    },
    /// Payload for the legacy `module_moved_between_components`.
    ComponentMoved {
        /// The module (same uid in both versions).
        module_uid: String,
        /// Component in version A.
        from_component: String,
        /// Component in version B.
        to_component: String,
    },
    /// Payload for `file_reassigned`.
    FileReassigned {
        /// The reassigned file.
        file: String,
        /// Owning module in version A.
        from_module_uid: String,
        /// Owning module in version B.
        to_module_uid: String,
    },
    /// Payload for `file_added` / `file_removed`.
    File {
        /// The file path.
        file: String,
    },
    /// Payload for `quality_warning`.
    QualityWarning {
        /// The flag key this warning materializes.
        flag: String,
    },
}

impl ChangeDetail {
    /// The matched (from, to) module uids, for pair-keyed detail variants.
    #[must_use]
    pub fn pair_uids(&self) -> Option<(&str, &str)> {
        match self {
            Self::ModuleChanged { from_module_uid, to_module_uid, .. }
            | Self::ModuleRenamed { from_module_uid, to_module_uid, .. }
            | Self::ComponentChanged { from_module_uid, to_module_uid, .. } => {
                Some((from_module_uid, to_module_uid))
            }
            _ => None,
        }
    }

    /// The mapping jaccard carried by pair-keyed detail variants.
    #[must_use]
    pub fn jaccard(&self) -> Option<f64> {
        match self {
            Self::ModuleChanged { jaccard, .. }
            | Self::ModuleRenamed { jaccard, .. }
            | Self::ComponentChanged { jaccard, .. } => Some(*jaccard),
            _ => None,
        }
    }

    /// The attached significance score, for detail variants that carry one.
    #[must_use]
    pub fn significance(&self) -> Option<f64> {
        match self {
            Self::ModuleLifecycle { architecture_significance, .. }
            | Self::ModuleChanged { architecture_significance, .. }
            | Self::ComponentChanged { architecture_significance, .. } => {
                *architecture_significance
            }
            _ => None,
        }
    }

    /// Sets the significance slot on scorable detail variants; no-op for the
    /// rest.
    pub fn set_significance(&mut self, score: Option<f64>) {
        match self {
            Self::ModuleLifecycle { architecture_significance, .. }
            | Self::ModuleChanged { architecture_significance, .. }
            | Self::ComponentChanged { architecture_significance, .. } => {
                *architecture_significance = score;
            }
            _ => {}
        }
    }
}

/// One typed, evidenced, identified record of a detected difference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Sequential id, `CHG-0001` onward, unique within one run.
    pub id: String,
    /// Event type; determines the shape of `detail`.
    #[serde(rename = "type")]
    pub kind: ChangeType,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Single human-readable sentence.
    pub summary: String,
    /// Type-specific payload.
    pub detail: ChangeDetail,
    /// Ordered provenance records.
    pub evidence: Vec<EvidenceItem>,
}

impl ChangeEvent {
    /// Builds an event, clamping the confidence into [0, 1] and rounding it
    /// to 4 digits.
    #[must_use]
    pub fn new(
        id: String,
        kind: ChangeType,
        confidence: f64,
        summary: String,
        detail: ChangeDetail,
        evidence: Vec<EvidenceItem>,
    ) -> Self {
        Self { id, kind, confidence: round4(confidence.clamp(0.0, 1.0)), summary, detail, evidence }
    }
}

/// Issues `CHG-XXXX` ids in strictly increasing order.
///
/// Each run owns its own allocator so that concurrent reuse of the engine in
/// one process cannot interleave id sequences.
#[derive(Debug)]
pub struct EventIdAllocator {
    next: u32,
}

impl EventIdAllocator {
    /// Starts a fresh sequence at `CHG-0001`.
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns the next id and advances the counter.
    pub fn next_id(&mut self) -> String {
        let id = format!("CHG-{:04}", self.next);
        self.next += 1;
        id
    }

    /// The numeric value the next issued id will carry.
    #[must_use]
    pub fn peek(&self) -> u32 {
        self.next
    }
}

impl Default for EventIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Input file paths recorded in the IR meta section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPaths {
    /// Version A NamedClusters document.
    pub named_clusters_a: String,
    /// Version B NamedClusters document.
    pub named_clusters_b: String,
    /// Version A ClusterComponent document.
    pub cluster_component_a: String,
    /// Version B ClusterComponent document.
    pub cluster_component_b: String,
}

/// Alignment parameters and outcome recorded in the IR meta section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentMeta {
    /// Matching implementation actually used.
    pub engine: String,
    /// Global similarity of the version pair.
    pub global_similarity: f64,
    /// Edge-pruning threshold that was in effect.
    pub min_edge_weight: f64,
}

/// Module-diff parameters recorded in the IR meta section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDiffMeta {
    /// `min_file_delta` in effect.
    pub min_file_delta: usize,
    /// `top_k_files` in effect.
    pub top_k_files: usize,
    /// `min_jaccard_to_accept` in effect.
    pub min_jaccard_to_accept: f64,
}

/// Which semantic inputs were loaded, and their sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticsMeta {
    /// CodeSem for version A was found and parsed.
    pub codesem_a_loaded: bool,
    /// CodeSem for version B was found and parsed.
    pub codesem_b_loaded: bool,
    /// ArchSem for version A was found and parsed.
    pub archsem_a_loaded: bool,
    /// ArchSem for version B was found and parsed.
    pub archsem_b_loaded: bool,
    /// File descriptions indexed for version A.
    pub codesem_a_size: usize,
    /// File descriptions indexed for version B.
    pub codesem_b_size: usize,
    /// Component summaries indexed for version A.
    pub archsem_a_components: usize,
    /// Component summaries indexed for version B.
    pub archsem_b_components: usize,
}

/// The `meta` section of the IR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    /// Repository identifier.
    pub repo: String,
    /// Source version label.
    pub version_a: String,
    /// Target version label.
    pub version_b: String,
    /// Local timestamp, seconds precision.
    pub generated_at: String,
    /// Unique id of this run.
    pub run_id: String,
    /// Resolved input files.
    pub inputs: InputPaths,
    /// Alignment parameters and outcome.
    pub a2a: AlignmentMeta,
    /// Module-diff parameters.
    pub module_diff: ModuleDiffMeta,
    /// Semantic input availability.
    pub semantics: SemanticsMeta,
    /// Denoise statistics (denoised IR only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denoise: Option<DenoiseStats>,
}

/// The `quality` section of the IR: flags plus free-text notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitySection {
    /// Flag name to value.
    #[serde(flatten)]
    pub flags: BTreeMap<String, bool>,
    /// Free-text caveats accompanying the flags.
    pub notes: Vec<String>,
}

/// Aggregate file counts in the `entities` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntities {
    /// File universe size of version A.
    pub count_a: usize,
    /// File universe size of version B.
    pub count_b: usize,
    /// Files present only in B.
    pub added: Vec<String>,
    /// Files present only in A.
    pub removed: Vec<String>,
    /// Common files whose owning module differs.
    pub reassigned_count: usize,
}

/// Aggregate module counts in the `entities` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntities {
    /// Module count of version A.
    pub count_a: usize,
    /// Module count of version B.
    pub count_b: usize,
    /// Matched pairs.
    pub mapped: usize,
    /// A-only modules.
    pub removed: usize,
    /// B-only modules.
    pub added: usize,
}

/// Aggregate component counts in the `entities` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentEntities {
    /// Component count of version A.
    pub count_a: usize,
    /// Component count of version B.
    pub count_b: usize,
    /// Unresolved cluster references in version A.
    pub unresolved_a: usize,
    /// Unresolved cluster references in version B.
    pub unresolved_b: usize,
}

/// The `entities` section of the IR.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySection {
    /// File universe aggregates.
    pub files: FileEntities,
    /// Module aggregates.
    pub modules: ModuleEntities,
    /// Component aggregates.
    pub components: ComponentEntities,
}

/// The complete diff-IR document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffIr {
    /// Run metadata and configuration.
    pub meta: RunMeta,
    /// Reliability flags and notes.
    pub quality: QualitySection,
    /// Aggregate before/after counts.
    pub entities: EntitySection,
    /// Ordered change events.
    pub changes: Vec<ChangeEvent>,
}

impl DiffIr {
    /// Serializes the IR as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("Failed to serialize IR: {e}"))
    }

    /// Writes the IR as pretty-printed JSON to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to(&self, path: &Path) -> Result<(), String> {
        let text = self.to_json_pretty()?;
        std::fs::write(path, text)
            .map_err(|e| format!("Failed to write IR to {}: {e}", path.display()))
    }
}

/// Local timestamp with seconds precision, used for `meta.generated_at`.
#[must_use]
pub fn now_iso_local() -> String {
    chrono::Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Rounds to 4 decimal digits.
#[must_use]
pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Rounds to 6 decimal digits.
#[must_use]
pub fn round6(x: f64) -> f64 {
    (x * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_allocator_issues_increasing_ids() {
        let mut ids = EventIdAllocator::new();
        assert_eq!(ids.next_id(), "CHG-0001");
        assert_eq!(ids.next_id(), "CHG-0002");
        assert_eq!(ids.peek(), 3);
    }

    #[test]
    fn change_type_serializes_snake_case() {
        let json = serde_json::to_string(&ChangeType::ModuleComponentChanged).expect("serialize");
        assert_eq!(json, "\"module_component_changed\"");
        assert_eq!(ChangeType::QualityWarning.as_str(), "quality_warning");
    }

    #[test]
    fn event_clamps_confidence() {
        let ev = ChangeEvent::new(
            "CHG-0001".into(),
            ChangeType::FileAdded,
            1.7,
            "Added file x.".into(),
            ChangeDetail::File { file: "x".into() },
            vec![],
        );
        assert!((ev.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn event_json_uses_type_key_and_skips_missing_significance() {
        let ev = ChangeEvent::new(
            "CHG-0001".into(),
            ChangeType::FileRemoved,
            1.0,
            "Removed file x.".into(),
            ChangeDetail::File { file: "x".into() },
            vec![EvidenceItem::new("NamedClusters", "file:x".into(), "Present in A, absent in B")],
        );
        let v: serde_json::Value = serde_json::to_value(&ev).expect("to_value");
        assert_eq!(v["type"], "file_removed");
        assert_eq!(v["detail"]["file"], "x");
        assert_eq!(v["evidence"][0]["ref"], "file:x");
        assert!(v.get("architecture_significance").is_none());
        assert!(v["detail"].get("architecture_significance").is_none());
    }

    #[test]
    fn significance_serializes_inside_detail() {
        let mut ev = ChangeEvent::new(
            "CHG-0001".into(),
            ChangeType::ModuleRemoved,
            0.95,
            "Removed module m (3 files).".into(),
            ChangeDetail::ModuleLifecycle {
                module_uid: "m#1".into(),
                module_name: "m".into(),
                file_count: 3,
                architecture_significance: None,
            },
            vec![],
        );
        ev.detail.set_significance(Some(0.59));
        assert_eq!(ev.detail.significance(), Some(0.59));

        let v: serde_json::Value = serde_json::to_value(&ev).expect("to_value");
        assert!(v.get("architecture_significance").is_none());
        assert!((v["detail"]["architecture_significance"].as_f64().unwrap() - 0.59).abs() < 1e-12);

        // Non-scorable payloads ignore the setter.
        let mut file_ev = ChangeDetail::File { file: "x".into() };
        file_ev.set_significance(Some(1.0));
        assert_eq!(file_ev.significance(), None);
    }

    #[test]
    fn change_types_order_in_sets() {
        let mut seen = std::collections::BTreeSet::new();
        seen.insert(ChangeType::ModuleRenamed);
        seen.insert(ChangeType::ModuleChanged);
        assert!(seen.contains(&ChangeType::ModuleChanged));
        assert!(!seen.contains(&ChangeType::ModuleSplit));
    }

    #[test]
    fn rounding_helpers() {
        assert!((round4(0.123_456) - 0.1235).abs() < 1e-12);
        assert!((round6(0.123_456_78) - 0.123_457).abs() < 1e-12);
    }
}
