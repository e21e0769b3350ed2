//! Threshold and policy configuration for a diff run.
//!
//! Every numeric knob of the engine lives here so that a run is fully
//! described by one `DiffConfig` value. Defaults match the recommended
//! module-level pipeline; a YAML file can override any subset of fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ir::ChangeType;

/// Which matching implementation the aligner should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchingEngine {
    /// Try exact matching first, fall back to greedy on failure.
    Auto,
    /// Exact maximum-weight bipartite matching (Kuhn-Munkres).
    Hungarian,
    /// Greedy matching: edges by descending weight, first come first served.
    Greedy,
}

/// Weights for the composite significance score. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignificanceWeights {
    /// Weight of the structural-impact factor.
    #[serde(rename = "struct")]
    pub structural: f64,
    /// Weight of the scope (module size) factor.
    pub scope: f64,
    /// Weight of the architectural-layer factor.
    pub layer: f64,
    /// Weight of the semantic-annotation factor.
    pub semantic: f64,
}

impl Default for SignificanceWeights {
    fn default() -> Self {
        Self { structural: 0.45, scope: 0.25, layer: 0.20, semantic: 0.10 }
    }
}

/// Which denoise policy to apply to the generated events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenoiseStrategy {
    /// Keep only events whose type is in `allowed_types` (recommended).
    Whitelist,
    /// Legacy heuristic that suppresses low-value rename events.
    RenameFilter,
}

/// Configuration for the denoise filter.
///
/// The whitelist strategy is the default and recommended policy; the rename
/// filter is retained as an alternate configuration for the legacy pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    /// When false the filter is a pass-through.
    pub enabled: bool,
    /// Selected policy.
    pub strategy: DenoiseStrategy,
    /// Event types kept by the whitelist strategy.
    pub allowed_types: Vec<ChangeType>,
    /// Rename filter: drop a rename when the same from/to pair also produced
    /// a `module_changed` or `module_component_changed` event.
    pub drop_renamed_if_has_other_events_same_pair: bool,
    /// Rename filter: drop a rename when either base name matches a junk
    /// keyword.
    pub drop_rename_if_unknown_name: bool,
    /// Keywords marking meaningless naming churn.
    pub unknown_name_keywords: Vec<String>,
    /// Rename filter: keep rename-only pairs that pass the high-value
    /// heuristics below instead of dropping them outright.
    pub keep_rename_if_only: bool,
    /// Minimum jaccard for a rename-only pair to be kept.
    pub keep_rename_min_jaccard: f64,
    /// Minimum module size (max of both sides) for a rename-only pair to be
    /// kept.
    pub keep_rename_min_module_size: usize,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: DenoiseStrategy::Whitelist,
            allowed_types: vec![
                ChangeType::ModuleAdded,
                ChangeType::ModuleRemoved,
                ChangeType::ModuleChanged,
            ],
            drop_renamed_if_has_other_events_same_pair: true,
            drop_rename_if_unknown_name: true,
            unknown_name_keywords: ["unknown", "misc", "tmp", "untitled"]
                .into_iter()
                .map(String::from)
                .collect(),
            keep_rename_if_only: false,
            keep_rename_min_jaccard: 0.98,
            keep_rename_min_module_size: 30,
        }
    }
}

/// All thresholds and policy switches for one diff run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Overlap threshold for rename inference in the overlap-driven pass.
    pub rename_overlap: f64,
    /// Overlap threshold for split/merge candidate pairs.
    pub split_merge_overlap: f64,
    /// Coverage a candidate union must reach for split/merge inference.
    pub coverage_threshold: f64,
    /// Module-count delta ratio that triggers a quality warning.
    pub module_count_delta_warn_ratio: f64,
    /// Resolve repeated cluster names via per-name occurrence queues.
    pub enable_occurrence_disambiguation: bool,
    /// Canonicalize `\` to `/` in file paths.
    pub normalize_path_separators: bool,
    /// Jaccard edges at or below this weight are dropped before matching.
    pub min_edge_weight: f64,
    /// Minimum added+removed file count for a `module_changed` event.
    pub min_file_delta: usize,
    /// Sample size for added/removed file paths in event detail.
    pub top_k_files: usize,
    /// Mapping pairs scoring below this jaccard are treated as unreliable.
    pub min_jaccard_to_accept: f64,
    /// Matching implementation selection.
    pub engine: MatchingEngine,
    /// Denoise policy.
    pub denoise: DenoiseConfig,
    /// Significance score weights.
    pub significance: SignificanceWeights,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            rename_overlap: 0.90,
            split_merge_overlap: 0.30,
            coverage_threshold: 0.80,
            module_count_delta_warn_ratio: 0.30,
            enable_occurrence_disambiguation: true,
            normalize_path_separators: true,
            min_edge_weight: 0.0,
            min_file_delta: 1,
            top_k_files: 8,
            min_jaccard_to_accept: 0.0,
            engine: MatchingEngine::Auto,
            denoise: DenoiseConfig::default(),
            significance: SignificanceWeights::default(),
        }
    }
}

impl DiffConfig {
    /// Loads a config from a YAML file, filling missing fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let w = SignificanceWeights::default();
        let sum = w.structural + w.scope + w.layer + w.semantic;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn default_whitelist_holds_three_structural_types() {
        let cfg = DenoiseConfig::default();
        assert_eq!(cfg.strategy, DenoiseStrategy::Whitelist);
        assert_eq!(
            cfg.allowed_types,
            vec![ChangeType::ModuleAdded, ChangeType::ModuleRemoved, ChangeType::ModuleChanged]
        );
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let cfg: DiffConfig =
            serde_yaml::from_str("min_file_delta: 3\nengine: greedy\n").expect("parse");
        assert_eq!(cfg.min_file_delta, 3);
        assert_eq!(cfg.engine, MatchingEngine::Greedy);
        assert!((cfg.rename_overlap - 0.90).abs() < 1e-9);
    }
}
