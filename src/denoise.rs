//! Event denoising.
//!
//! Pure filter over a generated event list: the input is never mutated and
//! running the filter over its own output changes nothing. The whitelist
//! strategy keeps the three structural event types the reporting layer cares
//! about; the rename filter is the older heuristic that only suppresses
//! low-value rename events.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::{DenoiseConfig, DenoiseStrategy};
use crate::ir::{ChangeEvent, ChangeType};
use crate::inputs::named_clusters::{base_name, NamedClustersIndex};

const DROPPED_IDS_SAMPLE: usize = 20;

/// Outcome statistics of one denoise application, recorded in the IR meta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenoiseStats {
    /// Whether the filter was active.
    pub enabled: bool,
    /// Strategy label, e.g. `"whitelist"` or `"rename_filter"`.
    pub strategy: String,
    /// Event count before filtering.
    pub input_events: usize,
    /// Event count after filtering.
    pub output_events: usize,
    /// Number of dropped events.
    pub dropped: usize,
    /// First dropped event ids, capped at 20.
    pub dropped_ids_sample: Vec<String>,
}

/// Applies the configured denoise policy to `changes`.
///
/// Returns the surviving events in their original order, plus stats. The
/// NamedClusters indexes are only consulted by the rename filter's module
/// size heuristic and may be absent.
#[must_use]
pub fn denoise_changes(
    changes: &[ChangeEvent],
    named_a: Option<&NamedClustersIndex>,
    named_b: Option<&NamedClustersIndex>,
    cfg: &DenoiseConfig,
) -> (Vec<ChangeEvent>, DenoiseStats) {
    if !cfg.enabled {
        let stats = DenoiseStats {
            enabled: false,
            strategy: strategy_label(cfg.strategy).to_string(),
            input_events: changes.len(),
            output_events: changes.len(),
            dropped: 0,
            dropped_ids_sample: Vec::new(),
        };
        return (changes.to_vec(), stats);
    }

    let (kept, dropped_ids) = match cfg.strategy {
        DenoiseStrategy::Whitelist => whitelist(changes, cfg),
        DenoiseStrategy::RenameFilter => rename_filter(changes, named_a, named_b, cfg),
    };

    let mut sample = dropped_ids;
    let dropped = sample.len();
    sample.truncate(DROPPED_IDS_SAMPLE);

    let stats = DenoiseStats {
        enabled: true,
        strategy: strategy_label(cfg.strategy).to_string(),
        input_events: changes.len(),
        output_events: kept.len(),
        dropped,
        dropped_ids_sample: sample,
    };
    (kept, stats)
}

fn strategy_label(strategy: DenoiseStrategy) -> &'static str {
    match strategy {
        DenoiseStrategy::Whitelist => "whitelist",
        DenoiseStrategy::RenameFilter => "rename_filter",
    }
}

fn whitelist(changes: &[ChangeEvent], cfg: &DenoiseConfig) -> (Vec<ChangeEvent>, Vec<String>) {
    let allowed: BTreeSet<&str> = cfg.allowed_types.iter().map(|t| t.as_str()).collect();
    let mut kept = Vec::new();
    let mut dropped_ids = Vec::new();
    for ev in changes {
        if allowed.contains(ev.kind.as_str()) {
            kept.push(ev.clone());
        } else {
            dropped_ids.push(ev.id.clone());
        }
    }
    (kept, dropped_ids)
}

fn rename_filter(
    changes: &[ChangeEvent],
    named_a: Option<&NamedClustersIndex>,
    named_b: Option<&NamedClustersIndex>,
    cfg: &DenoiseConfig,
) -> (Vec<ChangeEvent>, Vec<String>) {
    // Pass 1: which event types exist per mapping pair, and the pair jaccard.
    let mut pair_types: BTreeMap<(String, String), BTreeSet<ChangeType>> = BTreeMap::new();
    let mut pair_jaccard: BTreeMap<(String, String), f64> = BTreeMap::new();
    for ev in changes {
        if let Some((from, to)) = ev.detail.pair_uids() {
            let key = (from.to_string(), to.to_string());
            pair_types.entry(key.clone()).or_default().insert(ev.kind);
            if let Some(j) = ev.detail.jaccard() {
                pair_jaccard.insert(key, j);
            }
        }
    }

    let mut kept = Vec::new();
    let mut dropped_ids = Vec::new();
    for ev in changes {
        if ev.kind != ChangeType::ModuleRenamed {
            kept.push(ev.clone());
            continue;
        }
        let Some((from, to)) = ev.detail.pair_uids() else {
            kept.push(ev.clone());
            continue;
        };
        let key = (from.to_string(), to.to_string());

        if cfg.drop_renamed_if_has_other_events_same_pair {
            let types = pair_types.get(&key);
            let has_other = types.is_some_and(|t| {
                t.contains(&ChangeType::ModuleChanged)
                    || t.contains(&ChangeType::ModuleComponentChanged)
            });
            if has_other {
                dropped_ids.push(ev.id.clone());
                continue;
            }
        }

        if cfg.drop_rename_if_unknown_name
            && (looks_unknown(base_name(from), &cfg.unknown_name_keywords)
                || looks_unknown(base_name(to), &cfg.unknown_name_keywords))
        {
            dropped_ids.push(ev.id.clone());
            continue;
        }

        if !cfg.keep_rename_if_only {
            dropped_ids.push(ev.id.clone());
            continue;
        }

        let jaccard = ev.detail.jaccard().or_else(|| pair_jaccard.get(&key).copied());
        if jaccard.is_none_or(|j| j < cfg.keep_rename_min_jaccard) {
            dropped_ids.push(ev.id.clone());
            continue;
        }

        let size_a = module_size(named_a, from);
        let size_b = module_size(named_b, to);
        if size_a.max(size_b) < cfg.keep_rename_min_module_size {
            dropped_ids.push(ev.id.clone());
            continue;
        }

        kept.push(ev.clone());
    }
    (kept, dropped_ids)
}

fn looks_unknown(name: &str, keywords: &[String]) -> bool {
    let n = name.trim().to_lowercase();
    keywords.iter().any(|k| n.contains(k.as_str()))
}

fn module_size(named: Option<&NamedClustersIndex>, uid: &str) -> usize {
    named.and_then(|n| n.module(uid)).map_or(0, |m| m.file_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ChangeDetail, EventIdAllocator};

    fn event(ids: &mut EventIdAllocator, kind: ChangeType, detail: ChangeDetail) -> ChangeEvent {
        ChangeEvent::new(ids.next_id(), kind, 0.9, format!("{kind} event"), detail, vec![])
    }

    fn lifecycle(uid: &str) -> ChangeDetail {
        ChangeDetail::ModuleLifecycle {
            module_uid: uid.to_string(),
            module_name: base_name(uid).to_string(),
            file_count: 3,
            architecture_significance: None,
        }
    }

    fn renamed(from: &str, to: &str, jaccard: f64) -> ChangeDetail {
        ChangeDetail::ModuleRenamed {
            from_module_uid: from.to_string(),
            to_module_uid: to.to_string(),
            from_name: base_name(from).to_string(),
            to_name: base_name(to).to_string(),
            jaccard,
            overlap: None,
            intersect_files: None,
        }
    }

    #[test]
    fn whitelist_keeps_only_allowed_types_and_is_idempotent() {
        let mut ids = EventIdAllocator::new();
        let changes = vec![
            event(&mut ids, ChangeType::ModuleAdded, lifecycle("net#1")),
            event(&mut ids, ChangeType::ModuleRenamed, renamed("io#1", "fs#1", 0.99)),
            event(&mut ids, ChangeType::ModuleRemoved, lifecycle("old#1")),
        ];
        let cfg = DenoiseConfig::default();
        let (kept, stats) = denoise_changes(&changes, None, None, &cfg);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].kind, ChangeType::ModuleAdded);
        assert_eq!(kept[1].kind, ChangeType::ModuleRemoved);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.dropped_ids_sample, vec!["CHG-0002"]);

        let (again, stats2) = denoise_changes(&kept, None, None, &cfg);
        assert_eq!(again, kept);
        assert_eq!(stats2.dropped, 0);
    }

    #[test]
    fn disabled_filter_is_a_pass_through() {
        let mut ids = EventIdAllocator::new();
        let changes = vec![event(&mut ids, ChangeType::ModuleRenamed, renamed("a#1", "b#1", 0.5))];
        let cfg = DenoiseConfig { enabled: false, ..DenoiseConfig::default() };
        let (kept, stats) = denoise_changes(&changes, None, None, &cfg);
        assert_eq!(kept, changes);
        assert!(!stats.enabled);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn rename_filter_drops_rename_when_pair_also_changed() {
        let mut ids = EventIdAllocator::new();
        let changed = ChangeDetail::ModuleChanged {
            from_module_uid: "io#1".into(),
            to_module_uid: "fs#1".into(),
            from_name: "io".into(),
            to_name: "fs".into(),
            jaccard: 0.8,
            counts: crate::ir::ChangeCounts::default(),
            examples: crate::ir::FileExamples::default(),
            semantics: crate::ir::SemanticContext::default(),
            architecture_significance: None,
        };
        let changes = vec![
            event(&mut ids, ChangeType::ModuleRenamed, renamed("io#1", "fs#1", 0.8)),
            event(&mut ids, ChangeType::ModuleChanged, changed),
        ];
        let cfg = DenoiseConfig {
            strategy: DenoiseStrategy::RenameFilter,
            ..DenoiseConfig::default()
        };
        let (kept, stats) = denoise_changes(&changes, None, None, &cfg);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].kind, ChangeType::ModuleChanged);
        assert_eq!(stats.dropped_ids_sample, vec!["CHG-0001"]);
    }

    #[test]
    fn rename_filter_drops_unknown_name_churn() {
        let mut ids = EventIdAllocator::new();
        let changes =
            vec![event(&mut ids, ChangeType::ModuleRenamed, renamed("misc#1", "utils#1", 0.99))];
        let cfg = DenoiseConfig {
            strategy: DenoiseStrategy::RenameFilter,
            keep_rename_if_only: true,
            ..DenoiseConfig::default()
        };
        let (kept, _) = denoise_changes(&changes, None, None, &cfg);
        assert!(kept.is_empty());
    }

    #[test]
    fn rename_filter_keeps_high_value_rename_only_pair() {
        use crate::snapshot::testutil::snapshot;

        let files: Vec<String> = (0..32).map(|i| format!("src/f{i}.c")).collect();
        let refs: Vec<&str> = files.iter().map(String::as_str).collect();
        let a = snapshot("A", &[("engine", &refs)]);
        let b = snapshot("B", &[("core", &refs)]);

        let mut ids = EventIdAllocator::new();
        let changes =
            vec![event(&mut ids, ChangeType::ModuleRenamed, renamed("engine#1", "core#1", 1.0))];
        let cfg = DenoiseConfig {
            strategy: DenoiseStrategy::RenameFilter,
            keep_rename_if_only: true,
            ..DenoiseConfig::default()
        };
        let (kept, stats) = denoise_changes(&changes, Some(&a.named), Some(&b.named), &cfg);
        assert_eq!(kept.len(), 1);
        assert_eq!(stats.output_events, 1);
    }

    #[test]
    fn rename_only_pair_below_size_threshold_is_dropped() {
        use crate::snapshot::testutil::snapshot;

        let a = snapshot("A", &[("engine", &["a.c", "b.c"])]);
        let b = snapshot("B", &[("core", &["a.c", "b.c"])]);

        let mut ids = EventIdAllocator::new();
        let changes =
            vec![event(&mut ids, ChangeType::ModuleRenamed, renamed("engine#1", "core#1", 1.0))];
        let cfg = DenoiseConfig {
            strategy: DenoiseStrategy::RenameFilter,
            keep_rename_if_only: true,
            ..DenoiseConfig::default()
        };
        let (kept, _) = denoise_changes(&changes, Some(&a.named), Some(&b.named), &cfg);
        assert!(kept.is_empty());
    }
}
