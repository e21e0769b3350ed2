//! Overlap-driven change events (the legacy/alternate pass).
//!
//! Works on containment overlap rather than the alignment: greedy-matched
//! high-overlap pairs signal renames, and one-to-many overlap groups whose
//! union covers most of a module signal splits and merges. Also carries the
//! legacy same-uid component-move inference.

use std::collections::{BTreeMap, BTreeSet};

use crate::align::{greedy_match_scores, score_module_pairs, sort_pair_scores, ModulePairScore};
use crate::config::DiffConfig;
use crate::inputs::named_clusters::Module;
use crate::ir::{
    round4, ChangeDetail, ChangeEvent, ChangeType, EventIdAllocator, EvidenceItem, OverlapEntry,
};
use crate::snapshot::Snapshot;

/// At most this many overlap candidates are considered per split/merge pivot.
const MAX_CANDIDATES: usize = 5;

/// Generates rename, split, merge, and legacy component-move events from
/// all-pairs overlap.
#[must_use]
pub fn infer_overlap_events(
    a: &Snapshot,
    b: &Snapshot,
    cfg: &DiffConfig,
    ids: &mut EventIdAllocator,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    let scores = score_module_pairs(a.modules(), b.modules());

    rename_events(a, b, &scores, cfg, ids, &mut events);
    split_merge_events(a, b, &scores, cfg, ids, &mut events);
    component_move_events(a, b, ids, &mut events);

    events
}

/// Rename signal: greedily matched pairs whose overlap clears the threshold
/// but whose base names differ.
fn rename_events(
    a: &Snapshot,
    b: &Snapshot,
    scores: &[ModulePairScore],
    cfg: &DiffConfig,
    ids: &mut EventIdAllocator,
    events: &mut Vec<ChangeEvent>,
) {
    for p in greedy_match_scores(scores) {
        if p.overlap < cfg.rename_overlap {
            continue;
        }
        let (Some(ma), Some(mb)) = (a.named.module(&p.uid_a), b.named.module(&p.uid_b)) else {
            continue;
        };
        if ma.name == mb.name {
            continue;
        }
        events.push(ChangeEvent::new(
            ids.next_id(),
            ChangeType::ModuleRenamed,
            p.overlap,
            format!(
                "Module renamed from {} ({}) to {} ({}) with high file-set overlap.",
                ma.uid, ma.name, mb.uid, mb.name
            ),
            ChangeDetail::ModuleRenamed {
                from_module_uid: ma.uid.clone(),
                to_module_uid: mb.uid.clone(),
                from_name: ma.name.clone(),
                to_name: mb.name.clone(),
                jaccard: round4(p.jaccard),
                overlap: Some(round4(p.overlap)),
                intersect_files: Some(p.intersection_count),
            },
            vec![
                EvidenceItem::new("NamedClusters", format!("module:{}", ma.uid), "Source module"),
                EvidenceItem::new("NamedClusters", format!("module:{}", mb.uid), "Target module"),
                EvidenceItem::new("Derived", format!("overlap={:.4}", p.overlap), "File-set overlap"),
            ],
        ));
    }
}

/// Split and merge inference over qualifying overlap groups.
fn split_merge_events(
    a: &Snapshot,
    b: &Snapshot,
    scores: &[ModulePairScore],
    cfg: &DiffConfig,
    ids: &mut EventIdAllocator,
    events: &mut Vec<ChangeEvent>,
) {
    let mut by_a: BTreeMap<&str, Vec<&ModulePairScore>> = BTreeMap::new();
    let mut by_b: BTreeMap<&str, Vec<&ModulePairScore>> = BTreeMap::new();
    for s in scores {
        if s.overlap >= cfg.split_merge_overlap {
            by_a.entry(&s.uid_a).or_default().push(s);
            by_b.entry(&s.uid_b).or_default().push(s);
        }
    }

    for (uid_a, pairs) in &by_a {
        let Some(ma) = a.named.module(uid_a) else { continue };
        if pairs.len() < 2 {
            continue;
        }
        let candidates = top_candidates(pairs);
        let targets: Vec<&Module> =
            candidates.iter().filter_map(|p| b.named.module(&p.uid_b)).collect();
        if targets.len() < 2 {
            continue;
        }
        let coverage = union_coverage(&ma.files, targets.iter().map(|m| &m.files));
        if coverage < cfg.coverage_threshold {
            continue;
        }
        events.push(ChangeEvent::new(
            ids.next_id(),
            ChangeType::ModuleSplit,
            coverage.clamp(0.3, 0.85),
            format!(
                "Module {} appears split into multiple modules based on file-set overlap/coverage.",
                ma.uid
            ),
            ChangeDetail::ModuleSplit {
                from_module_uid: ma.uid.clone(),
                to_module_uids: targets.iter().map(|m| m.uid.clone()).collect(),
                coverage: round4(coverage),
                overlaps: overlap_entries(&candidates, |p| p.uid_b.clone()),
            },
            vec![
                EvidenceItem::new("NamedClusters", format!("module:{}", ma.uid), "Source module"),
                EvidenceItem::new(
                    "Derived",
                    format!("coverage={coverage:.4}"),
                    "Coverage of source files by union of targets",
                ),
            ],
        ));
    }

    for (uid_b, pairs) in &by_b {
        let Some(mb) = b.named.module(uid_b) else { continue };
        if pairs.len() < 2 {
            continue;
        }
        let candidates = top_candidates(pairs);
        let sources: Vec<&Module> =
            candidates.iter().filter_map(|p| a.named.module(&p.uid_a)).collect();
        if sources.len() < 2 {
            continue;
        }
        let coverage = union_coverage(&mb.files, sources.iter().map(|m| &m.files));
        if coverage < cfg.coverage_threshold {
            continue;
        }
        events.push(ChangeEvent::new(
            ids.next_id(),
            ChangeType::ModuleMerge,
            coverage.clamp(0.3, 0.85),
            format!(
                "Multiple modules appear merged into {} based on file-set overlap/coverage.",
                mb.uid
            ),
            ChangeDetail::ModuleMerge {
                from_module_uids: sources.iter().map(|m| m.uid.clone()).collect(),
                to_module_uid: mb.uid.clone(),
                coverage: round4(coverage),
                overlaps: overlap_entries(&candidates, |p| p.uid_a.clone()),
            },
            vec![
                EvidenceItem::new("NamedClusters", format!("module:{}", mb.uid), "Target module"),
                EvidenceItem::new(
                    "Derived",
                    format!("coverage={coverage:.4}"),
                    "Coverage of target files by union of sources",
                ),
            ],
        ));
    }
}

/// Legacy inference: a uid present in both versions whose component differs.
fn component_move_events(
    a: &Snapshot,
    b: &Snapshot,
    ids: &mut EventIdAllocator,
    events: &mut Vec<ChangeEvent>,
) {
    let uids_a: BTreeSet<&str> = a.modules().iter().map(|m| m.uid.as_str()).collect();
    let uids_b: BTreeSet<&str> = b.modules().iter().map(|m| m.uid.as_str()).collect();
    for uid in uids_a.intersection(&uids_b) {
        let (Some(ca), Some(cb)) = (a.component_of_module(uid), b.component_of_module(uid)) else {
            continue;
        };
        if ca == cb {
            continue;
        }
        events.push(ChangeEvent::new(
            ids.next_id(),
            ChangeType::ModuleMovedBetweenComponents,
            0.65,
            format!("Module {uid} changes associated component from '{ca}' to '{cb}'."),
            ChangeDetail::ComponentMoved {
                module_uid: (*uid).to_string(),
                from_component: ca.to_string(),
                to_component: cb.to_string(),
            },
            vec![EvidenceItem::new(
                "ClusterComponent",
                format!("module:{uid}"),
                "Occurrence-resolved mapping",
            )],
        ));
    }
}

/// The strongest candidates for one pivot, best overlap first, bounded to
/// avoid noise.
fn top_candidates(pairs: &[&ModulePairScore]) -> Vec<ModulePairScore> {
    let mut sorted: Vec<ModulePairScore> = pairs.iter().map(|p| (*p).clone()).collect();
    sort_pair_scores(&mut sorted);
    sorted.truncate(MAX_CANDIDATES);
    sorted
}

/// Fraction of `pivot` covered by the union of `others`.
fn union_coverage<'a>(
    pivot: &BTreeSet<String>,
    others: impl Iterator<Item = &'a BTreeSet<String>>,
) -> f64 {
    if pivot.is_empty() {
        return 0.0;
    }
    let mut union: BTreeSet<&String> = BTreeSet::new();
    for set in others {
        union.extend(set.iter());
    }
    let covered = pivot.iter().filter(|f| union.contains(f)).count();
    #[allow(clippy::cast_precision_loss)]
    {
        covered as f64 / pivot.len() as f64
    }
}

/// Builds the per-candidate overlap records carried in split/merge detail.
fn overlap_entries(
    candidates: &[ModulePairScore],
    other_uid: impl Fn(&ModulePairScore) -> String,
) -> Vec<OverlapEntry> {
    candidates
        .iter()
        .map(|p| OverlapEntry {
            module_uid: other_uid(p),
            overlap: round4(p.overlap),
            intersect_files: p.intersection_count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::testutil::{snapshot, snapshot_with_components};

    fn run(a: &Snapshot, b: &Snapshot, cfg: &DiffConfig) -> Vec<ChangeEvent> {
        let mut ids = EventIdAllocator::new();
        infer_overlap_events(a, b, cfg, &mut ids)
    }

    #[test]
    fn detects_split_with_full_coverage() {
        let a = snapshot("A", &[("big", &["a.c", "b.c", "c.c", "d.c"])]);
        let b = snapshot("B", &[("left", &["a.c", "b.c"]), ("right", &["c.c", "d.c"])]);
        let events = run(&a, &b, &DiffConfig::default());
        // The greedy rename signal also fires: full containment, new name.
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, ChangeType::ModuleRenamed);
        let split = &events[1];
        assert_eq!(split.kind, ChangeType::ModuleSplit);
        // Full coverage clamps to the 0.85 ceiling.
        assert!((split.confidence - 0.85).abs() < 1e-9);
        let ChangeDetail::ModuleSplit { to_module_uids, coverage, overlaps, .. } = &split.detail
        else {
            panic!("expected split detail");
        };
        assert_eq!(to_module_uids.len(), 2);
        assert!((coverage - 1.0).abs() < 1e-9);
        assert_eq!(overlaps.len(), 2);
    }

    #[test]
    fn detects_merge_symmetrically() {
        let a = snapshot("A", &[("left", &["a.c", "b.c"]), ("right", &["c.c", "d.c"])]);
        let b = snapshot("B", &[("big", &["a.c", "b.c", "c.c", "d.c"])]);
        let events = run(&a, &b, &DiffConfig::default());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, ChangeType::ModuleRenamed);
        let merge = &events[1];
        assert_eq!(merge.kind, ChangeType::ModuleMerge);
        let ChangeDetail::ModuleMerge { from_module_uids, to_module_uid, .. } = &merge.detail
        else {
            panic!("expected merge detail");
        };
        assert_eq!(from_module_uids.len(), 2);
        assert_eq!(to_module_uid, "big#1");
    }

    #[test]
    fn low_coverage_is_not_a_split() {
        // Candidates cover only half of the source files.
        let a = snapshot("A", &[("big", &["a.c", "b.c", "x.c", "y.c", "z.c", "w.c"])]);
        let b = snapshot("B", &[("left", &["a.c", "m.c"]), ("right", &["b.c", "n.c"])]);
        let events = run(&a, &b, &DiffConfig::default());
        assert!(events.iter().all(|e| e.kind != ChangeType::ModuleSplit));
    }

    #[test]
    fn rename_needs_high_overlap_and_different_name() {
        let a = snapshot("A", &[("old", &["a.c", "b.c", "c.c"])]);
        let b = snapshot("B", &[("new", &["a.c", "b.c", "c.c"])]);
        let events = run(&a, &b, &DiffConfig::default());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeType::ModuleRenamed);
        let ChangeDetail::ModuleRenamed { overlap, intersect_files, .. } = &events[0].detail
        else {
            panic!("expected rename detail");
        };
        assert_eq!(*overlap, Some(1.0));
        assert_eq!(*intersect_files, Some(3));

        // Same name: no rename even at full overlap.
        let b_same = snapshot("B", &[("old", &["a.c", "b.c", "c.c"])]);
        assert!(run(&a, &b_same, &DiffConfig::default()).is_empty());
    }

    #[test]
    fn component_move_uses_same_uid() {
        let a = snapshot_with_components("A", &[("x", &["a.c"])], &[("x#1", "Core")]);
        let b = snapshot_with_components("B", &[("x", &["a.c"])], &[("x#1", "Shell")]);
        let events = run(&a, &b, &DiffConfig::default());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeType::ModuleMovedBetweenComponents);
    }
}
