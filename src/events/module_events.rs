//! Alignment-driven change events (the primary pass).
//!
//! Unmatched modules become `module_added` / `module_removed`; each matched
//! pair yields up to three events: `module_renamed`, `module_component_changed`
//! and `module_changed`. File-level churn is never emitted per file here; it
//! is aggregated into `module_changed` detail with bounded path samples and
//! opportunistic semantic enrichment.

use crate::align::Alignment;
use crate::config::DiffConfig;
use crate::inputs::arch_sem::ArchSemIndex;
use crate::inputs::code_sem::CodeSemIndex;
use crate::inputs::named_clusters::{base_name, Module};
use crate::ir::{
    round6, ArchContext, ChangeCounts, ChangeDetail, ChangeEvent, ChangeType, CodeSemantics,
    EventIdAllocator, EvidenceItem, FileDescription, FileExamples, SemanticContext,
};
use crate::snapshot::Snapshot;

/// Number of leading architectural patterns carried into event detail.
const PATTERNS_TOP: usize = 8;

/// Optional semantic collaborators for event enrichment.
///
/// Their absence degrades `module_changed.semantics` to empty structures and
/// affects nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemanticInputs<'a> {
    /// CodeSem index of version A.
    pub code_a: Option<&'a CodeSemIndex>,
    /// CodeSem index of version B.
    pub code_b: Option<&'a CodeSemIndex>,
    /// ArchSem index of version A.
    pub arch_a: Option<&'a ArchSemIndex>,
    /// ArchSem index of version B.
    pub arch_b: Option<&'a ArchSemIndex>,
}

/// Generates module-level events from an alignment.
///
/// Mapping pairs scoring below `cfg.min_jaccard_to_accept` are treated as
/// unreliable and contribute no events.
#[must_use]
pub fn build_module_level_events(
    a: &Snapshot,
    b: &Snapshot,
    alignment: &Alignment,
    cfg: &DiffConfig,
    sems: &SemanticInputs<'_>,
    ids: &mut EventIdAllocator,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for uid in &alignment.removed {
        let Some(module) = a.named.module(uid) else { continue };
        events.push(ChangeEvent::new(
            ids.next_id(),
            ChangeType::ModuleRemoved,
            0.95,
            format!("Module {uid} removed (unmatched in target version)."),
            ChangeDetail::ModuleLifecycle {
                module_uid: uid.clone(),
                module_name: base_name(uid).to_string(),
                file_count: module.file_count,
                architecture_significance: None,
            },
            vec![EvidenceItem::new(
                "NamedClusters",
                format!("module:{uid}"),
                "Present in A, unmatched in B",
            )],
        ));
    }

    for uid in &alignment.added {
        let Some(module) = b.named.module(uid) else { continue };
        events.push(ChangeEvent::new(
            ids.next_id(),
            ChangeType::ModuleAdded,
            0.95,
            format!("Module {uid} added (unmatched from source version)."),
            ChangeDetail::ModuleLifecycle {
                module_uid: uid.clone(),
                module_name: base_name(uid).to_string(),
                file_count: module.file_count,
                architecture_significance: None,
            },
            vec![EvidenceItem::new(
                "NamedClusters",
                format!("module:{uid}"),
                "Present in B, unmatched in A",
            )],
        ));
    }

    for mm in &alignment.mapping {
        let (Some(ma), Some(mb)) = (a.named.module(&mm.from_uid), b.named.module(&mm.to_uid))
        else {
            continue;
        };
        if mm.score < cfg.min_jaccard_to_accept {
            continue;
        }
        emit_pair_events(a, b, ma, mb, mm.score, cfg, sems, ids, &mut events);
    }

    events
}

/// Emits rename / component-change / changed events for one matched pair.
#[allow(clippy::too_many_arguments)]
fn emit_pair_events(
    a: &Snapshot,
    b: &Snapshot,
    ma: &Module,
    mb: &Module,
    score: f64,
    cfg: &DiffConfig,
    sems: &SemanticInputs<'_>,
    ids: &mut EventIdAllocator,
    events: &mut Vec<ChangeEvent>,
) {
    let name_a = base_name(&ma.uid);
    let name_b = base_name(&mb.uid);

    let added_files: Vec<&String> = mb.files.difference(&ma.files).collect();
    let removed_files: Vec<&String> = ma.files.difference(&mb.files).collect();
    let retained = ma.files.intersection(&mb.files).count();
    let delta = added_files.len() + removed_files.len();

    let mapping_evidence = || {
        EvidenceItem::new("Derived", format!("jaccard={score:.6}"), "Alignment mapping weight")
    };

    if name_a != name_b {
        events.push(ChangeEvent::new(
            ids.next_id(),
            ChangeType::ModuleRenamed,
            score.clamp(0.6, 0.95),
            format!(
                "Module renamed from {} ({name_a}) to {} ({name_b}) (mapped by Jaccard).",
                ma.uid, mb.uid
            ),
            ChangeDetail::ModuleRenamed {
                from_module_uid: ma.uid.clone(),
                to_module_uid: mb.uid.clone(),
                from_name: name_a.to_string(),
                to_name: name_b.to_string(),
                jaccard: round6(score),
                overlap: None,
                intersect_files: None,
            },
            vec![
                mapping_evidence(),
                EvidenceItem::new("NamedClusters", format!("module:{}", ma.uid), "Source module"),
                EvidenceItem::new("NamedClusters", format!("module:{}", mb.uid), "Target module"),
            ],
        ));
    }

    // Component comparison is mapped-pair based: the component of the source
    // uid in A against the component of the target uid in B.
    let comp_a = a.component_of_module(&ma.uid);
    let comp_b = b.component_of_module(&mb.uid);
    if let (Some(ca), Some(cb)) = (comp_a, comp_b) {
        if ca != cb {
            events.push(ChangeEvent::new(
                ids.next_id(),
                ChangeType::ModuleComponentChanged,
                0.65,
                format!(
                    "Module mapped {} → {} changes component from '{ca}' to '{cb}'.",
                    ma.uid, mb.uid
                ),
                ChangeDetail::ComponentChanged {
                    from_module_uid: ma.uid.clone(),
                    to_module_uid: mb.uid.clone(),
                    from_component: ca.to_string(),
                    to_component: cb.to_string(),
                    jaccard: round6(score),
                    architecture_significance: None,
                },
                vec![
                    EvidenceItem::new(
                        "ClusterComponent",
                        format!("module:{}", ma.uid),
                        "Source component mapping",
                    ),
                    EvidenceItem::new(
                        "ClusterComponent",
                        format!("module:{}", mb.uid),
                        "Target component mapping",
                    ),
                    mapping_evidence(),
                ],
            ));
        }
    }

    if delta < cfg.min_file_delta {
        return;
    }

    let union = ma.files.union(&mb.files).count().max(1);
    #[allow(clippy::cast_precision_loss)]
    let delta_ratio = delta as f64 / union as f64;
    let confidence = (score * (1.0 - 0.5 * delta_ratio)).clamp(0.55, 0.95);

    let added_top: Vec<String> =
        added_files.iter().take(cfg.top_k_files).map(|f| (*f).clone()).collect();
    let removed_top: Vec<String> =
        removed_files.iter().take(cfg.top_k_files).map(|f| (*f).clone()).collect();

    let semantics = enrich_semantics(a, b, ma, mb, &added_top, &removed_top, sems);

    events.push(ChangeEvent::new(
        ids.next_id(),
        ChangeType::ModuleChanged,
        confidence,
        format!(
            "Module {} → {} changed (added={}, removed={}, retained={retained}; jaccard={score:.3}).",
            ma.uid,
            mb.uid,
            added_files.len(),
            removed_files.len(),
        ),
        ChangeDetail::ModuleChanged {
            from_module_uid: ma.uid.clone(),
            to_module_uid: mb.uid.clone(),
            from_name: name_a.to_string(),
            to_name: name_b.to_string(),
            jaccard: round6(score),
            counts: ChangeCounts {
                added_files: added_files.len(),
                removed_files: removed_files.len(),
                retained_files: retained,
                file_count_a: ma.file_count,
                file_count_b: mb.file_count,
                delta,
                delta_ratio: round6(delta_ratio),
            },
            examples: FileExamples { added_files_top: added_top, removed_files_top: removed_top },
            semantics,
            architecture_significance: None,
        },
        vec![
            mapping_evidence(),
            EvidenceItem::new("NamedClusters", format!("module:{}", ma.uid), "Source file-set"),
            EvidenceItem::new("NamedClusters", format!("module:{}", mb.uid), "Target file-set"),
        ],
    ));
}

/// Attaches per-file descriptions and component-level context when the
/// semantic collaborators are present.
fn enrich_semantics(
    a: &Snapshot,
    b: &Snapshot,
    ma: &Module,
    mb: &Module,
    added_top: &[String],
    removed_top: &[String],
    sems: &SemanticInputs<'_>,
) -> SemanticContext {
    let describe = |index: Option<&CodeSemIndex>, paths: &[String]| -> Vec<FileDescription> {
        let Some(index) = index else { return Vec::new() };
        paths
            .iter()
            .filter_map(|p| {
                index
                    .description_of(p)
                    .map(|desc| FileDescription { path: p.clone(), desc: desc.to_string() })
            })
            .collect()
    };

    let mut arch = ArchContext::default();
    if sems.arch_a.is_some() || sems.arch_b.is_some() {
        if let Some(ca) = a.component_of_module(&ma.uid) {
            arch.from_component = Some(ca.to_string());
            arch.from_component_summary =
                sems.arch_a.and_then(|idx| idx.summary_of(ca)).map(String::from);
        }
        if let Some(cb) = b.component_of_module(&mb.uid) {
            arch.to_component = Some(cb.to_string());
            arch.to_component_summary =
                sems.arch_b.and_then(|idx| idx.summary_of(cb)).map(String::from);
        }
        if let Some(idx) = sems.arch_a {
            arch.patterns_a_top = idx.top_patterns(PATTERNS_TOP);
        }
        if let Some(idx) = sems.arch_b {
            arch.patterns_b_top = idx.top_patterns(PATTERNS_TOP);
        }
    }

    SemanticContext {
        code: CodeSemantics {
            added_files: describe(sems.code_b, added_top),
            removed_files: describe(sems.code_a, removed_top),
        },
        arch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::align_modules_by_jaccard;
    use crate::config::MatchingEngine;
    use crate::snapshot::testutil::{snapshot, snapshot_with_components};
    use std::collections::BTreeMap;

    fn align(a: &Snapshot, b: &Snapshot) -> Alignment {
        let to_sets = |s: &Snapshot| -> BTreeMap<_, _> {
            s.modules().iter().map(|m| (m.uid.clone(), m.files.clone())).collect()
        };
        align_modules_by_jaccard(&to_sets(a), &to_sets(b), 0.0, MatchingEngine::Auto)
    }

    fn run(a: &Snapshot, b: &Snapshot, cfg: &DiffConfig) -> Vec<ChangeEvent> {
        let alignment = align(a, b);
        let mut ids = EventIdAllocator::new();
        build_module_level_events(a, b, &alignment, cfg, &SemanticInputs::default(), &mut ids)
    }

    #[test]
    fn end_to_end_scenario_emits_expected_events() {
        let a = snapshot("A", &[("X", &["a.c", "b.c"]), ("Y", &["c.c"])]);
        let b = snapshot("B", &[("X", &["a.c", "b.c", "d.c"]), ("Z", &["e.c"])]);
        let events = run(&a, &b, &DiffConfig::default());

        let kinds: Vec<ChangeType> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![ChangeType::ModuleRemoved, ChangeType::ModuleAdded, ChangeType::ModuleChanged]
        );
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["CHG-0001", "CHG-0002", "CHG-0003"]);

        let ChangeDetail::ModuleChanged { counts, examples, .. } = &events[2].detail else {
            panic!("expected module_changed detail");
        };
        assert_eq!(counts.added_files, 1);
        assert_eq!(counts.removed_files, 0);
        assert_eq!(counts.retained_files, 2);
        assert_eq!(examples.added_files_top, vec!["d.c"]);
        assert!(examples.removed_files_top.is_empty());
    }

    #[test]
    fn rename_confidence_is_clamped() {
        let a = snapshot("A", &[("old", &["a.c", "b.c", "c.c"])]);
        let b = snapshot("B", &[("new", &["a.c", "b.c", "c.c"])]);
        let events = run(&a, &b, &DiffConfig::default());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeType::ModuleRenamed);
        // Perfect jaccard, but rename confidence caps at 0.95.
        assert!((events[0].confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn component_change_requires_both_sides_resolved() {
        let a = snapshot_with_components("A", &[("x", &["a.c"])], &[("x#1", "Core")]);
        let b_unresolved = snapshot("B", &[("x", &["a.c"])]);
        assert!(run(&a, &b_unresolved, &DiffConfig::default()).is_empty());

        let b = snapshot_with_components("B", &[("x", &["a.c"])], &[("x#1", "Shell")]);
        let events = run(&a, &b, &DiffConfig::default());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeType::ModuleComponentChanged);
        assert!((events[0].confidence - 0.65).abs() < 1e-9);
    }

    #[test]
    fn min_file_delta_suppresses_small_changes() {
        let a = snapshot("A", &[("x", &["a.c", "b.c"])]);
        let b = snapshot("B", &[("x", &["a.c", "c.c"])]);
        let cfg = DiffConfig { min_file_delta: 3, ..DiffConfig::default() };
        assert!(run(&a, &b, &cfg).is_empty());

        let events = run(&a, &b, &DiffConfig::default());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeType::ModuleChanged);
    }

    #[test]
    fn low_jaccard_mappings_are_suppressed_entirely() {
        let a = snapshot("A", &[("x", &["a.c", "b.c", "c.c", "d.c"])]);
        let b = snapshot("B", &[("y", &["d.c", "e.c", "f.c", "g.c"])]);
        let cfg = DiffConfig { min_jaccard_to_accept: 0.5, ..DiffConfig::default() };
        // jaccard = 1/7; the pair contributes neither rename nor change.
        assert!(run(&a, &b, &cfg).is_empty());
    }

    #[test]
    fn top_k_bounds_example_lists() {
        let a = snapshot("A", &[("x", &["keep.c"])]);
        let files: Vec<String> =
            (0..12).map(|i| format!("new{i:02}.c")).chain(["keep.c".to_string()]).collect();
        let file_refs: Vec<&str> = files.iter().map(String::as_str).collect();
        let b = snapshot("B", &[("x", &file_refs)]);
        let events = run(&a, &b, &DiffConfig::default());
        let ChangeDetail::ModuleChanged { counts, examples, .. } = &events[0].detail else {
            panic!("expected module_changed detail");
        };
        assert_eq!(counts.added_files, 12);
        assert_eq!(examples.added_files_top.len(), 8);
    }

    #[test]
    fn semantics_enrichment_is_opportunistic() {
        use crate::inputs::code_sem::parse_code_sem_value;
        use serde_json::json;

        let a = snapshot("A", &[("x", &["a.c"])]);
        let b = snapshot("B", &[("x", &["a.c", "buf.c"])]);
        let code_b = parse_code_sem_value(
            &json!({"summary": [{"file": "buf.c", "Functionality": "Buffer management."}]}),
            &DiffConfig::default(),
            "test",
        );

        let alignment = align(&a, &b);
        let mut ids = EventIdAllocator::new();
        let sems = SemanticInputs { code_b: Some(&code_b), ..SemanticInputs::default() };
        let events = build_module_level_events(
            &a,
            &b,
            &alignment,
            &DiffConfig::default(),
            &sems,
            &mut ids,
        );
        let ChangeDetail::ModuleChanged { semantics, .. } = &events[0].detail else {
            panic!("expected module_changed detail");
        };
        assert_eq!(semantics.code.added_files.len(), 1);
        assert_eq!(semantics.code.added_files[0].desc, "Buffer management.");
        assert!(semantics.code.removed_files.is_empty());
    }
}
