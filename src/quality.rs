//! Input-reliability flags, notes, and quality-warning events.

use crate::config::DiffConfig;
use crate::ir::{ChangeDetail, ChangeEvent, ChangeType, EventIdAllocator, EvidenceItem};
use crate::snapshot::Snapshot;
use std::collections::{BTreeMap, BTreeSet};

/// Version-pair-level quality assessment.
///
/// Flags and notes land in the IR `quality` section; each noteworthy flag is
/// additionally materialized as a `quality_warning` event so that report
/// renderers can cite it by `CHG` id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityReport {
    /// Flag name to value.
    pub flags: BTreeMap<String, bool>,
    /// Free-text caveats accompanying the flags.
    pub notes: Vec<String>,
    /// The flags encoded as change events.
    pub warning_events: Vec<ChangeEvent>,
}

/// Computes the quality report for one version pair.
#[must_use]
pub fn build_quality_report(
    a: &Snapshot,
    b: &Snapshot,
    files_added_count: usize,
    files_removed_count: usize,
    cfg: &DiffConfig,
    ids: &mut EventIdAllocator,
) -> QualityReport {
    let mut flags = BTreeMap::new();
    let mut notes = Vec::new();

    let stable_file_universe =
        files_added_count == 0 && files_removed_count == 0 && a.files.len() == b.files.len();
    flags.insert("stable_file_universe".to_string(), stable_file_universe);
    if stable_file_universe {
        notes.push(format!(
            "File universe unchanged (counts equal: {} \u{2192} {}).",
            a.files.len(),
            b.files.len()
        ));
    }

    let dup_names =
        !a.named.duplicate_module_names.is_empty() || !b.named.duplicate_module_names.is_empty();
    flags.insert("namedcluster_has_duplicate_module_names".to_string(), dup_names);
    if dup_names {
        let dn: BTreeSet<&String> = a
            .named
            .duplicate_module_names
            .iter()
            .chain(&b.named.duplicate_module_names)
            .collect();
        let dn: Vec<&str> = dn.into_iter().map(String::as_str).collect();
        notes.push(format!(
            "Duplicate module names detected: {dn:?}. Module UIDs use occurrence suffix (e.g., name#1, name#2)."
        ));
    }

    let empty_mods = !a.named.empty_modules.is_empty() || !b.named.empty_modules.is_empty();
    flags.insert("namedcluster_has_empty_module".to_string(), empty_mods);
    if empty_mods {
        let em: BTreeSet<&String> =
            a.named.empty_modules.iter().chain(&b.named.empty_modules).collect();
        let em: Vec<&str> = em.into_iter().map(String::as_str).collect();
        notes.push(format!("Empty modules detected (0 files): {em:?}."));
    }

    let mapping_incomplete = !a.comp.unresolved.is_empty() || !b.comp.unresolved.is_empty();
    flags.insert("component_mapping_incomplete".to_string(), mapping_incomplete);
    if mapping_incomplete {
        notes.push(format!(
            "Component mapping unresolved entries exist (A={}, B={}); component-related diffs may be incomplete.",
            a.comp.unresolved.len(),
            b.comp.unresolved.len()
        ));
    }

    let ca = a.modules().len();
    let cb = b.modules().len();
    #[allow(clippy::cast_precision_loss)]
    let delta_ratio = cb.abs_diff(ca) as f64 / ca.max(1) as f64;
    let module_count_delta_large = delta_ratio >= cfg.module_count_delta_warn_ratio;
    flags.insert("module_count_delta_large".to_string(), module_count_delta_large);
    if module_count_delta_large {
        notes.push(format!(
            "Module count changes significantly ({ca} \u{2192} {cb}, delta_ratio={delta_ratio:.2}); module partition diffs may reflect clustering instability."
        ));
    }

    let mut warning_events = Vec::new();
    let mut add_warn = |flag_key: &str, msg: &str, ids: &mut EventIdAllocator| {
        warning_events.push(ChangeEvent::new(
            ids.next_id(),
            ChangeType::QualityWarning,
            1.0,
            msg.to_string(),
            ChangeDetail::QualityWarning { flag: flag_key.to_string() },
            vec![EvidenceItem::new(
                "Derived",
                format!("quality:{flag_key}"),
                "Computed by quality checks",
            )],
        ));
    };

    if dup_names {
        add_warn(
            "namedcluster_has_duplicate_module_names",
            "Duplicate module names detected in NamedClusters outputs.",
            ids,
        );
    }
    if empty_mods {
        add_warn(
            "namedcluster_has_empty_module",
            "Empty modules (0 files) detected in NamedClusters outputs.",
            ids,
        );
    }
    if mapping_incomplete {
        add_warn(
            "component_mapping_incomplete",
            "ClusterComponent mapping contains unresolved entries.",
            ids,
        );
    }
    if module_count_delta_large {
        add_warn(
            "module_count_delta_large",
            "Module count changes significantly between versions; interpret with caution.",
            ids,
        );
    }
    if stable_file_universe {
        add_warn(
            "stable_file_universe",
            "File universe unchanged; file-level diffs are reliable.",
            ids,
        );
    }

    QualityReport { flags, notes, warning_events }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::testutil::snapshot;

    #[test]
    fn stable_universe_sets_flag_and_positive_warning() {
        let a = snapshot("A", &[("x", &["a.c", "b.c"])]);
        let b = snapshot("B", &[("x", &["a.c", "b.c"])]);
        let mut ids = EventIdAllocator::new();
        let report = build_quality_report(&a, &b, 0, 0, &DiffConfig::default(), &mut ids);
        assert!(report.flags["stable_file_universe"]);
        assert_eq!(report.warning_events.len(), 1);
        assert_eq!(report.warning_events[0].kind, ChangeType::QualityWarning);
        assert!(report.notes[0].contains("File universe unchanged"));
    }

    #[test]
    fn module_count_jump_trips_delta_warning() {
        let a = snapshot("A", &[("x", &["a.c"])]);
        let b = snapshot("B", &[("x", &["a.c"]), ("y", &["b.c"]), ("z", &["c.c"])]);
        let mut ids = EventIdAllocator::new();
        let report = build_quality_report(&a, &b, 2, 0, &DiffConfig::default(), &mut ids);
        assert!(report.flags["module_count_delta_large"]);
        assert!(!report.flags["stable_file_universe"]);
        assert!(report
            .warning_events
            .iter()
            .any(|e| matches!(&e.detail, ChangeDetail::QualityWarning { flag } if flag == "module_count_delta_large")));
    }

    #[test]
    fn duplicate_names_flagged_from_either_side() {
        let a = snapshot("A", &[("x", &["a.c"]), ("x", &["b.c"])]);
        let b = snapshot("B", &[("x", &["a.c", "b.c"])]);
        let mut ids = EventIdAllocator::new();
        let report = build_quality_report(&a, &b, 0, 0, &DiffConfig::default(), &mut ids);
        assert!(report.flags["namedcluster_has_duplicate_module_names"]);
        assert!(report.notes.iter().any(|n| n.contains("occurrence suffix")));
    }

    #[test]
    fn clean_pair_with_file_churn_produces_no_warnings() {
        let a = snapshot("A", &[("x", &["a.c"]), ("y", &["b.c"]), ("z", &["c.c"]), ("w", &["d.c"])]);
        let b = snapshot("B", &[("x", &["a.c"]), ("y", &["b.c"]), ("z", &["c.c"]), ("w", &["e.c"])]);
        let mut ids = EventIdAllocator::new();
        let report = build_quality_report(&a, &b, 1, 1, &DiffConfig::default(), &mut ids);
        assert!(report.warning_events.is_empty());
        assert!(report.notes.is_empty());
        assert_eq!(ids.peek(), 1);
    }
}
