//! Composite architecture-significance scoring.
//!
//! Ranks module-level events by estimated architectural importance. The
//! score is a weighted sum of four factors in [0, 1]: structural impact,
//! scope (module size relative to the larger version's file universe),
//! architectural layer, and semantic-annotation churn.

use crate::config::SignificanceWeights;
use crate::ir::{round4, ChangeDetail, ChangeEvent, ChangeType};

/// Computes the significance score for one event.
///
/// `max_files_in_project` is the larger of the two snapshots' total file
/// counts, not the largest single module. Returns `None` for event types
/// outside the structural vocabulary (file-level and quality events are not
/// scored).
#[must_use]
pub fn compute_significance(
    event: &ChangeEvent,
    max_files_in_project: usize,
    weights: &SignificanceWeights,
) -> Option<f64> {
    let (structural, file_count) = match (&event.kind, &event.detail) {
        (ChangeType::ModuleChanged, ChangeDetail::ModuleChanged { counts, .. }) => {
            (counts.delta_ratio, counts.file_count_a.max(counts.file_count_b))
        }
        (
            ChangeType::ModuleAdded | ChangeType::ModuleRemoved,
            ChangeDetail::ModuleLifecycle { file_count, .. },
        ) => (1.0, *file_count),
        (ChangeType::ModuleComponentChanged, _) => (0.6, 0),
        _ => return None,
    };

    let scope = scope_factor(file_count, max_files_in_project);
    let layer = layer_factor(event);
    let semantic = semantic_factor(event);

    let w = normalized(weights);
    let score = w.structural * structural + w.scope * scope + w.layer * layer + w.semantic * semantic;
    Some(round4(score))
}

/// Attaches `architecture_significance` to the detail of every scorable
/// event in place.
pub fn attach_significance(
    changes: &mut [ChangeEvent],
    max_files_in_project: usize,
    weights: &SignificanceWeights,
) {
    for ev in changes.iter_mut() {
        let score = compute_significance(ev, max_files_in_project, weights);
        ev.detail.set_significance(score);
    }
}

/// `ln(1 + file_count) / ln(1 + max_files)`, zero when either input is zero.
fn scope_factor(file_count: usize, max_files: usize) -> f64 {
    if max_files == 0 || file_count == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = (1.0 + file_count as f64).ln() / (1.0 + max_files as f64).ln();
    ratio
}

/// Layer weight applies only to component moves: leaving a Core or
/// Infrastructure component counts full, anything else counts 0.6.
fn layer_factor(event: &ChangeEvent) -> f64 {
    if event.kind != ChangeType::ModuleComponentChanged {
        return 0.0;
    }
    let ChangeDetail::ComponentChanged { from_component, to_component, .. } = &event.detail else {
        return 0.0;
    };
    if from_component == to_component {
        return 0.0;
    }
    if from_component.contains("Core") || from_component.contains("Infrastructure") {
        1.0
    } else {
        0.6
    }
}

/// Semantic churn signal, capped at 1.0. Only `module_changed` events carry
/// the semantic context this reads.
fn semantic_factor(event: &ChangeEvent) -> f64 {
    let ChangeDetail::ModuleChanged { semantics, .. } = &event.detail else {
        return 0.0;
    };

    let mut semantic: f64 = 0.0;
    let added = semantics.code.added_files.len();
    let removed = semantics.code.removed_files.len();
    if added > 0 || removed > 0 {
        semantic += if added >= removed { 0.6 } else { 0.4 };
    }
    if semantics.arch.from_component_summary != semantics.arch.to_component_summary {
        semantic += 0.3;
    }
    if semantics.arch.patterns_a_top != semantics.arch.patterns_b_top {
        semantic += 0.3;
    }
    semantic.min(1.0)
}

/// Clamps each weight to be non-negative and rescales the set to sum to 1.0.
/// A degenerate all-zero set falls back to the defaults.
fn normalized(weights: &SignificanceWeights) -> SignificanceWeights {
    let w = SignificanceWeights {
        structural: weights.structural.max(0.0),
        scope: weights.scope.max(0.0),
        layer: weights.layer.max(0.0),
        semantic: weights.semantic.max(0.0),
    };
    let sum = w.structural + w.scope + w.layer + w.semantic;
    if sum <= f64::EPSILON {
        return SignificanceWeights::default();
    }
    SignificanceWeights {
        structural: w.structural / sum,
        scope: w.scope / sum,
        layer: w.layer / sum,
        semantic: w.semantic / sum,
    }
}
