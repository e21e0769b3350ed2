//! Module alignment: similarity measures, the pairwise matrix, and the
//! one-to-one correspondence between two versions' modules.

pub mod matching;

use std::collections::{BTreeMap, BTreeSet};

use crate::config::MatchingEngine;
use crate::inputs::named_clusters::Module;
use crate::ir::round6;
use matching::{run_ladder, EdgeWeights, GreedyMatching, HungarianMatching, MatchingStrategy};

/// Jaccard similarity of two file sets: |∩| / |∪|.
///
/// By definition two empty sets are identical (1.0) and an empty set shares
/// nothing with a nonempty one (0.0).
#[must_use]
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count();
    let union = a.len() + b.len() - inter;
    #[allow(clippy::cast_precision_loss)]
    {
        inter as f64 / union as f64
    }
}

/// Containment overlap of two file sets: |∩| / min(|A|, |B|).
#[must_use]
pub fn overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count();
    #[allow(clippy::cast_precision_loss)]
    {
        inter as f64 / a.len().min(b.len()) as f64
    }
}

/// Similarity record for one module pair with nonzero intersection.
#[derive(Debug, Clone, PartialEq)]
pub struct ModulePairScore {
    /// Module uid on the A side.
    pub uid_a: String,
    /// Module uid on the B side.
    pub uid_b: String,
    /// Containment overlap.
    pub overlap: f64,
    /// Jaccard similarity.
    pub jaccard: f64,
    /// Intersection size in files.
    pub intersection_count: usize,
}

/// Scores every intersecting module pair, sorted by overlap, then jaccard,
/// then intersection size, all descending; uid order breaks exact ties so
/// re-runs are reproducible.
#[must_use]
pub fn score_module_pairs(mods_a: &[Module], mods_b: &[Module]) -> Vec<ModulePairScore> {
    let mut scores: Vec<ModulePairScore> = Vec::new();
    for ma in mods_a {
        for mb in mods_b {
            let intersection_count = ma.files.intersection(&mb.files).count();
            if intersection_count == 0 {
                continue;
            }
            scores.push(ModulePairScore {
                uid_a: ma.uid.clone(),
                uid_b: mb.uid.clone(),
                overlap: overlap(&ma.files, &mb.files),
                jaccard: jaccard(&ma.files, &mb.files),
                intersection_count,
            });
        }
    }
    sort_pair_scores(&mut scores);
    scores
}

/// Orders pair scores by (overlap, jaccard, intersection) descending with a
/// deterministic uid tiebreak.
pub fn sort_pair_scores(scores: &mut [ModulePairScore]) {
    scores.sort_by(|x, y| {
        y.overlap
            .partial_cmp(&x.overlap)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| y.jaccard.partial_cmp(&x.jaccard).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| y.intersection_count.cmp(&x.intersection_count))
            .then_with(|| (&x.uid_a, &x.uid_b).cmp(&(&y.uid_a, &y.uid_b)))
    });
}

/// Greedy one-to-one selection over sorted pair scores, used by the
/// overlap-driven event pass.
#[must_use]
pub fn greedy_match_scores(scores: &[ModulePairScore]) -> Vec<ModulePairScore> {
    let mut used_a: BTreeSet<&str> = BTreeSet::new();
    let mut used_b: BTreeSet<&str> = BTreeSet::new();
    let mut matched = Vec::new();
    for s in scores {
        if used_a.contains(s.uid_a.as_str()) || used_b.contains(s.uid_b.as_str()) {
            continue;
        }
        used_a.insert(&s.uid_a);
        used_b.insert(&s.uid_b);
        matched.push(s.clone());
    }
    matched
}

/// One chosen pairing in an alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleMapping {
    /// Module uid in version A.
    pub from_uid: String,
    /// Module uid in version B.
    pub to_uid: String,
    /// Jaccard weight of the chosen edge.
    pub score: f64,
}

/// Alignment metadata for observability.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentMeta {
    /// Matching strategy that actually produced the mapping.
    pub engine: String,
    /// Module count of version A.
    pub n_a: usize,
    /// Module count of version B.
    pub n_b: usize,
    /// Edges surviving the `min_edge_weight` filter.
    pub edges: usize,
    /// The filter threshold in effect.
    pub min_edge_weight: f64,
}

/// The one-to-one correspondence between two versions' modules.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    /// Chosen pairings, best score first.
    pub mapping: Vec<ModuleMapping>,
    /// A-only uids, sorted.
    pub removed: Vec<String>,
    /// B-only uids, sorted.
    pub added: Vec<String>,
    /// Σ matched scores / max(|A|, |B|), rounded to 6 digits.
    pub global_similarity: f64,
    /// How the mapping was produced.
    pub meta: AlignmentMeta,
}

/// Aligns two uid→file-set mappings by maximum-weight bipartite matching on
/// Jaccard edge weights.
///
/// Edges with weight ≤ `min_edge_weight` are dropped before matching. The
/// requested engine selects the strategy ladder: `Auto` tries exact matching
/// and falls back to greedy, recording whichever ran.
#[must_use]
pub fn align_modules_by_jaccard(
    modules_a: &BTreeMap<String, BTreeSet<String>>,
    modules_b: &BTreeMap<String, BTreeSet<String>>,
    min_edge_weight: f64,
    engine: MatchingEngine,
) -> Alignment {
    let uids_a: Vec<&String> = modules_a.keys().collect();
    let uids_b: Vec<&String> = modules_b.keys().collect();
    let (n_a, n_b) = (uids_a.len(), uids_b.len());

    let mut weights = EdgeWeights::new();
    for (i, ua) in uids_a.iter().enumerate() {
        for (j, ub) in uids_b.iter().enumerate() {
            let w = jaccard(&modules_a[*ua], &modules_b[*ub]);
            if w > min_edge_weight {
                weights.insert((i, j), w);
            }
        }
    }

    let hungarian = HungarianMatching;
    let greedy = GreedyMatching;
    let ladder: Vec<&dyn MatchingStrategy> = match engine {
        MatchingEngine::Auto => vec![&hungarian, &greedy],
        MatchingEngine::Hungarian => vec![&hungarian],
        MatchingEngine::Greedy => vec![&greedy],
    };

    // The ladder always ends in a strategy that cannot fail when `Auto`;
    // a pinned engine that fails yields an empty mapping rather than a panic.
    let (pairs, used_engine) = run_ladder(&ladder, n_a, n_b, &weights)
        .unwrap_or_else(|_| (Vec::new(), "none"));

    let mut mapping: Vec<ModuleMapping> = Vec::new();
    let mut matched_a: BTreeSet<&String> = BTreeSet::new();
    let mut matched_b: BTreeSet<&String> = BTreeSet::new();
    let mut score_sum = 0.0;
    for (i, j, w) in pairs {
        mapping.push(ModuleMapping {
            from_uid: uids_a[i].clone(),
            to_uid: uids_b[j].clone(),
            score: w,
        });
        matched_a.insert(uids_a[i]);
        matched_b.insert(uids_b[j]);
        score_sum += w;
    }

    let removed: Vec<String> =
        uids_a.iter().filter(|u| !matched_a.contains(**u)).map(|u| (*u).clone()).collect();
    let added: Vec<String> =
        uids_b.iter().filter(|u| !matched_b.contains(**u)).map(|u| (*u).clone()).collect();

    #[allow(clippy::cast_precision_loss)]
    let denom = n_a.max(n_b).max(1) as f64;
    let global_similarity = round6(score_sum / denom);

    // High score first; uid order breaks ties deterministically.
    mapping.sort_by(|x, y| {
        y.score
            .partial_cmp(&x.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.from_uid.cmp(&y.from_uid))
    });

    Alignment {
        mapping,
        removed,
        added,
        global_similarity,
        meta: AlignmentMeta {
            engine: used_engine.to_string(),
            n_a,
            n_b,
            edges: weights.len(),
            min_edge_weight,
        },
    }
}
