//! Bipartite matching strategies.
//!
//! The aligner tries strategies in order until one succeeds: exact
//! maximum-weight matching first, greedy last. Which one actually ran is
//! recorded in the alignment metadata so downstream consumers can discount
//! quality when the greedy fallback was used.

use std::collections::BTreeMap;

/// Node-count ceiling for the exact matcher; above it the O(n³) assignment
/// solve is declined so the ladder degrades to greedy.
const MAX_EXACT_NODES: usize = 512;

/// Sparse edge weights between A-side index `i` and B-side index `j`.
pub type EdgeWeights = BTreeMap<(usize, usize), f64>;

/// One matched pair: A-side index, B-side index, edge weight.
pub type MatchedPair = (usize, usize, f64);

/// A one-to-one matching implementation over a weighted bipartite graph.
pub trait MatchingStrategy {
    /// Short identifier recorded in alignment metadata.
    fn name(&self) -> &'static str;

    /// Computes a matching. Only pairs carrying an actual edge are returned.
    ///
    /// # Errors
    ///
    /// Returns an error when this strategy cannot handle the instance; the
    /// caller then tries the next strategy in the ladder.
    fn run(&self, n_a: usize, n_b: usize, weights: &EdgeWeights) -> Result<Vec<MatchedPair>, String>;
}

/// Exact maximum-weight matching via the Kuhn-Munkres assignment algorithm
/// on a zero-padded square matrix.
///
/// All edge weights are nonnegative, so the optimal assignment restricted to
/// real edges is a maximum-weight bipartite matching.
pub struct HungarianMatching;

impl MatchingStrategy for HungarianMatching {
    fn name(&self) -> &'static str {
        "hungarian"
    }

    fn run(&self, n_a: usize, n_b: usize, weights: &EdgeWeights) -> Result<Vec<MatchedPair>, String> {
        let n = n_a.max(n_b);
        if n == 0 || weights.is_empty() {
            return Ok(Vec::new());
        }
        if n > MAX_EXACT_NODES {
            return Err(format!("instance too large for exact matching ({n} > {MAX_EXACT_NODES} nodes)"));
        }
        if weights.values().any(|w| !w.is_finite()) {
            return Err("non-finite edge weight".to_string());
        }

        // Minimize negated weights; absent edges (padding included) cost 0.
        let cost = |i: usize, j: usize| -> f64 { -weights.get(&(i, j)).copied().unwrap_or(0.0) };

        // Kuhn-Munkres with potentials, 1-indexed internal arrays.
        let mut u = vec![0.0f64; n + 1];
        let mut v = vec![0.0f64; n + 1];
        let mut matched_row = vec![0usize; n + 1];
        let mut way = vec![0usize; n + 1];

        for i in 1..=n {
            matched_row[0] = i;
            let mut j0 = 0usize;
            let mut minv = vec![f64::INFINITY; n + 1];
            let mut used = vec![false; n + 1];
            loop {
                used[j0] = true;
                let i0 = matched_row[j0];
                let mut delta = f64::INFINITY;
                let mut j1 = 0usize;
                for j in 1..=n {
                    if used[j] {
                        continue;
                    }
                    let cur = cost(i0 - 1, j - 1) - u[i0] - v[j];
                    if cur < minv[j] {
                        minv[j] = cur;
                        way[j] = j0;
                    }
                    if minv[j] < delta {
                        delta = minv[j];
                        j1 = j;
                    }
                }
                for j in 0..=n {
                    if used[j] {
                        u[matched_row[j]] += delta;
                        v[j] -= delta;
                    } else {
                        minv[j] -= delta;
                    }
                }
                j0 = j1;
                if matched_row[j0] == 0 {
                    break;
                }
            }
            // Unwind the augmenting path.
            loop {
                let j1 = way[j0];
                matched_row[j0] = matched_row[j1];
                j0 = j1;
                if j0 == 0 {
                    break;
                }
            }
        }

        let mut pairs = Vec::new();
        for j in 1..=n {
            let i = matched_row[j];
            if i == 0 {
                continue;
            }
            let (ai, bj) = (i - 1, j - 1);
            if ai >= n_a || bj >= n_b {
                continue;
            }
            // Padding assignments carry no edge and are not matches.
            if let Some(&w) = weights.get(&(ai, bj)) {
                pairs.push((ai, bj, w));
            }
        }
        pairs.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        Ok(pairs)
    }
}

/// Greedy fallback: edges sorted by weight descending (ties broken by index
/// order for reproducibility), accepted when neither endpoint is taken.
pub struct GreedyMatching;

impl MatchingStrategy for GreedyMatching {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn run(&self, n_a: usize, n_b: usize, weights: &EdgeWeights) -> Result<Vec<MatchedPair>, String> {
        let mut edges: Vec<MatchedPair> =
            weights.iter().map(|(&(i, j), &w)| (i, j, w)).collect();
        edges.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (a.0, a.1).cmp(&(b.0, b.1)))
        });

        let mut used_a = vec![false; n_a];
        let mut used_b = vec![false; n_b];
        let mut pairs = Vec::new();
        for (i, j, w) in edges {
            if used_a[i] || used_b[j] {
                continue;
            }
            used_a[i] = true;
            used_b[j] = true;
            pairs.push((i, j, w));
        }
        Ok(pairs)
    }
}

/// Runs the strategy ladder, returning the matching and the name of the
/// strategy that produced it.
///
/// # Errors
///
/// Returns an error only if every strategy in the ladder fails.
pub fn run_ladder(
    strategies: &[&dyn MatchingStrategy],
    n_a: usize,
    n_b: usize,
    weights: &EdgeWeights,
) -> Result<(Vec<MatchedPair>, &'static str), String> {
    let mut last_err = String::from("no matching strategy configured");
    for strategy in strategies {
        match strategy.run(n_a, n_b, weights) {
            Ok(pairs) => return Ok((pairs, strategy.name())),
            Err(e) => last_err = format!("{}: {e}", strategy.name()),
        }
    }
    Err(last_err)
}
