//! Agglomerative (bottom-up) clustering with average linkage
//!
//! Starts from singletons and repeatedly merges the pair of clusters with the
//! highest average inter-cluster edge weight.

use super::common::GraphView;
use std::collections::BTreeMap;

/// Agglomerative clustering parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AgglomerativeConfig {
    /// Stop once this many clusters (or fewer) remain
    pub max_clusters: usize,
    /// Stop once the best available average linkage falls below this
    pub min_similarity: f64,
}

impl Default for AgglomerativeConfig {
    fn default() -> Self {
        Self {
            max_clusters: 8,
            min_similarity: 0.3,
        }
    }
}

/// Average-linkage clustering over the edge weights in `view`.
///
/// The average linkage of clusters A and B is the sum of edge weights between
/// them divided by `|A| * |B|`. Pairs with no connecting edge are never merged.
/// Returns member index groups ordered by their smallest member.
pub fn average_linkage(view: &GraphView, config: &AgglomerativeConfig) -> Vec<Vec<usize>> {
    let n = view.node_count;
    let mut members: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();

    // Summed edge weight between active clusters, keyed by (low, high) cluster id
    let mut links: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for u in 0..n {
        for (&v, &w) in view.neighbors(u).iter().zip(view.neighbor_weights(u)) {
            if u < v {
                *links.entry((u, v)).or_insert(0.0) += w;
            }
        }
    }

    let mut active = n;
    while active > config.max_clusters.max(1) {
        let mut best: Option<((usize, usize), f64)> = None;
        for (&(a, b), &sum) in &links {
            let size_a = members[a].as_ref().map_or(0, Vec::len);
            let size_b = members[b].as_ref().map_or(0, Vec::len);
            if size_a == 0 || size_b == 0 {
                continue;
            }
            let avg = sum / (size_a * size_b) as f64;
            if best.map_or(true, |(_, best_avg)| avg > best_avg) {
                best = Some(((a, b), avg));
            }
        }

        let Some(((a, b), avg)) = best else {
            break;
        };
        if avg < config.min_similarity {
            break;
        }

        // Merge b into a (a < b keeps every cluster id equal to its smallest member)
        let absorbed = members[b].take().unwrap_or_default();
        if let Some(target) = members[a].as_mut() {
            target.extend(absorbed);
        }
        links.remove(&(a, b));

        let moved: Vec<((usize, usize), f64)> = links
            .iter()
            .filter(|(key, _)| key.0 == b || key.1 == b)
            .map(|(&k, &v)| (k, v))
            .collect();
        for ((x, y), sum) in moved {
            links.remove(&(x, y));
            let other = if x == b { y } else { x };
            let key = (a.min(other), a.max(other));
            *links.entry(key).or_insert(0.0) += sum;
        }

        active -= 1;
    }

    members
        .into_iter()
        .flatten()
        .map(|mut group| {
            group.sort_unstable();
            group
        })
        .collect()
}
