//! Category breadcrumb resolution.

use std::collections::HashMap;

use serde_json::Value;

use crate::catalog::store::{coerce_int, entry_id, entry_name};
use crate::models::TaxonomyRef;

/// Hop limit on the parent-chain walk. Corrupt taxonomy data with a parent
/// cycle yields a truncated chain instead of an infinite loop.
const MAX_PARENT_HOPS: usize = 50;

/// Resolve breadcrumb paths for a set of category assignments.
///
/// For each id, the parent chain is walked upward and reversed into
/// root→leaf order. The result is the union, in first-seen order and
/// without exact duplicates, of every chain and all of its trailing
/// sub-chains: a chain `A→B→C` contributes `[A,B,C]`, `[B,C]` and `[C]`.
pub fn compute_category_paths(
    category_ids: &[i64],
    categories_by_id: &HashMap<i64, Value>,
) -> Vec<Vec<TaxonomyRef>> {
    let mut paths: Vec<Vec<TaxonomyRef>> = Vec::new();

    for &cid in category_ids {
        let mut chain: Vec<TaxonomyRef> = Vec::new();
        let mut cur = categories_by_id.get(&cid);
        let mut hops = 0;

        while let Some(entry) = cur {
            if hops >= MAX_PARENT_HOPS {
                break;
            }
            let Some(id) = entry_id(entry) else {
                break;
            };
            let mut name = entry_name(entry);
            if name.is_empty() {
                name = id.to_string();
            }
            chain.push(TaxonomyRef { id, name });

            let parent_id = entry.get("id_parent").and_then(coerce_int).unwrap_or(0);
            if parent_id <= 0 {
                break;
            }
            cur = categories_by_id.get(&parent_id);
            hops += 1;
        }

        chain.reverse();
        for cut in 0..chain.len() {
            let sub = chain[cut..].to_vec();
            if !paths.contains(&sub) {
                paths.push(sub);
            }
        }
    }

    paths
}
