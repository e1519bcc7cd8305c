//! Frequency ranking of dictionary forms.

use crate::types::DictFormId;

/// Assign ranks 1..=N by descending total frequency.
///
/// Equal totals are ordered by ascending dictionary form id so that a
/// ranking pass is reproducible across runs.
pub fn assign_rankings(mut totals: Vec<(DictFormId, u64)>) -> Vec<(DictFormId, u32)> {
    totals.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    totals
        .into_iter()
        .enumerate()
        .map(|(i, (id, _))| (id, i as u32 + 1))
        .collect()
}
