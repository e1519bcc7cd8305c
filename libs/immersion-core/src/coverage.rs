//! Comprehension, set-cover and comprehension-prediction algorithms.
//!
//! Everything here works on in-memory lemma sets; loading those sets from
//! storage is the caller's job. The greedy searches check a [`CancelToken`]
//! once per outer iteration.

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::types::{CardId, DictFormId, TextId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Distinct dictionary forms referenced by one text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextLemmas {
    pub text_id: TextId,
    pub lemmas: BTreeSet<DictFormId>,
}

impl TextLemmas {
    pub fn new(text_id: TextId, lemmas: impl IntoIterator<Item = DictFormId>) -> Self {
        Self {
            text_id,
            lemmas: lemmas.into_iter().collect(),
        }
    }
}

/// A card considered for study, with the unknown lemmas of its sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCard {
    pub card_id: CardId,
    pub unknown: BTreeSet<DictFormId>,
}

impl CandidateCard {
    pub fn new(card_id: CardId, unknown: impl IntoIterator<Item = DictFormId>) -> Self {
        Self {
            card_id,
            unknown: unknown.into_iter().collect(),
        }
    }
}

/// Outcome of a comprehension prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Average comprehension of the studying texts before any card is learned.
    pub baseline: f64,
    /// Simulated average after learning the chosen cards.
    pub final_average: f64,
    /// `final_average - baseline`.
    pub delta: f64,
    /// Cards picked, in the order they were picked.
    pub chosen: Vec<CardId>,
}

/// Percentage of `lemmas` that are known. A text with no lemmas is 100%.
pub fn comprehension_percentage(lemmas: &BTreeSet<DictFormId>, known: &HashSet<DictFormId>) -> f64 {
    percentage_with(lemmas, |id| known.contains(&id))
}

/// Mean comprehension over `texts`. No texts at all is defined as 100%.
pub fn average_comprehension(texts: &[TextLemmas], known: &HashSet<DictFormId>) -> f64 {
    average_with(texts, |id| known.contains(&id))
}

fn percentage_with(lemmas: &BTreeSet<DictFormId>, is_known: impl Fn(DictFormId) -> bool) -> f64 {
    if lemmas.is_empty() {
        return 100.0;
    }
    let known_count = lemmas.iter().filter(|id| is_known(**id)).count();
    known_count as f64 / lemmas.len() as f64 * 100.0
}

fn average_with(texts: &[TextLemmas], is_known: impl Fn(DictFormId) -> bool) -> f64 {
    if texts.is_empty() {
        return 100.0;
    }
    let total: f64 = texts
        .iter()
        .map(|t| percentage_with(&t.lemmas, &is_known))
        .sum();
    total / texts.len() as f64
}

/// Greedy maximum-coverage selection of texts.
///
/// Each round picks the not-yet-chosen candidate covering the most still
/// uncovered targets; the first candidate wins ties. Stops when every target
/// is covered, when no candidate adds coverage, or after `limit` texts.
/// This is the usual (1 - 1/e) approximation, not an optimal cover.
pub fn greedy_set_cover(
    targets: &BTreeSet<DictFormId>,
    candidates: &[TextLemmas],
    limit: Option<usize>,
    cancel: &CancelToken,
) -> Result<Vec<TextId>> {
    let mut uncovered = targets.clone();
    let mut taken = vec![false; candidates.len()];
    let mut chosen: Vec<TextId> = Vec::new();

    while !uncovered.is_empty() && limit.map_or(true, |l| chosen.len() < l) {
        cancel.check()?;

        let mut best: Option<usize> = None;
        let mut best_count = 0;
        for (i, candidate) in candidates.iter().enumerate() {
            if taken[i] || chosen.contains(&candidate.text_id) {
                continue;
            }
            let count = candidate.lemmas.intersection(&uncovered).count();
            if count > best_count {
                best_count = count;
                best = Some(i);
            }
        }

        let Some(i) = best else {
            break;
        };
        taken[i] = true;
        chosen.push(candidates[i].text_id);
        uncovered.retain(|id| !candidates[i].lemmas.contains(id));
    }

    Ok(chosen)
}

/// A card is obtainable when every unknown lemma of its sentence appears in
/// the chosen material. Cards without unknown lemmas always are.
pub fn is_obtainable(unknown: &BTreeSet<DictFormId>, covered: &HashSet<DictFormId>) -> bool {
    unknown.iter().all(|id| covered.contains(id))
}

/// Greedy marginal-gain simulation of learning up to `max_cards` cards.
///
/// Every round re-evaluates the average comprehension of `studying` for each
/// remaining candidate as if its unknown lemmas were known, and commits the
/// candidate with the largest strictly positive gain. Stops early once no
/// candidate improves the average.
///
/// Cost is O(max_cards * candidates * studying texts); fine for tens to low
/// hundreds of each, not for whole-library corpora.
pub fn predict_comprehension_increase(
    pool: &[CandidateCard],
    studying: &[TextLemmas],
    mut known: HashSet<DictFormId>,
    max_cards: usize,
    cancel: &CancelToken,
) -> Result<Prediction> {
    let baseline = average_comprehension(studying, &known);
    let mut current = baseline;
    let mut remaining: Vec<&CandidateCard> = pool.iter().collect();
    let mut chosen = Vec::new();

    for _ in 0..max_cards {
        cancel.check()?;

        let mut best: Option<usize> = None;
        let mut best_gain = 0.0;
        for (i, card) in remaining.iter().enumerate() {
            if card.unknown.is_empty() {
                continue;
            }
            let avg = average_with(studying, |id| {
                known.contains(&id) || card.unknown.contains(&id)
            });
            let gain = avg - current;
            if gain > best_gain {
                best_gain = gain;
                best = Some(i);
            }
        }

        let Some(i) = best else {
            break;
        };
        let card = remaining.remove(i);
        known.extend(card.unknown.iter().copied());
        chosen.push(card.card_id);
        current = average_comprehension(studying, &known);
    }

    Ok(Prediction {
        baseline,
        final_average: current,
        delta: current - baseline,
        chosen,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    fn set(ids: &[DictFormId]) -> BTreeSet<DictFormId> {
        ids.iter().copied().collect()
    }

    fn known(ids: &[DictFormId]) -> HashSet<DictFormId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_comprehension_of_empty_text_is_full() {
        assert_eq!(comprehension_percentage(&BTreeSet::new(), &known(&[])), 100.0);
    }

    #[test]
    fn test_comprehension_counts_known_share() {
        let lemmas = set(&[1, 2, 3, 4]);
        assert_eq!(comprehension_percentage(&lemmas, &known(&[])), 0.0);
        assert_eq!(comprehension_percentage(&lemmas, &known(&[1])), 25.0);
        assert_eq!(comprehension_percentage(&lemmas, &known(&[1, 2, 3, 4, 99])), 100.0);
    }

    #[test]
    fn test_comprehension_stays_in_bounds() {
        let lemmas = set(&[5, 6, 7]);
        for k in [known(&[]), known(&[5]), known(&[5, 6]), known(&[5, 6, 7, 8])] {
            let pct = comprehension_percentage(&lemmas, &k);
            assert!((0.0..=100.0).contains(&pct));
        }
    }

    #[test]
    fn test_average_with_no_texts() {
        assert_eq!(average_comprehension(&[], &known(&[1])), 100.0);
    }

    #[test]
    fn test_set_cover_needs_both_texts() {
        let (a, b, c) = (1, 2, 3);
        let candidates = vec![TextLemmas::new(10, [a, b]), TextLemmas::new(20, [b, c])];
        let mut chosen =
            greedy_set_cover(&set(&[a, b, c]), &candidates, None, &CancelToken::new()).unwrap();
        chosen.sort();
        assert_eq!(chosen, vec![10, 20]);
    }

    #[test]
    fn test_set_cover_prefers_largest_gain_then_first() {
        let candidates = vec![
            TextLemmas::new(1, [1]),
            TextLemmas::new(2, [1, 2, 3]),
            TextLemmas::new(3, [2, 3, 4]),
            TextLemmas::new(4, [4]),
        ];
        let chosen =
            greedy_set_cover(&set(&[1, 2, 3, 4]), &candidates, None, &CancelToken::new()).unwrap();
        // 2 and 3 tie on the first round; 2 is encountered first.
        assert_eq!(chosen, vec![2, 3]);
    }

    #[test]
    fn test_set_cover_stops_when_nothing_helps() {
        let candidates = vec![TextLemmas::new(1, [1]), TextLemmas::new(2, [7, 8])];
        let chosen =
            greedy_set_cover(&set(&[1, 2]), &candidates, None, &CancelToken::new()).unwrap();
        assert_eq!(chosen, vec![1]);
    }

    #[test]
    fn test_set_cover_respects_limit_and_is_monotone() {
        let candidates = vec![
            TextLemmas::new(1, [1, 2, 3]),
            TextLemmas::new(2, [4, 5]),
            TextLemmas::new(3, [6]),
        ];
        let targets = set(&[1, 2, 3, 4, 5, 6]);
        let token = CancelToken::new();

        let union = |ids: &[TextId]| -> BTreeSet<DictFormId> {
            candidates
                .iter()
                .filter(|c| ids.contains(&c.text_id))
                .flat_map(|c| c.lemmas.iter().copied())
                .collect()
        };

        let unlimited = greedy_set_cover(&targets, &candidates, None, &token).unwrap();
        for limit in 0..=3 {
            let limited = greedy_set_cover(&targets, &candidates, Some(limit), &token).unwrap();
            assert!(limited.len() <= limit);
            assert!(union(&unlimited).is_superset(&union(&limited)));
        }
    }

    #[test]
    fn test_set_cover_empty_inputs() {
        let token = CancelToken::new();
        assert!(greedy_set_cover(&BTreeSet::new(), &[TextLemmas::new(1, [1])], None, &token)
            .unwrap()
            .is_empty());
        assert!(greedy_set_cover(&set(&[1]), &[], None, &token).unwrap().is_empty());
    }

    #[test]
    fn test_set_cover_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let result = greedy_set_cover(&set(&[1]), &[TextLemmas::new(1, [1])], None, &token);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_obtainable_when_all_unknowns_covered() {
        let covered = known(&[1, 2, 3]);
        assert!(is_obtainable(&set(&[1, 3]), &covered));
        assert!(!is_obtainable(&set(&[1, 4]), &covered));
        assert!(is_obtainable(&BTreeSet::new(), &known(&[])));
    }

    #[test]
    fn test_prediction_with_zero_cards_is_baseline() {
        let studying = vec![TextLemmas::new(1, [1, 2]), TextLemmas::new(2, [3])];
        let pool = vec![CandidateCard::new(100, [2])];
        let p = predict_comprehension_increase(&pool, &studying, known(&[1]), 0, &CancelToken::new())
            .unwrap();
        assert_eq!(p.baseline, 25.0);
        assert_eq!(p.final_average, 25.0);
        assert_eq!(p.delta, 0.0);
        assert!(p.chosen.is_empty());
    }

    #[test]
    fn test_prediction_picks_largest_gain_first() {
        // Text 1 = {1,2}, text 2 = {3}; nothing known.
        let studying = vec![TextLemmas::new(1, [1, 2]), TextLemmas::new(2, [3])];
        let pool = vec![
            CandidateCard::new(100, [1]), // +25
            CandidateCard::new(200, [3]), // +50
            CandidateCard::new(300, [2]), // +25
        ];
        let p = predict_comprehension_increase(&pool, &studying, known(&[]), 2, &CancelToken::new())
            .unwrap();
        assert_eq!(p.chosen, vec![200, 100]);
        assert_eq!(p.baseline, 0.0);
        assert_eq!(p.final_average, 75.0);
        assert_eq!(p.delta, 75.0);
    }

    #[test]
    fn test_prediction_stops_when_no_gain() {
        let studying = vec![TextLemmas::new(1, [1])];
        let pool = vec![
            CandidateCard::new(1, [1]),
            CandidateCard::new(2, [9]),
            CandidateCard::new(3, []),
        ];
        let p = predict_comprehension_increase(&pool, &studying, known(&[]), 5, &CancelToken::new())
            .unwrap();
        assert_eq!(p.chosen, vec![1]);
        assert_eq!(p.final_average, 100.0);
    }

    #[test]
    fn test_prediction_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let result = predict_comprehension_increase(
            &[CandidateCard::new(1, [1])],
            &[TextLemmas::new(1, [1])],
            HashSet::new(),
            3,
            &token,
        );
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
