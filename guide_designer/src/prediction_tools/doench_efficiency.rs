//! Doench 2014 (rule set 1) on-target efficiency.

use tracing::debug;

use crate::helper_functions::{is_unambiguous_dna, round2};
use crate::models::{DegradedReason, Score, CONTEXT_LEN, CONTEXT_UPSTREAM, GUIDE_LEN};
use crate::prediction_tools::weight_tables::ScoringModel;

/// Raw logistic-model input (before the sigmoid) for a validated 30-mer.
fn linear_score(context: &[u8], model: &ScoringModel) -> f64 {
    let guide = &context[CONTEXT_UPSTREAM..CONTEXT_UPSTREAM + GUIDE_LEN];
    let gc_count = guide.iter().filter(|&&b| b == b'G' || b == b'C').count() as f64;
    let gc_weight = if gc_count <= 10.0 { model.gc_low } else { model.gc_high };

    let mut score = model.intercept + (10.0 - gc_count).abs() * gc_weight;

    for feature in &model.features {
        let end = feature.offset + feature.subsequence.len();
        if context.get(feature.offset..end) == Some(feature.subsequence.as_slice()) {
            score += feature.coefficient;
        }
    }
    score
}

fn sigmoid(score: f64) -> f64 {
    let p = 1.0 / (1.0 + (-score).exp());
    if p.is_finite() {
        p
    } else {
        0.0
    }
}

/// Score a 30-mer context (4 bp + guide + PAM + 3 bp) on a 0-100 scale.
///
/// Missing, wrong-length or ambiguous contexts come back as a degraded 0.
pub fn calculate_efficiency_score(context: Option<&str>, model: &ScoringModel) -> Score {
    let Some(context) = context else {
        return Score::degraded(0.0, DegradedReason::MissingContext);
    };
    if context.len() != CONTEXT_LEN {
        debug!("Context must be {}nt long, got {}nt", CONTEXT_LEN, context.len());
        return Score::degraded(0.0, DegradedReason::InvalidContextLength);
    }
    if !is_unambiguous_dna(context) {
        debug!("Context {} contains non-ACGT bases", context);
        return Score::degraded(0.0, DegradedReason::InvalidBase);
    }

    let score = linear_score(context.as_bytes(), model);
    Score::computed(round2(sigmoid(score) * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ScoringModel {
        ScoringModel::standard().unwrap()
    }

    #[test]
    fn poly_a_guide_matches_hand_computation() {
        // intercept 0.59763615 + 10 * gcLow, plus 14 matching features:
        // total -4.31989953, sigmoid 0.013127
        let context = format!("GATC{}TGGCCC", "A".repeat(20));
        let score = calculate_efficiency_score(Some(&context), &model());
        assert_eq!(score, Score::computed(1.31));
    }

    #[test]
    fn linear_score_of_poly_a_guide() {
        let context = format!("GATC{}TGGCCC", "A".repeat(20));
        let raw = linear_score(context.as_bytes(), &model());
        assert!((raw - -4.31989953).abs() < 1e-8, "raw score was {}", raw);
    }

    #[test]
    fn deterministic() {
        let context = "TGGAGCTGACCTAGCTCGATCGAAGGGTCC";
        let a = calculate_efficiency_score(Some(context), &model());
        let b = calculate_efficiency_score(Some(context), &model());
        assert_eq!(a.value().to_bits(), b.value().to_bits());
        assert!(!a.is_degraded());
        assert!((0.0..=100.0).contains(&a.value()));
    }

    #[test]
    fn degraded_inputs_score_exactly_zero() {
        let m = model();

        let n_guide = format!("GATC{}TGGCCC", "N".repeat(20));
        let score = calculate_efficiency_score(Some(&n_guide), &m);
        assert_eq!(score.value(), 0.0);
        assert_eq!(score.degraded_reason(), Some(DegradedReason::InvalidBase));

        let short = "GATCAAAAAAAAAAAAAAAAAAAATGGCC";
        let score = calculate_efficiency_score(Some(short), &m);
        assert_eq!(score.value(), 0.0);
        assert_eq!(score.degraded_reason(), Some(DegradedReason::InvalidContextLength));

        let score = calculate_efficiency_score(None, &m);
        assert_eq!(score.value(), 0.0);
        assert_eq!(score.degraded_reason(), Some(DegradedReason::MissingContext));
    }

    #[test]
    fn gc_slopes_differ_above_and_below_ten() {
        let mut m = model();
        m.features.clear();
        m.intercept = 0.0;

        // 5 G/C -> 5 * gcLow, 15 G/C -> 5 * gcHigh
        let low = format!("AAAA{}{}AGGAAA", "G".repeat(5), "A".repeat(15));
        let high = format!("AAAA{}{}AGGAAA", "G".repeat(15), "A".repeat(5));
        let low_raw = linear_score(low.as_bytes(), &m);
        let high_raw = linear_score(high.as_bytes(), &m);
        assert!((low_raw - 5.0 * m.gc_low).abs() < 1e-12);
        assert!((high_raw - 5.0 * m.gc_high).abs() < 1e-12);
    }

    #[test]
    fn sigmoid_saturates_without_nan() {
        assert_eq!(sigmoid(-1.0e6), 0.0);
        assert_eq!(sigmoid(1.0e6), 1.0);
        assert_eq!(sigmoid(f64::NAN), 0.0);
    }
}
