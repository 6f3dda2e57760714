use std::cmp::Ordering;

use crate::models::ScoreRecord;

fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

/// Sort by specificity, then efficiency, both descending.
///
/// `sort_by` is stable, so exact ties keep scan order.
pub fn rank_guides(mut records: Vec<ScoreRecord>) -> Vec<ScoreRecord> {
    records.sort_by(|a, b| {
        descending(a.specificity.value(), b.specificity.value())
            .then_with(|| descending(a.efficiency.value(), b.efficiency.value()))
    });
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PrimerResult, Score};

    fn record(start: usize, specificity: f64, efficiency: f64) -> ScoreRecord {
        ScoreRecord {
            guide_sequence: "A".repeat(20),
            pam: "AGG".into(),
            start,
            end: start + 23,
            location: format!("{}-{}", start, start + 23),
            cut_site: start + 17,
            gc_content: 0.0,
            efficiency: Score::computed(efficiency),
            specificity: Score::computed(specificity),
            off_target_count: 0,
            primers: PrimerResult::Unavailable { reason: "disabled".into() },
        }
    }

    fn starts(records: &[ScoreRecord]) -> Vec<usize> {
        records.iter().map(|r| r.start).collect()
    }

    #[test]
    fn specificity_first_then_efficiency() {
        let ranked = rank_guides(vec![
            record(0, 50.0, 90.0),
            record(1, 100.0, 10.0),
            record(2, 100.0, 60.0),
            record(3, 75.0, 99.0),
        ]);
        assert_eq!(starts(&ranked), vec![2, 1, 3, 0]);
    }

    #[test]
    fn exact_ties_keep_scan_order() {
        let ranked = rank_guides(vec![
            record(5, 80.0, 40.0),
            record(9, 100.0, 40.0),
            record(12, 80.0, 40.0),
            record(20, 80.0, 40.0),
        ]);
        assert_eq!(starts(&ranked), vec![9, 5, 12, 20]);
    }

    #[test]
    fn degraded_scores_rank_by_their_value() {
        let mut low = record(0, 100.0, 0.0);
        low.efficiency = Score::degraded(0.0, crate::models::DegradedReason::MissingContext);
        let ranked = rank_guides(vec![low, record(1, 100.0, 5.0)]);
        assert_eq!(starts(&ranked), vec![1, 0]);
    }

    #[test]
    fn empty_input() {
        assert!(rank_guides(Vec::new()).is_empty());
    }
}
