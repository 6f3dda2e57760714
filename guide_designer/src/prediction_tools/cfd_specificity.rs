//! CFD-style off-target specificity.

use tracing::{debug, warn};

use crate::helper_functions::{complement, round2};
use crate::models::{MismatchRecord, OffTargetHit};
use crate::prediction_tools::mismatch_decoder::{decode_for_guide, DeletionPolicy};
use crate::prediction_tools::weight_tables::ScoringModel;

/// Product of CFD weights over one site's mismatches.
///
/// The guide base pairs with the complement of the reference base, which is
/// how the penalty rows are keyed.
pub fn cutting_probability(mismatches: &[MismatchRecord], model: &ScoringModel) -> f64 {
    mismatches
        .iter()
        .map(|m| {
            let target = complement(m.reference_base).unwrap_or('N');
            model.penalty(m.read_base, target, m.position)
        })
        .product()
}

/// Sum of cutting probabilities over all hits that are not the on-target site.
///
/// Hits whose descriptor cannot be decoded count as certain cutters.
pub fn aggregate_risk(
    guide: &str,
    hits: &[OffTargetHit],
    model: &ScoringModel,
    policy: DeletionPolicy,
) -> f64 {
    hits.iter()
        .filter(|hit| hit.mismatch_count > 0)
        .map(|hit| {
            match decode_for_guide(&hit.mismatch_descriptor, guide, hit.strand, policy) {
                Ok(mismatches) => {
                    let p = cutting_probability(&mismatches, model);
                    debug!(
                        "{} at {}:{} ({} mm, MD {}): p = {:.4}",
                        guide, hit.chromosome, hit.position, hit.mismatch_count, hit.mismatch_descriptor, p
                    );
                    p
                }
                Err(e) => {
                    warn!("Treating {}:{} as a full cutter for {}: {}", hit.chromosome, hit.position, guide, e);
                    1.0
                }
            }
        })
        .sum()
}

/// `100 / (1 + aggregate risk)`, two decimals. No off-targets gives 100.
pub fn calculate_specificity_score(
    guide: &str,
    hits: &[OffTargetHit],
    model: &ScoringModel,
    policy: DeletionPolicy,
) -> f64 {
    round2(100.0 / (1.0 + aggregate_risk(guide, hits, model, policy)))
}
