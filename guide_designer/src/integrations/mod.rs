//! External collaborators of the scoring engine: aligner, primer designer
//! and sequence store, each behind a trait so tests can script them.

pub mod bowtie2_integration;
pub mod fasta_store;
pub mod gene_annotation;
pub mod hit_table;
pub mod primer3_integration;

use serde::{Deserialize, Serialize};

use crate::errors::{AlignerError, PrimerError, StoreError};
use crate::models::{OffTargetHit, PrimerPair};

/// Limits handed to the aligner for every guide query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub max_hits: usize,
    pub max_mismatches: u8,
    pub seed_length: u8,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            max_hits: 20,
            max_mismatches: 1,
            seed_length: 20,
        }
    }
}

/// Genome-wide near-match search for a single guide.
///
/// A guide with no matches anywhere is `Ok(vec![])`, not an error.
pub trait OffTargetSearch: Send + Sync {
    fn find_near_matches(
        &self,
        guide: &str,
        params: &SearchParams,
    ) -> Result<Vec<OffTargetHit>, AlignerError>;
}

/// Stand-in when no aligner could be set up: every query fails, so each
/// guide is reported with a degraded specificity instead of a made-up one.
#[derive(Debug, Clone)]
pub struct UnavailableSearch {
    pub reason: String,
}

impl OffTargetSearch for UnavailableSearch {
    fn find_near_matches(&self, _: &str, _: &SearchParams) -> Result<Vec<OffTargetHit>, AlignerError> {
        Err(AlignerError::NotFound(self.reason.clone()))
    }
}

/// Stretch of the template (0-based start, length) the primers must flank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetRegion {
    pub start: usize,
    pub len: usize,
}

pub trait PrimerDesigner: Send + Sync {
    fn design_primers(&self, template: &str, region: TargetRegion) -> Result<PrimerPair, PrimerError>;
}

/// Random access to genomic sequence, 1-based inclusive coordinates.
pub trait SequenceStore: Send + Sync {
    fn lookup(&self, chromosome: &str, start: u64, end: u64) -> Result<Option<String>, StoreError>;
}
