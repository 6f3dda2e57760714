//! Scan → score → search → rank, for one sequence at a time.

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::errors::{RegionError, TableError};
use crate::helper_functions::{gc_content, normalize_sequence};
use crate::integrations::{OffTargetSearch, PrimerDesigner, SearchParams, SequenceStore, TargetRegion};
use crate::models::{CandidateSite, DegradedReason, PrimerResult, Score, ScoreRecord};
use crate::prediction_tools::candidate_scanner::{find_candidates, ScanOptions};
use crate::prediction_tools::cfd_specificity::calculate_specificity_score;
use crate::prediction_tools::doench_efficiency::calculate_efficiency_score;
use crate::prediction_tools::mismatch_decoder::DeletionPolicy;
use crate::prediction_tools::ranking::rank_guides;
use crate::prediction_tools::weight_tables::ScoringModel;

/// Bases kept upstream of the guide in the primer target region.
const PRIMER_REGION_LEAD: usize = 5;
const PRIMER_REGION_LEN: usize = 30;

/// Everything `analyze` needs: tables, options and the external tools.
pub struct Engine {
    model: ScoringModel,
    scan: ScanOptions,
    search: SearchParams,
    deletion_policy: DeletionPolicy,
    aligner: Box<dyn OffTargetSearch>,
    primers: Option<Box<dyn PrimerDesigner>>,
    pool: Option<ThreadPool>,
    region_padding: u64,
}

impl Engine {
    pub fn new(model: ScoringModel, aligner: Box<dyn OffTargetSearch>) -> Self {
        Engine {
            model,
            scan: ScanOptions::default(),
            search: SearchParams::default(),
            deletion_policy: DeletionPolicy::default(),
            aligner,
            primers: None,
            pool: None,
            region_padding: 0,
        }
    }

    /// Engine with tables and options taken from `config`. The primer
    /// designer is left to the caller.
    pub fn from_config(
        config: &EngineConfig,
        aligner: Box<dyn OffTargetSearch>,
    ) -> Result<Self, TableError> {
        let mut engine = Engine::new(config.scoring_model()?, aligner)
            .with_scan_options(config.scan.clone())
            .with_search_params(config.aligner.search)
            .with_deletion_policy(config.deletion_policy)
            .with_region_padding(config.region_padding);
        if let Some(threads) = config.threads {
            engine = engine.with_threads(threads);
        }
        Ok(engine)
    }

    pub fn with_scan_options(mut self, scan: ScanOptions) -> Self {
        self.scan = scan;
        self
    }

    pub fn with_search_params(mut self, search: SearchParams) -> Self {
        self.search = search;
        self
    }

    pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = policy;
        self
    }

    pub fn with_primer_designer(mut self, designer: Box<dyn PrimerDesigner>) -> Self {
        self.primers = Some(designer);
        self
    }

    pub fn with_region_padding(mut self, padding: u64) -> Self {
        self.region_padding = padding;
        self
    }

    /// Score on a dedicated pool of `threads` workers instead of rayon's
    /// global pool. If the pool cannot be built the global pool is used.
    pub fn with_threads(mut self, threads: usize) -> Self {
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => self.pool = Some(pool),
            Err(e) => warn!("Falling back to the global thread pool: {}", e),
        }
        self
    }

    pub fn model(&self) -> &ScoringModel {
        &self.model
    }

    fn primer_result(&self, template: &str, candidate: &CandidateSite) -> PrimerResult {
        let Some(designer) = &self.primers else {
            return PrimerResult::Unavailable {
                reason: "primer design disabled".to_string(),
            };
        };
        let region = TargetRegion {
            start: candidate.start.saturating_sub(PRIMER_REGION_LEAD),
            len: PRIMER_REGION_LEN,
        };
        match designer.design_primers(template, region) {
            Ok(pair) => PrimerResult::Designed(pair),
            Err(e) => {
                warn!("No primers for {} at {}: {}", candidate.guide_sequence, candidate.location(), e);
                PrimerResult::Unavailable { reason: e.to_string() }
            }
        }
    }

    fn score_candidate(&self, template: &str, candidate: &CandidateSite) -> ScoreRecord {
        let guide = &candidate.guide_sequence;
        let efficiency = calculate_efficiency_score(candidate.context.as_deref(), &self.model);

        let (specificity, off_target_count) = match self.aligner.find_near_matches(guide, &self.search) {
            Ok(hits) => {
                let value = calculate_specificity_score(guide, &hits, &self.model, self.deletion_policy);
                let count = hits.iter().filter(|h| h.mismatch_count > 0).count();
                (Score::computed(value), count)
            }
            Err(e) => {
                warn!("Off-target search failed for {}: {}", guide, e);
                (Score::degraded(100.0, DegradedReason::OffTargetSearchFailed), 0)
            }
        };

        let primers = self.primer_result(template, candidate);
        debug!(
            "{} {}: efficiency {:.2}, specificity {:.2}, {} off-targets",
            guide,
            candidate.location(),
            efficiency.value(),
            specificity.value(),
            off_target_count
        );

        ScoreRecord {
            guide_sequence: guide.clone(),
            pam: candidate.pam.clone(),
            start: candidate.start,
            end: candidate.end,
            location: candidate.location(),
            cut_site: candidate.cut_site(),
            gc_content: gc_content(guide),
            efficiency,
            specificity,
            off_target_count,
            primers,
        }
    }
}

/// Design and rank guides for `sequence`.
///
/// Per-candidate failures are logged and folded into the record; this never
/// fails and returns an empty list when no PAM site qualifies.
pub fn analyze(sequence: &str, engine: &Engine) -> Vec<ScoreRecord> {
    let template = normalize_sequence(sequence);
    let candidates = find_candidates(&template, &engine.scan);
    info!("Scoring {} candidate guides over {} bp", candidates.len(), template.len());

    let score_all = || {
        candidates
            .par_iter()
            .map(|candidate| engine.score_candidate(&template, candidate))
            .collect::<Vec<_>>()
    };
    let records = match &engine.pool {
        Some(pool) => pool.install(score_all),
        None => score_all(),
    };

    rank_guides(records)
}

/// Guides for a genomic window. Record offsets are relative to
/// `window_start` (1-based), which includes any padding.
#[derive(Debug, Clone)]
pub struct RegionAnalysis {
    pub chromosome: String,
    pub window_start: u64,
    pub records: Vec<ScoreRecord>,
}

impl RegionAnalysis {
    /// 1-based genomic coordinate of a record's first guide base.
    pub fn genomic_start(&self, record: &ScoreRecord) -> u64 {
        self.window_start + record.start as u64
    }
}

pub fn analyze_region(
    engine: &Engine,
    store: &dyn SequenceStore,
    chromosome: &str,
    start: u64,
    end: u64,
) -> Result<RegionAnalysis, RegionError> {
    let window_start = start.saturating_sub(engine.region_padding).max(1);
    let window_end = end.saturating_add(engine.region_padding);

    let sequence = store
        .lookup(chromosome, window_start, window_end)?
        .ok_or_else(|| RegionError::NotFound {
            chromosome: chromosome.to_string(),
            start,
            end,
        })?;
    info!("Fetched {}:{}-{} ({} bp)", chromosome, window_start, window_end, sequence.len());

    Ok(RegionAnalysis {
        chromosome: chromosome.to_string(),
        window_start,
        records: analyze(&sequence, engine),
    })
}
