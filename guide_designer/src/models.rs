use serde::{Deserialize, Serialize};

pub const GUIDE_LEN: usize = 20;
pub const PAM_LEN: usize = 3;
/// Bases of context kept upstream of the guide.
pub const CONTEXT_UPSTREAM: usize = 4;
/// Bases of context kept downstream of the PAM.
pub const CONTEXT_DOWNSTREAM: usize = 3;
pub const CONTEXT_LEN: usize = CONTEXT_UPSTREAM + GUIDE_LEN + PAM_LEN + CONTEXT_DOWNSTREAM;

/// A PAM-adjacent protospacer found in the input sequence.
///
/// `start` is the first guide base and `end` is one past the last PAM base,
/// both 0-based offsets into the scanned sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateSite {
    pub guide_sequence: String,
    pub pam: String,
    pub start: usize,
    pub end: usize,
    pub context: Option<String>,
}

impl CandidateSite {
    pub fn pam_start(&self) -> usize {
        self.start + GUIDE_LEN
    }

    /// Cas9 cuts 3 bp upstream of the PAM.
    pub fn cut_site(&self) -> usize {
        self.pam_start() - 3
    }

    pub fn location(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Strand {
    #[default]
    #[serde(rename = "+")]
    Forward,
    #[serde(rename = "-")]
    Reverse,
}

impl Strand {
    pub fn symbol(&self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

/// One near-match reported by the aligner for a guide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffTargetHit {
    pub chromosome: String,
    pub position: u64,
    pub mismatch_count: u32,
    pub mismatch_descriptor: String,
    #[serde(default)]
    pub strand: Strand,
}

/// A single mismatch in guide orientation.
///
/// `position` is 1-based from the PAM-distal end (20 is next to the PAM).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MismatchRecord {
    pub position: usize,
    pub reference_base: char,
    pub read_base: char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedReason {
    MissingContext,
    InvalidContextLength,
    InvalidBase,
    OffTargetSearchFailed,
}

/// A 0-100 score that remembers whether it was really computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Score {
    Computed { value: f64 },
    Degraded { value: f64, reason: DegradedReason },
}

impl Score {
    pub fn computed(value: f64) -> Self {
        Score::Computed { value }
    }

    pub fn degraded(value: f64, reason: DegradedReason) -> Self {
        Score::Degraded { value, reason }
    }

    pub fn value(&self) -> f64 {
        match *self {
            Score::Computed { value } | Score::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Score::Degraded { .. })
    }

    pub fn degraded_reason(&self) -> Option<DegradedReason> {
        match *self {
            Score::Computed { .. } => None,
            Score::Degraded { reason, .. } => Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimerPair {
    pub left: String,
    pub right: String,
    pub product_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PrimerResult {
    Designed(PrimerPair),
    Unavailable { reason: String },
}

impl PrimerResult {
    pub fn left(&self) -> &str {
        match self {
            PrimerResult::Designed(pair) => &pair.left,
            PrimerResult::Unavailable { .. } => "N/A",
        }
    }

    pub fn right(&self) -> &str {
        match self {
            PrimerResult::Designed(pair) => &pair.right,
            PrimerResult::Unavailable { .. } => "N/A",
        }
    }

    pub fn product_size(&self) -> Option<u32> {
        match self {
            PrimerResult::Designed(pair) => Some(pair.product_size),
            PrimerResult::Unavailable { .. } => None,
        }
    }
}

/// Scored guide as handed to the ranker and the report writers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRecord {
    pub guide_sequence: String,
    pub pam: String,
    pub start: usize,
    pub end: usize,
    pub location: String,
    pub cut_site: usize,
    pub gc_content: f64,
    pub efficiency: Score,
    pub specificity: Score,
    pub off_target_count: usize,
    pub primers: PrimerResult,
}
