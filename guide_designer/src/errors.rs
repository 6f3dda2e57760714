use std::path::PathBuf;

use thiserror::Error;

/// Rejected weight tables. Raised while loading, never while scoring.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("efficiency entry ({position}, {subsequence}) falls outside the {context_len}-base context")]
    PositionOutOfRange {
        position: usize,
        subsequence: String,
        context_len: usize,
    },
    #[error("efficiency entry at position {position} has invalid subsequence '{subsequence}'")]
    InvalidSubsequence { position: usize, subsequence: String },
    #[error("penalty row '{key}' must have {expected} positions, got {found}")]
    WrongRowLength {
        key: String,
        expected: usize,
        found: usize,
    },
    #[error("penalty key '{0}' is not of the form rX:dY")]
    InvalidKey(String),
    #[error("penalty row '{key}' has weight {weight} at position {position}, expected a value in [0, 1]")]
    WeightOutOfRange {
        key: String,
        position: usize,
        weight: f64,
    },
    #[error("failed to read weight tables from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse weight tables from {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected '{found}' at offset {offset} in mismatch descriptor '{descriptor}'")]
    Malformed {
        descriptor: String,
        offset: usize,
        found: char,
    },
    #[error("mismatch at position {position} lies outside the {guide_len}-base guide")]
    PositionOutOfRange { position: usize, guide_len: usize },
}

#[derive(Debug, Error)]
pub enum AlignerError {
    #[error("aligner executable not found: {0}")]
    NotFound(String),
    #[error("failed to launch aligner: {0}")]
    Launch(#[from] std::io::Error),
    #[error("aligner exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("failed to read hit table {path}: {source}")]
    HitTable { path: PathBuf, source: csv::Error },
}

#[derive(Debug, Error)]
pub enum PrimerError {
    #[error("primer3 executable not found: {0}")]
    NotFound(String),
    #[error("failed to run primer3: {0}")]
    Io(#[from] std::io::Error),
    #[error("primer3 exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("primer3 reported an error: {0}")]
    Reported(String),
    #[error("primer3 returned no primer pair")]
    NoPrimers,
    #[error("target region {start}+{len} lies outside the {template_len}-base template")]
    RegionOutOfRange {
        start: usize,
        len: usize,
        template_len: usize,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open FASTA {path}: {message}")]
    Open { path: PathBuf, message: String },
    #[error("failed to read {chromosome}:{start}-{end}: {source}")]
    Read {
        chromosome: String,
        start: u64,
        end: u64,
        source: std::io::Error,
    },
    #[error("invalid coordinates {start}-{end}: expected 1-based inclusive with start <= end")]
    InvalidRange { start: u64, end: u64 },
    #[error("unknown genome '{0}'")]
    UnknownGenome(String),
    #[error("FASTA reader lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("failed to read annotation {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("line {line}: invalid coordinate '{value}'")]
    InvalidCoordinate { line: usize, value: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Tables(#[from] TableError),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure of [`crate::pipeline::analyze_region`]; scoring itself never fails.
#[derive(Debug, Error)]
pub enum RegionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no sequence for {chromosome}:{start}-{end}")]
    NotFound {
        chromosome: String,
        start: u64,
        end: u64,
    },
}
