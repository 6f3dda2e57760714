use std::fs::File;
use std::path::Path;

use polars::df;
use polars::prelude::*;
use tracing::info;

use crate::errors::ReportError;
use crate::models::{DegradedReason, Score, ScoreRecord};

fn reason_label(reason: DegradedReason) -> &'static str {
    match reason {
        DegradedReason::MissingContext => "missing_context",
        DegradedReason::InvalidContextLength => "invalid_context_length",
        DegradedReason::InvalidBase => "invalid_base",
        DegradedReason::OffTargetSearchFailed => "off_target_search_failed",
    }
}

fn status_label(score: &Score) -> String {
    match score.degraded_reason() {
        None => "computed".to_string(),
        Some(reason) => format!("degraded:{}", reason_label(reason)),
    }
}

/// One row per ranked guide, rank starting at 1.
pub fn to_dataframe(records: &[ScoreRecord]) -> PolarsResult<DataFrame> {
    let rank: Vec<u32> = (1..=records.len() as u32).collect();
    let guide: Vec<&str> = records.iter().map(|r| r.guide_sequence.as_str()).collect();
    let pam: Vec<&str> = records.iter().map(|r| r.pam.as_str()).collect();
    let location: Vec<&str> = records.iter().map(|r| r.location.as_str()).collect();
    let start: Vec<u64> = records.iter().map(|r| r.start as u64).collect();
    let end: Vec<u64> = records.iter().map(|r| r.end as u64).collect();
    let cut_site: Vec<u64> = records.iter().map(|r| r.cut_site as u64).collect();
    let gc: Vec<f64> = records.iter().map(|r| r.gc_content).collect();
    let efficiency: Vec<f64> = records.iter().map(|r| r.efficiency.value()).collect();
    let efficiency_status: Vec<String> = records.iter().map(|r| status_label(&r.efficiency)).collect();
    let specificity: Vec<f64> = records.iter().map(|r| r.specificity.value()).collect();
    let specificity_status: Vec<String> = records.iter().map(|r| status_label(&r.specificity)).collect();
    let off_targets: Vec<u64> = records.iter().map(|r| r.off_target_count as u64).collect();
    let primer_left: Vec<&str> = records.iter().map(|r| r.primers.left()).collect();
    let primer_right: Vec<&str> = records.iter().map(|r| r.primers.right()).collect();
    let product_size: Vec<Option<u32>> = records.iter().map(|r| r.primers.product_size()).collect();

    df![
        "rank" => rank,
        "guide" => guide,
        "pam" => pam,
        "location" => location,
        "start" => start,
        "end" => end,
        "cut_site" => cut_site,
        "gc_content" => gc,
        "efficiency" => efficiency,
        "efficiency_status" => efficiency_status,
        "specificity" => specificity,
        "specificity_status" => specificity_status,
        "off_target_count" => off_targets,
        "primer_left" => primer_left,
        "primer_right" => primer_right,
        "product_size" => product_size
    ]
}

/// Write the ranked guides as CSV (`b','`) or TSV (`b'\t'`).
pub fn write_table(records: &[ScoreRecord], path: &Path, separator: u8) -> Result<(), ReportError> {
    let mut df = to_dataframe(records)?;
    let mut file = File::create(path)?;

    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(separator)
        .finish(&mut df)?;

    info!("Wrote {} guides to {}", df.height(), path.display());
    Ok(())
}

pub fn write_json(records: &[ScoreRecord], path: &Path) -> Result<(), ReportError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, records)?;
    info!("Wrote {} guides to {}", records.len(), path.display());
    Ok(())
}
