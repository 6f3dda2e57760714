//! CRISPR-Cas9 guide design: find NGG sites, score on-target efficiency
//! (Doench 2014) and off-target specificity (CFD), rank the guides.

pub mod config;
pub mod errors;
pub mod helper_functions;
pub mod integrations;
pub mod models;
pub mod pipeline;
pub mod prediction_tools;
pub mod report;

pub use pipeline::{analyze, analyze_region, Engine, RegionAnalysis};
