use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, error};

use crate::config::AlignerSettings;
use crate::errors::AlignerError;
use crate::helper_functions::resolve_path;
use crate::integrations::{OffTargetSearch, SearchParams};
use crate::models::{OffTargetHit, Strand};
use crate::prediction_tools::mismatch_decoder::{decode_mismatch_positions, DeletionPolicy};

const SAM_FLAG_UNMAPPED: u16 = 0x4;
const SAM_FLAG_REVERSE: u16 = 0x10;

/// Off-target search through a local `bowtie2` install.
#[derive(Debug, Clone)]
pub struct Bowtie2Aligner {
    pub executable: PathBuf,
    pub index: PathBuf,
    pub launcher: Option<String>,
}

impl Bowtie2Aligner {
    pub fn from_settings(settings: &AlignerSettings) -> Result<Self, AlignerError> {
        let index = settings
            .index
            .as_ref()
            .map(|p| resolve_path(p))
            .ok_or_else(|| AlignerError::NotFound("no bowtie2 index configured".to_string()))?;

        let executable = match (&settings.executable, &settings.launcher) {
            (Some(path), _) => path.clone(),
            // Through a launcher the binary lives on the other side; leave it to that PATH.
            (None, Some(_)) => PathBuf::from("bowtie2"),
            (None, None) => which::which("bowtie2")
                .map_err(|e| AlignerError::NotFound(format!("bowtie2 ({})", e)))?,
        };

        Ok(Bowtie2Aligner {
            executable,
            index,
            launcher: settings.launcher.clone(),
        })
    }

    fn command(&self, guide: &str, params: &SearchParams) -> Command {
        let mut cmd = match &self.launcher {
            Some(launcher) => {
                let mut cmd = Command::new(launcher);
                cmd.arg(&self.executable);
                cmd
            }
            None => Command::new(&self.executable),
        };
        cmd.arg("-x")
            .arg(&self.index)
            .arg("-c")
            .arg(guide)
            .arg("-k")
            .arg(params.max_hits.to_string())
            .arg("-N")
            .arg(params.max_mismatches.to_string())
            .arg("-L")
            .arg(params.seed_length.to_string())
            .arg("--no-unal")
            .arg("--no-hd");
        cmd
    }
}

impl OffTargetSearch for Bowtie2Aligner {
    fn find_near_matches(
        &self,
        guide: &str,
        params: &SearchParams,
    ) -> Result<Vec<OffTargetHit>, AlignerError> {
        debug!("Executing bowtie2 for guide {} against {}", guide, self.index.display());

        let output = self.command(guide, params).output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("bowtie2 STDERR: {}", stderr);
            return Err(AlignerError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        let hits = parse_sam_output(&String::from_utf8_lossy(&output.stdout));
        debug!("bowtie2 reported {} alignments for {}", hits.len(), guide);
        Ok(hits)
    }
}

/// Pull chromosome, position, strand and the `NM`/`MD` tags out of SAM text.
///
/// Header lines, unmapped records and truncated lines are skipped.
pub fn parse_sam_output(sam: &str) -> Vec<OffTargetHit> {
    let mut hits = Vec::new();

    for line in sam.lines() {
        if line.is_empty() || line.starts_with('@') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 11 {
            debug!("Skipping malformed SAM line: {}", line);
            continue;
        }

        let Ok(flag) = fields[1].parse::<u16>() else {
            debug!("Skipping SAM line with bad flag: {}", line);
            continue;
        };
        if flag & SAM_FLAG_UNMAPPED != 0 {
            continue;
        }
        let Ok(position) = fields[3].parse::<u64>() else {
            debug!("Skipping SAM line with bad position: {}", line);
            continue;
        };

        let mut nm = None;
        let mut md = String::new();
        for tag in &fields[11..] {
            if let Some(value) = tag.strip_prefix("NM:i:") {
                nm = value.parse::<u32>().ok();
            } else if let Some(value) = tag.strip_prefix("MD:Z:") {
                md = value.to_string();
            }
        }
        // Without NM fall back to the mismatches spelled out in MD.
        let mismatch_count = nm.unwrap_or_else(|| {
            decode_mismatch_positions(&md, DeletionPolicy::GuideCoordinates)
                .map(|m| m.len() as u32)
                .unwrap_or(0)
        });

        hits.push(OffTargetHit {
            chromosome: fields[2].to_string(),
            position,
            mismatch_count,
            mismatch_descriptor: md,
            strand: if flag & SAM_FLAG_REVERSE != 0 {
                Strand::Reverse
            } else {
                Strand::Forward
            },
        });
    }

    hits
}
