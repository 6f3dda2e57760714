use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, error};

use crate::config::PrimerSettings;
use crate::errors::PrimerError;
use crate::helper_functions::resolve_path;
use crate::integrations::{PrimerDesigner, TargetRegion};
use crate::models::PrimerPair;

/// PCR primer design through `primer3_core` (Boulder-IO on stdin/stdout).
#[derive(Debug, Clone)]
pub struct Primer3Designer {
    pub executable: PathBuf,
    pub settings: PrimerSettings,
}

impl Primer3Designer {
    pub fn from_settings(settings: &PrimerSettings) -> Result<Self, PrimerError> {
        let executable = match &settings.executable {
            Some(path) => resolve_path(path),
            None => which::which("primer3_core")
                .map_err(|e| PrimerError::NotFound(format!("primer3_core ({})", e)))?,
        };
        Ok(Primer3Designer {
            executable,
            settings: settings.clone(),
        })
    }

    pub fn boulder_record(&self, template: &str, region: TargetRegion) -> String {
        let s = &self.settings;
        format!(
            "SEQUENCE_ID=crispr\n\
             SEQUENCE_TEMPLATE={}\n\
             SEQUENCE_TARGET={},{}\n\
             PRIMER_OPT_SIZE={}\n\
             PRIMER_PRODUCT_SIZE_RANGE={}-{}\n\
             PRIMER_MIN_TM={:.1}\n\
             PRIMER_MAX_TM={:.1}\n\
             PRIMER_NUM_RETURN=1\n\
             =\n",
            template,
            region.start,
            region.len,
            s.opt_size,
            s.product_size_min,
            s.product_size_max,
            s.min_tm,
            s.max_tm,
        )
    }
}

/// Clip the region to the template; primer3 rejects targets past its end.
fn clip_region(template_len: usize, region: TargetRegion) -> Result<TargetRegion, PrimerError> {
    if region.start >= template_len || region.len == 0 {
        return Err(PrimerError::RegionOutOfRange {
            start: region.start,
            len: region.len,
            template_len,
        });
    }
    Ok(TargetRegion {
        start: region.start,
        len: region.len.min(template_len - region.start),
    })
}

impl PrimerDesigner for Primer3Designer {
    fn design_primers(&self, template: &str, region: TargetRegion) -> Result<PrimerPair, PrimerError> {
        let region = clip_region(template.len(), region)?;
        let record = self.boulder_record(template, region);

        let mut child = Command::new(&self.executable)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(record.as_bytes()) {
                error!("Failed to send record to primer3: {}", e);
                // primer3 may have exited early; reap it before bailing out.
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        }
        let output = child.wait_with_output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("primer3 STDERR: {}", stderr);
            return Err(PrimerError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        let pair = parse_primer3_output(&String::from_utf8_lossy(&output.stdout))?;
        debug!("primer3 pair {} / {} ({} bp)", pair.left, pair.right, pair.product_size);
        Ok(pair)
    }
}

/// Read the best pair out of a primer3 Boulder-IO response.
pub fn parse_primer3_output(boulder: &str) -> Result<PrimerPair, PrimerError> {
    let fields: HashMap<&str, &str> = boulder
        .lines()
        .filter_map(|line| line.split_once('='))
        .collect();

    if let Some(message) = fields.get("PRIMER_ERROR") {
        return Err(PrimerError::Reported(message.to_string()));
    }

    match (
        fields.get("PRIMER_LEFT_0_SEQUENCE"),
        fields.get("PRIMER_RIGHT_0_SEQUENCE"),
        fields
            .get("PRIMER_PAIR_0_PRODUCT_SIZE")
            .and_then(|v| v.parse::<u32>().ok()),
    ) {
        (Some(left), Some(right), Some(product_size)) => Ok(PrimerPair {
            left: left.to_string(),
            right: right.to_string(),
            product_size,
        }),
        _ => Err(PrimerError::NoPrimers),
    }
}
