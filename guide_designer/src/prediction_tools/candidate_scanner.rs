use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::helper_functions::{gc_content, normalize_sequence};
use crate::models::{CandidateSite, CONTEXT_DOWNSTREAM, CONTEXT_UPSTREAM, GUIDE_LEN, PAM_LEN};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Drop sites whose 30-mer context does not fit in the sequence.
    pub require_context: bool,
    /// Inclusive guide GC window in percent, e.g. `(30.0, 80.0)`.
    pub gc_window: Option<(f64, f64)>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            require_context: true,
            gc_window: None,
        }
    }
}

fn is_pam(window: &[u8]) -> bool {
    matches!(window, [b'A' | b'C' | b'G' | b'T', b'G', b'G'])
}

/// Find every NGG site on the forward strand, left to right.
///
/// Overlapping PAMs are all reported. Sites too close to either end of the
/// sequence are dropped silently. Offsets count characters of `sequence`;
/// non-ASCII characters are scanned as `N`.
pub fn find_candidates(sequence: &str, options: &ScanOptions) -> Vec<CandidateSite> {
    let seq = normalize_sequence(sequence);
    let bytes = seq.as_bytes();
    let mut candidates = Vec::new();

    if bytes.len() < GUIDE_LEN + PAM_LEN {
        return candidates;
    }

    for pam_start in GUIDE_LEN..=bytes.len() - PAM_LEN {
        let pam_end = pam_start + PAM_LEN;
        if !is_pam(&bytes[pam_start..pam_end]) {
            continue;
        }

        let guide_start = pam_start - GUIDE_LEN;
        let context_end = pam_end + CONTEXT_DOWNSTREAM;
        let context = match guide_start.checked_sub(CONTEXT_UPSTREAM) {
            Some(context_start) if context_end <= bytes.len() => {
                Some(seq[context_start..context_end].to_string())
            }
            _ => None,
        };

        if context.is_none() && options.require_context {
            debug!("Skipping PAM at {}: context runs past sequence bounds", pam_start);
            continue;
        }

        let guide_sequence = seq[guide_start..pam_start].to_string();
        if let Some((min_gc, max_gc)) = options.gc_window {
            let gc = gc_content(&guide_sequence);
            if gc < min_gc || gc > max_gc {
                debug!("Skipping guide {} with GC {:.2}%", guide_sequence, gc);
                continue;
            }
        }

        candidates.push(CandidateSite {
            guide_sequence,
            pam: seq[pam_start..pam_end].to_string(),
            start: guide_start,
            end: pam_end,
            context,
        });
    }

    debug!("Found {} candidate sites in {} bp", candidates.len(), bytes.len());
    candidates
}
