//! Decoding of SAM `MD:Z` strings into per-position guide mismatches.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::DecodeError;
use crate::helper_functions::complement;
use crate::models::{MismatchRecord, Strand};

/// How `^XYZ` deletion runs move the position counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPolicy {
    /// Deleted reference bases consume no guide positions.
    #[default]
    GuideCoordinates,
    /// The counter advances by the length of the deleted run.
    ReferenceCoordinates,
}

fn md_token_regex() -> &'static Regex {
    static MD_TOKEN: OnceLock<Regex> = OnceLock::new();
    MD_TOKEN.get_or_init(|| {
        Regex::new(r"(?P<run>[0-9]+)|(?P<del>\^[A-Z]+)|(?P<mm>[A-Z])").expect("valid MD token regex")
    })
}

/// 1-based mismatch positions with the reference base, in read order.
pub fn decode_mismatch_positions(
    descriptor: &str,
    policy: DeletionPolicy,
) -> Result<Vec<(usize, char)>, DecodeError> {
    let mut mismatches = Vec::new();
    let mut position = 0usize;
    let mut expected = 0usize;

    for caps in md_token_regex().captures_iter(descriptor) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() != expected {
            return Err(malformed(descriptor, expected));
        }
        expected = whole.end();

        if let Some(run) = caps.name("run") {
            let run: usize = run
                .as_str()
                .parse()
                .map_err(|_| malformed(descriptor, whole.start()))?;
            position = position
                .checked_add(run)
                .ok_or_else(|| malformed(descriptor, whole.start()))?;
        } else if let Some(deleted) = caps.name("del") {
            if policy == DeletionPolicy::ReferenceCoordinates {
                position = position
                    .checked_add(deleted.as_str().len() - 1)
                    .ok_or_else(|| malformed(descriptor, whole.start()))?;
            }
        } else if let Some(base) = caps.name("mm") {
            let base = base.as_str().chars().next().unwrap_or('N');
            position = position
                .checked_add(1)
                .ok_or_else(|| malformed(descriptor, whole.start()))?;
            mismatches.push((position, base));
        }
    }

    if expected != descriptor.len() {
        return Err(malformed(descriptor, expected));
    }
    Ok(mismatches)
}

fn malformed(descriptor: &str, offset: usize) -> DecodeError {
    DecodeError::Malformed {
        descriptor: descriptor.to_string(),
        offset,
        found: descriptor[offset..].chars().next().unwrap_or('?'),
    }
}

/// Mismatches of an alignment expressed along the guide, PAM-distal base first.
///
/// Reverse-strand hits are mirrored and complemented, since `MD` follows the
/// forward reference strand.
pub fn decode_for_guide(
    descriptor: &str,
    guide: &str,
    strand: Strand,
    policy: DeletionPolicy,
) -> Result<Vec<MismatchRecord>, DecodeError> {
    let guide_len = guide.len();
    let guide_bases = guide.as_bytes();
    let mut records = Vec::new();

    for (position, reference_base) in decode_mismatch_positions(descriptor, policy)? {
        if position == 0 || position > guide_len {
            return Err(DecodeError::PositionOutOfRange { position, guide_len });
        }
        let (position, reference_base) = match strand {
            Strand::Forward => (position, reference_base),
            Strand::Reverse => (
                guide_len + 1 - position,
                complement(reference_base).unwrap_or('N'),
            ),
        };
        records.push(MismatchRecord {
            position,
            reference_base,
            read_base: guide_bases[position - 1].to_ascii_uppercase() as char,
        });
    }

    records.sort_by_key(|r| r.position);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUIDE: &str = "ACGTACGTACGTACGTACGT";

    #[test]
    fn empty_descriptor_has_no_mismatches() {
        assert!(decode_mismatch_positions("", DeletionPolicy::default()).unwrap().is_empty());
        assert!(decode_for_guide("", GUIDE, Strand::Forward, DeletionPolicy::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn perfect_match_descriptor() {
        assert!(decode_mismatch_positions("20", DeletionPolicy::default()).unwrap().is_empty());
    }

    #[test]
    fn runs_accumulate_into_positions() {
        let decoded = decode_mismatch_positions("10A5C3", DeletionPolicy::default()).unwrap();
        assert_eq!(decoded, vec![(11, 'A'), (17, 'C')]);
    }

    #[test]
    fn adjacent_mismatches_and_zero_runs() {
        let decoded = decode_mismatch_positions("0T0G18", DeletionPolicy::default()).unwrap();
        assert_eq!(decoded, vec![(1, 'T'), (2, 'G')]);
    }

    #[test]
    fn deletions_never_count_as_mismatches() {
        for policy in [DeletionPolicy::GuideCoordinates, DeletionPolicy::ReferenceCoordinates] {
            let decoded = decode_mismatch_positions("8^AC12", policy).unwrap();
            assert!(decoded.is_empty());
        }
    }

    #[test]
    fn deletion_policy_controls_advancement() {
        let guide = decode_mismatch_positions("5^AC3G11", DeletionPolicy::GuideCoordinates).unwrap();
        assert_eq!(guide, vec![(9, 'G')]);

        let reference =
            decode_mismatch_positions("5^AC3G11", DeletionPolicy::ReferenceCoordinates).unwrap();
        assert_eq!(reference, vec![(11, 'G')]);
    }

    #[test]
    fn forward_records_carry_guide_base() {
        let records =
            decode_for_guide("10A5C3", "ACGTACGTACGTACGTACGT", Strand::Forward, DeletionPolicy::default())
                .unwrap();
        assert_eq!(
            records,
            vec![
                MismatchRecord { position: 11, reference_base: 'A', read_base: 'G' },
                MismatchRecord { position: 17, reference_base: 'C', read_base: 'A' },
            ]
        );
    }

    #[test]
    fn reverse_strand_is_mirrored_and_complemented() {
        // MD position 1 on the forward reference is the last guide base.
        let records = decode_for_guide("0C19", GUIDE, Strand::Reverse, DeletionPolicy::default()).unwrap();
        assert_eq!(
            records,
            vec![MismatchRecord { position: 20, reference_base: 'G', read_base: 'T' }]
        );
    }

    #[test]
    fn malformed_descriptors_are_rejected() {
        let err = decode_mismatch_positions("10a5", DeletionPolicy::default()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Malformed { descriptor: "10a5".into(), offset: 2, found: 'a' }
        );
        assert!(decode_mismatch_positions("3^", DeletionPolicy::default()).is_err());
        assert!(decode_mismatch_positions("5 A", DeletionPolicy::default()).is_err());
    }

    #[test]
    fn positions_past_the_guide_are_errors() {
        let err = decode_for_guide("20A", GUIDE, Strand::Forward, DeletionPolicy::default()).unwrap_err();
        assert_eq!(err, DecodeError::PositionOutOfRange { position: 21, guide_len: 20 });
    }

    #[test]
    fn oversized_runs_are_malformed_not_overflows() {
        let max = usize::MAX.to_string();
        let descriptor = format!("{}A1A", max);
        let err = decode_mismatch_positions(&descriptor, DeletionPolicy::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { offset, .. } if offset == max.len()));

        let descriptor = format!("{}^AC1", max);
        assert!(decode_mismatch_positions(&descriptor, DeletionPolicy::ReferenceCoordinates).is_err());
        assert!(decode_mismatch_positions("99999999999999999999999A", DeletionPolicy::default()).is_err());
    }
}
