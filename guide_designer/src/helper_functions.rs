use std::env;
use std::path::{Path, PathBuf};

use bio_seq::prelude::*;

pub fn project_root() -> PathBuf {
    match env::var_os("PROJECT_ROOT") {
        Some(val) => PathBuf::from(val),
        None => {
            // Fall back to current directory if PROJECT_ROOT not set
            env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        }
    }
}

/// Resolve a configured path against the project root unless it is absolute.
pub fn resolve_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root().join(path)
    }
}

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage of G and C in `sequence`, two decimals. Empty input gives 0.
pub fn gc_content(sequence: &str) -> f64 {
    if sequence.is_empty() {
        return 0.0;
    }
    let gc = sequence
        .bytes()
        .filter(|b| matches!(b, b'G' | b'C' | b'g' | b'c'))
        .count();
    round2(gc as f64 / sequence.len() as f64 * 100.0)
}

/// True when every base is one of A, C, G, T (upper case).
pub fn is_unambiguous_dna(sequence: &str) -> bool {
    !sequence.is_empty()
        && sequence.bytes().all(|b| b.is_ascii_uppercase())
        && Seq::<Dna>::try_from(sequence).is_ok()
}

/// Upper-case ASCII copy of `sequence`; anything outside ASCII becomes `N`,
/// so byte offsets and base offsets agree.
pub fn normalize_sequence(sequence: &str) -> String {
    sequence
        .chars()
        .map(|c| if c.is_ascii() { c.to_ascii_uppercase() } else { 'N' })
        .collect()
}

pub fn complement(base: char) -> Option<char> {
    match base {
        'A' => Some('T'),
        'C' => Some('G'),
        'G' => Some('C'),
        'T' => Some('A'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gc_percentages() {
        assert_eq!(gc_content(""), 0.0);
        assert_eq!(gc_content("GGCC"), 100.0);
        assert_eq!(gc_content("ATGC"), 50.0);
        assert_eq!(gc_content("AAG"), 33.33);
    }

    #[test]
    fn dna_alphabet() {
        assert!(is_unambiguous_dna("ACGTACGT"));
        assert!(!is_unambiguous_dna("ACGN"));
        assert!(!is_unambiguous_dna("acgt"));
        assert!(!is_unambiguous_dna(""));
    }

    #[test]
    fn non_ascii_becomes_n() {
        let normalized = normalize_sequence("ac\u{e9}gt\u{fffd}");
        assert_eq!(normalized, "ACNGTN");
        assert_eq!(normalized.len(), 6);
    }

    #[test]
    fn rounding() {
        assert_eq!(round2(1.31266), 1.31);
        assert_eq!(round2(50.0), 50.0);
        assert_eq!(round2(33.3349), 33.33);
    }
}
