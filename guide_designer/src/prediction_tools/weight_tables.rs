use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::TableError;
use crate::models::{CONTEXT_LEN, GUIDE_LEN};

/// Rule set 1 logistic model intercept.
pub const DOENCH_INTERCEPT: f64 = 0.59763615;
/// GC slope for guides with more than 10 G/C.
pub const DOENCH_GC_HIGH: f64 = -0.1665878;
/// GC slope for guides with at most 10 G/C.
pub const DOENCH_GC_LOW: f64 = -0.2026259;

/// (1-based position in the 30-mer context, subsequence, coefficient)
pub const DOENCH_2014_WEIGHTS: &[(usize, &str, f64)] = &[
    (1, "G", -0.2753771), (2, "A", -0.3238875), (2, "C", 0.17212887), (3, "C", -0.1006662),
    (4, "C", -0.2018029), (4, "G", 0.24595663), (5, "A", 0.03644004), (5, "C", 0.09837684),
    (6, "C", -0.7411813), (6, "G", -0.3932644), (11, "A", -0.466099), (14, "A", 0.08537695),
    (14, "C", -0.013814), (15, "A", 0.27262051), (15, "C", -0.1190226), (15, "T", -0.2859442),
    (16, "A", 0.09745459), (16, "G", -0.1755462), (17, "C", -0.3457955), (17, "G", -0.6780964),
    (18, "A", 0.22508903), (18, "C", -0.5077941), (19, "G", -0.4173736), (19, "T", -0.054307),
    (20, "G", 0.37989937), (20, "T", -0.0907126), (21, "C", 0.05782332), (21, "T", -0.5305673),
    (22, "T", -0.8770074), (23, "C", -0.8762358), (23, "G", 0.27891626), (23, "T", -0.4031022),
    (24, "A", -0.0773007), (24, "C", 0.28793562), (24, "T", -0.2216372), (27, "G", -0.6890167),
    (27, "T", 0.11787758), (28, "C", -0.1604453), (29, "G", 0.38634258), (1, "GT", -0.6257787),
    (4, "GC", 0.30004332), (5, "AA", -0.8348362), (5, "TA", 0.76062777), (6, "GG", -0.4908167),
    (11, "GG", -1.5169074), (11, "TA", 0.7092612), (11, "TC", 0.49629861), (11, "TT", -0.5868739),
    (12, "GG", -0.3345637), (13, "GA", 0.76384993), (13, "GC", -0.5370252), (16, "TG", -0.7981461),
    (18, "GG", -0.6668087), (18, "TC", 0.35318325), (19, "CC", 0.74807209), (19, "TG", -0.3672668),
    (20, "AC", 0.56820913), (20, "CG", 0.32907207), (20, "GA", -0.8364568), (20, "GG", -0.7822076),
    (21, "TC", -1.029693), (22, "CG", 0.85619782), (22, "CT", -0.4632077), (23, "AA", -0.5794924),
    (23, "AG", 0.64907554), (24, "AG", -0.0773007), (24, "CG", 0.28793562), (24, "TG", -0.2216372),
    (26, "GT", 0.11787758), (28, "GG", -0.69774),
];

const PENALTY_A: [f64; GUIDE_LEN] = [
    1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1, 0.0, 0.0,
];
const PENALTY_C: [f64; GUIDE_LEN] = [
    1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.1, 0.0, 0.0,
];
const PENALTY_G: [f64; GUIDE_LEN] = [
    1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1, 0.0, 0.0, 0.0,
];
const PENALTY_T: [f64; GUIDE_LEN] = PENALTY_A;

/// CFD penalty rows keyed by `r{guide base}:d{complement of target base}`,
/// position 1 (PAM-distal) to 20 (PAM-adjacent). Watson-Crick pairs are absent.
pub const CFD_PENALTIES: &[(&str, [f64; GUIDE_LEN])] = &[
    ("rA:dA", PENALTY_A), ("rA:dC", PENALTY_A), ("rA:dG", PENALTY_A),
    ("rC:dA", PENALTY_C), ("rC:dC", PENALTY_C), ("rC:dT", PENALTY_C),
    ("rG:dA", PENALTY_G), ("rG:dG", PENALTY_G), ("rG:dT", PENALTY_G),
    ("rT:dC", PENALTY_T), ("rT:dG", PENALTY_T), ("rT:dT", PENALTY_T),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyWeight {
    pub position: usize,
    pub subsequence: String,
    pub coefficient: f64,
}

/// On-disk form of the tables. Nothing here is trusted until
/// [`ScoringModel::from_tables`] has checked it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTables {
    pub intercept: f64,
    pub gc_low: f64,
    pub gc_high: f64,
    pub efficiency: Vec<EfficiencyWeight>,
    pub penalties: BTreeMap<String, Vec<f64>>,
}

impl WeightTables {
    pub fn standard() -> Self {
        WeightTables {
            intercept: DOENCH_INTERCEPT,
            gc_low: DOENCH_GC_LOW,
            gc_high: DOENCH_GC_HIGH,
            efficiency: DOENCH_2014_WEIGHTS
                .iter()
                .map(|&(position, subsequence, coefficient)| EfficiencyWeight {
                    position,
                    subsequence: subsequence.to_string(),
                    coefficient,
                })
                .collect(),
            penalties: CFD_PENALTIES
                .iter()
                .map(|(key, row)| (key.to_string(), row.to_vec()))
                .collect(),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, TableError> {
        let raw = fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| TableError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Validated efficiency entry; `offset` is 0-based into the context.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionalFeature {
    pub offset: usize,
    pub subsequence: Vec<u8>,
    pub coefficient: f64,
}

/// Immutable scoring configuration shared by every scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringModel {
    pub intercept: f64,
    pub gc_low: f64,
    pub gc_high: f64,
    pub features: Vec<PositionalFeature>,
    penalties: HashMap<(u8, u8), [f64; GUIDE_LEN]>,
}

impl ScoringModel {
    pub fn standard() -> Result<Self, TableError> {
        Self::from_tables(&WeightTables::standard())
    }

    pub fn from_json_file(path: &Path) -> Result<Self, TableError> {
        let tables = WeightTables::from_json_file(path)?;
        let model = Self::from_tables(&tables)?;
        info!("Loaded weight tables from {}", path.display());
        Ok(model)
    }

    pub fn from_tables(tables: &WeightTables) -> Result<Self, TableError> {
        let mut features = Vec::with_capacity(tables.efficiency.len());
        for entry in &tables.efficiency {
            let bytes = entry.subsequence.to_ascii_uppercase().into_bytes();
            if bytes.is_empty() || !bytes.iter().all(|b| b"ACGT".contains(b)) {
                return Err(TableError::InvalidSubsequence {
                    position: entry.position,
                    subsequence: entry.subsequence.clone(),
                });
            }
            if entry.position == 0 || entry.position - 1 + bytes.len() > CONTEXT_LEN {
                return Err(TableError::PositionOutOfRange {
                    position: entry.position,
                    subsequence: entry.subsequence.clone(),
                    context_len: CONTEXT_LEN,
                });
            }
            features.push(PositionalFeature {
                offset: entry.position - 1,
                subsequence: bytes,
                coefficient: entry.coefficient,
            });
        }

        let mut penalties = HashMap::with_capacity(tables.penalties.len());
        for (key, row) in &tables.penalties {
            let pair = parse_penalty_key(key)?;
            if row.len() != GUIDE_LEN {
                return Err(TableError::WrongRowLength {
                    key: key.clone(),
                    expected: GUIDE_LEN,
                    found: row.len(),
                });
            }
            let mut weights = [0.0; GUIDE_LEN];
            for (i, &weight) in row.iter().enumerate() {
                if !(0.0..=1.0).contains(&weight) {
                    return Err(TableError::WeightOutOfRange {
                        key: key.clone(),
                        position: i + 1,
                        weight,
                    });
                }
                weights[i] = weight;
            }
            penalties.insert(pair, weights);
        }

        debug!(
            "Scoring model ready: {} positional features, {} penalty rows",
            features.len(),
            penalties.len()
        );

        Ok(ScoringModel {
            intercept: tables.intercept,
            gc_low: tables.gc_low,
            gc_high: tables.gc_high,
            features,
            penalties,
        })
    }

    /// CFD weight for a guide base paired against a target DNA base.
    ///
    /// Unknown pairs and positions return 1.0, i.e. the site is assumed to cut.
    pub fn penalty(&self, rna: char, dna: char, position: usize) -> f64 {
        if position == 0 || position > GUIDE_LEN {
            return 1.0;
        }
        let (Some(r), Some(d)) = (normalize_base(rna), normalize_base(dna)) else {
            return 1.0;
        };
        self.penalties
            .get(&(r, d))
            .map(|row| row[position - 1])
            .unwrap_or(1.0)
    }
}

fn normalize_base(base: char) -> Option<u8> {
    match base.to_ascii_uppercase() {
        'A' => Some(b'A'),
        'C' => Some(b'C'),
        'G' => Some(b'G'),
        'T' | 'U' => Some(b'T'),
        _ => None,
    }
}

fn parse_penalty_key(key: &str) -> Result<(u8, u8), TableError> {
    let invalid = || TableError::InvalidKey(key.to_string());
    let (rna, dna) = key.split_once(':').ok_or_else(invalid)?;
    let rna = rna.strip_prefix('r').ok_or_else(invalid)?;
    let dna = dna.strip_prefix('d').ok_or_else(invalid)?;
    let mut rna_chars = rna.chars();
    let mut dna_chars = dna.chars();
    match (rna_chars.next(), rna_chars.next(), dna_chars.next(), dna_chars.next()) {
        (Some(r), None, Some(d), None) => Ok((
            normalize_base(r).ok_or_else(invalid)?,
            normalize_base(d).ok_or_else(invalid)?,
        )),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn standard_tables_validate() {
        let model = ScoringModel::standard().unwrap();
        assert_eq!(model.features.len(), DOENCH_2014_WEIGHTS.len());
        assert_eq!(model.features[0].offset, 0);
    }

    #[test]
    fn penalty_lookup_and_conservative_default() {
        let model = ScoringModel::standard().unwrap();
        assert_eq!(model.penalty('A', 'G', 1), 1.0);
        assert_eq!(model.penalty('A', 'G', 11), 0.8);
        assert_eq!(model.penalty('G', 'A', 18), 0.0);
        assert_eq!(model.penalty('U', 'C', 12), 0.7);
        // Watson-Crick pair, N and out-of-range positions have no data
        assert_eq!(model.penalty('A', 'T', 15), 1.0);
        assert_eq!(model.penalty('N', 'A', 15), 1.0);
        assert_eq!(model.penalty('A', 'G', 0), 1.0);
        assert_eq!(model.penalty('A', 'G', 21), 1.0);
    }

    #[test]
    fn rejects_feature_past_context_end() {
        let mut tables = WeightTables::standard();
        tables.efficiency.push(EfficiencyWeight {
            position: 30,
            subsequence: "GG".into(),
            coefficient: 0.1,
        });
        let err = ScoringModel::from_tables(&tables).unwrap_err();
        assert!(matches!(err, TableError::PositionOutOfRange { position: 30, .. }));
    }

    #[test]
    fn rejects_position_zero_and_bad_bases() {
        let mut tables = WeightTables::standard();
        tables.efficiency = vec![EfficiencyWeight {
            position: 0,
            subsequence: "A".into(),
            coefficient: 0.1,
        }];
        assert!(ScoringModel::from_tables(&tables).is_err());

        tables.efficiency = vec![EfficiencyWeight {
            position: 3,
            subsequence: "AN".into(),
            coefficient: 0.1,
        }];
        assert!(matches!(
            ScoringModel::from_tables(&tables).unwrap_err(),
            TableError::InvalidSubsequence { .. }
        ));
    }

    #[test]
    fn rejects_malformed_penalty_rows() {
        let mut tables = WeightTables::standard();
        tables.penalties.insert("rA:dG".into(), vec![1.0; 19]);
        assert!(matches!(
            ScoringModel::from_tables(&tables).unwrap_err(),
            TableError::WrongRowLength { found: 19, .. }
        ));

        let mut tables = WeightTables::standard();
        tables.penalties.insert("A:G".into(), vec![1.0; 20]);
        assert!(matches!(
            ScoringModel::from_tables(&tables).unwrap_err(),
            TableError::InvalidKey(_)
        ));

        let mut tables = WeightTables::standard();
        tables.penalties.insert("rA:dG".into(), vec![1.5; 20]);
        assert!(matches!(
            ScoringModel::from_tables(&tables).unwrap_err(),
            TableError::WeightOutOfRange { position: 1, .. }
        ));
    }

    #[test]
    fn loads_substituted_tables_from_json() {
        let mut tables = WeightTables::standard();
        tables.penalties.insert("rA:dG".into(), vec![0.5; 20]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&tables).unwrap().as_bytes())
            .unwrap();

        let model = ScoringModel::from_json_file(file.path()).unwrap();
        assert_eq!(model.penalty('A', 'G', 1), 0.5);
    }
}
