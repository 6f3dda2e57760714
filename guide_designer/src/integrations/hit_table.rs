use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::errors::AlignerError;
use crate::integrations::{OffTargetSearch, SearchParams};
use crate::models::{OffTargetHit, Strand};

#[derive(Debug, Deserialize)]
struct HitRow {
    guide: String,
    chromosome: String,
    position: u64,
    mismatches: u32,
    #[serde(default)]
    md: String,
    #[serde(default)]
    strand: Option<Strand>,
}

/// Off-target hits computed ahead of time, one tab-separated row per hit:
/// `guide  chromosome  position  mismatches  md  [strand]`.
#[derive(Debug, Default, Clone)]
pub struct HitTable {
    hits: HashMap<String, Vec<OffTargetHit>>,
}

impl HitTable {
    pub fn from_path(path: &Path) -> Result<Self, AlignerError> {
        let reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_path(path)
            .map_err(|source| AlignerError::HitTable {
                path: path.to_path_buf(),
                source,
            })?;
        let table = Self::from_csv(reader).map_err(|source| AlignerError::HitTable {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded off-target hits for {} guides from {}", table.hits.len(), path.display());
        Ok(table)
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, csv::Error> {
        let headers = reader.headers()?.clone();
        let mut hits: HashMap<String, Vec<OffTargetHit>> = HashMap::new();
        for record in reader.records() {
            let mut record = record?;
            // Trailing optional columns may be left off entirely.
            while record.len() < headers.len() {
                record.push_field("");
            }
            let row: HitRow = record.deserialize(Some(&headers))?;
            hits.entry(row.guide.to_ascii_uppercase())
                .or_default()
                .push(OffTargetHit {
                    chromosome: row.chromosome,
                    position: row.position,
                    mismatch_count: row.mismatches,
                    mismatch_descriptor: row.md,
                    strand: row.strand.unwrap_or_default(),
                });
        }
        Ok(HitTable { hits })
    }

    pub fn insert(&mut self, guide: &str, hit: OffTargetHit) {
        self.hits.entry(guide.to_ascii_uppercase()).or_default().push(hit);
    }
}

impl OffTargetSearch for HitTable {
    fn find_near_matches(
        &self,
        guide: &str,
        params: &SearchParams,
    ) -> Result<Vec<OffTargetHit>, AlignerError> {
        Ok(self
            .hits
            .get(&guide.to_ascii_uppercase())
            .map(|hits| {
                hits.iter()
                    .filter(|h| h.mismatch_count <= u32::from(params.max_mismatches))
                    .take(params.max_hits)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TABLE: &str = "guide\tchromosome\tposition\tmismatches\tmd\tstrand
GACGTTAGCATGCATGCAAA\tChr1\t15033\t0\t20\t+
GACGTTAGCATGCATGCAAA\tChr4\t88120\t1\t3G16\t-
GACGTTAGCATGCATGCAAA\tChr9\t7001\t3\t2A5C3T7\t+
gacgttagcatgcatgcaaa\tChr5\t991\t1\t12T7
";

    fn table() -> HitTable {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.tsv");
        fs::write(&path, TABLE).unwrap();
        HitTable::from_path(&path).unwrap()
    }

    #[test]
    fn groups_hits_by_guide() {
        let params = SearchParams { max_hits: 20, max_mismatches: 3, seed_length: 20 };
        let hits = table().find_near_matches("GACGTTAGCATGCATGCAAA", &params).unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[1].strand, Strand::Reverse);
        assert_eq!(hits[3].chromosome, "Chr5");
        assert_eq!(hits[3].strand, Strand::Forward);
    }

    #[test]
    fn respects_search_limits() {
        let params = SearchParams { max_hits: 2, max_mismatches: 1, seed_length: 20 };
        let hits = table().find_near_matches("GACGTTAGCATGCATGCAAA", &params).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.mismatch_count <= 1));
    }

    #[test]
    fn unknown_guide_has_no_hits() {
        let hits = table()
            .find_near_matches("TTTTTTTTTTTTTTTTTTTT", &SearchParams::default())
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn rows_without_strand_or_md_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.tsv");
        fs::write(
            &path,
            "guide\tchromosome\tposition\tmismatches\tmd\tstrand\n\
             TTGACCAGTACGATCGATGC\tChr2\t410\t1\t12T7\n\
             TTGACCAGTACGATCGATGC\tChr3\t77\t1\n",
        )
        .unwrap();
        let table = HitTable::from_path(&path).unwrap();
        let hits = table
            .find_near_matches("TTGACCAGTACGATCGATGC", &SearchParams::default())
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].strand, Strand::Forward);
        assert_eq!(hits[0].mismatch_descriptor, "12T7");
        assert_eq!(hits[1].mismatch_descriptor, "");
    }

    #[test]
    fn missing_file_is_an_aligner_error() {
        let err = HitTable::from_path(Path::new("/nonexistent/hits.tsv")).unwrap_err();
        assert!(matches!(err, AlignerError::HitTable { .. }));
    }
}
