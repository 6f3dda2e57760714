use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bio::io::fasta::{Index, IndexedReader};
use tracing::{info, warn};

use crate::errors::StoreError;
use crate::integrations::SequenceStore;

/// A samtools-indexed FASTA (`genome.fa` + `genome.fa.fai`).
pub struct FastaStore {
    path: PathBuf,
    lengths: HashMap<String, u64>,
    reader: Mutex<IndexedReader<File>>,
}

impl FastaStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let open_err = |message: String| StoreError::Open {
            path: path.to_path_buf(),
            message,
        };
        let index = Index::with_fasta_file(&path).map_err(|e| open_err(e.to_string()))?;
        let lengths = index
            .sequences()
            .into_iter()
            .map(|s| (s.name, s.len))
            .collect::<HashMap<_, _>>();
        let reader = IndexedReader::from_file(&path).map_err(|e| open_err(e.to_string()))?;

        info!("Loaded genome {} ({} sequences)", path.display(), lengths.len());
        Ok(FastaStore {
            path: path.to_path_buf(),
            lengths,
            reader: Mutex::new(reader),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sequence_length(&self, chromosome: &str) -> Option<u64> {
        self.lengths.get(chromosome).copied()
    }
}

impl SequenceStore for FastaStore {
    fn lookup(&self, chromosome: &str, start: u64, end: u64) -> Result<Option<String>, StoreError> {
        if start == 0 || start > end {
            return Err(StoreError::InvalidRange { start, end });
        }
        let Some(len) = self.sequence_length(chromosome) else {
            return Ok(None);
        };
        if start > len {
            return Ok(None);
        }
        let stop = end.min(len);

        let read_err = |source| StoreError::Read {
            chromosome: chromosome.to_string(),
            start,
            end,
            source,
        };
        let mut reader = self.reader.lock().map_err(|_| StoreError::Poisoned)?;
        reader.fetch(chromosome, start - 1, stop).map_err(read_err)?;
        let mut seq = Vec::with_capacity((stop - start + 1) as usize);
        reader.read(&mut seq).map_err(read_err)?;

        Ok(Some(String::from_utf8_lossy(&seq).to_ascii_uppercase()))
    }
}

/// Several genomes addressed by id, e.g. `R570` and `AP85_441`.
#[derive(Default)]
pub struct GenomeCatalog {
    genomes: HashMap<String, FastaStore>,
}

impl GenomeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a genome; a FASTA that cannot be opened is logged and skipped.
    pub fn load_genome(&mut self, genome_id: &str, fasta_path: &Path) -> bool {
        match FastaStore::open(fasta_path) {
            Ok(store) => {
                self.genomes.insert(genome_id.to_string(), store);
                true
            }
            Err(e) => {
                warn!("Genome {} not loaded: {}", genome_id, e);
                false
            }
        }
    }

    pub fn genome(&self, genome_id: &str) -> Option<&FastaStore> {
        self.genomes.get(genome_id)
    }

    pub fn get_sequence(
        &self,
        genome_id: &str,
        chromosome: &str,
        start: u64,
        end: u64,
    ) -> Result<Option<String>, StoreError> {
        self.genome(genome_id)
            .ok_or_else(|| StoreError::UnknownGenome(genome_id.to_string()))?
            .lookup(chromosome, start, end)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;

    /// Writes `genome.fa` (60 bp lines) and its `.fai` into `dir`.
    pub(crate) fn write_indexed_fasta(dir: &Path, records: &[(&str, &str)]) -> PathBuf {
        let fasta = dir.join("genome.fa");
        let mut body = String::new();
        let mut fai = String::new();
        for (name, seq) in records {
            body.push_str(&format!(">{}\n", name));
            let offset = body.len();
            for chunk in seq.as_bytes().chunks(60) {
                body.push_str(std::str::from_utf8(chunk).unwrap());
                body.push('\n');
            }
            fai.push_str(&format!("{}\t{}\t{}\t60\t61\n", name, seq.len(), offset));
        }
        fs::write(&fasta, body).unwrap();
        fs::write(dir.join("genome.fa.fai"), fai).unwrap();
        fasta
    }

    fn chr1() -> String {
        "ACGTTGCA".repeat(20)
    }

    #[test]
    fn lookup_is_one_based_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_indexed_fasta(dir.path(), &[("Chr1", &chr1()), ("Chr2", "GGGGCCCCAAAATTTT")]);
        let store = FastaStore::open(&path).unwrap();

        assert_eq!(store.lookup("Chr1", 1, 8).unwrap().as_deref(), Some("ACGTTGCA"));
        assert_eq!(store.lookup("Chr2", 5, 8).unwrap().as_deref(), Some("CCCC"));
        // spans a line break
        assert_eq!(store.lookup("Chr1", 59, 62).unwrap(), Some(chr1()[58..62].to_string()));
    }

    #[test]
    fn unknown_or_out_of_range_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_indexed_fasta(dir.path(), &[("Chr2", "GGGGCCCCAAAATTTT")]);
        let store = FastaStore::open(&path).unwrap();

        assert_eq!(store.lookup("ChrX", 1, 10).unwrap(), None);
        assert_eq!(store.lookup("Chr2", 17, 20).unwrap(), None);
        assert_eq!(store.lookup("Chr2", 13, 40).unwrap().as_deref(), Some("TTTT"));
        assert!(matches!(store.lookup("Chr2", 0, 4), Err(StoreError::InvalidRange { .. })));
        assert!(matches!(store.lookup("Chr2", 8, 4), Err(StoreError::InvalidRange { .. })));
    }

    #[test]
    fn catalog_routes_by_genome_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_indexed_fasta(dir.path(), &[("Chr2", "GGGGCCCCAAAATTTT")]);
        let mut catalog = GenomeCatalog::new();
        assert!(catalog.load_genome("R570", &path));
        assert!(!catalog.load_genome("missing", &dir.path().join("missing.fa")));

        assert_eq!(
            catalog.get_sequence("R570", "Chr2", 1, 4).unwrap().as_deref(),
            Some("GGGG")
        );
        assert!(matches!(
            catalog.get_sequence("missing", "Chr2", 1, 4),
            Err(StoreError::UnknownGenome(_))
        ));
    }
}
