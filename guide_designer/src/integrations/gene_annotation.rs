use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info};

use crate::errors::AnnotationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneRecord {
    pub gene_id: String,
    pub chromosome: String,
    /// 1-based inclusive, as in the GFF3 file.
    pub start: u64,
    pub end: u64,
    pub strand: char,
    pub description: String,
}

/// `gene` features of a GFF3 file, searchable by id or by location.
#[derive(Debug, Default)]
pub struct GeneIndex {
    genes: Vec<GeneRecord>,
    by_id: HashMap<String, usize>,
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn parse_attributes(column: &str) -> HashMap<&str, String> {
    column
        .trim()
        .split(';')
        .filter_map(|item| item.split_once('='))
        .map(|(key, value)| (key.trim(), percent_decode(value)))
        .collect()
}

impl GeneIndex {
    pub fn from_gff3(path: &Path) -> Result<Self, AnnotationError> {
        let file = File::open(path).map_err(|source| AnnotationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::from_reader(BufReader::new(file)).map_err(|e| match e {
            AnnotationError::Io { source, .. } => AnnotationError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!("Indexed {} genes from {}", index.genes.len(), path.display());
        Ok(index)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, AnnotationError> {
        let mut index = GeneIndex::default();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| AnnotationError::Io {
                path: Default::default(),
                source,
            })?;
            if line.starts_with('#') {
                continue;
            }
            let parts: Vec<&str> = line.trim_end().split('\t').collect();
            if parts.len() < 9 || parts[2] != "gene" {
                continue;
            }

            let coordinate = |value: &str| {
                value.parse::<u64>().map_err(|_| AnnotationError::InvalidCoordinate {
                    line: line_no + 1,
                    value: value.to_string(),
                })
            };
            let start = coordinate(parts[3])?;
            let end = coordinate(parts[4])?;

            let mut attrs = parse_attributes(parts[8]);
            let gene_id = attrs
                .remove("ID")
                .or_else(|| attrs.remove("Name"))
                .unwrap_or_else(|| format!("unknown_{}", index.genes.len()));
            let description = attrs
                .remove("Note")
                .or_else(|| attrs.remove("description"))
                .unwrap_or_default();

            debug!("gene {} at {}:{}-{}", gene_id, parts[0], start, end);
            index.by_id.insert(gene_id.clone(), index.genes.len());
            index.genes.push(GeneRecord {
                gene_id,
                chromosome: parts[0].to_string(),
                start,
                end,
                strand: parts[6].chars().next().unwrap_or('.'),
                description,
            });
        }

        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn find(&self, gene_id: &str) -> Option<&GeneRecord> {
        self.by_id.get(gene_id).map(|&i| &self.genes[i])
    }

    /// Genes on `chromosome` overlapping `[start, end]`.
    pub fn overlapping(&self, chromosome: &str, start: u64, end: u64) -> Vec<&GeneRecord> {
        self.genes
            .iter()
            .filter(|g| g.chromosome == chromosome && g.start <= end && g.end >= start)
            .collect()
    }
}
