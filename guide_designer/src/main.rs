use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use bio::io::fasta;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use guide_designer::config::EngineConfig;
use guide_designer::helper_functions::resolve_path;
use guide_designer::integrations::bowtie2_integration::Bowtie2Aligner;
use guide_designer::integrations::fasta_store::FastaStore;
use guide_designer::integrations::gene_annotation::GeneIndex;
use guide_designer::integrations::hit_table::HitTable;
use guide_designer::integrations::primer3_integration::Primer3Designer;
use guide_designer::integrations::{OffTargetSearch, UnavailableSearch};
use guide_designer::models::ScoreRecord;
use guide_designer::{analyze, analyze_region, report, Engine};

#[derive(Parser)]
#[command(author, version, about = "CRISPR-Cas9 guide design and scoring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find, score and rank guides
    Design(DesignArgs),
    /// Write a configuration file with every default filled in
    InitConfig { path: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Tsv,
    Json,
}

impl OutputFormat {
    fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(clap::Args)]
struct DesignArgs {
    /// Raw DNA sequence
    #[arg(short, long, conflicts_with_all = ["fasta_input", "genome"])]
    sequence: Option<String>,

    /// FASTA file; every record is designed separately
    #[arg(short, long, conflicts_with = "genome")]
    fasta_input: Option<PathBuf>,

    /// Indexed genome FASTA (with .fai) for --region or --gene
    #[arg(short, long)]
    genome: Option<PathBuf>,

    /// Genomic window, CHR:START-END (1-based, inclusive)
    #[arg(short, long, requires = "genome", conflicts_with = "gene")]
    region: Option<String>,

    /// GFF3 annotation used to locate --gene
    #[arg(short, long, requires = "genome")]
    annotation: Option<PathBuf>,

    /// Gene id (or name) from the annotation
    #[arg(long, requires = "annotation")]
    gene: Option<String>,

    /// Engine configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Precomputed off-target hits (TSV) instead of running bowtie2
    #[arg(long)]
    hits: Option<PathBuf>,

    /// Skip primer3
    #[arg(long)]
    no_primers: bool,

    /// Keep guides whose 30-mer context runs off the sequence ends
    #[arg(long)]
    relaxed: bool,

    /// Output file; results go to stdout when unset
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,
}

fn parse_region(region: &str) -> Result<(String, u64, u64)> {
    let (chromosome, span) = region
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("region '{}' is not CHR:START-END", region))?;
    let (start, end) = span
        .split_once('-')
        .ok_or_else(|| anyhow!("region '{}' is not CHR:START-END", region))?;
    let start: u64 = start.replace(',', "").parse().with_context(|| format!("bad start in '{}'", region))?;
    let end: u64 = end.replace(',', "").parse().with_context(|| format!("bad end in '{}'", region))?;
    if start == 0 || start > end {
        bail!("region '{}' must satisfy 1 <= START <= END", region);
    }
    Ok((chromosome.to_string(), start, end))
}

fn build_engine(args: &DesignArgs) -> Result<Engine> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(&resolve_path(path))?,
        None => EngineConfig::default(),
    };
    if args.relaxed {
        config.scan.require_context = false;
    }

    let aligner: Box<dyn OffTargetSearch> = match &args.hits {
        Some(path) => Box::new(HitTable::from_path(&resolve_path(path))?),
        None => match Bowtie2Aligner::from_settings(&config.aligner) {
            Ok(aligner) => {
                info!("Using bowtie2 index {}", aligner.index.display());
                Box::new(aligner)
            }
            Err(e) => {
                warn!("Off-target search unavailable, specificity will be degraded: {}", e);
                Box::new(UnavailableSearch { reason: e.to_string() })
            }
        },
    };

    let mut engine = Engine::from_config(&config, aligner).context("Failed to load weight tables")?;

    if args.no_primers || !config.primers.enabled {
        info!("Primer design disabled");
    } else {
        match Primer3Designer::from_settings(&config.primers) {
            Ok(designer) => engine = engine.with_primer_designer(Box::new(designer)),
            Err(e) => warn!("Primer design disabled: {}", e),
        }
    }

    Ok(engine)
}

/// Ranked guides per input sequence, labelled for output file naming.
fn run_design(args: &DesignArgs, engine: &Engine) -> Result<Vec<(String, Vec<ScoreRecord>)>> {
    if let Some(sequence) = &args.sequence {
        return Ok(vec![("sequence".to_string(), analyze(sequence, engine))]);
    }

    if let Some(path) = &args.fasta_input {
        let reader = fasta::Reader::from_file(resolve_path(path))
            .map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
        let mut results = Vec::new();
        for record in reader.records() {
            let record = record.with_context(|| format!("Failed to parse {}", path.display()))?;
            let sequence = String::from_utf8_lossy(record.seq());
            info!("Designing guides for {} ({} bp)", record.id(), sequence.len());
            results.push((record.id().to_string(), analyze(&sequence, engine)));
        }
        return Ok(results);
    }

    let genome = args
        .genome
        .as_ref()
        .ok_or_else(|| anyhow!("one of --sequence, --fasta-input or --genome is required"))?;
    let store = FastaStore::open(&resolve_path(genome))?;

    let (label, chromosome, start, end) = if let Some(region) = &args.region {
        let (chromosome, start, end) = parse_region(region)?;
        (region.clone(), chromosome, start, end)
    } else if let (Some(annotation), Some(gene_id)) = (&args.annotation, &args.gene) {
        let genes = GeneIndex::from_gff3(&resolve_path(annotation))?;
        let gene = genes
            .find(gene_id)
            .ok_or_else(|| anyhow!("gene '{}' not found in {}", gene_id, annotation.display()))?;
        info!("{}: {}:{}-{} ({}) {}", gene.gene_id, gene.chromosome, gene.start, gene.end, gene.strand, gene.description);
        (gene.gene_id.clone(), gene.chromosome.clone(), gene.start, gene.end)
    } else {
        bail!("--genome needs either --region or --annotation with --gene");
    };

    let analysis = analyze_region(engine, &store, &chromosome, start, end)?;
    if let Some(best) = analysis.records.first() {
        info!(
            "Top guide {} at {}:{}",
            best.guide_sequence,
            analysis.chromosome,
            analysis.genomic_start(best)
        );
    }
    Ok(vec![(label, analysis.records)])
}

fn output_path(base: &Path, label: &str, format: OutputFormat, several: bool) -> PathBuf {
    if !several {
        return base.to_path_buf();
    }
    let stem = base.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let safe: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    base.with_file_name(format!("{}_{}.{}", stem, safe, format.extension()))
}

fn write_results(results: &[(String, Vec<ScoreRecord>)], args: &DesignArgs) -> Result<()> {
    let several = results.len() > 1;
    for (label, records) in results {
        let Some(base) = &args.output else {
            println!("# {} ({} guides)", label, records.len());
            match args.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
                _ => println!("{}", report::to_dataframe(records)?),
            }
            continue;
        };

        let path = output_path(base, label, args.format, several);
        match args.format {
            OutputFormat::Csv => report::write_table(records, &path, b',')?,
            OutputFormat::Tsv => report::write_table(records, &path, b'\t')?,
            OutputFormat::Json => report::write_json(records, &path)?,
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::InitConfig { path } => {
            EngineConfig::write_default(&path)?;
            info!("Default configuration written to {}", path.display());
        }
        Commands::Design(args) => {
            let engine = build_engine(&args)?;
            let results = run_design(&args, &engine)?;
            let total: usize = results.iter().map(|(_, r)| r.len()).sum();
            info!("Designed {} guides across {} sequence(s)", total, results.len());
            write_results(&results, &args)?;
        }
    }
    Ok(())
}
