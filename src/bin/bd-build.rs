use clap::Parser;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use seq_io::fasta::{Reader, Record};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use binning_directory::shape::map_base;
use binning_directory::{BinSource, BinningDirectory, BuildConfig, FilterError, build_directory};

/// Build an interleaved Bloom filter over binned reference sequences.
///
/// Bin `i` is read from `<REF><i>.fna`; the filter is written next to the
/// references as `<prefix>bloom.bf`.
#[derive(Parser, Debug)]
#[command(name = "bd-build", author, version, about)]
struct Args {
    /// Reference filename prefix.
    reference: PathBuf,

    /// Displays verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Filename prefix for the reference genome index.
    /// Default: the filename prefix of the reference genome.
    #[arg(short = 'o', long)]
    output_prefix: Option<PathBuf>,

    /// Temporary directory where to construct the index.
    /// Default: the output directory.
    #[arg(long)]
    tmp_dir: Option<PathBuf>,

    /// The number of bins (indices) for the distributed mapper.
    #[arg(short = 'b', long, default_value_t = 64,
          value_parser = clap::value_parser!(u32).range(1..=1000))]
    number_of_bins: u32,

    /// The size of k-mers for the Bloom filter.
    #[arg(short = 'k', long, default_value_t = 20,
          value_parser = clap::value_parser!(u16).range(14..=32))]
    kmer_size: u16,

    /// The number of Bloom hash functions.
    #[arg(long, default_value_t = 4,
          value_parser = clap::value_parser!(u16).range(1..=5))]
    hash_funcs: u16,

    /// Bloom filter size in bits.
    #[arg(long, default_value_t = 1 << 33)]
    filter_size: u64,

    /// Worker threads for the bulk build.
    #[arg(long, default_value_t = 8)]
    threads: usize,
}

/// Reads bin `i` from `<prefix><i>.fna`, randomizing ambiguous IUPAC bases
/// to {A,C,G,T} with a per-bin seeded generator so builds are repeatable.
struct FastaSource {
    prefix: PathBuf,
}

impl FastaSource {
    fn bin_path(&self, bin_no: u32) -> PathBuf {
        let mut name = self.prefix.clone().into_os_string();
        name.push(bin_no.to_string());
        name.push(".fna");
        PathBuf::from(name)
    }
}

impl BinSource for FastaSource {
    fn sequences(&self, bin_no: u32) -> io::Result<Vec<Vec<u8>>> {
        let mut rng = SmallRng::seed_from_u64(0x5eed ^ u64::from(bin_no));
        let mut reader = Reader::from_path(self.bin_path(bin_no))?;
        let mut seqs = Vec::new();
        while let Some(result) = reader.next() {
            let record = result.map_err(io::Error::other)?;
            let mut seq = record.full_seq().into_owned();
            for base in &mut seq {
                if map_base(*base).is_none() {
                    *base = b"ACGT"[rng.gen_range(0..4)];
                }
            }
            seqs.push(seq);
        }
        Ok(seqs)
    }
}

fn phase_error(e: FilterError) -> anyhow::Error {
    let phase = match &e {
        FilterError::Io(_) => "Error while opening the reference file.",
        FilterError::Resource(_) => "Insufficient memory to index the reference.",
        FilterError::Config(_) => "Invalid index parameters.",
        FilterError::Format(_) => "Error while reading the reference index file.",
    };
    anyhow::Error::new(e).context(phase)
}

fn run(args: &Args) -> anyhow::Result<()> {
    let output_prefix = args
        .output_prefix
        .clone()
        .unwrap_or_else(|| args.reference.clone());
    let tmp_dir = args.tmp_dir.clone().unwrap_or_else(|| {
        let mut dir = output_prefix.clone();
        dir.pop();
        if dir.as_os_str().is_empty() {
            dir.push(".");
        }
        dir
    });
    // Workers are not running yet, so mutating the environment is safe.
    unsafe { std::env::set_var("TMPDIR", &tmp_dir) };

    let bd = BinningDirectory::new(
        args.number_of_bins,
        args.hash_funcs,
        args.kmer_size,
        args.filter_size,
    )
    .map_err(phase_error)?;

    let source = FastaSource {
        prefix: args.reference.clone(),
    };
    let config = BuildConfig::default()
        .threads(args.threads)
        .verbose(args.verbose);
    build_directory(&bd, &source, &config).map_err(phase_error)?;

    let mut filter_file = output_prefix.into_os_string();
    filter_file.push("bloom.bf");
    bd.save(&filter_file)
        .map_err(|e| anyhow::Error::new(e).context("Error while saving the reference index file."))?;

    if args.verbose {
        eprintln!(
            "Built filter: bins={}, k={}, hash_funcs={}, bits={}",
            bd.bins(),
            bd.kmer_size(),
            args.hash_funcs,
            bd.bits()
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("bd-build: {e:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
