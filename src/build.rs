//! Bulk build: fan bins out across a bounded worker pool.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use crate::directory::{BinningDirectory, FilterError};

/// Per-bin sequence ingest consumed by the bulk build.
///
/// Implementations read whatever backs a bin (files, archives, memory) and
/// hand the sequences back; the orchestrator feeds them to the filter.
pub trait BinSource: Sync {
    /// All sequences belonging to bin `bin_no`.
    fn sequences(&self, bin_no: u32) -> io::Result<Vec<Vec<u8>>>;
}

/// In-memory [`BinSource`], one `Vec` of sequences per bin.
pub struct MemorySource {
    bins: Vec<Vec<Vec<u8>>>,
}

impl MemorySource {
    /// Wrap per-bin sequence sets; index = bin number.
    pub fn new(bins: Vec<Vec<Vec<u8>>>) -> Self {
        MemorySource { bins }
    }
}

impl BinSource for MemorySource {
    fn sequences(&self, bin_no: u32) -> io::Result<Vec<Vec<u8>>> {
        match self.bins.get(bin_no as usize) {
            Some(seqs) => Ok(seqs.clone()),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no sequences for bin {bin_no}"),
            )),
        }
    }
}

/// Build-time configuration.
#[derive(Clone)]
pub struct BuildConfig {
    threads: usize,
    bins_per_task: u32,
    verbose: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            bins_per_task: 8,
            verbose: false,
        }
    }
}

impl BuildConfig {
    /// Bound on concurrently running workers (default 8).
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = n.max(1);
        self
    }
    /// Contiguous bins handled by one worker task (default 8).
    pub fn bins_per_task(mut self, n: u32) -> Self {
        self.bins_per_task = n.max(1);
        self
    }
    /// Emit a progress line per finished bin.
    pub fn verbose(mut self, yes: bool) -> Self {
        self.verbose = yes;
        self
    }
}

/// Writer-serialized progress log; workers share one instance so lines
/// never interleave.
pub struct Progress {
    out: Option<Mutex<Box<dyn io::Write + Send>>>,
}

impl Progress {
    /// Log to stderr when `verbose`, otherwise drop all lines.
    pub fn stderr(verbose: bool) -> Self {
        let out: Option<Mutex<Box<dyn io::Write + Send>>> = if verbose {
            Some(Mutex::new(Box::new(io::stderr())))
        } else {
            None
        };
        Progress { out }
    }

    /// Emit one line. Write failures on a progress channel are ignored.
    pub fn line(&self, msg: &str) {
        if let Some(out) = &self.out {
            let mut w = out.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = writeln!(w, "{msg}");
        }
    }
}

/// Insert every k-mer of every bin of `source` into `bd`.
///
/// Workers take contiguous bin ranges; the pool bounds how many run at
/// once. On a worker error the remaining workers finish their ranges (no
/// cancellation) and the first error is returned after the join, in which
/// case the partially populated filter must be discarded.
pub fn build_directory<S: BinSource>(
    bd: &BinningDirectory,
    source: &S,
    config: &BuildConfig,
) -> Result<(), FilterError> {
    let bins = bd.bins();
    let progress = Progress::stderr(config.verbose);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .map_err(|e| FilterError::Resource(format!("cannot build worker pool: {e}")))?;

    let first_error: Mutex<Option<io::Error>> = Mutex::new(None);
    pool.scope(|s| {
        let mut start = 0u32;
        while start < bins {
            let end = bins.min(start + config.bins_per_task);
            let progress = &progress;
            let first_error = &first_error;
            s.spawn(move |_| {
                for bin_no in start..end {
                    match source.sequences(bin_no) {
                        Ok(seqs) => {
                            for seq in &seqs {
                                bd.insert_kmer(seq, bin_no);
                            }
                            progress.line(&format!("Finished indexing bin {bin_no}"));
                        }
                        Err(e) => {
                            let mut slot =
                                first_error.lock().unwrap_or_else(PoisonError::into_inner);
                            if slot.is_none() {
                                *slot = Some(e);
                            }
                            return;
                        }
                    }
                }
            });
            start = end;
        }
    });

    match first_error
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
    {
        Some(e) => Err(FilterError::Io(e)),
        None => Ok(()),
    }
}
