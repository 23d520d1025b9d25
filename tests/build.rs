use binning_directory::{BinningDirectory, BuildConfig, FilterError, MemorySource, build_directory};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn random_dna(rng: &mut SmallRng, len: usize) -> Vec<u8> {
    (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

#[test]
fn parallel_build_matches_serial_inserts() {
    let mut rng = SmallRng::seed_from_u64(61);
    let per_bin: Vec<Vec<Vec<u8>>> = (0..24)
        .map(|_| (0..4).map(|_| random_dna(&mut rng, 80)).collect())
        .collect();

    let serial = BinningDirectory::new(24, 3, 18, 1 << 20).unwrap();
    for (bin_no, seqs) in per_bin.iter().enumerate() {
        for seq in seqs {
            serial.insert_kmer(seq, bin_no as u32);
        }
    }

    let parallel = BinningDirectory::new(24, 3, 18, 1 << 20).unwrap();
    let source = MemorySource::new(per_bin.clone());
    let config = BuildConfig::default().threads(4).bins_per_task(3);
    build_directory(&parallel, &source, &config).unwrap();

    for seqs in &per_bin {
        for seq in seqs {
            assert_eq!(parallel.count(seq), serial.count(seq));
        }
    }
}

#[test]
fn build_reports_first_source_error() {
    // Source only covers 8 of the directory's 16 bins.
    let bd = BinningDirectory::new(16, 2, 18, 1 << 20).unwrap();
    let source = MemorySource::new(vec![vec![b"ACGTACGTACGTACGTACGT".to_vec()]; 8]);
    let config = BuildConfig::default().threads(2);
    assert!(matches!(
        build_directory(&bd, &source, &config),
        Err(FilterError::Io(_))
    ));
}

#[test]
fn single_threaded_build_works() {
    let per_bin = vec![vec![b"TTGACCAGTACCATTGACCAGT".to_vec()]; 3];
    let bd = BinningDirectory::new(3, 2, 20, 1 << 18).unwrap();
    let source = MemorySource::new(per_bin);
    let config = BuildConfig::default().threads(1).verbose(false);
    build_directory(&bd, &source, &config).unwrap();
    for bin_no in 0..3 {
        assert!(bd.select(b"TTGACCAGTACCATTGACCAGT", 1)[bin_no]);
    }
}
