use binning_directory::{BinningDirectory, KmerShape};
use proptest::prelude::*;
use std::collections::HashSet;

/// Naive per-bin hit count: how many query windows were inserted.
fn naive_direct_counts(
    inserted: &[u8],
    query: &[u8],
    k: usize,
    bins: usize,
    bin: usize,
) -> Vec<u32> {
    let shape = KmerShape::new(k);
    let present: HashSet<u64> = shape.get_hash(inserted).into_iter().collect();
    let mut counts = vec![0u32; bins];
    for hash in shape.get_hash(query) {
        if present.contains(&hash) {
            counts[bin] += 1;
        }
    }
    counts
}

proptest! {
    // A bin that received every k-mer of a text must pass the full-length
    // threshold: the Bloom layout never reports false negatives.
    #[test]
    fn prop_bloom_no_false_negatives(
        k in 14usize..=20,
        hash_funcs in 1u16..=3,
        bin in 0u32..32,
        seq in prop::collection::vec(prop::sample::select(b"ACGT".to_vec()), 20..100)
    ) {
        prop_assume!(seq.len() >= k);
        let bd = BinningDirectory::new(32, hash_funcs, k as u16, 1 << 18).unwrap();
        bd.insert_kmer(&seq, bin);
        let windows = (seq.len() - k + 1) as u32;
        prop_assert!(bd.count(&seq)[bin as usize] >= windows);
        prop_assert!(bd.select(&seq, windows)[bin as usize]);
    }

    // The direct layout is exact: counts match a naive membership scan and
    // untouched bins stay at zero.
    #[test]
    fn prop_direct_counts_are_exact(
        k in 3usize..=8,
        bin in 0u32..8,
        seq in prop::collection::vec(prop::sample::select(b"ACGT".to_vec()), 8..80),
        query in prop::collection::vec(prop::sample::select(b"ACGT".to_vec()), 8..80)
    ) {
        prop_assume!(seq.len() >= k && query.len() >= k);
        let bits = (1u64 << (2 * k)) * 64;
        let da = BinningDirectory::new_direct(8, k as u16, bits).unwrap();
        da.insert_kmer(&seq, bin);
        let counts = da.count(&query);
        prop_assert_eq!(counts, naive_direct_counts(&seq, &query, k, 8, bin as usize));
    }

    // Clearing the bin a text went into erases every trace of it.
    #[test]
    fn prop_clear_erases_bin(
        k in 14usize..=18,
        bin in 0u32..16,
        threads in 1usize..=4,
        seq in prop::collection::vec(prop::sample::select(b"ACGT".to_vec()), 20..60)
    ) {
        prop_assume!(seq.len() >= k);
        let bd = BinningDirectory::new(16, 2, k as u16, 1 << 18).unwrap();
        bd.insert_kmer(&seq, bin);
        bd.clear(&[bin], threads).unwrap();
        prop_assert_eq!(bd.count(&seq)[bin as usize], 0);
    }
}
