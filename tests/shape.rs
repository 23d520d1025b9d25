use binning_directory::KmerShape;
use binning_directory::shape::map_base;

#[test]
fn test_map_base() {
    assert_eq!(map_base(b'A'), Some(0));
    assert_eq!(map_base(b'c'), Some(1));
    assert_eq!(map_base(b'G'), Some(2));
    assert_eq!(map_base(b't'), Some(3));
    assert_eq!(map_base(b'U'), Some(3));
    assert_eq!(map_base(b'N'), None);
    assert_eq!(map_base(b'x'), None);
}

#[test]
fn test_base4_hash_values() {
    let shape = KmerShape::new(3);
    // ACG = 00 01 10, CGT = 01 10 11
    assert_eq!(shape.get_hash(b"ACG"), vec![0b000110]);
    assert_eq!(shape.get_hash(b"ACGT"), vec![0b000110, 0b011011]);
}

#[test]
fn test_window_count_and_determinism() {
    let shape = KmerShape::new(5);
    let text = b"ACGTACGTACGTACGT";
    let hashes = shape.get_hash(text);
    assert_eq!(hashes.len(), text.len() - 5 + 1);
    assert_eq!(hashes, shape.get_hash(text));
}

#[test]
fn test_init_next_matches_eager() {
    let text = b"TTGACCAGTACCA";
    let k = 4;
    let mut rolling = KmerShape::new(k);
    rolling.hash_init(text);
    let stepped: Vec<u64> = text[k - 1..].iter().map(|&b| rolling.hash_next(b)).collect();
    assert_eq!(stepped, KmerShape::new(k).get_hash(text));
}

#[test]
fn test_text_shorter_than_window() {
    let shape = KmerShape::new(8);
    assert!(shape.get_hash(b"ACGT").is_empty());
    assert!(shape.get_hash(b"").is_empty());
}

#[test]
fn test_full_width_window() {
    let shape = KmerShape::new(32);
    let text = [b'T'; 32];
    assert_eq!(shape.get_hash(&text), vec![u64::MAX]);
}
