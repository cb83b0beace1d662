//! Sequence helpers shared by the read and reference cipher paths

/// Encode a nucleotide to 2-bit representation
pub fn encode_nucleotide(nucleotide: u8) -> Option<u64> {
    match nucleotide.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Generate reverse complement of a sequence
pub fn reverse_complement(sequence: &[u8]) -> Vec<u8> {
    sequence
        .iter()
        .rev()
        .map(|&nucleotide| complement_nucleotide(nucleotide))
        .collect()
}

/// Get complement of a single nucleotide
pub fn complement_nucleotide(nucleotide: u8) -> u8 {
    match nucleotide.to_ascii_uppercase() {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        _ => nucleotide,
    }
}

/// Number of overlapping k-mers in a sequence of `len` bases
pub fn dense_kmer_count(len: usize, k: usize) -> usize {
    if k == 0 || len < k {
        0
    } else {
        len - k + 1
    }
}

/// Number of reference samples kept for a contig of `len` bases
pub fn sampled_kmer_count(len: usize, sampling_interval: usize) -> usize {
    len.div_ceil(sampling_interval)
}

/// Whether every base of the window is one of A/C/G/T
pub fn is_unambiguous(window: &[u8]) -> bool {
    window.iter().all(|&b| encode_nucleotide(b).is_some())
}
