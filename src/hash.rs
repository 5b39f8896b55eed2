use sha2::{Digest, Sha256};

/// XOR-folds a run of big-endian 32-bit words into one signed 32-bit value.
fn fold_words(bytes: &[u8]) -> i32 {
    bytes
        .chunks_exact(4)
        .map(|word| {
            u32::from_be_bytes(word.try_into().expect("digest word is 4 bytes"))
        })
        .fold(0u32, |acc, word| acc ^ word) as i32
}

/// Derives the bit positions a payload occupies in a filter of `total_bits`
/// bits. `total_bits` must be non-zero.
///
/// The payload is hashed once with SHA-256. The digest's eight big-endian
/// 32-bit words are folded into two signed seeds: `h1` from the first four,
/// `h2` from the last four. Position `i` is `(h1 + i * h2) mod total_bits`,
/// with negative remainders shifted back into `[0, total_bits)`. The result
/// is sorted ascending and may contain duplicates.
pub fn derive_indices(
    payload: &[u8],
    total_bits: usize,
    num_hashes: usize,
) -> Vec<usize> {
    let digest = Sha256::digest(payload);
    let h1 = i64::from(fold_words(&digest[..16]));
    let h2 = i64::from(fold_words(&digest[16..]));
    let m = total_bits as i64;

    let mut indices: Vec<usize> = (0..num_hashes)
        .map(|i| {
            h1.wrapping_add((i as i64).wrapping_mul(h2)).rem_euclid(m) as usize
        })
        .collect();
    indices.sort_unstable();
    indices
}

pub fn optimal_bit_vector_size(n: usize, fpr: f64) -> usize {
    let ln2 = std::f64::consts::LN_2;
    ((-(n as f64) * fpr.ln()) / (ln2 * ln2)).ceil() as usize
}

pub fn optimal_num_hashes(n: usize, m: usize) -> usize {
    ((m as f64 / n as f64) * std::f64::consts::LN_2).round() as usize
}

/// Sizing for a target element count and false positive rate: the bit array
/// size m and hash count k. k is floored at 1, since a zero hash count would
/// make every membership test vacuously true.
pub fn calculate_parameters(
    expected_elements: usize,
    false_positive_rate: f64,
) -> (usize, usize) {
    let total_bits =
        optimal_bit_vector_size(expected_elements, false_positive_rate);
    let hash_count = optimal_num_hashes(expected_elements, total_bits).max(1);
    (total_bits, hash_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_indices_deterministic() {
        let payload = br#"{"email":"user@example.com","password":null}"#;
        let first = derive_indices(payload, 14_377_588, 10);
        let second = derive_indices(payload, 14_377_588, 10);
        assert_eq!(first, second, "Same payload must map to same positions");
    }

    #[test]
    fn test_derive_indices_sorted_and_in_range() {
        for seed in 0..50 {
            let payload = format!("record_{seed}").into_bytes();
            let indices = derive_indices(&payload, 800, 4);

            assert_eq!(indices.len(), 4, "One position per hash");
            assert!(
                indices.windows(2).all(|w| w[0] <= w[1]),
                "Positions must be sorted ascending: {indices:?}"
            );
            assert!(
                indices.iter().all(|&i| i < 800),
                "All positions must be within the bit array: {indices:?}"
            );
        }
    }

    #[test]
    fn test_derive_indices_empty_payload() {
        let indices = derive_indices(b"", 800, 4);
        assert_eq!(indices.len(), 4);
        assert!(indices.iter().all(|&i| i < 800));
    }

    #[test]
    fn test_derive_indices_distinct_payloads_differ() {
        let a = derive_indices(b"record_a", 14_377_588, 10);
        let b = derive_indices(b"record_b", 14_377_588, 10);
        assert_ne!(
            a, b,
            "Distinct payloads should land on distinct position sets"
        );
    }

    #[test]
    fn test_calculate_parameters_known_values() {
        assert_eq!(calculate_parameters(1_000_000, 0.001), (14_377_588, 10));
        assert_eq!(calculate_parameters(100, 0.01), (959, 7));
    }

    #[test]
    fn test_hash_count_floored_at_one() {
        let (total_bits, hash_count) = calculate_parameters(1000, 0.99);
        assert_eq!(total_bits, 21);
        assert_eq!(
            hash_count, 1,
            "Rounded-to-zero hash count must be raised to 1"
        );
    }
}
