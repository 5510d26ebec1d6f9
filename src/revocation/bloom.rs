// In-process probabilistic fast path for token revocation (spec §4.5).
// False positives are possible; false negatives are not. Copy-on-write:
// the rebuilder swaps in a new filter atomically, readers take an
// immutable `Arc` (spec §9 design note, §5 "Shared resources").

use sha2::{Digest, Sha256};

pub struct BloomFilter {
    bits: Vec<bool>,
    hash_count: u32,
}

impl BloomFilter {
    /// Sizes the filter for `expected_items` at `target_fpr`, using the
    /// standard optimal-bits / optimal-hash-count formulas.
    pub fn new(expected_items: usize, target_fpr: f64) -> Self {
        let expected_items = expected_items.max(1);
        let ln2 = std::f64::consts::LN_2;
        let bits = (-(expected_items as f64) * target_fpr.ln() / (ln2 * ln2)).ceil().max(8.0) as usize;
        let hash_count = ((bits as f64 / expected_items as f64) * ln2).round().max(1.0) as u32;
        Self { bits: vec![false; bits], hash_count }
    }

    fn indices(&self, item: &str) -> Vec<usize> {
        (0..self.hash_count)
            .map(|seed| {
                let mut hasher = Sha256::new();
                hasher.update(seed.to_le_bytes());
                hasher.update(item.as_bytes());
                let digest = hasher.finalize();
                let n = u64::from_le_bytes(digest[0..8].try_into().unwrap());
                (n as usize) % self.bits.len()
            })
            .collect()
    }

    pub fn insert(&mut self, item: &str) {
        for idx in self.indices(item) {
            self.bits[idx] = true;
        }
    }

    pub fn contains(&self, item: &str) -> bool {
        self.indices(item).into_iter().all(|idx| self.bits[idx])
    }

    pub fn from_items<'a>(items: impl Iterator<Item = &'a str>, target_fpr: f64) -> Self {
        let items: Vec<&str> = items.collect();
        let mut filter = Self::new(items.len(), target_fpr);
        for item in items {
            filter.insert(item);
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_false_negatives() {
        let items: Vec<String> = (0..200).map(|i| format!("jti-{i}")).collect();
        let filter = BloomFilter::from_items(items.iter().map(|s| s.as_str()), 0.01);
        for item in &items {
            assert!(filter.contains(item));
        }
    }
}
