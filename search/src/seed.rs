use sha2::{Digest, Sha256};

/// Derives the seed of one trial from the search seed, the probed value and the trial index.
///
/// The derivation depends only on its inputs, so batches replay identically on
/// any number of worker threads.
#[must_use]
pub fn derive_trial_seed(base_seed: u64, value: f64, trial: usize) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base_seed.to_le_bytes());
    hasher.update(value.to_bits().to_le_bytes());
    hasher.update((trial as u64).to_le_bytes());
    finalize_seed(hasher)
}

fn finalize_seed(hasher: Sha256) -> u64 {
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
