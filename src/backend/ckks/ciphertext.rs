//! CKKS ciphertexts

use crate::math::RnsPoly;
use serde::{Deserialize, Serialize};

/// Ciphertext (c0, c1) with c0 + c1·s ≈ Δ·m over the first `level + 1` primes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CkksCiphertext {
    pub(crate) c0: RnsPoly,
    pub(crate) c1: RnsPoly,
    pub(crate) scale: f64,
}

impl CkksCiphertext {
    /// Remaining rescale steps: number of primes minus one
    pub fn level(&self) -> usize {
        self.c0.limb_count().saturating_sub(1)
    }

    /// Current encoding scale
    pub fn scale(&self) -> f64 {
        self.scale
    }
}
