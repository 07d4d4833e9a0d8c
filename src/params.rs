//! CKKS parameter sets for federated averaging
//!
//! Total modulus sizes follow the HomomorphicEncryption.org 128-bit security
//! table for ternary secrets.

use crate::error::{fed_err, Result};
use crate::math::DEFAULT_SIGMA;
use serde::{Deserialize, Serialize};

/// Smallest supported ring dimension
pub const MIN_RING_DIM: usize = 1024;

/// Largest supported ring dimension
pub const MAX_RING_DIM: usize = 32768;

/// Default encoding scale exponent: Δ = 2^40
pub const DEFAULT_SCALE_BITS: u32 = 40;

/// Bits reserved above the scale in the base prime for the integer part of decoded values
pub const BASE_PRIME_MARGIN_BITS: u32 = 10;

/// Largest total modulus (in bits) that keeps 128-bit security for dimension `n`
pub fn max_total_bits(n: usize) -> Option<u32> {
    match n {
        1024 => Some(27),
        2048 => Some(54),
        4096 => Some(109),
        8192 => Some(218),
        16384 => Some(438),
        32768 => Some(881),
        _ => None,
    }
}

/// Core cryptographic parameters shared by every participant of a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CkksParams {
    /// Ring dimension N (power of two); N/2 slots
    pub ring_dim: usize,

    /// Bit widths of the modulus chain, base prime first.
    /// The chain length minus one is the multiplicative depth.
    pub modulus_bits: Vec<u32>,

    /// Encoding scale exponent: Δ = 2^scale_bits
    pub scale_bits: u32,

    /// Standard deviation for Gaussian error sampling
    pub sigma: f64,
}

impl CkksParams {
    /// Build a parameter set with the default noise width
    pub fn new(ring_dim: usize, modulus_bits: Vec<u32>, scale_bits: u32) -> Self {
        Self {
            ring_dim,
            modulus_bits,
            scale_bits,
            sigma: DEFAULT_SIGMA,
        }
    }

    /// N = 16384, chain [60, 40, 40, 60], Δ = 2^40
    pub fn fedavg_n16384() -> Self {
        Self::new(16384, vec![60, 40, 40, 60], DEFAULT_SCALE_BITS)
    }

    /// N = 8192, chain [60, 40, 40, 60], Δ = 2^40 (faster, still 128-bit secure)
    pub fn fedavg_n8192() -> Self {
        Self::new(8192, vec![60, 40, 40, 60], DEFAULT_SCALE_BITS)
    }

    /// Encoding scale Δ
    pub fn scale(&self) -> f64 {
        2f64.powi(self.scale_bits as i32)
    }

    /// Number of plaintext slots
    pub fn slot_count(&self) -> usize {
        self.ring_dim / 2
    }

    /// Maximum multiplicative depth D = len(chain) - 1
    pub fn max_depth(&self) -> usize {
        self.modulus_bits.len().saturating_sub(1)
    }

    /// Sum of the chain's bit widths
    pub fn total_bits(&self) -> u32 {
        self.modulus_bits.iter().sum()
    }

    /// Check that the parameters are usable and 128-bit secure
    pub fn validate(&self) -> Result<()> {
        let n = self.ring_dim;
        if !n.is_power_of_two() || !(MIN_RING_DIM..=MAX_RING_DIM).contains(&n) {
            return Err(fed_err!(
                Config,
                "ring dimension {n} must be a power of two in [{MIN_RING_DIM}, {MAX_RING_DIM}]"
            ));
        }

        if self.modulus_bits.len() < 2 {
            return Err(fed_err!(
                Config,
                "modulus chain needs at least 2 primes for one multiplicative level, got {}",
                self.modulus_bits.len()
            ));
        }

        if let Some(bad) = self.modulus_bits.iter().find(|b| !(20..=60).contains(*b)) {
            return Err(fed_err!(Config, "prime width {bad} outside [20, 60] bits"));
        }

        let bound = max_total_bits(n).unwrap_or(0);
        if self.total_bits() > bound {
            return Err(fed_err!(
                Config,
                "total modulus of {} bits exceeds the 128-bit bound of {bound} bits for N = {n}",
                self.total_bits()
            ));
        }

        if !(20..=58).contains(&self.scale_bits) {
            return Err(fed_err!(
                Config,
                "scale of 2^{} outside [2^20, 2^58]",
                self.scale_bits
            ));
        }

        if self.modulus_bits[0] < self.scale_bits + BASE_PRIME_MARGIN_BITS {
            return Err(fed_err!(
                Config,
                "base prime of {} bits leaves no room above a 2^{} scale",
                self.modulus_bits[0],
                self.scale_bits
            ));
        }

        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(fed_err!(
                Config,
                "error width {} must be positive",
                self.sigma
            ));
        }

        Ok(())
    }
}

impl Default for CkksParams {
    fn default() -> Self {
        Self::fedavg_n16384()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FedError;

    #[test]
    fn test_presets_valid() {
        assert!(CkksParams::default().validate().is_ok());
        assert!(CkksParams::fedavg_n8192().validate().is_ok());
        assert_eq!(CkksParams::default().max_depth(), 3);
        assert_eq!(CkksParams::fedavg_n8192().slot_count(), 4096);
    }

    #[test]
    fn test_scale() {
        let params = CkksParams::default();
        assert_eq!(params.scale(), (1u64 << 40) as f64);
    }

    #[test]
    fn test_rejects_bad_dimension() {
        for n in [1000, 512, 65536] {
            let params = CkksParams::new(n, vec![60, 40], 40);
            assert!(
                matches!(params.validate(), Err(FedError::Config(_))),
                "n = {n}"
            );
        }
    }

    #[test]
    fn test_rejects_single_prime() {
        let params = CkksParams::new(8192, vec![60], 40);
        assert!(matches!(params.validate(), Err(FedError::Config(_))));
    }

    #[test]
    fn test_rejects_insecure_chain() {
        // 4 x 60 = 240 bits > 218 for N = 8192
        let params = CkksParams::new(8192, vec![60, 60, 60, 60], 40);
        assert!(matches!(params.validate(), Err(FedError::Config(_))));
    }

    #[test]
    fn test_rejects_narrow_base_prime() {
        let params = CkksParams::new(8192, vec![45, 40, 60], 40);
        assert!(matches!(params.validate(), Err(FedError::Config(_))));
    }

    #[test]
    fn test_rejects_scale_out_of_range() {
        let params = CkksParams::new(8192, vec![60, 40, 60], 59);
        assert!(matches!(params.validate(), Err(FedError::Config(_))));
        let params = CkksParams::new(8192, vec![60, 40, 60], 10);
        assert!(matches!(params.validate(), Err(FedError::Config(_))));
    }

    #[test]
    fn test_rejects_prime_width() {
        let params = CkksParams::new(16384, vec![60, 61], 40);
        assert!(matches!(params.validate(), Err(FedError::Config(_))));
        let params = CkksParams::new(16384, vec![60, 19], 40);
        assert!(matches!(params.validate(), Err(FedError::Config(_))));
    }
}
