//! Noise and secret distributions over Z
//!
//! Samplers are stateless and draw from a caller-supplied RNG so that a
//! single seeded `ChaCha20Rng` can drive a whole key generation or
//! encryption deterministically.

use rand::Rng;

/// Default Gaussian standard deviation
pub const DEFAULT_SIGMA: f64 = 3.2;

/// Discrete Gaussian sampler over Z using rejection sampling
#[derive(Debug, Clone, Copy)]
pub struct GaussianSampler {
    sigma: f64,
    /// Reject samples beyond this many units from zero
    tailcut: i64,
}

impl GaussianSampler {
    /// Create a sampler with the given standard deviation and a 6σ tailcut
    pub fn new(sigma: f64) -> Self {
        Self {
            sigma,
            tailcut: (sigma * 6.0).ceil() as i64,
        }
    }

    /// Get the standard deviation
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Sample a single value from the discrete Gaussian D_σ
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        let sigma_sq_2 = 2.0 * self.sigma * self.sigma;
        loop {
            let x = rng.gen_range(-self.tailcut..=self.tailcut);
            let prob = (-((x * x) as f64) / sigma_sq_2).exp();
            let u: f64 = rng.gen();
            if u < prob {
                return x;
            }
        }
    }

    /// Sample `n` signed values
    pub fn sample_vec<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<i64> {
        (0..n).map(|_| self.sample(rng)).collect()
    }
}

impl Default for GaussianSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SIGMA)
    }
}

/// Sample `n` coefficients uniformly from {-1, 0, 1}
pub fn sample_ternary<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<i64> {
    (0..n).map(|_| rng.gen_range(-1i64..=1)).collect()
}

/// Sample `n` coefficients uniformly from [0, q)
pub fn sample_uniform<R: Rng + ?Sized>(n: usize, q: u64, rng: &mut R) -> Vec<u64> {
    (0..n).map(|_| rng.gen_range(0..q)).collect()
}
