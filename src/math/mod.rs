//! Mathematical primitives for RNS-CKKS.
//!
//! - **Modular arithmetic** over word-sized primes, primality testing and
//!   NTT-friendly prime search
//! - **Number-Theoretic Transform (NTT)** with Montgomery reduction
//! - **RNS polynomials** over R_Q = Z_Q[X]/(X^n + 1)
//! - **Samplers** for discrete Gaussian, ternary and uniform coefficients

pub mod modular;
pub mod ntt;
pub mod poly;
pub mod sampler;

pub use modular::{is_prime, ntt_friendly_primes, ModQ};
pub use ntt::NttContext;
pub use poly::{RnsBasis, RnsPoly};
pub use sampler::{sample_ternary, sample_uniform, GaussianSampler, DEFAULT_SIGMA};
