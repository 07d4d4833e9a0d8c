//! Number-Theoretic Transform (NTT) for fast polynomial multiplication.
//!
//! Implements Cooley-Tukey radix-2 NTT for negacyclic convolution over
//! R_q = Z_q[X]/(X^d + 1), one table per RNS prime. Multiplying two
//! polynomials costs two forward transforms, a pointwise product and one
//! inverse transform.
//!
//! # Theory
//!
//! For negacyclic convolution we use a primitive 2n-th root of unity ψ with
//! ψ^n = -1. The modulus q must satisfy q ≡ 1 (mod 2n) for ψ to exist.
//!
//! Values inside the NTT domain are kept in Montgomery form (R = 2^64), so
//! the pointwise product needs no division.
//!
//! # Example
//!
//! ```
//! use fedavg_he::math::ntt::NttContext;
//!
//! let ctx = NttContext::new(256, 1152921504606830593);
//!
//! let mut coeffs = vec![1u64; 256];
//! ctx.forward(&mut coeffs);
//! ctx.inverse(&mut coeffs);
//! assert_eq!(coeffs[0], 1);
//! ```

use super::modular::ModQ;

/// Precomputed NTT tables for one prime.
#[derive(Clone, Debug)]
pub struct NttContext {
    /// Ring dimension (power of two).
    n: usize,
    /// Prime modulus, q ≡ 1 (mod 2n).
    q: u64,
    /// -q^(-1) mod 2^64 for Montgomery reduction.
    q_inv_neg: u64,
    /// R^2 mod q for converting into Montgomery form.
    r_squared: u64,
    /// Forward twiddles ψ^bitrev(i), Montgomery form.
    psi_powers: Vec<u64>,
    /// Inverse twiddles ψ^(-bitrev(i)), Montgomery form.
    psi_inv_powers: Vec<u64>,
    /// n^(-1) mod q in Montgomery form.
    n_inv: u64,
}

impl NttContext {
    /// Creates an NTT context for the given dimension and prime.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not a power of two or if `q` is not ≡ 1 (mod 2n).
    pub fn new(n: usize, q: u64) -> Self {
        assert!(n.is_power_of_two() && n >= 2, "n must be a power of two");
        assert!(q % (2 * n as u64) == 1, "q must be ≡ 1 (mod 2n)");

        let q_inv_neg = Self::compute_q_inv_neg(q);
        let r_squared = Self::compute_r_squared(q);

        let psi = Self::find_primitive_root(2 * n as u64, q);
        let psi_inv = ModQ::pow(psi, q - 2, q);
        let n_inv = ModQ::pow(n as u64, q - 2, q);

        let mut ctx = Self {
            n,
            q,
            q_inv_neg,
            r_squared,
            psi_powers: Vec::new(),
            psi_inv_powers: Vec::new(),
            n_inv: 0,
        };
        ctx.psi_powers = ctx.compute_twiddle_factors(psi);
        ctx.psi_inv_powers = ctx.compute_twiddle_factors(psi_inv);
        ctx.n_inv = ctx.to_montgomery(n_inv);
        ctx
    }

    /// Returns the ring dimension.
    pub fn dimension(&self) -> usize {
        self.n
    }

    /// Returns the prime modulus.
    pub fn modulus(&self) -> u64 {
        self.q
    }

    /// Forward NTT in place; output is in Montgomery form.
    pub fn forward(&self, coeffs: &mut [u64]) {
        assert_eq!(coeffs.len(), self.n, "Input length must match dimension");
        for c in coeffs.iter_mut() {
            *c = self.to_montgomery(*c);
        }

        let q = self.q;
        let mut t = self.n;
        let mut m = 1;
        while m < self.n {
            t >>= 1;
            for i in 0..m {
                let j1 = 2 * i * t;
                let w = self.psi_powers[m + i];
                for j in j1..j1 + t {
                    let u = coeffs[j];
                    let v = self.montgomery_mul(coeffs[j + t], w);
                    coeffs[j] = if u + v >= q { u + v - q } else { u + v };
                    coeffs[j + t] = if u >= v { u - v } else { q - v + u };
                }
            }
            m <<= 1;
        }
    }

    /// Inverse NTT in place (Gentleman-Sande); output is in standard form.
    pub fn inverse(&self, coeffs: &mut [u64]) {
        assert_eq!(coeffs.len(), self.n, "Input length must match dimension");

        let q = self.q;
        let mut t = 1;
        let mut m = self.n;
        while m > 1 {
            m >>= 1;
            for i in 0..m {
                let j1 = i * 2 * t;
                let w = self.psi_inv_powers[m + i];
                for j in j1..j1 + t {
                    let u = coeffs[j];
                    let v = coeffs[j + t];
                    coeffs[j] = if u + v >= q { u + v - q } else { u + v };
                    let diff = if u >= v { u - v } else { q - v + u };
                    coeffs[j + t] = self.montgomery_mul(diff, w);
                }
            }
            t <<= 1;
        }

        // Scale by n^(-1) and leave Montgomery form in one pass
        for c in coeffs.iter_mut() {
            let scaled = self.montgomery_mul(*c, self.n_inv);
            *c = self.montgomery_mul(scaled, 1);
        }
    }

    /// Pointwise product of two NTT-domain vectors.
    pub fn pointwise_mul(&self, a: &[u64], b: &[u64], result: &mut [u64]) {
        assert_eq!(a.len(), self.n, "Input length must match dimension");
        assert_eq!(b.len(), self.n, "Input length must match dimension");
        assert_eq!(result.len(), self.n, "Output length must match dimension");
        for ((r, &x), &y) in result.iter_mut().zip(a).zip(b) {
            *r = self.montgomery_mul(x, y);
        }
    }

    /// Negacyclic product a·b mod (X^n + 1, q) of two coefficient vectors.
    pub fn multiply(&self, a: &[u64], b: &[u64]) -> Vec<u64> {
        let mut a_ntt = a.to_vec();
        let mut b_ntt = b.to_vec();
        self.forward(&mut a_ntt);
        self.forward(&mut b_ntt);
        let mut out = vec![0u64; self.n];
        self.pointwise_mul(&a_ntt, &b_ntt, &mut out);
        self.inverse(&mut out);
        out
    }

    #[inline]
    fn montgomery_mul(&self, a: u64, b: u64) -> u64 {
        let q = self.q;
        let ab = (a as u128) * (b as u128);
        let m = ((ab as u64).wrapping_mul(self.q_inv_neg)) as u128;
        let t = ((ab + m * (q as u128)) >> 64) as u64;
        if t >= q {
            t - q
        } else {
            t
        }
    }

    #[inline]
    fn to_montgomery(&self, a: u64) -> u64 {
        self.montgomery_mul(a, self.r_squared)
    }

    fn compute_q_inv_neg(q: u64) -> u64 {
        let mut y: u64 = 1;
        for i in 1..64 {
            let yi = y.wrapping_mul(q) & (1u64 << i);
            y |= yi;
        }
        y.wrapping_neg()
    }

    fn compute_r_squared(q: u64) -> u64 {
        let r_mod_q = (1u128 << 64) % (q as u128);
        ((r_mod_q * r_mod_q) % (q as u128)) as u64
    }

    /// Find a primitive `order`-th root of unity modulo q (order a power of two)
    fn find_primitive_root(order: u64, q: u64) -> u64 {
        let exp = (q - 1) / order;
        (2..q)
            .map(|g| ModQ::pow(g, exp, q))
            .find(|&c| ModQ::pow(c, order / 2, q) != 1)
            .expect("q ≡ 1 (mod 2n) guarantees a primitive root")
    }

    /// Twiddles in bit-reversed order: factors[m] = root^bitrev(m).
    fn compute_twiddle_factors(&self, root: u64) -> Vec<u64> {
        let n = self.n;
        let mut factors = vec![0u64; n];

        for m in 1..n {
            if m.is_power_of_two() {
                let exp = (n / (2 * m)) as u64;
                factors[m] = self.to_montgomery(ModQ::pow(root, exp, self.q));
            } else {
                let prev_idx = m & (m - 1); // clear lowest set bit
                let step_idx = m & m.wrapping_neg(); // lowest set bit
                factors[m] = self.montgomery_mul(factors[prev_idx], factors[step_idx]);
            }
        }
        factors
    }
}
