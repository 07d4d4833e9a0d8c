//! RNS polynomials over R_Q = Z_Q[X]/(X^n + 1) with Q = q_0 · q_1 · … · q_k.
//!
//! A polynomial is stored as one residue vector ("limb") per prime of the
//! modulus chain, always in the coefficient domain. Multiplication goes
//! through the NTT of each limb; every other operation is limb-wise.
//!
//! # Example
//!
//! ```
//! use fedavg_he::math::{RnsBasis, RnsPoly};
//!
//! let basis = RnsBasis::new(1024, &[50, 40]).unwrap();
//! let x = RnsPoly::from_signed(&[0, 1], &basis, 2);
//! let x2 = x.mul(&x, &basis);
//! assert_eq!(x2.centered_coeff(2, &basis), 1);
//! ```

use super::modular::{ntt_friendly_primes, ModQ};
use super::ntt::NttContext;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Modulus chain together with the NTT tables of each prime.
#[derive(Debug, Clone)]
pub struct RnsBasis {
    n: usize,
    moduli: Vec<u64>,
    tables: Vec<NttContext>,
}

impl RnsBasis {
    /// Build a chain of NTT-friendly primes with the given bit widths.
    ///
    /// Returns `None` if some width has no suitable prime for dimension `n`.
    pub fn new(n: usize, bit_sizes: &[u32]) -> Option<Self> {
        let moduli = ntt_friendly_primes(bit_sizes, n)?;
        Some(Self::from_moduli(n, moduli))
    }

    /// Build the tables for an explicit chain of primes ≡ 1 (mod 2n).
    pub fn from_moduli(n: usize, moduli: Vec<u64>) -> Self {
        let tables = moduli.iter().map(|&q| NttContext::new(n, q)).collect();
        Self { n, moduli, tables }
    }

    /// Ring dimension
    pub fn dimension(&self) -> usize {
        self.n
    }

    /// Primes of the chain, base prime first
    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    /// Number of primes in the chain
    pub(crate) fn len(&self) -> usize {
        self.moduli.len()
    }
}

/// Polynomial in RNS form over the first `limbs.len()` primes of a basis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct RnsPoly {
    limbs: Vec<Vec<u64>>,
}

impl RnsPoly {
    /// Zero polynomial over `limb_count` primes
    pub fn zero(n: usize, limb_count: usize) -> Self {
        Self {
            limbs: vec![vec![0u64; n]; limb_count],
        }
    }

    /// Lift small signed coefficients into every limb; missing coefficients are zero.
    pub fn from_signed(coeffs: &[i64], basis: &RnsBasis, limb_count: usize) -> Self {
        let limbs = basis.moduli[..limb_count]
            .iter()
            .map(|&q| {
                let mut limb = vec![0u64; basis.n];
                for (dst, &c) in limb.iter_mut().zip(coeffs) {
                    *dst = ModQ::from_signed(c, q);
                }
                limb
            })
            .collect();
        Self { limbs }
    }

    /// Lift wide signed coefficients into every limb
    pub fn from_i128(coeffs: &[i128], basis: &RnsBasis, limb_count: usize) -> Self {
        let limbs = basis.moduli[..limb_count]
            .iter()
            .map(|&q| {
                let mut limb = vec![0u64; basis.n];
                for (dst, &c) in limb.iter_mut().zip(coeffs) {
                    *dst = ModQ::from_i128(c, q);
                }
                limb
            })
            .collect();
        Self { limbs }
    }

    /// Uniformly random polynomial over `limb_count` primes
    pub fn uniform<R: Rng + ?Sized>(basis: &RnsBasis, limb_count: usize, rng: &mut R) -> Self {
        let limbs = basis.moduli[..limb_count]
            .iter()
            .map(|&q| (0..basis.n).map(|_| rng.gen_range(0..q)).collect())
            .collect();
        Self { limbs }
    }

    /// Number of primes this polynomial lives over
    pub fn limb_count(&self) -> usize {
        self.limbs.len()
    }

    /// Whether the polynomial is well formed for `basis`: between one and
    /// `basis.len()` limbs of length N with fully reduced residues
    pub fn fits(&self, basis: &RnsBasis) -> bool {
        (1..=basis.len()).contains(&self.limbs.len())
            && self
                .limbs
                .iter()
                .zip(&basis.moduli)
                .all(|(limb, &q)| limb.len() == basis.dimension() && limb.iter().all(|&c| c < q))
    }

    /// Residues modulo the `i`-th prime
    pub fn limb(&self, i: usize) -> &[u64] {
        &self.limbs[i]
    }

    /// Coefficient `i` of the base limb in centered form
    pub fn centered_coeff(&self, i: usize, basis: &RnsBasis) -> i64 {
        ModQ::to_signed(self.limbs[0][i], basis.moduli[0])
    }

    /// Limb-wise sum
    pub fn add(&self, other: &Self, basis: &RnsBasis) -> Self {
        assert_eq!(
            self.limb_count(),
            other.limb_count(),
            "Limb counts must match"
        );
        let limbs = self
            .limbs
            .iter()
            .zip(&other.limbs)
            .zip(&basis.moduli)
            .map(|((a, b), &q)| a.iter().zip(b).map(|(&x, &y)| ModQ::add(x, y, q)).collect())
            .collect();
        Self { limbs }
    }

    /// Negation
    pub fn negate(&self, basis: &RnsBasis) -> Self {
        let limbs = self
            .limbs
            .iter()
            .zip(&basis.moduli)
            .map(|(a, &q)| a.iter().map(|&x| ModQ::negate(x, q)).collect())
            .collect();
        Self { limbs }
    }

    /// Negacyclic product, one NTT multiplication per limb
    pub fn mul(&self, other: &Self, basis: &RnsBasis) -> Self {
        assert_eq!(
            self.limb_count(),
            other.limb_count(),
            "Limb counts must match"
        );
        let limbs = self
            .limbs
            .par_iter()
            .zip(other.limbs.par_iter())
            .zip(basis.tables.par_iter())
            .map(|((a, b), table)| table.multiply(a, b))
            .collect();
        Self { limbs }
    }

    /// Multiply limb `j` by `scalars[j]`
    pub fn mul_scalar_residues(&self, scalars: &[u64], basis: &RnsBasis) -> Self {
        assert_eq!(self.limb_count(), scalars.len(), "One scalar per limb");
        let limbs = self
            .limbs
            .iter()
            .zip(scalars)
            .zip(&basis.moduli)
            .map(|((a, &s), &q)| a.iter().map(|&x| ModQ::mul(x, s, q)).collect())
            .collect();
        Self { limbs }
    }

    /// Divide by the top prime with rounding and drop its limb.
    ///
    /// c'_j = (c_j - [c_top]) · q_top^(-1) mod q_j, where [c_top] is the
    /// centered residue modulo the top prime.
    pub fn rescale(&self, basis: &RnsBasis) -> Option<Self> {
        let top = self.limb_count().checked_sub(1).filter(|&t| t > 0)?;
        let q_top = basis.moduli[top];
        let top_limb = &self.limbs[top];

        let limbs = self.limbs[..top]
            .iter()
            .zip(&basis.moduli)
            .map(|(limb, &q)| {
                let inv = ModQ::inverse(q_top % q, q)?;
                Some(
                    limb.iter()
                        .zip(top_limb)
                        .map(|(&c, &t)| {
                            let t = ModQ::from_signed(ModQ::to_signed(t, q_top), q);
                            ModQ::mul(ModQ::sub(c, t, q), inv, q)
                        })
                        .collect(),
                )
            })
            .collect::<Option<Vec<Vec<u64>>>>()?;
        Some(Self { limbs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn basis() -> RnsBasis {
        RnsBasis::new(1024, &[50, 30, 40]).unwrap()
    }

    #[test]
    fn test_add_and_negate_cancel() {
        let basis = basis();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let a = RnsPoly::uniform(&basis, 3, &mut rng);
        let sum = a.add(&a.negate(&basis), &basis);
        assert_eq!(sum, RnsPoly::zero(1024, 3));
    }

    #[test]
    fn test_mul_wraps_negacyclically() {
        let basis = basis();
        let mut x_top = vec![0i64; 1024];
        x_top[1023] = 1;
        let a = RnsPoly::from_signed(&x_top, &basis, 3);
        let b = RnsPoly::from_signed(&[0, 1], &basis, 3);
        let prod = a.mul(&b, &basis);
        for j in 0..3 {
            assert_eq!(prod.limb(j)[0], basis.moduli()[j] - 1);
        }
        assert_eq!(prod.centered_coeff(0, &basis), -1);
    }

    #[test]
    fn test_rescale_divides_by_top_prime() {
        let basis = basis();
        let q_top = basis.moduli()[2] as i128;
        let values = [7 * q_top, -3 * q_top + 5, q_top / 2 - 1];
        let poly = RnsPoly::from_i128(&values, &basis, 3);

        let rescaled = poly.rescale(&basis).unwrap();
        assert_eq!(rescaled.limb_count(), 2);
        assert_eq!(rescaled.centered_coeff(0, &basis), 7);
        assert_eq!(rescaled.centered_coeff(1, &basis), -3);
        assert_eq!(rescaled.centered_coeff(2, &basis), 0);
    }

    #[test]
    fn test_rescale_needs_two_limbs() {
        let basis = basis();
        assert!(RnsPoly::zero(1024, 1).rescale(&basis).is_none());
    }

    #[test]
    fn test_fits() {
        let basis = basis();
        assert!(RnsPoly::zero(1024, 3).fits(&basis));
        assert!(!RnsPoly::zero(1024, 4).fits(&basis));
        assert!(!RnsPoly::zero(512, 2).fits(&basis));
        assert!(!RnsPoly::zero(1024, 0).fits(&basis));
    }

    #[test]
    fn test_mul_scalar_residues() {
        let basis = basis();
        let poly = RnsPoly::from_signed(&[2, -4], &basis, 2);
        let scaled = poly.mul_scalar_residues(&[3, 3], &basis);
        assert_eq!(scaled.centered_coeff(0, &basis), 6);
        assert_eq!(scaled.centered_coeff(1, &basis), -12);
    }
}
