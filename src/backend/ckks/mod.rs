//! RNS-CKKS backend
//!
//! Public-key RLWE encryption over a chain of NTT-friendly primes. The only
//! multiplicative operation is multiplication by a public real constant:
//! the constant is encoded at the scale of the top prime, multiplied into
//! every limb, and the top prime is dropped by rescaling, so the result
//! keeps the input's scale and sits one level lower.

mod ciphertext;
mod encoding;
mod keys;

pub use ciphertext::CkksCiphertext;
pub use encoding::SlotEncoder;
pub use keys::{CkksPublicKey, CkksSecretKey};

use super::{check_scale, check_values, scales_match, value_bound, HeBackend};
use crate::error::{fed_err, FedError, Result};
use crate::math::{sample_ternary, GaussianSampler, ModQ, RnsBasis, RnsPoly};
use crate::params::CkksParams;
use rand::{CryptoRng, RngCore};
use tracing::debug;
use zeroize::Zeroize;

/// Precomputed primes, NTT tables and encoder for one parameter set
pub struct CkksBackend {
    params: CkksParams,
    basis: RnsBasis,
    encoder: SlotEncoder,
    gaussian: GaussianSampler,
}

impl std::fmt::Debug for CkksBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CkksBackend")
            .field("ring_dim", &self.basis.dimension())
            .field("moduli", &self.basis.moduli())
            .field("scale_bits", &self.params.scale_bits)
            .field("sigma", &self.gaussian.sigma())
            .finish()
    }
}

impl CkksBackend {
    /// Primes of the modulus chain, base prime first
    pub fn moduli(&self) -> &[u64] {
        self.basis.moduli()
    }

    fn fresh_limbs(&self) -> usize {
        self.basis.len()
    }

    fn check_ciphertext(&self, ct: &CkksCiphertext) -> Result<()> {
        let shaped = ct.c0.fits(&self.basis)
            && ct.c1.fits(&self.basis)
            && ct.c0.limb_count() == ct.c1.limb_count();
        if !shaped {
            return Err(fed_err!(
                Config,
                "ciphertext does not belong to this parameter set"
            ));
        }
        check_scale(ct.scale)
    }

    fn check_public_key(&self, pk: &CkksPublicKey) -> Result<()> {
        let full = self.fresh_limbs();
        if pk.a.fits(&self.basis)
            && pk.b.fits(&self.basis)
            && pk.a.limb_count() == full
            && pk.b.limb_count() == full
        {
            Ok(())
        } else {
            Err(fed_err!(
                Config,
                "public key does not belong to this parameter set"
            ))
        }
    }

    fn gaussian_poly<R: RngCore + CryptoRng>(&self, limbs: usize, rng: &mut R) -> RnsPoly {
        let e = self.gaussian.sample_vec(self.params.ring_dim, rng);
        RnsPoly::from_signed(&e, &self.basis, limbs)
    }
}

impl HeBackend for CkksBackend {
    type PublicKey = CkksPublicKey;
    type SecretKey = CkksSecretKey;
    type Ciphertext = CkksCiphertext;

    fn from_params(params: &CkksParams) -> Result<Self> {
        params.validate()?;
        let basis = RnsBasis::new(params.ring_dim, &params.modulus_bits).ok_or_else(|| {
            fed_err!(
                Config,
                "no distinct NTT-friendly primes of widths {:?} for N = {}",
                params.modulus_bits,
                params.ring_dim
            )
        })?;
        debug!(ring_dim = params.ring_dim, moduli = ?basis.moduli(), "built CKKS tables");

        Ok(Self {
            encoder: SlotEncoder::new(params.ring_dim),
            gaussian: GaussianSampler::new(params.sigma),
            params: params.clone(),
            basis,
        })
    }

    fn params(&self) -> &CkksParams {
        &self.params
    }

    fn slot_count(&self) -> usize {
        self.encoder.slot_count()
    }

    fn generate_keypair<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> (CkksPublicKey, CkksSecretKey) {
        let limbs = self.fresh_limbs();
        let secret = CkksSecretKey {
            coeffs: sample_ternary(self.params.ring_dim, rng),
        };
        let mut s = RnsPoly::from_signed(&secret.coeffs, &self.basis, limbs);

        let a = RnsPoly::uniform(&self.basis, limbs, rng);
        let e = self.gaussian_poly(limbs, rng);
        let b = a
            .mul(&s, &self.basis)
            .negate(&self.basis)
            .add(&e, &self.basis);
        s.zeroize();

        (CkksPublicKey { b, a }, secret)
    }

    fn encrypt<R: RngCore + CryptoRng>(
        &self,
        pk: &CkksPublicKey,
        values: &[f64],
        scale: f64,
        rng: &mut R,
    ) -> Result<CkksCiphertext> {
        check_scale(scale)?;
        check_values(values, self.slot_count(), value_bound(&self.params, scale))?;
        self.check_public_key(pk)?;

        let limbs = self.fresh_limbs();
        let m = RnsPoly::from_i128(&self.encoder.encode(values, scale), &self.basis, limbs);

        let mut u = RnsPoly::from_signed(
            &sample_ternary(self.params.ring_dim, rng),
            &self.basis,
            limbs,
        );
        let e0 = self.gaussian_poly(limbs, rng);
        let e1 = self.gaussian_poly(limbs, rng);

        let c0 = pk
            .b
            .mul(&u, &self.basis)
            .add(&e0, &self.basis)
            .add(&m, &self.basis);
        let c1 = pk.a.mul(&u, &self.basis).add(&e1, &self.basis);
        u.zeroize();

        Ok(CkksCiphertext { c0, c1, scale })
    }

    fn add(&self, a: &CkksCiphertext, b: &CkksCiphertext) -> Result<CkksCiphertext> {
        self.check_ciphertext(a)?;
        self.check_ciphertext(b)?;
        if a.level() != b.level() || !scales_match(a.scale, b.scale) {
            return Err(fed_err!(
                ContextMismatch,
                "cannot add ciphertexts at level {} / scale {} and level {} / scale {}",
                a.level(),
                a.scale,
                b.level(),
                b.scale
            ));
        }

        Ok(CkksCiphertext {
            c0: a.c0.add(&b.c0, &self.basis),
            c1: a.c1.add(&b.c1, &self.basis),
            scale: a.scale,
        })
    }

    fn multiply_const(&self, ct: &CkksCiphertext, constant: f64) -> Result<CkksCiphertext> {
        self.check_ciphertext(ct)?;
        let level = ct.level();
        if level == 0 {
            return Err(FedError::NoiseBudgetExhausted(
                "ciphertext has no level left for a constant multiplication".into(),
            ));
        }
        if !constant.is_finite() {
            return Err(fed_err!(Schema, "constant {constant} is not finite"));
        }

        let moduli = &self.basis.moduli()[..=level];
        let q_top = moduli[level];
        let encoded = (constant * q_top as f64).round() as i128;
        let residues: Vec<u64> = moduli
            .iter()
            .map(|&q| ModQ::from_i128(encoded, q))
            .collect();

        let exhausted = || FedError::NoiseBudgetExhausted("rescale needs two primes".into());
        let c0 = ct
            .c0
            .mul_scalar_residues(&residues, &self.basis)
            .rescale(&self.basis)
            .ok_or_else(exhausted)?;
        let c1 = ct
            .c1
            .mul_scalar_residues(&residues, &self.basis)
            .rescale(&self.basis)
            .ok_or_else(exhausted)?;

        debug!(level, constant, "multiplied by constant and rescaled");
        Ok(CkksCiphertext {
            c0,
            c1,
            scale: ct.scale,
        })
    }

    fn decrypt(&self, sk: &CkksSecretKey, ct: &CkksCiphertext) -> Result<Vec<f64>> {
        self.check_ciphertext(ct)?;
        if sk.dimension() != self.params.ring_dim {
            return Err(fed_err!(
                Config,
                "secret key does not belong to this parameter set"
            ));
        }

        let limbs = ct.c0.limb_count();
        let mut s = RnsPoly::from_signed(&sk.coeffs, &self.basis, limbs);
        let m = ct.c0.add(&ct.c1.mul(&s, &self.basis), &self.basis);
        s.zeroize();

        let coeffs: Vec<f64> = (0..self.params.ring_dim)
            .map(|i| m.centered_coeff(i, &self.basis) as f64 / ct.scale)
            .collect();
        Ok(self.encoder.decode(&coeffs))
    }

    fn level(&self, ct: &CkksCiphertext) -> usize {
        ct.level()
    }

    fn scale(&self, ct: &CkksCiphertext) -> f64 {
        ct.scale
    }

    fn public_key_bytes(&self, pk: &CkksPublicKey) -> Result<Vec<u8>> {
        Ok(bincode::serialize(pk)?)
    }
}
