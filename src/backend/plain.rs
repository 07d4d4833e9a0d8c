//! Plaintext mock backend
//!
//! Keeps slot values in the clear but tracks level and scale exactly like
//! the CKKS backend and fails in the same places. Decryption with a key
//! from a different key pair fails, which stands in for the garbage a real
//! scheme would produce.

use super::{check_scale, check_values, scales_match, value_bound, HeBackend};
use crate::error::{fed_err, FedError, Result};
use crate::params::CkksParams;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Debug)]
pub struct PlainBackend {
    params: CkksParams,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainPublicKey {
    key_id: u64,
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct PlainSecretKey {
    key_id: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlainCiphertext {
    key_id: u64,
    values: Vec<f64>,
    level: usize,
    scale: f64,
}

impl HeBackend for PlainBackend {
    type PublicKey = PlainPublicKey;
    type SecretKey = PlainSecretKey;
    type Ciphertext = PlainCiphertext;

    fn from_params(params: &CkksParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params: params.clone(),
        })
    }

    fn params(&self) -> &CkksParams {
        &self.params
    }

    fn slot_count(&self) -> usize {
        self.params.slot_count()
    }

    fn generate_keypair<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> (PlainPublicKey, PlainSecretKey) {
        let key_id = rng.next_u64();
        (PlainPublicKey { key_id }, PlainSecretKey { key_id })
    }

    fn encrypt<R: RngCore + CryptoRng>(
        &self,
        pk: &PlainPublicKey,
        values: &[f64],
        scale: f64,
        _rng: &mut R,
    ) -> Result<PlainCiphertext> {
        check_scale(scale)?;
        check_values(values, self.slot_count(), value_bound(&self.params, scale))?;
        Ok(PlainCiphertext {
            key_id: pk.key_id,
            values: values.to_vec(),
            level: self.params.max_depth(),
            scale,
        })
    }

    fn add(&self, a: &PlainCiphertext, b: &PlainCiphertext) -> Result<PlainCiphertext> {
        if a.level != b.level || !scales_match(a.scale, b.scale) || a.key_id != b.key_id {
            return Err(fed_err!(
                ContextMismatch,
                "cannot add ciphertexts at level {} and level {}",
                a.level,
                b.level
            ));
        }
        let len = a.values.len().max(b.values.len());
        let values = (0..len)
            .map(|i| a.values.get(i).unwrap_or(&0.0) + b.values.get(i).unwrap_or(&0.0))
            .collect();
        Ok(PlainCiphertext {
            values,
            ..a.clone()
        })
    }

    fn multiply_const(&self, ct: &PlainCiphertext, constant: f64) -> Result<PlainCiphertext> {
        if ct.level == 0 {
            return Err(FedError::NoiseBudgetExhausted(
                "ciphertext has no level left for a constant multiplication".into(),
            ));
        }
        if !constant.is_finite() {
            return Err(fed_err!(Schema, "constant {constant} is not finite"));
        }
        Ok(PlainCiphertext {
            values: ct.values.iter().map(|v| v * constant).collect(),
            level: ct.level - 1,
            ..ct.clone()
        })
    }

    fn decrypt(&self, sk: &PlainSecretKey, ct: &PlainCiphertext) -> Result<Vec<f64>> {
        if sk.key_id != ct.key_id {
            return Err(fed_err!(
                ContextMismatch,
                "ciphertext was encrypted under another key"
            ));
        }
        let mut out = ct.values.clone();
        out.resize(self.slot_count(), 0.0);
        Ok(out)
    }

    fn level(&self, ct: &PlainCiphertext) -> usize {
        ct.level
    }

    fn scale(&self, ct: &PlainCiphertext) -> f64 {
        ct.scale
    }

    fn public_key_bytes(&self, pk: &PlainPublicKey) -> Result<Vec<u8>> {
        Ok(pk.key_id.to_le_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_level_bookkeeping_matches_chain() {
        let backend = PlainBackend::from_params(&CkksParams::fedavg_n8192()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let (pk, sk) = backend.generate_keypair(&mut rng);

        let ct = backend.encrypt(&pk, &[2.0, 4.0], 1e6, &mut rng).unwrap();
        assert_eq!(backend.level(&ct), 3);

        let mut cur = ct;
        for _ in 0..3 {
            cur = backend.multiply_const(&cur, 0.5).unwrap();
        }
        assert_eq!(backend.level(&cur), 0);
        assert!(matches!(
            backend.multiply_const(&cur, 0.5),
            Err(FedError::NoiseBudgetExhausted(_))
        ));
        assert_eq!(&backend.decrypt(&sk, &cur).unwrap()[..2], &[0.25, 0.5]);
    }

    #[test]
    fn test_wrong_key_fails() {
        let backend = PlainBackend::from_params(&CkksParams::fedavg_n8192()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let (pk, _sk) = backend.generate_keypair(&mut rng);
        let (_pk2, sk2) = backend.generate_keypair(&mut rng);
        let ct = backend.encrypt(&pk, &[1.0], 1e6, &mut rng).unwrap();
        assert!(backend.decrypt(&sk2, &ct).is_err());
    }
}
