//! Homomorphic capability layer
//!
//! The protocol only needs a handful of operations from the encryption
//! scheme: encrypt a short real vector, add two ciphertexts, multiply a
//! ciphertext by a public real constant, and decrypt. [`HeBackend`] names
//! exactly those so the protocol can run over the real RNS-CKKS backend or
//! over the plaintext mock used in fast tests.

pub mod ckks;
pub mod plain;

use crate::error::Result;
use crate::params::CkksParams;
use rand::{CryptoRng, RngCore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

pub use ckks::CkksBackend;
pub use plain::PlainBackend;

/// Approximate-number homomorphic encryption scheme
pub trait HeBackend: Sized + Send + Sync + 'static {
    /// Public encryption key
    type PublicKey: Clone + Debug + Serialize + DeserializeOwned + Send + Sync;
    /// Secret decryption key; wiped from memory when dropped
    type SecretKey: Serialize + DeserializeOwned + Send + Sync;
    /// Encrypted slot vector
    type Ciphertext: Clone + Debug + Serialize + DeserializeOwned + Send + Sync;

    /// Build all tables for a validated parameter set
    fn from_params(params: &CkksParams) -> Result<Self>;

    /// Parameter set the backend was built from
    fn params(&self) -> &CkksParams;

    /// Number of plaintext slots
    fn slot_count(&self) -> usize;

    /// Sample a fresh key pair
    fn generate_keypair<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> (Self::PublicKey, Self::SecretKey);

    /// Encrypt `values` into the leading slots at the given scale; the remaining slots hold zero.
    fn encrypt<R: RngCore + CryptoRng>(
        &self,
        pk: &Self::PublicKey,
        values: &[f64],
        scale: f64,
        rng: &mut R,
    ) -> Result<Self::Ciphertext>;

    /// Slot-wise sum; both inputs must be at the same level and scale
    fn add(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    /// Multiply every slot by a public constant, consuming exactly one level
    fn multiply_const(&self, ct: &Self::Ciphertext, constant: f64) -> Result<Self::Ciphertext>;

    /// Decrypt and decode every slot
    fn decrypt(&self, sk: &Self::SecretKey, ct: &Self::Ciphertext) -> Result<Vec<f64>>;

    /// Remaining multiplicative levels
    fn level(&self, ct: &Self::Ciphertext) -> usize;

    /// Current encoding scale
    fn scale(&self, ct: &Self::Ciphertext) -> f64;

    /// Canonical bytes of the public key, used for fingerprinting
    fn public_key_bytes(&self, pk: &Self::PublicKey) -> Result<Vec<u8>>;
}

/// Scales are compared with a relative tolerance; rescaling keeps them exact in practice
pub(crate) fn scales_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= a.abs().max(b.abs()) * 1e-9
}

/// Reject vectors the encoder cannot represent
pub(crate) fn check_values(values: &[f64], slots: usize, bound: f64) -> Result<()> {
    use crate::error::fed_err;

    if values.len() > slots {
        return Err(fed_err!(
            Schema,
            "{} values exceed the {slots} available slots",
            values.len()
        ));
    }
    if let Some((i, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(fed_err!(Schema, "value {i} is not finite ({v})"));
    }
    if let Some((i, v)) = values.iter().enumerate().find(|(_, v)| v.abs() >= bound) {
        return Err(fed_err!(
            Schema,
            "value {i} ({v}) exceeds the encodable bound {bound}"
        ));
    }
    Ok(())
}

/// Largest magnitude a slot may carry at `scale` so that decoding from the base prime stays exact
pub(crate) fn value_bound(params: &CkksParams, scale: f64) -> f64 {
    2f64.powi(params.modulus_bits[0] as i32 - 2) / scale
}

/// Encoding scales must be finite and at least one
pub(crate) fn check_scale(scale: f64) -> Result<()> {
    if scale.is_finite() && scale >= 1.0 {
        Ok(())
    } else {
        Err(crate::error::fed_err!(
            Config,
            "invalid encoding scale {scale}"
        ))
    }
}
