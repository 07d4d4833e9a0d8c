//! Custodian-side decryption and validation

use super::ciphertext::Ciphertext;
use super::context::CryptoContext;
use super::fingerprint::Fingerprint;
use super::keys::KeyCustodian;
use super::weights::{WEIGHT_COLUMNS, WEIGHT_COUNT};
use crate::backend::HeBackend;
use crate::error::{fed_err, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Decoded aggregate with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecryptedResult {
    pub weights: [f64; WEIGHT_COUNT],
    /// Identifier of the aggregated ciphertext
    pub aggregate: Fingerprint,
    pub context: Fingerprint,
    /// Public key fingerprint, naming the key epoch
    pub public_key: Fingerprint,
}

/// Decrypt an aggregated ciphertext and return its first five slots
pub fn decrypt_result<B: HeBackend>(
    ctx: &CryptoContext<B>,
    custodian: &KeyCustodian<B>,
    aggregated: &Ciphertext<B>,
) -> Result<DecryptedResult> {
    ctx.ensure_same(&aggregated.context_fingerprint(), "aggregated ciphertext")?;
    ctx.ensure_same(&custodian.context_fingerprint(), "secret key")?;
    if aggregated.public_key_fingerprint() != custodian.public_key_fingerprint() {
        return Err(fed_err!(
            ContextMismatch,
            "ciphertext was encrypted under key {} but the custodian holds key {}",
            aggregated.public_key_fingerprint().short(),
            custodian.public_key_fingerprint().short()
        ));
    }

    let slots = custodian.decrypt(ctx, aggregated.body())?;
    if slots.len() < WEIGHT_COUNT {
        return Err(fed_err!(
            Decode,
            "decoded {} slots, expected at least {WEIGHT_COUNT}",
            slots.len()
        ));
    }

    let mut weights = [0.0; WEIGHT_COUNT];
    weights.copy_from_slice(&slots[..WEIGHT_COUNT]);
    if let Some((i, v)) = weights.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(fed_err!(
            Decode,
            "decoded {} is not finite ({v})",
            WEIGHT_COLUMNS[i]
        ));
    }

    let aggregate = aggregated.id()?;
    info!(aggregate = %aggregate.short(), "decrypted aggregate");
    Ok(DecryptedResult {
        weights,
        aggregate,
        context: ctx.fingerprint(),
        public_key: custodian.public_key_fingerprint(),
    })
}
