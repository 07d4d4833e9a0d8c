//! Secure aggregation protocol
//!
//! Key manager -> public key -> every site encryptor; each site ->
//! ciphertext (+ optional sample count) -> aggregator -> one aggregated
//! ciphertext -> the key custodian, who alone can decrypt it.
//!
//! Every artifact carries the fingerprint of the context (and public key)
//! it belongs to; an operation that sees mismatched fingerprints fails
//! before producing output.

pub mod aggregate;
pub mod ciphertext;
pub mod context;
pub mod decrypt;
pub mod encrypt;
pub mod fingerprint;
pub mod join;
pub mod keys;
pub mod round;
pub mod weights;

pub use aggregate::{aggregate, AggregationMode, AggregationRecord};
pub use ciphertext::{Ciphertext, SiteCiphertext};
pub use context::{create_context, create_context_with_scale, CryptoContext};
pub use decrypt::{decrypt_result, DecryptedResult};
pub use encrypt::{encrypt_sites, encrypt_sites_seeded, encrypt_weights, encrypt_with_rng};
pub use fingerprint::Fingerprint;
pub use join::await_participants;
pub use keys::{generate_keypair, generate_keypair_seeded, KeyCustodian, PublicKey};
pub use round::{FederatedRound, Stage};
pub use weights::{SampleCount, WeightVector, WEIGHT_COLUMNS, WEIGHT_COUNT};
