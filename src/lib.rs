//! fedavg-he: federated averaging of model weights under CKKS
//!
//! Each site encrypts its locally trained weight vector under a shared
//! public key; an aggregator averages the ciphertexts (plain or
//! sample-count-weighted mean) without seeing any plaintext; only the key
//! custodian can decrypt the result.
//!
//! Key components:
//! - `math`: modular arithmetic, negacyclic NTT, RNS polynomials, samplers
//! - `backend`: the `HeBackend` trait, an RNS-CKKS implementation and a plaintext mock
//! - `protocol`: contexts, keys, encryption, aggregation, decryption, rounds
//! - `io`: artifact envelopes, CSV files and sidecars

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod math;
pub mod params;
pub mod protocol;

pub use backend::{CkksBackend, HeBackend, PlainBackend};
pub use config::DeploymentConfig;
pub use error::{FedError, Result};
pub use params::CkksParams;
pub use protocol::{
    aggregate, create_context, create_context_with_scale, decrypt_result, encrypt_sites,
    encrypt_weights, generate_keypair, generate_keypair_seeded, AggregationMode,
    AggregationRecord, Ciphertext, CryptoContext, DecryptedResult, FederatedRound, KeyCustodian,
    PublicKey, SampleCount, SiteCiphertext, Stage, WeightVector,
};
