//! In-process round state machine
//!
//! `KeysGenerated -> WeightsEncrypted -> Aggregated -> Decrypted`. A failed
//! step leaves the round where it was.

use super::aggregate::{aggregate, AggregationMode, AggregationRecord};
use super::ciphertext::{Ciphertext, SiteCiphertext};
use super::context::CryptoContext;
use super::decrypt::{decrypt_result, DecryptedResult};
use super::encrypt::encrypt_weights;
use super::keys::{generate_keypair, KeyCustodian, PublicKey};
use super::weights::{SampleCount, WeightVector};
use crate::backend::{CkksBackend, HeBackend};
use crate::error::{fed_err, FedError, Result};
use tracing::info;

/// Position of a round in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    KeysGenerated,
    WeightsEncrypted,
    Aggregated,
    Decrypted,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::KeysGenerated => "KeysGenerated",
            Stage::WeightsEncrypted => "WeightsEncrypted",
            Stage::Aggregated => "Aggregated",
            Stage::Decrypted => "Decrypted",
        }
    }
}

/// One aggregation round over a fixed set of intended sites
pub struct FederatedRound<B: HeBackend = CkksBackend> {
    context: CryptoContext<B>,
    public_key: PublicKey<B>,
    custodian: KeyCustodian<B>,
    expected_sites: usize,
    submissions: Vec<SiteCiphertext<B>>,
    aggregated: Option<(Ciphertext<B>, AggregationRecord)>,
    result: Option<DecryptedResult>,
    stage: Stage,
}

impl<B: HeBackend> FederatedRound<B> {
    /// Start a round with a fresh key pair
    pub fn new(context: CryptoContext<B>, expected_sites: usize) -> Result<Self> {
        let (public_key, custodian) = generate_keypair(&context)?;
        Self::with_keys(context, public_key, custodian, expected_sites)
    }

    /// Start a round with existing keys
    pub fn with_keys(
        context: CryptoContext<B>,
        public_key: PublicKey<B>,
        custodian: KeyCustodian<B>,
        expected_sites: usize,
    ) -> Result<Self> {
        if expected_sites == 0 {
            return Err(fed_err!(Config, "a round needs at least one site"));
        }
        context.ensure_same(&public_key.context_fingerprint(), "public key")?;
        context.ensure_same(&custodian.context_fingerprint(), "secret key")?;
        if public_key.fingerprint() != custodian.public_key_fingerprint() {
            return Err(fed_err!(
                ContextMismatch,
                "public key and custodian belong to different key pairs"
            ));
        }

        Ok(Self {
            context,
            public_key,
            custodian,
            expected_sites,
            submissions: Vec::with_capacity(expected_sites),
            aggregated: None,
            result: None,
            stage: Stage::KeysGenerated,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn context(&self) -> &CryptoContext<B> {
        &self.context
    }

    /// Key handed to every site
    pub fn public_key(&self) -> &PublicKey<B> {
        &self.public_key
    }

    pub fn submitted(&self) -> usize {
        self.submissions.len()
    }

    fn require(&self, allowed: &[Stage], expected: &'static str) -> Result<()> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(FedError::InvalidStage {
                expected,
                actual: self.stage.as_str(),
            })
        }
    }

    /// Accept one site's ciphertext
    pub fn submit(&mut self, site: SiteCiphertext<B>) -> Result<()> {
        self.require(
            &[Stage::KeysGenerated, Stage::WeightsEncrypted],
            "KeysGenerated or WeightsEncrypted",
        )?;
        if self.submissions.len() == self.expected_sites {
            return Err(fed_err!(
                Config,
                "round already holds all {} expected submissions",
                self.expected_sites
            ));
        }
        let ct = &site.ciphertext;
        self.context.ensure_same(&ct.context_fingerprint(), "submitted ciphertext")?;
        if ct.public_key_fingerprint() != self.public_key.fingerprint() {
            return Err(fed_err!(
                ContextMismatch,
                "submitted ciphertext was encrypted under another key"
            ));
        }

        self.submissions.push(site);
        self.stage = Stage::WeightsEncrypted;
        Ok(())
    }

    /// Encrypt a site's weights with the round's key and submit them
    pub fn encrypt_and_submit(
        &mut self,
        weights: &WeightVector,
        count: Option<SampleCount>,
    ) -> Result<()> {
        let site = encrypt_weights(&self.context, &self.public_key, weights, count)?;
        self.submit(site)
    }

    /// Aggregate once every intended site has submitted
    pub fn aggregate(&mut self, mode: AggregationMode) -> Result<&Ciphertext<B>> {
        self.require(&[Stage::WeightsEncrypted], "WeightsEncrypted")?;
        if self.submissions.len() < self.expected_sites {
            return Err(FedError::IncompleteParticipantSet {
                expected: self.expected_sites,
                received: self.submissions.len(),
            });
        }

        let out = aggregate(&self.context, mode, &self.submissions)?;
        self.stage = Stage::Aggregated;
        info!(%mode, sites = self.expected_sites, "round aggregated");
        Ok(&self.aggregated.insert(out).0)
    }

    /// Record of the aggregation, once it has happened
    pub fn record(&self) -> Option<&AggregationRecord> {
        self.aggregated.as_ref().map(|(_, record)| record)
    }

    /// Decrypt the aggregate with the round's custodian
    pub fn decrypt(&mut self) -> Result<&DecryptedResult> {
        self.require(&[Stage::Aggregated], "Aggregated")?;
        let (ct, _) = self
            .aggregated
            .as_ref()
            .ok_or(FedError::InvalidStage {
                expected: "Aggregated",
                actual: self.stage.as_str(),
            })?;

        let result = decrypt_result(&self.context, &self.custodian, ct)?;
        self.stage = Stage::Decrypted;
        Ok(self.result.insert(result))
    }
}
