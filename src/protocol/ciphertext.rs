//! Context-bound ciphertexts

use super::context::CryptoContext;
use super::fingerprint::Fingerprint;
use super::weights::SampleCount;
use crate::backend::{CkksBackend, HeBackend};
use crate::error::Result;
use crate::io::artifact::{read_artifact, ArtifactKind, Publication};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Backend ciphertext tagged with the context and public key it was produced under.
///
/// Never mutated; every homomorphic step yields a new value. The identifier
/// is the SHA-256 of the serialized form.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Ciphertext<B: HeBackend = CkksBackend> {
    context: Fingerprint,
    public_key: Fingerprint,
    body: B::Ciphertext,
}

impl<B: HeBackend> Clone for Ciphertext<B> {
    fn clone(&self) -> Self {
        Self {
            context: self.context,
            public_key: self.public_key,
            body: self.body.clone(),
        }
    }
}

impl<B: HeBackend> std::fmt::Debug for Ciphertext<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ciphertext")
            .field("context", &self.context)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl<B: HeBackend> Ciphertext<B> {
    pub(crate) fn new(context: Fingerprint, public_key: Fingerprint, body: B::Ciphertext) -> Self {
        Self {
            context,
            public_key,
            body,
        }
    }

    pub fn context_fingerprint(&self) -> Fingerprint {
        self.context
    }

    pub fn public_key_fingerprint(&self) -> Fingerprint {
        self.public_key
    }

    pub(crate) fn body(&self) -> &B::Ciphertext {
        &self.body
    }

    /// SHA-256 of the bincode serialization
    pub fn id(&self) -> Result<Fingerprint> {
        Ok(Fingerprint::of(&[&bincode::serialize(self)?]))
    }

    /// Remaining multiplicative levels
    pub fn level(&self, ctx: &CryptoContext<B>) -> usize {
        ctx.backend().level(&self.body)
    }

    /// Current encoding scale
    pub fn scale(&self, ctx: &CryptoContext<B>) -> f64 {
        ctx.backend().scale(&self.body)
    }

    /// Write the ciphertext artifact
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut publication = Publication::new();
        self.stage(&mut publication, path)?;
        publication.commit()
    }

    /// Stage the ciphertext artifact as part of a larger publication
    pub fn stage(&self, publication: &mut Publication, path: &Path) -> Result<()> {
        publication.stage_artifact(path, ArtifactKind::Ciphertext, self)
    }

    /// Read a ciphertext artifact; fingerprints are checked where it is used
    pub fn load(path: &Path) -> Result<Self> {
        read_artifact(path, ArtifactKind::Ciphertext)
    }
}

/// One site's contribution: its ciphertext and the optional plaintext sample count
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct SiteCiphertext<B: HeBackend = CkksBackend> {
    pub ciphertext: Ciphertext<B>,
    pub count: Option<SampleCount>,
}

impl<B: HeBackend> Clone for SiteCiphertext<B> {
    fn clone(&self) -> Self {
        Self {
            ciphertext: self.ciphertext.clone(),
            count: self.count,
        }
    }
}

impl<B: HeBackend> std::fmt::Debug for SiteCiphertext<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteCiphertext")
            .field("ciphertext", &self.ciphertext)
            .field("count", &self.count)
            .finish()
    }
}
