//! Key pair generation and secret key custody

use super::context::CryptoContext;
use super::fingerprint::Fingerprint;
use crate::backend::{CkksBackend, HeBackend};
use crate::error::{fed_err, Result};
use crate::io::artifact::{read_artifact, ArtifactKind, Publication};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use zeroize::Zeroizing;

/// Public encryption key bound to one context.
///
/// Its fingerprint is SHA-256(context fingerprint ‖ key bytes) and names
/// the key epoch.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PublicKey<B: HeBackend = CkksBackend> {
    context: Fingerprint,
    fingerprint: Fingerprint,
    key: B::PublicKey,
}

impl<B: HeBackend> Clone for PublicKey<B> {
    fn clone(&self) -> Self {
        Self {
            context: self.context,
            fingerprint: self.fingerprint,
            key: self.key.clone(),
        }
    }
}

impl<B: HeBackend> std::fmt::Debug for PublicKey<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("context", &self.context)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl<B: HeBackend> PublicKey<B> {
    fn new(ctx: &CryptoContext<B>, key: B::PublicKey) -> Result<Self> {
        let fingerprint = Self::derive_fingerprint(ctx, &key)?;
        Ok(Self {
            context: ctx.fingerprint(),
            fingerprint,
            key,
        })
    }

    fn derive_fingerprint(ctx: &CryptoContext<B>, key: &B::PublicKey) -> Result<Fingerprint> {
        let bytes = ctx.backend().public_key_bytes(key)?;
        Ok(Fingerprint::of(&[ctx.fingerprint().as_bytes(), &bytes]))
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn context_fingerprint(&self) -> Fingerprint {
        self.context
    }

    pub(crate) fn key(&self) -> &B::PublicKey {
        &self.key
    }

    /// Write the public key artifact
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut publication = Publication::new();
        self.stage(&mut publication, path)?;
        publication.commit()
    }

    pub fn stage(&self, publication: &mut Publication, path: &Path) -> Result<()> {
        publication.stage_artifact(path, ArtifactKind::PublicKey, self)
    }

    /// Read a public key artifact and check it against `ctx`
    pub fn load(ctx: &CryptoContext<B>, path: &Path) -> Result<Self> {
        let pk: Self = read_artifact(path, ArtifactKind::PublicKey)?;
        ctx.ensure_same(&pk.context, "public key")?;
        if Self::derive_fingerprint(ctx, &pk.key)? != pk.fingerprint {
            return Err(fed_err!(
                Config,
                "public key file {} does not match its recorded fingerprint",
                path.display()
            ));
        }
        Ok(pk)
    }
}

/// Sole holder of the secret key.
///
/// Not `Clone`; the key is wiped when the custodian is dropped and never
/// appears in `Debug` output. The only operations are decryption and the
/// custodian's own persistence.
pub struct KeyCustodian<B: HeBackend = CkksBackend> {
    context: Fingerprint,
    public_key: Fingerprint,
    secret: B::SecretKey,
}

impl<B: HeBackend> std::fmt::Debug for KeyCustodian<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCustodian")
            .field("context", &self.context)
            .field("public_key", &self.public_key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
struct StoredSecret<B: HeBackend> {
    context: Fingerprint,
    public_key: Fingerprint,
    secret: B::SecretKey,
}

impl<B: HeBackend> KeyCustodian<B> {
    pub fn context_fingerprint(&self) -> Fingerprint {
        self.context
    }

    /// Fingerprint of the matching public key
    pub fn public_key_fingerprint(&self) -> Fingerprint {
        self.public_key
    }

    /// Decrypt every slot of a backend ciphertext
    pub(crate) fn decrypt(&self, ctx: &CryptoContext<B>, ct: &B::Ciphertext) -> Result<Vec<f64>> {
        ctx.ensure_same(&self.context, "secret key")?;
        ctx.backend().decrypt(&self.secret, ct)
    }

    /// Write the secret key artifact with owner-only permissions
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut publication = Publication::new();
        self.stage(&mut publication, path)?;
        publication.commit()
    }

    /// Stage the secret key artifact; the staged file is already owner-only
    pub fn stage(&self, publication: &mut Publication, path: &Path) -> Result<()> {
        let stored = StoredSecretRef::<B> {
            context: self.context,
            public_key: self.public_key,
            secret: &self.secret,
        };
        let body = Zeroizing::new(bincode::serialize(&stored)?);
        publication.stage_artifact_bytes(path, ArtifactKind::SecretKey, &body, true)
    }

    /// Read a secret key artifact and check it against `ctx`
    pub fn load(ctx: &CryptoContext<B>, path: &Path) -> Result<Self> {
        let stored: StoredSecret<B> = read_artifact(path, ArtifactKind::SecretKey)?;
        ctx.ensure_same(&stored.context, "secret key")?;
        let StoredSecret {
            context,
            public_key,
            secret,
        } = stored;
        Ok(Self {
            context,
            public_key,
            secret,
        })
    }
}

#[derive(Serialize)]
#[serde(bound = "")]
struct StoredSecretRef<'a, B: HeBackend> {
    context: Fingerprint,
    public_key: Fingerprint,
    secret: &'a B::SecretKey,
}

/// Generate a key pair from fresh OS randomness
pub fn generate_keypair<B: HeBackend>(
    ctx: &CryptoContext<B>,
) -> Result<(PublicKey<B>, KeyCustodian<B>)> {
    generate_with_rng(ctx, &mut ChaCha20Rng::from_entropy())
}

/// Generate a reproducible key pair; for tests and simulations only
pub fn generate_keypair_seeded<B: HeBackend>(
    ctx: &CryptoContext<B>,
    seed: u64,
) -> Result<(PublicKey<B>, KeyCustodian<B>)> {
    generate_with_rng(ctx, &mut ChaCha20Rng::seed_from_u64(seed))
}

fn generate_with_rng<B: HeBackend>(
    ctx: &CryptoContext<B>,
    rng: &mut ChaCha20Rng,
) -> Result<(PublicKey<B>, KeyCustodian<B>)> {
    let (pk, secret) = ctx.backend().generate_keypair(rng);
    let public_key = PublicKey::new(ctx, pk)?;
    info!(
        context = %ctx.fingerprint().short(),
        public_key = %public_key.fingerprint().short(),
        "generated key pair"
    );
    let custodian = KeyCustodian {
        context: ctx.fingerprint(),
        public_key: public_key.fingerprint(),
        secret,
    };
    Ok((public_key, custodian))
}
