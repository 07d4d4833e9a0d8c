//! Shared cryptographic context

use super::fingerprint::Fingerprint;
use crate::backend::{CkksBackend, HeBackend};
use crate::error::{fed_err, FedError, Result};
use crate::io::artifact::{read_artifact, ArtifactKind, Publication};
use crate::params::{CkksParams, DEFAULT_SCALE_BITS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Immutable parameter set shared byte-for-byte by every participant.
///
/// The fingerprint is the SHA-256 of the bincode serialization of the
/// parameters. Cloning is cheap; the backend tables are shared.
pub struct CryptoContext<B: HeBackend = CkksBackend> {
    params: CkksParams,
    fingerprint: Fingerprint,
    backend: Arc<B>,
}

impl<B: HeBackend> Clone for CryptoContext<B> {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            fingerprint: self.fingerprint,
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: HeBackend> std::fmt::Debug for CryptoContext<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoContext")
            .field("params", &self.params)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

/// On-disk form of a context
#[derive(Serialize, Deserialize)]
struct StoredContext {
    params: CkksParams,
    fingerprint: Fingerprint,
}

impl<B: HeBackend> CryptoContext<B> {
    /// Validate `params` and build the backend tables
    pub fn from_params(params: CkksParams) -> Result<Self> {
        let backend = B::from_params(&params)?;
        let fingerprint = Self::fingerprint_of(&params)?;
        info!(
            ring_dim = params.ring_dim,
            modulus_bits = ?params.modulus_bits,
            scale_bits = params.scale_bits,
            fingerprint = %fingerprint.short(),
            "created crypto context"
        );
        Ok(Self {
            params,
            fingerprint,
            backend: Arc::new(backend),
        })
    }

    fn fingerprint_of(params: &CkksParams) -> Result<Fingerprint> {
        Ok(Fingerprint::of(&[&bincode::serialize(params)?]))
    }

    pub fn params(&self) -> &CkksParams {
        &self.params
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Default encoding scale Δ
    pub fn scale(&self) -> f64 {
        self.params.scale()
    }

    /// Level of a freshly encrypted ciphertext
    pub fn fresh_level(&self) -> usize {
        self.params.max_depth()
    }

    /// Fail with `ContextMismatch` unless `other` is this context's fingerprint
    pub(crate) fn ensure_same(&self, other: &Fingerprint, what: &str) -> Result<()> {
        if *other == self.fingerprint {
            Ok(())
        } else {
            Err(fed_err!(
                ContextMismatch,
                "{what} belongs to context {} but the active context is {}",
                other.short(),
                self.fingerprint.short()
            ))
        }
    }

    /// Write the context artifact
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut publication = Publication::new();
        self.stage(&mut publication, path)?;
        publication.commit()
    }

    pub fn stage(&self, publication: &mut Publication, path: &Path) -> Result<()> {
        let stored = StoredContext {
            params: self.params.clone(),
            fingerprint: self.fingerprint,
        };
        publication.stage_artifact(path, ArtifactKind::Context, &stored)
    }

    /// Read a context artifact, rebuilding the tables and re-deriving the fingerprint
    pub fn load(path: &Path) -> Result<Self> {
        let stored: StoredContext = read_artifact(path, ArtifactKind::Context)?;
        let ctx = Self::from_params(stored.params)?;
        if ctx.fingerprint != stored.fingerprint {
            return Err(FedError::Config(format!(
                "context file {} does not match its recorded fingerprint",
                path.display()
            )));
        }
        Ok(ctx)
    }
}

/// Create a context with the default scale Δ = 2^40
pub fn create_context(ring_dimension: usize, modulus_bit_sizes: &[u32]) -> Result<CryptoContext> {
    create_context_with_scale(ring_dimension, modulus_bit_sizes, DEFAULT_SCALE_BITS)
}

/// Create a context with an explicit scale Δ = 2^scale_bits
pub fn create_context_with_scale(
    ring_dimension: usize,
    modulus_bit_sizes: &[u32],
    scale_bits: u32,
) -> Result<CryptoContext> {
    CryptoContext::from_params(CkksParams::new(
        ring_dimension,
        modulus_bit_sizes.to_vec(),
        scale_bits,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PlainBackend;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = CryptoContext::<PlainBackend>::from_params(CkksParams::fedavg_n8192()).unwrap();
        let b = CryptoContext::<PlainBackend>::from_params(CkksParams::fedavg_n8192()).unwrap();
        let c = CryptoContext::<PlainBackend>::from_params(CkksParams::default()).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(matches!(
            create_context(1000, &[60, 40, 60]),
            Err(FedError::Config(_))
        ));
        assert!(matches!(
            create_context(8192, &[60]),
            Err(FedError::Config(_))
        ));
    }

    #[test]
    fn test_ensure_same() {
        let ctx = CryptoContext::<PlainBackend>::from_params(CkksParams::fedavg_n8192()).unwrap();
        assert!(ctx.ensure_same(&ctx.fingerprint(), "key").is_ok());
        let other = Fingerprint::of(&[b"other"]);
        assert!(matches!(
            ctx.ensure_same(&other, "key"),
            Err(FedError::ContextMismatch(_))
        ));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.bin");
        let ctx = CryptoContext::<PlainBackend>::from_params(CkksParams::fedavg_n8192()).unwrap();
        ctx.save(&path).unwrap();
        let loaded = CryptoContext::<PlainBackend>::load(&path).unwrap();
        assert_eq!(loaded.fingerprint(), ctx.fingerprint());
        assert_eq!(loaded.params(), ctx.params());
    }
}
