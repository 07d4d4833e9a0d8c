//! Site-side encoding and encryption

use super::ciphertext::{Ciphertext, SiteCiphertext};
use super::context::CryptoContext;
use super::keys::PublicKey;
use super::weights::{SampleCount, WeightVector};
use crate::backend::HeBackend;
use crate::error::{FedError, Result};
use rand::{CryptoRng, Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use tracing::{debug, info};

/// Encrypt one site's weights under `public_key`.
///
/// The five values occupy the first five slots; every other slot is zero.
/// The count travels alongside in the clear.
pub fn encrypt_weights<B: HeBackend>(
    ctx: &CryptoContext<B>,
    public_key: &PublicKey<B>,
    weights: &WeightVector,
    count: Option<SampleCount>,
) -> Result<SiteCiphertext<B>> {
    encrypt_with_rng(
        ctx,
        public_key,
        weights,
        count,
        &mut ChaCha20Rng::from_entropy(),
    )
}

/// Encrypt with a caller-supplied RNG
pub fn encrypt_with_rng<B: HeBackend, R: RngCore + CryptoRng>(
    ctx: &CryptoContext<B>,
    public_key: &PublicKey<B>,
    weights: &WeightVector,
    count: Option<SampleCount>,
    rng: &mut R,
) -> Result<SiteCiphertext<B>> {
    ctx.ensure_same(&public_key.context_fingerprint(), "public key")?;
    if ctx.fresh_level() < 1 {
        return Err(FedError::NoiseBudgetExhausted(format!(
            "fresh ciphertexts have level {}, aggregation needs 1",
            ctx.fresh_level()
        )));
    }

    let body = ctx
        .backend()
        .encrypt(public_key.key(), weights.values(), ctx.scale(), rng)?;
    let ciphertext = Ciphertext::new(ctx.fingerprint(), public_key.fingerprint(), body);
    debug!(
        level = ciphertext.level(ctx),
        count = ?count.map(SampleCount::get),
        "encrypted weight vector"
    );

    Ok(SiteCiphertext { ciphertext, count })
}

/// Encrypt many sites in parallel, one independent ChaCha20 stream per site.
///
/// Output order matches input order.
pub fn encrypt_sites<B: HeBackend>(
    ctx: &CryptoContext<B>,
    public_key: &PublicKey<B>,
    sites: &[(WeightVector, Option<SampleCount>)],
) -> Result<Vec<SiteCiphertext<B>>> {
    encrypt_sites_from(ctx, public_key, sites, ChaCha20Rng::from_entropy())
}

/// Reproducible variant of [`encrypt_sites`]; for tests and simulations only
pub fn encrypt_sites_seeded<B: HeBackend>(
    ctx: &CryptoContext<B>,
    public_key: &PublicKey<B>,
    sites: &[(WeightVector, Option<SampleCount>)],
    seed: u64,
) -> Result<Vec<SiteCiphertext<B>>> {
    encrypt_sites_from(ctx, public_key, sites, ChaCha20Rng::seed_from_u64(seed))
}

fn encrypt_sites_from<B: HeBackend>(
    ctx: &CryptoContext<B>,
    public_key: &PublicKey<B>,
    sites: &[(WeightVector, Option<SampleCount>)],
    mut master: ChaCha20Rng,
) -> Result<Vec<SiteCiphertext<B>>> {
    let seeds: Vec<[u8; 32]> = sites.iter().map(|_| master.gen()).collect();

    let encrypted = sites
        .par_iter()
        .zip(seeds.into_par_iter())
        .map(|((weights, count), seed)| {
            let mut rng = ChaCha20Rng::from_seed(seed);
            encrypt_with_rng(ctx, public_key, weights, *count, &mut rng)
        })
        .collect::<Result<Vec<_>>>()?;

    info!(sites = encrypted.len(), "encrypted site weights");
    Ok(encrypted)
}
