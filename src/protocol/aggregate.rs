//! Homomorphic aggregation of site ciphertexts
//!
//! Every precondition is checked before the first homomorphic operation,
//! so a rejected input set never yields a partial aggregate.

use super::ciphertext::{Ciphertext, SiteCiphertext};
use super::context::CryptoContext;
use super::fingerprint::Fingerprint;
use crate::backend::HeBackend;
use crate::error::{fed_err, FedError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// How site contributions are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    /// Unweighted mean: (Σ ct_i) · 1/N
    Simple,
    /// Sample-count weighted mean: Σ ct_i · (count_i / Σ count)
    Weighted,
}

impl FromStr for AggregationMode {
    type Err = FedError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simple" => Ok(Self::Simple),
            "weighted" => Ok(Self::Weighted),
            other => Err(FedError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Simple => "simple",
            Self::Weighted => "weighted",
        })
    }
}

/// Provenance of one aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationRecord {
    pub mode: AggregationMode,
    pub participants: usize,
    /// Input ciphertext identifiers, in aggregation order
    pub inputs: Vec<String>,
    /// Per-input sample counts (weighted mode only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<Vec<f64>>,
    /// Σ counts (weighted mode only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_weight: Option<f64>,
    pub context: String,
    pub public_key: String,
    pub output: String,
}

/// Combine site ciphertexts into one encrypted mean.
///
/// Checks, in order: non-empty input, shared context and public key,
/// at least one level per input, and (weighted mode) a finite positive
/// count per input whose running total stays finite.
pub fn aggregate<B: HeBackend>(
    ctx: &CryptoContext<B>,
    mode: AggregationMode,
    inputs: &[SiteCiphertext<B>],
) -> Result<(Ciphertext<B>, AggregationRecord)> {
    let first = inputs.first().ok_or(FedError::EmptyInput)?;
    let key = first.ciphertext.public_key_fingerprint();

    for (i, site) in inputs.iter().enumerate() {
        let ct = &site.ciphertext;
        ctx.ensure_same(&ct.context_fingerprint(), &format!("ciphertext {i}"))?;
        if ct.public_key_fingerprint() != key {
            return Err(fed_err!(
                ContextMismatch,
                "ciphertext {i} was encrypted under key {} but ciphertext 0 under {}",
                ct.public_key_fingerprint().short(),
                key.short()
            ));
        }
    }

    for (i, site) in inputs.iter().enumerate() {
        let level = site.ciphertext.level(ctx);
        if level < 1 {
            return Err(fed_err!(
                NoiseBudgetExhausted,
                "ciphertext {i} is at level {level}; one level is needed for averaging"
            ));
        }
    }

    let weights = match mode {
        AggregationMode::Simple => None,
        AggregationMode::Weighted => Some(validated_counts(inputs)?),
    };

    let ids = inputs
        .iter()
        .map(|s| s.ciphertext.id().map(|id| id.to_string()))
        .collect::<Result<Vec<_>>>()?;

    let backend = ctx.backend();
    let body = match &weights {
        None => {
            let mut sum = first.ciphertext.body().clone();
            for site in &inputs[1..] {
                sum = backend.add(&sum, site.ciphertext.body())?;
            }
            backend.multiply_const(&sum, 1.0 / inputs.len() as f64)?
        }
        Some((counts, total)) => {
            let terms = inputs
                .par_iter()
                .zip(counts.par_iter())
                .map(|(site, &count)| backend.multiply_const(site.ciphertext.body(), count / total))
                .collect::<Result<Vec<_>>>()?;

            let mut terms = terms.into_iter();
            let mut sum = terms.next().ok_or(FedError::EmptyInput)?;
            for term in terms {
                sum = backend.add(&sum, &term)?;
            }
            sum
        }
    };

    let output = Ciphertext::new(ctx.fingerprint(), key, body);
    let record = AggregationRecord {
        mode,
        participants: inputs.len(),
        inputs: ids,
        total_weight: weights.as_ref().map(|(_, total)| *total),
        counts: weights.map(|(counts, _)| counts),
        context: ctx.fingerprint().to_string(),
        public_key: key.to_string(),
        output: output.id()?.to_string(),
    };

    info!(
        %mode,
        participants = record.participants,
        level = output.level(ctx),
        output = %fingerprint_prefix(&record.output),
        "aggregated ciphertexts"
    );
    Ok((output, record))
}

/// Per-input counts and their total
fn validated_counts<B: HeBackend>(inputs: &[SiteCiphertext<B>]) -> Result<(Vec<f64>, f64)> {
    let mut counts = Vec::with_capacity(inputs.len());
    let mut total = 0.0;
    for (index, site) in inputs.iter().enumerate() {
        let count = site.count.ok_or(FedError::MissingWeight { index })?.get();
        total += count;
        // an overflowing total would turn every factor count / total into zero
        if !(count.is_finite() && count > 0.0 && total.is_finite()) {
            return Err(FedError::InvalidWeight { index, count });
        }
        debug!(index, count, "weighted input");
        counts.push(count);
    }
    Ok((counts, total))
}

fn fingerprint_prefix(hex: &str) -> &str {
    &hex[..hex.len().min(16)]
}

impl AggregationRecord {
    /// Identifier of the aggregated ciphertext
    pub fn output_id(&self) -> &str {
        &self.output
    }

    /// Whether `fp` is the context this record was produced under
    pub fn is_for_context(&self, fp: &Fingerprint) -> bool {
        self.context == fp.to_string()
    }
}
