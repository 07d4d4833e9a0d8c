//! Plaintext model parameters and sample counts

use crate::error::{fed_err, FedError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of model parameters: four feature weights and the intercept
pub const WEIGHT_COUNT: usize = 5;

/// Column names of the weight vector, in order
pub const WEIGHT_COLUMNS: [&str; WEIGHT_COUNT] = ["w1", "w2", "w3", "w4", "intercept"];

/// Exactly five finite reals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct WeightVector([f64; WEIGHT_COUNT]);

impl WeightVector {
    pub fn new(values: [f64; WEIGHT_COUNT]) -> Result<Self> {
        if let Some((i, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(fed_err!(
                Schema,
                "{} is not finite ({v})",
                WEIGHT_COLUMNS[i]
            ));
        }
        Ok(Self(values))
    }

    pub fn values(&self) -> &[f64; WEIGHT_COUNT] {
        &self.0
    }

    pub fn intercept(&self) -> f64 {
        self.0[WEIGHT_COUNT - 1]
    }
}

impl TryFrom<&[f64]> for WeightVector {
    type Error = FedError;

    fn try_from(values: &[f64]) -> Result<Self> {
        let array: [f64; WEIGHT_COUNT] = values.try_into().map_err(|_| {
            fed_err!(
                Schema,
                "expected {WEIGHT_COUNT} weights (4 features + intercept), got {}",
                values.len()
            )
        })?;
        Self::new(array)
    }
}

impl TryFrom<Vec<f64>> for WeightVector {
    type Error = FedError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Self::try_from(values.as_slice())
    }
}

impl From<WeightVector> for Vec<f64> {
    fn from(w: WeightVector) -> Self {
        w.0.to_vec()
    }
}

/// Number of training samples behind a site's weights.
///
/// Not confidential and not validated here; weighted aggregation rejects
/// counts that are not finite and positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleCount(pub f64);

impl SampleCount {
    pub fn get(self) -> f64 {
        self.0
    }
}

impl FromStr for SampleCount {
    type Err = FedError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<f64>()
            .map(SampleCount)
            .map_err(|e| fed_err!(Schema, "invalid sample count {s:?}: {e}"))
    }
}

impl fmt::Display for SampleCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
