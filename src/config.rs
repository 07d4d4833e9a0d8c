//! Deployment configuration file
//!
//! Optional JSON document shared by the operators of one deployment. Every
//! field has a default, so `{}` is a valid file:
//!
//! ```json
//! {
//!   "ring_dimension": 16384,
//!   "modulus_bits": [60, 40, 40, 60],
//!   "scale_bits": 40,
//!   "join_timeout_secs": 300,
//!   "join_poll_millis": 500
//! }
//! ```

use crate::error::{fed_err, Result};
use crate::params::CkksParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeploymentConfig {
    pub ring_dimension: usize,
    pub modulus_bits: Vec<u32>,
    pub scale_bits: u32,
    /// How long the aggregator waits for missing ciphertext files
    pub join_timeout_secs: u64,
    pub join_poll_millis: u64,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        let params = CkksParams::fedavg_n16384();
        Self {
            ring_dimension: params.ring_dim,
            modulus_bits: params.modulus_bits,
            scale_bits: params.scale_bits,
            join_timeout_secs: 0,
            join_poll_millis: 500,
        }
    }
}

impl DeploymentConfig {
    /// Parse a JSON configuration file; unreadable or malformed files are configuration errors
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| fed_err!(Config, "cannot read config {}: {e}", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| fed_err!(Config, "invalid config {}: {e}", path.display()))
    }

    /// Load `path` if given, else the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    /// Validated CKKS parameters
    pub fn params(&self) -> Result<CkksParams> {
        let params = CkksParams::new(
            self.ring_dimension,
            self.modulus_bits.clone(),
            self.scale_bits,
        );
        params.validate()?;
        Ok(params)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }

    pub fn join_poll(&self) -> Duration {
        Duration::from_millis(self.join_poll_millis.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FedError;

    #[test]
    fn test_empty_object_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fedavg.json");
        fs::write(&path, "{}").unwrap();

        let cfg = DeploymentConfig::from_file(&path).unwrap();
        assert_eq!(cfg, DeploymentConfig::default());
        assert_eq!(cfg.params().unwrap(), CkksParams::fedavg_n16384());
    }

    #[test]
    fn test_partial_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fedavg.json");
        fs::write(
            &path,
            r#"{"ring_dimension": 8192, "join_timeout_secs": 30}"#,
        )
        .unwrap();

        let cfg = DeploymentConfig::from_file(&path).unwrap();
        assert_eq!(cfg.params().unwrap(), CkksParams::fedavg_n8192());
        assert_eq!(cfg.join_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_bad_files_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fedavg.json");
        fs::write(&path, "{ring_dimension: ").unwrap();
        assert!(matches!(
            DeploymentConfig::from_file(&path),
            Err(FedError::Config(_))
        ));

        fs::write(&path, r#"{"ring_dim": 8192}"#).unwrap();
        assert!(matches!(
            DeploymentConfig::from_file(&path),
            Err(FedError::Config(_))
        ));

        assert!(matches!(
            DeploymentConfig::from_file(&dir.path().join("missing.json")),
            Err(FedError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let cfg = DeploymentConfig {
            ring_dimension: 1000,
            ..Default::default()
        };
        assert!(matches!(cfg.params(), Err(FedError::Config(_))));
    }
}
