//! CKKS key material

use crate::math::RnsPoly;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// RLWE public key (b, a) with b = -a·s + e over the full modulus chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CkksPublicKey {
    pub(crate) b: RnsPoly,
    pub(crate) a: RnsPoly,
}

/// Ternary secret s ∈ {-1, 0, 1}^N
///
/// Memory is wiped on drop and `Debug` never prints coefficients.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct CkksSecretKey {
    pub(crate) coeffs: Vec<i64>,
}

impl CkksSecretKey {
    pub(crate) fn dimension(&self) -> usize {
        self.coeffs.len()
    }
}

impl std::fmt::Debug for CkksSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CkksSecretKey")
            .field("dimension", &self.coeffs.len())
            .field("coeffs", &"<redacted>")
            .finish()
    }
}
