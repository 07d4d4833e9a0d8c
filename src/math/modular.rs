//! Modular arithmetic operations over word-sized primes

/// Modular arithmetic operations over Z_q
pub struct ModQ;

impl ModQ {
    /// Add two values modulo q
    #[inline]
    pub fn add(a: u64, b: u64, q: u64) -> u64 {
        let sum = (a as u128) + (b as u128);
        (sum % (q as u128)) as u64
    }

    /// Subtract two values modulo q
    #[inline]
    pub fn sub(a: u64, b: u64, q: u64) -> u64 {
        if a >= b {
            a - b
        } else {
            q - (b - a)
        }
    }

    /// Multiply two values modulo q
    #[inline]
    pub fn mul(a: u64, b: u64, q: u64) -> u64 {
        let prod = (a as u128) * (b as u128);
        (prod % (q as u128)) as u64
    }

    /// Negate a value modulo q
    #[inline]
    pub fn negate(a: u64, q: u64) -> u64 {
        if a == 0 {
            0
        } else {
            q - a
        }
    }

    /// Convert a signed integer to its representation in Z_q
    #[inline]
    pub fn from_signed(val: i64, q: u64) -> u64 {
        if val >= 0 {
            (val as u64) % q
        } else {
            let abs = val.unsigned_abs();
            Self::negate(abs % q, q)
        }
    }

    /// Reduce a wide signed integer into Z_q
    #[inline]
    pub fn from_i128(val: i128, q: u64) -> u64 {
        val.rem_euclid(q as i128) as u64
    }

    /// Convert from Z_q to signed representation in [-q/2, q/2)
    #[inline]
    pub fn to_signed(val: u64, q: u64) -> i64 {
        if val <= q / 2 {
            val as i64
        } else {
            -((q - val) as i64)
        }
    }

    /// Modular exponentiation by squaring
    pub fn pow(mut base: u64, mut exp: u64, q: u64) -> u64 {
        let mut result = 1u64 % q;
        base %= q;
        while exp > 0 {
            if exp & 1 == 1 {
                result = Self::mul(result, base, q);
            }
            exp >>= 1;
            base = Self::mul(base, base, q);
        }
        result
    }

    /// Inverse of `a` modulo a prime `q` (Fermat's little theorem).
    ///
    /// Returns `None` when `a ≡ 0 (mod q)`.
    pub fn inverse(a: u64, q: u64) -> Option<u64> {
        if a % q == 0 {
            None
        } else {
            Some(Self::pow(a, q - 2, q))
        }
    }
}

/// Deterministic Miller-Rabin primality test for 64-bit integers.
///
/// The witness set below is exact for every n < 2^64.
pub fn is_prime(n: u64) -> bool {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

    if n < 2 {
        return false;
    }
    for &p in &WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }

    let mut d = n - 1;
    let mut r = 0;
    while d % 2 == 0 {
        d /= 2;
        r += 1;
    }

    'witness: for &a in &WITNESSES {
        let mut x = ModQ::pow(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..r {
            x = ModQ::mul(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Find distinct primes q with the requested bit widths such that q ≡ 1 (mod 2n).
///
/// Searches downward from the largest `bits`-bit candidate for each entry,
/// skipping primes already handed out to an earlier entry of the chain.
/// Returns `None` if some width has no unused NTT-friendly prime.
pub fn ntt_friendly_primes(bit_sizes: &[u32], n: usize) -> Option<Vec<u64>> {
    let two_n = 2 * n as u64;
    let mut chosen: Vec<u64> = Vec::with_capacity(bit_sizes.len());

    for &bits in bit_sizes {
        if !(2..=62).contains(&bits) {
            return None;
        }
        let upper = (1u64 << bits) - 1;
        let lower = 1u64 << (bits - 1);

        // Largest candidate ≡ 1 (mod 2n) not exceeding upper
        let mut candidate = upper - (upper % two_n) + 1;
        if candidate > upper {
            candidate = candidate.checked_sub(two_n)?;
        }

        let mut found = None;
        while candidate >= lower {
            if !chosen.contains(&candidate) && is_prime(candidate) {
                found = Some(candidate);
                break;
            }
            candidate = match candidate.checked_sub(two_n) {
                Some(c) => c,
                None => break,
            };
        }
        chosen.push(found?);
    }

    Some(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q: u64 = 1152921504606830593;

    #[test]
    fn test_add_sub() {
        assert_eq!(ModQ::add(5, 7, Q), 12);
        assert_eq!(ModQ::add(Q - 1, 2, Q), 1);
        assert_eq!(ModQ::sub(3, 10, Q), Q - 7);
    }

    #[test]
    fn test_signed_conversions() {
        assert_eq!(ModQ::from_signed(-5, Q), Q - 5);
        assert_eq!(ModQ::to_signed(Q - 5, Q), -5);
        assert_eq!(ModQ::from_i128(-(Q as i128) - 3, Q), Q - 3);
        assert_eq!(
            ModQ::from_signed(i64::MIN, 97),
            ModQ::from_i128(i64::MIN as i128, 97)
        );
    }

    #[test]
    fn test_inverse() {
        let a = 123_456_789u64;
        let inv = ModQ::inverse(a, Q).unwrap();
        assert_eq!(ModQ::mul(a, inv, Q), 1);
        assert!(ModQ::inverse(Q, Q).is_none());
    }

    #[test]
    fn test_is_prime() {
        assert!(is_prime(2));
        assert!(is_prime(65537));
        assert!(is_prime(Q));
        assert!(!is_prime(1));
        assert!(!is_prime(561)); // Carmichael number
        assert!(!is_prime(Q - 2));
    }

    #[test]
    fn test_ntt_friendly_primes_are_distinct() {
        let n = 8192;
        let primes = ntt_friendly_primes(&[60, 40, 40, 60], n).unwrap();
        assert_eq!(primes.len(), 4);
        for (i, &q) in primes.iter().enumerate() {
            assert!(is_prime(q));
            assert_eq!(q % (2 * n as u64), 1);
            for &other in &primes[i + 1..] {
                assert_ne!(q, other);
            }
        }
        assert_eq!(64 - primes[1].leading_zeros(), 40);
        assert_eq!(64 - primes[0].leading_zeros(), 60);
    }

    #[test]
    fn test_ntt_friendly_primes_rejects_bad_width() {
        assert!(ntt_friendly_primes(&[1], 1024).is_none());
        assert!(ntt_friendly_primes(&[64], 1024).is_none());
    }
}
