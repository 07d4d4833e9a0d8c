//! Canonical-embedding encoder for real slot vectors.
//!
//! Slot k holds the value of m(X) at ζ^(2k+1) with ζ = e^(πi/N). Evaluating
//! at all N odd powers is a DFT of the twisted coefficients m[j]·ζ^j, so
//! both directions cost one radix-2 FFT. Real slots are mirrored into the
//! conjugate half (slot N-1-k = slot k), which makes the coefficients real.

use std::f64::consts::PI;

/// Twist factors and FFT twiddles for one ring dimension
#[derive(Debug, Clone)]
pub struct SlotEncoder {
    n: usize,
    /// cos(πj/N), sin(πj/N)
    twist: Vec<(f64, f64)>,
    bit_rev: Vec<usize>,
    /// Per stage s: e^(-2πik/2^(s+1)) for k < 2^s
    stages: Vec<Vec<(f64, f64)>>,
}

impl SlotEncoder {
    pub fn new(n: usize) -> Self {
        let log_n = n.trailing_zeros();

        let twist = (0..n)
            .map(|j| {
                let angle = PI * j as f64 / n as f64;
                (angle.cos(), angle.sin())
            })
            .collect();

        let bit_rev = (0..n)
            .map(|i| i.reverse_bits() >> (usize::BITS - log_n))
            .collect();

        let stages = (0..log_n)
            .map(|s| {
                let half = 1usize << s;
                (0..half)
                    .map(|k| {
                        let angle = -PI * k as f64 / half as f64;
                        (angle.cos(), angle.sin())
                    })
                    .collect()
            })
            .collect();

        Self {
            n,
            twist,
            bit_rev,
            stages,
        }
    }

    /// Number of real slots (N/2)
    pub fn slot_count(&self) -> usize {
        self.n / 2
    }

    /// Map slot values to integer coefficients round(scale · σ^(-1)(z)).
    ///
    /// Slots beyond `values.len()` are zero. Callers check the length and
    /// finiteness beforehand.
    pub fn encode(&self, values: &[f64], scale: f64) -> Vec<i128> {
        let n = self.n;
        let mut re = vec![0.0f64; n];
        let mut im = vec![0.0f64; n];
        for (k, &v) in values.iter().enumerate().take(self.slot_count()) {
            re[k] = v;
            re[n - 1 - k] = v;
        }

        self.fft(&mut re, &mut im);

        // m[j] = Re(a[j] · ζ^(-j)) with a = FFT(z) / N
        let inv_n = 1.0 / n as f64;
        re.iter()
            .zip(&im)
            .zip(&self.twist)
            .map(|((&a_re, &a_im), &(cos, sin))| {
                let coeff = (a_re * cos + a_im * sin) * inv_n;
                (coeff * scale).round() as i128
            })
            .collect()
    }

    /// Map real coefficients (already divided by the scale) back to slot values
    pub fn decode(&self, coeffs: &[f64]) -> Vec<f64> {
        assert_eq!(
            coeffs.len(),
            self.n,
            "Coefficient count must match dimension"
        );

        // FFT of conj(m[j] · ζ^j); its real part is the slot value
        let (mut re, mut im): (Vec<f64>, Vec<f64>) = coeffs
            .iter()
            .zip(&self.twist)
            .map(|(&c, &(cos, sin))| (c * cos, -c * sin))
            .unzip();

        self.fft(&mut re, &mut im);
        re.truncate(self.slot_count());
        re
    }

    /// In-place radix-2 decimation-in-time FFT
    fn fft(&self, re: &mut [f64], im: &mut [f64]) {
        for (i, &j) in self.bit_rev.iter().enumerate() {
            if i < j {
                re.swap(i, j);
                im.swap(i, j);
            }
        }

        for (s, twiddles) in self.stages.iter().enumerate() {
            let half = 1usize << s;
            for start in (0..self.n).step_by(2 * half) {
                for (k, &(w_re, w_im)) in twiddles.iter().enumerate() {
                    let i0 = start + k;
                    let i1 = i0 + half;
                    let v_re = w_re * re[i1] - w_im * im[i1];
                    let v_im = w_re * im[i1] + w_im * re[i1];
                    let (u_re, u_im) = (re[i0], im[i0]);
                    re[i0] = u_re + v_re;
                    im[i0] = u_im + v_im;
                    re[i1] = u_re - v_re;
                    im[i1] = u_im - v_im;
                }
            }
        }
    }
}
