//! Canonical-embedding encoder: real slot vectors ↔ scaled ring elements.

use num_complex::Complex64;
use std::f64::consts::PI;

use crate::error::CryptoError;
use crate::modular::center;
use crate::polynomial::RnsPoly;

/// Encoded message together with the scale it carries.
#[derive(Clone, Debug)]
pub struct Plaintext {
    pub poly: RnsPoly,
    pub scale: f64,
}

/// Slot j is the evaluation at ζ^(5^j mod 2N), ζ = e^(iπ/N).
#[derive(Clone, Debug)]
pub struct Encoder {
    n: usize,
    roots: Vec<Complex64>,
}

impl Encoder {
    pub fn new(n: usize) -> Self {
        assert!(n >= 2 && n.is_power_of_two(), "ring degree must be a power of two");
        let two_n = 2 * n;
        let mut exponent = 1usize;
        let roots = (0..n / 2)
            .map(|_| {
                let angle = PI * exponent as f64 / n as f64;
                exponent = exponent * 5 % two_n;
                Complex64::from_polar(1.0, angle)
            })
            .collect();
        Self { n, roots }
    }

    pub fn slots(&self) -> usize {
        self.n / 2
    }

    /// Encode `values` (zero padded) at `scale` into every modulus.
    pub fn encode(&self, values: &[f64], scale: f64, moduli: &[u64]) -> Result<Plaintext, CryptoError> {
        if values.len() > self.slots() {
            return Err(CryptoError::SlotOverflow {
                values: values.len(),
                slots: self.slots(),
            });
        }
        // m_k = (2/N) · Re Σ_j z_j · conj(ζ_j)^k
        let norm = 2.0 / self.n as f64;
        let coeffs: Vec<i128> = (0..self.n)
            .map(|k| {
                let sum: f64 = values
                    .iter()
                    .zip(&self.roots)
                    .map(|(&z, root)| (root.conj().powu(k as u32) * z).re)
                    .sum();
                (sum * norm * scale).round() as i128
            })
            .collect();
        Ok(Plaintext {
            poly: RnsPoly::from_signed(&coeffs, moduli),
            scale,
        })
    }

    /// Decode through the base prime q_0.
    ///
    /// Exact as long as every scaled coefficient stays below q_0 / 2.
    pub fn decode(&self, plaintext: &Plaintext) -> Vec<Complex64> {
        let q0 = plaintext.poly.moduli[0];
        let coeffs: Vec<f64> = plaintext.poly.residues[0]
            .iter()
            .map(|&c| center(c, q0) as f64 / plaintext.scale)
            .collect();
        self.roots
            .iter()
            .map(|root| {
                coeffs
                    .iter()
                    .rev()
                    .fold(Complex64::new(0.0, 0.0), |acc, &c| acc * root + c)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULI: [u64; 2] = [(1 << 61) - 1, (1 << 40) - 87];

    #[test]
    fn test_encode_decode_precision() {
        let enc = Encoder::new(8);
        let values = [1000.0, -1.0, 0.5, 3.25];
        let pt = enc.encode(&values, 2f64.powi(40), &MODULI).unwrap();
        let out = enc.decode(&pt);
        for (v, z) in values.iter().zip(&out) {
            assert!((v - z.re).abs() < 1e-9, "{v} vs {z}");
            assert!(z.im.abs() < 1e-9);
        }
    }

    #[test]
    fn test_padding_and_overflow() {
        let enc = Encoder::new(8);
        let pt = enc.encode(&[7.0], 2f64.powi(30), &MODULI).unwrap();
        let out = enc.decode(&pt);
        assert!((out[0].re - 7.0).abs() < 1e-6);
        assert!(out[1..].iter().all(|z| z.norm() < 1e-6));

        let err = enc.encode(&[0.0; 5], 1.0, &MODULI).unwrap_err();
        assert_eq!(err, CryptoError::SlotOverflow { values: 5, slots: 4 });
    }

    #[test]
    fn test_roots_are_distinct_odd_powers() {
        let enc = Encoder::new(8);
        // 5^j mod 16 = 1, 5, 9, 13
        let expected = [1.0, 5.0, 9.0, 13.0].map(|e: f64| Complex64::from_polar(1.0, PI * e / 8.0));
        for (r, e) in enc.roots.iter().zip(expected) {
            assert!((r - e).norm() < 1e-12);
        }
    }
}
