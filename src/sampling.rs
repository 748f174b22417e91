//! Random sampling for key generation and encryption: uniform, ternary, Gaussian.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::CryptoError;
use crate::polynomial::RnsPoly;

/// Gaussian samples beyond this many σ are rejected.
const TAIL_CUT: f64 = 6.0;

/// Uniform over Z_Q, sampled residue by residue (CRT).
pub fn sample_uniform<R: Rng>(n: usize, moduli: &[u64], rng: &mut R) -> RnsPoly {
    let residues = moduli
        .iter()
        .map(|&q| (0..n).map(|_| rng.gen_range(0..q)).collect())
        .collect();
    RnsPoly {
        residues,
        moduli: moduli.to_vec(),
    }
}

/// Coefficients in {-1, 0, 1} with P(0) = 1/2.
pub fn sample_ternary<R: Rng>(n: usize, rng: &mut R) -> Vec<i128> {
    (0..n)
        .map(|_| match rng.gen_range(0..4u8) {
            0 => -1,
            1 => 1,
            _ => 0,
        })
        .collect()
}

/// Rounded Gaussian with standard deviation `sigma`, tails cut at 6σ.
pub fn sample_gaussian<R: Rng>(n: usize, sigma: f64, rng: &mut R) -> Result<Vec<i128>, CryptoError> {
    if !(sigma > 0.0 && sigma.is_finite()) {
        return Err(CryptoError::InvalidParameters(format!("gaussian sigma {sigma} must be positive")));
    }
    let normal = Normal::new(0.0, sigma)
        .map_err(|e| CryptoError::InvalidParameters(format!("gaussian sigma: {e}")))?;
    let bound = TAIL_CUT * sigma;
    let mut coeffs = Vec::with_capacity(n);
    while coeffs.len() < n {
        let x: f64 = normal.sample(rng);
        if x.abs() <= bound {
            coeffs.push(x.round() as i128);
        }
    }
    Ok(coeffs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_ternary_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let s = sample_ternary(256, &mut rng);
        assert!(s.iter().all(|c| (-1..=1).contains(c)));
        assert!(s.contains(&-1) && s.contains(&0) && s.contains(&1));
    }

    #[test]
    fn test_gaussian_is_small() {
        let mut rng = StdRng::seed_from_u64(7);
        let e = sample_gaussian(512, 3.2, &mut rng).unwrap();
        assert_eq!(e.len(), 512);
        assert!(e.iter().all(|c| c.abs() <= 20));
    }

    #[test]
    fn test_gaussian_rejects_non_positive_sigma() {
        let mut rng = StdRng::seed_from_u64(7);
        for sigma in [-1.0, 0.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                sample_gaussian(4, sigma, &mut rng),
                Err(CryptoError::InvalidParameters(_))
            ));
        }
    }

    #[test]
    fn test_uniform_below_moduli() {
        let mut rng = StdRng::seed_from_u64(7);
        let moduli = [97, 1 << 40];
        let u = sample_uniform(16, &moduli, &mut rng);
        assert!(u.residues[0].iter().all(|&c| c < 97));
        assert_eq!(u.n(), 16);
    }
}
