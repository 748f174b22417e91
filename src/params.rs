//! CKKS parameter set: ring degree, RNS modulus chain, special prime.

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::modular::{is_prime, pairwise_coprime, primes_below};

/// Largest prime size the u64/u128 arithmetic supports.
pub const MAX_PRIME_BITS: u32 = 62;

/// Parameters shared by every party, as in CKKS with one special prime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CkksParameters {
    /// log2 of the ring degree N
    pub log_n: u32,
    /// log2 of the encoding scale Δ
    pub log_scale: u32,
    /// q_0, q_1, .., q_L (q_0 is the decryption base prime)
    pub moduli: Vec<u64>,
    /// Special prime P used only during key switching
    pub special_modulus: u64,
    /// Standard deviation of the error distribution
    pub sigma: f64,
}

impl CkksParameters {
    /// Build a chain of `levels` rescaling primes below `2^log_scale` on top
    /// of a base prime below `2^log_q0`, plus a special prime below
    /// `2^log_special`.
    pub fn new(
        log_n: u32,
        log_q0: u32,
        log_scale: u32,
        levels: usize,
        log_special: u32,
    ) -> Result<Self, CryptoError> {
        if log_n == 0 || log_n > 12 {
            return Err(CryptoError::InvalidParameters(format!(
                "log_n must be in 1..=12, got {log_n}"
            )));
        }
        if levels == 0 {
            return Err(CryptoError::InvalidParameters(
                "at least one rescaling level is required".into(),
            ));
        }
        for (name, bits) in [("q0", log_q0), ("scale", log_scale), ("special", log_special)] {
            if !(2..=MAX_PRIME_BITS).contains(&bits) {
                return Err(CryptoError::InvalidParameters(format!(
                    "{name} bit size {bits} outside 2..={MAX_PRIME_BITS}"
                )));
            }
        }
        if log_scale >= log_q0 {
            return Err(CryptoError::InvalidParameters(format!(
                "base prime ({log_q0} bits) must exceed the scale ({log_scale} bits)"
            )));
        }

        let mut moduli = primes_below(log_q0, 1, &[]);
        let rescale = primes_below(log_scale, levels, &moduli);
        if moduli.len() != 1 || rescale.len() != levels {
            return Err(CryptoError::InvalidParameters(
                "not enough primes for the requested chain".into(),
            ));
        }
        moduli.extend(rescale);
        let special = primes_below(log_special, 1, &moduli);
        let special_modulus = *special.first().ok_or_else(|| {
            CryptoError::InvalidParameters("no special prime available".into())
        })?;

        let params = Self {
            log_n,
            log_scale,
            moduli,
            special_modulus,
            sigma: 3.2,
        };
        params.validate()?;
        Ok(params)
    }

    /// N = 8 (4 slots), q_0 ≈ 2^61, Δ = 2^40, two levels, P ≈ 2^62.
    pub fn toy() -> Result<Self, CryptoError> {
        Self::new(3, 61, 40, 2, 62)
    }

    /// Same chain as [`toy`](Self::toy) with a different ring degree.
    pub fn with_log_n(log_n: u32) -> Result<Self, CryptoError> {
        Self::new(log_n, 61, 40, 2, 62)
    }

    /// Checks a parameter set that may have come from a file.
    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.moduli.len() < 2 {
            return Err(CryptoError::InvalidParameters(
                "modulus chain needs a base prime and one rescaling prime".into(),
            ));
        }
        let mut all = self.moduli.clone();
        all.push(self.special_modulus);
        if let Some(q) = all.iter().find(|&&q| q >= 1 << MAX_PRIME_BITS || !is_prime(q)) {
            return Err(CryptoError::InvalidParameters(format!(
                "modulus {q} is not a prime below 2^{MAX_PRIME_BITS}"
            )));
        }
        if !pairwise_coprime(&all) {
            return Err(CryptoError::InvalidParameters("moduli are not distinct".into()));
        }
        if !(self.sigma > 0.0) {
            return Err(CryptoError::InvalidParameters("sigma must be positive".into()));
        }
        Ok(())
    }

    pub fn n(&self) -> usize {
        1 << self.log_n
    }

    pub fn slots(&self) -> usize {
        self.n() / 2
    }

    /// Index of the top level (fresh ciphertexts live here).
    pub fn max_level(&self) -> usize {
        self.moduli.len() - 1
    }

    pub fn scale(&self) -> f64 {
        2f64.powi(self.log_scale as i32)
    }

    /// Moduli active at `level`: q_0..=q_level.
    pub fn moduli_at(&self, level: usize) -> &[u64] {
        &self.moduli[..=level]
    }

    /// Moduli at `level` extended by the special prime.
    pub fn extended_moduli(&self, level: usize) -> Vec<u64> {
        let mut m = self.moduli_at(level).to_vec();
        m.push(self.special_modulus);
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toy_parameters() {
        let p = CkksParameters::toy().unwrap();
        assert_eq!(p.n(), 8);
        assert_eq!(p.slots(), 4);
        assert_eq!(p.max_level(), 2);
        assert_eq!(p.moduli, vec![(1 << 61) - 1, (1 << 40) - 87, (1 << 40) - 167]);
        assert_eq!(p.special_modulus, (1 << 62) - 57);
        assert_eq!(p.extended_moduli(1).len(), 3);
        assert_eq!(p.scale(), (1u64 << 40) as f64);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(matches!(
            CkksParameters::new(0, 61, 40, 2, 62),
            Err(CryptoError::InvalidParameters(_))
        ));
        assert!(CkksParameters::new(3, 61, 40, 0, 62).is_err());
        assert!(CkksParameters::new(3, 63, 40, 2, 62).is_err());
        assert!(CkksParameters::new(3, 40, 40, 2, 62).is_err());
    }

    #[test]
    fn test_validate_detects_composite() {
        let mut p = CkksParameters::toy().unwrap();
        p.moduli[1] = 1 << 40;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let p = CkksParameters::with_log_n(4).unwrap();
        let json = serde_json::to_string(&p).unwrap();
        let back: CkksParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
