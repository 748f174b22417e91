//! The capability the protocol layer needs from a homomorphic scheme.

use std::collections::BTreeSet;
use std::fmt::Debug;

use num_complex::Complex64;
use rand::Rng;

use crate::error::CryptoError;
use crate::keys::Identity;

/// Slot-vector encryption with add, sub, multiply and an explicit refresh.
///
/// Implementations are immutable after setup and shared across worker
/// threads, hence `Send + Sync`.
pub trait CryptoEngine: Send + Sync {
    type Ciphertext: Clone + Debug + Send + Sync;

    fn slots(&self) -> usize;

    /// Encode `values` (zero padded) and encrypt under `owner`'s public key.
    fn encrypt_values<R: Rng>(
        &self,
        values: &[f64],
        owner: &Identity,
        rng: &mut R,
    ) -> Result<Self::Ciphertext, CryptoError>;

    /// Decrypt with the full secret-key set; one complex value per slot.
    fn decrypt_values(&self, ct: &Self::Ciphertext) -> Result<Vec<Complex64>, CryptoError>;

    fn add(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext, CryptoError>;

    fn sub(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext, CryptoError>;

    fn mul_relin(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext, CryptoError>;

    /// Decrypt and re-encrypt under `owner`, resetting noise and depth.
    ///
    /// The caller must be allowed to hold every secret key involved.
    fn refresh<R: Rng>(
        &self,
        ct: &Self::Ciphertext,
        owner: &Identity,
        rng: &mut R,
    ) -> Result<Self::Ciphertext, CryptoError>;
}

/// Insecure engine whose ciphertexts are the slot values themselves.
///
/// Runs the same protocol without any cryptography, as a fast reference
/// and a non-private baseline.
#[derive(Clone, Debug)]
pub struct PlaintextEngine {
    slots: usize,
    identities: BTreeSet<Identity>,
}

/// Slot values of a [`PlaintextEngine`] "ciphertext".
#[derive(Clone, Debug, PartialEq)]
pub struct PlainCiphertext {
    pub values: Vec<f64>,
}

impl PlaintextEngine {
    pub fn new(slots: usize, identities: &[Identity]) -> Self {
        Self {
            slots,
            identities: identities.iter().cloned().collect(),
        }
    }

    fn check_owner(&self, owner: &Identity) -> Result<(), CryptoError> {
        if self.identities.contains(owner) {
            Ok(())
        } else {
            Err(CryptoError::UnknownIdentity(owner.clone()))
        }
    }

    fn zip(
        a: &PlainCiphertext,
        b: &PlainCiphertext,
        f: impl Fn(f64, f64) -> f64,
    ) -> PlainCiphertext {
        PlainCiphertext {
            values: a.values.iter().zip(&b.values).map(|(&x, &y)| f(x, y)).collect(),
        }
    }
}

impl CryptoEngine for PlaintextEngine {
    type Ciphertext = PlainCiphertext;

    fn slots(&self) -> usize {
        self.slots
    }

    fn encrypt_values<R: Rng>(
        &self,
        values: &[f64],
        owner: &Identity,
        _rng: &mut R,
    ) -> Result<PlainCiphertext, CryptoError> {
        self.check_owner(owner)?;
        if values.len() > self.slots {
            return Err(CryptoError::SlotOverflow {
                values: values.len(),
                slots: self.slots,
            });
        }
        let mut padded = values.to_vec();
        padded.resize(self.slots, 0.0);
        Ok(PlainCiphertext { values: padded })
    }

    fn decrypt_values(&self, ct: &PlainCiphertext) -> Result<Vec<Complex64>, CryptoError> {
        Ok(ct.values.iter().map(|&v| Complex64::new(v, 0.0)).collect())
    }

    fn add(&self, a: &PlainCiphertext, b: &PlainCiphertext) -> Result<PlainCiphertext, CryptoError> {
        Ok(Self::zip(a, b, |x, y| x + y))
    }

    fn sub(&self, a: &PlainCiphertext, b: &PlainCiphertext) -> Result<PlainCiphertext, CryptoError> {
        Ok(Self::zip(a, b, |x, y| x - y))
    }

    fn mul_relin(&self, a: &PlainCiphertext, b: &PlainCiphertext) -> Result<PlainCiphertext, CryptoError> {
        Ok(Self::zip(a, b, |x, y| x * y))
    }

    fn refresh<R: Rng>(
        &self,
        ct: &PlainCiphertext,
        owner: &Identity,
        _rng: &mut R,
    ) -> Result<PlainCiphertext, CryptoError> {
        self.check_owner(owner)?;
        Ok(ct.clone())
    }
}
