//! Party identities and key material.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::polynomial::RnsPoly;

/// Name of a key holder ("cloud platform", "user1", ...).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The party holding the shared table.
    pub fn aggregator() -> Self {
        Self::new("cloud platform")
    }

    /// Agent `index` is named `user{index + 1}`.
    pub fn agent(index: usize) -> Self {
        Self(format!("user{}", index + 1))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ternary secret s, kept as signed coefficients so it can be reduced into
/// any modulus chain.
#[derive(Clone, Debug)]
pub struct SecretKey {
    pub coeffs: Vec<i128>,
}

impl SecretKey {
    pub fn to_poly(&self, moduli: &[u64]) -> RnsPoly {
        RnsPoly::from_signed(&self.coeffs, moduli)
    }
}

/// RLWE public key (b = -a·s + e, a) over the full chain q_0..q_L.
#[derive(Clone, Debug)]
pub struct PublicKey {
    pub b: RnsPoly,
    pub a: RnsPoly,
}

/// Key switching s_i·s_j → s_i, one RNS digit per chain prime, over
/// q_0..q_L and the special prime.
#[derive(Clone, Debug)]
pub struct RelinKey {
    pub b: Vec<RnsPoly>,
    pub a: Vec<RnsPoly>,
}

#[derive(Clone, Debug, Default)]
pub struct SecretKeySet {
    keys: BTreeMap<Identity, SecretKey>,
}

impl SecretKeySet {
    pub fn insert(&mut self, id: Identity, key: SecretKey) -> Result<(), CryptoError> {
        if self.keys.contains_key(&id) {
            return Err(CryptoError::DuplicateIdentity(id));
        }
        self.keys.insert(id, key);
        Ok(())
    }

    pub fn get(&self, id: &Identity) -> Result<&SecretKey, CryptoError> {
        self.keys
            .get(id)
            .ok_or_else(|| CryptoError::MissingSecretKey(id.clone()))
    }

    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.keys.keys()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct PublicKeySet {
    keys: BTreeMap<Identity, PublicKey>,
}

impl PublicKeySet {
    pub fn insert(&mut self, id: Identity, key: PublicKey) {
        self.keys.insert(id, key);
    }

    pub fn get(&self, id: &Identity) -> Result<&PublicKey, CryptoError> {
        self.keys
            .get(id)
            .ok_or_else(|| CryptoError::UnknownIdentity(id.clone()))
    }

    pub fn contains(&self, id: &Identity) -> bool {
        self.keys.contains_key(id)
    }
}

/// One key per unordered pair, stored under (min, max).
#[derive(Clone, Debug, Default)]
pub struct RelinKeySet {
    keys: BTreeMap<(Identity, Identity), RelinKey>,
}

impl RelinKeySet {
    fn ordered(a: &Identity, b: &Identity) -> (Identity, Identity) {
        if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        }
    }

    /// Stores the key that maps s_a·s_b onto s_min(a, b).
    pub fn insert(&mut self, a: &Identity, b: &Identity, key: RelinKey) {
        self.keys.insert(Self::ordered(a, b), key);
    }

    pub fn get(&self, a: &Identity, b: &Identity) -> Result<&RelinKey, CryptoError> {
        let pair = Self::ordered(a, b);
        self.keys
            .get(&pair)
            .ok_or(CryptoError::MissingRelinKey(pair.0, pair.1))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
