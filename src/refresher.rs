//! Noise refresh: decrypt with the full secret-key set and re-encrypt fresh.
//!
//! This stands in for bootstrapping. Whoever runs it holds every secret
//! key, so it is kept as a separate, visible step.

use rand::Rng;

use crate::{
    ciphertext::Ciphertext,
    error::CryptoError,
    keys::{Identity, PublicKeySet, SecretKeySet},
    scheme::Ckks,
};

/// Stateless helper that owns references to the scheme and key sets.
pub struct Refresher<'a> {
    scheme: &'a Ckks,
    secrets: &'a SecretKeySet,
    publics: &'a PublicKeySet,
}

impl<'a> Refresher<'a> {
    pub fn new(scheme: &'a Ckks, secrets: &'a SecretKeySet, publics: &'a PublicKeySet) -> Self {
        Self {
            scheme,
            secrets,
            publics,
        }
    }

    /// True once a ciphertext has spent any of its multiplicative depth.
    pub fn needs_refresh(&self, c: &Ciphertext) -> bool {
        c.level < self.scheme.params().max_level()
    }

    /// Fresh top-level encryption of the real parts of `c` under `owner`.
    pub fn refresh<R: Rng>(
        &self,
        c: &Ciphertext,
        owner: &Identity,
        rng: &mut R,
    ) -> Result<Ciphertext, CryptoError> {
        let pk = self.publics.get(owner)?;
        let plain = self.scheme.decrypt(c, self.secrets)?;
        let values: Vec<f64> = self.scheme.decode(&plain).iter().map(|z| z.re).collect();
        let pt = self.scheme.encode(&values)?;
        self.scheme.encrypt(&pt, owner, pk, rng)
    }
}
