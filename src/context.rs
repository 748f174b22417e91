//! Process-wide multi-key CKKS context, created once and shared read-only.

use std::collections::BTreeSet;

use num_complex::Complex64;
use rand::Rng;
use tracing::{debug, info};

use crate::{
    algebra::CkksAlgebra,
    ciphertext::Ciphertext,
    engine::CryptoEngine,
    error::CryptoError,
    keys::{Identity, PublicKeySet, RelinKeySet, SecretKey, SecretKeySet},
    params::CkksParameters,
    refresher::Refresher,
    scheme::Ckks,
};

/// Key material for every identity plus the scheme itself.
///
/// Immutable after [`setup`](Self::setup); wrap it in an `Arc` to share.
#[derive(Clone, Debug)]
pub struct CryptoContext {
    scheme: Ckks,
    secrets: SecretKeySet,
    publics: PublicKeySet,
    relin: RelinKeySet,
}

impl CryptoContext {
    /// Key generation for each identity and one relinearization key per
    /// unordered pair (diagonal included).
    pub fn setup<R: Rng>(
        params: CkksParameters,
        identities: &[Identity],
        rng: &mut R,
    ) -> Result<Self, CryptoError> {
        let scheme = Ckks::new(params)?;
        let mut unique = BTreeSet::new();
        for id in identities {
            if !unique.insert(id.clone()) {
                return Err(CryptoError::DuplicateIdentity(id.clone()));
            }
        }
        if unique.is_empty() {
            return Err(CryptoError::InvalidParameters("no identities to key".into()));
        }

        let mut secrets = SecretKeySet::default();
        let mut publics = PublicKeySet::default();
        // sorted, so relin keys always switch onto the smaller identity
        let mut ordered: Vec<(Identity, SecretKey)> = Vec::with_capacity(unique.len());
        for id in unique {
            let (sk, pk) = scheme.generate_keypair(rng)?;
            debug!(identity = %id, "generated key pair");
            secrets.insert(id.clone(), sk.clone())?;
            publics.insert(id.clone(), pk);
            ordered.push((id, sk));
        }

        let mut relin = RelinKeySet::default();
        for (x, (id_i, s_i)) in ordered.iter().enumerate() {
            for (id_j, s_j) in &ordered[x..] {
                let key = scheme.generate_relin_key(s_i, s_j, rng)?;
                relin.insert(id_i, id_j, key);
            }
        }

        let params = scheme.params();
        info!(
            ring_degree = params.n(),
            slots = scheme.slots(),
            levels = params.max_level(),
            identities = ordered.len(),
            relin_keys = relin.len(),
            "crypto context ready"
        );
        Ok(Self {
            scheme,
            secrets,
            publics,
            relin,
        })
    }

    pub fn params(&self) -> &CkksParameters {
        self.scheme.params()
    }

    pub fn public_keys(&self) -> &PublicKeySet {
        &self.publics
    }

    fn algebra(&self) -> CkksAlgebra<'_> {
        CkksAlgebra::new(&self.scheme, &self.relin)
    }
}

impl CryptoEngine for CryptoContext {
    type Ciphertext = Ciphertext;

    fn slots(&self) -> usize {
        self.scheme.slots()
    }

    fn encrypt_values<R: Rng>(
        &self,
        values: &[f64],
        owner: &Identity,
        rng: &mut R,
    ) -> Result<Ciphertext, CryptoError> {
        let pk = self.publics.get(owner)?;
        let pt = self.scheme.encode(values)?;
        self.scheme.encrypt(&pt, owner, pk, rng)
    }

    fn decrypt_values(&self, ct: &Ciphertext) -> Result<Vec<Complex64>, CryptoError> {
        let pt = self.scheme.decrypt(ct, &self.secrets)?;
        Ok(self.scheme.decode(&pt))
    }

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, CryptoError> {
        self.algebra().add(a, b)
    }

    fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, CryptoError> {
        self.algebra().sub(a, b)
    }

    fn mul_relin(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, CryptoError> {
        self.algebra().mul_relin(a, b)
    }

    fn refresh<R: Rng>(
        &self,
        ct: &Ciphertext,
        owner: &Identity,
        rng: &mut R,
    ) -> Result<Ciphertext, CryptoError> {
        Refresher::new(&self.scheme, &self.secrets, &self.publics).refresh(ct, owner, rng)
    }
}
