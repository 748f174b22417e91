//! Key generation, encryption & decryption.

use num_complex::Complex64;
use rand::Rng;
use std::collections::BTreeMap;

use crate::{
    ciphertext::Ciphertext,
    encoding::{Encoder, Plaintext},
    error::CryptoError,
    keys::{Identity, PublicKey, RelinKey, SecretKey, SecretKeySet},
    params::CkksParameters,
    polynomial::RnsPoly,
    sampling::{sample_gaussian, sample_ternary, sample_uniform},
};

/// Main state object: parameters plus the slot encoder.
#[derive(Clone, Debug)]
pub struct Ckks {
    params: CkksParameters,
    encoder: Encoder,
}

impl Ckks {
    pub fn new(params: CkksParameters) -> Result<Self, CryptoError> {
        params.validate()?;
        let encoder = Encoder::new(params.n());
        Ok(Self { params, encoder })
    }

    pub fn params(&self) -> &CkksParameters {
        &self.params
    }

    pub fn slots(&self) -> usize {
        self.encoder.slots()
    }

    /// s ← ternary, a ← uniform, e ← Gaussian, b = -a·s + e.
    pub fn generate_keypair<R: Rng>(&self, rng: &mut R) -> Result<(SecretKey, PublicKey), CryptoError> {
        let n = self.params.n();
        let moduli = &self.params.moduli;
        let sk = SecretKey {
            coeffs: sample_ternary(n, rng),
        };
        let s = sk.to_poly(moduli);
        let a = sample_uniform(n, moduli, rng);
        let e = RnsPoly::from_signed(&sample_gaussian(n, self.params.sigma, rng)?, moduli);
        let b = -(&a * &s) + &e;
        Ok((sk, PublicKey { b, a }))
    }

    /// Key switching s_i·s_j → s_i.
    ///
    /// Digit k: b_k = -a_k·s_i + e_k + g_k·s_i·s_j where the gadget g_k is
    /// P modulo q_k and zero modulo every other prime (P included).
    pub fn generate_relin_key<R: Rng>(
        &self,
        s_i: &SecretKey,
        s_j: &SecretKey,
        rng: &mut R,
    ) -> Result<RelinKey, CryptoError> {
        let n = self.params.n();
        let top = self.params.max_level();
        let ext = self.params.extended_moduli(top);
        let p = self.params.special_modulus;
        let si = s_i.to_poly(&ext);
        let sij = &si * &s_j.to_poly(&ext);

        let mut b = Vec::with_capacity(top + 1);
        let mut a = Vec::with_capacity(top + 1);
        for k in 0..=top {
            let mut gadget = vec![0u64; ext.len()];
            gadget[k] = p % ext[k];
            let a_k = sample_uniform(n, &ext, rng);
            let e_k = RnsPoly::from_signed(&sample_gaussian(n, self.params.sigma, rng)?, &ext);
            let b_k = -(&a_k * &si) + &e_k + sij.mul_scalars(&gadget);
            b.push(b_k);
            a.push(a_k);
        }
        Ok(RelinKey { b, a })
    }

    /// Encode at the default scale over the full chain.
    pub fn encode(&self, values: &[f64]) -> Result<Plaintext, CryptoError> {
        self.encoder
            .encode(values, self.params.scale(), &self.params.moduli)
    }

    pub fn decode(&self, pt: &Plaintext) -> Vec<Complex64> {
        self.encoder.decode(pt)
    }

    /// Encrypt under `owner`'s public key → fresh ciphertext at the top level.
    pub fn encrypt<R: Rng>(
        &self,
        pt: &Plaintext,
        owner: &Identity,
        pk: &PublicKey,
        rng: &mut R,
    ) -> Result<Ciphertext, CryptoError> {
        let n = self.params.n();
        let moduli = &self.params.moduli;
        if pt.poly.moduli != *moduli {
            return Err(CryptoError::LevelMismatch {
                left: pt.poly.num_moduli().saturating_sub(1),
                right: self.params.max_level(),
            });
        }
        let v = RnsPoly::from_signed(&sample_ternary(n, rng), moduli);
        let e0 = RnsPoly::from_signed(&sample_gaussian(n, self.params.sigma, rng)?, moduli);
        let e1 = RnsPoly::from_signed(&sample_gaussian(n, self.params.sigma, rng)?, moduli);

        let c0 = &v * &pk.b + &e0 + &pt.poly;
        let c1 = &v * &pk.a + &e1;

        let mut parts = BTreeMap::new();
        parts.insert(owner.clone(), c1);
        Ok(Ciphertext {
            c0,
            parts,
            level: self.params.max_level(),
            scale: pt.scale,
        })
    }

    /// c₀ + Σ c_id·s_id. Every owner's secret must be present.
    pub fn decrypt(&self, ct: &Ciphertext, keys: &SecretKeySet) -> Result<Plaintext, CryptoError> {
        let moduli = &ct.c0.moduli;
        let mut acc = ct.c0.clone();
        for (id, part) in &ct.parts {
            let s = keys.get(id)?.to_poly(moduli);
            acc = acc + &(part * &s);
        }
        Ok(Plaintext {
            poly: acc,
            scale: ct.scale,
        })
    }
}
