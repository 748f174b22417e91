//! Multi-key CKKS ciphertext container.

use std::collections::BTreeMap;

use crate::keys::Identity;
use crate::polynomial::RnsPoly;

/// (c₀, {id → c_id}, level, scale), decrypting as c₀ + Σ c_id·s_id.
#[derive(Clone, Debug)]
pub struct Ciphertext {
    pub c0: RnsPoly,
    pub parts: BTreeMap<Identity, RnsPoly>,
    pub level: usize, // residues held = level + 1
    pub scale: f64,
}

impl Ciphertext {
    pub fn owners(&self) -> impl Iterator<Item = &Identity> {
        self.parts.keys()
    }

    /// Modulus dropping: forget q_{level+1}.. without touching the scale.
    pub fn drop_to_level(&self, level: usize) -> Self {
        assert!(level <= self.level, "cannot raise a ciphertext level");
        if level == self.level {
            return self.clone();
        }
        Self {
            c0: self.c0.truncate(level + 1),
            parts: self
                .parts
                .iter()
                .map(|(id, p)| (id.clone(), p.truncate(level + 1)))
                .collect(),
            level,
            scale: self.scale,
        }
    }
}
