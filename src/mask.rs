//! Encrypted indicator masks: per-state broadcasts and the action mask.

use rand::Rng;

use crate::engine::CryptoEngine;
use crate::error::Result;
use crate::indicator::Indicator;
use crate::keys::Identity;

pub struct MaskBuilder<'a, E> {
    engine: &'a E,
}

impl<'a, E: CryptoEngine> MaskBuilder<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /// One ciphertext per state: `fill` in every action slot where the
    /// state indicator is set, zero elsewhere.
    ///
    /// `fill = 1` gives the plain broadcast, `fill = Qnew` the value mask.
    pub fn state_broadcast<R: Rng>(
        &self,
        state: &Indicator,
        fill: f64,
        num_actions: usize,
        owner: &Identity,
        rng: &mut R,
    ) -> Result<Vec<E::Ciphertext>> {
        state
            .as_slice()
            .iter()
            .map(|&v| -> Result<E::Ciphertext> {
                let row = vec![fill * v; num_actions];
                Ok(self.engine.encrypt_values(&row, owner, rng)?)
            })
            .collect()
    }

    /// The action indicator encrypted as-is.
    pub fn action_mask<R: Rng>(
        &self,
        action: &Indicator,
        owner: &Identity,
        rng: &mut R,
    ) -> Result<E::Ciphertext> {
        Ok(self.engine.encrypt_values(action.as_slice(), owner, rng)?)
    }
}
