//! Masked select-and-write: table[s][a] ← Qnew without revealing (s, a).

use rand::Rng;
use tracing::debug;

use crate::engine::CryptoEngine;
use crate::error::{PprlError, Result};
use crate::indicator::Indicator;
use crate::keys::Identity;
use crate::mask::MaskBuilder;
use crate::table::EncryptedTable;

/// One agent step's write request; consumed exactly once.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateTuple {
    pub agent: usize,
    pub owner: Identity,
    pub state: Indicator,
    pub action: Indicator,
    pub q_new: f64,
}

/// Homomorphic operation counts for one applied update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub multiplications: usize,
    pub refreshes: usize,
    pub additions: usize,
}

pub struct SecureUpdateProtocol<'a, E> {
    engine: &'a E,
}

impl<'a, E: CryptoEngine> SecureUpdateProtocol<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /// Apply `tuple` to every row: only the row selected by the state
    /// indicator changes, the others receive an encrypted zero.
    ///
    /// Per row i:
    ///   new_i = mask_new_i · action
    ///   old_i = (mask_old_i · action) · table_i
    ///   table_i ← table_i + refresh(new_i) − refresh(old_i)
    ///
    /// Refreshed deltas are re-encrypted under the tuple's owner.
    pub fn apply<R: Rng>(
        &self,
        table: &mut EncryptedTable<E::Ciphertext>,
        tuple: &UpdateTuple,
        rng: &mut R,
    ) -> Result<UpdateStats> {
        let num_states = table.num_states();
        let num_actions = table.num_actions();
        if tuple.state.len() != num_states {
            return Err(PprlError::DimensionMismatch {
                expected: num_states,
                found: tuple.state.len(),
            });
        }
        if tuple.action.len() != num_actions {
            return Err(PprlError::DimensionMismatch {
                expected: num_actions,
                found: tuple.action.len(),
            });
        }

        let masks = MaskBuilder::new(self.engine);
        let owner = &tuple.owner;
        let mask_new = masks.state_broadcast(&tuple.state, tuple.q_new, num_actions, owner, rng)?;
        let mask_old = masks.state_broadcast(&tuple.state, 1.0, num_actions, owner, rng)?;
        let action = masks.action_mask(&tuple.action, owner, rng)?;

        let mut stats = UpdateStats::default();
        for (i, (new_i, old_i)) in mask_new.iter().zip(&mask_old).enumerate() {
            let delta_new = self.engine.mul_relin(new_i, &action)?;
            let selector = self.engine.mul_relin(old_i, &action)?;
            let delta_old = self.engine.mul_relin(&selector, &table.rows()[i])?;
            stats.multiplications += 3;

            let delta_new = self.engine.refresh(&delta_new, owner, rng)?;
            let delta_old = self.engine.refresh(&delta_old, owner, rng)?;
            stats.refreshes += 2;

            let row = table.row_mut(i);
            let updated = self.engine.add(row, &delta_new)?;
            *row = self.engine.sub(&updated, &delta_old)?;
            stats.additions += 2;
        }

        debug!(
            agent = tuple.agent,
            rows = num_states,
            multiplications = stats.multiplications,
            refreshes = stats.refreshes,
            "secure update applied"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CryptoContext;
    use crate::params::CkksParameters;
    use crate::select::DEFAULT_PLACES;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // one truncated digit plus decryption noise
    const TOLERANCE: f64 = 2e-5;

    fn setup(seed: u64) -> (CryptoContext, Identity, Identity, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        let cloud = Identity::aggregator();
        let user = Identity::agent(0);
        let ctx = CryptoContext::setup(CkksParameters::toy().unwrap(), &[cloud.clone(), user.clone()], &mut rng)
            .unwrap();
        (ctx, cloud, user, rng)
    }

    fn tuple(owner: &Identity, states: usize, s: usize, a: usize, q_new: f64) -> UpdateTuple {
        UpdateTuple {
            agent: 0,
            owner: owner.clone(),
            state: Indicator::one_hot(states, s).unwrap(),
            action: Indicator::one_hot(4, a).unwrap(),
            q_new,
        }
    }

    #[test]
    fn test_single_write_hits_one_cell() {
        let (ctx, cloud, user, mut rng) = setup(31);
        let mut table = EncryptedTable::filled(&ctx, 9, 4, 0.0, &cloud, &mut rng).unwrap();
        let stats = SecureUpdateProtocol::new(&ctx)
            .apply(&mut table, &tuple(&user, 9, 4, 2, 5.0), &mut rng)
            .unwrap();
        assert_eq!(stats.multiplications, 27);
        assert_eq!(stats.refreshes, 18);

        let plain = table.decrypt(&ctx, DEFAULT_PLACES).unwrap();
        for s in 0..9 {
            for a in 0..4 {
                let want = if (s, a) == (4, 2) { 5.0 } else { 0.0 };
                assert!((plain.get(s, a) - want).abs() < TOLERANCE, "cell ({s}, {a})");
            }
        }
    }

    #[test]
    fn test_overwrite_replaces_old_value() {
        let (ctx, cloud, user, mut rng) = setup(32);
        let mut table = EncryptedTable::filled(&ctx, 3, 4, 1.0, &cloud, &mut rng).unwrap();
        let protocol = SecureUpdateProtocol::new(&ctx);
        protocol.apply(&mut table, &tuple(&user, 3, 1, 3, 100.9), &mut rng).unwrap();
        protocol.apply(&mut table, &tuple(&user, 3, 1, 3, -0.25), &mut rng).unwrap();
        let plain = table.decrypt(&ctx, DEFAULT_PLACES).unwrap();
        assert!((plain.get(1, 3) + 0.25).abs() < TOLERANCE);
        assert!((plain.get(1, 2) - 1.0).abs() < TOLERANCE);
        assert!((plain.get(0, 3) - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_other_rows_untouched() {
        let (ctx, cloud, user, mut rng) = setup(33);
        let mut table = EncryptedTable::filled(&ctx, 4, 4, 0.0, &cloud, &mut rng).unwrap();
        let protocol = SecureUpdateProtocol::new(&ctx);
        protocol.apply(&mut table, &tuple(&user, 4, 2, 1, 3.5), &mut rng).unwrap();
        let before = table.decrypt(&ctx, DEFAULT_PLACES).unwrap();
        protocol.apply(&mut table, &tuple(&user, 4, 0, 1, 9.0), &mut rng).unwrap();
        let after = table.decrypt(&ctx, DEFAULT_PLACES).unwrap();
        for (b, a) in before.row(2).iter().zip(after.row(2)) {
            assert!((b - a).abs() < TOLERANCE, "{:?} vs {:?}", before.row(2), after.row(2));
        }
        assert!((after.get(2, 1) - 3.5).abs() < TOLERANCE);
        assert!((after.get(0, 1) - 9.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_dimension_checks() {
        let (ctx, cloud, user, mut rng) = setup(34);
        let mut table = EncryptedTable::filled(&ctx, 4, 4, 0.0, &cloud, &mut rng).unwrap();
        let protocol = SecureUpdateProtocol::new(&ctx);
        assert!(matches!(
            protocol.apply(&mut table, &tuple(&user, 5, 0, 0, 1.0), &mut rng),
            Err(PprlError::DimensionMismatch { expected: 4, found: 5 })
        ));
    }
}
