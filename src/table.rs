//! The shared encrypted Q-table: one ciphertext per state, actions in slots.

use std::sync::Arc;

use rand::Rng;

use crate::engine::CryptoEngine;
use crate::error::{PprlError, Result};
use crate::keys::Identity;
use crate::select::truncate;
use crate::value_table::ValueTable;

/// Owned by the orchestrator and mutated only between rounds.
#[derive(Clone, Debug)]
pub struct EncryptedTable<C> {
    rows: Vec<C>,
    num_actions: usize,
    owner: Identity,
}

/// Read-only copy of the rows handed to workers during a round.
#[derive(Clone, Debug)]
pub struct TableSnapshot<C> {
    rows: Arc<Vec<C>>,
    num_actions: usize,
}

impl<C: Clone> EncryptedTable<C> {
    /// Encrypt every row of `plain` under `owner`.
    pub fn encrypt<E, R>(engine: &E, plain: &ValueTable, owner: &Identity, rng: &mut R) -> Result<Self>
    where
        E: CryptoEngine<Ciphertext = C>,
        R: Rng,
    {
        let num_actions = plain.num_actions();
        if num_actions > engine.slots() {
            return Err(PprlError::DimensionMismatch {
                expected: engine.slots(),
                found: num_actions,
            });
        }
        let rows = (0..plain.num_states())
            .map(|s| engine.encrypt_values(&plain.row(s), owner, rng))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            rows,
            num_actions,
            owner: owner.clone(),
        })
    }

    /// Table filled with `initial` under `owner` (the aggregator).
    pub fn filled<E, R>(
        engine: &E,
        states: usize,
        actions: usize,
        initial: f64,
        owner: &Identity,
        rng: &mut R,
    ) -> Result<Self>
    where
        E: CryptoEngine<Ciphertext = C>,
        R: Rng,
    {
        Self::encrypt(engine, &ValueTable::new(states, actions, initial), owner, rng)
    }

    pub fn num_states(&self) -> usize {
        self.rows.len()
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    pub fn rows(&self) -> &[C] {
        &self.rows
    }

    pub(crate) fn row_mut(&mut self, state: usize) -> &mut C {
        &mut self.rows[state]
    }

    pub fn snapshot(&self) -> TableSnapshot<C> {
        TableSnapshot {
            rows: Arc::new(self.rows.clone()),
            num_actions: self.num_actions,
        }
    }

    /// Decrypt every row (real parts, truncated at `places`).
    pub fn decrypt<E>(&self, engine: &E, places: u32) -> Result<ValueTable>
    where
        E: CryptoEngine<Ciphertext = C>,
    {
        decrypt_rows(engine, &self.rows, self.num_actions, Some(places))
    }
}

impl<C> TableSnapshot<C> {
    pub fn rows(&self) -> &[C] {
        &self.rows
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn decrypt<E>(&self, engine: &E, places: u32) -> Result<ValueTable>
    where
        E: CryptoEngine<Ciphertext = C>,
    {
        decrypt_rows(engine, &self.rows, self.num_actions, Some(places))
    }

    /// Real parts as decrypted, no truncation. Agents learn from these.
    pub fn decrypt_raw<E>(&self, engine: &E) -> Result<ValueTable>
    where
        E: CryptoEngine<Ciphertext = C>,
    {
        decrypt_rows(engine, &self.rows, self.num_actions, None)
    }
}

fn decrypt_rows<E: CryptoEngine>(
    engine: &E,
    rows: &[E::Ciphertext],
    num_actions: usize,
    places: Option<u32>,
) -> Result<ValueTable> {
    let plain = rows
        .iter()
        .map(|ct| -> Result<Vec<f64>> {
            let slots = engine.decrypt_values(ct)?;
            Ok(slots[..num_actions]
                .iter()
                .map(|z| places.map_or(z.re, |p| truncate(z.re, p)))
                .collect())
        })
        .collect::<Result<Vec<_>>>()?;
    ValueTable::from_rows(&plain)
}
