//! Per-agent plaintext Q-table (states × actions).

use itertools::Itertools;
use nalgebra::DMatrix;

use crate::environment::Action;
use crate::error::{PprlError, Result};
use crate::select::argmax;

#[derive(Clone, Debug, PartialEq)]
pub struct ValueTable {
    q: DMatrix<f64>,
}

impl ValueTable {
    pub fn new(states: usize, actions: usize, initial: f64) -> Self {
        Self {
            q: DMatrix::from_element(states, actions, initial),
        }
    }

    /// Build from decrypted rows; every row must have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let actions = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|r| r.len() != actions) {
            return Err(PprlError::DimensionMismatch {
                expected: actions,
                found: bad.len(),
            });
        }
        Ok(Self {
            q: DMatrix::from_fn(rows.len(), actions, |s, a| rows[s][a]),
        })
    }

    pub fn num_states(&self) -> usize {
        self.q.nrows()
    }

    pub fn num_actions(&self) -> usize {
        self.q.ncols()
    }

    pub fn get(&self, state: usize, action: usize) -> f64 {
        self.q[(state, action)]
    }

    pub fn set(&mut self, state: usize, action: usize, value: f64) {
        self.q[(state, action)] = value;
    }

    pub fn row(&self, state: usize) -> Vec<f64> {
        self.q.row(state).iter().copied().collect()
    }

    pub fn max_value(&self, state: usize) -> f64 {
        self.q.row(state).max()
    }

    /// First action with the highest value.
    pub fn greedy_action(&self, state: usize) -> usize {
        argmax(&self.row(state))
    }

    /// Q[s][a] ← (1 − α)·Q[s][a] + α·(r + γ·max Q[s']); returns the new value.
    pub fn bellman_update(
        &mut self,
        state: usize,
        action: usize,
        reward: f64,
        next_state: usize,
        alpha: f64,
        gamma: f64,
    ) -> f64 {
        let target = reward + gamma * self.max_value(next_state);
        let q_new = (1.0 - alpha) * self.get(state, action) + alpha * target;
        self.set(state, action, q_new);
        q_new
    }

    /// One line per state: `State [Y: y, X: x]: ↑: 0.00 ↓: ...`.
    pub fn render(&self, width: usize) -> String {
        (0..self.num_states())
            .map(|s| {
                let cells = self
                    .row(s)
                    .iter()
                    .enumerate()
                    .map(|(a, v)| {
                        let arrow = Action::from_index(a).map_or('?', Action::arrow);
                        format!("{arrow}: {v:.2}")
                    })
                    .join(" ");
                format!("State [Y: {}, X: {}]: {cells}", s / width, s % width)
            })
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bellman_update() {
        let mut t = ValueTable::new(9, 4, 0.0);
        t.set(8, 2, 10.0);
        let q = t.bellman_update(5, 1, 1000.0, 8, 0.1, 0.9);
        // 0.9·0 + 0.1·(1000 + 0.9·10)
        assert!((q - 100.9).abs() < 1e-12);
        assert_eq!(t.get(5, 1), q);
        assert_eq!(t.greedy_action(5), 1);
    }

    #[test]
    fn test_greedy_ties_take_first() {
        let t = ValueTable::from_rows(&[vec![1.0, 3.0, 3.0, 0.0], vec![0.0; 4]]).unwrap();
        assert_eq!(t.greedy_action(0), 1);
        assert_eq!(t.greedy_action(1), 0);
        assert_eq!(t.max_value(0), 3.0);
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let err = ValueTable::from_rows(&[vec![0.0; 4], vec![0.0; 3]]).unwrap_err();
        assert!(matches!(err, PprlError::DimensionMismatch { expected: 4, found: 3 }));
    }

    #[test]
    fn test_render() {
        let mut t = ValueTable::new(4, 4, 0.0);
        t.set(3, 3, 1.5);
        let text = t.render(2);
        assert_eq!(text.lines().count(), 4);
        assert_eq!(
            text.lines().last().unwrap(),
            "State [Y: 1, X: 1]: ↑: 0.00 ↓: 0.00 ←: 0.00 →: 1.50"
        );
    }
}
