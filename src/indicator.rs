//! One-hot (or all-zero) selector vectors for states and actions.

use crate::error::{PprlError, Result};

/// A 0/1 vector with at most one entry set.
#[derive(Clone, Debug, PartialEq)]
pub struct Indicator {
    values: Vec<f64>,
}

impl Indicator {
    pub fn one_hot(len: usize, index: usize) -> Result<Self> {
        if index >= len {
            return Err(PprlError::MalformedIndicator(format!(
                "index {index} out of range for length {len}"
            )));
        }
        let mut values = vec![0.0; len];
        values[index] = 1.0;
        Ok(Self { values })
    }

    pub fn zeros(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
        }
    }

    /// Validates a raw vector: entries in {0, 1}, at most one 1.
    pub fn from_values(values: Vec<f64>) -> Result<Self> {
        if let Some(v) = values.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(PprlError::MalformedIndicator(format!("entry {v} is not 0 or 1")));
        }
        let ones = values.iter().filter(|&&v| v == 1.0).count();
        if ones > 1 {
            return Err(PprlError::MalformedIndicator(format!("{ones} entries are set")));
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Position of the set entry, if any.
    pub fn active(&self) -> Option<usize> {
        self.values.iter().position(|&v| v == 1.0)
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.values.get(index) == Some(&1.0)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn dot(&self, other: &Indicator) -> Result<f64> {
        if self.len() != other.len() {
            return Err(PprlError::DimensionMismatch {
                expected: self.len(),
                found: other.len(),
            });
        }
        Ok(self.values.iter().zip(&other.values).map(|(a, b)| a * b).sum())
    }
}
