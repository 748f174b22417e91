//! Oblivious row read and the client-side post-processing of its result.

use num_complex::Complex64;
use rand::Rng;

use crate::engine::CryptoEngine;
use crate::error::{PprlError, Result};
use crate::indicator::Indicator;
use crate::keys::Identity;
use crate::mask::MaskBuilder;

/// Decimal places kept after decryption.
pub const DEFAULT_PLACES: u32 = 5;

/// Largest `places` for which `10^places` scaling stays exact enough in f64.
pub const MAX_PLACES: u32 = 15;

/// Relative rounding error of `x * 10^places`. Only this much is snapped
/// back onto the grid; anything further off is cut.
const GRID_ULPS: f64 = 4.0 * f64::EPSILON;

/// Cut `x` toward zero at `places` decimals; magnitudes below 10^-places
/// become exactly 0.
///
/// A scaled value within float rounding of a grid point is taken as that
/// point, so `truncate(truncate(x)) == truncate(x)`. Anything below the
/// grid by more than that loses the digit: `truncate(1.2345699995, 5)` is
/// `1.23456`.
pub fn truncate(x: f64, places: u32) -> f64 {
    let shift = 10f64.powi(places as i32);
    if x.abs() < 1.0 / shift {
        return 0.0;
    }
    let scaled = x * shift;
    let nearest = scaled.round();
    if (scaled - nearest).abs() <= scaled.abs() * GRID_ULPS {
        nearest / shift
    } else {
        scaled.trunc() / shift
    }
}

pub fn truncate_complex(z: Complex64, places: u32) -> Complex64 {
    Complex64::new(truncate(z.re, places), truncate(z.im, places))
}

/// Index of the first maximum (0 for an empty slice).
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Σ_i broadcast_i · row_i: only the selected state's term survives.
pub struct SecureSelectProtocol<'a, E> {
    engine: &'a E,
    places: u32,
}

impl<'a, E: CryptoEngine> SecureSelectProtocol<'a, E> {
    pub fn new(engine: &'a E, places: u32) -> Self {
        Self { engine, places }
    }

    /// Encrypted copy of the row picked by `state`.
    pub fn select_row<R: Rng>(
        &self,
        rows: &[E::Ciphertext],
        state: &Indicator,
        num_actions: usize,
        owner: &Identity,
        rng: &mut R,
    ) -> Result<E::Ciphertext> {
        if state.len() != rows.len() || rows.is_empty() {
            return Err(PprlError::DimensionMismatch {
                expected: rows.len(),
                found: state.len(),
            });
        }
        let broadcast = MaskBuilder::new(self.engine).state_broadcast(state, 1.0, num_actions, owner, rng)?;
        let mut terms = broadcast.iter().zip(rows);
        let (b0, r0) = terms.next().ok_or(PprlError::DimensionMismatch {
            expected: 1,
            found: 0,
        })?;
        let mut acc = self.engine.mul_relin(b0, r0)?;
        for (b, r) in terms {
            let term = self.engine.mul_relin(b, r)?;
            acc = self.engine.add(&acc, &term)?;
        }
        Ok(acc)
    }

    /// Select, decrypt, truncate; the real parts of the first `num_actions` slots.
    pub fn read_row<R: Rng>(
        &self,
        rows: &[E::Ciphertext],
        state: &Indicator,
        num_actions: usize,
        owner: &Identity,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        let ct = self.select_row(rows, state, num_actions, owner, rng)?;
        let slots = self.engine.decrypt_values(&ct)?;
        Ok(slots
            .iter()
            .take(num_actions)
            .map(|&z| truncate_complex(z, self.places).re)
            .collect())
    }

    /// Greedy action for `state`; ties go to the lowest index.
    pub fn greedy_action<R: Rng>(
        &self,
        rows: &[E::Ciphertext],
        state: &Indicator,
        num_actions: usize,
        owner: &Identity,
        rng: &mut R,
    ) -> Result<usize> {
        Ok(argmax(&self.read_row(rows, state, num_actions, owner, rng)?))
    }
}
