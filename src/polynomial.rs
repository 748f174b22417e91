//! Polynomials in Z[X]/(X^N + 1) in RNS form (one u64 residue vector per prime).

use std::ops::{Add, Mul, Neg, Sub};

use crate::modular::{add_mod, center, inv_mod_prime, mul_mod, neg_mod, reduce_signed, sub_mod};

/// f(X) = Σ c_k X^k, stored as `residues[t][k] = c_k mod moduli[t]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RnsPoly {
    pub residues: Vec<Vec<u64>>,
    pub moduli: Vec<u64>,
}

impl RnsPoly {
    pub fn zero(n: usize, moduli: &[u64]) -> Self {
        assert!(n > 0, "ring degree must be positive");
        Self {
            residues: vec![vec![0; n]; moduli.len()],
            moduli: moduli.to_vec(),
        }
    }

    /// Reduce small signed coefficients into every modulus.
    pub fn from_signed(coeffs: &[i128], moduli: &[u64]) -> Self {
        let residues = moduli
            .iter()
            .map(|&q| coeffs.iter().map(|&c| reduce_signed(c, q)).collect())
            .collect();
        Self {
            residues,
            moduli: moduli.to_vec(),
        }
    }

    /// Ring degree N.
    pub fn n(&self) -> usize {
        self.residues.first().map_or(0, Vec::len)
    }

    pub fn num_moduli(&self) -> usize {
        self.moduli.len()
    }

    /// Coefficients of residue `idx`, lifted into (-q/2, q/2].
    pub fn centered_coeffs(&self, idx: usize) -> Vec<i128> {
        let q = self.moduli[idx];
        self.residues[idx].iter().map(|&c| center(c, q)).collect()
    }

    /// Multiply residue `t` by `scalars[t]`.
    pub fn mul_scalars(&self, scalars: &[u64]) -> Self {
        assert_eq!(scalars.len(), self.moduli.len(), "one scalar per modulus");
        let residues = self
            .residues
            .iter()
            .zip(&self.moduli)
            .zip(scalars)
            .map(|((r, &q), &s)| r.iter().map(|&c| mul_mod(c, s % q, q)).collect())
            .collect();
        Self {
            residues,
            moduli: self.moduli.clone(),
        }
    }

    /// Keep only the residues at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            residues: indices.iter().map(|&i| self.residues[i].clone()).collect(),
            moduli: indices.iter().map(|&i| self.moduli[i]).collect(),
        }
    }

    /// Drop trailing residues so that `count` remain.
    pub fn truncate(&self, count: usize) -> Self {
        assert!(count > 0 && count <= self.moduli.len(), "invalid residue count");
        Self {
            residues: self.residues[..count].to_vec(),
            moduli: self.moduli[..count].to_vec(),
        }
    }

    /// Centered residue `idx` re-expressed modulo each of `target`.
    pub fn lift_residue(&self, idx: usize, target: &[u64]) -> Self {
        Self::from_signed(&self.centered_coeffs(idx), target)
    }

    /// Round(f / q_last), dropping the last modulus.
    ///
    /// Rescaling and the key-switch mod-down are both this operation.
    pub fn divide_round_by_last(&self) -> Self {
        assert!(self.moduli.len() > 1, "cannot drop the only modulus");
        let last = self.moduli.len() - 1;
        let q_last = self.moduli[last];
        let remainder = self.centered_coeffs(last);

        let residues = self.residues[..last]
            .iter()
            .zip(&self.moduli[..last])
            .map(|(r, &q)| {
                let inv = inv_mod_prime(q_last % q, q).expect("moduli are pairwise coprime");
                r.iter()
                    .zip(&remainder)
                    .map(|(&x, &rem)| mul_mod(sub_mod(x, reduce_signed(rem, q), q), inv, q))
                    .collect()
            })
            .collect();
        Self {
            residues,
            moduli: self.moduli[..last].to_vec(),
        }
    }

    fn assert_compatible(&self, rhs: &Self) {
        assert_eq!(self.moduli, rhs.moduli, "moduli must match");
        assert_eq!(self.n(), rhs.n(), "ring degrees must match");
    }

    fn zip_with(&self, rhs: &Self, f: impl Fn(u64, u64, u64) -> u64) -> Self {
        self.assert_compatible(rhs);
        let residues = self
            .residues
            .iter()
            .zip(&rhs.residues)
            .zip(&self.moduli)
            .map(|((a, b), &q)| a.iter().zip(b).map(|(&x, &y)| f(x, y, q)).collect())
            .collect();
        Self {
            residues,
            moduli: self.moduli.clone(),
        }
    }
}

impl Add for &RnsPoly {
    type Output = RnsPoly;
    fn add(self, rhs: Self) -> RnsPoly {
        self.zip_with(rhs, add_mod)
    }
}

impl Add for RnsPoly {
    type Output = RnsPoly;
    fn add(self, rhs: Self) -> RnsPoly {
        &self + &rhs
    }
}

impl Add<&RnsPoly> for RnsPoly {
    type Output = RnsPoly;
    fn add(self, rhs: &RnsPoly) -> RnsPoly {
        &self + rhs
    }
}

impl Sub for &RnsPoly {
    type Output = RnsPoly;
    fn sub(self, rhs: Self) -> RnsPoly {
        self.zip_with(rhs, sub_mod)
    }
}

impl Sub for RnsPoly {
    type Output = RnsPoly;
    fn sub(self, rhs: Self) -> RnsPoly {
        &self - &rhs
    }
}

impl Sub<&RnsPoly> for RnsPoly {
    type Output = RnsPoly;
    fn sub(self, rhs: &RnsPoly) -> RnsPoly {
        &self - rhs
    }
}

impl Neg for &RnsPoly {
    type Output = RnsPoly;
    fn neg(self) -> RnsPoly {
        let residues = self
            .residues
            .iter()
            .zip(&self.moduli)
            .map(|(r, &q)| r.iter().map(|&c| neg_mod(c, q)).collect())
            .collect();
        RnsPoly {
            residues,
            moduli: self.moduli.clone(),
        }
    }
}

impl Neg for RnsPoly {
    type Output = RnsPoly;
    fn neg(self) -> RnsPoly {
        -&self
    }
}

impl<'a, 'b> Mul<&'b RnsPoly> for &'a RnsPoly {
    type Output = RnsPoly;

    /// Schoolbook negacyclic product: X^N wraps to -1.
    fn mul(self, rhs: &'b RnsPoly) -> RnsPoly {
        self.assert_compatible(rhs);
        let n = self.n();
        let residues = self
            .residues
            .iter()
            .zip(&rhs.residues)
            .zip(&self.moduli)
            .map(|((a, b), &q)| {
                let mut prod = vec![0u64; n];
                for (i, &ai) in a.iter().enumerate() {
                    if ai == 0 {
                        continue;
                    }
                    for (j, &bj) in b.iter().enumerate() {
                        let t = mul_mod(ai, bj, q);
                        let k = i + j;
                        if k < n {
                            prod[k] = add_mod(prod[k], t, q);
                        } else {
                            prod[k - n] = sub_mod(prod[k - n], t, q);
                        }
                    }
                }
                prod
            })
            .collect();
        RnsPoly {
            residues,
            moduli: self.moduli.clone(),
        }
    }
}

impl<'a> Mul<&'a RnsPoly> for RnsPoly {
    type Output = RnsPoly;
    fn mul(self, rhs: &'a RnsPoly) -> RnsPoly {
        (&self).mul(rhs)
    }
}

impl Mul for RnsPoly {
    type Output = RnsPoly;
    fn mul(self, rhs: RnsPoly) -> RnsPoly {
        &self * &rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULI: [u64; 2] = [97, 101];

    #[test]
    fn test_negacyclic_wrap() {
        // X^3 · X = X^4 = -1 in Z[X]/(X^4 + 1)
        let a = RnsPoly::from_signed(&[0, 0, 0, 1], &MODULI);
        let b = RnsPoly::from_signed(&[0, 1, 0, 0], &MODULI);
        let c = &a * &b;
        assert_eq!(c.centered_coeffs(0), vec![-1, 0, 0, 0]);
        assert_eq!(c.centered_coeffs(1), vec![-1, 0, 0, 0]);
    }

    #[test]
    fn test_add_sub_neg() {
        let a = RnsPoly::from_signed(&[5, -3, 0, 7], &MODULI);
        let b = RnsPoly::from_signed(&[-2, 4, 1, 0], &MODULI);
        assert_eq!((&a + &b).centered_coeffs(1), vec![3, 1, 1, 7]);
        assert_eq!((&a - &b).centered_coeffs(0), vec![7, -7, -1, 7]);
        assert_eq!((-&a + &a), RnsPoly::zero(4, &MODULI));
    }

    #[test]
    fn test_product_matches_signed_convolution() {
        let a = RnsPoly::from_signed(&[1, 2, 0, -1], &MODULI);
        let b = RnsPoly::from_signed(&[3, 0, -1, 2], &MODULI);
        // (1 + 2X - X^3)(3 - X^2 + 2X^3) reduced by X^4 = -1
        assert_eq!((&a * &b).centered_coeffs(0), vec![-1, 5, 1, -3]);
    }

    #[test]
    fn test_divide_round_by_last() {
        let moduli = [97, 101, 103];
        // 103 · 5 + 40 rounds to 5, 103 · (-2) - 60 rounds to -3
        let a = RnsPoly::from_signed(&[103 * 5 + 40, -206 - 60, 51, 0], &moduli);
        let d = a.divide_round_by_last();
        assert_eq!(d.moduli, vec![97, 101]);
        assert_eq!(d.centered_coeffs(0), vec![5, -3, 0, 0]);
        assert_eq!(d.centered_coeffs(1), vec![5, -3, 0, 0]);
    }

    #[test]
    fn test_select_and_lift() {
        let a = RnsPoly::from_signed(&[-4, 9, 0, 1], &[97, 101, 103]);
        let s = a.select(&[0, 2]);
        assert_eq!(s.moduli, vec![97, 103]);
        let lifted = a.lift_residue(1, &[1009, 1013]);
        assert_eq!(lifted.centered_coeffs(1), vec![-4, 9, 0, 1]);
        assert_eq!(a.truncate(1).moduli, vec![97]);
    }

    #[test]
    fn test_mul_scalars() {
        let a = RnsPoly::from_signed(&[1, -1, 2, 0], &MODULI);
        let g = a.mul_scalars(&[0, 3]);
        assert_eq!(g.centered_coeffs(0), vec![0, 0, 0, 0]);
        assert_eq!(g.centered_coeffs(1), vec![3, -3, 6, 0]);
    }
}
