//! Homomorphic add / sub / multiply-and-relinearize over multi-key ciphertexts.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    ciphertext::Ciphertext,
    error::CryptoError,
    keys::{Identity, RelinKey, RelinKeySet},
    polynomial::RnsPoly,
    scheme::Ckks,
};

/// Relative tolerance when comparing scales of two operands.
const SCALE_TOLERANCE: f64 = 1e-9;

/// Holds the scheme & the pairwise relinearization keys.
pub struct CkksAlgebra<'a> {
    scheme: &'a Ckks,
    relin: &'a RelinKeySet,
}

impl<'a> CkksAlgebra<'a> {
    pub fn new(scheme: &'a Ckks, relin: &'a RelinKeySet) -> Self {
        Self { scheme, relin }
    }

    fn check_aligned(a: &Ciphertext, b: &Ciphertext) -> Result<(), CryptoError> {
        if a.level != b.level {
            return Err(CryptoError::LevelMismatch {
                left: a.level,
                right: b.level,
            });
        }
        if (a.scale - b.scale).abs() > SCALE_TOLERANCE * a.scale.max(b.scale) {
            return Err(CryptoError::ScaleMismatch {
                left: a.scale,
                right: b.scale,
            });
        }
        Ok(())
    }

    /// Component-wise combination over the union of owners.
    fn combine(
        a: &Ciphertext,
        b: &Ciphertext,
        op: impl Fn(&RnsPoly, &RnsPoly) -> RnsPoly,
    ) -> Result<Ciphertext, CryptoError> {
        Self::check_aligned(a, b)?;
        let zero = RnsPoly::zero(a.c0.n(), &a.c0.moduli);
        let owners: BTreeSet<&Identity> = a.owners().chain(b.owners()).collect();
        let parts = owners
            .into_iter()
            .map(|id| {
                let pa = a.parts.get(id).unwrap_or(&zero);
                let pb = b.parts.get(id).unwrap_or(&zero);
                (id.clone(), op(pa, pb))
            })
            .collect();
        Ok(Ciphertext {
            c0: op(&a.c0, &b.c0),
            parts,
            level: a.level,
            scale: a.scale,
        })
    }

    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, CryptoError> {
        Self::combine(a, b, |x, y| x + y)
    }

    pub fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, CryptoError> {
        Self::combine(a, b, |x, y| x - y)
    }

    /// Drop to `level` without rescaling.
    pub fn drop_level(&self, ct: &Ciphertext, level: usize) -> Result<Ciphertext, CryptoError> {
        if level > ct.level {
            return Err(CryptoError::LevelMismatch {
                left: ct.level,
                right: level,
            });
        }
        Ok(ct.drop_to_level(level))
    }

    /// Divide by the top prime: level - 1, scale / q_level.
    pub fn rescale(&self, ct: &Ciphertext) -> Result<Ciphertext, CryptoError> {
        if ct.level == 0 {
            return Err(CryptoError::LevelExhausted);
        }
        let q_top = ct.c0.moduli[ct.level];
        Ok(Ciphertext {
            c0: ct.c0.divide_round_by_last(),
            parts: ct
                .parts
                .iter()
                .map(|(id, p)| (id.clone(), p.divide_round_by_last()))
                .collect(),
            level: ct.level - 1,
            scale: ct.scale / q_top as f64,
        })
    }

    /// Tensor, relinearize every pair term with its pair key, rescale.
    ///
    /// Operands at different levels are aligned by dropping the higher one.
    pub fn mul_relin(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, CryptoError> {
        let level = a.level.min(b.level);
        if level == 0 {
            return Err(CryptoError::LevelExhausted);
        }
        let a = a.drop_to_level(level);
        let b = b.drop_to_level(level);
        let zero = RnsPoly::zero(a.c0.n(), &a.c0.moduli);
        let owners: Vec<Identity> = a
            .owners()
            .chain(b.owners())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();

        // e0 = c0·d0, e_i = c0·d_i + c_i·d0
        let mut c0 = &a.c0 * &b.c0;
        let mut parts: BTreeMap<Identity, RnsPoly> = owners
            .iter()
            .map(|id| {
                let ai = a.parts.get(id).unwrap_or(&zero);
                let bi = b.parts.get(id).unwrap_or(&zero);
                (id.clone(), &a.c0 * bi + &(ai * &b.c0))
            })
            .collect();

        // s_i·s_j terms, i ≤ j, switched back onto s_i
        for (x, id_i) in owners.iter().enumerate() {
            for id_j in &owners[x..] {
                let Some(d) = Self::pair_term(&a, &b, id_i, id_j) else {
                    continue;
                };
                let key = self.relin.get(id_i, id_j)?;
                let (u0, u1) = self.key_switch(&d, key);
                c0 = c0 + &u0;
                if let Some(p) = parts.get_mut(id_i) {
                    *p = &*p + &u1;
                }
            }
        }

        let tensor = Ciphertext {
            c0,
            parts,
            level,
            scale: a.scale * b.scale,
        };
        self.rescale(&tensor)
    }

    /// a_i·b_j + a_j·b_i (or a_i·b_i on the diagonal); `None` when every
    /// factor pair has a missing side.
    fn pair_term(a: &Ciphertext, b: &Ciphertext, i: &Identity, j: &Identity) -> Option<RnsPoly> {
        let cross = |x: &Identity, y: &Identity| match (a.parts.get(x), b.parts.get(y)) {
            (Some(p), Some(q)) => Some(p * q),
            _ => None,
        };
        if i == j {
            return cross(i, i);
        }
        match (cross(i, j), cross(j, i)) {
            (Some(p), Some(q)) => Some(p + q),
            (Some(p), None) | (None, Some(p)) => Some(p),
            (None, None) => None,
        }
    }

    /// Returns (u0, u1) with u0 + u1·s_i ≈ d·s_i·s_j.
    fn key_switch(&self, d: &RnsPoly, key: &RelinKey) -> (RnsPoly, RnsPoly) {
        let params = self.scheme.params();
        let level = d.num_moduli() - 1;
        let target = params.extended_moduli(level);
        let mut indices: Vec<usize> = (0..=level).collect();
        indices.push(params.max_level() + 1);

        let mut u0 = RnsPoly::zero(d.n(), &target);
        let mut u1 = RnsPoly::zero(d.n(), &target);
        for k in 0..=level {
            let digit = d.lift_residue(k, &target);
            u0 = u0 + &(&digit * &key.b[k].select(&indices));
            u1 = u1 + &(&digit * &key.a[k].select(&indices));
        }
        (u0.divide_round_by_last(), u1.divide_round_by_last())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SecretKeySet;
    use crate::params::CkksParameters;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Fixture {
        ckks: Ckks,
        secrets: SecretKeySet,
        publics: Vec<crate::keys::PublicKey>,
        relin: RelinKeySet,
        ids: Vec<Identity>,
        rng: StdRng,
    }

    fn fixture() -> Fixture {
        let ckks = Ckks::new(CkksParameters::toy().unwrap()).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let ids = vec![Identity::aggregator(), Identity::agent(0)];
        let mut secrets = SecretKeySet::default();
        let mut publics = Vec::new();
        let mut raw = Vec::new();
        for id in &ids {
            let (sk, pk) = ckks.generate_keypair(&mut rng).unwrap();
            secrets.insert(id.clone(), sk.clone()).unwrap();
            publics.push(pk);
            raw.push(sk);
        }
        let mut relin = RelinKeySet::default();
        for i in 0..ids.len() {
            for j in i..ids.len() {
                let key = ckks.generate_relin_key(&raw[i], &raw[j], &mut rng).unwrap();
                relin.insert(&ids[i], &ids[j], key);
            }
        }
        Fixture { ckks, secrets, publics, relin, ids, rng }
    }

    impl Fixture {
        fn enc(&mut self, values: &[f64], owner: usize) -> Ciphertext {
            let pt = self.ckks.encode(values).unwrap();
            self.ckks
                .encrypt(&pt, &self.ids[owner], &self.publics[owner], &mut self.rng)
                .unwrap()
        }

        fn dec(&self, ct: &Ciphertext) -> Vec<f64> {
            let pt = self.ckks.decrypt(ct, &self.secrets).unwrap();
            self.ckks.decode(&pt).iter().map(|z| z.re).collect()
        }
    }

    fn assert_close(got: &[f64], want: &[f64]) {
        for (g, w) in got.iter().zip(want) {
            assert!((g - w).abs() < 1e-4, "got {got:?}, want {want:?}");
        }
    }

    #[test]
    fn test_add_sub_across_owners() {
        let mut f = fixture();
        let a = f.enc(&[1.0, 2.0, 3.0, 4.0], 0);
        let b = f.enc(&[0.5, -2.0, 0.0, 10.0], 1);
        let alg = CkksAlgebra::new(&f.ckks, &f.relin);
        let sum = alg.add(&a, &b).unwrap();
        assert_eq!(sum.parts.len(), 2);
        assert_close(&f.dec(&sum), &[1.5, 0.0, 3.0, 14.0]);
        assert_close(&f.dec(&alg.sub(&a, &b).unwrap()), &[0.5, 4.0, 3.0, -6.0]);
    }

    #[test]
    fn test_multi_key_multiplication() {
        let mut f = fixture();
        let a = f.enc(&[3.0, 0.0, 1.0, -2.0], 0);
        let b = f.enc(&[1000.0, 7.0, 1.0, 0.5], 1);
        let alg = CkksAlgebra::new(&f.ckks, &f.relin);
        let prod = alg.mul_relin(&a, &b).unwrap();
        assert_eq!(prod.level, 1);
        assert_close(&f.dec(&prod), &[3000.0, 0.0, 1.0, -1.0]);
    }

    #[test]
    fn test_depth_two_and_exhaustion() {
        let mut f = fixture();
        let mask = f.enc(&[0.0, 1.0, 0.0, 0.0], 1);
        let action = f.enc(&[0.0, 1.0, 0.0, 0.0], 1);
        let row = f.enc(&[4.0, 5.0, 6.0, 7.0], 0);
        let alg = CkksAlgebra::new(&f.ckks, &f.relin);
        let selected = alg.mul_relin(&alg.mul_relin(&mask, &action).unwrap(), &row).unwrap();
        assert_eq!(selected.level, 0);
        assert_close(&f.dec(&selected), &[0.0, 5.0, 0.0, 0.0]);
        assert_eq!(
            alg.mul_relin(&selected, &row).unwrap_err(),
            CryptoError::LevelExhausted
        );
    }

    #[test]
    fn test_level_and_scale_checks() {
        let mut f = fixture();
        let a = f.enc(&[1.0], 0);
        let b = f.enc(&[1.0], 0);
        let alg = CkksAlgebra::new(&f.ckks, &f.relin);
        let prod = alg.mul_relin(&a, &b).unwrap();
        assert!(matches!(
            alg.add(&prod, &a),
            Err(CryptoError::LevelMismatch { left: 1, right: 2 })
        ));
        // Δ²/q_2 is within tolerance of Δ, a bare rescale of Δ is not
        let dropped = alg.drop_level(&a, 1).unwrap();
        assert!(alg.add(&prod, &dropped).is_ok());
        let shrunk = alg.rescale(&a).unwrap();
        assert!(matches!(alg.add(&shrunk, &dropped), Err(CryptoError::ScaleMismatch { .. })));
        assert!(alg.drop_level(&shrunk, 2).is_err());
    }

    #[test]
    fn test_missing_relin_key() {
        let mut f = fixture();
        let a = f.enc(&[1.0], 0);
        let b = f.enc(&[1.0], 1);
        let empty = RelinKeySet::default();
        let alg = CkksAlgebra::new(&f.ckks, &empty);
        assert!(matches!(
            alg.mul_relin(&a, &b),
            Err(CryptoError::MissingRelinKey(_, _))
        ));
    }
}
