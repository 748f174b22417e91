//! Word-sized modular arithmetic and prime search for the RNS modulus chain.

use num_integer::Integer;

/// (a · b) mod q through a u128 product.
#[inline]
pub fn mul_mod(a: u64, b: u64, q: u64) -> u64 {
    ((u128::from(a) * u128::from(b)) % u128::from(q)) as u64
}

#[inline]
pub fn add_mod(a: u64, b: u64, q: u64) -> u64 {
    let s = u128::from(a) + u128::from(b);
    (s % u128::from(q)) as u64
}

#[inline]
pub fn sub_mod(a: u64, b: u64, q: u64) -> u64 {
    if a >= b {
        a - b
    } else {
        q - (b - a)
    }
}

#[inline]
pub fn neg_mod(a: u64, q: u64) -> u64 {
    if a == 0 {
        0
    } else {
        q - a
    }
}

/// Square-and-multiply exponentiation.
pub fn pow_mod(base: u64, mut exp: u64, q: u64) -> u64 {
    let mut base = base % q;
    let mut result = 1 % q;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, q);
        }
        base = mul_mod(base, base, q);
        exp >>= 1;
    }
    result
}

/// Inverse modulo a prime `q` (Fermat). `None` when `a ≡ 0`.
pub fn inv_mod_prime(a: u64, q: u64) -> Option<u64> {
    if a % q == 0 {
        return None;
    }
    Some(pow_mod(a, q - 2, q))
}

/// Residue of a signed integer in `[0, q)`.
#[inline]
pub fn reduce_signed(x: i128, q: u64) -> u64 {
    x.rem_euclid(i128::from(q)) as u64
}

/// Centered lift of a residue into `(-q/2, q/2]`.
#[inline]
pub fn center(x: u64, q: u64) -> i128 {
    if x > q / 2 {
        i128::from(x) - i128::from(q)
    } else {
        i128::from(x)
    }
}

/// Deterministic Miller–Rabin for every u64.
pub fn is_prime(n: u64) -> bool {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    if n < 2 {
        return false;
    }
    for &p in &WITNESSES {
        if n == p {
            return true;
        }
        if n % p == 0 {
            return false;
        }
    }

    // n - 1 = d · 2^r with d odd
    let mut d = n - 1;
    let mut r = 0u32;
    while d.is_even() {
        d >>= 1;
        r += 1;
    }

    'witness: for &a in &WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..r {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Largest `count` primes strictly below `2^bits`, skipping anything in `exclude`.
///
/// Returns fewer than `count` entries only if the search runs out of odd
/// candidates, which callers treat as a parameter error.
pub fn primes_below(bits: u32, count: usize, exclude: &[u64]) -> Vec<u64> {
    let mut found = Vec::with_capacity(count);
    if bits < 2 || bits > 63 {
        return found;
    }
    let mut candidate = (1u64 << bits) - 1;
    while found.len() < count && candidate >= 3 {
        if is_prime(candidate) && !exclude.contains(&candidate) {
            found.push(candidate);
        }
        candidate -= 2;
    }
    found
}

/// True when every pair in `moduli` is coprime.
pub fn pairwise_coprime(moduli: &[u64]) -> bool {
    moduli
        .iter()
        .enumerate()
        .all(|(i, a)| moduli[i + 1..].iter().all(|b| a.gcd(b) == 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pow_and_inverse() {
        assert_eq!(pow_mod(2, 5, 13), 6);
        assert_eq!(pow_mod(3, 7, 11), 9);
        assert_eq!(inv_mod_prime(3, 11), Some(4));
        assert_eq!(inv_mod_prime(22, 11), None);
    }

    #[test]
    fn test_known_primes() {
        assert!(is_prime((1u64 << 61) - 1));
        assert!(is_prime((1u64 << 40) - 87));
        assert!(is_prime((1u64 << 62) - 57));
        assert!(!is_prime((1u64 << 40) - 1));
        assert!(!is_prime(561)); // Carmichael
    }

    #[test]
    fn test_primes_below() {
        assert_eq!(primes_below(40, 2, &[]), vec![(1 << 40) - 87, (1 << 40) - 167]);
        assert_eq!(primes_below(61, 1, &[]), vec![(1 << 61) - 1]);
        let skipped = primes_below(40, 1, &[(1 << 40) - 87]);
        assert_eq!(skipped, vec![(1 << 40) - 167]);
    }

    #[test]
    fn test_center_and_reduce() {
        let q = 17;
        assert_eq!(reduce_signed(-1, q), 16);
        assert_eq!(center(16, q), -1);
        assert_eq!(center(8, q), 8);
        assert_eq!(center(9, q), -8);
        assert_eq!(sub_mod(3, 5, q), 15);
        assert_eq!(neg_mod(0, q), 0);
    }

    #[test]
    fn test_pairwise_coprime() {
        assert!(pairwise_coprime(&[7, 11, 13]));
        assert!(!pairwise_coprime(&[6, 9, 11]));
    }
}
