//! Polynomial type over Z/qZ with u128 coefficients.

use std::ops::{Add, Mul, Neg, Rem, Sub};

use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// f(x) = coeffs[0] + coeffs[1]·x + ...  (always mod `modulus`)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Polynomial {
    pub coeffs: Vec<u128>,
    pub modulus: u128,
}

/// `a * b mod m` for operands below 2^63.
#[inline]
pub(crate) fn mul_mod(a: u128, b: u128, m: u128) -> u128 {
    (a % m) * (b % m) % m
}

impl Polynomial {
    pub fn new(coeffs: Vec<u128>, modulus: u128) -> Self {
        assert!(modulus > 1, "modulus must be at least 2");
        let coeffs = coeffs.into_iter().map(|c| c % modulus).collect();
        let mut p = Self { coeffs, modulus };
        p.trim();
        p
    }

    pub fn zero(modulus: u128) -> Self {
        Self {
            coeffs: vec![0],
            modulus,
        }
    }

    pub fn constant(value: u128, modulus: u128) -> Self {
        Self {
            coeffs: vec![value % modulus],
            modulus,
        }
    }

    /// Uniform polynomial of degree below `dim`.
    pub fn random<R: Rng>(modulus: u128, dim: usize, rng: &mut R) -> Self {
        let coeff = Uniform::new(0, modulus);
        Self::new(coeff.sample_iter(rng).take(dim).collect(), modulus)
    }

    /// Uniform polynomial of degree below `dim` whose value at 1 is `value`.
    ///
    /// Degree `shift_at` carries the correction, so the constraint does not
    /// always land on the constant term.
    pub fn random_with_value<R: Rng>(value: u128, modulus: u128, dim: usize, rng: &mut R) -> Self {
        let mut p = Self::random(modulus, dim, rng);
        p.coeffs.resize(dim, 0);
        let shift_at = rng.gen_range(0..dim);
        let others = p.eval_at_one() + modulus - p.coeffs[shift_at];
        p.coeffs[shift_at] = (value % modulus + modulus - others % modulus) % modulus;
        p.trim();
        p
    }

    /// Evaluate at x = 1, i.e. the channel's reading of the polynomial.
    pub fn eval_at_one(&self) -> u128 {
        self.coeffs.iter().fold(0, |acc, &c| (acc + c) % self.modulus)
    }

    /// Highest index with a non-zero coefficient (0 for constants).
    pub fn degree(&self) -> usize {
        self.coeffs.iter().rposition(|&c| c != 0).unwrap_or(0)
    }

    /// Multiply every coefficient by `k`.
    pub fn scale(&self, k: u128) -> Self {
        let coeffs = self
            .coeffs
            .iter()
            .map(|&c| mul_mod(c, k, self.modulus))
            .collect();
        Self::new(coeffs, self.modulus)
    }

    fn trim(&mut self) {
        while self.coeffs.len() > 1 && self.coeffs.last() == Some(&0) {
            self.coeffs.pop();
        }
        if self.coeffs.is_empty() {
            self.coeffs.push(0);
        }
    }
}

impl Add for &Polynomial {
    type Output = Polynomial;
    fn add(self, rhs: Self) -> Polynomial {
        assert_eq!(self.modulus, rhs.modulus, "moduli must match");
        let len = self.coeffs.len().max(rhs.coeffs.len());
        let coeffs = (0..len)
            .map(|i| {
                let a = self.coeffs.get(i).copied().unwrap_or(0);
                let b = rhs.coeffs.get(i).copied().unwrap_or(0);
                (a + b) % self.modulus
            })
            .collect();
        Polynomial::new(coeffs, self.modulus)
    }
}

impl Add<&Polynomial> for Polynomial {
    type Output = Polynomial;
    fn add(self, rhs: &Polynomial) -> Polynomial {
        &self + rhs
    }
}

impl Sub for &Polynomial {
    type Output = Polynomial;
    fn sub(self, rhs: Self) -> Polynomial {
        assert_eq!(self.modulus, rhs.modulus, "moduli must match");
        let m = self.modulus;
        let len = self.coeffs.len().max(rhs.coeffs.len());
        let coeffs = (0..len)
            .map(|i| {
                let a = self.coeffs.get(i).copied().unwrap_or(0);
                let b = rhs.coeffs.get(i).copied().unwrap_or(0);
                (m + a - b) % m
            })
            .collect();
        Polynomial::new(coeffs, m)
    }
}

impl Neg for &Polynomial {
    type Output = Polynomial;
    fn neg(self) -> Polynomial {
        let m = self.modulus;
        Polynomial::new(self.coeffs.iter().map(|&c| (m - c) % m).collect(), m)
    }
}

impl Mul for &Polynomial {
    type Output = Polynomial;

    /// Schoolbook product; the channel dimension is tiny.
    fn mul(self, rhs: Self) -> Polynomial {
        assert_eq!(self.modulus, rhs.modulus, "moduli must match");
        let m = self.modulus;
        let mut prod = vec![0u128; self.coeffs.len() + rhs.coeffs.len() - 1];
        for (i, &a) in self.coeffs.iter().enumerate() {
            if a == 0 {
                continue;
            }
            for (j, &b) in rhs.coeffs.iter().enumerate() {
                prod[i + j] = (prod[i + j] + a * b) % m;
            }
        }
        Polynomial::new(prod, m)
    }
}

/// Reduction modulo a monic polynomial.
impl Rem for &Polynomial {
    type Output = Polynomial;
    fn rem(self, u: Self) -> Polynomial {
        assert_eq!(self.modulus, u.modulus, "moduli must match");
        let deg_u = u.degree();
        assert_eq!(u.coeffs[deg_u], 1, "reduction polynomial must be monic");
        let m = self.modulus;
        let mut r = self.coeffs.clone();
        if deg_u == 0 {
            return Polynomial::zero(m);
        }
        for top in (deg_u..r.len()).rev() {
            let lead = r[top];
            if lead == 0 {
                continue;
            }
            let base = top - deg_u;
            for (i, &uc) in u.coeffs[..=deg_u].iter().enumerate() {
                r[base + i] = (r[base + i] + m - mul_mod(lead, uc, m)) % m;
            }
        }
        r.truncate(deg_u);
        Polynomial::new(r, m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn test_basic_ops() {
        let m = 16;
        let p1 = Polynomial::new(vec![1, 2, 3], m);
        let p2 = Polynomial::new(vec![4, 5, 6], m);

        assert_eq!((&p1 + &p2).coeffs, vec![5, 7, 9]);
        assert_eq!((&p1 - &p2).coeffs, vec![13, 13, 13]);
        assert_eq!((&p1 * &p2).coeffs, vec![4, 13, 12, 11, 2]);
        assert_eq!((-&p1).coeffs, vec![15, 14, 13]);
        assert_eq!(p1.eval_at_one(), 6);
        assert_eq!(p1.scale(3).coeffs, vec![3, 6, 9]);
    }

    #[test]
    fn test_rem_keeps_value_at_one() {
        let m = 17;
        let u = Polynomial::new(vec![16, 0, 1], m); // x^2 - 1
        let f = Polynomial::new(vec![3, 5, 7, 2, 9], m);
        let r = &f % &u;
        assert!(r.coeffs.len() <= 2);
        assert_eq!(r.eval_at_one(), f.eval_at_one());
        // x^2 ≡ 1 mod (x^2 - 1): 3 + 5x + 7 + 2x + 9 = 19 + 7x
        assert_eq!(r.coeffs, vec![2, 7]);
    }

    #[test]
    fn test_random_with_value() {
        let mut rng = thread_rng();
        for target in [0u128, 1, 5, 16] {
            let p = Polynomial::random_with_value(target, 17, 4, &mut rng);
            assert_eq!(p.eval_at_one(), target);
            assert!(p.coeffs.len() <= 4);
        }
    }

    #[test]
    fn test_degree() {
        let m = 17;
        let cases = vec![
            (vec![1], 0),
            (vec![1, 0], 0),
            (vec![1, 2], 1),
            (vec![1, 2, 0], 1),
            (vec![0, 0, 0, 4], 3),
        ];
        for (coeffs, expected) in cases {
            assert_eq!(Polynomial::new(coeffs, m).degree(), expected);
        }
    }

    #[test]
    #[should_panic(expected = "moduli must match")]
    fn test_modulus_mismatch() {
        let _ = &Polynomial::constant(1, 7) + &Polynomial::constant(1, 11);
    }
}
