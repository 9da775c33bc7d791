//! Arithmetic channel `(p, q, u)` with evaluation point 1.
//!
//! A polynomial is read through the channel by evaluating it at 1 modulo `q`;
//! `u` is monic with `u(1) = 0`, so reducing modulo `u` never changes that
//! reading.

use num_integer::Integer;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use super::polynomial::{mul_mod, Polynomial};
use crate::error::{Error, Result};

/// Largest integer modulus the u128 arithmetic supports without overflow.
pub const MAX_MODULUS: u128 = 1 << 62;

#[derive(Clone, Debug)]
pub struct ArithChannel {
    /// Plaintext (vanishing) modulus.
    pub p: u128,
    /// Integer modulus; squarefree with at least two prime factors.
    pub q: u128,
    /// Number of secret components, also the degree of `u`.
    pub dim: usize,
    pub u: Polynomial,
    q_factors: Vec<u128>,
    /// Prime factor index assigned to each secret component.
    repartition: Vec<usize>,
}

impl ArithChannel {
    pub fn new<R: Rng>(p: u128, q: u128, dim: usize, rng: &mut R) -> Result<Self> {
        if p < 2 || p >= q {
            return Err(Error::Configuration(format!(
                "ACES needs 2 <= p < q, got p = {p}, q = {q}"
            )));
        }
        if q >= MAX_MODULUS {
            return Err(Error::Configuration(format!(
                "ACES modulus must stay below 2^62, got {q}"
            )));
        }
        if p.gcd(&q) != 1 {
            return Err(Error::Configuration(format!(
                "p = {p} and q = {q} must be coprime"
            )));
        }
        if dim < 2 {
            return Err(Error::Configuration(format!(
                "ACES dimension must be at least 2, got {dim}"
            )));
        }

        let q_factors = factor(q);
        if q_factors.len() < 2 {
            return Err(Error::Configuration(format!(
                "q = {q} needs at least two prime factors"
            )));
        }
        if q_factors.windows(2).any(|w| w[0] == w[1]) {
            return Err(Error::Configuration(format!("q = {q} must be squarefree")));
        }

        let repartition = repartition(dim, q_factors.len(), rng);
        let u = monic_vanishing_at_one(dim, q, rng);

        Ok(Self {
            p,
            q,
            dim,
            u,
            q_factors,
            repartition,
        })
    }

    pub fn q_factors(&self) -> &[u128] {
        &self.q_factors
    }

    /// Prime factor `q_σ(j)` assigned to component `j`.
    pub fn q_sigma(&self, j: usize) -> u128 {
        self.q_factors[self.repartition[j]]
    }

    /// `q / lcm(q_σ(i), q_σ(j))`.
    pub fn sigma_q(&self, i: usize, j: usize) -> u128 {
        let (qi, qj) = (self.q_sigma(i), self.q_sigma(j));
        if qi == qj {
            self.q / qi
        } else {
            self.q / (qi * qj)
        }
    }

    /// Noise-free carrier `r(m)` with channel reading `m`.
    pub fn message_polynomial<R: Rng>(&self, m: u128, rng: &mut R) -> Polynomial {
        Polynomial::random_with_value(m, self.q, self.dim, rng)
    }

    /// Vanishing noise `e` with channel reading `k * p`.
    pub fn vanisher<R: Rng>(&self, k: u128, rng: &mut R) -> Polynomial {
        Polynomial::random_with_value(mul_mod(k, self.p, self.q), self.q, self.dim, rng)
    }

    /// Bezout coefficients `μ` with `Σ μ_k · q_σ(k) · x_k(1) ≡ 1 (mod q)`.
    ///
    /// `None` when the readings of `secret` share a factor with `q`.
    pub fn mu_list(&self, secret: &[Polynomial]) -> Option<Vec<u128>> {
        let values: Vec<u128> = secret
            .iter()
            .enumerate()
            .map(|(k, x)| mul_mod(self.q_sigma(k), x.eval_at_one(), self.q))
            .collect();
        bezout(&values, self.q)
    }

    /// Multiplication tensor `λ_ijk = q_σ(k) μ_k (x_i x_j (1) - l_ij σq_ij)`.
    pub fn tensor<R: Rng>(&self, secret: &[Polynomial], mu: &[u128], rng: &mut R) -> Vec<Vec<Vec<u128>>> {
        let q = self.q;
        let mask = Uniform::new(0, q);
        let mut tensor = vec![vec![vec![0u128; self.dim]; self.dim]; self.dim];
        for i in 0..self.dim {
            for j in 0..self.dim {
                let xij = (&(&secret[i] * &secret[j]) % &self.u).eval_at_one();
                let l_ij = mask.sample(rng);
                let diff = (xij + q - mul_mod(l_ij, self.sigma_q(i, j), q)) % q;
                for (k, lambda) in tensor[i][j].iter_mut().enumerate() {
                    *lambda = mul_mod(mul_mod(self.q_sigma(k), mu[k], q), diff, q);
                }
            }
        }
        tensor
    }
}

/// Each prime factor gets at least one component when `dim` allows it; the
/// rest are drawn at random and the whole assignment is shuffled.
fn repartition<R: Rng>(dim: usize, factor_count: usize, rng: &mut R) -> Vec<usize> {
    let mut assignment: Vec<usize> = (0..dim)
        .map(|j| {
            if j < factor_count {
                j
            } else {
                rng.gen_range(0..factor_count)
            }
        })
        .collect();
    assignment.shuffle(rng);
    assignment
}

/// Monic `u` of degree `dim` with `u(1) ≡ 0 (mod q)`.
fn monic_vanishing_at_one<R: Rng>(dim: usize, q: u128, rng: &mut R) -> Polynomial {
    let coeff = Uniform::new(0, q);
    let mut coeffs = vec![0u128; dim + 1];
    coeffs[dim] = 1;
    for c in &mut coeffs[1..dim] {
        *c = coeff.sample(rng);
    }
    let rest = coeffs[1..].iter().fold(0u128, |acc, &c| (acc + c) % q);
    coeffs[0] = (q - rest) % q;
    Polynomial::new(coeffs, q)
}

/// Iterated extended gcd; coefficients are kept modulo `modulus`.
fn bezout(values: &[u128], modulus: u128) -> Option<Vec<u128>> {
    let m = modulus as i128;
    let mut g = m;
    let mut coeffs: Vec<i128> = Vec::with_capacity(values.len());
    for &v in values {
        let e = g.extended_gcd(&(v as i128));
        for c in &mut coeffs {
            *c = (*c * e.x.rem_euclid(m)).rem_euclid(m);
        }
        coeffs.push(e.y.rem_euclid(m));
        g = e.gcd;
    }
    (g == 1).then(|| coeffs.into_iter().map(|c| c as u128).collect())
}

/// Prime factors of `n` in ascending order, with multiplicity.
fn factor(mut n: u128) -> Vec<u128> {
    let mut factors = Vec::new();
    let mut d = 2u128;
    while d * d <= n {
        while n % d == 0 {
            factors.push(d);
            n /= d;
        }
        d += if d == 2 { 1 } else { 2 };
    }
    if n > 1 {
        factors.push(n);
    }
    factors
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    fn channel() -> ArithChannel {
        ArithChannel::new(2, (1 << 60) + 1, 5, &mut thread_rng()).unwrap()
    }

    #[test]
    fn test_factor() {
        assert_eq!(factor(12), vec![2, 2, 3]);
        assert_eq!(factor(17), vec![17]);
        assert_eq!(factor((1 << 60) + 1), vec![17, 241, 61681, 4562284561]);
    }

    #[test]
    fn test_channel_creation() {
        let chan = channel();
        assert_eq!(chan.u.coeffs.len(), 6);
        assert_eq!(chan.u.coeffs[5], 1);
        assert_eq!(chan.u.eval_at_one(), 0);
        assert_eq!(chan.q_factors().len(), 4);
    }

    #[test]
    fn test_repartition_covers_factors() {
        let rep = repartition(5, 3, &mut thread_rng());
        assert_eq!(rep.len(), 5);
        for f in 0..3 {
            assert!(rep.contains(&f));
        }
    }

    #[test]
    fn test_sigma_q() {
        let chan = ArithChannel::new(2, 15, 4, &mut thread_rng()).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                let lcm = chan.q_sigma(i).lcm(&chan.q_sigma(j));
                assert_eq!(chan.sigma_q(i, j) * lcm, 15);
            }
        }
    }

    #[test]
    fn test_message_and_vanisher_readings() {
        let chan = channel();
        let mut rng = thread_rng();
        for m in 0..2 {
            assert_eq!(chan.message_polynomial(m, &mut rng).eval_at_one(), m);
        }
        assert_eq!(chan.vanisher(3, &mut rng).eval_at_one(), 6);
    }

    #[test]
    fn test_bezout() {
        let values = [6u128, 10, 15];
        let coeffs = bezout(&values, 1 << 20).unwrap();
        let sum = values
            .iter()
            .zip(&coeffs)
            .fold(0u128, |acc, (&v, &c)| (acc + v * c) % (1 << 20));
        assert_eq!(sum, 1);
        assert!(bezout(&[4, 6], 8).is_none());
    }

    #[test]
    fn test_mu_list_identity() {
        let chan = channel();
        let mut rng = thread_rng();
        let mu = loop {
            let secret: Vec<_> = (0..chan.dim)
                .map(|_| Polynomial::random(chan.q, chan.dim, &mut rng))
                .collect();
            if let Some(mu) = chan.mu_list(&secret) {
                let sum = (0..chan.dim).fold(0u128, |acc, k| {
                    let v = mul_mod(chan.q_sigma(k), secret[k].eval_at_one(), chan.q);
                    (acc + mul_mod(v, mu[k], chan.q)) % chan.q
                });
                assert_eq!(sum, 1);
                break mu;
            }
        };
        assert_eq!(mu.len(), chan.dim);
    }

    #[test]
    fn test_tensor_multiples_of_factor() {
        let chan = channel();
        let mut rng = thread_rng();
        let (secret, mu) = loop {
            let secret: Vec<_> = (0..chan.dim)
                .map(|_| Polynomial::random(chan.q, chan.dim, &mut rng))
                .collect();
            if let Some(mu) = chan.mu_list(&secret) {
                break (secret, mu);
            }
        };
        let tensor = chan.tensor(&secret, &mu, &mut rng);
        for row in &tensor {
            for lambdas in row {
                for (k, &lambda) in lambdas.iter().enumerate() {
                    assert_eq!(lambda % chan.q_sigma(k), 0);
                }
            }
        }
    }

    #[test]
    fn test_invalid_channels() {
        let mut rng = thread_rng();
        assert!(ArithChannel::new(31, 7, 4, &mut rng).is_err());
        assert!(ArithChannel::new(3, 45, 4, &mut rng).is_err());
        assert!(ArithChannel::new(2, 45, 4, &mut rng).is_err()); // 45 = 3^2 * 5
        assert!(ArithChannel::new(2, 17, 4, &mut rng).is_err());
        assert!(ArithChannel::new(2, 15, 1, &mut rng).is_err());
    }
}
