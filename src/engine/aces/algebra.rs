//! Homomorphic operations on single ACES ciphertexts.

use rand::Rng;

use super::channel::ArithChannel;
use super::polynomial::Polynomial;
use super::scheme::{Cipher, SecretKey};
use crate::error::{Error, Result};

/// Multiplication tensor plus the channel data the operations need.
#[derive(Clone, Debug)]
pub struct AcesAlgebra {
    p: u128,
    q: u128,
    /// `λ_ijk`, indexed `[i][j][k]`.
    tensor: Vec<Vec<Vec<u128>>>,
    dim: usize,
    u: Polynomial,
}

impl AcesAlgebra {
    pub fn new<R: Rng>(chan: &ArithChannel, secret: &SecretKey, mu: &[u128], rng: &mut R) -> Self {
        Self {
            p: chan.p,
            q: chan.q,
            tensor: chan.tensor(&secret.x, mu, rng),
            dim: chan.dim,
            u: chan.u.clone(),
        }
    }

    /// Level after one multiplication of two operands at `la` and `lb`.
    pub fn mult_level(&self, la: u128, lb: u128) -> Option<u128> {
        la.checked_add(lb)?
            .checked_add(la.checked_mul(lb)?)?
            .checked_mul(self.p)
    }

    fn check_level(&self, level: Option<u128>) -> Result<u128> {
        match level {
            Some(l) if l < self.q => Ok(l),
            _ => Err(Error::Engine(format!(
                "ciphertext noise would exceed the modulus {}",
                self.q
            ))),
        }
    }

    pub fn add(&self, a: &Cipher, b: &Cipher) -> Result<Cipher> {
        let level = self.check_level(a.level.checked_add(b.level))?;
        let dec = a
            .dec
            .iter()
            .zip(&b.dec)
            .map(|(x, y)| &(x + y) % &self.u)
            .collect();
        Ok(Cipher {
            dec,
            enc: &(&a.enc + &b.enc) % &self.u,
            level,
        })
    }

    /// `dec_k = enc_b·dec_a,k + enc_a·dec_b,k - Σ_ij λ_ijk dec_a,i dec_b,j`,
    /// `enc = enc_a·enc_b`.
    pub fn mult(&self, a: &Cipher, b: &Cipher) -> Result<Cipher> {
        let level = self.check_level(self.mult_level(a.level, b.level))?;

        let mut t = vec![Polynomial::zero(self.q); self.dim];
        for i in 0..self.dim {
            for j in 0..self.dim {
                let prod = &(&a.dec[i] * &b.dec[j]) % &self.u;
                for (tk, &lambda) in t.iter_mut().zip(&self.tensor[i][j]) {
                    if lambda != 0 {
                        *tk = &*tk + &prod.scale(lambda);
                    }
                }
            }
        }

        let dec = t
            .iter()
            .enumerate()
            .map(|(k, tk)| {
                let cross = &(&b.enc * &a.dec[k]) + &(&a.enc * &b.dec[k]);
                &(&cross - tk) % &self.u
            })
            .collect();

        Ok(Cipher {
            dec,
            enc: &(&a.enc * &b.enc) % &self.u,
            level,
        })
    }

    /// Multiply by the constant `k`; the level grows by the same factor.
    pub fn scale(&self, a: &Cipher, k: u128) -> Result<Cipher> {
        let k = k % self.p;
        let level = self.check_level(a.level.checked_mul(k))?;
        Ok(Cipher {
            dec: a.dec.iter().map(|d| d.scale(k)).collect(),
            enc: a.enc.scale(k),
            level,
        })
    }

    /// Add the constant `k` to the hidden message.
    pub fn add_scalar(&self, a: &Cipher, k: u128) -> Result<Cipher> {
        let k = k % self.p;
        let level = self.check_level(a.level.checked_add(k))?;
        Ok(Cipher {
            dec: a.dec.clone(),
            enc: &a.enc + &Polynomial::constant(k, self.q),
            level,
        })
    }
}
