//! Key generation, encryption and decryption of single `Z_p` messages.

use num_integer::Integer;
use rand::Rng;

use super::channel::ArithChannel;
use super::polynomial::{mul_mod, Polynomial};
use crate::error::{Error, Result};

/// Key generation gives up after this many secrets without a Bezout identity.
const MAX_KEYGEN_ATTEMPTS: usize = 32;

/// Elementary row operations composed into the secret isomorphism.
const ISOMORPHISM_STEPS: usize = 60;

/// ACES ciphertext: `(dec, enc)` plus a bound on the hidden noise integer.
#[derive(Clone, Debug)]
pub struct Cipher {
    /// One polynomial per secret component.
    pub dec: Vec<Polynomial>,
    pub enc: Polynomial,
    /// Upper bound on `m + p * k` carried by this ciphertext; must stay below `q`.
    pub level: u128,
}

/// Secret vector `x`, one polynomial per channel dimension.
#[derive(Clone, Debug)]
pub struct SecretKey {
    pub x: Vec<Polynomial>,
}

/// Public encryption material `(f0, f1 = f0 · x + e)`.
#[derive(Clone, Debug)]
pub struct Aces {
    pub f0: Vec<Vec<Polynomial>>,
    pub f1: Vec<Polynomial>,
    chan: ArithChannel,
}

impl Aces {
    /// Draw a secret with a valid Bezout identity and derive `rows` public rows.
    ///
    /// Returns the Bezout coefficients so the caller can build the
    /// multiplication tensor for the same secret.
    pub fn generate_keypair<R: Rng>(
        chan: &ArithChannel,
        rows: usize,
        rng: &mut R,
    ) -> Result<(Self, SecretKey, Vec<u128>)> {
        if rows == 0 {
            return Err(Error::Configuration(
                "ACES needs at least one public row".into(),
            ));
        }

        let (secret, mu) = (0..MAX_KEYGEN_ATTEMPTS)
            .find_map(|_| {
                let iso = random_isomorphism(chan.q, chan.dim, ISOMORPHISM_STEPS, rng);
                let x: Vec<Polynomial> = (0..chan.dim)
                    .map(|k| Polynomial::new(iso.iter().map(|row| row[k]).collect(), chan.q))
                    .collect();
                chan.mu_list(&x).map(|mu| (x, mu))
            })
            .ok_or_else(|| {
                Error::Engine(format!(
                    "no secret with an invertible channel reading after {MAX_KEYGEN_ATTEMPTS} attempts"
                ))
            })?;

        let f0: Vec<Vec<Polynomial>> = (0..rows)
            .map(|_| {
                (0..chan.dim)
                    .map(|j| {
                        let k = rng.gen_range(0..chan.q);
                        Polynomial::random_with_value(mul_mod(chan.p, k, chan.q), chan.q, chan.dim, rng)
                            .scale(chan.q_sigma(j))
                    })
                    .collect()
            })
            .collect();

        let f1 = f0
            .iter()
            .map(|row| {
                let masked = row
                    .iter()
                    .zip(&secret)
                    .fold(chan.vanisher(1, rng), |acc, (f, x)| acc + &(f * x));
                &masked % &chan.u
            })
            .collect();

        Ok((
            Self {
                f0,
                f1,
                chan: chan.clone(),
            },
            SecretKey { x: secret },
            mu,
        ))
    }

    pub fn channel(&self) -> &ArithChannel {
        &self.chan
    }

    /// Level of every fresh ciphertext: `(p - 1) + p * rows * (p - 1)`.
    pub fn fresh_level(&self) -> u128 {
        let p = self.chan.p;
        (p - 1) + p * self.f1.len() as u128 * (p - 1)
    }

    /// Encrypt `m ∈ Z_p`.
    pub fn encrypt<R: Rng>(&self, m: u128, rng: &mut R) -> Cipher {
        let chan = &self.chan;
        let b: Vec<Polynomial> = (0..self.f1.len())
            .map(|_| {
                let k = rng.gen_range(0..chan.p);
                Polynomial::random_with_value(k, chan.q, chan.dim, rng)
            })
            .collect();

        let enc = b
            .iter()
            .zip(&self.f1)
            .fold(chan.message_polynomial(m % chan.p, rng), |acc, (bi, f1i)| {
                acc + &(bi * f1i)
            });

        let dec = (0..chan.dim)
            .map(|j| {
                let acc = b
                    .iter()
                    .zip(&self.f0)
                    .fold(Polynomial::zero(chan.q), |acc, (bi, row)| acc + &(bi * &row[j]));
                &acc % &chan.u
            })
            .collect();

        Cipher {
            dec,
            enc: &enc % &chan.u,
            level: self.fresh_level(),
        }
    }

    /// Noise-free encryption of the constant `m`, usable with any key.
    pub fn trivial(&self, m: u128) -> Cipher {
        let chan = &self.chan;
        Cipher {
            dec: vec![Polynomial::zero(chan.q); chan.dim],
            enc: Polynomial::constant(m % chan.p, chan.q),
            level: m % chan.p,
        }
    }

    /// `[C](enc - dec · x) mod p`.
    pub fn decrypt(&self, c: &Cipher, key: &SecretKey) -> u128 {
        let chan = &self.chan;
        let inner = c
            .dec
            .iter()
            .zip(&key.x)
            .fold(Polynomial::zero(chan.q), |acc, (d, x)| acc + &(d * x));
        (&(&c.enc - &inner) % &chan.u).eval_at_one() % chan.p
    }
}

/// Random invertible `dim × dim` matrix over `Z_q`, built from row swaps,
/// unit scalings and row additions applied to the identity.
pub fn random_isomorphism<R: Rng>(q: u128, dim: usize, steps: usize, rng: &mut R) -> Vec<Vec<u128>> {
    let mut m: Vec<Vec<u128>> = (0..dim)
        .map(|r| (0..dim).map(|c| u128::from(r == c)).collect())
        .collect();

    for _ in 0..steps {
        let i = rng.gen_range(0..dim);
        let j = (i + rng.gen_range(1..dim)) % dim;
        match rng.gen_range(0..6) {
            0 => m.swap(i, j),
            1 | 2 => {
                let unit = loop {
                    let a = rng.gen_range(1..q);
                    if a.gcd(&q) == 1 {
                        break a;
                    }
                };
                for v in &mut m[i] {
                    *v = mul_mod(*v, unit, q);
                }
            }
            _ => {
                let a = rng.gen_range(1..q);
                let source = m[j].clone();
                for (v, s) in m[i].iter_mut().zip(source) {
                    *v = (*v + mul_mod(a, s, q)) % q;
                }
            }
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    fn keypair() -> (Aces, SecretKey) {
        let mut rng = thread_rng();
        let chan = ArithChannel::new(2, (1 << 60) + 1, 5, &mut rng).unwrap();
        let (aces, key, _) = Aces::generate_keypair(&chan, 5, &mut rng).unwrap();
        (aces, key)
    }

    /// Determinant mod a small prime via Gaussian elimination.
    fn det_mod(mut m: Vec<Vec<u128>>, p: u128) -> u128 {
        let n = m.len();
        let mut det = 1u128;
        for col in 0..n {
            let Some(pivot) = (col..n).find(|&r| m[r][col] % p != 0) else {
                return 0;
            };
            if pivot != col {
                m.swap(pivot, col);
                det = (p - det) % p;
            }
            let inv = (1..p).find(|&v| m[col][col] * v % p == 1).unwrap();
            det = det * (m[col][col] % p) % p;
            for r in col + 1..n {
                let factor = m[r][col] % p * inv % p;
                for c in col..n {
                    m[r][c] = (m[r][c] % p + p * p - factor * (m[col][c] % p)) % p;
                }
            }
        }
        det
    }

    #[test]
    fn test_isomorphism_is_invertible() {
        let mut rng = thread_rng();
        for _ in 0..10 {
            let m = random_isomorphism(97 * 89, 4, 40, &mut rng);
            assert_ne!(det_mod(m.clone(), 97), 0);
            assert_ne!(det_mod(m, 89), 0);
        }
    }

    #[test]
    fn test_public_key_masks_secret() {
        let (aces, key) = keypair();
        let chan = aces.channel();
        for (row, f1) in aces.f0.iter().zip(&aces.f1) {
            let masked = row
                .iter()
                .zip(&key.x)
                .fold(Polynomial::zero(chan.q), |acc, (f, x)| acc + &(f * x));
            let noise = (&(f1 - &masked) % &chan.u).eval_at_one();
            assert_eq!(noise, chan.p);
        }
    }

    #[test]
    fn test_round_trip() {
        let (aces, key) = keypair();
        let mut rng = thread_rng();
        for _ in 0..20 {
            for m in 0..2 {
                let c = aces.encrypt(m, &mut rng);
                assert_eq!(aces.decrypt(&c, &key), m);
            }
        }
    }

    #[test]
    fn test_dec_components_vanish_mod_factor() {
        let (aces, _) = keypair();
        let chan = aces.channel();
        let c = aces.encrypt(1, &mut thread_rng());
        for (j, d) in c.dec.iter().enumerate() {
            assert_eq!(d.eval_at_one() % chan.q_sigma(j), 0);
        }
    }

    #[test]
    fn test_trivial_cipher() {
        let (aces, key) = keypair();
        assert_eq!(aces.decrypt(&aces.trivial(1), &key), 1);
        assert_eq!(aces.decrypt(&aces.trivial(0), &key), 0);
        assert_eq!(aces.fresh_level(), 11);
    }

    #[test]
    fn test_zero_rows_rejected() {
        let mut rng = thread_rng();
        let chan = ArithChannel::new(2, (1 << 60) + 1, 5, &mut rng).unwrap();
        assert!(Aces::generate_keypair(&chan, 0, &mut rng).is_err());
    }
}
