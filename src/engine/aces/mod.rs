//! ACES: a polynomial-channel scheme with exact (non-approximate) homomorphic
//! arithmetic over `Z_p`.
//!
//! Every slot is its own [`Cipher`]; rotations and shifts are permutations of
//! the slot vector, so they cost no noise. Noise is tracked as an explicit
//! level and any operation that would push it past `q` fails with
//! [`Error::Engine`]. With the default parameters a fresh ciphertext survives
//! three multiplications, far less than a tree comparison needs; the evaluator
//! finds that out before touching any ciphertext.

mod algebra;
mod channel;
mod polynomial;
mod scheme;

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use self::algebra::AcesAlgebra;
use self::channel::ArithChannel;
use self::scheme::{Aces, Cipher, SecretKey};
use super::{check_plaintext_len, rotated_source, Decryptor, HomomorphicEngine};
use crate::error::{Error, Result};

/// ACES parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcesParams {
    /// Plaintext modulus.
    pub p: u64,
    /// Integer modulus; squarefree, below 2^62, with at least two prime factors.
    pub q: u64,
    /// Channel dimension (number of secret components).
    pub dim: usize,
    /// Rows of the public key.
    pub rows: usize,
    /// Slots per ciphertext, one ACES cipher each.
    pub slots: usize,
}

impl Default for AcesParams {
    fn default() -> Self {
        Self {
            p: 2,
            q: (1 << 60) + 1,
            dim: 5,
            rows: 5,
            slots: 16,
        }
    }
}

/// Encryption of a slot vector.
#[derive(Clone, Debug)]
pub struct AcesCiphertext {
    slots: Vec<Cipher>,
    key_id: u64,
}

impl AcesCiphertext {
    /// Highest noise level over all slots.
    #[must_use]
    pub fn level(&self) -> u128 {
        self.slots.iter().map(|c| c.level).max().unwrap_or(0)
    }
}

/// ACES backend: one cipher per slot, with public-key encryption and level
/// bookkeeping that turns noise overflow into an error.
#[derive(Debug)]
pub struct AcesEngine {
    params: AcesParams,
    scheme: Aces,
    algebra: AcesAlgebra,
    key_id: u64,
    operations: AtomicUsize,
}

/// Secret key of one [`AcesEngine`] key pair.
#[derive(Clone, Debug)]
pub struct AcesSecretKey {
    key: SecretKey,
    key_id: u64,
}

impl AcesEngine {
    /// Build the arithmetic channel for `params` and draw a fresh key pair.
    pub fn generate_keypair(params: AcesParams) -> Result<(Self, AcesSecretKey)> {
        if params.slots == 0 {
            return Err(Error::Configuration("slot count must be positive".into()));
        }
        let mut rng = rand::thread_rng();
        let chan = ArithChannel::new(
            u128::from(params.p),
            u128::from(params.q),
            params.dim,
            &mut rng,
        )?;
        let (scheme, key, mu) = Aces::generate_keypair(&chan, params.rows, &mut rng)?;
        let algebra = AcesAlgebra::new(&chan, &key, &mu, &mut rng);
        let key_id = rng.gen::<u64>();

        let engine = Self {
            params,
            scheme,
            algebra,
            key_id,
            operations: AtomicUsize::new(0),
        };
        info!(
            p = engine.params.p,
            q = engine.params.q,
            dim = engine.params.dim,
            slots = engine.params.slots,
            q_factors = ?chan.q_factors(),
            depth = engine.remaining_depth(),
            "generated ACES key pair"
        );
        Ok((engine, AcesSecretKey { key, key_id }))
    }

    /// Parameters the engine was generated with.
    #[must_use]
    pub fn params(&self) -> &AcesParams {
        &self.params
    }

    /// Number of ciphertext operations executed so far, encryptions included.
    #[must_use]
    pub fn operations(&self) -> usize {
        self.operations.load(Ordering::Relaxed)
    }

    fn tick(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    fn check_key(&self, ct: &AcesCiphertext) -> Result<()> {
        if ct.key_id != self.key_id {
            return Err(Error::Engine(
                "ciphertext was produced under a different key pair".into(),
            ));
        }
        if ct.slots.len() != self.params.slots {
            return Err(Error::ShapeMismatch {
                what: "ciphertext slots",
                expected: self.params.slots,
                found: ct.slots.len(),
            });
        }
        Ok(())
    }

    fn check_plain(&self, k: &[u64]) -> Result<()> {
        if k.len() != self.params.slots {
            return Err(Error::ShapeMismatch {
                what: "plaintext operand",
                expected: self.params.slots,
                found: k.len(),
            });
        }
        Ok(())
    }

    fn wrap(&self, slots: Vec<Cipher>) -> AcesCiphertext {
        AcesCiphertext {
            slots,
            key_id: self.key_id,
        }
    }

    fn zip_with(
        &self,
        a: &AcesCiphertext,
        b: &AcesCiphertext,
        op: impl Fn(&Cipher, &Cipher) -> Result<Cipher> + Sync,
    ) -> Result<AcesCiphertext> {
        self.check_key(a)?;
        self.check_key(b)?;
        self.tick();
        let slots = a
            .slots
            .par_iter()
            .zip(&b.slots)
            .map(|(x, y)| op(x, y))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.wrap(slots))
    }

    fn map_plain(
        &self,
        a: &AcesCiphertext,
        k: &[u64],
        op: impl Fn(&Cipher, u128) -> Result<Cipher>,
    ) -> Result<AcesCiphertext> {
        self.check_key(a)?;
        self.check_plain(k)?;
        self.tick();
        let slots = a
            .slots
            .iter()
            .zip(k)
            .map(|(c, &v)| op(c, u128::from(v)))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.wrap(slots))
    }
}

impl HomomorphicEngine for AcesEngine {
    type Ciphertext = AcesCiphertext;

    fn slot_count(&self) -> usize {
        self.params.slots
    }

    fn plaintext_modulus(&self) -> u64 {
        self.params.p
    }

    /// Squarings of a fresh ciphertext before its level reaches `q`.
    ///
    /// Additions also raise the level, so a circuit that adds between its
    /// multiplications can exhaust `q` sooner; the overflowing operation then
    /// fails with [`Error::Engine`].
    fn remaining_depth(&self) -> u32 {
        let q = u128::from(self.params.q);
        let mut level = self.scheme.fresh_level();
        let mut depth = 0;
        while let Some(next) = self.algebra.mult_level(level, level).filter(|&l| l < q) {
            level = next;
            depth += 1;
        }
        depth
    }

    fn slots_of(&self, ct: &AcesCiphertext) -> usize {
        ct.slots.len()
    }

    fn encrypt(&self, slots: &[u64]) -> Result<AcesCiphertext> {
        check_plaintext_len(slots.len(), self.params.slots)?;
        self.tick();
        let mut rng = rand::thread_rng();
        let ciphers = (0..self.params.slots)
            .map(|i| {
                let m = slots.get(i).copied().unwrap_or(0);
                self.scheme.encrypt(u128::from(m), &mut rng)
            })
            .collect();
        Ok(self.wrap(ciphers))
    }

    fn add(&self, a: &AcesCiphertext, b: &AcesCiphertext) -> Result<AcesCiphertext> {
        self.zip_with(a, b, |x, y| self.algebra.add(x, y))
    }

    fn multiply(&self, a: &AcesCiphertext, b: &AcesCiphertext) -> Result<AcesCiphertext> {
        let out = self.zip_with(a, b, |x, y| self.algebra.mult(x, y))?;
        debug!(level = %out.level(), "ACES multiply");
        Ok(out)
    }

    fn negate(&self, a: &AcesCiphertext) -> Result<AcesCiphertext> {
        let minus_one = self.params.p - 1;
        self.map_plain(a, &vec![minus_one; self.params.slots], |c, k| {
            self.algebra.scale(c, k)
        })
    }

    fn add_plain(&self, a: &AcesCiphertext, k: &[u64]) -> Result<AcesCiphertext> {
        self.map_plain(a, k, |c, v| self.algebra.add_scalar(c, v))
    }

    fn multiply_plain(&self, a: &AcesCiphertext, k: &[u64]) -> Result<AcesCiphertext> {
        self.map_plain(a, k, |c, v| self.algebra.scale(c, v))
    }

    fn rotate(&self, a: &AcesCiphertext, offset: isize) -> Result<AcesCiphertext> {
        self.check_key(a)?;
        self.tick();
        let n = a.slots.len();
        let slots = (0..n)
            .map(|i| a.slots[rotated_source(i, offset, n)].clone())
            .collect();
        Ok(self.wrap(slots))
    }

    fn shift(&self, a: &AcesCiphertext, offset: isize) -> Result<AcesCiphertext> {
        self.check_key(a)?;
        self.tick();
        let n = a.slots.len() as isize;
        let slots = (0..n)
            .map(|i| {
                let src = i - offset;
                if (0..n).contains(&src) {
                    a.slots[src as usize].clone()
                } else {
                    self.scheme.trivial(0)
                }
            })
            .collect();
        Ok(self.wrap(slots))
    }
}

impl Decryptor<AcesEngine> for AcesSecretKey {
    fn decrypt(&self, engine: &AcesEngine, ct: &AcesCiphertext) -> Result<Vec<u64>> {
        if ct.key_id != self.key_id || engine.key_id != self.key_id {
            return Err(Error::Engine(
                "secret key does not match the ciphertext's key pair".into(),
            ));
        }
        ct.slots
            .iter()
            .map(|c| {
                let m = engine.scheme.decrypt(c, &self.key);
                u64::try_from(m).map_err(|_| Error::Engine(format!("decrypted slot {m} overflows")))
            })
            .collect()
    }
}
