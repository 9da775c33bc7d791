//! Slot-vector simulator of a levelled homomorphic engine.
//!
//! Ciphertexts carry their slots in the clear together with the depth they have
//! consumed. Multiplying past the configured budget does not fail: the result
//! is silently replaced by random slots, which is what noise exhaustion looks
//! like on a real scheme. Every operation is counted.

use std::sync::atomic::{AtomicUsize, Ordering};

use itertools::Itertools;
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{check_plaintext_len, rotated_source, Decryptor, HomomorphicEngine};
use crate::error::{Error, Result};

/// Engine parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearParams {
    /// Slot count `S`.
    pub slots: usize,
    /// Plaintext modulus `p`.
    pub plaintext_modulus: u64,
    /// Multiplicative depth available to a fresh ciphertext.
    pub depth_budget: u32,
}

impl Default for ClearParams {
    fn default() -> Self {
        Self {
            slots: 64,
            plaintext_modulus: 2,
            depth_budget: 40,
        }
    }
}

/// A simulated ciphertext.
#[derive(Clone, Debug)]
pub struct ClearCiphertext {
    slots: Vec<u64>,
    depth: u32,
    key_id: u64,
}

impl ClearCiphertext {
    /// Multiplicative depth consumed so far.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }
}

/// Server-side engine state: parameters plus the public key id.
#[derive(Debug)]
pub struct ClearEngine {
    params: ClearParams,
    key_id: u64,
    operations: AtomicUsize,
}

/// Secret half of a clear key pair.
#[derive(Clone, Debug)]
pub struct ClearSecretKey {
    key_id: u64,
}

impl ClearEngine {
    /// Validate `params` and produce an engine with its matching secret key.
    pub fn generate_keypair(params: ClearParams) -> Result<(Self, ClearSecretKey)> {
        if params.slots == 0 {
            return Err(Error::Configuration("slot count must be positive".into()));
        }
        if params.plaintext_modulus < 2 || params.plaintext_modulus > u64::from(u32::MAX) {
            return Err(Error::Configuration(format!(
                "plaintext modulus must be in 2..2^32, got {}",
                params.plaintext_modulus
            )));
        }
        let key_id = rand::thread_rng().gen::<u64>();
        info!(
            slots = params.slots,
            modulus = params.plaintext_modulus,
            depth_budget = params.depth_budget,
            "generated clear key pair"
        );
        Ok((
            Self {
                params,
                key_id,
                operations: AtomicUsize::new(0),
            },
            ClearSecretKey { key_id },
        ))
    }

    /// Engine parameters.
    #[must_use]
    pub fn params(&self) -> &ClearParams {
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

    fn reduce(&self, v: u64) -> u64 {
        v % self.params.plaintext_modulus
    }

    fn check_key(&self, ct: &ClearCiphertext) -> Result<()> {
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

    fn zip_with(
        &self,
        a: &ClearCiphertext,
        b: &ClearCiphertext,
        op: impl Fn(u64, u64) -> u64,
    ) -> Result<Vec<u64>> {
        self.check_key(a)?;
        self.check_key(b)?;
        self.tick();
        Ok(a.slots
            .iter()
            .zip(&b.slots)
            .map(|(&x, &y)| self.reduce(op(x, y)))
            .collect_vec())
    }

    fn with_slots(&self, depth: u32, slots: Vec<u64>) -> ClearCiphertext {
        ClearCiphertext {
            slots,
            depth,
            key_id: self.key_id,
        }
    }

    /// Noise exhaustion: the slots no longer mean anything.
    fn scramble(&self, slots: &mut [u64]) {
        let noise = Uniform::new(0, self.params.plaintext_modulus);
        let mut rng = rand::thread_rng();
        for slot in slots {
            *slot = noise.sample(&mut rng);
        }
    }
}

impl HomomorphicEngine for ClearEngine {
    type Ciphertext = ClearCiphertext;

    fn slot_count(&self) -> usize {
        self.params.slots
    }

    fn plaintext_modulus(&self) -> u64 {
        self.params.plaintext_modulus
    }

    fn remaining_depth(&self) -> u32 {
        self.params.depth_budget
    }

    fn slots_of(&self, ct: &ClearCiphertext) -> usize {
        ct.slots.len()
    }

    fn encrypt(&self, slots: &[u64]) -> Result<ClearCiphertext> {
        check_plaintext_len(slots.len(), self.params.slots)?;
        self.tick();
        let mut padded = slots.iter().map(|&v| self.reduce(v)).collect_vec();
        padded.resize(self.params.slots, 0);
        Ok(self.with_slots(0, padded))
    }

    fn add(&self, a: &ClearCiphertext, b: &ClearCiphertext) -> Result<ClearCiphertext> {
        let slots = self.zip_with(a, b, |x, y| x + y)?;
        Ok(self.with_slots(a.depth.max(b.depth), slots))
    }

    fn multiply(&self, a: &ClearCiphertext, b: &ClearCiphertext) -> Result<ClearCiphertext> {
        let mut slots = self.zip_with(a, b, |x, y| x * y)?;
        let depth = a.depth.max(b.depth) + 1;
        if depth > self.params.depth_budget {
            self.scramble(&mut slots);
        }
        Ok(self.with_slots(depth, slots))
    }

    fn negate(&self, a: &ClearCiphertext) -> Result<ClearCiphertext> {
        self.check_key(a)?;
        self.tick();
        let p = self.params.plaintext_modulus;
        let slots = a.slots.iter().map(|&x| (p - x) % p).collect_vec();
        Ok(self.with_slots(a.depth, slots))
    }

    fn add_plain(&self, a: &ClearCiphertext, k: &[u64]) -> Result<ClearCiphertext> {
        self.check_key(a)?;
        self.check_plain(k)?;
        self.tick();
        let slots = a
            .slots
            .iter()
            .zip(k)
            .map(|(&x, &c)| self.reduce(x + self.reduce(c)))
            .collect_vec();
        Ok(self.with_slots(a.depth, slots))
    }

    fn multiply_plain(&self, a: &ClearCiphertext, k: &[u64]) -> Result<ClearCiphertext> {
        self.check_key(a)?;
        self.check_plain(k)?;
        self.tick();
        let slots = a
            .slots
            .iter()
            .zip(k)
            .map(|(&x, &c)| self.reduce(x * self.reduce(c)))
            .collect_vec();
        Ok(self.with_slots(a.depth, slots))
    }

    fn rotate(&self, a: &ClearCiphertext, offset: isize) -> Result<ClearCiphertext> {
        self.check_key(a)?;
        self.tick();
        let n = a.slots.len();
        let slots = (0..n)
            .map(|i| a.slots[rotated_source(i, offset, n)])
            .collect_vec();
        Ok(self.with_slots(a.depth, slots))
    }

    fn shift(&self, a: &ClearCiphertext, offset: isize) -> Result<ClearCiphertext> {
        self.check_key(a)?;
        self.tick();
        let n = a.slots.len() as isize;
        let slots = (0..n)
            .map(|i| {
                let src = i - offset;
                if (0..n).contains(&src) {
                    a.slots[src as usize]
                } else {
                    0
                }
            })
            .collect_vec();
        Ok(self.with_slots(a.depth, slots))
    }
}

impl Decryptor<ClearEngine> for ClearSecretKey {
    fn decrypt(&self, engine: &ClearEngine, ct: &ClearCiphertext) -> Result<Vec<u64>> {
        if ct.key_id != self.key_id || engine.key_id != self.key_id {
            return Err(Error::Engine(
                "secret key does not match the ciphertext's key pair".into(),
            ));
        }
        Ok(ct.slots.clone())
    }
}
