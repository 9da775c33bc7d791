//! Client side of the split: owns the secret key, encrypts features and reads
//! verdicts.

use itertools::Itertools;
use tracing::trace;

use crate::encoding::BIT_WIDTH;
use crate::engine::{Decryptor, HomomorphicEngine};
use crate::error::{Error, Result};
use crate::packing::{pack_value, pack_values, unpack_value, window_count};

/// Key holder: encrypts inputs for an engine and decodes what comes back.
pub struct Client<'e, E: HomomorphicEngine, K: Decryptor<E>> {
    engine: &'e E,
    key: K,
}

impl<'e, E: HomomorphicEngine, K: Decryptor<E>> Client<'e, E, K> {
    /// Pair `key` with the engine it was generated for.
    pub fn new(engine: &'e E, key: K) -> Self {
        Self { engine, key }
    }

    /// Encrypt one integer into window 0.
    pub fn encrypt_value(&self, value: i64) -> Result<E::Ciphertext> {
        self.engine
            .encrypt(&pack_value(value, self.engine.slot_count())?)
    }

    /// One ciphertext per feature, the layout the tree evaluator consumes.
    pub fn encrypt_features(&self, features: &[i64]) -> Result<Vec<E::Ciphertext>> {
        features.iter().map(|&x| self.encrypt_value(x)).collect()
    }

    /// Several integers in consecutive windows of a single ciphertext.
    pub fn encrypt_packed(&self, values: &[i64]) -> Result<E::Ciphertext> {
        self.engine
            .encrypt(&pack_values(values, self.engine.slot_count())?)
    }

    /// Decode the integer held in window 0 (the tree verdict).
    pub fn decrypt_value(&self, ct: &E::Ciphertext) -> Result<i64> {
        self.decrypt_window(ct, 0)
    }

    /// Decode the integer held in `window`.
    pub fn decrypt_window(&self, ct: &E::Ciphertext, window: usize) -> Result<i64> {
        let slots = self.key.decrypt(self.engine, ct)?;
        unpack_value(&slots, window)
    }

    /// Slot 0 of a broadcast comparison result.
    pub fn decrypt_bit(&self, ct: &E::Ciphertext) -> Result<u64> {
        let slots = self.key.decrypt(self.engine, ct)?;
        slots.first().copied().ok_or(Error::ShapeMismatch {
            what: "decrypted slots",
            expected: 1,
            found: 0,
        })
    }

    /// Log the decrypted slots of `ct`, one window per line.
    pub fn dump(&self, label: &str, ct: &E::Ciphertext) -> Result<()> {
        let slots = self.key.decrypt(self.engine, ct)?;
        for w in 0..window_count(slots.len(), BIT_WIDTH) {
            let bits = slots[w * BIT_WIDTH..(w + 1) * BIT_WIDTH].iter().join("");
            let value = unpack_value(&slots, w)?;
            trace!(label, window = w, %bits, value, "slot dump");
        }
        Ok(())
    }
}
