//! The homomorphic engine boundary.
//!
//! The comparator and the tree evaluator only ever talk to a
//! [`HomomorphicEngine`]; decryption is confined to [`Decryptor`], which only
//! secret-key holders implement.

pub mod aces;
pub mod clear;

pub use aces::{AcesEngine, AcesParams, AcesSecretKey};
pub use clear::{ClearEngine, ClearParams, ClearSecretKey};

use crate::error::{Error, Result};

/// Slot-wise ciphertext algebra over `Z_p`, as seen by the server.
///
/// Every operation returns a fresh ciphertext and leaves its operands untouched.
/// Rotation follows the convention "slot `i` moves to slot `i + offset`".
pub trait HomomorphicEngine: Sync {
    /// Opaque encryption of a slot vector.
    type Ciphertext: Clone + Send + Sync;

    /// Number of slots of every plaintext and ciphertext.
    fn slot_count(&self) -> usize;

    /// Plaintext modulus `p`.
    fn plaintext_modulus(&self) -> u64;

    /// Multiplicative depth a freshly encrypted ciphertext can still absorb.
    /// Meant for validation before evaluation, never mid-circuit.
    fn remaining_depth(&self) -> u32;

    /// Slot count carried by `ct`.
    fn slots_of(&self, ct: &Self::Ciphertext) -> usize;

    /// Encrypt `slots`, zero padding up to the slot count.
    fn encrypt(&self, slots: &[u64]) -> Result<Self::Ciphertext>;

    /// Slot-wise addition mod `p`.
    fn add(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    /// Ciphertext × ciphertext; consumes one level of depth.
    fn multiply(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    /// Slot-wise additive inverse mod `p`.
    fn negate(&self, a: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    /// Slot-wise addition of a plaintext vector.
    fn add_plain(&self, a: &Self::Ciphertext, k: &[u64]) -> Result<Self::Ciphertext>;

    /// Slot-wise multiplication by a plaintext vector; free in depth.
    fn multiply_plain(&self, a: &Self::Ciphertext, k: &[u64]) -> Result<Self::Ciphertext>;

    /// Cyclic rotation.
    fn rotate(&self, a: &Self::Ciphertext, offset: isize) -> Result<Self::Ciphertext>;

    /// Non-cyclic shift, zero filling the vacated slots.
    fn shift(&self, a: &Self::Ciphertext, offset: isize) -> Result<Self::Ciphertext>;

    /// `a + (-b)`.
    fn sub(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext> {
        let negated = self.negate(b)?;
        self.add(a, &negated)
    }

    /// Add `k` to every slot.
    fn add_constant(&self, a: &Self::Ciphertext, k: u64) -> Result<Self::Ciphertext> {
        self.add_plain(a, &vec![k; self.slot_count()])
    }

    /// Multiply every slot by `k`.
    fn multiply_constant(&self, a: &Self::Ciphertext, k: u64) -> Result<Self::Ciphertext> {
        self.multiply_plain(a, &vec![k; self.slot_count()])
    }

    /// Sum of all slots, replicated into every slot (rotate-and-add with a
    /// doubling stride).
    fn total_sum(&self, a: &Self::Ciphertext) -> Result<Self::Ciphertext> {
        let slots = self.slot_count();
        if !slots.is_power_of_two() {
            return Err(Error::Configuration(format!(
                "total sum needs a power-of-two slot count, got {slots}"
            )));
        }
        let mut acc = a.clone();
        let mut stride = 1usize;
        while stride < slots {
            let rotated = self.rotate(&acc, stride as isize)?;
            acc = self.add(&acc, &rotated)?;
            stride <<= 1;
        }
        Ok(acc)
    }
}

/// Client-side decryption capability.
pub trait Decryptor<E: HomomorphicEngine> {
    /// Decrypt `ct` into its slot vector, each slot reduced mod `p`.
    fn decrypt(&self, engine: &E, ct: &E::Ciphertext) -> Result<Vec<u64>>;
}

/// Index of the slot that lands at `i` after rotating by `offset`.
pub(crate) fn rotated_source(i: usize, offset: isize, slots: usize) -> usize {
    let n = slots as isize;
    (i as isize - offset).rem_euclid(n) as usize
}

/// Fails unless a plaintext of `len` slots fits in `slots`.
pub(crate) fn check_plaintext_len(len: usize, slots: usize) -> Result<()> {
    if len > slots {
        return Err(Error::ShapeMismatch {
            what: "plaintext length",
            expected: slots,
            found: len,
        });
    }
    Ok(())
}
