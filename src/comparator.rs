//! Bit-sliced less-than over encrypted two's-complement integers.
//!
//! Both operands are conditioned with plaintext masks so that the signed test
//! `x < y` becomes "the B-bit sum `a + b` carries out of its window":
//!
//! ```text
//! a = y ^ 0x8000          (sign flip, signed order -> unsigned order)
//! b = x ^ 0x7FFF          (= 0xFFFF - (x ^ 0x8000))
//! a + b >= 2^B  <=>  (y ^ 0x8000) > (x ^ 0x8000)  <=>  x < y
//! ```
//!
//! The sum is computed by B rounds of a ripple adder (XOR for the sum, AND for
//! the carry). Carries leaving a window head are collected into the result;
//! all other carries are confined to window bodies before being rotated one
//! slot toward the head, so neighbouring windows never interact.

use tracing::debug;

use crate::encoding::BIT_WIDTH;
use crate::engine::HomomorphicEngine;
use crate::error::{Error, Result};
use crate::packing::{body_mask, head_mask, one_hot, window_count};

/// Comparator bound to one engine.
pub struct SecureComparator<'e, E: HomomorphicEngine> {
    engine: &'e E,
    heads: Vec<u64>,
    body: Vec<u64>,
}

impl<'e, E: HomomorphicEngine> SecureComparator<'e, E> {
    /// Check that `engine` can host the circuit: binary plaintexts and a
    /// power-of-two slot count made of whole windows.
    pub fn new(engine: &'e E) -> Result<Self> {
        let modulus = engine.plaintext_modulus();
        if modulus != 2 {
            return Err(Error::Configuration(format!(
                "the comparator needs plaintext modulus 2, got {modulus}"
            )));
        }
        let slots = engine.slot_count();
        if slots < BIT_WIDTH || slots % BIT_WIDTH != 0 {
            return Err(Error::Configuration(format!(
                "slot count {slots} is not a positive multiple of the bit width {BIT_WIDTH}"
            )));
        }
        if !slots.is_power_of_two() {
            return Err(Error::Configuration(format!(
                "slot count {slots} must be a power of two for the total-sum broadcast"
            )));
        }
        Ok(Self {
            engine,
            heads: head_mask(slots, BIT_WIDTH),
            body: body_mask(slots, BIT_WIDTH),
        })
    }

    /// Multiplicative depth of one comparison: one level per ripple round plus
    /// the one-hot mask.
    #[must_use]
    pub fn depth(&self) -> u32 {
        BIT_WIDTH as u32 + 1
    }

    /// Number of windows per ciphertext.
    #[must_use]
    pub fn windows(&self) -> usize {
        window_count(self.engine.slot_count(), BIT_WIDTH)
    }

    fn check_operand(&self, ct: &E::Ciphertext) -> Result<()> {
        let found = self.engine.slots_of(ct);
        let expected = self.engine.slot_count();
        if found != expected {
            return Err(Error::ShapeMismatch {
                what: "comparator operand",
                expected,
                found,
            });
        }
        Ok(())
    }

    fn check_window(&self, window: usize) -> Result<()> {
        let available = self.windows();
        if window >= available {
            return Err(Error::ShapeMismatch {
                what: "comparator window",
                expected: available,
                found: window,
            });
        }
        Ok(())
    }

    /// `[x_w < y_w]` at the head slot of every window `w`, zero everywhere else.
    ///
    /// Depth B; the caller still has to isolate the window it cares about.
    pub fn less_than_lanes(&self, x: &E::Ciphertext, y: &E::Ciphertext) -> Result<E::Ciphertext> {
        self.check_operand(x)?;
        self.check_operand(y)?;
        let engine = self.engine;

        let mut a = engine.add_plain(y, &self.heads)?;
        let mut b = engine.add_plain(x, &self.body)?;
        let mut overflow: Option<E::Ciphertext> = None;

        for _ in 0..BIT_WIDTH {
            let sum = engine.add(&a, &b)?;
            let carry = engine.multiply(&a, &b)?;

            let out = engine.multiply_plain(&carry, &self.heads)?;
            overflow = Some(match overflow {
                Some(acc) => engine.add(&acc, &out)?,
                None => out,
            });

            let inner = engine.multiply_plain(&carry, &self.body)?;
            b = engine.rotate(&inner, -1)?;
            a = sum;
        }

        overflow.ok_or_else(|| Error::Configuration("bit width must be positive".into()))
    }

    /// Compare window `window` of `x` and `y`; the result bit fills every slot.
    pub fn compare_window(&self, x: &E::Ciphertext, y: &E::Ciphertext, window: usize) -> Result<E::Ciphertext> {
        self.check_window(window)?;
        let lanes = self.less_than_lanes(x, y)?;
        self.isolate(&lanes, window)
    }

    /// Compare the integers held in window 0.
    pub fn compare(&self, x: &E::Ciphertext, y: &E::Ciphertext) -> Result<E::Ciphertext> {
        self.compare_window(x, y, 0)
    }

    /// Compare the first `count` windows pairwise with a single ripple.
    pub fn compare_batch(&self, x: &E::Ciphertext, y: &E::Ciphertext, count: usize) -> Result<Vec<E::Ciphertext>> {
        if count > self.windows() {
            return Err(Error::ShapeMismatch {
                what: "comparator batch",
                expected: self.windows(),
                found: count,
            });
        }
        let lanes = self.less_than_lanes(x, y)?;
        (0..count).map(|w| self.isolate(&lanes, w)).collect()
    }

    /// Keep the head bit of `window` and broadcast it to every slot.
    fn isolate(&self, lanes: &E::Ciphertext, window: usize) -> Result<E::Ciphertext> {
        let engine = self.engine;
        let mask = engine.encrypt(&one_hot(engine.slot_count(), window * BIT_WIDTH))?;
        let bit = engine.multiply(lanes, &mask)?;
        debug!(window, "comparison isolated");
        engine.total_sum(&bit)
    }
}
