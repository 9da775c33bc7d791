//! Slot layout of encrypted integers: one `BIT_WIDTH`-slot window per value.
//!
//! Window `w` covers slots `[w * width, (w + 1) * width)`; its first slot (the
//! window head) holds the sign bit.

use itertools::Itertools;

use crate::encoding::{self, BIT_WIDTH};
use crate::engine::{Decryptor, HomomorphicEngine};
use crate::error::{Error, Result};

/// Number of whole windows of `width` slots that fit in `slots`.
#[must_use]
pub fn window_count(slots: usize, width: usize) -> usize {
    slots / width
}

/// Place one bit array into window 0 of a zero plaintext of `slots` slots.
pub fn pack(bits: &[u8], slots: usize) -> Result<Vec<u64>> {
    pack_windows(&[bits], slots)
}

/// Place each bit array into its own consecutive window.
pub fn pack_windows<B: AsRef<[u8]>>(windows: &[B], slots: usize) -> Result<Vec<u64>> {
    let available = window_count(slots, BIT_WIDTH);
    if windows.len() > available {
        return Err(Error::ShapeMismatch {
            what: "packed windows",
            expected: available,
            found: windows.len(),
        });
    }

    let mut plaintext = vec![0u64; slots];
    for (w, bits) in windows.iter().enumerate() {
        let bits = bits.as_ref();
        if bits.len() != BIT_WIDTH {
            return Err(Error::ShapeMismatch {
                what: "encrypted integer width",
                expected: BIT_WIDTH,
                found: bits.len(),
            });
        }
        let start = w * BIT_WIDTH;
        for (slot, &bit) in plaintext[start..start + BIT_WIDTH].iter_mut().zip(bits) {
            *slot = u64::from(bit & 1);
        }
    }
    Ok(plaintext)
}

/// Encode and pack a single value into window 0.
pub fn pack_value(value: i64, slots: usize) -> Result<Vec<u64>> {
    pack(&encoding::encode(value, BIT_WIDTH)?, slots)
}

/// Encode and pack several values into consecutive windows (batching).
pub fn pack_values(values: &[i64], slots: usize) -> Result<Vec<u64>> {
    let encoded: Vec<Vec<u8>> = values
        .iter()
        .map(|&v| encoding::encode(v, BIT_WIDTH))
        .collect::<Result<_>>()?;
    pack_windows(&encoded, slots)
}

/// Read window `window` of a decrypted slot vector back as bits.
pub fn unpack(slots: &[u64], window: usize) -> Result<Vec<u8>> {
    let available = window_count(slots.len(), BIT_WIDTH);
    if window >= available {
        return Err(Error::ShapeMismatch {
            what: "window index",
            expected: available,
            found: window,
        });
    }
    let start = window * BIT_WIDTH;
    Ok(slots[start..start + BIT_WIDTH]
        .iter()
        .map(|&s| (s & 1) as u8)
        .collect_vec())
}

/// Read window `window` of a decrypted slot vector back as a signed integer.
pub fn unpack_value(slots: &[u64], window: usize) -> Result<i64> {
    encoding::decode(&unpack(slots, window)?)
}

/// Decrypt a ciphertext and decode one of its windows. Client-side debugging aid.
pub fn decrypt_and_unpack<E, K>(engine: &E, key: &K, ct: &E::Ciphertext, window: usize) -> Result<i64>
where
    E: HomomorphicEngine,
    K: Decryptor<E>,
{
    let slots = key.decrypt(engine, ct)?;
    unpack_value(&slots, window)
}

/// A single 1 at `index`.
#[must_use]
pub fn one_hot(slots: usize, index: usize) -> Vec<u64> {
    let mut mask = vec![0u64; slots];
    if index < slots {
        mask[index] = 1;
    }
    mask
}

/// 1 at the head slot of every whole window.
#[must_use]
pub fn head_mask(slots: usize, width: usize) -> Vec<u64> {
    let covered = window_count(slots, width) * width;
    (0..slots)
        .map(|i| u64::from(i < covered && i % width == 0))
        .collect()
}

/// 1 at every non-head slot of every whole window.
#[must_use]
pub fn body_mask(slots: usize, width: usize) -> Vec<u64> {
    let covered = window_count(slots, width) * width;
    (0..slots)
        .map(|i| u64::from(i < covered && i % width != 0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout() {
        let plaintext = pack_value(8, 64).unwrap();
        assert_eq!(plaintext.len(), 64);
        assert_eq!(plaintext[12], 1);
        assert_eq!(plaintext.iter().sum::<u64>(), 1);
    }

    #[test]
    fn test_pack_values_disjoint_windows() {
        let plaintext = pack_values(&[8, 3, 4], 64).unwrap();
        assert_eq!(unpack_value(&plaintext, 0).unwrap(), 8);
        assert_eq!(unpack_value(&plaintext, 1).unwrap(), 3);
        assert_eq!(unpack_value(&plaintext, 2).unwrap(), 4);
        assert_eq!(unpack_value(&plaintext, 3).unwrap(), 0);
    }

    #[test]
    fn test_negative_values_unpack() {
        let plaintext = pack_values(&[-27, -32768, 32767], 48).unwrap();
        assert_eq!(unpack_value(&plaintext, 0).unwrap(), -27);
        assert_eq!(unpack_value(&plaintext, 1).unwrap(), -32768);
        assert_eq!(unpack_value(&plaintext, 2).unwrap(), 32767);
    }

    #[test]
    fn test_shape_errors() {
        assert!(matches!(
            pack(&[1, 0, 1], 64),
            Err(Error::ShapeMismatch { expected: 16, found: 3, .. })
        ));
        assert!(matches!(
            pack_values(&[1, 2, 3], 32),
            Err(Error::ShapeMismatch { expected: 2, found: 3, .. })
        ));
        assert!(unpack(&[0; 32], 2).is_err());
    }

    #[test]
    fn test_decrypt_and_unpack() {
        use crate::engine::{ClearEngine, ClearParams};

        let (eng, sk) = ClearEngine::generate_keypair(ClearParams::default()).unwrap();
        let ct = eng.encrypt(&pack_values(&[-27, 18], 64).unwrap()).unwrap();
        assert_eq!(decrypt_and_unpack(&eng, &sk, &ct, 0).unwrap(), -27);
        assert_eq!(decrypt_and_unpack(&eng, &sk, &ct, 1).unwrap(), 18);
        assert!(decrypt_and_unpack(&eng, &sk, &ct, 4).is_err());
    }

    #[test]
    fn test_masks() {
        let heads = head_mask(40, 16);
        let body = body_mask(40, 16);
        assert_eq!(heads.iter().positions(|&b| b == 1).collect_vec(), vec![0, 16]);
        assert_eq!(body.iter().sum::<u64>(), 30);
        assert_eq!(body[32..].iter().sum::<u64>(), 0);
        assert_eq!(one_hot(8, 3), vec![0, 0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(one_hot(4, 9), vec![0; 4]);
    }
}
