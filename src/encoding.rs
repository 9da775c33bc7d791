//! Fixed-width two's-complement bit encoding, most significant bit first.

use crate::error::{Error, Result};

/// Bit width of every encrypted integer.
pub const BIT_WIDTH: usize = 16;

fn check_width(width: usize) -> Result<()> {
    if !(2..=63).contains(&width) {
        return Err(Error::Configuration(format!(
            "bit width must be in 2..=63, got {width}"
        )));
    }
    Ok(())
}

/// Smallest and largest value representable in `width` bits.
pub fn range(width: usize) -> Result<(i64, i64)> {
    check_width(width)?;
    let half = 1i64 << (width - 1);
    Ok((-half, half - 1))
}

/// Fails unless `value` fits in `width` two's-complement bits.
pub fn check_range(value: i64, width: usize) -> Result<()> {
    let (lo, hi) = range(width)?;
    if value < lo || value > hi {
        return Err(Error::ValueOutOfRange { value, width });
    }
    Ok(())
}

/// Encode `x` into `width` bits, MSB at index 0.
///
/// Negative values start from the digits of `|x|`. The LSB is kept as is and
/// seeds a carry of one when it is zero; every bit above it is inverted with
/// that carry rippling toward the MSB.
pub fn encode(x: i64, width: usize) -> Result<Vec<u8>> {
    check_range(x, width)?;

    let mut magnitude = x.unsigned_abs();
    let mut bits = vec![0u8; width];
    for bit in bits.iter_mut().rev() {
        *bit = (magnitude % 2) as u8;
        magnitude /= 2;
    }

    if x < 0 {
        let mut carry = u8::from(bits[width - 1] == 0);
        for bit in bits[..width - 1].iter_mut().rev() {
            let flipped = (1 - *bit) + carry;
            carry = flipped >> 1;
            *bit = flipped & 1;
        }
    }
    Ok(bits)
}

/// Inverse of [`encode`]: read MSB-first two's-complement bits back into an integer.
///
/// The bit count is held to the same 2..=63 widths `encode` accepts.
pub fn decode(bits: &[u8]) -> Result<i64> {
    check_width(bits.len())?;
    let (&sign, rest) = (&bits[0], &bits[1..]);
    let magnitude = rest
        .iter()
        .fold(0i64, |acc, &bit| (acc << 1) | i64::from(bit & 1));
    Ok(if sign & 1 == 1 {
        magnitude - (1i64 << rest.len())
    } else {
        magnitude
    })
}
