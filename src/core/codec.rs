//! Bipolar sign-magnitude encoding.
//!
//! A value in `[-1, 1]` is scaled to an integer `m` in `[-max, max]` with
//! `max = 2^(bit_size-1) - 1`, then written as one sign bit followed by the
//! `bit_size - 1` magnitude bits of `|m|`, most significant first. Bits are
//! bipolar: `0 -> -1`, `1 -> +1`.

use crate::error::{HopfieldError, Result};

/// Neurons per unit block. Always in `MIN_BITS..=MAX_BITS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitWidth(u32);

impl BitWidth {
    /// One sign bit plus at least one magnitude bit.
    pub const MIN_BITS: u32 = 2;
    /// Keeps magnitudes exact in both `i64` and `f64`.
    pub const MAX_BITS: u32 = 32;

    pub fn new(bits: u32) -> Result<Self> {
        if !(Self::MIN_BITS..=Self::MAX_BITS).contains(&bits) {
            return Err(HopfieldError::InvalidConfig("bit_size must be in [2, 32]"));
        }
        Ok(Self(bits))
    }

    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn block_len(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn max_magnitude(self) -> i64 {
        (1i64 << (self.0 - 1)) - 1
    }
}

/// A neuron value that can be read as a bit.
///
/// Anything `> 0` is a `1` bit; `<= 0` is a `0` bit. Relaxing states are not
/// exactly ±1, so the threshold, not equality, decides.
pub trait NeuronBit: Copy {
    fn is_set(self) -> bool;
}

impl NeuronBit for i8 {
    #[inline]
    fn is_set(self) -> bool {
        self > 0
    }
}

impl NeuronBit for f64 {
    #[inline]
    fn is_set(self) -> bool {
        self > 0.0
    }
}

/// Encode one value into a fresh bit block.
pub fn encode_value(x: f64, width: BitWidth) -> Result<Vec<i8>> {
    let mut out = Vec::with_capacity(width.block_len());
    encode_into(x, width, &mut out)?;
    Ok(out)
}

/// Encode one value, appending its block to `out`.
///
/// Rounds ties to even. Out-of-range and non-finite inputs fail without
/// touching `out`.
pub fn encode_into(x: f64, width: BitWidth, out: &mut Vec<i8>) -> Result<()> {
    let max = width.max_magnitude();
    let scaled = (x * max as f64).round_ties_even();
    if !scaled.is_finite() || scaled.abs() > max as f64 {
        return Err(HopfieldError::EncodeOverflow {
            value: x,
            max_magnitude: max,
        });
    }

    let m = scaled as i64;
    out.push(if m >= 0 { 1 } else { -1 });

    let magnitude = m.unsigned_abs();
    for shift in (0..width.bits() - 1).rev() {
        out.push(if (magnitude >> shift) & 1 == 1 { 1 } else { -1 });
    }
    Ok(())
}

/// Decode one block: sign bit, then magnitude bits MSB first.
pub fn decode_value<B: NeuronBit>(bits: &[B]) -> Result<i64> {
    let n = bits.len();
    let (min, max) = (BitWidth::MIN_BITS as usize, BitWidth::MAX_BITS as usize);
    if !(min..=max).contains(&n) {
        return Err(HopfieldError::PatternSizeMismatch {
            expected: n.clamp(min, max),
            actual: n,
        });
    }

    let magnitude = bits[1..]
        .iter()
        .fold(0i64, |acc, b| (acc << 1) | b.is_set() as i64);
    Ok(if bits[0].is_set() {
        magnitude
    } else {
        -magnitude
    })
}

/// Encode every value and concatenate the blocks.
pub fn encode_values(values: &[f64], width: BitWidth) -> Result<EncodedPattern> {
    let mut bits = Vec::with_capacity(values.len() * width.block_len());
    for &x in values {
        encode_into(x, width, &mut bits)?;
    }
    Ok(EncodedPattern(bits))
}

/// A bipolar neuron pattern: every element is exactly -1 or +1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedPattern(Vec<i8>);

impl EncodedPattern {
    /// Wrap raw bits, rejecting anything that is not ±1.
    pub fn from_bits(bits: Vec<i8>) -> Result<Self> {
        if let Some((index, &value)) = bits
            .iter()
            .enumerate()
            .find(|(_, b)| **b != 1 && **b != -1)
        {
            return Err(HopfieldError::NotBipolar { index, value });
        }
        Ok(Self(bits))
    }

    /// Threshold arbitrary neuron values: `> 0 -> +1`, otherwise `-1`.
    pub fn from_neurons<B: NeuronBit>(values: &[B]) -> Self {
        Self(
            values
                .iter()
                .map(|v| if v.is_set() { 1 } else { -1 })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[i8] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<i8> {
        self.0
    }

    /// Number of positions where `other` reads as the same bit.
    pub fn agreement<B: NeuronBit>(&self, other: &[B]) -> usize {
        self.0
            .iter()
            .zip(other)
            .filter(|(a, b)| (**a > 0) == b.is_set())
            .count()
    }
}

impl AsRef<[i8]> for EncodedPattern {
    fn as_ref(&self) -> &[i8] {
        &self.0
    }
}
