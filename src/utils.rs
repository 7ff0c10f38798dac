//! Utility functions for binary reading and color conversion.

use std::hash::Hasher;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{DecodeError, DecodeResult};

/// Binary reader wrapper for big-endian segment data.
pub struct BigEndianReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> BigEndianReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    #[inline]
    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.cursor.read_u8()?)
    }

    #[inline]
    pub fn read_u16(&mut self) -> DecodeResult<u16> {
        Ok(self.cursor.read_u16::<BigEndian>()?)
    }

    #[inline]
    pub fn read_u24(&mut self) -> DecodeResult<u32> {
        Ok(self.cursor.read_u24::<BigEndian>()?)
    }

    /// Borrow the next `len` bytes without copying them.
    pub fn read_slice(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(DecodeError::Truncated("segment payload"));
        }
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = self.position();
        self.cursor.set_position((start + len) as u64);
        Ok(&data[start..start + len])
    }

    #[inline]
    pub fn skip(&mut self, len: usize) -> DecodeResult<()> {
        self.read_slice(len).map(|_| ())
    }
}

/// Bit-granular reader over a byte slice, most significant bit first.
///
/// Reads past the declared capacity yield zero bits instead of failing, so a
/// run-length decoder can always perform its trailing padding check.
pub struct BitReader<'a> {
    data: &'a [u8],
    size_in_bits: usize,
    index: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_capacity(data, data.len() * 8)
    }

    /// Reader limited to the first `bits` bits of `data`.
    pub fn with_capacity(data: &'a [u8], bits: usize) -> Self {
        Self {
            data,
            size_in_bits: bits.min(data.len() * 8),
            index: 0,
        }
    }

    /// Number of bits consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn size_in_bits(&self) -> usize {
        self.size_in_bits
    }

    /// Whole bytes touched by the reads so far.
    #[inline]
    pub fn bytes_consumed(&self) -> usize {
        (self.index + 7) >> 3
    }

    #[inline]
    pub fn read_bit(&mut self) -> u32 {
        if self.index >= self.size_in_bits {
            return 0;
        }
        let byte = self.data[self.index >> 3];
        let bit = (byte >> (7 - (self.index & 7))) & 1;
        self.index += 1;
        u32::from(bit)
    }

    /// Read `n` bits (1..=25) as an unsigned value. Out-of-range widths read nothing.
    pub fn read_bits(&mut self, n: u32) -> u32 {
        if n == 0 || n > 25 {
            return 0;
        }
        let mut value = 0;
        for _ in 0..n {
            value = (value << 1) | self.read_bit();
        }
        value
    }
}

const CROP_OFFSET: i32 = 384;

/// Saturating lookup for BT.601 reconstruction; index `v + 384` yields `v` clamped to 0..=255.
static CROP_TABLE: [u8; 1024] = build_crop_table();

const fn build_crop_table() -> [u8; 1024] {
    let mut table = [0u8; 1024];
    let mut i = 0;
    while i < 1024 {
        let v = i as i32 - CROP_OFFSET;
        table[i] = if v < 0 {
            0
        } else if v > 255 {
            255
        } else {
            v as u8
        };
        i += 1;
    }
    table
}

#[inline]
fn crop(value: i32) -> u8 {
    CROP_TABLE[clamp(value + CROP_OFFSET, 0, 1023) as usize]
}

/// Convert studio-range YCbCr (BT.601) to RGBA packed as u32 in little-endian: R, G, B, A.
#[inline]
pub fn ycbcr_to_rgba(y: u8, cb: u8, cr: u8, a: u8) -> u32 {
    let cb = f32::from(cb) - 128.0;
    let cr = f32::from(cr) - 128.0;

    let r_add = (1.40200 * 255.0 / 224.0 * cr).round() as i32;
    let g_add = -((0.34414 * 255.0 / 224.0 * cb).round() as i32)
        - (0.71414 * 255.0 / 224.0 * cr).round() as i32;
    let b_add = (1.77200 * 255.0 / 224.0 * cb).round() as i32;

    let y = ((f32::from(y) - 16.0) * 255.0 / 219.0).round() as i32;

    rgb_to_rgba(crop(y + r_add), crop(y + g_add), crop(y + b_add), a)
}

/// Convert RGB to packed RGBA u32.
#[inline]
pub const fn rgb_to_rgba(r: u8, g: u8, b: u8, a: u8) -> u32 {
    u32::from_le_bytes([r, g, b, a])
}

#[inline]
pub fn clamp<T: Ord>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// 64-bit FNV-1a, used to recognise repeated bitmaps.
pub struct Fnv1aHasher(u64);

impl Default for Fnv1aHasher {
    fn default() -> Self {
        Self(0xcbf2_9ce4_8422_2325)
    }
}

impl Hasher for Fnv1aHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= u64::from(byte);
            self.0 = self.0.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

/// Fast binary search for finding timestamp index.
pub fn binary_search_timestamp(timestamps: &[u32], target: u32) -> usize {
    if timestamps.is_empty() {
        return 0;
    }

    let mut low = 0;
    let mut high = timestamps.len();

    while low < high {
        let mid = low + (high - low) / 2;
        if timestamps[mid] <= target {
            low = mid + 1;
        } else {
            high = mid;
        }
    }

    if low > 0 { low - 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_search_timestamp() {
        let timestamps = vec![0, 1000, 2000, 3000, 4000];

        assert_eq!(binary_search_timestamp(&timestamps, 0), 0);
        assert_eq!(binary_search_timestamp(&timestamps, 500), 0);
        assert_eq!(binary_search_timestamp(&timestamps, 1000), 1);
        assert_eq!(binary_search_timestamp(&timestamps, 4500), 4);
    }

    #[test]
    fn test_ycbcr_to_rgba() {
        // Studio white (Y=235) -> RGB(255, 255, 255)
        let white = ycbcr_to_rgba(235, 128, 128, 255);
        assert_eq!(white.to_le_bytes(), [255, 255, 255, 255]);

        // Studio red
        let red = ycbcr_to_rgba(81, 90, 240, 255);
        assert_eq!(red.to_le_bytes(), [255, 0, 0, 255]);

        // Black stays black, below-range luma clamps
        assert_eq!(ycbcr_to_rgba(16, 128, 128, 7).to_le_bytes(), [0, 0, 0, 7]);
        assert_eq!(ycbcr_to_rgba(0, 128, 128, 0).to_le_bytes(), [0, 0, 0, 0]);
    }

    #[test]
    fn test_big_endian_reader() {
        let data = [0x0F, 0x12, 0x34, 0x56, 0x78, 0x9A];
        let mut reader = BigEndianReader::new(&data);
        assert_eq!(reader.read_u8(), Ok(0x0F));
        assert_eq!(reader.read_u16(), Ok(0x1234));
        assert_eq!(reader.read_u24(), Ok(0x56789A));
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.read_u8(), Err(DecodeError::Truncated("segment data")));
        assert!(reader.read_slice(1).is_err());
    }

    #[test]
    fn test_bit_reader_reads_msb_first() {
        let data = [0b1011_0010, 0b0111_1111];
        let mut bits = BitReader::new(&data);
        assert_eq!(bits.read_bits(2), 0b10);
        assert_eq!(bits.read_bit(), 1);
        assert_eq!(bits.read_bits(9), 0b1_0010_0111);
        assert_eq!(bits.position(), 12);
        assert_eq!(bits.bytes_consumed(), 2);
    }

    #[test]
    fn test_bit_reader_past_end_yields_zero() {
        let data = [0xF1];
        let mut bits = BitReader::new(&data);
        assert_eq!(bits.read_bits(10), 0b11_1100_0100);
        assert_eq!(bits.position(), 8);
        assert_eq!(bits.read_bits(25), 0);
        assert_eq!(bits.read_bits(26), 0);
    }

    #[test]
    fn test_bit_reader_capacity() {
        let data = [0xFF];
        let mut bits = BitReader::with_capacity(&data, 4);
        assert_eq!(bits.size_in_bits(), 4);
        assert_eq!(bits.read_bits(6), 0b1111_00);
        assert_eq!(bits.position(), 4);
    }

    #[test]
    fn test_fnv1a_reference_value() {
        let mut hasher = Fnv1aHasher::default();
        hasher.write(b"a");
        assert_eq!(hasher.finish(), 0xaf63_dc4c_8601_ec8c);
    }
}
