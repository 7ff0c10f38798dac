//! Run-length decoding for DVB pixel-data sub-blocks (EN 300 743 §7.2.5.1).
//!
//! Each pixel string writes into one row of a region buffer through a
//! [`RowWriter`], which tracks the cursor, the optional map table and the
//! non-modifying colour flag.

use log::debug;

use crate::error::{DecodeError, DecodeResult};
use crate::utils::BitReader;

const OP_2BIT_STRING: u8 = 0x10;
const OP_4BIT_STRING: u8 = 0x11;
const OP_8BIT_STRING: u8 = 0x12;
const OP_MAP_2TO4: u8 = 0x20;
const OP_MAP_2TO8: u8 = 0x21;
const OP_MAP_4TO8: u8 = 0x22;
const OP_END_OF_LINE: u8 = 0xF0;

/// Cursor over one destination row.
pub struct RowWriter<'a> {
    row: &'a mut [u8],
    x: usize,
    map: Option<&'a [u8]>,
    non_modifying: bool,
    written: usize,
}

impl<'a> RowWriter<'a> {
    pub fn new(row: &'a mut [u8], x: usize, map: Option<&'a [u8]>, non_modifying: bool) -> Self {
        Self {
            row,
            x,
            map,
            non_modifying,
            written: 0,
        }
    }

    /// Current x position in the row.
    #[inline]
    pub fn x(&self) -> usize {
        self.x
    }

    /// Number of pixels actually stored.
    #[inline]
    pub fn written(&self) -> usize {
        self.written
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.x >= self.row.len()
    }

    /// Emit `run` pixels of `value`. With the non-modifying flag set, value 1
    /// only moves the cursor.
    fn put(&mut self, value: u32, run: u32) {
        let width = self.row.len();
        if self.non_modifying && value == 1 {
            self.x = (self.x + run as usize).min(width);
            return;
        }

        let index = value as usize;
        let pixel = match self.map {
            Some(map) => map.get(index).copied().unwrap_or(value as u8),
            None => value as u8,
        };
        let end = (self.x + run as usize).min(width);
        if end > self.x {
            self.row[self.x..end].fill(pixel);
            self.written += end - self.x;
            self.x = end;
        }
    }
}

/// Decode a 2-bit/pixel code string. Returns the number of source bytes used.
pub fn read_2bit_string(out: &mut RowWriter, src: &[u8]) -> DecodeResult<usize> {
    let mut bits = BitReader::new(src);

    while bits.position() < bits.size_in_bits() && !out.is_full() {
        let code = bits.read_bits(2);
        if code != 0 {
            out.put(code, 1);
            continue;
        }

        if bits.read_bit() == 1 {
            let run = bits.read_bits(3) + 3;
            let value = bits.read_bits(2);
            out.put(value, run);
        } else if bits.read_bit() == 1 {
            out.put(0, 1);
        } else {
            match bits.read_bits(2) {
                2 => {
                    let run = bits.read_bits(4) + 12;
                    let value = bits.read_bits(2);
                    out.put(value, run);
                }
                3 => {
                    let run = bits.read_bits(8) + 29;
                    let value = bits.read_bits(2);
                    out.put(value, run);
                }
                1 => out.put(0, 2),
                _ => return Ok(bits.bytes_consumed()),
            }
        }
    }

    if bits.read_bits(6) != 0 {
        return Err(DecodeError::malformed("line overflow in 2-bit pixel string"));
    }
    Ok(bits.bytes_consumed())
}

/// Decode a 4-bit/pixel code string. Returns the number of source bytes used.
pub fn read_4bit_string(out: &mut RowWriter, src: &[u8]) -> DecodeResult<usize> {
    let mut bits = BitReader::new(src);

    while bits.position() < bits.size_in_bits() && !out.is_full() {
        let code = bits.read_bits(4);
        if code != 0 {
            out.put(code, 1);
            continue;
        }

        if bits.read_bit() == 0 {
            let run = bits.read_bits(3);
            if run == 0 {
                return Ok(bits.bytes_consumed());
            }
            out.put(0, run + 2);
        } else if bits.read_bit() == 0 {
            let run = bits.read_bits(2) + 4;
            let value = bits.read_bits(4);
            out.put(value, run);
        } else {
            match bits.read_bits(2) {
                2 => {
                    let run = bits.read_bits(4) + 9;
                    let value = bits.read_bits(4);
                    out.put(value, run);
                }
                3 => {
                    let run = bits.read_bits(8) + 25;
                    let value = bits.read_bits(4);
                    out.put(value, run);
                }
                1 => out.put(0, 2),
                _ => out.put(0, 1),
            }
        }
    }

    if bits.read_bits(8) != 0 {
        return Err(DecodeError::malformed("line overflow in 4-bit pixel string"));
    }
    Ok(bits.bytes_consumed())
}

/// Decode an 8-bit/pixel code string. Returns the number of source bytes used.
pub fn read_8bit_string(out: &mut RowWriter, src: &[u8]) -> DecodeResult<usize> {
    let byte_at = |pos: usize| u32::from(src.get(pos).copied().unwrap_or(0));
    let mut pos = 0;

    while pos < src.len() && !out.is_full() {
        let code = byte_at(pos);
        pos += 1;
        if code != 0 {
            out.put(code, 1);
            continue;
        }

        let flag = byte_at(pos);
        pos += 1;
        let run = flag & 0x7F;
        if flag & 0x80 == 0 {
            if run == 0 {
                return Ok(pos.min(src.len()));
            }
            out.put(0, run);
        } else {
            let value = byte_at(pos);
            pos += 1;
            out.put(value, run);
        }
    }

    // end of string: a zero code byte, then a zero flag byte
    if byte_at(pos) != 0 {
        return Err(DecodeError::malformed("line overflow in 8-bit pixel string"));
    }
    pos += 1;
    if pos < src.len() && byte_at(pos) == 0 {
        pos += 1;
    }
    Ok(pos.min(src.len()))
}

/// Map tables used to widen 2- and 4-bit codes into deeper regions.
///
/// Reset to the standard defaults at the start of every pixel-data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapTables {
    pub map2to4: [u8; 4],
    pub map2to8: [u8; 4],
    pub map4to8: [u8; 16],
}

impl Default for MapTables {
    fn default() -> Self {
        Self {
            map2to4: [0x0, 0x7, 0x8, 0xF],
            map2to8: [0x00, 0x77, 0x88, 0xFF],
            map4to8: [
                0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF,
            ],
        }
    }
}

/// A region pixel buffer being written by one or more pixel-data blocks.
pub struct PixelBlock<'a> {
    pixels: &'a mut [u8],
    width: usize,
    height: usize,
    depth: u8,
    written: usize,
}

impl<'a> PixelBlock<'a> {
    pub fn new(pixels: &'a mut [u8], width: usize, height: usize, depth: u8) -> Self {
        let height = if width == 0 { 0 } else { height.min(pixels.len() / width) };
        Self {
            pixels,
            width,
            height,
            depth,
            written: 0,
        }
    }

    /// Pixels stored so far, including those of blocks that later failed.
    #[inline]
    pub fn pixels_written(&self) -> usize {
        self.written
    }

    /// Decode one field of a pixel-data block starting at (`x0`, `y0`).
    ///
    /// Successive lines of the field advance `y` by two, since top and bottom
    /// fields are interleaved in the region.
    pub fn decode(&mut self, data: &[u8], x0: usize, y0: usize, non_modifying: bool) -> DecodeResult<()> {
        let mut maps = MapTables::default();
        let mut x = x0;
        let mut y = y0;
        let mut pos = 0;

        while pos < data.len() {
            let op = data[pos];
            if (op != OP_END_OF_LINE && x >= self.width) || y >= self.height {
                return Err(DecodeError::malformed(format!(
                    "invalid object location {}/{} {}/{} opcode 0x{:02x}",
                    x, self.width, y, self.height, op
                )));
            }
            pos += 1;

            match op {
                OP_2BIT_STRING => {
                    let map = match self.depth {
                        8 => Some(&maps.map2to8[..]),
                        4 => Some(&maps.map2to4[..]),
                        _ => None,
                    };
                    let (next_x, used) = self.read_string(read_2bit_string, &data[pos..], x, y, map, non_modifying)?;
                    x = next_x;
                    pos += used;
                }
                OP_4BIT_STRING => {
                    if self.depth < 4 {
                        return Err(DecodeError::malformed(format!(
                            "4-bit pixel string in {}-bit region",
                            self.depth
                        )));
                    }
                    let map = if self.depth == 8 { Some(&maps.map4to8[..]) } else { None };
                    let (next_x, used) = self.read_string(read_4bit_string, &data[pos..], x, y, map, non_modifying)?;
                    x = next_x;
                    pos += used;
                }
                OP_8BIT_STRING => {
                    if self.depth < 8 {
                        return Err(DecodeError::malformed(format!(
                            "8-bit pixel string in {}-bit region",
                            self.depth
                        )));
                    }
                    let (next_x, used) = self.read_string(read_8bit_string, &data[pos..], x, y, None, non_modifying)?;
                    x = next_x;
                    pos += used;
                }
                OP_MAP_2TO4 => {
                    let entries = data.get(pos..pos + 2).ok_or(DecodeError::Truncated("2-to-4 map table"))?;
                    maps.map2to4 = [entries[0] >> 4, entries[0] & 0x0F, entries[1] >> 4, entries[1] & 0x0F];
                    pos += 2;
                }
                OP_MAP_2TO8 => {
                    let entries = data.get(pos..pos + 4).ok_or(DecodeError::Truncated("2-to-8 map table"))?;
                    maps.map2to8.copy_from_slice(entries);
                    pos += 4;
                }
                OP_MAP_4TO8 => {
                    let entries = data.get(pos..pos + 16).ok_or(DecodeError::Truncated("4-to-8 map table"))?;
                    maps.map4to8.copy_from_slice(entries);
                    pos += 16;
                }
                OP_END_OF_LINE => {
                    x = x0;
                    y += 2;
                }
                other => {
                    return Err(DecodeError::malformed(format!("unknown pixel data opcode 0x{:02x}", other)));
                }
            }
        }

        Ok(())
    }

    fn read_string(
        &mut self,
        reader: fn(&mut RowWriter, &[u8]) -> DecodeResult<usize>,
        src: &[u8],
        x: usize,
        y: usize,
        map: Option<&[u8]>,
        non_modifying: bool,
    ) -> DecodeResult<(usize, usize)> {
        let start = y * self.width;
        let row = &mut self.pixels[start..start + self.width];
        let mut out = RowWriter::new(row, x, map, non_modifying);
        let result = reader(&mut out, src);
        self.written += out.written();
        let next_x = out.x();
        match result {
            Ok(used) => Ok((next_x, used)),
            Err(e) => {
                debug!("pixel string at ({}, {}) failed: {}", x, y, e);
                Err(e)
            }
        }
    }
}
