//! CLUT Definition Segment parsing and colour tables.

use log::{debug, warn};

use super::SubtitleStore;
use crate::error::{DecodeError, DecodeResult};
use crate::utils::{rgb_to_rgba, ycbcr_to_rgba, BigEndianReader};

/// Entry belongs to the 4-entry (2-bit) table.
pub const CLUT_DEPTH_2BIT: u8 = 0x80;
/// Entry belongs to the 16-entry (4-bit) table.
pub const CLUT_DEPTH_4BIT: u8 = 0x40;
/// Entry belongs to the 256-entry (8-bit) table.
pub const CLUT_DEPTH_8BIT: u8 = 0x20;

/// One colour table with its 4, 16 and 256 entry variants.
///
/// Colours are stored as packed u32: [R, G, B, A] in little-endian byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clut {
    pub id: u8,
    /// `None` until a segment has been applied.
    pub version: Option<u8>,
    pub clut4: [u32; 4],
    pub clut16: [u32; 16],
    pub clut256: [u32; 256],
}

/// The table every region falls back to when its CLUT was never transmitted.
pub static DEFAULT_CLUT: Clut = Clut::default_tables();

impl Clut {
    /// The default CLUT of EN 300 743 §10.
    const fn default_tables() -> Self {
        let mut clut16 = [0u32; 16];
        let mut i = 1;
        while i < 16 {
            let level = if i < 8 { 255 } else { 127 };
            let r = if i & 1 != 0 { level } else { 0 };
            let g = if i & 2 != 0 { level } else { 0 };
            let b = if i & 4 != 0 { level } else { 0 };
            clut16[i] = rgb_to_rgba(r, g, b, 255);
            i += 1;
        }

        let mut clut256 = [0u32; 256];
        let mut i = 1;
        while i < 256 {
            let (r, g, b, a) = if i < 8 {
                (
                    if i & 1 != 0 { 255 } else { 0 },
                    if i & 2 != 0 { 255 } else { 0 },
                    if i & 4 != 0 { 255 } else { 0 },
                    63,
                )
            } else {
                let (base, low, high, a) = match i & 0x88 {
                    0x00 => (0, 85, 170, 255),
                    0x08 => (0, 85, 170, 127),
                    0x80 => (127, 43, 85, 255),
                    _ => (0, 43, 85, 255),
                };
                (
                    base + pick(i, 0x01, low) + pick(i, 0x10, high),
                    base + pick(i, 0x02, low) + pick(i, 0x20, high),
                    base + pick(i, 0x04, low) + pick(i, 0x40, high),
                    a,
                )
            };
            clut256[i] = rgb_to_rgba(r, g, b, a);
            i += 1;
        }

        Self {
            id: 0,
            version: None,
            clut4: [
                rgb_to_rgba(0, 0, 0, 0),
                rgb_to_rgba(255, 255, 255, 255),
                rgb_to_rgba(0, 0, 0, 255),
                rgb_to_rgba(127, 127, 127, 255),
            ],
            clut16,
            clut256,
        }
    }

    /// A fresh CLUT that starts out as a copy of the default tables.
    pub fn new(id: u8) -> Self {
        Self {
            id,
            ..DEFAULT_CLUT.clone()
        }
    }

    /// The table matching a region depth of 2, 4 or 8 bits.
    pub fn table(&self, depth: u8) -> &[u32] {
        match depth {
            2 => &self.clut4,
            8 => &self.clut256,
            _ => &self.clut16,
        }
    }

    /// Overwrite entries in place with the colours of a definition segment.
    pub fn apply(&mut self, segment: &ClutDefinitionSegment) {
        self.version = Some(segment.version);

        for entry in &segment.entries {
            let flags = entry.depth_flags & 0xE0;
            if flags.count_ones() > 1 {
                warn!("CLUT {} entry {}: more than one depth flag set: 0x{:02x}", self.id, entry.entry_id, flags);
            }

            let rgba = entry.to_rgba();
            let id = entry.entry_id as usize;
            let slot = if flags & CLUT_DEPTH_2BIT != 0 {
                self.clut4.get_mut(id)
            } else if flags & CLUT_DEPTH_4BIT != 0 {
                self.clut16.get_mut(id)
            } else {
                self.clut256.get_mut(id)
            };

            match slot {
                Some(slot) => *slot = rgba,
                None => debug!("CLUT {} entry {} does not fit depth flags 0x{:02x}", self.id, id, flags),
            }
        }
    }
}

const fn pick(i: usize, mask: usize, value: u8) -> u8 {
    if i & mask != 0 { value } else { 0 }
}

/// A single transmitted CLUT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClutEntry {
    pub entry_id: u8,
    /// 2-bit/4-bit/8-bit entry flags in the top three bits.
    pub depth_flags: u8,
    pub y: u8,
    pub cr: u8,
    pub cb: u8,
    /// Transparency; 0 is opaque.
    pub t: u8,
}

impl ClutEntry {
    /// Convert to RGBA. A luma of zero means fully transparent.
    pub fn to_rgba(&self) -> u32 {
        let t = if self.y == 0 { 0xFF } else { self.t };
        ycbcr_to_rgba(self.y, self.cb, self.cr, 255 - t)
    }
}

/// CLUT Definition Segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClutDefinitionSegment {
    pub id: u8,
    pub version: u8,
    pub entries: Vec<ClutEntry>,
}

impl ClutDefinitionSegment {
    /// Parse a CLUT definition segment from binary data.
    pub fn parse(reader: &mut BigEndianReader) -> DecodeResult<Self> {
        let id = reader.read_u8()?;
        let version = reader.read_u8()? >> 4;

        let mut entries = Vec::new();
        while reader.remaining() >= 2 {
            let entry_id = reader.read_u8()?;
            let flags = reader.read_u8()?;

            if flags & 0xE0 == 0 {
                return Err(DecodeError::malformed(format!(
                    "CLUT {} entry {} has no depth flag (0x{:02x})",
                    id, entry_id, flags
                )));
            }

            let entry = if flags & 0x01 != 0 {
                ClutEntry {
                    entry_id,
                    depth_flags: flags,
                    y: reader.read_u8()?,
                    cr: reader.read_u8()?,
                    cb: reader.read_u8()?,
                    t: reader.read_u8()?,
                }
            } else {
                // 6-bit Y, 4-bit Cr, 4-bit Cb, 2-bit T, each left-aligned
                let b0 = reader.read_u8()?;
                let b1 = reader.read_u8()?;
                ClutEntry {
                    entry_id,
                    depth_flags: flags,
                    y: b0 & 0xFC,
                    cr: (((b0 & 0x03) << 2) | (b1 >> 6)) << 4,
                    cb: (b1 << 2) & 0xF0,
                    t: (b1 << 6) & 0xC0,
                }
            };
            entries.push(entry);
        }

        Ok(Self { id, version, entries })
    }
}

impl SubtitleStore {
    /// Look up a CLUT, falling back to the default tables.
    pub fn clut_or_default(&self, id: u8) -> &Clut {
        self.cluts.get(&id).unwrap_or(&DEFAULT_CLUT)
    }

    /// Apply a CLUT segment. A repeated version is a no-op.
    pub fn apply_clut(&mut self, segment: &ClutDefinitionSegment) {
        let clut = self
            .cluts
            .entry(segment.id)
            .or_insert_with(|| Clut::new(segment.id));

        if clut.version == Some(segment.version) {
            debug!("CLUT {} version {} already applied", segment.id, segment.version);
            return;
        }
        clut.apply(segment);
    }
}
