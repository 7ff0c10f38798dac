//! Region Composition Segment parsing and region buffers.

use log::{debug, warn};

use super::{DisplayId, Object, ObjectDisplay, ObjectType, SubtitleStore};
use crate::error::{try_alloc, DecodeError, DecodeResult};
use crate::utils::BigEndianReader;

/// A region canvas holding decoded object pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub id: u8,
    pub version: Option<u8>,
    pub width: u16,
    pub height: u16,
    /// Bits per pixel: 2, 4 or 8.
    pub depth: u8,
    pub clut: u8,
    pub bg_color: u8,
    /// Exactly `width * height` palette indices.
    pub pixels: Vec<u8>,
    pub dirty: bool,
    pub displays: Vec<DisplayId>,
}

impl Region {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            version: None,
            width: 0,
            height: 0,
            depth: 4,
            clut: 0,
            bg_color: 0,
            pixels: Vec::new(),
            dirty: false,
            displays: Vec::new(),
        }
    }

    /// Whether any pixel differs from the background colour.
    pub fn has_content(&self) -> bool {
        self.pixels.iter().any(|&p| p != self.bg_color)
    }
}

/// An object placement listed in a region segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionObject {
    pub object_id: u16,
    pub object_type: ObjectType,
    pub x: u16,
    pub y: u16,
    pub foreground: Option<u8>,
    pub background: Option<u8>,
}

/// Region Composition Segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionCompositionSegment {
    pub id: u8,
    pub version: u8,
    pub fill: bool,
    pub width: u16,
    pub height: u16,
    pub depth: u8,
    pub clut: u8,
    pub bg_color: u8,
    pub objects: Vec<RegionObject>,
}

impl RegionCompositionSegment {
    /// Parse a region composition segment from binary data.
    pub fn parse(reader: &mut BigEndianReader) -> DecodeResult<Self> {
        if reader.remaining() < 10 {
            return Err(DecodeError::Truncated("region composition segment"));
        }

        let id = reader.read_u8()?;
        let flags = reader.read_u8()?;
        let version = flags >> 4;
        let fill = (flags >> 3) & 0x01 == 1;
        let width = reader.read_u16()?;
        let height = reader.read_u16()?;

        let level = reader.read_u8()?;
        let mut depth = 1u8 << ((level >> 2) & 0x07);
        if !matches!(depth, 2 | 4 | 8) {
            warn!("region {} depth {} is invalid, using 4", id, depth);
            depth = 4;
        }
        let clut = reader.read_u8()?;

        let bg_color = if depth == 8 {
            let bg = reader.read_u8()?;
            reader.skip(1)?;
            bg
        } else {
            reader.skip(1)?;
            let packed = reader.read_u8()?;
            if depth == 4 {
                (packed >> 4) & 0x0F
            } else {
                (packed >> 2) & 0x03
            }
        };

        let mut objects = Vec::new();
        while reader.remaining() >= 6 {
            let object_id = reader.read_u16()?;
            let word = reader.read_u16()?;
            let object_type = ObjectType::from_bits((word >> 14) as u8);
            let x = word & 0x0FFF;
            let y = reader.read_u16()? & 0x0FFF;

            let (foreground, background) = if object_type.has_colours() && reader.remaining() >= 2 {
                (Some(reader.read_u8()?), Some(reader.read_u8()?))
            } else {
                (None, None)
            };

            objects.push(RegionObject {
                object_id,
                object_type,
                x,
                y,
                foreground,
                background,
            });
        }

        Ok(Self {
            id,
            version,
            fill,
            width,
            height,
            depth,
            clut,
            bg_color,
            objects,
        })
    }
}

impl SubtitleStore {
    /// Apply a region segment. A repeated version is a no-op.
    ///
    /// The region's object list is replaced: old displays are unlinked from
    /// their objects and new ones are created, adding placeholder objects for
    /// ids not seen before.
    pub fn apply_region(&mut self, segment: &RegionCompositionSegment) -> DecodeResult<()> {
        let region = self
            .regions
            .entry(segment.id)
            .or_insert_with(|| Region::new(segment.id));

        if region.version == Some(segment.version) {
            debug!("region {} version {} already applied", segment.id, segment.version);
            return Ok(());
        }
        region.version = Some(segment.version);

        let mut fill = segment.fill;
        let len = segment.width as usize * segment.height as usize;
        if region.width != segment.width || region.height != segment.height || region.pixels.len() != len {
            region.pixels = try_alloc(len, segment.bg_color)?;
            region.width = segment.width;
            region.height = segment.height;
            region.dirty = false;
            fill = true;
        }

        region.depth = segment.depth;
        region.clut = segment.clut;
        region.bg_color = segment.bg_color;
        if fill {
            region.pixels.fill(segment.bg_color);
        }

        let old = std::mem::take(&mut region.displays);
        self.unlink_displays(&old);

        let mut added = Vec::with_capacity(segment.objects.len());
        for entry in &segment.objects {
            let id = self.displays.insert(ObjectDisplay {
                object_id: entry.object_id,
                region_id: segment.id,
                x: entry.x,
                y: entry.y,
                foreground: entry.foreground,
                background: entry.background,
            });

            let object = self
                .objects
                .entry(entry.object_id)
                .or_insert_with(|| Object::new(entry.object_id, entry.object_type));
            object.object_type = entry.object_type;
            object.displays.push(id);
            // a cleared canvas needs the object drawn again, whatever its version
            if fill {
                object.version = None;
            }
            added.push(id);
        }

        if let Some(region) = self.regions.get_mut(&segment.id) {
            region.displays = added;
        }
        Ok(())
    }
}
