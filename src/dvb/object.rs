//! Object Data Segment parsing and the object/region display links.

use std::collections::BTreeMap;

use log::debug;

use super::{PixelBlock, SubtitleStore};
use crate::error::{DecodeError, DecodeResult};
use crate::utils::BigEndianReader;

/// Stable handle of an [`ObjectDisplay`] in [`ObjectDisplays`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DisplayId(u32);

/// Placement of one object inside one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectDisplay {
    pub object_id: u16,
    pub region_id: u8,
    /// Offset inside the region.
    pub x: u16,
    pub y: u16,
    /// Colour overrides for character objects (types 1 and 2).
    pub foreground: Option<u8>,
    pub background: Option<u8>,
}

/// Arena of object displays.
///
/// Regions and objects refer to entries by [`DisplayId`]; ids grow
/// monotonically so every per-region and per-object list stays sorted.
#[derive(Debug, Default)]
pub struct ObjectDisplays {
    entries: BTreeMap<DisplayId, ObjectDisplay>,
    next_id: u32,
}

impl ObjectDisplays {
    pub fn insert(&mut self, display: ObjectDisplay) -> DisplayId {
        let id = DisplayId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.insert(id, display);
        id
    }

    pub fn get(&self, id: DisplayId) -> Option<&ObjectDisplay> {
        self.entries.get(&id)
    }

    pub fn remove(&mut self, id: DisplayId) -> Option<ObjectDisplay> {
        self.entries.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DisplayId, &ObjectDisplay)> {
        self.entries.iter().map(|(&id, display)| (id, display))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Coding method of an object.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Bitmap = 0,
    Character = 1,
    CompositeString = 2,
    Reserved = 3,
}

impl ObjectType {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => ObjectType::Bitmap,
            1 => ObjectType::Character,
            2 => ObjectType::CompositeString,
            _ => ObjectType::Reserved,
        }
    }

    /// Character-coded objects carry foreground/background colours.
    #[inline]
    pub fn has_colours(&self) -> bool {
        matches!(self, ObjectType::Character | ObjectType::CompositeString)
    }
}

/// An object known from a region's object list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub id: u16,
    /// `None` until object data has been decoded, or after the regions
    /// showing it were cleared.
    pub version: Option<u8>,
    pub object_type: ObjectType,
    pub displays: Vec<DisplayId>,
}

impl Object {
    pub fn new(id: u16, object_type: ObjectType) -> Self {
        Self {
            id,
            version: None,
            object_type,
            displays: Vec::new(),
        }
    }
}

/// Payload of an object data segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectData<'a> {
    /// Coding method 0: interlaced pixel-data fields.
    Pixels { top: &'a [u8], bottom: &'a [u8] },
    /// Coding method 1: a character string.
    String,
    /// Any other coding method.
    Other(u8),
}

/// Object Data Segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDataSegment<'a> {
    pub id: u16,
    pub version: u8,
    pub non_modifying: bool,
    pub data: ObjectData<'a>,
}

impl<'a> ObjectDataSegment<'a> {
    /// Parse an object data segment. Field data is borrowed from the payload.
    pub fn parse(reader: &mut BigEndianReader<'a>) -> DecodeResult<Self> {
        let id = reader.read_u16()?;
        let flags = reader.read_u8()?;
        let version = flags >> 4;
        let coding_method = (flags >> 2) & 0x03;
        let non_modifying = (flags >> 1) & 0x01 == 1;

        let data = match coding_method {
            0 => {
                let top_len = reader.read_u16()? as usize;
                let bottom_len = reader.read_u16()? as usize;
                if top_len + bottom_len > reader.remaining() {
                    return Err(DecodeError::Truncated("object field data"));
                }
                ObjectData::Pixels {
                    top: reader.read_slice(top_len)?,
                    bottom: reader.read_slice(bottom_len)?,
                }
            }
            1 => ObjectData::String,
            other => ObjectData::Other(other),
        };

        Ok(Self {
            id,
            version,
            non_modifying,
            data,
        })
    }
}

impl SubtitleStore {
    /// Decode object data into every region that displays the object.
    ///
    /// Objects not referenced by any region are ignored. Regions that received
    /// pixels are marked dirty even if a later field fails.
    pub fn apply_object(&mut self, segment: &ObjectDataSegment) -> DecodeResult<()> {
        let Some(object) = self.objects.get_mut(&segment.id) else {
            debug!("object {} is not used by any region", segment.id);
            return Ok(());
        };
        if object.version == Some(segment.version) {
            debug!("object {} version {} already decoded", segment.id, segment.version);
            return Ok(());
        }
        object.version = Some(segment.version);

        let (top, bottom) = match segment.data {
            ObjectData::Pixels { top, bottom } => (top, bottom),
            ObjectData::String => {
                return Err(DecodeError::unsupported("object coding method 1 (character string)"));
            }
            ObjectData::Other(method) => {
                return Err(DecodeError::unsupported(format!("object coding method {}", method)));
            }
        };
        // progressive content repeats the top field
        let bottom = if bottom.is_empty() { top } else { bottom };

        for &display_id in &object.displays {
            let Some(display) = self.displays.get(display_id) else {
                continue;
            };
            let Some(region) = self.regions.get_mut(&display.region_id) else {
                continue;
            };

            let (x, y) = (display.x as usize, display.y as usize);
            let mut block = PixelBlock::new(
                &mut region.pixels,
                region.width as usize,
                region.height as usize,
                region.depth,
            );
            let result = block
                .decode(top, x, y, segment.non_modifying)
                .and_then(|_| block.decode(bottom, x, y + 1, segment.non_modifying));
            if block.pixels_written() > 0 {
                region.dirty = true;
            }
            result?;
        }

        Ok(())
    }

    /// Remove displays from the arena and from their objects. Objects left
    /// without any display are dropped.
    pub(crate) fn unlink_displays(&mut self, ids: &[DisplayId]) {
        for &id in ids {
            let Some(display) = self.displays.remove(id) else {
                continue;
            };
            let Some(object) = self.objects.get_mut(&display.object_id) else {
                continue;
            };
            if let Ok(pos) = object.displays.binary_search(&id) {
                object.displays.remove(pos);
            }
            if object.displays.is_empty() {
                debug!("object {} has no displays left", display.object_id);
                self.objects.remove(&display.object_id);
            }
        }
    }
}
