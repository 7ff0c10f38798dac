//! Display Definition Segment.

use log::debug;

use super::SubtitleStore;
use crate::error::DecodeResult;
use crate::utils::BigEndianReader;

/// The display window subtitles are positioned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayDefinition {
    pub version: u8,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl DisplayDefinition {
    /// Parse a display definition segment. Segments shorter than five bytes
    /// carry no usable definition and yield `None`.
    pub fn parse(reader: &mut BigEndianReader) -> DecodeResult<Option<Self>> {
        let length = reader.remaining();
        if length < 5 {
            return Ok(None);
        }

        let flags = reader.read_u8()?;
        let mut definition = Self {
            version: flags >> 4,
            x: 0,
            y: 0,
            width: reader.read_u16()?.wrapping_add(1),
            height: reader.read_u16()?.wrapping_add(1),
        };

        // display_window_flag
        if flags & 0x08 != 0 && length >= 13 {
            let x_min = reader.read_u16()?;
            let x_max = reader.read_u16()?;
            let y_min = reader.read_u16()?;
            let y_max = reader.read_u16()?;
            definition.x = x_min;
            definition.width = x_max.wrapping_sub(x_min).wrapping_add(1);
            definition.y = y_min;
            definition.height = y_max.wrapping_sub(y_min).wrapping_add(1);
        }

        Ok(Some(definition))
    }
}

impl SubtitleStore {
    /// Store a display definition unless the same version is already present.
    pub fn apply_display_definition(&mut self, definition: DisplayDefinition) {
        if let Some(current) = &self.display_definition {
            if current.version == definition.version {
                debug!("display definition version {} already applied", definition.version);
                return;
            }
        }
        self.display_definition = Some(definition);
    }
}
