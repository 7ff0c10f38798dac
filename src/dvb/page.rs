//! Page Composition Segment parsing and the page display list.

use log::debug;

use super::{PageState, SubtitleStore};
use crate::error::{DecodeError, DecodeResult};
use crate::utils::BigEndianReader;

/// A region shown on the page at a page-level position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionDisplay {
    pub region_id: u8,
    pub x: u16,
    pub y: u16,
}

/// The current page: timeout, version and the ordered list of visible regions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageComposition {
    pub version: Option<u8>,
    pub timeout_ms: u32,
    pub state: PageState,
    pub displays: Vec<RegionDisplay>,
}

/// Page Composition Segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCompositionSegment {
    /// Page time-out in seconds.
    pub timeout: u8,
    pub version: u8,
    pub state: PageState,
    /// Regions in transmission order.
    pub regions: Vec<RegionDisplay>,
}

impl PageCompositionSegment {
    /// Parse a page composition segment from binary data.
    pub fn parse(reader: &mut BigEndianReader) -> DecodeResult<Self> {
        if reader.remaining() < 2 {
            return Err(DecodeError::Truncated("page composition segment"));
        }

        let timeout = reader.read_u8()?;
        let flags = reader.read_u8()?;
        let version = flags >> 4;
        let state = PageState::from_bits(flags >> 2);

        let mut regions = Vec::new();
        while reader.remaining() >= 6 {
            let region_id = reader.read_u8()?;
            reader.skip(1)?;
            let x = reader.read_u16()?;
            let y = reader.read_u16()?;
            regions.push(RegionDisplay { region_id, x, y });
        }

        Ok(Self {
            timeout,
            version,
            state,
            regions,
        })
    }
}

impl SubtitleStore {
    /// Apply a page segment. A repeated version is a no-op.
    ///
    /// Acquisition points and mode changes reset the epoch. The display list is
    /// rebuilt when the segment lists regions or resets the epoch; a normal
    /// page without regions keeps the current list.
    pub fn apply_page(&mut self, segment: &PageCompositionSegment) {
        if self.page.version == Some(segment.version) {
            debug!("page version {} already applied", segment.version);
            return;
        }

        self.page.version = Some(segment.version);
        self.page.timeout_ms = u32::from(segment.timeout) * 1000;
        self.page.state = segment.state;

        if segment.state.resets_page() {
            debug!("page state {:?}: new epoch", segment.state);
            self.reset_epoch();
        } else if segment.regions.is_empty() {
            debug!("page version {} without regions keeps {} displays", segment.version, self.page.displays.len());
            return;
        }

        self.page.displays.clear();
        self.page.displays.extend_from_slice(&segment.regions);
    }
}
