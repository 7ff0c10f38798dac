//! DVB subtitling segment types and the outer segment framing.

use log::trace;

/// Every segment starts with this byte.
pub const SYNC_BYTE: u8 = 0x0F;

/// sync_byte, segment_type, page_id (u16), segment_length (u16)
pub const SEGMENT_HEADER_LEN: usize = 6;

/// Segment type identifiers as defined in ETSI EN 300 743.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentType {
    /// Page Composition Segment (0x10)
    Page = 0x10,
    /// Region Composition Segment (0x11)
    Region = 0x11,
    /// CLUT Definition Segment (0x12)
    Clut = 0x12,
    /// Object Data Segment (0x13)
    Object = 0x13,
    /// Display Definition Segment (0x14)
    DisplayDefinition = 0x14,
    /// End of Display Set Segment (0x80)
    Display = 0x80,
}

impl TryFrom<u8> for SegmentType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x10 => Ok(SegmentType::Page),
            0x11 => Ok(SegmentType::Region),
            0x12 => Ok(SegmentType::Clut),
            0x13 => Ok(SegmentType::Object),
            0x14 => Ok(SegmentType::DisplayDefinition),
            0x80 => Ok(SegmentType::Display),
            _ => Err(value),
        }
    }
}

/// Page state carried by a page composition segment.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageState {
    /// Incremental update of the current page.
    #[default]
    Normal = 0,
    /// The page is retransmitted in full; decoders may (re)start here.
    AcquisitionPoint = 1,
    /// A new epoch: all regions, objects and CLUTs are replaced.
    ModeChange = 2,
    Reserved = 3,
}

impl PageState {
    /// Decode the two-bit page_state field.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => PageState::Normal,
            1 => PageState::AcquisitionPoint,
            2 => PageState::ModeChange,
            _ => PageState::Reserved,
        }
    }

    /// Acquisition points and mode changes discard every stored region,
    /// object and CLUT.
    #[inline]
    pub fn resets_page(&self) -> bool {
        matches!(self, PageState::AcquisitionPoint | PageState::ModeChange)
    }
}

/// Header of one framed segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub segment_type: u8,
    pub page_id: u16,
    pub length: u16,
}

impl SegmentHeader {
    /// The recognized segment type, if any.
    #[inline]
    pub fn kind(&self) -> Option<SegmentType> {
        SegmentType::try_from(self.segment_type).ok()
    }
}

/// Iterator over the segments of one PES payload.
///
/// Leading bytes before the first sync byte are skipped. Iteration stops at
/// the first position that does not start with a sync byte, or at a segment
/// whose declared length runs past the payload.
pub struct Segments<'a> {
    data: &'a [u8],
    pos: usize,
    truncated: bool,
}

impl<'a> Segments<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let pos = data
            .iter()
            .position(|&b| b == SYNC_BYTE)
            .unwrap_or(data.len());
        if pos > 0 {
            trace!("skipped {} bytes before first sync byte", pos);
        }
        Self {
            data,
            pos,
            truncated: false,
        }
    }

    /// Bytes consumed so far, including skipped leading bytes.
    #[inline]
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Whether iteration stopped on a segment longer than the payload.
    #[inline]
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = (SegmentHeader, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.data[self.pos..];
        if self.truncated || rest.len() < SEGMENT_HEADER_LEN || rest[0] != SYNC_BYTE {
            return None;
        }

        let header = SegmentHeader {
            segment_type: rest[1],
            page_id: u16::from_be_bytes([rest[2], rest[3]]),
            length: u16::from_be_bytes([rest[4], rest[5]]),
        };
        let end = SEGMENT_HEADER_LEN + header.length as usize;
        if rest.len() < end {
            trace!(
                "segment 0x{:02x} declares {} bytes, only {} remain",
                header.segment_type,
                header.length,
                rest.len() - SEGMENT_HEADER_LEN
            );
            self.truncated = true;
            return None;
        }

        self.pos += end;
        Some((header, &rest[SEGMENT_HEADER_LEN..end]))
    }
}
