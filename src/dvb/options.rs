//! Stream identity and decoder options.

/// Default cap on a single subtitle's on-screen duration.
pub const DEFAULT_MAX_DURATION_MS: i64 = 10_000;

/// A page id filter. `Any` accepts every page (−1 in PMT terms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageId {
    Any,
    Id(u16),
}

impl PageId {
    #[inline]
    pub fn is_any(&self) -> bool {
        matches!(self, PageId::Any)
    }
}

impl From<i32> for PageId {
    fn from(value: i32) -> Self {
        match u16::try_from(value) {
            Ok(id) => PageId::Id(id),
            Err(_) => PageId::Any,
        }
    }
}

impl From<u16> for PageId {
    fn from(value: u16) -> Self {
        PageId::Id(value)
    }
}

/// Which subtitle service on a PID this decoder follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DvbConfig {
    pub composition_id: PageId,
    pub ancillary_id: PageId,
    /// Index into the ISO-639 language table.
    pub lang_index: usize,
    pub subtitling_type: u8,
}

impl Default for DvbConfig {
    fn default() -> Self {
        Self {
            composition_id: PageId::Id(1),
            ancillary_id: PageId::Id(1),
            lang_index: 1,
            subtitling_type: 0,
        }
    }
}

impl DvbConfig {
    /// Whether a segment on `page_id` belongs to this service.
    pub fn accepts(&self, page_id: u16) -> bool {
        if self.composition_id.is_any() || self.ancillary_id.is_any() {
            return true;
        }
        self.composition_id == PageId::Id(page_id) || self.ancillary_id == PageId::Id(page_id)
    }
}

/// Host-supplied decoder options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderOptions {
    /// ISO-639 code used to filter streams and pick an OCR model.
    pub preferred_language: Option<String>,
    /// Disable the repeated-display filter.
    pub no_dvb_dedup: bool,
    /// Forwarded untouched to the OCR engine.
    pub ocr_quant_mode: u8,
    pub extraction_start_ms: i64,
    pub extraction_end_ms: Option<i64>,
    pub max_duration_ms: i64,
    /// Show regions at (0, 0) when a stream sends regions but no page.
    pub synthesize_display_list: bool,
    /// PID of the elementary stream, part of the dedup key.
    pub pid: u16,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            preferred_language: None,
            no_dvb_dedup: false,
            ocr_quant_mode: 0,
            extraction_start_ms: 0,
            extraction_end_ms: None,
            max_duration_ms: DEFAULT_MAX_DURATION_MS,
            synthesize_display_list: false,
            pid: 0,
        }
    }
}
