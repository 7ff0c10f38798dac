//! Composed bitmaps and timed subtitles handed to the host.

use image::RgbaImage;

/// One composed subtitle image: palette indices plus a 256-entry RGBA palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedBitmap {
    /// Position on the display canvas, display-definition offset included.
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Bytes per row; always equal to `width`.
    pub stride: u32,
    pub pixels: Vec<u8>,
    /// 256 packed RGBA entries; unused entries are transparent black.
    pub palette: Vec<u32>,
    /// 4, 16 or 256.
    pub nb_colors: u16,
    /// Background colour index of the region the palette came from.
    pub bg_color: u8,
    pub ocr_text: Option<String>,
    pub end_of_display: bool,
    /// FNV-1a over position, size, pixels and palette.
    pub hash: u64,
}

impl ComposedBitmap {
    /// The palette as 1024 bytes, RGBA per entry.
    pub fn palette_bytes(&self) -> Vec<u8> {
        self.palette.iter().flat_map(|c| c.to_le_bytes()).collect()
    }

    /// Expand indices through the palette into RGBA bytes.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = vec![0u32; self.pixels.len()];
        apply_palette(&self.pixels, &self.palette, &mut rgba);
        rgba.iter().flat_map(|c| c.to_le_bytes()).collect()
    }

    /// The bitmap as an RGBA image.
    pub fn to_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.to_rgba())
    }
}

/// Apply a palette to indexed pixel data.
#[inline]
pub fn apply_palette(indexed: &[u8], palette: &[u32], target: &mut [u32]) {
    for (dst, &idx) in target.iter_mut().zip(indexed) {
        *dst = palette.get(idx as usize).copied().unwrap_or(0);
    }
}

/// A bitmap with its resolved display interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtitle {
    pub start_ms: i64,
    pub end_ms: i64,
    /// Index into the ISO-639 language table.
    pub lang_index: usize,
    pub bitmap: ComposedBitmap,
}

impl Subtitle {
    #[inline]
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// Receives subtitles as soon as their end time is known.
pub trait SubtitleSink {
    fn push(&mut self, subtitle: Subtitle);
}

impl SubtitleSink for Vec<Subtitle> {
    fn push(&mut self, subtitle: Subtitle) {
        Vec::push(self, subtitle);
    }
}
