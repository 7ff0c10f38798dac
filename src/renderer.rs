//! WebAssembly front end for the DVB decoder.
//!
//! The host feeds PES payloads as it demuxes them and renders decoded
//! subtitles by index or timestamp.

use js_sys::Uint8Array;
use log::debug;
use wasm_bindgen::prelude::*;

use crate::dvb::{DecoderOptions, DvbConfig, DvbDecoder, PageId, Subtitle};
use crate::utils::binary_search_timestamp;

/// Canvas size assumed until a display definition segment arrives.
const DEFAULT_SCREEN_WIDTH: u16 = 720;
const DEFAULT_SCREEN_HEIGHT: u16 = 576;

/// Decodes one DVB subtitle stream and renders its subtitles to RGBA.
#[wasm_bindgen]
pub struct DvbRenderer {
    decoder: DvbDecoder,
    subtitles: Vec<Subtitle>,
    /// Start times of `subtitles`, for lookup.
    timestamps: Vec<u32>,
    cached: Option<(usize, Vec<u8>)>,
}

#[wasm_bindgen]
impl DvbRenderer {
    /// Create a renderer for a composition and ancillary page. A negative
    /// page id accepts every page.
    #[wasm_bindgen(constructor)]
    pub fn new(composition_id: i32, ancillary_id: i32) -> Self {
        let config = DvbConfig {
            composition_id: PageId::from(composition_id),
            ancillary_id: PageId::from(ancillary_id),
            ..DvbConfig::default()
        };
        Self::with_decoder(DvbDecoder::new(config, DecoderOptions::default()))
    }

    /// Create a renderer from a PMT subtitling descriptor body.
    #[wasm_bindgen(js_name = fromDescriptor)]
    pub fn from_descriptor(descriptor: &[u8], preferred_language: Option<String>) -> Result<DvbRenderer, JsError> {
        let options = DecoderOptions {
            preferred_language,
            ..DecoderOptions::default()
        };
        let decoder = DvbDecoder::from_descriptor(descriptor, options).map_err(|e| JsError::new(&e.to_string()))?;
        Ok(Self::with_decoder(decoder))
    }

    /// Decode one PES payload. Returns the number of bytes consumed.
    #[wasm_bindgen(js_name = decodePes)]
    pub fn decode_pes(&mut self, data: &[u8], pts_ms: f64) -> Result<usize, JsError> {
        let before = self.subtitles.len();
        let consumed = self
            .decoder
            .decode(data, pts_ms as i64, &mut self.subtitles)
            .map_err(|e| JsError::new(&e.to_string()))?;
        self.index_new(before);
        Ok(consumed)
    }

    /// Report a frame time-stamp seen on another stream of the program.
    #[wasm_bindgen(js_name = advanceTime)]
    pub fn advance_time(&mut self, fts_ms: f64) {
        self.decoder.advance_time(fts_ms as i64);
    }

    /// Emit the subtitle still on screen at end of stream.
    #[wasm_bindgen]
    pub fn flush(&mut self) {
        let before = self.subtitles.len();
        self.decoder.flush(&mut self.subtitles);
        self.index_new(before);
    }

    /// Get the number of decoded subtitles.
    #[wasm_bindgen(getter)]
    pub fn count(&self) -> usize {
        self.subtitles.len()
    }

    /// Get all start times in milliseconds.
    #[wasm_bindgen(js_name = getTimestamps)]
    pub fn get_timestamps(&self) -> js_sys::Float64Array {
        let starts: Vec<f64> = self.subtitles.iter().map(|s| s.start_ms as f64).collect();
        js_sys::Float64Array::from(&starts[..])
    }

    /// Find the subtitle shown at a timestamp in milliseconds, or -1.
    #[wasm_bindgen(js_name = findIndexAtTimestamp)]
    pub fn find_index_at_timestamp(&self, time_ms: f64) -> i32 {
        self.index_at(time_ms).map_or(-1, |index| index as i32)
    }

    /// Render the subtitle at the given index.
    #[wasm_bindgen(js_name = renderAtIndex)]
    pub fn render_at_index(&mut self, index: usize) -> Option<RenderResult> {
        let subtitle = self.subtitles.get(index)?;
        let bitmap = &subtitle.bitmap;

        let rgba = match &self.cached {
            Some((cached_index, rgba)) if *cached_index == index => rgba.clone(),
            _ => {
                let rgba = bitmap.to_rgba();
                self.cached = Some((index, rgba.clone()));
                rgba
            }
        };

        let (screen_width, screen_height) = self
            .decoder
            .store()
            .display_definition
            .map_or((DEFAULT_SCREEN_WIDTH, DEFAULT_SCREEN_HEIGHT), |d| (d.width, d.height));

        Some(RenderResult {
            screen_width,
            screen_height,
            x: bitmap.x,
            y: bitmap.y,
            width: bitmap.width,
            height: bitmap.height,
            start_ms: subtitle.start_ms as f64,
            end_ms: subtitle.end_ms as f64,
            text: bitmap.ocr_text.clone(),
            rgba,
        })
    }

    /// Render the subtitle shown at the given timestamp in seconds.
    #[wasm_bindgen(js_name = renderAtTimestamp)]
    pub fn render_at_timestamp(&mut self, time_seconds: f64) -> Option<RenderResult> {
        let index = self.index_at(time_seconds * 1000.0)?;
        self.render_at_index(index)
    }

    /// Clear internal caches.
    #[wasm_bindgen(js_name = clearCache)]
    pub fn clear_cache(&mut self) {
        self.cached = None;
    }

    /// Drop every decoded subtitle and all decoder state.
    #[wasm_bindgen]
    pub fn dispose(&mut self) {
        self.decoder.reset();
        self.subtitles.clear();
        self.timestamps.clear();
        self.cached = None;
    }
}

impl DvbRenderer {
    pub fn with_decoder(decoder: DvbDecoder) -> Self {
        Self {
            decoder,
            subtitles: Vec::new(),
            timestamps: Vec::new(),
            cached: None,
        }
    }

    pub fn decoder(&self) -> &DvbDecoder {
        &self.decoder
    }

    pub fn subtitles(&self) -> &[Subtitle] {
        &self.subtitles
    }

    fn index_new(&mut self, from: usize) {
        for subtitle in &self.subtitles[from..] {
            self.timestamps
                .push(subtitle.start_ms.clamp(0, i64::from(u32::MAX)) as u32);
        }
        if self.subtitles.len() > from {
            debug!("{} subtitles decoded", self.subtitles.len());
        }
    }

    fn index_at(&self, time_ms: f64) -> Option<usize> {
        if self.timestamps.is_empty() || time_ms < 0.0 {
            return None;
        }
        let index = binary_search_timestamp(&self.timestamps, time_ms as u32);
        let subtitle = &self.subtitles[index];
        let time_ms = time_ms as i64;
        (subtitle.start_ms <= time_ms && time_ms < subtitle.end_ms).then_some(index)
    }
}

/// A rendered subtitle positioned on the display canvas.
#[wasm_bindgen]
pub struct RenderResult {
    screen_width: u16,
    screen_height: u16,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    start_ms: f64,
    end_ms: f64,
    text: Option<String>,
    rgba: Vec<u8>,
}

#[wasm_bindgen]
impl RenderResult {
    #[wasm_bindgen(getter, js_name = screenWidth)]
    pub fn screen_width(&self) -> u16 {
        self.screen_width
    }

    #[wasm_bindgen(getter, js_name = screenHeight)]
    pub fn screen_height(&self) -> u16 {
        self.screen_height
    }

    #[wasm_bindgen(getter)]
    pub fn x(&self) -> u32 {
        self.x
    }

    #[wasm_bindgen(getter)]
    pub fn y(&self) -> u32 {
        self.y
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[wasm_bindgen(getter, js_name = startMs)]
    pub fn start_ms(&self) -> f64 {
        self.start_ms
    }

    #[wasm_bindgen(getter, js_name = endMs)]
    pub fn end_ms(&self) -> f64 {
        self.end_ms
    }

    /// Recognized text, when an OCR engine is attached.
    #[wasm_bindgen(getter)]
    pub fn text(&self) -> Option<String> {
        self.text.clone()
    }

    /// RGBA pixel data, `width * height * 4` bytes.
    #[wasm_bindgen(getter)]
    pub fn rgba(&self) -> Uint8Array {
        Uint8Array::from(&self.rgba[..])
    }
}
