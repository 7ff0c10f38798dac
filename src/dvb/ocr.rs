//! Optional text recognition of composed bitmaps.
//!
//! The decoder only knows the [`OcrEngine`] trait. Engines are created lazily
//! by a factory on the first bitmap that needs recognition; a factory that
//! fails is not asked again.

use std::fmt;

use log::{info, warn};

use super::{language_code, ComposedBitmap};
use crate::error::DecodeError;

/// Language table index used when the stream's language is undefined.
const FALLBACK_LANG_INDEX: usize = 1;

/// What an engine gets to look at.
pub struct OcrImage<'a> {
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub palette: &'a [u32],
    pub bg_color: u8,
    pub quant_mode: u8,
}

impl<'a> OcrImage<'a> {
    pub fn new(bitmap: &'a ComposedBitmap, quant_mode: u8) -> Self {
        Self {
            pixels: &bitmap.pixels,
            width: bitmap.width,
            height: bitmap.height,
            stride: bitmap.stride,
            palette: &bitmap.palette,
            bg_color: bitmap.bg_color,
            quant_mode,
        }
    }
}

/// A text recognizer.
pub trait OcrEngine {
    /// Recognize the text in `image`, if any.
    fn recognize(&mut self, image: &OcrImage<'_>) -> Option<String>;
}

/// Creates an engine for an ISO-639 language code; `None` on failure.
pub type OcrFactory = Box<dyn FnMut(&str) -> Option<Box<dyn OcrEngine>>>;

enum OcrState {
    Disabled,
    Pending(OcrFactory),
    Ready(Box<dyn OcrEngine>),
    Failed,
}

/// Lazily initialized OCR collaborator.
pub struct OcrBridge {
    state: OcrState,
}

impl OcrBridge {
    /// A bridge that never recognizes anything.
    pub fn disabled() -> Self {
        Self { state: OcrState::Disabled }
    }

    pub fn new(factory: OcrFactory) -> Self {
        Self {
            state: OcrState::Pending(factory),
        }
    }

    /// Whether engine creation was attempted and failed.
    pub fn failed(&self) -> bool {
        matches!(self.state, OcrState::Failed)
    }

    /// Recognize text in `bitmap`, creating the engine on first use.
    pub fn recognize(&mut self, bitmap: &ComposedBitmap, lang_index: usize, quant_mode: u8) -> Option<String> {
        if let OcrState::Pending(factory) = &mut self.state {
            let lang_index = if lang_index == 0 { FALLBACK_LANG_INDEX } else { lang_index };
            let language = language_code(lang_index).unwrap_or("eng");
            self.state = match factory(language) {
                Some(engine) => {
                    info!("OCR engine ready for language '{}'", language);
                    OcrState::Ready(engine)
                }
                None => {
                    warn!("{} (language '{}'), continuing without text", DecodeError::OcrInitFailed, language);
                    OcrState::Failed
                }
            };
        }

        match &mut self.state {
            OcrState::Ready(engine) => engine.recognize(&OcrImage::new(bitmap, quant_mode)),
            _ => None,
        }
    }
}

impl Default for OcrBridge {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for OcrBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            OcrState::Disabled => "disabled",
            OcrState::Pending(_) => "pending",
            OcrState::Ready(_) => "ready",
            OcrState::Failed => "failed",
        };
        f.debug_struct("OcrBridge").field("state", &state).finish()
    }
}
