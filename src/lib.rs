//! # libdvbsub
//!
//! Decoder for DVB subtitles (ETSI EN 300 743) as carried in MPEG transport
//! streams.
//!
//! Subtitle PES payloads are parsed into pages, regions, CLUTs and objects,
//! composed into one indexed bitmap per display set, and timed against the
//! stream clock. The [`DvbDecoder`] is the native entry point; [`DvbRenderer`]
//! wraps it for WebAssembly hosts.

mod dvb;
mod error;
mod renderer;
pub mod utils;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global allocator.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize the WASM module. Call this once before using other functions.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

// Re-export main types
pub use dvb::*;
pub use error::{DecodeError, DecodeResult};
pub use renderer::*;
