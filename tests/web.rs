//! Browser tests for the WebAssembly renderer.

#![cfg(target_arch = "wasm32")]

use libdvbsub::DvbRenderer;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn segment(kind: u8, body: &[u8]) -> Vec<u8> {
    let mut data = vec![0x0F, kind, 0x00, 0x01];
    data.extend_from_slice(&(body.len() as u16).to_be_bytes());
    data.extend_from_slice(body);
    data
}

/// A 4x2 two-bit region at (16, 8) with one object.
fn display_set() -> Vec<u8> {
    let mut pes = Vec::new();
    pes.extend(segment(0x10, &[3, 0x04, 1, 0xFF, 0, 16, 0, 8]));
    pes.extend(segment(
        0x11,
        &[1, 0x00, 0, 4, 0, 2, 0x04, 0, 0, 0, 0, 1, 0, 0, 0, 0],
    ));
    pes.extend(segment(
        0x13,
        &[0, 1, 0x00, 0, 3, 0, 3, 0x10, 0x16, 0xC0, 0x10, 0xE4, 0x40],
    ));
    pes.extend(segment(0x80, &[]));
    pes
}

#[wasm_bindgen_test]
fn decode_and_render() {
    let mut renderer = DvbRenderer::new(1, 1);
    let pes = display_set();
    assert_eq!(renderer.decode_pes(&pes, 2000.0).ok(), Some(pes.len()));
    renderer.flush();
    assert_eq!(renderer.count(), 1);
    assert_eq!(renderer.get_timestamps().to_vec(), vec![2000.0]);

    let result = renderer.render_at_timestamp(2.5).expect("subtitle on screen");
    assert_eq!((result.x(), result.y()), (16, 8));
    assert_eq!((result.width(), result.height()), (4, 2));
    assert_eq!(result.rgba().length(), 4 * 2 * 4);
    assert_eq!(result.end_ms(), 5000.0);

    assert_eq!(renderer.find_index_at_timestamp(5000.0), -1);
    renderer.dispose();
    assert_eq!(renderer.count(), 0);
}

#[wasm_bindgen_test]
fn descriptor_language_mismatch_is_an_error() {
    let descriptor = [b'e', b'n', b'g', 0x10, 0x00, 0x01, 0x00, 0x01];
    assert!(DvbRenderer::from_descriptor(&descriptor, None).is_ok());
    assert!(DvbRenderer::from_descriptor(&descriptor, Some("fra".to_string())).is_err());
}
