//! Merges the dirty regions of the page into one bitmap.

use std::borrow::Cow;
use std::hash::Hasher;

use log::{debug, warn};

use super::{ComposedBitmap, Region, RegionDisplay, SubtitleStore};
use crate::error::{try_alloc, DecodeResult};
use crate::utils::Fnv1aHasher;

/// Result of composing the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub bitmap: ComposedBitmap,
    /// Regions that were dirty; the caller clears their flags.
    pub regions: Vec<u8>,
    /// Region pixels that fell outside the bitmap.
    pub out_of_bounds: usize,
}

/// Compose the page's dirty regions. Returns `None` when no region is dirty.
///
/// The bounding box spans every dirty region; every region on the display
/// list is then drawn into it in page order, clipped to the box. The palette
/// is taken from the last dirty region.
pub fn compose(store: &SubtitleStore, synthesize_display_list: bool) -> DecodeResult<Option<Composition>> {
    let displays = display_list(store, synthesize_display_list);

    let dirty: Vec<(&RegionDisplay, &Region)> = displays
        .iter()
        .filter_map(|d| store.regions.get(&d.region_id).map(|r| (d, r)))
        .filter(|(_, r)| r.dirty)
        .collect();
    let Some(&(_, palette_region)) = dirty.last() else {
        return Ok(None);
    };

    let x0 = dirty.iter().map(|(d, _)| u32::from(d.x)).min().unwrap_or(0);
    let y0 = dirty.iter().map(|(d, _)| u32::from(d.y)).min().unwrap_or(0);
    let x1 = dirty
        .iter()
        .map(|(d, r)| u32::from(d.x) + u32::from(r.width))
        .max()
        .unwrap_or(0);
    let y1 = dirty
        .iter()
        .map(|(d, r)| u32::from(d.y) + u32::from(r.height))
        .max()
        .unwrap_or(0);
    let (width, height) = (x1 - x0, y1 - y0);
    if width == 0 || height == 0 {
        debug!("dirty regions cover no area");
        return Ok(None);
    }

    let mut pixels = try_alloc(width as usize * height as usize, 0)?;
    let mut out_of_bounds = 0;
    for display in displays.iter() {
        let Some(region) = store.regions.get(&display.region_id) else {
            debug!("page shows unknown region {}", display.region_id);
            continue;
        };
        let dx = i64::from(display.x) - i64::from(x0);
        let dy = i64::from(display.y) - i64::from(y0);
        out_of_bounds += blit(&mut pixels, width as i64, height as i64, region, dx, dy);
    }
    if out_of_bounds > 0 {
        warn!("{} region pixels outside the composed bitmap", out_of_bounds);
    }

    let clut = store.clut_or_default(palette_region.clut);
    let table = clut.table(palette_region.depth);
    let mut palette = vec![0u32; 256];
    palette[..table.len()].copy_from_slice(table);

    let mut hasher = Fnv1aHasher::default();
    for value in [x0, y0, width, height] {
        hasher.write(&value.to_le_bytes());
    }
    hasher.write(&pixels);
    for color in &palette {
        hasher.write(&color.to_le_bytes());
    }

    let (offset_x, offset_y) = store
        .display_definition
        .map_or((0, 0), |d| (u32::from(d.x), u32::from(d.y)));

    Ok(Some(Composition {
        bitmap: ComposedBitmap {
            x: x0 + offset_x,
            y: y0 + offset_y,
            width,
            height,
            stride: width,
            pixels,
            palette,
            nb_colors: 1 << palette_region.depth,
            bg_color: palette_region.bg_color,
            ocr_text: None,
            end_of_display: true,
            hash: hasher.finish(),
        },
        regions: dirty.iter().map(|(_, r)| r.id).collect(),
        out_of_bounds,
    }))
}

/// The page display list, or one entry per region with content at (0, 0)
/// when the page lists nothing and synthesis is enabled.
fn display_list(store: &SubtitleStore, synthesize: bool) -> Cow<'_, [RegionDisplay]> {
    if !synthesize || !store.page.displays.is_empty() {
        return Cow::Borrowed(&store.page.displays);
    }

    let synthesized: Vec<RegionDisplay> = store
        .regions
        .values()
        .filter(|r| r.has_content())
        .map(|r| RegionDisplay {
            region_id: r.id,
            x: 0,
            y: 0,
        })
        .collect();
    if !synthesized.is_empty() {
        debug!("no page display list, showing {} regions at the origin", synthesized.len());
    }
    Cow::Owned(synthesized)
}

/// Copy a region into the bitmap at (`dx`, `dy`). Returns the number of
/// clipped pixels.
fn blit(target: &mut [u8], width: i64, height: i64, region: &Region, dx: i64, dy: i64) -> usize {
    let rw = i64::from(region.width);
    let col_start = (-dx).clamp(0, rw);
    let col_end = (width - dx).clamp(col_start, rw);
    let visible = (col_end - col_start) as usize;
    let mut clipped = 0;

    for (py, row) in region.pixels.chunks_exact(rw.max(1) as usize).enumerate() {
        let ty = py as i64 + dy;
        if ty < 0 || ty >= height || visible == 0 {
            clipped += rw as usize;
            continue;
        }
        let start = (ty * width + dx + col_start) as usize;
        target[start..start + visible].copy_from_slice(&row[col_start as usize..col_end as usize]);
        clipped += rw as usize - visible;
    }
    clipped
}
