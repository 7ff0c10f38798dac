//! The per-stream DVB subtitle decoder.

use std::collections::HashSet;

use log::{debug, info, trace};

use super::{
    compose, parse_dvb_description, ClutDefinitionSegment, DecoderOptions, DedupKey, DedupRing, DisplayDefinition,
    DvbConfig, ObjectDataSegment, OcrBridge, OcrFactory, PageCompositionSegment, RegionCompositionSegment, SegmentType,
    Segments, Subtitle, SubtitleSink, SubtitleStore, TimingController,
};
use crate::error::{DecodeError, DecodeResult};
use crate::utils::BigEndianReader;

/// Segments that together make a complete display set even without an
/// explicit display segment.
const IMPLICIT_DISPLAY: u8 = SEEN_PAGE | SEEN_REGION | SEEN_CLUT | SEEN_OBJECT;
const SEEN_PAGE: u8 = 0x01;
const SEEN_REGION: u8 = 0x02;
const SEEN_CLUT: u8 = 0x04;
const SEEN_OBJECT: u8 = 0x08;
const SEEN_DISPLAY: u8 = 0x10;

/// Counters describing what the decoder dropped or recovered from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub segments: usize,
    /// Segments for pages outside the configured service.
    pub filtered_segments: usize,
    pub truncated: usize,
    pub malformed: usize,
    pub unsupported: usize,
    pub out_of_bounds_pixels: usize,
    pub displays: usize,
    pub dedup_hits: usize,
    pub duplicate_bitmaps: usize,
    pub emitted: usize,
    pub ocr_failed: bool,
}

/// Identity and timing state of a decoder, without any region or object data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderSnapshot {
    pub config: DvbConfig,
    pub fts_max: i64,
    pub last_end_ms: i64,
    pub pending_start_ms: Option<i64>,
    pub prev_hash: Option<u64>,
}

/// Decodes the DVB subtitle PES payloads of one stream into timed bitmaps.
///
/// A subtitle is handed to the sink once its end time is known, which is
/// when the next display arrives, the page is cleared, or on [`flush`].
///
/// [`flush`]: DvbDecoder::flush
#[derive(Debug)]
pub struct DvbDecoder {
    config: DvbConfig,
    options: DecoderOptions,
    store: SubtitleStore,
    dedup: DedupRing,
    timing: TimingController,
    ocr: OcrBridge,
    prev_hash: Option<u64>,
    diagnostics: Diagnostics,
    unsupported_seen: HashSet<String>,
}

impl DvbDecoder {
    pub fn new(config: DvbConfig, options: DecoderOptions) -> Self {
        let timing = TimingController::new(
            options.extraction_start_ms,
            options.extraction_end_ms,
            options.max_duration_ms,
        );
        Self {
            config,
            options,
            store: SubtitleStore::default(),
            dedup: DedupRing::default(),
            timing,
            ocr: OcrBridge::disabled(),
            prev_hash: None,
            diagnostics: Diagnostics::default(),
            unsupported_seen: HashSet::new(),
        }
    }

    /// Create a decoder for the service described by a PMT subtitling descriptor.
    pub fn from_descriptor(descriptor: &[u8], options: DecoderOptions) -> DecodeResult<Self> {
        let config = parse_dvb_description(descriptor, options.preferred_language.as_deref())?;
        Ok(Self::new(config, options))
    }

    /// Attach a text recognizer, created on the first bitmap.
    pub fn with_ocr(mut self, factory: OcrFactory) -> Self {
        self.ocr = OcrBridge::new(factory);
        self
    }

    /// Re-target the decoder from a PMT subtitling descriptor.
    pub fn parse_dvb_description(&mut self, descriptor: &[u8]) -> DecodeResult<()> {
        self.config = parse_dvb_description(descriptor, self.options.preferred_language.as_deref())?;
        Ok(())
    }

    pub fn config(&self) -> &DvbConfig {
        &self.config
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    pub fn store(&self) -> &SubtitleStore {
        &self.store
    }

    pub fn dedup(&self) -> &DedupRing {
        &self.dedup
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn snapshot(&self) -> DecoderSnapshot {
        DecoderSnapshot {
            config: self.config,
            fts_max: self.timing.fts_max(),
            last_end_ms: self.timing.last_end_ms(),
            pending_start_ms: self.timing.pending_start_ms(),
            prev_hash: self.prev_hash,
        }
    }

    /// Feed a frame time-stamp observed elsewhere in the program.
    pub fn advance_time(&mut self, fts_ms: i64) {
        self.timing.advance(fts_ms);
    }

    /// Decode one PES payload (data identifier and stream id stripped).
    ///
    /// Returns the number of bytes consumed. Only allocation failure is
    /// returned as an error; everything else is counted in [`Diagnostics`].
    pub fn decode(&mut self, payload: &[u8], pts_ms: i64, sink: &mut dyn SubtitleSink) -> DecodeResult<usize> {
        let pre_fts_max = self.timing.fts_max();
        let mut seen = 0u8;
        let mut segments = Segments::new(payload);

        while let Some((header, body)) = segments.next() {
            self.diagnostics.segments += 1;
            if !self.config.accepts(header.page_id) {
                trace!("segment 0x{:02x} for page {} filtered", header.segment_type, header.page_id);
                self.diagnostics.filtered_segments += 1;
                continue;
            }

            let Some(kind) = header.kind() else {
                let err = DecodeError::unsupported(format!("segment type 0x{:02x}", header.segment_type));
                self.absorb(None, Err(err))?;
                continue;
            };
            trace!("{:?} segment, page {}, {} bytes", kind, header.page_id, body.len());

            let result = self.handle_segment(kind, body, pts_ms, pre_fts_max, sink);
            if result.is_ok() {
                seen |= seen_flag(kind);
            }
            self.absorb(Some(kind), result)?;
        }

        if segments.truncated() {
            debug!("PES ends inside a segment after {} bytes", segments.consumed());
            self.diagnostics.truncated += 1;
        }

        if seen == IMPLICIT_DISPLAY {
            debug!("display set without display segment, showing it anyway");
            let result = self.handle_display(pts_ms, pre_fts_max, sink);
            self.absorb(Some(SegmentType::Display), result)?;
        }

        self.timing.advance(pts_ms);
        Ok(segments.consumed())
    }

    /// Emit the subtitle still on screen, ending it at its page time-out.
    pub fn flush(&mut self, sink: &mut dyn SubtitleSink) {
        if let Some(subtitle) = self.timing.flush() {
            self.emit(subtitle, sink);
        }
    }

    /// Drop all decoded state, keeping configuration and counters.
    pub fn reset(&mut self) {
        self.store.clear();
        self.dedup.clear();
        self.timing.reset();
        self.prev_hash = None;
    }

    /// Flush and release the decoder.
    pub fn close(mut self, sink: &mut dyn SubtitleSink) {
        self.flush(sink);
    }

    fn handle_segment(
        &mut self,
        kind: SegmentType,
        body: &[u8],
        pts_ms: i64,
        pre_fts_max: i64,
        sink: &mut dyn SubtitleSink,
    ) -> DecodeResult<()> {
        let mut reader = BigEndianReader::new(body);
        match kind {
            SegmentType::Page => {
                let segment = PageCompositionSegment::parse(&mut reader)?;
                self.store.apply_page(&segment);
            }
            SegmentType::Region => {
                let segment = RegionCompositionSegment::parse(&mut reader)?;
                self.store.apply_region(&segment)?;
            }
            SegmentType::Clut => {
                let segment = ClutDefinitionSegment::parse(&mut reader)?;
                self.store.apply_clut(&segment);
            }
            SegmentType::Object => {
                let segment = ObjectDataSegment::parse(&mut reader)?;
                self.store.apply_object(&segment)?;
            }
            SegmentType::DisplayDefinition => {
                if let Some(definition) = DisplayDefinition::parse(&mut reader)? {
                    self.store.apply_display_definition(definition);
                }
            }
            SegmentType::Display => self.handle_display(pts_ms, pre_fts_max, sink)?,
        }
        Ok(())
    }

    /// Compose the page and hand the previous subtitle to the sink.
    fn handle_display(&mut self, pts_ms: i64, pre_fts_max: i64, sink: &mut dyn SubtitleSink) -> DecodeResult<()> {
        self.diagnostics.displays += 1;

        if !self.options.no_dvb_dedup {
            let key = DedupKey {
                pts_ms,
                pid: self.options.pid,
                composition_id: self.config.composition_id,
                ancillary_id: self.config.ancillary_id,
            };
            if self.dedup.check_and_insert(key) {
                debug!("display at {} ms already seen", pts_ms);
                self.diagnostics.dedup_hits += 1;
                return Ok(());
            }
        }

        let Some(composition) = compose(&self.store, self.options.synthesize_display_list)? else {
            if self.store.page.displays.is_empty() {
                debug!("page cleared at {} ms", pts_ms);
                if let Some(subtitle) = self.timing.close(pre_fts_max, pts_ms) {
                    self.emit(subtitle, sink);
                }
                self.prev_hash = None;
            } else {
                trace!("no dirty regions at {} ms", pts_ms);
            }
            return Ok(());
        };

        self.store.clear_dirty(&composition.regions);
        self.diagnostics.out_of_bounds_pixels += composition.out_of_bounds;

        let mut bitmap = composition.bitmap;
        if self.prev_hash == Some(bitmap.hash) {
            debug!("display at {} ms repeats the previous bitmap", pts_ms);
            self.diagnostics.duplicate_bitmaps += 1;
            return Ok(());
        }
        self.prev_hash = Some(bitmap.hash);

        bitmap.ocr_text = self
            .ocr
            .recognize(&bitmap, self.config.lang_index, self.options.ocr_quant_mode);
        self.diagnostics.ocr_failed = self.ocr.failed();

        if let Some(subtitle) = self.timing.close(pre_fts_max, pts_ms) {
            self.emit(subtitle, sink);
        }
        self.timing
            .open(bitmap, pts_ms, self.store.page.timeout_ms, self.config.lang_index);
        Ok(())
    }

    fn emit(&mut self, subtitle: Subtitle, sink: &mut dyn SubtitleSink) {
        trace!("subtitle {}..{} ms", subtitle.start_ms, subtitle.end_ms);
        self.diagnostics.emitted += 1;
        sink.push(subtitle);
    }

    /// Count a segment failure. Only fatal errors are passed on.
    fn absorb(&mut self, kind: Option<SegmentType>, result: DecodeResult<()>) -> DecodeResult<()> {
        let err = match result {
            Ok(()) => return Ok(()),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => err,
        };

        match &err {
            DecodeError::Unsupported(cause) => {
                self.diagnostics.unsupported += 1;
                if self.unsupported_seen.insert(cause.clone()) {
                    info!("skipping {}", err);
                }
                return Ok(());
            }
            DecodeError::Truncated(_) => self.diagnostics.truncated += 1,
            DecodeError::OcrInitFailed => self.diagnostics.ocr_failed = true,
            _ => self.diagnostics.malformed += 1,
        }
        debug!("{:?} segment dropped: {}", kind, err);
        Ok(())
    }
}

fn seen_flag(kind: SegmentType) -> u8 {
    match kind {
        SegmentType::Page => SEEN_PAGE,
        SegmentType::Region => SEEN_REGION,
        SegmentType::Clut => SEEN_CLUT,
        SegmentType::Object => SEEN_OBJECT,
        SegmentType::Display => SEEN_DISPLAY,
        SegmentType::DisplayDefinition => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dvb::{PageId, RegionDisplay};

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Builds a PES payload segment by segment, all on page 1.
    #[derive(Default)]
    struct Pes {
        data: Vec<u8>,
    }

    impl Pes {
        fn segment(mut self, kind: u8, page_id: u16, body: &[u8]) -> Self {
            self.data.push(0x0F);
            self.data.push(kind);
            self.data.extend_from_slice(&page_id.to_be_bytes());
            self.data.extend_from_slice(&(body.len() as u16).to_be_bytes());
            self.data.extend_from_slice(body);
            self
        }

        fn page(self, version: u8, state: u8, timeout: u8, regions: &[(u8, u16, u16)]) -> Self {
            let mut body = vec![timeout, (version << 4) | (state << 2)];
            for &(id, x, y) in regions {
                body.extend_from_slice(&[id, 0xFF]);
                body.extend_from_slice(&x.to_be_bytes());
                body.extend_from_slice(&y.to_be_bytes());
            }
            self.segment(0x10, 1, &body)
        }

        #[allow(clippy::too_many_arguments)]
        fn region(
            self,
            id: u8,
            version: u8,
            fill: bool,
            width: u16,
            height: u16,
            depth: u8,
            bg: u8,
            objects: &[(u16, u16, u16)],
        ) -> Self {
            let depth_code = match depth {
                2 => 1,
                8 => 3,
                _ => 2,
            };
            let mut body = vec![id, (version << 4) | if fill { 0x08 } else { 0 }];
            body.extend_from_slice(&width.to_be_bytes());
            body.extend_from_slice(&height.to_be_bytes());
            body.push(depth_code << 2);
            body.push(0); // CLUT 0
            match depth {
                8 => body.extend_from_slice(&[bg, 0]),
                4 => body.extend_from_slice(&[0, bg << 4]),
                _ => body.extend_from_slice(&[0, bg << 2]),
            }
            for &(object_id, x, y) in objects {
                body.extend_from_slice(&object_id.to_be_bytes());
                body.extend_from_slice(&x.to_be_bytes());
                body.extend_from_slice(&y.to_be_bytes());
            }
            self.segment(0x11, 1, &body)
        }

        /// Full-range entries: (entry id, depth flag, Y, Cr, Cb, T).
        fn clut(self, version: u8, entries: &[(u8, u8, u8, u8, u8, u8)]) -> Self {
            let mut body = vec![0, version << 4];
            for &(entry_id, flag, y, cr, cb, t) in entries {
                body.extend_from_slice(&[entry_id, flag | 0x01, y, cr, cb, t]);
            }
            self.segment(0x12, 1, &body)
        }

        fn object(self, id: u16, version: u8, top: &[u8], bottom: &[u8]) -> Self {
            let mut body = id.to_be_bytes().to_vec();
            body.push(version << 4);
            body.extend_from_slice(&(top.len() as u16).to_be_bytes());
            body.extend_from_slice(&(bottom.len() as u16).to_be_bytes());
            body.extend_from_slice(top);
            body.extend_from_slice(bottom);
            self.segment(0x13, 1, &body)
        }

        fn display(self) -> Self {
            self.segment(0x80, 1, &[])
        }

        fn build(self) -> Vec<u8> {
            self.data
        }
    }

    /// Ten pixels of a 2-bit colour, then end of string.
    fn run_of_ten(color: u8) -> [u8; 3] {
        [0x10, 0x3C | color, 0x00]
    }

    /// Five lines of ten pixels; the bottom field repeats it.
    fn ten_by_ten(color: u8) -> Vec<u8> {
        let mut field = Vec::new();
        for _ in 0..5 {
            field.extend_from_slice(&run_of_ten(color));
            field.push(0xF0);
        }
        field
    }

    fn decoder() -> DvbDecoder {
        init_logging();
        DvbDecoder::new(DvbConfig::default(), DecoderOptions::default())
    }

    fn scenario_one() -> Vec<u8> {
        Pes::default()
            .page(0, 1, 2, &[(1, 0, 0)])
            .region(1, 0, false, 4, 2, 2, 0, &[(1, 0, 0)])
            .clut(0, &[(1, 0x80, 235, 128, 128, 0), (2, 0x80, 81, 240, 90, 0)])
            .object(1, 0, &[0x10, 0x16, 0xC0], &[0x10, 0xE4, 0x40])
            .display()
            .build()
    }

    #[test]
    fn test_single_region_two_bit() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        let pes = scenario_one();

        assert_eq!(decoder.decode(&pes, 1000, &mut out), Ok(pes.len()));
        assert!(out.is_empty());
        decoder.flush(&mut out);

        assert_eq!(out.len(), 1);
        let subtitle = &out[0];
        assert_eq!(subtitle.start_ms, 1000);
        assert!(subtitle.end_ms >= 1001);
        assert_eq!(subtitle.end_ms, 3000);

        let bitmap = &subtitle.bitmap;
        assert_eq!((bitmap.width, bitmap.height, bitmap.stride), (4, 2, 4));
        assert_eq!(bitmap.pixels, vec![0, 1, 2, 3, 3, 2, 1, 0]);
        assert_eq!(bitmap.nb_colors, 4);
        assert_eq!(bitmap.palette[1].to_le_bytes(), [0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(bitmap.palette[2].to_le_bytes(), [0xFF, 0x00, 0x00, 0xFF]);
        assert!(bitmap.end_of_display);
        assert_eq!(decoder.diagnostics().emitted, 1);
        decoder.store().assert_display_links();
    }

    #[test]
    fn test_empty_bottom_field_repeats_top() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        let pes = Pes::default()
            .page(0, 1, 2, &[(1, 0, 0)])
            .region(1, 0, false, 4, 2, 2, 0, &[(1, 0, 0)])
            .object(1, 0, &[0x10, 0x16, 0xC0], &[])
            .display()
            .build();
        decoder.decode(&pes, 0, &mut out).unwrap();
        decoder.flush(&mut out);
        assert_eq!(out[0].bitmap.pixels, vec![0, 1, 2, 3, 0, 1, 2, 3]);
    }

    #[test]
    fn test_overlapping_regions() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        let pes = Pes::default()
            .page(0, 1, 5, &[(1, 0, 0), (2, 5, 5)])
            .region(1, 0, false, 10, 10, 2, 0, &[(1, 0, 0)])
            .region(2, 0, false, 10, 10, 2, 0, &[(2, 0, 0)])
            .object(1, 0, &ten_by_ten(1), &[])
            .object(2, 0, &ten_by_ten(2), &[])
            .display()
            .build();
        decoder.decode(&pes, 0, &mut out).unwrap();
        decoder.flush(&mut out);

        let bitmap = &out[0].bitmap;
        assert_eq!((bitmap.x, bitmap.y, bitmap.width, bitmap.height), (0, 0, 15, 15));
        let at = |x: usize, y: usize| bitmap.pixels[y * 15 + x];
        for y in 0..15 {
            for x in 0..15 {
                let expected = if x >= 5 && y >= 5 {
                    2
                } else if x < 10 && y < 10 {
                    1
                } else {
                    0
                };
                assert_eq!(at(x, y), expected, "pixel ({}, {})", x, y);
            }
        }
        assert_eq!(decoder.diagnostics().out_of_bounds_pixels, 0);
    }

    #[test]
    fn test_repeated_display_set_emits_nothing() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        let pes = scenario_one();

        decoder.decode(&pes, 1000, &mut out).unwrap();
        decoder.decode(&pes, 1001, &mut out).unwrap();
        assert!(out.is_empty());

        let key = |pts_ms| DedupKey {
            pts_ms,
            pid: 0,
            composition_id: PageId::Id(1),
            ancillary_id: PageId::Id(1),
        };
        assert!(decoder.dedup().contains(&key(1000)));
        assert!(decoder.dedup().contains(&key(1001)));

        decoder.flush(&mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start_ms, 1000);
    }

    #[test]
    fn test_dedup_hit_keeps_state() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        let pes = scenario_one();

        decoder.decode(&pes, 1000, &mut out).unwrap();
        let changed = Pes::default().object(1, 1, &[0x10, 0xE4, 0x40], &[]).display().build();
        decoder.decode(&changed, 1000, &mut out).unwrap();
        assert_eq!(decoder.diagnostics().dedup_hits, 1);
        // the object was decoded but the display was not composed
        assert!(decoder.store().regions[&1].dirty);
        assert!(out.is_empty());
    }

    #[test]
    fn test_dedup_can_be_disabled() {
        init_logging();
        let options = DecoderOptions {
            no_dvb_dedup: true,
            ..DecoderOptions::default()
        };
        let mut decoder = DvbDecoder::new(DvbConfig::default(), options);
        let mut out = Vec::new();
        decoder.decode(&scenario_one(), 1000, &mut out).unwrap();
        let changed = Pes::default().object(1, 1, &[0x10, 0xE4, 0x40], &[]).display().build();
        decoder.decode(&changed, 1000, &mut out).unwrap();
        assert_eq!(decoder.diagnostics().dedup_hits, 0);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_pts_jump_bounded_by_time_base() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        let first = Pes::default()
            .page(0, 1, 65, &[(1, 0, 0)])
            .region(1, 0, false, 4, 2, 2, 0, &[(1, 0, 0)])
            .object(1, 0, &[0x10, 0x16, 0xC0], &[])
            .display()
            .build();
        decoder.decode(&first, 10_000, &mut out).unwrap();
        decoder.advance_time(12_500);

        let second = Pes::default()
            .page(1, 0, 65, &[])
            .object(1, 1, &[0x10, 0xE4, 0x40], &[])
            .display()
            .build();
        decoder.decode(&second, 30_000, &mut out).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start_ms, 10_000);
        assert_eq!(out[0].end_ms, 12_499);
    }

    #[test]
    fn test_keepalive_page_keeps_regions() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        decoder.decode(&scenario_one(), 1000, &mut out).unwrap();
        let before = decoder.store().page.displays.clone();

        let keepalive = Pes::default()
            .page(1, 0, 2, &[])
            .object(1, 1, &[0x10, 0xE4, 0x40], &[])
            .display()
            .build();
        decoder.decode(&keepalive, 2000, &mut out).unwrap();
        assert_eq!(decoder.store().page.displays, before);
        assert_eq!(before, vec![RegionDisplay { region_id: 1, x: 0, y: 0 }]);

        decoder.flush(&mut out);
        assert_eq!(out.len(), 2);
        assert_eq!((out[0].start_ms, out[0].end_ms), (1000, 1999));
        assert_eq!(out[1].bitmap.pixels, vec![3, 2, 1, 0, 3, 2, 1, 0]);
    }

    #[test]
    fn test_full_width_8bit_object() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        let pes = Pes::default()
            .page(0, 1, 2, &[(1, 0, 0)])
            .region(1, 0, false, 4, 2, 8, 0, &[(1, 0, 0)])
            .object(1, 0, &[0x12, 0x05, 0x06, 0x07, 0x08, 0x00, 0x00], &[])
            .display()
            .build();
        decoder.decode(&pes, 0, &mut out).unwrap();
        decoder.flush(&mut out);

        assert_eq!(decoder.diagnostics().malformed, 0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].bitmap.pixels, vec![5, 6, 7, 8, 5, 6, 7, 8]);
        assert_eq!(out[0].bitmap.nb_colors, 256);
    }

    #[test]
    fn test_malformed_object_is_abandoned() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        let pes = Pes::default()
            .page(0, 1, 2, &[(1, 0, 0), (2, 0, 2)])
            .region(1, 0, false, 4, 2, 2, 0, &[(1, 0, 0)])
            .region(2, 0, false, 4, 2, 2, 0, &[(2, 0, 0)])
            .object(2, 0, &[0x13, 0x00], &[])
            .object(1, 0, &[0x10, 0x16, 0xC0], &[])
            .display()
            .build();
        assert_eq!(decoder.decode(&pes, 500, &mut out), Ok(pes.len()));
        assert_eq!(decoder.diagnostics().malformed, 1);
        assert!(!decoder.store().regions[&2].dirty);

        decoder.flush(&mut out);
        assert_eq!(out.len(), 1);
        let bitmap = &out[0].bitmap;
        assert_eq!((bitmap.x, bitmap.y, bitmap.width, bitmap.height), (0, 0, 4, 2));
    }

    #[test]
    fn test_page_clear_closes_subtitle() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        decoder.decode(&scenario_one(), 1000, &mut out).unwrap();

        let clear = Pes::default().page(1, 1, 2, &[]).display().build();
        decoder.decode(&clear, 1800, &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].start_ms, out[0].end_ms), (1000, 1799));

        decoder.flush(&mut out);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_acquisition_without_regions_emits_nothing() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        let pes = Pes::default().page(0, 1, 2, &[]).display().build();
        decoder.decode(&pes, 0, &mut out).unwrap();
        decoder.flush(&mut out);
        assert!(out.is_empty());
        assert!(decoder.store().page.displays.is_empty());
    }

    #[test]
    fn test_implicit_display() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        let pes = Pes::default()
            .page(0, 1, 2, &[(1, 0, 0)])
            .region(1, 0, false, 4, 2, 2, 0, &[(1, 0, 0)])
            .clut(0, &[(1, 0x80, 235, 128, 128, 0)])
            .object(1, 0, &[0x10, 0x16, 0xC0], &[])
            .build();
        decoder.decode(&pes, 40, &mut out).unwrap();
        assert_eq!(decoder.diagnostics().displays, 1);
        decoder.flush(&mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start_ms, 40);
    }

    #[test]
    fn test_segments_for_other_pages_are_filtered() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        let pes = Pes::default().segment(0x10, 7, &[2, 0x04]).build();
        decoder.decode(&pes, 0, &mut out).unwrap();
        assert_eq!(decoder.diagnostics().filtered_segments, 1);
        assert_eq!(decoder.store().page.version, None);

        let config = DvbConfig {
            composition_id: PageId::Any,
            ..DvbConfig::default()
        };
        let mut any = DvbDecoder::new(config, DecoderOptions::default());
        any.decode(&pes, 0, &mut out).unwrap();
        assert_eq!(any.store().page.version, Some(0));
    }

    #[test]
    fn test_consumed_excludes_trailing_bytes() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        let mut pes = scenario_one();
        let len = pes.len();
        pes.push(0xFF);
        assert_eq!(decoder.decode(&pes, 0, &mut out), Ok(len));

        // a segment running past the end stops decoding
        let mut short = Pes::default().display().build();
        short.extend_from_slice(&[0x0F, 0x10, 0x00, 0x01, 0x00, 0x20, 0x00]);
        assert_eq!(decoder.decode(&short, 10, &mut out), Ok(6));
        assert_eq!(decoder.diagnostics().truncated, 1);
    }

    #[test]
    fn test_unsupported_coding_is_counted() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        let setup = Pes::default()
            .page(0, 1, 2, &[(1, 0, 0)])
            .region(1, 0, false, 4, 2, 2, 0, &[(1, 0, 0)])
            .build();
        decoder.decode(&setup, 0, &mut out).unwrap();

        let string_object = Pes::default().segment(0x13, 1, &[0x00, 0x01, 0x04, 0x01, 0x41]).build();
        decoder.decode(&string_object, 10, &mut out).unwrap();
        let unknown = Pes::default().segment(0x15, 1, &[0x00]).build();
        decoder.decode(&unknown, 20, &mut out).unwrap();
        decoder.decode(&unknown, 30, &mut out).unwrap();

        assert_eq!(decoder.diagnostics().unsupported, 3);
        assert_eq!(decoder.diagnostics().malformed, 0);
    }

    #[test]
    fn test_ocr_text_attached() {
        struct Fixed;
        impl crate::dvb::OcrEngine for Fixed {
            fn recognize(&mut self, image: &crate::dvb::OcrImage<'_>) -> Option<String> {
                Some(format!("{}x{}", image.width, image.height))
            }
        }

        init_logging();
        let mut decoder = DvbDecoder::new(DvbConfig::default(), DecoderOptions::default())
            .with_ocr(Box::new(|_: &str| Some(Box::new(Fixed) as Box<dyn crate::dvb::OcrEngine>)));
        let mut out = Vec::new();
        decoder.decode(&scenario_one(), 0, &mut out).unwrap();
        decoder.flush(&mut out);
        assert_eq!(out[0].bitmap.ocr_text.as_deref(), Some("4x2"));
        assert!(!decoder.diagnostics().ocr_failed);
    }

    #[test]
    fn test_snapshot() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        decoder.decode(&scenario_one(), 1000, &mut out).unwrap();

        let snapshot = decoder.snapshot();
        assert_eq!(snapshot.config, DvbConfig::default());
        assert_eq!(snapshot.fts_max, 1000);
        assert_eq!(snapshot.pending_start_ms, Some(1000));
        assert!(snapshot.prev_hash.is_some());

        decoder.flush(&mut out);
        let snapshot = decoder.snapshot();
        assert_eq!(snapshot.pending_start_ms, None);
        assert_eq!(snapshot.last_end_ms, 3000);
    }

    #[test]
    fn test_from_descriptor() {
        let descriptor = [b'e', b'n', b'g', 0x10, 0x00, 0x02, 0x00, 0x02];
        let decoder = DvbDecoder::from_descriptor(&descriptor, DecoderOptions::default()).unwrap();
        assert_eq!(decoder.config().composition_id, PageId::Id(2));
        assert_eq!(decoder.config().lang_index, 1);

        let options = DecoderOptions {
            preferred_language: Some("fra".to_string()),
            ..DecoderOptions::default()
        };
        assert!(DvbDecoder::from_descriptor(&descriptor, options).is_err());
    }

    #[test]
    fn test_repeats_and_timing() {
        let mut decoder = decoder();
        let mut out = Vec::new();
        decoder.decode(&scenario_one(), 1000, &mut out).unwrap();
        for (i, pts) in [1000, 1500, 1500, 90_000].into_iter().enumerate() {
            let version = (i + 1) as u8;
            let top: &[u8] = if i % 2 == 0 { &[0x10, 0xE4, 0x40] } else { &[0x10, 0x16, 0xC0] };
            let pes = Pes::default().page(version, 0, 2, &[]).object(1, version, top, &[]).display().build();
            decoder.decode(&pes, pts, &mut out).unwrap();
        }
        decoder.flush(&mut out);

        let diagnostics = decoder.diagnostics();
        assert_eq!(diagnostics.dedup_hits, 2);
        assert_eq!(diagnostics.duplicate_bitmaps, 1);

        let windows: Vec<_> = out.iter().map(|s| (s.start_ms, s.end_ms)).collect();
        assert_eq!(windows, vec![(1000, 1499), (1500, 3500)]);
        for pair in out.windows(2) {
            assert!(pair[0].end_ms <= pair[1].start_ms);
        }
    }
}
