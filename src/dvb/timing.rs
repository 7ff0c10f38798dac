//! End-time resolution for subtitles.
//!
//! A DVB page has no explicit end time: it stays until the next display set
//! replaces it or its page time-out expires. The controller holds the most
//! recent subtitle open and closes it when the next one arrives.

use log::{debug, trace};

use super::{ComposedBitmap, Subtitle};

#[derive(Debug, Clone)]
struct Pending {
    start_ms: i64,
    timeout_ms: u32,
    lang_index: usize,
    bitmap: ComposedBitmap,
}

#[derive(Debug)]
pub struct TimingController {
    pending: Option<Pending>,
    /// Highest frame time-stamp observed on the stream.
    fts_max: i64,
    /// End time of the last closed subtitle.
    last_end_ms: i64,
    extraction_start_ms: i64,
    extraction_end_ms: Option<i64>,
    max_duration_ms: i64,
}

impl TimingController {
    pub fn new(extraction_start_ms: i64, extraction_end_ms: Option<i64>, max_duration_ms: i64) -> Self {
        Self {
            pending: None,
            fts_max: 0,
            last_end_ms: 0,
            extraction_start_ms,
            extraction_end_ms,
            max_duration_ms: max_duration_ms.max(1),
        }
    }

    #[inline]
    pub fn fts_max(&self) -> i64 {
        self.fts_max
    }

    pub fn advance(&mut self, fts_ms: i64) {
        if fts_ms > self.fts_max {
            self.fts_max = fts_ms;
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Start of the subtitle currently held open.
    pub fn pending_start_ms(&self) -> Option<i64> {
        self.pending.as_ref().map(|p| p.start_ms)
    }

    #[inline]
    pub fn last_end_ms(&self) -> i64 {
        self.last_end_ms
    }

    /// Close the open subtitle because a new display starts at `new_start_ms`.
    ///
    /// The end is bounded by `pre_fts_max`, the time base before this PES,
    /// when it lies past the open subtitle's start, and by the new start.
    /// Returns the closed subtitle if it overlaps the extraction range.
    pub fn close(&mut self, pre_fts_max: i64, new_start_ms: i64) -> Option<Subtitle> {
        let pending = self.pending.take()?;
        let bound = if pre_fts_max > pending.start_ms {
            pre_fts_max.min(new_start_ms)
        } else {
            new_start_ms
        };
        self.finish(pending, bound - 1)
    }

    /// Close the open subtitle at its page time-out.
    pub fn flush(&mut self) -> Option<Subtitle> {
        let pending = self.pending.take()?;
        let end = pending.start_ms + self.duration_limit(pending.timeout_ms);
        self.finish(pending, end)
    }

    /// Hold `bitmap` open from `start_ms`. The start never precedes the end
    /// of the previous subtitle.
    pub fn open(&mut self, bitmap: ComposedBitmap, start_ms: i64, timeout_ms: u32, lang_index: usize) {
        let start_ms = start_ms.max(self.last_end_ms);
        trace!("subtitle opened at {} ms, time-out {} ms", start_ms, timeout_ms);
        self.pending = Some(Pending {
            start_ms,
            timeout_ms,
            lang_index,
            bitmap,
        });
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.fts_max = 0;
        self.last_end_ms = 0;
    }

    /// Longest time a subtitle may stay up. A zero time-out means none was given.
    fn duration_limit(&self, timeout_ms: u32) -> i64 {
        match i64::from(timeout_ms) {
            0 => self.max_duration_ms,
            timeout => timeout.min(self.max_duration_ms),
        }
    }

    fn finish(&mut self, pending: Pending, candidate_end: i64) -> Option<Subtitle> {
        let start = pending.start_ms;
        let mut end = candidate_end.min(start + self.duration_limit(pending.timeout_ms));
        if end <= start {
            end = start + 1;
        }
        self.last_end_ms = end;

        let after_start = end > self.extraction_start_ms;
        let before_end = self.extraction_end_ms.map_or(true, |limit| start < limit);
        if !(after_start && before_end) {
            debug!("subtitle {}..{} ms outside the extraction range", start, end);
            return None;
        }

        Some(Subtitle {
            start_ms: start,
            end_ms: end,
            lang_index: pending.lang_index,
            bitmap: pending.bitmap,
        })
    }
}

impl Default for TimingController {
    fn default() -> Self {
        Self::new(0, None, super::DEFAULT_MAX_DURATION_MS)
    }
}
