//! PMT subtitling descriptor (tag 0x59) and the ISO-639 language table.

use log::{debug, info};

use super::{DvbConfig, PageId};
use crate::error::{DecodeError, DecodeResult};

/// Bytes per descriptor entry: language[3], type, composition id, ancillary id.
const ENTRY_LEN: usize = 8;

/// ISO-639-2 codes known to the decoder. Index 0 is "undefined".
pub static LANGUAGES: [&str; 99] = [
    "und", "eng", "afr", "amh", "ara", "asm", "aze", "bel", "ben", "bod", "bos", "bul", "cat", "ceb", "ces", "chs",
    "chi", "chr", "cym", "dan", "deu", "dzo", "ell", "enm", "epo", "equ", "est", "eus", "fas", "fin", "fra", "frk",
    "frm", "gle", "glg", "grc", "guj", "hat", "heb", "hin", "hrv", "hun", "iku", "ind", "isl", "ita", "jav", "jpn",
    "kan", "kat", "kaz", "khm", "kir", "kor", "kur", "lao", "lat", "lav", "lit", "mal", "mar", "mkd", "mlt", "msa",
    "mya", "nep", "nld", "nor", "ori", "osd", "pan", "pol", "por", "pus", "ron", "rus", "san", "sin", "slk", "slv",
    "spa", "sqi", "srp", "swa", "swe", "syr", "tam", "tel", "tgk", "tgl", "tha", "tir", "tur", "uig", "ukr", "urd",
    "uzb", "vie", "yid",
];

/// Index of a language code in [`LANGUAGES`]; unknown codes map to 0.
pub fn language_index(code: &str) -> usize {
    let code = code.to_ascii_lowercase();
    LANGUAGES.iter().position(|&lang| lang == code).unwrap_or(0)
}

/// Language code for a table index.
pub fn language_code(index: usize) -> Option<&'static str> {
    LANGUAGES.get(index).copied()
}

/// One subtitle service listed in the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitlingEntry {
    /// Lower-cased ISO-639 code as transmitted.
    pub language: String,
    pub subtitling_type: u8,
    pub composition_page_id: u16,
    pub ancillary_page_id: u16,
}

impl SubtitlingEntry {
    fn parse(record: &[u8]) -> Self {
        let language = record[..3]
            .iter()
            .map(|&b| char::from(b.to_ascii_lowercase()))
            .collect();
        Self {
            language,
            subtitling_type: record[3],
            composition_page_id: u16::from_be_bytes([record[4], record[5]]),
            ancillary_page_id: u16::from_be_bytes([record[6], record[7]]),
        }
    }

    /// The stream identity this entry selects.
    pub fn config(&self) -> DvbConfig {
        DvbConfig {
            composition_id: PageId::Id(self.composition_page_id),
            ancillary_id: PageId::Id(self.ancillary_page_id),
            lang_index: language_index(&self.language),
            subtitling_type: self.subtitling_type,
        }
    }
}

/// Parse the body of a subtitling descriptor (after tag and length).
pub fn parse_subtitling_descriptor(data: &[u8]) -> DecodeResult<Vec<SubtitlingEntry>> {
    if data.is_empty() {
        return Err(DecodeError::Truncated("subtitling descriptor"));
    }
    if data.len() % ENTRY_LEN != 0 {
        return Err(DecodeError::malformed(format!(
            "subtitling descriptor length {} is not a multiple of {}",
            data.len(),
            ENTRY_LEN
        )));
    }

    let entries: Vec<SubtitlingEntry> = data.chunks_exact(ENTRY_LEN).map(SubtitlingEntry::parse).collect();
    if entries.len() > 1 {
        info!("subtitling descriptor lists {} languages, following the first", entries.len());
    }
    for entry in &entries {
        debug!(
            "subtitle service '{}' type 0x{:02x} pages {}/{}",
            entry.language, entry.subtitling_type, entry.composition_page_id, entry.ancillary_page_id
        );
    }
    Ok(entries)
}

/// Resolve the stream identity from a subtitling descriptor.
///
/// The first entry wins. With a preferred language set, a stream in another
/// language is rejected as `Unsupported`.
pub fn parse_dvb_description(data: &[u8], preferred_language: Option<&str>) -> DecodeResult<DvbConfig> {
    let entries = parse_subtitling_descriptor(data)?;
    let first = &entries[0];
    let config = first.config();

    if let Some(preferred) = preferred_language {
        let preferred = preferred.to_ascii_lowercase();
        let resolved = language_code(config.lang_index).unwrap_or("und");
        if preferred != resolved && preferred != first.language {
            return Err(DecodeError::unsupported(format!(
                "stream language '{}' is not '{}'",
                first.language, preferred
            )));
        }
    }

    Ok(config)
}
