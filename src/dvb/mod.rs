//! DVB subtitle (ETSI EN 300 743) segment parsing and page composition.
//!
//! This module decodes the subtitle PES payloads of an MPEG transport stream
//! into composed, timed bitmaps.

mod clut;
mod composition;
mod decoder;
mod dedup;
mod descriptor;
mod display_definition;
mod object;
mod ocr;
mod options;
mod page;
mod region;
mod rle;
mod segment;
mod store;
mod subtitle;
mod timing;

pub use clut::*;
pub use composition::*;
pub use decoder::*;
pub use dedup::*;
pub use descriptor::*;
pub use display_definition::*;
pub use object::*;
pub use ocr::*;
pub use options::*;
pub use page::*;
pub use region::*;
pub use rle::*;
pub use segment::*;
pub use store::*;
pub use subtitle::*;
pub use timing::*;
