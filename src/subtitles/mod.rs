//! Custom subtitle channel: cue parsing, document fetching and time-driven
//! cue activation.

pub mod cue_parser;
pub mod delivery;
pub mod fetcher;

pub use delivery::SubtitleDelivery;
pub use fetcher::{DocumentFetcher, HttpDocumentFetcher};
