#![warn(rust_2018_idioms)]

//! # Sanitizing transcoder for OpenType and TrueType fonts
//!
//! fontscrub parses untrusted font files, validates every table it knows
//! about — offsets, counts, cross-references, and CFF bytecode — and
//! re-serializes the result into a clean sfnt that is structurally safe to
//! hand to a rasterizer. Malformed input is rejected rather than repaired,
//! with a handful of targeted fixes (the `name` table is regenerated, `post`
//! is downgraded to version 3.0, `head.indexToLocFormat` is upgraded when
//! repacked `loca` offsets outgrow the short form).
//!
//! ## Supported input
//!
//! * sfnt (TrueType and CFF flavored OpenType)
//! * TrueType collections (`ttcf`), one member per run
//! * WOFF (per-table zlib)
//! * WOFF2 at the interface boundary only: callers decompress to sfnt bytes
//!   first
//!
//! The output is always a bare sfnt with a sorted table directory, 4-byte
//! table padding, and recomputed checksums. Sanitizing the output again
//! yields byte-identical bytes.
//!
//! ## Example
//!
//! ```no_run
//! let data = std::fs::read("font.ttf").unwrap();
//! match fontscrub::sanitize(&data) {
//!     Ok(clean) => std::fs::write("clean.ttf", clean).unwrap(),
//!     Err(err) => eprintln!("rejected: {}", err),
//! }
//! ```
//!
//! Policy decisions — per-table actions, WOFF2 enablement, dropping color
//! bitmaps — are made through a [context::SanitizeContext] passed to
//! [sanitize_with].

pub mod binary;
pub mod bitmap;
pub mod cff;
pub mod checksum;
pub mod context;
pub mod error;
pub mod font_data;
pub mod layout;
pub mod sanitize;
pub mod size;
pub mod tables;
pub mod tag;
pub mod variations;
pub mod woff;
pub mod woff2;

pub use context::{DefaultContext, MessageLevel, SanitizeContext, TableAction};
pub use error::SanitizeError;
pub use sanitize::{sanitize, sanitize_index, sanitize_with};

/// The crate version, as reported by `ot-scrub --version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
