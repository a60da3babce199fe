//! Canonical record model for scraped anime/manga metadata.
//!
//! The upstream scraper hands back loosely structured JSON. This crate turns
//! that into a [`Record`]: payload normalized (keys sorted at every level)
//! and fingerprinted with blake3 so that real content changes are
//! distinguishable from noise like key reordering.
//!
//! Presentation-only fields (trailer, season, year, broadcast, themes,
//! image variants) are pure functions over a stored record, collected in
//! [`transforms`]. They are computed on read and never persisted.

pub mod error;
mod model;
pub mod transforms;

pub use crate::model::Record;
