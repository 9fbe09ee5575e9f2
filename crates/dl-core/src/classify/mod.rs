//! Content-classification heuristics
//!
//! Pure functions from a color, a document snapshot, or a binary resource
//! to a classification value. Observation and re-triggering (mutation
//! watchers, message plumbing) live outside this crate; everything here is
//! safe to call repeatedly.

pub mod color;
pub mod image;
pub mod tone;

pub use color::{valence_of, valence_raw, CachedResolver, ColorResolver, CssColorResolver, Rgba, Valence};
pub use image::{bg_image_kind, detect_animated, is_animated_gif, BgImageKind, FetchError, PendingDetections, ResourceFetcher};
pub use tone::{declares_preferred_scheme, page_tone, PageSnapshot, StyleRule, StyleSheet, TextBlock, Tone};
