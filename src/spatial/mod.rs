//! Spatial partitioning of images into shatter patterns
//!
//! This module contains:
//! - A k-d tree for nearest seed point lookup
//! - Seed point generation and per-pixel region assignment
//! - The immutable pattern type shared by extraction and caching

/// Nearest-neighbour index over seed points
pub mod kdtree;
/// Seed point generation and region assignment
pub mod partition;
/// Shatter pattern and bounding box types
pub mod pattern;

pub use partition::create_shatter_pattern;
pub use pattern::{BoundingBox, ShatterPattern};
