//! Applying shatter patterns to concrete images
//!
//! This module contains:
//! - The persistent pattern cache and the `PatternSource` seam
//! - Piece extraction (crop plus alpha mask per region)
//! - Round-robin distribution and compositing over a background

/// Pattern memoisation keyed by partition inputs
pub mod cache;
/// Piece distribution and reassembly
pub mod composite;
/// Piece extraction from a pattern and an image
pub mod pieces;

pub use cache::{CachePolicy, DirectPatterns, PatternCache, PatternSource};
pub use composite::{construct_image_from_pieces, distribute, shatter_image};
pub use pieces::{Piece, apply_shatter_pattern};
