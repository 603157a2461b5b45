//! Deterministic image shattering and multiplicative multi-canvas convergence
//!
//! An image is partitioned into irregular pieces around random seed points,
//! the pieces are dealt across several output images, and a set of canvases is
//! iteratively corrected until their elementwise product reproduces a target.

#![deny(unsafe_code)]

/// Convergence loops over stacked canvases
pub mod convergence;
/// Input/output operations and error handling
pub mod io;
/// Image arithmetic, tone mapping and filtering
pub mod math;
/// Applying shatter patterns and caching them
pub mod shatter;
/// Spatial partitioning into shatter patterns
pub mod spatial;

pub use io::error::{Result, ShatterError};
