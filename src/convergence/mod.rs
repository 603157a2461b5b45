//! Driving stacked canvases towards a target under multiplicative combination
//!
//! This module contains:
//! - Run state, outcomes and the rounded indicator history
//! - Canvas preparation and validation
//! - The fragment loop, which corrects canvases with shattered residuals
//! - Blob detection and tessellation for the coarse-to-fine pyramid loop

/// Colour-and-position blob detection
pub mod blob;
/// Canvas initialisation and validation
pub mod canvas;
/// Residual-fragment convergence loop
pub mod fragment;
/// Blob-tessellation pyramid loop
pub mod pyramid;
/// Outcomes, reports and per-run state
pub mod state;
/// Rotated blob duplicates
pub mod tessellation;

pub use fragment::{FragmentConfig, converge_fragments};
pub use pyramid::{PyramidConfig, PyramidReport, run_pyramid};
pub use state::{ConvergenceReport, Outcome, OverflowPolicy};
