//! flimscreen-algorithms: Trace extraction and hit classification.
//!
//! This crate provides the analysis engine:
//! - **TraceExtractor** - intensity-weighted per-cell traces (kymograph)
//! - **EventDetector** - stimulation/calibration frame detection
//! - **rank_by_response** - response ranking and kymograph sorting
//! - **HitClassifier** - multi-criterion hit classification
//!
#![warn(missing_docs)]

mod classify;
mod events;
mod pipeline;
mod ranking;
mod trace;

pub use classify::{ClassifierInput, HitClassifier};
pub use events::{
    backward_difference, population_stddev, prominent_maxima, resolve_phases, EventDetector, Peak,
};
pub use pipeline::{analyze_tile, TileAnalysis};
pub use ranking::{rank_by_response, RankedKymograph};
pub use trace::TraceExtractor;

// Re-export core types the engine operates on
pub use flimscreen_core::{FramePhases, Kymograph, RankVector, ScreenConfig};
