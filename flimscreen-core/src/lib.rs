//! flimscreen-core: Core types for per-cell FLIM trace analysis.
//!
//! This crate provides the foundational abstractions for trace extraction,
//! stimulation-event phasing, hit criteria, stage geometry, and run
//! configuration.
//!

pub mod config;
pub mod criteria;
pub mod error;
pub mod hit;
pub mod kymograph;
pub mod labelmap;
pub mod phases;
pub mod runlog;
pub mod stack;
pub mod stage;

pub use config::{EmptyWeightPolicy, ManualFrames, ScreenConfig, ValidityGate};
pub use criteria::{Comparison, CriterionKind, HitCriterion, HitLogic};
pub use error::{Error, Result};
pub use hit::{HitRecord, HitTable, Measurement, SortColumn, SortDirection, SortSpec};
pub use kymograph::{Kymograph, RankVector};
pub use labelmap::{LabelMap, PixelCentroid};
pub use phases::{FramePhases, ResponseWindow, WindowAnchor};
pub use runlog::{RunLog, Warning};
pub use stack::FrameStack;
pub use stage::{ScanDirection, StageCoord, TileLayout};
