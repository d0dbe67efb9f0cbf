//! File input/output for the screening pipeline.
//!
//! Readers for labelmap and frame-stack CSV matrices, acquisition metadata
//! (textual headers and JSON sidecars), the user settings file, and writers
//! for kymographs, hit tables, region point lists, and stage-position dumps.

#![warn(missing_docs)]

mod error;
pub mod matrix;
pub mod metadata;
pub mod publisher;
pub mod region;
pub mod settings;

pub use error::{Error, Result};
pub use matrix::{read_frame_csv, read_labelmap_csv, read_stack_csv, write_kymograph_csv};
pub use metadata::{read_labelmap_with_retry, LayoutSpec};
pub use publisher::{write_hit_table_csv, write_stage_positions, HitListPublisher, PublishSummary};
pub use region::{RegionCollection, RegionPoint, StackEntry};
pub use settings::SettingsFile;
