//! Error types for flimscreen-core.

use thiserror::Error;

/// Result type alias for flimscreen operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for flimscreen operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (malformed criteria, manual frames, layout).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Spatial or temporal shape mismatch between inputs.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    /// Labelmap ids are not dense in [1, N].
    #[error("labelmap ids are not dense: id {missing} missing of {nr_cells}")]
    LabelGap { missing: u32, nr_cells: u32 },

    /// Rank vector is not a permutation of [0, nr_cells).
    #[error("invalid rank vector: {0}")]
    InvalidRank(String),

    /// Tile index outside the configured layout.
    #[error("tile index {tile} outside layout of {nr_tiles} tiles")]
    TileOutOfRange { tile: usize, nr_tiles: usize },

    /// Required input was empty.
    #[error("empty input: {0}")]
    EmptyInput(&'static str),
}
