//! Run log collecting data-quality warnings across a batch.

use std::fmt;

/// A recoverable data-quality event. Warnings never halt the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// No second-derivative peak found; stimulation fell back to frame 0.
    NoStimulationPeak,
    /// Only one peak found; no calibration frame detected.
    NoCalibrationPeak,
    /// Zero cells segmented in a tile.
    NoCellsFound { tile: usize },
    /// Cells removed by the validity gate before criterion evaluation.
    CellsExcluded { tile: usize, excluded: usize },
    /// Manual frames were outside the trace and were clamped.
    ManualFramesClamped {
        requested: (usize, usize),
        clamped: (usize, usize),
    },
    /// A tile's input read failed once and was retried.
    TileRetried { tile: usize },
    /// A tile was skipped after the retry also failed.
    TileSkipped { tile: usize, reason: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NoStimulationPeak => {
                write!(f, "no stimulation peak found, using frame 0")
            }
            Warning::NoCalibrationPeak => {
                write!(f, "no calibration peak found, response runs to end of trace")
            }
            Warning::NoCellsFound { tile } => write!(f, "no cells found in tile {tile}"),
            Warning::CellsExcluded { tile, excluded } => {
                write!(f, "{excluded} cells excluded by validity gate in tile {tile}")
            }
            Warning::ManualFramesClamped { requested, clamped } => write!(
                f,
                "manual frames {}/{} clamped to {}/{}",
                requested.0, requested.1, clamped.0, clamped.1
            ),
            Warning::TileRetried { tile } => write!(f, "tile {tile} read retried"),
            Warning::TileSkipped { tile, reason } => {
                write!(f, "tile {tile} skipped: {reason}")
            }
        }
    }
}

/// Ordered collection of warnings for one run.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    warnings: Vec<Warning>,
}

impl RunLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a warning.
    pub fn push(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Warnings in insertion order.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Number of warnings.
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Whether the run completed without warnings.
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_order_and_display() {
        let mut log = RunLog::new();
        log.push(Warning::NoStimulationPeak);
        log.push(Warning::NoCellsFound { tile: 3 });
        assert_eq!(log.len(), 2);
        assert_eq!(log.warnings()[1].to_string(), "no cells found in tile 3");
    }
}
