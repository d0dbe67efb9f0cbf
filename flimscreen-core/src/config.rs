//! Immutable run configuration, built once and threaded through the pipeline.

use crate::criteria::{HitCriterion, HitLogic};
use crate::error::{Error, Result};
use crate::hit::SortSpec;
use crate::phases::ResponseWindow;

/// Manual stimulation/calibration frame override.
///
/// The configuration surface is "comma-separated frames, empty = automatic";
/// the single value `0` is the baseline-only sentinel. Any other cardinality
/// is rejected when the configuration is built, before per-file processing
/// begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManualFrames {
    /// Detect stimulation and calibration automatically.
    #[default]
    Auto,
    /// No stimulation: the whole trace is baseline.
    BaselineOnly,
    /// Explicit stimulation and calibration frames (0-based).
    Explicit { stimulation: usize, calibration: usize },
}

impl ManualFrames {
    /// Parses the raw frame list from user configuration.
    pub fn parse(values: &[i64]) -> Result<Self> {
        match values {
            [] => Ok(ManualFrames::Auto),
            [0] => Ok(ManualFrames::BaselineOnly),
            [single] => Err(Error::ConfigError(format!(
                "manual frames: single value {single} is not the baseline-only sentinel 0"
            ))),
            [stim, cal] => {
                if *stim < 0 || *cal < 0 {
                    return Err(Error::ConfigError(format!(
                        "manual frames must be non-negative, got {stim},{cal}"
                    )));
                }
                if stim >= cal {
                    return Err(Error::ConfigError(format!(
                        "manual stimulation frame {stim} must precede calibration frame {cal}"
                    )));
                }
                Ok(ManualFrames::Explicit {
                    stimulation: *stim as usize,
                    calibration: *cal as usize,
                })
            }
            other => Err(Error::ConfigError(format!(
                "manual frames: expected 0, 1, or 2 values, got {}",
                other.len()
            ))),
        }
    }
}

/// Policy for a cell/timepoint with zero total intensity weight.
///
/// The source pipeline silently coerced the undefined weighted average to 0;
/// here that is a named, swappable policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyWeightPolicy {
    /// Publish 0.0 (the historical behavior; keeps kymographs NaN-free).
    #[default]
    ZeroFill,
    /// Publish NaN so the undefined value stays visible (testing only).
    PropagateUndefined,
}

/// Pre-criterion validity gate thresholds. `None` disables a check.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ValidityGate {
    /// Allowed band for `mean_calibration - mean_baseline`.
    pub calibration_band: Option<(f64, f64)>,
    /// Cap on `mean_baseline - population_mean_baseline`.
    pub baseline_deviation_cap: Option<f64>,
}

/// Complete configuration for one analysis run.
///
/// Built once at run start; no component reads ambient state.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenConfig {
    /// Scales the stddev threshold for peak prominence (default 1.0).
    pub sensitivity: f64,
    /// Manual stimulation/calibration override.
    pub manual_frames: ManualFrames,
    /// Combination rule across enabled criteria.
    pub hit_logic: HitLogic,
    /// Enabled criteria in declaration order.
    pub criteria: Vec<HitCriterion>,
    /// Response measurement window policy.
    pub response_window: ResponseWindow,
    /// Fraction of the maximum response diff defining the rise time
    /// crossing (default 0.75).
    pub rise_time_fraction: f64,
    /// Validity gate evaluated before any criterion.
    pub validity: ValidityGate,
    /// Empty-weight handling in trace extraction.
    pub empty_weight: EmptyWeightPolicy,
    /// Random-hit mode: bypass criteria and draw this many cells.
    pub random_hits: Option<usize>,
    /// Seed for random-hit sampling; `None` seeds from the OS.
    pub random_seed: Option<u64>,
    /// Hit list sorting policy.
    pub sort: SortSpec,
    /// Maximum rows per published chunk.
    pub chunk_size: usize,
    /// Size of the independent top-N output.
    pub top_n: usize,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            manual_frames: ManualFrames::Auto,
            hit_logic: HitLogic::Or,
            criteria: Vec::new(),
            response_window: ResponseWindow::default(),
            rise_time_fraction: 0.75,
            validity: ValidityGate::default(),
            empty_weight: EmptyWeightPolicy::ZeroFill,
            random_hits: None,
            random_seed: None,
            sort: SortSpec::default(),
            chunk_size: 1000,
            top_n: 50,
        }
    }
}

impl ScreenConfig {
    /// Validates cross-field constraints; call after assembly, before any
    /// per-file processing.
    pub fn validate(&self) -> Result<()> {
        if !self.sensitivity.is_finite() || self.sensitivity <= 0.0 {
            return Err(Error::ConfigError(format!(
                "sensitivity must be positive, got {}",
                self.sensitivity
            )));
        }
        if !(0.0..=1.0).contains(&self.rise_time_fraction) {
            return Err(Error::ConfigError(format!(
                "rise time fraction must be in [0, 1], got {}",
                self.rise_time_fraction
            )));
        }
        if self.chunk_size == 0 {
            return Err(Error::ConfigError("chunk size must be at least 1".into()));
        }
        if let Some((lo, hi)) = self.validity.calibration_band {
            if lo > hi {
                return Err(Error::ConfigError(format!(
                    "calibration band lower bound {lo} exceeds upper bound {hi}"
                )));
            }
        }
        if self.criteria.is_empty() && self.random_hits.is_none() {
            return Err(Error::ConfigError(
                "no criteria enabled and random-hit mode off".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{Comparison, CriterionKind};

    #[test]
    fn test_manual_frames_cardinality() {
        assert_eq!(ManualFrames::parse(&[]).unwrap(), ManualFrames::Auto);
        assert_eq!(ManualFrames::parse(&[0]).unwrap(), ManualFrames::BaselineOnly);
        assert_eq!(
            ManualFrames::parse(&[3, 7]).unwrap(),
            ManualFrames::Explicit {
                stimulation: 3,
                calibration: 7
            }
        );
        assert!(ManualFrames::parse(&[5]).is_err());
        assert!(ManualFrames::parse(&[7, 3]).is_err());
        assert!(ManualFrames::parse(&[-1, 3]).is_err());
        assert!(ManualFrames::parse(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ScreenConfig {
            criteria: vec![HitCriterion {
                kind: CriterionKind::ResponseRelative,
                comparison: Comparison::Higher(0.5),
            }],
            ..ScreenConfig::default()
        };
        assert!(config.validate().is_ok());

        config.sensitivity = 0.0;
        assert!(config.validate().is_err());
        config.sensitivity = 1.0;

        config.chunk_size = 0;
        assert!(config.validate().is_err());
        config.chunk_size = 1000;

        config.validity.calibration_band = Some((1.0, -1.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_requires_criteria_or_random_mode() {
        let empty = ScreenConfig::default();
        assert!(empty.validate().is_err());
        let random = ScreenConfig {
            random_hits: Some(10),
            ..ScreenConfig::default()
        };
        assert!(random.validate().is_ok());
    }
}
