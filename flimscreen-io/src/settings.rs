//! User-facing settings file, validated into the immutable run configuration.
//!
//! All string-typed choice parameters ("lower"/"higher"/"between",
//! "or"/"and", window anchors, sort columns) are rejected here, at the
//! boundary, before any per-file processing starts.

use crate::error::{Error, Result};
use flimscreen_core::config::{EmptyWeightPolicy, ManualFrames, ScreenConfig, ValidityGate};
use flimscreen_core::criteria::{Comparison, CriterionKind, HitCriterion, HitLogic};
use flimscreen_core::hit::{SortColumn, SortDirection, SortSpec};
use flimscreen_core::phases::{ResponseWindow, WindowAnchor};
use serde::Deserialize;
use std::path::Path;

fn config_error(message: impl Into<String>) -> Error {
    Error::Core(flimscreen_core::Error::ConfigError(message.into()))
}

/// One criterion entry as written by the user.
#[derive(Debug, Clone, Deserialize)]
pub struct CriterionSpec {
    /// Measurement kind, e.g. `"response_relative"`.
    pub kind: String,
    /// Disabled criteria are kept in the file but dropped from the run.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// `"lower"`, `"higher"`, or `"between"`.
    pub comparison: String,
    /// Threshold for `lower`/`higher`.
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Inclusive band for `between`.
    #[serde(default)]
    pub thresholds: Option<(f64, f64)>,
}

fn default_enabled() -> bool {
    true
}

/// Response-window section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowSpec {
    /// `"after_stimulation"` (default) or `"before_calibration"`.
    #[serde(default)]
    pub anchor: Option<String>,
    /// Window length in frames; `-1` means the full available range.
    #[serde(default)]
    pub length: Option<i64>,
    /// Frames kept clear of the anchor event.
    #[serde(default)]
    pub margin: Option<usize>,
}

/// Validity-gate section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValiditySpec {
    /// Allowed band for the calibration-minus-baseline shift.
    #[serde(default)]
    pub calibration_band: Option<(f64, f64)>,
    /// Cap on a cell's baseline deviation from the population mean.
    #[serde(default)]
    pub baseline_deviation_cap: Option<f64>,
}

/// The JSON settings file; every field optional, defaults as documented on
/// [`ScreenConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsFile {
    /// Event-detection sensitivity.
    #[serde(default)]
    pub sensitivity: Option<f64>,
    /// Manual stimulation/calibration frames; empty = automatic, `[0]` =
    /// baseline only.
    #[serde(default)]
    pub manual_frames: Option<Vec<i64>>,
    /// `"or"` (default) or `"and"`.
    #[serde(default)]
    pub hit_logic: Option<String>,
    /// Hit criteria in declaration order.
    #[serde(default)]
    pub criteria: Vec<CriterionSpec>,
    /// Response measurement window.
    #[serde(default)]
    pub response_window: Option<WindowSpec>,
    /// Fraction of the max response defining the rise-time crossing.
    #[serde(default)]
    pub rise_time_fraction: Option<f64>,
    /// Validity-gate thresholds.
    #[serde(default)]
    pub validity: Option<ValiditySpec>,
    /// `"zero_fill"` (default) or `"propagate_undefined"`.
    #[serde(default)]
    pub empty_weight: Option<String>,
    /// Bypass criteria and draw this many random cells per tile.
    #[serde(default)]
    pub random_hits: Option<usize>,
    /// Seed for random-hit sampling.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// `"cell_id"`, `"tile_id"`, or a criterion kind name.
    #[serde(default)]
    pub sort_column: Option<String>,
    /// `"ascending"` or `"descending"`.
    #[serde(default)]
    pub sort_direction: Option<String>,
    /// Maximum rows per published region chunk.
    #[serde(default)]
    pub chunk_size: Option<usize>,
    /// Size of the independent top-N output.
    #[serde(default)]
    pub top_n: Option<usize>,
}

fn parse_kind(value: &str) -> Result<CriterionKind> {
    Ok(match value {
        "baseline" => CriterionKind::Baseline,
        "response_absolute" => CriterionKind::ResponseAbsolute,
        "response_relative" => CriterionKind::ResponseRelative,
        "response_fraction_of_max" => CriterionKind::ResponseFractionOfMax,
        "max_response" => CriterionKind::MaxResponse,
        "max_response_to_avg_baseline" => CriterionKind::MaxResponseToAvgBaseline,
        "rise_time_frames" => CriterionKind::RiseTimeFrames,
        "rapid_response_ratio" => CriterionKind::RapidResponseRatio,
        "secondary_intensity" => CriterionKind::SecondaryIntensity,
        other => return Err(config_error(format!("unknown criterion kind '{other}'"))),
    })
}

impl CriterionSpec {
    fn build(&self) -> Result<HitCriterion> {
        let kind = parse_kind(&self.kind)?;
        let comparison = match self.comparison.as_str() {
            "lower" => Comparison::Lower(self.single_threshold()?),
            "higher" => Comparison::Higher(self.single_threshold()?),
            "between" => {
                let (lo, hi) = self.thresholds.ok_or_else(|| {
                    config_error(format!("criterion '{}': 'between' needs thresholds", self.kind))
                })?;
                if lo > hi {
                    return Err(config_error(format!(
                        "criterion '{}': between band {lo}..{hi} is inverted",
                        self.kind
                    )));
                }
                Comparison::Between(lo, hi)
            }
            other => {
                return Err(config_error(format!(
                    "criterion '{}': unknown comparison '{other}'",
                    self.kind
                )))
            }
        };
        Ok(HitCriterion { kind, comparison })
    }

    fn single_threshold(&self) -> Result<f64> {
        self.threshold.ok_or_else(|| {
            config_error(format!("criterion '{}': missing threshold", self.kind))
        })
    }
}

impl SettingsFile {
    /// Reads the JSON settings file.
    pub fn read_json(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Validates every field and assembles the run configuration.
    pub fn into_config(self) -> Result<ScreenConfig> {
        let defaults = ScreenConfig::default();

        let hit_logic = match self.hit_logic.as_deref() {
            None => HitLogic::Or,
            Some("or") => HitLogic::Or,
            Some("and") => HitLogic::And,
            Some(other) => return Err(config_error(format!("unknown hit logic '{other}'"))),
        };

        let criteria: Vec<HitCriterion> = self
            .criteria
            .iter()
            .filter(|spec| spec.enabled)
            .map(CriterionSpec::build)
            .collect::<Result<_>>()?;

        let response_window = match self.response_window {
            None => ResponseWindow::default(),
            Some(spec) => {
                let anchor = match spec.anchor.as_deref() {
                    None | Some("after_stimulation") => WindowAnchor::AfterStimulation,
                    Some("before_calibration") => WindowAnchor::BeforeCalibration,
                    Some(other) => {
                        return Err(config_error(format!("unknown window anchor '{other}'")))
                    }
                };
                let length = match spec.length {
                    None | Some(-1) => None,
                    Some(len) if len > 0 => Some(len as usize),
                    Some(len) => {
                        return Err(config_error(format!("window length {len} must be -1 or > 0")))
                    }
                };
                ResponseWindow {
                    anchor,
                    length,
                    margin: spec.margin.unwrap_or(0),
                }
            }
        };

        let sort_column = match self.sort_column.as_deref() {
            None => defaults.sort.column,
            Some("cell_id") => SortColumn::CellId,
            Some("tile_id") => SortColumn::TileId,
            Some(other) => SortColumn::Criterion(parse_kind(other)?),
        };
        let sort_direction = match self.sort_direction.as_deref() {
            None => defaults.sort.direction,
            Some("ascending") => SortDirection::Ascending,
            Some("descending") => SortDirection::Descending,
            Some(other) => return Err(config_error(format!("unknown sort direction '{other}'"))),
        };

        let empty_weight = match self.empty_weight.as_deref() {
            None | Some("zero_fill") => EmptyWeightPolicy::ZeroFill,
            Some("propagate_undefined") => EmptyWeightPolicy::PropagateUndefined,
            Some(other) => {
                return Err(config_error(format!("unknown empty-weight policy '{other}'")))
            }
        };

        let validity = match self.validity {
            None => ValidityGate::default(),
            Some(spec) => ValidityGate {
                calibration_band: spec.calibration_band,
                baseline_deviation_cap: spec.baseline_deviation_cap,
            },
        };

        let config = ScreenConfig {
            sensitivity: self.sensitivity.unwrap_or(defaults.sensitivity),
            manual_frames: match self.manual_frames {
                None => ManualFrames::Auto,
                Some(frames) => ManualFrames::parse(&frames)?,
            },
            hit_logic,
            criteria,
            response_window,
            rise_time_fraction: self.rise_time_fraction.unwrap_or(defaults.rise_time_fraction),
            validity,
            empty_weight,
            random_hits: self.random_hits,
            random_seed: self.random_seed,
            sort: SortSpec {
                column: sort_column,
                direction: sort_direction,
            },
            chunk_size: self.chunk_size.unwrap_or(defaults.chunk_size),
            top_n: self.top_n.unwrap_or(defaults.top_n),
        };
        config.validate()?;
        Ok(config)
    }
}
