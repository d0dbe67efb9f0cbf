//! Hit criteria: measurement kinds, comparisons, and combination logic.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-cell measurement a criterion is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CriterionKind {
    /// Mean lifetime/ratio over the baseline frames.
    Baseline,
    /// Mean over the response window, absolute.
    ResponseAbsolute,
    /// Mean over the response window minus the cell's own baseline mean.
    ResponseRelative,
    /// Mean baseline-subtracted response divided by the maximum
    /// baseline-subtracted response.
    ResponseFractionOfMax,
    /// Maximum absolute value over the response frames.
    MaxResponse,
    /// Maximum response minus the population-average baseline.
    MaxResponseToAvgBaseline,
    /// First response frame where the baseline-subtracted response crosses
    /// the configured fraction of its maximum.
    RiseTimeFrames,
    /// Mean of the second half of the baseline-subtracted response divided
    /// by the mean of the first half.
    RapidResponseRatio,
    /// Mean secondary-channel intensity over the cell's pixels.
    SecondaryIntensity,
}

impl CriterionKind {
    /// Column name used in hit tables.
    pub fn column_name(&self) -> &'static str {
        match self {
            CriterionKind::Baseline => "baseline",
            CriterionKind::ResponseAbsolute => "response_abs",
            CriterionKind::ResponseRelative => "response_rel",
            CriterionKind::ResponseFractionOfMax => "response_frac_max",
            CriterionKind::MaxResponse => "max_response",
            CriterionKind::MaxResponseToAvgBaseline => "max_response_avg_base",
            CriterionKind::RiseTimeFrames => "rise_time_frames",
            CriterionKind::RapidResponseRatio => "rapid_response_ratio",
            CriterionKind::SecondaryIntensity => "secondary_intensity",
        }
    }
}

/// Comparison against criterion threshold(s).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Comparison {
    /// Measurement strictly below the threshold.
    Lower(f64),
    /// Measurement strictly above the threshold.
    Higher(f64),
    /// Measurement inside the inclusive band.
    Between(f64, f64),
}

impl Comparison {
    /// Evaluates the comparison; non-finite measurements never match.
    pub fn matches(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match *self {
            Comparison::Lower(t) => value < t,
            Comparison::Higher(t) => value > t,
            Comparison::Between(lo, hi) => value >= lo && value <= hi,
        }
    }
}

/// One enabled hit criterion.
///
/// Built once per run from user configuration; immutable during
/// classification. Disabled criteria are dropped at configuration build
/// time, so presence in the configured list means enabled.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HitCriterion {
    pub kind: CriterionKind,
    pub comparison: Comparison,
}

/// How enabled criteria combine into a hit verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum HitLogic {
    /// A cell is a hit when at least one enabled criterion matches.
    #[default]
    Or,
    /// A cell is a hit only when every enabled criterion matches.
    And,
}
