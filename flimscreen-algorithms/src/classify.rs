//! Rule-based hit classification over per-cell trace statistics.

use flimscreen_core::config::ScreenConfig;
use flimscreen_core::criteria::{CriterionKind, HitLogic};
use flimscreen_core::error::{Error, Result};
use flimscreen_core::hit::{HitRecord, HitTable, Measurement};
use flimscreen_core::kymograph::Kymograph;
use flimscreen_core::labelmap::PixelCentroid;
use flimscreen_core::phases::FramePhases;
use flimscreen_core::runlog::{RunLog, Warning};
use flimscreen_core::stage::TileLayout;
use rand::rngs::StdRng;
use rand::{seq::index::sample, SeedableRng};

/// Everything the classifier needs for one tile.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierInput<'a> {
    /// Per-cell traces in label order.
    pub kymograph: &'a Kymograph,
    /// Frame phase boundaries for this tile.
    pub phases: &'a FramePhases,
    /// Per-cell pixel centroids in label order.
    pub centroids: &'a [PixelCentroid],
    /// Per-cell mean secondary-channel intensity, if acquired.
    pub secondary: Option<&'a [f64]>,
    /// Row-major tile index of this field of view.
    pub tile_id: usize,
    /// Mosaic layout for stage-coordinate annotation.
    pub layout: &'a TileLayout,
}

/// Per-cell aggregates computed once and read by every criterion.
#[derive(Debug, Clone, Copy, Default)]
struct CellAggregates {
    mean_baseline: f64,
    mean_calibration: f64,
    mean_response_abs: f64,
    max_response: f64,
    max_response_diff_own: f64,
    max_response_diff_pop: f64,
    rise_time_frames: f64,
    rapid_response_ratio: f64,
    secondary_intensity: f64,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        f64::NAN
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn max(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(f64::NAN, f64::max)
}

impl CellAggregates {
    fn measurement(&self, kind: CriterionKind) -> f64 {
        match kind {
            CriterionKind::Baseline => self.mean_baseline,
            CriterionKind::ResponseAbsolute => self.mean_response_abs,
            CriterionKind::ResponseRelative => self.mean_response_abs - self.mean_baseline,
            CriterionKind::ResponseFractionOfMax => {
                (self.mean_response_abs - self.mean_baseline) / self.max_response_diff_own
            }
            CriterionKind::MaxResponse => self.max_response,
            CriterionKind::MaxResponseToAvgBaseline => self.max_response_diff_pop,
            CriterionKind::RiseTimeFrames => self.rise_time_frames,
            CriterionKind::RapidResponseRatio => self.rapid_response_ratio,
            CriterionKind::SecondaryIntensity => self.secondary_intensity,
        }
    }
}

/// Evaluates configured criteria per cell and emits stage-annotated hits.
#[derive(Debug, Clone, Copy)]
pub struct HitClassifier<'a> {
    config: &'a ScreenConfig,
}

impl<'a> HitClassifier<'a> {
    /// Creates a classifier bound to an immutable run configuration.
    pub fn new(config: &'a ScreenConfig) -> Self {
        Self { config }
    }

    /// Classifies one tile's cells against the configured criteria.
    ///
    /// The validity gate runs before any criterion: gated cells never
    /// appear in the hit table, however permissive the criteria. In
    /// random-hit mode the gate and criteria are bypassed entirely.
    pub fn classify(&self, input: &ClassifierInput<'_>, log: &mut RunLog) -> Result<HitTable> {
        let nr_cells = input.kymograph.nr_cells();
        let mut table = HitTable::new();

        if nr_cells == 0 {
            log.push(Warning::NoCellsFound {
                tile: input.tile_id,
            });
            return Ok(table);
        }
        if input.centroids.len() != nr_cells {
            return Err(Error::ShapeMismatch {
                context: "cell centroids",
                expected: format!("{nr_cells} entries"),
                actual: format!("{} entries", input.centroids.len()),
            });
        }
        let needs_secondary = self
            .config
            .criteria
            .iter()
            .any(|c| c.kind == CriterionKind::SecondaryIntensity);
        if needs_secondary && input.secondary.is_none() {
            return Err(Error::ConfigError(
                "secondary-intensity criterion enabled without a secondary channel".into(),
            ));
        }

        if let Some(nr_random) = self.config.random_hits {
            return self.random_hits(input, nr_random, &mut table).map(|()| table);
        }

        let aggregates = self.aggregate(input);
        let pop_baseline = self.population_mean_baseline(input);
        let mut excluded = 0usize;

        for (i, agg) in aggregates.iter().enumerate() {
            if !self.passes_validity_gate(agg, input, pop_baseline) {
                excluded += 1;
                continue;
            }

            let mut satisfied = 0usize;
            let mut measurements = Vec::with_capacity(self.config.criteria.len());
            for criterion in &self.config.criteria {
                let value = agg.measurement(criterion.kind);
                if criterion.comparison.matches(value) {
                    satisfied += 1;
                }
                measurements.push(Measurement {
                    kind: criterion.kind,
                    value: if value.is_finite() { value } else { 0.0 },
                });
            }

            let is_hit = match self.config.hit_logic {
                HitLogic::Or => satisfied >= 1,
                HitLogic::And => satisfied == self.config.criteria.len(),
            };
            if is_hit {
                table.push(self.record(input, i, measurements)?);
            }
        }

        if excluded > 0 {
            log.push(Warning::CellsExcluded {
                tile: input.tile_id,
                excluded,
            });
        }
        Ok(table)
    }

    /// Uniform sample of cells without replacement, bypassing all criteria.
    fn random_hits(
        &self,
        input: &ClassifierInput<'_>,
        nr_random: usize,
        table: &mut HitTable,
    ) -> Result<()> {
        let nr_cells = input.kymograph.nr_cells();
        let amount = nr_random.min(nr_cells);
        let mut rng = match self.config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut picked: Vec<usize> = sample(&mut rng, nr_cells, amount).into_iter().collect();
        picked.sort_unstable();

        let aggregates = self.aggregate(input);
        for i in picked {
            let measurements = self
                .config
                .criteria
                .iter()
                .map(|c| {
                    let value = aggregates[i].measurement(c.kind);
                    Measurement {
                        kind: c.kind,
                        value: if value.is_finite() { value } else { 0.0 },
                    }
                })
                .collect();
            table.push(self.record(input, i, measurements)?);
        }
        Ok(())
    }

    fn record(
        &self,
        input: &ClassifierInput<'_>,
        cell_index: usize,
        measurements: Vec<Measurement>,
    ) -> Result<HitRecord> {
        let centroid = input.centroids[cell_index];
        let stage = input
            .layout
            .map_to_stage(input.tile_id, centroid.x, centroid.y)?;
        Ok(HitRecord {
            cell_id: cell_index as u32 + 1,
            tile_id: input.tile_id,
            pixel_x: centroid.x,
            pixel_y: centroid.y,
            stage,
            measurements,
        })
    }

    fn passes_validity_gate(
        &self,
        agg: &CellAggregates,
        input: &ClassifierInput<'_>,
        population_mean_baseline: f64,
    ) -> bool {
        let nr_frames = input.kymograph.nr_frames();
        // Calibration band: only meaningful when a calibration phase exists.
        if let Some((lo, hi)) = self.config.validity.calibration_band {
            if !input.phases.calibration_range(nr_frames).is_empty() {
                let diff = agg.mean_calibration - agg.mean_baseline;
                if !diff.is_finite() || diff < lo || diff > hi {
                    return false;
                }
            }
        }
        if let Some(cap) = self.config.validity.baseline_deviation_cap {
            let dev = agg.mean_baseline - population_mean_baseline;
            if !dev.is_finite() || dev > cap {
                return false;
            }
        }
        // Any non-numeric aggregate a criterion depends on gates the cell out.
        self.config
            .criteria
            .iter()
            .all(|c| agg.measurement(c.kind).is_finite())
    }

    fn population_mean_baseline(&self, input: &ClassifierInput<'_>) -> f64 {
        let nr_frames = input.kymograph.nr_frames();
        let baseline = input.phases.baseline_range(nr_frames);
        let means: Vec<f64> = (0..input.kymograph.nr_cells())
            .map(|i| mean(&input.kymograph.row(i)[baseline.clone()]))
            .collect();
        mean(&means)
    }

    fn aggregate(&self, input: &ClassifierInput<'_>) -> Vec<CellAggregates> {
        let kymo = input.kymograph;
        let nr_frames = kymo.nr_frames();
        let baseline = input.phases.baseline_range(nr_frames);
        let calibration = input.phases.calibration_range(nr_frames);
        let region = input.phases.response_range(nr_frames);
        let window = self.config.response_window.resolve(input.phases, nr_frames);
        let pop_baseline = self.population_mean_baseline(input);

        (0..kymo.nr_cells())
            .map(|i| {
                let row = kymo.row(i);
                let mean_baseline = mean(&row[baseline.clone()]);
                let region_vals = &row[region.clone()];
                let diff_own: Vec<f64> =
                    region_vals.iter().map(|v| v - mean_baseline).collect();
                let max_diff_own = max(diff_own.iter().copied());

                CellAggregates {
                    mean_baseline,
                    mean_calibration: mean(&row[calibration.clone()]),
                    mean_response_abs: mean(&row[window.clone()]),
                    max_response: max(region_vals.iter().copied()),
                    max_response_diff_own: max_diff_own,
                    max_response_diff_pop: max(region_vals.iter().map(|v| v - pop_baseline)),
                    rise_time_frames: rise_time(
                        &diff_own,
                        self.config.rise_time_fraction,
                        max_diff_own,
                    ),
                    rapid_response_ratio: rapid_response_ratio(&diff_own),
                    secondary_intensity: input
                        .secondary
                        .map_or(f64::NAN, |s| s.get(i).copied().unwrap_or(f64::NAN)),
                }
            })
            .collect()
    }
}

/// First response-window index where the baseline-subtracted response
/// crosses `fraction` of its maximum, in frames.
fn rise_time(diff_own: &[f64], fraction: f64, max_diff: f64) -> f64 {
    if diff_own.is_empty() || !max_diff.is_finite() {
        return f64::NAN;
    }
    let threshold = fraction * max_diff;
    diff_own
        .iter()
        .position(|&v| v >= threshold)
        .map_or(f64::NAN, |idx| idx as f64)
}

/// Mean of the second half of the baseline-subtracted response divided by
/// the mean of the first half. The first half takes the middle element for
/// odd lengths.
fn rapid_response_ratio(diff_own: &[f64]) -> f64 {
    if diff_own.len() < 2 {
        return f64::NAN;
    }
    let split = diff_own.len().div_ceil(2);
    let first = mean(&diff_own[..split]);
    let second = mean(&diff_own[split..]);
    second / first
}
