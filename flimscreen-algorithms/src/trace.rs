//! Intensity-weighted trace extraction: stacks + labelmap -> kymograph.

use flimscreen_core::config::EmptyWeightPolicy;
use flimscreen_core::error::Result;
use flimscreen_core::kymograph::Kymograph;
use flimscreen_core::labelmap::LabelMap;
use flimscreen_core::stack::FrameStack;
use rayon::prelude::*;

/// Computes per-cell, per-timepoint intensity-weighted lifetime averages.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceExtractor {
    policy: EmptyWeightPolicy,
}

impl TraceExtractor {
    /// Creates an extractor with the given empty-weight policy.
    pub fn new(policy: EmptyWeightPolicy) -> Self {
        Self { policy }
    }

    /// Extracts the kymograph.
    ///
    /// `kymograph[cell, t] = sum(lifetime * intensity) / sum(intensity)`
    /// over the cell's pixels, with the intensity weight zeroed wherever the
    /// lifetime value is non-finite so undefined pixels do not bias the
    /// average. Frames are processed in parallel; row/column ordering is
    /// label order regardless of the thread schedule. Inputs are not
    /// mutated.
    pub fn extract(
        &self,
        intensity: &FrameStack,
        lifetime: &FrameStack,
        labelmap: &LabelMap,
    ) -> Result<Kymograph> {
        intensity.check_same_shape(lifetime, "intensity vs lifetime stack")?;
        intensity.check_registered(labelmap, "stack vs labelmap")?;
        labelmap.validate_dense()?;

        let nr_cells = labelmap.nr_cells();
        let nr_frames = intensity.nr_frames();
        if nr_cells == 0 {
            return Ok(Kymograph::zeros(0, nr_frames));
        }

        let labels = labelmap.data();
        let policy = self.policy;

        let columns: Vec<Vec<f64>> = (0..nr_frames)
            .into_par_iter()
            .map(|t| {
                let weights = intensity.frame(t);
                let values = lifetime.frame(t);
                let mut weighted_sum = vec![0.0f64; nr_cells];
                let mut weight_sum = vec![0.0f64; nr_cells];

                for (pixel, &label) in labels.iter().enumerate() {
                    if label == 0 {
                        continue;
                    }
                    let value = values[pixel];
                    // Masked weight: undefined lifetime contributes nothing,
                    // to the weight and the weighted sum alike.
                    if !value.is_finite() {
                        continue;
                    }
                    let i = label as usize - 1;
                    weighted_sum[i] += value * weights[pixel];
                    weight_sum[i] += weights[pixel];
                }

                (0..nr_cells)
                    .map(|i| {
                        if weight_sum[i] > 0.0 {
                            weighted_sum[i] / weight_sum[i]
                        } else {
                            match policy {
                                EmptyWeightPolicy::ZeroFill => 0.0,
                                EmptyWeightPolicy::PropagateUndefined => f64::NAN,
                            }
                        }
                    })
                    .collect()
            })
            .collect();

        let mut kymograph = Kymograph::zeros(nr_cells, nr_frames);
        for (t, column) in columns.iter().enumerate() {
            for (i, &value) in column.iter().enumerate() {
                kymograph.row_mut(i)[t] = value;
            }
        }
        Ok(kymograph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_cell_inputs() -> (FrameStack, FrameStack, LabelMap) {
        // 2x2 pixels, 2 frames. Cell 1 = left column, cell 2 = bottom right.
        let labelmap = LabelMap::new(2, 2, vec![1, 0, 1, 2]).unwrap();
        let intensity = FrameStack::new(
            2,
            2,
            2,
            vec![
                2.0, 9.0, 6.0, 4.0, // frame 0
                1.0, 9.0, 3.0, 0.0, // frame 1
            ],
        )
        .unwrap();
        let lifetime = FrameStack::new(
            2,
            2,
            2,
            vec![
                3.0, 9.9, 2.0, 2.5, // frame 0
                4.0, 9.9, 2.0, 1.0, // frame 1
            ],
        )
        .unwrap();
        (intensity, lifetime, labelmap)
    }

    #[test]
    fn test_intensity_weighted_average() {
        let (intensity, lifetime, labelmap) = two_cell_inputs();
        let extractor = TraceExtractor::default();
        let kymo = extractor.extract(&intensity, &lifetime, &labelmap).unwrap();

        assert_eq!(kymo.nr_cells(), 2);
        assert_eq!(kymo.nr_frames(), 2);
        // Cell 1, frame 0: (3*2 + 2*6) / (2+6) = 18/8
        assert_relative_eq!(kymo.row(0)[0], 18.0 / 8.0);
        // Cell 1, frame 1: (4*1 + 2*3) / 4 = 10/4
        assert_relative_eq!(kymo.row(0)[1], 2.5);
        // Cell 2, frame 0: single pixel, plain value.
        assert_relative_eq!(kymo.row(1)[0], 2.5);
    }

    #[test]
    fn test_zero_weight_policy() {
        let (intensity, lifetime, labelmap) = two_cell_inputs();
        // Cell 2 has zero intensity in frame 1.
        let zero = TraceExtractor::new(EmptyWeightPolicy::ZeroFill);
        let kymo = zero.extract(&intensity, &lifetime, &labelmap).unwrap();
        assert_eq!(kymo.row(1)[1], 0.0);

        let nan = TraceExtractor::new(EmptyWeightPolicy::PropagateUndefined);
        let kymo = nan.extract(&intensity, &lifetime, &labelmap).unwrap();
        assert!(kymo.row(1)[1].is_nan());
    }

    #[test]
    fn test_undefined_lifetime_pixels_are_masked() {
        let labelmap = LabelMap::new(2, 1, vec![1, 1]).unwrap();
        let intensity = FrameStack::new(1, 2, 1, vec![5.0, 5.0]).unwrap();
        let lifetime = FrameStack::new(1, 2, 1, vec![2.0, f64::NAN]).unwrap();
        let kymo = TraceExtractor::default()
            .extract(&intensity, &lifetime, &labelmap)
            .unwrap();
        // The NaN pixel contributes to neither sum, so the average is the
        // defined pixel and never NaN.
        assert_relative_eq!(kymo.row(0)[0], 2.0);
        assert!(kymo.row(0)[0].is_finite());
    }

    #[test]
    fn test_all_undefined_cell_follows_empty_weight_policy() {
        // Cell 1 has one defined pixel, cell 2 none at all.
        let labelmap = LabelMap::new(3, 1, vec![1, 1, 2]).unwrap();
        let intensity = FrameStack::new(1, 3, 1, vec![4.0, 4.0, 4.0]).unwrap();
        let lifetime = FrameStack::new(1, 3, 1, vec![3.0, f64::INFINITY, f64::NAN]).unwrap();

        let zero = TraceExtractor::new(EmptyWeightPolicy::ZeroFill);
        let kymo = zero.extract(&intensity, &lifetime, &labelmap).unwrap();
        assert_relative_eq!(kymo.row(0)[0], 3.0);
        assert_eq!(kymo.row(1)[0], 0.0);

        let nan = TraceExtractor::new(EmptyWeightPolicy::PropagateUndefined);
        let kymo = nan.extract(&intensity, &lifetime, &labelmap).unwrap();
        assert!(kymo.row(1)[0].is_nan());
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let (intensity, _, labelmap) = two_cell_inputs();
        let short = FrameStack::new(1, 2, 2, vec![1.0; 4]).unwrap();
        assert!(TraceExtractor::default()
            .extract(&intensity, &short, &labelmap)
            .is_err());
    }

    #[test]
    fn test_no_cells() {
        let labelmap = LabelMap::new(2, 1, vec![0, 0]).unwrap();
        let intensity = FrameStack::new(1, 2, 1, vec![1.0, 1.0]).unwrap();
        let lifetime = FrameStack::new(1, 2, 1, vec![1.0, 1.0]).unwrap();
        let kymo = TraceExtractor::default()
            .extract(&intensity, &lifetime, &labelmap)
            .unwrap();
        assert_eq!(kymo.nr_cells(), 0);
        assert_eq!(kymo.nr_frames(), 1);
    }
}
