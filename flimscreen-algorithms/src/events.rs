//! Stimulation/calibration frame detection on the population-average trace.

use flimscreen_core::config::ManualFrames;
use flimscreen_core::phases::FramePhases;
use flimscreen_core::runlog::{RunLog, Warning};

/// Backward difference; the first element is 0 by convention.
pub fn backward_difference(trace: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; trace.len()];
    for t in 1..trace.len() {
        out[t] = trace[t] - trace[t - 1];
    }
    out
}

/// Population standard deviation.
pub fn population_stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

/// A local maximum with its prominence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Frame index of the maximum.
    pub index: usize,
    /// Trace value at the maximum.
    pub height: f64,
    /// Height above the higher of the two flanking minima.
    pub prominence: f64,
}

/// Local maxima with prominence >= `min_prominence`, in temporal order.
///
/// A sample is a local maximum when it strictly exceeds its left neighbor
/// and is not exceeded by its right neighbor (plateaus report their first
/// sample). Prominence is the peak height minus the higher of the two side
/// minima, each tracked while walking outward until a strictly higher
/// sample or the trace edge.
pub fn prominent_maxima(values: &[f64], min_prominence: f64) -> Vec<Peak> {
    let n = values.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    for i in 1..n - 1 {
        let height = values[i];
        if !(height > values[i - 1] && height >= values[i + 1]) {
            continue;
        }
        let mut left_min = height;
        for j in (0..i).rev() {
            if values[j] > height {
                break;
            }
            left_min = left_min.min(values[j]);
        }
        let mut right_min = height;
        for &v in &values[i + 1..] {
            if v > height {
                break;
            }
            right_min = right_min.min(v);
        }
        let prominence = height - left_min.max(right_min);
        if prominence >= min_prominence {
            peaks.push(Peak {
                index: i,
                height,
                prominence,
            });
        }
    }
    peaks
}

/// Locates stimulation and calibration frames from the second derivative of
/// the population-average trace.
#[derive(Debug, Clone, Copy)]
pub struct EventDetector {
    /// Scales the stddev prominence threshold (default 1.0).
    pub sensitivity: f64,
}

impl Default for EventDetector {
    fn default() -> Self {
        Self { sensitivity: 1.0 }
    }
}

impl EventDetector {
    /// Creates a detector with the given sensitivity.
    pub fn new(sensitivity: f64) -> Self {
        Self { sensitivity }
    }

    /// Detects frame phases on the population-average trace.
    ///
    /// Peaks in the second difference mark abrupt trace changes; the two
    /// largest are taken as stimulation and calibration, ordered by frame,
    /// each offset by -1 from the detected peak. With one peak only the
    /// stimulation is set; with none, stimulation falls back to frame 0.
    /// Both fallbacks log a warning.
    pub fn detect(&self, population_trace: &[f64], log: &mut RunLog) -> FramePhases {
        let d2 = backward_difference(&backward_difference(population_trace));
        let threshold = self.sensitivity * population_stddev(&d2);
        let peaks = prominent_maxima(&d2, threshold);

        match peaks.len() {
            0 => {
                log.push(Warning::NoStimulationPeak);
                FramePhases::Detected {
                    stimulation: 0,
                    calibration: None,
                }
            }
            1 => {
                log.push(Warning::NoCalibrationPeak);
                FramePhases::Detected {
                    stimulation: peaks[0].index.saturating_sub(1),
                    calibration: None,
                }
            }
            _ => {
                // The two largest responses, back in temporal order.
                let mut by_height = peaks;
                by_height
                    .sort_by(|a, b| b.height.total_cmp(&a.height).then(a.index.cmp(&b.index)));
                let mut top: Vec<usize> = by_height[..2].iter().map(|p| p.index).collect();
                top.sort_unstable();
                FramePhases::Detected {
                    stimulation: top[0].saturating_sub(1),
                    calibration: Some(top[1].saturating_sub(1).max(1)),
                }
            }
        }
    }
}

/// Applies the manual-frame override, falling back to automatic detection.
///
/// Explicit frames beyond the trace are clamped with a warning; the
/// cardinality itself was already validated when the configuration was
/// built.
pub fn resolve_phases(
    manual: ManualFrames,
    detector: &EventDetector,
    population_trace: &[f64],
    log: &mut RunLog,
) -> FramePhases {
    match manual {
        ManualFrames::Auto => detector.detect(population_trace, log),
        ManualFrames::BaselineOnly => FramePhases::BaselineOnly,
        ManualFrames::Explicit {
            stimulation,
            calibration,
        } => {
            let nr_frames = population_trace.len().max(1);
            let cal = calibration.min(nr_frames - 1).max(1);
            let stim = stimulation.min(cal - 1);
            if (stim, cal) != (stimulation, calibration) {
                log.push(Warning::ManualFramesClamped {
                    requested: (stimulation, calibration),
                    clamped: (stim, cal),
                });
            }
            FramePhases::Detected {
                stimulation: stim,
                calibration: Some(cal),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Step trace whose second difference peaks at frames 4 and 8 with
    /// stddev exactly 1.0.
    fn step_trace() -> Vec<f64> {
        vec![2.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0, 3.0, 5.0, 5.0]
    }

    #[test]
    fn test_backward_difference() {
        let d = backward_difference(&[1.0, 3.0, 2.0]);
        assert_eq!(d, vec![0.0, 2.0, -1.0]);
        assert!(backward_difference(&[]).is_empty());
    }

    #[test]
    fn test_population_stddev() {
        let d2 = backward_difference(&backward_difference(&step_trace()));
        assert_relative_eq!(population_stddev(&d2), 1.0);
    }

    #[test]
    fn test_prominent_maxima_filters_small_bumps() {
        let values = vec![0.0, 0.2, 0.0, 0.0, 2.0, 0.0];
        let peaks = prominent_maxima(&values, 1.0);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].index, 4);
        assert_relative_eq!(peaks[0].prominence, 2.0);
    }

    #[test]
    fn test_prominence_uses_higher_side_minimum() {
        // Peak at 3 flanked by minima 1.0 (left) and -1.0 (right).
        let values = vec![2.0, 1.0, 1.5, 3.0, -1.0, 4.0, 0.0];
        let peaks = prominent_maxima(&values, 0.0);
        let peak = peaks.iter().find(|p| p.index == 3).unwrap();
        assert_relative_eq!(peak.prominence, 2.0);
    }

    #[test]
    fn test_detect_two_events() {
        let mut log = RunLog::new();
        let phases = EventDetector::default().detect(&step_trace(), &mut log);
        assert_eq!(
            phases,
            FramePhases::Detected {
                stimulation: 3,
                calibration: Some(7),
            }
        );
        assert!(log.is_empty());
    }

    #[test]
    fn test_detect_flat_trace_falls_back() {
        let mut log = RunLog::new();
        let phases = EventDetector::default().detect(&[1.0; 10], &mut log);
        assert_eq!(
            phases,
            FramePhases::Detected {
                stimulation: 0,
                calibration: None,
            }
        );
        assert_eq!(log.warnings(), &[Warning::NoStimulationPeak]);
    }

    #[test]
    fn test_detect_single_event() {
        let trace = vec![2.0, 2.0, 2.0, 2.0, 4.0, 4.0, 4.0, 4.0, 4.0];
        let mut log = RunLog::new();
        let phases = EventDetector::default().detect(&trace, &mut log);
        assert_eq!(
            phases,
            FramePhases::Detected {
                stimulation: 3,
                calibration: None,
            }
        );
        assert_eq!(log.warnings(), &[Warning::NoCalibrationPeak]);
    }

    #[test]
    fn test_two_largest_kept_in_temporal_order() {
        // Three steps; the middle one is the smallest and must be dropped.
        let trace = vec![0.0, 0.0, 3.0, 3.0, 3.4, 3.4, 3.4, 8.0, 8.0, 8.0];
        let mut log = RunLog::new();
        let phases = EventDetector::default().detect(&trace, &mut log);
        assert_eq!(
            phases,
            FramePhases::Detected {
                stimulation: 1,
                calibration: Some(6),
            }
        );
    }

    #[test]
    fn test_manual_override() {
        let mut log = RunLog::new();
        let detector = EventDetector::default();
        let trace = vec![0.0; 10];

        let phases = resolve_phases(
            ManualFrames::Explicit {
                stimulation: 2,
                calibration: 6,
            },
            &detector,
            &trace,
            &mut log,
        );
        assert_eq!(
            phases,
            FramePhases::Detected {
                stimulation: 2,
                calibration: Some(6),
            }
        );
        assert!(log.is_empty());

        assert_eq!(
            resolve_phases(ManualFrames::BaselineOnly, &detector, &trace, &mut log),
            FramePhases::BaselineOnly
        );
    }

    #[test]
    fn test_manual_frames_clamped_with_warning() {
        let mut log = RunLog::new();
        let phases = resolve_phases(
            ManualFrames::Explicit {
                stimulation: 8,
                calibration: 20,
            },
            &EventDetector::default(),
            &[0.0; 10],
            &mut log,
        );
        assert_eq!(
            phases,
            FramePhases::Detected {
                stimulation: 8,
                calibration: Some(9),
            }
        );
        assert_eq!(log.len(), 1);
    }
}
