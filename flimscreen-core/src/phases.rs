//! Temporal phases of a stimulation experiment and response-window policy.

use std::ops::Range;

/// Stimulation/calibration frame boundaries partitioning each trace.
///
/// Baseline covers `[0, stimulation)`, response `(stimulation, calibration)`,
/// calibration `[calibration, end)`. Either event may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhases {
    /// No stimulation at all: the whole trace is baseline.
    BaselineOnly,
    /// Stimulation at a known frame, calibration optionally following it.
    Detected {
        /// Last baseline frame boundary (0-based, exclusive).
        stimulation: usize,
        /// First calibration frame (0-based), if a calibrant was detected.
        calibration: Option<usize>,
    },
}

impl FramePhases {
    /// Baseline frames: `[0, stimulation)`, or the full trace.
    pub fn baseline_range(&self, nr_frames: usize) -> Range<usize> {
        match *self {
            FramePhases::BaselineOnly => 0..nr_frames,
            FramePhases::Detected { stimulation, .. } => 0..stimulation.min(nr_frames),
        }
    }

    /// Response frames: `(stimulation, calibration)`, empty in baseline-only mode.
    pub fn response_range(&self, nr_frames: usize) -> Range<usize> {
        match *self {
            FramePhases::BaselineOnly => 0..0,
            FramePhases::Detected {
                stimulation,
                calibration,
            } => {
                let start = (stimulation + 1).min(nr_frames);
                let end = calibration.unwrap_or(nr_frames).min(nr_frames);
                start..end.max(start)
            }
        }
    }

    /// Calibration frames: `[calibration, end)`, empty when undetected.
    pub fn calibration_range(&self, nr_frames: usize) -> Range<usize> {
        match *self {
            FramePhases::Detected {
                calibration: Some(calibration),
                ..
            } => calibration.min(nr_frames)..nr_frames,
            _ => 0..0,
        }
    }

    /// Window used for response ranking: `[stimulation, calibration)`,
    /// `[stimulation, end)` without calibration, the full row in
    /// baseline-only mode.
    pub fn ranking_window(&self, nr_frames: usize) -> Range<usize> {
        match *self {
            FramePhases::BaselineOnly => 0..nr_frames,
            FramePhases::Detected {
                stimulation,
                calibration,
            } => {
                let start = stimulation.min(nr_frames);
                let end = calibration.unwrap_or(nr_frames).min(nr_frames);
                start..end.max(start)
            }
        }
    }
}

/// Which event the response window is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAnchor {
    /// Window starts `margin` frames after stimulation.
    AfterStimulation,
    /// Window ends `margin` frames before calibration.
    BeforeCalibration,
}

/// User policy for the response measurement window.
///
/// `length` of `None` means the full available range (the `-1` sentinel in
/// the configuration surface). The margin is kept clear of the anchor event;
/// when both the margin and the requested length cannot fit, the window
/// shrinks, not the margin. The margin is only eaten into when the response
/// region itself is shorter than `margin + 1`, so the resolved window always
/// has length >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseWindow {
    pub anchor: WindowAnchor,
    pub length: Option<usize>,
    pub margin: usize,
}

impl Default for ResponseWindow {
    fn default() -> Self {
        Self {
            anchor: WindowAnchor::AfterStimulation,
            length: None,
            margin: 0,
        }
    }
}

impl ResponseWindow {
    /// Resolves the measurement window in frame coordinates.
    ///
    /// Single-timepoint images always use `0..1`. The resolved window lies
    /// inside `[stimulation, calibration)`, and inside the response region
    /// whenever that region is non-empty.
    pub fn resolve(&self, phases: &FramePhases, nr_frames: usize) -> Range<usize> {
        if nr_frames <= 1 {
            return 0..1;
        }
        let region = phases.response_range(nr_frames);
        if region.is_empty() {
            // Calibration directly after stimulation leaves no frame strictly
            // between the events; fall back to the last frame of
            // `[stimulation, calibration)` so the window keeps length 1.
            let ranking = phases.ranking_window(nr_frames);
            if matches!(phases, FramePhases::BaselineOnly) || ranking.is_empty() {
                return region;
            }
            return ranking.end - 1..ranking.end;
        }
        match self.anchor {
            WindowAnchor::AfterStimulation => {
                let mut start = region.start + self.margin;
                if start >= region.end {
                    start = region.end - 1;
                }
                let end = match self.length {
                    None => region.end,
                    Some(len) => (start + len.max(1)).min(region.end),
                };
                start..end
            }
            WindowAnchor::BeforeCalibration => {
                let mut end = region.end.saturating_sub(self.margin);
                if end <= region.start {
                    end = region.start + 1;
                }
                let start = match self.length {
                    None => region.start,
                    Some(len) => end.saturating_sub(len.max(1)).max(region.start),
                };
                start..end
            }
        }
    }
}
