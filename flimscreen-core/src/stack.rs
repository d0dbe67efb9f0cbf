//! Per-pixel image stacks (frames x height x width).

use crate::error::{Error, Result};
use crate::labelmap::LabelMap;

/// A time-lapse stack of 2-D floating-point frames, row-major per frame.
///
/// Used for both the intensity stack and the lifetime/ratio stack; the two
/// must agree in all three dimensions and match the labelmap spatially.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStack {
    nr_frames: usize,
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl FrameStack {
    /// Creates a stack from flat data laid out as `[frame][row][col]`.
    pub fn new(nr_frames: usize, width: usize, height: usize, data: Vec<f64>) -> Result<Self> {
        let expected = nr_frames * width * height;
        if data.len() != expected {
            return Err(Error::ShapeMismatch {
                context: "frame stack",
                expected: format!("{expected} values ({nr_frames}x{height}x{width})"),
                actual: format!("{} values", data.len()),
            });
        }
        Ok(Self {
            nr_frames,
            width,
            height,
            data,
        })
    }

    /// Stacks a list of equally-shaped frames.
    pub fn from_frames(width: usize, height: usize, frames: Vec<Vec<f64>>) -> Result<Self> {
        let nr_frames = frames.len();
        let mut data = Vec::with_capacity(nr_frames * width * height);
        for (t, frame) in frames.into_iter().enumerate() {
            if frame.len() != width * height {
                return Err(Error::ShapeMismatch {
                    context: "frame stack",
                    expected: format!("{} values per frame", width * height),
                    actual: format!("{} values in frame {t}", frame.len()),
                });
            }
            data.extend_from_slice(&frame);
        }
        Self::new(nr_frames, width, height, data)
    }

    /// Number of timepoints.
    #[inline]
    pub fn nr_frames(&self) -> usize {
        self.nr_frames
    }

    /// Frame width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Frame height in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major pixel data of frame `t`.
    #[inline]
    pub fn frame(&self, t: usize) -> &[f64] {
        let n = self.width * self.height;
        &self.data[t * n..(t + 1) * n]
    }

    /// Checks that this stack matches `other` in space and time.
    pub fn check_same_shape(&self, other: &FrameStack, context: &'static str) -> Result<()> {
        if self.nr_frames != other.nr_frames
            || self.width != other.width
            || self.height != other.height
        {
            return Err(Error::ShapeMismatch {
                context,
                expected: format!("{}x{}x{}", self.nr_frames, self.height, self.width),
                actual: format!("{}x{}x{}", other.nr_frames, other.height, other.width),
            });
        }
        Ok(())
    }

    /// Checks that this stack is spatially registered to `labelmap`.
    pub fn check_registered(&self, labelmap: &LabelMap, context: &'static str) -> Result<()> {
        if self.width != labelmap.width() || self.height != labelmap.height() {
            return Err(Error::ShapeMismatch {
                context,
                expected: format!("{}x{}", labelmap.height(), labelmap.width()),
                actual: format!("{}x{}", self.height, self.width),
            });
        }
        Ok(())
    }
}
