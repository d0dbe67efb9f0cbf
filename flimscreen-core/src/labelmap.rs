//! Segmented-cell labelmaps and per-label pixel statistics.

use crate::error::{Error, Result};

/// Integer grid assigning each pixel to a cell id (1..=N) or background (0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    width: usize,
    height: usize,
    data: Vec<u32>,
}

/// Pixel-space centroid of one labelled cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelCentroid {
    /// Mean x coordinate (columns) over the cell's pixels.
    pub x: f64,
    /// Mean y coordinate (rows) over the cell's pixels.
    pub y: f64,
    /// Number of pixels carrying the label.
    pub pixels: usize,
}

impl LabelMap {
    /// Creates a labelmap from row-major pixel data.
    pub fn new(width: usize, height: usize, data: Vec<u32>) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::ShapeMismatch {
                context: "labelmap",
                expected: format!("{} pixels ({width}x{height})", width * height),
                actual: format!("{} pixels", data.len()),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Grid width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw row-major label values.
    #[inline]
    pub fn data(&self) -> &[u32] {
        &self.data
    }

    /// Label at pixel (x, y).
    #[inline]
    pub fn label_at(&self, x: usize, y: usize) -> u32 {
        self.data[y * self.width + x]
    }

    /// Number of cells: the maximum label value.
    ///
    /// Only meaningful after [`LabelMap::validate_dense`] has passed.
    pub fn nr_cells(&self) -> usize {
        self.data.iter().copied().max().unwrap_or(0) as usize
    }

    /// Verifies that labels are dense in `[1, N]` with no gaps.
    ///
    /// Trace extraction indexes kymograph rows by `label - 1`, so a gap
    /// would leave a silent all-zero row.
    pub fn validate_dense(&self) -> Result<()> {
        let nr_cells = self.nr_cells();
        if nr_cells == 0 {
            return Ok(());
        }
        let mut seen = vec![false; nr_cells];
        for &label in &self.data {
            if label > 0 {
                seen[label as usize - 1] = true;
            }
        }
        if let Some(missing) = seen.iter().position(|&s| !s) {
            return Err(Error::LabelGap {
                missing: missing as u32 + 1,
                nr_cells: nr_cells as u32,
            });
        }
        Ok(())
    }

    /// Per-cell pixel centroids, in label order (index `i` = label `i + 1`).
    pub fn centroids(&self) -> Vec<PixelCentroid> {
        let nr_cells = self.nr_cells();
        let mut sum_x = vec![0.0f64; nr_cells];
        let mut sum_y = vec![0.0f64; nr_cells];
        let mut count = vec![0usize; nr_cells];

        for y in 0..self.height {
            for x in 0..self.width {
                let label = self.data[y * self.width + x];
                if label > 0 {
                    let i = label as usize - 1;
                    sum_x[i] += x as f64;
                    sum_y[i] += y as f64;
                    count[i] += 1;
                }
            }
        }

        (0..nr_cells)
            .map(|i| {
                let n = count[i].max(1) as f64;
                PixelCentroid {
                    x: sum_x[i] / n,
                    y: sum_y[i] / n,
                    pixels: count[i],
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_validation() {
        assert!(LabelMap::new(2, 2, vec![0, 1, 1]).is_err());
        assert!(LabelMap::new(2, 2, vec![0, 1, 1, 2]).is_ok());
    }

    #[test]
    fn test_dense_labels() {
        let map = LabelMap::new(2, 2, vec![0, 1, 2, 2]).unwrap();
        assert_eq!(map.nr_cells(), 2);
        assert!(map.validate_dense().is_ok());

        let gappy = LabelMap::new(2, 2, vec![0, 1, 3, 3]).unwrap();
        let err = gappy.validate_dense().unwrap_err();
        assert!(matches!(err, Error::LabelGap { missing: 2, .. }));
    }

    #[test]
    fn test_centroids() {
        // Cell 1 occupies the left column, cell 2 a single pixel.
        let map = LabelMap::new(2, 2, vec![1, 0, 1, 2]).unwrap();
        let centroids = map.centroids();
        assert_eq!(centroids.len(), 2);
        assert_eq!(centroids[0].pixels, 2);
        assert!((centroids[0].x - 0.0).abs() < 1e-12);
        assert!((centroids[0].y - 0.5).abs() < 1e-12);
        assert_eq!(centroids[1].pixels, 1);
        assert!((centroids[1].x - 1.0).abs() < 1e-12);
        assert!((centroids[1].y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_labelmap() {
        let map = LabelMap::new(2, 2, vec![0; 4]).unwrap();
        assert_eq!(map.nr_cells(), 0);
        assert!(map.validate_dense().is_ok());
        assert!(map.centroids().is_empty());
    }
}
