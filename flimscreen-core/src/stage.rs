//! Stage/tile geometry: tile layout, scan direction, coordinate mapping.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Absolute stage position in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StageCoord {
    pub x: f64,
    pub y: f64,
}

/// Within-row tile traversal direction of the stitching pattern.
///
/// Derived once from the overlap sign: negative overlap means tiles were
/// scanned in reverse order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScanDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

impl ScanDirection {
    /// Direction implied by the overlap fraction's sign.
    pub fn from_overlap(overlap_fraction: f64) -> Self {
        if overlap_fraction < 0.0 {
            ScanDirection::RightToLeft
        } else {
            ScanDirection::LeftToRight
        }
    }
}

/// Mosaic layout: tile grid, physical tile size, and per-tile stage offsets.
///
/// Tile indices used by hit records are row-major over the grid; stage
/// offsets are stored in acquisition order, which follows the serpentine
/// stitching pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayout {
    nr_tiles_x: usize,
    nr_tiles_y: usize,
    pixel_size: (f64, f64),
    tile_size: (f64, f64),
    stage_offsets: Vec<StageCoord>,
    scan_direction: ScanDirection,
}

impl TileLayout {
    /// Creates a layout, validating the stage-offset count against the grid.
    pub fn new(
        nr_tiles_x: usize,
        nr_tiles_y: usize,
        pixel_size: (f64, f64),
        tile_size: (f64, f64),
        stage_offsets: Vec<StageCoord>,
        scan_direction: ScanDirection,
    ) -> Result<Self> {
        let nr_tiles = nr_tiles_x * nr_tiles_y;
        if nr_tiles == 0 {
            return Err(Error::ConfigError("tile layout has zero tiles".into()));
        }
        if stage_offsets.len() != nr_tiles {
            return Err(Error::ConfigError(format!(
                "{} stage offsets for {nr_tiles} tiles ({nr_tiles_x}x{nr_tiles_y})",
                stage_offsets.len()
            )));
        }
        Ok(Self {
            nr_tiles_x,
            nr_tiles_y,
            pixel_size,
            tile_size,
            stage_offsets,
            scan_direction,
        })
    }

    /// Layout for a single field of view at stage offset (0, 0).
    pub fn single_tile(pixel_size: (f64, f64), tile_size: (f64, f64)) -> Self {
        Self {
            nr_tiles_x: 1,
            nr_tiles_y: 1,
            pixel_size,
            tile_size,
            stage_offsets: vec![StageCoord::default()],
            scan_direction: ScanDirection::LeftToRight,
        }
    }

    /// Physical tile size from image dimension, tile count, and overlap.
    ///
    /// `tile_size = image_dim / (nr_tiles - (nr_tiles - 1) * overlap) * pixel_size`.
    pub fn derive_tile_size(
        image_dim: usize,
        nr_tiles: usize,
        overlap_fraction: f64,
        pixel_size: f64,
    ) -> f64 {
        let denom = nr_tiles as f64 - (nr_tiles as f64 - 1.0) * overlap_fraction;
        image_dim as f64 / denom * pixel_size
    }

    /// Total number of tiles.
    #[inline]
    pub fn nr_tiles(&self) -> usize {
        self.nr_tiles_x * self.nr_tiles_y
    }

    /// Tile grid dimensions (x, y).
    #[inline]
    pub fn grid(&self) -> (usize, usize) {
        (self.nr_tiles_x, self.nr_tiles_y)
    }

    /// Pixel size in meters (x, y).
    #[inline]
    pub fn pixel_size(&self) -> (f64, f64) {
        self.pixel_size
    }

    /// Stage offsets in acquisition order.
    #[inline]
    pub fn stage_offsets(&self) -> &[StageCoord] {
        &self.stage_offsets
    }

    /// Acquisition index of a row-major tile index under the serpentine
    /// stitching pattern.
    ///
    /// Even rows run in the scan direction, odd rows reversed; the whole
    /// pattern mirrors under [`ScanDirection::RightToLeft`].
    pub fn acquisition_index(&self, tile_index: usize) -> Result<usize> {
        if tile_index >= self.nr_tiles() {
            return Err(Error::TileOutOfRange {
                tile: tile_index,
                nr_tiles: self.nr_tiles(),
            });
        }
        let row = tile_index / self.nr_tiles_x;
        let col = tile_index % self.nr_tiles_x;
        let forward = match self.scan_direction {
            ScanDirection::LeftToRight => row % 2 == 0,
            ScanDirection::RightToLeft => row % 2 == 1,
        };
        let col = if forward {
            col
        } else {
            self.nr_tiles_x - 1 - col
        };
        Ok(row * self.nr_tiles_x + col)
    }

    /// Stage offset paired with a row-major tile index.
    pub fn stage_offset(&self, tile_index: usize) -> Result<StageCoord> {
        Ok(self.stage_offsets[self.acquisition_index(tile_index)?])
    }

    /// Maps a pixel-space cell centroid in a tile to absolute stage meters.
    ///
    /// The sign inversion and half-tile centering match the instrument's
    /// stage coordinate convention; they are not arbitrary.
    pub fn map_to_stage(&self, tile_index: usize, pixel_x: f64, pixel_y: f64) -> Result<StageCoord> {
        let offset = self.stage_offset(tile_index)?;
        Ok(StageCoord {
            x: -offset.x - self.tile_size.0 / 2.0 + pixel_x * self.pixel_size.0,
            y: -offset.y - self.tile_size.1 / 2.0 + pixel_y * self.pixel_size.1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_direction_from_overlap() {
        assert_eq!(ScanDirection::from_overlap(0.1), ScanDirection::LeftToRight);
        assert_eq!(ScanDirection::from_overlap(0.0), ScanDirection::LeftToRight);
        assert_eq!(ScanDirection::from_overlap(-0.1), ScanDirection::RightToLeft);
    }

    #[test]
    fn test_derive_tile_size() {
        // 1000 px, 2 tiles, 10% overlap, 1 um pixels: 1000 / 1.9 um.
        let size = TileLayout::derive_tile_size(1000, 2, 0.1, 1e-6);
        assert!((size - 1000.0 / 1.9 * 1e-6).abs() < 1e-12);
        // No overlap: plain division.
        let size = TileLayout::derive_tile_size(1000, 2, 0.0, 1e-6);
        assert!((size - 5e-4).abs() < 1e-12);
    }

    #[test]
    fn test_offset_count_validation() {
        let err = TileLayout::new(
            2,
            2,
            (1e-6, 1e-6),
            (1e-3, 1e-3),
            vec![StageCoord::default(); 3],
            ScanDirection::LeftToRight,
        );
        assert!(err.is_err());
    }

    fn offsets(n: usize) -> Vec<StageCoord> {
        (0..n)
            .map(|i| StageCoord {
                x: i as f64,
                y: 10.0 * i as f64,
            })
            .collect()
    }

    #[test]
    fn test_serpentine_left_to_right() {
        let layout = TileLayout::new(
            3,
            2,
            (1e-6, 1e-6),
            (1e-3, 1e-3),
            offsets(6),
            ScanDirection::LeftToRight,
        )
        .unwrap();
        // Row 0 forward, row 1 reversed.
        let acq: Vec<usize> = (0..6)
            .map(|i| layout.acquisition_index(i).unwrap())
            .collect();
        assert_eq!(acq, vec![0, 1, 2, 5, 4, 3]);
    }

    #[test]
    fn test_serpentine_right_to_left() {
        let layout = TileLayout::new(
            3,
            2,
            (1e-6, 1e-6),
            (1e-3, 1e-3),
            offsets(6),
            ScanDirection::RightToLeft,
        )
        .unwrap();
        let acq: Vec<usize> = (0..6)
            .map(|i| layout.acquisition_index(i).unwrap())
            .collect();
        assert_eq!(acq, vec![2, 1, 0, 3, 4, 5]);
    }

    #[test]
    fn test_map_to_stage_signs() {
        let layout = TileLayout::new(
            1,
            1,
            (2e-6, 2e-6),
            (1e-3, 2e-3),
            vec![StageCoord { x: 5e-3, y: -5e-3 }],
            ScanDirection::LeftToRight,
        )
        .unwrap();
        let coord = layout.map_to_stage(0, 100.0, 50.0).unwrap();
        // x = -5e-3 - 0.5e-3 + 100 * 2e-6
        assert!((coord.x - (-5e-3 - 5e-4 + 2e-4)).abs() < 1e-12);
        // y = 5e-3 - 1e-3 + 50 * 2e-6
        assert!((coord.y - (5e-3 - 1e-3 + 1e-4)).abs() < 1e-12);
    }

    #[test]
    fn test_tile_out_of_range() {
        let layout = TileLayout::single_tile((1e-6, 1e-6), (1e-3, 1e-3));
        assert!(layout.map_to_stage(1, 0.0, 0.0).is_err());
    }
}
