//! Stage/tile metadata: textual key-value parsing, JSON layout specs, and
//! a retrying labelmap loader.

use crate::error::{Error, Result};
use crate::matrix::read_labelmap_csv;
use flimscreen_core::labelmap::LabelMap;
use flimscreen_core::runlog::{RunLog, Warning};
use flimscreen_core::stage::{ScanDirection, StageCoord, TileLayout};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const MICRONS_TO_METERS: f64 = 1e-6;

/// Raw mosaic metadata as found in acquisition headers or a JSON sidecar.
///
/// Units follow the acquisition convention: micrometers for sizes, percent
/// for overlap, meters for stage coordinates.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayoutSpec {
    /// Tile grid (x, y).
    pub tile_layout: (usize, usize),
    /// Per-tile stage offsets in meters, acquisition order.
    pub stage_coordinates: Vec<(f64, f64)>,
    /// Pixel size in micrometers (x, y).
    pub pixel_size_um: (f64, f64),
    /// Explicit physical tile size in micrometers, if the stitcher recorded
    /// one.
    #[serde(default)]
    pub tile_size_um: Option<(f64, f64)>,
    /// Stitching overlap in percent; negative means reverse scan order.
    #[serde(default)]
    pub overlap_percent: f64,
}

impl LayoutSpec {
    /// Parses the embedded textual key-value form, e.g.
    ///
    /// ```text
    /// tile layout: 3,2
    /// stage coordinates: 0.001,0.002,0.003,0.002,...
    /// pixel size (um): 0.65,0.65
    /// tile size (um): 665.6,665.6
    /// overlap (%): 10
    /// ```
    pub fn parse_text(path: &Path, text: &str) -> Result<Self> {
        let mut tile_layout = None;
        let mut stage_coordinates = None;
        let mut pixel_size_um = None;
        let mut tile_size_um = None;
        let mut overlap_percent = 0.0;

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();
            match key.as_str() {
                "tile layout" => {
                    let pair = parse_pair::<usize>(value)
                        .ok_or_else(|| Error::parse(path, format!("bad tile layout '{value}'")))?;
                    tile_layout = Some(pair);
                }
                "stage coordinates" => {
                    let floats = parse_floats(value)
                        .ok_or_else(|| Error::parse(path, "bad stage coordinates"))?;
                    if floats.len() % 2 != 0 {
                        return Err(Error::parse(path, "odd number of stage coordinate values"));
                    }
                    stage_coordinates =
                        Some(floats.chunks(2).map(|c| (c[0], c[1])).collect::<Vec<_>>());
                }
                "pixel size (um)" => {
                    pixel_size_um = parse_pair::<f64>(value);
                }
                "tile size (um)" => {
                    tile_size_um = parse_pair::<f64>(value);
                }
                "overlap (%)" => {
                    overlap_percent = value
                        .parse::<f64>()
                        .map_err(|_| Error::parse(path, format!("bad overlap '{value}'")))?;
                }
                _ => {}
            }
        }

        Ok(Self {
            tile_layout: tile_layout
                .ok_or_else(|| Error::parse(path, "missing 'tile layout'"))?,
            stage_coordinates: stage_coordinates
                .ok_or_else(|| Error::parse(path, "missing 'stage coordinates'"))?,
            pixel_size_um: pixel_size_um
                .ok_or_else(|| Error::parse(path, "missing 'pixel size (um)'"))?,
            tile_size_um,
            overlap_percent,
        })
    }

    /// Reads the JSON sidecar form.
    pub fn read_json(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Reads the textual key-value form from a file.
    pub fn read_text(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse_text(path, &text)
    }

    /// Builds the validated tile layout.
    ///
    /// When no explicit tile size was recorded, it is derived from the tile
    /// image dimensions, tile counts, and overlap fraction.
    pub fn into_layout(self, image_width: usize, image_height: usize) -> Result<TileLayout> {
        let overlap_fraction = self.overlap_percent / 100.0;
        let pixel_size = (
            self.pixel_size_um.0 * MICRONS_TO_METERS,
            self.pixel_size_um.1 * MICRONS_TO_METERS,
        );
        let tile_size = match self.tile_size_um {
            Some((w, h)) => (w * MICRONS_TO_METERS, h * MICRONS_TO_METERS),
            None => (
                TileLayout::derive_tile_size(
                    image_width,
                    self.tile_layout.0,
                    overlap_fraction,
                    pixel_size.0,
                ),
                TileLayout::derive_tile_size(
                    image_height,
                    self.tile_layout.1,
                    overlap_fraction,
                    pixel_size.1,
                ),
            ),
        };
        let offsets: Vec<StageCoord> = self
            .stage_coordinates
            .iter()
            .map(|&(x, y)| StageCoord { x, y })
            .collect();
        Ok(TileLayout::new(
            self.tile_layout.0,
            self.tile_layout.1,
            pixel_size,
            tile_size,
            offsets,
            ScanDirection::from_overlap(overlap_fraction),
        )?)
    }
}

fn parse_pair<T: std::str::FromStr>(value: &str) -> Option<(T, T)> {
    let mut parts = value.split(',').map(str::trim);
    let a = parts.next()?.parse().ok()?;
    let b = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((a, b))
}

fn parse_floats(value: &str) -> Option<Vec<f64>> {
    value
        .split(',')
        .map(|s| s.trim().parse::<f64>().ok())
        .collect()
}

/// Loads a tile's labelmap, retrying once after a fixed backoff.
///
/// A transient read failure is retried after `backoff`; a second failure is
/// returned to the caller, who skips that tile and continues the batch.
pub fn read_labelmap_with_retry(
    path: &Path,
    tile: usize,
    backoff: Duration,
    log: &mut RunLog,
) -> Result<LabelMap> {
    match read_labelmap_csv(path) {
        Ok(map) => Ok(map),
        Err(_) => {
            log.push(Warning::TileRetried { tile });
            std::thread::sleep(backoff);
            read_labelmap_csv(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    const TEXT: &str = "\
tile layout: 2,1
stage coordinates: 0.001,0.002,0.003,0.002
pixel size (um): 0.5,0.5
overlap (%): 10
";

    #[test]
    fn test_parse_text_metadata() {
        let spec = LayoutSpec::parse_text(Path::new("meta.txt"), TEXT).unwrap();
        assert_eq!(spec.tile_layout, (2, 1));
        assert_eq!(spec.stage_coordinates.len(), 2);
        assert_eq!(spec.overlap_percent, 10.0);
        assert_eq!(spec.tile_size_um, None);
    }

    #[test]
    fn test_missing_stage_coordinates_is_error() {
        let text = "tile layout: 2,1\npixel size (um): 0.5,0.5\n";
        assert!(LayoutSpec::parse_text(Path::new("meta.txt"), text).is_err());
    }

    #[test]
    fn test_into_layout_derives_tile_size() {
        let spec = LayoutSpec::parse_text(Path::new("meta.txt"), TEXT).unwrap();
        let layout = spec.into_layout(1000, 1000).unwrap();
        assert_eq!(layout.nr_tiles(), 2);
        // 1000 px / (2 - 1 * 0.1) * 0.5 um
        let expected = 1000.0 / 1.9 * 0.5e-6;
        let coord = layout.map_to_stage(0, 0.0, 0.0).unwrap();
        assert!((coord.x - (-0.001 - expected / 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"{
            "tile_layout": [2, 1],
            "stage_coordinates": [[0.001, 0.002], [0.003, 0.002]],
            "pixel_size_um": [0.5, 0.5],
            "tile_size_um": [500.0, 500.0],
            "overlap_percent": -5.0
        }"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        let spec = LayoutSpec::read_json(file.path()).unwrap();
        assert_eq!(spec.tile_size_um, Some((500.0, 500.0)));
        // Negative overlap flips the scan direction.
        let layout = spec.into_layout(1000, 1000).unwrap();
        let first = layout.stage_offset(0).unwrap();
        assert!((first.x - 0.003).abs() < 1e-12);
    }

    #[test]
    fn test_retry_logs_and_fails_after_second_attempt() {
        let mut log = RunLog::new();
        let missing = Path::new("/nonexistent/labelmap.csv");
        let result =
            read_labelmap_with_retry(missing, 4, Duration::from_millis(1), &mut log);
        assert!(result.is_err());
        assert_eq!(log.warnings(), &[Warning::TileRetried { tile: 4 }]);
    }

    #[test]
    fn test_retry_succeeds_first_try() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"0,1\n1,1\n").unwrap();
        let mut log = RunLog::new();
        let map =
            read_labelmap_with_retry(file.path(), 0, Duration::from_millis(1), &mut log).unwrap();
        assert_eq!(map.nr_cells(), 1);
        assert!(log.is_empty());
    }
}
