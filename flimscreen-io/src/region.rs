//! Region point-list files: coordinate annotations for instrument targeting.

use crate::error::Result;
use flimscreen_core::hit::HitRecord;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use uuid::Uuid;

/// One point shape with its generated unique identifier and absolute stage
/// coordinates in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionPoint {
    /// Unique shape identifier, shared with the stack-list entry.
    pub id: String,
    /// Stage x in meters.
    pub x: f64,
    /// Stage y in meters.
    pub y: f64,
}

/// Per-point metadata entry of the flat stack list, index-aligned with the
/// shape list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackEntry {
    /// Identifier of the corresponding shape.
    pub id: String,
    /// Cell label within its tile.
    pub cell_id: u32,
    /// Tile the cell was segmented in.
    pub tile_id: usize,
}

/// A named hierarchical shape collection plus its parallel stack list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionCollection {
    /// Collection name shown by the acquisition software.
    pub name: String,
    /// One point per hit.
    pub shapes: Vec<RegionPoint>,
    /// Per-point metadata, index-aligned with `shapes`.
    pub stack_list: Vec<StackEntry>,
}

impl RegionCollection {
    /// Builds a collection with one point per hit, each with a fresh
    /// identifier.
    pub fn from_hits(name: impl Into<String>, hits: &[HitRecord]) -> Self {
        let mut shapes = Vec::with_capacity(hits.len());
        let mut stack_list = Vec::with_capacity(hits.len());
        for hit in hits {
            let id = Uuid::new_v4().to_string();
            shapes.push(RegionPoint {
                id: id.clone(),
                x: hit.stage.x,
                y: hit.stage.y,
            });
            stack_list.push(StackEntry {
                id,
                cell_id: hit.cell_id,
                tile_id: hit.tile_id,
            });
        }
        Self {
            name: name.into(),
            shapes,
            stack_list,
        }
    }

    /// Writes the collection as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flimscreen_core::stage::StageCoord;
    use tempfile::NamedTempFile;

    fn hit(cell_id: u32, x: f64, y: f64) -> HitRecord {
        HitRecord {
            cell_id,
            tile_id: 1,
            pixel_x: 0.0,
            pixel_y: 0.0,
            stage: StageCoord { x, y },
            measurements: Vec::new(),
        }
    }

    #[test]
    fn test_collection_is_parallel_and_ids_unique() {
        let hits = vec![hit(1, 1e-3, 2e-3), hit(2, 3e-3, 4e-3)];
        let collection = RegionCollection::from_hits("chunk 0", &hits);
        assert_eq!(collection.shapes.len(), 2);
        assert_eq!(collection.stack_list.len(), 2);
        assert_eq!(collection.shapes[0].id, collection.stack_list[0].id);
        assert_ne!(collection.shapes[0].id, collection.shapes[1].id);
        assert_eq!(collection.stack_list[1].cell_id, 2);
    }

    #[test]
    fn test_write_and_parse_back() {
        let hits = vec![hit(7, -1e-3, 5e-4)];
        let collection = RegionCollection::from_hits("top", &hits);
        let file = NamedTempFile::new().unwrap();
        collection.write(file.path()).unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        let parsed: RegionCollection = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, collection);
        assert_eq!(parsed.shapes[0].x, -1e-3);
    }
}
