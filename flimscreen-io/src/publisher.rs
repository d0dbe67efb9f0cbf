//! Hit-list publication: sorting, pagination, region files, stage dumps.

use crate::error::Result;
use crate::region::RegionCollection;
use flimscreen_core::config::ScreenConfig;
use flimscreen_core::criteria::HitCriterion;
use flimscreen_core::hit::{HitRecord, HitTable, SortSpec};
use flimscreen_core::stage::TileLayout;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sorts, paginates, and exports the hit table.
#[derive(Debug, Clone)]
pub struct HitListPublisher {
    sort: SortSpec,
    chunk_size: usize,
    top_n: usize,
}

/// What a publication run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishSummary {
    /// Total hits in the sorted table.
    pub total_hits: usize,
    /// Number of chunk region files written.
    pub nr_chunks: usize,
    /// Every file written, in write order.
    pub files: Vec<PathBuf>,
}

impl HitListPublisher {
    /// Creates a publisher from the run configuration.
    pub fn new(config: &ScreenConfig) -> Self {
        Self {
            sort: config.sort,
            chunk_size: config.chunk_size,
            top_n: config.top_n,
        }
    }

    /// Publisher with explicit settings.
    pub fn with_settings(sort: SortSpec, chunk_size: usize, top_n: usize) -> Self {
        Self {
            sort,
            chunk_size: chunk_size.max(1),
            top_n,
        }
    }

    /// Sorts the table, writes the full CSV hit table, one region file per
    /// chunk, and the independent top-N region file.
    ///
    /// Chunk boundaries are deterministic given the sorted order and chunk
    /// size; concatenating the chunks reproduces the sorted table exactly.
    pub fn publish(
        &self,
        table: &mut HitTable,
        criteria: &[HitCriterion],
        out_dir: &Path,
        base_name: &str,
    ) -> Result<PublishSummary> {
        table.sort(self.sort);

        let mut files = Vec::new();
        let table_path = out_dir.join(format!("{base_name}_hits.csv"));
        write_hit_table_csv(&table_path, table.rows(), criteria)?;
        files.push(table_path);

        let mut nr_chunks = 0usize;
        for (chunk_nr, chunk) in table.chunks(self.chunk_size).enumerate() {
            let path = out_dir.join(format!("{base_name}_hits_{chunk_nr:03}.rgn.json"));
            RegionCollection::from_hits(format!("{base_name} chunk {chunk_nr}"), chunk)
                .write(&path)?;
            files.push(path);
            nr_chunks += 1;
        }

        let top_path = out_dir.join(format!("{base_name}_top{}.rgn.json", self.top_n));
        RegionCollection::from_hits(format!("{base_name} top {}", self.top_n), table.top(self.top_n))
            .write(&top_path)?;
        files.push(top_path);

        Ok(PublishSummary {
            total_hits: table.len(),
            nr_chunks,
            files,
        })
    }
}

/// Writes the hit table as CSV: fixed columns plus one column per enabled
/// criterion, in criterion declaration order.
pub fn write_hit_table_csv(
    path: &Path,
    rows: &[HitRecord],
    criteria: &[HitCriterion],
) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let mut header = vec![
        "cell_id".to_string(),
        "tile_id".to_string(),
        "pixel_x".to_string(),
        "pixel_y".to_string(),
        "stage_x".to_string(),
        "stage_y".to_string(),
    ];
    header.extend(criteria.iter().map(|c| c.kind.column_name().to_string()));
    writeln!(writer, "{}", header.join(","))?;

    for row in rows {
        let mut fields = vec![
            row.cell_id.to_string(),
            row.tile_id.to_string(),
            row.pixel_x.to_string(),
            row.pixel_y.to_string(),
            row.stage.x.to_string(),
            row.stage.y.to_string(),
        ];
        fields.extend(
            criteria
                .iter()
                .map(|c| row.measurement(c.kind).unwrap_or(0.0).to_string()),
        );
        writeln!(writer, "{}", fields.join(","))?;
    }
    writer.flush()?;
    Ok(())
}

/// Dumps stage positions, one `x<TAB>y` pair per line in tile-index order.
pub fn write_stage_positions(path: &Path, layout: &TileLayout) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for tile in 0..layout.nr_tiles() {
        let coord = layout.stage_offset(tile)?;
        writeln!(writer, "{}\t{}", coord.x, coord.y)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flimscreen_core::criteria::{Comparison, CriterionKind};
    use flimscreen_core::hit::{SortColumn, SortDirection};
    use flimscreen_core::stage::{ScanDirection, StageCoord};
    use flimscreen_core::Measurement;
    use tempfile::TempDir;

    fn hit(cell_id: u32, value: f64) -> HitRecord {
        HitRecord {
            cell_id,
            tile_id: 0,
            pixel_x: f64::from(cell_id),
            pixel_y: 0.0,
            stage: StageCoord {
                x: 1e-3 * f64::from(cell_id),
                y: 0.0,
            },
            measurements: vec![Measurement {
                kind: CriterionKind::ResponseRelative,
                value,
            }],
        }
    }

    fn criteria() -> Vec<HitCriterion> {
        vec![HitCriterion {
            kind: CriterionKind::ResponseRelative,
            comparison: Comparison::Higher(0.5),
        }]
    }

    fn publisher(chunk_size: usize, top_n: usize) -> HitListPublisher {
        HitListPublisher::with_settings(
            SortSpec {
                column: SortColumn::Criterion(CriterionKind::ResponseRelative),
                direction: SortDirection::Descending,
            },
            chunk_size,
            top_n,
        )
    }

    #[test]
    fn test_chunks_reproduce_sorted_list() {
        let dir = TempDir::new().unwrap();
        let mut table = HitTable::new();
        for i in 0..7 {
            table.push(hit(i + 1, f64::from(i)));
        }
        let summary = publisher(3, 2)
            .publish(&mut table, &criteria(), dir.path(), "run")
            .unwrap();
        assert_eq!(summary.total_hits, 7);
        assert_eq!(summary.nr_chunks, 3);
        // CSV + 3 chunks + top file.
        assert_eq!(summary.files.len(), 5);

        // Concatenated chunk contents equal the sorted table, no duplicates
        // or omissions.
        let mut collected = Vec::new();
        for chunk_nr in 0..3 {
            let path = dir.path().join(format!("run_hits_{chunk_nr:03}.rgn.json"));
            let parsed: RegionCollection =
                serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
            collected.extend(parsed.stack_list.iter().map(|e| e.cell_id).collect::<Vec<_>>());
        }
        let expected: Vec<u32> = table.rows().iter().map(|r| r.cell_id).collect();
        assert_eq!(collected, expected);
        // Descending by measurement: cell 7 (value 6.0) first.
        assert_eq!(collected[0], 7);
    }

    #[test]
    fn test_single_hit_chunk_size_one() {
        let dir = TempDir::new().unwrap();
        let mut table = HitTable::new();
        table.push(hit(1, 1.0));
        let summary = publisher(1, 5)
            .publish(&mut table, &criteria(), dir.path(), "run")
            .unwrap();
        assert_eq!(summary.nr_chunks, 1);
        let parsed: RegionCollection = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("run_hits_000.rgn.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(parsed.shapes.len(), 1);
        assert_eq!(parsed.stack_list[0].cell_id, 1);
    }

    #[test]
    fn test_top_file_independent_of_chunking() {
        let dir = TempDir::new().unwrap();
        let mut table = HitTable::new();
        for i in 0..5 {
            table.push(hit(i + 1, f64::from(i)));
        }
        publisher(2, 3)
            .publish(&mut table, &criteria(), dir.path(), "run")
            .unwrap();
        let parsed: RegionCollection = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("run_top3.rgn.json")).unwrap(),
        )
        .unwrap();
        let ids: Vec<u32> = parsed.stack_list.iter().map(|e| e.cell_id).collect();
        assert_eq!(ids, vec![5, 4, 3]);
    }

    #[test]
    fn test_hit_table_csv_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hits.csv");
        write_hit_table_csv(&path, &[hit(2, 1.5)], &criteria()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "cell_id,tile_id,pixel_x,pixel_y,stage_x,stage_y,response_rel"
        );
        assert_eq!(lines.next().unwrap(), "2,0,2,0,0.002,0,1.5");
    }

    #[test]
    fn test_stage_positions_dump() {
        let dir = TempDir::new().unwrap();
        let layout = TileLayout::new(
            2,
            1,
            (1e-6, 1e-6),
            (1e-3, 1e-3),
            vec![
                StageCoord { x: 0.001, y: 0.002 },
                StageCoord { x: 0.003, y: 0.002 },
            ],
            ScanDirection::LeftToRight,
        )
        .unwrap();
        let path = dir.path().join("stage_positions.txt");
        write_stage_positions(&path, &layout).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "0.001\t0.002\n0.003\t0.002\n");
    }
}
