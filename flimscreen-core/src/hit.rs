//! Hit records and the growing hit table.

use crate::criteria::CriterionKind;
use crate::stage::StageCoord;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One measured value recorded for an enabled criterion.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Measurement {
    pub kind: CriterionKind,
    pub value: f64,
}

/// One row of the hit table.
///
/// Produced exclusively by the classifier; downstream stages only read,
/// sort, and paginate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HitRecord {
    /// Cell label (1-based, as in the labelmap).
    pub cell_id: u32,
    /// Tile the cell was segmented in.
    pub tile_id: usize,
    /// Pixel-space centroid x.
    pub pixel_x: f64,
    /// Pixel-space centroid y.
    pub pixel_y: f64,
    /// Absolute stage position in meters.
    pub stage: StageCoord,
    /// One value per enabled criterion, in criterion declaration order.
    pub measurements: Vec<Measurement>,
}

impl HitRecord {
    /// Value recorded for `kind`, if that criterion was enabled.
    pub fn measurement(&self, kind: CriterionKind) -> Option<f64> {
        self.measurements
            .iter()
            .find(|m| m.kind == kind)
            .map(|m| m.value)
    }
}

/// Column a hit table can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    CellId,
    TileId,
    Criterion(CriterionKind),
}

/// Sort direction for hit publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

/// Sorting policy for published hit lists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortSpec {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            column: SortColumn::CellId,
            direction: SortDirection::Ascending,
        }
    }
}

/// Append-only table of hits across tiles.
///
/// The single mutation point for hit output: tiles append in ascending tile
/// index, so the table order is deterministic before sorting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitTable {
    rows: Vec<HitRecord>,
}

impl HitTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of hits.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no hits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows in current order.
    #[inline]
    pub fn rows(&self) -> &[HitRecord] {
        &self.rows
    }

    /// Appends one hit.
    pub fn push(&mut self, record: HitRecord) {
        self.rows.push(record);
    }

    /// Appends all hits of another table, preserving order.
    pub fn extend(&mut self, other: HitTable) {
        self.rows.extend(other.rows);
    }

    /// Stable sort by the given column and direction.
    ///
    /// Rows missing the sort measurement order after all rows that have it,
    /// keeping their relative order.
    pub fn sort(&mut self, spec: SortSpec) {
        let directed = |ord: std::cmp::Ordering| match spec.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        };
        self.rows.sort_by(|a, b| match spec.column {
            SortColumn::CellId => directed(a.cell_id.cmp(&b.cell_id)),
            SortColumn::TileId => directed(a.tile_id.cmp(&b.tile_id)),
            // Missing measurements sort last in either direction.
            SortColumn::Criterion(kind) => match (a.measurement(kind), b.measurement(kind)) {
                (Some(va), Some(vb)) => directed(va.total_cmp(&vb)),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            },
        });
    }

    /// Contiguous chunks of at most `chunk_size` rows, in table order.
    pub fn chunks(&self, chunk_size: usize) -> impl Iterator<Item = &[HitRecord]> {
        self.rows.chunks(chunk_size.max(1))
    }

    /// First `n` rows in table order.
    pub fn top(&self, n: usize) -> &[HitRecord] {
        &self.rows[..n.min(self.rows.len())]
    }
}
