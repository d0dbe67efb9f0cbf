//! Kymograph matrices (cells x time) and rank vectors.

use crate::error::{Error, Result};

/// Per-cell, per-timepoint trace matrix.
///
/// Row `i` holds the trace of the cell with label `i + 1`; column `t` is
/// time frame `t`. Entries are intensity-weighted lifetime/ratio/intensity
/// values. Published kymographs never contain NaN: empty-weight cells are
/// zero-filled by the extraction policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Kymograph {
    nr_cells: usize,
    nr_frames: usize,
    data: Vec<f64>,
}

impl Kymograph {
    /// Creates a zero-filled kymograph.
    pub fn zeros(nr_cells: usize, nr_frames: usize) -> Self {
        Self {
            nr_cells,
            nr_frames,
            data: vec![0.0; nr_cells * nr_frames],
        }
    }

    /// Creates a kymograph from row-major data.
    pub fn from_vec(nr_cells: usize, nr_frames: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != nr_cells * nr_frames {
            return Err(Error::ShapeMismatch {
                context: "kymograph",
                expected: format!("{} values ({nr_cells}x{nr_frames})", nr_cells * nr_frames),
                actual: format!("{} values", data.len()),
            });
        }
        Ok(Self {
            nr_cells,
            nr_frames,
            data,
        })
    }

    /// Number of cells (rows).
    #[inline]
    pub fn nr_cells(&self) -> usize {
        self.nr_cells
    }

    /// Number of time frames (columns).
    #[inline]
    pub fn nr_frames(&self) -> usize {
        self.nr_frames
    }

    /// Trace of cell `i`.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.nr_frames..(i + 1) * self.nr_frames]
    }

    /// Mutable trace of cell `i`.
    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.nr_frames..(i + 1) * self.nr_frames]
    }

    /// Raw row-major data.
    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Population-average trace: per-frame mean across all cells.
    ///
    /// Zero cells yields an all-zero trace of the same length.
    pub fn population_trace(&self) -> Vec<f64> {
        let mut trace = vec![0.0; self.nr_frames];
        if self.nr_cells == 0 {
            return trace;
        }
        for i in 0..self.nr_cells {
            for (t, v) in self.row(i).iter().enumerate() {
                trace[t] += v;
            }
        }
        for v in &mut trace {
            *v /= self.nr_cells as f64;
        }
        trace
    }

    /// Row-permuted copy: row `i` of the result is row `rank[i]` of `self`.
    pub fn permuted(&self, rank: &RankVector) -> Result<Kymograph> {
        if rank.len() != self.nr_cells {
            return Err(Error::InvalidRank(format!(
                "rank length {} does not match {} cells",
                rank.len(),
                self.nr_cells
            )));
        }
        let mut out = Kymograph::zeros(self.nr_cells, self.nr_frames);
        for i in 0..self.nr_cells {
            let src = rank.get(i);
            out.row_mut(i).copy_from_slice(self.row(src));
        }
        Ok(out)
    }
}

/// Mapping from sorted position to original cell index.
///
/// `rank[i]` is the original cell index placed at sorted position `i`;
/// always a permutation of `[0, nr_cells)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankVector(Vec<usize>);

impl RankVector {
    /// Creates a rank vector, verifying it is a permutation.
    pub fn new(order: Vec<usize>) -> Result<Self> {
        let n = order.len();
        let mut seen = vec![false; n];
        for &idx in &order {
            if idx >= n {
                return Err(Error::InvalidRank(format!("index {idx} out of range 0..{n}")));
            }
            if seen[idx] {
                return Err(Error::InvalidRank(format!("index {idx} appears twice")));
            }
            seen[idx] = true;
        }
        Ok(Self(order))
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the vector is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Original index at sorted position `i`.
    #[inline]
    pub fn get(&self, i: usize) -> usize {
        self.0[i]
    }

    /// Underlying permutation.
    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Inverse permutation: maps original index back to sorted position.
    pub fn inverse(&self) -> RankVector {
        let mut inv = vec![0usize; self.0.len()];
        for (pos, &orig) in self.0.iter().enumerate() {
            inv[orig] = pos;
        }
        Self(inv)
    }
}
