//! Response ranking and kymograph sorting.

use flimscreen_core::error::Result;
use flimscreen_core::kymograph::{Kymograph, RankVector};
use flimscreen_core::phases::FramePhases;

/// A kymograph sorted by per-cell response, with the rank permutation.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedKymograph {
    /// Row-permuted kymograph: row `i` is the cell at sorted position `i`.
    pub sorted: Kymograph,
    /// `rank[i]` = original cell index placed at sorted position `i`.
    pub rank: RankVector,
    /// Per-cell response statistic in original cell order.
    pub response: Vec<f64>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Ranks cells ascending by mean response over the ranking window.
///
/// The window is `[stimulation, calibration)`, falling back to
/// `[stimulation, end)` without calibration and to the full row in
/// baseline-only mode. The sort is stable: ties keep original cell order,
/// and the produced rank is always a permutation.
pub fn rank_by_response(kymograph: &Kymograph, phases: &FramePhases) -> Result<RankedKymograph> {
    let nr_frames = kymograph.nr_frames();
    let window = phases.ranking_window(nr_frames);

    let response: Vec<f64> = (0..kymograph.nr_cells())
        .map(|i| mean(&kymograph.row(i)[window.clone()]))
        .collect();

    let mut order: Vec<usize> = (0..kymograph.nr_cells()).collect();
    order.sort_by(|&a, &b| response[a].total_cmp(&response[b]));

    let rank = RankVector::new(order)?;
    let sorted = kymograph.permuted(&rank)?;
    Ok(RankedKymograph {
        sorted,
        rank,
        response,
    })
}
