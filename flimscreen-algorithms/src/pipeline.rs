//! High-level per-tile pipeline: extraction, detection, ranking, classification.

use crate::classify::{ClassifierInput, HitClassifier};
use crate::events::{resolve_phases, EventDetector};
use crate::ranking::rank_by_response;
use crate::trace::TraceExtractor;
use flimscreen_core::config::ScreenConfig;
use flimscreen_core::error::Result;
use flimscreen_core::hit::HitTable;
use flimscreen_core::kymograph::{Kymograph, RankVector};
use flimscreen_core::labelmap::LabelMap;
use flimscreen_core::phases::FramePhases;
use flimscreen_core::runlog::{RunLog, Warning};
use flimscreen_core::stack::FrameStack;
use flimscreen_core::stage::TileLayout;

/// Complete analysis output for one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileAnalysis {
    /// Per-cell traces in label order.
    pub kymograph: Kymograph,
    /// Row-permuted kymograph sorted by response.
    pub kymograph_sorted: Kymograph,
    /// Permutation mapping sorted position to original cell index.
    pub rank: RankVector,
    /// Per-cell response statistic in label order.
    pub response: Vec<f64>,
    /// Detected or overridden frame phases.
    pub phases: FramePhases,
    /// Hits found in this tile.
    pub hits: HitTable,
}

/// Runs the full analysis for one tile.
///
/// Tiles are independent; callers process them sequentially (or in
/// parallel with a deterministic merge) and append hits in ascending tile
/// index.
pub fn analyze_tile(
    intensity: &FrameStack,
    lifetime: &FrameStack,
    labelmap: &LabelMap,
    secondary: Option<&[f64]>,
    tile_id: usize,
    layout: &TileLayout,
    config: &ScreenConfig,
    log: &mut RunLog,
) -> Result<TileAnalysis> {
    let extractor = TraceExtractor::new(config.empty_weight);
    let kymograph = extractor.extract(intensity, lifetime, labelmap)?;

    if kymograph.nr_cells() == 0 {
        log.push(Warning::NoCellsFound { tile: tile_id });
        return Ok(TileAnalysis {
            kymograph_sorted: kymograph.clone(),
            rank: RankVector::new(Vec::new())?,
            response: Vec::new(),
            phases: FramePhases::BaselineOnly,
            hits: HitTable::new(),
            kymograph,
        });
    }

    let detector = EventDetector::new(config.sensitivity);
    let phases = resolve_phases(
        config.manual_frames,
        &detector,
        &kymograph.population_trace(),
        log,
    );

    let ranked = rank_by_response(&kymograph, &phases)?;
    let centroids = labelmap.centroids();

    let input = ClassifierInput {
        kymograph: &kymograph,
        phases: &phases,
        centroids: &centroids,
        secondary,
        tile_id,
        layout,
    };
    let hits = HitClassifier::new(config).classify(&input, log)?;

    Ok(TileAnalysis {
        kymograph,
        kymograph_sorted: ranked.sorted,
        rank: ranked.rank,
        response: ranked.response,
        phases,
        hits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use flimscreen_core::criteria::{Comparison, CriterionKind, HitCriterion};

    /// Full end-to-end scenario: 4 cells, 10 frames, stimulation detected at
    /// frame 3 and calibration at frame 7, one responding cell.
    #[test]
    fn test_end_to_end_scenario() {
        // 4x2 pixels, one cell per 2x1 block.
        let labelmap = LabelMap::new(4, 2, vec![1, 2, 3, 4, 1, 2, 3, 4]).unwrap();
        let nr_frames = 10;
        let mut intensity_frames = Vec::new();
        let mut lifetime_frames = Vec::new();
        // Cell 1 responds by +1.0 ns, the others by +0.45 ns (below the
        // 0.5 threshold); everyone steps to 3.2 ns at the calibrant. Both
        // steps leave second-difference peaks above one stddev.
        for t in 0..nr_frames {
            intensity_frames.push(vec![100.0; 8]);
            let mut frame = vec![0.0; 8];
            for cell in 0..4 {
                let value = match t {
                    0..=3 => 2.0,
                    4..=7 => {
                        if cell == 0 {
                            3.0
                        } else {
                            2.45
                        }
                    }
                    _ => 3.2,
                };
                frame[cell] = value;
                frame[cell + 4] = value;
            }
            lifetime_frames.push(frame);
        }
        let intensity = FrameStack::from_frames(4, 2, intensity_frames).unwrap();
        let lifetime = FrameStack::from_frames(4, 2, lifetime_frames).unwrap();

        let config = ScreenConfig {
            criteria: vec![HitCriterion {
                kind: CriterionKind::ResponseRelative,
                comparison: Comparison::Higher(0.5),
            }],
            ..ScreenConfig::default()
        };
        let layout = TileLayout::single_tile((1e-6, 1e-6), (1e-3, 1e-3));
        let mut log = RunLog::new();

        let analysis = analyze_tile(
            &intensity,
            &lifetime,
            &labelmap,
            None,
            0,
            &layout,
            &config,
            &mut log,
        )
        .unwrap();

        assert_eq!(
            analysis.phases,
            FramePhases::Detected {
                stimulation: 3,
                calibration: Some(7),
            }
        );
        // The responder ranks last (highest response).
        assert_eq!(analysis.rank.get(3), 0);
        assert_eq!(analysis.hits.len(), 1);
        let hit = &analysis.hits.rows()[0];
        assert_eq!(hit.cell_id, 1);
        assert_relative_eq!(
            hit.measurement(CriterionKind::ResponseRelative).unwrap(),
            1.0
        );
        assert!(log.is_empty());
    }

    #[test]
    fn test_empty_labelmap_no_ops() {
        let labelmap = LabelMap::new(2, 2, vec![0; 4]).unwrap();
        let intensity = FrameStack::new(3, 2, 2, vec![1.0; 12]).unwrap();
        let lifetime = FrameStack::new(3, 2, 2, vec![1.0; 12]).unwrap();
        let config = ScreenConfig {
            criteria: vec![HitCriterion {
                kind: CriterionKind::Baseline,
                comparison: Comparison::Higher(0.0),
            }],
            ..ScreenConfig::default()
        };
        let layout = TileLayout::single_tile((1e-6, 1e-6), (1e-3, 1e-3));
        let mut log = RunLog::new();

        let analysis = analyze_tile(
            &intensity,
            &lifetime,
            &labelmap,
            None,
            2,
            &layout,
            &config,
            &mut log,
        )
        .unwrap();
        assert!(analysis.hits.is_empty());
        assert_eq!(analysis.kymograph.nr_cells(), 0);
        assert_eq!(log.warnings(), &[Warning::NoCellsFound { tile: 2 }]);
    }
}
