//!
//! This binary provides a CLI for screening lifetime image stacks.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand};

use flimscreen_algorithms::{analyze_tile, EventDetector};
use flimscreen_core::config::ScreenConfig;
use flimscreen_core::hit::HitTable;
use flimscreen_core::kymograph::Kymograph;
use flimscreen_core::labelmap::LabelMap;
use flimscreen_core::phases::FramePhases;
use flimscreen_core::runlog::{RunLog, Warning};
use flimscreen_core::stage::TileLayout;
use flimscreen_io::{
    read_frame_csv, read_labelmap_with_retry, read_stack_csv, write_kymograph_csv,
    write_stage_positions, HitListPublisher, LayoutSpec, SettingsFile,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File error: {0}")]
    FlimscreenIo(#[from] flimscreen_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] flimscreen_core::Error),

    #[error("{0}")]
    Input(String),
}

/// FLIM screening analysis: per-cell traces, event detection, hit selection.
#[derive(Parser)]
#[command(name = "flimscreen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a run directory of tiles and publish the hit list
    Analyze {
        /// Run directory containing tile_NNN/ subdirectories
        input: PathBuf,

        /// Mosaic metadata file (.json sidecar or textual header)
        #[arg(short, long)]
        metadata: PathBuf,

        /// Settings file (JSON); defaults apply when omitted
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Base name for published files
        #[arg(long, default_value = "screen")]
        base_name: String,

        /// Override the event-detection sensitivity
        #[arg(long)]
        sensitivity: Option<f64>,

        /// Select N random cells per tile instead of applying criteria
        #[arg(long)]
        random_hits: Option<usize>,

        /// Seed for random-hit selection
        #[arg(long)]
        seed: Option<u64>,

        /// Override the region-file chunk size
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Override the top-N region file size
        #[arg(long)]
        top_n: Option<usize>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Detect stimulation/calibration frames on a kymograph CSV
    DetectEvents {
        /// Kymograph CSV, one cell per row
        input: PathBuf,

        /// Detection sensitivity (multiples of the difference stddev)
        #[arg(long, default_value = "1.0")]
        sensitivity: f64,
    },

    /// Dump per-tile stage positions from mosaic metadata
    StagePositions {
        /// Mosaic metadata file (.json sidecar or textual header)
        metadata: PathBuf,

        /// Tile image width in pixels
        #[arg(long)]
        image_width: usize,

        /// Tile image height in pixels
        #[arg(long)]
        image_height: usize,

        /// Output file, one x<TAB>y pair per line
        #[arg(short, long)]
        output: PathBuf,
    },
}

const LABELMAP_RETRY_BACKOFF: Duration = Duration::from_millis(500);

fn read_layout_spec(path: &Path) -> Result<LayoutSpec> {
    let spec = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        LayoutSpec::read_json(path)?
    } else {
        LayoutSpec::read_text(path)?
    };
    Ok(spec)
}

/// Tile subdirectories of the run directory, ascending by tile index.
fn tile_dirs(input: &Path) -> Result<Vec<(usize, PathBuf)>> {
    let mut tiles = Vec::new();
    for entry in std::fs::read_dir(input)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if let Some(suffix) = name.to_string_lossy().strip_prefix("tile_") {
            if let Ok(index) = suffix.parse::<usize>() {
                tiles.push((index, entry.path()));
            }
        }
    }
    tiles.sort_by_key(|&(index, _)| index);
    if tiles.is_empty() {
        return Err(CliError::Input(format!(
            "no tile_NNN directories under {}",
            input.display()
        )));
    }
    Ok(tiles)
}

/// Frame files `<prefix>*.csv` of one tile, in name order.
fn frame_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(prefix) && name.ends_with(".csv") {
            files.push(entry.path());
        }
    }
    files.sort();
    if files.is_empty() {
        return Err(CliError::Input(format!(
            "no {prefix}*.csv files in {}",
            dir.display()
        )));
    }
    Ok(files)
}

/// Mean of a frame over each labelled cell, in label order.
fn per_cell_mean(frame: &[f64], labelmap: &LabelMap) -> Vec<f64> {
    let nr_cells = labelmap.nr_cells();
    let mut sum = vec![0.0f64; nr_cells];
    let mut count = vec![0usize; nr_cells];
    for (&value, &label) in frame.iter().zip(labelmap.data()) {
        if label > 0 {
            sum[label as usize - 1] += value;
            count[label as usize - 1] += 1;
        }
    }
    sum.iter()
        .zip(&count)
        .map(|(&s, &c)| if c == 0 { 0.0 } else { s / c as f64 })
        .collect()
}

fn load_config(
    settings: Option<&Path>,
    sensitivity: Option<f64>,
    random_hits: Option<usize>,
    seed: Option<u64>,
    chunk_size: Option<usize>,
    top_n: Option<usize>,
) -> Result<ScreenConfig> {
    let mut config = match settings {
        Some(path) => SettingsFile::read_json(path)?.into_config()?,
        None => ScreenConfig::default(),
    };
    if let Some(sensitivity) = sensitivity {
        config.sensitivity = sensitivity;
    }
    if let Some(n) = random_hits {
        config.random_hits = Some(n);
    }
    if let Some(seed) = seed {
        config.random_seed = Some(seed);
    }
    if let Some(size) = chunk_size {
        config.chunk_size = size;
    }
    if let Some(n) = top_n {
        config.top_n = n;
    }
    config.validate()?;
    Ok(config)
}

/// Loads one tile's stacks and runs the full per-tile analysis.
fn analyze_tile_dir(
    dir: &Path,
    labelmap: &LabelMap,
    tile: usize,
    layout: &TileLayout,
    config: &ScreenConfig,
    log: &mut RunLog,
) -> Result<flimscreen_algorithms::TileAnalysis> {
    let intensity = read_stack_csv(&frame_files(dir, "intensity_")?)?;
    let lifetime = read_stack_csv(&frame_files(dir, "lifetime_")?)?;
    let secondary_path = dir.join("secondary.csv");
    let secondary = if secondary_path.exists() {
        let (_, _, frame) = read_frame_csv(&secondary_path)?;
        Some(per_cell_mean(&frame, labelmap))
    } else {
        None
    };
    let analysis = analyze_tile(
        &intensity,
        &lifetime,
        labelmap,
        secondary.as_deref(),
        tile,
        layout,
        config,
        log,
    )?;
    Ok(analysis)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            metadata,
            settings,
            output,
            base_name,
            sensitivity,
            random_hits,
            seed,
            chunk_size,
            top_n,
            verbose,
        } => {
            // Analysis pipeline:
            // 1. Load and validate settings, metadata, and tile list
            // 2. Per tile: labelmap (with retry), stacks, trace extraction,
            //    event detection, ranking, classification
            // 3. Publish the merged hit list, region files, and stage dump

            let config = load_config(
                settings.as_deref(),
                sensitivity,
                random_hits,
                seed,
                chunk_size,
                top_n,
            )?;
            let spec = read_layout_spec(&metadata)?;
            let tiles = tile_dirs(&input)?;

            if verbose {
                eprintln!("Analyzing {} tile(s) from {}", tiles.len(), input.display());
                eprintln!("Sensitivity: {}", config.sensitivity);
                eprintln!("Criteria: {}", config.criteria.len());
                if let Some(n) = config.random_hits {
                    eprintln!("Random-hit mode: {} per tile", n);
                }
            }

            std::fs::create_dir_all(&output)?;

            let start = Instant::now();
            let mut log = RunLog::new();
            let mut table = HitTable::new();
            let mut layout: Option<TileLayout> = None;
            let mut tiles_analyzed = 0usize;
            let mut total_cells = 0usize;

            for &(tile, ref dir) in &tiles {
                if verbose {
                    eprintln!("Tile {}: {}", tile, dir.display());
                }

                let labelmap = match read_labelmap_with_retry(
                    &dir.join("labelmap.csv"),
                    tile,
                    LABELMAP_RETRY_BACKOFF,
                    &mut log,
                ) {
                    Ok(map) => map,
                    Err(err) => {
                        log.push(Warning::TileSkipped {
                            tile,
                            reason: err.to_string(),
                        });
                        continue;
                    }
                };

                if layout.is_none() {
                    layout = Some(
                        spec.clone()
                            .into_layout(labelmap.width(), labelmap.height())?,
                    );
                }
                let Some(layout) = layout.as_ref() else {
                    continue;
                };

                let analysis = match analyze_tile_dir(dir, &labelmap, tile, layout, &config, &mut log)
                {
                    Ok(analysis) => analysis,
                    Err(err) => {
                        log.push(Warning::TileSkipped {
                            tile,
                            reason: err.to_string(),
                        });
                        continue;
                    }
                };

                let kymo_path = output.join(format!("{base_name}_tile{tile:03}_kymograph.csv"));
                write_kymograph_csv(&kymo_path, &analysis.kymograph_sorted)?;

                if verbose {
                    eprintln!("  {} cells traced", analysis.kymograph.nr_cells());
                    match analysis.phases {
                        FramePhases::BaselineOnly => eprintln!("  baseline only"),
                        FramePhases::Detected {
                            stimulation,
                            calibration,
                        } => {
                            eprintln!("  stimulation frame: {}", stimulation);
                            match calibration {
                                Some(frame) => eprintln!("  calibration frame: {}", frame),
                                None => eprintln!("  no calibration detected"),
                            }
                        }
                    }
                    eprintln!("  {} hits", analysis.hits.len());
                }

                total_cells += analysis.kymograph.nr_cells();
                table.extend(analysis.hits);
                tiles_analyzed += 1;
            }

            let layout = layout.ok_or_else(|| {
                CliError::Input("every tile failed to load, nothing to publish".to_string())
            })?;

            let summary = HitListPublisher::new(&config).publish(
                &mut table,
                &config.criteria,
                &output,
                &base_name,
            )?;
            let stage_path = output.join(format!("{base_name}_stage_positions.txt"));
            write_stage_positions(&stage_path, &layout)?;

            for warning in log.warnings() {
                eprintln!("warning: {}", warning);
            }

            let elapsed = start.elapsed();
            println!(
                "Analyzed {} of {} tiles in {:.2}s",
                tiles_analyzed,
                tiles.len(),
                elapsed.as_secs_f64()
            );
            println!("Total cells: {}", total_cells);
            println!("Total hits: {}", summary.total_hits);
            println!(
                "Wrote {} files ({} region chunks) to {}",
                summary.files.len() + 1,
                summary.nr_chunks,
                output.display()
            );
        }

        Commands::DetectEvents { input, sensitivity } => {
            let (nr_frames, nr_cells, data) = read_frame_csv(&input)?;
            let kymograph = Kymograph::from_vec(nr_cells, nr_frames, data)?;

            println!("File: {}", input.display());
            println!("Cells: {}", nr_cells);
            println!("Frames: {}", nr_frames);

            let mut log = RunLog::new();
            let detector = EventDetector::new(sensitivity);
            let phases = detector.detect(&kymograph.population_trace(), &mut log);

            match phases {
                FramePhases::BaselineOnly => println!("Baseline only: no stimulation detected"),
                FramePhases::Detected {
                    stimulation,
                    calibration,
                } => {
                    println!("Stimulation frame: {}", stimulation);
                    match calibration {
                        Some(frame) => println!("Calibration frame: {}", frame),
                        None => println!("Calibration frame: none"),
                    }
                }
            }
            for warning in log.warnings() {
                eprintln!("warning: {}", warning);
            }
        }

        Commands::StagePositions {
            metadata,
            image_width,
            image_height,
            output,
        } => {
            let spec = read_layout_spec(&metadata)?;
            let layout = spec.into_layout(image_width, image_height)?;
            write_stage_positions(&output, &layout)?;
            println!(
                "Wrote {} stage positions to {}",
                layout.nr_tiles(),
                output.display()
            );
        }
    }

    Ok(())
}
