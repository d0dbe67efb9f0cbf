//! CSV matrix readers and writers for labelmaps, stacks, and kymographs.

use crate::error::{Error, Result};
use flimscreen_core::kymograph::Kymograph;
use flimscreen_core::labelmap::LabelMap;
use flimscreen_core::stack::FrameStack;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

fn read_rows<T, F>(path: &Path, parse: F) -> Result<(usize, usize, Vec<T>)>
where
    F: Fn(&str) -> Option<T>,
{
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut width = 0usize;
    let mut height = 0usize;
    let mut data = Vec::new();

    for (line_nr, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut row_len = 0usize;
        for field in trimmed.split(',') {
            let value = parse(field.trim()).ok_or_else(|| {
                Error::parse(path, format!("bad value '{}' on line {}", field, line_nr + 1))
            })?;
            data.push(value);
            row_len += 1;
        }
        if height == 0 {
            width = row_len;
        } else if row_len != width {
            return Err(Error::parse(
                path,
                format!("row {} has {} columns, expected {}", line_nr + 1, row_len, width),
            ));
        }
        height += 1;
    }
    Ok((width, height, data))
}

/// Reads a labelmap from a CSV grid of integer labels.
pub fn read_labelmap_csv(path: &Path) -> Result<LabelMap> {
    let (width, height, data) = read_rows(path, |s| s.parse::<u32>().ok())?;
    Ok(LabelMap::new(width, height, data)?)
}

/// Reads one 2-D frame from a CSV grid of floats.
pub fn read_frame_csv(path: &Path) -> Result<(usize, usize, Vec<f64>)> {
    read_rows(path, |s| s.parse::<f64>().ok())
}

/// Reads a stack from one CSV file per frame, in frame order.
pub fn read_stack_csv(paths: &[impl AsRef<Path>]) -> Result<FrameStack> {
    let mut frames = Vec::with_capacity(paths.len());
    let mut shape = None;
    for path in paths {
        let (width, height, data) = read_frame_csv(path.as_ref())?;
        match shape {
            None => shape = Some((width, height)),
            Some(expected) if expected != (width, height) => {
                return Err(Error::parse(
                    path.as_ref(),
                    format!(
                        "frame shape {}x{} differs from first frame {}x{}",
                        height, width, expected.1, expected.0
                    ),
                ));
            }
            _ => {}
        }
        frames.push(data);
    }
    let (width, height) = shape.ok_or(flimscreen_core::Error::EmptyInput("stack file list"))?;
    Ok(FrameStack::from_frames(width, height, frames)?)
}

/// Writes a kymograph as a CSV matrix, one cell per row.
pub fn write_kymograph_csv(path: &Path, kymograph: &Kymograph) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for i in 0..kymograph.nr_cells() {
        let row: Vec<String> = kymograph.row(i).iter().map(|v| v.to_string()).collect();
        writeln!(writer, "{}", row.join(","))?;
    }
    writer.flush()?;
    Ok(())
}
