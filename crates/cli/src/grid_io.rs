// Grid CSV reading/writing and the provenance sidecar.
//
// Row 0 of the CSV is the header row. Rows may be ragged; the engine pads.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use gridassist_core::Grid;
use gridassist_engine::Document;

use crate::CliError;

pub fn read_grid(path: &Path) -> Result<Grid, CliError> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("{}: {}", path.display(), e)))?;
    parse_grid(&content).map_err(|e| CliError { message: format!("{}: {}", path.display(), e.message), ..e })
}

pub fn parse_grid(content: &str) -> Result<Grid, CliError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut grid = Grid::new();
    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(|e| CliError::parse(format!("row {}: {}", i + 1, e)))?;
        grid.push(record.iter().map(|s| s.to_string()).collect());
    }

    match grid.first() {
        None => Err(CliError::parse("grid is empty")
            .with_hint("the first CSV row must hold the column headers")),
        Some(header) if header.iter().all(|h| h.trim().is_empty()) => {
            Err(CliError::parse("header row is blank"))
        }
        Some(_) => Ok(grid),
    }
}

pub fn grid_to_csv(grid: &Grid) -> Result<Vec<u8>, CliError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    for row in grid {
        writer.write_record(row).map_err(|e| CliError::io(e.to_string()))?;
    }

    writer.into_inner().map_err(|e| CliError::io(e.to_string()))
}

/// Write the grid to `out`, or stdout when `out` is `None`.
pub fn write_grid(grid: &Grid, out: Option<&Path>) -> Result<(), CliError> {
    let bytes = grid_to_csv(grid)?;
    match out {
        Some(path) => fs::write(path, bytes)
            .map_err(|e| CliError::io(format!("{}: {}", path.display(), e))),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&bytes).map_err(|e| CliError::io(e.to_string()))?;
            stdout.flush().map_err(|e| CliError::io(e.to_string()))
        }
    }
}

/// `<out>.provenance.json` next to a written grid.
pub fn sidecar_path(out: &Path) -> PathBuf {
    let mut name = out.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".provenance.json");
    out.with_file_name(name)
}

pub fn write_provenance(doc: &Document, path: &Path) -> Result<(), CliError> {
    let export = doc.export_provenance();
    let json = serde_json::to_string_pretty(&export)
        .map_err(|e| CliError::io(e.to_string()))?;
    fs::write(path, json).map_err(|e| CliError::io(format!("{}: {}", path.display(), e)))?;
    log::info!("wrote provenance for {} cells to {}", export.cells.len(), path.display());
    Ok(())
}
