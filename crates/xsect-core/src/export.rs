//! CSV export of the long result table.

use crate::domain::{ResultKind, ResultRow, XsectError};
use serde::Serialize;
use std::borrow::Cow;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const MODEL_COLUMN: &str = "model";
const STAGE_COLUMN: &str = "stage";

/// Header row: the two tag columns followed by the ten result columns.
pub fn header() -> [&'static str; 12] {
    let mut header = [""; 12];
    header[0] = MODEL_COLUMN;
    header[1] = STAGE_COLUMN;
    for kind in ResultKind::ALL {
        header[kind.index() + 2] = kind.column_name();
    }
    header
}

#[derive(Serialize)]
struct CsvRecord<'a> {
    model: Cow<'a, str>,
    stage: &'a str,
    x: f64,
    y: f64,
    utot: f64,
    ux: f64,
    uy: f64,
    sigxxe: f64,
    sigyye: f64,
    eff_normal_stress: f64,
    tot_normal_stress: f64,
    tot_shear_stress: f64,
}

impl<'a> From<&'a ResultRow> for CsvRecord<'a> {
    fn from(row: &'a ResultRow) -> Self {
        let sample = &row.sample;
        Self {
            model: row.model.to_string_lossy(),
            stage: &row.stage,
            x: sample.x,
            y: sample.y,
            utot: sample.utot,
            ux: sample.ux,
            uy: sample.uy,
            sigxxe: sample.sigxxe,
            sigyye: sample.sigyye,
            eff_normal_stress: sample.eff_normal_stress,
            tot_normal_stress: sample.tot_normal_stress,
            tot_shear_stress: sample.tot_shear_stress,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to create '{}': {source}", .path.display())]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write '{}': {source}", .path.display())]
    Write { path: PathBuf, source: csv::Error },
    #[error("failed to flush '{}': {source}", .path.display())]
    Flush {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<ExportError> for XsectError {
    fn from(error: ExportError) -> Self {
        XsectError::io_system("IO.EXPORT", error.to_string())
    }
}

/// Writes the header and one record per row to `writer`.
pub fn write_csv<W: Write>(writer: W, rows: &[ResultRow]) -> csv::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(header())?;
    for row in rows {
        writer.serialize(CsvRecord::from(row))?;
    }
    writer.flush()?;
    Ok(())
}

/// Creates or truncates `path` and writes the table into it.
pub fn export_results(path: &Path, rows: &[ResultRow]) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|source| ExportError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    write_csv(&file, rows).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    file.sync_all().map_err(|source| ExportError::Flush {
        path: path.to_path_buf(),
        source,
    })
}
