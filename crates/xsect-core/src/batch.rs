//! Sequential batch over model files with per-file fault isolation.

use crate::discovery::DiscoveryError;
use crate::domain::{CrossSectionLine, ExtractionRow};
use crate::extract::{ExtractionError, extract_phases, prepare_model};
use crate::report::{BatchReport, FileReport};
use crate::session::{ModelController, ResultReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Progress notifications emitted while the batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent<'a> {
    Started { model: &'a Path },
    Extracted { model: &'a Path, phases: usize, rows: usize },
    Failed { model: &'a Path, message: &'a str },
    SkippedDirectory { path: &'a Path, message: &'a str },
}

pub type BatchObserver<'a> = Option<&'a mut dyn FnMut(BatchEvent<'_>)>;

pub struct BatchOutcome {
    pub rows: Vec<ExtractionRow>,
    pub report: BatchReport,
}

/// Full session sequence for one model file.
///
/// Either every phase of the model is returned or nothing is.
pub fn extract_model_file<C, R>(
    controller: &mut C,
    reader: &mut R,
    model: &Path,
    line: &CrossSectionLine,
) -> Result<Vec<ExtractionRow>, ExtractionError>
where
    C: ModelController + ?Sized,
    R: ResultReader + ?Sized,
{
    let cross_section = prepare_model(controller, reader, model, line)?;
    extract_phases(reader, model, &cross_section)
}

/// Runs every discovered model through the sessions, one at a time.
///
/// A model that fails at any step is logged, recorded in the report and
/// contributes no rows; the batch continues with the next model. Walk errors
/// (unreadable sub-directories) are logged and recorded apart from the models.
pub fn run_batch<C, R, I>(
    controller: &mut C,
    reader: &mut R,
    models: I,
    line: &CrossSectionLine,
    mut observer: BatchObserver<'_>,
) -> BatchOutcome
where
    C: ModelController + ?Sized,
    R: ResultReader + ?Sized,
    I: IntoIterator<Item = Result<PathBuf, DiscoveryError>>,
{
    let mut rows = Vec::new();
    let mut report = BatchReport::default();

    for candidate in models {
        let model = match candidate {
            Ok(model) => model,
            Err(error) => {
                let path = error.path().map(Path::to_path_buf).unwrap_or_default();
                let message = error.to_string();
                warn!(path = %path.display(), error = %message, "skipping unreadable directory");
                if let Some(observer) = observer.as_mut() {
                    observer(BatchEvent::SkippedDirectory {
                        path: &path,
                        message: &message,
                    });
                }
                report.record_walk_error(&path, message);
                continue;
            }
        };

        info!(model = %model.display(), "processing model file");
        if let Some(observer) = observer.as_mut() {
            observer(BatchEvent::Started { model: &model });
        }

        match extract_model_file(controller, reader, &model, line) {
            Ok(extracted) => {
                let phase_count = extracted.len();
                let row_count = extracted.iter().map(ExtractionRow::len).sum::<usize>();
                info!(
                    model = %model.display(),
                    phases = phase_count,
                    rows = row_count,
                    "model extracted"
                );
                if let Some(observer) = observer.as_mut() {
                    observer(BatchEvent::Extracted {
                        model: &model,
                        phases: phase_count,
                        rows: row_count,
                    });
                }
                report.record(FileReport::succeeded(&model, phase_count, row_count));
                rows.extend(extracted);
            }
            Err(error) => {
                let message = error.to_string();
                warn!(model = %model.display(), error = %message, "model failed, skipping");
                if let Some(observer) = observer.as_mut() {
                    observer(BatchEvent::Failed {
                        model: &model,
                        message: &message,
                    });
                }
                report.record(FileReport::failed(&model, message));
            }
        }
    }

    info!(
        files = report.file_count,
        failed = report.failed_file_count,
        unreadable_directories = report.walk_errors.len(),
        rows = report.row_count,
        "batch finished"
    );
    BatchOutcome { rows, report }
}
