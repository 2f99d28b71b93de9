use crate::domain::XsectError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub generated_at_unix_seconds: u64,
    pub root: String,
    pub output_path: Option<String>,
    pub file_count: usize,
    pub succeeded_file_count: usize,
    pub failed_file_count: usize,
    pub phase_count: usize,
    pub row_count: usize,
    pub files: Vec<FileReport>,
    /// Sub-directories the walk could not read; not counted as model files.
    pub walk_errors: Vec<WalkErrorReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub path: String,
    pub succeeded: bool,
    pub phase_count: usize,
    pub row_count: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkErrorReport {
    pub path: String,
    pub error: String,
}

impl FileReport {
    pub fn succeeded(path: &Path, phase_count: usize, row_count: usize) -> Self {
        Self {
            path: normalize_path(path),
            succeeded: true,
            phase_count,
            row_count,
            error: None,
        }
    }

    pub fn failed(path: &Path, error: impl Into<String>) -> Self {
        Self {
            path: normalize_path(path),
            succeeded: false,
            phase_count: 0,
            row_count: 0,
            error: Some(error.into()),
        }
    }
}

impl BatchReport {
    pub fn record(&mut self, file: FileReport) {
        self.file_count += 1;
        if file.succeeded {
            self.succeeded_file_count += 1;
        } else {
            self.failed_file_count += 1;
        }
        self.phase_count += file.phase_count;
        self.row_count += file.row_count;
        self.files.push(file);
    }

    pub fn record_walk_error(&mut self, path: &Path, error: impl Into<String>) {
        self.walk_errors.push(WalkErrorReport {
            path: normalize_path(path),
            error: error.into(),
        });
    }

    /// Stamps the run context once the batch has been exported.
    pub fn finish(&mut self, root: &Path, output_path: &Path) {
        self.generated_at_unix_seconds = current_unix_timestamp_seconds();
        self.root = normalize_path(root);
        self.output_path = Some(normalize_path(output_path));
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|file| !file.succeeded)
    }
}

pub fn render_human_summary(report: &BatchReport) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Model files: {} total ({} extracted, {} failed)",
        report.file_count, report.succeeded_file_count, report.failed_file_count
    ));
    lines.push(format!(
        "Phases: {}, rows: {}",
        report.phase_count, report.row_count
    ));

    for failure in report.failures() {
        let reason = failure
            .error
            .as_deref()
            .unwrap_or("extraction failed without a reason");
        lines.push(format!("  failed: {} ({})", failure.path, reason));
    }

    if !report.walk_errors.is_empty() {
        lines.push(format!("Unreadable directories: {}", report.walk_errors.len()));
        for walk_error in &report.walk_errors {
            lines.push(format!("  skipped: {} ({})", walk_error.path, walk_error.error));
        }
    }

    lines.join("\n")
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to create report directory '{}': {source}", .path.display())]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize report '{}': {source}", .path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write report '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<ReportError> for XsectError {
    fn from(error: ReportError) -> Self {
        XsectError::io_system("IO.REPORT", error.to_string())
    }
}

pub fn write_report_file(report_path: &Path, report: &BatchReport) -> Result<(), ReportError> {
    if let Some(parent_dir) = report_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        fs::create_dir_all(parent_dir).map_err(|source| ReportError::Directory {
            path: parent_dir.to_path_buf(),
            source,
        })?;
    }

    let report_json =
        serde_json::to_string_pretty(report).map_err(|source| ReportError::Serialize {
            path: report_path.to_path_buf(),
            source,
        })?;
    fs::write(report_path, report_json).map_err(|source| ReportError::Write {
        path: report_path.to_path_buf(),
        source,
    })
}

fn current_unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
