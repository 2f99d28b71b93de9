use crate::batch::{BatchObserver, run_batch};
use crate::config::RunConfig;
use crate::discovery::{DiscoveryRule, discover_model_files, resolve_root};
use crate::domain::XsectResult;
use crate::export::export_results;
use crate::report::BatchReport;
use crate::reshape::to_long_table;
use crate::session::{ModelController, ResultReader};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct ExtractionRun {
    pub output_path: PathBuf,
    pub report: BatchReport,
}

/// Discovers, extracts, reshapes and exports every model below `root`.
///
/// Root and pattern problems fail before any session command is sent. Per
/// model failures only show up in the returned report.
pub fn run_extraction<C, R>(
    root: &Path,
    config: &RunConfig,
    controller: &mut C,
    reader: &mut R,
    observer: BatchObserver<'_>,
) -> XsectResult<ExtractionRun>
where
    C: ModelController + ?Sized,
    R: ResultReader + ?Sized,
{
    let root = resolve_root(root)?;
    let rule = DiscoveryRule::new(&config.include_patterns, &config.exclude_patterns)?;
    let models = discover_model_files(&root, rule)?;

    let outcome = run_batch(controller, reader, models, &config.cross_section, observer);
    let table = to_long_table(&outcome.rows);

    let output_path = config.output_path(&root);
    export_results(&output_path, &table)?;
    info!(
        output = %output_path.display(),
        rows = table.len(),
        "results exported"
    );

    let mut report = outcome.report;
    report.finish(&root, &output_path);
    Ok(ExtractionRun {
        output_path,
        report,
    })
}
