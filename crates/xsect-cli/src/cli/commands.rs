use super::CliError;
use super::helpers::*;
use std::path::PathBuf;
use std::time::Duration;
use xsect_core::batch::BatchEvent;
use xsect_core::discovery::resolve_root;
use xsect_core::domain::XsectError;
use xsect_core::launcher::ApplicationProcess;
use xsect_core::pipeline::run_extraction;
use xsect_core::report::{render_human_summary, write_report_file};
use xsect_core::session::connect;

#[derive(clap::Args)]
pub(super) struct ExtractArgs {
    /// Directory searched recursively for .p2dx models
    #[arg(value_name = "ROOT")]
    root: PathBuf,

    /// JSON run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Application executable (overrides the environment and config)
    #[arg(long)]
    executable: Option<PathBuf>,

    /// Scripting server host
    #[arg(long)]
    host: Option<String>,

    /// Input server port; the output server uses the next port
    #[arg(long)]
    port: Option<u16>,

    /// Scripting server password
    #[arg(long)]
    password: Option<String>,

    /// Attach to an application that is already running
    #[arg(long)]
    no_launch: bool,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short)]
    pub(super) verbose: bool,
}

impl ExtractArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            password: self.password.clone(),
        }
    }
}

pub(super) fn run_extract_command(args: ExtractArgs) -> Result<i32, CliError> {
    let config = load_run_config(args.config.as_deref(), args.overrides())?;
    let root = resolve_root(&args.root).map_err(XsectError::from)?;

    let mut application = if args.no_launch {
        None
    } else {
        let executable = resolve_application_executable(args.executable.as_deref(), &config)?;
        let process = ApplicationProcess::spawn(&executable, config.port, &config.password)
            .map_err(XsectError::from)?;
        wait_for_startup(config.startup_delay_seconds);
        Some(process)
    };

    // An attached application is expected to be up already.
    let ready_timeout = if args.no_launch {
        Duration::ZERO
    } else {
        config.connect_timeout()
    };
    let (mut controller, mut reader) =
        connect(&config.controller_endpoint(), ready_timeout).map_err(XsectError::from)?;
    let mut observe = |event: BatchEvent<'_>| print_progress(event);
    let result = run_extraction(
        &root,
        &config,
        &mut controller,
        &mut reader,
        Some(&mut observe),
    );

    if let Some(process) = application.as_mut() {
        process.terminate();
    }
    let run = result?;

    print_run_summary(&render_human_summary(&run.report))?;
    if let Some(report_path) = &args.report {
        write_report_file(report_path, &run.report).map_err(XsectError::from)?;
        print_line(&format!("JSON report: {}", report_path.display()))?;
    }
    print_line(&format!("Results saved to: {}", run.output_path.display()))?;

    Ok(0)
}
