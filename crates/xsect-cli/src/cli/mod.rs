mod commands;
mod helpers;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use xsect_core::domain::XsectError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().collect();

    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let run_error = error.as_xsect_error();
            eprintln!("{}", run_error.diagnostic_line());
            run_error.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            init_logging(cli.extract.verbose);
            commands::run_extract_command(cli.extract)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "plaxis-xsect",
    version,
    about = "Extract soil cross-section results from every PLAXIS 2D model below a directory"
)]
struct Cli {
    #[command(flatten)]
    extract: commands::ExtractArgs,
}

/// Logs go to stderr so stdout carries only progress and the result path.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Run(XsectError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<XsectError> for CliError {
    fn from(error: XsectError) -> Self {
        Self::Run(error)
    }
}

impl CliError {
    fn as_xsect_error(&self) -> XsectError {
        match self {
            Self::Usage(message) => {
                XsectError::input_validation("INPUT.CLI_USAGE", message.trim_end().to_string())
            }
            Self::Run(error) => error.clone(),
            Self::Internal(error) => XsectError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
