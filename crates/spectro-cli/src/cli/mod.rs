mod commands;
mod helpers;

use clap::{ArgAction, Parser};
use spectro_core::domain::SpectroError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub fn run_from_env() -> i32 {
    let args = std::iter::once("spectro".to_string())
        .chain(std::env::args().skip(1))
        .collect::<Vec<_>>();

    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let spectro_error = error.as_spectro_error();
            eprintln!("{}", spectro_error.diagnostic_line());
            if let Some(summary_line) = spectro_error.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            spectro_error.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            init_tracing(cli.verbose);
            let context = helpers::resolve_context(cli.config.as_deref(), cli.store.as_deref())?;
            dispatch_parsed(&context, cli.command)
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

fn init_tracing(verbosity: u8) {
    let default_directive = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "spectro",
    version,
    about = "Absorbance export ingestion and clean-data analysis"
)]
struct Cli {
    /// Configuration file (defaults to the nearest spectro.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Catalog file of the measurement store
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,
    /// Raise log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Ingest one instrument export
    Ingest(commands::IngestArgs),
    /// Ingest every matching export of a directory, one transaction per file
    IngestDir(commands::IngestDirArgs),
    /// List uploads, newest first
    Uploads(commands::UploadsArgs),
    /// List samples
    Samples(commands::SamplesArgs),
    /// List processing configs of a sample
    Configs(commands::SampleIdArgs),
    /// Page through the raw measurements of a processing config
    Measurements(commands::MeasurementsArgs),
    /// Delete a sample with its configs, measurements and queries
    DeleteSample(commands::SampleIdArgs),
    /// Delete an upload and everything ingested from it
    DeleteUpload(commands::UploadIdArgs),
    /// Change the wavelength window of a processing config
    SetRange(commands::SetRangeArgs),
    /// Print or write the clean-data curve of a processing config
    Clean(commands::CleanArgs),
    /// Manage local maximum queries
    #[command(subcommand)]
    Maxima(commands::MaximaCommand),
    /// Export the clean-data curve as an xlsx workbook
    Export(commands::ExportArgs),
}

fn dispatch_parsed(context: &helpers::CliContext, command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Ingest(args) => commands::run_ingest_command(context, args),
        CliCommand::IngestDir(args) => commands::run_ingest_dir_command(context, args),
        CliCommand::Uploads(args) => commands::run_uploads_command(context, args),
        CliCommand::Samples(args) => commands::run_samples_command(context, args),
        CliCommand::Configs(args) => commands::run_configs_command(context, args),
        CliCommand::Measurements(args) => commands::run_measurements_command(context, args),
        CliCommand::DeleteSample(args) => commands::run_delete_sample_command(context, args),
        CliCommand::DeleteUpload(args) => commands::run_delete_upload_command(context, args),
        CliCommand::SetRange(args) => commands::run_set_range_command(context, args),
        CliCommand::Clean(args) => commands::run_clean_command(context, args),
        CliCommand::Maxima(command) => commands::run_maxima_command(context, command),
        CliCommand::Export(args) => commands::run_export_command(context, args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Spectro(#[from] SpectroError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_spectro_error(&self) -> SpectroError {
        match self {
            Self::Usage(message) => {
                SpectroError::input_validation("INPUT.CLI_USAGE", message.trim_end().to_string())
            }
            Self::Spectro(error) => error.clone(),
            Self::Internal(error) => SpectroError::internal("RUN.CLI", format!("{error:#}")),
        }
    }
}
