use super::CliError;
use super::helpers::{CliContext, build_matcher, matching_files, wave_range};
use anyhow::Context;
use spectro_core::domain::{
    AggregatedPoint, ConfigId, ProcessMethod, QueryId, SampleId, SpectroError, UploadId,
    WaveRange,
};
use spectro_core::export::{
    format_fixed_f64, render_clean_data_text, render_measurement_rows, write_text_artifact,
};
use spectro_core::extremum::LocalMaximumReport;
use spectro_core::ingest::{IngestRequest, ingest_file};
use spectro_core::service::{
    MEASUREMENTS_PER_PAGE, export_clean_data_as_spreadsheet, get_clean_data, get_local_maximum,
    local_maxima_for_config, measurement_page,
};
use spectro_core::store::DeletionSummary;
use std::path::{Path, PathBuf};

#[derive(clap::Args)]
pub(super) struct ProcessingFlags {
    /// Text encoding label of the export (defaults to the configured encoding)
    #[arg(long)]
    encoding: Option<String>,

    /// Processing method applied after upload
    #[arg(long)]
    method: Option<ProcessMethod>,

    /// Lower bound of the initial processing window (nm)
    #[arg(long, allow_negative_numbers = true)]
    wave_start: Option<f64>,

    /// Upper bound of the initial processing window (nm)
    #[arg(long, allow_negative_numbers = true)]
    wave_end: Option<f64>,
}

impl ProcessingFlags {
    fn request_for(
        &self,
        context: &CliContext,
        source: PathBuf,
    ) -> Result<IngestRequest, CliError> {
        Ok(IngestRequest::new(source)
            .with_encoding(context.encoding(self.encoding.as_deref())?)
            .with_method(self.method.unwrap_or_default())
            .with_range(context.ingest_range(self.wave_start, self.wave_end)?))
    }
}

#[derive(clap::Args)]
pub(super) struct IngestArgs {
    /// Instrument export to ingest
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Sample name (defaults to the file stem)
    #[arg(long)]
    name: Option<String>,

    #[command(flatten)]
    processing: ProcessingFlags,
}

#[derive(clap::Args)]
pub(super) struct IngestDirArgs {
    /// Directory holding instrument exports
    #[arg(value_name = "DIR")]
    dir: PathBuf,

    /// File name pattern of exports to ingest
    #[arg(long, default_value = "*.txt")]
    pattern: String,

    #[command(flatten)]
    processing: ProcessingFlags,
}

#[derive(clap::Args)]
pub(super) struct UploadsArgs {
    /// Only uploads whose original file name contains this text
    #[arg(long)]
    search: Option<String>,

    /// Only uploads processed with this method
    #[arg(long)]
    method: Option<ProcessMethod>,
}

#[derive(clap::Args)]
pub(super) struct SamplesArgs {
    /// Only samples whose name or upload file name contains this text
    #[arg(long)]
    search: Option<String>,
}

#[derive(clap::Args)]
pub(super) struct MeasurementsArgs {
    #[arg(value_name = "CONFIG_ID")]
    config_id: ConfigId,

    /// Page of 100 rows to show, starting at 1
    #[arg(long, default_value_t = 1)]
    page: usize,
}

#[derive(clap::Args)]
pub(super) struct SampleIdArgs {
    #[arg(value_name = "SAMPLE_ID")]
    sample_id: SampleId,
}

#[derive(clap::Args)]
pub(super) struct UploadIdArgs {
    #[arg(value_name = "UPLOAD_ID")]
    upload_id: UploadId,
}

#[derive(clap::Args)]
pub(super) struct RangeArgs {
    /// Lower bound (nm, inclusive)
    #[arg(long, allow_negative_numbers = true)]
    wave_start: f64,

    /// Upper bound (nm, exclusive)
    #[arg(long, allow_negative_numbers = true)]
    wave_end: f64,
}

impl RangeArgs {
    fn to_range(&self) -> Result<WaveRange, CliError> {
        wave_range(self.wave_start, self.wave_end)
    }
}

#[derive(clap::Args)]
pub(super) struct SetRangeArgs {
    #[arg(value_name = "CONFIG_ID")]
    config_id: ConfigId,

    #[command(flatten)]
    range: RangeArgs,
}

#[derive(clap::Args)]
pub(super) struct CleanArgs {
    #[arg(value_name = "CONFIG_ID")]
    config_id: ConfigId,

    /// Write the table to this file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct ExportArgs {
    #[arg(value_name = "CONFIG_ID")]
    config_id: ConfigId,

    /// Directory receiving data_id-<id>.xlsx
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

#[derive(clap::Subcommand)]
pub(super) enum MaximaCommand {
    /// Add a local maximum query to a processing config
    Add {
        #[arg(value_name = "CONFIG_ID")]
        config_id: ConfigId,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// List the queries of a processing config with their maxima
    List {
        #[arg(value_name = "CONFIG_ID")]
        config_id: ConfigId,
    },
    /// Compute the maximum of one query
    Show {
        #[arg(value_name = "QUERY_ID")]
        query_id: QueryId,
    },
    /// Change the range of a query
    Update {
        #[arg(value_name = "QUERY_ID")]
        query_id: QueryId,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Remove a query
    Remove {
        #[arg(value_name = "QUERY_ID")]
        query_id: QueryId,
    },
}

pub(super) fn run_ingest_command(context: &CliContext, args: IngestArgs) -> Result<i32, CliError> {
    let mut store = context.open_store()?;
    let source = context.resolve(&args.file);
    let mut request = args.processing.request_for(context, source)?;
    if let Some(name) = args.name {
        request = request.with_sample_name(name);
    }

    let report = ingest_file(&mut store, &request)?;
    println!(
        "Ingested '{}': upload {}, sample {}, config {} ({} measurements)",
        args.file.display(),
        report.upload_id,
        report.sample_id,
        report.config_id,
        report.measurement_count
    );
    Ok(0)
}

pub(super) fn run_ingest_dir_command(
    context: &CliContext,
    args: IngestDirArgs,
) -> Result<i32, CliError> {
    let matcher = build_matcher(&args.pattern)?;
    let directory = context.resolve(&args.dir);
    let files = matching_files(&directory, &matcher)?;
    if files.is_empty() {
        println!(
            "No files matching '{}' in '{}'",
            args.pattern,
            directory.display()
        );
        return Ok(0);
    }

    let mut store = context.open_store()?;
    let mut first_failure: Option<SpectroError> = None;
    let mut ingested = 0_usize;
    for file in &files {
        let request = args.processing.request_for(context, file.clone())?;
        match ingest_file(&mut store, &request) {
            Ok(report) => {
                ingested += 1;
                println!(
                    "OK    {}: config {} ({} measurements)",
                    display_name(file),
                    report.config_id,
                    report.measurement_count
                );
            }
            Err(error) => {
                println!("FAIL  {}: {}", display_name(file), error.diagnostic_line());
                first_failure.get_or_insert(error);
            }
        }
    }

    println!("Ingested {} of {} files", ingested, files.len());
    Ok(first_failure.map_or(0, |error| error.exit_code()))
}

pub(super) fn run_uploads_command(
    context: &CliContext,
    args: UploadsArgs,
) -> Result<i32, CliError> {
    let store = context.open_store()?;
    for upload in store.uploads_matching(args.search.as_deref(), args.method) {
        let samples = store.samples_for_upload(upload.id)?;
        println!(
            "{:>5}  {}  {}  {}  {}  samples={}",
            upload.id,
            upload.uploaded_at.to_rfc3339(),
            upload.process_method,
            upload.encoding,
            upload.original_name,
            samples.len()
        );
    }
    Ok(0)
}

pub(super) fn run_samples_command(
    context: &CliContext,
    args: SamplesArgs,
) -> Result<i32, CliError> {
    let store = context.open_store()?;
    for sample in store.samples_matching(args.search.as_deref()) {
        let configs = store
            .configs_for_sample(sample.id)?
            .into_iter()
            .map(|config| config.id.to_string())
            .collect::<Vec<_>>();
        println!(
            "{:>5}  {}  upload={}  configs=[{}]",
            sample.id,
            sample.name,
            sample.upload_id,
            configs.join(", ")
        );
    }
    Ok(0)
}

pub(super) fn run_configs_command(
    context: &CliContext,
    args: SampleIdArgs,
) -> Result<i32, CliError> {
    let store = context.open_store()?;
    for config in store.configs_for_sample(args.sample_id)? {
        println!(
            "{:>5}  {}  {} records",
            config.id,
            config.range,
            store.measurement_count(config.id)?
        );
    }
    Ok(0)
}

pub(super) fn run_measurements_command(
    context: &CliContext,
    args: MeasurementsArgs,
) -> Result<i32, CliError> {
    let store = context.open_store()?;
    let page = measurement_page(&store, args.config_id, args.page, MEASUREMENTS_PER_PAGE)?;
    print!("{}", render_measurement_rows(&page.rows));
    println!(
        "Page {} of {} ({} measurements)",
        page.page, page.page_count, page.total
    );
    Ok(0)
}

pub(super) fn run_delete_sample_command(
    context: &CliContext,
    args: SampleIdArgs,
) -> Result<i32, CliError> {
    let mut store = context.open_store()?;
    let summary = store.delete_sample(args.sample_id)?;
    println!("Deleted sample {}: {}", args.sample_id, summarize(&summary));
    Ok(0)
}

pub(super) fn run_delete_upload_command(
    context: &CliContext,
    args: UploadIdArgs,
) -> Result<i32, CliError> {
    let mut store = context.open_store()?;
    let summary = store.delete_upload(args.upload_id)?;
    println!("Deleted upload {}: {}", args.upload_id, summarize(&summary));
    Ok(0)
}

pub(super) fn run_set_range_command(
    context: &CliContext,
    args: SetRangeArgs,
) -> Result<i32, CliError> {
    let mut store = context.open_store()?;
    let range = args.range.to_range()?;
    store.update_processing_range(args.config_id, range)?;
    println!("Config {} now processes {}", args.config_id, range);
    Ok(0)
}

pub(super) fn run_clean_command(context: &CliContext, args: CleanArgs) -> Result<i32, CliError> {
    let store = context.open_store()?;
    let curve = get_clean_data(&store, args.config_id)?;
    let table = render_clean_data_text(&curve);

    match args.output {
        Some(output) => {
            let output = context.resolve(&output);
            write_text_artifact(&output, &table)
                .with_context(|| format!("failed to write '{}'", output.display()))?;
            println!(
                "Wrote {} clean-data points to '{}'",
                curve.len(),
                output.display()
            );
        }
        None => print!("{}", table),
    }
    Ok(0)
}

pub(super) fn run_maxima_command(
    context: &CliContext,
    command: MaximaCommand,
) -> Result<i32, CliError> {
    let mut store = context.open_store()?;
    match command {
        MaximaCommand::Add { config_id, range } => {
            let query_id = store.add_local_maximum_query(config_id, range.to_range()?)?;
            println!("Added query {} to config {}", query_id, config_id);
        }
        MaximaCommand::List { config_id } => {
            for report in local_maxima_for_config(&store, config_id)? {
                println!("{}", render_report(&report));
            }
        }
        MaximaCommand::Show { query_id } => {
            let query = *store.local_maximum_query(query_id)?;
            let report = LocalMaximumReport {
                query_id,
                range: query.range,
                maximum: get_local_maximum(&store, query_id)?,
            };
            println!("{}", render_report(&report));
        }
        MaximaCommand::Update { query_id, range } => {
            let range = range.to_range()?;
            store.update_local_maximum_query(query_id, range)?;
            println!("Query {} now covers {}", query_id, range);
        }
        MaximaCommand::Remove { query_id } => {
            let removed = store.delete_local_maximum_query(query_id)?;
            println!(
                "Removed query {} from config {}",
                removed.id, removed.config_id
            );
        }
    }
    Ok(0)
}

pub(super) fn run_export_command(context: &CliContext, args: ExportArgs) -> Result<i32, CliError> {
    let store = context.open_store()?;
    let artifact = export_clean_data_as_spreadsheet(&store, args.config_id)?;
    let path = artifact.write_to_dir(&context.resolve(&args.output_dir))?;
    println!("Exported config {} to '{}'", args.config_id, path.display());
    Ok(0)
}

fn render_report(report: &LocalMaximumReport) -> String {
    match report.maximum {
        Some(point) => format!(
            "{:>5}  {}  max at {} nm: {}",
            report.query_id,
            report.range,
            point.wavelength_int,
            format_point(&point)
        ),
        None => format!("{:>5}  {}  no result", report.query_id, report.range),
    }
}

fn format_point(point: &AggregatedPoint) -> String {
    format_fixed_f64(point.mean_absorbance_au, 0, 8)
}

fn summarize(summary: &DeletionSummary) -> String {
    format!(
        "{} uploads, {} samples, {} configs, {} measurements, {} queries removed",
        summary.uploads, summary.samples, summary.configs, summary.measurements, summary.queries
    )
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
