//! Ingestion of instrument exports: the upload record is stored first, then
//! the processing strategy for its [`ProcessMethod`] runs in the same
//! transaction. A failure in either phase rolls both back.

use crate::domain::{
    ConfigId, ProcessMethod, SampleId, SpectroResult, StoreResult, UploadId, WaveRange,
};
use crate::parser::{TextEncoding, read_measurements_from_path};
use crate::store::{MeasurementStore, NewUpload, Transaction};
use std::path::{Path, PathBuf};

const FALLBACK_SAMPLE_NAME: &str = "sample";

#[derive(Debug, Clone, PartialEq)]
pub struct IngestRequest {
    source_path: PathBuf,
    sample_name: Option<String>,
    original_name: Option<String>,
    encoding: TextEncoding,
    method: ProcessMethod,
    range: WaveRange,
}

impl IngestRequest {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            sample_name: None,
            original_name: None,
            encoding: TextEncoding::default(),
            method: ProcessMethod::default(),
            range: WaveRange::default(),
        }
    }

    pub fn with_sample_name(mut self, sample_name: impl Into<String>) -> Self {
        self.sample_name = Some(sample_name.into());
        self
    }

    pub fn with_original_name(mut self, original_name: impl Into<String>) -> Self {
        self.original_name = Some(original_name.into());
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_method(mut self, method: ProcessMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_range(mut self, range: WaveRange) -> Self {
        self.range = range;
        self
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn method(&self) -> ProcessMethod {
        self.method
    }

    pub fn range(&self) -> WaveRange {
        self.range
    }

    /// Name recorded on the upload; defaults to the source file name.
    pub fn original_name(&self) -> String {
        self.original_name.clone().unwrap_or_else(|| {
            file_component(self.source_path.file_name())
                .unwrap_or_else(|| self.source_path.display().to_string())
        })
    }

    /// Name given to the sample; defaults to the source file stem.
    pub fn sample_name(&self) -> String {
        self.sample_name
            .clone()
            .or_else(|| file_component(self.source_path.file_stem()))
            .unwrap_or_else(|| FALLBACK_SAMPLE_NAME.to_string())
    }
}

fn file_component(component: Option<&std::ffi::OsStr>) -> Option<String> {
    component
        .map(|component| component.to_string_lossy().into_owned())
        .filter(|component| !component.trim().is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub upload_id: UploadId,
    pub sample_id: SampleId,
    pub config_id: ConfigId,
    pub measurement_count: usize,
}

/// Rows created by a processing strategy for one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingOutcome {
    pub sample_id: SampleId,
    pub config_id: ConfigId,
    pub measurement_count: usize,
}

pub trait ProcessingStrategy {
    fn method(&self) -> ProcessMethod;

    fn process(
        &self,
        transaction: &mut Transaction<'_>,
        upload_id: UploadId,
        request: &IngestRequest,
    ) -> StoreResult<ProcessingOutcome>;
}

/// Parses the stored export and attaches its measurements to a new sample
/// with one default processing config.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbsorbanceStrategy;

impl ProcessingStrategy for AbsorbanceStrategy {
    fn method(&self) -> ProcessMethod {
        ProcessMethod::Absorbance
    }

    fn process(
        &self,
        transaction: &mut Transaction<'_>,
        upload_id: UploadId,
        request: &IngestRequest,
    ) -> StoreResult<ProcessingOutcome> {
        let stored_path = transaction.upload(upload_id)?.stored_path.clone();
        let measurements = read_measurements_from_path(&stored_path, request.encoding())?
            .collect::<SpectroResult<Vec<_>>>()?;

        let sample_id = transaction.insert_sample(upload_id, &request.sample_name())?;
        let config_id = transaction.insert_processing_config(sample_id, request.range())?;
        let measurement_count = transaction.insert_measurements(config_id, measurements)?;
        Ok(ProcessingOutcome {
            sample_id,
            config_id,
            measurement_count,
        })
    }
}

pub fn strategy_for(method: ProcessMethod) -> &'static dyn ProcessingStrategy {
    match method {
        ProcessMethod::Absorbance => &AbsorbanceStrategy,
    }
}

pub fn ingest_file(
    store: &mut MeasurementStore,
    request: &IngestRequest,
) -> SpectroResult<IngestReport> {
    let span = tracing::info_span!(
        "ingest",
        source = %request.source_path().display(),
        method = %request.method()
    );
    let _entered = span.enter();

    let strategy = strategy_for(request.method());
    let original_name = request.original_name();
    let report = store.transaction(|transaction| {
        let stored_path = transaction.stage_upload_file(request.source_path(), &original_name)?;
        let upload_id = transaction.insert_upload(NewUpload {
            original_name: original_name.clone(),
            stored_path,
            encoding: request.encoding().name().to_string(),
            process_method: strategy.method(),
        });
        let outcome = strategy.process(transaction, upload_id, request)?;
        Ok(IngestReport {
            upload_id,
            sample_id: outcome.sample_id,
            config_id: outcome.config_id,
            measurement_count: outcome.measurement_count,
        })
    })?;

    tracing::info!(
        upload_id = %report.upload_id,
        sample_id = %report.sample_id,
        config_id = %report.config_id,
        measurements = report.measurement_count,
        "ingested export"
    );
    Ok(report)
}
