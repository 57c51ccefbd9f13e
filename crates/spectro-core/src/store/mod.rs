//! Measurement store: uploads, samples, processing configs, measurement sets
//! and local-maximum queries, kept in a JSON catalog.
//!
//! Every change goes through [`MeasurementStore::transaction`]. Changes are
//! staged on a copy of the catalog and only become visible (and durable, for
//! file-backed stores) when the closure returns `Ok`.

mod catalog;
mod transaction;

pub use catalog::DeletionSummary;
pub use transaction::{NewUpload, Transaction};

use crate::domain::{
    ConfigId, LocalMaximumQuery, ProcessMethod, ProcessingConfig, QueryId, RawMeasurement, Sample,
    SampleId, SpectroError, StoreResult, UploadId, UploadedFile, WaveRange,
};
use catalog::{CATALOG_FORMAT_VERSION, Catalog};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const UPLOAD_DIRECTORY_NAME: &str = "uploads";

#[derive(Debug, Clone)]
enum Backing {
    Memory,
    File { catalog_path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct MeasurementStore {
    backing: Backing,
    catalog: Catalog,
}

impl MeasurementStore {
    pub fn in_memory() -> Self {
        Self {
            backing: Backing::Memory,
            catalog: Catalog::default(),
        }
    }

    /// Opens the catalog at `catalog_path`. A missing file is an empty store;
    /// the file is created on the first committed transaction.
    pub fn open(catalog_path: impl Into<PathBuf>) -> StoreResult<Self> {
        let catalog_path = catalog_path.into();
        let catalog = match fs::read_to_string(&catalog_path) {
            Ok(content) => parse_catalog(&catalog_path, &content)?,
            Err(source) if source.kind() == ErrorKind::NotFound => Catalog::default(),
            Err(source) => {
                return Err(SpectroError::storage(
                    "STORE.CATALOG_READ",
                    format!(
                        "failed to read catalog '{}': {}",
                        catalog_path.display(),
                        source
                    ),
                ));
            }
        };

        Ok(Self {
            backing: Backing::File { catalog_path },
            catalog,
        })
    }

    pub fn catalog_path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::Memory => None,
            Backing::File { catalog_path } => Some(catalog_path),
        }
    }

    /// Directory that receives copies of ingested exports.
    pub fn upload_root(&self) -> Option<PathBuf> {
        self.catalog_path().map(|catalog_path| {
            catalog_path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(UPLOAD_DIRECTORY_NAME)
        })
    }

    pub fn transaction<T, F>(&mut self, operation: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> StoreResult<T>,
    {
        let upload_root = self.upload_root();
        let mut staged = self.catalog.clone();
        let mut created_files = Vec::new();

        let outcome = {
            let mut transaction =
                Transaction::new(&mut staged, upload_root.as_deref(), &mut created_files);
            operation(&mut transaction)
        };
        let outcome = outcome.and_then(|value| {
            self.persist(&staged)?;
            Ok(value)
        });

        match outcome {
            Ok(value) => {
                self.catalog = staged;
                Ok(value)
            }
            Err(error) => {
                for path in &created_files {
                    if let Err(source) = fs::remove_file(path) {
                        tracing::warn!(
                            path = %path.display(),
                            error = %source,
                            "failed to remove staged upload file"
                        );
                    }
                }
                tracing::warn!(
                    code = error.placeholder(),
                    removed_files = created_files.len(),
                    "transaction rolled back: {}",
                    error.message()
                );
                Err(error)
            }
        }
    }

    fn persist(&self, catalog: &Catalog) -> StoreResult<()> {
        let Backing::File { catalog_path } = &self.backing else {
            return Ok(());
        };
        let write_error = |source: &dyn std::fmt::Display| {
            SpectroError::storage(
                "STORE.CATALOG_WRITE",
                format!(
                    "failed to write catalog '{}': {}",
                    catalog_path.display(),
                    source
                ),
            )
        };

        let parent = match catalog_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|source| write_error(&source))?;

        let bytes = serde_json::to_vec_pretty(catalog).map_err(|source| write_error(&source))?;
        let mut temp = NamedTempFile::new_in(parent).map_err(|source| write_error(&source))?;
        temp.write_all(&bytes)
            .map_err(|source| write_error(&source))?;
        temp.as_file()
            .sync_all()
            .map_err(|source| write_error(&source))?;
        temp.persist(catalog_path)
            .map_err(|source| write_error(&source.error))?;
        Ok(())
    }

    /// Uploads, newest first.
    pub fn uploads(&self) -> Vec<&UploadedFile> {
        let mut uploads = self.catalog.uploads.values().collect::<Vec<_>>();
        uploads.sort_by(|left, right| {
            right
                .uploaded_at
                .cmp(&left.uploaded_at)
                .then(right.id.cmp(&left.id))
        });
        uploads
    }

    /// Uploads whose original file name contains `search` (case-insensitive)
    /// and that were processed with `method`, newest first. `None` matches
    /// everything.
    pub fn uploads_matching(
        &self,
        search: Option<&str>,
        method: Option<ProcessMethod>,
    ) -> Vec<&UploadedFile> {
        let needle = search.map(str::to_lowercase);
        self.uploads()
            .into_iter()
            .filter(|upload| method.is_none_or(|method| upload.process_method == method))
            .filter(|upload| {
                needle
                    .as_deref()
                    .is_none_or(|needle| contains_folded(&upload.original_name, needle))
            })
            .collect()
    }

    pub fn upload(&self, id: UploadId) -> StoreResult<&UploadedFile> {
        self.catalog.upload(id)
    }

    pub fn samples(&self) -> Vec<&Sample> {
        self.catalog.samples.values().collect()
    }

    /// Samples whose own name or whose upload's original file name contains
    /// `search`, ignoring case.
    pub fn samples_matching(&self, search: Option<&str>) -> Vec<&Sample> {
        let Some(needle) = search.map(str::to_lowercase) else {
            return self.samples();
        };
        self.catalog
            .samples
            .values()
            .filter(|sample| {
                contains_folded(&sample.name, &needle)
                    || self
                        .catalog
                        .upload(sample.upload_id)
                        .is_ok_and(|upload| contains_folded(&upload.original_name, &needle))
            })
            .collect()
    }

    pub fn sample(&self, id: SampleId) -> StoreResult<&Sample> {
        self.catalog.sample(id)
    }

    pub fn samples_for_upload(&self, upload_id: UploadId) -> StoreResult<Vec<&Sample>> {
        self.catalog.upload(upload_id)?;
        self.catalog
            .samples_for_upload(upload_id)
            .into_iter()
            .map(|sample_id| self.catalog.sample(sample_id))
            .collect()
    }

    pub fn processing_config(&self, id: ConfigId) -> StoreResult<&ProcessingConfig> {
        self.catalog.config(id)
    }

    pub fn configs_for_sample(&self, sample_id: SampleId) -> StoreResult<Vec<&ProcessingConfig>> {
        self.catalog.sample(sample_id)?;
        Ok(self.catalog.configs_for_sample(sample_id))
    }

    pub fn measurements(&self, config_id: ConfigId) -> StoreResult<&[RawMeasurement]> {
        self.catalog.measurements(config_id)
    }

    pub fn measurement_count(&self, config_id: ConfigId) -> StoreResult<usize> {
        self.measurements(config_id).map(<[RawMeasurement]>::len)
    }

    pub fn local_maximum_query(&self, id: QueryId) -> StoreResult<&LocalMaximumQuery> {
        self.catalog.query(id)
    }

    pub fn queries_for_config(
        &self,
        config_id: ConfigId,
    ) -> StoreResult<Vec<&LocalMaximumQuery>> {
        self.catalog.config(config_id)?;
        Ok(self.catalog.queries_for_config(config_id))
    }

    pub fn update_processing_range(
        &mut self,
        config_id: ConfigId,
        range: WaveRange,
    ) -> StoreResult<()> {
        self.transaction(|tx| tx.update_processing_range(config_id, range))
    }

    pub fn add_local_maximum_query(
        &mut self,
        config_id: ConfigId,
        range: WaveRange,
    ) -> StoreResult<QueryId> {
        self.transaction(|tx| tx.insert_local_maximum_query(config_id, range))
    }

    pub fn update_local_maximum_query(
        &mut self,
        id: QueryId,
        range: WaveRange,
    ) -> StoreResult<()> {
        self.transaction(|tx| tx.update_local_maximum_query(id, range))
    }

    pub fn delete_local_maximum_query(
        &mut self,
        id: QueryId,
    ) -> StoreResult<LocalMaximumQuery> {
        self.transaction(|tx| tx.delete_local_maximum_query(id))
    }

    pub fn delete_sample(&mut self, id: SampleId) -> StoreResult<DeletionSummary> {
        self.transaction(|tx| tx.delete_sample(id))
    }

    pub fn delete_upload(&mut self, id: UploadId) -> StoreResult<DeletionSummary> {
        self.transaction(|tx| tx.delete_upload(id))
    }
}

fn contains_folded(haystack: &str, lowercase_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowercase_needle)
}

fn parse_catalog(catalog_path: &Path, content: &str) -> StoreResult<Catalog> {
    let catalog: Catalog = serde_json::from_str(content).map_err(|source| {
        SpectroError::storage(
            "STORE.CORRUPT_CATALOG",
            format!(
                "catalog '{}' is not a valid store: {}",
                catalog_path.display(),
                source
            ),
        )
    })?;
    if catalog.format_version != CATALOG_FORMAT_VERSION {
        return Err(SpectroError::storage(
            "STORE.CATALOG_VERSION",
            format!(
                "catalog '{}' has format version {}, expected {}",
                catalog_path.display(),
                catalog.format_version,
                CATALOG_FORMAT_VERSION
            ),
        ));
    }
    Ok(catalog)
}
