use super::catalog::{Catalog, DeletionSummary};
use crate::domain::{
    ConfigId, LocalMaximumQuery, ProcessMethod, ProcessingConfig, QueryId, RawMeasurement, Sample,
    SampleId, SpectroError, StoreResult, UploadId, UploadedFile, WaveRange,
};
use crate::parser::open_source;
use chrono::{Datelike, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Upload record fields supplied by the caller; id and timestamp are assigned
/// on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUpload {
    pub original_name: String,
    pub stored_path: PathBuf,
    pub encoding: String,
    pub process_method: ProcessMethod,
}

/// Staged view of the catalog inside [`super::MeasurementStore::transaction`].
/// Nothing written here is visible outside until the closure returns `Ok`.
pub struct Transaction<'a> {
    catalog: &'a mut Catalog,
    upload_root: Option<&'a Path>,
    created_files: &'a mut Vec<PathBuf>,
}

impl<'a> Transaction<'a> {
    pub(super) fn new(
        catalog: &'a mut Catalog,
        upload_root: Option<&'a Path>,
        created_files: &'a mut Vec<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            upload_root,
            created_files,
        }
    }

    pub fn upload(&self, id: UploadId) -> StoreResult<&UploadedFile> {
        self.catalog.upload(id)
    }

    /// Copies an export into the managed upload area
    /// (`uploads/<year>/<month>/<name>`). In-memory stores keep the source
    /// path as the stored location. Copied files are removed again if the
    /// transaction does not commit.
    pub fn stage_upload_file(
        &mut self,
        source: &Path,
        original_name: &str,
    ) -> StoreResult<PathBuf> {
        let Some(upload_root) = self.upload_root else {
            open_source(source)?;
            return Ok(source.to_path_buf());
        };

        let mut reader = open_source(source)?;
        let now = Utc::now();
        let directory = upload_root
            .join(format!("{:04}", now.year()))
            .join(format!("{:02}", now.month()));
        fs::create_dir_all(&directory).map_err(|error| {
            SpectroError::storage(
                "STORE.UPLOAD_DIRECTORY",
                format!(
                    "failed to create upload directory '{}': {}",
                    directory.display(),
                    error
                ),
            )
        })?;

        let destination = unique_destination(&directory, original_name);
        let mut writer = fs::File::create(&destination).map_err(|error| {
            SpectroError::storage(
                "STORE.UPLOAD_WRITE",
                format!("failed to create '{}': {}", destination.display(), error),
            )
        })?;
        self.created_files.push(destination.clone());

        io::copy(&mut reader, &mut writer).map_err(|error| {
            SpectroError::storage(
                "STORE.UPLOAD_WRITE",
                format!(
                    "failed to copy '{}' to '{}': {}",
                    source.display(),
                    destination.display(),
                    error
                ),
            )
        })?;
        Ok(destination)
    }

    pub fn insert_upload(&mut self, upload: NewUpload) -> UploadId {
        let id = self.catalog.sequences.next_upload();
        self.catalog.uploads.insert(
            id,
            UploadedFile {
                id,
                original_name: upload.original_name,
                stored_path: upload.stored_path,
                uploaded_at: Utc::now(),
                encoding: upload.encoding,
                process_method: upload.process_method,
            },
        );
        id
    }

    pub fn insert_sample(&mut self, upload_id: UploadId, name: &str) -> StoreResult<SampleId> {
        self.catalog.upload(upload_id)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SpectroError::input_validation(
                "INPUT.SAMPLE_NAME",
                "sample name cannot be empty",
            ));
        }

        let id = self.catalog.sequences.next_sample();
        self.catalog.samples.insert(
            id,
            Sample {
                id,
                upload_id,
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    pub fn insert_processing_config(
        &mut self,
        sample_id: SampleId,
        range: WaveRange,
    ) -> StoreResult<ConfigId> {
        self.catalog.sample(sample_id)?;
        let range = WaveRange::processing_window(range.start(), range.end())?;
        let id = self.catalog.sequences.next_config();
        self.catalog.configs.insert(
            id,
            ProcessingConfig {
                id,
                sample_id,
                range,
            },
        );
        Ok(id)
    }

    /// Bulk insert of one parsed export.
    pub fn insert_measurements(
        &mut self,
        config_id: ConfigId,
        measurements: Vec<RawMeasurement>,
    ) -> StoreResult<usize> {
        self.catalog.config(config_id)?;
        let inserted = measurements.len();
        self.catalog
            .measurements
            .entry(config_id)
            .or_default()
            .extend(measurements);
        Ok(inserted)
    }

    pub fn update_processing_range(
        &mut self,
        config_id: ConfigId,
        range: WaveRange,
    ) -> StoreResult<()> {
        let range = WaveRange::processing_window(range.start(), range.end())?;
        self.catalog.config(config_id)?;
        if let Some(config) = self.catalog.configs.get_mut(&config_id) {
            config.range = range;
        }
        Ok(())
    }

    pub fn insert_local_maximum_query(
        &mut self,
        config_id: ConfigId,
        range: WaveRange,
    ) -> StoreResult<QueryId> {
        self.catalog.config(config_id)?;
        let id = self.catalog.sequences.next_query();
        self.catalog.queries.insert(
            id,
            LocalMaximumQuery {
                id,
                config_id,
                range,
            },
        );
        Ok(id)
    }

    pub fn update_local_maximum_query(
        &mut self,
        id: QueryId,
        range: WaveRange,
    ) -> StoreResult<()> {
        self.catalog.query(id)?;
        if let Some(query) = self.catalog.queries.get_mut(&id) {
            query.range = range;
        }
        Ok(())
    }

    pub fn delete_local_maximum_query(
        &mut self,
        id: QueryId,
    ) -> StoreResult<LocalMaximumQuery> {
        self.catalog.queries.remove(&id).ok_or_else(|| {
            SpectroError::not_found(
                "LOOKUP.LOCAL_MAXIMUM_QUERY",
                format!("local maximum query {id} does not exist"),
            )
        })
    }

    pub fn delete_sample(&mut self, id: SampleId) -> StoreResult<DeletionSummary> {
        self.catalog.remove_sample(id)
    }

    pub fn delete_upload(&mut self, id: UploadId) -> StoreResult<DeletionSummary> {
        self.catalog.remove_upload(id)
    }
}

fn unique_destination(directory: &Path, original_name: &str) -> PathBuf {
    let file_name = Path::new(original_name)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("upload.txt");
    let candidate = directory.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name);
    let extension = path.extension().and_then(|extension| extension.to_str());
    (1_u32..)
        .map(|index| match extension {
            Some(extension) => directory.join(format!("{stem}_{index}.{extension}")),
            None => directory.join(format!("{stem}_{index}")),
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::unique_destination;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn colliding_upload_names_get_numbered_suffixes() {
        let temp = TempDir::new().expect("tempdir should be created");
        let first = unique_destination(temp.path(), "sample.txt");
        assert_eq!(first, temp.path().join("sample.txt"));
        fs::write(&first, "x").expect("file should be written");

        let second = unique_destination(temp.path(), "../elsewhere/sample.txt");
        assert_eq!(second, temp.path().join("sample_1.txt"));
    }
}
