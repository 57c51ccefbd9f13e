use crate::domain::{
    ConfigId, LocalMaximumQuery, ProcessingConfig, QueryId, RawMeasurement, Sample, SampleId,
    SpectroError, StoreResult, UploadId, UploadedFile,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub(crate) const CATALOG_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub(crate) struct Sequences {
    upload: u64,
    sample: u64,
    config: u64,
    query: u64,
}

impl Sequences {
    pub(crate) fn next_upload(&mut self) -> UploadId {
        self.upload += 1;
        UploadId(self.upload)
    }

    pub(crate) fn next_sample(&mut self) -> SampleId {
        self.sample += 1;
        SampleId(self.sample)
    }

    pub(crate) fn next_config(&mut self) -> ConfigId {
        self.config += 1;
        ConfigId(self.config)
    }

    pub(crate) fn next_query(&mut self) -> QueryId {
        self.query += 1;
        QueryId(self.query)
    }
}

/// Counts of rows removed by a cascading delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionSummary {
    pub uploads: usize,
    pub samples: usize,
    pub configs: usize,
    pub measurements: usize,
    pub queries: usize,
}

impl DeletionSummary {
    fn absorb(&mut self, other: DeletionSummary) {
        self.uploads += other.uploads;
        self.samples += other.samples;
        self.configs += other.configs;
        self.measurements += other.measurements;
        self.queries += other.queries;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Catalog {
    pub(crate) format_version: u32,
    pub(crate) sequences: Sequences,
    pub(crate) uploads: BTreeMap<UploadId, UploadedFile>,
    pub(crate) samples: BTreeMap<SampleId, Sample>,
    pub(crate) configs: BTreeMap<ConfigId, ProcessingConfig>,
    #[serde(with = "measurement_rows")]
    pub(crate) measurements: BTreeMap<ConfigId, Vec<RawMeasurement>>,
    pub(crate) queries: BTreeMap<QueryId, LocalMaximumQuery>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            format_version: CATALOG_FORMAT_VERSION,
            sequences: Sequences::default(),
            uploads: BTreeMap::new(),
            samples: BTreeMap::new(),
            configs: BTreeMap::new(),
            measurements: BTreeMap::new(),
            queries: BTreeMap::new(),
        }
    }
}

impl Catalog {
    pub(crate) fn upload(&self, id: UploadId) -> StoreResult<&UploadedFile> {
        self.uploads.get(&id).ok_or_else(|| {
            SpectroError::not_found("LOOKUP.UPLOAD", format!("upload {id} does not exist"))
        })
    }

    pub(crate) fn sample(&self, id: SampleId) -> StoreResult<&Sample> {
        self.samples.get(&id).ok_or_else(|| {
            SpectroError::not_found("LOOKUP.SAMPLE", format!("sample {id} does not exist"))
        })
    }

    pub(crate) fn config(&self, id: ConfigId) -> StoreResult<&ProcessingConfig> {
        self.configs.get(&id).ok_or_else(|| {
            SpectroError::not_found(
                "LOOKUP.PROCESSING_CONFIG",
                format!("processing config {id} does not exist"),
            )
        })
    }

    pub(crate) fn query(&self, id: QueryId) -> StoreResult<&LocalMaximumQuery> {
        self.queries.get(&id).ok_or_else(|| {
            SpectroError::not_found(
                "LOOKUP.LOCAL_MAXIMUM_QUERY",
                format!("local maximum query {id} does not exist"),
            )
        })
    }

    pub(crate) fn measurements(&self, config_id: ConfigId) -> StoreResult<&[RawMeasurement]> {
        self.config(config_id)?;
        Ok(self
            .measurements
            .get(&config_id)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    pub(crate) fn samples_for_upload(&self, upload_id: UploadId) -> Vec<SampleId> {
        self.samples
            .values()
            .filter(|sample| sample.upload_id == upload_id)
            .map(|sample| sample.id)
            .collect()
    }

    pub(crate) fn configs_for_sample(&self, sample_id: SampleId) -> Vec<&ProcessingConfig> {
        self.configs
            .values()
            .filter(|config| config.sample_id == sample_id)
            .collect()
    }

    pub(crate) fn queries_for_config(&self, config_id: ConfigId) -> Vec<&LocalMaximumQuery> {
        self.queries
            .values()
            .filter(|query| query.config_id == config_id)
            .collect()
    }

    pub(crate) fn remove_sample(&mut self, id: SampleId) -> StoreResult<DeletionSummary> {
        self.sample(id)?;
        let config_ids = self
            .configs_for_sample(id)
            .into_iter()
            .map(|config| config.id)
            .collect::<Vec<_>>();

        let mut summary = DeletionSummary {
            samples: 1,
            ..DeletionSummary::default()
        };
        for config_id in config_ids {
            self.configs.remove(&config_id);
            summary.configs += 1;
            summary.measurements += self
                .measurements
                .remove(&config_id)
                .map_or(0, |rows| rows.len());
            let before = self.queries.len();
            self.queries.retain(|_, query| query.config_id != config_id);
            summary.queries += before - self.queries.len();
        }
        self.samples.remove(&id);
        Ok(summary)
    }

    pub(crate) fn remove_upload(&mut self, id: UploadId) -> StoreResult<DeletionSummary> {
        self.upload(id)?;
        let mut summary = DeletionSummary {
            uploads: 1,
            ..DeletionSummary::default()
        };
        for sample_id in self.samples_for_upload(id) {
            summary.absorb(self.remove_sample(sample_id)?);
        }
        self.uploads.remove(&id);
        Ok(summary)
    }
}

/// Measurement sets are stored as compact five-value rows. Non-finite values
/// are written as their text form since JSON numbers cannot carry them.
mod measurement_rows {
    use crate::domain::{ConfigId, RawMeasurement};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum StoredFloat {
        Number(f64),
        Text(String),
    }

    impl From<f64> for StoredFloat {
        fn from(value: f64) -> Self {
            if value.is_finite() {
                Self::Number(value)
            } else {
                Self::Text(value.to_string())
            }
        }
    }

    impl StoredFloat {
        fn into_f64(self) -> Result<f64, String> {
            match self {
                Self::Number(value) => Ok(value),
                Self::Text(text) => text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid stored measurement value '{text}'")),
            }
        }
    }

    type StoredRow = [StoredFloat; 5];

    fn to_row(measurement: &RawMeasurement) -> StoredRow {
        [
            measurement.wavelength_nm.into(),
            measurement.dark_counts.into(),
            measurement.ref_counts.into(),
            measurement.sample_counts.into(),
            measurement.absorbance_au.into(),
        ]
    }

    fn from_row(row: StoredRow) -> Result<RawMeasurement, String> {
        let [wavelength_nm, dark_counts, ref_counts, sample_counts, absorbance_au] = row;
        Ok(RawMeasurement {
            wavelength_nm: wavelength_nm.into_f64()?,
            dark_counts: dark_counts.into_f64()?,
            ref_counts: ref_counts.into_f64()?,
            sample_counts: sample_counts.into_f64()?,
            absorbance_au: absorbance_au.into_f64()?,
        })
    }

    pub(super) fn serialize<S>(
        sets: &BTreeMap<ConfigId, Vec<RawMeasurement>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let rows = sets
            .iter()
            .map(|(config_id, measurements)| {
                (*config_id, measurements.iter().map(to_row).collect::<Vec<_>>())
            })
            .collect::<BTreeMap<_, _>>();
        rows.serialize(serializer)
    }

    pub(super) fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<ConfigId, Vec<RawMeasurement>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let rows = BTreeMap::<ConfigId, Vec<StoredRow>>::deserialize(deserializer)?;
        rows.into_iter()
            .map(|(config_id, rows)| {
                rows.into_iter()
                    .map(from_row)
                    .collect::<Result<Vec<_>, _>>()
                    .map(|measurements| (config_id, measurements))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::Catalog;
    use crate::domain::{ConfigId, RawMeasurement};

    #[test]
    fn non_finite_measurements_survive_json_round_trip() {
        let mut catalog = Catalog::default();
        catalog.measurements.insert(
            ConfigId(1),
            vec![RawMeasurement {
                wavelength_nm: 500.5,
                dark_counts: f64::INFINITY,
                ref_counts: f64::NEG_INFINITY,
                sample_counts: 12.0,
                absorbance_au: f64::NAN,
            }],
        );

        let json = serde_json::to_string(&catalog).expect("catalog should serialize");
        let restored: Catalog = serde_json::from_str(&json).expect("catalog should deserialize");
        let row = restored.measurements[&ConfigId(1)][0];

        assert_eq!(row.wavelength_nm, 500.5);
        assert_eq!(row.dark_counts, f64::INFINITY);
        assert_eq!(row.ref_counts, f64::NEG_INFINITY);
        assert!(row.absorbance_au.is_nan());
    }

    #[test]
    fn measurements_of_unknown_config_are_not_found() {
        let catalog = Catalog::default();
        let error = catalog
            .measurements(ConfigId(4))
            .expect_err("config should be missing");
        assert!(error.is_not_found());
    }
}
