pub mod errors;

pub use errors::{ParserResult, SpectroError, SpectroErrorCategory, SpectroResult, StoreResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_WAVE_START: f64 = 400.0;
pub const DEFAULT_WAVE_END: f64 = 750.0;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                value.trim().parse::<u64>().map(Self)
            }
        }
    };
}

entity_id!(
    /// Identifier of a stored upload record.
    UploadId
);
entity_id!(SampleId);
entity_id!(
    /// Identifier of a processing configuration; also names the clean-data export.
    ConfigId
);
entity_id!(QueryId);

/// Half-open wavelength window `[start, end)` in nanometres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveRange {
    start: f64,
    end: f64,
}

impl WaveRange {
    pub fn new(start: f64, end: f64) -> SpectroResult<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(SpectroError::input_validation(
                "INPUT.WAVE_RANGE",
                format!("wavelength bounds must be finite, got [{start}, {end})"),
            ));
        }
        if start >= end {
            return Err(SpectroError::input_validation(
                "INPUT.WAVE_RANGE",
                format!("wave start {start} must be lower than wave end {end}"),
            ));
        }
        Ok(Self { start, end })
    }

    /// Window used to filter raw measurements before binning. Truncating a
    /// wavelength to its integer bin equals flooring it only for non-negative
    /// values, so negative lower bounds are rejected here.
    pub fn processing_window(start: f64, end: f64) -> SpectroResult<Self> {
        let range = Self::new(start, end)?;
        if range.start < 0.0 {
            return Err(SpectroError::input_validation(
                "INPUT.WAVE_RANGE_NEGATIVE",
                format!("processing window cannot start below 0 nm, got {start}"),
            ));
        }
        Ok(range)
    }

    pub const fn start(&self) -> f64 {
        self.start
    }

    pub const fn end(&self) -> f64 {
        self.end
    }

    pub fn contains(&self, wavelength: f64) -> bool {
        self.start <= wavelength && wavelength < self.end
    }
}

impl Default for WaveRange {
    fn default() -> Self {
        Self {
            start: DEFAULT_WAVE_START,
            end: DEFAULT_WAVE_END,
        }
    }
}

impl Display for WaveRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}) nm", self.start, self.end)
    }
}

/// One data line of an instrument export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawMeasurement {
    pub wavelength_nm: f64,
    pub dark_counts: f64,
    pub ref_counts: f64,
    pub sample_counts: f64,
    pub absorbance_au: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPoint {
    pub wavelength_int: i64,
    pub mean_absorbance_au: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub id: ConfigId,
    pub sample_id: SampleId,
    pub range: WaveRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalMaximumQuery {
    pub id: QueryId,
    pub config_id: ConfigId,
    pub range: WaveRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub id: SampleId,
    pub upload_id: UploadId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: UploadId,
    pub original_name: String,
    pub stored_path: PathBuf,
    pub uploaded_at: DateTime<Utc>,
    pub encoding: String,
    pub process_method: ProcessMethod,
}

/// Processing applied to an upload once its record is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessMethod {
    #[default]
    Absorbance,
}

impl ProcessMethod {
    pub const ALL: [ProcessMethod; 1] = [ProcessMethod::Absorbance];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Absorbance => "absorbance",
        }
    }
}

impl Display for ProcessMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl FromStr for ProcessMethod {
    type Err = SpectroError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let normalized = normalized.strip_prefix("process_").unwrap_or(normalized);
        Self::ALL
            .iter()
            .copied()
            .find(|method| method.as_str().eq_ignore_ascii_case(normalized))
            .ok_or_else(|| {
                let known = Self::ALL
                    .iter()
                    .map(|method| method.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                SpectroError::input_validation(
                    "INPUT.PROCESS_METHOD",
                    format!("unknown process method '{value}'; expected one of: {known}"),
                )
            })
    }
}
