//! Reader for semicolon-delimited absorbance exports.
//!
//! An export starts with a fixed preamble written by the spectrometer
//! software (device name, integration time, averaging, ...). The preamble is
//! skipped without looking at it; every following non-blank line carries five
//! numeric fields:
//!
//! ```text
//! wavelength_nm;dark_counts;ref_counts;sample_counts;absorbance_au
//! ```

use crate::domain::{ParserResult, RawMeasurement, SpectroError};
use encoding_rs::{Encoding, UTF_8};
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

pub const PREAMBLE_LINES: usize = 7;
pub const FIELD_DELIMITER: char = ';';
pub const FIELD_NAMES: [&str; 5] = [
    "wavelength_nm",
    "dark_counts",
    "ref_counts",
    "sample_counts",
    "absorbance_au",
];
pub const FIELD_COUNT: usize = FIELD_NAMES.len();

/// Text encoding of an export, resolved from a WHATWG label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding(&'static Encoding);

impl TextEncoding {
    pub const UTF8: TextEncoding = TextEncoding(UTF_8);

    pub fn for_label(label: &str) -> ParserResult<Self> {
        Encoding::for_label(label.trim().as_bytes())
            .map(Self)
            .ok_or_else(|| {
                SpectroError::input_validation(
                    "INPUT.TEXT_ENCODING",
                    format!("unknown text encoding '{label}'"),
                )
            })
    }

    pub fn name(self) -> &'static str {
        self.0.name()
    }

    /// Decodes a whole export, dropping a leading byte order mark.
    pub fn decode(self, bytes: &[u8]) -> ParserResult<String> {
        let (text, had_errors) = self.0.decode_with_bom_removal(bytes);
        if had_errors {
            return Err(SpectroError::format(
                "FORMAT.TEXT_ENCODING",
                format!("export is not valid {} text", self.name()),
            ));
        }
        Ok(text.into_owned())
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::UTF8
    }
}

impl Display for TextEncoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("expected 5 ';'-separated fields, found {found}")]
    FieldCount { found: usize },
    #[error("field {column} ('{token}') is not a number")]
    NotANumber { column: &'static str, token: String },
}

impl LineError {
    fn at_line(self, line_number: usize) -> SpectroError {
        let placeholder = match self {
            Self::FieldCount { .. } => "FORMAT.FIELD_COUNT",
            Self::NotANumber { .. } => "FORMAT.NUMERIC_FIELD",
        };
        SpectroError::format(placeholder, format!("line {line_number}: {self}"))
    }
}

pub fn open_source(path: &Path) -> ParserResult<File> {
    File::open(path).map_err(|source| {
        SpectroError::source_unavailable(
            "IO.SOURCE_UNAVAILABLE",
            format!("failed to open export '{}': {}", path.display(), source),
        )
    })
}

/// Reads an export from `reader` and returns its measurements as a lazy
/// sequence. Lines are parsed only as the sequence is consumed.
pub fn read_measurements<R: Read>(
    mut reader: R,
    encoding: TextEncoding,
) -> ParserResult<Measurements> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(|source| {
        SpectroError::source_unavailable(
            "IO.SOURCE_READ",
            format!("failed to read export stream: {source}"),
        )
    })?;
    Ok(Measurements::from_text(encoding.decode(&bytes)?))
}

pub fn read_measurements_from_path(
    path: &Path,
    encoding: TextEncoding,
) -> ParserResult<Measurements> {
    read_measurements(open_source(path)?, encoding)
}

/// Eager convenience over [`Measurements`]; fails on the first bad line.
pub fn parse_measurements(source: &str) -> ParserResult<Vec<RawMeasurement>> {
    Measurements::from_text(source.to_owned()).collect()
}

/// Iterator over the data lines of a decoded export. Stops after the first
/// error.
#[derive(Debug, Clone)]
pub struct Measurements {
    text: String,
    cursor: usize,
    line_number: usize,
    failed: bool,
}

impl Measurements {
    pub fn from_text(text: String) -> Self {
        Self {
            text,
            cursor: 0,
            line_number: 0,
            failed: false,
        }
    }

    /// 1-based number of the last line consumed.
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl Iterator for Measurements {
    type Item = ParserResult<RawMeasurement>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.failed && self.cursor < self.text.len() {
            let rest = &self.text[self.cursor..];
            let (line, consumed) = match rest.find('\n') {
                Some(index) => (&rest[..index], index + 1),
                None => (rest, rest.len()),
            };
            self.cursor += consumed;
            self.line_number += 1;

            if self.line_number <= PREAMBLE_LINES {
                continue;
            }
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.trim().is_empty() {
                continue;
            }

            let parsed = parse_data_line(line).map_err(|error| error.at_line(self.line_number));
            self.failed = parsed.is_err();
            return Some(parsed);
        }
        None
    }
}

impl std::iter::FusedIterator for Measurements {}

pub fn parse_data_line(line: &str) -> Result<RawMeasurement, LineError> {
    let tokens = line.split(FIELD_DELIMITER).collect::<Vec<_>>();
    if tokens.len() != FIELD_COUNT {
        return Err(LineError::FieldCount {
            found: tokens.len(),
        });
    }

    let mut values = [0.0_f64; FIELD_COUNT];
    for ((slot, token), column) in values.iter_mut().zip(&tokens).zip(FIELD_NAMES) {
        let token = token.trim();
        *slot = token.parse::<f64>().map_err(|_| LineError::NotANumber {
            column,
            token: token.to_string(),
        })?;
    }

    let [wavelength_nm, dark_counts, ref_counts, sample_counts, absorbance_au] = values;
    Ok(RawMeasurement {
        wavelength_nm,
        dark_counts,
        ref_counts,
        sample_counts,
        absorbance_au,
    })
}
