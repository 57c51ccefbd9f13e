mod text;

pub use text::{
    format_fixed_f64, normalize_text_artifact, render_clean_data_text, render_measurement_rows,
    write_text_artifact,
};

use crate::domain::{AggregatedPoint, ConfigId, SpectroError, SpectroResult};
use rust_xlsxwriter::{Workbook, XlsxError};
use std::path::{Path, PathBuf};

pub const SPREADSHEET_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const CLEAN_DATA_SHEET_NAME: &str = "clean_data";
pub const CLEAN_DATA_HEADER: [&str; 2] = ["wave_nm", "avg_absorbance_au"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetArtifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl SpreadsheetArtifact {
    pub fn write_to_dir(&self, output_dir: &Path) -> SpectroResult<PathBuf> {
        std::fs::create_dir_all(output_dir).map_err(|source| {
            SpectroError::storage(
                "IO.EXPORT_OUTPUT_DIRECTORY",
                format!(
                    "failed to create export directory '{}': {}",
                    output_dir.display(),
                    source
                ),
            )
        })?;

        let path = output_dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes).map_err(|source| {
            SpectroError::storage(
                "IO.EXPORT_WRITE",
                format!("failed to write export '{}': {}", path.display(), source),
            )
        })?;
        Ok(path)
    }
}

pub fn export_file_name(config_id: ConfigId) -> String {
    format!("data_id-{config_id}.xlsx")
}

pub fn clean_data_spreadsheet(
    config_id: ConfigId,
    points: &[AggregatedPoint],
) -> SpectroResult<SpreadsheetArtifact> {
    Ok(SpreadsheetArtifact {
        file_name: export_file_name(config_id),
        mime_type: SPREADSHEET_MIME_TYPE,
        bytes: render_clean_data_workbook(points)?,
    })
}

/// Writes the curve to a single `clean_data` worksheet: one header row, then
/// one row per point in input order.
pub fn render_clean_data_workbook(points: &[AggregatedPoint]) -> SpectroResult<Vec<u8>> {
    build_workbook(points).map_err(|source| {
        SpectroError::internal(
            "RUN.EXPORT_WORKBOOK",
            format!("failed to render clean-data workbook: {source}"),
        )
    })
}

fn build_workbook(points: &[AggregatedPoint]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(CLEAN_DATA_SHEET_NAME)?;

    for (column, title) in (0_u16..).zip(CLEAN_DATA_HEADER) {
        worksheet.write_string(0, column, title)?;
    }
    for (row, point) in (1_u32..).zip(points) {
        worksheet.write_number(row, 0, point.wavelength_int as f64)?;
        worksheet.write_number(row, 1, point.mean_absorbance_au)?;
    }

    workbook.save_to_buffer()
}
