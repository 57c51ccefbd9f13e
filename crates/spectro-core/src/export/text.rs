use super::CLEAN_DATA_HEADER;
use crate::domain::{AggregatedPoint, RawMeasurement};
use std::fs;
use std::path::Path;

const WAVELENGTH_WIDTH: usize = 7;
const VALUE_WIDTH: usize = 18;
const VALUE_PRECISION: usize = 8;

/// Right-aligned fixed-precision rendering used by every text table.
pub fn format_fixed_f64(value: f64, width: usize, precision: usize) -> String {
    format!("{value:>width$.precision$}")
}

/// `\n` line endings with a final newline, whatever the input used.
pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .collect::<Vec<_>>()
        .join("\n");
    if !normalized.is_empty() {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}

/// Fixed-width two-column rendering of a clean-data curve.
pub fn render_clean_data_text(points: &[AggregatedPoint]) -> String {
    let mut content = format!(
        "# {:>WAVELENGTH_WIDTH$} {:>VALUE_WIDTH$}\n",
        CLEAN_DATA_HEADER[0], CLEAN_DATA_HEADER[1]
    );
    for point in points {
        content.push_str(&format!(
            "  {:>WAVELENGTH_WIDTH$} {}\n",
            point.wavelength_int,
            format_fixed_f64(point.mean_absorbance_au, VALUE_WIDTH, VALUE_PRECISION)
        ));
    }
    content
}

/// One line per raw measurement: wavelength, absorbance, then the three
/// detector counts.
pub fn render_measurement_rows(rows: &[RawMeasurement]) -> String {
    let mut content = format!(
        "# {:>12} {:>VALUE_WIDTH$} {:>12} {:>12} {:>12}\n",
        "wave_nm", "absorbance_au", "dark", "ref", "sample"
    );
    for row in rows {
        content.push_str(&format!(
            "  {} {} {} {} {}\n",
            format_fixed_f64(row.wavelength_nm, 12, 3),
            format_fixed_f64(row.absorbance_au, VALUE_WIDTH, VALUE_PRECISION),
            format_fixed_f64(row.dark_counts, 12, 2),
            format_fixed_f64(row.ref_counts, 12, 2),
            format_fixed_f64(row.sample_counts, 12, 2)
        ));
    }
    content
}
