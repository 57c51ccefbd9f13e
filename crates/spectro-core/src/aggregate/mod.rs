//! Clean-data aggregation: raw measurements binned by integer wavelength.

use crate::domain::{AggregatedPoint, RawMeasurement, WaveRange};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default)]
struct BinAccumulator {
    sum: f64,
    count: usize,
}

impl BinAccumulator {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Integer bin of a wavelength (truncation toward zero).
pub fn wavelength_bin(wavelength_nm: f64) -> i64 {
    wavelength_nm.trunc() as i64
}

/// Averages absorbance per integer wavelength inside `window`.
///
/// Measurements outside `[start, end)` are ignored. A bin is only emitted if
/// its integer wavelength itself lies in the window, so an in-window
/// measurement whose truncated wavelength falls below a fractional start is
/// dropped: with a start of 400.5, a reading at 400.7 truncates to bin 400
/// and produces no bin at all. Output is ascending by wavelength.
pub fn aggregate_clean_data<'a, I>(measurements: I, window: &WaveRange) -> Vec<AggregatedPoint>
where
    I: IntoIterator<Item = &'a RawMeasurement>,
{
    let mut bins: BTreeMap<i64, BinAccumulator> = BTreeMap::new();
    for measurement in measurements {
        if !window.contains(measurement.wavelength_nm) {
            continue;
        }
        bins.entry(wavelength_bin(measurement.wavelength_nm))
            .or_default()
            .push(measurement.absorbance_au);
    }

    let points = bins
        .into_iter()
        .filter(|(wavelength_int, _)| window.contains(*wavelength_int as f64))
        .map(|(wavelength_int, accumulator)| AggregatedPoint {
            wavelength_int,
            mean_absorbance_au: accumulator.mean(),
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        window = %window,
        bins = points.len(),
        "aggregated clean data"
    );
    points
}

#[cfg(test)]
mod tests {
    use super::{aggregate_clean_data, wavelength_bin};
    use crate::domain::{RawMeasurement, WaveRange};

    fn measurement(wavelength_nm: f64, absorbance_au: f64) -> RawMeasurement {
        RawMeasurement {
            wavelength_nm,
            dark_counts: 0.0,
            ref_counts: 0.0,
            sample_counts: 0.0,
            absorbance_au,
        }
    }

    #[test]
    fn bin_mean_is_unweighted_average() {
        let measurements = [
            measurement(500.1, 0.1),
            measurement(500.5, 0.3),
            measurement(500.9, 0.2),
        ];
        let points = aggregate_clean_data(&measurements, &WaveRange::default());

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].wavelength_int, 500);
        assert!((points[0].mean_absorbance_au - 0.2).abs() < 1e-12);
    }

    #[test]
    fn single_member_bin_keeps_its_value() {
        let points = aggregate_clean_data(&[measurement(612.4, 0.731)], &WaveRange::default());
        assert_eq!(points[0].mean_absorbance_au, 0.731);
    }

    #[test]
    fn output_is_ascending_regardless_of_input_order() {
        let measurements = [
            measurement(702.2, 0.5),
            measurement(401.7, 0.1),
            measurement(550.0, 0.3),
            measurement(401.2, 0.3),
        ];
        let points = aggregate_clean_data(&measurements, &WaveRange::default());
        let wavelengths = points
            .iter()
            .map(|point| point.wavelength_int)
            .collect::<Vec<_>>();

        assert_eq!(wavelengths, vec![401, 550, 702]);
        assert!((points[0].mean_absorbance_au - 0.2).abs() < 1e-12);
    }

    #[test]
    fn window_is_inclusive_lower_exclusive_upper() {
        let measurements = [
            measurement(399.99, 1.0),
            measurement(400.0, 2.0),
            measurement(749.99, 3.0),
            measurement(750.0, 4.0),
        ];
        let points = aggregate_clean_data(&measurements, &WaveRange::default());

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].wavelength_int, 400);
        assert_eq!(points[0].mean_absorbance_au, 2.0);
        assert_eq!(points[1].wavelength_int, 749);
        assert_eq!(points[1].mean_absorbance_au, 3.0);
    }

    #[test]
    fn emitted_bins_stay_inside_fractional_windows() {
        let window = WaveRange::new(400.5, 402.5).expect("window should be valid");
        let measurements = [
            measurement(400.7, 1.0),
            measurement(401.1, 2.0),
            measurement(402.4, 3.0),
        ];
        let points = aggregate_clean_data(&measurements, &window);

        for point in &points {
            assert!(window.contains(point.wavelength_int as f64));
        }
        assert_eq!(
            points
                .iter()
                .map(|point| point.wavelength_int)
                .collect::<Vec<_>>(),
            vec![401, 402]
        );
    }

    #[test]
    fn empty_window_yields_empty_curve() {
        let window = WaveRange::new(800.0, 900.0).expect("window should be valid");
        let points = aggregate_clean_data(&[measurement(500.0, 1.0)], &window);
        assert!(points.is_empty());
    }

    #[test]
    fn aggregation_is_idempotent() {
        let measurements = (0..300)
            .map(|index| measurement(400.0 + index as f64 * 0.37, (index % 17) as f64 * 0.01))
            .collect::<Vec<_>>();
        let window = WaveRange::default();

        let first = aggregate_clean_data(&measurements, &window);
        let second = aggregate_clean_data(&measurements, &window);
        assert_eq!(first, second);
    }

    #[test]
    fn truncation_matches_floor_for_physical_wavelengths() {
        assert_eq!(wavelength_bin(500.999), 500);
        assert_eq!(wavelength_bin(0.4), 0);
        assert_eq!(wavelength_bin(500.0), 500);
    }
}
