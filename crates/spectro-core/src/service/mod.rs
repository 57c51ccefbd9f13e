//! Query and export operations keyed by stored ids. Curves are rebuilt from
//! the stored measurements on every call.

use crate::aggregate::aggregate_clean_data;
use crate::domain::{
    AggregatedPoint, ConfigId, QueryId, RawMeasurement, SpectroError, SpectroResult,
};
use crate::export::{SpreadsheetArtifact, clean_data_spreadsheet};
use crate::extremum::{LocalMaximumReport, evaluate_queries, find_local_maximum};
use crate::store::MeasurementStore;

pub const MEASUREMENTS_PER_PAGE: usize = 100;

/// One page of a config's raw measurements, ascending by wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementPage {
    pub rows: Vec<RawMeasurement>,
    /// 1-based.
    pub page: usize,
    pub page_count: usize,
    pub total: usize,
}

pub fn get_clean_data(
    store: &MeasurementStore,
    config_id: ConfigId,
) -> SpectroResult<Vec<AggregatedPoint>> {
    let config = store.processing_config(config_id)?;
    let measurements = store.measurements(config_id)?;
    Ok(aggregate_clean_data(measurements, &config.range))
}

/// Maximum of the parent config's curve inside the query range. `Ok(None)`
/// when no bin falls in the range.
pub fn get_local_maximum(
    store: &MeasurementStore,
    query_id: QueryId,
) -> SpectroResult<Option<AggregatedPoint>> {
    let query = store.local_maximum_query(query_id)?;
    let curve = get_clean_data(store, query.config_id)?;
    Ok(find_local_maximum(&curve, &query.range))
}

pub fn local_maxima_for_config(
    store: &MeasurementStore,
    config_id: ConfigId,
) -> SpectroResult<Vec<LocalMaximumReport>> {
    let queries = store.queries_for_config(config_id)?;
    let curve = get_clean_data(store, config_id)?;
    Ok(evaluate_queries(&curve, queries))
}

/// Raw rows of `config_id` sorted by wavelength and cut into pages of
/// `per_page`. An empty measurement set is a single empty page; any other
/// page outside `1..=page_count` is an input error.
pub fn measurement_page(
    store: &MeasurementStore,
    config_id: ConfigId,
    page: usize,
    per_page: usize,
) -> SpectroResult<MeasurementPage> {
    let measurements = store.measurements(config_id)?;
    let per_page = per_page.max(1);
    let total = measurements.len();
    let page_count = total.div_ceil(per_page).max(1);
    if page == 0 || page > page_count {
        return Err(SpectroError::input_validation(
            "INPUT.PAGE",
            format!("page {page} is out of range; config {config_id} has {page_count} page(s)"),
        ));
    }

    let mut sorted = measurements.to_vec();
    sorted.sort_by(|left, right| left.wavelength_nm.total_cmp(&right.wavelength_nm));
    let rows = sorted
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();
    Ok(MeasurementPage {
        rows,
        page,
        page_count,
        total,
    })
}

pub fn export_clean_data_as_spreadsheet(
    store: &MeasurementStore,
    config_id: ConfigId,
) -> SpectroResult<SpreadsheetArtifact> {
    let curve = get_clean_data(store, config_id)?;
    clean_data_spreadsheet(config_id, &curve)
}

#[cfg(test)]
mod tests {
    use super::{
        export_clean_data_as_spreadsheet, get_clean_data, get_local_maximum,
        local_maxima_for_config, measurement_page,
    };
    use crate::domain::{
        ConfigId, ProcessMethod, QueryId, RawMeasurement, SpectroErrorCategory, WaveRange,
    };
    use crate::store::{MeasurementStore, NewUpload};
    use std::path::PathBuf;

    fn measurement(wavelength_nm: f64, absorbance_au: f64) -> RawMeasurement {
        RawMeasurement {
            wavelength_nm,
            dark_counts: 10.0,
            ref_counts: 900.0,
            sample_counts: 400.0,
            absorbance_au,
        }
    }

    fn range(start: f64, end: f64) -> WaveRange {
        WaveRange::new(start, end).expect("range should be valid")
    }

    fn store_with(measurements: Vec<RawMeasurement>) -> (MeasurementStore, ConfigId) {
        let mut store = MeasurementStore::in_memory();
        let config_id = store
            .transaction(|tx| {
                let upload_id = tx.insert_upload(NewUpload {
                    original_name: "run.txt".to_string(),
                    stored_path: PathBuf::from("run.txt"),
                    encoding: "UTF-8".to_string(),
                    process_method: ProcessMethod::Absorbance,
                });
                let sample_id = tx.insert_sample(upload_id, "run")?;
                let config_id = tx.insert_processing_config(sample_id, WaveRange::default())?;
                tx.insert_measurements(config_id, measurements)?;
                Ok(config_id)
            })
            .expect("fixture should commit");
        (store, config_id)
    }

    #[test]
    fn clean_data_is_recomputed_after_range_edit() {
        let (mut store, config_id) = store_with(vec![
            measurement(399.5, 9.0),
            measurement(500.2, 0.1),
            measurement(500.4, 0.3),
            measurement(500.6, 0.2),
            measurement(620.0, 0.7),
        ]);

        let curve = get_clean_data(&store, config_id).expect("curve");
        assert_eq!(curve.len(), 2);
        assert_eq!(curve[0].wavelength_int, 500);
        assert!((curve[0].mean_absorbance_au - 0.2).abs() < 1e-12);

        store
            .update_processing_range(config_id, range(600.0, 700.0))
            .expect("range update should commit");
        let curve = get_clean_data(&store, config_id).expect("curve");
        assert_eq!(curve.len(), 1);
        assert_eq!(curve[0].wavelength_int, 620);
    }

    #[test]
    fn local_maximum_follows_query_range() {
        let (mut store, config_id) = store_with(vec![
            measurement(510.0, 0.8),
            measurement(511.0, 0.4),
            measurement(512.0, 0.8),
            measurement(540.0, 2.0),
        ]);
        let inside = store
            .add_local_maximum_query(config_id, range(505.0, 520.0))
            .expect("query should be stored");
        let outside = store
            .add_local_maximum_query(config_id, range(800.0, 900.0))
            .expect("query should be stored");

        let maximum = get_local_maximum(&store, inside)
            .expect("lookup should succeed")
            .expect("range holds points");
        assert_eq!(maximum.wavelength_int, 510);
        assert_eq!(get_local_maximum(&store, outside).expect("lookup"), None);

        let reports = local_maxima_for_config(&store, config_id).expect("reports");
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].query_id, inside);
        assert_eq!(reports[1].maximum, None);
    }

    #[test]
    fn query_edits_and_removal_are_seen_by_later_lookups() {
        let (mut store, config_id) = store_with(vec![
            measurement(500.0, 0.4),
            measurement(520.0, 0.1),
            measurement(600.0, 0.9),
            measurement(640.0, 0.2),
        ]);
        let query_id = store
            .add_local_maximum_query(config_id, range(450.0, 550.0))
            .expect("query should be stored");
        let maximum = get_local_maximum(&store, query_id)
            .expect("lookup should succeed")
            .expect("range holds points");
        assert_eq!(maximum.wavelength_int, 500);

        store
            .update_local_maximum_query(query_id, range(550.0, 650.0))
            .expect("query update should commit");
        let maximum = get_local_maximum(&store, query_id)
            .expect("lookup should succeed")
            .expect("range holds points");
        assert_eq!(maximum.wavelength_int, 600);
        assert!((maximum.mean_absorbance_au - 0.9).abs() < 1e-12);

        let removed = store
            .delete_local_maximum_query(query_id)
            .expect("query removal should commit");
        assert_eq!(removed.range, range(550.0, 650.0));
        let error = get_local_maximum(&store, query_id).expect_err("query is gone");
        assert_eq!(error.category(), SpectroErrorCategory::NotFoundError);
        assert_eq!(error.placeholder(), "LOOKUP.LOCAL_MAXIMUM_QUERY");
        let reports = local_maxima_for_config(&store, config_id).expect("config still exists");
        assert!(reports.is_empty());
    }

    #[test]
    fn measurement_pages_are_sorted_by_wavelength() {
        let (store, config_id) = store_with(
            [430.0, 410.0, 420.0, 450.0, 440.0]
                .into_iter()
                .map(|wavelength_nm| measurement(wavelength_nm, 0.1))
                .collect(),
        );

        let first = measurement_page(&store, config_id, 1, 2).expect("first page");
        assert_eq!(first.total, 5);
        assert_eq!(first.page_count, 3);
        let wavelengths = first
            .rows
            .iter()
            .map(|row| row.wavelength_nm)
            .collect::<Vec<_>>();
        assert_eq!(wavelengths, [410.0, 420.0]);

        let last = measurement_page(&store, config_id, 3, 2).expect("last page");
        assert_eq!(last.rows.len(), 1);
        assert_eq!(last.rows[0].wavelength_nm, 450.0);

        for page in [0, 4] {
            let error = measurement_page(&store, config_id, page, 2).expect_err("out of range");
            assert_eq!(error.category(), SpectroErrorCategory::InputValidationError);
            assert_eq!(error.placeholder(), "INPUT.PAGE");
        }

        let (empty, empty_config) = store_with(Vec::new());
        let page = measurement_page(&empty, empty_config, 1, 100).expect("empty page");
        assert!(page.rows.is_empty());
        assert_eq!(page.page_count, 1);
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let (store, _) = store_with(Vec::new());

        let error = get_clean_data(&store, ConfigId(42)).expect_err("unknown config");
        assert_eq!(error.category(), SpectroErrorCategory::NotFoundError);
        assert_eq!(error.placeholder(), "LOOKUP.PROCESSING_CONFIG");

        let error = get_local_maximum(&store, QueryId(7)).expect_err("unknown query");
        assert_eq!(error.placeholder(), "LOOKUP.LOCAL_MAXIMUM_QUERY");

        let error =
            export_clean_data_as_spreadsheet(&store, ConfigId(42)).expect_err("unknown config");
        assert!(error.is_not_found());
    }

    #[test]
    fn export_is_named_after_config() {
        let (store, config_id) = store_with(vec![measurement(450.0, 0.5)]);
        let artifact = export_clean_data_as_spreadsheet(&store, config_id).expect("export");
        assert_eq!(artifact.file_name, format!("data_id-{config_id}.xlsx"));
    }
}
