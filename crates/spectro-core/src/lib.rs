pub mod aggregate;
pub mod domain;
pub mod export;
pub mod extremum;
pub mod ingest;
pub mod parser;
pub mod service;
pub mod store;

pub use domain::{SpectroError, SpectroErrorCategory, SpectroResult};
pub use ingest::{IngestReport, IngestRequest, ingest_file};
pub use service::{
    MeasurementPage, export_clean_data_as_spreadsheet, get_clean_data, get_local_maximum,
    local_maxima_for_config, measurement_page,
};
pub use store::MeasurementStore;
