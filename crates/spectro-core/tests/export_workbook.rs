use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
use spectro_core::domain::{AggregatedPoint, ConfigId};
use spectro_core::export::{CLEAN_DATA_SHEET_NAME, clean_data_spreadsheet};
use std::io::Cursor;

fn read_sheet(bytes: Vec<u8>) -> calamine::Range<Data> {
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(Cursor::new(bytes)).expect("workbook should open");
    assert_eq!(workbook.sheet_names(), vec![CLEAN_DATA_SHEET_NAME.to_string()]);
    workbook
        .worksheet_range(CLEAN_DATA_SHEET_NAME)
        .expect("clean_data sheet should be readable")
}

#[test]
fn exported_workbook_has_header_plus_one_row_per_point() {
    let points = [
        AggregatedPoint {
            wavelength_int: 500,
            mean_absorbance_au: 0.2,
        },
        AggregatedPoint {
            wavelength_int: 501,
            mean_absorbance_au: 0.35,
        },
        AggregatedPoint {
            wavelength_int: 503,
            mean_absorbance_au: -0.01,
        },
    ];
    let artifact = clean_data_spreadsheet(ConfigId(12), &points).expect("export should render");
    let sheet = read_sheet(artifact.bytes);

    assert_eq!(sheet.height(), points.len() + 1);
    assert_eq!(
        sheet.get((0, 0)),
        Some(&Data::String("wave_nm".to_string()))
    );
    assert_eq!(
        sheet.get((0, 1)),
        Some(&Data::String("avg_absorbance_au".to_string()))
    );
    for (row, point) in points.iter().enumerate().map(|(index, point)| (index + 1, point)) {
        assert_eq!(
            sheet.get((row, 0)),
            Some(&Data::Float(point.wavelength_int as f64))
        );
        assert_eq!(
            sheet.get((row, 1)),
            Some(&Data::Float(point.mean_absorbance_au))
        );
    }
}

#[test]
fn empty_curve_exports_header_row_only() {
    let artifact = clean_data_spreadsheet(ConfigId(1), &[]).expect("export should render");
    let sheet = read_sheet(artifact.bytes);
    assert_eq!(sheet.height(), 1);
}
