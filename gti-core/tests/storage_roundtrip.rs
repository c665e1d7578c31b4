//! Save frames to the dated layout and read them back into analytics.

use chrono::NaiveDate;
use gti_core::analytics::DataAnalytics;
use gti_core::data::{format_of, load_local, DataSaver, FileFormat, StorageError};
use gti_core::frame::TimeFrame;

fn sample() -> TimeFrame {
    DataAnalytics::dummy_value(Some(11)).unwrap()
}

#[test]
fn parquet_save_then_load_preserves_frame() {
    let tmp = tempfile::tempdir().unwrap();
    let saver = DataSaver::new(tmp.path());
    let frame = sample();
    let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();

    let paths = saver
        .save_on(date, &[("dummy", frame.to_dataframe().unwrap())], FileFormat::Parquet)
        .unwrap();
    let df = load_local(&paths[0], format_of(&paths[0]).unwrap()).unwrap();
    let back = TimeFrame::from_dataframe(&df).unwrap();
    assert_eq!(back, frame);
}

#[test]
fn csv_save_then_load_parses_dates() {
    let tmp = tempfile::tempdir().unwrap();
    let saver = DataSaver::new(tmp.path());
    let frame = sample();
    let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();

    let paths = saver
        .save_on(date, &[("dummy", frame.to_dataframe().unwrap())], FileFormat::Csv)
        .unwrap();
    assert!(paths[0].ends_with("2024/01/05/dummy.csv"));

    let df = load_local(&paths[0], FileFormat::Csv).unwrap();
    let back = TimeFrame::from_dataframe(&df).unwrap();
    assert_eq!(back.dates(), frame.dates());
    assert_eq!(back.column("Value").unwrap(), frame.column("Value").unwrap());
}

#[test]
fn missing_file_and_unknown_extension() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("nope.parquet");
    assert!(matches!(
        load_local(&missing, FileFormat::Parquet),
        Err(StorageError::Io { .. })
    ));
    assert!(matches!(
        format_of(&tmp.path().join("frame.xlsx")),
        Err(StorageError::UnsupportedFormat(_))
    ));
}
