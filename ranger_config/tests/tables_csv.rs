use std::fs::File;
use std::io::Write;

use proptest::prelude::*;
use ranger_config::{
    BinMethod, ErrorRow, TableRow, compile_samples, error_table_from_samples, load_error_csv,
    load_lookup_csv, load_samples_csv, write_error_csv, write_lookup_csv,
};
use rstest::rstest;
use tempfile::tempdir;

fn row(p: f32, d: f32) -> TableRow {
    TableRow {
        position_mm: p,
        distance_mm: d,
    }
}

#[rstest]
fn lookup_csv_loads_in_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lookup.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "position_mm,distance_mm").unwrap();
    writeln!(f, "10.50, 10.45").unwrap();
    writeln!(f, "20.75,20.78").unwrap();

    let rows = load_lookup_csv(&path).unwrap();
    assert_eq!(rows, vec![row(10.5, 10.45), row(20.75, 20.78)]);
}

#[rstest]
#[case("position,distance", "must have headers 'position_mm,distance_mm'")]
#[case("distance_mm,position_mm", "must have headers 'position_mm,distance_mm'")]
fn lookup_csv_rejects_wrong_headers(#[case] header: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lookup.csv");
    std::fs::write(&path, format!("{header}\n1.0,2.0\n")).unwrap();

    let err = load_lookup_csv(&path).unwrap_err();
    assert!(format!("{err}").contains(needle), "got: {err}");
}

#[rstest]
#[case("position_mm,distance_mm\n2.0,2.0\n1.0,1.0\n", "strictly increasing")]
#[case("position_mm,distance_mm\n2.0,2.0\n2.0,3.0\n", "strictly increasing")]
#[case("position_mm,distance_mm\n", "has no rows")]
#[case("position_mm,distance_mm\n1.0,abc\n", "invalid CSV row 2")]
fn lookup_csv_rejects_unusable_rows(#[case] body: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lookup.csv");
    std::fs::write(&path, body).unwrap();

    let err = load_lookup_csv(&path).unwrap_err();
    assert!(format!("{err}").contains(needle), "got: {err}");
}

#[rstest]
fn error_csv_requires_its_own_headers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("errors.csv");
    std::fs::write(&path, "position_mm,distance_mm\n1.0,0.5\n").unwrap();

    let err = load_error_csv(&path).unwrap_err();
    assert!(format!("{err}").contains("must have headers 'distance_mm,error_mm'"));
}

#[rstest]
fn samples_may_repeat_positions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("samples.csv");
    std::fs::write(&path, "position_mm,distance_mm\n5.0,5.2\n5.0,4.9\n1.0,1.1\n").unwrap();

    let rows = load_samples_csv(&path).unwrap();
    assert_eq!(rows.len(), 3);
}

#[rstest]
#[case(BinMethod::Average, 1.875)]
#[case(BinMethod::Median, 1.75)]
fn compile_reduces_each_bin(#[case] method: BinMethod, #[case] expected: f32) {
    let samples = [row(9.8, 1.0), row(10.1, 2.0), row(10.2, 3.0), row(10.4, 1.5)];
    // 9.8..10.4 all round into the 10 mm bin
    let bins = compile_samples(&samples[..], 1.0, method).unwrap();
    assert_eq!(bins.len(), 1);
    assert_eq!(bins[0].position_mm, 10.0);
    assert_eq!(bins[0].count, 4);
    assert!((bins[0].distance_mm - expected).abs() < 1e-6, "{bins:?}");
}

#[rstest]
fn compile_sorts_bins_and_reports_spread() {
    let samples = [row(20.0, 21.0), row(10.0, 9.0), row(10.0, 11.0)];
    let bins = compile_samples(&samples, 5.0, BinMethod::Average).unwrap();
    let positions: Vec<f32> = bins.iter().map(|b| b.position_mm).collect();
    assert_eq!(positions, vec![10.0, 20.0]);
    assert!((bins[0].std_mm - 1.0).abs() < 1e-6);
    assert_eq!(bins[1].std_mm, 0.0);
}

#[rstest]
#[case(0.0)]
#[case(-1.0)]
#[case(f32::NAN)]
fn compile_rejects_bad_bin_size(#[case] bin_mm: f32) {
    assert!(compile_samples(&[row(1.0, 1.0)], bin_mm, BinMethod::Average).is_err());
}

#[rstest]
fn written_tables_load_back() {
    let dir = tempdir().unwrap();
    let lookup = dir.path().join("lookup.csv");
    let errors = dir.path().join("errors.csv");

    let rows = vec![row(100.0, 101.5), row(200.0, 199.25)];
    write_lookup_csv(&lookup, &rows).unwrap();
    assert_eq!(load_lookup_csv(&lookup).unwrap(), rows);

    let err_rows = vec![
        ErrorRow {
            distance_mm: 0.0,
            error_mm: 1.5,
        },
        ErrorRow {
            distance_mm: 1.0,
            error_mm: -0.5,
        },
    ];
    write_error_csv(&errors, &err_rows).unwrap();
    assert_eq!(load_error_csv(&errors).unwrap(), err_rows);
}

proptest! {
    #[test]
    fn error_table_is_dense_and_finite(
        samples in proptest::collection::vec((-50.0f32..400.0, -50.0f32..450.0), 0..32),
        max_mm in 1usize..300,
    ) {
        let rows: Vec<TableRow> = samples.into_iter().map(|(p, d)| row(p, d)).collect();
        let table = error_table_from_samples(&rows, max_mm);
        prop_assert_eq!(table.len(), max_mm);
        prop_assert!(table.iter().all(|e| e.is_finite()));
    }
}
