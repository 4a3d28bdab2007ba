use proptest::prelude::*;
use ranger_config::{TableRow, load_lookup_csv};
use ranger_core::conversions::load_corrector;
use ranger_core::{
    BASE_STEP_M, CorrectionTable, DistanceCorrector, ErrorCorrectionTable, RangeConfig,
    ThresholdLine, estimate,
};
use ranger_traits::Sample;
use std::fs;

const LOOKUP_CSV: &str = "position_mm,distance_mm
10.50,10.45
20.75,20.78
30.25,30.22
40.00,40.03
50.15,50.12
";

#[test]
fn csv_lookup_table_drives_the_corrector() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lookup.csv");
    fs::write(&path, LOOKUP_CSV).unwrap();

    let cfg = ranger_config::CorrectionCfg {
        lookup_csv: Some(path),
        ..ranger_config::CorrectionCfg::default()
    };
    let corrector = load_corrector(&cfg).unwrap();
    assert!((corrector.correct(15.625) - 15.615).abs() < 1e-4);
    assert!((corrector.correct(5.0) - 10.45).abs() < 1e-6);
}

#[test]
fn compiled_samples_become_a_table() {
    let samples = [
        TableRow {
            position_mm: 99.6,
            distance_mm: 101.0,
        },
        TableRow {
            position_mm: 100.4,
            distance_mm: 103.0,
        },
        TableRow {
            position_mm: 200.0,
            distance_mm: 198.0,
        },
    ];
    let bins =
        ranger_config::compile_samples(&samples, 1.0, ranger_config::BinMethod::Average).unwrap();
    let rows: Vec<TableRow> = bins.into_iter().map(TableRow::from).collect();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("compiled.csv");
    ranger_config::write_lookup_csv(&path, &rows).unwrap();
    let loaded = load_lookup_csv(&path).unwrap();
    let table = CorrectionTable::try_from(loaded.as_slice()).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.exact(100.0), Some(102.0));
    assert_eq!(table.lookup(150.0), 150.0);
}

#[test]
fn estimator_reports_corrected_distance_in_metres() {
    // distance_m(i) == i metres; crossing lands between 2 m and 3 m.
    let cfg = RangeConfig {
        start_point: 0,
        step_length: 1,
        num_points: 6,
        sweeps_per_frame: 1,
        rf_factor: BASE_STEP_M,
        x_intercepts: [0.0, 10.0, 20.0, 30.0],
        lines: [
            ThresholdLine {
                slope: 5.0,
                y_intercept: 0.0,
            },
            ThresholdLine::default(),
            ThresholdLine::default(),
        ],
    };
    let frame: Vec<Sample> = [0, 0, 100, 1300, 0, 0]
        .into_iter()
        .map(|re| Sample::new(re, 0))
        .collect();
    // A constant +100 mm error is subtracted.
    let error = ErrorCorrectionTable::new([(0.0, 100.0), (10_000.0, 100.0)]).unwrap();
    let corrector = DistanceCorrector::new(None, Some(error));

    let raw = estimate(&frame, &cfg, 20, &DistanceCorrector::passthrough());
    let corrected = estimate(&frame, &cfg, 20, &corrector);
    assert!(corrected.is_valid());
    assert_eq!(corrected.raw_distance_m, raw.raw_distance_m);
    assert!((raw.distance_m - corrected.distance_m - 0.1).abs() < 1e-4);
}

fn table_strategy() -> impl Strategy<Value = CorrectionTable> {
    proptest::collection::vec((0.5f32..50.0, -100.0f32..100.0), 1..20).prop_map(|steps| {
        let mut pos = 0.0f32;
        let points: Vec<(f32, f32)> = steps
            .into_iter()
            .map(|(dp, d)| {
                pos += dp;
                (pos, d)
            })
            .collect();
        CorrectionTable::new(points).unwrap()
    })
}

proptest! {
    #[test]
    fn correction_is_deterministic(table in table_strategy(), raw in -500.0f32..2000.0) {
        let c = DistanceCorrector::new(Some(table), None);
        prop_assert_eq!(c.correct(raw).to_bits(), c.correct(raw).to_bits());
    }

    #[test]
    fn lookup_stays_within_table_range(table in table_strategy(), raw in -500.0f32..2000.0) {
        let (lo, hi) = table
            .points()
            .fold((f32::MAX, f32::MIN), |(lo, hi), (_, d)| (lo.min(d), hi.max(d)));
        let v = table.lookup(raw);
        prop_assert!(v >= lo - 1e-3 && v <= hi + 1e-3);
    }
}
