//! Correction-table files.
//!
//! Lookup CSV schema (also used for raw comparison samples):
//! position_mm,distance_mm
//!
//! Error CSV schema:
//! distance_mm,error_mm
//!
//! Raw samples are pairs of (reference encoder position, sensor distance)
//! recorded on a test rig. `compile_samples` turns them into a lookup table
//! and `error_table_from_samples` into a dense per-millimetre error table.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Reference position and the distance the sensor reported there.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct TableRow {
    pub position_mm: f32,
    pub distance_mm: f32,
}

/// Measured-minus-actual error at a sensor distance.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct ErrorRow {
    pub distance_mm: f32,
    pub error_mm: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BinMethod {
    #[default]
    Average,
    Median,
}

/// One compiled table entry with its spread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompiledBin {
    pub position_mm: f32,
    pub distance_mm: f32,
    pub count: usize,
    /// Population standard deviation of the binned distances (0 for a single sample).
    pub std_mm: f32,
}

impl From<CompiledBin> for TableRow {
    fn from(b: CompiledBin) -> Self {
        Self {
            position_mm: b.position_mm,
            distance_mm: b.distance_mm,
        }
    }
}

fn read_rows<T: serde::de::DeserializeOwned>(
    path: &Path,
    expected: [&str; 2],
    what: &str,
) -> eyre::Result<Vec<T>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open {what} CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "{what} CSV must have headers '{}', got: {}",
            expected.join(","),
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<T>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }
    Ok(rows)
}

fn ensure_increasing(keys: impl Iterator<Item = f32>, what: &str) -> eyre::Result<()> {
    let mut prev: Option<f32> = None;
    for (i, k) in keys.enumerate() {
        if !k.is_finite() {
            eyre::bail!("{what} row {} is not a finite number", i + 2);
        }
        if let Some(p) = prev
            && k <= p
        {
            eyre::bail!("{what} must be strictly increasing (row {} is {k} after {p})", i + 2);
        }
        prev = Some(k);
    }
    Ok(())
}

/// Load a compiled lookup table. Positions must be strictly increasing.
pub fn load_lookup_csv(path: &Path) -> eyre::Result<Vec<TableRow>> {
    let rows: Vec<TableRow> = read_rows(path, ["position_mm", "distance_mm"], "lookup")?;
    if rows.is_empty() {
        eyre::bail!("lookup CSV {:?} has no rows", path);
    }
    ensure_increasing(rows.iter().map(|r| r.position_mm), "lookup position_mm")?;
    Ok(rows)
}

/// Load an error table. Distances must be strictly increasing.
pub fn load_error_csv(path: &Path) -> eyre::Result<Vec<ErrorRow>> {
    let rows: Vec<ErrorRow> = read_rows(path, ["distance_mm", "error_mm"], "error")?;
    if rows.is_empty() {
        eyre::bail!("error CSV {:?} has no rows", path);
    }
    ensure_increasing(rows.iter().map(|r| r.distance_mm), "error distance_mm")?;
    Ok(rows)
}

/// Load raw comparison samples in recording order.
pub fn load_samples_csv(path: &Path) -> eyre::Result<Vec<TableRow>> {
    read_rows(path, ["position_mm", "distance_mm"], "samples")
}

pub fn write_lookup_csv(path: &Path, rows: &[TableRow]) -> eyre::Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| eyre::eyre!("create lookup CSV {:?}: {}", path, e))?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_error_csv(path: &Path, rows: &[ErrorRow]) -> eyre::Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| eyre::eyre!("create error CSV {:?}: {}", path, e))?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Copy `input` to `out` row by row, appending `convert(first column)` to each.
///
/// Rows are free-form; a first column that is not a number, or a conversion
/// that yields `None`, appends `N/A`. Returns the number of rows written.
pub fn append_converted_column(
    input: &Path,
    out: &Path,
    convert: impl Fn(f32) -> Option<f32>,
) -> eyre::Result<usize> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(input)
        .map_err(|e| eyre::eyre!("open batch CSV {:?}: {}", input, e))?;
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(out)
        .map_err(|e| eyre::eyre!("create batch CSV {:?}: {}", out, e))?;
    let mut n = 0;
    for rec in rdr.records() {
        let mut rec = rec?;
        let value = rec
            .get(0)
            .and_then(|s| s.trim().parse::<f32>().ok())
            .and_then(&convert);
        match value {
            Some(v) => rec.push_field(&format!("{v:.2}")),
            None => rec.push_field("N/A"),
        }
        wtr.write_record(&rec)?;
        n += 1;
    }
    wtr.flush()?;
    Ok(n)
}

/// Bin raw samples by `round(position / bin_mm) * bin_mm` and reduce each bin.
///
/// Non-finite samples are skipped. The result is sorted by position.
pub fn compile_samples(
    samples: &[TableRow],
    bin_mm: f32,
    method: BinMethod,
) -> eyre::Result<Vec<CompiledBin>> {
    if !(bin_mm.is_finite() && bin_mm > 0.0) {
        eyre::bail!("bin size must be a positive number, got {bin_mm}");
    }
    let mut bins: BTreeMap<i64, Vec<f32>> = BTreeMap::new();
    for s in samples
        .iter()
        .filter(|s| s.position_mm.is_finite() && s.distance_mm.is_finite())
    {
        let key = (f64::from(s.position_mm) / f64::from(bin_mm)).round() as i64;
        bins.entry(key).or_default().push(s.distance_mm);
    }
    if bins.is_empty() {
        eyre::bail!("no usable samples to compile");
    }

    let out = bins
        .into_iter()
        .map(|(key, mut values)| {
            let n = values.len();
            let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n as f64;
            let var = values
                .iter()
                .map(|&v| (f64::from(v) - mean).powi(2))
                .sum::<f64>()
                / n as f64;
            let distance = match method {
                BinMethod::Average => mean as f32,
                BinMethod::Median => median(&mut values),
            };
            CompiledBin {
                position_mm: (key as f64 * f64::from(bin_mm)) as f32,
                distance_mm: distance,
                count: n,
                std_mm: var.sqrt() as f32,
            }
        })
        .collect();
    Ok(out)
}

fn median(values: &mut [f32]) -> f32 {
    values.sort_by(f32::total_cmp);
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Dense error table indexed by whole millimetres of actual position.
///
/// Each sample contributes `distance - position` at `round(position)`; later
/// samples overwrite earlier ones. Empty slots are linearly interpolated
/// between the nearest populated neighbours, or copied from the only
/// neighbour at the edges. With no usable samples every slot is 0.
pub fn error_table_from_samples(samples: &[TableRow], max_mm: usize) -> Vec<f32> {
    let mut slots: Vec<Option<f32>> = vec![None; max_mm];
    for s in samples {
        if !(s.position_mm.is_finite() && s.distance_mm.is_finite()) {
            continue;
        }
        let idx = s.position_mm.round();
        if idx >= 0.0 && (idx as usize) < max_mm {
            slots[idx as usize] = Some(s.distance_mm - s.position_mm);
        }
    }

    let known: Vec<(usize, f32)> = slots
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|e| (i, e)))
        .collect();
    if known.is_empty() {
        return vec![0.0; max_mm];
    }

    let mut out = Vec::with_capacity(max_mm);
    let mut next = 0usize; // index into `known` of the first entry at or after i
    for i in 0..max_mm {
        while next < known.len() && known[next].0 < i {
            next += 1;
        }
        let right = known.get(next).copied();
        let left = next.checked_sub(1).map(|j| known[j]);
        let v = match (left, right) {
            (_, Some((ri, rv))) if ri == i => rv,
            (Some((li, lv)), Some((ri, rv))) => {
                let w = (i - li) as f32 / (ri - li) as f32;
                lv + w * (rv - lv)
            }
            (Some((_, lv)), None) => lv,
            (None, Some((_, rv))) => rv,
            (None, None) => 0.0,
        };
        out.push(v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(p: f32, d: f32) -> TableRow {
        TableRow {
            position_mm: p,
            distance_mm: d,
        }
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), 2.5);
    }

    #[test]
    fn error_table_fills_gaps_and_edges() {
        let t = error_table_from_samples(&[row(2.0, 3.0), row(6.0, 11.0)], 9);
        // errors: slot 2 = 1.0, slot 6 = 5.0
        assert_eq!(t[0], 1.0);
        assert_eq!(t[2], 1.0);
        assert!((t[4] - 3.0).abs() < 1e-6);
        assert_eq!(t[6], 5.0);
        assert_eq!(t[8], 5.0);
    }

    #[test]
    fn converted_column_is_appended_per_row() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let out = dir.path().join("out.csv");
        std::fs::write(&input, "sensor_mm,note\n12.5,a\n-1,b\n40\n").unwrap();

        let n = append_converted_column(&input, &out, |d| (d >= 0.0).then_some(d * 2.0)).unwrap();
        assert_eq!(n, 4);
        let text = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["sensor_mm,note,N/A", "12.5,a,25.00", "-1,b,N/A", "40,80.00"]);
    }

    #[test]
    fn error_table_without_samples_is_zero() {
        assert_eq!(error_table_from_samples(&[row(900.0, 1.0)], 4), vec![0.0; 4]);
    }
}
