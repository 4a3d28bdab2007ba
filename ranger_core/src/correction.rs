//! Empirical distance correction.
//!
//! Two table shapes are supported, both queried with the same rule: exact
//! match returns the paired value, queries outside the table clamp to the
//! nearest endpoint, anything in between is linearly interpolated.
//!
//! - `CorrectionTable` maps a raw sensor distance to the distance measured by
//!   a reference encoder at the same spot.
//! - `ErrorCorrectionTable` maps a distance to its systematic error, which is
//!   subtracted.
//!
//! All values are millimetres. Tables are immutable once built.

use thiserror::Error;

/// Default disagreement allowed between the two tables before the lookup table wins.
pub const DEFAULT_TOLERANCE_MM: f32 = 2.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TableError {
    #[error("correction table is empty")]
    Empty,
    #[error("correction table has a non-finite value at index {index}")]
    NonFinite { index: usize },
    #[error("correction table keys must be strictly increasing (index {index})")]
    NotIncreasing { index: usize },
}

fn split_points(
    points: impl IntoIterator<Item = (f32, f32)>,
) -> Result<(Vec<f32>, Vec<f32>), TableError> {
    let (keys, values): (Vec<f32>, Vec<f32>) = points.into_iter().unzip();
    if keys.is_empty() {
        return Err(TableError::Empty);
    }
    for (index, (k, v)) in keys.iter().zip(&values).enumerate() {
        if !(k.is_finite() && v.is_finite()) {
            return Err(TableError::NonFinite { index });
        }
        if index > 0 && *k <= keys[index - 1] {
            return Err(TableError::NotIncreasing { index });
        }
    }
    Ok((keys, values))
}

/// Nearest/interpolate query over sorted `keys`. `keys` must be non-empty.
fn interpolate(keys: &[f32], values: &[f32], x: f32) -> f32 {
    match keys.binary_search_by(|k| k.total_cmp(&x)) {
        Ok(i) => values[i],
        Err(0) => values[0],
        Err(i) if i >= keys.len() => values[keys.len() - 1],
        Err(i) => {
            let (x1, y1) = (keys[i - 1], values[i - 1]);
            let (x2, y2) = (keys[i], values[i]);
            y1 + (y2 - y1) * (x - x1) / (x2 - x1)
        }
    }
}

/// Position ↔ distance pairs sorted by position.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionTable {
    positions: Vec<f32>,
    distances: Vec<f32>,
}

impl CorrectionTable {
    /// Build from `(position_mm, distance_mm)` pairs with strictly increasing positions.
    pub fn new(points: impl IntoIterator<Item = (f32, f32)>) -> Result<Self, TableError> {
        let (positions, distances) = split_points(points)?;
        Ok(Self {
            positions,
            distances,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Always false; construction rejects empty tables.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.positions.iter().copied().zip(self.distances.iter().copied())
    }

    /// Paired distance for an exactly matching position.
    pub fn exact(&self, position: f32) -> Option<f32> {
        self.positions
            .iter()
            .position(|&p| p == position)
            .map(|i| self.distances[i])
    }

    /// Distance for `position`: exact, clamped at the ends, or interpolated.
    pub fn lookup(&self, position: f32) -> f32 {
        interpolate(&self.positions, &self.distances, position)
    }

    /// Entry at `index` as `(position, distance)`.
    pub fn entry(&self, index: usize) -> Option<(f32, f32)> {
        Some((*self.positions.get(index)?, *self.distances.get(index)?))
    }

    /// Index of the entry whose position is closest to `position` (first on ties).
    pub fn closest_index(&self, position: f32) -> usize {
        let mut best = 0;
        let mut best_diff = (position - self.positions[0]).abs();
        for (i, &p) in self.positions.iter().enumerate().skip(1) {
            let diff = (position - p).abs();
            if diff < best_diff {
                best = i;
                best_diff = diff;
            }
        }
        best
    }

    /// Position for a given distance.
    ///
    /// Distances at or beyond the smallest/largest table distance map to that
    /// entry's position. Otherwise the first pair of neighbouring entries that
    /// brackets `distance` (in either direction) is interpolated. Returns
    /// `None` only when no such pair has distinct distances.
    pub fn reverse_lookup(&self, distance: f32) -> Option<f32> {
        let (min_i, min_d) = self
            .distances
            .iter()
            .copied()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        let (max_i, max_d) = self
            .distances
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))?;
        if distance <= min_d {
            return Some(self.positions[min_i]);
        }
        if distance >= max_d {
            return Some(self.positions[max_i]);
        }
        for i in 0..self.len() - 1 {
            let (d1, d2) = (self.distances[i], self.distances[i + 1]);
            let brackets = (d1 <= distance && distance <= d2) || (d2 <= distance && distance <= d1);
            if brackets && d1 != d2 {
                let (p1, p2) = (self.positions[i], self.positions[i + 1]);
                return Some(p1 + (p2 - p1) * (distance - d1) / (d2 - d1));
            }
        }
        None
    }

    /// Offset from a sensor reading to its true position; 0 when unresolvable.
    pub fn correction_offset(&self, distance: f32) -> f32 {
        self.reverse_lookup(distance).map_or(0.0, |p| p - distance)
    }
}

/// Distance → systematic error pairs sorted by distance.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorCorrectionTable {
    distances: Vec<f32>,
    errors: Vec<f32>,
}

impl ErrorCorrectionTable {
    /// Build from `(distance_mm, error_mm)` pairs with strictly increasing distances.
    pub fn new(points: impl IntoIterator<Item = (f32, f32)>) -> Result<Self, TableError> {
        let (distances, errors) = split_points(points)?;
        Ok(Self { distances, errors })
    }

    /// Dense per-millimetre table: `errors[i]` is the error at `i` mm.
    pub fn from_dense(errors: &[f32]) -> Result<Self, TableError> {
        Self::new(errors.iter().enumerate().map(|(i, &e)| (i as f32, e)))
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    /// Always false; construction rejects empty tables.
    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    pub fn error_at(&self, distance_mm: f32) -> f32 {
        interpolate(&self.distances, &self.errors, distance_mm)
    }

    /// `distance_mm` minus its expected error.
    pub fn correct(&self, distance_mm: f32) -> f32 {
        distance_mm - self.error_at(distance_mm)
    }
}

/// Combines the optional tables into the pipeline's correction stage.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceCorrector {
    lookup: Option<CorrectionTable>,
    error: Option<ErrorCorrectionTable>,
    tolerance_mm: f32,
}

impl Default for DistanceCorrector {
    fn default() -> Self {
        Self {
            lookup: None,
            error: None,
            tolerance_mm: DEFAULT_TOLERANCE_MM,
        }
    }
}

impl DistanceCorrector {
    pub fn new(lookup: Option<CorrectionTable>, error: Option<ErrorCorrectionTable>) -> Self {
        Self {
            lookup,
            error,
            tolerance_mm: DEFAULT_TOLERANCE_MM,
        }
    }

    /// Passes every distance through unchanged.
    pub fn passthrough() -> Self {
        Self::default()
    }

    pub fn with_tolerance_mm(mut self, tolerance_mm: f32) -> Self {
        self.tolerance_mm = tolerance_mm;
        self
    }

    pub fn tolerance_mm(&self) -> f32 {
        self.tolerance_mm
    }

    pub fn lookup_table(&self) -> Option<&CorrectionTable> {
        self.lookup.as_ref()
    }

    pub fn error_table(&self) -> Option<&ErrorCorrectionTable> {
        self.error.as_ref()
    }

    pub fn is_configured(&self) -> bool {
        self.lookup.is_some() || self.error.is_some()
    }

    /// Corrected distance for a raw distance, both in millimetres.
    ///
    /// With an error table, its result is kept unless the lookup table
    /// (queried at the error-corrected value) disagrees by more than the
    /// tolerance. A lookup result of 0 or less is never used; the raw or
    /// error-corrected value is returned instead. Non-finite input is
    /// returned as-is.
    pub fn correct(&self, raw_mm: f32) -> f32 {
        if !raw_mm.is_finite() {
            return raw_mm;
        }
        let usable = |d: f32| (d > 0.0).then_some(d);
        match (&self.error, &self.lookup) {
            (None, None) => raw_mm,
            (None, Some(lookup)) => usable(lookup.lookup(raw_mm)).unwrap_or(raw_mm),
            (Some(error), lookup) => {
                let corrected = error.correct(raw_mm);
                match lookup.as_ref().and_then(|t| usable(t.lookup(corrected))) {
                    Some(from_lookup) if (from_lookup - corrected).abs() > self.tolerance_mm => {
                        from_lookup
                    }
                    _ => corrected,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample_table() -> CorrectionTable {
        CorrectionTable::new([
            (10.50, 10.45),
            (20.75, 20.78),
            (30.25, 30.22),
            (40.00, 40.03),
            (50.15, 50.12),
        ])
        .unwrap()
    }

    #[rstest]
    #[case(10.50, 10.45)]
    #[case(40.00, 40.03)]
    #[case(5.0, 10.45)]
    #[case(10.0, 10.45)]
    #[case(60.0, 50.12)]
    #[case(15.625, 15.615)]
    fn lookup_cases(#[case] position: f32, #[case] expected: f32) {
        let got = sample_table().lookup(position);
        assert!((got - expected).abs() < 1e-4, "{position} -> {got}");
    }

    #[test]
    fn construction_rejects_bad_tables() {
        assert_eq!(
            CorrectionTable::new(std::iter::empty()).unwrap_err(),
            TableError::Empty
        );
        assert_eq!(
            CorrectionTable::new([(1.0, 1.0), (1.0, 2.0)]).unwrap_err(),
            TableError::NotIncreasing { index: 1 }
        );
        assert_eq!(
            ErrorCorrectionTable::new([(1.0, f32::NAN)]).unwrap_err(),
            TableError::NonFinite { index: 0 }
        );
    }

    #[test]
    fn exact_and_closest_index() {
        let t = sample_table();
        assert_eq!(t.exact(20.75), Some(20.78));
        assert_eq!(t.exact(20.7), None);
        assert_eq!(t.closest_index(0.0), 0);
        assert_eq!(t.closest_index(29.0), 2);
        assert_eq!(t.closest_index(99.0), 4);
    }

    #[test]
    fn reverse_lookup_interpolates_and_clamps() {
        let t = sample_table();
        assert_eq!(t.reverse_lookup(0.0), Some(10.50));
        assert_eq!(t.reverse_lookup(99.0), Some(50.15));
        let mid = t.reverse_lookup(15.615).unwrap();
        assert!((mid - 15.625).abs() < 1e-3);
    }

    #[test]
    fn correction_offset_is_true_position_minus_reading() {
        let t = sample_table();
        assert!((t.correction_offset(15.615) - 0.01).abs() < 1e-3);
        assert!((t.correction_offset(0.0) - 10.50).abs() < 1e-6);
        assert_eq!(t.entry(1), Some((20.75, 20.78)));
        assert_eq!(t.entry(t.len()), None);
    }

    #[test]
    fn dense_error_table_subtracts_error() {
        let t = ErrorCorrectionTable::from_dense(&[0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(t.correct(2.0), 0.0);
        assert!((t.correct(1.5) - 0.0).abs() < 1e-6);
        // Clamped beyond the last entry.
        assert_eq!(t.correct(10.0), 7.0);
    }

    #[test]
    fn passthrough_without_tables() {
        let c = DistanceCorrector::passthrough();
        assert!(!c.is_configured());
        assert_eq!(c.correct(123.4), 123.4);
    }

    #[test]
    fn lookup_only_is_used_directly() {
        let c = DistanceCorrector::new(Some(sample_table()), None);
        assert!((c.correct(15.625) - 15.615).abs() < 1e-4);
    }

    #[test]
    fn lookup_wins_only_beyond_tolerance() {
        let lookup = CorrectionTable::new([(0.0, 0.0), (100.0, 105.0)]).unwrap();
        let error = ErrorCorrectionTable::new([(0.0, 0.0), (100.0, 0.0)]).unwrap();

        // At 20 mm the lookup says 21: within 2 mm, keep error-corrected value.
        let c = DistanceCorrector::new(Some(lookup.clone()), Some(error.clone()));
        assert_eq!(c.correct(20.0), 20.0);
        // At 80 mm the lookup says 84: beyond 2 mm, prefer lookup.
        assert_eq!(c.correct(80.0), 84.0);
        // Wider tolerance keeps the error-corrected value.
        let wide = DistanceCorrector::new(Some(lookup), Some(error)).with_tolerance_mm(5.0);
        assert_eq!(wide.correct(80.0), 80.0);
    }

    #[test]
    fn non_positive_lookup_result_is_ignored() {
        let lookup = CorrectionTable::new([(0.0, -10.0), (100.0, 0.0), (200.0, 190.0)]).unwrap();
        let only_lookup = DistanceCorrector::new(Some(lookup.clone()), None);
        assert_eq!(only_lookup.correct(50.0), 50.0);
        assert_eq!(only_lookup.correct(150.0), 95.0);

        let error = ErrorCorrectionTable::new([(0.0, 0.0), (200.0, 0.0)]).unwrap();
        let both = DistanceCorrector::new(Some(lookup), Some(error));
        // Lookup says -5 mm: far off, but unusable, so the error-corrected value stays.
        assert_eq!(both.correct(50.0), 50.0);
    }

    #[test]
    fn non_finite_input_passes_through() {
        let c = DistanceCorrector::new(Some(sample_table()), None);
        assert!(c.correct(f32::NAN).is_nan());
    }
}
