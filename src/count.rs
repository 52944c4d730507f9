//! Absent-aware arithmetic on `Option<f64>` counts.
//!
//! Rules:
//! - a sum ignores absent terms, and is absent only when every term is
//! - a ratio is absent when either side is absent or the denominator is zero

/// Sum present values; `None` when no value is present.
pub fn sum_present<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values
        .into_iter()
        .flatten()
        .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

/// `numerator / denominator` with absent propagation.
pub fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

/// Whether two counts agree within half a student.
///
/// FTE-weighted reports carry fractional grade counts, so exact equality is
/// too strict for total-vs-sum checks.
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.5
}
