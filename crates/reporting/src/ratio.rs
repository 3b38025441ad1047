//! Guarded arithmetic shared by every aggregation level.

/// `numerator / denominator`, or 0 when the denominator is not strictly
/// positive or the result would not be finite.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        let value = numerator / denominator;
        if value.is_finite() {
            return value;
        }
    }
    0.0
}

/// `numerator / denominator * 100`, guarded like [`ratio`].
pub fn percent(numerator: f64, denominator: f64) -> f64 {
    ratio(numerator, denominator) * 100.0
}
