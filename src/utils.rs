// Utility functions for GamblingDen Core

/// Round to 2 decimal places (cents)
///
/// The epsilon nudge keeps values like 1.005 from rounding down due to
/// their binary representation.
pub fn round2(n: f64) -> f64 {
    ((n + f64::EPSILON) * 100.0).round() / 100.0
}

/// Clamp a value into [min, max]; NaN collapses to `min`
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return min;
    }
    value.max(min).min(max)
}

/// Format an amount as euros, e.g. `€12.50`
pub fn format_euro(n: f64) -> String {
    format!("€{:.2}", round2(n))
}

/// Short form for XP and large counters, e.g. `1.5K`, `2.0M`
pub fn format_compact(n: f64) -> String {
    if n >= 1_000_000.0 {
        format!("{:.1}M", n / 1_000_000.0)
    } else if n >= 1_000.0 {
        format!("{:.1}K", n / 1_000.0)
    } else {
        format!("{}", n)
    }
}
