//! Shared range-validation helpers used by all domain validators.

/// Push an error if `value` is outside `[min, max]` (integer).
pub(crate) fn validate_range(errors: &mut Vec<String>, name: &str, value: u32, min: u32, max: u32) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

/// Push an error if `value` is outside `[min, max]` (float).
pub(crate) fn validate_range_f64(
    errors: &mut Vec<String>,
    name: &str,
    value: f64,
    min: f64,
    max: f64,
) {
    if !(min..=max).contains(&value) {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

/// Push an error unless `lower < middle < upper`.
pub(crate) fn validate_ascending<T: PartialOrd + std::fmt::Display>(
    errors: &mut Vec<String>,
    name: &str,
    lower: T,
    middle: T,
    upper: T,
) {
    if !(lower < middle && middle < upper) {
        errors.push(format!(
            "{name} thresholds must be strictly ascending (got {lower}, {middle}, {upper})"
        ));
    }
}
