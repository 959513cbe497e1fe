//! Value parsers shared by the service binaries' `clap` arguments.

/// Parses a failure probability, rejecting anything outside `[0, 1]`.
pub fn parse_failure_rate(value: &str) -> Result<f64, String> {
    let rate: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("`{value}` is not a number: {e}"))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(format!("failure rate must be between 0 and 1, got {rate}"));
    }
    Ok(rate)
}

/// Splits a comma-separated list, trimming whitespace and dropping empty entries.
pub fn parse_key_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(ToString::to_string)
        .collect()
}
