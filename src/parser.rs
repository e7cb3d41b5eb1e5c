use crate::utils::error::{EngineError, Result};

/// Normalizes a raw extracted string into a numeric price.
///
/// Keeps only ASCII digits and the two separator characters `.` and `,`,
/// drops everything else (currency symbols, letters, whitespace), then
/// replaces every retained comma with a dot and parses as `f64`. The value
/// is stored in the page's display units; no rounding, no conversion.
///
/// Known limitation: thousands separators are not distinguished from
/// decimal separators. `12,99 zł` parses to `12.99`, but `$ 1.234,56`
/// normalizes to `1.234.56` and fails. Mixed-separator prices need a
/// different rule on the page side.
pub fn parse(raw: Option<&str>) -> Result<f64> {
    let raw = raw.ok_or_else(|| EngineError::Parse("page evaluation returned no text".into()))?;

    let filtered: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    if !filtered.chars().any(|c| c.is_ascii_digit()) {
        return Err(EngineError::Parse(format!("no digits in {raw:?}")));
    }

    let normalized = filtered.replace(',', ".");
    let price: f64 = normalized
        .parse()
        .map_err(|_| EngineError::Parse(format!("not a number after normalization: {normalized:?}")))?;

    if !price.is_finite() {
        return Err(EngineError::Parse(format!("price out of range: {normalized:?}")));
    }

    Ok(price)
}
