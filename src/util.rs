// Parsing, numeric, and formatting helpers shared by the pipeline stages.
//
// Raw CSV cells are turned into typed values here so the stages can assume
// clean `NaiveDate`s and `Option<f64>`s.
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};
use std::num::ParseFloatError;

const MISSING_TOKENS: [&str; 6] = ["", "nan", "na", "null", "none", "n/a"];

/// Parse a measurement cell.
///
/// - `Ok(None)` for the usual missing-value markers (empty, `NaN`, `NA`, ...).
/// - `Err` for anything else that is not a float.
/// - Non-finite parses (`inf`) are treated as missing.
pub fn parse_value(s: &str) -> Result<Option<f64>, ParseFloatError> {
    let s = s.trim();
    if MISSING_TOKENS.iter().any(|t| s.eq_ignore_ascii_case(t)) {
        return Ok(None);
    }
    let v = s.parse::<f64>()?;
    Ok(v.is_finite().then_some(v))
}

/// Parse a date cell to the first day of its month.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM`, and the two common timestamp forms
/// written by dataframe exports.
pub fn parse_month(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d").ok())
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                .ok()
                .map(|dt| dt.date())
        })?;
    month_start(date)
}

pub fn month_start(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)
}

/// Same day, `n` calendar months earlier.
pub fn months_before(date: NaiveDate, n: u32) -> Option<NaiveDate> {
    date.checked_sub_months(Months::new(n))
}

/// Arithmetic mean of the present values; `None` when nothing is present.
pub fn mean_of_present<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, n) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Mean and population standard deviation (divide by N).
pub fn mean_and_pop_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

pub fn round_to(v: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (v * factor).round() / factor
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with locale-aware thousands separators (`1,234.50`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

/// Render an optional float for tables; missing shows as `-`.
pub fn format_opt(n: Option<f64>, decimals: usize) -> String {
    match n {
        Some(v) => format_number(v, decimals),
        None => "-".to_string(),
    }
}

/// Signed rendering for deltas (`+3.5`, `-1.0`).
pub fn format_delta(n: Option<f64>) -> String {
    match n {
        Some(v) if v > 0.0 => format!("+{}", format_number(v, 1)),
        Some(v) => format_number(v, 1),
        None => "-".to_string(),
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}
