//! OSC number encoding used by the console for record numbers.
//!
//! A whole number travels as an integer, a fractional number as a decimal
//! string and a run of consecutive whole numbers as an inclusive `"X-Y"` string.

use crate::message::Argument;

/// Longest `"X-Y"` run accepted. Console numbers stop at 99999, so anything
/// wider is malformed.
pub const MAX_RANGE: i64 = 100_000;

/// Expands one argument into the numbers it names.
pub fn expand(argument: &Argument) -> Vec<f64> {
    match argument {
        Argument::Int(value) => vec![f64::from(*value)],
        Argument::Float(value) => vec![f64::from(*value)],
        Argument::String(value) => expand_str(value),
        Argument::Bool(_) => Vec::new(),
    }
}

/// Expands every argument and concatenates the results.
pub fn expand_all<'a>(arguments: impl IntoIterator<Item = &'a Argument>) -> Vec<f64> {
    arguments.into_iter().flat_map(expand).collect()
}

fn expand_str(value: &str) -> Vec<f64> {
    let components: Vec<&str> = value.split('-').collect();
    match components.as_slice() {
        [single] => match single.parse::<f64>() {
            Ok(number) if number.is_finite() => vec![number],
            _ => Vec::new(),
        },
        [start, end] => match (start.parse::<i64>(), end.parse::<i64>()) {
            (Ok(start), Ok(end)) if start <= end && end - start < MAX_RANGE => {
                (start..=end).map(|n| n as f64).collect()
            }
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Renders a number as an address segment: `5`, `0.5`, `12.25`.
pub fn format_number(number: f64) -> String {
    if number.fract() == 0.0 {
        format!("{}", number as i64)
    } else {
        format!("{}", number)
    }
}
