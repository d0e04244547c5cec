//! Format checks for numeric, dating and dimension field values.

use serde_json::{Map, Value};

use crate::schema::InputType;

/// Whether `value` is a well-formed number for `input_type`.
pub fn is_valid_number(input_type: InputType, value: &Value) -> bool {
    let Value::Number(number) = value else {
        return false;
    };
    match input_type {
        InputType::Int => number.is_i64() || number.is_u64(),
        InputType::UnsignedInt => number.is_u64(),
        InputType::Float => number.as_f64().is_some_and(f64::is_finite),
        InputType::UnsignedFloat => number.as_f64().is_some_and(|f| f.is_finite() && f >= 0.0),
        _ => true,
    }
}

const DATING_TYPES: &[&str] = &["range", "exact", "before", "after", "scientific"];
const LENGTH_UNITS: &[&str] = &["mm", "cm", "m"];

/// Years before present are counted from 1950.
const BP_ZERO: i64 = 1950;

/// A dating field holds a list of datings.
pub fn is_valid_dating_list(value: &Value) -> bool {
    matches!(value.as_array(), Some(items) if items.iter().all(is_valid_dating))
}

fn is_valid_dating(value: &Value) -> bool {
    let Some(dating) = value.as_object() else {
        return false;
    };
    let Some(kind) = dating.get("type").and_then(Value::as_str) else {
        return false;
    };
    if !DATING_TYPES.contains(&kind) || !optional_bools(dating, &["isImprecise", "isUncertain"]) {
        return false;
    }

    let begin = dating.get("begin").map(normalized_year);
    let end = dating.get("end").map(normalized_year);
    let (begin, end) = match (begin, end) {
        (Some(None), _) | (_, Some(None)) => return false,
        (b, e) => (b.flatten(), e.flatten()),
    };

    match kind {
        "range" => matches!((begin, end), (Some(b), Some(e)) if b <= e),
        "after" => begin.is_some(),
        "scientific" => end.is_some() && margin_valid(dating),
        _ => end.is_some(),
    }
}

/// Year on a common axis (negative = BCE), `None` when malformed.
fn normalized_year(value: &Value) -> Option<i64> {
    let year = value.as_object()?;
    let input_year = year.get("inputYear")?.as_i64()?;
    let input_type = year.get("inputType")?.as_str()?;
    match input_type {
        "bce" if input_year >= 0 => Some(-input_year),
        "ce" => Some(input_year),
        "bp" if input_year >= 0 => Some(BP_ZERO - input_year),
        _ => None,
    }
}

fn margin_valid(dating: &Map<String, Value>) -> bool {
    match dating.get("margin") {
        None => true,
        Some(margin) => margin.as_u64().is_some(),
    }
}

/// A dimension field holds a list of measurements.
pub fn is_valid_dimension_list(value: &Value) -> bool {
    matches!(value.as_array(), Some(items) if items.iter().all(is_valid_dimension))
}

fn is_valid_dimension(value: &Value) -> bool {
    let Some(dimension) = value.as_object() else {
        return false;
    };
    let Some(input_value) = dimension.get("inputValue").and_then(Value::as_f64) else {
        return false;
    };
    if !input_value.is_finite() || input_value < 0.0 {
        return false;
    }
    let unit_ok = dimension
        .get("inputUnit")
        .and_then(Value::as_str)
        .is_some_and(|u| LENGTH_UNITS.contains(&u));
    if !unit_ok {
        return false;
    }
    if let Some(end) = dimension.get("inputRangeEndValue") {
        match end.as_f64() {
            Some(end) if end > input_value => {}
            _ => return false,
        }
    }
    optional_bools(dimension, &["isImprecise"])
        && optional_strings(dimension, &["measurementPosition", "measurementComment"])
}

fn optional_bools(map: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter()
        .all(|k| map.get(*k).map_or(true, Value::is_boolean))
}

fn optional_strings(map: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter()
        .all(|k| map.get(*k).map_or(true, Value::is_string))
}
