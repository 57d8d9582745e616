//! Declared datatypes and input types, and value coercion

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Datatype a question's response is coerced to before validation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Datatype {
    Integer,
    Float,
    Boolean,
    String,
}

/// How a question is presented; drives array coercion and live-interaction
/// detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    #[default]
    String,
    Text,
    Number,
    Radio,
    Select,
    Checkbox,
    MultiSelect,
    MapPoint,
    MapFindPlace,
    Custom,
}

impl InputType {
    /// Inputs whose response is a sequence of selected values
    pub fn has_array_value(&self) -> bool {
        matches!(self, Self::Checkbox | Self::MultiSelect)
    }

    /// Inputs backed by a map point the respondent can drag around
    pub fn is_map_point(&self) -> bool {
        matches!(self, Self::MapPoint | Self::MapFindPlace)
    }
}

/// Coerce a response to `datatype`. Sequence responses of array-valued
/// inputs are coerced element by element.
pub fn coerce_value(value: Option<Value>, datatype: Option<Datatype>, array_valued: bool) -> Option<Value> {
    match value {
        Some(Value::Array(items)) if array_valued => Some(Value::Array(
            items
                .into_iter()
                .map(|item| coerce_scalar(Some(item), datatype).unwrap_or(Value::Null))
                .collect(),
        )),
        other => coerce_scalar(other, datatype),
    }
}

fn coerce_scalar(value: Option<Value>, datatype: Option<Datatype>) -> Option<Value> {
    let value = value?;
    match datatype {
        Some(Datatype::Integer) => match value {
            Value::Array(_) | Value::Object(_) => None,
            other => Some(to_integer(&other)),
        },
        Some(Datatype::Float) => match value {
            Value::Array(_) | Value::Object(_) => None,
            other => Some(to_float(&other)),
        },
        Some(Datatype::Boolean) => Some(to_booleish(&value)),
        Some(Datatype::String) | None => match value {
            Value::String(s) if s.is_empty() => Some(Value::Null),
            other => Some(other),
        },
    }
}

fn to_integer(value: &Value) -> Value {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    };
    parsed.map(Value::from).unwrap_or(Value::Null)
}

fn to_float(value: &Value) -> Value {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn to_booleish(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Value::Bool(true),
            Some(f) if f == 0.0 => Value::Bool(false),
            _ => Value::Null,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Value::Bool(true),
            "false" | "no" | "0" => Value::Bool(false),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}
