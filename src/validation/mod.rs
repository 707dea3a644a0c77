//! Payload validation helpers shared by the server and `fleetctl`.
//!
//! Rules live on the payload structs as `validator` derives; this module holds
//! the custom field checks, the lenient deserializers and the conversion of
//! `ValidationErrors` into the `field -> message` map returned to clients.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use validator::{ValidationError, ValidationErrors};

/// Key `validator` uses for struct-level (`schema`) errors
const SCHEMA_KEY: &str = "__all__";

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp
pub fn validate_date(value: &str) -> Result<(), ValidationError> {
    parse_date(value).map(|_| ()).ok_or_else(|| {
        let mut error = ValidationError::new("date");
        error.add_param("value".into(), &value.to_string());
        error
    })
}

/// Date-only values are taken as midnight UTC
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("not_blank"));
    }
    Ok(())
}

/// Struct-level error attributed to a single field
pub fn schema_error(field: &'static str, code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error.add_param("field".into(), &field);
    error
}

/// Flatten `ValidationErrors` into one message per field
pub fn field_messages(errors: &ValidationErrors) -> HashMap<String, String> {
    let mut messages = HashMap::new();

    for (field, field_errors) in errors.field_errors() {
        let Some(error) = field_errors.first() else {
            continue;
        };

        let field = if field == SCHEMA_KEY {
            error
                .params
                .get("field")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| field.to_string())
        } else {
            field.to_string()
        };

        let message = match &error.message {
            Some(message) => message.to_string(),
            None => default_message(&field, &error.code),
        };
        messages.insert(field, message);
    }

    messages
}

fn default_message(field: &str, code: &str) -> String {
    match code {
        "required" => format!("{} is a required field", field),
        "length" | "not_blank" => format!("{} must not be empty", field),
        "email" => format!("{} must be a valid email", field),
        "date" => format!("{} must be a valid date", field),
        "range" => format!("{} is out of range", field),
        _ => format!("{} is invalid", field),
    }
}

/// Decode a JSON object into a payload. When the whole object does not fit,
/// each field is decoded alone so type errors are reported against the field.
pub fn decode_fields<P: DeserializeOwned>(fields: Map<String, Value>) -> Result<P, HashMap<String, String>> {
    let whole = match serde_json::from_value::<P>(Value::Object(fields.clone())) {
        Ok(payload) => return Ok(payload),
        Err(e) => e,
    };

    let mut messages = HashMap::new();
    for (field, value) in fields {
        let mut single = Map::new();
        single.insert(field.clone(), value);
        if let Err(e) = serde_json::from_value::<P>(Value::Object(single)) {
            let message = type_message(&field, &e.to_string());
            messages.insert(field, message);
        }
    }
    if messages.is_empty() {
        messages.insert(SCHEMA_KEY.to_string(), whole.to_string());
    }
    Err(messages)
}

/// `invalid type: integer `42`, expected a string` -> `information must be a string`
fn type_message(field: &str, error: &str) -> String {
    match error.split_once("expected ") {
        Some((_, expected)) => {
            let expected = expected.split(", got").next().unwrap_or(expected).trim();
            format!("{} must be {}", field, expected)
        }
        None => format!("{} is invalid", field),
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
/// Use together with `#[serde(default)]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Integer given either as a JSON number or a numeric string (`"90"`)
pub fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Float(f64),
        Str(String),
    }

    match Option::<IntOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(IntOrString::Int(n)) => Ok(Some(n)),
        // i64::MAX as f64 rounds up to 2^63, which is already out of range
        Some(IntOrString::Float(f)) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Ok(Some(f as i64))
        }
        Some(IntOrString::Float(f)) if f.fract() == 0.0 => Err(serde::de::Error::custom(format!(
            "expected an integer within 64-bit range, got {}",
            f
        ))),
        Some(IntOrString::Float(f)) => Err(serde::de::Error::custom(format!("expected an integer, got {}", f))),
        Some(IntOrString::Str(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected an integer, got \"{}\"", s))),
    }
}
