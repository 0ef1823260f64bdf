//! Shape of the structured answer and its local re-validation. The service
//! is asked to follow the schema, but its answer is checked again here.

use once_cell::sync::Lazy;
use regex::Regex;
use reminder_domain::PartialAppointment;
use serde_json::{json, Map, Value};

static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));
static TIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}:\d{2}$").expect("valid time regex"));

/// Response schema sent along with every request.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": {
                "type": "STRING",
                "nullable": true,
                "description": "The title or subject of the appointment."
            },
            "date": {
                "type": "STRING",
                "nullable": true,
                "description": "The date of the appointment in YYYY-MM-DD format."
            },
            "time": {
                "type": "STRING",
                "nullable": true,
                "description": "The time of the appointment in 24-hour HH:MM format."
            }
        },
        "required": ["title", "date", "time"]
    })
}

/// Accepts `{title, date, time}` where each field is null/absent or a string
/// of the right form. Anything else yields `None`.
pub fn validate_answer(answer: &Value) -> Option<PartialAppointment> {
    let object = answer.as_object()?;
    let title = string_field(object, "title", None)?;
    let date = string_field(object, "date", Some(&DATE_PATTERN))?;
    let time = string_field(object, "time", Some(&TIME_PATTERN))?;
    Some(PartialAppointment { title, date, time })
}

/// Outer `None` is a shape violation; inner `None` is a missing value.
fn string_field(
    object: &Map<String, Value>,
    key: &str,
    pattern: Option<&Regex>,
) -> Option<Option<String>> {
    match object.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(value)) => match pattern {
            Some(pattern) if !pattern.is_match(value) => None,
            _ => Some(Some(value.clone())),
        },
        Some(_) => None,
    }
}
