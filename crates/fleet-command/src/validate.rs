//! Pre-dispatch checks for device commands.
//!
//! Inputs come straight from forms or JSON files, so they are taken as
//! `serde_json::Value` and any shape is accepted without panicking. Each
//! check reports a [`ValidationResult`]; none of them normalizes its input.

use serde::Serialize;
use serde_json::Value;

use crate::error::CommandError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { valid: true, error: None }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self { valid: false, error: Some(error.into()) }
    }

    pub fn into_result(self) -> Result<(), CommandError> {
        if self.valid {
            Ok(())
        } else {
            Err(CommandError::validation(self.error.unwrap_or_else(|| "invalid input".to_string())))
        }
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Any string with non-whitespace content. Length and checksum are not
/// checked; callers wanting 15-digit IMEIs must layer that on top.
pub fn validate_imei(value: &Value) -> ValidationResult {
    match value {
        Value::String(s) if !s.trim().is_empty() => ValidationResult::ok(),
        Value::String(_) => ValidationResult::invalid("IMEI must not be empty"),
        Value::Null => ValidationResult::invalid("IMEI is required"),
        other => ValidationResult::invalid(format!("IMEI must be a string, got {}", kind(other))),
    }
}

/// Command names are identifiers such as `SET_GEOFENCE`.
pub fn validate_command(value: &Value) -> ValidationResult {
    match value {
        Value::String(s) => {
            let name = s.trim();
            if name.is_empty() {
                ValidationResult::invalid("command must not be empty")
            } else if let Some(c) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
                ValidationResult::invalid(format!("command contains invalid character {:?}", c))
            } else {
                ValidationResult::ok()
            }
        }
        Value::Null => ValidationResult::invalid("command is required"),
        other => ValidationResult::invalid(format!("command must be a string, got {}", kind(other))),
    }
}

pub fn validate_params(value: &Value) -> ValidationResult {
    match value {
        Value::Object(_) => ValidationResult::ok(),
        Value::Null => ValidationResult::invalid("params are required"),
        other => ValidationResult::invalid(format!("params must be an object, got {}", kind(other))),
    }
}

/// First failing check of the triple, in IMEI, command, params order.
pub fn validate_request(imei: &Value, command: &Value, params: &Value) -> ValidationResult {
    for check in [validate_imei(imei), validate_command(command), validate_params(params)] {
        if !check.valid {
            return check;
        }
    }
    ValidationResult::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn imei_accepts_non_blank_strings() {
        assert_eq!(validate_imei(&json!("356938035643809")), ValidationResult::ok());
        assert!(validate_imei(&json!("  abc  ")).valid);
        assert!(validate_imei(&json!("x")).valid);
    }

    #[test]
    fn imei_rejects_everything_else() {
        for v in [
            Value::Null,
            json!(""),
            json!("   "),
            json!("\t\n"),
            json!(356938035643809u64),
            json!(true),
            json!({"imei": "1"}),
            json!(["1"]),
        ] {
            let r = validate_imei(&v);
            assert!(!r.valid, "{:?} should be invalid", v);
            assert!(r.error.as_deref().is_some_and(|e| !e.is_empty()), "{:?} needs an error", v);
        }
    }

    #[test]
    fn imei_error_names_the_type() {
        assert_eq!(validate_imei(&json!(12)).error.as_deref(), Some("IMEI must be a string, got number"));
        assert_eq!(validate_imei(&Value::Null).error.as_deref(), Some("IMEI is required"));
    }

    #[test]
    fn command_names() {
        assert!(validate_command(&json!("SET_GEOFENCE")).valid);
        assert!(validate_command(&json!("reboot")).valid);
        assert!(!validate_command(&json!("")).valid);
        assert!(!validate_command(&json!("SET GEOFENCE")).valid);
        assert!(!validate_command(&json!("rm;-rf")).valid);
        assert!(!validate_command(&json!(7)).valid);
        assert!(!validate_command(&Value::Null).valid);
    }

    #[test]
    fn params_must_be_an_object() {
        assert!(validate_params(&json!({})).valid);
        assert!(validate_params(&json!({"interval": 30})).valid);
        assert!(!validate_params(&Value::Null).valid);
        assert!(!validate_params(&json!([1, 2])).valid);
        assert!(!validate_params(&json!("x")).valid);
    }

    #[test]
    fn request_reports_first_failure() {
        let r = validate_request(&json!(""), &json!(""), &Value::Null);
        assert_eq!(r.error.as_deref(), Some("IMEI must not be empty"));

        let r = validate_request(&json!("123"), &json!("REBOOT"), &json!(null));
        assert_eq!(r.error.as_deref(), Some("params are required"));

        assert!(validate_request(&json!("123"), &json!("REBOOT"), &json!({})).valid);
    }

    #[test]
    fn into_result_carries_validation_code() {
        let err = validate_imei(&json!("")).into_result().unwrap_err();
        assert_eq!(err.code, crate::error::CommandErrorCode::Validation);
        assert!(validate_imei(&json!("1")).into_result().is_ok());
    }

    #[test]
    fn result_serializes_without_empty_error() {
        assert_eq!(serde_json::to_value(ValidationResult::ok()).unwrap(), json!({"valid": true}));
        assert_eq!(
            serde_json::to_value(ValidationResult::invalid("nope")).unwrap(),
            json!({"valid": false, "error": "nope"})
        );
    }
}
