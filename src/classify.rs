//! Error classification: the single normalization point for failures.
//!
//! Maps every [`RawError`] onto the closed [`ErrorKind`] taxonomy. The
//! function is total: unrecognized inputs become `Unknown`, it never panics.

use serde_json::Value;

use crate::error::{ClassifiedError, ErrorKind, RawError};

const MSG_NETWORK: &str = "network unavailable";
const MSG_TIMEOUT: &str = "request timed out";
const MSG_UNAUTHORIZED: &str = "not authenticated";
const MSG_NOT_FOUND: &str = "not found";
const MSG_SERVER: &str = "server error";
const MSG_UNKNOWN: &str = "unexpected error";

/// Classify a raw transport or provider failure.
#[must_use]
pub fn classify(raw: &RawError) -> ClassifiedError {
    match raw {
        RawError::Http { status, body } => classify_http(*status, body),
        RawError::Timeout => ClassifiedError::new(ErrorKind::Network, MSG_TIMEOUT),
        RawError::Network(detail) => ClassifiedError::new(ErrorKind::Network, non_empty_or(detail, MSG_NETWORK)),
        RawError::Decode(detail) => ClassifiedError::new(ErrorKind::Unknown, non_empty_or(detail, MSG_UNKNOWN)),
        RawError::Provider { code, message } => classify_provider(code, message),
    }
}

// =============================================================================
// HTTP
// =============================================================================

fn classify_http(status: u16, body: &str) -> ClassifiedError {
    let json = serde_json::from_str::<Value>(body).ok();
    let message = |fallback: &str| {
        json.as_ref()
            .and_then(body_message)
            .unwrap_or_else(|| non_empty_or(body, fallback))
    };

    match status {
        401 => ClassifiedError::new(ErrorKind::Unauthorized, message(MSG_UNAUTHORIZED)),
        404 => ClassifiedError::new(ErrorKind::NotFound, message(MSG_NOT_FOUND)),
        400 | 422 => match json.as_ref().and_then(field_error) {
            Some((field, field_message)) => {
                let field_message = field_message.unwrap_or_else(|| message(MSG_UNKNOWN));
                ClassifiedError::new(
                    ErrorKind::Validation { field, message: field_message.clone() },
                    field_message,
                )
            }
            None => ClassifiedError::new(ErrorKind::Unknown, message(MSG_UNKNOWN)),
        },
        408 => ClassifiedError::new(ErrorKind::Network, message(MSG_TIMEOUT)),
        500..=599 => ClassifiedError::new(ErrorKind::ServerError, message(MSG_SERVER)),
        _ => ClassifiedError::new(ErrorKind::Unknown, message(MSG_UNKNOWN)),
    }
}

/// Top-level human message: `message`, then `error` (string or `{message}`).
fn body_message(json: &Value) -> Option<String> {
    if let Some(msg) = json.get("message").and_then(Value::as_str) {
        return Some(msg.to_owned());
    }
    match json.get("error")? {
        Value::String(msg) => Some(msg.clone()),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned),
        _ => None,
    }
}

/// Extract `(field, message)` from the shapes backends use for field errors:
///
/// - `{"field": "email", "message": "..."}`
/// - `{"errors": [{"path": ["email"], "message": "..."}]}` (also `field` in items)
/// - `{"errors": {"email": "..."}}` or `{"errors": {"email": ["..."]}}`
fn field_error(json: &Value) -> Option<(String, Option<String>)> {
    if let Some(field) = json.get("field").and_then(Value::as_str) {
        let message = json.get("message").and_then(Value::as_str).map(str::to_owned);
        return Some((field.to_owned(), message));
    }

    match json.get("errors")? {
        Value::Array(items) => items.iter().find_map(|item| {
            let field = item
                .get("field")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .or_else(|| item.get("path").and_then(path_to_field))?;
            let message = item.get("message").and_then(Value::as_str).map(str::to_owned);
            Some((field, message))
        }),
        Value::Object(map) => map.iter().next().map(|(field, value)| {
            let message = match value {
                Value::String(msg) => Some(msg.clone()),
                Value::Array(msgs) => msgs.first().and_then(Value::as_str).map(str::to_owned),
                _ => None,
            };
            (field.clone(), message)
        }),
        _ => None,
    }
}

fn path_to_field(path: &Value) -> Option<String> {
    match path {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(parts) if !parts.is_empty() => {
            let joined = parts
                .iter()
                .map(|p| match p {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(".");
            Some(joined)
        }
        _ => None,
    }
}

// =============================================================================
// IDENTITY PROVIDER
// =============================================================================

fn classify_provider(code: &str, message: &str) -> ClassifiedError {
    let code = code.strip_prefix("auth/").unwrap_or(code);
    let validation = |field: &str, fallback: &str| {
        let msg = non_empty_or(message, fallback);
        ClassifiedError::new(ErrorKind::Validation { field: field.to_owned(), message: msg.clone() }, msg)
    };

    match code {
        "invalid-email" => validation("email", "invalid email address"),
        "email-already-in-use" => validation("email", "email already in use"),
        "missing-email" => validation("email", "email is required"),
        "weak-password" => validation("password", "password is too weak"),
        "missing-password" => validation("password", "password is required"),
        "wrong-password" | "user-not-found" | "invalid-credential" | "invalid-login-credentials"
        | "user-disabled" | "popup-closed-by-user" | "cancelled-popup-request" | "user-cancelled"
        | "no-credential" => ClassifiedError::new(ErrorKind::Unauthorized, non_empty_or(message, MSG_UNAUTHORIZED)),
        "network-request-failed" | "timeout" => {
            ClassifiedError::new(ErrorKind::Network, non_empty_or(message, MSG_NETWORK))
        }
        "internal-error" => ClassifiedError::new(ErrorKind::ServerError, non_empty_or(message, MSG_SERVER)),
        _ => ClassifiedError::new(ErrorKind::Unknown, non_empty_or(message, MSG_UNKNOWN)),
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() { fallback.to_owned() } else { trimmed.to_owned() }
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;
