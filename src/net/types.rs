//! Wire payloads exchanged with the backend.

use serde::{Deserialize, Serialize};

/// Greeting used when the backend knows no name for the user.
pub const FALLBACK_DISPLAY_NAME: &str = "Student";

/// User record as confirmed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendUser {
    pub id: i64,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl BackendUser {
    /// `displayName`, then `firstName`, then `username`, then a generic name.
    #[must_use]
    pub fn resolved_display_name(&self) -> String {
        [&self.display_name, &self.first_name, &self.username]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or(FALLBACK_DISPLAY_NAME)
            .to_owned()
    }
}

/// `{ "user": ... }` envelope returned by the login and register endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEnvelope {
    #[serde(default)]
    pub user: Option<BackendUser>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectLoginBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalLoginBody<'a> {
    pub uid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<&'a str>,
    pub id_token: &'a str,
}

/// Account registration form, posted to `/api/register` as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Provider uid when the account was first created with the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firebase_uid: Option<String>,
}

impl Registration {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            username: None,
            first_name: None,
            last_name: None,
            firebase_uid: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(json: serde_json::Value) -> BackendUser {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn display_name_prefers_display_name() {
        let u = user(serde_json::json!({"id": 1, "displayName": "A", "firstName": "Ann", "username": "ann"}));
        assert_eq!(u.resolved_display_name(), "A");
    }

    #[test]
    fn display_name_falls_back_through_first_name_and_username() {
        let u = user(serde_json::json!({"id": 1, "displayName": "  ", "firstName": "Ann", "username": "ann"}));
        assert_eq!(u.resolved_display_name(), "Ann");

        let u = user(serde_json::json!({"id": 1, "username": "ann"}));
        assert_eq!(u.resolved_display_name(), "ann");

        let u = user(serde_json::json!({"id": 1}));
        assert_eq!(u.resolved_display_name(), FALLBACK_DISPLAY_NAME);
    }

    #[test]
    fn envelope_tolerates_missing_user() {
        let env: UserEnvelope = serde_json::from_str("{}").unwrap();
        assert!(env.user.is_none());
    }

    #[test]
    fn registration_omits_unset_fields() {
        let mut reg = Registration::new("a@b.com", "secret1");
        reg.first_name = Some("Ann".into());
        let json = serde_json::to_value(&reg).unwrap();
        assert_eq!(json, serde_json::json!({"email": "a@b.com", "password": "secret1", "firstName": "Ann"}));
    }
}
