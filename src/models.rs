use serde::{Deserialize, Serialize};

pub mod auth;

/// Provider-agnostic profile produced from a user-info response
///
/// Ephemeral: it only lives between the profile fetch and the backend call.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalProfile {
    pub name: String,
    /// Provider-scoped identifier
    pub id: String,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

/// The backend's user/session object, stored verbatim under [`crate::session::store::keys::USER`]
///
/// The shape is owned by the backend, so it stays an opaque JSON value and is
/// written back exactly as it was received.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct SessionRecord(serde_json::Value);

impl SessionRecord {
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> serde_json::Value {
        self.0
    }

    /// Email field if the backend included one, used for logging only
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(serde_json::Value::as_str)
    }

    /// Serialized form written to the session store
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    /// Parse a previously stored record
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` is not valid JSON
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_serializes_photo_url_in_camel_case() {
        let profile = ExternalProfile {
            name: "Ada".to_string(),
            id: "42".to_string(),
            email: Some("a@x.com".to_string()),
            photo_url: Some("http://p".to_string()),
        };

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["photoUrl"], "http://p");
        assert!(value.get("photo_url").is_none());
    }

    #[test]
    fn test_session_record_keeps_backend_field_order() {
        let record = SessionRecord::new(json!({"id": 1, "email": "a@x.com"}));

        assert_eq!(record.to_json().unwrap(), r#"{"id":1,"email":"a@x.com"}"#);
        assert_eq!(record.email(), Some("a@x.com"));
    }

    #[test]
    fn test_session_record_rejects_garbage() {
        assert!(SessionRecord::from_json("{not json").is_err());
    }
}
