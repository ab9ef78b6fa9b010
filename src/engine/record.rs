use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Lifecycle status of a stored record.
///
/// A record is created as `InProgress` by the reserving request and moves
/// to `Complete` exactly once, never the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    InProgress,
    Complete,
}

/// Outcome of the protected operation, captured for replay.
///
/// Either `body` (success) or `error` (failure descriptor) is set;
/// `additional` carries transport-level details such as the original
/// status code and selected headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional: Option<HashMap<String, serde_json::Value>>,
}

impl CachedResponse {
    pub fn from_body(body: serde_json::Value) -> Self {
        Self {
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn from_error(error: serde_json::Value) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Records the transport status code under which the outcome was
    /// originally delivered.
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.additional
            .get_or_insert_with(HashMap::new)
            .insert("statusCode".to_string(), serde_json::json!(status_code));
        self
    }

    /// Attaches an arbitrary transport detail (e.g. a cached header).
    pub fn with_additional(
        mut self,
        name: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.additional
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value);
        self
    }

    pub fn status_code(&self) -> Option<u16> {
        self.additional
            .as_ref()
            .and_then(|extra| extra.get("statusCode"))
            .and_then(|code| code.as_u64())
            .map(|code| code as u16)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The persisted unit, serialized as the storage value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub status: RecordStatus,
    #[serde(rename = "fingerPrint")]
    pub fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<CachedResponse>,
}

impl IdempotencyRecord {
    /// The reservation placeholder written by the first request.
    pub fn in_progress(fingerprint: impl Into<String>) -> Self {
        Self {
            status: RecordStatus::InProgress,
            fingerprint: fingerprint.into(),
            response: None,
        }
    }

    pub fn complete(fingerprint: impl Into<String>, response: CachedResponse) -> Self {
        Self {
            status: RecordStatus::Complete,
            fingerprint: fingerprint.into(),
            response: Some(response),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == RecordStatus::Complete
    }

    pub fn encode(&self) -> StorageResult<String> {
        serde_json::to_string(self).map_err(StorageError::Serialization)
    }

    pub fn decode(raw: &str) -> StorageResult<Self> {
        serde_json::from_str(raw).map_err(StorageError::Serialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_progress_record_omits_response() {
        let record = IdempotencyRecord::in_progress("abc123");
        let encoded = record.encode().unwrap();

        assert_eq!(encoded, r#"{"status":"IN_PROGRESS","fingerPrint":"abc123"}"#);
    }

    #[test]
    fn test_complete_record_wire_format() {
        let response = CachedResponse::from_body(serde_json::json!({"success": "true"}));
        let record = IdempotencyRecord::complete("abc123", response);
        let encoded = record.encode().unwrap();

        assert_eq!(
            encoded,
            r#"{"status":"COMPLETE","fingerPrint":"abc123","response":{"body":{"success":"true"}}}"#
        );
    }

    #[test]
    fn test_record_round_trip() {
        let response = CachedResponse::from_error(serde_json::json!({"message": "declined"}))
            .with_status_code(402);
        let record = IdempotencyRecord::complete("fp", response);

        let decoded = IdempotencyRecord::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded, record);
        assert!(decoded.is_complete());
        assert_eq!(decoded.response.unwrap().status_code(), Some(402));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = IdempotencyRecord::decode("not-json");
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }

    #[test]
    fn test_error_outcome_is_error() {
        let failure = CachedResponse::from_error(serde_json::json!({"message": "boom"}));
        assert!(failure.is_error());
        assert!(!CachedResponse::from_body(serde_json::json!({})).is_error());
    }
}
