use sha2::{Digest, Sha256};

use crate::engine::options::RequestDescriptor;

/// Storage key and request digest derived for a single request.
///
/// The storage key locates the record; the fingerprint detects whether a
/// reused idempotency key still refers to the same logical request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub storage_key: String,
    pub fingerprint: String,
}

impl RequestIdentity {
    pub fn derive(prefix: &str, descriptor: &RequestDescriptor, idempotency_key: &str) -> Self {
        Self {
            storage_key: build_storage_key(
                prefix,
                &descriptor.method,
                &descriptor.path,
                idempotency_key,
            ),
            fingerprint: fingerprint(descriptor),
        }
    }
}

/// Builds `prefix:method:path:idempotencyKey`. The prefix segment is
/// dropped entirely when empty, so the global namespace produces keys
/// like `POST:/pay:1` and tenant prefixes produce `tenant-1:POST:/pay:1`.
pub fn build_storage_key(prefix: &str, method: &str, path: &str, idempotency_key: &str) -> String {
    if prefix.is_empty() {
        format!("{}:{}:{}", method, path, idempotency_key)
    } else {
        format!("{}:{}:{}:{}", prefix, method, path, idempotency_key)
    }
}

/// SHA-256 digest over the request's defining attributes.
///
/// The body is canonicalized through its serde_json representation, which
/// serializes object keys in sorted order, so two structurally equal
/// bodies always hash identically. No wall-clock or process state feeds
/// the digest.
pub fn fingerprint(descriptor: &RequestDescriptor) -> String {
    let mut hasher = Sha256::new();

    hasher.update(descriptor.method.as_bytes());
    hasher.update(b"|");
    hasher.update(descriptor.path.as_bytes());

    if let Some(ref body) = descriptor.body {
        hasher.update(b"|");
        hasher.update(body.to_string().as_bytes());
    }

    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pay_request() -> RequestDescriptor {
        RequestDescriptor::new("POST", "/pay").with_body(serde_json::json!({"a": "a"}))
    }

    #[test]
    fn test_storage_key_without_prefix() {
        assert_eq!(build_storage_key("", "POST", "/pay", "1"), "POST:/pay:1");
    }

    #[test]
    fn test_storage_key_with_prefix() {
        assert_eq!(
            build_storage_key("tenant-1", "POST", "/pay", "1"),
            "tenant-1:POST:/pay:1"
        );
    }

    #[test]
    fn test_prefixes_never_collide() {
        let one = build_storage_key("tenant-1", "POST", "/pay", "1");
        let two = build_storage_key("tenant-2", "POST", "/pay", "1");
        assert_ne!(one, two);
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let first = fingerprint(&pay_request());
        let second = fingerprint(&pay_request());

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_fingerprint_ignores_body_key_order() {
        let ordered = RequestDescriptor::new("POST", "/pay")
            .with_body(serde_json::json!({"a": 1, "b": 2}));
        let reversed = RequestDescriptor::new("POST", "/pay")
            .with_body(serde_json::json!({"b": 2, "a": 1}));

        assert_eq!(fingerprint(&ordered), fingerprint(&reversed));
    }

    #[test]
    fn test_fingerprint_differs_per_body() {
        let other = RequestDescriptor::new("POST", "/pay")
            .with_body(serde_json::json!({"a": "b"}));

        assert_ne!(fingerprint(&pay_request()), fingerprint(&other));
    }

    #[test]
    fn test_fingerprint_differs_per_method_and_path() {
        let get = RequestDescriptor::new("GET", "/pay").with_body(serde_json::json!({"a": "a"}));
        let refund =
            RequestDescriptor::new("POST", "/refund").with_body(serde_json::json!({"a": "a"}));

        assert_ne!(fingerprint(&pay_request()), fingerprint(&get));
        assert_ne!(fingerprint(&pay_request()), fingerprint(&refund));
    }

    #[test]
    fn test_fingerprint_without_body() {
        let bare = RequestDescriptor::new("DELETE", "/pay/1");
        assert_eq!(fingerprint(&bare), fingerprint(&bare.clone()));
        assert_ne!(fingerprint(&bare), fingerprint(&pay_request()));
    }
}
