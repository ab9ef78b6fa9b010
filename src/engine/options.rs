use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Header consulted for the idempotency key when no custom extractor is
/// configured. Matched case-insensitively.
pub const DEFAULT_IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub const DEFAULT_KEY_MAX_LENGTH: usize = 256;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(86_400_000);

/// Extracts the idempotency key from a request, overriding header lookup.
pub type KeyExtractorFn = Arc<dyn Fn(&RequestDescriptor) -> Option<String> + Send + Sync>;
/// Decides whether a request bypasses idempotency control entirely.
pub type SkipPredicateFn = Arc<dyn Fn(&RequestDescriptor) -> bool + Send + Sync>;

/// Normalized view of one incoming request, supplied by the caller.
///
/// The engine only reads from it, to derive the storage key and the
/// fingerprint; it never mutates or retains it.
#[derive(Debug, Clone, Default)]
pub struct RequestDescriptor {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
}

impl RequestDescriptor {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Partial configuration: every field optional, unset fields fall back to
/// the engine defaults (or, for per-call use, to the process-wide values).
#[derive(Clone, Default)]
pub struct IdempotencyOptions {
    pub idempotency_key_header: Option<String>,
    pub cache_key_prefix: Option<String>,
    pub cache_ttl: Option<Duration>,
    pub key_max_length: Option<usize>,
    pub enforce_idempotency: Option<bool>,
    pub idempotency_key_extractor: Option<KeyExtractorFn>,
    pub skip_request: Option<SkipPredicateFn>,
}

impl IdempotencyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn idempotency_key_header(mut self, header: impl Into<String>) -> Self {
        self.idempotency_key_header = Some(header.into());
        self
    }

    pub fn cache_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_key_prefix = Some(prefix.into());
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn key_max_length(mut self, max: usize) -> Self {
        self.key_max_length = Some(max);
        self
    }

    pub fn enforce_idempotency(mut self, enforce: bool) -> Self {
        self.enforce_idempotency = Some(enforce);
        self
    }

    pub fn idempotency_key_extractor<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&RequestDescriptor) -> Option<String> + Send + Sync + 'static,
    {
        self.idempotency_key_extractor = Some(Arc::new(extractor));
        self
    }

    pub fn skip_request<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RequestDescriptor) -> bool + Send + Sync + 'static,
    {
        self.skip_request = Some(Arc::new(predicate));
        self
    }
}

impl fmt::Debug for IdempotencyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdempotencyOptions")
            .field("idempotency_key_header", &self.idempotency_key_header)
            .field("cache_key_prefix", &self.cache_key_prefix)
            .field("cache_ttl", &self.cache_ttl)
            .field("key_max_length", &self.key_max_length)
            .field("enforce_idempotency", &self.enforce_idempotency)
            .field(
                "idempotency_key_extractor",
                &self.idempotency_key_extractor.as_ref().map(|_| "<fn>"),
            )
            .field("skip_request", &self.skip_request.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Fully-populated effective configuration for one request.
///
/// Built once from the process-wide defaults at engine construction and
/// merged functionally with per-call overrides; neither input is mutated.
#[derive(Clone)]
pub struct ResolvedOptions {
    pub idempotency_key_header: String,
    pub cache_key_prefix: String,
    pub cache_ttl: Duration,
    pub key_max_length: usize,
    pub enforce_idempotency: bool,
    pub idempotency_key_extractor: Option<KeyExtractorFn>,
    pub skip_request: Option<SkipPredicateFn>,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        Self {
            idempotency_key_header: DEFAULT_IDEMPOTENCY_KEY_HEADER.to_string(),
            cache_key_prefix: String::new(),
            cache_ttl: DEFAULT_CACHE_TTL,
            key_max_length: DEFAULT_KEY_MAX_LENGTH,
            enforce_idempotency: false,
            idempotency_key_extractor: None,
            skip_request: None,
        }
    }
}

impl ResolvedOptions {
    pub fn from_defaults(base: &IdempotencyOptions) -> Self {
        Self::default().merge(Some(base))
    }

    /// Returns a copy with every set field of `overrides` applied.
    pub fn merge(&self, overrides: Option<&IdempotencyOptions>) -> Self {
        let Some(overrides) = overrides else {
            return self.clone();
        };

        Self {
            idempotency_key_header: overrides
                .idempotency_key_header
                .clone()
                .unwrap_or_else(|| self.idempotency_key_header.clone()),
            cache_key_prefix: overrides
                .cache_key_prefix
                .clone()
                .unwrap_or_else(|| self.cache_key_prefix.clone()),
            cache_ttl: overrides.cache_ttl.unwrap_or(self.cache_ttl),
            key_max_length: overrides.key_max_length.unwrap_or(self.key_max_length),
            enforce_idempotency: overrides
                .enforce_idempotency
                .unwrap_or(self.enforce_idempotency),
            idempotency_key_extractor: overrides
                .idempotency_key_extractor
                .clone()
                .or_else(|| self.idempotency_key_extractor.clone()),
            skip_request: overrides.skip_request.clone().or_else(|| self.skip_request.clone()),
        }
    }
}

impl fmt::Debug for ResolvedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedOptions")
            .field("idempotency_key_header", &self.idempotency_key_header)
            .field("cache_key_prefix", &self.cache_key_prefix)
            .field("cache_ttl", &self.cache_ttl)
            .field("key_max_length", &self.key_max_length)
            .field("enforce_idempotency", &self.enforce_idempotency)
            .field(
                "idempotency_key_extractor",
                &self.idempotency_key_extractor.as_ref().map(|_| "<fn>"),
            )
            .field("skip_request", &self.skip_request.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let descriptor =
            RequestDescriptor::new("POST", "/pay").with_header("Idempotency-Key", "abc");

        assert_eq!(descriptor.header("idempotency-key"), Some("abc"));
        assert_eq!(descriptor.header("IDEMPOTENCY-KEY"), Some("abc"));
        assert_eq!(descriptor.header("x-request-id"), None);
    }

    #[test]
    fn test_defaults() {
        let resolved = ResolvedOptions::default();

        assert_eq!(resolved.idempotency_key_header, "idempotency-key");
        assert_eq!(resolved.cache_key_prefix, "");
        assert_eq!(resolved.cache_ttl, Duration::from_millis(86_400_000));
        assert_eq!(resolved.key_max_length, 256);
        assert!(!resolved.enforce_idempotency);
    }

    #[test]
    fn test_merge_overrides_set_fields_only() {
        let base = ResolvedOptions::from_defaults(
            &IdempotencyOptions::new()
                .cache_key_prefix("svc")
                .key_max_length(64),
        );
        let merged = base.merge(Some(
            &IdempotencyOptions::new()
                .cache_key_prefix("tenant-1")
                .enforce_idempotency(true),
        ));

        assert_eq!(merged.cache_key_prefix, "tenant-1");
        assert!(merged.enforce_idempotency);
        // untouched fields keep the base values
        assert_eq!(merged.key_max_length, 64);
        assert_eq!(merged.idempotency_key_header, "idempotency-key");
    }

    #[test]
    fn test_merge_without_overrides_is_identity() {
        let base = ResolvedOptions::from_defaults(&IdempotencyOptions::new().key_max_length(32));
        let merged = base.merge(None);

        assert_eq!(merged.key_max_length, 32);
        assert_eq!(merged.cache_ttl, base.cache_ttl);
    }

    #[test]
    fn test_merge_preserves_base_hooks() {
        let base = ResolvedOptions::from_defaults(
            &IdempotencyOptions::new().skip_request(|descriptor| descriptor.method == "GET"),
        );
        let merged = base.merge(Some(&IdempotencyOptions::new().cache_key_prefix("t")));

        let get = RequestDescriptor::new("GET", "/pay");
        assert!(merged.skip_request.as_ref().map(|skip| skip(&get)).unwrap_or(false));
    }

    #[test]
    fn test_merge_replaces_hooks_when_overridden() {
        let base = ResolvedOptions::from_defaults(
            &IdempotencyOptions::new().skip_request(|_| true),
        );
        let merged = base.merge(Some(&IdempotencyOptions::new().skip_request(|_| false)));

        let request = RequestDescriptor::new("POST", "/pay");
        assert!(!merged.skip_request.as_ref().map(|skip| skip(&request)).unwrap_or(true));
    }
}
