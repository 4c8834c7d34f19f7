//! Per-operation result values
//!
//! Every single-key operation returns one of these values instead of a bare
//! `Result`. Each carries an optional error and, where relevant, a found
//! flag. The `NotExists` sentinel is kept internally so tiers can report a
//! miss, but `err()` hides it: a miss is not a fault.

use crate::codec::Codec;
use crate::errors::{CacheError, Result};
use std::fmt;
use std::sync::Arc;

/// The data behind a successful `get`
pub enum Payload<V> {
    /// In-process value handed over as-is
    Value(V),
    /// Encoded bytes, decoded on demand with the engine's codec
    Encoded {
        bytes: Vec<u8>,
        codec: Arc<dyn Codec<V>>,
    },
}

impl<V: Clone> Clone for Payload<V> {
    fn clone(&self) -> Self {
        match self {
            Payload::Value(v) => Payload::Value(v.clone()),
            Payload::Encoded { bytes, codec } => Payload::Encoded {
                bytes: bytes.clone(),
                codec: Arc::clone(codec),
            },
        }
    }
}

impl<V> fmt::Debug for Payload<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Value(_) => f.write_str("Value(..)"),
            Payload::Encoded { bytes, .. } => f
                .debug_struct("Encoded")
                .field("len", &bytes.len())
                .finish_non_exhaustive(),
        }
    }
}

/// Result of [`Cache::get`](crate::Cache::get)
#[derive(Debug, Clone)]
pub struct GetResult<V> {
    outcome: std::result::Result<Payload<V>, CacheError>,
}

impl<V> GetResult<V> {
    /// A hit carrying an in-process value
    pub fn found(value: V) -> Self {
        Self {
            outcome: Ok(Payload::Value(value)),
        }
    }

    /// A hit carrying encoded bytes to be decoded lazily
    pub fn encoded(bytes: Vec<u8>, codec: Arc<dyn Codec<V>>) -> Self {
        Self {
            outcome: Ok(Payload::Encoded { bytes, codec }),
        }
    }

    /// A miss
    pub fn not_exists() -> Self {
        Self::from_error(CacheError::NotExists)
    }

    pub fn from_error(err: CacheError) -> Self {
        Self { outcome: Err(err) }
    }

    /// The error, with the not-exists sentinel reported as `None`
    pub fn err(&self) -> Option<&CacheError> {
        match &self.outcome {
            Err(CacheError::NotExists) | Ok(_) => None,
            Err(e) => Some(e),
        }
    }

    /// The error including the not-exists sentinel
    pub fn raw_err(&self) -> Option<&CacheError> {
        self.outcome.as_ref().err()
    }

    pub fn is_not_exists(&self) -> bool {
        matches!(self.outcome, Err(CacheError::NotExists))
    }

    /// Whether the lookup produced a payload
    pub fn has(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn payload(&self) -> Option<&Payload<V>> {
        self.outcome.as_ref().ok()
    }
}

impl<V: Clone> GetResult<V> {
    /// Decode the payload
    ///
    /// Returns `Ok(None)` on a miss, the stored error on failure, and the
    /// value otherwise. In-process payloads are cloned, encoded payloads go
    /// through the codec they were read with.
    pub fn value(&self) -> Result<Option<V>> {
        match &self.outcome {
            Ok(Payload::Value(v)) => Ok(Some(v.clone())),
            Ok(Payload::Encoded { bytes, codec }) => codec.decode(bytes).map(Some),
            Err(CacheError::NotExists) => Ok(None),
            Err(e) => Err(e.clone()),
        }
    }
}

/// Result of [`Cache::set`](crate::Cache::set)
#[derive(Debug, Clone, Default)]
pub struct SetResult {
    err: Option<CacheError>,
}

impl SetResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn from_error(err: CacheError) -> Self {
        Self { err: Some(err) }
    }

    pub fn err(&self) -> Option<&CacheError> {
        self.err.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.err.is_none()
    }
}

impl From<Result<()>> for SetResult {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => SetResult::ok(),
            Err(e) => SetResult::from_error(e),
        }
    }
}

/// Result of [`Cache::has`](crate::Cache::has)
#[derive(Debug, Clone)]
pub struct HasResult {
    err: Option<CacheError>,
    has: bool,
}

impl HasResult {
    pub fn found() -> Self {
        Self {
            err: None,
            has: true,
        }
    }

    pub fn not_exists() -> Self {
        Self {
            err: Some(CacheError::NotExists),
            has: false,
        }
    }

    pub fn from_error(err: CacheError) -> Self {
        Self {
            err: Some(err),
            has: false,
        }
    }

    pub fn has(&self) -> bool {
        self.has
    }

    /// The error, with the not-exists sentinel reported as `None`
    pub fn err(&self) -> Option<&CacheError> {
        self.err.as_ref().filter(|e| !e.is_not_exists())
    }

    pub fn raw_err(&self) -> Option<&CacheError> {
        self.err.as_ref()
    }
}

/// Result of [`Cache::delete`](crate::Cache::delete)
#[derive(Debug, Clone, Default)]
pub struct DeleteResult {
    err: Option<CacheError>,
    deleted: usize,
}

impl DeleteResult {
    pub fn deleted(count: usize) -> Self {
        Self {
            err: None,
            deleted: count,
        }
    }

    pub fn from_error(err: CacheError) -> Self {
        Self {
            err: Some(err),
            deleted: 0,
        }
    }

    /// Number of entries removed (0 or 1 for a single key)
    pub fn count(&self) -> usize {
        self.deleted
    }

    pub fn err(&self) -> Option<&CacheError> {
        self.err.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;

    #[test]
    fn test_not_exists_is_not_an_error() {
        let result: GetResult<String> = GetResult::not_exists();
        assert!(result.err().is_none());
        assert!(result.raw_err().is_some());
        assert!(result.is_not_exists());
        assert!(!result.has());
        assert_eq!(result.value().unwrap(), None);
    }

    #[test]
    fn test_real_errors_surface_through_value() {
        let result: GetResult<String> =
            GetResult::from_error(CacheError::corruption("/c/x.cache", "no header"));
        assert!(result.err().is_some());
        assert!(matches!(result.value(), Err(CacheError::Corruption { .. })));
    }

    #[test]
    fn test_encoded_payload_is_decoded_lazily() {
        let result: GetResult<Vec<u8>> =
            GetResult::encoded(b"[7,8]".to_vec(), Arc::new(JsonCodec));
        assert!(result.has());
        assert_eq!(result.value().unwrap(), Some(vec![7, 8]));

        let broken: GetResult<Vec<u8>> = GetResult::encoded(b"[7,".to_vec(), Arc::new(JsonCodec));
        assert!(broken.has());
        assert!(matches!(broken.value(), Err(CacheError::Decode { .. })));
    }

    #[test]
    fn test_has_result_hides_sentinel() {
        let miss = HasResult::not_exists();
        assert!(!miss.has());
        assert!(miss.err().is_none());
        assert!(miss.raw_err().is_some());

        let failed = HasResult::from_error(CacheError::configuration("x"));
        assert!(failed.err().is_some());
    }

    #[test]
    fn test_set_result_from_result() {
        assert!(SetResult::from(Ok(())).is_ok());
        let failed = SetResult::from(Err(CacheError::encode_message("nope")));
        assert!(!failed.is_ok());
        assert!(failed.err().is_some());
    }
}
