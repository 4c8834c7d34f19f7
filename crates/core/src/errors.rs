use std::any::Any;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

type BoxedSource = Arc<dyn std::error::Error + Send + Sync>;

/// Error type shared by every cache engine
///
/// `NotExists` is a sentinel rather than a fault: result accessors such as
/// [`GetResult::err`](crate::GetResult::err) hide it, and a miss is never
/// reported as an error to callers that only check `err()`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The key has no live entry
    #[error("cache entry does not exist")]
    NotExists,

    /// An on-disk record could not be parsed
    #[error("corrupted cache record '{path}': {reason}")]
    Corruption { path: PathBuf, reason: String },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: &'static str,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The codec failed to encode a value
    #[error("failed to encode value: {message}")]
    Encode {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// The codec failed to decode a payload
    #[error("failed to decode value: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// A batch item panicked; the failure is scoped to that one key
    #[error("operation for key '{key}' panicked: {message}")]
    Panicked { key: String, message: String },

    /// A load-through cache's loader failed
    #[error("failed to load value for key '{key}': {message}")]
    Load {
        key: String,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The cache does not offer the requested capability
    #[error("unsupported operation '{operation}'")]
    Unsupported { operation: &'static str },
}

impl CacheError {
    /// Create a file system error with the failing path and operation
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: &'static str,
        source: std::io::Error,
    ) -> Self {
        CacheError::FileSystem {
            path: path.into(),
            operation,
            source: Arc::new(source),
        }
    }

    /// Create a corruption error for a malformed record
    #[must_use]
    pub fn corruption(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CacheError::Corruption {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an encode error from a codec failure
    #[must_use]
    pub fn encode<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CacheError::Encode {
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    /// Create an encode error without an underlying source
    #[must_use]
    pub fn encode_message(message: impl Into<String>) -> Self {
        CacheError::Encode {
            message: message.into(),
            source: None,
        }
    }

    /// Create a decode error from a codec failure
    #[must_use]
    pub fn decode<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CacheError::Decode {
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    /// Create a decode error without an underlying source
    #[must_use]
    pub fn decode_message(message: impl Into<String>) -> Self {
        CacheError::Decode {
            message: message.into(),
            source: None,
        }
    }

    /// Convert a caught panic payload into an error scoped to `key`
    #[must_use]
    pub fn panicked(key: &impl Display, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        CacheError::Panicked {
            key: key.to_string(),
            message,
        }
    }

    /// Create a load error from the loader's own failure
    #[must_use]
    pub fn load<E>(key: &impl Display, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CacheError::Load {
            key: key.to_string(),
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    /// Create a load error without an underlying source
    #[must_use]
    pub fn load_message(key: &impl Display, message: impl Into<String>) -> Self {
        CacheError::Load {
            key: key.to_string(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        CacheError::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsupported-capability error
    #[must_use]
    pub fn unsupported(operation: &'static str) -> Self {
        CacheError::Unsupported { operation }
    }

    /// Whether this is the "no such entry" sentinel
    pub fn is_not_exists(&self) -> bool {
        matches!(self, CacheError::NotExists)
    }
}
