use thiserror::Error;

/// Error type compute functions may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache key `{key}` is not declared")]
    UnknownKey { key: String },

    #[error("cache key `{key}` is declared more than once")]
    DuplicateKey { key: String },

    #[error("computing cache key `{key}` failed: {source}")]
    Compute {
        key: String,
        #[source]
        source: BoxError,
    },
}

impl CacheError {
    /// Whether this error comes from a malformed spec or request rather than
    /// a failing compute function.
    #[must_use]
    pub fn is_config(&self) -> bool {
        !matches!(self, Self::Compute { .. })
    }

    /// Key the error refers to.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::UnknownKey { key } | Self::DuplicateKey { key } | Self::Compute { key, .. } => key,
        }
    }
}
