use cyclekit_cache::CacheError;
use cyclekit_options::TemplateError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LifecycleError>;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid options template: {0}")]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("options could not be converted: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl LifecycleError {
    /// Whether the error reflects a malformed declaration or request rather
    /// than a runtime failure.
    #[must_use]
    pub fn is_config(&self) -> bool {
        match self {
            Self::Template(_) => true,
            Self::Cache(err) => err.is_config(),
            Self::Serialize(_) => false,
        }
    }
}
