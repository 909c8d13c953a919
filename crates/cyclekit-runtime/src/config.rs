#![forbid(unsafe_code)]

//! Lifecycle configuration.

/// Configuration for a [`Lifecycle`](crate::Lifecycle).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Emit an `options.rejected` warning for every dropped option key.
    pub warn_on_rejected: bool,
    /// Label recorded on every `lifecycle.cycle` span.
    pub label: Option<String>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            warn_on_rejected: true,
            label: None,
        }
    }
}

impl LifecycleConfig {
    /// Toggle rejection warnings.
    #[must_use]
    pub fn with_warn_on_rejected(mut self, enabled: bool) -> Self {
        self.warn_on_rejected = enabled;
        self
    }

    /// Set the span label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub(crate) fn label(&self) -> &str {
        self.label.as_deref().unwrap_or_default()
    }
}
