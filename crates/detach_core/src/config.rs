//! Executor configuration.

/// Configuration for a [`crate::TransactionExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Whether to release the session after a transaction the executor
    /// began itself.
    pub release_after: bool,

    /// Label used in not-found messages.
    pub not_found_label: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            release_after: true,
            not_found_label: "Entity".to_string(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to release the session after the transaction.
    #[must_use]
    pub const fn release_after(mut self, value: bool) -> Self {
        self.release_after = value;
        self
    }

    /// Sets the label used in not-found messages.
    #[must_use]
    pub fn not_found_label(mut self, label: impl Into<String>) -> Self {
        self.not_found_label = label.into();
        self
    }
}
