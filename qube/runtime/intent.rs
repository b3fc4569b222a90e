use std::sync::Arc;

use indexmap::IndexMap;

/// Fingerprint to label table.
pub type IntentDatabase = IndexMap<String, String>;

/// Label that promotes a nominal pixel to immediate execution.
pub const URGENT_INTENT: &str = "EXECUTE_URGENT";

/// Static fingerprint lookup. Absence is not an error.
#[derive(Debug, Clone, Default)]
pub struct IntentMatcher {
    database: Arc<IntentDatabase>,
}

impl IntentMatcher {
    /// Wraps an immutable intent table.
    #[must_use]
    pub fn new(database: Arc<IntentDatabase>) -> Self {
        Self { database }
    }

    /// Label for `fingerprint`, if known.
    #[must_use]
    pub fn lookup(&self, fingerprint: &str) -> Option<&str> {
        self.database.get(fingerprint).map(String::as_str)
    }
}
