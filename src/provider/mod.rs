//! Pluggable text extraction providers
//!
//! A provider turns a [`DocumentRef`] into plain text for indexing,
//! keyed by the ref's `kind` tag. The registry is populated once at
//! worker start-up and read-only afterwards; a missing or failing
//! provider is always a per-document condition, never a subsystem-wide
//! failure.

mod pdf;
mod plaintext;

pub use pdf::PdfProvider;
pub use plaintext::PlainTextProvider;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::types::DocumentRef;

/// Errors a provider can produce while extracting text.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("cannot read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("converter failed: {0}")]
    Converter(String),

    #[error("document rejected by provider: {0}")]
    Rejected(String),
}

/// A text-extraction strategy for one document format.
pub trait Provider: Send + Sync {
    /// The format tag this provider registers under.
    fn kind(&self) -> &'static str;

    /// Cheap pre-check so unsupported files can be skipped before the
    /// (potentially expensive) extraction attempt.
    fn can_handle(&self, doc: &DocumentRef) -> bool;

    /// Extract the document's plain text.
    fn extract(&self, doc: &DocumentRef) -> Result<String, ExtractError>;
}

/// Read-only `kind -> provider` mapping built at worker start-up.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// An empty registry; useful in tests.
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// The registry the worker ships with: plain text always, PDF as an
    /// optional, independently failable extra.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PlainTextProvider));
        registry.register(Arc::new(PdfProvider::new()));
        for kind in registry.kinds() {
            tracing::debug!(kind, "registered search provider");
        }
        registry
    }

    /// Register a provider under its own `kind` tag. Later registrations
    /// for the same tag win.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.kind(), provider);
    }

    #[must_use]
    pub fn get(&self, kind: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(kind).cloned()
    }

    /// Registered format tags, unordered.
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.providers.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
