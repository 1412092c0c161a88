//! Error types for index store and worker operations

use std::path::PathBuf;

use thiserror::Error;

use crate::provider::ExtractError;

/// Result type alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    /// `init_database` has not run yet for this worker.
    #[error("index store is not open; init_database must be called first")]
    NotOpen,

    /// The on-disk index could not be opened or created.
    #[error("failed to open index at {path:?}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    /// No provider is registered for the document's kind tag.
    #[error("no provider registered for kind `{0}`")]
    MissingProvider(String),

    /// The provider rejected the document or failed to extract its text.
    #[error("extraction failed for `{locator}`: {source}")]
    Extraction {
        locator: String,
        #[source]
        source: ExtractError,
    },

    /// The engine refused the document commit.
    #[error("failed to commit document {doc_id}: {reason}")]
    CommitFailed { doc_id: String, reason: String },

    #[error("invalid query: {0}")]
    QueryParse(#[from] tantivy::query::QueryParserError),

    #[error(transparent)]
    Tantivy(#[from] tantivy::TantivyError),
}

impl IndexError {
    /// Per-document failures leave the rest of the pipeline untouched;
    /// the offending document is logged and dropped.
    #[must_use]
    pub fn is_per_document(&self) -> bool {
        matches!(
            self,
            IndexError::MissingProvider(_)
                | IndexError::Extraction { .. }
                | IndexError::CommitFailed { .. }
        )
    }
}
