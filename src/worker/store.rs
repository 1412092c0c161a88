//! Mutex-guarded handle to the inverted-index engine
//!
//! The [`IndexStore`] is the only mutable shared resource inside the
//! worker process. Every engine call takes the mutex for the duration of
//! that call only; text extraction and parsing happen elsewhere, outside
//! the critical section. `init_database` swaps the whole handle under the
//! same mutex the indexer and searcher use, so a handle replacement can
//! never interleave with a query or commit.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::QueryParser;
use tantivy::schema::Value;
use tantivy::{Index, IndexReader, IndexSettings, IndexWriter, TantivyDocument, Term};

use crate::types::SearchHit;

use super::errors::{IndexError, IndexResult};
use super::schema::DocSchema;

/// Characters of stored body text used for the result excerpt.
const EXCERPT_CHARS: usize = 160;

/// A document ready to be committed to the engine.
#[derive(Debug, Clone)]
pub struct DocumentEntry {
    pub id: String,
    pub locator: String,
    pub kind: String,
    pub body: String,
    pub digest: String,
}

/// Shared, mutex-guarded index handle. Starts unopened; queries against an
/// unopened store return empty results rather than errors.
pub struct IndexStore {
    inner: Mutex<Option<OpenIndex>>,
    writer_memory_budget: usize,
}

impl IndexStore {
    #[must_use]
    pub fn new(writer_memory_budget: usize) -> Self {
        Self {
            inner: Mutex::new(None),
            writer_memory_budget,
        }
    }

    /// Open (or create) the index at `path` and swap it in as the live
    /// handle. Any previous handle is committed and dropped first, inside
    /// the same critical section.
    pub fn open(&self, path: &Path) -> IndexResult<()> {
        let mut guard = self.inner.lock();
        if let Some(old) = guard.take() {
            tracing::info!(path = ?old.path, "closing previous index before reopening");
            if let Err(e) = old.close() {
                tracing::warn!(error = %e, "final commit of previous index failed");
            }
        }
        let opened = OpenIndex::open(path, self.writer_memory_budget)?;
        tracing::info!(path = ?path, "index store opened");
        *guard = Some(opened);
        Ok(())
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Commit one document. Re-committing the same document id replaces
    /// the previous posting, which keeps re-indexing idempotent.
    pub fn commit_document(&self, entry: &DocumentEntry) -> IndexResult<()> {
        let mut guard = self.inner.lock();
        let open = guard.as_mut().ok_or(IndexError::NotOpen)?;
        open.commit_document(entry)
    }

    /// Ranked top-`limit` query. Unopened store, empty index, and
    /// unparsable queries all yield an empty result set; per-query errors
    /// are logged, never propagated.
    #[must_use]
    pub fn search(&self, text: &str, limit: usize) -> Vec<SearchHit> {
        let guard = self.inner.lock();
        let Some(open) = guard.as_ref() else {
            tracing::debug!(query = %text, "search before init_database; returning no results");
            return Vec::new();
        };
        match open.search(text, limit) {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(query = %text, error = %e, "query failed; returning empty results");
                Vec::new()
            }
        }
    }

    /// Number of committed documents, 0 while unopened.
    #[must_use]
    pub fn num_docs(&self) -> u64 {
        self.inner
            .lock()
            .as_ref()
            .map_or(0, |open| open.reader.searcher().num_docs())
    }

    /// Final commit and handle drop. Safe to call on an unopened store.
    pub fn close(&self) -> IndexResult<()> {
        match self.inner.lock().take() {
            Some(open) => open.close(),
            None => Ok(()),
        }
    }
}

/// The live engine handle: index, writer, reader, and stemmed query parser.
struct OpenIndex {
    writer: IndexWriter,
    reader: IndexReader,
    parser: QueryParser,
    fields: DocSchema,
    path: PathBuf,
}

impl OpenIndex {
    fn open(path: &Path, writer_memory_budget: usize) -> IndexResult<Self> {
        std::fs::create_dir_all(path).map_err(|e| IndexError::OpenFailed {
            path: path.to_path_buf(),
            reason: format!("cannot create index directory: {e}"),
        })?;

        let fields = DocSchema::build();
        let index = Self::open_or_create_index(path, &fields)?;
        DocSchema::register_tokenizers(index.tokenizers());

        let writer: IndexWriter =
            index
                .writer(writer_memory_budget)
                .map_err(|e| IndexError::OpenFailed {
                    path: path.to_path_buf(),
                    reason: format!("cannot acquire index writer: {e}"),
                })?;

        let reader = index.reader().map_err(|e| IndexError::OpenFailed {
            path: path.to_path_buf(),
            reason: format!("cannot create index reader: {e}"),
        })?;

        let parser = QueryParser::for_index(&index, vec![fields.body]);

        Ok(OpenIndex {
            writer,
            reader,
            parser,
            fields,
            path: path.to_path_buf(),
        })
    }

    fn open_or_create_index(path: &Path, fields: &DocSchema) -> IndexResult<Index> {
        let open_failed = |reason: String| IndexError::OpenFailed {
            path: path.to_path_buf(),
            reason,
        };

        if path.join("meta.json").exists() {
            let existing = Index::open_in_dir(path)
                .map_err(|e| open_failed(format!("cannot open existing index: {e}")))?;

            // Field-count check catches an index left behind by an
            // incompatible schema version; recreate rather than limp along.
            if existing.schema().num_fields() == fields.schema.num_fields() {
                return Ok(existing);
            }
            tracing::warn!(
                existing_fields = existing.schema().num_fields(),
                expected_fields = fields.schema.num_fields(),
                "schema mismatch detected; recreating index"
            );
            drop(existing);
            std::fs::remove_dir_all(path)
                .map_err(|e| open_failed(format!("cannot remove stale index: {e}")))?;
            std::fs::create_dir_all(path)
                .map_err(|e| open_failed(format!("cannot recreate index directory: {e}")))?;
        }

        let directory = MmapDirectory::open(path)
            .map_err(|e| open_failed(format!("cannot mmap index directory: {e}")))?;
        Index::create(directory, fields.schema.clone(), IndexSettings::default())
            .map_err(|e| open_failed(format!("cannot create index: {e}")))
    }

    fn commit_document(&mut self, entry: &DocumentEntry) -> IndexResult<()> {
        let commit_failed = |reason: String| IndexError::CommitFailed {
            doc_id: entry.id.clone(),
            reason,
        };

        // Replace any previous posting for this id.
        self.writer
            .delete_term(Term::from_field_text(self.fields.id, &entry.id));

        let mut doc = TantivyDocument::default();
        doc.add_text(self.fields.id, &entry.id);
        doc.add_text(self.fields.locator, &entry.locator);
        doc.add_text(self.fields.kind, &entry.kind);
        doc.add_text(self.fields.body, &entry.body);
        doc.add_text(self.fields.digest, &entry.digest);

        self.writer
            .add_document(doc)
            .map_err(|e| commit_failed(format!("add_document: {e}")))?;
        self.writer
            .commit()
            .map_err(|e| commit_failed(format!("commit: {e}")))?;
        self.reader
            .reload()
            .map_err(|e| commit_failed(format!("reader reload: {e}")))?;
        Ok(())
    }

    fn search(&self, text: &str, limit: usize) -> IndexResult<Vec<SearchHit>> {
        let query = self.parser.parse_query(text)?;
        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let text_field = |field| {
                doc.get_first(field)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            };
            hits.push(SearchHit {
                doc_id: text_field(self.fields.id),
                locator: text_field(self.fields.locator),
                kind: text_field(self.fields.kind),
                score,
                excerpt: excerpt_of(&text_field(self.fields.body)),
            });
        }
        Ok(hits)
    }

    fn close(mut self) -> IndexResult<()> {
        self.writer
            .commit()
            .map_err(|e| IndexError::CommitFailed {
                doc_id: String::new(),
                reason: format!("final commit: {e}"),
            })?;
        Ok(())
    }
}

fn excerpt_of(body: &str) -> String {
    if body.chars().count() > EXCERPT_CHARS {
        let truncated: String = body.chars().take(EXCERPT_CHARS).collect();
        format!("{truncated}...")
    } else {
        body.to_string()
    }
}
