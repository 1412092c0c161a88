//! Shared value types for the search subsystem
//!
//! These types cross the boundary between the caller, the wire protocol,
//! and the worker process, so they are plain data with serde support.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A document the campaign layer wants indexed.
///
/// Created by the caller when a document becomes known; the search
/// subsystem never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Opaque identifier, stable across re-indexing runs.
    pub id: Uuid,
    /// Path or URL the provider reads the document from.
    pub locator: String,
    /// Format tag used for provider lookup (e.g. `plaintext`, `pdf`).
    pub kind: String,
}

impl DocumentRef {
    /// Create a reference with a fresh id.
    #[must_use]
    pub fn new(locator: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            locator: locator.into(),
            kind: kind.into(),
        }
    }
}

/// A single ranked search match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub locator: String,
    pub kind: String,
    pub score: f32,
    pub excerpt: String,
}

/// A query waiting in the searcher's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub text: String,
    pub limit: usize,
}

/// Search hits grouped by document kind, in descending best-score order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSection {
    pub kind: String,
    pub hits: Vec<SearchHit>,
}

pub type SearchSections = Vec<SearchSection>;

/// Group ranked hits into per-kind sections.
///
/// Hits keep their relative order inside each section; sections are ordered
/// by the score of their best hit, so the strongest kind comes first.
#[must_use]
pub fn section_hits(hits: Vec<SearchHit>) -> SearchSections {
    let mut sections: Vec<SearchSection> = Vec::new();
    for hit in hits {
        match sections.iter_mut().find(|s| s.kind == hit.kind) {
            Some(section) => section.hits.push(hit),
            None => sections.push(SearchSection {
                kind: hit.kind.clone(),
                hits: vec![hit],
            }),
        }
    }
    sections.sort_by(|a, b| {
        let best_a = a.hits.first().map_or(f32::MIN, |h| h.score);
        let best_b = b.hits.first().map_or(f32::MIN, |h| h.score);
        best_b
            .partial_cmp(&best_a)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(kind: &str, score: f32) -> SearchHit {
        SearchHit {
            doc_id: Uuid::new_v4().to_string(),
            locator: format!("/docs/{kind}-{score}"),
            kind: kind.to_string(),
            score,
            excerpt: String::new(),
        }
    }

    #[test]
    fn sectioning_groups_by_kind_and_orders_by_best_score() {
        let hits = vec![
            hit("pdf", 0.9),
            hit("plaintext", 2.5),
            hit("pdf", 0.4),
            hit("plaintext", 1.0),
        ];
        let sections = section_hits(hits);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].kind, "plaintext");
        assert_eq!(sections[0].hits.len(), 2);
        assert_eq!(sections[1].kind, "pdf");
        assert_eq!(sections[1].hits.len(), 2);
    }

    #[test]
    fn sectioning_empty_input_yields_no_sections() {
        assert!(section_hits(Vec::new()).is_empty());
    }
}
