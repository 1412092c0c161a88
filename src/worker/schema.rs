//! Tantivy schema for campaign documents
//!
//! One index per campaign, five fields. The body field (and query parsing)
//! goes through a stemming tokenizer chain so morphological variants of a
//! word match each other.

use tantivy::schema::{
    Field, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing, TextOptions,
};
use tantivy::tokenizer::{
    Language, LowerCaser, SimpleTokenizer, Stemmer, TextAnalyzer, TokenizerManager,
};

/// Name of the stemming analyzer registered with each index.
pub const BODY_TOKENIZER: &str = "body_stem";

/// Schema handle with resolved field ids.
#[derive(Debug, Clone)]
pub struct DocSchema {
    pub schema: Schema,
    pub id: Field,
    pub locator: Field,
    pub kind: Field,
    pub body: Field,
    pub digest: Field,
}

impl DocSchema {
    /// Build the schema. Field order is fixed so an index created by an
    /// older build with the same field count stays compatible.
    #[must_use]
    pub fn build() -> Self {
        let mut builder = Schema::builder();

        let id = builder.add_text_field("id", STRING | STORED);
        let locator = builder.add_text_field("locator", STRING | STORED);
        let kind = builder.add_text_field("kind", STRING | STORED);

        let body_indexing = TextFieldIndexing::default()
            .set_tokenizer(BODY_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let body = builder.add_text_field(
            "body",
            TextOptions::default()
                .set_indexing_options(body_indexing)
                .set_stored(),
        );

        let digest = builder.add_text_field("digest", STRING | STORED);

        DocSchema {
            schema: builder.build(),
            id,
            locator,
            kind,
            body,
            digest,
        }
    }

    /// Register the stemming analyzer with an index's tokenizer manager.
    /// Must run every time an index is opened, not just on creation.
    pub fn register_tokenizers(manager: &TokenizerManager) {
        let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .filter(Stemmer::new(Language::English))
            .build();
        manager.register(BODY_TOKENIZER, analyzer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_has_the_expected_fields() {
        let fields = DocSchema::build();
        assert_eq!(fields.schema.num_fields(), 5);
        assert_eq!(fields.schema.get_field_name(fields.body), "body");
        assert_eq!(fields.schema.get_field_name(fields.digest), "digest");
    }
}
