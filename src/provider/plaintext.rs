//! Plain-text extraction: plaintext, markdown, and friends
//!
//! Anything that is already UTF-8 text on disk is handled here. The
//! campaign layer tags these documents `plaintext` regardless of the
//! exact flavour.

use std::path::Path;

use crate::types::DocumentRef;

use super::{ExtractError, Provider};

/// Extensions this provider is willing to read.
const TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown", "rst"];

pub struct PlainTextProvider;

impl Provider for PlainTextProvider {
    fn kind(&self) -> &'static str {
        "plaintext"
    }

    fn can_handle(&self, doc: &DocumentRef) -> bool {
        let path = Path::new(&doc.locator);
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => TEXT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known)),
            // Extensionless notes are common in campaign folders.
            None => true,
        }
    }

    fn extract(&self, doc: &DocumentRef) -> Result<String, ExtractError> {
        if !self.can_handle(doc) {
            return Err(ExtractError::Rejected(format!(
                "`{}` does not look like a text file",
                doc.locator
            )));
        }
        let text = std::fs::read_to_string(&doc.locator)?;
        Ok(text)
    }
}
