//! PDF extraction via the external `pdftotext` tool
//!
//! PDFs are the bulk of published campaign material, and also the inputs
//! most likely to choke a converter. The conversion runs in its own
//! subprocess and writes into a temp file, so a bad PDF costs us one
//! dropped document, nothing more.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::types::DocumentRef;

use super::{ExtractError, Provider};

const CONVERTER: &str = "pdftotext";

pub struct PdfProvider {
    converter: &'static str,
}

impl PdfProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            converter: CONVERTER,
        }
    }
}

impl Default for PdfProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for PdfProvider {
    fn kind(&self) -> &'static str {
        "pdf"
    }

    fn can_handle(&self, doc: &DocumentRef) -> bool {
        Path::new(&doc.locator)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
    }

    fn extract(&self, doc: &DocumentRef) -> Result<String, ExtractError> {
        if !self.can_handle(doc) {
            return Err(ExtractError::Rejected(format!(
                "`{}` is not a PDF",
                doc.locator
            )));
        }

        let output = tempfile::NamedTempFile::with_suffix(".txt")?;
        tracing::debug!(
            locator = %doc.locator,
            destination = ?output.path(),
            "converting PDF to text"
        );

        let status = Command::new(self.converter)
            .arg(&doc.locator)
            .arg(output.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                ExtractError::Converter(format!("failed to run {}: {e}", self.converter))
            })?;

        if !status.success() {
            return Err(ExtractError::Converter(format!(
                "{} exited with {status} for `{}`",
                self.converter, doc.locator
            )));
        }

        let text = std::fs::read_to_string(output.path())?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pdf_extensions_are_accepted() {
        let provider = PdfProvider::new();
        assert!(provider.can_handle(&DocumentRef::new("/books/phb.pdf", "pdf")));
        assert!(provider.can_handle(&DocumentRef::new("/books/PHB.PDF", "pdf")));
        assert!(!provider.can_handle(&DocumentRef::new("/books/phb.txt", "pdf")));
    }

    #[test]
    fn non_pdf_locator_is_rejected_before_conversion() {
        let provider = PdfProvider::new();
        let doc = DocumentRef::new("/notes/session.txt", "pdf");
        assert!(matches!(
            provider.extract(&doc),
            Err(ExtractError::Rejected(_))
        ));
    }
}
