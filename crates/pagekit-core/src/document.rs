//! Loaded source documents
//!
//! A [`DocumentHandle`] is an immutable, validated source: the raw bytes,
//! the parsed document, and its page count. One handle is created per
//! uploaded file and dropped when the user replaces or clears that file.

use crate::error::LoadError;
use lopdf::Document;

#[derive(Debug)]
pub struct DocumentHandle {
    id: u64,
    name: String,
    bytes: Vec<u8>,
    document: Document,
    page_count: u32,
}

impl DocumentHandle {
    /// Parse and validate source bytes.
    ///
    /// Rejects anything without a `%PDF-` header, encrypted documents, and
    /// documents with zero pages. The handle is immutable once created.
    pub fn load(id: u64, name: &str, bytes: Vec<u8>) -> Result<Self, LoadError> {
        if bytes.len() < 8 || !bytes.starts_with(b"%PDF-") {
            return Err(LoadError::Corrupt("missing %PDF- header".to_string()));
        }

        let document = Document::load_mem(&bytes).map_err(|e| LoadError::Corrupt(e.to_string()))?;

        if document.is_encrypted() {
            return Err(LoadError::Encrypted);
        }

        let page_count = document.get_pages().len() as u32;
        if page_count == 0 {
            return Err(LoadError::Unsupported("document has no pages".to_string()));
        }

        tracing::debug!(id, name, page_count, size = bytes.len(), "loaded document");

        Ok(Self {
            id,
            name: name.to_string(),
            bytes,
            document,
            page_count,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw source bytes, read-only for the handle's lifetime.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }
}
