//! Source validation and info extraction
//!
//! Validates uploaded files and extracts the metadata the file list shows.

use lopdf::Document;
use pagekit_core::DocumentHandle;
use serde::Serialize;

/// Source file information extracted during validation
#[derive(Debug, Clone, Serialize, Default)]
pub struct PdfInfo {
    /// Number of pages in the document
    pub page_count: u32,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    /// Whether the document is encrypted
    pub encrypted: bool,
    /// File size in bytes
    pub size_bytes: usize,
    /// Whether the document is usable as a transform source
    pub valid: bool,
    /// Document title from metadata (if available)
    pub title: Option<String>,
    /// Document author from metadata (if available)
    pub author: Option<String>,
}

/// Validate source bytes and extract basic info.
///
/// Structural checks (header, parse, encryption, empty page tree) are the
/// loader's; this adds the header version and Info-dictionary metadata.
pub fn validate_source(bytes: &[u8]) -> Result<PdfInfo, String> {
    let handle = DocumentHandle::load(0, "probe.pdf", bytes.to_vec()).map_err(|e| e.to_string())?;

    let (title, author) = extract_metadata(handle.document());

    Ok(PdfInfo {
        page_count: handle.page_count(),
        version: extract_version(bytes),
        encrypted: false,
        size_bytes: bytes.len(),
        valid: true,
        title,
        author,
    })
}

/// Extract the version from the `%PDF-x.y` header
fn extract_version(bytes: &[u8]) -> String {
    if bytes.len() >= 8 && bytes.starts_with(b"%PDF-") {
        if let Ok(version) = std::str::from_utf8(&bytes[5..8]) {
            return version.trim().to_string();
        }
    }
    "1.4".to_string()
}

/// Title and author from the trailer's Info dictionary, when present
fn extract_metadata(document: &Document) -> (Option<String>, Option<String>) {
    let info_dict = document
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|o| o.as_reference().ok())
        .and_then(|id| document.objects.get(&id))
        .and_then(|o| o.as_dict().ok());

    let Some(info_dict) = info_dict else {
        return (None, None);
    };

    let field = |key: &[u8]| {
        info_dict
            .get(key)
            .ok()
            .and_then(|o| o.as_str().ok())
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .filter(|s| !s.is_empty())
    };

    (field(b"Title"), field(b"Author"))
}

/// Quick validation without full parsing (for large files)
pub fn quick_validate(bytes: &[u8]) -> Result<(), String> {
    if bytes.len() < 8 {
        return Err("File too small to be a valid PDF".to_string());
    }

    if !bytes.starts_with(b"%PDF-") {
        return Err("Not a valid PDF file (missing %PDF- header)".to_string());
    }

    // EOF marker should appear near the end
    let tail = if bytes.len() > 1024 {
        &bytes[bytes.len() - 1024..]
    } else {
        bytes
    };

    if !tail.windows(5).any(|w| w == b"%%EOF") {
        return Err("PDF appears truncated (missing %%EOF marker)".to_string());
    }

    Ok(())
}
