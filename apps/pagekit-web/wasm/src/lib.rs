//! WASM bindings for the page-tool suite
//!
//! This module provides a stateful, session-based API for page operations.
//! All state is held in Rust, minimizing JavaScript complexity.
//!
//! ## Architecture
//!
//! - State management in Rust via `PageSession`, one session per tool page
//! - Source validation and parsing in Rust
//! - Page geometry extraction in Rust
//! - JavaScript only handles DOM events, rendering, and file I/O
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { PageSession } from './pkg/pagekit_wasm.js';
//!
//! await init();
//!
//! // Extract pages
//! const session = new PageSession("extract");
//! session.setProgressCallback((current, total, msg) => updateUI(current, total, msg));
//! const info = session.addDocument("file.pdf", bytes);
//! session.setPageSpec("1-3, 5");
//! session.commitMode();
//! const result = session.execute();
//! downloadBlob(result, "extracted.pdf");
//!
//! // Merge
//! const session = new PageSession("merge");
//! session.addDocument("a.pdf", bytesA);
//! session.addDocument("b.pdf", bytesB);
//! session.reorderDocuments([1, 0]); // swap order
//! const result = session.execute();
//! ```

pub mod page_info;
pub mod session;
pub mod validation;

use wasm_bindgen::prelude::*;

// Re-export main types for JavaScript
pub use page_info::{PageOrientation, PageSummary};
pub use session::PageSession;
pub use validation::PdfInfo;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Names of the tools a session can be created for
#[wasm_bindgen]
pub fn tool_names() -> Vec<String> {
    pagekit_core::ToolProfile::builtin_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

/// Quick validation check for an uploaded file
/// Returns Ok(()) if valid, Err with message if not
#[wasm_bindgen]
pub fn quick_validate(bytes: &[u8]) -> Result<(), JsValue> {
    validation::quick_validate(bytes).map_err(|e| JsValue::from_str(&e))
}

/// Get detailed source info without creating a session
/// Useful for showing file info before user commits to an operation
#[wasm_bindgen]
pub fn get_pdf_info(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let info = validation::validate_source(bytes).map_err(|e| JsValue::from_str(&e))?;

    serde_wasm_bindgen::to_value(&info)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Get page count from source bytes (convenience function)
#[wasm_bindgen]
pub fn get_page_count(bytes: &[u8]) -> Result<u32, JsValue> {
    pagekit_core::get_page_count(bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Run one self-contained command (used by the worker transport).
/// Input is a `PageCommand` object; output is a `ProcessResult`.
#[wasm_bindgen]
pub fn run_command(command: JsValue) -> Result<JsValue, JsValue> {
    let command: pagekit_core::PageCommand = serde_wasm_bindgen::from_value(command)
        .map_err(|e| JsValue::from_str(&format!("Invalid command: {}", e)))?;

    let started = js_sys::Date::now();
    let result = pagekit_core::command::run_command(command);
    let result = result.timed((js_sys::Date::now() - started) as u64);

    serde_wasm_bindgen::to_value(&result)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Format bytes as human-readable string
#[wasm_bindgen]
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_version() {
        let version = get_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn test_tool_names_cover_the_suite() {
        let names = tool_names();
        assert!(names.contains(&"merge".to_string()));
        assert!(names.contains(&"page-numbers".to_string()));
        assert_eq!(names.len(), 9);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
        assert_eq!(format_bytes(2621440), "2.5 MB");
    }
}
