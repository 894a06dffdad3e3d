//! Page-set transformation and preview engine
//!
//! This crate provides client-side page manipulation using lopdf. Tools
//! compile user intent into a [`plan::TransformPlan`], the engine resolves
//! the plan against an evolving working array, and the materializer writes
//! a fresh output document. [`preview::PreviewState`] tracks the thumbnail
//! grid that drives plan construction interactively.

pub mod command;
pub mod document;
pub mod engine;
pub mod error;
pub mod materialize;
pub mod plan;
pub mod preview;
pub mod profile;
pub mod ranges;

pub use command::{PageCommand, ProcessMetrics, ProcessResult};
pub use document::DocumentHandle;
pub use engine::{apply, apply_merged, apply_multi, resolve_plan};
pub use error::{LoadError, ParseError, PreviewError, RenderError, TransformError};
pub use plan::{CropRect, OpKind, OverlayAnchor, OverlayText, TransformOp, TransformPlan};
pub use preview::{DocPhase, PagePhase, PreviewMode, PreviewState};
pub use profile::ToolProfile;
pub use ranges::{dedup_pages, parse_page_spec, parse_page_spec_with, parse_range_groups, RangeOrder};

/// Parse source bytes and return the page count without keeping a handle.
pub fn get_page_count(bytes: &[u8]) -> Result<u32, LoadError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| LoadError::Corrupt(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}
