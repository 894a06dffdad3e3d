//! Serialized command surface
//!
//! [`PageCommand`] is the message-passing entry point: a host (worker,
//! server, test harness) posts one self-contained command with the source
//! bytes inline and gets back a [`ProcessResult`] with base64-encoded
//! output. Interactive callers use [`crate::engine`] directly instead.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::document::DocumentHandle;
use crate::engine::{self, range_group_plans};
use crate::plan::TransformPlan;
use crate::ranges::parse_range_groups;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum PageCommand {
    Merge {
        files: Vec<Vec<u8>>,
    },
    Split {
        file: Vec<u8>,
        /// Range-group spec like "1-3, 5, 8-10"; each group becomes one
        /// output document.
        ranges: String,
    },
    Transform {
        file: Vec<u8>,
        plan: TransformPlan,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub success: bool,
    /// Base64-encoded PDF data for single-output commands
    pub data: Option<String>,
    /// Base64-encoded PDFs for split, one per range group
    pub outputs: Option<Vec<String>>,
    pub error: Option<String>,
    pub metrics: Option<ProcessMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
}

impl ProcessResult {
    pub fn ok(bytes: &[u8], metrics: ProcessMetrics) -> Self {
        Self {
            success: true,
            data: Some(STANDARD.encode(bytes)),
            outputs: None,
            error: None,
            metrics: Some(metrics),
        }
    }

    pub fn ok_many(documents: &[Vec<u8>], metrics: ProcessMetrics) -> Self {
        Self {
            success: true,
            data: None,
            outputs: Some(documents.iter().map(|d| STANDARD.encode(d)).collect()),
            error: None,
            metrics: Some(metrics),
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            outputs: None,
            error: Some(error.into()),
            metrics: None,
        }
    }

    /// Stamp the elapsed time onto the metrics. The executor does not
    /// read a clock itself; hosts measure and attach it.
    pub fn timed(mut self, elapsed_ms: u64) -> Self {
        if let Some(metrics) = self.metrics.as_mut() {
            metrics.processing_time_ms = elapsed_ms;
        }
        self
    }
}

/// Execute one command against freshly loaded sources.
///
/// Errors never escape as `Err`; every failure is folded into a
/// `ProcessResult` with `success = false` so the host has a single shape
/// to forward.
pub fn run_command(command: PageCommand) -> ProcessResult {
    match command {
        PageCommand::Merge { files } => run_merge(&files),
        PageCommand::Split { file, ranges } => run_split(&file, &ranges),
        PageCommand::Transform { file, plan } => run_transform(&file, &plan),
    }
}

fn run_merge(files: &[Vec<u8>]) -> ProcessResult {
    let sources = match load_all(files) {
        Ok(sources) => sources,
        Err(message) => return ProcessResult::fail(message),
    };
    let input_size_bytes: usize = files.iter().map(|f| f.len()).sum();
    let page_count: u32 = sources.iter().map(|s| s.page_count()).sum();

    match engine::apply_merged(&sources, &TransformPlan::new()) {
        Ok(bytes) => ProcessResult::ok(
            &bytes,
            ProcessMetrics {
                input_size_bytes,
                output_size_bytes: bytes.len(),
                page_count,
                processing_time_ms: 0,
            },
        ),
        Err(e) => ProcessResult::fail(e.to_string()),
    }
}

fn run_split(file: &[u8], ranges: &str) -> ProcessResult {
    let source = match DocumentHandle::load(0, "input.pdf", file.to_vec()) {
        Ok(source) => source,
        Err(e) => return ProcessResult::fail(e.to_string()),
    };
    let groups = match parse_range_groups(ranges, source.page_count()) {
        Ok(groups) => groups,
        Err(e) => return ProcessResult::fail(e.to_string()),
    };
    let page_count: u32 = groups.iter().map(|g| g.len() as u32).sum();
    let sub_plans = range_group_plans(&groups);

    match engine::apply_multi(&source, &sub_plans) {
        Ok(documents) => {
            let output_size_bytes = documents.iter().map(|d| d.len()).sum();
            ProcessResult::ok_many(
                &documents,
                ProcessMetrics {
                    input_size_bytes: file.len(),
                    output_size_bytes,
                    page_count,
                    processing_time_ms: 0,
                },
            )
        }
        Err(e) => ProcessResult::fail(e.to_string()),
    }
}

fn run_transform(file: &[u8], plan: &TransformPlan) -> ProcessResult {
    let source = match DocumentHandle::load(0, "input.pdf", file.to_vec()) {
        Ok(source) => source,
        Err(e) => return ProcessResult::fail(e.to_string()),
    };
    let page_count = match engine::resolve_plan(&[source.page_count()], plan) {
        Ok(resolved) => resolved.len() as u32,
        Err(e) => return ProcessResult::fail(e.to_string()),
    };

    match engine::apply(&source, plan) {
        Ok(bytes) => ProcessResult::ok(
            &bytes,
            ProcessMetrics {
                input_size_bytes: file.len(),
                output_size_bytes: bytes.len(),
                page_count,
                processing_time_ms: 0,
            },
        ),
        Err(e) => ProcessResult::fail(e.to_string()),
    }
}

fn load_all(files: &[Vec<u8>]) -> Result<Vec<DocumentHandle>, String> {
    if files.is_empty() {
        return Err("no input files".to_string());
    }
    files
        .iter()
        .enumerate()
        .map(|(i, bytes)| {
            DocumentHandle::load(i as u64, &format!("input-{}.pdf", i + 1), bytes.clone())
                .map_err(|e| format!("file {}: {}", i + 1, e))
        })
        .collect()
}
