//! Stateful page-tool session
//!
//! One [`PageSession`] backs one open tool page. State lives in Rust: the
//! loaded sources, the preview state machine, and the accumulating
//! transform plan. JavaScript only forwards DOM events and file bytes.

use crate::validation::{validate_source, PdfInfo};
use pagekit_core::engine::{page_number_plan, range_group_plans, watermark_plan};
use pagekit_core::{
    apply_merged, apply_multi, dedup_pages, parse_page_spec, parse_range_groups, CropRect,
    DocumentHandle, OpKind, OverlayAnchor, OverlayText, PagePhase, PreviewMode, PreviewState,
    RenderError, ToolProfile, TransformOp, TransformPlan,
};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct PageSession {
    profile: ToolProfile,
    documents: Vec<DocumentHandle>,
    preview: PreviewState,
    plan: TransformPlan,
    next_doc_id: u64,
    progress_callback: Option<js_sys::Function>,
}

#[wasm_bindgen]
impl PageSession {
    /// Create a session for a named tool ("merge", "split", "rotate", ...)
    #[wasm_bindgen(constructor)]
    pub fn new(tool: &str) -> Result<PageSession, JsValue> {
        Self::new_internal(tool).map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = toolName)]
    pub fn tool_name(&self) -> String {
        self.profile.name.clone()
    }

    /// Set a progress callback function
    /// Callback signature: (current: number, total: number, message: string) => void
    #[wasm_bindgen(js_name = setProgressCallback)]
    pub fn set_progress_callback(&mut self, callback: js_sys::Function) {
        self.progress_callback = Some(callback);
    }

    /// Add a source document, returning its info as a JS object
    #[wasm_bindgen(js_name = addDocument)]
    pub fn add_document(&mut self, name: &str, bytes: &[u8]) -> Result<JsValue, JsValue> {
        let info = self
            .add_document_internal(name, bytes)
            .map_err(|e| JsValue::from_str(&e))?;

        serde_wasm_bindgen::to_value(&info)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Remove a source by index
    #[wasm_bindgen(js_name = removeDocument)]
    pub fn remove_document(&mut self, index: usize) -> Result<(), JsValue> {
        self.remove_document_internal(index)
            .map_err(|e| JsValue::from_str(&e))
    }

    /// Replace a source in place, dropping the old handle. Replacing the
    /// active source invalidates in-flight thumbnail renders.
    #[wasm_bindgen(js_name = replaceDocument)]
    pub fn replace_document(
        &mut self,
        index: usize,
        name: &str,
        bytes: &[u8],
    ) -> Result<JsValue, JsValue> {
        let info = self
            .replace_document_internal(index, name, bytes)
            .map_err(|e| JsValue::from_str(&e))?;

        serde_wasm_bindgen::to_value(&info)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Reorder sources (merge tool); `new_order` lists current indices in
    /// the desired order
    #[wasm_bindgen(js_name = reorderDocuments)]
    pub fn reorder_documents(&mut self, new_order: &[usize]) -> Result<(), JsValue> {
        self.reorder_documents_internal(new_order)
            .map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = getDocumentCount)]
    pub fn get_document_count(&self) -> usize {
        self.documents.len()
    }

    #[wasm_bindgen(js_name = getTotalPageCount)]
    pub fn get_total_page_count(&self) -> u32 {
        self.documents.iter().map(|d| d.page_count()).sum()
    }

    /// Get all source infos for the file list
    #[wasm_bindgen(js_name = getDocumentInfos)]
    pub fn get_document_infos(&self) -> Result<JsValue, JsValue> {
        let infos: Vec<_> = self
            .documents
            .iter()
            .map(|d| DocumentInfoJs {
                name: d.name().to_string(),
                page_count: d.page_count(),
                size_bytes: d.bytes().len(),
            })
            .collect();

        serde_wasm_bindgen::to_value(&infos)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Geometry summary for one page of the active (first) source
    #[wasm_bindgen(js_name = getPageSummary)]
    pub fn get_page_summary(&self, page_num: u32) -> Result<JsValue, JsValue> {
        let doc = self
            .documents
            .first()
            .ok_or_else(|| JsValue::from_str("No document loaded"))?;
        let summary = crate::page_info::PageSummary::from_document(doc.document(), page_num)
            .map_err(|e| JsValue::from_str(&e))?;

        serde_wasm_bindgen::to_value(&summary)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    // ---- preview passthroughs ----

    /// Current render epoch. Thumbnail requests must echo this back in
    /// their completion calls.
    pub fn epoch(&self) -> f64 {
        self.preview.epoch() as f64
    }

    pub fn mode(&self) -> String {
        self.preview.mode().to_string()
    }

    #[wasm_bindgen(js_name = setMode)]
    pub fn set_mode(&mut self, mode: &str) -> Result<(), JsValue> {
        let mode = parse_mode(mode).ok_or_else(|| JsValue::from_str("Unknown mode"))?;
        self.preview.set_mode(mode);
        Ok(())
    }

    #[wasm_bindgen(js_name = pagePhase)]
    pub fn page_phase(&self, page: u32) -> String {
        match self.preview.page_phase(page) {
            Some(PagePhase::Pending) | None => "pending".to_string(),
            Some(PagePhase::Loaded) => "loaded".to_string(),
            Some(PagePhase::Error(_)) => "error".to_string(),
        }
    }

    /// Record a finished thumbnail render. Returns false when the result
    /// was stale and dropped.
    #[wasm_bindgen(js_name = pageLoaded)]
    pub fn page_loaded(&mut self, epoch: f64, page: u32) -> bool {
        self.preview.page_loaded(epoch as u64, page)
    }

    #[wasm_bindgen(js_name = pageFailed)]
    pub fn page_failed(&mut self, epoch: f64, page: u32, reason: &str) -> bool {
        let error = if reason == "timeout" {
            RenderError::Timeout
        } else {
            RenderError::Unsupported {
                reason: reason.to_string(),
            }
        };
        self.preview.page_failed(epoch as u64, page, error)
    }

    #[wasm_bindgen(js_name = retryPage)]
    pub fn retry_page(&mut self, page: u32) -> bool {
        self.preview.retry_page(page)
    }

    /// Document-level render lifecycle, driven by the pdf.js loader
    #[wasm_bindgen(js_name = beginLoading)]
    pub fn begin_loading(&mut self) {
        self.preview.begin_loading();
    }

    #[wasm_bindgen(js_name = markReady)]
    pub fn mark_ready(&mut self) {
        self.preview.mark_ready();
    }

    #[wasm_bindgen(js_name = markFailed)]
    pub fn mark_failed(&mut self) {
        self.preview.mark_failed();
    }

    #[wasm_bindgen(js_name = selectPage)]
    pub fn select_page(&mut self, page: u32) -> Result<bool, JsValue> {
        self.preview
            .select_page(page)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = selectAll)]
    pub fn select_all(&mut self) -> Result<(), JsValue> {
        self.preview
            .select_all()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = deselectAll)]
    pub fn deselect_all(&mut self) -> Result<(), JsValue> {
        self.preview
            .deselect_all()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = getSelectedPages)]
    pub fn get_selected_pages(&self) -> Vec<u32> {
        self.preview.selection().iter().copied().collect()
    }

    /// Replace the selection from a spec like "1-3, 5"
    #[wasm_bindgen(js_name = setPageSpec)]
    pub fn set_page_spec(&mut self, spec: &str) -> Result<(), JsValue> {
        self.set_page_spec_internal(spec)
            .map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = setRotation)]
    pub fn set_rotation(&mut self, page: u32, delta: i32) -> Result<i32, JsValue> {
        self.preview
            .set_rotation(page, delta)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = markDelete)]
    pub fn mark_delete(&mut self, page: u32) -> Result<bool, JsValue> {
        self.preview
            .mark_delete(page)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = movePage)]
    pub fn move_page(&mut self, from: u32, to: u32) -> Result<(), JsValue> {
        self.preview
            .move_to(from, to)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = setOrder)]
    pub fn set_order(&mut self, order: &[u32]) -> Result<(), JsValue> {
        self.preview
            .set_order(order)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = pendingOrder)]
    pub fn pending_order(&self) -> Vec<u32> {
        self.preview.pending_order().to_vec()
    }

    // ---- plan construction ----

    /// Compile the current mode's overlay into the plan. Returns the
    /// number of ops appended.
    #[wasm_bindgen(js_name = commitMode)]
    pub fn commit_mode(&mut self) -> Result<usize, JsValue> {
        self.commit_mode_internal().map_err(|e| JsValue::from_str(&e))
    }

    /// Queue a crop of the given pages to a rectangle in page points
    #[wasm_bindgen(js_name = addCrop)]
    pub fn add_crop(
        &mut self,
        spec: &str,
        top: f64,
        bottom: f64,
        left: f64,
        right: f64,
    ) -> Result<(), JsValue> {
        self.add_crop_internal(
            spec,
            CropRect {
                top,
                bottom,
                left,
                right,
            },
        )
        .map_err(|e| JsValue::from_str(&e))
    }

    /// Queue a watermark on every page
    #[wasm_bindgen(js_name = addWatermark)]
    pub fn add_watermark(
        &mut self,
        text: &str,
        font_size: f64,
        color: &str,
        opacity: f64,
    ) -> Result<(), JsValue> {
        self.add_watermark_internal(text, font_size, color, opacity)
            .map_err(|e| JsValue::from_str(&e))
    }

    /// Queue "n / total" page numbers at an anchor like "bottom_center"
    #[wasm_bindgen(js_name = addPageNumbers)]
    pub fn add_page_numbers(&mut self, anchor: &str, font_size: f64) -> Result<(), JsValue> {
        self.add_page_numbers_internal(anchor, font_size)
            .map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = planLength)]
    pub fn plan_length(&self) -> usize {
        self.plan.len()
    }

    #[wasm_bindgen(js_name = clearPlan)]
    pub fn clear_plan(&mut self) {
        self.plan = TransformPlan::new();
    }

    /// The queued plan as JSON, for debugging and UI display
    #[wasm_bindgen(js_name = planJson)]
    pub fn plan_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.plan)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    // ---- execution ----

    /// Check if session is ready for execution
    #[wasm_bindgen(js_name = canExecute)]
    pub fn can_execute(&self) -> bool {
        if self.profile.multi_source {
            self.documents.len() >= 2
        } else {
            self.documents.len() == 1 && !self.plan.is_empty()
        }
    }

    /// Apply the queued plan and return the output document
    pub fn execute(&self) -> Result<js_sys::Uint8Array, JsValue> {
        let result = self.execute_internal().map_err(|e| JsValue::from_str(&e))?;
        let array = js_sys::Uint8Array::new_with_length(result.len() as u32);
        array.copy_from(&result);
        Ok(array)
    }

    /// Split the source into one output per range group, e.g. "1-5, 6-10"
    #[wasm_bindgen(js_name = executeSplit)]
    pub fn execute_split(&self, ranges: &str) -> Result<js_sys::Array, JsValue> {
        let outputs = self
            .execute_split_internal(ranges)
            .map_err(|e| JsValue::from_str(&e))?;

        let array = js_sys::Array::new();
        for output in &outputs {
            let bytes = js_sys::Uint8Array::new_with_length(output.len() as u32);
            bytes.copy_from(output);
            array.push(&bytes);
        }
        Ok(array)
    }
}

// Internal methods, testable without JsValue
impl PageSession {
    fn new_internal(tool: &str) -> Result<Self, String> {
        let profile =
            ToolProfile::named(tool).ok_or_else(|| format!("Unknown tool: {}", tool))?;
        Ok(Self {
            profile,
            documents: Vec::new(),
            preview: PreviewState::new(0, 0),
            plan: TransformPlan::new(),
            next_doc_id: 1,
            progress_callback: None,
        })
    }

    fn add_document_internal(&mut self, name: &str, bytes: &[u8]) -> Result<PdfInfo, String> {
        if !self.profile.multi_source && !self.documents.is_empty() {
            return Err(format!(
                "The {} tool takes a single document. Remove the existing one first.",
                self.profile.name
            ));
        }

        let info = validate_source(bytes)?;

        let id = self.next_doc_id;
        self.next_doc_id += 1;
        let handle = DocumentHandle::load(id, name, bytes.to_vec()).map_err(|e| e.to_string())?;

        let is_first = self.documents.is_empty();
        self.documents.push(handle);

        if is_first {
            self.attach_active();
        }

        Ok(info)
    }

    fn replace_document_internal(
        &mut self,
        index: usize,
        name: &str,
        bytes: &[u8],
    ) -> Result<PdfInfo, String> {
        if index >= self.documents.len() {
            return Err("Document index out of bounds".to_string());
        }

        let info = validate_source(bytes)?;

        let id = self.next_doc_id;
        self.next_doc_id += 1;
        let handle = DocumentHandle::load(id, name, bytes.to_vec()).map_err(|e| e.to_string())?;

        self.documents[index] = handle;
        if index == 0 {
            self.attach_active();
        }

        Ok(info)
    }

    fn remove_document_internal(&mut self, index: usize) -> Result<(), String> {
        if index >= self.documents.len() {
            return Err("Document index out of bounds".to_string());
        }
        self.documents.remove(index);
        if index == 0 {
            self.attach_active();
        }
        Ok(())
    }

    fn reorder_documents_internal(&mut self, new_order: &[usize]) -> Result<(), String> {
        if !self.profile.multi_source {
            return Err(format!(
                "The {} tool has a single source; nothing to reorder",
                self.profile.name
            ));
        }
        let len = self.documents.len();
        if new_order.len() != len {
            return Err("Invalid order: wrong number of indices".to_string());
        }

        // rank[old_index] = new position
        let mut rank = vec![usize::MAX; len];
        for (position, &idx) in new_order.iter().enumerate() {
            if idx >= len {
                return Err("Invalid order: index out of bounds".to_string());
            }
            if rank[idx] != usize::MAX {
                return Err("Invalid order: duplicate index".to_string());
            }
            rank[idx] = position;
        }

        let mut paired: Vec<(usize, DocumentHandle)> = self
            .documents
            .drain(..)
            .enumerate()
            .map(|(i, doc)| (rank[i], doc))
            .collect();
        paired.sort_by_key(|(position, _)| *position);
        self.documents = paired.into_iter().map(|(_, doc)| doc).collect();

        if new_order.first() != Some(&0) {
            self.attach_active();
        }
        Ok(())
    }

    fn attach_active(&mut self) {
        match self.documents.first() {
            Some(doc) => {
                let (id, pages) = (doc.id(), doc.page_count());
                self.preview.attach(id, pages);
                self.preview.set_mode(self.profile.default_mode);
            }
            None => self.preview.attach(0, 0),
        }
    }

    fn set_page_spec_internal(&mut self, spec: &str) -> Result<(), String> {
        if self.documents.is_empty() {
            return Err("No document loaded".to_string());
        }
        let pages =
            parse_page_spec(spec, self.preview.page_count()).map_err(|e| e.to_string())?;

        self.preview.deselect_all().map_err(|e| e.to_string())?;
        for page in dedup_pages(&pages) {
            self.preview.select_page(page).map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    fn commit_mode_internal(&mut self) -> Result<usize, String> {
        let kind = match self.preview.mode() {
            PreviewMode::View => return Err("Nothing to commit in view mode".to_string()),
            PreviewMode::Select => OpKind::KeepSubset,
            PreviewMode::Rotate => OpKind::RotateSet,
            PreviewMode::Delete => OpKind::DeleteSet,
            PreviewMode::Reorder => OpKind::Reorder,
        };
        self.check_allowed(kind)?;
        Ok(self.preview.commit(&mut self.plan))
    }

    fn add_crop_internal(&mut self, spec: &str, rect: CropRect) -> Result<(), String> {
        self.check_allowed(OpKind::CropSet)?;
        if self.documents.is_empty() {
            return Err("No document loaded".to_string());
        }
        let pages =
            parse_page_spec(spec, self.preview.page_count()).map_err(|e| e.to_string())?;
        self.plan.push(TransformOp::CropSet {
            pages: dedup_pages(&pages),
            rect,
        });
        Ok(())
    }

    fn add_watermark_internal(
        &mut self,
        text: &str,
        font_size: f64,
        color: &str,
        opacity: f64,
    ) -> Result<(), String> {
        self.check_allowed(OpKind::Overlay)?;
        if self.documents.is_empty() {
            return Err("No document loaded".to_string());
        }
        let content = OverlayText {
            text: text.to_string(),
            font_size,
            color: color.to_string(),
            opacity,
        };
        for op in watermark_plan(self.preview.page_count(), content).ops() {
            self.plan.push(op.clone());
        }
        Ok(())
    }

    fn add_page_numbers_internal(&mut self, anchor: &str, font_size: f64) -> Result<(), String> {
        self.check_allowed(OpKind::Overlay)?;
        if self.documents.is_empty() {
            return Err("No document loaded".to_string());
        }
        let anchor = parse_anchor(anchor).ok_or_else(|| format!("Unknown anchor: {}", anchor))?;
        for op in page_number_plan(self.preview.page_count(), anchor, font_size).ops() {
            self.plan.push(op.clone());
        }
        Ok(())
    }

    fn execute_internal(&self) -> Result<Vec<u8>, String> {
        if !self.can_execute() {
            return Err("Session not ready for execution".to_string());
        }

        self.report_progress(0, 100, "Starting...");
        let result = apply_merged(&self.documents, &self.plan).map_err(|e| e.to_string())?;
        self.report_progress(100, 100, "Complete");

        Ok(result)
    }

    fn execute_split_internal(&self, ranges: &str) -> Result<Vec<Vec<u8>>, String> {
        self.check_allowed(OpKind::KeepSubset)?;
        let source = match self.documents.as_slice() {
            [source] => source,
            [] => return Err("No document loaded".to_string()),
            _ => return Err("Split takes a single source document".to_string()),
        };

        let groups =
            parse_range_groups(ranges, source.page_count()).map_err(|e| e.to_string())?;
        let sub_plans = range_group_plans(&groups);

        self.report_progress(10, 100, "Extracting pages...");
        let outputs = apply_multi(source, &sub_plans).map_err(|e| e.to_string())?;
        self.report_progress(100, 100, "Complete");

        Ok(outputs)
    }

    fn check_allowed(&self, kind: OpKind) -> Result<(), String> {
        if self.profile.allows(kind) {
            Ok(())
        } else {
            Err(format!(
                "The {} tool does not support this operation",
                self.profile.name
            ))
        }
    }

    fn report_progress(&self, current: u32, total: u32, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            let this = JsValue::null();
            let _ = callback.call3(
                &this,
                &JsValue::from(current),
                &JsValue::from(total),
                &JsValue::from_str(message),
            );
        }
    }
}

fn parse_mode(name: &str) -> Option<PreviewMode> {
    match name {
        "view" => Some(PreviewMode::View),
        "select" => Some(PreviewMode::Select),
        "rotate" => Some(PreviewMode::Rotate),
        "delete" => Some(PreviewMode::Delete),
        "reorder" => Some(PreviewMode::Reorder),
        _ => None,
    }
}

fn parse_anchor(name: &str) -> Option<OverlayAnchor> {
    match name {
        "top_left" => Some(OverlayAnchor::TopLeft),
        "top_center" => Some(OverlayAnchor::TopCenter),
        "top_right" => Some(OverlayAnchor::TopRight),
        "center" => Some(OverlayAnchor::Center),
        "bottom_left" => Some(OverlayAnchor::BottomLeft),
        "bottom_center" => Some(OverlayAnchor::BottomCenter),
        "bottom_right" => Some(OverlayAnchor::BottomRight),
        _ => None,
    }
}

/// Source info for JS serialization
#[derive(serde::Serialize)]
struct DocumentInfoJs {
    name: String,
    page_count: u32,
    size_bytes: usize,
}
