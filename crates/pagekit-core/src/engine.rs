//! Transformation engine
//!
//! Plan application has two phases. [`resolve_plan`] is pure: it builds the
//! identity working array over the concatenated sources and folds each op
//! into it, producing the final page layout with accumulated rotation, crop,
//! and overlays per element. [`materialize`](crate::materialize::materialize)
//! then writes that layout out as a new document.
//!
//! Failure is all-or-nothing: a plan either fully succeeds or produces no
//! output.

use crate::document::DocumentHandle;
use crate::error::TransformError;
use crate::materialize::materialize;
use crate::plan::{CropRect, OverlayAnchor, OverlayText, TransformOp, TransformPlan};
use crate::ranges::dedup_pages;

/// One element of the evolving working array: which source page it refers
/// to and everything the plan has accumulated onto it so far.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingPage {
    /// Index into the sources slice handed to the engine
    pub source: usize,
    /// 1-based page number within that source
    pub page: u32,
    /// Accumulated rotation, normalized to 0..360
    pub rotation: i32,
    /// Last crop written by a CropSet, if any
    pub crop: Option<CropRect>,
    /// Overlay text appended in plan order
    pub overlays: Vec<(OverlayAnchor, OverlayText)>,
}

impl WorkingPage {
    fn identity(source: usize, page: u32) -> Self {
        Self {
            source,
            page,
            rotation: 0,
            crop: None,
            overlays: Vec::new(),
        }
    }
}

/// Resolve a plan against the identity page sequence of the given sources.
///
/// Every op addresses 1-based positions in the working array *as it stands
/// when that op runs*; positions are never re-resolved against the original
/// source, and out-of-range positions fail rather than clamp.
pub fn resolve_plan(
    page_counts: &[u32],
    plan: &TransformPlan,
) -> Result<Vec<WorkingPage>, TransformError> {
    let mut working: Vec<WorkingPage> = Vec::new();
    for (source, &count) in page_counts.iter().enumerate() {
        working.extend((1..=count).map(|page| WorkingPage::identity(source, page)));
    }

    for op in plan.ops() {
        apply_op(&mut working, op)?;
    }

    if working.is_empty() {
        return Err(TransformError::EmptyResult);
    }

    Ok(working)
}

/// Apply a plan to a single source, producing output document bytes.
pub fn apply(source: &DocumentHandle, plan: &TransformPlan) -> Result<Vec<u8>, TransformError> {
    apply_merged(std::slice::from_ref(source), plan)
}

/// Apply a plan to several sources whose pages are pre-concatenated into
/// one index space: source 0's pages first, then source 1's, and so on.
pub fn apply_merged(
    sources: &[DocumentHandle],
    plan: &TransformPlan,
) -> Result<Vec<u8>, TransformError> {
    let page_counts: Vec<u32> = sources.iter().map(|s| s.page_count()).collect();
    let resolved = resolve_plan(&page_counts, plan)?;

    tracing::info!(
        sources = sources.len(),
        ops = plan.len(),
        pages = resolved.len(),
        "applying transform plan"
    );

    materialize(sources, &resolved)
}

/// Run several independent sub-plans against the same source, one output
/// per sub-plan. Pages outside every sub-plan are simply absent from all
/// outputs; the engine checks bounds per sub-plan but does not require the
/// sub-plans to be disjoint or to cover the source.
pub fn apply_multi(
    source: &DocumentHandle,
    sub_plans: &[TransformPlan],
) -> Result<Vec<Vec<u8>>, TransformError> {
    sub_plans.iter().map(|plan| apply(source, plan)).collect()
}

/// Sub-plans that split a source into consecutive chunks of at most
/// `pages_per_chunk` pages: `chunk_plans(10, 4)` keeps `1-4`, `5-8`, `9-10`.
pub fn chunk_plans(page_count: u32, pages_per_chunk: u32) -> Vec<TransformPlan> {
    let step = pages_per_chunk.max(1);
    let mut plans = Vec::new();
    let mut start = 1u32;
    while start <= page_count {
        let end = page_count.min(start + step - 1);
        plans.push(TransformPlan::from(vec![TransformOp::KeepSubset {
            pages: (start..=end).collect(),
        }]));
        start = end + 1;
    }
    plans
}

/// Turn parser range groups into one KeepSubset sub-plan per group.
pub fn range_group_plans(groups: &[Vec<u32>]) -> Vec<TransformPlan> {
    groups
        .iter()
        .map(|group| {
            TransformPlan::from(vec![TransformOp::KeepSubset {
                pages: group.clone(),
            }])
        })
        .collect()
}

/// Plan that stamps the same overlay text centered on every page.
pub fn watermark_plan(page_count: u32, content: OverlayText) -> TransformPlan {
    (1..=page_count)
        .map(|page| TransformOp::Overlay {
            page,
            anchor: OverlayAnchor::Center,
            content: content.clone(),
        })
        .collect()
}

/// Plan that stamps "n / total" on every page at the given anchor.
pub fn page_number_plan(page_count: u32, anchor: OverlayAnchor, font_size: f64) -> TransformPlan {
    (1..=page_count)
        .map(|page| {
            let mut content = OverlayText::new(format!("{} / {}", page, page_count));
            content.font_size = font_size;
            TransformOp::Overlay {
                page,
                anchor,
                content,
            }
        })
        .collect()
}

fn apply_op(working: &mut Vec<WorkingPage>, op: &TransformOp) -> Result<(), TransformError> {
    tracing::debug!(kind = ?op.kind(), len = working.len(), "applying op");

    match op {
        TransformOp::KeepSubset { pages } => {
            let mut kept = Vec::with_capacity(pages.len());
            for &pos in pages {
                let idx = check_position(pos, working.len())?;
                kept.push(working[idx].clone());
            }
            *working = kept;
        }
        TransformOp::RotateSet { pages, degrees } => {
            for pos in dedup_pages(pages) {
                let idx = check_position(pos, working.len())?;
                let element = &mut working[idx];
                element.rotation = (element.rotation + degrees).rem_euclid(360);
            }
        }
        TransformOp::CropSet { pages, rect } => {
            for pos in dedup_pages(pages) {
                let idx = check_position(pos, working.len())?;
                working[idx].crop = Some(*rect);
            }
        }
        TransformOp::DeleteSet { pages } => {
            let mut targets = dedup_pages(pages);
            for &pos in &targets {
                check_position(pos, working.len())?;
            }
            // Remove highest positions first so earlier removals don't
            // shift the ones still to come.
            targets.sort_unstable_by(|a, b| b.cmp(a));
            for pos in targets {
                working.remove(pos as usize - 1);
            }
        }
        TransformOp::Reorder { order } => {
            if order.len() != working.len() {
                return Err(TransformError::PermutationMismatch(format!(
                    "expected {} positions, got {}",
                    working.len(),
                    order.len()
                )));
            }
            let mut seen = vec![false; working.len()];
            for &pos in order {
                let idx = check_position(pos, working.len())?;
                if seen[idx] {
                    return Err(TransformError::PermutationMismatch(format!(
                        "position {} listed twice",
                        pos
                    )));
                }
                seen[idx] = true;
            }
            *working = order
                .iter()
                .map(|&pos| working[pos as usize - 1].clone())
                .collect();
        }
        TransformOp::Overlay {
            page,
            anchor,
            content,
        } => {
            let idx = check_position(*page, working.len())?;
            working[idx].overlays.push((*anchor, content.clone()));
        }
    }

    Ok(())
}

fn check_position(pos: u32, len: usize) -> Result<usize, TransformError> {
    if pos == 0 || pos as usize > len {
        return Err(TransformError::IndexOutOfRange {
            index: pos,
            len: len as u32,
        });
    }
    Ok(pos as usize - 1)
}
