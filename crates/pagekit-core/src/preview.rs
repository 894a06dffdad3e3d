//! Preview state machine
//!
//! [`PreviewState`] tracks one document's thumbnail grid: per-page render
//! phases, an epoch token that invalidates in-flight renders when the
//! document is replaced, and a mode-scoped interaction overlay (selection,
//! rotation, delete marks, pending order) that [`PreviewState::commit`]
//! compiles into [`TransformOp`]s.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{PreviewError, RenderError};
use crate::plan::{TransformOp, TransformPlan};

/// Interaction mode of the preview grid.
///
/// Each mode owns one overlay; switching modes resets the overlay of the
/// mode being left. `View` has no overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewMode {
    #[default]
    View,
    Select,
    Rotate,
    Delete,
    Reorder,
}

impl fmt::Display for PreviewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PreviewMode::View => "view",
            PreviewMode::Select => "select",
            PreviewMode::Rotate => "rotate",
            PreviewMode::Delete => "delete",
            PreviewMode::Reorder => "reorder",
        };
        f.write_str(name)
    }
}

/// Document-level lifecycle. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocPhase {
    #[default]
    Pending,
    Loading,
    Ready,
    Error,
}

/// Render phase of a single page slot.
///
/// `Pending -> Loaded` and `Pending -> Error` are the only transitions a
/// render completion may make; `Error -> Pending` happens only through an
/// explicit [`PreviewState::retry_page`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagePhase {
    Pending,
    Loaded,
    Error(RenderError),
}

pub struct PreviewState {
    document_id: u64,
    page_count: u32,
    epoch: u64,
    phase: DocPhase,
    pages: Vec<PagePhase>,
    mode: PreviewMode,
    selection: BTreeSet<u32>,
    rotation_overlay: BTreeMap<u32, i32>,
    delete_marks: BTreeSet<u32>,
    pending_order: Vec<u32>,
}

impl PreviewState {
    pub fn new(document_id: u64, page_count: u32) -> Self {
        Self {
            document_id,
            page_count,
            epoch: 0,
            phase: DocPhase::Pending,
            pages: vec![PagePhase::Pending; page_count as usize],
            mode: PreviewMode::View,
            selection: BTreeSet::new(),
            rotation_overlay: BTreeMap::new(),
            delete_marks: BTreeSet::new(),
            pending_order: Vec::new(),
        }
    }

    /// Point the preview at a different document.
    ///
    /// Bumps the epoch so completions from renders started against the old
    /// document are discarded, and resets every page phase and overlay.
    pub fn attach(&mut self, document_id: u64, page_count: u32) {
        self.document_id = document_id;
        self.page_count = page_count;
        self.epoch += 1;
        self.phase = DocPhase::Pending;
        self.pages = vec![PagePhase::Pending; page_count as usize];
        self.mode = PreviewMode::View;
        self.selection.clear();
        self.rotation_overlay.clear();
        self.delete_marks.clear();
        self.pending_order.clear();
        tracing::debug!(document_id, page_count, epoch = self.epoch, "preview attached");
    }

    pub fn document_id(&self) -> u64 {
        self.document_id
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Current epoch. Render requests must carry this value back in their
    /// completion so stale results can be told apart from live ones.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase(&self) -> DocPhase {
        self.phase
    }

    pub fn mode(&self) -> PreviewMode {
        self.mode
    }

    pub fn page_phase(&self, page: u32) -> Option<&PagePhase> {
        self.pages.get(page.checked_sub(1)? as usize)
    }

    pub fn loaded_count(&self) -> u32 {
        self.pages
            .iter()
            .filter(|p| matches!(p, PagePhase::Loaded))
            .count() as u32
    }

    pub fn begin_loading(&mut self) {
        if self.phase == DocPhase::Pending {
            self.phase = DocPhase::Loading;
        }
    }

    pub fn mark_ready(&mut self) {
        if self.phase == DocPhase::Loading {
            self.phase = DocPhase::Ready;
        }
    }

    pub fn mark_failed(&mut self) {
        if matches!(self.phase, DocPhase::Pending | DocPhase::Loading) {
            self.phase = DocPhase::Error;
        }
    }

    /// Record a successful render completion.
    ///
    /// Returns false and changes nothing when the epoch is stale, the page
    /// is out of range, or the slot already left `Pending`.
    pub fn page_loaded(&mut self, epoch: u64, page: u32) -> bool {
        self.complete_page(epoch, page, PagePhase::Loaded)
    }

    /// Record a failed render completion. Same staleness rules as
    /// [`PreviewState::page_loaded`].
    pub fn page_failed(&mut self, epoch: u64, page: u32, error: RenderError) -> bool {
        self.complete_page(epoch, page, PagePhase::Error(error))
    }

    fn complete_page(&mut self, epoch: u64, page: u32, phase: PagePhase) -> bool {
        if epoch != self.epoch {
            tracing::debug!(epoch, current = self.epoch, page, "discarded stale render");
            return false;
        }
        let Some(slot) = page
            .checked_sub(1)
            .and_then(|i| self.pages.get_mut(i as usize))
        else {
            return false;
        };
        if *slot != PagePhase::Pending {
            return false;
        }
        *slot = phase;
        true
    }

    /// Reset a failed page back to `Pending` so it can be re-requested.
    /// Only `Error` slots are eligible.
    pub fn retry_page(&mut self, page: u32) -> bool {
        let Some(slot) = page
            .checked_sub(1)
            .and_then(|i| self.pages.get_mut(i as usize))
        else {
            return false;
        };
        if !matches!(slot, PagePhase::Error(_)) {
            return false;
        }
        *slot = PagePhase::Pending;
        true
    }

    /// Switch interaction mode, resetting the overlay of the mode being
    /// left. Entering `Reorder` seeds the pending order with the identity
    /// permutation.
    pub fn set_mode(&mut self, mode: PreviewMode) {
        if mode == self.mode {
            return;
        }
        match self.mode {
            PreviewMode::View => {}
            PreviewMode::Select => self.selection.clear(),
            PreviewMode::Rotate => self.rotation_overlay.clear(),
            PreviewMode::Delete => self.delete_marks.clear(),
            PreviewMode::Reorder => self.pending_order.clear(),
        }
        self.mode = mode;
        if mode == PreviewMode::Reorder {
            self.pending_order = (1..=self.page_count).collect();
        }
    }

    /// Toggle a page's membership in the selection. Returns the new state.
    pub fn select_page(&mut self, page: u32) -> Result<bool, PreviewError> {
        self.require_mode(PreviewMode::Select)?;
        self.check_page(page)?;
        if self.selection.remove(&page) {
            Ok(false)
        } else {
            self.selection.insert(page);
            Ok(true)
        }
    }

    pub fn select_all(&mut self) -> Result<(), PreviewError> {
        self.require_mode(PreviewMode::Select)?;
        self.selection = (1..=self.page_count).collect();
        Ok(())
    }

    pub fn deselect_all(&mut self) -> Result<(), PreviewError> {
        self.require_mode(PreviewMode::Select)?;
        self.selection.clear();
        Ok(())
    }

    pub fn selection(&self) -> &BTreeSet<u32> {
        &self.selection
    }

    /// Add a rotation delta to a page. Deltas accumulate mod 360; the
    /// return value is the page's new net angle.
    pub fn set_rotation(&mut self, page: u32, delta: i32) -> Result<i32, PreviewError> {
        self.require_mode(PreviewMode::Rotate)?;
        self.check_page(page)?;
        let entry = self.rotation_overlay.entry(page).or_insert(0);
        *entry = (*entry + delta).rem_euclid(360);
        let angle = *entry;
        if angle == 0 {
            self.rotation_overlay.remove(&page);
        }
        Ok(angle)
    }

    pub fn rotation(&self, page: u32) -> i32 {
        self.rotation_overlay.get(&page).copied().unwrap_or(0)
    }

    /// Toggle a page's delete mark. Returns the new state.
    pub fn mark_delete(&mut self, page: u32) -> Result<bool, PreviewError> {
        self.require_mode(PreviewMode::Delete)?;
        self.check_page(page)?;
        if self.delete_marks.remove(&page) {
            Ok(false)
        } else {
            self.delete_marks.insert(page);
            Ok(true)
        }
    }

    pub fn delete_marks(&self) -> &BTreeSet<u32> {
        &self.delete_marks
    }

    /// Move the entry at `from` to `to` in the pending order. Positions
    /// are 1-based into the order as it currently stands; the result is a
    /// permutation whenever the input was.
    pub fn move_to(&mut self, from: u32, to: u32) -> Result<(), PreviewError> {
        self.require_mode(PreviewMode::Reorder)?;
        let len = self.pending_order.len() as u32;
        for pos in [from, to] {
            if pos == 0 || pos > len {
                return Err(PreviewError::OutOfRange {
                    page: pos,
                    page_count: len,
                });
            }
        }
        let value = self.pending_order.remove(from as usize - 1);
        self.pending_order.insert(to as usize - 1, value);
        Ok(())
    }

    /// Replace the pending order wholesale. The new order must be a
    /// permutation of `1..=page_count`.
    pub fn set_order(&mut self, order: &[u32]) -> Result<(), PreviewError> {
        self.require_mode(PreviewMode::Reorder)?;
        if order.len() != self.page_count as usize {
            return Err(PreviewError::InvalidOrder(format!(
                "expected {} entries, got {}",
                self.page_count,
                order.len()
            )));
        }
        let mut seen = vec![false; self.page_count as usize];
        for &page in order {
            if page == 0 || page > self.page_count {
                return Err(PreviewError::OutOfRange {
                    page,
                    page_count: self.page_count,
                });
            }
            if seen[page as usize - 1] {
                return Err(PreviewError::InvalidOrder(format!(
                    "page {} appears more than once",
                    page
                )));
            }
            seen[page as usize - 1] = true;
        }
        self.pending_order = order.to_vec();
        Ok(())
    }

    pub fn pending_order(&self) -> &[u32] {
        &self.pending_order
    }

    /// Compile the current mode's overlay into ops appended to `plan`.
    ///
    /// The overlay itself is left untouched, so the grid keeps showing
    /// what was committed. Empty overlays (and an identity pending order)
    /// produce no ops. Returns the number of ops appended.
    pub fn commit(&self, plan: &mut TransformPlan) -> usize {
        let before = plan.len();
        match self.mode {
            PreviewMode::View => {}
            PreviewMode::Select => {
                if !self.selection.is_empty() {
                    plan.push(TransformOp::KeepSubset {
                        pages: self.selection.iter().copied().collect(),
                    });
                }
            }
            PreviewMode::Rotate => {
                let mut by_angle: BTreeMap<i32, Vec<u32>> = BTreeMap::new();
                for (&page, &angle) in &self.rotation_overlay {
                    if angle != 0 {
                        by_angle.entry(angle).or_default().push(page);
                    }
                }
                for (degrees, pages) in by_angle {
                    plan.push(TransformOp::RotateSet { pages, degrees });
                }
            }
            PreviewMode::Delete => {
                if !self.delete_marks.is_empty() {
                    plan.push(TransformOp::DeleteSet {
                        pages: self.delete_marks.iter().copied().collect(),
                    });
                }
            }
            PreviewMode::Reorder => {
                let identity: Vec<u32> = (1..=self.page_count).collect();
                if !self.pending_order.is_empty() && self.pending_order != identity {
                    plan.push(TransformOp::Reorder {
                        order: self.pending_order.clone(),
                    });
                }
            }
        }
        let appended = plan.len() - before;
        if appended > 0 {
            tracing::debug!(mode = %self.mode, appended, "committed preview overlay");
        }
        appended
    }

    fn require_mode(&self, mode: PreviewMode) -> Result<(), PreviewError> {
        if self.mode == mode {
            Ok(())
        } else {
            Err(PreviewError::WrongMode { mode: self.mode })
        }
    }

    fn check_page(&self, page: u32) -> Result<(), PreviewError> {
        if page == 0 || page > self.page_count {
            return Err(PreviewError::OutOfRange {
                page,
                page_count: self.page_count,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pages_start_pending() {
        let state = PreviewState::new(1, 3);
        assert_eq!(state.phase(), DocPhase::Pending);
        for page in 1..=3 {
            assert_eq!(state.page_phase(page), Some(&PagePhase::Pending));
        }
        assert_eq!(state.page_phase(4), None);
    }

    #[test]
    fn test_out_of_order_completions_all_land() {
        let mut state = PreviewState::new(1, 3);
        let epoch = state.epoch();
        assert!(state.page_loaded(epoch, 3));
        assert!(state.page_loaded(epoch, 1));
        assert!(state.page_loaded(epoch, 2));
        assert_eq!(state.loaded_count(), 3);
    }

    #[test]
    fn test_completion_is_idempotent_per_slot() {
        let mut state = PreviewState::new(1, 2);
        let epoch = state.epoch();
        assert!(state.page_loaded(epoch, 1));
        assert!(!state.page_loaded(epoch, 1));
        assert!(!state.page_failed(epoch, 1, RenderError::Timeout));
        assert_eq!(state.page_phase(1), Some(&PagePhase::Loaded));
    }

    #[test]
    fn test_stale_epoch_discarded_after_attach() {
        let mut state = PreviewState::new(1, 3);
        let old_epoch = state.epoch();
        state.attach(2, 5);
        assert!(!state.page_loaded(old_epoch, 1));
        assert_eq!(state.page_phase(1), Some(&PagePhase::Pending));
        assert!(state.page_loaded(state.epoch(), 1));
    }

    #[test]
    fn test_attach_resets_overlay_and_pages() {
        let mut state = PreviewState::new(1, 4);
        let epoch = state.epoch();
        state.page_loaded(epoch, 1);
        state.set_mode(PreviewMode::Select);
        state.select_page(2).unwrap();
        state.attach(2, 2);
        assert_eq!(state.page_count(), 2);
        assert_eq!(state.mode(), PreviewMode::View);
        assert!(state.selection().is_empty());
        assert_eq!(state.loaded_count(), 0);
    }

    #[test]
    fn test_failed_page_needs_explicit_retry() {
        let mut state = PreviewState::new(1, 2);
        let epoch = state.epoch();
        assert!(state.page_failed(epoch, 1, RenderError::Timeout));
        assert!(!state.page_loaded(epoch, 1));
        assert!(state.retry_page(1));
        assert_eq!(state.page_phase(1), Some(&PagePhase::Pending));
        assert!(state.page_loaded(epoch, 1));
    }

    #[test]
    fn test_retry_only_applies_to_failed_pages() {
        let mut state = PreviewState::new(1, 2);
        let epoch = state.epoch();
        assert!(!state.retry_page(1));
        state.page_loaded(epoch, 1);
        assert!(!state.retry_page(1));
        assert!(!state.retry_page(9));
    }

    #[test]
    fn test_doc_phase_moves_forward_only() {
        let mut state = PreviewState::new(1, 1);
        state.begin_loading();
        assert_eq!(state.phase(), DocPhase::Loading);
        state.mark_ready();
        assert_eq!(state.phase(), DocPhase::Ready);
        state.mark_failed();
        assert_eq!(state.phase(), DocPhase::Ready);
    }

    #[test]
    fn test_select_toggles() {
        let mut state = PreviewState::new(1, 5);
        state.set_mode(PreviewMode::Select);
        assert_eq!(state.select_page(3), Ok(true));
        assert_eq!(state.select_page(3), Ok(false));
        assert!(state.selection().is_empty());
    }

    #[test]
    fn test_select_requires_select_mode() {
        let mut state = PreviewState::new(1, 5);
        assert_eq!(
            state.select_page(1),
            Err(PreviewError::WrongMode {
                mode: PreviewMode::View
            })
        );
        state.set_mode(PreviewMode::Rotate);
        assert!(matches!(
            state.select_all(),
            Err(PreviewError::WrongMode { .. })
        ));
    }

    #[test]
    fn test_select_rejects_out_of_range() {
        let mut state = PreviewState::new(1, 5);
        state.set_mode(PreviewMode::Select);
        assert_eq!(
            state.select_page(6),
            Err(PreviewError::OutOfRange {
                page: 6,
                page_count: 5
            })
        );
        assert_eq!(
            state.select_page(0),
            Err(PreviewError::OutOfRange {
                page: 0,
                page_count: 5
            })
        );
    }

    #[test]
    fn test_select_all_then_deselect_all() {
        let mut state = PreviewState::new(1, 3);
        state.set_mode(PreviewMode::Select);
        state.select_all().unwrap();
        assert_eq!(state.selection().len(), 3);
        state.deselect_all().unwrap();
        assert!(state.selection().is_empty());
    }

    #[test]
    fn test_mode_switch_resets_left_overlay() {
        let mut state = PreviewState::new(1, 4);
        state.set_mode(PreviewMode::Select);
        state.select_page(1).unwrap();
        state.select_page(2).unwrap();
        state.set_mode(PreviewMode::Rotate);
        state.set_mode(PreviewMode::Select);
        assert!(state.selection().is_empty());
    }

    #[test]
    fn test_rotation_accumulates_mod_360() {
        let mut state = PreviewState::new(1, 2);
        state.set_mode(PreviewMode::Rotate);
        assert_eq!(state.set_rotation(1, 90), Ok(90));
        assert_eq!(state.set_rotation(1, 90), Ok(180));
        assert_eq!(state.set_rotation(1, -270), Ok(270));
        assert_eq!(state.set_rotation(1, 90), Ok(0));
        assert_eq!(state.rotation(1), 0);
    }

    #[test]
    fn test_delete_marks_toggle() {
        let mut state = PreviewState::new(1, 4);
        state.set_mode(PreviewMode::Delete);
        assert_eq!(state.mark_delete(2), Ok(true));
        assert_eq!(state.mark_delete(4), Ok(true));
        assert_eq!(state.mark_delete(2), Ok(false));
        assert_eq!(state.delete_marks().iter().copied().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_reorder_mode_seeds_identity() {
        let mut state = PreviewState::new(1, 4);
        state.set_mode(PreviewMode::Reorder);
        assert_eq!(state.pending_order(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_move_to_front() {
        let mut state = PreviewState::new(1, 4);
        state.set_mode(PreviewMode::Reorder);
        state.move_to(3, 1).unwrap();
        assert_eq!(state.pending_order(), &[3, 1, 2, 4]);
    }

    #[test]
    fn test_move_to_back() {
        let mut state = PreviewState::new(1, 4);
        state.set_mode(PreviewMode::Reorder);
        state.move_to(1, 4).unwrap();
        assert_eq!(state.pending_order(), &[2, 3, 4, 1]);
    }

    #[test]
    fn test_move_to_rejects_out_of_range_positions() {
        let mut state = PreviewState::new(1, 3);
        state.set_mode(PreviewMode::Reorder);
        assert!(matches!(
            state.move_to(0, 2),
            Err(PreviewError::OutOfRange { .. })
        ));
        assert!(matches!(
            state.move_to(1, 4),
            Err(PreviewError::OutOfRange { .. })
        ));
        assert_eq!(state.pending_order(), &[1, 2, 3]);
    }

    #[test]
    fn test_set_order_validates_permutation() {
        let mut state = PreviewState::new(1, 3);
        state.set_mode(PreviewMode::Reorder);
        state.set_order(&[3, 1, 2]).unwrap();
        assert_eq!(state.pending_order(), &[3, 1, 2]);

        assert!(matches!(
            state.set_order(&[1, 2]),
            Err(PreviewError::InvalidOrder(_))
        ));
        assert!(matches!(
            state.set_order(&[1, 1, 2]),
            Err(PreviewError::InvalidOrder(_))
        ));
        assert!(matches!(
            state.set_order(&[1, 2, 4]),
            Err(PreviewError::OutOfRange { page: 4, .. })
        ));
        assert_eq!(state.pending_order(), &[3, 1, 2]);
    }

    #[test]
    fn test_commit_selection_as_keep_subset() {
        let mut state = PreviewState::new(1, 5);
        state.set_mode(PreviewMode::Select);
        state.select_page(4).unwrap();
        state.select_page(1).unwrap();
        let mut plan = TransformPlan::new();
        assert_eq!(state.commit(&mut plan), 1);
        assert_eq!(
            plan.ops(),
            &[TransformOp::KeepSubset { pages: vec![1, 4] }]
        );
        // overlay survives the commit
        assert_eq!(state.selection().len(), 2);
    }

    #[test]
    fn test_commit_rotations_grouped_by_angle() {
        let mut state = PreviewState::new(1, 5);
        state.set_mode(PreviewMode::Rotate);
        state.set_rotation(1, 90).unwrap();
        state.set_rotation(4, 90).unwrap();
        state.set_rotation(2, 180).unwrap();
        let mut plan = TransformPlan::new();
        assert_eq!(state.commit(&mut plan), 2);
        assert_eq!(
            plan.ops(),
            &[
                TransformOp::RotateSet {
                    pages: vec![1, 4],
                    degrees: 90
                },
                TransformOp::RotateSet {
                    pages: vec![2],
                    degrees: 180
                },
            ]
        );
    }

    #[test]
    fn test_commit_delete_marks() {
        let mut state = PreviewState::new(1, 6);
        state.set_mode(PreviewMode::Delete);
        state.mark_delete(5).unwrap();
        state.mark_delete(2).unwrap();
        let mut plan = TransformPlan::new();
        assert_eq!(state.commit(&mut plan), 1);
        assert_eq!(plan.ops(), &[TransformOp::DeleteSet { pages: vec![2, 5] }]);
    }

    #[test]
    fn test_commit_reorder_skips_identity() {
        let mut state = PreviewState::new(1, 3);
        state.set_mode(PreviewMode::Reorder);
        let mut plan = TransformPlan::new();
        assert_eq!(state.commit(&mut plan), 0);

        state.set_order(&[2, 3, 1]).unwrap();
        assert_eq!(state.commit(&mut plan), 1);
        assert_eq!(
            plan.ops(),
            &[TransformOp::Reorder {
                order: vec![2, 3, 1]
            }]
        );
    }

    #[test]
    fn test_commit_empty_overlay_appends_nothing() {
        let mut state = PreviewState::new(1, 3);
        let mut plan = TransformPlan::new();
        assert_eq!(state.commit(&mut plan), 0);
        state.set_mode(PreviewMode::Select);
        assert_eq!(state.commit(&mut plan), 0);
        assert!(plan.is_empty());
    }
}
