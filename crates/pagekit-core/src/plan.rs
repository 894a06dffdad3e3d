//! Transform plans
//!
//! A [`TransformPlan`] is the ordered list of page-level operations a tool
//! compiles from user intent. Ops apply left-to-right against one evolving
//! working array; indices in later ops address the *current* array, not the
//! original source.

use serde::{Deserialize, Serialize};

/// Crop rectangle in page-space points. Edges are absolute coordinates,
/// written to the output page as `[left, bottom, right, top]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

/// Placement of overlay text on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayAnchor {
    TopLeft,
    TopCenter,
    TopRight,
    Center,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

/// Text drawn on a page as an overlay annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayText {
    pub text: String,
    pub font_size: f64,
    /// Hex color like "#333333"
    pub color: String,
    /// 0.0 (transparent) to 1.0 (opaque)
    pub opacity: f64,
}

impl OverlayText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: 12.0,
            color: "#000000".to_string(),
            opacity: 1.0,
        }
    }
}

/// One page-level operation.
///
/// `pages`, `page`, and `order` entries are 1-based positions in the
/// working array as it stands when the op runs. `RotateSet` degrees are
/// additive mod 360; `CropSet` is last-write-wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransformOp {
    KeepSubset {
        pages: Vec<u32>,
    },
    RotateSet {
        pages: Vec<u32>,
        degrees: i32,
    },
    CropSet {
        pages: Vec<u32>,
        rect: CropRect,
    },
    DeleteSet {
        pages: Vec<u32>,
    },
    Reorder {
        order: Vec<u32>,
    },
    Overlay {
        page: u32,
        anchor: OverlayAnchor,
        content: OverlayText,
    },
}

/// Discriminant of a [`TransformOp`], used by tool profiles to gate which
/// operations a tool may add to its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    KeepSubset,
    RotateSet,
    CropSet,
    DeleteSet,
    Reorder,
    Overlay,
}

impl TransformOp {
    pub fn kind(&self) -> OpKind {
        match self {
            TransformOp::KeepSubset { .. } => OpKind::KeepSubset,
            TransformOp::RotateSet { .. } => OpKind::RotateSet,
            TransformOp::CropSet { .. } => OpKind::CropSet,
            TransformOp::DeleteSet { .. } => OpKind::DeleteSet,
            TransformOp::Reorder { .. } => OpKind::Reorder,
            TransformOp::Overlay { .. } => OpKind::Overlay,
        }
    }
}

/// Ordered list of operations, applied atomically by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformPlan {
    ops: Vec<TransformOp>,
}

impl TransformPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: TransformOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[TransformOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl From<Vec<TransformOp>> for TransformPlan {
    fn from(ops: Vec<TransformOp>) -> Self {
        Self { ops }
    }
}

impl FromIterator<TransformOp> for TransformPlan {
    fn from_iter<I: IntoIterator<Item = TransformOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}
