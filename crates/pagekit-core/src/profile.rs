//! Tool profiles
//!
//! Every tool in the suite is the same engine behind a different
//! configuration: which preview mode it opens in, which op kinds it may
//! compile into a plan, and whether it accepts multiple source documents.

use serde::{Deserialize, Serialize};

use crate::plan::OpKind;
use crate::preview::PreviewMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolProfile {
    pub name: String,
    #[serde(skip)]
    pub default_mode: PreviewMode,
    pub enabled_ops: Vec<OpKind>,
    pub multi_source: bool,
}

impl ToolProfile {
    pub fn allows(&self, kind: OpKind) -> bool {
        self.enabled_ops.contains(&kind)
    }

    /// Look up a built-in profile by tool name.
    pub fn named(name: &str) -> Option<ToolProfile> {
        let profile = match name {
            "merge" => ToolProfile {
                name: "merge".to_string(),
                default_mode: PreviewMode::View,
                enabled_ops: vec![OpKind::Reorder],
                multi_source: true,
            },
            "split" => ToolProfile {
                name: "split".to_string(),
                default_mode: PreviewMode::Select,
                enabled_ops: vec![OpKind::KeepSubset],
                multi_source: false,
            },
            "extract" => ToolProfile {
                name: "extract".to_string(),
                default_mode: PreviewMode::Select,
                enabled_ops: vec![OpKind::KeepSubset],
                multi_source: false,
            },
            "organize" => ToolProfile {
                name: "organize".to_string(),
                default_mode: PreviewMode::Reorder,
                enabled_ops: vec![OpKind::Reorder, OpKind::DeleteSet, OpKind::RotateSet],
                multi_source: false,
            },
            "rotate" => ToolProfile {
                name: "rotate".to_string(),
                default_mode: PreviewMode::Rotate,
                enabled_ops: vec![OpKind::RotateSet],
                multi_source: false,
            },
            "delete" => ToolProfile {
                name: "delete".to_string(),
                default_mode: PreviewMode::Delete,
                enabled_ops: vec![OpKind::DeleteSet],
                multi_source: false,
            },
            "crop" => ToolProfile {
                name: "crop".to_string(),
                default_mode: PreviewMode::View,
                enabled_ops: vec![OpKind::CropSet],
                multi_source: false,
            },
            "watermark" => ToolProfile {
                name: "watermark".to_string(),
                default_mode: PreviewMode::View,
                enabled_ops: vec![OpKind::Overlay],
                multi_source: false,
            },
            "page-numbers" => ToolProfile {
                name: "page-numbers".to_string(),
                default_mode: PreviewMode::View,
                enabled_ops: vec![OpKind::Overlay],
                multi_source: false,
            },
            _ => return None,
        };
        Some(profile)
    }

    pub fn builtin_names() -> &'static [&'static str] {
        &[
            "merge",
            "split",
            "extract",
            "organize",
            "rotate",
            "delete",
            "crop",
            "watermark",
            "page-numbers",
        ]
    }
}
