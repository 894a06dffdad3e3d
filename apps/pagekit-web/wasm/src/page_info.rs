//! Per-page summaries for the thumbnail grid
//!
//! Extracts the geometry the grid needs to size and orient each thumbnail
//! before the rendered image arrives.

use lopdf::{Dictionary, Document, Object};
use serde::Serialize;

/// Geometry summary of a single page
#[derive(Debug, Clone, Serialize)]
pub struct PageSummary {
    /// Page number (1-indexed)
    pub page_num: u32,
    /// Page width in points (1 point = 1/72 inch)
    pub width: f32,
    /// Page height in points
    pub height: f32,
    /// Baked-in rotation in degrees (0, 90, 180, 270)
    pub rotation: i32,
    /// Whether the page has a content stream (not blank)
    pub has_content: bool,
    /// Orientation after applying the baked-in rotation
    pub orientation: PageOrientation,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub enum PageOrientation {
    Portrait,
    Landscape,
    Square,
}

impl PageSummary {
    pub fn from_document(doc: &Document, page_num: u32) -> Result<Self, String> {
        let pages = doc.get_pages();
        let page_id = pages
            .get(&page_num)
            .ok_or_else(|| format!("Page {} not found", page_num))?;

        let page_dict = doc
            .objects
            .get(page_id)
            .and_then(|o| o.as_dict().ok())
            .ok_or_else(|| format!("Page {} is not a dictionary", page_num))?;

        let media_box = media_box(doc, page_dict);
        let (width, height) = (media_box[2] - media_box[0], media_box[3] - media_box[1]);

        let rotation = rotation(doc, page_dict);
        let has_content = page_dict.get(b"Contents").is_ok();

        // A quarter turn swaps the axes the viewer sees
        let (effective_width, effective_height) = if rotation == 90 || rotation == 270 {
            (height, width)
        } else {
            (width, height)
        };

        let orientation = if (effective_width - effective_height).abs() < 1.0 {
            PageOrientation::Square
        } else if effective_width > effective_height {
            PageOrientation::Landscape
        } else {
            PageOrientation::Portrait
        };

        Ok(Self {
            page_num,
            width: width as f32,
            height: height as f32,
            rotation,
            has_content,
            orientation,
        })
    }

    pub fn all_from_document(doc: &Document) -> Vec<Result<Self, String>> {
        let page_count = doc.get_pages().len() as u32;
        (1..=page_count)
            .map(|page_num| Self::from_document(doc, page_num))
            .collect()
    }
}

/// MediaBox of the page, walking up the Parent chain when inherited.
/// Falls back to US Letter.
fn media_box(doc: &Document, page_dict: &Dictionary) -> [f64; 4] {
    let mut dict = Some(page_dict);
    for _ in 0..32 {
        let Some(current) = dict else { break };
        if let Some(array) = current.get(b"MediaBox").ok().and_then(|o| o.as_array().ok()) {
            if let Some(parsed) = parse_box_array(array) {
                return parsed;
            }
        }
        dict = current
            .get(b"Parent")
            .ok()
            .and_then(|o| o.as_reference().ok())
            .and_then(|id| doc.objects.get(&id))
            .and_then(|o| o.as_dict().ok());
    }
    [0.0, 0.0, 612.0, 792.0]
}

fn parse_box_array(array: &[Object]) -> Option<[f64; 4]> {
    if array.len() != 4 {
        return None;
    }
    let mut result = [0.0; 4];
    for (i, obj) in array.iter().enumerate() {
        result[i] = match obj {
            Object::Integer(n) => *n as f64,
            Object::Real(n) => *n as f64,
            _ => return None,
        };
    }
    Some(result)
}

/// Rotate entry of the page, walking up the Parent chain when inherited
fn rotation(doc: &Document, page_dict: &Dictionary) -> i32 {
    let mut dict = Some(page_dict);
    for _ in 0..32 {
        let Some(current) = dict else { break };
        if let Some(angle) = current.get(b"Rotate").ok().and_then(|o| o.as_i64().ok()) {
            return normalize_rotation(angle as i32);
        }
        dict = current
            .get(b"Parent")
            .ok()
            .and_then(|o| o.as_reference().ok())
            .and_then(|id| doc.objects.get(&id))
            .and_then(|o| o.as_dict().ok());
    }
    0
}

fn normalize_rotation(angle: i32) -> i32 {
    angle.rem_euclid(360)
}
