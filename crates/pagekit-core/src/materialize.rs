//! Output materialization
//!
//! Writes a resolved working array out as a new document. Each contributing
//! source's object graph is imported once with offset-remapped object IDs,
//! then every working element gets its own cloned page object, so a page
//! kept twice stays independently rotatable and croppable. Inheritable page
//! attributes are pulled down onto each clone before it is reparented under
//! the rebuilt page tree, and unreachable leftovers are pruned before save.

use crate::document::DocumentHandle;
use crate::engine::WorkingPage;
use crate::error::TransformError;
use crate::plan::{OverlayAnchor, OverlayText};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};
use std::collections::BTreeMap;

const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Page margin used when positioning overlay text, in points
const OVERLAY_MARGIN: f64 = 36.0;

pub fn materialize(
    sources: &[DocumentHandle],
    resolved: &[WorkingPage],
) -> Result<Vec<u8>, TransformError> {
    if resolved.is_empty() {
        return Err(TransformError::EmptyResult);
    }

    let mut dest = Document::with_version("1.7");
    let pages_root_id = dest.new_object_id();

    // Import each contributing source's object graph once
    let mut page_maps: BTreeMap<usize, BTreeMap<u32, ObjectId>> = BTreeMap::new();
    for element in resolved {
        if page_maps.contains_key(&element.source) {
            continue;
        }
        let source = sources.get(element.source).ok_or_else(|| {
            TransformError::Materialize(format!("unknown source index {}", element.source))
        })?;
        let map = import_source(&mut dest, source.document());
        page_maps.insert(element.source, map);
    }

    let mut new_page_ids = Vec::with_capacity(resolved.len());
    for element in resolved {
        let imported_id = *page_maps[&element.source].get(&element.page).ok_or_else(|| {
            TransformError::Materialize(format!(
                "source {} has no page {}",
                element.source, element.page
            ))
        })?;

        let mut dict = dest
            .get_dictionary(imported_id)
            .map_err(|e| TransformError::Materialize(e.to_string()))?
            .clone();

        // Pull inheritable attributes down onto the page before it loses
        // its original parent chain.
        for key in INHERITABLE_KEYS {
            if dict.get(key).is_err() {
                if let Some(value) = inherited_attribute(&dest, imported_id, key) {
                    dict.set(key, value);
                }
            }
        }

        let base_rotation = dict.get(b"Rotate").and_then(Object::as_i64).unwrap_or(0);
        let total_rotation = (base_rotation + element.rotation as i64).rem_euclid(360);
        dict.remove(b"Rotate");
        if total_rotation != 0 {
            dict.set("Rotate", Object::Integer(total_rotation));
        }

        if let Some(rect) = element.crop {
            dict.set(
                "CropBox",
                Object::Array(vec![
                    Object::Real(rect.left as f32),
                    Object::Real(rect.bottom as f32),
                    Object::Real(rect.right as f32),
                    Object::Real(rect.top as f32),
                ]),
            );
        }

        dict.set("Parent", Object::Reference(pages_root_id));

        let new_page_id = dest.add_object(Object::Dictionary(dict));
        for (anchor, content) in &element.overlays {
            add_overlay_annotation(&mut dest, new_page_id, *anchor, content)?;
        }
        new_page_ids.push(new_page_id);
    }

    let kids: Vec<Object> = new_page_ids
        .iter()
        .map(|&id| Object::Reference(id))
        .collect();
    dest.objects.insert(
        pages_root_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => new_page_ids.len() as i64,
            "Kids" => kids,
        }),
    );

    let catalog_id = dest.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_root_id),
    });
    dest.trailer.set("Root", Object::Reference(catalog_id));

    dest.prune_objects();
    dest.compress();

    let mut buffer = Vec::new();
    dest.save_to(&mut buffer)
        .map_err(|e| TransformError::Materialize(e.to_string()))?;

    tracing::debug!(
        pages = new_page_ids.len(),
        size = buffer.len(),
        "materialized output document"
    );

    Ok(buffer)
}

/// Copy a source's objects into `dest` with shifted IDs. Returns the
/// source's page number → remapped page object ID map.
fn import_source(dest: &mut Document, source: &Document) -> BTreeMap<u32, ObjectId> {
    let offset = dest.max_id;

    for (old_id, object) in source.objects.iter() {
        let new_id = (old_id.0 + offset, old_id.1);
        dest.objects.insert(new_id, shift_refs(object.clone(), offset));
    }
    dest.max_id = source.max_id + offset;

    source
        .get_pages()
        .into_iter()
        .map(|(page_num, id)| (page_num, (id.0 + offset, id.1)))
        .collect()
}

/// Recursively shift every object reference by `offset`
fn shift_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(items) => {
            Object::Array(items.into_iter().map(|o| shift_refs(o, offset)).collect())
        }
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = shift_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = shift_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Walk the Parent chain looking for an inheritable page attribute.
/// Depth-capped so a cyclic Parent chain cannot loop forever.
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    for _ in 0..32 {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

fn add_overlay_annotation(
    doc: &mut Document,
    page_id: ObjectId,
    anchor: OverlayAnchor,
    content: &OverlayText,
) -> Result<(), TransformError> {
    let media = page_media_box(doc, page_id);
    let (x1, y1, x2, y2) = anchor_rect(media, anchor, content);
    let (r, g, b) = parse_hex_color(&content.color);

    let mut annot = Dictionary::new();
    annot.set("Type", Object::Name(b"Annot".to_vec()));
    annot.set("Subtype", Object::Name(b"FreeText".to_vec()));
    annot.set(
        "Rect",
        Object::Array(vec![
            Object::Real(x1 as f32),
            Object::Real(y1 as f32),
            Object::Real(x2 as f32),
            Object::Real(y2 as f32),
        ]),
    );
    annot.set(
        "Contents",
        Object::String(content.text.as_bytes().to_vec(), StringFormat::Literal),
    );

    let da = format!("/Helv {} Tf {} {} {} rg", content.font_size, r, g, b);
    annot.set("DA", Object::String(da.into_bytes(), StringFormat::Literal));

    if content.opacity < 1.0 {
        annot.set("CA", Object::Real(content.opacity as f32));
    }

    let annot_id = doc.add_object(Object::Dictionary(annot));
    attach_annotation(doc, page_id, annot_id)
}

fn attach_annotation(
    doc: &mut Document,
    page_id: ObjectId,
    annot_id: ObjectId,
) -> Result<(), TransformError> {
    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| TransformError::Materialize(e.to_string()))?;

    if let Object::Dictionary(ref mut page_dict) = page {
        if let Ok(Object::Array(ref mut annots)) = page_dict.get_mut(b"Annots") {
            annots.push(Object::Reference(annot_id));
        } else {
            page_dict.set("Annots", Object::Array(vec![Object::Reference(annot_id)]));
        }
    }
    Ok(())
}

/// Effective media box of a page, defaulting to US Letter
fn page_media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let fallback = [0.0, 0.0, 612.0, 792.0];

    let Ok(dict) = doc.get_dictionary(page_id) else {
        return fallback;
    };
    let Ok(Object::Array(array)) = dict.get(b"MediaBox") else {
        return fallback;
    };
    if array.len() != 4 {
        return fallback;
    }

    let mut edges = fallback;
    for (i, value) in array.iter().enumerate() {
        edges[i] = match value {
            Object::Integer(v) => *v as f64,
            Object::Real(v) => *v as f64,
            _ => return fallback,
        };
    }
    edges
}

/// Compute the annotation rectangle for overlay text at an anchor.
/// Text extent is estimated from the glyph count; exact metrics belong to
/// the viewer rendering the appearance string.
fn anchor_rect(media: [f64; 4], anchor: OverlayAnchor, content: &OverlayText) -> (f64, f64, f64, f64) {
    let [mx1, my1, mx2, my2] = media;
    let width = content.font_size * 0.5 * content.text.chars().count().max(1) as f64;
    let height = content.font_size * 1.4;

    let x = match anchor {
        OverlayAnchor::TopLeft | OverlayAnchor::BottomLeft => mx1 + OVERLAY_MARGIN,
        OverlayAnchor::TopCenter | OverlayAnchor::Center | OverlayAnchor::BottomCenter => {
            (mx1 + mx2) / 2.0 - width / 2.0
        }
        OverlayAnchor::TopRight | OverlayAnchor::BottomRight => mx2 - OVERLAY_MARGIN - width,
    };
    let y = match anchor {
        OverlayAnchor::BottomLeft | OverlayAnchor::BottomCenter | OverlayAnchor::BottomRight => {
            my1 + OVERLAY_MARGIN
        }
        OverlayAnchor::Center => (my1 + my2) / 2.0 - height / 2.0,
        OverlayAnchor::TopLeft | OverlayAnchor::TopCenter | OverlayAnchor::TopRight => {
            my2 - OVERLAY_MARGIN - height
        }
    };

    (x, y, x + width, y + height)
}

/// Parse a hex color like "#FF0000" into RGB floats in 0-1 range
fn parse_hex_color(color: &str) -> (f32, f32, f32) {
    let hex = color.trim_start_matches('#');
    if hex.len() >= 6 {
        let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0) as f32 / 255.0;
        let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0) as f32 / 255.0;
        let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0) as f32 / 255.0;
        (r, g, b)
    } else {
        (0.0, 0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{apply, resolve_plan};
    use crate::plan::{CropRect, TransformOp, TransformPlan};
    use pretty_assertions::assert_eq;

    /// Build a test PDF; `rotate` sets /Rotate on every page dictionary.
    fn create_test_pdf(num_pages: u32, rotate: Option<i64>) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for i in 0..num_pages {
            let content = format!("BT /F1 12 Tf 50 700 Td (Page {}) Tj ET", i + 1);
            let content_id = doc.add_object(Object::Stream(lopdf::Stream::new(
                Dictionary::new(),
                content.into_bytes(),
            )));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => Object::Reference(content_id),
            };
            if let Some(degrees) = rotate {
                page.set("Rotate", Object::Integer(degrees));
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => num_pages as i64,
                "Kids" => kids,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    /// Variant with MediaBox only on the Pages node, to exercise
    /// attribute inheritance.
    fn create_inheriting_pdf(num_pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for i in 0..num_pages {
            let content = format!("BT /F1 12 Tf 50 700 Td (Page {}) Tj ET", i + 1);
            let content_id = doc.add_object(Object::Stream(lopdf::Stream::new(
                Dictionary::new(),
                content.into_bytes(),
            )));
            let page = dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "Contents" => Object::Reference(content_id),
            };
            kids.push(Object::Reference(doc.add_object(page)));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => num_pages as i64,
                "Kids" => kids,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn load_handle(bytes: Vec<u8>) -> DocumentHandle {
        DocumentHandle::load(1, "test.pdf", bytes).unwrap()
    }

    fn output_page_dicts(bytes: &[u8]) -> Vec<Dictionary> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .into_values()
            .map(|id| doc.get_dictionary(id).unwrap().clone())
            .collect()
    }

    fn rotate_value(dict: &Dictionary) -> i64 {
        dict.get(b"Rotate").and_then(Object::as_i64).unwrap_or(0)
    }

    #[test]
    fn test_rotation_is_baked_into_output() {
        let source = load_handle(create_test_pdf(2, None));
        let output = apply(
            &source,
            &TransformPlan::from(vec![TransformOp::RotateSet {
                pages: vec![1],
                degrees: 90,
            }]),
        )
        .unwrap();

        let pages = output_page_dicts(&output);
        assert_eq!(rotate_value(&pages[0]), 90);
        assert_eq!(rotate_value(&pages[1]), 0);
    }

    #[test]
    fn test_full_turn_writes_no_rotate_key() {
        let source = load_handle(create_test_pdf(1, None));
        let rotate = TransformOp::RotateSet {
            pages: vec![1],
            degrees: 90,
        };
        let output = apply(
            &source,
            &TransformPlan::from(vec![
                rotate.clone(),
                rotate.clone(),
                rotate.clone(),
                rotate,
            ]),
        )
        .unwrap();

        let pages = output_page_dicts(&output);
        assert!(pages[0].get(b"Rotate").is_err());
    }

    #[test]
    fn test_rotation_adds_to_source_rotation() {
        let source = load_handle(create_test_pdf(1, Some(90)));
        let output = apply(
            &source,
            &TransformPlan::from(vec![TransformOp::RotateSet {
                pages: vec![1],
                degrees: 90,
            }]),
        )
        .unwrap();

        let pages = output_page_dicts(&output);
        assert_eq!(rotate_value(&pages[0]), 180);
    }

    #[test]
    fn test_crop_box_written_to_output() {
        let source = load_handle(create_test_pdf(1, None));
        let output = apply(
            &source,
            &TransformPlan::from(vec![TransformOp::CropSet {
                pages: vec![1],
                rect: CropRect {
                    top: 700.0,
                    bottom: 100.0,
                    left: 50.0,
                    right: 550.0,
                },
            }]),
        )
        .unwrap();

        let pages = output_page_dicts(&output);
        let crop = pages[0].get(b"CropBox").unwrap();
        match crop {
            Object::Array(edges) => assert_eq!(edges.len(), 4),
            other => panic!("CropBox is not an array: {:?}", other),
        }
    }

    #[test]
    fn test_overlay_becomes_free_text_annotation() {
        let source = load_handle(create_test_pdf(1, None));
        let output = apply(
            &source,
            &TransformPlan::from(vec![TransformOp::Overlay {
                page: 1,
                anchor: OverlayAnchor::Center,
                content: OverlayText::new("CONFIDENTIAL"),
            }]),
        )
        .unwrap();

        let doc = Document::load_mem(&output).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let annots = match page.get(b"Annots").unwrap() {
            Object::Array(refs) => refs.clone(),
            other => panic!("Annots is not an array: {:?}", other),
        };
        assert_eq!(annots.len(), 1);

        let annot_id = annots[0].as_reference().unwrap();
        let annot = doc.get_dictionary(annot_id).unwrap();
        assert_eq!(annot.get(b"Subtype").unwrap().as_name().unwrap(), b"FreeText");
        let contents = annot.get(b"Contents").unwrap().as_str().unwrap();
        assert_eq!(contents, b"CONFIDENTIAL");
    }

    #[test]
    fn test_duplicated_page_elements_stay_independent() {
        let source = load_handle(create_test_pdf(3, None));
        let output = apply(
            &source,
            &TransformPlan::from(vec![
                TransformOp::KeepSubset { pages: vec![1, 1] },
                TransformOp::RotateSet {
                    pages: vec![2],
                    degrees: 90,
                },
            ]),
        )
        .unwrap();

        let pages = output_page_dicts(&output);
        assert_eq!(pages.len(), 2);
        assert_eq!(rotate_value(&pages[0]), 0);
        assert_eq!(rotate_value(&pages[1]), 90);
    }

    #[test]
    fn test_inherited_media_box_survives_reparenting() {
        let source = load_handle(create_inheriting_pdf(2));
        let output = apply(
            &source,
            &TransformPlan::from(vec![TransformOp::KeepSubset { pages: vec![2] }]),
        )
        .unwrap();

        let pages = output_page_dicts(&output);
        assert_eq!(pages.len(), 1);
        let media = pages[0].get(b"MediaBox").unwrap();
        match media {
            Object::Array(edges) => assert_eq!(edges.len(), 4),
            other => panic!("MediaBox is not an array: {:?}", other),
        }
    }

    #[test]
    fn test_materialize_rejects_empty_layout() {
        let source = load_handle(create_test_pdf(1, None));
        let err = materialize(std::slice::from_ref(&source), &[]).unwrap_err();
        assert_eq!(err, TransformError::EmptyResult);
    }

    #[test]
    fn test_resolved_layout_round_trips_through_loader() {
        let source = load_handle(create_test_pdf(4, None));
        let resolved = resolve_plan(
            &[4],
            &TransformPlan::from(vec![TransformOp::Reorder {
                order: vec![4, 3, 2, 1],
            }]),
        )
        .unwrap();

        let output = materialize(std::slice::from_ref(&source), &resolved).unwrap();
        let doc = Document::load_mem(&output).unwrap();
        assert_eq!(doc.get_pages().len(), 4);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FF0000"), (1.0, 0.0, 0.0));
        assert_eq!(parse_hex_color("00FF00"), (0.0, 1.0, 0.0));
        assert_eq!(parse_hex_color("#000000"), (0.0, 0.0, 0.0));
        assert_eq!(parse_hex_color("bad"), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_anchor_rect_stays_inside_media_box() {
        let media = [0.0, 0.0, 612.0, 792.0];
        let content = OverlayText::new("1 / 10");
        for anchor in [
            OverlayAnchor::TopLeft,
            OverlayAnchor::TopCenter,
            OverlayAnchor::TopRight,
            OverlayAnchor::Center,
            OverlayAnchor::BottomLeft,
            OverlayAnchor::BottomCenter,
            OverlayAnchor::BottomRight,
        ] {
            let (x1, y1, x2, y2) = anchor_rect(media, anchor, &content);
            assert!(x1 < x2 && y1 < y2, "degenerate rect for {:?}", anchor);
            assert!(x1 >= 0.0 && y1 >= 0.0 && x2 <= 612.0 && y2 <= 792.0);
        }
    }
}
