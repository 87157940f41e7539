// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page geometry on the lopdf object model — page boxes, rotation, and the
// fit transform that scales a page (content and annotations) into a target
// box.

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId, SaveOptions, Stream};
use pagefix_core::error::{PagefixError, Result};
use pagefix_core::geometry::{FitTransform, normalize_rotation};
use pagefix_core::{FixConfig, PageSummary};
use tracing::{debug, warn};

/// Page boxes removed when a page is refitted; they describe the old
/// geometry and would crop the new one.
const STALE_BOXES: [&[u8]; 4] = [b"CropBox", b"TrimBox", b"BleedBox", b"ArtBox"];

/// Parse PDF bytes, unlocking documents that open with an empty password.
/// Documents that need a real password are returned still encrypted.
///
/// The parser decrypts empty-password documents while loading but keeps
/// the trailer `/Encrypt` entry; it is removed here so the document saves
/// in the clear. `encryption_state` stays set to record that the input
/// was encrypted.
pub fn load_document(bytes: &[u8]) -> Result<Document> {
    let mut doc = Document::load_mem(bytes).map_err(|e| PagefixError::Parse(e.to_string()))?;
    if doc.is_encrypted() {
        if doc.encryption_state.is_some() {
            drop_encrypt_entry(&mut doc);
        } else {
            warn!("document is encrypted with a non-empty password");
        }
    }
    Ok(doc)
}

fn drop_encrypt_entry(doc: &mut Document) {
    if let Some(Object::Reference(id)) = doc.trailer.remove(b"Encrypt") {
        doc.objects.remove(&id);
    }
    debug!("empty-password encryption removed");
}

/// Serialize `doc` with object streams and a cross-reference stream,
/// compressing content streams when configured.
pub fn save_document(doc: &mut Document, config: &FixConfig) -> Result<Vec<u8>> {
    if config.compress_output {
        doc.compress();
    }
    let options = SaveOptions::builder()
        .use_object_streams(true)
        .use_xref_streams(true)
        .build();
    let mut output = Vec::new();
    doc.save_with_options(&mut output, options)
        .map_err(|e| PagefixError::Serialize(e.to_string()))?;
    debug!(output_bytes = output.len(), "document serialized");
    Ok(output)
}

/// Page object ids in page order.
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// A rectangle in default user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageBox {
    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).abs()
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).abs()
    }

    pub fn left(&self) -> f32 {
        self.x0.min(self.x1)
    }

    pub fn bottom(&self) -> f32 {
        self.y0.min(self.y1)
    }
}

/// Look up an inheritable page attribute, walking `/Parent` links.
pub fn inherited_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok();
    let mut seen = HashSet::new();
    while let Some(dict) = current {
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
        if !seen.insert(parent) {
            return None;
        }
        current = doc.get_dictionary(parent).ok();
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn number(obj: &Object) -> Option<f32> {
    obj.as_float().ok().filter(|v| v.is_finite())
}

/// The page's MediaBox.
pub fn page_box(doc: &Document, page_id: ObjectId, page: usize) -> Result<PageBox> {
    let malformed = |detail: &str| PagefixError::MalformedPage {
        page,
        detail: detail.to_string(),
    };
    let values = inherited_attribute(doc, page_id, b"MediaBox")
        .ok_or_else(|| malformed("missing MediaBox"))?
        .as_array()
        .map_err(|_| malformed("MediaBox is not an array"))?;
    let nums: Vec<f32> = values.iter().filter_map(number).collect();
    let [x0, y0, x1, y1] = nums[..] else {
        return Err(malformed("MediaBox is not four numbers"));
    };
    let mb = PageBox { x0, y0, x1, y1 };
    if mb.width() <= 0.0 || mb.height() <= 0.0 {
        return Err(malformed("MediaBox is empty"));
    }
    Ok(mb)
}

/// The page's `/Rotate` in `[0, 360)`, 0 when absent.
pub fn page_rotation(doc: &Document, page_id: ObjectId, page: usize) -> Result<u32> {
    match inherited_attribute(doc, page_id, b"Rotate") {
        None | Some(Object::Null) => Ok(0),
        Some(obj) => obj
            .as_i64()
            .ok()
            .or_else(|| number(obj).map(|v| v.round() as i64))
            .map(normalize_rotation)
            .ok_or_else(|| PagefixError::MalformedPage {
                page,
                detail: "Rotate is not a number".into(),
            }),
    }
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId, page: usize) -> Result<&mut Dictionary> {
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PagefixError::MalformedPage {
            page,
            detail: e.to_string(),
        })
}

pub fn set_page_rotation(doc: &mut Document, page_id: ObjectId, page: usize, rotation: u32) -> Result<()> {
    page_dict_mut(doc, page_id, page)?.set("Rotate", Object::Integer(i64::from(rotation % 360)));
    Ok(())
}

/// Size, rotation and orientation of every page.
pub fn page_summaries(doc: &Document) -> Result<Vec<PageSummary>> {
    page_ids(doc)
        .into_iter()
        .enumerate()
        .map(|(index, id)| {
            let mb = page_box(doc, id, index)?;
            let rotation = page_rotation(doc, id, index)?;
            Ok(PageSummary::new(index, mb.width(), mb.height(), rotation))
        })
        .collect()
}

/// Outcome of fitting one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOutcome {
    pub transform: FitTransform,
    /// Size before fitting.
    pub original: (f32, f32),
}

impl FitOutcome {
    /// Whether either dimension moved by more than `threshold` points.
    pub fn resized(&self, target: (f32, f32), threshold: f32) -> bool {
        (self.original.0 - target.0).abs() > threshold || (self.original.1 - target.1).abs() > threshold
    }
}

/// Scale and center a page into a `target` box.
///
/// The content is wrapped in `q s 0 0 s tx ty cm ... Q`, the MediaBox is
/// replaced with `[0 0 w h]`, stale crop/trim/bleed/art boxes are dropped,
/// and annotation `/Rect` and `/QuadPoints` receive the same transform.
pub fn fit_page_to_box(doc: &mut Document, page_id: ObjectId, page: usize, target: (f32, f32)) -> Result<FitOutcome> {
    let mb = page_box(doc, page_id, page)?;
    let transform = FitTransform::compute(mb.width(), mb.height(), target.0, target.1).ok_or(
        PagefixError::MalformedPage {
            page,
            detail: "page box cannot be fitted".into(),
        },
    )?;
    let s = transform.scale;
    let tx = transform.dx - mb.left() * s;
    let ty = transform.dy - mb.bottom() * s;
    let identity = s == 1.0 && tx == 0.0 && ty == 0.0;

    if !identity {
        wrap_page_content(doc, page_id, page, [s, 0.0, 0.0, s, tx, ty])?;
        transform_annotations(doc, page_id, page, s, tx, ty)?;
    }

    let dict = page_dict_mut(doc, page_id, page)?;
    dict.set(
        "MediaBox",
        Object::Array(vec![
            Object::Real(0.0),
            Object::Real(0.0),
            Object::Real(target.0),
            Object::Real(target.1),
        ]),
    );
    for key in STALE_BOXES {
        dict.remove(key);
    }

    debug!(page, scale = s, tx, ty, "page fitted");
    Ok(FitOutcome {
        transform,
        original: (mb.width(), mb.height()),
    })
}

/// The page's content stream references, in drawing order.
fn content_refs(doc: &Document, page_id: ObjectId, page: usize) -> Result<Vec<Object>> {
    match doc.get_dictionary(page_id).ok().and_then(|d| d.get(b"Contents").ok()) {
        None => Ok(Vec::new()),
        Some(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => Ok(items.clone()),
            _ => Ok(vec![Object::Reference(*id)]),
        },
        Some(Object::Array(items)) => Ok(items.clone()),
        Some(_) => Err(PagefixError::MalformedPage {
            page,
            detail: "Contents is neither a stream reference nor an array".into(),
        }),
    }
}

/// Replace the page's contents with `prefix`, the existing streams, then
/// `suffix`.
fn surround_contents(doc: &mut Document, page_id: ObjectId, page: usize, prefix: Vec<u8>, suffix: Vec<u8>) -> Result<()> {
    let existing = content_refs(doc, page_id, page)?;
    let prefix_id = doc.add_object(Stream::new(Dictionary::new(), prefix));
    let suffix_id = doc.add_object(Stream::new(Dictionary::new(), suffix));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(prefix_id));
    contents.extend(existing);
    contents.push(Object::Reference(suffix_id));

    page_dict_mut(doc, page_id, page)?.set("Contents", Object::Array(contents));
    Ok(())
}

/// Surround the page's content streams with a saved graphics state that
/// applies `matrix` first.
fn wrap_page_content(doc: &mut Document, page_id: ObjectId, page: usize, matrix: [f32; 6]) -> Result<()> {
    if content_refs(doc, page_id, page)?.is_empty() {
        return Ok(());
    }
    let [a, b, c, d, e, f] = matrix;
    let prefix = format!("q\n{a} {b} {c} {d} {e} {f} cm\n");
    surround_contents(doc, page_id, page, prefix.into_bytes(), b"\nQ\n".to_vec())
}

/// Draw `overlay` on top of the page in default user space, isolated from
/// whatever graphics state the existing content leaves behind.
pub fn append_page_content(doc: &mut Document, page_id: ObjectId, page: usize, overlay: &[u8]) -> Result<()> {
    let mut suffix = b"\nQ\n".to_vec();
    suffix.extend_from_slice(overlay);
    surround_contents(doc, page_id, page, b"q\n".to_vec(), suffix)
}

/// Register `font_id` under `name` in the page's font resources,
/// materializing inherited resources on the page first.
pub fn add_page_font(doc: &mut Document, page_id: ObjectId, page: usize, name: &str, font_id: ObjectId) -> Result<()> {
    let mut resources = match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    let mut fonts = match resources.get(b"Font").map(|f| resolve(doc, f)) {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    fonts.set(name, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));
    page_dict_mut(doc, page_id, page)?.set("Resources", Object::Dictionary(resources));
    Ok(())
}

fn transform_annotations(doc: &mut Document, page_id: ObjectId, page: usize, s: f32, tx: f32, ty: f32) -> Result<()> {
    let annots = match doc.get_dictionary(page_id).ok().and_then(|d| d.get(b"Annots").ok()) {
        None => return Ok(()),
        Some(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => return Ok(()),
        },
        Some(Object::Array(items)) => items.clone(),
        Some(_) => return Ok(()),
    };

    let map = |v: &mut [Object]| {
        for (i, value) in v.iter_mut().enumerate() {
            if let Some(n) = number(value) {
                let mapped = if i % 2 == 0 { n * s + tx } else { n * s + ty };
                *value = Object::Real(mapped);
            }
        }
    };

    let mut inline_changed = false;
    let mut inline = annots.clone();
    // An annotation listed twice is still moved once.
    let mut moved = HashSet::new();
    for (slot, annot) in annots.iter().enumerate() {
        match annot {
            Object::Reference(id) => {
                if !moved.insert(*id) {
                    continue;
                }
                if let Ok(dict) = doc.get_object_mut(*id).and_then(Object::as_dict_mut) {
                    transform_annotation_dict(dict, &map);
                }
            }
            Object::Dictionary(_) => {
                if let Object::Dictionary(dict) = &mut inline[slot] {
                    transform_annotation_dict(dict, &map);
                    inline_changed = true;
                }
            }
            _ => {}
        }
    }

    if inline_changed {
        page_dict_mut(doc, page_id, page)?.set("Annots", Object::Array(inline));
    }
    Ok(())
}

fn transform_annotation_dict(dict: &mut Dictionary, map: &impl Fn(&mut [Object])) {
    for key in [b"Rect".as_slice(), b"QuadPoints".as_slice()] {
        if let Ok(Object::Array(values)) = dict.get_mut(key) {
            map(values.as_mut_slice());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagefix_core::{A4_HEIGHT, A4_WIDTH};

    use pagefix_security::protection::is_encrypted;

    use crate::testing::{annotated_page_pdf, encrypted_pdf, simple_pdf};

    fn first_page(doc: &Document) -> ObjectId {
        page_ids(doc)[0]
    }

    #[test]
    fn reads_box_and_rotation() {
        let doc = load_document(&simple_pdf(&[(842.0, 595.0, 90)])).unwrap();
        let id = first_page(&doc);
        let mb = page_box(&doc, id, 0).unwrap();
        assert_eq!((mb.width(), mb.height()), (842.0, 595.0));
        assert_eq!(page_rotation(&doc, id, 0).unwrap(), 90);
    }

    #[test]
    fn negative_rotation_normalizes() {
        let mut doc = load_document(&simple_pdf(&[(595.0, 842.0, 0)])).unwrap();
        let id = first_page(&doc);
        doc.get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .unwrap()
            .set("Rotate", -90_i64);
        assert_eq!(page_rotation(&doc, id, 0).unwrap(), 270);
    }

    #[test]
    fn fit_sets_exact_box_and_wraps_content() {
        let mut doc = load_document(&simple_pdf(&[(612.0, 792.0, 0)])).unwrap();
        let id = first_page(&doc);
        let outcome = fit_page_to_box(&mut doc, id, 0, (A4_WIDTH, A4_HEIGHT)).unwrap();
        assert!(outcome.resized((A4_WIDTH, A4_HEIGHT), 0.5));

        let mb = page_box(&doc, id, 0).unwrap();
        assert_eq!((mb.width(), mb.height()), (A4_WIDTH, A4_HEIGHT));

        let content = doc.get_page_content(id).unwrap();
        let text = String::from_utf8_lossy(&content);
        assert!(text.starts_with("q\n"));
        assert!(text.contains(" cm\n"));
        assert!(text.trim_end().ends_with('Q'));
    }

    #[test]
    fn fit_moves_annotation_rect() {
        let mut doc = load_document(&annotated_page_pdf(800.0, 600.0, [100.0, 100.0, 200.0, 150.0])).unwrap();
        let id = first_page(&doc);
        let fit = fit_page_to_box(&mut doc, id, 0, (A4_WIDTH, A4_HEIGHT))
            .unwrap()
            .transform;

        let annots = doc.get_dictionary(id).unwrap().get(b"Annots").unwrap().as_array().unwrap().clone();
        let annot_id = annots[0].as_reference().unwrap();
        let rect: Vec<f32> = doc
            .get_dictionary(annot_id)
            .unwrap()
            .get(b"Rect")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect();
        let expected = [
            100.0 * fit.scale + fit.dx,
            100.0 * fit.scale + fit.dy,
            200.0 * fit.scale + fit.dx,
            150.0 * fit.scale + fit.dy,
        ];
        for (got, want) in rect.iter().zip(expected) {
            assert!((got - want).abs() < 1e-3, "{got} vs {want}");
        }
    }

    #[test]
    fn annotation_listed_twice_moves_once() {
        let mut doc = load_document(&annotated_page_pdf(800.0, 600.0, [100.0, 100.0, 200.0, 150.0])).unwrap();
        let id = first_page(&doc);
        let page = doc.get_object_mut(id).and_then(Object::as_dict_mut).unwrap();
        let mut annots = page.get(b"Annots").unwrap().as_array().unwrap().clone();
        let annot_id = annots[0].as_reference().unwrap();
        annots.push(Object::Reference(annot_id));
        page.set("Annots", annots);

        let fit = fit_page_to_box(&mut doc, id, 0, (A4_WIDTH, A4_HEIGHT))
            .unwrap()
            .transform;
        let x0 = doc.get_dictionary(annot_id).unwrap().get(b"Rect").unwrap().as_array().unwrap()[0]
            .as_float()
            .unwrap();
        assert!((x0 - (100.0 * fit.scale + fit.dx)).abs() < 1e-3, "{x0}");
    }

    #[test]
    fn empty_password_document_loads_in_the_clear() {
        let doc = load_document(&encrypted_pdf(b"")).unwrap();
        assert!(!doc.is_encrypted());
        assert!(is_encrypted(&doc));
        assert_eq!(page_ids(&doc).len(), 1);
    }

    #[test]
    fn user_password_document_stays_locked() {
        let doc = load_document(&encrypted_pdf(b"s3cret")).unwrap();
        assert!(doc.is_encrypted());
        assert!(page_ids(&doc).is_empty());
    }

    #[test]
    fn saves_with_object_streams() {
        let mut doc = load_document(&simple_pdf(&[(612.0, 792.0, 0), (595.0, 842.0, 0)])).unwrap();
        let bytes = save_document(&mut doc, &FixConfig::default()).unwrap();
        let raw = String::from_utf8_lossy(&bytes);
        assert!(raw.contains("/ObjStm"));
        assert!(raw.contains("/XRef"));

        let reloaded = load_document(&bytes).unwrap();
        assert_eq!(page_ids(&reloaded).len(), 2);
        let mb = page_box(&reloaded, page_ids(&reloaded)[1], 1).unwrap();
        assert_eq!((mb.width(), mb.height()), (595.0, 842.0));
    }

    #[test]
    fn exact_a4_is_untouched_content() {
        let mut doc = load_document(&simple_pdf(&[(A4_WIDTH, A4_HEIGHT, 0)])).unwrap();
        let id = first_page(&doc);
        let before = doc.get_page_content(id).unwrap();
        let outcome = fit_page_to_box(&mut doc, id, 0, (A4_WIDTH, A4_HEIGHT)).unwrap();
        assert!(!outcome.resized((A4_WIDTH, A4_HEIGHT), 0.5));
        assert_eq!(doc.get_page_content(id).unwrap(), before);
    }

    #[test]
    fn missing_mediabox_is_malformed() {
        let mut doc = load_document(&simple_pdf(&[(595.0, 842.0, 0)])).unwrap();
        let id = first_page(&doc);
        let pages_id = doc.catalog().unwrap().get(b"Pages").unwrap().as_reference().unwrap();
        doc.get_object_mut(pages_id).and_then(Object::as_dict_mut).unwrap().remove(b"MediaBox");
        doc.get_object_mut(id).and_then(Object::as_dict_mut).unwrap().remove(b"MediaBox");
        assert!(matches!(
            page_box(&doc, id, 0),
            Err(PagefixError::MalformedPage { page: 0, .. })
        ));
    }

    #[test]
    fn overlay_draws_after_isolated_content() {
        let mut doc = load_document(&simple_pdf(&[(595.0, 842.0, 0)])).unwrap();
        let id = first_page(&doc);
        append_page_content(&mut doc, id, 0, b"BT /F9 9 Tf (x) Tj ET").unwrap();
        let content = String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned();
        assert!(content.starts_with("q\n"));
        let restore = content.rfind("Q\n").unwrap();
        assert!(content.rfind("/F9").unwrap() > restore);
    }

    #[test]
    fn font_joins_existing_resources() {
        let mut doc = load_document(&simple_pdf(&[(595.0, 842.0, 0)])).unwrap();
        let id = first_page(&doc);
        let font_id = doc.add_object(lopdf::dictionary! { "Type" => "Font" });
        add_page_font(&mut doc, id, 0, "F9", font_id).unwrap();
        let resources = doc.get_dictionary(id).unwrap().get(b"Resources").unwrap().as_dict().unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(b"F9"));
    }

    #[test]
    fn stale_boxes_are_dropped() {
        let mut doc = load_document(&simple_pdf(&[(612.0, 792.0, 0)])).unwrap();
        let id = first_page(&doc);
        doc.get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .unwrap()
            .set("CropBox", vec![10_i64.into(), 10_i64.into(), 600_i64.into(), 780_i64.into()]);
        fit_page_to_box(&mut doc, id, 0, (A4_WIDTH, A4_HEIGHT)).unwrap();
        let dict = doc.get_dictionary(id).unwrap();
        assert!(!dict.has(b"CropBox"));
    }
}
