// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream text scanner.
//
// A render engine built on the lopdf object model. It interprets just
// enough of each page's content stream (graphics state stack, `cm`, text
// object and text positioning operators, text showing operators and form
// XObjects) to report where and in which direction every text run is
// drawn. It has no rasterizer.

use std::collections::HashSet;

use image::RgbaImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use pagefix_core::error::{PagefixError, Result};
use pagefix_core::geometry::normalize_rotation;
use tracing::{debug, warn};

use crate::traits::{RenderDocument, RenderEngine, TextItem};

/// Nesting limit for form XObjects drawn from form XObjects.
const MAX_FORM_DEPTH: usize = 8;

/// Affine matrix `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix(pub [f64; 6]);

impl Matrix {
    pub const IDENTITY: Self = Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self` applied first, then `other`.
    pub fn then(&self, other: &Self) -> Self {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Self([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }
}

/// Engine that reads text placement straight from content streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentTextEngine;

impl RenderEngine for ContentTextEngine {
    fn name(&self) -> &str {
        "content-text"
    }

    fn open(&self, bytes: Vec<u8>, password: Option<&str>) -> Result<Box<dyn RenderDocument + '_>> {
        let mut doc =
            Document::load_mem(&bytes).map_err(|e| PagefixError::Parse(e.to_string()))?;

        // Empty-password documents arrive already decrypted.
        if doc.is_encrypted() && doc.encryption_state.is_none() {
            let Some(password) = password else {
                return Err(PagefixError::PasswordRequired);
            };
            if let Err(e) = doc.authenticate_password(password) {
                debug!(error = %e, "password rejected");
                return Err(PagefixError::IncorrectPassword);
            }
            doc = load_locked(&bytes, password)?;
        }

        let page_ids = doc.get_pages().into_values().collect();
        Ok(Box::new(ContentTextDocument { doc, page_ids }))
    }
}

/// Placeholder swapped in for the trailer `/Encrypt` key. Same length, so
/// every xref offset stays valid.
const MASKED_ENCRYPT_KEY: &[u8] = b"/PfCrypt";

/// Load a document whose user password is not empty.
///
/// The parser only loads the objects of an encrypted file when the empty
/// password opens it. With the trailer key masked it loads them as plain
/// objects, still enciphered; the key is then restored and the whole
/// document decrypted with `password`.
fn load_locked(bytes: &[u8], password: &str) -> Result<Document> {
    let masked = mask_encrypt_key(bytes);
    let mut doc = Document::load_mem(&masked).map_err(|e| PagefixError::Parse(e.to_string()))?;
    let encrypt = doc
        .trailer
        .remove(&MASKED_ENCRYPT_KEY[1..])
        .ok_or_else(|| PagefixError::Parse("encryption dictionary not found".into()))?;
    doc.trailer.set("Encrypt", encrypt);
    doc.decrypt(password).map_err(|e| {
        debug!(error = %e, "decryption rejected");
        PagefixError::IncorrectPassword
    })?;
    Ok(doc)
}

/// `bytes` with every `/Encrypt` key that is followed by whitespace
/// replaced by [`MASKED_ENCRYPT_KEY`].
fn mask_encrypt_key(bytes: &[u8]) -> Vec<u8> {
    const KEY: &[u8] = b"/Encrypt";
    let mut out = bytes.to_vec();
    let mut i = 0;
    while i + KEY.len() < out.len() {
        if &out[i..i + KEY.len()] == KEY && out[i + KEY.len()].is_ascii_whitespace() {
            out[i..i + KEY.len()].copy_from_slice(MASKED_ENCRYPT_KEY);
            i += KEY.len();
        } else {
            i += 1;
        }
    }
    out
}

struct ContentTextDocument {
    doc: Document,
    page_ids: Vec<ObjectId>,
}

impl ContentTextDocument {
    fn page_id(&self, page: usize) -> Result<ObjectId> {
        self.page_ids
            .get(page)
            .copied()
            .ok_or_else(|| PagefixError::PdfError(format!("page index {page} out of range")))
    }

    /// Walk up the page tree for an inheritable attribute.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = self.doc.get_dictionary(page_id).ok();
        let mut seen = HashSet::new();
        while let Some(dict) = current {
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            let parent = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
            if !seen.insert(parent) {
                return None;
            }
            current = self.doc.get_dictionary(parent).ok();
        }
        None
    }

    fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Option<&'a Dictionary> {
        match obj {
            Object::Dictionary(dict) => Some(dict),
            Object::Reference(id) => self.doc.get_dictionary(*id).ok(),
            _ => None,
        }
    }
}

impl RenderDocument for ContentTextDocument {
    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page_size(&self, page: usize) -> Result<(f32, f32)> {
        let page_id = self.page_id(page)?;
        let media_box = self
            .inherited(page_id, b"MediaBox")
            .and_then(|obj| match obj {
                Object::Reference(id) => self.doc.get_object(*id).ok(),
                other => Some(other),
            })
            .and_then(|obj| obj.as_array().ok())
            .ok_or(PagefixError::MalformedPage {
                page,
                detail: "missing MediaBox".into(),
            })?;
        let nums: Vec<f32> = media_box
            .iter()
            .filter_map(|o| o.as_float().ok())
            .collect();
        if nums.len() != 4 {
            return Err(PagefixError::MalformedPage {
                page,
                detail: "MediaBox is not four numbers".into(),
            });
        }
        let width = (nums[2] - nums[0]).abs();
        let height = (nums[3] - nums[1]).abs();
        let rotation = self
            .inherited(page_id, b"Rotate")
            .and_then(|o| o.as_i64().ok())
            .map(normalize_rotation)
            .unwrap_or(0);
        Ok(if rotation % 180 == 90 {
            (height, width)
        } else {
            (width, height)
        })
    }

    fn text_items(&self, page: usize) -> Result<Vec<TextItem>> {
        let page_id = self.page_id(page)?;
        let data = self
            .doc
            .get_page_content(page_id)
            .map_err(|e| PagefixError::MalformedPage {
                page,
                detail: e.to_string(),
            })?;
        let content = Content::decode(&data).map_err(|e| PagefixError::MalformedPage {
            page,
            detail: e.to_string(),
        })?;
        let resources = self
            .inherited(page_id, b"Resources")
            .and_then(|r| self.resolve_dict(r));

        let mut scanner = Scanner {
            owner: self,
            items: Vec::new(),
            form_stack: Vec::new(),
        };
        scanner.run(&content.operations, resources, Matrix::IDENTITY);
        Ok(scanner.items)
    }

    fn render(&self, _page: usize, _scale: f32) -> Result<RgbaImage> {
        Err(PagefixError::RenderUnavailable)
    }
}

struct TextState {
    tm: Matrix,
    tlm: Matrix,
    font_size: f64,
    horizontal_scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            font_size: 1.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

impl TextState {
    fn move_line(&mut self, tx: f64, ty: f64) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn rendering_matrix(&self, ctm: &Matrix) -> Matrix {
        Matrix([
            self.font_size * self.horizontal_scale,
            0.0,
            0.0,
            self.font_size,
            0.0,
            self.rise,
        ])
        .then(&self.tm)
        .then(ctm)
    }
}

struct Scanner<'a> {
    owner: &'a ContentTextDocument,
    items: Vec<TextItem>,
    form_stack: Vec<ObjectId>,
}

impl<'a> Scanner<'a> {
    fn run(&mut self, ops: &[Operation], resources: Option<&'a Dictionary>, base: Matrix) {
        let mut ctm = base;
        let mut ctm_stack: Vec<Matrix> = Vec::new();
        let mut text = TextState::default();

        for op in ops {
            let nums = || -> Vec<f64> {
                op.operands
                    .iter()
                    .filter_map(|o| o.as_float().ok().map(f64::from))
                    .collect()
            };
            match op.operator.as_str() {
                "q" => ctm_stack.push(ctm),
                "Q" => ctm = ctm_stack.pop().unwrap_or(base),
                "cm" => {
                    if let Ok(m) = <[f64; 6]>::try_from(nums()) {
                        ctm = Matrix(m).then(&ctm);
                    }
                }
                "BT" => {
                    text.tm = Matrix::IDENTITY;
                    text.tlm = Matrix::IDENTITY;
                }
                "Tm" => {
                    if let Ok(m) = <[f64; 6]>::try_from(nums()) {
                        text.tm = Matrix(m);
                        text.tlm = text.tm;
                    }
                }
                "Td" => {
                    if let [tx, ty] = nums()[..] {
                        text.move_line(tx, ty);
                    }
                }
                "TD" => {
                    if let [tx, ty] = nums()[..] {
                        text.leading = -ty;
                        text.move_line(tx, ty);
                    }
                }
                "T*" => text.move_line(0.0, -text.leading),
                "TL" => {
                    if let [leading] = nums()[..] {
                        text.leading = leading;
                    }
                }
                "Tf" => {
                    if let Some(size) = op.operands.get(1).and_then(|o| o.as_float().ok()) {
                        text.font_size = f64::from(size);
                    }
                }
                "Tz" => {
                    if let [scale] = nums()[..] {
                        text.horizontal_scale = scale / 100.0;
                    }
                }
                "Ts" => {
                    if let [rise] = nums()[..] {
                        text.rise = rise;
                    }
                }
                "Tj" | "TJ" => self.emit(op.operands.first(), &text, &ctm),
                "'" => {
                    text.move_line(0.0, -text.leading);
                    self.emit(op.operands.first(), &text, &ctm);
                }
                "\"" => {
                    text.move_line(0.0, -text.leading);
                    self.emit(op.operands.get(2), &text, &ctm);
                }
                "Do" => {
                    if let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) {
                        self.draw_form(name, resources, &ctm);
                    }
                }
                _ => {}
            }
        }
    }

    fn emit(&mut self, operand: Option<&Object>, text: &TextState, ctm: &Matrix) {
        let Some(operand) = operand else {
            return;
        };
        let mut raw = Vec::new();
        collect_string_bytes(operand, &mut raw);
        let decoded = decode_pdf_string(&raw);
        if decoded.is_empty() {
            return;
        }
        self.items.push(TextItem {
            text: decoded,
            transform: text.rendering_matrix(ctm).0,
        });
    }

    fn draw_form(&mut self, name: &[u8], resources: Option<&'a Dictionary>, ctm: &Matrix) {
        let owner = self.owner;
        let Some(id) = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| owner.resolve_dict(x))
            .and_then(|x| x.get(name).ok())
            .and_then(|o| o.as_reference().ok())
        else {
            return;
        };
        if self.form_stack.len() >= MAX_FORM_DEPTH || self.form_stack.contains(&id) {
            warn!(?id, "skipping recursive or deeply nested form XObject");
            return;
        }
        let Ok(Object::Stream(stream)) = owner.doc.get_object(id) else {
            return;
        };
        if !stream
            .dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .is_ok_and(|s| s == b"Form")
        {
            return;
        }

        let data = if stream.dict.get(b"Filter").is_ok() {
            match stream.decompressed_content() {
                Ok(data) => data,
                Err(e) => {
                    warn!(?id, error = %e, "cannot decompress form XObject");
                    return;
                }
            }
        } else {
            stream.content.clone()
        };
        let Ok(content) = Content::decode(&data) else {
            return;
        };

        let form_matrix = stream
            .dict
            .get(b"Matrix")
            .and_then(Object::as_array)
            .ok()
            .map(|arr| {
                arr.iter()
                    .filter_map(|o| o.as_float().ok().map(f64::from))
                    .collect::<Vec<_>>()
            })
            .and_then(|v| <[f64; 6]>::try_from(v).ok())
            .map(Matrix)
            .unwrap_or(Matrix::IDENTITY);
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|r| owner.resolve_dict(r))
            .or(resources);

        self.form_stack.push(id);
        self.run(&content.operations, form_resources, form_matrix.then(ctm));
        self.form_stack.pop();
    }
}

fn collect_string_bytes(obj: &Object, out: &mut Vec<u8>) {
    match obj {
        Object::String(bytes, _) => out.extend_from_slice(bytes),
        Object::Array(items) => {
            for item in items {
                collect_string_bytes(item, out);
            }
        }
        _ => {}
    }
}

/// Best-effort decoding without font tables: UTF-16BE with BOM, otherwise
/// one character per byte.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}
