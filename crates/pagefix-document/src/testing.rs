// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory PDF builders shared by the unit tests.

use image::{Rgba, RgbaImage};
use lopdf::{Document, Object, ObjectId, Stream, StringFormat, dictionary};
use std::sync::atomic::{AtomicU32, Ordering};

use pagefix_core::PagefixError;
use pagefix_core::error::Result;
use pagefix_render::{PasswordPrompt, RenderDocument, RenderEngine, TextItem};

/// One page of a synthetic document.
#[derive(Debug, Clone, Copy)]
pub struct PageSpec {
    pub width: f32,
    pub height: f32,
    pub rotate: i64,
    /// Direction the page's text runs in, in degrees counter-clockwise.
    pub text_angle: Option<f64>,
}

impl PageSpec {
    pub fn new(width: f32, height: f32, rotate: i64) -> Self {
        Self {
            width,
            height,
            rotate,
            text_angle: Some(0.0),
        }
    }

    pub fn text_at(mut self, angle: f64) -> Self {
        self.text_angle = Some(angle);
        self
    }

    pub fn blank(mut self) -> Self {
        self.text_angle = None;
        self
    }
}

fn text_content(spec: &PageSpec) -> Vec<u8> {
    let Some(angle) = spec.text_angle else {
        return Vec::new();
    };
    let (sin, cos) = angle.to_radians().sin_cos();
    let x = spec.width / 3.0;
    let y = spec.height / 3.0;
    format!(
        "BT /F1 12 Tf {cos:.4} {sin:.4} {:.4} {cos:.4} {x} {y} Tm (The quick brown fox) Tj ET",
        -sin
    )
    .into_bytes()
}

fn build(specs: &[PageSpec]) -> (Document, ObjectId, Vec<ObjectId>) {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for spec in specs {
        let content_id = doc.add_object(Stream::new(dictionary! {}, text_content(spec)));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0_i64.into(), 0_i64.into(), Object::Real(spec.width), Object::Real(spec.height)],
            "Rotate" => spec.rotate,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids.iter().map(|&id| Object::Reference(id)).collect::<Vec<_>>(),
            "Count" => kids.len() as i64,
            "MediaBox" => vec![0_i64.into(), 0_i64.into(), 612_i64.into(), 792_i64.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    (doc, catalog_id, kids)
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("failed to save test PDF");
    buf
}

/// Pages of the given `(width, height, rotate)` with upright text.
pub fn simple_pdf(pages: &[(f32, f32, i64)]) -> Vec<u8> {
    let specs: Vec<PageSpec> = pages.iter().map(|&(w, h, r)| PageSpec::new(w, h, r)).collect();
    pages_pdf(&specs)
}

pub fn pages_pdf(specs: &[PageSpec]) -> Vec<u8> {
    save(build(specs).0)
}

/// One page carrying a single link annotation at `rect`, with matching
/// QuadPoints and a `/P` back-reference.
pub fn annotated_page_pdf(width: f32, height: f32, rect: [f32; 4]) -> Vec<u8> {
    let (mut doc, _, kids) = build(&[PageSpec::new(width, height, 0)]);
    let page_id = kids[0];
    let [x0, y0, x1, y1] = rect;
    let annot_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => rect.iter().map(|&v| Object::Real(v)).collect::<Vec<_>>(),
        "QuadPoints" => [x0, y1, x1, y1, x0, y0, x1, y0].iter().map(|&v| Object::Real(v)).collect::<Vec<_>>(),
        "P" => page_id,
    });
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .expect("page dictionary")
        .set("Annots", vec![Object::Reference(annot_id)]);
    save(doc)
}

/// A4 page with an AcroForm signature field.
pub fn signed_pdf() -> Vec<u8> {
    let (mut doc, catalog_id, kids) = build(&[PageSpec::new(595.28, 841.89, 0)]);
    let field_id = doc.add_object(dictionary! {
        "FT" => "Sig",
        "T" => Object::string_literal("Signature1"),
        "P" => kids[0],
    });
    let form_id = doc.add_object(dictionary! {
        "Fields" => vec![Object::Reference(field_id)],
        "SigFlags" => 3_i64,
    });
    doc.get_object_mut(catalog_id)
        .and_then(Object::as_dict_mut)
        .expect("catalog")
        .set("AcroForm", form_id);
    save(doc)
}

/// A4 page whose catalog carries a DocMDP `/Perms` dictionary.
pub fn certified_pdf() -> Vec<u8> {
    let (mut doc, catalog_id, _) = build(&[PageSpec::new(595.28, 841.89, 0)]);
    let sig_id = doc.add_object(dictionary! {
        "Type" => "Sig",
        "Filter" => "Adobe.PPKLite",
    });
    doc.get_object_mut(catalog_id)
        .and_then(Object::as_dict_mut)
        .expect("catalog")
        .set("Perms", dictionary! { "DocMDP" => sig_id });
    save(doc)
}

const PAD_BYTES: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut s: Vec<u8> = (0..=255).collect();
    let mut j = 0usize;
    for i in 0..256 {
        j = (j + s[i] as usize + key[i % key.len()] as usize) & 0xFF;
        s.swap(i, j);
    }
    let (mut i, mut j) = (0usize, 0usize);
    data.iter()
        .map(|&byte| {
            i = (i + 1) & 0xFF;
            j = (j + s[i] as usize) & 0xFF;
            s.swap(i, j);
            byte ^ s[(s[i] as usize + s[j] as usize) & 0xFF]
        })
        .collect()
}

/// Letter-sized page encrypted with RC4 40-bit (V=1, R=2) under
/// `user_password`.
pub fn encrypted_pdf(user_password: &[u8]) -> Vec<u8> {
    let file_id = b"pagefixtestid001";
    let permissions: i32 = -4;

    let mut padded = Vec::with_capacity(32);
    let len = user_password.len().min(32);
    padded.extend_from_slice(&user_password[..len]);
    padded.extend_from_slice(&PAD_BYTES[..32 - len]);

    let o_digest = md5::compute(&padded);
    let o_value = rc4(&o_digest[..5], &padded);

    let mut key_input = Vec::with_capacity(128);
    key_input.extend_from_slice(&padded);
    key_input.extend_from_slice(&o_value);
    key_input.extend_from_slice(&(permissions as u32).to_le_bytes());
    key_input.extend_from_slice(file_id);
    let key = md5::compute(&key_input)[..5].to_vec();
    let u_value = rc4(&key, &PAD_BYTES);

    let (mut doc, _, _) = build(&[PageSpec::new(612.0, 792.0, 0)]);
    for (&(num, generation), object) in doc.objects.iter_mut() {
        let mut object_key = key.clone();
        object_key.extend_from_slice(&num.to_le_bytes()[..3]);
        object_key.extend_from_slice(&generation.to_le_bytes()[..2]);
        let digest = md5::compute(&object_key);
        let object_key = &digest[..(key.len() + 5).min(16)];
        match object {
            Object::Stream(stream) => {
                let encrypted = rc4(object_key, &stream.content);
                stream.set_content(encrypted);
            }
            Object::String(content, _) => *content = rc4(object_key, content),
            _ => {}
        }
    }

    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1_i64,
        "R" => 2_i64,
        "Length" => 40_i64,
        "O" => Object::String(o_value, StringFormat::Literal),
        "U" => Object::String(u_value, StringFormat::Literal),
        "P" => permissions as i64,
    });
    doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(file_id.to_vec(), StringFormat::Literal),
            Object::String(file_id.to_vec(), StringFormat::Literal),
        ]),
    );
    save(doc)
}

/// Engine that reports a fixed list of page sizes and renders solid grey
/// pages, whatever bytes it is given.
pub struct SolidEngine {
    pub sizes: Vec<(f32, f32)>,
}

struct SolidDoc {
    sizes: Vec<(f32, f32)>,
}

impl RenderDocument for SolidDoc {
    fn page_count(&self) -> usize {
        self.sizes.len()
    }

    fn page_size(&self, page: usize) -> Result<(f32, f32)> {
        self.sizes
            .get(page)
            .copied()
            .ok_or_else(|| PagefixError::Render(format!("no page {page}")))
    }

    fn text_items(&self, _page: usize) -> Result<Vec<TextItem>> {
        Ok(Vec::new())
    }

    fn render(&self, page: usize, scale: f32) -> Result<RgbaImage> {
        let (w, h) = self.page_size(page)?;
        Ok(RgbaImage::from_pixel(
            (w * scale).round().max(1.0) as u32,
            (h * scale).round().max(1.0) as u32,
            Rgba([128, 128, 128, 255]),
        ))
    }
}

impl RenderEngine for SolidEngine {
    fn name(&self) -> &str {
        "solid"
    }

    fn open(&self, _bytes: Vec<u8>, _password: Option<&str>) -> Result<Box<dyn RenderDocument + '_>> {
        Ok(Box::new(SolidDoc {
            sizes: self.sizes.clone(),
        }))
    }
}

/// [`SolidEngine`] behind a user password: opening without `secret`
/// reports a lock the way a real renderer does.
pub struct LockedSolidEngine {
    pub secret: &'static str,
    pub inner: SolidEngine,
}

impl RenderEngine for LockedSolidEngine {
    fn name(&self) -> &str {
        "solid-locked"
    }

    fn open(&self, bytes: Vec<u8>, password: Option<&str>) -> Result<Box<dyn RenderDocument + '_>> {
        match password {
            None => Err(PagefixError::PasswordRequired),
            Some(p) if p == self.secret => self.inner.open(bytes, password),
            Some(_) => Err(PagefixError::IncorrectPassword),
        }
    }
}

/// Prompt that answers with a fixed password, or declines when it has
/// none, and counts how often it was asked.
pub struct CountingPrompt {
    pub answer: Option<&'static str>,
    pub asked: AtomicU32,
}

impl CountingPrompt {
    pub fn answering(answer: Option<&'static str>) -> Self {
        Self {
            answer,
            asked: AtomicU32::new(0),
        }
    }

    pub fn asked(&self) -> u32 {
        self.asked.load(Ordering::SeqCst)
    }
}

impl PasswordPrompt for CountingPrompt {
    fn request_password(&self, _attempt: u32) -> Option<String> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer.map(str::to_string)
    }
}

/// Engine whose every page takes `per_page` to render.
pub struct SlowEngine {
    pub pages: usize,
    pub per_page: std::time::Duration,
}

struct SlowDoc {
    pages: usize,
    per_page: std::time::Duration,
}

impl RenderDocument for SlowDoc {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn page_size(&self, _page: usize) -> Result<(f32, f32)> {
        Ok((612.0, 792.0))
    }

    fn text_items(&self, _page: usize) -> Result<Vec<TextItem>> {
        Ok(Vec::new())
    }

    fn render(&self, _page: usize, _scale: f32) -> Result<RgbaImage> {
        std::thread::sleep(self.per_page);
        Ok(RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255])))
    }
}

impl RenderEngine for SlowEngine {
    fn name(&self) -> &str {
        "slow"
    }

    fn open(&self, _bytes: Vec<u8>, _password: Option<&str>) -> Result<Box<dyn RenderDocument + '_>> {
        Ok(Box::new(SlowDoc {
            pages: self.pages,
            per_page: self.per_page,
        }))
    }
}
