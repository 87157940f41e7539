// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bundle assembler — merges normalized documents behind generated cover and
// separator pages, then stamps running page numbers.

use lopdf::{Document, ObjectId, dictionary};
use pagefix_core::error::{FixStage, PagefixError, Result};
use pagefix_core::FixConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::pdf::copy::{PageCopier, new_document_shell};
use crate::pdf::page::{
    add_page_font, append_page_content, fit_page_to_box, load_document, page_box, page_ids, page_rotation,
    save_document,
};
use crate::pdf::writer::PdfWriter;

const STAMP_FONT: &str = "PfStamp";
const STAMP_SIZE: f32 = 9.0;
/// Distance of the stamp's baseline from the visible bottom edge.
const STAMP_MARGIN_PT: f32 = 20.0;

/// One document in a bundle.
#[derive(Debug, Clone)]
pub struct BundleEntry {
    pub label: String,
    pub bytes: Vec<u8>,
}

/// What to assemble and how.
#[derive(Debug, Clone)]
pub struct BundleSpec {
    pub title: String,
    pub cover: bool,
    pub entries: Vec<BundleEntry>,
    pub number_pages: bool,
}

/// Where a bundle section starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub label: String,
    /// 1-based page number of the section's separator page.
    pub first_page: usize,
}

#[derive(Debug, Clone)]
pub struct AssembledBundle {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub contents: Vec<TocEntry>,
}

/// Assemble `spec` into one document. Generated pages use the configured
/// target paper size; entry pages are copied as they are.
#[instrument(skip_all, fields(title = %spec.title, entries = spec.entries.len()))]
pub fn assemble_bundle(spec: &BundleSpec, config: &FixConfig) -> Result<AssembledBundle> {
    if spec.entries.is_empty() {
        return Err(PagefixError::Bundle("no documents to bundle".into()));
    }
    assemble(spec, config).map_err(|e| match e {
        err @ (PagefixError::Bundle(_) | PagefixError::Cancelled) => err,
        other => other.at_stage(FixStage::Bundle),
    })
}

fn assemble(spec: &BundleSpec, config: &FixConfig) -> Result<AssembledBundle> {
    let writer = PdfWriter::new(config.target_paper);
    let target = config.target_paper.dimensions_pt();
    let (mut bundle, pages_id) = new_document_shell();
    let mut page_count = 0;

    if spec.cover {
        let labels: Vec<String> = spec.entries.iter().map(|e| e.label.clone()).collect();
        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        let cover = writer.cover_page(&spec.title, &date, &labels);
        page_count += append_generated(&mut bundle, pages_id, &cover, target)?;
    }

    let total = spec.entries.len();
    let mut contents = Vec::with_capacity(total);
    for (i, entry) in spec.entries.iter().enumerate() {
        contents.push(TocEntry {
            label: entry.label.clone(),
            first_page: page_count + 1,
        });
        let separator = writer.separator_page(&entry.label, i + 1, total);
        page_count += append_generated(&mut bundle, pages_id, &separator, target)?;

        let source = load_document(&entry.bytes)
            .map_err(|e| PagefixError::Bundle(format!("{}: {e}", entry.label)))?;
        if source.is_encrypted() {
            return Err(PagefixError::Bundle(format!("{}: document is still encrypted", entry.label)));
        }
        let copied = append_document(&mut bundle, pages_id, &source)?;
        debug!(label = %entry.label, pages = copied, "section appended");
        page_count += copied;
    }

    if spec.number_pages {
        stamp_page_numbers(&mut bundle)?;
    }

    let bytes = save_document(&mut bundle, config)?;
    info!(pages = page_count, sections = total, output_bytes = bytes.len(), "bundle assembled");
    Ok(AssembledBundle {
        bytes,
        page_count,
        contents,
    })
}

fn append_document(bundle: &mut Document, pages_id: ObjectId, source: &Document) -> Result<usize> {
    let mut copier = PageCopier::new(source);
    let ids = page_ids(source);
    for &id in &ids {
        copier.copy_page(bundle, pages_id, id)?;
    }
    Ok(ids.len())
}

/// Copy a generated page in, pinning its box to the exact target size.
fn append_generated(bundle: &mut Document, pages_id: ObjectId, bytes: &[u8], target: (f32, f32)) -> Result<usize> {
    let source = load_document(bytes)?;
    let mut copier = PageCopier::new(&source);
    let ids = page_ids(&source);
    for (i, &id) in ids.iter().enumerate() {
        let new_id = copier.copy_page(bundle, pages_id, id)?;
        fit_page_to_box(bundle, new_id, i, target)?;
    }
    Ok(ids.len())
}

/// Stamp "Page N of M" at the visible bottom center of every page.
fn stamp_page_numbers(doc: &mut Document) -> Result<()> {
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let ids = page_ids(doc);
    let total = ids.len();
    for (page, &id) in ids.iter().enumerate() {
        let label = format!("Page {} of {}", page + 1, total);
        let rect = page_box(doc, id, page)?;
        let rotation = page_rotation(doc, id, page)?;
        let stamp = stamp_operators(&label, rect.left(), rect.bottom(), rect.width(), rect.height(), rotation);
        add_page_font(doc, id, page, STAMP_FONT, font_id)?;
        append_page_content(doc, id, page, stamp.as_bytes())?;
    }
    debug!(pages = total, "page numbers stamped");
    Ok(())
}

/// Text operators drawing `label` centered near the bottom edge of the page
/// as displayed, compensating for the page's `/Rotate`.
fn stamp_operators(label: &str, left: f32, bottom: f32, width: f32, height: f32, rotation: u32) -> String {
    let text_width = label.chars().count() as f32 * STAMP_SIZE * 0.5;
    let visible_width = if rotation % 180 == 0 { width } else { height };
    let u = (visible_width - text_width) / 2.0;
    let v = STAMP_MARGIN_PT;

    // Displayed (u, v) back to unrotated user space, with the text
    // direction turned against the clockwise page rotation.
    let (x, y, matrix) = match rotation {
        90 => (width - v, u, [0.0, 1.0, -1.0, 0.0]),
        180 => (width - u, height - v, [-1.0, 0.0, 0.0, -1.0]),
        270 => (v, height - u, [0.0, -1.0, 1.0, 0.0]),
        _ => (u, v, [1.0, 0.0, 0.0, 1.0]),
    };
    let [a, b, c, d] = matrix;
    format!(
        "BT\n/{STAMP_FONT} {STAMP_SIZE} Tf\n0 g\n{a} {b} {c} {d} {} {} Tm\n({label}) Tj\nET\n",
        left + x,
        bottom + y
    )
}
