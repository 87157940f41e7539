// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterization fallback.
//
// Used when the object graph cannot be edited. Every page is rendered by
// the render engine and placed as a single image on a fresh page of the
// exact target size. The output has no selectable text.

use image::RgbaImage;
use lopdf::{Document, Object, Stream, dictionary};
use pagefix_core::error::{FixStage, PagefixError, Result};
use pagefix_core::geometry::FitTransform;
use pagefix_core::{FixConfig, PageSummary};
use pagefix_render::open_with_prompt;
use tracing::{debug, info, instrument, warn};

use crate::context::FixContext;
use crate::pdf::copy::new_document_shell;
use crate::pdf::page::{load_document, page_summaries, save_document};

/// Whether the object model can read the size and rotation of every page.
/// Returns the page geometry when it can.
pub fn probe_structure(bytes: &[u8]) -> Result<Vec<PageSummary>> {
    probe_document(&load_document(bytes)?)
}

/// [`probe_structure`] on a parsed document.
pub fn probe_document(doc: &Document) -> Result<Vec<PageSummary>> {
    if doc.is_encrypted() {
        return Err(PagefixError::PdfError("document is still encrypted".into()));
    }
    let summaries = page_summaries(doc)?;
    if summaries.is_empty() {
        return Err(PagefixError::PdfError("document has no readable pages".into()));
    }
    Ok(summaries)
}

/// Output of the rasterization fallback.
#[derive(Debug, Clone)]
pub struct RasterizedPdf {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// Render scale for a page of `width` x `height` points, shrunk so the
/// bitmap stays within the configured pixel budget.
pub fn render_scale(width: f32, height: f32, config: &FixConfig) -> f32 {
    let scale = config.raster_scale();
    let pixels = f64::from(width * scale) * f64::from(height * scale);
    let budget = config.max_raster_pixels as f64;
    if pixels > budget && pixels > 0.0 {
        scale * (budget / pixels).sqrt() as f32
    } else {
        scale
    }
}

/// Rebuild `bytes` as an image-only document.
#[instrument(skip_all, fields(engine = ctx.engine.name(), bytes_len = bytes.len()))]
pub fn rasterize_document(bytes: &[u8], ctx: &FixContext<'_>) -> Result<RasterizedPdf> {
    rasterize(bytes, ctx).map_err(|e| e.at_stage(FixStage::Rasterization))
}

fn rasterize(bytes: &[u8], ctx: &FixContext<'_>) -> Result<RasterizedPdf> {
    let source = open_with_prompt(ctx.engine, bytes, ctx.prompt)?;
    let page_count = source.page_count();
    if page_count == 0 {
        return Err(PagefixError::Render("render engine found no pages".into()));
    }

    let (target_w, target_h) = ctx.target();
    let (mut doc, pages_id) = new_document_shell();
    let mut kids = Vec::with_capacity(page_count);

    for page in 0..page_count {
        ctx.checkpoint()?;
        let (width, height) = source.page_size(page)?;
        let scale = render_scale(width, height, ctx.config);
        // The bitmap is dropped at the end of each iteration.
        let bitmap = source.render(page, scale)?;
        let (pixel_w, pixel_h) = bitmap.dimensions();
        if pixel_w == 0 || pixel_h == 0 {
            return Err(PagefixError::Render(format!("page {page} rendered empty")));
        }

        let mut image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(pixel_w),
                "Height" => i64::from(pixel_h),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
            },
            flatten_on_white(&bitmap),
        );
        if let Err(e) = image.compress() {
            warn!(page, error = %e, "image stream left uncompressed");
        }
        let image_id = doc.add_object(image);

        let fit = FitTransform::compute(width, height, target_w, target_h).ok_or(PagefixError::MalformedPage {
            page,
            detail: format!("page size {width}x{height} cannot be placed"),
        })?;
        let placed_w = width * fit.scale;
        let placed_h = height * fit.scale;
        let content = format!("q\n{placed_w} 0 0 {placed_h} {} {} cm\n/Im0 Do\nQ\n", fit.dx, fit.dy);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![Object::Real(0.0), Object::Real(0.0), Object::Real(target_w), Object::Real(target_h)],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(Object::Reference(page_id));
        debug!(page, pixel_w, pixel_h, scale, "page rasterized");
    }
    drop(source);

    let count = kids.len() as i64;
    let pages = doc
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PagefixError::PdfError(e.to_string()))?;
    pages.set("Kids", kids);
    pages.set("Count", count);

    let output = save_document(&mut doc, ctx.config)?;
    info!(pages = page_count, output_bytes = output.len(), "document rasterized");
    Ok(RasterizedPdf {
        bytes: output,
        page_count,
    })
}

/// RGB samples of `image` composited over opaque white.
fn flatten_on_white(image: &RgbaImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(image.width() as usize * image.height() as usize * 3);
    for pixel in image.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        for channel in [r, g, b] {
            let blended = (u16::from(channel) * alpha + 255 * (255 - alpha) + 127) / 255;
            rgb.push(blended as u8);
        }
    }
    rgb
}
