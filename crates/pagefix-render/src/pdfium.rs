// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDFium-backed render engine (feature "pdfium").

use image::{Rgba, RgbaImage, imageops};
use pagefix_core::error::{PagefixError, Result};
use pdfium_render::prelude::*;
use tracing::debug;

use crate::traits::{RenderDocument, RenderEngine, TextItem};

/// Render engine over a dynamically bound PDFium library.
pub struct PdfiumEngine {
    pdfium: Pdfium,
}

impl PdfiumEngine {
    /// Bind PDFium from the working directory, falling back to the system
    /// library.
    pub fn bind() -> Result<Self> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| PagefixError::Render(format!("failed to bind pdfium library: {e}")))?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl RenderEngine for PdfiumEngine {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn open(&self, bytes: Vec<u8>, password: Option<&str>) -> Result<Box<dyn RenderDocument + '_>> {
        let document = self
            .pdfium
            .load_pdf_from_byte_vec(bytes, password)
            .map_err(|e| match e {
                PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                    if password.is_some() {
                        PagefixError::IncorrectPassword
                    } else {
                        PagefixError::PasswordRequired
                    }
                }
                other => PagefixError::Parse(other.to_string()),
            })?;
        Ok(Box::new(PdfiumDocument { document }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl PdfiumDocument<'_> {
    fn page(&self, page: usize) -> Result<PdfPage<'_>> {
        let index = u16::try_from(page)
            .map_err(|_| PagefixError::PdfError(format!("page index {page} out of range")))?;
        self.document
            .pages()
            .get(index)
            .map_err(|e| PagefixError::MalformedPage {
                page,
                detail: e.to_string(),
            })
    }
}

impl RenderDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_size(&self, page: usize) -> Result<(f32, f32)> {
        let page = self.page(page)?;
        Ok((page.width().value, page.height().value))
    }

    fn text_items(&self, page: usize) -> Result<Vec<TextItem>> {
        let pdf_page = self.page(page)?;
        let mut items = Vec::new();
        for object in pdf_page.objects().iter() {
            let Some(text_object) = object.as_text_object() else {
                continue;
            };
            let Ok(matrix) = text_object.matrix() else {
                continue;
            };
            items.push(TextItem {
                text: text_object.text(),
                transform: [
                    f64::from(matrix.a()),
                    f64::from(matrix.b()),
                    f64::from(matrix.c()),
                    f64::from(matrix.d()),
                    f64::from(matrix.e()),
                    f64::from(matrix.f()),
                ],
            });
        }
        debug!(page, items = items.len(), "pdfium text objects read");
        Ok(items)
    }

    fn render(&self, page: usize, scale: f32) -> Result<RgbaImage> {
        let pdf_page = self.page(page)?;
        let width = (pdf_page.width().value * scale).round().max(1.0) as i32;
        let height = (pdf_page.height().value * scale).round().max(1.0) as i32;

        let bitmap = pdf_page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(width)
                    .set_target_height(height)
                    .render_form_data(true)
                    .render_annotations(true),
            )
            .map_err(|e| PagefixError::Render(e.to_string()))?;

        let rendered = bitmap.as_image().to_rgba8();
        let mut canvas = RgbaImage::from_pixel(rendered.width(), rendered.height(), Rgba([255, 255, 255, 255]));
        imageops::overlay(&mut canvas, &rendered, 0, 0);
        Ok(canvas)
    }
}
