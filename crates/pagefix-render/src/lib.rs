// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pagefix — Page rendering engine abstractions.
//
// The pipeline talks to renderers through the `RenderEngine` trait. The
// content-stream scanner is always available and reports text placement;
// PDFium, when compiled in and loadable, also rasterizes pages. The stub
// engine stands in when no renderer should be used at all.

pub mod content_text;
pub mod stub;
pub mod traits;

#[cfg(feature = "pdfium")]
pub mod pdfium;

pub use content_text::ContentTextEngine;
pub use stub::StubEngine;
pub use traits::{
    FixedPassword, NoPrompt, PasswordPrompt, RenderDocument, RenderEngine, TextItem,
    open_with_prompt,
};

/// The best render engine available in this build.
pub fn default_engine() -> Box<dyn RenderEngine> {
    #[cfg(feature = "pdfium")]
    {
        match pdfium::PdfiumEngine::bind() {
            Ok(engine) => return Box::new(engine),
            Err(e) => tracing::warn!(error = %e, "pdfium unavailable, falling back to content-text engine"),
        }
    }
    Box::new(ContentTextEngine)
}
