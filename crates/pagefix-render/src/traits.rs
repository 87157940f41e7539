// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine-agnostic trait definitions for page rendering.
//
// The normalization pipeline needs two things from a renderer: the text
// items of a page together with their placement transforms, and a raster
// image of a page. Engines that cannot do one of these return
// `PagefixError::RenderUnavailable` for it.

use image::RgbaImage;
use pagefix_core::error::{PagefixError, Result};
use tracing::debug;

/// One run of text as placed on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub text: String,
    /// Text rendering matrix `[a b c d e f]` in page space.
    pub transform: [f64; 6],
}

/// A page-content renderer.
pub trait RenderEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Open a document from an owned copy of its bytes.
    ///
    /// Returns `PasswordRequired` when the document is locked and no
    /// password was given, `IncorrectPassword` when the given one is wrong.
    /// Dropping the returned handle releases every engine resource.
    fn open(&self, bytes: Vec<u8>, password: Option<&str>) -> Result<Box<dyn RenderDocument + '_>>;
}

/// An open document inside a render engine.
pub trait RenderDocument {
    fn page_count(&self) -> usize;

    /// Displayed page size in points (after page rotation).
    fn page_size(&self, page: usize) -> Result<(f32, f32)>;

    /// Text items on a zero-based page.
    fn text_items(&self, page: usize) -> Result<Vec<TextItem>>;

    /// Render a zero-based page at `scale` pixels per point over an
    /// opaque white background.
    fn render(&self, page: usize, scale: f32) -> Result<RgbaImage>;
}

/// Source of passwords for locked documents.
pub trait PasswordPrompt: Send + Sync {
    /// Ask for a password. `attempt` starts at 1 and grows after every
    /// rejected password. `None` cancels.
    fn request_password(&self, attempt: u32) -> Option<String>;
}

/// Prompt that always declines.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

impl PasswordPrompt for NoPrompt {
    fn request_password(&self, _attempt: u32) -> Option<String> {
        None
    }
}

/// Prompt that offers one fixed password, then declines.
#[derive(Debug, Clone)]
pub struct FixedPassword(pub String);

impl PasswordPrompt for FixedPassword {
    fn request_password(&self, attempt: u32) -> Option<String> {
        (attempt == 1).then(|| self.0.clone())
    }
}

/// Open `bytes` in `engine`, asking `prompt` for a password for as long as
/// the engine reports one is needed or wrong.
///
/// A declined prompt ends with `PagefixError::PasswordRequired`, which
/// callers treat as cancellation rather than corruption.
pub fn open_with_prompt<'e>(
    engine: &'e dyn RenderEngine,
    bytes: &[u8],
    prompt: &dyn PasswordPrompt,
) -> Result<Box<dyn RenderDocument + 'e>> {
    let mut password: Option<String> = None;
    let mut attempt = 0u32;
    loop {
        match engine.open(bytes.to_vec(), password.as_deref()) {
            Ok(doc) => return Ok(doc),
            Err(PagefixError::PasswordRequired | PagefixError::IncorrectPassword) => {
                attempt += 1;
                debug!(engine = engine.name(), attempt, "document needs a password");
                match prompt.request_password(attempt) {
                    Some(next) => password = Some(next),
                    None => return Err(PagefixError::PasswordRequired),
                }
            }
            Err(e) => return Err(e),
        }
    }
}
