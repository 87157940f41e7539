// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — generated cover and separator pages using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: a page is a `PdfPage` holding a
// `Vec<Op>` operation list, serialised via `PdfDocument::save()`. The bundle
// assembler parses the output back with lopdf and copies the page in.

use pagefix_core::PaperSize;
use printpdf::{BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem};
use tracing::{debug, instrument};

const MARGIN_MM: f32 = 25.0;

/// Average Helvetica glyph width as a fraction of the font size.
const HELVETICA_AVG_WIDTH: f32 = 0.5;

/// One line of text placed on a generated page.
struct Line {
    text: String,
    size: f32,
    font: BuiltinFont,
}

impl Line {
    fn new(text: impl Into<String>, size: f32, font: BuiltinFont) -> Self {
        Self {
            text: text.into(),
            size,
            font,
        }
    }
}

/// Creates single-page PDFs with a simple top-down text layout.
pub struct PdfWriter {
    paper_size: PaperSize,
}

impl PdfWriter {
    pub fn new(paper_size: PaperSize) -> Self {
        Self { paper_size }
    }

    /// Paper dimensions in printpdf's Mm units.
    fn page_dimensions(&self) -> (Mm, Mm) {
        let (w_mm, h_mm) = self.paper_size.dimensions_mm();
        (Mm(w_mm), Mm(h_mm))
    }

    /// Characters of Helvetica at `size` that fit between the margins.
    fn chars_per_line(&self, size: f32) -> usize {
        let (page_w, _) = self.page_dimensions();
        let usable_pt = Mm(page_w.0 - 2.0 * MARGIN_MM).into_pt().0;
        ((usable_pt / (HELVETICA_AVG_WIDTH * size)) as usize).max(1)
    }

    /// Bundle cover: the title, the assembly date, and the section labels.
    #[instrument(skip(self, labels), fields(sections = labels.len()))]
    pub fn cover_page(&self, title: &str, date: &str, labels: &[String]) -> Vec<u8> {
        let mut lines = Vec::new();
        for chunk in wrap_text(title, self.chars_per_line(24.0)) {
            lines.push(Line::new(chunk, 24.0, BuiltinFont::HelveticaBold));
        }
        lines.push(Line::new(date, 12.0, BuiltinFont::Helvetica));
        lines.push(Line::new("", 12.0, BuiltinFont::Helvetica));
        lines.push(Line::new("Contents", 14.0, BuiltinFont::HelveticaBold));
        for (i, label) in labels.iter().enumerate() {
            let entry = format!("{}. {}", i + 1, label);
            for chunk in wrap_text(&entry, self.chars_per_line(11.0)) {
                lines.push(Line::new(chunk, 11.0, BuiltinFont::Helvetica));
            }
        }
        self.single_page(title, lines)
    }

    /// Tab page introducing section `index` (1-based) of `total`.
    #[instrument(skip(self))]
    pub fn separator_page(&self, label: &str, index: usize, total: usize) -> Vec<u8> {
        let mut lines = vec![Line::new(
            format!("Section {index} of {total}"),
            12.0,
            BuiltinFont::Helvetica,
        )];
        for chunk in wrap_text(label, self.chars_per_line(28.0)) {
            lines.push(Line::new(chunk, 28.0, BuiltinFont::HelveticaBold));
        }
        self.single_page(label, lines)
    }

    fn single_page(&self, title: &str, lines: Vec<Line>) -> Vec<u8> {
        let (page_w, page_h) = self.page_dimensions();
        let margin_pt = Mm(MARGIN_MM).into_pt().0;
        let mut y_pt = page_h.into_pt().0 - margin_pt;

        let mut ops: Vec<Op> = Vec::new();
        for line in lines {
            y_pt -= line.size * 1.3;
            if y_pt < margin_pt {
                break;
            }
            if line.text.is_empty() {
                continue;
            }
            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Pt(margin_pt),
                    y: Pt(y_pt),
                },
            });
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(line.size),
                font: line.font,
            });
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(line.text)],
                font: line.font,
            });
            ops.push(Op::EndTextSection);
        }

        let mut doc = PdfDocument::new(title);
        doc.with_pages(vec![PdfPage::new(page_w, page_h, ops)]);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        debug!(output_bytes = output.len(), warnings = warnings.len(), "generated page");
        output
    }
}

/// Word-wrap `text` so that no line exceeds `max_width` characters. Words
/// longer than a line are force-broken.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        while word.chars().count() > max_width {
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
            }
            let split = word.char_indices().nth(max_width).map_or(word.len(), |(i, _)| i);
            result.push(word[..split].to_string());
            word = &word[split..];
        }
        if word.is_empty() {
            continue;
        }
        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word.chars().count() <= max_width {
            current.push(' ');
            current.push_str(word);
        } else {
            result.push(std::mem::replace(&mut current, word.to_string()));
        }
    }

    if !current.is_empty() {
        result.push(current);
    }
    result
}
