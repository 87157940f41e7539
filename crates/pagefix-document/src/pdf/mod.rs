// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — page geometry, page copying, and generated pages.

pub mod copy;
pub mod page;
pub mod writer;

pub use writer::PdfWriter;
