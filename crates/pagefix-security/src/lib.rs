// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pagefix-security — Content fingerprints and PDF protection handling.
//
// Fingerprints identify input buffers for the parse cache. The protection
// module finds encryption, certification and signature structures and
// strips them so the object model can be edited freely.

pub mod integrity;
pub mod protection;

pub use integrity::{Fingerprint, hash_bytes};
pub use protection::{detect_protection, strip_protection};
