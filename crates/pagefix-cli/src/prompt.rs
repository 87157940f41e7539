// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Interactive password prompt on stdin.

use std::io::{BufRead, Write};

use pagefix_render::PasswordPrompt;

/// Asks on stderr and reads one line from stdin. An empty line or end of
/// input declines.
pub struct StdinPrompt {
    file: String,
}

impl StdinPrompt {
    pub fn new(file: impl Into<String>) -> Self {
        Self { file: file.into() }
    }
}

impl PasswordPrompt for StdinPrompt {
    fn request_password(&self, attempt: u32) -> Option<String> {
        let mut stderr = std::io::stderr();
        if attempt > 1 {
            let _ = writeln!(stderr, "Incorrect password.");
        }
        let _ = write!(stderr, "Password for {} (empty to cancel): ", self.file);
        let _ = stderr.flush();

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).ok()?;
        read_answer(&line)
    }
}

fn read_answer(line: &str) -> Option<String> {
    let answer = line.trim_end_matches(['\r', '\n']);
    (!answer.is_empty()).then(|| answer.to_string())
}
