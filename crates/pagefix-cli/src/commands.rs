// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand implementations. Every document operation runs on a fix
// worker so parsing and rendering stay off the async runtime.

use std::path::{Path, PathBuf};

use pagefix_core::error::{PagefixError, Result};
use pagefix_core::{FixConfig, PageModification, PreparedPdf};
use pagefix_document::{BundleEntry, BundleSpec, FixSession, FixWorker, assemble_bundle};
use pagefix_render::{FixedPassword, PasswordPrompt, default_engine};
use tracing::info;

use crate::prompt::StdinPrompt;

/// A failed command and the file it was working on.
#[derive(Debug)]
pub struct CommandFailure {
    pub file: String,
    pub error: PagefixError,
}

trait ForFile<T> {
    fn for_file(self, path: &Path) -> std::result::Result<T, CommandFailure>;
}

impl<T> ForFile<T> for Result<T> {
    fn for_file(self, path: &Path) -> std::result::Result<T, CommandFailure> {
        self.map_err(|error| CommandFailure {
            file: display_name(path),
            error,
        })
    }
}

type Outcome = std::result::Result<(), CommandFailure>;

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_pdf(path: &Path) -> Result<Vec<u8>> {
    Ok(std::fs::read(path)?)
}

fn write_pdf(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote PDF");
    Ok(())
}

fn worker_for(path: &Path, config: &FixConfig, password: Option<&str>) -> FixWorker {
    let prompt: Box<dyn PasswordPrompt> = match password {
        Some(password) => Box::new(FixedPassword(password.to_string())),
        None => Box::new(StdinPrompt::new(display_name(path))),
    };
    FixWorker::new(FixSession::new(default_engine(), prompt, config.clone()))
}

fn report(path: &Path, prepared: &PreparedPdf) {
    let name = display_name(path);
    if !prepared.bypass_reasons.is_empty() {
        let reasons: Vec<String> = prepared.bypass_reasons.iter().map(ToString::to_string).collect();
        let verb = if prepared.bypass_applied { "removed" } else { "could not remove" };
        println!("{name}: {verb} {}", reasons.join(", "));
    }
    match &prepared.fix.auto_fix_summary {
        Some(summary) => println!("{name}: {summary}"),
        None => println!("{name}: already normalized ({} pages)", prepared.page_count),
    }
    if !prepared.fix.issues.is_empty() {
        println!("{name}: {} page(s) still need attention", prepared.fix.issues.len());
    }
}

pub async fn fix(input: &Path, output: &Path, config: FixConfig, password: Option<String>) -> Outcome {
    let bytes = read_pdf(input).for_file(input)?;
    let worker = worker_for(input, &config, password.as_deref());
    let prepared = worker.prepare(bytes).await.for_file(input)?;
    write_pdf(output, &prepared.bytes).for_file(output)?;
    report(input, &prepared);
    Ok(())
}

pub async fn issues(input: &Path, json: bool, config: FixConfig) -> Outcome {
    let bytes = read_pdf(input).for_file(input)?;
    let found = worker_for(input, &config, None)
        .detect_issues(bytes)
        .await
        .for_file(input)?;

    if json {
        let text = serde_json::to_string_pretty(&found)
            .map_err(PagefixError::from)
            .for_file(input)?;
        println!("{text}");
    } else if found.is_empty() {
        println!("{}: no issues", display_name(input));
    } else {
        for issue in &found {
            println!("page {}: {}", issue.page_index + 1, issue.description);
        }
    }
    Ok(())
}

pub async fn modify(input: &Path, output: &Path, modifications: Vec<PageModification>, config: FixConfig) -> Outcome {
    if modifications.is_empty() {
        return Err::<(), _>(PagefixError::InvalidModification("nothing to do; pass --rotate or --fit".into()))
            .for_file(input);
    }
    let bytes = read_pdf(input).for_file(input)?;
    let modified = worker_for(input, &config, None)
        .apply_modifications(bytes, modifications)
        .await
        .for_file(input)?;
    write_pdf(output, &modified).for_file(output)
}

#[derive(Debug, Clone)]
pub struct BundleOptions {
    pub title: String,
    pub cover: bool,
    pub number_pages: bool,
}

pub async fn bundle(
    inputs: &[PathBuf],
    output: &Path,
    options: BundleOptions,
    config: FixConfig,
    password: Option<String>,
) -> Outcome {
    let mut entries = Vec::with_capacity(inputs.len());
    for input in inputs {
        let bytes = read_pdf(input).for_file(input)?;
        let prepared = worker_for(input, &config, password.as_deref())
            .prepare(bytes)
            .await
            .for_file(input)?;
        report(input, &prepared);
        entries.push(BundleEntry {
            label: entry_label(input),
            bytes: prepared.bytes,
        });
    }

    let spec = BundleSpec {
        title: options.title,
        cover: options.cover,
        entries,
        number_pages: options.number_pages,
    };
    let assembled = tokio::task::spawn_blocking(move || assemble_bundle(&spec, &config))
        .await
        .map_err(|e| PagefixError::Bundle(e.to_string()))
        .and_then(|result| result)
        .for_file(output)?;

    write_pdf(output, &assembled.bytes).for_file(output)?;
    for entry in &assembled.contents {
        println!("{:>5}  {}", entry.first_page, entry.label);
    }
    println!("{}: {} pages", display_name(output), assembled.page_count);
    Ok(())
}

fn entry_label(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| display_name(path))
}

// -- Argument parsing ---------------------------------------------------------

/// `--rotate` value: 1-based page numbers and an angle.
#[derive(Debug, Clone, PartialEq)]
pub struct RotateArg {
    pub pages: PageList,
    pub angle: i32,
}

/// Comma-separated 1-based page numbers, held zero-based.
#[derive(Debug, Clone, PartialEq)]
pub struct PageList(pub Vec<usize>);

pub fn parse_pages(value: &str) -> std::result::Result<PageList, String> {
    value
        .split(',')
        .map(|part| {
            let part = part.trim();
            match part.parse::<usize>() {
                Ok(0) => Err("page numbers start at 1".to_string()),
                Ok(n) => Ok(n - 1),
                Err(_) => Err(format!("not a page number: {part:?}")),
            }
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(PageList)
}

pub fn parse_rotate(value: &str) -> std::result::Result<RotateArg, String> {
    let (pages, angle) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected PAGES:ANGLE, got {value:?}"))?;
    let angle: i32 = angle
        .trim()
        .parse()
        .map_err(|_| format!("not an angle: {angle:?}"))?;
    if angle % 90 != 0 {
        return Err(format!("angle must be a multiple of 90, got {angle}"));
    }
    Ok(RotateArg {
        pages: parse_pages(pages)?,
        angle,
    })
}

/// Rotations and fits merged back into command-line order. Each value
/// comes with the argument index clap recorded for it.
pub fn modifications(rotate: Vec<(usize, RotateArg)>, fit: Vec<(usize, PageList)>) -> Vec<PageModification> {
    let rotations = rotate.into_iter().map(|(at, arg)| {
        let modification = PageModification::Rotate {
            page_indices: arg.pages.0,
            angle: arg.angle,
        };
        (at, modification)
    });
    let fits = fit
        .into_iter()
        .map(|(at, pages)| (at, PageModification::FitToA4 { page_indices: pages.0 }));
    let mut ordered: Vec<_> = rotations.chain(fits).collect();
    ordered.sort_by_key(|(at, _)| *at);
    ordered.into_iter().map(|(_, modification)| modification).collect()
}
