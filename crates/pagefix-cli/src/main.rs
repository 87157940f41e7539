// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pagefix — normalize PDFs to upright pages of one paper size.
//
// Entry point. Initialises logging, loads configuration, and dispatches the
// subcommand.

mod commands;
mod paths;
mod prompt;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use pagefix_core::{FixConfig, PageModification};
use pagefix_core::human_errors::humanize_error;

#[derive(Debug, Parser)]
#[command(name = "pagefix", version, about = "Normalize PDFs to upright, uniformly sized pages")]
struct Cli {
    /// Configuration file (JSON). Defaults to the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Password for encrypted inputs. Without it you are asked on stdin.
    #[arg(long, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Remove protections and fix page size and orientation.
    Fix {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List pages that are off-size or sideways.
    Issues {
        input: PathBuf,
        /// Print the issues as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Rotate pages or fit them to A4.
    Modify {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Pages and angle, e.g. `1,2:90` or `3:-90`. Repeatable.
        #[arg(long, value_parser = commands::parse_rotate)]
        rotate: Vec<commands::RotateArg>,
        /// Pages to fit to A4, e.g. `3` or `1,4`.
        #[arg(long, value_parser = commands::parse_pages)]
        fit: Vec<commands::PageList>,
    },
    /// Normalize several PDFs and merge them behind separator pages.
    Bundle {
        #[arg(short, long)]
        output: PathBuf,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long, default_value = "Bundle")]
        title: String,
        /// Leave out the generated cover page.
        #[arg(long)]
        no_cover: bool,
        /// Leave out the "Page N of M" stamps.
        #[arg(long)]
        no_numbers: bool,
    },
}

/// The `modify` edits in the order they were given, however the rotate and
/// fit flags interleave.
fn ordered_modifications(
    matches: &ArgMatches,
    rotate: Vec<commands::RotateArg>,
    fit: Vec<commands::PageList>,
) -> Vec<PageModification> {
    let sub = matches.subcommand_matches("modify");
    commands::modifications(indexed(sub, "rotate", rotate), indexed(sub, "fit", fit))
}

fn indexed<T>(matches: Option<&ArgMatches>, id: &str, values: Vec<T>) -> Vec<(usize, T)> {
    match matches.and_then(|m| m.indices_of(id)) {
        Some(indices) => indices.zip(values).collect(),
        None => Vec::new(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = Cli::command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    let config_path = cli.config.clone().unwrap_or_else(paths::config_file);
    let config = match FixConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Cannot read configuration {}: {e}", config_path.display());
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(path = %config_path.display(), ?config, "configuration loaded");

    let outcome = match cli.command {
        Command::Fix { input, output } => commands::fix(&input, &output, config, cli.password).await,
        Command::Issues { input, json } => commands::issues(&input, json, config).await,
        Command::Modify {
            input,
            output,
            rotate,
            fit,
        } => {
            let modifications = ordered_modifications(&matches, rotate, fit);
            commands::modify(&input, &output, modifications, config).await
        }
        Command::Bundle {
            output,
            inputs,
            title,
            no_cover,
            no_numbers,
        } => {
            let options = commands::BundleOptions {
                title,
                cover: !no_cover,
                number_pages: !no_numbers,
            };
            commands::bundle(&inputs, &output, options, config, cli.password).await
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            let human = humanize_error(&failure.error);
            eprintln!("{}", human.sentence(&failure.file));
            eprintln!("{}", human.suggestion);
            tracing::debug!(error = %failure.error, "command failed");
            if failure.error.is_cancellation() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
