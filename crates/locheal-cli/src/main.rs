//! locheal - self-healing locators for browser test suites
//!
//! ## Commands
//!
//! - `heal`: run the full pipeline for one failed lookup
//! - `extract`: print the locator embedded in a failure message
//! - `narrow`: print the page elements sharing the locator's tag
//! - `validate`: check candidate locators against a page
//! - `patch`: replace a locator across a project

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use locheal_core::{
    extract_locator, narrow_markup, parse_candidates, patch_project, render_validation_log,
    tag_name_of, validate_candidates, Candidate, FailureSignal, Healer, HealingConfig,
    HealingOutcome, LogFormat, PatchRequest, PatchScope, PatchSummary, ScopeMode, StaticMarkup,
};

#[derive(Parser)]
#[command(name = "locheal")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Self-healing locators for browser test suites", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON (log lines and command output)
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "LOCHEAL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct FailureInput {
    /// Failure message text
    #[arg(long)]
    failure: Option<String>,

    /// File holding the failure message
    #[arg(long)]
    failure_file: Option<PathBuf>,
}

impl FailureInput {
    fn read(&self) -> Result<String> {
        match (&self.failure, &self.failure_file) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => read_text(path),
            (None, None) => anyhow::bail!("either --failure or --failure-file is required"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Heal one failed element lookup: capture, ask the model, validate, patch, report
    Heal {
        #[command(flatten)]
        input: FailureInput,

        /// Page markup captured at failure time
        #[arg(long)]
        page: PathBuf,

        /// Rewrite every file under the project root, not only source files
        #[arg(long)]
        all_files: bool,
    },

    /// Print the locator embedded in a failure message
    Extract {
        #[command(flatten)]
        input: FailureInput,
    },

    /// Print the outer markup of every element carrying the locator's tag
    Narrow {
        /// Page markup
        #[arg(long)]
        page: PathBuf,

        /// Locator whose first `//tag` step selects the elements
        #[arg(long)]
        locator: String,
    },

    /// Check candidate locators against a page, in order
    Validate {
        /// Page markup
        #[arg(long)]
        page: PathBuf,

        /// Raw model response to take candidates from
        #[arg(long)]
        response: Option<PathBuf>,

        /// Candidate locators
        locators: Vec<String>,
    },

    /// Replace a locator across the project
    Patch {
        /// Locator to replace
        #[arg(long)]
        failed: String,

        /// Replacement locator
        #[arg(long)]
        replacement: String,

        /// Project root (default: patch.root from config, else current directory)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Rewrite every file, not only source files
        #[arg(long)]
        all_files: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    locheal_core::init_tracing(LogFormat::from_json_flag(cli.json), level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Heal {
            input,
            page,
            all_files,
        } => cmd_heal(config, &input, &page, all_files, cli.json).await,
        Commands::Extract { input } => cmd_extract(&input, cli.json),
        Commands::Narrow { page, locator } => cmd_narrow(&page, &locator),
        Commands::Validate {
            page,
            response,
            locators,
        } => cmd_validate(&page, response.as_deref(), &locators, cli.json),
        Commands::Patch {
            failed,
            replacement,
            root,
            all_files,
        } => cmd_patch(&config, failed, replacement, root, all_files, cli.json),
    }
}

fn load_config(path: Option<&Path>) -> Result<HealingConfig> {
    match path {
        Some(path) => HealingConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None => {
            let mut config = HealingConfig::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_heal(
    mut config: HealingConfig,
    input: &FailureInput,
    page: &Path,
    all_files: bool,
    json: bool,
) -> Result<()> {
    let failure = FailureSignal::new(input.read()?);
    let markup = StaticMarkup::new(read_text(page)?);
    if all_files {
        config.patch.scope = ScopeMode::AllFiles;
    }

    let healer = Healer::from_config(config).context("Failed to set up the model backend")?;
    let outcome = healer.on_test_failure(&failure, &markup).await;

    if json {
        return print_json(&outcome);
    }
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &HealingOutcome) {
    match outcome {
        HealingOutcome::Skipped { reason } => println!("Skipped: {:?}", reason),
        HealingOutcome::Completed { run } => {
            println!("Run:         {}", run.run_id);
            println!("State:       {}", run.state.label());
            if let Some(reason) = run.abort_reason() {
                println!("Reason:      {:?}", reason);
            }
            if let Some(error) = &run.error {
                println!("Error:       {}", error);
            }
            if let Some(failed) = &run.failed_locator {
                println!("Failed:      {}", failed);
            }
            if let Some(replacement) = &run.replacement {
                println!("Replacement: {}", replacement);
            }
            for path in run.patched_files() {
                println!("Patched:     {}", path.display());
            }
            if let Some(report) = &run.report_path {
                println!("Report:      {}", report.display());
            }
        }
    }
}

fn cmd_extract(input: &FailureInput, json: bool) -> Result<()> {
    let extracted = extract_locator(&input.read()?);
    if json {
        return print_json(&extracted);
    }
    println!("{}", extracted);
    Ok(())
}

fn cmd_narrow(page: &Path, locator: &str) -> Result<()> {
    let markup = read_text(page)?;
    let tag = tag_name_of(locator)
        .with_context(|| format!("No tag name can be derived from {:?}", locator))?;
    info!(tag = %tag, "Narrowing page");
    print!("{}", narrow_markup(&markup, &tag));
    Ok(())
}

fn cmd_validate(
    page: &Path,
    response: Option<&Path>,
    locators: &[String],
    json: bool,
) -> Result<()> {
    let markup = read_text(page)?;
    let mut candidates: Vec<Candidate> = match response {
        Some(path) => parse_candidates(&read_text(path)?),
        None => Vec::new(),
    };
    candidates.extend(locators.iter().map(|l| Candidate::new(l.clone(), 0.0, "")));
    if candidates.is_empty() {
        anyhow::bail!("No candidate locators given");
    }

    let results = validate_candidates(&candidates, &markup);
    if json {
        return print_json(&results);
    }
    print!("{}", render_validation_log(&results));
    match locheal_core::first_matched(&results) {
        Some(chosen) => println!("Selected: {}", chosen),
        None => println!("No candidate matched"),
    }
    Ok(())
}

fn cmd_patch(
    config: &HealingConfig,
    failed: String,
    replacement: String,
    root: Option<PathBuf>,
    all_files: bool,
    json: bool,
) -> Result<()> {
    let scope = if all_files {
        PatchScope::AllFiles
    } else {
        config.patch_scope()
    };
    let request = PatchRequest {
        failed,
        replacement,
        root: root.unwrap_or_else(|| config.patch_root()),
        scope,
        exclude: vec![config.healing.artifacts_dir.clone()],
    };
    let summary = patch_project(&request).context("Patch failed")?;

    if json {
        return print_json(&summary);
    }
    print_patch_summary(&summary);
    Ok(())
}

fn print_patch_summary(summary: &PatchSummary) {
    for record in &summary.records {
        if record.replaced {
            println!(
                "patched  {} ({} occurrence(s))",
                record.path.display(),
                record.occurrences
            );
        } else if let Some(error) = &record.error {
            println!("failed   {}: {}", record.path.display(), error);
        }
    }
    println!(
        "{} file(s) scanned, {} patched, {} replacement(s)",
        summary.files_scanned(),
        summary.files_patched(),
        summary.total_replacements()
    );
}
