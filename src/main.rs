mod changeset;
mod cli;
mod config;
mod constants;
mod exclude;
mod export;
mod git;
mod report;
mod ui;

use crate::changeset::ChangeSet;
use crate::cli::Cli;
use crate::config::Config;
use crate::constants::{EXIT_CHANGES_FOUND, EXIT_FAILURE, INSTRUCTIONS_FILE};
use crate::export::ExportOptions;
use crate::git::{GitCli, Project};
use crate::report::ReportContext;
use anyhow::{Context, Result};
use num_format::{Locale, ToFormattedString};
use std::fs;
use std::path::Path;

fn main() {
    match run() {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(EXIT_FAILURE);
        }
    }
}

/// returns the process exit code
fn run() -> Result<i32> {
    let cli = Cli::parse_args();

    let start = cli.root.as_deref().unwrap_or_else(|| Path::new("."));
    let project = git::discover_project(start)?;
    let config = Config::load(&project.root, cli.config.as_deref())?.with_overrides(&cli)?;
    let reference = config.reference();

    status!("working from project root: {}", project.root.display());

    let vcs = GitCli::new(&project.root, config.fetch_timeout());
    if !cli.no_fetch {
        let fetched = ui::with_spinner(&format!("fetching {reference}..."), || {
            git::refresh_reference(&vcs, &reference)
        });
        if let Err(reason) = fetched {
            warning!(
                "could not fetch {}, comparing against the local copy: {}",
                reference,
                reason
            );
        }
    }

    status!("comparing {} against {}...", project.branch, reference);
    let rules = config.exclusion_rules(&project.root);
    let changes = git::collect_changes(&vcs, &reference, &rules)?;

    let ctx = ReportContext {
        branch: &project.branch,
        reference: &reference,
        generated_at: chrono::Local::now().naive_local(),
    };

    if cli.export {
        run_export(&project, &config, &changes, &ctx, cli.include_renamed)?;
    } else {
        let details = cli
            .detailed
            .then(|| git::collect_file_diffs(&vcs, &reference, &changes.modified));
        let report = report::render(&changes, &ctx, details.as_ref());
        info!(report);

        let report_path = project.root.join(&config.report_file);
        if let Some(parent) = report_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&report_path, &report)
            .with_context(|| format!("failed to write report {}", report_path.display()))?;
        status!("report saved to: {}", report_path.display());
    }

    if changes.is_empty() {
        status!("no changes: {} is in sync with {}", project.branch, reference);
    } else {
        status!(
            "{} {} to sync",
            changes.total().to_formatted_string(&Locale::en),
            ui::plural(changes.total(), "change")
        );
    }

    if cli.exit_code && !changes.is_empty() {
        return Ok(EXIT_CHANGES_FOUND);
    }
    Ok(0)
}

/// export mode: print the instructions and snapshot the changed files
fn run_export(
    project: &Project,
    config: &Config,
    changes: &ChangeSet,
    ctx: &ReportContext<'_>,
    include_renamed: bool,
) -> Result<()> {
    let instructions = report::render(changes, ctx, None);
    info!(instructions);

    let summary = export::export_files(
        &project.root,
        changes,
        &config.export_dir,
        &instructions,
        ExportOptions { include_renamed },
    )?;

    if !include_renamed && !changes.renamed.is_empty() {
        warning!(
            "{} renamed {} not exported, pass --include-renamed to copy them",
            changes.renamed.len(),
            ui::plural(changes.renamed.len(), "file")
        );
    }
    if !summary.skipped.is_empty() {
        warning!(
            "{} {} missing from the working tree and skipped",
            summary.skipped.len(),
            ui::plural(summary.skipped.len(), "file")
        );
    }

    status!(
        "exported {} {} to: {}",
        summary.copied,
        ui::plural(summary.copied, "file"),
        summary.path.display()
    );
    status!("open {} for instructions", INSTRUCTIONS_FILE);
    Ok(())
}
