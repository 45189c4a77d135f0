use clap::Parser;
use std::path::PathBuf;

/// git-sync-report: list the files a branch changes against a reference
/// branch as a Markdown checklist, optionally exporting them
#[derive(Parser, Debug)]
#[command(name = "git-sync-report", about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// copy added and modified files into the export directory
    /// (the directory is deleted and recreated on every export)
    #[arg(long)]
    pub export: bool,

    /// include per-file diffs of modified files in the printed report
    #[arg(long, conflicts_with = "export")]
    pub detailed: bool,

    /// skip fetching the reference branch before diffing
    #[arg(long)]
    pub no_fetch: bool,

    /// remote holding the reference branch [default: origin]
    #[arg(long)]
    pub remote: Option<String>,

    /// reference branch to compare against [default: main]
    #[arg(long)]
    pub branch: Option<String>,

    /// extra exclusion pattern: `dir/`, `*suffix`, `prefix*` or an exact file name
    #[arg(long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// report file, relative to the project root [default: SYNC_REPORT.md]
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// export directory, relative to the project root [default: sync-export]
    #[arg(long, value_name = "PATH")]
    pub export_dir: Option<PathBuf>,

    /// also export the new path of renamed files
    #[arg(long, requires = "export")]
    pub include_renamed: bool,

    /// seconds to wait for the fetch before carrying on without it [default: 60]
    #[arg(long, value_name = "SECS")]
    pub fetch_timeout: Option<u64>,

    /// directory inside the repository to run from [default: .]
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// config file, relative to the project root [default: .sync-report.json]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// exit with status 2 when there are changes to sync
    #[arg(long)]
    pub exit_code: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
