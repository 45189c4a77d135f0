use crate::cli::Cli;
use crate::constants::{
    CONFIG_FILE, DEFAULT_BRANCH, DEFAULT_REMOTE, EXPORT_DIR, FETCH_TIMEOUT_SECS, REPORT_FILE,
};
use crate::exclude::{ExclusionRule, default_rules};
use crate::git::RemoteRef;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// run settings: built-in defaults, then `.sync-report.json`, then flags
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub remote: String,
    pub branch: String,
    /// replaces the built-in rules when present
    pub exclude: Vec<ExclusionRule>,
    /// relative paths are taken from the project root
    pub report_file: PathBuf,
    pub export_dir: PathBuf,
    pub fetch_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: DEFAULT_REMOTE.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            exclude: default_rules(),
            report_file: PathBuf::from(REPORT_FILE),
            export_dir: PathBuf::from(EXPORT_DIR),
            fetch_timeout_secs: FETCH_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// read `path`, or the project's config file if it exists
    ///
    /// an explicit path must exist; a missing project file means defaults
    pub fn load(root: &Path, path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (root.join(path), true),
            None => (root.join(CONFIG_FILE), false),
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    /// apply command-line overrides on top of the loaded file
    pub fn with_overrides(mut self, cli: &Cli) -> Result<Self> {
        if let Some(remote) = &cli.remote {
            self.remote.clone_from(remote);
        }
        if let Some(branch) = &cli.branch {
            self.branch.clone_from(branch);
        }
        for pattern in &cli.exclude {
            let rule = pattern
                .parse::<ExclusionRule>()
                .with_context(|| format!("invalid --exclude pattern '{pattern}'"))?;
            self.exclude.push(rule);
        }
        if let Some(output) = &cli.output {
            self.report_file.clone_from(output);
        }
        if let Some(export_dir) = &cli.export_dir {
            self.export_dir.clone_from(export_dir);
        }
        if let Some(timeout) = cli.fetch_timeout {
            self.fetch_timeout_secs = timeout;
        }
        Ok(self)
    }

    /// the configured rules plus one for the report file itself, so a
    /// committed report never lists itself
    pub fn exclusion_rules(&self, root: &Path) -> Vec<ExclusionRule> {
        let mut rules = self.exclude.clone();
        if let Some(report) = relative_slash_path(root, &self.report_file) {
            let rule = ExclusionRule::Path(report);
            if !rules.contains(&rule) {
                rules.push(rule);
            }
        }
        rules
    }

    pub fn reference(&self) -> RemoteRef {
        RemoteRef::new(&self.remote, &self.branch)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// `path` as git prints it: relative to `root` and slash separated
///
/// `None` when the path is outside the root or not valid UTF-8
fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = if path.is_absolute() {
        path.strip_prefix(root).ok()?
    } else {
        path
    };

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}
