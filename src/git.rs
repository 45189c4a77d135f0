use crate::changeset::{ChangeSet, ChangeStatus, DiffEntry};
use crate::exclude::{ExclusionRule, is_excluded};
use crate::{detail, warning};
use anyhow::{Context, Result, bail};
use git2::{ErrorCode, Repository};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// the branch changes are compared against, e.g. `origin/main`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub remote: String,
    pub branch: String,
}

impl RemoteRef {
    pub fn new(remote: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            branch: branch.into(),
        }
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.remote, self.branch)
    }
}

/// the working tree being reported on
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub branch: String,
}

/// locate the repository work tree containing `start` and its current branch
pub fn discover_project(start: &Path) -> Result<Project> {
    let repo = Repository::discover(start)
        .with_context(|| format!("not in a git repository: {}", start.display()))?;
    let root = repo
        .workdir()
        .context("repository has no working tree")?
        .to_path_buf();
    let branch = current_branch(&repo)?;
    Ok(Project { root, branch })
}

fn current_branch(repo: &Repository) -> Result<String> {
    match repo.head() {
        Ok(head) if head.is_branch() => Ok(head.shorthand().unwrap_or("HEAD").to_string()),
        // detached
        Ok(_) => Ok("HEAD".to_string()),
        // no commits yet, HEAD still names the branch it will create
        Err(e) if e.code() == ErrorCode::UnbornBranch => {
            let head = repo
                .find_reference("HEAD")
                .context("failed to read HEAD")?;
            Ok(head
                .symbolic_target()
                .and_then(|target| target.strip_prefix("refs/heads/"))
                .unwrap_or("HEAD")
                .to_string())
        }
        Err(e) => Err(e).context("failed to read HEAD"),
    }
}

/// captured result of one external vcs invocation
#[derive(Debug, Clone, Default)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// the external version-control calls a run needs
///
/// an `Err` means the tool could not be run at all; a tool that ran and
/// failed reports `success: false`
pub trait Vcs {
    fn fetch(&self, reference: &RemoteRef) -> Result<GitOutput>;
    fn diff_name_status(&self, reference: &RemoteRef) -> Result<GitOutput>;
    fn diff_file(&self, reference: &RemoteRef, path: &str) -> Result<GitOutput>;
}

/// `Vcs` backed by the git binary, always run inside the project root
pub struct GitCli {
    root: PathBuf,
    fetch_timeout: Duration,
}

impl GitCli {
    pub fn new(root: &Path, fetch_timeout: Duration) -> Self {
        Self {
            root: root.to_path_buf(),
            fetch_timeout,
        }
    }

    fn run(&self, args: &[&str], timeout: Option<Duration>) -> Result<GitOutput> {
        let mut child = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            // never block on a credential prompt
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to run git {}", args.join(" ")))?;

        // drain both pipes while waiting so a large diff can't fill them
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match timeout {
            Some(timeout) => match child
                .wait_timeout(timeout)
                .context("failed to wait for git")?
            {
                Some(status) => status,
                None => {
                    if let Err(e) = child.kill() {
                        warning!("failed to kill git process: {}", e);
                    }
                    let _ = child.wait();
                    bail!(
                        "git {} timed out after {}s",
                        args.first().unwrap_or(&""),
                        timeout.as_secs()
                    );
                }
            },
            None => child.wait().context("failed to wait for git")?,
        };

        Ok(GitOutput {
            success: status.success(),
            stdout: joined(stdout),
            stderr: joined(stderr),
        })
    }
}

impl Vcs for GitCli {
    fn fetch(&self, reference: &RemoteRef) -> Result<GitOutput> {
        self.run(
            &["fetch", &reference.remote, &reference.branch],
            Some(self.fetch_timeout),
        )
    }

    fn diff_name_status(&self, reference: &RemoteRef) -> Result<GitOutput> {
        let reference = reference.to_string();
        self.run(
            // -z keeps paths verbatim; without it git C-quotes names with
            // quotes, backslashes or control characters
            &[
                "-c",
                "core.quotePath=false",
                "diff",
                "--name-status",
                "--find-renames",
                "-z",
                &reference,
                "--",
            ],
            None,
        )
    }

    fn diff_file(&self, reference: &RemoteRef, path: &str) -> Result<GitOutput> {
        let reference = reference.to_string();
        self.run(
            &[
                "-c",
                "core.quotePath=false",
                "--literal-pathspecs",
                "diff",
                &reference,
                "--",
                path,
            ],
            None,
        )
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn joined(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// update the local copy of the reference branch from its remote
///
/// never fatal: returns the reason on failure so the caller can warn and
/// carry on with whatever state the reference already has locally
pub fn refresh_reference(vcs: &dyn Vcs, reference: &RemoteRef) -> Result<(), String> {
    match vcs.fetch(reference) {
        Ok(output) if output.success => Ok(()),
        Ok(output) => Err(output
            .stderr
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("git fetch failed")
            .to_string()),
        Err(e) => Err(format!("{e:#}")),
    }
}

/// diff the working tree against `reference` and bucket the changed paths
///
/// a diff that runs but fails is reported as no changes; only failing to run
/// git at all is an error
pub fn collect_changes(
    vcs: &dyn Vcs,
    reference: &RemoteRef,
    rules: &[ExclusionRule],
) -> Result<ChangeSet> {
    let output = vcs
        .diff_name_status(reference)
        .context("failed to access git")?;

    if !output.success {
        warning!("git diff against {} failed, reporting no changes", reference);
        for line in output.stderr.lines().filter(|line| !line.trim().is_empty()) {
            detail!("  {}", line);
        }
        return Ok(ChangeSet::default());
    }

    let entries = parse_name_status(&output.stdout)
        .into_iter()
        .filter(|entry| {
            // renames are checked by their new path
            if is_excluded(rules, &entry.path) {
                return false;
            }
            match entry.status {
                ChangeStatus::Unclassified(code) => {
                    warning!("ignoring {} with unsupported status '{}'", entry.path, code);
                    return false;
                }
                ChangeStatus::Renamed {
                    similarity: Some(similarity),
                } if similarity < 100 => {
                    detail!("{} was renamed with {}% similarity", entry.path, similarity);
                }
                _ => {}
            }
            true
        });

    Ok(ChangeSet::from_entries(entries))
}

/// parse `git diff --name-status -z` output
///
/// records are NUL separated: a status code, then one path, or two for
/// renames and copies. empty fields between records are skipped
pub fn parse_name_status(output: &str) -> Vec<DiffEntry> {
    let mut entries = Vec::new();
    let mut fields = output.split('\0');

    while let Some(code) = fields.next() {
        let code = code.trim();
        let Some(status) = ChangeStatus::parse(code) else {
            continue;
        };
        let path_count = if code.starts_with(['R', 'C']) { 2 } else { 1 };
        let paths: Vec<&str> = fields
            .by_ref()
            .take(path_count)
            .filter(|path| !path.is_empty())
            .collect();

        let (old_path, path) = match paths.as_slice() {
            [path] if path_count == 1 => (None, *path),
            [old_path, new_path] => (Some((*old_path).to_string()), *new_path),
            _ => {
                warning!("skipping diff record '{}' without its paths", code);
                continue;
            }
        };

        entries.push(DiffEntry {
            status,
            path: path.to_string(),
            old_path,
        });
    }

    entries
}

/// per-file diffs for the detailed report, keyed by path
///
/// files whose diff can't be produced are left out
pub fn collect_file_diffs(
    vcs: &dyn Vcs,
    reference: &RemoteRef,
    paths: &[String],
) -> BTreeMap<String, String> {
    let mut diffs = BTreeMap::new();

    for path in paths {
        match vcs.diff_file(reference, path) {
            Ok(output) if output.success && !output.stdout.trim().is_empty() => {
                diffs.insert(path.clone(), output.stdout.trim_end().to_string());
            }
            Ok(_) => detail!("no diff available for {}", path),
            Err(e) => detail!("no diff available for {}: {:#}", path, e),
        }
    }

    diffs
}
