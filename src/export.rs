use crate::changeset::ChangeSet;
use crate::constants::INSTRUCTIONS_FILE;
use crate::detail;
use anyhow::{Context, Result, bail};
use git2::Repository;
use std::fs::{self, File, FileTimes};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Default, Clone, Copy)]
pub struct ExportOptions {
    /// also copy the new path of renamed files
    pub include_renamed: bool,
}

/// what an export produced
#[derive(Debug)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub copied: usize,
    pub skipped: Vec<String>,
}

/// snapshot added and modified files into `export_dir` next to `instructions`
///
/// DESTRUCTIVE: whatever already exists at `export_dir` is deleted first and
/// nothing from a previous export survives. a relative `export_dir` is taken
/// from `root`. files that vanished since the diff are skipped; any other
/// filesystem error aborts the export, leaving it half written
pub fn export_files(
    root: &Path,
    changes: &ChangeSet,
    export_dir: &Path,
    instructions: &str,
    options: ExportOptions,
) -> Result<ExportSummary> {
    let export_path = root.join(export_dir);
    guard_export_path(root, &export_path)?;

    if export_path.exists() {
        fs::remove_dir_all(&export_path).with_context(|| {
            format!(
                "failed to remove previous export {}",
                export_path.display()
            )
        })?;
    }
    fs::create_dir_all(&export_path)
        .with_context(|| format!("failed to create {}", export_path.display()))?;

    let mut paths: Vec<&String> = changes.added.iter().chain(&changes.modified).collect();
    if options.include_renamed {
        paths.extend(changes.renamed.iter().map(|(_, new_path)| new_path));
    }

    let mut copied = 0;
    let mut skipped = Vec::new();
    for path in paths {
        let src = root.join(path);
        if !src.is_file() {
            detail!("skipping {} (not in working tree)", path);
            skipped.push(path.clone());
            continue;
        }
        copy_preserving_times(&src, &export_path.join(path))?;
        copied += 1;
    }

    let instructions_path = export_path.join(INSTRUCTIONS_FILE);
    fs::write(&instructions_path, instructions)
        .with_context(|| format!("failed to write {}", instructions_path.display()))?;

    Ok(ExportSummary {
        path: export_path,
        copied,
        skipped,
    })
}

/// refuse to wipe the project itself, anything above it, or the repository's
/// git directory
fn guard_export_path(root: &Path, export_path: &Path) -> Result<()> {
    let root = root
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", root.display()))?;
    let export_path_resolved = resolve(export_path);

    if root.starts_with(&export_path_resolved) {
        bail!(
            "refusing to export into {}: it contains the project root",
            export_path.display()
        );
    }

    if let Ok(repo) = Repository::discover(&root)
        && export_path_resolved.starts_with(resolve(repo.path()))
    {
        bail!(
            "refusing to export into {}: it is inside the git directory",
            export_path.display()
        );
    }
    Ok(())
}

/// lexically drop `.` and `..`, then resolve symlinks through the deepest
/// part of the path that exists
fn resolve(path: &Path) -> PathBuf {
    let mut lexical = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other),
        }
    }

    let mut existing = lexical.as_path();
    let mut missing = Vec::new();
    while let Some(name) = existing.file_name() {
        if let Ok(canonical) = existing.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(canonical, |resolved, name| resolved.join(name));
        }
        missing.push(name.to_os_string());
        match existing.parent() {
            Some(parent) => existing = parent,
            None => break,
        }
    }
    lexical.canonicalize().unwrap_or(lexical)
}

/// copy contents and permissions, then carry over access/modification times
fn copy_preserving_times(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::copy(src, dest).with_context(|| format!("failed to copy {}", src.display()))?;

    let metadata = fs::metadata(src)
        .with_context(|| format!("failed to read metadata of {}", src.display()))?;
    let mut times = FileTimes::new();
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    // some platforms or filesystems can't set times; the copy itself stands
    if let Ok(file) = File::options().write(true).open(dest) {
        let _ = file.set_times(times);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write(root: &Path, path: &str, content: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// sorted relative paths of every file under `dir`
    fn list_files(dir: &Path) -> Vec<String> {
        fn walk(base: &Path, dir: &Path, files: &mut Vec<String>) {
            for entry in fs::read_dir(dir).unwrap().flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(base, &path, files);
                } else {
                    let relative = path.strip_prefix(base).unwrap();
                    files.push(relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        let mut files = Vec::new();
        walk(dir, dir, &mut files);
        files.sort();
        files
    }

    fn changes(added: &[&str], modified: &[&str]) -> ChangeSet {
        ChangeSet {
            added: added.iter().map(|p| p.to_string()).collect(),
            modified: modified.iter().map(|p| p.to_string()).collect(),
            ..ChangeSet::default()
        }
    }

    #[test]
    fn test_export_copies_added_and_modified() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a.ts", "export const a = 1;");
        write(root, "src/deep/b.ts", "export const b = 2;");

        let summary = export_files(
            root,
            &changes(&["a.ts"], &["src/deep/b.ts"]),
            Path::new("sync-export"),
            "# instructions",
            ExportOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.path, root.join("sync-export"));
        assert_eq!(summary.copied, 2);
        assert_eq!(
            list_files(&summary.path),
            vec!["SYNC_INSTRUCTIONS.md", "a.ts", "src/deep/b.ts"]
        );
        assert_eq!(
            fs::read_to_string(summary.path.join("src/deep/b.ts")).unwrap(),
            "export const b = 2;"
        );
        assert_eq!(
            fs::read_to_string(summary.path.join(INSTRUCTIONS_FILE)).unwrap(),
            "# instructions"
        );
    }

    #[test]
    fn test_export_replaces_stale_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a.ts", "a");
        write(root, "b.ts", "b");
        write(root, "sync-export/stale.ts", "from a previous run");
        write(root, "sync-export/old/nested.ts", "from a previous run");

        let summary = export_files(
            root,
            &changes(&["a.ts"], &["b.ts"]),
            Path::new("sync-export"),
            "",
            ExportOptions::default(),
        )
        .unwrap();

        assert_eq!(
            list_files(&summary.path),
            vec!["SYNC_INSTRUCTIONS.md", "a.ts", "b.ts"]
        );
    }

    #[test]
    fn test_export_skips_missing_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "b.ts", "b");

        let summary = export_files(
            root,
            &changes(&["gone.ts"], &["b.ts"]),
            Path::new("sync-export"),
            "",
            ExportOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.copied, 1);
        assert_eq!(summary.skipped, vec!["gone.ts"]);
        assert_eq!(
            list_files(&summary.path),
            vec!["SYNC_INSTRUCTIONS.md", "b.ts"]
        );
    }

    #[test]
    fn test_export_renamed_only_when_asked() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "lib/new.ts", "moved");
        let changes = ChangeSet {
            renamed: vec![("src/old.ts".into(), "lib/new.ts".into())],
            deleted: vec!["src/removed.ts".into()],
            ..ChangeSet::default()
        };

        let summary = export_files(
            root,
            &changes,
            Path::new("out"),
            "",
            ExportOptions::default(),
        )
        .unwrap();
        assert_eq!(list_files(&summary.path), vec!["SYNC_INSTRUCTIONS.md"]);

        let summary = export_files(
            root,
            &changes,
            Path::new("out"),
            "",
            ExportOptions {
                include_renamed: true,
            },
        )
        .unwrap();
        assert_eq!(
            list_files(&summary.path),
            vec!["SYNC_INSTRUCTIONS.md", "lib/new.ts"]
        );
    }

    #[test]
    fn test_export_preserves_modification_time() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a.ts", "a");
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        File::options()
            .write(true)
            .open(root.join("a.ts"))
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        let summary = export_files(
            root,
            &changes(&["a.ts"], &[]),
            Path::new("sync-export"),
            "",
            ExportOptions::default(),
        )
        .unwrap();

        let copied = fs::metadata(summary.path.join("a.ts")).unwrap();
        assert_eq!(copied.modified().unwrap(), mtime);
    }

    #[test]
    fn test_export_refuses_project_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a.ts", "a");

        for export_dir in [Path::new("."), Path::new(""), Path::new("sub/..")] {
            let result = export_files(
                root,
                &changes(&["a.ts"], &[]),
                export_dir,
                "",
                ExportOptions::default(),
            );
            assert!(result.is_err(), "{} should be refused", export_dir.display());
        }
        assert!(root.join("a.ts").exists(), "project files survive");
    }

    #[test]
    fn test_export_refuses_git_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        Repository::init(root).unwrap();
        write(root, "a.ts", "a");

        for export_dir in [".git", ".git/sync-export", "sub/../.git/objects"] {
            let result = export_files(
                root,
                &changes(&["a.ts"], &[]),
                Path::new(export_dir),
                "",
                ExportOptions::default(),
            );
            assert!(result.is_err(), "{export_dir} should be refused");
        }
        assert!(root.join(".git/HEAD").is_file(), "repository survives");
        assert!(Repository::open(root).is_ok());

        // a sibling whose name merely starts with .git is fine
        let summary = export_files(
            root,
            &changes(&["a.ts"], &[]),
            Path::new(".github-export"),
            "",
            ExportOptions::default(),
        )
        .unwrap();
        assert_eq!(summary.copied, 1);
    }
}
