/// change classification taken from the first letter of a name-status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed { similarity: Option<u8> }, // R100, R087, ...
    /// anything else git may emit (copies, type changes, unmerged); never bucketed
    Unclassified(char),
}

impl ChangeStatus {
    pub fn parse(code: &str) -> Option<Self> {
        let mut chars = code.chars();
        let status = match chars.next()? {
            'A' => Self::Added,
            'M' => Self::Modified,
            'D' => Self::Deleted,
            'R' => Self::Renamed {
                similarity: chars.as_str().parse().ok(),
            },
            other => Self::Unclassified(other),
        };
        Some(status)
    }
}

/// a single parsed line of `git diff --name-status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub status: ChangeStatus,
    pub path: String,
    pub old_path: Option<String>, // set for renames
}

/// changed paths bucketed by kind, built once per run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    pub renamed: Vec<(String, String)>, // (old, new)
}

impl ChangeSet {
    /// bucket entries, dropping unclassified ones
    ///
    /// callers are expected to have applied exclusion rules already
    pub fn from_entries(entries: impl IntoIterator<Item = DiffEntry>) -> Self {
        let mut changes = Self::default();
        for entry in entries {
            match entry.status {
                ChangeStatus::Added => changes.added.push(entry.path),
                ChangeStatus::Modified => changes.modified.push(entry.path),
                ChangeStatus::Deleted => changes.deleted.push(entry.path),
                ChangeStatus::Renamed { .. } => {
                    // a rename line without an old path is treated as an addition
                    match entry.old_path {
                        Some(old_path) => changes.renamed.push((old_path, entry.path)),
                        None => changes.added.push(entry.path),
                    }
                }
                ChangeStatus::Unclassified(_) => {}
            }
        }
        changes
    }

    /// total number of changes, a rename pair counts once
    pub fn total(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len() + self.renamed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
