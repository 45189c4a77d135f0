use crate::changeset::ChangeSet;
use crate::constants::TIMESTAMP_FORMAT;
use crate::git::RemoteRef;
use crate::ui::plural;
use chrono::NaiveDateTime;
use num_format::{Locale, ToFormattedString};
use std::collections::BTreeMap;
use std::fmt::Write;

/// everything a report shows besides the changes themselves
pub struct ReportContext<'a> {
    pub branch: &'a str,
    pub reference: &'a RemoteRef,
    pub generated_at: NaiveDateTime,
}

/// render the Markdown sync checklist
///
/// `details` maps modified paths to their diff and adds a details section
/// when present; the output depends only on the arguments
pub fn render(
    changes: &ChangeSet,
    ctx: &ReportContext<'_>,
    details: Option<&BTreeMap<String, String>>,
) -> String {
    let target = &ctx.reference.branch;
    let total = changes.total();
    let mut report = String::new();

    let _ = write!(
        report,
        "# 📋 Sync Report: {branch} → {target}\n\n\
         **Generated:** {timestamp}\n\
         **Source branch:** `{branch}`\n\
         **Target branch:** `{reference}`\n\
         **Total changes:** {total} {files}\n\n\
         ---\n\n",
        branch = ctx.branch,
        timestamp = ctx.generated_at.format(TIMESTAMP_FORMAT),
        reference = ctx.reference,
        total = total.to_formatted_string(&Locale::en),
        files = plural(total, "file"),
    );

    if total == 0 {
        let _ = writeln!(report, "## ✨ No changes\n");
        let _ = writeln!(
            report,
            "Your branch is in sync with `{}`. There is nothing to copy.",
            ctx.reference
        );
        return report;
    }

    checklist_section(
        &mut report,
        &format!("✅ CREATE ({})", count_label(changes.added.len(), "new file")),
        &format!("These files do NOT exist on {target}. Create them:"),
        sorted_items(&changes.added),
    );
    checklist_section(
        &mut report,
        &format!(
            "🔄 UPDATE ({})",
            count_label(changes.modified.len(), "modified file")
        ),
        &format!("These files exist on {target} but have changes. Replace their contents:"),
        sorted_items(&changes.modified),
    );
    checklist_section(
        &mut report,
        &format!("❌ DELETE ({})", count_label(changes.deleted.len(), "file")),
        &format!("These files exist on {target} but were deleted on your branch:"),
        sorted_items(&changes.deleted),
    );

    let mut renamed: Vec<&(String, String)> = changes.renamed.iter().collect();
    renamed.sort();
    checklist_section(
        &mut report,
        &format!("📝 RENAME ({})", count_label(renamed.len(), "file")),
        "These files were renamed or moved:",
        renamed
            .into_iter()
            .map(|(old, new)| format!("`{old}` → `{new}`"))
            .collect(),
    );

    if let Some(details) = details
        && !details.is_empty()
    {
        let _ = writeln!(report, "## 🔍 Details\n");
        for (path, diff) in details {
            let _ = writeln!(report, "### `{path}`\n");
            let fence = fence_for(diff);
            let _ = writeln!(report, "{fence}diff\n{diff}\n{fence}\n");
        }
    }

    let _ = write!(
        report,
        "---\n\n\
         ## 📌 Next steps\n\n\
         1. **Open {target} on GitHub or in a web editor**\n\
         2. **For NEW files:** create the file and paste its contents\n\
         3. **For MODIFIED files:** open the file, select all, paste the new contents\n\
         4. **For DELETED files:** delete the file\n\
         5. **For RENAMED files:** move the file to its new path\n\
         6. **Commit with a descriptive message**\n\n"
    );

    report
}

/// "3 new files", "1 file"
fn count_label(count: usize, noun: &str) -> String {
    let (head, last) = match noun.rsplit_once(' ') {
        Some((head, last)) => (format!("{head} "), last),
        None => (String::new(), noun),
    };
    format!(
        "{} {head}{}",
        count.to_formatted_string(&Locale::en),
        plural(count, last)
    )
}

/// a backtick fence longer than any backtick run inside `content`
fn fence_for(content: &str) -> String {
    let longest = content
        .split(|c: char| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

fn sorted_items(paths: &[String]) -> Vec<String> {
    let mut sorted: Vec<&String> = paths.iter().collect();
    sorted.sort();
    sorted.into_iter().map(|path| format!("`{path}`")).collect()
}

/// append one bucket; empty buckets produce nothing
fn checklist_section(report: &mut String, title: &str, intro: &str, items: Vec<String>) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(report, "## {title}\n");
    let _ = writeln!(report, "{intro}\n");
    for item in items {
        let _ = writeln!(report, "- [ ] {item}");
    }
    let _ = writeln!(report);
}
