//! Plain-text rendering of commit diffs and notification messages

use std::fmt::Write as _;

use crate::github::FileChange;
use crate::notify::NotificationMessage;
use crate::utils::truncate_chars;
use crate::webhook::CommitSummary;

pub const NO_FILE_CHANGES: &str = "No file changes";
pub const DIFF_UNAVAILABLE: &str = "Error fetching diff";

/// SNS rejects subjects of 100 characters or more.
pub const MAX_SUBJECT_CHARS: usize = 99;

/// Bounds on how much of a diff ends up in a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffLimits {
    /// Files rendered before the remainder is summarised
    pub max_files: usize,
    /// Patches this long or longer are left out
    pub max_patch_chars: usize,
}

impl Default for DiffLimits {
    fn default() -> Self {
        Self {
            max_files: 5,
            max_patch_chars: 1000,
        }
    }
}

/// Renders the first `limits.max_files` changes, one block per file.
pub fn format_diff(files: &[FileChange], limits: DiffLimits) -> String {
    if files.is_empty() {
        return NO_FILE_CHANGES.to_string();
    }

    let shown = files.len().min(limits.max_files);
    let mut blocks: Vec<String> = files[..shown]
        .iter()
        .map(|file| format_file(file, limits.max_patch_chars))
        .collect();

    let remaining = files.len() - shown;
    if remaining > 0 {
        blocks.push(format!("... and {} more files", remaining));
    }

    blocks.join("\n\n")
}

fn format_file(file: &FileChange, max_patch_chars: usize) -> String {
    let mut block = String::new();
    let _ = writeln!(block, "File: {}", file.filename);
    let _ = writeln!(block, "Status: {}", file.status);
    let _ = write!(block, "Changes: +{} -{}", file.additions, file.deletions);

    match file.patch.as_deref() {
        Some(patch) if !patch.is_empty() && patch.chars().count() < max_patch_chars => {
            let _ = write!(block, "\nPatch:\n{}", patch.trim_end());
        }
        Some(patch) if !patch.is_empty() => {
            block.push_str("\nPatch omitted (too large)");
        }
        _ => {}
    }

    block
}

/// Everything the message body is built from
#[derive(Debug, Clone, Copy)]
pub struct NotificationContext<'a> {
    pub repository: &'a str,
    pub environment: &'a str,
    pub branch: Option<&'a str>,
    pub commit: &'a CommitSummary,
    pub total_commits: usize,
    pub diff_text: &'a str,
}

pub fn build_notification(ctx: &NotificationContext<'_>) -> NotificationMessage {
    NotificationMessage {
        subject: build_subject(ctx.environment, ctx.repository, &ctx.commit.message),
        message: build_body(ctx),
    }
}

/// `[env] owner/repo: first line of the message`, single line, SNS-safe length.
pub fn build_subject(environment: &str, repository: &str, commit_message: &str) -> String {
    let headline = commit_message.lines().next().unwrap_or("").trim();
    let raw = if headline.is_empty() {
        format!("[{}] New commit in {}", environment, repository)
    } else {
        format!("[{}] {}: {}", environment, repository, headline)
    };
    let single_line: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    truncate_chars(&single_line, MAX_SUBJECT_CHARS)
}

fn build_body(ctx: &NotificationContext<'_>) -> String {
    let commit = ctx.commit;
    let mut body = String::new();
    let _ = writeln!(body, "Repository: {}", ctx.repository);
    let _ = writeln!(body, "Environment: {}", ctx.environment);
    if let Some(branch) = ctx.branch {
        let _ = writeln!(body, "Branch: {}", branch);
    }
    let _ = writeln!(body, "Commit: {}", commit.id);
    let _ = writeln!(body, "Author: {}", commit.author_name().unwrap_or("Unknown"));
    if let Some(timestamp) = commit.timestamp.as_deref() {
        let _ = writeln!(body, "Date: {}", timestamp);
    }
    if let Some(url) = commit.url.as_deref() {
        let _ = writeln!(body, "URL: {}", url);
    }
    if ctx.total_commits > 1 {
        let _ = writeln!(
            body,
            "Commits in push: {} (showing the most recent)",
            ctx.total_commits
        );
    }
    let _ = writeln!(body);
    let _ = writeln!(body, "Message:");
    let _ = writeln!(body, "{}", commit.message.trim_end());
    let _ = writeln!(body);
    let _ = writeln!(body, "Changes:");
    let _ = write!(body, "{}", ctx.diff_text);
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::FileStatus;
    use crate::webhook::CommitAuthor;

    fn change(name: &str, patch: Option<&str>) -> FileChange {
        FileChange {
            filename: name.to_string(),
            status: FileStatus::Modified,
            additions: 3,
            deletions: 1,
            patch: patch.map(str::to_string),
        }
    }

    fn commit(message: &str) -> CommitSummary {
        CommitSummary {
            id: "6dcb09b5b57875f334f61aebed695e2e4193db5e".to_string(),
            message: message.to_string(),
            author: Some(CommitAuthor {
                name: Some("Ada Lovelace".to_string()),
                email: None,
            }),
            timestamp: Some("2024-05-01T10:00:00Z".to_string()),
            url: Some("https://github.com/octo/widgets/commit/6dcb09b".to_string()),
        }
    }

    #[test]
    fn empty_diff_is_fixed_text() {
        assert_eq!(format_diff(&[], DiffLimits::default()), NO_FILE_CHANGES);
    }

    #[test]
    fn renders_each_file_block() {
        let files = [
            change("src/main.rs", Some("@@ -1 +1 @@\n-a\n+b\n")),
            change("Cargo.toml", None),
        ];
        let out = format_diff(&files, DiffLimits::default());
        assert_eq!(
            out,
            "File: src/main.rs\nStatus: modified\nChanges: +3 -1\nPatch:\n@@ -1 +1 @@\n-a\n+b\
             \n\nFile: Cargo.toml\nStatus: modified\nChanges: +3 -1"
        );
    }

    #[test]
    fn long_patches_are_left_out() {
        let limits = DiffLimits { max_files: 5, max_patch_chars: 10 };
        let out = format_diff(&[change("big.rs", Some("0123456789"))], limits);
        assert!(!out.contains("0123456789"));
        assert!(out.ends_with("Patch omitted (too large)"));

        let out = format_diff(&[change("small.rs", Some("012345678"))], limits);
        assert!(out.contains("012345678"));
    }

    #[test]
    fn remainder_is_counted_past_the_cap() {
        let files: Vec<FileChange> = (0..8).map(|i| change(&format!("f{}.rs", i), None)).collect();
        let out = format_diff(&files, DiffLimits::default());
        assert!(out.ends_with("... and 3 more files"));
        assert!(out.contains("f4.rs"));
        assert!(!out.contains("f5.rs"));

        let limits = DiffLimits { max_files: 10, max_patch_chars: 1000 };
        let files: Vec<FileChange> = (0..12).map(|i| change(&format!("f{}.rs", i), None)).collect();
        assert!(format_diff(&files, limits).ends_with("... and 2 more files"));
    }

    #[test]
    fn exactly_cap_files_has_no_remainder_line() {
        let files: Vec<FileChange> = (0..5).map(|i| change(&format!("f{}.rs", i), None)).collect();
        assert!(!format_diff(&files, DiffLimits::default()).contains("more files"));
    }

    #[test]
    fn formatting_is_deterministic() {
        let files: Vec<FileChange> = (0..7)
            .map(|i| change(&format!("f{}.rs", i), Some("+x")))
            .collect();
        assert_eq!(
            format_diff(&files, DiffLimits::default()),
            format_diff(&files, DiffLimits::default())
        );
    }

    #[test]
    fn subject_uses_first_line_and_fits_sns() {
        let subject = build_subject("prod", "octo/widgets", "Fix parser\n\nLong explanation");
        assert_eq!(subject, "[prod] octo/widgets: Fix parser");

        let subject = build_subject("prod", "octo/widgets", &"x".repeat(300));
        assert_eq!(subject.chars().count(), MAX_SUBJECT_CHARS);
        assert!(subject.ends_with("..."));

        let subject = build_subject("dev", "octo/widgets", "");
        assert_eq!(subject, "[dev] New commit in octo/widgets");

        assert!(!build_subject("dev", "octo/widgets", "tab\there").contains('\t'));
    }

    #[test]
    fn body_embeds_commit_metadata_and_diff() {
        let commit = commit("Fix parser\n\nDetails");
        let msg = build_notification(&NotificationContext {
            repository: "octo/widgets",
            environment: "staging",
            branch: Some("main"),
            commit: &commit,
            total_commits: 3,
            diff_text: "File: a.rs",
        });

        assert_eq!(msg.subject, "[staging] octo/widgets: Fix parser");
        for expected in [
            "Repository: octo/widgets",
            "Environment: staging",
            "Branch: main",
            "Commit: 6dcb09b5b57875f334f61aebed695e2e4193db5e",
            "Author: Ada Lovelace",
            "Date: 2024-05-01T10:00:00Z",
            "Commits in push: 3",
            "Fix parser\n\nDetails",
            "Changes:\nFile: a.rs",
        ] {
            assert!(msg.message.contains(expected), "missing {:?} in {}", expected, msg.message);
        }
    }

    #[test]
    fn missing_author_reads_unknown() {
        let mut commit = commit("msg");
        commit.author = None;
        let msg = build_notification(&NotificationContext {
            repository: "octo/widgets",
            environment: "dev",
            branch: None,
            commit: &commit,
            total_commits: 1,
            diff_text: DIFF_UNAVAILABLE,
        });
        assert!(msg.message.contains("Author: Unknown"));
        assert!(!msg.message.contains("Commits in push"));
        assert!(msg.message.ends_with(DIFF_UNAVAILABLE));
    }
}
