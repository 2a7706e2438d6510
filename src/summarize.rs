//! Budget-driven summarization of gathered context.
//!
//! Files are stable-sorted by [`score_file`], included whole while they fit,
//! and then at most one boundary file is truncated into the remaining space.
//! The result never exceeds the budget. For an [`AggregateContext`] the
//! budget is split evenly (floor division) across repositories, so up to
//! `N - 1` bytes of the total may go unused.

use crate::models::{AggregateContext, FileRecord, RepoContents, RepositoryContext};
use crate::score::score_file;

/// Appended to a truncated file's retained prefix.
pub const TRUNCATION_MARKER: &str = "\n\n... [truncated] ...\n";

/// Substituted when the remaining space cannot hold even the marker.
pub const TOO_LARGE_PLACEHOLDER: &str = "[file too large to include]";

/// A boundary file is only truncated in when at least this much room is left.
pub const MIN_TRUNCATION_BYTES: usize = 500;

/// Rough bytes-per-token ratio for estimates.
pub const BYTES_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct Summarizer {
    budget_bytes: usize,
}

impl Summarizer {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    /// Contents reduced to fit the budget; unchanged if they already fit.
    pub fn summarize_contents(&self, contents: &RepoContents) -> RepoContents {
        if contents.total_size_bytes <= self.budget_bytes {
            return contents.clone();
        }

        let mut summarized = RepoContents::default();
        for file in prioritize(&contents.files) {
            if summarized.total_size_bytes + file.size_bytes > self.budget_bytes {
                let remaining = self.budget_bytes - summarized.total_size_bytes;
                if remaining >= MIN_TRUNCATION_BYTES {
                    summarized.push(truncate_file(file, remaining));
                }
                break;
            }
            summarized.push(file.clone());
        }
        summarized
    }

    /// Aggregate with every repository summarized against an equal share.
    ///
    /// Filesystem, Nix, dotfiles and screenshot data pass through untouched.
    pub fn summarize_context(&self, ctx: &AggregateContext) -> AggregateContext {
        let mut summarized = AggregateContext {
            configured_repos: Vec::new(),
            current_repo: None,
            ..ctx.clone()
        };

        let repo_count = ctx.repository_count();
        if repo_count == 0 {
            return summarized;
        }

        let per_repo = Summarizer::new(self.budget_bytes / repo_count);
        summarized.configured_repos = ctx
            .configured_repos
            .iter()
            .map(|repo| per_repo.summarize_repo(repo))
            .collect();
        summarized.current_repo = ctx
            .current_repo
            .as_ref()
            .map(|repo| per_repo.summarize_repo(repo));
        summarized
    }

    fn summarize_repo(&self, repo: &RepositoryContext) -> RepositoryContext {
        repo.with_contents(repo.contents.as_ref().map(|c| self.summarize_contents(c)))
    }
}

/// Files ordered by descending score; equal scores keep walk order.
pub fn prioritize(files: &[FileRecord]) -> Vec<&FileRecord> {
    let mut scored: Vec<(i64, &FileRecord)> = files.iter().map(|f| (score_file(f), f)).collect();
    // sort_by is stable.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, f)| f).collect()
}

/// Fit `file` into `max_bytes`, keeping a prefix and appending the marker.
///
/// Returns the file unchanged if it already fits, and the placeholder if the
/// marker itself does not fit. The placeholder is longer than the marker, so
/// callers that need the hard bound must leave room: the summarizer only
/// truncates with at least [`MIN_TRUNCATION_BYTES`] left. The prefix is cut
/// at a UTF-8 character boundary, so the result may be a few bytes shorter
/// than `max_bytes`.
pub fn truncate_file(file: &FileRecord, max_bytes: usize) -> FileRecord {
    if file.size_bytes <= max_bytes {
        return file.clone();
    }

    let body = if max_bytes > TRUNCATION_MARKER.len() {
        let keep = floor_char_boundary(&file.content, max_bytes - TRUNCATION_MARKER.len());
        format!("{}{}", &file.content[..keep], TRUNCATION_MARKER)
    } else {
        TOO_LARGE_PLACEHOLDER.to_string()
    };

    FileRecord::new(file.absolute_path.clone(), file.relative_path.clone(), body)
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut idx = index;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

pub fn estimate_tokens(contents: &RepoContents) -> usize {
    contents.total_size_bytes / BYTES_PER_TOKEN
}

/// `"N files (B bytes, ~T tokens)"`, or an included/total breakdown with a
/// `- summarized` suffix when the summary dropped anything.
pub fn format_summary_stats(original: &RepoContents, summarized: Option<&RepoContents>) -> String {
    match summarized {
        Some(summary)
            if summary.total_size_bytes != original.total_size_bytes
                || summary.files.len() != original.total_file_count =>
        {
            format!(
                "{}/{} files ({}/{} bytes, ~{} tokens) - summarized",
                summary.files.len(),
                original.total_file_count,
                summary.total_size_bytes,
                original.total_size_bytes,
                estimate_tokens(summary)
            )
        }
        _ => format!(
            "{} files ({} bytes, ~{} tokens)",
            original.total_file_count,
            original.total_size_bytes,
            estimate_tokens(original)
        ),
    }
}
