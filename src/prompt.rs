//! Flat-text rendering of an [`AggregateContext`] for a language-model query.
//!
//! Repository sections are headed by source, remote, and path; every file
//! is wrapped in a fenced block long enough not to collide with backtick
//! runs inside the file.

use crate::models::{AggregateContext, RepositoryContext};

pub const DEFAULT_PREAMBLE: &str = "You are a concise CLI assistant. Answer from the \
context below. Cite values as `value` (file:line) when you can.";

/// Render the full prompt: preamble, repositories, filesystem, then the query.
pub fn render_prompt(preamble: &str, query: &str, ctx: &AggregateContext) -> String {
    let mut out = String::new();
    out.push_str(preamble);
    out.push_str("\n\n");

    if !ctx.configured_repos.is_empty() {
        out.push_str("## Configured Repositories\n\n");
        for repo in &ctx.configured_repos {
            out.push_str(&format!(
                "### Repository: {} ({})\n",
                repo.source,
                repo.origin.as_str()
            ));
            write_repo(&mut out, repo);
            out.push('\n');
        }
    }

    if let Some(repo) = &ctx.current_repo {
        out.push_str("## Current Repository\n");
        write_repo(&mut out, repo);
        out.push('\n');
    }

    if let Some(fs) = &ctx.filesystem {
        out.push_str("## Filesystem Context\n");
        out.push_str(&format!("Current Directory: {}\n", fs.current_dir.display()));
        if !fs.files.is_empty() {
            out.push_str(&format!("Entries: {}\n", fs.files.join(", ")));
        }
        out.push('\n');
    }

    out.push_str("## User Query\n");
    out.push_str(query);
    out.push('\n');
    out
}

fn write_repo(out: &mut String, repo: &RepositoryContext) {
    if let Some(remote) = &repo.remote {
        out.push_str(&format!("Remote: {}\n", remote));
    }
    out.push_str(&format!("Path: {}\n", repo.path.display()));

    let Some(contents) = &repo.contents else {
        return;
    };
    out.push_str(&format!(
        "\n**Files: {} files, {} bytes total**\n\n",
        contents.total_file_count, contents.total_size_bytes
    ));
    for file in &contents.files {
        let fence = fence_for(&file.content);
        out.push_str(&format!("#### File: {}\n", file.relative_path));
        out.push_str(&fence);
        out.push('\n');
        out.push_str(&file.content);
        if !file.content.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&fence);
        out.push_str("\n\n");
    }
}

/// Backtick fence one longer than the longest run in `content`, minimum 3.
fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

/// Approximate in-memory size of the gathered text.
pub fn context_size_bytes(ctx: &AggregateContext) -> usize {
    let repos: usize = ctx
        .configured_repos
        .iter()
        .chain(ctx.current_repo.iter())
        .map(repo_size_bytes)
        .sum();
    let filesystem = ctx.filesystem.as_ref().map_or(0, |fs| {
        fs.current_dir.as_os_str().len()
            + fs.parent_dirs.iter().map(|p| p.as_os_str().len()).sum::<usize>()
            + fs.files.iter().map(String::len).sum::<usize>()
    });
    repos + filesystem
}

fn repo_size_bytes(repo: &RepositoryContext) -> usize {
    let header = repo.source.len()
        + repo.path.as_os_str().len()
        + repo.remote.as_ref().map_or(0, String::len);
    let files = repo.contents.as_ref().map_or(0, |c| {
        c.files
            .iter()
            .map(|f| f.relative_path.len() + f.size_bytes)
            .sum()
    });
    header + files
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    match bytes {
        b if b >= GB => format!("{:.2} GB ({} bytes)", b as f64 / GB as f64, b),
        b if b >= MB => format!("{:.2} MB ({} bytes)", b as f64 / MB as f64, b),
        b if b >= KB => format!("{:.2} KB ({} bytes)", b as f64 / KB as f64, b),
        b => format!("{} bytes", b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileRecord, FilesystemContext, RepoContents, RepositoryDescriptor};
    use chrono::Utc;
    use std::path::PathBuf;

    fn sample() -> AggregateContext {
        let mut ctx = AggregateContext::new(Utc::now());
        ctx.configured_repos.push(RepositoryContext::from_descriptor(
            &RepositoryDescriptor::remote("https://example.com/me/dots.git"),
            PathBuf::from("/cache/dots"),
            Some("https://example.com/me/dots.git".to_string()),
            Some(RepoContents::from_files(vec![FileRecord::new(
                "/cache/dots/.tmux.conf",
                ".tmux.conf",
                "set -g prefix C-a",
            )])),
        ));
        ctx.current_repo = Some(RepositoryContext::current(PathBuf::from("/work"), None, None));
        ctx.filesystem = Some(FilesystemContext {
            current_dir: PathBuf::from("/work/src"),
            parent_dirs: vec![PathBuf::from("/work"), PathBuf::from("/")],
            files: vec!["main.rs".to_string()],
        });
        ctx
    }

    #[test]
    fn test_render_sections_in_order() {
        let prompt = render_prompt("PRE", "what is my tmux prefix?", &sample());
        let expected_order = [
            "PRE\n\n",
            "## Configured Repositories",
            "### Repository: https://example.com/me/dots.git (remote)",
            "Remote: https://example.com/me/dots.git",
            "Path: /cache/dots",
            "**Files: 1 files, 17 bytes total**",
            "#### File: .tmux.conf\n```\nset -g prefix C-a\n```\n",
            "## Current Repository\nPath: /work\n",
            "## Filesystem Context\nCurrent Directory: /work/src\nEntries: main.rs\n",
            "## User Query\nwhat is my tmux prefix?\n",
        ];
        let mut cursor = 0;
        for needle in expected_order {
            let found = prompt[cursor..]
                .find(needle)
                .unwrap_or_else(|| panic!("missing {:?} in:\n{}", needle, prompt));
            cursor += found + needle.len();
        }
    }

    #[test]
    fn test_fence_grows_past_backtick_runs() {
        assert_eq!(fence_for("plain"), "```");
        assert_eq!(fence_for("a ``` b"), "````");
        assert_eq!(fence_for("`````"), "``````");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(1536), "1.50 KB (1536 bytes)");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB (3145728 bytes)");
    }

    #[test]
    fn test_context_size_counts_files_and_headers() {
        let ctx = sample();
        let expected_repo = "https://example.com/me/dots.git".len() * 2
            + "/cache/dots".len()
            + ".tmux.conf".len()
            + 17;
        let expected_current = "/work".len() * 2;
        let expected_fs = "/work/src".len() + "/work".len() + "/".len() + "main.rs".len();
        assert_eq!(
            context_size_bytes(&ctx),
            expected_repo + expected_current + expected_fs
        );
    }
}
