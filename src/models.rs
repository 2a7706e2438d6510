//! Core data models used throughout the context pipeline.
//!
//! These types represent the repositories, file records, and aggregate
//! context that flow from the gatherer through the summarizer into the
//! prompt renderer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Where a configured repository lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    Local,
    Remote,
}

/// Identity and location of a configured repository, prior to fetching.
///
/// `source` is the unique key: an absolute local path or a remote URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    pub source: String,
    pub kind: RepoKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
}

impl RepositoryDescriptor {
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            source: path.into(),
            kind: RepoKind::Local,
            cache_path: None,
        }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            source: url.into(),
            kind: RepoKind::Remote,
            cache_path: None,
        }
    }
}

/// A single included text file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub absolute_path: PathBuf,
    /// Path relative to the repository root, `/`-separated.
    pub relative_path: String,
    pub content: String,
    pub size_bytes: usize,
}

impl FileRecord {
    pub fn new(
        absolute_path: impl Into<PathBuf>,
        relative_path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            absolute_path: absolute_path.into(),
            relative_path: relative_path.into(),
            size_bytes: content.len(),
            content,
        }
    }

    /// Final path component of the relative path.
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// Files included from one repository snapshot.
///
/// `total_size_bytes` is always the sum of `files[..].size_bytes` and
/// `total_file_count` is always `files.len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoContents {
    pub files: Vec<FileRecord>,
    pub total_size_bytes: usize,
    pub total_file_count: usize,
}

impl RepoContents {
    pub fn from_files(files: Vec<FileRecord>) -> Self {
        let mut contents = RepoContents::default();
        for file in files {
            contents.push(file);
        }
        contents
    }

    pub fn push(&mut self, file: FileRecord) {
        self.total_size_bytes += file.size_bytes;
        self.total_file_count += 1;
        self.files.push(file);
    }
}

/// How a repository context came to be part of the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoOrigin {
    Local,
    Remote,
    Current,
}

impl RepoOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoOrigin::Local => "local",
            RepoOrigin::Remote => "remote",
            RepoOrigin::Current => "current",
        }
    }
}

impl From<RepoKind> for RepoOrigin {
    fn from(kind: RepoKind) -> Self {
        match kind {
            RepoKind::Local => RepoOrigin::Local,
            RepoKind::Remote => RepoOrigin::Remote,
        }
    }
}

/// A fetched repository with its resolved path and (optionally) contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryContext {
    /// Descriptor source, or the discovered root for the current repository.
    pub source: String,
    pub origin: RepoOrigin,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<RepoContents>,
}

impl RepositoryContext {
    pub fn from_descriptor(
        descriptor: &RepositoryDescriptor,
        path: PathBuf,
        remote: Option<String>,
        contents: Option<RepoContents>,
    ) -> Self {
        Self {
            source: descriptor.source.clone(),
            origin: descriptor.kind.into(),
            path,
            remote,
            contents,
        }
    }

    pub fn current(path: PathBuf, remote: Option<String>, contents: Option<RepoContents>) -> Self {
        Self {
            source: path.display().to_string(),
            origin: RepoOrigin::Current,
            path,
            remote,
            contents,
        }
    }

    /// Copy of this context carrying different contents.
    pub fn with_contents(&self, contents: Option<RepoContents>) -> Self {
        Self {
            source: self.source.clone(),
            origin: self.origin,
            path: self.path.clone(),
            remote: self.remote.clone(),
            contents,
        }
    }
}

/// Current directory information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemContext {
    pub current_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_dirs: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

/// Parsed Nix configuration, supplied by an external collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NixContext {
    pub config_path: PathBuf,
    pub is_flake: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub system_config: BTreeMap<String, serde_json::Value>,
    pub last_parsed: DateTime<Utc>,
    pub cache_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keybind {
    pub key: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Parsed dotfiles configuration, supplied by an external collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DotfilesContext {
    pub dotfiles_path: PathBuf,
    pub is_home_manager: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub configs: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub keybindings: BTreeMap<String, Vec<Keybind>>,
    pub last_parsed: DateTime<Utc>,
    pub cache_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    pub path: PathBuf,
    #[serde(default, skip_serializing)]
    pub data: Vec<u8>,
    pub mime_type: String,
    /// Capture tool that produced the image.
    pub tool: String,
}

/// Everything gathered for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateContext {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configured_repos: Vec<RepositoryContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_repo: Option<RepositoryContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<FilesystemContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nix_config: Option<NixContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dotfiles: Option<DotfilesContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<Screenshot>,
}

impl AggregateContext {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            configured_repos: Vec::new(),
            current_repo: None,
            filesystem: None,
            nix_config: None,
            dotfiles: None,
            screenshot: None,
        }
    }

    /// Number of repository contexts that share a summarization budget.
    pub fn repository_count(&self) -> usize {
        self.configured_repos.len() + usize::from(self.current_repo.is_some())
    }
}

/// Which optional sources a [`Gatherer`](crate::gather::Gatherer) collects.
///
/// Configured repositories are always gathered regardless of these flags.
#[derive(Debug, Clone, Default)]
pub struct GatherOptions {
    pub include_current_repo: bool,
    pub include_filesystem: bool,
    pub include_nix_config: bool,
    pub include_dotfiles: bool,
    pub capture_screenshot: bool,
    /// Defaults to the process working directory.
    pub working_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_contents_totals_track_pushes() {
        let contents = RepoContents::from_files(vec![
            FileRecord::new("/r/a.rs", "a.rs", "fn a() {}"),
            FileRecord::new("/r/src/b.rs", "src/b.rs", "fn b() {}\n"),
        ]);
        assert_eq!(contents.total_file_count, 2);
        assert_eq!(contents.total_size_bytes, 9 + 10);
    }

    #[test]
    fn test_file_name_of_nested_path() {
        let file = FileRecord::new("/r/nix/flake.nix", "nix/flake.nix", "{}");
        assert_eq!(file.file_name(), "flake.nix");
    }

    #[test]
    fn test_repository_count_includes_current() {
        let mut ctx = AggregateContext::new(Utc::now());
        ctx.configured_repos.push(RepositoryContext::from_descriptor(
            &RepositoryDescriptor::local("/a"),
            PathBuf::from("/a"),
            None,
            None,
        ));
        assert_eq!(ctx.repository_count(), 1);
        ctx.current_repo = Some(RepositoryContext::current(PathBuf::from("/b"), None, None));
        assert_eq!(ctx.repository_count(), 2);
    }

    #[test]
    fn test_descriptor_serializes_kind_lowercase() {
        let json = serde_json::to_string(&RepositoryDescriptor::remote("https://x/y.git")).unwrap();
        assert_eq!(json, r#"{"source":"https://x/y.git","kind":"remote"}"#);
    }
}
