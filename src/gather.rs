//! Context gathering orchestration.
//!
//! Coordinates the flow for one query: every configured repository is
//! fetched and read (a failure in one is reported and skipped), then the
//! optional current repository, filesystem, Nix, dotfiles and screenshot
//! sources are collected according to [`GatherOptions`].
//!
//! Repositories are processed one at a time in configuration order.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::{ContextError, Result};
use crate::fetcher::RepoFetcher;
use crate::git::{find_repository_root, Vcs};
use crate::models::{
    AggregateContext, DotfilesContext, FilesystemContext, GatherOptions, NixContext,
    RepositoryContext, RepositoryDescriptor, Screenshot,
};
use crate::reader::ContentReader;

/// An external source of one kind of context (Nix config, dotfiles,
/// screenshots). `root` is the configured path for that source, or the
/// working directory for screenshots.
pub trait Collector<T>: Send + Sync {
    fn name(&self) -> &str;

    fn collect(&self, root: &Path) -> anyhow::Result<T>;
}

pub struct Gatherer {
    repos: Vec<RepositoryDescriptor>,
    nix_config_path: Option<PathBuf>,
    dotfiles_path: Option<PathBuf>,
    fetcher: RepoFetcher,
    reader: ContentReader,
    diagnostics: Arc<dyn Diagnostics>,
    nix: Option<Box<dyn Collector<NixContext>>>,
    dotfiles: Option<Box<dyn Collector<DotfilesContext>>>,
    screenshot: Option<Box<dyn Collector<Screenshot>>>,
}

impl Gatherer {
    pub fn new(
        repos: Vec<RepositoryDescriptor>,
        fetcher: RepoFetcher,
        reader: ContentReader,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            repos,
            nix_config_path: None,
            dotfiles_path: None,
            fetcher,
            reader,
            diagnostics,
            nix: None,
            dotfiles: None,
            screenshot: None,
        }
    }

    /// Build a gatherer with the fetcher and reader described by `config`.
    pub fn from_config(
        config: &Config,
        vcs: Arc<dyn Vcs>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Self> {
        let fetcher = RepoFetcher::new(config.cache_dir(), vcs, diagnostics.clone())
            .with_freshness(config.freshness());
        let reader = ContentReader::new(config.reader_options())?;
        let mut gatherer = Gatherer::new(config.repos.clone(), fetcher, reader, diagnostics);
        gatherer.nix_config_path = config.nix_config_path.clone();
        gatherer.dotfiles_path = config.dotfiles_path.clone();
        Ok(gatherer)
    }

    pub fn with_nix_collector(
        mut self,
        path: impl Into<PathBuf>,
        collector: Box<dyn Collector<NixContext>>,
    ) -> Self {
        self.nix_config_path = Some(path.into());
        self.nix = Some(collector);
        self
    }

    pub fn with_dotfiles_collector(
        mut self,
        path: impl Into<PathBuf>,
        collector: Box<dyn Collector<DotfilesContext>>,
    ) -> Self {
        self.dotfiles_path = Some(path.into());
        self.dotfiles = Some(collector);
        self
    }

    pub fn with_screenshot_collector(mut self, collector: Box<dyn Collector<Screenshot>>) -> Self {
        self.screenshot = Some(collector);
        self
    }

    /// Collect everything `opts` asks for.
    ///
    /// Fails only on cancellation, on a filesystem context that cannot be
    /// read, or on a requested screenshot with no (or a failing) collector.
    pub fn gather(&self, opts: &GatherOptions, cancel: &CancelToken) -> Result<AggregateContext> {
        let mut ctx = AggregateContext::new(Utc::now());

        for descriptor in &self.repos {
            if cancel.is_cancelled() {
                return Err(ContextError::Cancelled);
            }
            match self.gather_repo(descriptor, cancel) {
                Ok(repo) => ctx.configured_repos.push(repo),
                Err(ContextError::Cancelled) => return Err(ContextError::Cancelled),
                Err(e) => self.diagnostics.report(DiagnosticEvent::RepoSkipped {
                    source: descriptor.source.clone(),
                    code: e.code(),
                    reason: e.to_string(),
                }),
            }
        }

        if opts.include_current_repo {
            ctx.current_repo = self.gather_current_repo(opts, cancel)?;
        }

        if opts.include_filesystem {
            let working_dir = working_dir(opts)?;
            ctx.filesystem = Some(gather_filesystem(&working_dir)?);
        }

        if opts.include_nix_config {
            ctx.nix_config = self.collect_soft(
                "nix_config",
                self.nix.as_deref(),
                self.nix_config_path.as_deref(),
            );
        }

        if opts.include_dotfiles {
            ctx.dotfiles = self.collect_soft(
                "dotfiles",
                self.dotfiles.as_deref(),
                self.dotfiles_path.as_deref(),
            );
        }

        if opts.capture_screenshot {
            let collector = self
                .screenshot
                .as_deref()
                .ok_or_else(|| ContextError::Unsupported("screenshot capture".to_string()))?;
            let working_dir = working_dir(opts)?;
            let shot = collector
                .collect(&working_dir)
                .map_err(|e| ContextError::Collector {
                    name: collector.name().to_string(),
                    reason: e.to_string(),
                })?;
            ctx.screenshot = Some(shot);
        }

        Ok(ctx)
    }

    fn gather_repo(
        &self,
        descriptor: &RepositoryDescriptor,
        cancel: &CancelToken,
    ) -> Result<RepositoryContext> {
        let fetched = self.fetcher.fetch(descriptor, cancel)?;
        let contents = self.reader.read(&fetched.path, cancel)?;
        self.diagnostics.report(DiagnosticEvent::RepoRead {
            source: descriptor.source.clone(),
            files: contents.total_file_count,
            bytes: contents.total_size_bytes,
        });
        let remote = self.fetcher.vcs().remote_url(&fetched.path);
        Ok(RepositoryContext::from_descriptor(
            descriptor,
            fetched.path,
            remote,
            Some(contents),
        ))
    }

    /// `Ok(None)` when no enclosing repository exists or it cannot be read;
    /// both are reported. Only cancellation is an error.
    fn gather_current_repo(
        &self,
        opts: &GatherOptions,
        cancel: &CancelToken,
    ) -> Result<Option<RepositoryContext>> {
        let start = match working_dir(opts) {
            Ok(dir) => dir,
            Err(e) => {
                self.diagnostics.report(DiagnosticEvent::CurrentRepoNotFound {
                    start: opts.working_dir.clone().unwrap_or_default(),
                    reason: e.to_string(),
                });
                return Ok(None);
            }
        };
        let root = match find_repository_root(&start) {
            Ok(root) => root,
            Err(e) => {
                self.diagnostics.report(DiagnosticEvent::CurrentRepoNotFound {
                    start,
                    reason: e.to_string(),
                });
                return Ok(None);
            }
        };

        let contents = match self.reader.read(&root, cancel) {
            Ok(contents) => contents,
            Err(ContextError::Cancelled) => return Err(ContextError::Cancelled),
            Err(e) => {
                self.diagnostics.report(DiagnosticEvent::CurrentRepoUnreadable {
                    root,
                    reason: e.to_string(),
                });
                return Ok(None);
            }
        };
        self.diagnostics.report(DiagnosticEvent::RepoRead {
            source: root.display().to_string(),
            files: contents.total_file_count,
            bytes: contents.total_size_bytes,
        });
        let remote = self.fetcher.vcs().remote_url(&root);
        Ok(Some(RepositoryContext::current(root, remote, Some(contents))))
    }

    fn collect_soft<T>(
        &self,
        source: &str,
        collector: Option<&dyn Collector<T>>,
        root: Option<&Path>,
    ) -> Option<T> {
        let result = match (collector, root) {
            (_, None) => Err(format!("no {} path configured", source)),
            (None, Some(_)) => Err("no collector available".to_string()),
            (Some(collector), Some(root)) => collector.collect(root).map_err(|e| e.to_string()),
        };
        match result {
            Ok(value) => Some(value),
            Err(reason) => {
                self.diagnostics.report(DiagnosticEvent::SourceUnavailable {
                    source: source.to_string(),
                    reason,
                });
                None
            }
        }
    }
}

fn working_dir(opts: &GatherOptions) -> Result<PathBuf> {
    let dir = match &opts.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(|e| ContextError::io(".", e))?,
    };
    if dir.is_absolute() {
        return Ok(dir);
    }
    let cwd = std::env::current_dir().map_err(|e| ContextError::io(&dir, e))?;
    Ok(cwd.join(dir))
}

/// Current directory, its ancestors, and a sorted listing of its entries
/// (directories suffixed with `/`).
pub fn gather_filesystem(working_dir: &Path) -> Result<FilesystemContext> {
    let entries = fs::read_dir(working_dir).map_err(|e| ContextError::io(working_dir, e))?;

    let mut files: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            name
        })
        .collect();
    files.sort();

    Ok(FilesystemContext {
        current_dir: working_dir.to_path_buf(),
        parent_dirs: working_dir
            .ancestors()
            .skip(1)
            .map(Path::to_path_buf)
            .collect(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_gather_filesystem_lists_sorted_entries() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src")).unwrap();
        fs::write(tmp.path().join("b.txt"), "b").unwrap();
        fs::write(tmp.path().join("a.rs"), "a").unwrap();

        let fs_ctx = gather_filesystem(tmp.path()).unwrap();
        assert_eq!(fs_ctx.current_dir, tmp.path());
        assert_eq!(fs_ctx.files, vec!["a.rs", "b.txt", "src/"]);
        assert_eq!(fs_ctx.parent_dirs.first().map(PathBuf::as_path), tmp.path().parent());
        assert_eq!(fs_ctx.parent_dirs.last().unwrap(), Path::new("/"));
    }

    #[test]
    fn test_gather_filesystem_missing_dir_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = gather_filesystem(&tmp.path().join("gone")).unwrap_err();
        assert!(matches!(err, ContextError::Io { .. }));
    }
}
