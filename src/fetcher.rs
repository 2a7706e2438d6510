//! Repository fetcher with an on-disk mirror cache.
//!
//! Local descriptors are verified and returned as-is. Remote descriptors are
//! mirrored under `<cache-root>/<name>/`, where `name` is the URL's final path
//! segment without `.git`. Each mirror carries a sentinel file holding the
//! RFC 3339 time of its last successful refresh:
//!
//! ```text
//! Uncached ──clone──▶ Cached ──(sentinel older than window)──▶ Refreshing
//!                       ▲                                        │
//!                       └──────── success / stale fallback ◀─────┘
//! ```
//!
//! A refresh failure never loses content: the previous mirror is returned.
//! An existing mirror whose `origin` is another URL is rejected, and a
//! non-empty directory outside the cache root is never removed.
//! There is no inter-process locking; two processes racing on one URL may
//! both clone or refresh.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::{ContextError, Result};
use crate::git::{Vcs, REMOTE};
use crate::models::{RepoKind, RepositoryDescriptor};

/// Sentinel written inside a mirror after each successful clone or refresh.
pub const SENTINEL_FILE: &str = ".codex_last_update";

pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(60 * 60);

/// Branches tried, in order, when the remote HEAD cannot be resolved.
const FALLBACK_BRANCHES: &[&str] = &["main", "master"];

/// How a [`RepoFetcher::fetch`] call produced its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Local,
    Cloned,
    Reused,
    Refreshed { git_ref: String },
    /// Refresh failed; the existing mirror was returned.
    Stale { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedRepo {
    pub path: PathBuf,
    pub outcome: FetchOutcome,
}

pub struct RepoFetcher {
    cache_root: PathBuf,
    freshness: Duration,
    vcs: Arc<dyn Vcs>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl RepoFetcher {
    pub fn new(
        cache_root: impl Into<PathBuf>,
        vcs: Arc<dyn Vcs>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            cache_root: cache_root.into(),
            freshness: DEFAULT_FRESHNESS,
            vcs,
            diagnostics,
        }
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn vcs(&self) -> &dyn Vcs {
        self.vcs.as_ref()
    }

    /// Mirror directory for a remote descriptor.
    pub fn cache_path_for(&self, descriptor: &RepositoryDescriptor) -> PathBuf {
        descriptor
            .cache_path
            .clone()
            .unwrap_or_else(|| self.cache_root.join(cache_name(&descriptor.source)))
    }

    /// Resolve a descriptor to a local path, cloning or refreshing as needed.
    pub fn fetch(
        &self,
        descriptor: &RepositoryDescriptor,
        cancel: &CancelToken,
    ) -> Result<FetchedRepo> {
        match descriptor.kind {
            RepoKind::Local => {
                let path = PathBuf::from(&descriptor.source);
                if !path.exists() {
                    return Err(ContextError::NotFound(format!(
                        "local repository not found: {}",
                        descriptor.source
                    )));
                }
                Ok(FetchedRepo {
                    path,
                    outcome: FetchOutcome::Local,
                })
            }
            RepoKind::Remote => {
                let dest = self.cache_path_for(descriptor);
                self.fetch_remote(&descriptor.source, dest, cancel)
            }
        }
    }

    fn fetch_remote(&self, url: &str, dest: PathBuf, cancel: &CancelToken) -> Result<FetchedRepo> {
        if cancel.is_cancelled() {
            return Err(ContextError::Cancelled);
        }

        if dest.join(".git").exists() {
            if let Some(tracked) = self.vcs.remote_url(&dest) {
                if tracked != url {
                    return Err(ContextError::fetch(
                        url,
                        format!("mirror {} tracks a different remote: {}", dest.display(), tracked),
                    ));
                }
            }
            if !is_stale(&dest, Utc::now(), self.freshness) {
                self.diagnostics.report(DiagnosticEvent::MirrorReused {
                    url: url.to_string(),
                    path: dest.clone(),
                });
                return Ok(FetchedRepo {
                    path: dest,
                    outcome: FetchOutcome::Reused,
                });
            }

            return match self.refresh(&dest, cancel) {
                Ok(git_ref) => {
                    self.mark_fresh(&dest);
                    self.diagnostics.report(DiagnosticEvent::MirrorRefreshed {
                        url: url.to_string(),
                        path: dest.clone(),
                        git_ref: git_ref.clone(),
                    });
                    Ok(FetchedRepo {
                        path: dest,
                        outcome: FetchOutcome::Refreshed { git_ref },
                    })
                }
                Err(ContextError::Cancelled) => Err(ContextError::Cancelled),
                Err(e) => {
                    let reason = e.to_string();
                    self.diagnostics.report(DiagnosticEvent::StaleFallback {
                        url: url.to_string(),
                        path: dest.clone(),
                        reason: reason.clone(),
                    });
                    Ok(FetchedRepo {
                        path: dest,
                        outcome: FetchOutcome::Stale { reason },
                    })
                }
            };
        }

        self.clone_into(url, &dest, cancel)?;
        self.mark_fresh(&dest);
        self.diagnostics.report(DiagnosticEvent::Cloned {
            url: url.to_string(),
            path: dest.clone(),
        });
        Ok(FetchedRepo {
            path: dest,
            outcome: FetchOutcome::Cloned,
        })
    }

    fn clone_into(&self, url: &str, dest: &Path, cancel: &CancelToken) -> Result<()> {
        let existed = dest.exists();
        if existed && !is_empty_dir(dest) {
            // Only directories inside the cache root are ours to clear.
            if !self.in_cache_root(dest) {
                return Err(ContextError::fetch(
                    url,
                    format!(
                        "{} exists and is not a mirror; refusing to replace it",
                        dest.display()
                    ),
                ));
            }
            fs::remove_dir_all(dest).map_err(|e| {
                ContextError::fetch(url, format!("failed to clear incomplete mirror: {}", e))
            })?;
            self.diagnostics.report(DiagnosticEvent::PartialMirrorCleared {
                path: dest.to_path_buf(),
            });
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ContextError::fetch(
                    url,
                    format!("failed to create cache directory {}: {}", parent.display(), e),
                )
            })?;
        }

        if let Err(e) = self.vcs.clone_repo(url, dest, cancel) {
            // A half-written clone must not be mistaken for a mirror later.
            if dest.exists() && (!existed || self.in_cache_root(dest)) {
                let _ = fs::remove_dir_all(dest);
            }
            return Err(e);
        }
        Ok(())
    }

    fn in_cache_root(&self, path: &Path) -> bool {
        path != self.cache_root
            && path.starts_with(&self.cache_root)
            && !path.components().any(|c| matches!(c, Component::ParentDir))
    }

    /// Fetch and hard-reset to the remote default branch. Returns the ref used.
    fn refresh(&self, repo: &Path, cancel: &CancelToken) -> Result<String> {
        self.vcs.fetch(repo, cancel)?;

        let mut branches: Vec<String> = Vec::new();
        if let Some(head) = self.vcs.remote_head_branch(repo) {
            branches.push(head);
        }
        for fallback in FALLBACK_BRANCHES {
            if !branches.iter().any(|b| b == fallback) {
                branches.push((*fallback).to_string());
            }
        }

        let mut last_err = None;
        for branch in branches {
            let git_ref = format!("{}/{}", REMOTE, branch);
            match self.vcs.reset_hard(repo, &git_ref, cancel) {
                Ok(()) => return Ok(git_ref),
                Err(ContextError::Cancelled) => return Err(ContextError::Cancelled),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            ContextError::fetch(repo.display().to_string(), "no branch to reset to")
        }))
    }

    fn mark_fresh(&self, mirror: &Path) {
        if let Err(e) = write_sentinel(mirror, Utc::now()) {
            self.diagnostics.report(DiagnosticEvent::SentinelWriteFailed {
                path: mirror.join(SENTINEL_FILE),
                reason: e.to_string(),
            });
        }
    }
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

/// Cache directory name for a remote URL: its final path segment minus `.git`.
///
/// Handles both `https://host/user/repo.git` and `git@host:user/repo.git`.
pub fn cache_name(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let segment = trimmed
        .rsplit(|c| c == '/' || c == ':')
        .next()
        .unwrap_or(trimmed);
    let name = segment.strip_suffix(".git").unwrap_or(segment);
    if name.is_empty() {
        "repository".to_string()
    } else {
        name.to_string()
    }
}

/// Whether a mirror needs a refresh at `now`.
///
/// The sentinel's RFC 3339 body is authoritative; if it does not parse, the
/// sentinel's modification time is used. A missing sentinel is always stale.
pub fn is_stale(mirror: &Path, now: DateTime<Utc>, freshness: Duration) -> bool {
    match last_update(mirror) {
        Some(last) => {
            let age = now.signed_duration_since(last);
            match chrono::Duration::from_std(freshness) {
                Ok(window) => age > window,
                Err(_) => false,
            }
        }
        None => true,
    }
}

fn last_update(mirror: &Path) -> Option<DateTime<Utc>> {
    let sentinel = mirror.join(SENTINEL_FILE);
    if let Ok(body) = fs::read_to_string(&sentinel) {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(body.trim()) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    let modified = fs::metadata(&sentinel).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

pub fn write_sentinel(mirror: &Path, at: DateTime<Utc>) -> std::io::Result<()> {
    fs::write(mirror.join(SENTINEL_FILE), at.to_rfc3339())
}
