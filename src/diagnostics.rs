//! Diagnostics sink for the gather pipeline.
//!
//! Core components never log through global state. They report typed
//! [`DiagnosticEvent`]s to whatever [`Diagnostics`] implementation the
//! caller hands in: [`TracingDiagnostics`] for the CLI,
//! [`RecordingDiagnostics`] for tests.

use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    /// A remote repository was cloned into the cache.
    Cloned { url: String, path: PathBuf },
    /// A fresh mirror was used without contacting the remote.
    MirrorReused { url: String, path: PathBuf },
    /// A stale mirror was fetched and reset to `git_ref`.
    MirrorRefreshed {
        url: String,
        path: PathBuf,
        git_ref: String,
    },
    /// Refresh failed; the previous mirror is served as-is.
    StaleFallback {
        url: String,
        path: PathBuf,
        reason: String,
    },
    /// A cache directory without a `.git` marker was removed before cloning.
    PartialMirrorCleared { path: PathBuf },
    /// The freshness sentinel could not be written; the next fetch refreshes again.
    SentinelWriteFailed { path: PathBuf, reason: String },
    /// Repository contents were read.
    RepoRead {
        source: String,
        files: usize,
        bytes: usize,
    },
    /// A configured repository was left out of the aggregate.
    RepoSkipped {
        source: String,
        /// [`ContextError::code`](crate::error::ContextError::code) of the failure.
        code: &'static str,
        reason: String,
    },
    /// No enclosing repository was found for the working directory.
    CurrentRepoNotFound { start: PathBuf, reason: String },
    /// The current repository was found but could not be read.
    CurrentRepoUnreadable { root: PathBuf, reason: String },
    /// An optional source (Nix config, dotfiles) could not be collected.
    SourceUnavailable { source: String, reason: String },
}

pub trait Diagnostics: Send + Sync {
    fn report(&self, event: DiagnosticEvent);
}

/// Discards every event.
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn report(&self, _event: DiagnosticEvent) {}
}

/// Forwards events to `tracing`.
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::Cloned { url, path } => {
                tracing::info!(%url, path = %path.display(), "cloned repository");
            }
            DiagnosticEvent::MirrorReused { url, path } => {
                tracing::debug!(%url, path = %path.display(), "mirror is fresh, reusing");
            }
            DiagnosticEvent::MirrorRefreshed { url, path, git_ref } => {
                tracing::info!(%url, path = %path.display(), %git_ref, "refreshed mirror");
            }
            DiagnosticEvent::StaleFallback { url, path, reason } => {
                tracing::warn!(%url, path = %path.display(), %reason, "refresh failed, using stale mirror");
            }
            DiagnosticEvent::PartialMirrorCleared { path } => {
                tracing::warn!(path = %path.display(), "removed incomplete mirror");
            }
            DiagnosticEvent::SentinelWriteFailed { path, reason } => {
                tracing::warn!(path = %path.display(), %reason, "failed to write sentinel");
            }
            DiagnosticEvent::RepoRead {
                source,
                files,
                bytes,
            } => {
                tracing::debug!(%source, files, bytes, "read repository contents");
            }
            DiagnosticEvent::RepoSkipped {
                source,
                code,
                reason,
            } => {
                tracing::warn!(%source, code, %reason, "skipping repository");
            }
            DiagnosticEvent::CurrentRepoNotFound { start, reason } => {
                tracing::debug!(start = %start.display(), %reason, "no current repository");
            }
            DiagnosticEvent::CurrentRepoUnreadable { root, reason } => {
                tracing::warn!(root = %root.display(), %reason, "failed to read current repository");
            }
            DiagnosticEvent::SourceUnavailable { source, reason } => {
                tracing::warn!(%source, %reason, "context source unavailable");
            }
        }
    }
}

/// Keeps every event in memory, in order.
#[derive(Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn report(&self, event: DiagnosticEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
