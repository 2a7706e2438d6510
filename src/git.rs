//! Version-control collaborator.
//!
//! [`Vcs`] is the seam the fetcher and gatherer talk through; [`GitCli`]
//! implements it by shelling out to the `git` binary. Any replacement must
//! offer clone, fetch, hard reset, remote URL lookup, and the symbolic ref
//! of the remote HEAD.

use std::ffi::OsStr;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::{ContextError, Result};

/// Name of the remote every mirror tracks.
pub const REMOTE: &str = "origin";

pub trait Vcs: Send + Sync {
    /// Clone `url` into `dest`. `dest` must not exist or be empty.
    fn clone_repo(&self, url: &str, dest: &Path, cancel: &CancelToken) -> Result<()>;

    /// Fetch updates from [`REMOTE`].
    fn fetch(&self, repo: &Path, cancel: &CancelToken) -> Result<()>;

    /// Hard-reset the working tree to `git_ref` (e.g. `origin/main`).
    fn reset_hard(&self, repo: &Path, git_ref: &str, cancel: &CancelToken) -> Result<()>;

    /// URL of [`REMOTE`], if one is configured.
    fn remote_url(&self, repo: &Path) -> Option<String>;

    /// Branch the remote HEAD points at, e.g. `main`.
    fn remote_head_branch(&self, repo: &Path) -> Option<String>;
}

/// [`Vcs`] backed by the `git` command-line tool.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    poll_interval: Duration,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Run git to completion, killing it if `cancel` fires.
    ///
    /// Returns trimmed stdout on success. `subject` names the repository in
    /// error messages.
    fn run<I, S>(
        &self,
        args: I,
        dir: Option<&Path>,
        subject: &str,
        cancel: &CancelToken,
    ) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            ContextError::fetch(subject, format!("failed to execute git ({}). Is git installed?", e))
        })?;

        // Both pipes are drained while polling so a chatty child never
        // blocks on a full pipe buffer.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if cancel.is_cancelled() {
                        let _ = child.kill();
                        let _ = child.wait();
                        // Readers are left detached: a grandchild may still
                        // hold the pipes open.
                        return Err(ContextError::Cancelled);
                    }
                    thread::sleep(self.poll_interval);
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ContextError::fetch(subject, e.to_string()));
                }
            }
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(ContextError::fetch(
                subject,
                format!("git exited with {}: {}", status, stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }
}

/// Read a child pipe to the end on a helper thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

impl Vcs for GitCli {
    fn clone_repo(&self, url: &str, dest: &Path, cancel: &CancelToken) -> Result<()> {
        let args: [&OsStr; 4] = [
            OsStr::new("clone"),
            OsStr::new("--quiet"),
            OsStr::new(url),
            dest.as_os_str(),
        ];
        self.run(args, None, url, cancel).map(|_| ())
    }

    fn fetch(&self, repo: &Path, cancel: &CancelToken) -> Result<()> {
        let subject = repo.display().to_string();
        self.run(["fetch", "--quiet", REMOTE], Some(repo), &subject, cancel)
            .map(|_| ())
    }

    fn reset_hard(&self, repo: &Path, git_ref: &str, cancel: &CancelToken) -> Result<()> {
        let subject = repo.display().to_string();
        self.run(
            ["reset", "--quiet", "--hard", git_ref],
            Some(repo),
            &subject,
            cancel,
        )
        .map(|_| ())
    }

    fn remote_url(&self, repo: &Path) -> Option<String> {
        let subject = repo.display().to_string();
        self.run(
            ["remote", "get-url", REMOTE],
            Some(repo),
            &subject,
            &CancelToken::new(),
        )
        .ok()
        .filter(|url| !url.is_empty())
    }

    fn remote_head_branch(&self, repo: &Path) -> Option<String> {
        let subject = repo.display().to_string();
        let head_ref = format!("refs/remotes/{}/HEAD", REMOTE);
        let output = self
            .run(
                ["symbolic-ref", head_ref.as_str()],
                Some(repo),
                &subject,
                &CancelToken::new(),
            )
            .ok()?;
        parse_remote_head(&output)
    }
}

/// Extract the branch from `refs/remotes/origin/<branch>`.
pub fn parse_remote_head(symbolic_ref: &str) -> Option<String> {
    let prefix = format!("refs/remotes/{}/", REMOTE);
    symbolic_ref
        .trim()
        .strip_prefix(&prefix)
        .filter(|branch| !branch.is_empty())
        .map(str::to_string)
}

/// Walk upward from `start` to the nearest directory holding a `.git`
/// marker: either a directory, or a file beginning `gitdir:` as written for
/// worktrees and submodules.
pub fn find_repository_root(start: &Path) -> Result<PathBuf> {
    let start = if start.is_absolute() {
        start.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| ContextError::io(start, e))?
            .join(start)
    };

    let mut current = start.as_path();
    loop {
        if has_git_marker(current) {
            return Ok(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => {
                return Err(ContextError::NotFound(format!(
                    "not a git repository (or any parent up to the filesystem root): {}",
                    start.display()
                )))
            }
        }
    }
}

fn has_git_marker(dir: &Path) -> bool {
    let marker = dir.join(".git");
    let Ok(metadata) = fs::metadata(&marker) else {
        return false;
    };
    if metadata.is_dir() {
        return true;
    }
    fs::read_to_string(&marker)
        .map(|content| content.starts_with("gitdir:"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_remote_head() {
        assert_eq!(
            parse_remote_head("refs/remotes/origin/main\n"),
            Some("main".to_string())
        );
        assert_eq!(
            parse_remote_head("refs/remotes/origin/release/v2"),
            Some("release/v2".to_string())
        );
        assert_eq!(parse_remote_head("refs/heads/main"), None);
        assert_eq!(parse_remote_head("refs/remotes/origin/"), None);
    }

    #[test]
    fn test_find_root_from_subdirectory() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(".git")).unwrap();
        let nested = tmp.path().join("src/deep/er");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_repository_root(&nested).unwrap(), tmp.path());
    }

    #[test]
    fn test_find_root_accepts_gitdir_file() {
        let tmp = TempDir::new().unwrap();
        let worktree = tmp.path().join("wt");
        fs::create_dir_all(&worktree).unwrap();
        fs::write(worktree.join(".git"), "gitdir: /elsewhere/.git/worktrees/wt\n").unwrap();

        assert_eq!(find_repository_root(&worktree).unwrap(), worktree);
    }

    #[test]
    fn test_plain_git_file_is_not_a_marker() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(".git")).unwrap();
        let inner = tmp.path().join("inner");
        fs::create_dir_all(&inner).unwrap();
        fs::write(inner.join(".git"), "garbage").unwrap();

        assert_eq!(find_repository_root(&inner).unwrap(), tmp.path());
    }

    /// `sh` run by `GitCli::fetch` reads the file named `fetch` in the
    /// repository directory as its script.
    #[cfg(unix)]
    fn fake_git_fetch(tmp: &TempDir, script: &str) -> GitCli {
        fs::write(tmp.path().join("fetch"), script).unwrap();
        GitCli::with_program("/bin/sh")
    }

    #[cfg(unix)]
    #[test]
    fn test_large_stderr_does_not_block() {
        let tmp = TempDir::new().unwrap();
        let git = fake_git_fetch(&tmp, "head -c 300000 /dev/zero | tr '\\0' x >&2\nexit 1\n");
        let repo = tmp.path().to_path_buf();

        let (tx, rx) = std::sync::mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(git.fetch(&repo, &CancelToken::new()));
        });
        let result = rx
            .recv_timeout(Duration::from_secs(20))
            .expect("git run blocked on a full pipe");

        match result {
            Err(ContextError::Fetch { reason, .. }) => assert!(reason.contains("xxxx")),
            other => panic!("expected fetch error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_large_stdout_is_returned() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("remote"),
            "head -c 200000 /dev/zero | tr '\\0' y\n",
        )
        .unwrap();
        let git = GitCli::with_program("/bin/sh");
        // `remote get-url origin` runs the `remote` script.
        let url = git.remote_url(tmp.path()).unwrap();
        assert_eq!(url.len(), 200_000);
    }

    #[cfg(unix)]
    #[test]
    fn test_cancel_kills_running_git() {
        let tmp = TempDir::new().unwrap();
        let git = fake_git_fetch(&tmp, "exec sleep 30\n");
        let repo = tmp.path().to_path_buf();
        let cancel = CancelToken::new();

        let (tx, rx) = std::sync::mpsc::channel();
        let worker_cancel = cancel.clone();
        thread::spawn(move || {
            let _ = tx.send(git.fetch(&repo, &worker_cancel));
        });
        thread::sleep(Duration::from_millis(200));
        cancel.cancel();

        let result = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("cancelled git run did not return");
        assert!(matches!(result, Err(ContextError::Cancelled)));
    }

    #[test]
    fn test_filesystem_root_is_not_found() {
        let err = find_repository_root(Path::new("/")).unwrap_err();
        assert!(matches!(err, ContextError::NotFound(_)));
    }
}
