//! TOML configuration.
//!
//! Supplies the configured repositories, reader limits, summarization
//! budget, and cache location. A missing file means defaults; environment
//! variables override file values.

use anyhow::{bail, Context, Result};
use globset::Glob;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetcher::cache_name;
use crate::models::{RepoKind, RepositoryDescriptor};
use crate::reader::{ReaderOptions, DEFAULT_MAX_FILE_BYTES, DEFAULT_MAX_TOTAL_BYTES};

pub const ENV_NIX_CONFIG: &str = "CODEX_NIX_CONFIG";
pub const ENV_DOTFILES: &str = "CODEX_DOTFILES";
pub const ENV_CACHE_DIR: &str = "CODEX_CACHE_DIR";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nix_config_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dotfiles_path: Option<PathBuf>,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub repos: Vec<RepositoryDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_max_total_bytes")]
    pub max_total_bytes: usize,
    #[serde(default = "default_include_hidden")]
    pub include_hidden: bool,
    /// Summarization budget for the whole aggregate.
    #[serde(default = "default_budget_bytes")]
    pub budget_bytes: usize,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            max_total_bytes: default_max_total_bytes(),
            include_hidden: default_include_hidden(),
            budget_bytes: default_budget_bytes(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}
fn default_max_total_bytes() -> usize {
    DEFAULT_MAX_TOTAL_BYTES
}
fn default_include_hidden() -> bool {
    true
}
fn default_budget_bytes() -> usize {
    400_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Mirror cache root. Defaults to `~/.cache/codex/repos`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            freshness_secs: default_freshness_secs(),
        }
    }
}

fn default_freshness_secs() -> u64 {
    60 * 60
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.context.max_file_bytes == 0 {
            bail!("context.max_file_bytes must be > 0");
        }
        if self.context.max_total_bytes == 0 {
            bail!("context.max_total_bytes must be > 0");
        }
        if self.cache.freshness_secs == 0 {
            bail!("cache.freshness_secs must be > 0");
        }
        for pattern in &self.context.exclude_globs {
            Glob::new(pattern)
                .with_context(|| format!("context.exclude_globs: invalid pattern '{}'", pattern))?;
        }
        let mut seen = HashSet::new();
        let mut mirrors: HashMap<PathBuf, &str> = HashMap::new();
        for repo in &self.repos {
            if !seen.insert(repo.source.as_str()) {
                bail!("repository configured more than once: {}", repo.source);
            }
            if let Some(mirror) = self.mirror_path(repo) {
                if let Some(other) = mirrors.insert(mirror.clone(), repo.source.as_str()) {
                    bail!(
                        "repositories {} and {} share mirror directory {}; set cache_path on one of them",
                        other,
                        repo.source,
                        mirror.display()
                    );
                }
            }
        }
        Ok(())
    }

    /// Mirror directory a remote repository is cloned into; `None` for local ones.
    pub fn mirror_path(&self, repo: &RepositoryDescriptor) -> Option<PathBuf> {
        match repo.kind {
            RepoKind::Local => None,
            RepoKind::Remote => Some(
                repo.cache_path
                    .clone()
                    .unwrap_or_else(|| self.cache_dir().join(cache_name(&repo.source))),
            ),
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        match &self.cache.dir {
            Some(dir) => expand_tilde(dir),
            None => home_dir()
                .map(|home| home.join(".cache").join("codex").join("repos"))
                .unwrap_or_else(|| PathBuf::from(".codex-cache")),
        }
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.cache.freshness_secs)
    }

    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            max_file_bytes: self.context.max_file_bytes,
            max_total_bytes: self.context.max_total_bytes,
            include_hidden: self.context.include_hidden,
            exclude_globs: self.context.exclude_globs.clone(),
        }
    }

    /// Register a repository by local path or remote URL.
    ///
    /// Local paths are made absolute and must exist. Remote URLs get a
    /// derived cache path, suffixed `-2`, `-3`, ... when another repository
    /// already uses it. A source that is already configured is rejected.
    pub fn add_repo(&mut self, source: &str) -> Result<&RepositoryDescriptor> {
        let source = source.trim();
        if source.is_empty() {
            bail!("repository source must not be empty");
        }

        let descriptor = if is_remote_source(source) {
            RepositoryDescriptor {
                source: source.to_string(),
                kind: RepoKind::Remote,
                cache_path: Some(self.unused_mirror_path(source)),
            }
        } else {
            let path = absolute(&expand_tilde(Path::new(source)))?;
            if !path.exists() {
                bail!("local repository does not exist: {}", path.display());
            }
            RepositoryDescriptor::local(path.display().to_string())
        };

        if self.repos.iter().any(|r| r.source == descriptor.source) {
            bail!("repository already configured: {}", descriptor.source);
        }
        self.repos.push(descriptor);
        let added = self.repos.len() - 1;
        Ok(&self.repos[added])
    }

    fn unused_mirror_path(&self, source: &str) -> PathBuf {
        let taken: HashSet<PathBuf> = self
            .repos
            .iter()
            .filter_map(|r| self.mirror_path(r))
            .collect();
        let base = cache_name(source);
        let cache_dir = self.cache_dir();
        let mut candidate = cache_dir.join(&base);
        let mut n = 2;
        while taken.contains(&candidate) {
            candidate = cache_dir.join(format!("{}-{}", base, n));
            n += 1;
        }
        candidate
    }

    /// Remove a repository by its exact source, or by the absolute form of a
    /// local path.
    pub fn remove_repo(&mut self, source: &str) -> Result<RepositoryDescriptor> {
        let source = source.trim();
        let normalized = if is_remote_source(source) {
            None
        } else {
            absolute(&expand_tilde(Path::new(source)))
                .ok()
                .map(|p| p.display().to_string())
        };

        let position = self
            .repos
            .iter()
            .position(|r| r.source == source || Some(&r.source) == normalized.as_ref());
        match position {
            Some(idx) => Ok(self.repos.remove(idx)),
            None => bail!("repository not configured: {}", source),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let body = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, body)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides using `lookup` (normally `std::env::var`).
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup(ENV_NIX_CONFIG).filter(|v| !v.is_empty()) {
            self.nix_config_path = Some(PathBuf::from(val));
        }
        if let Some(val) = lookup(ENV_DOTFILES).filter(|v| !v.is_empty()) {
            self.dotfiles_path = Some(PathBuf::from(val));
        }
        if let Some(val) = lookup(ENV_CACHE_DIR).filter(|v| !v.is_empty()) {
            self.cache.dir = Some(PathBuf::from(val));
        }
    }
}

/// `~/.config/codex/config.toml`, or `config.toml` when `$HOME` is unset.
pub fn default_config_path() -> PathBuf {
    home_dir()
        .map(|home| home.join(".config").join("codex").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// Load, apply environment overrides, and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Whether a repository source names a remote rather than a local path.
pub fn is_remote_source(source: &str) -> bool {
    if source.contains("://") {
        return true;
    }
    // scp-like syntax: user@host:path
    match (source.find('@'), source.find(':')) {
        (Some(at), Some(colon)) => at < colon && !source.starts_with('/'),
        _ => false,
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to get working directory")?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.context.max_file_bytes, 100 * 1024);
        assert_eq!(config.context.max_total_bytes, 2 * 1024 * 1024);
        assert!(config.context.include_hidden);
        assert_eq!(config.cache.freshness_secs, 3600);
        assert!(config.repos.is_empty());
    }

    #[test]
    fn test_parse_full_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
nix_config_path = "/etc/nixos"

[context]
max_file_bytes = 2048
include_hidden = false
budget_bytes = 1000
exclude_globs = ["**/generated/**"]

[cache]
dir = "/var/cache/codex"
freshness_secs = 60

[[repos]]
source = "https://github.com/me/dots.git"
kind = "remote"

[[repos]]
source = "/srv/notes"
kind = "local"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.context.max_file_bytes, 2048);
        assert_eq!(config.context.max_total_bytes, 2 * 1024 * 1024);
        assert!(!config.context.include_hidden);
        assert_eq!(config.cache_dir(), PathBuf::from("/var/cache/codex"));
        assert_eq!(config.freshness(), Duration::from_secs(60));
        assert_eq!(config.repos.len(), 2);
        assert_eq!(config.repos[0].kind, RepoKind::Remote);
        assert_eq!(config.repos[1].kind, RepoKind::Local);
        assert_eq!(config.reader_options().exclude_globs, vec!["**/generated/**"]);
    }

    #[test]
    fn test_validation_rejects_duplicates_and_bad_globs() {
        let mut config = Config::default();
        config.repos = vec![
            RepositoryDescriptor::local("/a"),
            RepositoryDescriptor::local("/a"),
        ];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.context.exclude_globs = vec!["src/[".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.freshness_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_add_and_remove_repos() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.cache.dir = Some(tmp.path().join("cache"));

        let remote = config.add_repo("git@github.com:me/dots.git").unwrap().clone();
        assert_eq!(remote.kind, RepoKind::Remote);
        assert_eq!(remote.cache_path, Some(tmp.path().join("cache").join("dots")));

        let local_src = tmp.path().display().to_string();
        let local = config.add_repo(&local_src).unwrap().clone();
        assert_eq!(local.kind, RepoKind::Local);

        assert!(config.add_repo("git@github.com:me/dots.git").is_err());
        assert!(config.add_repo(&local_src).is_err());
        assert!(config
            .add_repo(&tmp.path().join("missing").display().to_string())
            .is_err());

        assert_eq!(
            config.remove_repo("git@github.com:me/dots.git").unwrap(),
            remote
        );
        assert!(config.remove_repo("git@github.com:me/dots.git").is_err());
        assert_eq!(config.repos, vec![local]);
    }

    #[test]
    fn test_same_named_remotes_get_distinct_mirrors() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.cache.dir = Some(tmp.path().join("cache"));

        let alice = config
            .add_repo("https://github.com/alice/dotfiles")
            .unwrap()
            .clone();
        let bob = config
            .add_repo("https://github.com/bob/dotfiles")
            .unwrap()
            .clone();
        let carol = config
            .add_repo("git@gitlab.com:carol/dotfiles.git")
            .unwrap()
            .clone();

        let cache = tmp.path().join("cache");
        assert_eq!(alice.cache_path, Some(cache.join("dotfiles")));
        assert_eq!(bob.cache_path, Some(cache.join("dotfiles-2")));
        assert_eq!(carol.cache_path, Some(cache.join("dotfiles-3")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_shared_mirror() {
        let mut config = Config::default();
        config.cache.dir = Some(PathBuf::from("/var/cache/codex"));
        config.repos = vec![
            RepositoryDescriptor::remote("https://github.com/alice/dotfiles"),
            RepositoryDescriptor::remote("https://github.com/bob/dotfiles.git"),
        ];
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("share mirror directory"), "{}", err);

        config.repos[1].cache_path = Some(PathBuf::from("/var/cache/codex/bob-dotfiles"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_round_trips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/config.toml");
        let mut config = Config::default();
        config.dotfiles_path = Some(PathBuf::from("/home/me/dotfiles"));
        config.repos.push(RepositoryDescriptor::remote("https://x.org/y.git"));

        config.save(&path).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        let parsed: Config = toml::from_str(&body).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| match key {
            ENV_NIX_CONFIG => Some("/etc/nixos".to_string()),
            ENV_CACHE_DIR => Some("/tmp/mirrors".to_string()),
            ENV_DOTFILES => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.nix_config_path, Some(PathBuf::from("/etc/nixos")));
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/mirrors"));
        assert_eq!(config.dotfiles_path, None);
    }

    #[test]
    fn test_remote_source_detection() {
        assert!(is_remote_source("https://github.com/a/b"));
        assert!(is_remote_source("ssh://git@host/a/b.git"));
        assert!(is_remote_source("git@github.com:a/b.git"));
        assert!(!is_remote_source("/home/me/repo"));
        assert!(!is_remote_source("./repo"));
        assert!(!is_remote_source("/mnt/user@host:x"));
    }
}
