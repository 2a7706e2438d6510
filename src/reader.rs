//! Repository content reader.
//!
//! Walks a repository tree in file-name order, prunes denied directories
//! without descending into them, and reads every surviving text file into a
//! [`RepoContents`]. The walk aborts once the accumulated size passes the
//! total ceiling.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use crate::cancel::CancelToken;
use crate::error::{ContextError, Result};
use crate::filter::{is_binary, should_skip_dir, should_skip_file};
use crate::models::{FileRecord, RepoContents};

pub const DEFAULT_MAX_FILE_BYTES: u64 = 100 * 1024;
pub const DEFAULT_MAX_TOTAL_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Files larger than this are skipped.
    pub max_file_bytes: u64,
    /// Once the running total exceeds this, the walk stops.
    pub max_total_bytes: usize,
    pub include_hidden: bool,
    /// Extra patterns matched against the `/`-separated relative path.
    pub exclude_globs: Vec<String>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            include_hidden: true,
            exclude_globs: Vec::new(),
        }
    }
}

pub struct ContentReader {
    options: ReaderOptions,
    exclude_set: GlobSet,
}

impl ContentReader {
    pub fn new(options: ReaderOptions) -> Result<Self> {
        let exclude_set = build_globset(&options.exclude_globs)?;
        Ok(Self {
            options,
            exclude_set,
        })
    }

    /// Read all signal files under `root`.
    ///
    /// Only an unreadable root is an error; entries that fail to stat or
    /// read are skipped. If `cancel` fires mid-walk the partial contents are
    /// dropped and [`ContextError::Cancelled`] is returned.
    pub fn read(&self, root: &Path, cancel: &CancelToken) -> Result<RepoContents> {
        let metadata = fs::metadata(root).map_err(|e| ContextError::io(root, e))?;
        if !metadata.is_dir() {
            return Err(ContextError::io(
                root,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            ));
        }

        let include_hidden = self.options.include_hidden;
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_pruned(entry, include_hidden));

        let mut contents = RepoContents::default();

        for entry in walker {
            if cancel.is_cancelled() {
                return Err(ContextError::Cancelled);
            }
            if contents.total_size_bytes > self.options.max_total_bytes {
                break;
            }

            let Ok(entry) = entry else { continue };
            if entry.file_type().is_dir() {
                continue;
            }
            if let Some(record) = self.read_entry(root, &entry) {
                contents.push(record);
            }
        }

        Ok(contents)
    }

    fn read_entry(&self, root: &Path, entry: &DirEntry) -> Option<FileRecord> {
        let path = entry.path();
        // Follows symlinks so linked files are read like regular ones.
        let metadata = fs::metadata(path).ok()?;
        if !metadata.is_file() {
            return None;
        }

        let name = entry.file_name().to_string_lossy();
        if should_skip_file(
            &name,
            metadata.len(),
            self.options.max_file_bytes,
            self.options.include_hidden,
        )
        .is_some()
        {
            return None;
        }

        let relative = relative_path(root, path);
        if self.exclude_set.is_match(&relative) {
            return None;
        }

        let bytes = fs::read(path).ok()?;
        if is_binary(&bytes) {
            return None;
        }

        let content = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };

        Some(FileRecord::new(path, relative, content))
    }
}

fn is_pruned(entry: &DirEntry, include_hidden: bool) -> bool {
    // The root itself is never pruned, even when it is a hidden directory.
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    should_skip_dir(&entry.file_name().to_string_lossy(), include_hidden)
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| ContextError::Config(format!("invalid exclude glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ContextError::Config(format!("failed to build exclude globs: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn reader() -> ContentReader {
        ContentReader::new(ReaderOptions::default()).unwrap()
    }

    fn paths(contents: &RepoContents) -> Vec<&str> {
        contents
            .files
            .iter()
            .map(|f| f.relative_path.as_str())
            .collect()
    }

    #[test]
    fn test_prunes_dependency_dirs() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "node_modules/big.json", &vec![b'x'; 5 * 1024 * 1024]);
        write(tmp.path(), "src/main.go", &vec![b'a'; 1024]);

        let contents = reader().read(tmp.path(), &CancelToken::new()).unwrap();
        assert_eq!(paths(&contents), vec!["src/main.go"]);
        assert_eq!(contents.total_size_bytes, 1024);
        assert_eq!(contents.total_file_count, 1);
    }

    #[test]
    fn test_order_is_lexical_and_stable() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "b.rs", b"b");
        write(tmp.path(), "a/z.rs", b"z");
        write(tmp.path(), "a/c.rs", b"c");
        write(tmp.path(), "c.sh", b"c");

        let first = reader().read(tmp.path(), &CancelToken::new()).unwrap();
        let second = reader().read(tmp.path(), &CancelToken::new()).unwrap();
        assert_eq!(paths(&first), vec!["a/c.rs", "a/z.rs", "b.rs", "c.sh"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_skips_binary_denied_and_oversized() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "blob.rs", &[b'a', 0, b'b']);
        write(tmp.path(), "logo.png", b"not really png");
        write(tmp.path(), "notes.md", b"# notes");
        write(tmp.path(), "yarn.lock", b"lock");
        write(tmp.path(), "huge.rs", &vec![b'a'; 100 * 1024 + 1]);
        write(tmp.path(), "ok.rs", b"fn main() {}");

        let contents = reader().read(tmp.path(), &CancelToken::new()).unwrap();
        assert_eq!(paths(&contents), vec!["ok.rs"]);
    }

    #[test]
    fn test_hidden_entries_follow_flag() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), ".zshrc", b"export A=1");
        write(tmp.path(), ".config/nvim/init.lua", b"vim.o.number = true");
        write(tmp.path(), "main.rs", b"fn main() {}");

        let with_hidden = reader().read(tmp.path(), &CancelToken::new()).unwrap();
        assert_eq!(
            paths(&with_hidden),
            vec![".config/nvim/init.lua", ".zshrc", "main.rs"]
        );

        let no_hidden = ContentReader::new(ReaderOptions {
            include_hidden: false,
            ..ReaderOptions::default()
        })
        .unwrap()
        .read(tmp.path(), &CancelToken::new())
        .unwrap();
        assert_eq!(paths(&no_hidden), vec!["main.rs"]);
    }

    #[test]
    fn test_total_ceiling_aborts_walk() {
        let tmp = TempDir::new().unwrap();
        for name in ["a.rs", "b.rs", "c.rs", "d.rs"] {
            write(tmp.path(), name, &vec![b'x'; 600]);
        }
        let reader = ContentReader::new(ReaderOptions {
            max_total_bytes: 1000,
            ..ReaderOptions::default()
        })
        .unwrap();

        let contents = reader.read(tmp.path(), &CancelToken::new()).unwrap();
        // a (600) then b pushes the total to 1200 > 1000; nothing after.
        assert_eq!(paths(&contents), vec!["a.rs", "b.rs"]);
    }

    #[test]
    fn test_exclude_globs() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "gen/schema.rs", b"generated");
        write(tmp.path(), "src/lib.rs", b"pub fn x() {}");
        let reader = ContentReader::new(ReaderOptions {
            exclude_globs: vec!["gen/**".to_string()],
            ..ReaderOptions::default()
        })
        .unwrap();

        let contents = reader.read(tmp.path(), &CancelToken::new()).unwrap();
        assert_eq!(paths(&contents), vec!["src/lib.rs"]);
    }

    #[test]
    fn test_invalid_glob_is_config_error() {
        let err = ContentReader::new(ReaderOptions {
            exclude_globs: vec!["a[".to_string()],
            ..ReaderOptions::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, ContextError::Config(_)));
    }

    #[test]
    fn test_missing_root_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = reader()
            .read(&tmp.path().join("missing"), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, ContextError::Io { .. }));
    }

    #[test]
    fn test_cancelled_read_discards_contents() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.rs", b"a");
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = reader().read(tmp.path(), &cancel).unwrap_err();
        assert!(matches!(err, ContextError::Cancelled));
    }
}
