//! Static relevance heuristic for file prioritization.
//!
//! A file's score is the sum of the deltas of every [`Rule`] it matches.
//! Rules are independent of each other and of evaluation order.

use crate::models::FileRecord;

/// Well-known configuration filenames.
pub const CONFIG_FILES: &[&str] = &[
    "flake.nix",
    "configuration.nix",
    "home.nix",
    "hardware-configuration.nix",
    ".bashrc",
    ".zshrc",
    ".vimrc",
    ".nvimrc",
    "init.vim",
    "init.lua",
    "config.toml",
    "config.yaml",
    "config.yml",
    "config.json",
    ".gitconfig",
    ".tmux.conf",
    "alacritty.yml",
    "kitty.conf",
];

pub const SHELL_EXTENSIONS: &[&str] = &[".sh", ".bash", ".zsh", ".fish"];

pub const SOURCE_EXTENSIONS: &[&str] = &[
    ".go", ".rs", ".py", ".js", ".ts", ".c", ".cpp", ".h", ".hpp",
];

pub const DOC_EXTENSIONS: &[&str] = &[".md", ".txt", ".rst"];

pub const SMALL_FILE_BYTES: usize = 5_000;
pub const LARGE_FILE_BYTES: usize = 50_000;

/// Precomputed attributes a rule predicate looks at.
#[derive(Debug, Clone)]
pub struct FileFacts<'a> {
    pub file_name: &'a str,
    pub lower_name: String,
    /// Lowercase final extension including the dot, or empty.
    pub extension: String,
    pub at_root: bool,
    pub size_bytes: usize,
}

impl<'a> FileFacts<'a> {
    pub fn of(file: &'a FileRecord) -> Self {
        let file_name = file.file_name();
        let lower_name = file_name.to_ascii_lowercase();
        let extension = match lower_name.rfind('.') {
            Some(idx) => lower_name[idx..].to_string(),
            None => String::new(),
        };
        Self {
            file_name,
            lower_name,
            extension,
            at_root: !file.relative_path.contains('/'),
            size_bytes: file.size_bytes,
        }
    }
}

pub struct Rule {
    pub name: &'static str,
    pub delta: i64,
    pub applies: fn(&FileFacts) -> bool,
}

pub const RULES: &[Rule] = &[
    Rule {
        name: "config-file",
        delta: 1000,
        applies: |f| CONFIG_FILES.contains(&f.file_name),
    },
    Rule {
        name: "nix",
        delta: 800,
        applies: |f| f.extension == ".nix",
    },
    Rule {
        name: "shell",
        delta: 600,
        applies: |f| SHELL_EXTENSIONS.contains(&f.extension.as_str()),
    },
    Rule {
        name: "source",
        delta: 400,
        applies: |f| SOURCE_EXTENSIONS.contains(&f.extension.as_str()),
    },
    Rule {
        name: "docs",
        delta: 200,
        applies: |f| DOC_EXTENSIONS.contains(&f.extension.as_str()),
    },
    Rule {
        name: "root",
        delta: 100,
        applies: |f| f.at_root,
    },
    Rule {
        name: "readme",
        delta: 150,
        applies: |f| f.lower_name.starts_with("readme"),
    },
    Rule {
        name: "test",
        delta: -50,
        applies: |f| f.lower_name.contains("test"),
    },
    Rule {
        name: "small",
        delta: 50,
        applies: |f| f.size_bytes < SMALL_FILE_BYTES,
    },
    Rule {
        name: "large",
        delta: -50,
        applies: |f| f.size_bytes > LARGE_FILE_BYTES,
    },
];

pub fn score_file(file: &FileRecord) -> i64 {
    let facts = FileFacts::of(file);
    RULES
        .iter()
        .filter(|rule| (rule.applies)(&facts))
        .map(|rule| rule.delta)
        .sum()
}

/// Names of the rules a file matches, for debugging score decisions.
pub fn matched_rules(file: &FileRecord) -> Vec<&'static str> {
    let facts = FileFacts::of(file);
    RULES
        .iter()
        .filter(|rule| (rule.applies)(&facts))
        .map(|rule| rule.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(rel: &str, size: usize) -> FileRecord {
        FileRecord::new(format!("/repo/{}", rel), rel, "x".repeat(size))
    }

    #[test]
    fn test_flake_outranks_notes() {
        let flake = file("flake.nix", 100);
        let notes = file("notes.md", 100);
        // config + nix + root + small
        assert_eq!(score_file(&flake), 1000 + 800 + 100 + 50);
        // docs + root + small
        assert_eq!(score_file(&notes), 200 + 100 + 50);
        assert!(score_file(&flake) > score_file(&notes));
    }

    #[test]
    fn test_nested_source_file() {
        assert_eq!(score_file(&file("src/main.rs", 6_000)), 400);
        assert_eq!(matched_rules(&file("src/main.rs", 6_000)), vec!["source"]);
    }

    #[test]
    fn test_readme_and_test_modifiers_are_case_insensitive() {
        // readme + root + small, no extension tier
        assert_eq!(score_file(&file("README", 10)), 150 + 100 + 50);
        assert_eq!(score_file(&file("pkg/Test_utils.py", 10)), 400 - 50 + 50);
    }

    #[test]
    fn test_size_modifiers() {
        assert_eq!(score_file(&file("a/b.json", 4_999)), 50);
        assert_eq!(score_file(&file("a/b.json", 5_000)), 0);
        assert_eq!(score_file(&file("a/b.json", 50_000)), 0);
        assert_eq!(score_file(&file("a/b.json", 50_001)), -50);
    }

    #[test]
    fn test_shell_rc_counts_filename_not_extension() {
        // ".zshrc" has extension ".zshrc", not ".zsh".
        assert_eq!(score_file(&file(".zshrc", 10)), 1000 + 100 + 50);
        assert_eq!(score_file(&file("bin/setup.sh", 10)), 600 + 50);
    }
}
