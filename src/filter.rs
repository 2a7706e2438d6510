//! Static exclusion tables for repository walks.
//!
//! Every rule here is data: directory names, filename suffixes, and exact
//! filenames. The predicates are pure so the reader and tests share them.

/// Directory names whose whole subtree is never visited.
pub const SKIP_DIRS: &[&str] = &[
    // Version control
    ".git",
    // Dependencies
    "node_modules",
    "vendor",
    // Build / dist
    "dist",
    "build",
    "target",
    ".next",
    ".nuxt",
    "out",
    // Caches
    ".cache",
    ".npm",
    ".yarn",
    ".gradle",
    ".m2",
    ".turbo",
    "tmp",
    "temp",
    ".tmp",
    "Cache",
    "GPUCache",
    "Code Cache",
    "DawnCache",
    "IndexedDB",
    "LocalStorage",
    "SessionStorage",
    "Service Worker",
    "adblock",
    // Python
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".venv",
    "venv",
    ".tox",
    // Coverage
    "coverage",
    ".coverage",
    ".nyc_output",
    // IDE / editor
    ".idea",
    ".vscode",
    ".DS_Store",
    // Browser / Electron profile data
    "Dictionaries",
    "WebStorage",
    "Partitions",
    "DawnGraphiteCache",
    "DawnWebGPUCache",
    // Nix result symlinks
    "result",
];

/// Lowercase filename suffixes that mark non-signal files.
///
/// Matched with `ends_with`, so multi-part suffixes such as `.min.js` work.
pub const SKIP_EXTENSIONS: &[&str] = &[
    // Images
    ".png", ".jpg", ".jpeg", ".gif", ".ico", ".svg", ".webp", ".bmp", ".tiff", ".tif",
    // Documents
    ".pdf", ".doc", ".docx", ".md", ".txt",
    // Archives
    ".zip", ".tar", ".gz", ".bz2", ".xz", ".rar", ".7z",
    // Executables / libraries
    ".exe", ".dll", ".so", ".dylib", ".o", ".a", ".pyc", ".class",
    // Lockfiles / checksums
    ".lock", ".sum",
    // Compiled / bundled
    ".wasm", ".min.js", ".min.css", ".map", ".bundle.js", ".chunk.js", ".asar", ".pak",
    // Databases
    ".db", ".sqlite", ".sqlite3", ".mdb", ".accdb", ".ldb", ".leveldb", ".indexeddb",
    // Media
    ".mp4", ".mov", ".avi", ".mkv", ".webm", ".mp3", ".wav", ".flac", ".ogg", ".m4a",
    // Fonts
    ".woff", ".woff2", ".ttf", ".eot", ".otf",
    // Design files
    ".psd", ".ai", ".sketch", ".fig", ".xd",
    // Editor
    ".iml", ".swp", ".swo",
    // Logs and data
    ".log", ".bdic", ".dat", ".bin", ".data", ".cache",
];

/// Exact filenames that are never included.
pub const SKIP_FILES: &[&str] = &[
    // Package manager lockfiles
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "Gemfile.lock",
    "composer.lock",
    "poetry.lock",
    "go.sum",
    // OS metadata
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
    // Browser / Electron profile state
    "Cookies",
    "Cookies-journal",
    "History",
    "History-journal",
    "Preferences",
    "Current Session",
    "Current Tabs",
    "Last Session",
    "Last Tabs",
    "Network Persistent State",
    "TransportSecurity",
    "Web Data",
    "Web Data-journal",
    "DIPS",
    "DIPS-wal",
    "Trust Tokens",
    "Shared Dictionary",
    "QuotaManager",
    "QuotaManager-journal",
    // Mirror staleness sentinel
    crate::fetcher::SENTINEL_FILE,
];

/// Number of leading bytes inspected by [`is_binary`].
pub const BINARY_SNIFF_LEN: usize = 512;

pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Whether a directory's subtree should be pruned.
pub fn should_skip_dir(name: &str, include_hidden: bool) -> bool {
    if !include_hidden && is_hidden(name) {
        return true;
    }
    SKIP_DIRS.contains(&name)
}

/// Why a candidate file was rejected before its content was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TooLarge,
    Hidden,
    Extension,
    Filename,
}

/// Metadata-only file checks, evaluated in order and short-circuiting.
///
/// The binary sniff needs the file's bytes and is applied separately by the
/// reader via [`is_binary`].
pub fn should_skip_file(
    name: &str,
    size: u64,
    max_file_bytes: u64,
    include_hidden: bool,
) -> Option<SkipReason> {
    if size > max_file_bytes {
        return Some(SkipReason::TooLarge);
    }
    if !include_hidden && is_hidden(name) {
        return Some(SkipReason::Hidden);
    }
    let lower = name.to_ascii_lowercase();
    if SKIP_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return Some(SkipReason::Extension);
    }
    if SKIP_FILES.contains(&name) {
        return Some(SkipReason::Filename);
    }
    None
}

/// A NUL byte within the first [`BINARY_SNIFF_LEN`] bytes marks binary content.
pub fn is_binary(content: &[u8]) -> bool {
    let check_len = content.len().min(BINARY_SNIFF_LEN);
    content[..check_len].contains(&0)
}
