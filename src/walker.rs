//! Directory traversal with gitignore support.
//!
//! Uses the `ignore` crate to walk directories while respecting
//! .gitignore, .git/info/exclude, global gitignore, and .pareignore.

use std::path::{Path, PathBuf};

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use thiserror::Error;

/// Per-directory ignore file read in addition to .gitignore.
pub const IGNORE_FILE_NAME: &str = ".pareignore";

/// Dependency, build and cache paths skipped unless disabled.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "node_modules",
    "bower_components",
    "jspm_packages",
    "vendor",
    "target",
    "dist",
    "build",
    "out",
    "coverage",
    ".next",
    ".nuxt",
    ".gradle",
    ".idea",
    ".vscode",
    "__pycache__",
    "*.py[cod]",
    "venv",
    ".venv",
    ".tox",
    ".pytest_cache",
    ".mypy_cache",
    ".ipynb_checkpoints",
    "*.log",
    "*.swp",
    "*.bak",
    "*.tgz",
    "*.rs.bk",
    ".DS_Store",
    "Thumbs.db",
];

/// Errors that can occur during directory walking.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ignore pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Options for directory walking.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Maximum depth to recurse (None = unlimited).
    pub max_depth: Option<usize>,
    /// Follow symbolic links.
    pub follow_symlinks: bool,
    /// Include hidden files and directories.
    pub include_hidden: bool,
    /// Respect .gitignore patterns.
    pub respect_gitignore: bool,
    /// Apply [`DEFAULT_IGNORE_PATTERNS`].
    pub use_default_ignore: bool,
    /// Extra gitignore-style patterns to exclude.
    pub ignore_patterns: Vec<String>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            follow_symlinks: false,
            include_hidden: false,
            respect_gitignore: true,
            use_default_ignore: true,
            ignore_patterns: Vec::new(),
        }
    }
}

impl WalkOptions {
    /// Create options that include hidden files.
    pub fn with_hidden() -> Self {
        Self {
            include_hidden: true,
            ..Default::default()
        }
    }

    /// Set maximum depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Turn the built-in dependency and build patterns on or off.
    pub fn default_ignore(mut self, enabled: bool) -> Self {
        self.use_default_ignore = enabled;
        self
    }

    /// Exclude paths matching these patterns.
    pub fn ignore_patterns(mut self, patterns: &[String]) -> Self {
        self.ignore_patterns = patterns.to_vec();
        self
    }
}

/// A file found by the walk.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    /// Path to the file.
    pub path: PathBuf,
    /// Path relative to the walk root.
    pub relative: PathBuf,
    /// Depth from root (root = 0).
    pub depth: usize,
    /// File size in bytes.
    pub size: u64,
}

/// Walk a directory tree, yielding files.
///
/// Respects .gitignore and .pareignore patterns automatically.
///
/// # Examples
///
/// ```no_run
/// use pare::walker::walk;
/// use std::path::Path;
///
/// for entry in walk(Path::new(".")).flatten() {
///     println!("{}", entry.relative.display());
/// }
/// ```
pub fn walk(root: &Path) -> impl Iterator<Item = Result<WalkEntry, WalkError>> {
    walk_with_options(root, &WalkOptions::default())
}

/// Walk a directory tree with custom options.
///
/// A root that is a single file yields just that file.
pub fn walk_with_options(
    root: &Path,
    options: &WalkOptions,
) -> impl Iterator<Item = Result<WalkEntry, WalkError>> {
    let root = root.to_path_buf();

    if !root.exists() {
        return itertools_lite::Either::Left(std::iter::once(Err(WalkError::NotFound {
            path: root,
        })));
    }

    let mut builder = WalkBuilder::new(&root);

    builder
        .hidden(!options.include_hidden)
        .git_ignore(options.respect_gitignore)
        .git_global(options.respect_gitignore)
        .git_exclude(options.respect_gitignore)
        .follow_links(options.follow_symlinks)
        .add_custom_ignore_filename(IGNORE_FILE_NAME);

    if let Some(depth) = options.max_depth {
        builder.max_depth(Some(depth));
    }

    let mut patterns: Vec<String> = Vec::new();
    if options.use_default_ignore {
        patterns.extend(DEFAULT_IGNORE_PATTERNS.iter().map(|p| p.to_string()));
    }
    patterns.extend(options.ignore_patterns.iter().cloned());

    if !patterns.is_empty() {
        match build_overrides(&root, &patterns) {
            Ok(overrides) => {
                builder.overrides(overrides);
            }
            Err(e) => return itertools_lite::Either::Left(std::iter::once(Err(e))),
        }
    }

    let walker = builder.build();
    let base = if root.is_dir() {
        root.clone()
    } else {
        root.parent().map(Path::to_path_buf).unwrap_or_default()
    };

    itertools_lite::Either::Right(walker.filter_map(move |result| match result {
        Ok(entry) => {
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                return None;
            }
            let path = entry.path().to_path_buf();
            let relative = path
                .strip_prefix(&base)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.clone());
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);

            Some(Ok(WalkEntry {
                path,
                relative,
                depth: entry.depth(),
                size,
            }))
        }
        Err(e) => io_error(e),
    }))
}

/// Ignore patterns become negated overrides.
fn build_overrides(
    root: &Path,
    patterns: &[String],
) -> Result<ignore::overrides::Override, WalkError> {
    let mut overrides = OverrideBuilder::new(root);
    for pattern in patterns {
        overrides
            .add(&format!("!{pattern}"))
            .map_err(|e| WalkError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
    }
    overrides.build().map_err(|e| WalkError::InvalidPattern {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

/// Convert ignore errors to our error type; non-IO errors (like gitignore
/// parse errors) are skipped.
fn io_error(error: ignore::Error) -> Option<Result<WalkEntry, WalkError>> {
    match error {
        ignore::Error::WithPath { path, err } => match *err {
            ignore::Error::Io(source) => Some(Err(classify_io(path, source))),
            _ => None,
        },
        ignore::Error::Io(source) => Some(Err(classify_io(PathBuf::from("<walk error>"), source))),
        _ => None,
    }
}

fn classify_io(path: PathBuf, source: std::io::Error) -> WalkError {
    if source.kind() == std::io::ErrorKind::PermissionDenied {
        WalkError::PermissionDenied { path }
    } else {
        WalkError::Io { path, source }
    }
}

/// Simple Either type to avoid adding itertools dependency.
mod itertools_lite {
    pub enum Either<L, R> {
        Left(L),
        Right(R),
    }

    impl<L, R, T> Iterator for Either<L, R>
    where
        L: Iterator<Item = T>,
        R: Iterator<Item = T>,
    {
        type Item = T;

        fn next(&mut self) -> Option<Self::Item> {
            match self {
                Either::Left(l) => l.next(),
                Either::Right(r) => r.next(),
            }
        }
    }
}
