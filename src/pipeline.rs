//! Fluent builder that packs a codebase.
//!
//! Walks the root, filters files, then reads and compresses them in
//! parallel. The result is sorted by path so output is deterministic.

use std::io::Read;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::compress::syntax::GrammarRegistry;
use crate::compress::{compress_language, remove_empty_lines, CompressionStats, SkipReason};
use crate::config::{CompressionConfig, PareConfig};
use crate::errors::PareError;
use crate::filter::{should_process, AcceptReason, FilterResult, IncludeSet, Language};
use crate::tokens::{Encoding, Reduction};
use crate::tree::{FileMeta, FileNode};
use crate::walker::{walk_with_options, WalkEntry, WalkError, WalkOptions};

/// Bytes inspected by the content heuristics.
const HEAD_LEN: usize = 1024;

/// Builder for packing a codebase.
///
/// # Examples
///
/// ```no_run
/// use pare::compress::syntax::GrammarRegistry;
/// use pare::config::{CompressionConfig, CompressionMode};
/// use pare::pipeline::Pare;
///
/// let registry = GrammarRegistry::builtin();
/// let result = Pare::new("./project")
///     .compression(CompressionConfig::with_mode(CompressionMode::Interface))
///     .include(&["src/**".to_string()])
///     .build(&registry);
/// ```
#[derive(Debug, Clone)]
pub struct Pare {
    root: PathBuf,
    languages: Option<Vec<Language>>,
    include: Vec<String>,
    compression: CompressionConfig,
    encoding: Encoding,
    calculate_tokens: bool,
    walk_options: WalkOptions,
}

impl Pare {
    /// Create a new builder for the given root path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            languages: None,
            include: Vec::new(),
            compression: CompressionConfig::disabled(),
            encoding: Encoding::default(),
            calculate_tokens: true,
            walk_options: WalkOptions::default(),
        }
    }

    /// Create a builder from a loaded configuration.
    pub fn from_config(root: impl Into<PathBuf>, config: &PareConfig) -> Self {
        let mut pare = Self::new(root)
            .compression(config.compression_config())
            .include(&config.include)
            .encoding(config.encoding)
            .calculate_tokens(config.output.calculate_tokens)
            .ignore_patterns(&config.ignore.custom_patterns);
        pare.walk_options.respect_gitignore = config.ignore.use_gitignore;
        pare.default_ignore(config.ignore.use_default_ignore)
    }

    /// Keep only source files in these languages.
    pub fn languages(mut self, langs: &[Language]) -> Self {
        self.languages = Some(langs.to_vec());
        self
    }

    /// Keep only files matching these globs (relative to the root).
    pub fn include(mut self, patterns: &[String]) -> Self {
        self.include = patterns.to_vec();
        self
    }

    /// Exclude files matching these gitignore-style patterns.
    pub fn ignore_patterns(mut self, patterns: &[String]) -> Self {
        self.walk_options.ignore_patterns = patterns.to_vec();
        self
    }

    pub fn compression(mut self, config: CompressionConfig) -> Self {
        self.compression = config;
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Count tokens before and after packing (default: true).
    pub fn calculate_tokens(mut self, calculate: bool) -> Self {
        self.calculate_tokens = calculate;
        self
    }

    /// Skip dependency, build and cache directories (default: true).
    pub fn default_ignore(mut self, enabled: bool) -> Self {
        self.walk_options.use_default_ignore = enabled;
        self
    }

    /// Include hidden files.
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.walk_options.include_hidden = include;
        self
    }

    /// Set maximum directory depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.walk_options.max_depth = Some(depth);
        self
    }

    /// Walk, filter and pack.
    pub fn build(self, registry: &GrammarRegistry) -> Result<PackResult, PareError> {
        if !self.root.exists() {
            return Err(PareError::PathNotFound(self.root));
        }
        let include = IncludeSet::new(&self.include)?;
        let entries = self.collect_entries(&include)?;

        let mut files: Vec<PackedFile> = entries
            .into_par_iter()
            .filter_map(|entry| self.pack_file(registry, entry))
            .collect();

        if files.is_empty() {
            return Err(PareError::NoFilesFound(self.root));
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(PackResult {
            root_name: root_name(&self.root),
            encoding: self.encoding,
            files,
        })
    }

    fn collect_entries(&self, include: &IncludeSet) -> Result<Vec<WalkEntry>, PareError> {
        let mut entries = Vec::new();
        for entry in walk_with_options(&self.root, &self.walk_options) {
            match entry {
                Ok(entry) => {
                    if include.matches(&entry.relative) {
                        entries.push(entry);
                    }
                }
                Err(WalkError::NotFound { path }) => return Err(PareError::PathNotFound(path)),
                Err(e @ WalkError::InvalidPattern { .. }) => return Err(e.into()),
                Err(e) => tracing::warn!("{e}; skipping"),
            }
        }
        Ok(entries)
    }

    /// Read, filter and compress one file. `None` drops it from the pack.
    fn pack_file(&self, registry: &GrammarRegistry, entry: WalkEntry) -> Option<PackedFile> {
        let mut file = match std::fs::File::open(&entry.path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(path = %entry.path.display(), "cannot open: {e}");
                return None;
            }
        };

        let mut head = [0u8; HEAD_LEN];
        let n = match read_head(&mut file, &mut head) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(path = %entry.path.display(), "cannot read: {e}");
                return None;
            }
        };

        let language = match should_process(&entry.path, Some(&head[..n])) {
            FilterResult::Accept(AcceptReason::Source(language)) => Some(language),
            FilterResult::Accept(AcceptReason::Text) => None,
            FilterResult::Reject(reason) => {
                tracing::trace!(path = %entry.relative.display(), %reason, "skipped");
                return None;
            }
        };

        if let Some(filter) = &self.languages {
            if !language.is_some_and(|l| filter.contains(&l)) {
                tracing::trace!(path = %entry.relative.display(), "language filtered");
                return None;
            }
        }

        let mut bytes = head[..n].to_vec();
        if let Err(e) = file.read_to_end(&mut bytes) {
            tracing::warn!(path = %entry.path.display(), "cannot read: {e}");
            return None;
        }
        let original = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                tracing::trace!(path = %entry.relative.display(), "not UTF-8; skipped");
                return None;
            }
        };

        let (content, compressed, skipped, stats) = match language {
            Some(language) => {
                let result = compress_language(registry, &original, language, &self.compression);
                (result.text, result.compressed, result.skipped, result.stats)
            }
            None if self.compression.remove_empty_lines => (
                remove_empty_lines(&original),
                false,
                None,
                CompressionStats::default(),
            ),
            None => (
                original.clone(),
                false,
                Some(SkipReason::UnsupportedLanguage),
                CompressionStats::default(),
            ),
        };

        let tokens = if self.calculate_tokens {
            Reduction::measure(&original, &content, self.encoding)
        } else {
            Reduction::default()
        };

        tracing::debug!(
            path = %entry.relative.display(),
            compressed,
            original = tokens.original,
            packed = tokens.packed,
            "packed"
        );

        Some(PackedFile {
            lines: count_lines(&content),
            path: entry.relative,
            language,
            size: entry.size,
            content,
            compressed,
            skipped,
            stats,
            tokens,
        })
    }
}

/// Fill as much of `buf` as the file allows.
fn read_head(file: &mut std::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

fn count_lines(text: &str) -> usize {
    let newlines = bytecount::count(text.as_bytes(), b'\n');
    if text.is_empty() || text.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}

fn root_name(root: &Path) -> String {
    let canonical = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string())
}

/// One file in a pack.
#[derive(Debug, Clone)]
pub struct PackedFile {
    /// Path relative to the pack root.
    pub path: PathBuf,
    pub language: Option<Language>,
    /// Size of the original file in bytes.
    pub size: u64,
    /// Packed text.
    pub content: String,
    pub compressed: bool,
    pub skipped: Option<SkipReason>,
    pub stats: CompressionStats,
    /// Lines of packed text.
    pub lines: usize,
    pub tokens: Reduction,
}

/// Result of packing a codebase.
#[derive(Debug, Clone)]
pub struct PackResult {
    /// Name of the root directory.
    pub root_name: String,
    pub encoding: Encoding,
    /// Packed files, sorted by path.
    pub files: Vec<PackedFile>,
}

impl PackResult {
    /// Token counts summed over all files.
    pub fn total_tokens(&self) -> Reduction {
        self.files.iter().map(|f| f.tokens).sum()
    }

    /// Engine statistics summed over all files.
    pub fn stats(&self) -> CompressionStats {
        let mut total = CompressionStats::default();
        for file in &self.files {
            total += file.stats;
        }
        total
    }

    /// Number of files the structural engine compressed.
    pub fn compressed_count(&self) -> usize {
        self.files.iter().filter(|f| f.compressed).count()
    }

    /// Get a packed file by relative path.
    pub fn file(&self, path: &Path) -> Option<&PackedFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Directory tree of the packed files.
    pub fn tree(&self) -> FileNode {
        FileNode::from_paths(
            &self.root_name,
            self.files.iter().map(|f| {
                (
                    f.path.as_path(),
                    FileMeta {
                        language: f.language,
                        size: f.size,
                        lines: f.lines,
                        compressed: f.compressed,
                    },
                )
            }),
        )
    }
}

// ============================================================================
// Functional API
// ============================================================================

/// Pack a path with a loaded configuration.
pub fn pack_path(
    root: impl AsRef<Path>,
    config: &PareConfig,
    registry: &GrammarRegistry,
) -> Result<PackResult, PareError> {
    Pare::from_config(root.as_ref(), config).build(registry)
}
