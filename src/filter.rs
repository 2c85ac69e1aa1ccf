//! File filtering and language detection.
//!
//! Decides which files enter the pack and which grammar, if any, a file
//! is compressed with. Content heuristics look only at the first KB.

use std::path::Path;

use thiserror::Error;

/// Languages with a built-in grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    Python,
    Rust,
    Go,
    TypeScript,
    Tsx,
    JavaScript,
    Jsx,
    Java,
}

impl Language {
    /// All supported languages, in display order.
    pub fn all() -> &'static [Language] {
        &[
            Language::Python,
            Language::Rust,
            Language::Go,
            Language::TypeScript,
            Language::Tsx,
            Language::JavaScript,
            Language::Jsx,
            Language::Java,
        ]
    }

    /// File extensions (without the dot) mapped to this language.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["py", "pyi"],
            Language::Rust => &["rs"],
            Language::Go => &["go"],
            Language::TypeScript => &["ts", "mts", "cts"],
            Language::Tsx => &["tsx"],
            Language::JavaScript => &["js", "mjs", "cjs"],
            Language::Jsx => &["jsx"],
            Language::Java => &["java"],
        }
    }

    /// Look up a language by file extension.
    pub fn from_extension(ext: &str) -> Option<Language> {
        let ext = ext.to_ascii_lowercase();
        Language::all()
            .iter()
            .copied()
            .find(|lang| lang.extensions().contains(&ext.as_str()))
    }

    /// Fenced-code tag used by the markdown renderer.
    pub fn fence_tag(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::JavaScript => "javascript",
            Language::Jsx => "jsx",
            Language::Java => "java",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Language::Python => "Python",
            Language::Rust => "Rust",
            Language::Go => "Go",
            Language::TypeScript => "TypeScript",
            Language::Tsx => "TSX",
            Language::JavaScript => "JavaScript",
            Language::Jsx => "JSX",
            Language::Java => "Java",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Language {
    type Err = FilterError;

    /// Accepts language names as well as bare extensions.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().trim_start_matches('.').to_ascii_lowercase();
        match lower.as_str() {
            "python" => Ok(Language::Python),
            "rust" => Ok(Language::Rust),
            "go" | "golang" => Ok(Language::Go),
            "typescript" => Ok(Language::TypeScript),
            "javascript" => Ok(Language::JavaScript),
            "java" => Ok(Language::Java),
            other => Language::from_extension(other)
                .ok_or_else(|| FilterError::UnknownLanguage(s.to_string())),
        }
    }
}

/// Errors raised while filtering.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("unknown language: {0}")]
    UnknownLanguage(String),

    #[error("invalid include pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Why a file was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptReason {
    /// Recognised source language.
    Source(Language),
    /// Text file without a grammar; packed verbatim.
    Text,
}

/// Why a file was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Binary,
    Minified,
    Generated,
    Lockfile,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Binary => write!(f, "binary"),
            RejectReason::Minified => write!(f, "minified"),
            RejectReason::Generated => write!(f, "generated"),
            RejectReason::Lockfile => write!(f, "lockfile"),
        }
    }
}

/// Outcome of filtering a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    Accept(AcceptReason),
    Reject(RejectReason),
}

const LOCKFILES: &[&str] = &[
    "Cargo.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
    "go.sum",
];

const GENERATED_MARKERS: &[&str] = &[
    "@generated",
    "Code generated by",
    "DO NOT EDIT",
    "auto-generated",
];

/// Longest average line length before a file counts as minified.
const MINIFIED_LINE_LEN: usize = 500;

/// Detect the language of a path from its extension.
pub fn detect_language(path: &Path) -> Option<Language> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(Language::from_extension)
}

/// Decide whether a file should be packed.
///
/// `head` is the first KB of the file when available.
pub fn should_process(path: &Path, head: Option<&[u8]>) -> FilterResult {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if LOCKFILES.contains(&name) {
        return FilterResult::Reject(RejectReason::Lockfile);
    }
    if name.contains(".min.") {
        return FilterResult::Reject(RejectReason::Minified);
    }

    if let Some(head) = head {
        if head.contains(&0) || std::str::from_utf8(trim_partial_char(head)).is_err() {
            return FilterResult::Reject(RejectReason::Binary);
        }

        let text = String::from_utf8_lossy(head);
        if GENERATED_MARKERS.iter().any(|m| text.contains(m)) {
            return FilterResult::Reject(RejectReason::Generated);
        }

        let lines = bytecount::count(head, b'\n').max(1);
        if head.len() >= 1024 && head.len() / lines > MINIFIED_LINE_LEN {
            return FilterResult::Reject(RejectReason::Minified);
        }
    }

    match detect_language(path) {
        Some(lang) => FilterResult::Accept(AcceptReason::Source(lang)),
        None => FilterResult::Accept(AcceptReason::Text),
    }
}

/// A 1KB prefix may split a multi-byte character; ignore the tail.
fn trim_partial_char(bytes: &[u8]) -> &[u8] {
    match std::str::from_utf8(bytes) {
        Ok(_) => bytes,
        Err(e) if e.error_len().is_none() => &bytes[..e.valid_up_to()],
        Err(_) => bytes,
    }
}

/// Compiled include globs. An empty set matches everything.
#[derive(Debug, Clone, Default)]
pub struct IncludeSet {
    patterns: Vec<glob::Pattern>,
}

impl IncludeSet {
    pub fn new(patterns: &[String]) -> Result<Self, FilterError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| FilterError::InvalidPattern {
                    pattern: p.clone(),
                    message: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Match a path relative to the pack root.
    pub fn matches(&self, relative: &Path) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let rel = relative.to_string_lossy().replace('\\', "/");
        self.patterns.iter().any(|p| p.matches(&rel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language(Path::new("a/b.py")), Some(Language::Python));
        assert_eq!(detect_language(Path::new("main.RS")), Some(Language::Rust));
        assert_eq!(detect_language(Path::new("App.tsx")), Some(Language::Tsx));
        assert_eq!(detect_language(Path::new("Main.java")), Some(Language::Java));
        assert_eq!(detect_language(Path::new("README.md")), None);
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("python".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("py".parse::<Language>().unwrap(), Language::Python);
        assert_eq!(".rs".parse::<Language>().unwrap(), Language::Rust);
        assert_eq!("TypeScript".parse::<Language>().unwrap(), Language::TypeScript);
        assert!("cobol".parse::<Language>().is_err());
    }

    #[test]
    fn test_rejects_binary() {
        let result = should_process(Path::new("x.rs"), Some(&[0x7f, b'E', 0, 1]));
        assert_eq!(result, FilterResult::Reject(RejectReason::Binary));
    }

    #[test]
    fn test_rejects_minified_and_lockfiles() {
        assert_eq!(
            should_process(Path::new("bundle.min.js"), None),
            FilterResult::Reject(RejectReason::Minified)
        );
        assert_eq!(
            should_process(Path::new("Cargo.lock"), None),
            FilterResult::Reject(RejectReason::Lockfile)
        );

        let long_line = vec![b'a'; 2048];
        assert_eq!(
            should_process(Path::new("x.js"), Some(&long_line)),
            FilterResult::Reject(RejectReason::Minified)
        );
    }

    #[test]
    fn test_rejects_generated() {
        let head = b"// Code generated by protoc. DO NOT EDIT.\npackage x\n";
        assert_eq!(
            should_process(Path::new("x.pb.go"), Some(head)),
            FilterResult::Reject(RejectReason::Generated)
        );
    }

    #[test]
    fn test_accepts_text_and_source() {
        assert_eq!(
            should_process(Path::new("notes.txt"), Some(b"hello\n")),
            FilterResult::Accept(AcceptReason::Text)
        );
        assert_eq!(
            should_process(Path::new("lib.rs"), Some(b"fn main() {}\n")),
            FilterResult::Accept(AcceptReason::Source(Language::Rust))
        );
    }

    #[test]
    fn test_split_utf8_prefix_is_not_binary() {
        let text = "é".repeat(600);
        let head = &text.as_bytes()[..1023];
        assert!(matches!(
            should_process(Path::new("a.py"), Some(head)),
            FilterResult::Accept(_)
        ));
    }

    #[test]
    fn test_include_set() {
        let set = IncludeSet::new(&["src/**/*.py".to_string()]).unwrap();
        assert!(set.matches(&PathBuf::from("src/pkg/mod.py")));
        assert!(!set.matches(&PathBuf::from("tests/test_mod.py")));
        assert!(IncludeSet::default().matches(&PathBuf::from("anything")));
        assert!(IncludeSet::new(&["[".to_string()]).is_err());
    }
}
