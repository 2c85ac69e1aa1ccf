//! Pare - Pack a codebase into structurally compressed LLM context.
//!
//! Pare walks a directory tree, filters out what a model should not see, and
//! compresses each source file by parsing it with tree-sitter and keeping
//! only the parts the chosen mode asks for: imports, signatures, docstrings.
//! Every byte of compressed output is either original source or a short
//! placeholder.
//!
//! # Quick Start
//!
//! ```no_run
//! use pare::compress::syntax::GrammarRegistry;
//! use pare::config::{CompressionConfig, CompressionMode};
//! use pare::output::{format_output, OutputOptions};
//! use pare::Pare;
//!
//! let registry = GrammarRegistry::builtin();
//! let result = Pare::new("./my-project")
//!     .compression(CompressionConfig::with_mode(CompressionMode::Interface))
//!     .build(&registry)
//!     .unwrap();
//!
//! println!("{}", format_output(&result, &OutputOptions::default()).unwrap());
//! println!("Saved {} tokens", result.total_tokens().saved());
//! ```
//!
//! Single files go straight through the engine:
//!
//! ```
//! use pare::compress::{compress, syntax::GrammarRegistry};
//! use pare::config::{CompressionConfig, CompressionMode};
//!
//! let registry = GrammarRegistry::builtin();
//! let config = CompressionConfig::with_mode(CompressionMode::Interface);
//! let result = compress(&registry, "def f(x):\n    return x\n", "python", &config);
//! assert!(result.compressed);
//! assert!(!result.text.contains("return"));
//! ```
//!
//! # Modules
//!
//! - [`compress`] - Structural compression engine
//! - [`config`] - Compression settings and `pare.config.json` loading
//! - [`filter`] - Language detection and content heuristics
//! - [`walker`] - Directory traversal with gitignore support
//! - [`tokens`] - Token counting for LLM context budgets
//! - [`pipeline`] - Fluent API for packing a directory
//! - [`tree`] - Directory structure rendering
//! - [`output`] - XML, Markdown and JSON renderers
//!
//! # Supported Languages
//!
//! - Python (`.py`, `.pyi`)
//! - Rust (`.rs`)
//! - Go (`.go`)
//! - TypeScript (`.ts`, `.mts`, `.cts`, `.tsx`)
//! - JavaScript (`.js`, `.mjs`, `.cjs`, `.jsx`)
//! - Java (`.java`)

pub mod compress;
pub mod config;
pub mod errors;
pub mod filter;
pub mod output;
pub mod pipeline;
pub mod tokens;
pub mod tree;
pub mod walker;

// Re-export key types at crate root for convenience
pub use compress::syntax::GrammarRegistry;
pub use compress::{compress, CompressedResult, CompressionStats, SkipReason};
pub use config::{CompressionConfig, CompressionMode, ConfigError, OutputStyle, PareConfig};
pub use errors::PareError;
pub use filter::{FilterError, Language};
pub use output::OutputError;
pub use pipeline::{PackResult, PackedFile, Pare};
pub use tokens::{count_tokens, Encoding, Reduction};
pub use tree::{FileNode, NodeKind, RenderOptions};
pub use walker::WalkError;
