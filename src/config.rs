//! Configuration loading.
//!
//! Settings come from `pare.config.json` files and CLI flags, merged in the
//! order defaults < global file < local file < CLI. The compression engine
//! only ever sees the resolved, read-only [`CompressionConfig`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tokens::Encoding;

/// File name searched for in the working and target directories.
pub const CONFIG_FILE_NAME: &str = "pare.config.json";

/// How aggressively definitions are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    /// Keep headers and docstrings, replace function bodies with a placeholder.
    #[default]
    Interface,
    /// Keep definitions whole; only docstring and comment rules apply.
    Signature,
    /// Drop every definition, keep module-level statements.
    Minimal,
}

impl std::fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionMode::Interface => write!(f, "interface"),
            CompressionMode::Signature => write!(f, "signature"),
            CompressionMode::Minimal => write!(f, "minimal"),
        }
    }
}

impl std::str::FromStr for CompressionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "interface" => Ok(CompressionMode::Interface),
            "signature" => Ok(CompressionMode::Signature),
            "minimal" => Ok(CompressionMode::Minimal),
            _ => Err(ConfigError::InvalidValue {
                key: "compression.mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Resolved per-run settings for the compression engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub mode: CompressionMode,
    pub keep_docstrings: bool,
    pub remove_comments: bool,
    pub remove_empty_lines: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: CompressionMode::Interface,
            keep_docstrings: true,
            remove_comments: false,
            remove_empty_lines: false,
        }
    }
}

impl CompressionConfig {
    /// Enabled compression in the given mode, everything else default.
    pub fn with_mode(mode: CompressionMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// No compression and no stripping.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Whether any tree-based processing was requested.
    pub fn needs_tree(&self) -> bool {
        self.enabled || self.remove_comments
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Output format of a pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    #[default]
    Xml,
    Markdown,
    Json,
    Plain,
}

/// `output` section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub style: OutputStyle,
    pub file_path: Option<PathBuf>,
    /// Free text placed at the top of the output.
    pub header_text: Option<String>,
    pub remove_comments: bool,
    pub remove_empty_lines: bool,
    pub calculate_tokens: bool,
    pub show_line_numbers: bool,
    /// Summary section at the end of the output.
    pub file_summary: bool,
    pub show_directory_structure: bool,
    /// Largest files listed in the summary.
    pub top_files_length: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            style: OutputStyle::Xml,
            file_path: None,
            header_text: None,
            remove_comments: false,
            remove_empty_lines: false,
            calculate_tokens: true,
            show_line_numbers: false,
            file_summary: true,
            show_directory_structure: true,
            top_files_length: 5,
        }
    }
}

/// `compression` section of the config file.
///
/// `keep_interfaces` wins over `keep_signatures` when both are set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionSettings {
    pub enabled: bool,
    pub keep_signatures: bool,
    pub keep_docstrings: bool,
    pub keep_interfaces: bool,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            keep_signatures: true,
            keep_docstrings: true,
            keep_interfaces: true,
        }
    }
}

impl CompressionSettings {
    pub fn mode(&self) -> CompressionMode {
        if self.keep_interfaces {
            CompressionMode::Interface
        } else if self.keep_signatures {
            CompressionMode::Signature
        } else {
            CompressionMode::Minimal
        }
    }

    pub fn set_mode(&mut self, mode: CompressionMode) {
        self.keep_interfaces = mode == CompressionMode::Interface;
        self.keep_signatures = mode == CompressionMode::Signature;
    }
}

/// `ignore` section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreSettings {
    pub custom_patterns: Vec<String>,
    pub use_gitignore: bool,
    /// Skip dependency, build and cache directories.
    pub use_default_ignore: bool,
}

impl Default for IgnoreSettings {
    fn default() -> Self {
        Self {
            custom_patterns: Vec::new(),
            use_gitignore: true,
            use_default_ignore: true,
        }
    }
}

/// Full configuration as stored in `pare.config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PareConfig {
    pub output: OutputSettings,
    pub compression: CompressionSettings,
    pub ignore: IgnoreSettings,
    pub include: Vec<String>,
    #[serde(with = "encoding_name")]
    pub encoding: Encoding,
}

impl PareConfig {
    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject values no run can use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.top_files_length == 0 {
            return Err(ConfigError::InvalidValue {
                key: "output.top_files_length",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Resolve the engine configuration.
    pub fn compression_config(&self) -> CompressionConfig {
        CompressionConfig {
            enabled: self.compression.enabled,
            mode: self.compression.mode(),
            keep_docstrings: self.compression.keep_docstrings,
            remove_comments: self.output.remove_comments,
            remove_empty_lines: self.output.remove_empty_lines,
        }
    }

    /// Apply CLI overrides on top of the loaded file.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(enabled) = overrides.compress {
            self.compression.enabled = enabled;
        }
        if let Some(mode) = overrides.mode {
            self.compression.set_mode(mode);
        }
        if let Some(keep) = overrides.keep_docstrings {
            self.compression.keep_docstrings = keep;
        }
        if let Some(remove) = overrides.remove_comments {
            self.output.remove_comments = remove;
        }
        if let Some(remove) = overrides.remove_empty_lines {
            self.output.remove_empty_lines = remove;
        }
        if let Some(style) = overrides.style {
            self.output.style = style;
        }
        if let Some(path) = &overrides.output {
            self.output.file_path = Some(path.clone());
        }
        if let Some(header) = &overrides.header_text {
            self.output.header_text = Some(header.clone());
        }
        if let Some(show) = overrides.show_line_numbers {
            self.output.show_line_numbers = show;
        }
        if let Some(show) = overrides.file_summary {
            self.output.file_summary = show;
        }
        if let Some(show) = overrides.show_directory_structure {
            self.output.show_directory_structure = show;
        }
        if let Some(n) = overrides.top_files_length {
            self.output.top_files_length = n;
        }
        if let Some(use_default) = overrides.use_default_ignore {
            self.ignore.use_default_ignore = use_default;
        }
        if let Some(encoding) = overrides.encoding {
            self.encoding = encoding;
        }
        if !overrides.include.is_empty() {
            self.include = overrides.include.clone();
        }
        self.ignore
            .custom_patterns
            .extend(overrides.ignore.iter().cloned());
    }
}

/// Values set on the command line. `None` leaves the file value untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub compress: Option<bool>,
    pub mode: Option<CompressionMode>,
    pub keep_docstrings: Option<bool>,
    pub remove_comments: Option<bool>,
    pub remove_empty_lines: Option<bool>,
    pub style: Option<OutputStyle>,
    pub output: Option<PathBuf>,
    pub header_text: Option<String>,
    pub show_line_numbers: Option<bool>,
    pub file_summary: Option<bool>,
    pub show_directory_structure: Option<bool>,
    pub top_files_length: Option<usize>,
    pub use_default_ignore: Option<bool>,
    pub encoding: Option<Encoding>,
    pub include: Vec<String>,
    pub ignore: Vec<String>,
}

/// Global config location, e.g. `~/.config/pare/pare.config.json`.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pare").join(CONFIG_FILE_NAME))
}

/// Find the local config file for a run.
///
/// An explicit path must exist; otherwise the working directory is
/// searched before the target directory.
pub fn find_local_config(
    explicit: Option<&Path>,
    cwd: &Path,
    target: &Path,
) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.join(path)
        };
        return if path.is_file() {
            Ok(Some(path))
        } else {
            Err(ConfigError::NotFound(path))
        };
    }

    Ok([cwd.join(CONFIG_FILE_NAME), target.join(CONFIG_FILE_NAME)]
        .into_iter()
        .find(|p| p.is_file()))
}

/// Load and merge configuration for a run.
pub fn load_config(
    explicit: Option<&Path>,
    cwd: &Path,
    target: &Path,
    overrides: &ConfigOverrides,
) -> Result<PareConfig, ConfigError> {
    let mut config = match global_config_path().filter(|p| p.is_file()) {
        Some(path) => match PareConfig::from_file(&path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "loaded global config");
                config
            }
            Err(e) => {
                tracing::warn!("ignoring global config: {e}");
                PareConfig::default()
            }
        },
        None => PareConfig::default(),
    };

    if let Some(path) = find_local_config(explicit, cwd, target)? {
        tracing::debug!(path = %path.display(), "loaded config");
        config = merge(config, PareConfig::from_file(&path)?);
    }

    config.apply(overrides);
    config.validate()?;
    Ok(config)
}

/// Local settings replace global ones wholesale per section; ignore
/// patterns accumulate.
fn merge(global: PareConfig, local: PareConfig) -> PareConfig {
    let mut merged = local;
    let mut patterns = global.ignore.custom_patterns;
    patterns.append(&mut merged.ignore.custom_patterns);
    merged.ignore.custom_patterns = patterns;
    merged
}

mod encoding_name {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::tokens::Encoding;

    pub fn serialize<S: Serializer>(encoding: &Encoding, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&encoding.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Encoding, D::Error> {
        let name = String::deserialize(d)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
