//! Output formatting for pare.
//!
//! Renders a [`PackResult`] as XML-style sections, Markdown, plain text
//! or JSON suitable for LLM consumption.

use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::compress::CompressionStats;
use crate::config::{OutputStyle, PareConfig};
use crate::pipeline::{PackResult, PackedFile};
use crate::tokens::Reduction;
use crate::tree::{format_number, render_tree, RenderOptions};

/// Errors that can occur during output formatting.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Options controlling what to include in output.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub style: OutputStyle,
    /// Text placed before every section.
    pub header: Option<String>,
    /// Include the directory structure section.
    pub include_tree: bool,
    /// Include the summary section.
    pub include_summary: bool,
    /// Report token counts (only meaningful when they were calculated).
    pub show_tokens: bool,
    /// Prefix file lines with their number.
    pub show_line_numbers: bool,
    /// Largest files by token count listed in the summary.
    pub top_files: usize,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            style: OutputStyle::Xml,
            header: None,
            include_tree: true,
            include_summary: true,
            show_tokens: true,
            show_line_numbers: false,
            top_files: 5,
        }
    }
}

impl OutputOptions {
    pub fn with_style(style: OutputStyle) -> Self {
        Self {
            style,
            ..Default::default()
        }
    }

    /// File contents only.
    pub fn files_only(style: OutputStyle) -> Self {
        Self {
            style,
            include_tree: false,
            include_summary: false,
            show_tokens: false,
            ..Default::default()
        }
    }

    /// Options from the `output` section of a loaded configuration.
    pub fn from_config(config: &PareConfig) -> Self {
        let output = &config.output;
        Self {
            style: output.style,
            header: output.header_text.clone().filter(|h| !h.trim().is_empty()),
            include_tree: output.show_directory_structure,
            include_summary: output.file_summary,
            show_tokens: output.calculate_tokens,
            show_line_numbers: output.show_line_numbers,
            top_files: output.top_files_length,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Format a pack with all requested sections.
pub fn format_output(result: &PackResult, options: &OutputOptions) -> Result<String, OutputError> {
    match options.style {
        OutputStyle::Xml => Ok(format_output_xml(result, options)),
        OutputStyle::Markdown => Ok(format_output_markdown(result, options)),
        OutputStyle::Json => format_output_json(result, options),
        OutputStyle::Plain => Ok(format_output_plain(result, options)),
    }
}

/// Write rendered output to a file, or stdout when `path` is `None`.
pub fn write_output(text: &str, path: Option<&Path>) -> Result<(), OutputError> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, text)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            out.write_all(text.as_bytes())?;
            out.flush()?;
        }
    }
    Ok(())
}

fn tree_text(result: &PackResult) -> String {
    render_tree(&result.tree(), &RenderOptions::with_metadata())
}

fn file_content<'a>(file: &'a PackedFile, options: &OutputOptions) -> Cow<'a, str> {
    if options.show_line_numbers {
        Cow::Owned(number_lines(&file.content))
    } else {
        Cow::Borrowed(&file.content)
    }
}

/// Prefix each line with its right-aligned number.
fn number_lines(content: &str) -> String {
    let count = content.split_inclusive('\n').count();
    let width = count.to_string().len();
    let mut output = String::with_capacity(content.len() + count * (width + 2));
    for (i, line) in content.split_inclusive('\n').enumerate() {
        output.push_str(&format!("{:>width$}: {line}", i + 1));
    }
    output
}

/// Append `content`, terminating its last line.
fn push_content(output: &mut String, content: &str) {
    output.push_str(content);
    if !content.is_empty() && !content.ends_with('\n') {
        output.push('\n');
    }
}

/// Files with the most packed tokens, largest first.
fn top_files(result: &PackResult, limit: usize) -> Vec<&PackedFile> {
    let mut files: Vec<&PackedFile> = result.files.iter().collect();
    files.sort_by(|a, b| {
        b.tokens
            .packed
            .cmp(&a.tokens.packed)
            .then_with(|| a.path.cmp(&b.path))
    });
    files.truncate(limit);
    files
}

// ============================================================================
// XML Formatting
// ============================================================================

fn format_output_xml(result: &PackResult, options: &OutputOptions) -> String {
    let capacity = result.files.iter().map(|f| f.content.len() + 64).sum::<usize>() + 4096;
    let mut output = String::with_capacity(capacity);

    if let Some(header) = &options.header {
        output.push_str("<header>\n");
        push_content(&mut output, header);
        output.push_str("</header>\n\n");
    }

    if options.include_tree {
        output.push_str("<file_map>\n");
        output.push_str(&tree_text(result));
        if result.compressed_count() > 0 {
            output.push_str("\nLegend: + = compressed\n");
        }
        output.push_str("</file_map>\n\n");
    }

    output.push_str("<files>\n");
    for file in &result.files {
        output.push_str(&file_header(file, options.show_tokens));
        push_content(&mut output, &file_content(file, options));
        output.push('\n');
    }
    output.push_str("</files>\n");

    if options.include_summary {
        output.push_str("\n<token_summary>\n");
        output.push_str(&format_summary_text(result, options));
        output.push_str("</token_summary>\n");
    }

    output
}

fn file_header(file: &PackedFile, show_tokens: bool) -> String {
    let mut details = vec![format!("{} lines", format_number(file.lines))];
    if show_tokens {
        details.push(format!("{} tokens", format_number(file.tokens.packed)));
    }
    if file.compressed {
        details.push("compressed".to_string());
    }
    format!("--- {} ({}) ---\n", display_path(file.path.as_path()), details.join(", "))
}

fn format_summary_text(result: &PackResult, options: &OutputOptions) -> String {
    let show_tokens = options.show_tokens;
    let mut output = String::new();

    output.push_str(&format!(
        "Files: {} ({} compressed)\n",
        format_number(result.files.len()),
        format_number(result.compressed_count())
    ));

    if show_tokens {
        let total = result.total_tokens();
        output.push_str(&format!(
            "Total: {} tokens ({})\n",
            format_number(total.packed),
            reduction_note(&total)
        ));
        output.push_str(&format!("Encoding: {}\n", result.encoding));
    }

    let stats = result.stats();
    if stats != CompressionStats::default() {
        output.push_str("\nCompression:\n");
        for (label, count) in stats_rows(&stats) {
            if count > 0 {
                output.push_str(&format!("- {label}: {}\n", format_number(count)));
            }
        }
    }

    if show_tokens && options.top_files > 0 {
        let top = top_files(result, options.top_files);
        output.push_str(&format!("\nTop {} files by tokens:\n", top.len()));
        for (i, file) in top.iter().enumerate() {
            output.push_str(&format!(
                "{}. {} ({} tokens)\n",
                i + 1,
                display_path(&file.path),
                format_number(file.tokens.packed)
            ));
        }
    }

    if show_tokens {
        output.push_str("\nPer-file breakdown:\n");
        for file in &result.files {
            output.push_str(&format!(
                "- {}: {} tokens",
                display_path(&file.path),
                format_number(file.tokens.packed)
            ));
            if file.tokens.packed != file.tokens.original {
                output.push_str(&format!(" (from {})", format_number(file.tokens.original)));
            }
            output.push('\n');
        }
    }

    output
}

fn reduction_note(total: &Reduction) -> String {
    if total.saved() == 0 {
        "no reduction".to_string()
    } else {
        format!(
            "from {}, {:.1}% saved",
            format_number(total.original),
            total.ratio() * 100.0
        )
    }
}

fn stats_rows(stats: &CompressionStats) -> [(&'static str, usize); 7] {
    [
        ("Classes", stats.classes),
        ("Functions", stats.functions),
        ("Methods", stats.methods),
        ("Bodies elided", stats.bodies_elided),
        ("Definitions dropped", stats.definitions_dropped),
        ("Docstrings removed", stats.docstrings_removed),
        ("Comments removed", stats.comments_removed),
    ]
}

/// Forward slashes on every platform.
fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

// ============================================================================
// Markdown Formatting
// ============================================================================

fn format_output_markdown(result: &PackResult, options: &OutputOptions) -> String {
    let mut output = String::with_capacity(8192);

    if let Some(header) = &options.header {
        push_content(&mut output, header);
        output.push('\n');
    }

    if options.include_tree {
        output.push_str("# Directory Structure\n\n");
        push_fenced(&mut output, "text", &tree_text(result));
        output.push('\n');
    }

    output.push_str("# Files\n");
    for file in &result.files {
        output.push_str(&format!("\n## File: {}\n", display_path(&file.path)));
        let tag = file.language.map_or("", |l| l.fence_tag());
        push_fenced(&mut output, tag, &file_content(file, options));
    }

    if options.include_summary {
        output.push_str("\n# Summary\n\n");
        output.push_str(&format!(
            "- Files: {} ({} compressed)\n",
            format_number(result.files.len()),
            format_number(result.compressed_count())
        ));
        if options.show_tokens {
            let total = result.total_tokens();
            output.push_str(&format!(
                "- Tokens: {} ({})\n",
                format_number(total.packed),
                reduction_note(&total)
            ));
            if options.top_files > 0 {
                output.push_str("- Top files by tokens:\n");
                for (i, file) in top_files(result, options.top_files).iter().enumerate() {
                    output.push_str(&format!(
                        "  {}. `{}` ({} tokens)\n",
                        i + 1,
                        display_path(&file.path),
                        format_number(file.tokens.packed)
                    ));
                }
            }
        }
    }

    output
}

/// Append a fenced block, lengthening the fence past any backtick run in
/// the content.
fn push_fenced(output: &mut String, tag: &str, content: &str) {
    let fence = "`".repeat(longest_backtick_run(content).max(2) + 1);
    output.push_str(&fence);
    output.push_str(tag);
    output.push('\n');
    push_content(output, content);
    output.push_str(&fence);
    output.push('\n');
}

fn longest_backtick_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

// ============================================================================
// Plain Text Formatting
// ============================================================================

const PLAIN_RULE: &str = "================================================================";
const PLAIN_FILE_RULE: &str = "================";

fn plain_section(output: &mut String, title: &str) {
    output.push_str(PLAIN_RULE);
    output.push('\n');
    output.push_str(title);
    output.push('\n');
    output.push_str(PLAIN_RULE);
    output.push('\n');
}

fn format_output_plain(result: &PackResult, options: &OutputOptions) -> String {
    let capacity = result.files.iter().map(|f| f.content.len() + 64).sum::<usize>() + 4096;
    let mut output = String::with_capacity(capacity);

    if let Some(header) = &options.header {
        push_content(&mut output, header);
        output.push('\n');
    }

    if options.include_tree {
        plain_section(&mut output, "Directory Structure");
        output.push_str(&tree_text(result));
        output.push('\n');
    }

    plain_section(&mut output, "Files");
    for file in &result.files {
        output.push('\n');
        output.push_str(PLAIN_FILE_RULE);
        output.push_str(&format!("\nFile: {}\n", display_path(&file.path)));
        output.push_str(PLAIN_FILE_RULE);
        output.push('\n');
        push_content(&mut output, &file_content(file, options));
    }

    if options.include_summary {
        output.push('\n');
        plain_section(&mut output, "Summary");
        output.push_str(&format_summary_text(result, options));
    }

    output
}

// ============================================================================
// JSON Formatting
// ============================================================================

#[derive(Serialize)]
struct JsonOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    header: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    directory_structure: Option<String>,
    files: Vec<JsonFile<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<JsonSummary>,
}

#[derive(Serialize)]
struct JsonFile<'a> {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'static str>,
    content: Cow<'a, str>,
    lines: usize,
    compressed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_tokens: Option<usize>,
}

#[derive(Serialize)]
struct JsonSummary {
    total_files: usize,
    compressed_files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    top_files: Vec<JsonTopFile>,
    compression: CompressionStats,
}

#[derive(Serialize)]
struct JsonTopFile {
    path: String,
    tokens: usize,
}

fn format_output_json(result: &PackResult, options: &OutputOptions) -> Result<String, OutputError> {
    let show_tokens = options.show_tokens;

    let files = result
        .files
        .iter()
        .map(|f| JsonFile {
            path: display_path(&f.path),
            language: f.language.map(|l| l.fence_tag()),
            content: file_content(f, options),
            lines: f.lines,
            compressed: f.compressed,
            skipped: f.skipped.as_ref().map(ToString::to_string),
            tokens: show_tokens.then_some(f.tokens.packed),
            original_tokens: show_tokens.then_some(f.tokens.original),
        })
        .collect();

    let summary = options.include_summary.then(|| {
        let total = result.total_tokens();
        JsonSummary {
            total_files: result.files.len(),
            compressed_files: result.compressed_count(),
            encoding: show_tokens.then(|| result.encoding.to_string()),
            total_tokens: show_tokens.then_some(total.packed),
            original_tokens: show_tokens.then_some(total.original),
            saved_ratio: show_tokens.then(|| total.ratio()),
            top_files: if show_tokens {
                top_files(result, options.top_files)
                    .into_iter()
                    .map(|f| JsonTopFile {
                        path: display_path(&f.path),
                        tokens: f.tokens.packed,
                    })
                    .collect()
            } else {
                Vec::new()
            },
            compression: result.stats(),
        }
    });

    let output = JsonOutput {
        header: options.header.as_deref(),
        directory_structure: options.include_tree.then(|| tree_text(result)),
        files,
        summary,
    };

    Ok(serde_json::to_string_pretty(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::SkipReason;
    use crate::filter::Language;
    use crate::tokens::Encoding;
    use std::path::PathBuf;

    fn packed(path: &str, language: Option<Language>, content: &str, compressed: bool) -> PackedFile {
        PackedFile {
            path: PathBuf::from(path),
            language,
            size: content.len() as u64 * 2,
            content: content.to_string(),
            compressed,
            skipped: (!compressed).then_some(SkipReason::Disabled),
            stats: CompressionStats {
                bodies_elided: usize::from(compressed),
                ..Default::default()
            },
            lines: content.lines().count(),
            tokens: Reduction {
                original: 20,
                packed: if compressed { 8 } else { 20 },
            },
        }
    }

    fn sample() -> PackResult {
        PackResult {
            root_name: "demo".to_string(),
            encoding: Encoding::Cl100kBase,
            files: vec![
                packed("README.md", None, "# Demo\n", false),
                packed(
                    "src/app.py",
                    Some(Language::Python),
                    "def f():\n    pass\n",
                    true,
                ),
            ],
        }
    }

    #[test]
    fn test_output_options_default() {
        let opts = OutputOptions::default();
        assert_eq!(opts.style, OutputStyle::Xml);
        assert!(opts.include_tree);
        assert!(opts.include_summary);
        assert!(opts.show_tokens);
    }

    #[test]
    fn test_xml_sections() {
        let output = format_output(&sample(), &OutputOptions::default()).unwrap();

        assert!(output.starts_with("<file_map>\ndemo/\n"));
        assert!(output.contains("Legend: + = compressed"));
        assert!(output.contains("--- src/app.py (2 lines, 8 tokens, compressed) ---\ndef f():\n    pass\n"));
        assert!(output.contains("--- README.md (1 lines, 20 tokens) ---\n# Demo\n"));
        assert!(output.contains("Files: 2 (1 compressed)"));
        assert!(output.contains("Total: 28 tokens (from 40, 30.0% saved)"));
        assert!(output.contains("- Bodies elided: 1"));
        assert!(output.contains("- src/app.py: 8 tokens (from 20)"));
        assert!(output.ends_with("</token_summary>\n"));
    }

    #[test]
    fn test_xml_files_only() {
        let output = format_output(&sample(), &OutputOptions::files_only(OutputStyle::Xml)).unwrap();
        assert!(output.starts_with("<files>\n"));
        assert!(output.ends_with("</files>\n"));
        assert!(!output.contains("tokens"));
    }

    #[test]
    fn test_markdown_fences() {
        let output = format_output(&sample(), &OutputOptions::with_style(OutputStyle::Markdown)).unwrap();
        assert!(output.starts_with("# Directory Structure\n\n```text\ndemo/\n"));
        assert!(output.contains("## File: src/app.py\n```python\ndef f():\n    pass\n```\n"));
        assert!(output.contains("## File: README.md\n```\n# Demo\n```\n"));
        assert!(output.contains("- Files: 2 (1 compressed)"));
    }

    #[test]
    fn test_markdown_fence_longer_than_content() {
        let mut output = String::new();
        push_fenced(&mut output, "md", "a ```` b");
        assert_eq!(output, "`````md\na ```` b\n`````\n");
    }

    #[test]
    fn test_json_output() {
        let output = format_output(&sample(), &OutputOptions::with_style(OutputStyle::Json)).unwrap();
        let v: serde_json::Value = serde_json::from_str(&output).unwrap();

        let files = v["files"].as_array().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1]["path"], "src/app.py");
        assert_eq!(files[1]["language"], "python");
        assert_eq!(files[1]["compressed"], true);
        assert_eq!(files[1]["tokens"], 8);
        assert!(files[1].get("skipped").is_none());
        assert_eq!(files[0]["skipped"], "compression disabled");
        assert!(files[0].get("language").is_none());

        assert_eq!(v["summary"]["total_tokens"], 28);
        assert_eq!(v["summary"]["encoding"], "cl100k_base");
        assert_eq!(v["summary"]["compression"]["bodies_elided"], 1);
        assert!(v["directory_structure"].as_str().unwrap().contains("app.py"));
    }

    #[test]
    fn test_json_without_tokens() {
        let options = OutputOptions {
            style: OutputStyle::Json,
            show_tokens: false,
            ..Default::default()
        };
        let output = format_output(&sample(), &options).unwrap();
        let v: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert!(v["files"][0].get("tokens").is_none());
        assert!(v["summary"].get("total_tokens").is_none());
    }

    #[test]
    fn test_plain_sections() {
        let output = format_output(&sample(), &OutputOptions::with_style(OutputStyle::Plain)).unwrap();
        assert!(output.starts_with(&format!(
            "{PLAIN_RULE}\nDirectory Structure\n{PLAIN_RULE}\ndemo/\n"
        )));
        assert!(output.contains(&format!(
            "{PLAIN_FILE_RULE}\nFile: src/app.py\n{PLAIN_FILE_RULE}\ndef f():\n    pass\n"
        )));
        assert!(output.contains(&format!(
            "{PLAIN_RULE}\nSummary\n{PLAIN_RULE}\nFiles: 2 (1 compressed)\n"
        )));
        assert!(!output.contains("<files>"));
    }

    #[test]
    fn test_header_and_line_numbers() {
        let options = OutputOptions {
            header: Some("Project notes.".to_string()),
            show_line_numbers: true,
            ..Default::default()
        };
        let output = format_output(&sample(), &options).unwrap();
        assert!(output.starts_with("<header>\nProject notes.\n</header>\n\n<file_map>\n"));
        assert!(output.contains(
            "--- src/app.py (2 lines, 8 tokens, compressed) ---\n1: def f():\n2:     pass\n"
        ));

        let options = OutputOptions {
            header: Some("Project notes.".to_string()),
            ..OutputOptions::with_style(OutputStyle::Markdown)
        };
        let output = format_output(&sample(), &options).unwrap();
        assert!(output.starts_with("Project notes.\n\n# Directory Structure\n"));
    }

    #[test]
    fn test_number_lines_width() {
        let text: String = (1..=10).map(|i| format!("l{i}\n")).collect();
        let numbered = number_lines(&text);
        assert!(numbered.starts_with(" 1: l1\n"));
        assert!(numbered.ends_with("10: l10\n"));
        assert_eq!(number_lines("a\r\nb"), "1: a\r\n2: b");
        assert_eq!(number_lines(""), "");
    }

    #[test]
    fn test_top_files() {
        let options = OutputOptions {
            top_files: 1,
            ..Default::default()
        };
        let output = format_output(&sample(), &options).unwrap();
        assert!(output.contains("Top 1 files by tokens:\n1. README.md (20 tokens)\n"));

        let options = OutputOptions {
            header: Some("hi".to_string()),
            ..OutputOptions::with_style(OutputStyle::Json)
        };
        let output = format_output(&sample(), &options).unwrap();
        let v: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(v["header"], "hi");
        assert_eq!(v["summary"]["top_files"][0]["path"], "README.md");
        assert_eq!(v["summary"]["top_files"][1]["tokens"], 8);
    }

    #[test]
    fn test_options_from_config() {
        let mut config = PareConfig::default();
        config.output.style = OutputStyle::Plain;
        config.output.header_text = Some("  ".to_string());
        config.output.file_summary = false;
        config.output.show_line_numbers = true;

        let options = OutputOptions::from_config(&config);
        assert_eq!(options.style, OutputStyle::Plain);
        assert!(options.header.is_none());
        assert!(!options.include_summary);
        assert!(options.include_tree);
        assert!(options.show_line_numbers);
        assert_eq!(options.top_files, 5);
    }

    #[test]
    fn test_write_output_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out/pack.xml");
        write_output("<files>\n</files>\n", Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<files>\n</files>\n");
    }
}
