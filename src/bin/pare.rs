//! Pare CLI - Pack a codebase into structurally compressed LLM context.

use std::fs;
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use pare::compress::syntax::GrammarRegistry;
use pare::compress::{compress, CompressionStats};
use pare::config::{load_config, CompressionConfig, CompressionMode, ConfigOverrides, OutputStyle};
use pare::errors::{exit_code, PareError};
use pare::filter::{detect_language, Language};
use pare::output::{format_output, write_output, OutputOptions};
use pare::pipeline::Pare;
use pare::tokens::Encoding;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pare")]
#[command(about = "Pack a codebase into one LLM-ready file, with syntax-aware compression")]
#[command(version)]
struct Cli {
    /// Log progress to stderr
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a directory into a single output
    Pack {
        /// Root directory to pack
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        compression: CompressionArgs,

        /// Output style
        #[arg(long)]
        style: Option<StyleArg>,

        /// Only pack files matching these globs
        #[arg(long, value_delimiter = ',')]
        include: Vec<String>,

        /// Skip files matching these gitignore-style patterns
        #[arg(long, value_delimiter = ',')]
        ignore: Vec<String>,

        /// Config file (default: pare.config.json in the current or target directory)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Token encoding for the summary
        #[arg(long)]
        encoding: Option<EncodingArg>,

        /// Filter to specific language(s)
        #[arg(long, value_delimiter = ',')]
        lang: Vec<LanguageArg>,

        /// Include hidden files and directories
        #[arg(long)]
        include_hidden: bool,

        /// Pack dependency, build and cache directories too
        #[arg(long)]
        no_default_patterns: bool,

        /// Text to put at the top of the output
        #[arg(long, value_name = "TEXT")]
        header_text: Option<String>,

        /// Number every line of file content
        #[arg(long)]
        output_show_line_numbers: bool,

        /// Number of largest files listed in the summary
        #[arg(long, value_name = "N")]
        top_files_len: Option<usize>,

        /// Leave out the directory structure section
        #[arg(long, alias = "no-tree")]
        no_directory_structure: bool,

        /// Leave out the summary section
        #[arg(long, alias = "no-summary")]
        no_file_summary: bool,
    },

    /// Compress one file and print the result
    Compress {
        /// Source file
        file: PathBuf,

        /// Language name or extension (default: detected from the file name)
        #[arg(long)]
        lang: Option<String>,

        /// Compression mode
        #[arg(long, default_value = "interface")]
        mode: ModeArg,

        /// Drop docstrings and doc comments
        #[arg(long)]
        no_docstrings: bool,

        /// Remove comments
        #[arg(long)]
        remove_comments: bool,

        /// Remove blank lines
        #[arg(long)]
        remove_empty_lines: bool,

        /// Print the result and statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show supported languages
    Languages {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Flags shared by everything that compresses.
#[derive(Args)]
struct CompressionArgs {
    /// Compress source files structurally
    #[arg(long)]
    compress: bool,

    /// Compression mode (implies --compress)
    #[arg(long)]
    mode: Option<ModeArg>,

    /// Drop docstrings and doc comments
    #[arg(long)]
    no_docstrings: bool,

    /// Remove comments
    #[arg(long)]
    remove_comments: bool,

    /// Remove blank lines
    #[arg(long)]
    remove_empty_lines: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Interface,
    Signature,
    Minimal,
}

#[derive(Clone, Copy, ValueEnum)]
enum StyleArg {
    Xml,
    Markdown,
    Json,
    Plain,
}

#[derive(Clone, Copy, ValueEnum)]
enum EncodingArg {
    Cl100k,
    O200k,
}

#[derive(Clone, Copy, ValueEnum)]
enum LanguageArg {
    Python,
    Rust,
    Go,
    Typescript,
    Tsx,
    Javascript,
    Jsx,
    Java,
}

impl From<ModeArg> for CompressionMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Interface => CompressionMode::Interface,
            ModeArg::Signature => CompressionMode::Signature,
            ModeArg::Minimal => CompressionMode::Minimal,
        }
    }
}

impl From<StyleArg> for OutputStyle {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::Xml => OutputStyle::Xml,
            StyleArg::Markdown => OutputStyle::Markdown,
            StyleArg::Json => OutputStyle::Json,
            StyleArg::Plain => OutputStyle::Plain,
        }
    }
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Cl100k => Encoding::Cl100kBase,
            EncodingArg::O200k => Encoding::O200kBase,
        }
    }
}

impl From<LanguageArg> for Language {
    fn from(arg: LanguageArg) -> Self {
        match arg {
            LanguageArg::Python => Language::Python,
            LanguageArg::Rust => Language::Rust,
            LanguageArg::Go => Language::Go,
            LanguageArg::Typescript => Language::TypeScript,
            LanguageArg::Tsx => Language::Tsx,
            LanguageArg::Javascript => Language::JavaScript,
            LanguageArg::Jsx => Language::Jsx,
            LanguageArg::Java => Language::Java,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    let json_output = json_flag(&cli.command);

    let result = match cli.command {
        Commands::Pack {
            path,
            compression,
            style,
            include,
            ignore,
            config,
            output,
            encoding,
            lang,
            include_hidden,
            no_default_patterns,
            header_text,
            output_show_line_numbers,
            top_files_len,
            no_directory_structure,
            no_file_summary,
        } => {
            let overrides = ConfigOverrides {
                compress: (compression.compress || compression.mode.is_some()).then_some(true),
                mode: compression.mode.map(Into::into),
                keep_docstrings: compression.no_docstrings.then_some(false),
                remove_comments: compression.remove_comments.then_some(true),
                remove_empty_lines: compression.remove_empty_lines.then_some(true),
                style: style.map(Into::into),
                output,
                header_text,
                show_line_numbers: output_show_line_numbers.then_some(true),
                file_summary: no_file_summary.then_some(false),
                show_directory_structure: no_directory_structure.then_some(false),
                top_files_length: top_files_len,
                use_default_ignore: no_default_patterns.then_some(false),
                encoding: encoding.map(Into::into),
                include,
                ignore,
            };
            run_pack(PackArgs {
                path,
                config,
                overrides,
                languages: lang.into_iter().map(Into::into).collect(),
                include_hidden,
            })
        }
        Commands::Compress {
            file,
            lang,
            mode,
            no_docstrings,
            remove_comments,
            remove_empty_lines,
            json,
        } => {
            let config = CompressionConfig {
                enabled: true,
                mode: mode.into(),
                keep_docstrings: !no_docstrings,
                remove_comments,
                remove_empty_lines,
            };
            run_compress(file, lang, &config, json)
        }
        Commands::Languages { json } => run_languages(json),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "pare", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        if json_output {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
            }

            let payload = ErrorOutput {
                error: e.to_string(),
            };

            let json = serde_json::to_string(&payload)
                .unwrap_or_else(|_| "{\"error\":\"serialization failed\"}".to_string());
            eprintln!("{json}");
        } else {
            eprintln!("error: {}", e);
        }
        std::process::exit(exit_code(&e));
    }
}

/// Flags win over `RUST_LOG`; the default level is `warn`.
fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("pare=debug")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn json_flag(cmd: &Commands) -> bool {
    match cmd {
        Commands::Pack { style, .. } => matches!(style, Some(StyleArg::Json)),
        Commands::Compress { json, .. } => *json,
        Commands::Languages { json } => *json,
        Commands::Completions { .. } => false,
    }
}

// --- Pack command ---

struct PackArgs {
    path: PathBuf,
    config: Option<PathBuf>,
    overrides: ConfigOverrides,
    languages: Vec<Language>,
    include_hidden: bool,
}

fn run_pack(args: PackArgs) -> Result<(), PareError> {
    if !args.path.exists() {
        return Err(PareError::PathNotFound(args.path));
    }

    let cwd = std::env::current_dir()?;
    let config = load_config(args.config.as_deref(), &cwd, &args.path, &args.overrides)?;
    tracing::debug!(?config, "resolved configuration");

    let registry = GrammarRegistry::builtin();
    let mut pare = Pare::from_config(&args.path, &config).include_hidden(args.include_hidden);
    if !args.languages.is_empty() {
        pare = pare.languages(&args.languages);
    }
    let result = pare.build(&registry)?;

    let options = OutputOptions::from_config(&config);
    let rendered = format_output(&result, &options)?;
    write_output(&rendered, config.output.file_path.as_deref())?;

    if let Some(path) = &config.output.file_path {
        let total = result.total_tokens();
        tracing::info!(
            path = %path.display(),
            files = result.files.len(),
            tokens = total.packed,
            "wrote pack"
        );
    }

    Ok(())
}

// --- Compress command ---

fn run_compress(
    file: PathBuf,
    lang: Option<String>,
    config: &CompressionConfig,
    json: bool,
) -> Result<(), PareError> {
    if !file.exists() {
        return Err(PareError::PathNotFound(file));
    }

    let source = fs::read_to_string(&file)?;
    let language_id = match lang {
        Some(lang) => lang,
        None => match detect_language(&file) {
            Some(language) => language.fence_tag().to_string(),
            None => file
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        },
    };

    let registry = GrammarRegistry::builtin();
    let result = compress(&registry, &source, &language_id, config);
    if let Some(reason) = &result.skipped {
        tracing::warn!(file = %file.display(), "not compressed: {reason}");
    }

    if json {
        #[derive(Serialize)]
        struct Output<'a> {
            path: String,
            language: &'a str,
            compressed: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            skipped: Option<String>,
            stats: CompressionStats,
            text: &'a str,
        }

        let output = Output {
            path: file.display().to_string(),
            language: &language_id,
            compressed: result.compressed,
            skipped: result.skipped.as_ref().map(ToString::to_string),
            stats: result.stats,
            text: &result.text,
        };
        let json = serde_json::to_string_pretty(&output)
            .map_err(|e| PareError::Output(e.into()))?;
        println!("{json}");
    } else {
        write_output(&result.text, None)?;
    }

    Ok(())
}

// --- Languages command ---

#[derive(Serialize)]
struct LanguageInfo {
    name: String,
    extensions: Vec<String>,
}

fn run_languages(json: bool) -> Result<(), PareError> {
    let languages: Vec<LanguageInfo> = GrammarRegistry::builtin()
        .languages()
        .iter()
        .map(|lang| LanguageInfo {
            name: lang.to_string(),
            extensions: lang
                .extensions()
                .iter()
                .map(|e| format!(".{}", e))
                .collect(),
        })
        .collect();

    if json {
        #[derive(Serialize)]
        struct Output {
            languages: Vec<LanguageInfo>,
        }
        let output = Output { languages };
        let json = serde_json::to_string_pretty(&output)
            .map_err(|e| PareError::Output(e.into()))?;
        println!("{json}");
    } else {
        println!("Supported languages:");
        for lang in &languages {
            println!("  {:12} {}", lang.name, lang.extensions.join(", "));
        }
    }

    Ok(())
}
