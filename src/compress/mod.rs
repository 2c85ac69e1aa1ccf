//! Structural source compression.
//!
//! Parses a file with its grammar, classifies nodes, decides per node what
//! survives and rebuilds the text from the retained byte ranges:
//!
//! ```text
//! source → GrammarAdapter → SyntaxTree → classify → decide → Reconstructor → text
//! ```
//!
//! [`compress`] never fails. Anything it cannot handle (an unknown
//! language, a parse error, an internal invariant violation) yields the
//! original text with `compressed = false` and a [`SkipReason`].

pub mod classify;
pub mod policy;
pub mod reconstruct;
pub mod strip;
pub mod syntax;

use std::ops::Range;

use serde::Serialize;
use smallvec::SmallVec;
use thiserror::Error;

use crate::config::CompressionConfig;
use crate::filter::Language;
use classify::{BlockStyle, Category, LanguageProfile, Position, Scope};
use policy::{decide, decide_body, Action};
use reconstruct::{
    line_ending, line_extent, line_indent, starts_line, tidy, ReconstructError, Reconstructor,
};
use syntax::{GrammarRegistry, ParseFailure, RegisteredGrammar, SyntaxNode};

pub use strip::remove_empty_lines;

/// Why a file passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("compression disabled")]
    Disabled,

    #[error("no grammar for language")]
    UnsupportedLanguage,

    #[error("parse failed: {0}")]
    ParseFailure(#[from] ParseFailure),

    #[error("reconstruction failed: {0}")]
    Reconstruction(#[from] ReconstructError),
}

/// What the engine did to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CompressionStats {
    pub classes: usize,
    pub functions: usize,
    pub methods: usize,
    pub bodies_elided: usize,
    pub definitions_dropped: usize,
    pub docstrings_removed: usize,
    pub comments_removed: usize,
}

impl std::ops::AddAssign for CompressionStats {
    fn add_assign(&mut self, rhs: Self) {
        self.classes += rhs.classes;
        self.functions += rhs.functions;
        self.methods += rhs.methods;
        self.bodies_elided += rhs.bodies_elided;
        self.definitions_dropped += rhs.definitions_dropped;
        self.docstrings_removed += rhs.docstrings_removed;
        self.comments_removed += rhs.comments_removed;
    }
}

/// Output of [`compress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedResult {
    pub text: String,
    /// The structural engine ran and its output is in `text`.
    pub compressed: bool,
    pub skipped: Option<SkipReason>,
    pub stats: CompressionStats,
}

impl CompressedResult {
    fn unchanged(source: &str, reason: SkipReason) -> Self {
        Self {
            text: source.to_string(),
            compressed: false,
            skipped: Some(reason),
            stats: CompressionStats::default(),
        }
    }
}

/// Compress one file.
///
/// `language_id` is a language name or file extension. Unknown languages
/// come back byte-identical with `compressed = false`.
pub fn compress(
    registry: &GrammarRegistry,
    source: &str,
    language_id: &str,
    config: &CompressionConfig,
) -> CompressedResult {
    match registry.resolve(language_id) {
        Some((_, grammar)) => compress_with(grammar, source, config),
        None => {
            tracing::trace!(language = language_id, "no grammar registered");
            CompressedResult::unchanged(source, SkipReason::UnsupportedLanguage)
        }
    }
}

/// [`compress`] for an already-detected language.
pub fn compress_language(
    registry: &GrammarRegistry,
    source: &str,
    language: Language,
    config: &CompressionConfig,
) -> CompressedResult {
    match registry.get(language) {
        Some(grammar) => compress_with(grammar, source, config),
        None => CompressedResult::unchanged(source, SkipReason::UnsupportedLanguage),
    }
}

fn compress_with(
    grammar: &RegisteredGrammar,
    source: &str,
    config: &CompressionConfig,
) -> CompressedResult {
    if !config.needs_tree() {
        if !config.remove_empty_lines {
            return CompressedResult::unchanged(source, SkipReason::Disabled);
        }
        return CompressedResult {
            text: remove_empty_lines(source),
            compressed: false,
            skipped: None,
            stats: CompressionStats::default(),
        };
    }

    let tree = match grammar.adapter.parse(source) {
        Ok(tree) => tree,
        Err(e) => {
            tracing::warn!(language = grammar.profile.name, "{e}; passing file through");
            return CompressedResult::unchanged(source, e.into());
        }
    };

    let outcome = if config.enabled {
        Engine::new(source, grammar.profile, config).run(&tree.root)
    } else {
        strip::strip_comments(source, &tree.root, grammar.profile)
    };

    match outcome {
        Ok((text, stats)) => CompressedResult {
            text: if config.remove_empty_lines {
                remove_empty_lines(&text)
            } else {
                text
            },
            compressed: config.enabled,
            skipped: None,
            stats,
        },
        Err(e) => {
            tracing::error!(language = grammar.profile.name, "{e}; passing file through");
            if cfg!(debug_assertions) {
                panic!("{} reconstruction failed: {e}", grammar.profile.name);
            }
            CompressedResult::unchanged(source, e.into())
        }
    }
}

/// One step of a statement-list plan.
#[derive(Debug, Clone)]
enum Step {
    /// Punctuation; retained as is.
    Skip,
    /// Already covered by a neighbouring drop.
    Consumed,
    /// Remove the range (a definition and what is attached to it).
    Drop(Range<usize>),
    Visit(Category),
    /// Transparent nested member list.
    List,
}

type Plan = SmallVec<[Step; 16]>;

/// Traversal state for one file.
struct Engine<'a> {
    source: &'a str,
    profile: &'static LanguageProfile,
    config: &'a CompressionConfig,
    /// Line terminator for synthetic text.
    newline: &'static str,
    out: Reconstructor<'a>,
    stats: CompressionStats,
}

impl<'a> Engine<'a> {
    fn new(
        source: &'a str,
        profile: &'static LanguageProfile,
        config: &'a CompressionConfig,
    ) -> Self {
        Self {
            source,
            profile,
            config,
            newline: line_ending(source),
            out: Reconstructor::new(source),
            stats: CompressionStats::default(),
        }
    }

    fn run(mut self, root: &SyntaxNode) -> Result<(String, CompressionStats), ReconstructError> {
        self.process_list(root, Scope::Module, false)?;
        if self.out.is_empty() {
            return Ok((self.source.to_string(), self.stats));
        }
        let text = tidy(self.out.finish(), self.source);
        Ok((text, self.stats))
    }

    /// Drop a node together with the layout around it.
    fn drop_node(&mut self, span: Range<usize>) -> Result<(), ReconstructError> {
        let extent = line_extent(self.source, span.clone());
        // Leading whitespace may already belong to the previous edit.
        let start = extent.start.max(self.out.cursor().min(span.start));
        self.out.drop(start..extent.end)
    }

    fn count_definition(&mut self, category: Category) {
        match category {
            Category::ClassDef => self.stats.classes += 1,
            Category::MethodDef => self.stats.methods += 1,
            _ => self.stats.functions += 1,
        }
    }

    fn process_list(
        &mut self,
        list: &SyntaxNode,
        scope: Scope,
        placeholder_if_empty: bool,
    ) -> Result<(), ReconstructError> {
        let children = &list.children;
        let first = children.iter().position(|c| c.named && !c.extra);
        let mut plan: Plan = SmallVec::with_capacity(children.len());

        for (i, child) in children.iter().enumerate() {
            if !child.named {
                plan.push(Step::Skip);
                continue;
            }
            if self.profile.is_body(child.kind) || self.profile.is_member_list(child.kind) {
                plan.push(Step::List);
                continue;
            }

            let position = Position {
                scope,
                statement: !child.extra,
                first_statement: Some(i) == first,
            };
            let category = self.profile.classify(child, self.source, position);
            if category.is_definition() && decide(category, self.config) == Action::Drop {
                self.count_definition(category);
                self.stats.definitions_dropped += 1;
                let start = self.attach_preceding(children, &mut plan, i);
                plan.push(Step::Drop(start..child.end()));
            } else {
                plan.push(Step::Visit(category));
            }
        }

        // A dropped definition takes a trailing `;` with it.
        for i in 0..plan.len().saturating_sub(1) {
            if let Step::Drop(range) = &plan[i] {
                let next = &children[i + 1];
                if !next.named && next.kind == ";" {
                    let extended = range.start..next.end();
                    plan[i] = Step::Drop(extended);
                    plan[i + 1] = Step::Consumed;
                }
            }
        }

        if placeholder_if_empty && self.profile.block_style == BlockStyle::Indented {
            let mut statements = children
                .iter()
                .zip(plan.iter())
                .filter(|(child, _)| child.named && !child.extra)
                .peekable();
            let has_statements = statements.peek().is_some();
            let all_removed = statements.all(|(child, step)| self.removes_statement(child, step));
            if has_statements && all_removed {
                let docstrings = plan
                    .iter()
                    .filter(|step| matches!(step, Step::Visit(Category::Docstring)))
                    .count();
                self.stats.docstrings_removed += docstrings;
                return self
                    .out
                    .replace(list.span.clone(), self.profile.placeholder.inline);
            }
        }

        for (child, step) in children.iter().zip(plan) {
            match step {
                Step::Skip | Step::Consumed => {}
                Step::Drop(range) => self.drop_node(range)?,
                Step::Visit(category) => self.visit(child, category, scope)?,
                Step::List => self.process_list(child, scope, false)?,
            }
        }
        Ok(())
    }

    /// Mark decorators and doc comments directly above `index` as part of
    /// the drop and return where it starts. Plain comments stay.
    fn attach_preceding(&self, children: &[SyntaxNode], plan: &mut Plan, index: usize) -> usize {
        let mut start = children[index].start();
        for j in (0..index).rev() {
            let sibling = &children[j];
            let attached = match plan[j] {
                Step::Visit(Category::Decorator) => true,
                Step::Visit(Category::Docstring) => {
                    self.profile.is_doc_comment(sibling, self.source)
                        && starts_line(self.source, sibling.start())
                }
                _ => false,
            };
            if !attached || self.source[sibling.end()..start].matches('\n').count() > 1 {
                break;
            }
            plan[j] = Step::Consumed;
            start = sibling.start();
        }
        start
    }

    fn removes_statement(&self, child: &SyntaxNode, step: &Step) -> bool {
        match step {
            Step::Drop(_) | Step::Consumed => true,
            Step::Visit(Category::Docstring) => {
                !self.config.keep_docstrings && !self.profile.is_comment(child.kind)
            }
            _ => false,
        }
    }

    fn visit(
        &mut self,
        node: &SyntaxNode,
        category: Category,
        scope: Scope,
    ) -> Result<(), ReconstructError> {
        match category {
            Category::Comment | Category::Docstring if self.profile.is_comment(node.kind) => {
                self.trivia(node)
            }
            Category::Docstring => {
                if decide(Category::Docstring, self.config) == Action::Drop {
                    self.stats.docstrings_removed += 1;
                    self.drop_node(node.span.clone())?;
                }
                Ok(())
            }
            Category::ClassDef | Category::FunctionDef | Category::MethodDef => {
                self.definition(node, category)
            }
            _ => self.descend(node, scope),
        }
    }

    /// Comments and doc comments outside any statement list decision.
    fn trivia(&mut self, node: &SyntaxNode) -> Result<(), ReconstructError> {
        if self.profile.is_doc_comment(node, self.source) {
            if decide(Category::Docstring, self.config) == Action::Drop {
                self.stats.docstrings_removed += 1;
                return self.drop_node(node.span.clone());
            }
        } else if decide(Category::Comment, self.config) == Action::Drop {
            self.stats.comments_removed += 1;
            return self.drop_node(node.span.clone());
        }
        Ok(())
    }

    /// Walk a kept node looking for comments and nested bodies.
    fn descend(&mut self, node: &SyntaxNode, scope: Scope) -> Result<(), ReconstructError> {
        for child in &node.children {
            if self.profile.is_comment(child.kind) {
                self.trivia(child)?;
            } else if self.profile.is_body(child.kind) {
                let inner = if child.kind == "class_body" {
                    Scope::Class
                } else {
                    Scope::Block
                };
                self.process_list(child, inner, true)?;
            } else if !child.children.is_empty() {
                self.descend(child, scope)?;
            }
        }
        Ok(())
    }

    fn definition(&mut self, node: &SyntaxNode, category: Category) -> Result<(), ReconstructError> {
        if let Some(inner) = self.profile.wrapped_definition(node) {
            for child in &node.children {
                if std::ptr::eq(child, inner) {
                    self.definition(child, category)?;
                } else if self.profile.is_comment(child.kind) {
                    self.trivia(child)?;
                } else {
                    self.descend(child, Scope::Block)?;
                }
            }
            return Ok(());
        }

        self.count_definition(category);
        let body_scope = if category != Category::ClassDef {
            Scope::Function
        } else if self.profile.is_namespace(node.kind) {
            Scope::Module
        } else {
            Scope::Class
        };

        for child in &node.children {
            if child.field == Some("body") && self.profile.is_body(child.kind) {
                match decide_body(category, self.config) {
                    Action::Keep | Action::KeepSignatureOnly => {
                        self.process_list(child, body_scope, true)?
                    }
                    Action::Drop | Action::DropWithPlaceholder => self.elide_body(node, child)?,
                }
            } else if self.profile.is_comment(child.kind) {
                self.trivia(child)?;
            } else if !child.children.is_empty() {
                self.descend(child, Scope::Function)?;
            }
        }
        Ok(())
    }

    fn elide_body(&mut self, def: &SyntaxNode, body: &SyntaxNode) -> Result<(), ReconstructError> {
        self.stats.bodies_elided += 1;
        match self.profile.block_style {
            BlockStyle::Indented => self.elide_indented(body),
            BlockStyle::Braced => self.elide_braced(def, body),
        }
    }

    /// Replace an indented body with the placeholder, keeping its docstring.
    fn elide_indented(&mut self, body: &SyntaxNode) -> Result<(), ReconstructError> {
        let placeholder = self.profile.placeholder.line;
        let docstring = body
            .children
            .iter()
            .find(|c| c.named && !c.extra)
            .filter(|c| self.profile.is_docstring_statement(c));

        match docstring {
            Some(doc) if self.config.keep_docstrings => {
                self.out.drop(body.start()..doc.start())?;
                let text = if starts_line(self.source, doc.start()) {
                    let indent = line_indent(self.source, doc.start());
                    format!("{}{indent}{placeholder}", self.newline)
                } else {
                    format!("; {placeholder}")
                };
                self.out.replace(doc.end()..body.end(), text)
            }
            Some(_) => {
                self.stats.docstrings_removed += 1;
                self.out.replace(body.span.clone(), placeholder)
            }
            None => self.out.replace(body.span.clone(), placeholder),
        }
    }

    /// Replace everything between a body's braces.
    fn elide_braced(&mut self, def: &SyntaxNode, body: &SyntaxNode) -> Result<(), ReconstructError> {
        let open = body.children.iter().find(|c| c.kind == "{");
        let close = body.children.iter().rev().find(|c| c.kind == "}");
        let (Some(open), Some(close)) = (open, close) else {
            return Ok(());
        };
        let interior = open.end()..close.start();
        let placeholder = self.profile.placeholder;

        if !self.source[interior.clone()].contains('\n') {
            return self
                .out
                .replace(interior, format!(" {} ", placeholder.inline));
        }

        let close_indent = if starts_line(self.source, close.start()) {
            line_indent(self.source, close.start())
        } else {
            line_indent(self.source, def.start().max(open.start()))
        };
        let body_indent = self.source[interior.clone()]
            .split('\n')
            .skip(1)
            .find(|line| !line.trim().is_empty())
            .map(|line| {
                let width = line.len() - line.trim_start_matches([' ', '\t']).len();
                line[..width].to_string()
            })
            .unwrap_or_else(|| format!("{close_indent}{}", self.profile.indent_unit));

        let newline = self.newline;
        let text = format!("{newline}{body_indent}{}{newline}{close_indent}", placeholder.line);
        self.out.replace(interior, text)
    }
}
