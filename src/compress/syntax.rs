//! Grammar adapters and the owned syntax tree the engine works on.
//!
//! A [`GrammarAdapter`] turns source text into a [`SyntaxTree`] of raw,
//! grammar-specific node kinds with byte spans. The built-in adapter wraps
//! tree-sitter; parsers are cached per thread, never shared.

use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ops::Range;

use thiserror::Error;
use tree_sitter::{Parser, TreeCursor};

use super::classify::LanguageProfile;
use crate::filter::Language;

/// A node of a concrete syntax tree.
///
/// Children are ordered by start offset, do not overlap and lie inside
/// the parent's span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    /// Raw grammar type tag.
    pub kind: &'static str,
    /// Field role within the parent (`body`, `name`, `parameters`, ...).
    pub field: Option<&'static str>,
    /// Byte range into the source.
    pub span: Range<usize>,
    /// Named node, as opposed to anonymous punctuation or keywords.
    pub named: bool,
    /// Trivia the grammar allows anywhere (comments).
    pub extra: bool,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    /// A named leaf or branch, mostly useful for building trees in tests.
    pub fn new(kind: &'static str, span: Range<usize>) -> Self {
        Self {
            kind,
            field: None,
            span,
            named: true,
            extra: false,
            children: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: &'static str) -> Self {
        self.field = Some(field);
        self
    }

    pub fn with_children(mut self, children: Vec<SyntaxNode>) -> Self {
        self.children = children;
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.named = false;
        self
    }

    pub fn start(&self) -> usize {
        self.span.start
    }

    pub fn end(&self) -> usize {
        self.span.end
    }

    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.span.clone()]
    }

    pub fn child_by_field(&self, field: &str) -> Option<&SyntaxNode> {
        self.children.iter().find(|c| c.field == Some(field))
    }

    pub fn child_by_kind(&self, kind: &str) -> Option<&SyntaxNode> {
        self.children.iter().find(|c| c.kind == kind)
    }

    pub fn named_children(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.children.iter().filter(|c| c.named)
    }

    /// Depth-first walk in source order, including `self`.
    pub fn walk(&self) -> impl Iterator<Item = &SyntaxNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

/// A parsed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxTree {
    pub root: SyntaxNode,
}

/// The grammar could not produce a clean tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("failed to initialize {language} parser")]
    ParserInit { language: Language },

    #[error("parser produced no tree")]
    NoTree,

    #[error("syntax error at byte {offset}")]
    SyntaxError { offset: usize },
}

/// Parses source text of one language.
///
/// Implementations must be deterministic and perform no semantic analysis.
pub trait GrammarAdapter: Send + Sync {
    fn parse(&self, source: &str) -> Result<SyntaxTree, ParseFailure>;
}

/// A tree-sitter grammar.
pub struct TreeSitterGrammar {
    language: Language,
    grammar: tree_sitter::Language,
}

impl TreeSitterGrammar {
    pub fn new(language: Language, grammar: tree_sitter::Language) -> Self {
        Self { language, grammar }
    }

    /// The grammar shipped for a built-in language.
    pub fn builtin(language: Language) -> Self {
        let grammar = match language {
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::Go => tree_sitter_go::LANGUAGE.into(),
            // The TypeScript grammars accept plain JavaScript.
            Language::TypeScript | Language::JavaScript => {
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
            }
            Language::Tsx | Language::Jsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Language::Java => tree_sitter_java::LANGUAGE.into(),
        };
        Self::new(language, grammar)
    }
}

impl GrammarAdapter for TreeSitterGrammar {
    fn parse(&self, source: &str) -> Result<SyntaxTree, ParseFailure> {
        let tree = with_parser(self.language, &self.grammar, |parser| {
            parser.parse(source, None)
        })?
        .ok_or(ParseFailure::NoTree)?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(ParseFailure::SyntaxError {
                offset: first_error(root).unwrap_or(root.start_byte()),
            });
        }

        let mut cursor = tree.walk();
        Ok(SyntaxTree {
            root: build_node(&mut cursor),
        })
    }
}

// One parser per language per thread; `Parser` is not `Sync`.
thread_local! {
    static PARSERS: RefCell<HashMap<Language, Parser>> = RefCell::new(HashMap::new());
}

fn with_parser<F, R>(
    language: Language,
    grammar: &tree_sitter::Language,
    f: F,
) -> Result<R, ParseFailure>
where
    F: FnOnce(&mut Parser) -> R,
{
    PARSERS.with(|cell| {
        let mut parsers = cell.borrow_mut();
        let parser = match parsers.entry(language) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => {
                let mut parser = Parser::new();
                parser
                    .set_language(grammar)
                    .map_err(|_| ParseFailure::ParserInit { language })?;
                slot.insert(parser)
            }
        };
        Ok(f(parser))
    })
}

fn build_node(cursor: &mut TreeCursor<'_>) -> SyntaxNode {
    let node = cursor.node();
    let mut out = SyntaxNode {
        kind: node.kind(),
        field: cursor.field_name(),
        span: node.byte_range(),
        named: node.is_named(),
        extra: node.is_extra(),
        children: Vec::with_capacity(node.child_count()),
    };

    if cursor.goto_first_child() {
        loop {
            out.children.push(build_node(cursor));
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
    }

    out
}

fn first_error(node: tree_sitter::Node<'_>) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_byte());
    }
    let mut cursor = node.walk();
    let offset = node
        .children(&mut cursor)
        .filter(|c| c.has_error() || c.is_missing())
        .find_map(first_error);
    offset
}

/// A grammar paired with the classifier table for its node kinds.
pub struct RegisteredGrammar {
    pub adapter: Box<dyn GrammarAdapter>,
    pub profile: &'static LanguageProfile,
}

/// Read-only table of available grammars.
///
/// Built once at startup and passed to [`compress`](super::compress);
/// it is `Sync`, so worker threads share one instance.
#[derive(Default)]
pub struct GrammarRegistry {
    grammars: HashMap<Language, RegisteredGrammar>,
}

impl GrammarRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// All built-in languages with their classifier tables.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for &language in Language::all() {
            registry.register(
                language,
                TreeSitterGrammar::builtin(language),
                LanguageProfile::for_language(language),
            );
        }
        registry
    }

    /// Register or replace the grammar for a language.
    pub fn register(
        &mut self,
        language: Language,
        adapter: impl GrammarAdapter + 'static,
        profile: &'static LanguageProfile,
    ) {
        self.grammars.insert(
            language,
            RegisteredGrammar {
                adapter: Box::new(adapter),
                profile,
            },
        );
    }

    pub fn get(&self, language: Language) -> Option<&RegisteredGrammar> {
        self.grammars.get(&language)
    }

    /// Resolve a language name or extension.
    pub fn resolve(&self, language_id: &str) -> Option<(Language, &RegisteredGrammar)> {
        let language: Language = language_id.parse().ok()?;
        self.get(language).map(|g| (language, g))
    }

    pub fn languages(&self) -> Vec<Language> {
        let mut languages: Vec<Language> = self.grammars.keys().copied().collect();
        languages.sort();
        languages
    }
}

impl std::fmt::Debug for GrammarRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrammarRegistry")
            .field("languages", &self.languages())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(language: Language, source: &str) -> Result<SyntaxTree, ParseFailure> {
        TreeSitterGrammar::builtin(language).parse(source)
    }

    #[test]
    fn test_parse_python_fields() {
        let source = "def add(a, b):\n    return a + b\n";
        let tree = parse(Language::Python, source).unwrap();

        assert_eq!(tree.root.kind, "module");
        let func = &tree.root.children[0];
        assert_eq!(func.kind, "function_definition");
        assert_eq!(func.child_by_field("name").unwrap().text(source), "add");
        assert_eq!(func.child_by_field("parameters").unwrap().text(source), "(a, b)");
        assert_eq!(func.child_by_field("body").unwrap().kind, "block");
    }

    #[test]
    fn test_spans_nest_and_order() {
        let source = "use std::fmt;\n\nfn main() {\n    let x = 1;\n}\n";
        let tree = parse(Language::Rust, source).unwrap();

        for node in tree.root.walk() {
            let mut previous_end = node.start();
            for child in &node.children {
                assert!(child.start() >= previous_end);
                assert!(child.end() <= node.end());
                previous_end = child.end();
            }
        }
    }

    #[test]
    fn test_comments_are_extra() {
        let source = "# note\nx = 1\n";
        let tree = parse(Language::Python, source).unwrap();
        let comment = &tree.root.children[0];
        assert_eq!(comment.kind, "comment");
        assert!(comment.extra);
    }

    #[test]
    fn test_syntax_error_is_failure() {
        let result = parse(Language::Python, "def broken(:\n    pass\n");
        assert!(matches!(result, Err(ParseFailure::SyntaxError { .. })));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let source = "package main\n\nfunc main() {}\n";
        assert_eq!(parse(Language::Go, source), parse(Language::Go, source));
    }

    #[test]
    fn test_registry_resolve() {
        let registry = GrammarRegistry::builtin();
        assert!(registry.resolve("py").is_some());
        assert!(registry.resolve("java").is_some());
        assert!(registry.resolve("cobol").is_none());
        assert_eq!(registry.languages().len(), Language::all().len());
        assert!(GrammarRegistry::empty().resolve("python").is_none());
    }

    #[test]
    fn test_walk_order() {
        let tree = SyntaxNode::new("root", 0..10).with_children(vec![
            SyntaxNode::new("a", 0..4).with_children(vec![SyntaxNode::new("a1", 0..2)]),
            SyntaxNode::new("b", 5..10),
        ]);
        let kinds: Vec<_> = tree.walk().map(|n| n.kind).collect();
        assert_eq!(kinds, vec!["root", "a", "a1", "b"]);
    }
}
