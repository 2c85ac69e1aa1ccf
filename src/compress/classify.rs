//! Node classification.
//!
//! Each language gets a [`LanguageProfile`]: a table from raw grammar node
//! kinds to the canonical [`Category`] vocabulary the policy understands.
//! Adding a language is a matter of writing a table, not touching the
//! engine. Kinds a table does not mention fall back to `Other`.

use super::syntax::SyntaxNode;
use crate::filter::Language;

/// Canonical, language-independent node categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Import,
    /// Non-definition statement at module scope.
    ModuleStatement,
    ClassDef,
    FunctionDef,
    MethodDef,
    Decorator,
    Docstring,
    Comment,
    Parameters,
    Body,
    Other,
}

impl Category {
    pub fn is_definition(self) -> bool {
        matches!(
            self,
            Category::ClassDef | Category::FunctionDef | Category::MethodDef
        )
    }
}

/// Which kind of body a statement list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Module,
    Class,
    Function,
    /// Control-flow or expression block.
    Block,
}

/// Where a node sits relative to its statement list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub scope: Scope,
    /// Direct member of a statement list or definition wrapper.
    pub statement: bool,
    /// First non-trivia member of its list.
    pub first_statement: bool,
}

impl Position {
    pub fn statement(scope: Scope, first_statement: bool) -> Self {
        Self {
            scope,
            statement: true,
            first_statement,
        }
    }

    pub fn nested(scope: Scope) -> Self {
        Self {
            scope,
            statement: false,
            first_statement: false,
        }
    }
}

/// How a language delimits bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStyle {
    /// Indentation-scoped (Python).
    Indented,
    /// Brace-delimited.
    Braced,
}

/// Text substituted for an elided body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    /// Used when the body spans several lines.
    pub line: &'static str,
    /// Used when the body sits on one line.
    pub inline: &'static str,
}

/// First-statement string literals act as docstrings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocstringRule {
    pub statement: &'static str,
    pub strings: &'static [&'static str],
}

/// Classification table for one grammar.
#[derive(Debug)]
pub struct LanguageProfile {
    pub name: &'static str,
    pub imports: &'static [&'static str],
    pub classes: &'static [&'static str],
    /// Class-like kinds whose body is a module scope (Rust `mod`, TS `namespace`).
    pub namespaces: &'static [&'static str],
    pub functions: &'static [&'static str],
    /// Kinds that are methods by tag alone (Go receivers).
    pub methods: &'static [&'static str],
    /// Wrapper kind and the field holding the wrapped definition.
    pub wrappers: &'static [(&'static str, &'static str)],
    pub decorators: &'static [&'static str],
    pub comments: &'static [&'static str],
    pub doc_comment_prefixes: &'static [&'static str],
    pub bodies: &'static [&'static str],
    /// Lists nested inside a body that hold more members (Java enum members).
    pub member_lists: &'static [&'static str],
    pub parameters: &'static [&'static str],
    pub docstring: Option<DocstringRule>,
    pub block_style: BlockStyle,
    pub placeholder: Placeholder,
    pub indent_unit: &'static str,
    /// Only comments are recognised; everything else is kept.
    pub generic: bool,
}

const BRACED: Placeholder = Placeholder {
    line: "// ...",
    inline: "/* ... */",
};

pub static PYTHON: LanguageProfile = LanguageProfile {
    name: "python",
    imports: &[
        "import_statement",
        "import_from_statement",
        "future_import_statement",
    ],
    classes: &["class_definition"],
    namespaces: &[],
    functions: &["function_definition"],
    methods: &[],
    wrappers: &[("decorated_definition", "definition")],
    decorators: &["decorator"],
    comments: &["comment"],
    doc_comment_prefixes: &[],
    bodies: &["block"],
    member_lists: &[],
    parameters: &["parameters", "lambda_parameters"],
    docstring: Some(DocstringRule {
        statement: "expression_statement",
        strings: &["string", "concatenated_string"],
    }),
    block_style: BlockStyle::Indented,
    placeholder: Placeholder {
        line: "pass",
        inline: "pass",
    },
    indent_unit: "    ",
    generic: false,
};

pub static RUST: LanguageProfile = LanguageProfile {
    name: "rust",
    imports: &["use_declaration", "extern_crate_declaration"],
    classes: &["impl_item", "trait_item", "mod_item"],
    namespaces: &["mod_item"],
    functions: &["function_item", "function_signature_item"],
    methods: &[],
    wrappers: &[],
    decorators: &["attribute_item"],
    comments: &["line_comment", "block_comment"],
    doc_comment_prefixes: &["///", "//!", "/**", "/*!"],
    bodies: &["block", "declaration_list"],
    member_lists: &[],
    parameters: &["parameters", "closure_parameters"],
    docstring: None,
    block_style: BlockStyle::Braced,
    placeholder: BRACED,
    indent_unit: "    ",
    generic: false,
};

pub static GO: LanguageProfile = LanguageProfile {
    name: "go",
    imports: &["import_declaration", "package_clause"],
    classes: &[],
    namespaces: &[],
    functions: &["function_declaration"],
    methods: &["method_declaration"],
    wrappers: &[],
    decorators: &[],
    comments: &["comment"],
    doc_comment_prefixes: &[],
    bodies: &["block", "statement_list"],
    member_lists: &[],
    parameters: &["parameter_list"],
    docstring: None,
    block_style: BlockStyle::Braced,
    placeholder: BRACED,
    indent_unit: "\t",
    generic: false,
};

pub static TYPESCRIPT: LanguageProfile = LanguageProfile {
    name: "typescript",
    imports: &["import_statement"],
    classes: &[
        "class_declaration",
        "abstract_class_declaration",
        "internal_module",
        "module",
    ],
    namespaces: &["internal_module", "module"],
    functions: &[
        "function_declaration",
        "generator_function_declaration",
        "function_signature",
    ],
    methods: &["method_definition"],
    wrappers: &[("export_statement", "declaration")],
    decorators: &["decorator"],
    comments: &["comment"],
    doc_comment_prefixes: &["/**"],
    bodies: &["statement_block", "class_body"],
    member_lists: &[],
    parameters: &["formal_parameters"],
    docstring: None,
    block_style: BlockStyle::Braced,
    placeholder: BRACED,
    indent_unit: "  ",
    generic: false,
};

pub static JAVA: LanguageProfile = LanguageProfile {
    name: "java",
    imports: &["import_declaration", "package_declaration"],
    classes: &[
        "class_declaration",
        "interface_declaration",
        "enum_declaration",
        "record_declaration",
    ],
    namespaces: &[],
    functions: &["method_declaration", "constructor_declaration"],
    methods: &[],
    wrappers: &[],
    decorators: &[],
    comments: &["line_comment", "block_comment"],
    doc_comment_prefixes: &["/**"],
    bodies: &[
        "block",
        "constructor_body",
        "class_body",
        "interface_body",
        "enum_body",
    ],
    member_lists: &["enum_body_declarations"],
    parameters: &["formal_parameters"],
    docstring: None,
    block_style: BlockStyle::Braced,
    placeholder: BRACED,
    indent_unit: "    ",
    generic: false,
};

/// Fallback for grammars without a table.
pub static GENERIC: LanguageProfile = LanguageProfile {
    name: "generic",
    imports: &[],
    classes: &[],
    namespaces: &[],
    functions: &[],
    methods: &[],
    wrappers: &[],
    decorators: &[],
    comments: &[],
    doc_comment_prefixes: &[],
    bodies: &[],
    member_lists: &[],
    parameters: &[],
    docstring: None,
    block_style: BlockStyle::Braced,
    placeholder: BRACED,
    indent_unit: "    ",
    generic: true,
};

impl LanguageProfile {
    pub fn for_language(language: Language) -> &'static LanguageProfile {
        match language {
            Language::Python => &PYTHON,
            Language::Rust => &RUST,
            Language::Go => &GO,
            Language::TypeScript | Language::Tsx | Language::JavaScript | Language::Jsx => {
                &TYPESCRIPT
            }
            Language::Java => &JAVA,
        }
    }

    pub fn is_comment(&self, kind: &str) -> bool {
        if self.generic {
            kind.contains("comment")
        } else {
            self.comments.contains(&kind)
        }
    }

    /// Comment node whose text marks it as documentation.
    pub fn is_doc_comment(&self, node: &SyntaxNode, source: &str) -> bool {
        if self.generic || !self.comments.contains(&node.kind) {
            return false;
        }
        let text = node.text(source);
        self.doc_comment_prefixes.iter().any(|prefix| {
            text.strip_prefix(prefix)
                .is_some_and(|rest| !rest.starts_with(['/', '*']))
        })
    }

    pub fn is_body(&self, kind: &str) -> bool {
        self.bodies.contains(&kind)
    }

    pub fn is_member_list(&self, kind: &str) -> bool {
        self.member_lists.contains(&kind)
    }

    pub fn is_namespace(&self, kind: &str) -> bool {
        self.namespaces.contains(&kind)
    }

    /// The field holding the wrapped definition, if `kind` is a wrapper.
    pub fn wrapper_field(&self, kind: &str) -> Option<&'static str> {
        self.wrappers
            .iter()
            .find(|(wrapper, _)| *wrapper == kind)
            .map(|(_, field)| *field)
    }

    /// Statement that is a bare string literal.
    pub fn is_docstring_statement(&self, node: &SyntaxNode) -> bool {
        let Some(rule) = self.docstring else {
            return false;
        };
        if node.kind != rule.statement {
            return false;
        }
        let mut named = node.named_children().filter(|c| !c.extra);
        match (named.next(), named.next()) {
            (Some(only), None) => rule.strings.contains(&only.kind),
            _ => false,
        }
    }

    /// Classify a node given its position.
    ///
    /// Pure: the result depends only on the node, its text and `position`.
    pub fn classify(&self, node: &SyntaxNode, source: &str, position: Position) -> Category {
        if self.is_comment(node.kind) {
            return if self.is_doc_comment(node, source) {
                Category::Docstring
            } else {
                Category::Comment
            };
        }
        if self.generic {
            return Category::Other;
        }
        if self.decorators.contains(&node.kind) {
            return Category::Decorator;
        }
        if self.parameters.contains(&node.kind) {
            return Category::Parameters;
        }
        if self.is_body(node.kind) {
            return Category::Body;
        }
        if !position.statement {
            return Category::Other;
        }
        if self.imports.contains(&node.kind) {
            return Category::Import;
        }
        if let Some(inner) = self.wrapped_definition(node) {
            return self.classify(inner, source, position);
        }
        if self.classes.contains(&node.kind) && node.child_by_field("body").is_some() {
            return Category::ClassDef;
        }
        if self.methods.contains(&node.kind) {
            return Category::MethodDef;
        }
        if self.functions.contains(&node.kind) {
            return if position.scope == Scope::Class {
                Category::MethodDef
            } else {
                Category::FunctionDef
            };
        }
        if position.first_statement
            && position.scope != Scope::Block
            && self.is_docstring_statement(node)
        {
            return Category::Docstring;
        }
        if position.scope == Scope::Module {
            Category::ModuleStatement
        } else {
            Category::Other
        }
    }

    /// The definition inside a wrapper such as `decorated_definition`.
    pub fn wrapped_definition<'n>(&self, node: &'n SyntaxNode) -> Option<&'n SyntaxNode> {
        let field = self.wrapper_field(node.kind)?;
        let inner = node.child_by_field(field)?;
        let is_def = self.classes.contains(&inner.kind)
            || self.functions.contains(&inner.kind)
            || self.methods.contains(&inner.kind)
            || self.wrapper_field(inner.kind).is_some();
        is_def.then_some(inner)
    }
}
