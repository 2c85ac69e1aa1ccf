//! Engine properties checked across every built-in grammar.

use pare::compress::syntax::{GrammarAdapter, GrammarRegistry, TreeSitterGrammar};
use pare::compress::{compress, CompressedResult, SkipReason};
use pare::config::{CompressionConfig, CompressionMode};
use pare::filter::Language;
use pretty_assertions::assert_eq;

struct Fixture {
    language: Language,
    id: &'static str,
    source: &'static str,
    /// Text that only occurs inside function bodies.
    body_markers: &'static [&'static str],
    docstrings: &'static [&'static str],
    /// Prefix of a plain comment; doc prefixes are listed in `doc_prefixes`.
    comment: &'static str,
    doc_prefixes: &'static [&'static str],
}

const PYTHON: Fixture = Fixture {
    language: Language::Python,
    id: "python",
    source: r#""""Geometry helpers."""

import math
from typing import List

# Default precision for rounding.
PRECISION = 3


class Shape:
    """Base shape."""

    sides = 0

    def area(self) -> float:
        """Area of the shape."""
        raise NotImplementedError("area")

    def describe(self):
        label = type(self).__name__  # class name
        return f"{label} with {self.sides} sides"


class Circle(Shape):
    def __init__(self, radius):
        self.radius = radius

    def area(self) -> float:
        """Area of a circle."""
        # pi r squared
        return round(math.pi * self.radius ** 2, PRECISION)


def total_area(shapes: List[Shape]) -> float:
    """Sum the areas."""
    return sum(s.area() for s in shapes)
"#,
    body_markers: &[
        "NotImplementedError",
        "type(self).__name__",
        "self.radius = radius",
        "math.pi",
        "sum(s.area()",
    ],
    docstrings: &[
        r#""""Geometry helpers.""""#,
        r#""""Base shape.""""#,
        r#""""Area of the shape.""""#,
        r#""""Area of a circle.""""#,
        r#""""Sum the areas.""""#,
    ],
    comment: "#",
    doc_prefixes: &[],
};

const RUST: Fixture = Fixture {
    language: Language::Rust,
    id: "rs",
    source: r#"//! Inventory tracking.

use std::collections::HashMap;

/// Maximum items per slot.
pub const MAX: usize = 64;

/// A stock keeping unit.
#[derive(Debug, Clone)]
pub struct Item {
    pub name: String,
    count: usize,
}

/// Storage for items.
pub trait Store {
    /// Add an item.
    fn add(&mut self, item: Item) -> bool;
}

pub struct Inventory {
    items: HashMap<String, Item>,
}

impl Store for Inventory {
    /// Add an item, merging counts.
    fn add(&mut self, item: Item) -> bool {
        // merge existing
        let entry = self.items.entry(item.name.clone()).or_insert(item);
        entry.count <= MAX // within bounds
    }
}

/// Entry point.
pub fn run() -> usize {
    let inv = Inventory { items: HashMap::new() };
    inv.items.len()
}
"#,
    body_markers: &["or_insert", "entry.count <= MAX", "inv.items.len()"],
    docstrings: &[
        "//! Inventory tracking.",
        "/// Maximum items per slot.",
        "/// A stock keeping unit.",
        "/// Storage for items.",
        "/// Add an item.",
        "/// Add an item, merging counts.",
        "/// Entry point.",
    ],
    comment: "//",
    doc_prefixes: &["///", "//!"],
};

const GO: Fixture = Fixture {
    language: Language::Go,
    id: "go",
    source: r#"package main

import "fmt"

// Greeter says hello.
type Greeter struct {
	Name string // display name
}

// Greet returns a greeting.
func (g Greeter) Greet() string {
	// format it
	return fmt.Sprintf("hi %s", g.Name)
}

func main() {
	fmt.Println(Greeter{Name: "x"}.Greet())
}
"#,
    body_markers: &["fmt.Sprintf", "fmt.Println"],
    docstrings: &[],
    comment: "//",
    doc_prefixes: &[],
};

const TYPESCRIPT: Fixture = Fixture {
    language: Language::TypeScript,
    id: "ts",
    source: r#"import { readFile } from "fs";

/** Options for loading. */
export interface LoadOptions {
  encoding: string;
}

export class Loader {
  private cache = new Map<string, string>();

  /** Load a file, caching the result. */
  async load(path: string, opts: LoadOptions): Promise<string> {
    // check the cache first
    const hit = this.cache.get(path);
    if (hit) return hit;
    return new Promise((resolve) => readFile(path, opts.encoding, (_e, d) => resolve(String(d))));
  }
}

/** Make a loader. */
export function createLoader(): Loader {
  return new Loader();
}
"#,
    body_markers: &["this.cache.get", "new Promise", "new Loader()"],
    docstrings: &[
        "/** Options for loading. */",
        "/** Load a file, caching the result. */",
        "/** Make a loader. */",
    ],
    comment: "//",
    doc_prefixes: &["/**"],
};

const JAVA: Fixture = Fixture {
    language: Language::Java,
    id: "java",
    source: r#"package shop;

import java.util.List;

/** A shopping cart. */
public class Cart {
    private final List<String> items;

    /** Create an empty cart. */
    public Cart(List<String> items) {
        this.items = items;
    }

    /** Number of items. */
    public int size() {
        // count them
        return items.size();
    }
}
"#,
    body_markers: &["this.items = items", "items.size()"],
    docstrings: &[
        "/** A shopping cart. */",
        "/** Create an empty cart. */",
        "/** Number of items. */",
    ],
    comment: "//",
    doc_prefixes: &["/**"],
};

const FIXTURES: &[Fixture] = &[PYTHON, RUST, GO, TYPESCRIPT, JAVA];

const MODES: [CompressionMode; 3] = [
    CompressionMode::Interface,
    CompressionMode::Signature,
    CompressionMode::Minimal,
];

fn run(source: &str, id: &str, config: &CompressionConfig) -> CompressedResult {
    compress(&GrammarRegistry::builtin(), source, id, config)
}

fn config(mode: CompressionMode, keep_docstrings: bool, remove_comments: bool) -> CompressionConfig {
    CompressionConfig {
        keep_docstrings,
        remove_comments,
        ..CompressionConfig::with_mode(mode)
    }
}

#[test]
fn fixtures_parse_cleanly() {
    for fixture in FIXTURES {
        let parsed = TreeSitterGrammar::builtin(fixture.language).parse(fixture.source);
        assert!(parsed.is_ok(), "{}: {:?}", fixture.id, parsed.err());
    }
}

#[test]
fn compression_is_idempotent() {
    for fixture in FIXTURES {
        for mode in [CompressionMode::Interface, CompressionMode::Minimal] {
            let config = CompressionConfig::with_mode(mode);
            let once = run(fixture.source, fixture.id, &config);
            assert!(once.compressed, "{} {mode}", fixture.id);

            let twice = run(&once.text, fixture.id, &config);
            assert_eq!(once.text, twice.text, "{} {mode}", fixture.id);
        }
    }
}

#[test]
fn compressed_output_reparses() {
    for fixture in FIXTURES {
        let grammar = TreeSitterGrammar::builtin(fixture.language);
        for mode in MODES {
            for keep_docstrings in [true, false] {
                let result = run(fixture.source, fixture.id, &config(mode, keep_docstrings, true));
                assert!(result.compressed);
                let reparsed = grammar.parse(&result.text);
                assert!(
                    reparsed.is_ok(),
                    "{} {mode} docstrings={keep_docstrings}:\n{}",
                    fixture.id,
                    result.text
                );
            }
        }
    }
}

#[test]
fn elided_bodies_leave_nothing_behind() {
    for fixture in FIXTURES {
        for mode in [CompressionMode::Interface, CompressionMode::Minimal] {
            let result = run(fixture.source, fixture.id, &CompressionConfig::with_mode(mode));
            for marker in fixture.body_markers {
                assert!(
                    !result.text.contains(marker),
                    "{} {mode} kept {marker:?}:\n{}",
                    fixture.id,
                    result.text
                );
            }
        }
    }
}

#[test]
fn signature_mode_keeps_bodies() {
    for fixture in FIXTURES {
        let result = run(fixture.source, fixture.id, &config(CompressionMode::Signature, true, false));
        assert_eq!(result.text, fixture.source, "{}", fixture.id);
    }
}

#[test]
fn output_is_drawn_from_the_source() {
    const PLACEHOLDERS: &[&str] = &["/* ... */", "// ...", "pass"];

    for fixture in FIXTURES {
        let source: Vec<char> = fixture.source.chars().filter(|c| !c.is_whitespace()).collect();
        for mode in MODES {
            let result = run(fixture.source, fixture.id, &CompressionConfig::with_mode(mode));
            let mut text = result.text.clone();
            for placeholder in PLACEHOLDERS {
                text = text.replace(placeholder, "");
            }

            let mut remaining = source.iter();
            for c in text.chars().filter(|c| !c.is_whitespace()) {
                assert!(
                    remaining.any(|s| *s == c),
                    "{} {mode}: {c:?} not drawn from source:\n{}",
                    fixture.id,
                    result.text
                );
            }
        }
    }
}

#[test]
fn docstrings_follow_keep_docstrings() {
    for fixture in FIXTURES {
        for mode in [CompressionMode::Interface, CompressionMode::Signature] {
            let kept = run(fixture.source, fixture.id, &config(mode, true, false));
            let dropped = run(fixture.source, fixture.id, &config(mode, false, false));

            for doc in fixture.docstrings {
                assert!(kept.text.contains(doc), "{} {mode} lost {doc:?}", fixture.id);
                assert!(!dropped.text.contains(doc), "{} {mode} kept {doc:?}", fixture.id);
            }
        }
    }
}

/// Remove comment-only lines, trailing comments and blank lines.
fn without_comments(text: &str, comment: &str, doc_prefixes: &[&str]) -> String {
    let trailing = format!(" {comment}");
    let mut out = String::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            continue;
        }
        let is_doc = doc_prefixes.iter().any(|p| trimmed.starts_with(p));
        if trimmed.starts_with(comment) && !is_doc {
            continue;
        }
        let code = match line.find(&trailing) {
            Some(i) if !is_doc => line[..i].trim_end(),
            _ => line,
        };
        out.push_str(code);
        out.push('\n');
    }
    out
}

#[test]
fn remove_comments_touches_only_comments() {
    for fixture in FIXTURES {
        let with = run(fixture.source, fixture.id, &config(CompressionMode::Signature, true, false));
        let without = run(fixture.source, fixture.id, &config(CompressionMode::Signature, true, true));

        assert!(without.stats.comments_removed > 0, "{}", fixture.id);
        assert_eq!(
            without_comments(&with.text, fixture.comment, fixture.doc_prefixes),
            without_comments(&without.text, fixture.comment, fixture.doc_prefixes),
            "{}",
            fixture.id
        );
        for doc in fixture.docstrings {
            assert!(without.text.contains(doc), "{} lost {doc:?}", fixture.id);
        }
    }
}

#[test]
fn python_scenarios() {
    let add = "def add(a, b):\n    \"\"\"Add two numbers.\"\"\"\n    return a + b\n";

    let interface = run(add, "python", &CompressionConfig::with_mode(CompressionMode::Interface));
    assert_eq!(
        interface.text,
        "def add(a, b):\n    \"\"\"Add two numbers.\"\"\"\n    pass\n"
    );

    let minimal = run(add, "python", &CompressionConfig::with_mode(CompressionMode::Minimal));
    assert_eq!(minimal.text, "");

    let constant = format!("X = 1\n\n{add}");
    let minimal = run(&constant, "python", &CompressionConfig::with_mode(CompressionMode::Minimal));
    assert_eq!(minimal.text, "X = 1\n");
}

#[test]
fn unsupported_language_is_byte_identical() {
    let source = "       IDENTIFICATION DIVISION.\r\n       PROGRAM-ID. HELLO.\r\n";
    let result = run(source, "cobol", &CompressionConfig::default());
    assert!(!result.compressed);
    assert_eq!(result.text, source);
    assert_eq!(result.skipped, Some(SkipReason::UnsupportedLanguage));
}

#[test]
fn minimal_keeps_module_statements() {
    let result = run(PYTHON.source, "py", &CompressionConfig::with_mode(CompressionMode::Minimal));
    assert_eq!(
        result.text,
        "\"\"\"Geometry helpers.\"\"\"\n\nimport math\nfrom typing import List\n\n# Default precision for rounding.\nPRECISION = 3\n"
    );

    let result = run(JAVA.source, "java", &CompressionConfig::with_mode(CompressionMode::Minimal));
    assert_eq!(result.text, "package shop;\n\nimport java.util.List;\n");
}

#[test]
fn grammars_are_shared_across_threads() {
    let registry = GrammarRegistry::builtin();
    let config = CompressionConfig::with_mode(CompressionMode::Interface);
    let expected = compress(&registry, RUST.source, "rust", &config).text;

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| compress(&registry, RUST.source, "rust", &config).text))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

/// Definitions nested in functions and classes, with text found only in
/// the innermost bodies.
const NESTED: &[(&str, &str, &[&str])] = &[
    (
        "python",
        r#"class Outer:
    class Inner:
        def deep(self):
            return "deep-marker"

    def method(self):
        def helper():
            return "helper-marker"
        return helper()


def top():
    class Local:
        pass

    def nested():
        return "nested-marker"
    return nested()
"#,
        &["deep-marker", "helper-marker", "nested-marker", "class Local"],
    ),
    (
        "rust",
        r#"mod outer {
    pub mod inner {
        pub fn deep() -> u8 {
            fn helper() -> u8 { 7 }
            helper()
        }
    }
}

fn top() {
    struct Local;
    fn nested() -> &'static str { "nested-marker" }
    let _ = nested();
}
"#,
        &["fn helper", "nested-marker", "struct Local"],
    ),
    (
        "java",
        r#"class Outer {
    static class Inner {
        int deep() {
            Runnable r = new Runnable() {
                public void run() { System.out.println("anon-marker"); }
            };
            return 1;
        }
    }
}
"#,
        &["anon-marker", "return 1"],
    ),
];

#[test]
fn nested_definitions_go_with_their_body() {
    for (id, source, markers) in NESTED {
        let grammar = TreeSitterGrammar::builtin(id.parse().unwrap());
        for mode in [CompressionMode::Interface, CompressionMode::Minimal] {
            let config = CompressionConfig::with_mode(mode);
            let once = run(source, id, &config);
            assert!(once.compressed, "{id} {mode}");

            for marker in *markers {
                assert!(
                    !once.text.contains(marker),
                    "{id} {mode} kept {marker:?}:\n{}",
                    once.text
                );
            }
            assert!(grammar.parse(&once.text).is_ok(), "{id} {mode}:\n{}", once.text);
            assert_eq!(once.text, run(&once.text, id, &config).text, "{id} {mode}");
        }

        let signature = run(source, id, &CompressionConfig::with_mode(CompressionMode::Signature));
        assert_eq!(signature.text, *source, "{id}");
    }
}
