//! What survives compression.

use super::classify::Category;
use crate::config::{CompressionConfig, CompressionMode};

/// Resolved treatment of a classified node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Keep,
    /// Keep the header, replace the body with a placeholder.
    KeepSignatureOnly,
    Drop,
    DropWithPlaceholder,
}

/// Decide the action for a category.
///
/// Decorators report `Keep` here; they follow their definition, which the
/// engine handles by dropping them together with it.
pub fn decide(category: Category, config: &CompressionConfig) -> Action {
    use CompressionMode::*;

    match category {
        Category::Import
        | Category::ModuleStatement
        | Category::Decorator
        | Category::Parameters
        | Category::Other => Action::Keep,
        Category::ClassDef | Category::FunctionDef | Category::MethodDef => match config.mode {
            Interface => Action::KeepSignatureOnly,
            Signature => Action::Keep,
            Minimal => Action::Drop,
        },
        Category::Docstring => keep_if(config.keep_docstrings),
        Category::Body => match config.mode {
            Interface => Action::DropWithPlaceholder,
            Signature => Action::Keep,
            Minimal => Action::Drop,
        },
        Category::Comment => keep_if(!config.remove_comments),
    }
}

/// Action for the body of a definition.
///
/// Class bodies are containers: outside Minimal mode they are kept and
/// their members decided one by one.
pub fn decide_body(owner: Category, config: &CompressionConfig) -> Action {
    match (owner, config.mode) {
        (Category::ClassDef, CompressionMode::Minimal) => Action::Drop,
        (Category::ClassDef, _) => Action::Keep,
        _ => decide(Category::Body, config),
    }
}

fn keep_if(keep: bool) -> Action {
    if keep {
        Action::Keep
    } else {
        Action::Drop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions_by_mode() {
        let interface = CompressionConfig::with_mode(CompressionMode::Interface);
        let signature = CompressionConfig::with_mode(CompressionMode::Signature);
        let minimal = CompressionConfig::with_mode(CompressionMode::Minimal);

        for def in [Category::ClassDef, Category::FunctionDef, Category::MethodDef] {
            assert_eq!(decide(def, &interface), Action::KeepSignatureOnly);
            assert_eq!(decide(def, &signature), Action::Keep);
            assert_eq!(decide(def, &minimal), Action::Drop);
        }

        assert_eq!(decide(Category::Body, &interface), Action::DropWithPlaceholder);
        assert_eq!(decide(Category::Body, &signature), Action::Keep);
        assert_eq!(decide(Category::Body, &minimal), Action::Drop);
    }

    #[test]
    fn test_statements_always_kept() {
        for mode in [
            CompressionMode::Interface,
            CompressionMode::Signature,
            CompressionMode::Minimal,
        ] {
            let config = CompressionConfig::with_mode(mode);
            for category in [
                Category::Import,
                Category::ModuleStatement,
                Category::Other,
                Category::Decorator,
            ] {
                assert_eq!(decide(category, &config), Action::Keep);
            }
        }
    }

    #[test]
    fn test_docstring_and_comment_flags() {
        let mut config = CompressionConfig::default();
        assert_eq!(decide(Category::Docstring, &config), Action::Keep);
        assert_eq!(decide(Category::Comment, &config), Action::Keep);

        config.keep_docstrings = false;
        config.remove_comments = true;
        assert_eq!(decide(Category::Docstring, &config), Action::Drop);
        assert_eq!(decide(Category::Comment, &config), Action::Drop);
    }

    #[test]
    fn test_class_bodies_are_containers() {
        let interface = CompressionConfig::with_mode(CompressionMode::Interface);
        let minimal = CompressionConfig::with_mode(CompressionMode::Minimal);

        assert_eq!(decide_body(Category::ClassDef, &interface), Action::Keep);
        assert_eq!(decide_body(Category::ClassDef, &minimal), Action::Drop);
        assert_eq!(
            decide_body(Category::MethodDef, &interface),
            Action::DropWithPlaceholder
        );
    }
}
