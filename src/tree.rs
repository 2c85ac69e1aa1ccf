//! Directory structure of a pack.
//!
//! Builds a tree from the relative paths of packed files and renders it
//! with box-drawing characters for the `<file_map>` section.

use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

use crate::filter::Language;

/// The type of a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File {
        language: Option<Language>,
        size: u64,
        lines: usize,
        compressed: bool,
    },
}

/// A node in the file tree.
#[derive(Debug, Clone)]
pub struct FileNode {
    /// File or directory name (not full path).
    pub name: String,
    /// Path relative to the pack root.
    pub path: PathBuf,
    pub kind: NodeKind,
    children: Vec<FileNode>,
}

/// Per-file data shown next to a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub language: Option<Language>,
    pub size: u64,
    pub lines: usize,
    pub compressed: bool,
}

impl FileNode {
    /// Create a new directory node.
    pub fn directory(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::Directory,
            children: Vec::new(),
        }
    }

    /// Create a new file node.
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>, meta: FileMeta) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::File {
                language: meta.language,
                size: meta.size,
                lines: meta.lines,
                compressed: meta.compressed,
            },
            children: Vec::new(),
        }
    }

    /// Build a sorted tree from relative file paths.
    pub fn from_paths<'a>(
        root_name: &str,
        files: impl IntoIterator<Item = (&'a Path, FileMeta)>,
    ) -> Self {
        let mut root = FileNode::directory(root_name, PathBuf::new());
        for (path, meta) in files {
            root.insert(path, meta);
        }
        root.sort_children();
        root
    }

    fn insert(&mut self, relative: &Path, meta: FileMeta) {
        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let Some((file_name, dirs)) = parts.split_last() else {
            return;
        };

        let mut node = self;
        let mut path = PathBuf::new();
        for dir in dirs {
            path.push(dir);
            let index = match node
                .children
                .iter()
                .position(|c| c.is_directory() && &c.name == dir)
            {
                Some(index) => index,
                None => {
                    node.children.push(FileNode::directory(dir.clone(), path.clone()));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[index];
        }
        node.children
            .push(FileNode::file(file_name.clone(), relative, meta));
    }

    /// Check if this is a directory.
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory)
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    /// Get child nodes.
    pub fn children(&self) -> &[FileNode] {
        &self.children
    }

    /// Sort children: directories first, then alphabetically.
    pub fn sort_children(&mut self) {
        self.children.sort_by(|a, b| match (&a.kind, &b.kind) {
            (NodeKind::Directory, NodeKind::File { .. }) => Ordering::Less,
            (NodeKind::File { .. }, NodeKind::Directory) => Ordering::Greater,
            _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        });

        for child in &mut self.children {
            child.sort_children();
        }
    }

    /// Count total files in this tree.
    pub fn file_count(&self) -> usize {
        match &self.kind {
            NodeKind::File { .. } => 1,
            NodeKind::Directory => self.children.iter().map(|c| c.file_count()).sum(),
        }
    }
}

/// Options for rendering the tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub show_size: bool,
    pub show_lines: bool,
    pub show_language: bool,
    /// Mark compressed files with `+`.
    pub mark_compressed: bool,
}

impl RenderOptions {
    /// Create options with all metadata enabled.
    pub fn with_metadata() -> Self {
        Self {
            show_size: true,
            show_lines: true,
            show_language: true,
            mark_compressed: true,
        }
    }

    /// Create minimal options (no metadata).
    pub fn minimal() -> Self {
        Self::default()
    }
}

/// Box-drawing characters for tree rendering.
const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const VERTICAL: &str = "│   ";
const SPACE: &str = "    ";

/// Render a file tree to a string with box-drawing characters.
///
/// # Examples
///
/// ```
/// use pare::tree::{FileMeta, FileNode, RenderOptions, render_tree};
/// use std::path::Path;
///
/// let meta = FileMeta { language: None, size: 10, lines: 1, compressed: false };
/// let root = FileNode::from_paths("project", [(Path::new("src/main.rs"), meta)]);
///
/// let output = render_tree(&root, &RenderOptions::minimal());
/// assert!(output.contains("└── main.rs"));
/// ```
pub fn render_tree(root: &FileNode, options: &RenderOptions) -> String {
    let mut output = String::with_capacity(4096);
    render_node(&mut output, root, "", true, true, options);
    output
}

fn render_node(
    output: &mut String,
    node: &FileNode,
    prefix: &str,
    is_last: bool,
    is_root: bool,
    options: &RenderOptions,
) {
    let branch = if is_root {
        ""
    } else if is_last {
        LAST_BRANCH
    } else {
        BRANCH
    };

    output.push_str(prefix);
    output.push_str(branch);
    output.push_str(&node.name);

    if node.is_directory() {
        output.push('/');
    }

    if let NodeKind::File {
        language,
        size,
        lines,
        compressed,
    } = &node.kind
    {
        let mut metadata = Vec::new();

        if options.show_language {
            if let Some(language) = language {
                metadata.push(language.to_string());
            }
        }
        if options.show_lines {
            metadata.push(format!("{} lines", format_number(*lines)));
        }
        if options.show_size {
            metadata.push(format_size(*size));
        }

        if !metadata.is_empty() {
            output.push_str(" [");
            output.push_str(&metadata.join(", "));
            output.push(']');
        }
        if options.mark_compressed && *compressed {
            output.push_str(" +");
        }
    }

    output.push('\n');

    let child_count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let is_last_child = i == child_count - 1;

        // Root's children have no prefix before their branch
        let new_prefix = if is_root {
            String::new()
        } else {
            let continuation = if is_last { SPACE } else { VERTICAL };
            format!("{}{}", prefix, continuation)
        };

        render_node(output, child, &new_prefix, is_last_child, false, options);
    }
}

/// Format file size for display.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes < KB {
        format!("{}B", bytes)
    } else if bytes < MB {
        format!("{:.1}KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    }
}

/// Format number with thousands separators.
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(language: Option<Language>, lines: usize) -> FileMeta {
        FileMeta {
            language,
            size: 100,
            lines,
            compressed: false,
        }
    }

    #[test]
    fn test_from_paths_nests_directories() {
        let root = FileNode::from_paths(
            "project",
            [
                (Path::new("src/a/x.py"), meta(Some(Language::Python), 1)),
                (Path::new("src/b.py"), meta(Some(Language::Python), 2)),
                (Path::new("README.md"), meta(None, 3)),
            ],
        );

        assert_eq!(root.file_count(), 3);
        assert_eq!(root.children()[0].name, "src");
        assert_eq!(root.children()[1].name, "README.md");

        let src = &root.children()[0];
        assert!(src.children()[0].is_directory());
        assert_eq!(src.children()[1].path, PathBuf::from("src/b.py"));
    }

    #[test]
    fn test_sort_children() {
        let mut dir = FileNode::directory("src", "src");
        dir.children.push(FileNode::file("z.rs", "src/z.rs", meta(None, 5)));
        dir.children.push(FileNode::directory("utils", "src/utils"));
        dir.children.push(FileNode::file("a.rs", "src/a.rs", meta(None, 5)));

        dir.sort_children();

        assert!(dir.children[0].is_directory());
        assert_eq!(dir.children[1].name, "a.rs");
        assert_eq!(dir.children[2].name, "z.rs");
    }

    #[test]
    fn test_render_branches() {
        let root = FileNode::from_paths(
            "project",
            [
                (Path::new("src/lib.rs"), meta(None, 1)),
                (Path::new("src/main.rs"), meta(None, 1)),
                (Path::new("build.rs"), meta(None, 1)),
            ],
        );

        let output = render_tree(&root, &RenderOptions::minimal());
        assert_eq!(
            output,
            "project/\n├── src/\n│   ├── lib.rs\n│   └── main.rs\n└── build.rs\n"
        );
    }

    #[test]
    fn test_render_with_metadata() {
        let mut file = meta(Some(Language::Rust), 1500);
        file.compressed = true;
        let root = FileNode::from_paths("p", [(Path::new("main.rs"), file)]);

        let output = render_tree(&root, &RenderOptions::with_metadata());
        assert!(output.contains("main.rs [Rust, 1,500 lines, 100B] +"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0B");
        assert_eq!(format_size(1023), "1023B");
        assert_eq!(format_size(1024), "1.0KB");
        assert_eq!(format_size(1024 * 1024), "1.0MB");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }
}
