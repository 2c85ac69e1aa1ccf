//! Comment and blank-line stripping.
//!
//! Runs on its own when compression is off but `remove_comments` is set;
//! blank-line removal is a plain text pass applied last.

use super::classify::LanguageProfile;
use super::reconstruct::{line_extent, tidy, ReconstructError, Reconstructor};
use super::syntax::SyntaxNode;
use super::CompressionStats;

/// Drop every comment, doc comments included.
pub fn strip_comments(
    source: &str,
    root: &SyntaxNode,
    profile: &LanguageProfile,
) -> Result<(String, CompressionStats), ReconstructError> {
    let mut comments = Vec::new();
    collect_comments(root, profile, &mut comments);

    let mut out = Reconstructor::new(source);
    let mut stats = CompressionStats::default();
    for span in comments {
        let extent = line_extent(source, span.clone());
        let start = extent.start.max(out.cursor().min(span.start));
        out.drop(start..extent.end)?;
        stats.comments_removed += 1;
    }

    if out.is_empty() {
        return Ok((source.to_string(), stats));
    }
    Ok((tidy(out.finish(), source), stats))
}

fn collect_comments(
    node: &SyntaxNode,
    profile: &LanguageProfile,
    out: &mut Vec<std::ops::Range<usize>>,
) {
    for child in &node.children {
        if profile.is_comment(child.kind) {
            out.push(child.span.clone());
        } else {
            collect_comments(child, profile, out);
        }
    }
}

/// Remove lines that contain only whitespace.
pub fn remove_empty_lines(text: &str) -> String {
    text.split_inclusive('\n')
        .filter(|line| !line.trim().is_empty())
        .collect()
}
