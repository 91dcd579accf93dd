//! The layout file: parsing and serialization.
//!
//! Line grammar: `<indent><branch-name>[ <annotation>]`. Indent is either
//! tabs or runs of a fixed number of spaces — whichever the first indented
//! line uses — and depth may grow by at most one per line. Blank lines and
//! comments are not part of the format and are rejected (decision recorded
//! in DESIGN.md), which keeps `serialize(parse(f))` byte-identical to `f`
//! modulo the single trailing newline.
//!
//! Writes go through a temp file and an atomic rename in the target
//! directory; bulk replacements (discover, edit) first move the old file to
//! a `~` sibling.

use std::io::Write;
use std::path::Path;

use super::{Annotation, BranchTree, LayoutError};
use crate::git::GitError;

/// The indentation unit of one layout file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentUnit {
    Tabs,
    Spaces(usize),
}

impl Default for IndentUnit {
    /// Unit used when writing a file that never had an indented line.
    fn default() -> Self {
        IndentUnit::Spaces(2)
    }
}

impl IndentUnit {
    fn render(&self, depth: usize) -> String {
        match self {
            IndentUnit::Tabs => "\t".repeat(depth),
            IndentUnit::Spaces(n) => " ".repeat(n * depth),
        }
    }
}

/// Parse layout file text into a tree.
pub fn parse(text: &str) -> Result<BranchTree, LayoutError> {
    let mut tree = BranchTree::new();
    let mut unit: Option<IndentUnit> = None;
    let mut stack: Vec<usize> = Vec::new();
    let mut prev_depth: Option<usize> = None;

    for (lineno, line) in text.lines().enumerate() {
        let lineno = lineno + 1;

        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            return Err(LayoutError::UnexpectedLine { line: lineno });
        }

        let indent_len = line.len() - line.trim_start_matches([' ', '\t']).len();
        let (indent, rest) = line.split_at(indent_len);

        let depth = if indent.is_empty() {
            0
        } else {
            let has_tabs = indent.contains('\t');
            let has_spaces = indent.contains(' ');
            if has_tabs && has_spaces {
                return Err(LayoutError::MixedIndent { line: lineno });
            }
            let this_unit = if has_tabs {
                IndentUnit::Tabs
            } else {
                IndentUnit::Spaces(indent.len())
            };
            // The first indented line is always depth 1 and defines the
            // unit for the rest of the file.
            match *unit.get_or_insert(this_unit) {
                IndentUnit::Tabs => {
                    if has_spaces {
                        return Err(LayoutError::MixedIndent { line: lineno });
                    }
                    indent.len()
                }
                IndentUnit::Spaces(n) => {
                    if has_tabs {
                        return Err(LayoutError::MixedIndent { line: lineno });
                    }
                    if indent.len() % n != 0 {
                        return Err(LayoutError::UnalignedIndent { line: lineno });
                    }
                    indent.len() / n
                }
            }
        };

        let (name, annotation) = match rest.split_once(' ') {
            Some((name, ann)) => (name, Some(Annotation::new(ann))),
            None => (rest, None),
        };

        if tree.is_managed(name) {
            return Err(LayoutError::DuplicateBranch {
                line: lineno,
                branch: name.to_string(),
            });
        }
        let max_depth = prev_depth.map_or(0, |d| d + 1);
        if depth > max_depth {
            return Err(LayoutError::IndentJump {
                line: lineno,
                branch: name.to_string(),
            });
        }

        tree.append_at_depth(depth, name, annotation, &mut stack);
        prev_depth = Some(depth);
    }

    tree.indent = unit.unwrap_or_default();
    Ok(tree)
}

/// Serialize a tree back to file text, ending with a single newline.
pub fn serialize(tree: &BranchTree) -> String {
    let mut out = String::new();
    for (depth, name, annotation) in tree.entries() {
        out.push_str(&tree.indent.render(depth));
        out.push_str(&name);
        if let Some(ann) = annotation {
            out.push(' ');
            out.push_str(ann.text());
        }
        out.push('\n');
    }
    out
}

/// Read and parse the layout file.
///
/// A missing file yields [`GitError::LayoutMissing`] so commands can point
/// the user at `discover`/`edit`.
pub fn load(path: &Path) -> anyhow::Result<BranchTree> {
    if !path.exists() {
        return Err(GitError::LayoutMissing {
            path: path.to_path_buf(),
        }
        .into());
    }
    let text = std::fs::read_to_string(path)?;
    Ok(parse(&text)?)
}

/// Write the layout file atomically (temp file + rename).
pub fn save(tree: &BranchTree, path: &Path) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(serialize(tree).as_bytes())?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// Write the layout file, first renaming any existing file to `<path>~`.
///
/// Used by bulk replacement (discover, edit writeback) so the previous
/// layout survives one generation.
pub fn save_with_backup(tree: &BranchTree, path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        let mut backup = path.as_os_str().to_owned();
        backup.push("~");
        std::fs::rename(path, &backup)?;
    }
    save(tree, path)
}
