//! The branch layout: an ordered tree of managed branches.
//!
//! The tree is the in-memory form of the layout file (see [`file`]). Nodes
//! are stored in an arena (`Vec` + indices) so every node can reach both its
//! parent and its children without ownership cycles. Removal detaches nodes
//! from the traversal structures and leaves the arena slot unreferenced; a
//! tree lives for one CLI invocation, so the slack is irrelevant.

use std::collections::HashMap;
use std::fmt;

use color_print::cformat;

use crate::styling::{error_message, hint_message};

pub mod file;

pub use file::{IndentUnit, parse, serialize};

/// Per-branch opt-outs embedded in the annotation text.
///
/// `rebase=no`, `push=no` and `slide-out=no` tokens anywhere in the
/// annotation; all default to false (no opt-out).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Qualifiers {
    pub no_rebase: bool,
    pub no_push: bool,
    pub no_slide_out: bool,
}

/// The trailing text of a branch line, kept verbatim for byte-stable
/// round-trips. Qualifier tokens are recognized wherever they appear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    text: String,
}

impl Annotation {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The raw annotation text, qualifiers included.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn qualifiers(&self) -> Qualifiers {
        let mut q = Qualifiers::default();
        for token in self.text.split_whitespace() {
            match token {
                "rebase=no" => q.no_rebase = true,
                "push=no" => q.no_push = true,
                "slide-out=no" => q.no_slide_out = true,
                _ => {}
            }
        }
        q
    }

    /// The annotation with qualifier tokens removed, single-spaced.
    pub fn free_text(&self) -> String {
        self.text
            .split_whitespace()
            .filter(|t| !matches!(*t, "rebase=no" | "push=no" | "slide-out=no"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Navigation directions for `show` and `go`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Current,
    Up,
    Down,
    First,
    Last,
    Prev,
    Next,
    Root,
}

#[derive(Debug)]
pub enum LayoutError {
    /// Tabs and spaces mixed within one file (or one line's indent)
    MixedIndent { line: usize },
    /// Indent that is not a whole multiple of the detected unit
    UnalignedIndent { line: usize },
    /// Depth increased by more than one relative to the previous line
    IndentJump { line: usize, branch: String },
    /// The same branch listed twice
    DuplicateBranch { line: usize, branch: String },
    /// Blank lines and comment lines are not part of the format
    UnexpectedLine { line: usize },
    /// `add --onto` target is not in the layout
    UnknownParent { parent: String },
    /// Branch already present when adding
    AlreadyManaged { branch: String },
    /// Operation requires the branch to be in the layout
    NotManaged { branch: String },
    /// Invalid slide-out sequence (not a chain, root included, …)
    InvalidSlideOut { message: String },
    /// A navigation with no result (root has no parent, last has no next, …)
    Navigation { branch: String, message: String },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::MixedIndent { line } => write!(
                f,
                "{}",
                error_message(format!(
                    "Layout file line {line}: mixed tab and space indentation"
                ))
            ),
            LayoutError::UnalignedIndent { line } => write!(
                f,
                "{}",
                error_message(format!(
                    "Layout file line {line}: indent is not a multiple of the file's indent unit"
                ))
            ),
            LayoutError::IndentJump { line, branch } => write!(
                f,
                "{}",
                error_message(cformat!(
                    "Layout file line {line}: <bold>{branch}</> is indented more than one level past its parent"
                ))
            ),
            LayoutError::DuplicateBranch { line, branch } => write!(
                f,
                "{}",
                error_message(cformat!(
                    "Layout file line {line}: branch <bold>{branch}</> listed more than once"
                ))
            ),
            LayoutError::UnexpectedLine { line } => write!(
                f,
                "{}",
                error_message(format!(
                    "Layout file line {line}: blank and comment lines are not allowed"
                ))
            ),
            LayoutError::UnknownParent { parent } => write!(
                f,
                "{}",
                error_message(cformat!("Parent branch <bold>{parent}</> is not in the layout"))
            ),
            LayoutError::AlreadyManaged { branch } => write!(
                f,
                "{}",
                error_message(cformat!("Branch <bold>{branch}</> is already in the layout"))
            ),
            LayoutError::NotManaged { branch } => write!(
                f,
                "{}\n{}",
                error_message(cformat!("Branch <bold>{branch}</> is not in the layout")),
                hint_message(format!("Add it with: trellis add {branch}"))
            ),
            LayoutError::InvalidSlideOut { message } => {
                write!(f, "{}", error_message(message))
            }
            LayoutError::Navigation { branch, message } => write!(
                f,
                "{}",
                error_message(cformat!("Branch <bold>{branch}</> {message}"))
            ),
        }
    }
}

impl std::error::Error for LayoutError {}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    annotation: Option<Annotation>,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Outcome of a slide-out, for the post-slide-out hook and follow-up
/// rebases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideOut {
    /// Parent the survivors were reattached to.
    pub new_upstream: String,
    /// The bottom-most branch of the slid-out chain.
    pub lowest_slid_out: String,
    /// Children of the chain's last branch, now children of `new_upstream`.
    pub new_downstreams: Vec<String>,
}

/// Ordered tree of managed branches.
#[derive(Debug, Clone)]
pub struct BranchTree {
    nodes: Vec<Node>,
    roots: Vec<usize>,
    by_name: HashMap<String, usize>,
    /// Indent unit the file was parsed with; reused on write so the file's
    /// style stays stable.
    pub indent: IndentUnit,
}

impl Default for BranchTree {
    fn default() -> Self {
        Self::new()
    }
}

impl BranchTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            by_name: HashMap::new(),
            indent: IndentUnit::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn is_managed(&self, branch: &str) -> bool {
        self.by_name.contains_key(branch)
    }

    fn idx(&self, branch: &str) -> Result<usize, LayoutError> {
        self.by_name
            .get(branch)
            .copied()
            .ok_or_else(|| LayoutError::NotManaged {
                branch: branch.to_string(),
            })
    }

    pub fn roots(&self) -> Vec<String> {
        self.roots.iter().map(|&i| self.nodes[i].name.clone()).collect()
    }

    pub fn parent(&self, branch: &str) -> Option<String> {
        let i = *self.by_name.get(branch)?;
        self.nodes[i].parent.map(|p| self.nodes[p].name.clone())
    }

    pub fn children(&self, branch: &str) -> Vec<String> {
        match self.by_name.get(branch) {
            Some(&i) => self.nodes[i]
                .children
                .iter()
                .map(|&c| self.nodes[c].name.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn annotation(&self, branch: &str) -> Option<&Annotation> {
        let i = *self.by_name.get(branch)?;
        self.nodes[i].annotation.as_ref()
    }

    pub fn qualifiers(&self, branch: &str) -> Qualifiers {
        self.annotation(branch)
            .map(Annotation::qualifiers)
            .unwrap_or_default()
    }

    /// Replace a branch's annotation; empty text clears it.
    pub fn set_annotation(&mut self, branch: &str, text: &str) -> Result<(), LayoutError> {
        let i = self.idx(branch)?;
        self.nodes[i].annotation = if text.trim().is_empty() {
            None
        } else {
            Some(Annotation::new(text.trim()))
        };
        Ok(())
    }

    /// All managed branches in pre-order (the file's line order).
    pub fn pre_order(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.by_name.len());
        for &root in &self.roots {
            self.walk(root, &mut out);
        }
        out
    }

    fn walk(&self, i: usize, out: &mut Vec<String>) {
        out.push(self.nodes[i].name.clone());
        for &c in &self.nodes[i].children {
            self.walk(c, out);
        }
    }

    /// Depth of a branch (roots are 0).
    pub fn depth(&self, branch: &str) -> Option<usize> {
        let mut i = *self.by_name.get(branch)?;
        let mut depth = 0;
        while let Some(p) = self.nodes[i].parent {
            depth += 1;
            i = p;
        }
        Some(depth)
    }

    /// Root ancestor of a branch.
    pub fn root_of(&self, branch: &str) -> Result<String, LayoutError> {
        let mut i = self.idx(branch)?;
        while let Some(p) = self.nodes[i].parent {
            i = p;
        }
        Ok(self.nodes[i].name.clone())
    }

    fn subtree_pre_order(&self, root: &str) -> Result<Vec<String>, LayoutError> {
        let i = self.idx(root)?;
        let mut out = Vec::new();
        self.walk(i, &mut out);
        Ok(out)
    }

    /// Resolve a navigation direction from a branch.
    ///
    /// `Down` may return several branches (all children); every other
    /// direction returns exactly one.
    pub fn show(&self, direction: Direction, from: &str) -> Result<Vec<String>, LayoutError> {
        let i = self.idx(from)?;
        let one = |name: String| Ok(vec![name]);
        match direction {
            Direction::Current => one(from.to_string()),
            Direction::Up => match self.nodes[i].parent {
                Some(p) => one(self.nodes[p].name.clone()),
                None => Err(LayoutError::Navigation {
                    branch: from.to_string(),
                    message: "is a root and has no parent".to_string(),
                }),
            },
            Direction::Down => {
                if self.nodes[i].children.is_empty() {
                    Err(LayoutError::Navigation {
                        branch: from.to_string(),
                        message: "has no children".to_string(),
                    })
                } else {
                    Ok(self.children(from))
                }
            }
            Direction::Root => one(self.root_of(from)?),
            Direction::First => {
                let root = self.root_of(from)?;
                let children = self.children(&root);
                one(children.first().cloned().unwrap_or(root))
            }
            Direction::Last => {
                let mut i = self.idx(&self.root_of(from)?)?;
                while let Some(&last) = self.nodes[i].children.last() {
                    i = last;
                }
                one(self.nodes[i].name.clone())
            }
            Direction::Prev | Direction::Next => {
                let sequence = self.subtree_pre_order(&self.root_of(from)?)?;
                let pos = sequence
                    .iter()
                    .position(|b| b == from)
                    .expect("branch is in its own root's subtree");
                let neighbor = if direction == Direction::Prev {
                    pos.checked_sub(1).map(|p| sequence[p].clone())
                } else {
                    sequence.get(pos + 1).cloned()
                };
                match neighbor {
                    Some(n) => one(n),
                    None => Err(LayoutError::Navigation {
                        branch: from.to_string(),
                        message: format!(
                            "has no {} within its tree",
                            if direction == Direction::Prev {
                                "predecessor"
                            } else {
                                "successor"
                            }
                        ),
                    }),
                }
            }
        }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Managed branches without children.
    pub fn childless(&self) -> Vec<String> {
        self.pre_order()
            .into_iter()
            .filter(|b| self.children(b).is_empty())
            .collect()
    }

    /// Managed branches with a parent (anything but a root can slide out).
    pub fn slidable(&self) -> Vec<String> {
        self.pre_order()
            .into_iter()
            .filter(|b| self.parent(b).is_some())
            .collect()
    }

    /// The branch that could be slid out right after `branch`: its only
    /// child, if it has exactly one.
    pub fn slidable_after(&self, branch: &str) -> Vec<String> {
        let children = self.children(branch);
        if children.len() == 1 {
            children
        } else {
            Vec::new()
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    fn push_node(&mut self, name: &str, annotation: Option<Annotation>, parent: Option<usize>) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node {
            name: name.to_string(),
            annotation,
            parent,
            children: Vec::new(),
        });
        self.by_name.insert(name.to_string(), idx);
        idx
    }

    /// Add a branch to the layout.
    ///
    /// Without `onto`/`as_root`, the caller decides the parent; this method
    /// only validates and inserts. New children/roots append at the end
    /// unless `as_first_child`.
    pub fn add(
        &mut self,
        branch: &str,
        onto: Option<&str>,
        as_root: bool,
        as_first_child: bool,
    ) -> Result<(), LayoutError> {
        if self.is_managed(branch) {
            return Err(LayoutError::AlreadyManaged {
                branch: branch.to_string(),
            });
        }
        if as_root {
            let idx = self.push_node(branch, None, None);
            if as_first_child {
                self.roots.insert(0, idx);
            } else {
                self.roots.push(idx);
            }
            return Ok(());
        }
        let parent_name = onto.ok_or_else(|| LayoutError::UnknownParent {
            parent: "<none>".to_string(),
        })?;
        let parent = self
            .by_name
            .get(parent_name)
            .copied()
            .ok_or_else(|| LayoutError::UnknownParent {
                parent: parent_name.to_string(),
            })?;
        let idx = self.push_node(branch, None, Some(parent));
        if as_first_child {
            self.nodes[parent].children.insert(0, idx);
        } else {
            self.nodes[parent].children.push(idx);
        }
        Ok(())
    }

    /// Remove a chain of branches, reattaching the survivors.
    ///
    /// The sequence must be a straight chain: every branch has a parent
    /// (roots cannot slide out) and each successor is the only child of its
    /// predecessor. Children of the last branch take the chain's place under
    /// the first branch's parent, in order.
    pub fn slide_out(&mut self, sequence: &[String]) -> Result<SlideOut, LayoutError> {
        if sequence.is_empty() {
            return Err(LayoutError::InvalidSlideOut {
                message: "No branches to slide out".to_string(),
            });
        }
        // Validate the chain before touching anything
        for branch in sequence {
            self.idx(branch)?;
        }
        let first = self.idx(&sequence[0])?;
        let Some(upstream) = self.nodes[first].parent else {
            return Err(LayoutError::InvalidSlideOut {
                message: format!("Cannot slide out {}: it is a root", sequence[0]),
            });
        };
        for pair in sequence.windows(2) {
            let pred = self.idx(&pair[0])?;
            let succ = self.idx(&pair[1])?;
            if self.nodes[pred].children != [succ] {
                return Err(LayoutError::InvalidSlideOut {
                    message: format!(
                        "{} must be the only child of {} to slide out together",
                        pair[1], pair[0]
                    ),
                });
            }
        }

        let last = self.idx(sequence.last().expect("sequence is non-empty"))?;
        let survivors = self.nodes[last].children.clone();

        // Replace the first branch with the survivors in the upstream's
        // child list, preserving position and order.
        let pos = self.nodes[upstream]
            .children
            .iter()
            .position(|&c| c == first)
            .expect("child is listed under its parent");
        self.nodes[upstream].children.remove(pos);
        for (offset, &child) in survivors.iter().enumerate() {
            self.nodes[upstream].children.insert(pos + offset, child);
            self.nodes[child].parent = Some(upstream);
        }

        // Detach the slid-out chain
        for branch in sequence {
            let i = self.by_name.remove(branch).expect("validated above");
            self.nodes[i].parent = None;
            self.nodes[i].children.clear();
        }

        Ok(SlideOut {
            new_upstream: self.nodes[upstream].name.clone(),
            lowest_slid_out: sequence.last().expect("non-empty").clone(),
            new_downstreams: survivors
                .iter()
                .map(|&c| self.nodes[c].name.clone())
                .collect(),
        })
    }

    /// Line entries as `(depth, name, annotation)`, pre-order. The bridge
    /// between the tree and the file serializer.
    pub fn entries(&self) -> Vec<(usize, String, Option<Annotation>)> {
        let mut out = Vec::new();
        for &root in &self.roots {
            self.entries_walk(root, 0, &mut out);
        }
        out
    }

    fn entries_walk(&self, i: usize, depth: usize, out: &mut Vec<(usize, String, Option<Annotation>)>) {
        out.push((depth, self.nodes[i].name.clone(), self.nodes[i].annotation.clone()));
        for &c in &self.nodes[i].children {
            self.entries_walk(c, depth + 1, out);
        }
    }

    /// Append a branch during parsing/building at the given depth, under the
    /// most recent branch one level up.
    pub(crate) fn append_at_depth(
        &mut self,
        depth: usize,
        name: &str,
        annotation: Option<Annotation>,
        stack: &mut Vec<usize>,
    ) {
        stack.truncate(depth);
        let parent = stack.last().copied();
        let idx = self.push_node(name, annotation, parent);
        match parent {
            Some(p) => self.nodes[p].children.push(idx),
            None => self.roots.push(idx),
        }
        stack.push(idx);
    }
}
