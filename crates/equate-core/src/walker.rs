//! Discovery of convertible text in the live document.
//!
//! Nothing here is cached. The host mutates the document between every step
//! (and sometimes re-renders whole blocks), so each call walks the current
//! tree from the roots again.

use crate::config::HostContract;
use crate::platform::{DocumentTree, EditSurface};
use crate::scanner::{self, EquationSpan};

/// A span located in a live text leaf, with the text it was scanned from.
///
/// Only valid until the next suspension point; re-check with
/// [`TargetLocation::is_current`] before acting on it later.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetLocation<N> {
    pub node: N,
    pub text: String,
    pub span: EquationSpan,
}

impl<N: Clone + PartialEq> TargetLocation<N> {
    /// Whether `tree` still holds this node with `expected` as its text.
    pub fn is_current<T>(&self, tree: &T, expected: &str) -> bool
    where
        T: DocumentTree<Node = N>,
    {
        tree.is_connected(&self.node)
            && tree
                .text(&self.node)
                .is_some_and(|text| same_text(&text, expected))
    }

    /// Re-check the target, following it to a new leaf if the host replaced
    /// the node with one holding the same text. False if it is gone.
    pub fn revalidate<T>(&mut self, tree: &T, contract: &HostContract, expected: &str) -> bool
    where
        T: DocumentTree<Node = N>,
    {
        if self.is_current(tree, expected) {
            return true;
        }
        match relocate(tree, contract, expected) {
            Some(node) => {
                tracing::debug!(target: "equate::walker", "target leaf replaced, following it");
                self.node = node;
                true
            }
            None => false,
        }
    }
}

/// Text equality that ignores which whitespace character the host used.
///
/// Editors swap spaces at the edge of a deletion for U+00A0 and back. Every
/// whitespace character is a single UTF-16 unit, so offsets computed on one
/// side stay valid on the other.
pub fn same_text(a: &str, b: &str) -> bool {
    a.chars().map(fold_space).eq(b.chars().map(fold_space))
}

fn fold_space(c: char) -> char {
    if c.is_whitespace() { ' ' } else { c }
}

/// Resolve the containers to search, in selector priority order.
///
/// A container nested inside one already chosen is dropped, since its
/// leaves are covered. Falls back to the body when nothing matches.
pub fn resolve_roots<T: DocumentTree>(tree: &T, contract: &HostContract) -> Vec<T::Node> {
    let mut roots: Vec<T::Node> = Vec::new();
    for selector in contract.roots.iter().filter(|s| !s.trim().is_empty()) {
        for candidate in tree.query_all(selector) {
            if roots.iter().any(|r| tree.contains(r, &candidate)) {
                continue;
            }
            roots.push(candidate);
        }
    }
    if roots.is_empty() {
        roots.extend(tree.body());
    }
    roots
}

/// Whether a text leaf sits in editable, non-code, non-math content.
fn is_editable_leaf<T: DocumentTree>(tree: &T, contract: &HostContract, leaf: &T::Node) -> bool {
    let Some(parent) = tree.parent_element(leaf) else {
        return false;
    };
    tree.is_editable(&parent)
        && tree.closest(&parent, &contract.code_region).is_none()
        && tree.closest(&parent, &contract.rendered_math).is_none()
}

/// Whether a text leaf may be converted.
fn is_eligible<T: DocumentTree>(tree: &T, contract: &HostContract, leaf: &T::Node) -> bool {
    tree.text(leaf).is_some_and(|text| scanner::contains_delimiter(&text))
        && is_editable_leaf(tree, contract, leaf)
}

/// Editable text leaves across all roots, each yielded once.
fn editable_leaves<T: DocumentTree>(
    tree: &T,
    contract: &HostContract,
    accept: impl Fn(&T::Node) -> bool,
) -> Vec<T::Node> {
    let mut leaves: Vec<T::Node> = Vec::new();
    for root in resolve_roots(tree, contract) {
        for leaf in tree.text_leaves(&root) {
            if leaves.contains(&leaf) || !accept(&leaf) {
                continue;
            }
            leaves.push(leaf);
        }
    }
    leaves
}

/// Eligible text leaves across all roots, in root order then document order.
///
/// A leaf reachable from several roots is yielded once.
pub fn eligible_leaves<T: DocumentTree>(tree: &T, contract: &HostContract) -> Vec<T::Node> {
    editable_leaves(tree, contract, |leaf| is_eligible(tree, contract, leaf))
}

/// The first span of the first eligible leaf, from a fresh scan.
pub fn find_next_target<T: DocumentTree>(
    tree: &T,
    contract: &HostContract,
) -> Option<TargetLocation<T::Node>> {
    find_next_target_excluding(tree, contract, &[])
}

/// Like [`find_next_target`], passing over the given leaves.
pub fn find_next_target_excluding<T: DocumentTree>(
    tree: &T,
    contract: &HostContract,
    excluded: &[T::Node],
) -> Option<TargetLocation<T::Node>> {
    eligible_leaves(tree, contract)
        .into_iter()
        .filter(|node| !excluded.contains(node))
        .find_map(|node| {
            let text = tree.text(&node)?;
            let span = scanner::first_dollar_span(&text)?;
            Some(TargetLocation { node, text, span })
        })
}

/// First editable leaf whose text is `expected`, whitespace folded.
///
/// No delimiter is required: once both delimiters are gone the leaf may hold
/// none.
pub fn relocate<T: DocumentTree>(
    tree: &T,
    contract: &HostContract,
    expected: &str,
) -> Option<T::Node> {
    editable_leaves(tree, contract, |leaf| {
        tree.text(leaf).is_some_and(|text| same_text(&text, expected))
            && is_editable_leaf(tree, contract, leaf)
    })
    .into_iter()
    .next()
}

/// Editable leaves whose text contains `fragment`, whitespace folded.
pub fn leaves_containing<T: DocumentTree>(
    tree: &T,
    contract: &HostContract,
    fragment: &str,
) -> Vec<T::Node> {
    let fold = |s: &str| s.chars().map(fold_space).collect::<String>();
    let fragment = fold(fragment);
    editable_leaves(tree, contract, |leaf| {
        tree.text(leaf).is_some_and(|text| fold(&text).contains(&fragment))
            && is_editable_leaf(tree, contract, leaf)
    })
}

/// Total number of spans across all eligible leaves.
pub fn count_targets<T: DocumentTree>(tree: &T, contract: &HostContract) -> usize {
    eligible_leaves(tree, contract)
        .iter()
        .filter_map(|leaf| tree.text(leaf))
        .map(|text| scanner::find_dollar_spans(&text).len())
        .sum()
}

/// Nearest editable element at or above the leaf's parent.
pub fn editable_ancestor<T: DocumentTree>(tree: &T, leaf: &T::Node) -> Option<T::Node> {
    let mut current = tree.parent_element(leaf);
    while let Some(element) = current {
        if tree.is_editable(&element) {
            return Some(element);
        }
        current = tree.parent_element(&element);
    }
    None
}

/// Whether the active selection now sits inside rendered math, meaning the
/// host converted the selection in place.
pub fn selection_in_rendered_math<S: EditSurface>(surface: &S, contract: &HostContract) -> bool {
    let Some(anchor) = surface.selection_anchor() else {
        return false;
    };
    let element = if surface.text(&anchor).is_some() {
        surface.parent_element(&anchor)
    } else {
        Some(anchor)
    };
    element
        .and_then(|el| surface.closest(&el, &contract.rendered_math))
        .is_some()
}
