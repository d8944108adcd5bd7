//! Canonical text rendering of location trees, and the change test built on
//! top of it.
//!
//! The rendering is exactly what ends up in front of a human, so "did
//! anything change" is deliberately defined as "would the human see
//! different text", not as raw structural equality. Mapping labels render
//! sorted and list order is preserved, which makes the comparison a
//! faithful structural-equality proxy rather than an iteration-order
//! artifact.

use crate::model::LocationTree;

/// Appended when a rendering had to be cut.
const TRUNCATION_NOTICE: &str = "…\n<i>Nota: il messaggio è troppo lungo e l'ho troncato</i>";

/// Render a tree at the given indent.
///
/// Lists render as `- name` lines. Mappings render as `<i><u>label</u></i>:`
/// sections in label order, each followed by the subtree two spaces deeper
/// and a blank separator line.
pub fn render(tree: &LocationTree, indent: usize) -> String {
    if tree.is_empty() {
        return String::new();
    }
    let spacing = " ".repeat(indent);
    let mut lines = Vec::new();
    match tree {
        LocationTree::List(names) => {
            for name in names {
                lines.push(format!("{spacing}- {name}"));
            }
        }
        LocationTree::Branches(branches) => {
            // BTreeMap iteration is already label-sorted.
            for (label, subtree) in branches {
                lines.push(format!("{spacing}<i><u>{label}</u></i>:"));
                lines.push(render(subtree, indent + 2));
                lines.push(String::new());
            }
        }
    }
    lines.join("\n")
}

/// Render with a byte budget, cutting at a structurally safe point.
pub fn render_limited(tree: &LocationTree, indent: usize, limit: usize) -> String {
    truncate(&render(tree, indent), limit)
}

/// Cut `text` to at most `limit` bytes of content plus a truncation notice.
///
/// The cut lands on a UTF-8 boundary and never inside a markup tag: if the
/// byte limit falls between a `<` and its `>`, the cut backs off to before
/// the `<`. Text at or under the limit passes through unchanged.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }

    let mut cut = limit;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut head = &text[..cut];
    if let Some(open) = head.rfind('<') {
        if head[open..].find('>').is_none() {
            head = &head[..open];
        }
    }
    format!("{head}{TRUNCATION_NOTICE}")
}

/// True iff the canonical renderings differ.
pub fn changed(old: &LocationTree, new: &LocationTree) -> bool {
    render(old, 0) != render(new, 0)
}
