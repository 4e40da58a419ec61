//! Removal of unwanted elements and the wrappers they leave behind.

use ego_tree::NodeId;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// Structural elements that survive even when emptied
const PROTECTED: &[&str] = &["html", "head", "body"];

/// Remove every element matching any of `selectors`, collapsing ancestors
/// left effectively empty. Returns the number of elements detached.
pub(crate) fn prune(document: &mut Html, selectors: &[Selector]) -> usize {
    let mut removed = 0;

    for selector in selectors {
        let targets: Vec<NodeId> = document
            .root_element()
            .select(selector)
            .map(|element| element.id())
            .collect();

        for id in targets {
            // An earlier match may have taken this node with it
            if is_attached(document, id) {
                removed += remove_with_empty_ancestors(document, id);
            }
        }
    }

    removed
}

/// An element is effectively empty when it has no non-blank direct text and
/// every child element is a `<br>` or itself effectively empty.
pub(crate) fn is_effectively_empty(element: ElementRef<'_>) -> bool {
    for child in element.children() {
        match child.value() {
            Node::Text(text) if !text.trim().is_empty() => return false,
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                if child.value().name() != "br" && !is_effectively_empty(child) {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

fn is_attached(document: &Html, id: NodeId) -> bool {
    let root = document.tree.root().id();
    document
        .tree
        .get(id)
        .and_then(|node| node.ancestors().last())
        .is_some_and(|top| top.id() == root)
}

fn remove_with_empty_ancestors(document: &mut Html, id: NodeId) -> usize {
    let mut next = document
        .tree
        .get(id)
        .and_then(|node| node.parent())
        .map(|parent| parent.id());

    let Some(mut node) = document.tree.get_mut(id) else {
        return 0;
    };
    node.detach();
    let mut removed = 1;

    while let Some(ancestor_id) = next {
        let Some(ancestor) = document.tree.get(ancestor_id).and_then(ElementRef::wrap) else {
            break;
        };
        if PROTECTED.contains(&ancestor.value().name()) || !is_effectively_empty(ancestor) {
            break;
        }
        next = ancestor.parent().map(|parent| parent.id());

        if let Some(mut node) = document.tree.get_mut(ancestor_id) {
            node.detach();
            removed += 1;
        }
    }

    removed
}
