//! In-place edits of a `scraper` document tree.
//!
//! Everything here works on node ids so callers can snapshot a selection
//! first and mutate afterwards.

use ego_tree::NodeId;
use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};

const HTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Ids of matching elements reachable from the root, in document order.
pub(crate) fn select_ids(document: &Html, selector: &Selector) -> Vec<NodeId> {
    // Html::select would also visit nodes detached by an earlier pass
    document.root_element().select(selector).map(|el| el.id()).collect()
}

pub(crate) fn attr(document: &Html, id: NodeId, name: &str) -> Option<String> {
    let el = document.tree.get(id).and_then(ElementRef::wrap)?;
    el.value().attr(name).map(ToOwned::to_owned)
}

pub(crate) fn parent_id(document: &Html, id: NodeId) -> Option<NodeId> {
    document.tree.get(id)?.parent().map(|p| p.id())
}

/// Rebuilds the element's attribute list through `f`.
pub(crate) fn edit_attrs<F>(document: &mut Html, id: NodeId, f: F) -> bool
    where F: FnOnce(&mut Vec<(String, String)>)
{
    let Some(mut node) = document.tree.get_mut(id) else { return false };
    let Node::Element(el) = node.value() else { return false };

    let name = el.name().to_owned();
    let mut attrs = el.attrs()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect::<Vec<_>>();
    f(&mut attrs);
    *el = new_element(&name, attrs);
    true
}

pub(crate) fn set_attr(attrs: &mut Vec<(String, String)>, name: &str, value: String) {
    match attrs.iter_mut().find(|(k, _)| k == name) {
        Some((_, v)) => *v = value,
        None => attrs.push((name.into(), value)),
    }
}

pub(crate) fn detach(document: &mut Html, id: NodeId) -> bool {
    match document.tree.get_mut(id) {
        Some(mut node) => {
            node.detach();
            true
        }
        None => false,
    }
}

/// Whether `id` is still reachable from the document root.
pub(crate) fn attached(document: &Html, id: NodeId) -> bool {
    let root = document.tree.root().id();
    match document.tree.get(id) {
        Some(node) => node.ancestors().any(|a| a.id() == root),
        None => false,
    }
}

/// Puts `replacement` where `id` is and detaches `id`. Fails if `id` is no
/// longer attached, including when an ancestor was detached earlier.
pub(crate) fn replace(document: &mut Html, id: NodeId, replacement: Element) -> bool {
    if !attached(document, id) {
        return false;
    }
    let Some(mut node) = document.tree.get_mut(id) else { return false };
    node.insert_before(Node::Element(replacement));
    node.detach();
    true
}

pub(crate) fn new_element(name: &str, attrs: Vec<(String, String)>) -> Element {
    let attrs = attrs.into_iter()
        .map(|(k, v)| Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from(k.as_str())),
            value: StrTendril::from_slice(&v),
        })
        .collect();
    Element::new(QualName::new(None, Namespace::from(HTML_NS), LocalName::from(name)), attrs)
}
