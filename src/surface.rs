//! Visual surface – the live, addressable element tree the pipeline captures.
//!
//! [`VisualSurface`] is the only way the pipeline reads or mutates elements,
//! so hosts can plug in their own rendering tree and tests can record calls.
//! [`SceneSurface`] is an in-memory implementation built from markup where
//! every element is absolutely positioned through its inline style.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::dom::{body_children, parse_html, ElementNode};
use crate::style::InlineStyle;

/// Opaque handle to one element of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementHandle(pub u64);

/// Capability through which the pipeline reaches the element tree.
///
/// Mutation goes through `&self`; implementations provide their own interior
/// synchronisation. Concurrent exports must not mask overlapping elements.
pub trait VisualSurface: Send + Sync {
    /// All attached elements matching `selector`, in document order.
    /// Selectors the surface cannot interpret match nothing.
    fn query_selector_all(&self, selector: &str) -> Vec<ElementHandle>;

    /// Whether `element` still belongs to the live tree.
    fn is_attached(&self, element: ElementHandle) -> bool;

    /// Element children, in document order.
    fn children(&self, element: ElementHandle) -> Vec<ElementHandle>;

    /// Current inline value of a style property, if declared.
    fn style_property(&self, element: ElementHandle, property: &str) -> Option<String>;

    /// Set (`Some`) or remove (`None`) an inline style property.
    fn set_style_property(&self, element: ElementHandle, property: &str, value: Option<&str>);
}

#[derive(Debug)]
struct SceneNode {
    tag: String,
    attributes: HashMap<String, String>,
    style: InlineStyle,
    parent: Option<usize>,
    children: Vec<usize>,
    attached: bool,
}

#[derive(Debug, Default)]
struct SceneTree {
    nodes: Vec<SceneNode>,
    roots: Vec<usize>,
}

impl SceneTree {
    fn insert(&mut self, dom: &[ElementNode], parent: Option<usize>) -> Vec<usize> {
        let mut ids = Vec::new();
        for elem in dom {
            let id = self.nodes.len();
            let mut attributes = elem.attributes.clone();
            let style = attributes
                .remove("style")
                .map(|s| InlineStyle::parse(&s))
                .unwrap_or_default();
            self.nodes.push(SceneNode {
                tag: elem.tag.clone(),
                attributes,
                style,
                parent,
                children: Vec::new(),
                attached: true,
            });
            let children = self.insert(&elem.children, Some(id));
            self.nodes[id].children = children;
            ids.push(id);
        }
        ids
    }

    fn node(&self, element: ElementHandle) -> Option<&SceneNode> {
        self.nodes.get(element.0 as usize)
    }

    fn live_node(&self, element: ElementHandle) -> Option<&SceneNode> {
        self.node(element).filter(|n| n.attached)
    }

    fn document_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if !self.nodes[id].attached {
                continue;
            }
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        order
    }
}

/// In-memory surface parsed from markup.
#[derive(Debug, Default)]
pub struct SceneSurface {
    tree: Mutex<SceneTree>,
}

impl SceneSurface {
    pub fn from_html(html: &str) -> Self {
        let dom = body_children(&parse_html(html));
        let mut tree = SceneTree::default();
        tree.roots = tree.insert(&dom, None);
        log::debug!("scene surface built with {} elements", tree.nodes.len());
        Self {
            tree: Mutex::new(tree),
        }
    }

    fn tree(&self) -> MutexGuard<'_, SceneTree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// First attached element whose `id` attribute equals `id`.
    pub fn element_by_id(&self, id: &str) -> Option<ElementHandle> {
        let tree = self.tree();
        tree.document_order()
            .into_iter()
            .find(|&n| tree.nodes[n].attributes.get("id").map(String::as_str) == Some(id))
            .map(|n| ElementHandle(n as u64))
    }

    /// The serialised inline `style` attribute, `None` when it is empty.
    pub fn style_attribute(&self, element: ElementHandle) -> Option<String> {
        self.tree()
            .node(element)
            .filter(|n| !n.style.is_empty())
            .map(|n| n.style.to_string())
    }

    /// Remove an element (and its subtree) from the live tree. Its handle
    /// stays valid as a value but is no longer attached.
    pub fn detach(&self, element: ElementHandle) {
        let mut tree = self.tree();
        let idx = element.0 as usize;
        if idx >= tree.nodes.len() {
            return;
        }
        let mut stack = vec![idx];
        while let Some(id) = stack.pop() {
            tree.nodes[id].attached = false;
            stack.extend(tree.nodes[id].children.clone());
        }
        let parent = tree.nodes[idx].parent;
        match parent {
            Some(parent) => tree.nodes[parent].children.retain(|&c| c != idx),
            None => tree.roots.retain(|&r| r != idx),
        }
    }
}

impl VisualSurface for SceneSurface {
    fn query_selector_all(&self, selector: &str) -> Vec<ElementHandle> {
        let Some(list) = SelectorList::parse(selector) else {
            log::debug!("selector `{selector}` not understood; matching nothing");
            return Vec::new();
        };
        let tree = self.tree();
        tree.document_order()
            .into_iter()
            .filter(|&n| list.matches(&tree.nodes[n]))
            .map(|n| ElementHandle(n as u64))
            .collect()
    }

    fn is_attached(&self, element: ElementHandle) -> bool {
        self.tree().live_node(element).is_some()
    }

    fn children(&self, element: ElementHandle) -> Vec<ElementHandle> {
        self.tree()
            .live_node(element)
            .map(|n| n.children.iter().map(|&c| ElementHandle(c as u64)).collect())
            .unwrap_or_default()
    }

    fn style_property(&self, element: ElementHandle, property: &str) -> Option<String> {
        self.tree()
            .node(element)
            .and_then(|n| n.style.get(property))
            .map(str::to_string)
    }

    fn set_style_property(&self, element: ElementHandle, property: &str, value: Option<&str>) {
        let mut tree = self.tree();
        let Some(node) = tree.nodes.get_mut(element.0 as usize) else {
            return;
        };
        match value {
            Some(v) => node.style.set(property, v),
            None => {
                node.style.remove(property);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Selectors: compound simple selectors, comma-separated
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Simple {
    Tag(String),
    Id(String),
    Class(String),
    Attr(String, Option<String>),
}

#[derive(Debug)]
struct SelectorList(Vec<Vec<Simple>>);

impl SelectorList {
    fn parse(selector: &str) -> Option<Self> {
        let list = selector
            .split(',')
            .map(|part| parse_compound(part.trim()))
            .collect::<Option<Vec<_>>>()?;
        Some(Self(list))
    }

    fn matches(&self, node: &SceneNode) -> bool {
        self.0
            .iter()
            .any(|compound| compound.iter().all(|s| simple_matches(s, node)))
    }
}

fn simple_matches(simple: &Simple, node: &SceneNode) -> bool {
    match simple {
        Simple::Tag(t) => node.tag == *t,
        Simple::Id(id) => node.attributes.get("id") == Some(id),
        Simple::Class(c) => node
            .attributes
            .get("class")
            .is_some_and(|cls| cls.split_whitespace().any(|x| x == c)),
        Simple::Attr(name, None) => node.attributes.contains_key(name),
        Simple::Attr(name, Some(v)) => node.attributes.get(name) == Some(v),
    }
}

fn ident_len(s: &str) -> usize {
    s.find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(s.len())
}

fn parse_compound(mut s: &str) -> Option<Vec<Simple>> {
    if s.is_empty() {
        return None;
    }
    let mut out = Vec::new();
    if let Some(rest) = s.strip_prefix('*') {
        s = rest;
    } else {
        let len = ident_len(s);
        if len > 0 {
            out.push(Simple::Tag(s[..len].to_ascii_lowercase()));
            s = &s[len..];
        }
    }
    while let Some(c) = s.chars().next() {
        match c {
            '#' | '.' => {
                let rest = &s[1..];
                let len = ident_len(rest);
                if len == 0 {
                    return None;
                }
                let name = rest[..len].to_string();
                out.push(if c == '#' { Simple::Id(name) } else { Simple::Class(name) });
                s = &rest[len..];
            }
            '[' => {
                let end = s.find(']')?;
                let inner = &s[1..end];
                let simple = match inner.split_once('=') {
                    Some((name, value)) => Simple::Attr(
                        name.trim().to_ascii_lowercase(),
                        Some(value.trim().trim_matches(|q| q == '"' || q == '\'').to_string()),
                    ),
                    None => Simple::Attr(inner.trim().to_ascii_lowercase(), None),
                };
                out.push(simple);
                s = &s[end + 1..];
            }
            // Combinators and pseudo-classes are not supported.
            _ => return None,
        }
    }
    Some(out)
}
