//! JSON snapshots of the host DOM.
//!
//! A snapshot is a tree of nodes; nodes with a `role` are message elements. Loaded into an
//! arena shared by every [`SnapshotElement`] handle, so markers and annotations written through
//! one handle are visible through all of them.
//!
//! ```json
//! { "children": [
//!     { "role": "bot", "attributes": { "data-message-id": "m1" } },
//!     { "role": "user", "frameworkData": { "message": { "id": "m2" } } }
//! ] }
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use lens_core::{ObservationError, Role};
use serde::Deserialize;
use serde_json::Value;

use crate::element::{Annotation, MessageElement};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotNode {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub framework_data: Option<Value>,
    #[serde(default)]
    pub handlers: Vec<String>,
    #[serde(default)]
    pub rendered_model: Option<String>,
    #[serde(default)]
    pub children: Vec<SnapshotNode>,
}

#[derive(Debug)]
struct NodeData {
    parent: Option<usize>,
    role: Option<Role>,
    attributes: BTreeMap<String, String>,
    framework_data: Option<Value>,
    handlers: Vec<String>,
    connected: bool,
    processed: bool,
    rendered_model: Option<String>,
    annotation: Option<Annotation>,
}

#[derive(Debug, Default)]
struct Arena {
    nodes: Vec<NodeData>,
    /// Document order (pre-order) of node indices.
    order: Vec<usize>,
}

impl Arena {
    fn insert(&mut self, node: SnapshotNode, parent: Option<usize>) -> usize {
        let index = self.nodes.len();
        let processed = node.rendered_model.is_some();
        self.nodes.push(NodeData {
            parent,
            role: node.role,
            attributes: node.attributes,
            framework_data: node.framework_data,
            handlers: node.handlers,
            connected: true,
            processed,
            rendered_model: node.rendered_model,
            annotation: None,
        });
        self.order.push(index);
        for child in node.children {
            self.insert(child, Some(index));
        }
        index
    }

    fn is_connected(&self, mut index: usize) -> bool {
        loop {
            let node = &self.nodes[index];
            if !node.connected {
                return false;
            }
            match node.parent {
                Some(parent) => index = parent,
                None => return true,
            }
        }
    }
}

/// Shared, mutable DOM snapshot.
#[derive(Debug, Clone, Default)]
pub struct DomSnapshot {
    arena: Arc<Mutex<Arena>>,
}

impl DomSnapshot {
    pub fn from_root(root: SnapshotNode) -> Self {
        let mut arena = Arena::default();
        arena.insert(root, None);
        Self {
            arena: Arc::new(Mutex::new(arena)),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ObservationError> {
        let root: SnapshotNode = serde_json::from_str(json)?;
        Ok(Self::from_root(root))
    }

    fn lock(&self) -> MutexGuard<'_, Arena> {
        self.arena.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn element(&self, index: usize) -> SnapshotElement {
        SnapshotElement {
            dom: self.clone(),
            index,
        }
    }

    /// Connected message elements in document order.
    pub fn message_elements(&self) -> Vec<SnapshotElement> {
        let arena = self.lock();
        arena
            .order
            .iter()
            .copied()
            .filter(|&i| arena.nodes[i].role.is_some() && arena.is_connected(i))
            .map(|i| self.element(i))
            .collect()
    }

    /// Appends `node` as the last child of the root; returns the handle of the new node.
    pub fn append(&self, node: SnapshotNode) -> SnapshotElement {
        let index = self.lock().insert(node, Some(0));
        self.element(index)
    }

    /// Detaches `element` (and its subtree) from the document.
    pub fn remove(&self, element: &SnapshotElement) {
        if let Some(node) = self.lock().nodes.get_mut(element.index) {
            node.connected = false;
        }
    }

    /// Annotations rendered so far, in document order.
    pub fn annotations(&self) -> Vec<Annotation> {
        let arena = self.lock();
        arena
            .order
            .iter()
            .filter_map(|&i| arena.nodes[i].annotation.clone())
            .collect()
    }
}

/// Handle to one node of a [`DomSnapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotElement {
    dom: DomSnapshot,
    index: usize,
}

impl PartialEq for SnapshotElement {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && Arc::ptr_eq(&self.dom.arena, &other.dom.arena)
    }
}

impl SnapshotElement {
    fn with_node<T>(&self, f: impl FnOnce(&mut NodeData) -> T) -> T {
        let mut arena = self.dom.lock();
        f(&mut arena.nodes[self.index])
    }

    pub fn annotation(&self) -> Option<Annotation> {
        self.with_node(|n| n.annotation.clone())
    }

    pub fn role(&self) -> Option<Role> {
        self.with_node(|n| n.role)
    }
}

impl MessageElement for SnapshotElement {
    fn attribute(&self, name: &str) -> Option<String> {
        self.with_node(|n| n.attributes.get(name).cloned())
    }

    fn parent(&self) -> Option<Self> {
        self.with_node(|n| n.parent)
            .map(|index| self.dom.element(index))
    }

    fn framework_data(&self) -> Option<Value> {
        self.with_node(|n| n.framework_data.clone())
    }

    fn handler_sources(&self) -> Vec<String> {
        self.with_node(|n| n.handlers.clone())
    }

    fn is_bot(&self) -> bool {
        self.role() == Some(Role::Bot)
    }

    fn is_connected(&self) -> bool {
        self.dom.lock().is_connected(self.index)
    }

    fn is_processed(&self) -> bool {
        self.with_node(|n| n.processed)
    }

    fn mark_processed(&self) {
        self.with_node(|n| n.processed = true);
    }

    fn clear_processed(&self) {
        self.with_node(|n| n.processed = false);
    }

    fn rendered_model(&self) -> Option<String> {
        self.with_node(|n| n.rendered_model.clone())
    }

    fn render(&self, annotation: &Annotation) {
        self.with_node(|n| {
            n.rendered_model = annotation.model.clone();
            n.annotation = Some(annotation.clone());
        });
    }
}
