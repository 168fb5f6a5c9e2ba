//! Transactions, steps, and offset mapping
//!
//! A transaction records structural steps against an immutable document and
//! keeps the resulting document available while it is being built, so
//! commands that emit several steps can re-read state between them. Step
//! positions must lie on node boundaries of the transaction's current
//! document; violating that is a programming error in the caller and fails
//! fast rather than producing a corrupt tree.

use crate::{Attrs, DocModelError, Node, NodeKind, ResolvedPos, Result, Selection};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A single structural change
#[derive(Debug, Clone)]
pub enum Step {
    /// Insert nodes at a boundary offset
    Insert { pos: usize, nodes: Vec<Arc<Node>> },
    /// Delete the nodes covered by a half-open boundary range
    Delete { from: usize, to: usize },
    /// Replace the kind and/or attributes of the node starting at `pos`,
    /// keeping its content
    SetNodeAttrs {
        pos: usize,
        kind: Option<NodeKind>,
        attrs: Attrs,
    },
}

/// Offset adjustment produced by one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepMap {
    start: usize,
    old_size: usize,
    new_size: usize,
}

impl StepMap {
    pub fn new(start: usize, old_size: usize, new_size: usize) -> Self {
        Self {
            start,
            old_size,
            new_size,
        }
    }

    /// Map an offset forward through this step. For an offset exactly at
    /// the changed range, `assoc` decides which side it sticks to: a
    /// negative value keeps it before inserted content.
    pub fn map(&self, pos: usize, assoc: i32) -> usize {
        if pos < self.start {
            pos
        } else if pos > self.start + self.old_size {
            pos - self.old_size + self.new_size
        } else if assoc < 0 {
            self.start
        } else {
            self.start + self.new_size
        }
    }
}

/// Accumulated offset adjustments of a sequence of steps
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Map an offset through every recorded step
    pub fn map(&self, pos: usize) -> usize {
        self.map_assoc(pos, 1)
    }

    /// Map an offset with an explicit association side
    pub fn map_assoc(&self, pos: usize, assoc: i32) -> usize {
        self.maps
            .iter()
            .fold(pos, |pos, step| step.map(pos, assoc))
    }

    /// A mapping covering only the steps recorded from `from` onward
    pub fn slice(&self, from: usize) -> Mapping {
        Mapping {
            maps: self.maps[from..].to_vec(),
        }
    }
}

/// A unit of document change produced by a command and applied by the
/// editor state
#[derive(Debug, Clone)]
pub struct Transaction {
    pub(crate) doc: Arc<Node>,
    before: Arc<Node>,
    steps: Vec<Step>,
    mapping: Mapping,
    pub(crate) selection: Option<Selection>,
    meta: BTreeMap<String, Value>,
}

impl Transaction {
    pub fn new(doc: Arc<Node>) -> Self {
        Self {
            before: Arc::clone(&doc),
            doc,
            steps: Vec::new(),
            mapping: Mapping::new(),
            selection: None,
            meta: BTreeMap::new(),
        }
    }

    /// The document as of the last recorded step
    pub fn doc(&self) -> &Arc<Node> {
        &self.doc
    }

    /// The document the transaction started from
    pub fn before(&self) -> &Arc<Node> {
        &self.before
    }

    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Insert nodes at a boundary offset
    pub fn insert(&mut self, pos: usize, nodes: Vec<Arc<Node>>) -> &mut Self {
        let new_size = nodes.iter().map(|node| node.size()).sum();
        let map = StepMap::new(pos, 0, new_size);
        self.apply_step(Step::Insert { pos, nodes }, map);
        self
    }

    /// Delete the half-open boundary range `from..to`
    pub fn delete(&mut self, from: usize, to: usize) -> &mut Self {
        assert!(from <= to, "inverted delete range {from}..{to}");
        if from == to {
            return self;
        }
        let map = StepMap::new(from, to - from, 0);
        self.apply_step(Step::Delete { from, to }, map);
        self
    }

    /// Replace the kind and/or attributes of the node starting at `pos`
    pub fn set_node_attrs(
        &mut self,
        pos: usize,
        kind: Option<NodeKind>,
        attrs: Attrs,
    ) -> &mut Self {
        let map = StepMap::new(0, 0, 0);
        self.apply_step(Step::SetNodeAttrs { pos, kind, attrs }, map);
        self
    }

    /// Replace the selection the next state should carry
    pub fn set_selection(&mut self, selection: Selection) -> &mut Self {
        self.selection = Some(selection);
        self
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Attach a metadata flag, e.g. to mark a mutation as not contributing
    /// to undo history
    pub fn set_meta(&mut self, key: &str, value: Value) -> &mut Self {
        self.meta.insert(key.to_string(), value);
        self
    }

    pub fn get_meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    fn apply_step(&mut self, step: Step, map: StepMap) {
        match apply_step(&self.doc, &step) {
            Ok(doc) => {
                self.doc = doc;
                self.mapping.push(map);
                self.steps.push(step);
            }
            Err(err) => panic!("invalid transaction step: {err}"),
        }
    }
}

/// Child index of an exact boundary offset within a parent's content
fn boundary_index(parent: &Node, offset: usize) -> Option<usize> {
    let mut acc = 0usize;
    for (index, child) in parent.children.iter().enumerate() {
        if acc == offset {
            return Some(index);
        }
        acc += child.size();
        if acc > offset {
            return None;
        }
    }
    if acc == offset {
        Some(parent.children.len())
    } else {
        None
    }
}

/// Rebuild the ancestor chain above a replaced parent node
fn rebuild(resolved: &ResolvedPos, new_parent: Node) -> Arc<Node> {
    let mut node = Arc::new(new_parent);
    for depth in (0..resolved.depth()).rev() {
        let mut parent = (**resolved.node(depth)).clone();
        parent.children[resolved.index(depth)] = node;
        node = Arc::new(parent);
    }
    node
}

fn apply_step(doc: &Arc<Node>, step: &Step) -> Result<Arc<Node>> {
    match step {
        Step::Insert { pos, nodes } => {
            let resolved = ResolvedPos::resolve(doc, *pos)?;
            let parent = resolved.parent();
            let index = boundary_index(parent, resolved.parent_offset())
                .ok_or(DocModelError::NotNodeBoundary(*pos))?;
            let mut new_parent = (**parent).clone();
            new_parent.children.splice(index..index, nodes.iter().cloned());
            Ok(rebuild(&resolved, new_parent))
        }
        Step::Delete { from, to } => {
            let resolved = ResolvedPos::resolve(doc, *from)?;
            let parent = resolved.parent();
            let start = boundary_index(parent, resolved.parent_offset())
                .ok_or(DocModelError::NotNodeBoundary(*from))?;
            let span = to - from;
            let mut covered = 0usize;
            let mut end = start;
            while covered < span {
                let child = parent
                    .children
                    .get(end)
                    .ok_or(DocModelError::InvalidRange(*from, *to))?;
                covered += child.size();
                end += 1;
            }
            if covered != span {
                return Err(DocModelError::InvalidRange(*from, *to));
            }
            let mut new_parent = (**parent).clone();
            new_parent.children.drain(start..end);
            Ok(rebuild(&resolved, new_parent))
        }
        Step::SetNodeAttrs { pos, kind, attrs } => {
            let resolved = ResolvedPos::resolve(doc, *pos)?;
            let parent = resolved.parent();
            let index = boundary_index(parent, resolved.parent_offset())
                .ok_or(DocModelError::NotNodeBoundary(*pos))?;
            let target = parent
                .children
                .get(index)
                .ok_or(DocModelError::NoNodeAt(*pos))?;
            let mut new_node = (**target).clone();
            if let Some(kind) = kind {
                new_node.kind = *kind;
            }
            new_node.attrs = attrs.clone();
            let mut new_parent = (**parent).clone();
            new_parent.children[index] = Arc::new(new_node);
            Ok(rebuild(&resolved, new_parent))
        }
    }
}
