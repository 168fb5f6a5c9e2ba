//! Resolved positions within the document tree

use crate::{DocModelError, Node, Result};
use std::sync::Arc;

/// A document offset resolved to its ancestor chain
///
/// Depth 0 is the document root; the deepest entry is the node whose
/// content directly contains the position. `starts` holds the absolute
/// offset of each node's content start, `indices` the child index the
/// position descends through (or points at) within each node.
#[derive(Debug, Clone)]
pub struct ResolvedPos {
    pos: usize,
    nodes: Vec<Arc<Node>>,
    indices: Vec<usize>,
    starts: Vec<usize>,
    parent_offset: usize,
}

impl ResolvedPos {
    pub(crate) fn resolve(doc: &Arc<Node>, pos: usize) -> Result<ResolvedPos> {
        if pos > doc.content_size() {
            return Err(DocModelError::PositionOutOfRange(pos));
        }
        let mut nodes = Vec::new();
        let mut indices = Vec::new();
        let mut starts = Vec::new();
        let mut node = Arc::clone(doc);
        let mut start = 0usize;
        let mut offset = pos;
        loop {
            nodes.push(Arc::clone(&node));
            starts.push(start);

            let mut index = node.child_count();
            let mut child_start = 0usize;
            let mut descend: Option<Arc<Node>> = None;
            let mut acc = 0usize;
            for (i, child) in node.children.iter().enumerate() {
                if offset == acc {
                    index = i;
                    descend = None;
                    break;
                }
                let end = acc + child.size();
                if offset < end {
                    index = i;
                    child_start = acc;
                    descend = Some(Arc::clone(child));
                    break;
                }
                acc = end;
            }
            indices.push(index);

            match descend {
                Some(child) if child.text.is_none() => {
                    start = start + child_start + 1;
                    offset = offset - child_start - 1;
                    node = child;
                }
                _ => break,
            }
        }
        Ok(ResolvedPos {
            pos,
            nodes,
            indices,
            starts,
            parent_offset: offset,
        })
    }

    /// The absolute offset this position was resolved from
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Depth of the deepest node containing the position
    pub fn depth(&self) -> usize {
        self.nodes.len() - 1
    }

    /// The document root
    pub fn doc(&self) -> &Arc<Node> {
        &self.nodes[0]
    }

    /// Ancestor node at a depth
    pub fn node(&self, depth: usize) -> &Arc<Node> {
        &self.nodes[depth]
    }

    /// Child index the position descends through at a depth
    pub fn index(&self, depth: usize) -> usize {
        self.indices[depth]
    }

    /// Absolute offset of the content start of the node at a depth
    pub fn start(&self, depth: usize) -> usize {
        self.starts[depth]
    }

    /// Absolute offset of the content end of the node at a depth
    pub fn end(&self, depth: usize) -> usize {
        self.starts[depth] + self.nodes[depth].content_size()
    }

    /// Absolute offset just before the node at a depth
    pub fn before(&self, depth: usize) -> usize {
        assert!(depth > 0, "there is no position before the root");
        self.starts[depth] - 1
    }

    /// Absolute offset just after the node at a depth
    pub fn after(&self, depth: usize) -> usize {
        self.before(depth) + self.nodes[depth].size()
    }

    /// The deepest node containing the position
    pub fn parent(&self) -> &Arc<Node> {
        self.node(self.depth())
    }

    /// Offset within the parent's content
    pub fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    /// The child starting exactly at this position, if any
    pub fn node_after(&self) -> Option<&Arc<Node>> {
        let parent = self.parent();
        let mut acc = 0usize;
        for child in &parent.children {
            if acc == self.parent_offset {
                return Some(child);
            }
            acc += child.size();
            if acc > self.parent_offset {
                break;
            }
        }
        None
    }

    /// The child ending exactly at this position, if any
    pub fn node_before(&self) -> Option<&Arc<Node>> {
        let parent = self.parent();
        let mut acc = 0usize;
        for child in &parent.children {
            let end = acc + child.size();
            if end == self.parent_offset {
                return Some(child);
            }
            if end > self.parent_offset {
                break;
            }
            acc = end;
        }
        None
    }
}
