//! Core node types for the immutable document tree
//!
//! Nodes are immutable and shared via `Arc`: every mutation produces new
//! nodes along the changed path while untouched subtrees keep their
//! references, which is what makes identity-keyed caches downstream work.
//!
//! Offsets follow the flattened-stream convention: a text node counts its
//! characters, every other node counts an opening and a closing token
//! around its content. A node's content starts one past its opening token.

use crate::{Attrs, CellAttrs, Result, ResolvedPos};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Enumeration of all node kinds in the document tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Doc,
    Paragraph,
    Text,
    Table,
    TableRow,
    TableCell,
    TableHeaderCell,
}

/// Role a node kind plays in table layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableRole {
    Table,
    Row,
    Cell,
    HeaderCell,
}

impl NodeKind {
    /// Get the table role of this kind, if it has one
    pub fn table_role(self) -> Option<TableRole> {
        match self {
            NodeKind::Table => Some(TableRole::Table),
            NodeKind::TableRow => Some(TableRole::Row),
            NodeKind::TableCell => Some(TableRole::Cell),
            NodeKind::TableHeaderCell => Some(TableRole::HeaderCell),
            _ => None,
        }
    }

    /// Check if this kind is a table cell (normal or header)
    pub fn is_cell(self) -> bool {
        matches!(
            self.table_role(),
            Some(TableRole::Cell) | Some(TableRole::HeaderCell)
        )
    }

    /// Check if this kind is a textblock
    pub fn is_textblock(self) -> bool {
        self == NodeKind::Paragraph
    }
}

/// A node in the document tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub attrs: Attrs,
    pub children: Vec<Arc<Node>>,
    /// Text content, only present for `NodeKind::Text`
    pub text: Option<String>,
}

impl Node {
    fn branch(kind: NodeKind, attrs: Attrs, children: Vec<Arc<Node>>) -> Arc<Node> {
        Arc::new(Node {
            kind,
            attrs,
            children,
            text: None,
        })
    }

    /// Create a document root
    pub fn doc(children: Vec<Arc<Node>>) -> Arc<Node> {
        Self::branch(NodeKind::Doc, Attrs::None, children)
    }

    /// Create a paragraph
    pub fn paragraph(children: Vec<Arc<Node>>) -> Arc<Node> {
        Self::branch(NodeKind::Paragraph, Attrs::None, children)
    }

    /// Create a paragraph holding the given text (empty text yields an
    /// empty paragraph)
    pub fn paragraph_text(text: &str) -> Arc<Node> {
        if text.is_empty() {
            Self::paragraph(Vec::new())
        } else {
            Self::paragraph(vec![Self::text(text)])
        }
    }

    /// Create a text node
    pub fn text(text: &str) -> Arc<Node> {
        Arc::new(Node {
            kind: NodeKind::Text,
            attrs: Attrs::None,
            children: Vec::new(),
            text: Some(text.to_string()),
        })
    }

    /// Create a table from its rows
    pub fn table(rows: Vec<Arc<Node>>) -> Arc<Node> {
        Self::branch(NodeKind::Table, Attrs::None, rows)
    }

    /// Create a table row from its cells
    pub fn row(cells: Vec<Arc<Node>>) -> Arc<Node> {
        Self::branch(NodeKind::TableRow, Attrs::None, cells)
    }

    /// Create a table cell
    pub fn cell(attrs: CellAttrs, content: Vec<Arc<Node>>) -> Arc<Node> {
        Self::branch(NodeKind::TableCell, Attrs::Cell(attrs), content)
    }

    /// Create a header cell
    pub fn header_cell(attrs: CellAttrs, content: Vec<Arc<Node>>) -> Arc<Node> {
        Self::branch(NodeKind::TableHeaderCell, Attrs::Cell(attrs), content)
    }

    /// Create a cell of the given kind (normal or header)
    pub fn cell_of_kind(kind: NodeKind, attrs: CellAttrs, content: Vec<Arc<Node>>) -> Arc<Node> {
        assert!(kind.is_cell(), "cell_of_kind needs a cell kind");
        Self::branch(kind, Attrs::Cell(attrs), content)
    }

    /// Create an empty cell of the given kind holding one empty paragraph
    pub fn filled_cell(kind: NodeKind, attrs: CellAttrs) -> Arc<Node> {
        Self::cell_of_kind(kind, attrs, vec![Self::paragraph(Vec::new())])
    }

    /// Total size of this node in the flattened stream
    pub fn size(&self) -> usize {
        match &self.text {
            Some(text) => text.chars().count(),
            None => 2 + self.content_size(),
        }
    }

    /// Combined size of this node's children
    pub fn content_size(&self) -> usize {
        self.children.iter().map(|child| child.size()).sum()
    }

    /// Number of direct children
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Get the child at an index
    pub fn child(&self, index: usize) -> &Arc<Node> {
        &self.children[index]
    }

    /// Cell attributes, when this node carries them
    pub fn cell_attrs(&self) -> Option<&CellAttrs> {
        self.attrs.cell()
    }

    /// Find the node starting at a content-relative offset, descending
    /// through children as needed
    pub fn node_at(&self, pos: usize) -> Option<&Arc<Node>> {
        let mut node = self;
        let mut pos = pos;
        loop {
            let mut acc = 0usize;
            let mut inner: Option<(&Arc<Node>, usize)> = None;
            for child in &node.children {
                if pos == acc {
                    return Some(child);
                }
                let end = acc + child.size();
                if pos < end {
                    inner = Some((child, acc));
                    break;
                }
                acc = end;
            }
            match inner {
                Some((child, start)) if child.text.is_none() => {
                    pos = pos - start - 1;
                    node = &**child;
                }
                _ => return None,
            }
        }
    }

    /// Resolve an offset within the given document
    ///
    /// Panics when the offset is out of range; passing an invalid offset
    /// is a programming error, not a document condition.
    pub fn resolve(doc: &Arc<Node>, pos: usize) -> ResolvedPos {
        match ResolvedPos::resolve(doc, pos) {
            Ok(resolved) => resolved,
            Err(err) => panic!("cannot resolve position {pos}: {err}"),
        }
    }

    /// Fallible variant of [`Node::resolve`]
    pub fn try_resolve(doc: &Arc<Node>, pos: usize) -> Result<ResolvedPos> {
        ResolvedPos::resolve(doc, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_cell() -> Arc<Node> {
        Node::filled_cell(NodeKind::TableCell, CellAttrs::default())
    }

    #[test]
    fn test_node_sizes() {
        assert_eq!(Node::text("ab").size(), 2);
        assert_eq!(Node::paragraph(Vec::new()).size(), 2);
        assert_eq!(Node::paragraph_text("ab").size(), 4);
        // cell with one empty paragraph
        assert_eq!(empty_cell().size(), 4);
        let row = Node::row(vec![empty_cell(), empty_cell(), empty_cell()]);
        assert_eq!(row.size(), 14);
        let table = Node::table(vec![row.clone(), row.clone(), row]);
        assert_eq!(table.size(), 44);
    }

    #[test]
    fn test_table_roles() {
        assert_eq!(NodeKind::Table.table_role(), Some(TableRole::Table));
        assert_eq!(NodeKind::TableRow.table_role(), Some(TableRole::Row));
        assert_eq!(NodeKind::TableCell.table_role(), Some(TableRole::Cell));
        assert_eq!(
            NodeKind::TableHeaderCell.table_role(),
            Some(TableRole::HeaderCell)
        );
        assert_eq!(NodeKind::Paragraph.table_role(), None);
        assert!(NodeKind::TableHeaderCell.is_cell());
        assert!(!NodeKind::TableRow.is_cell());
    }

    #[test]
    fn test_node_at_finds_cells() {
        let row = Node::row(vec![empty_cell(), empty_cell(), empty_cell()]);
        let table = Node::table(vec![row.clone(), row]);
        // first row opens at 0, its cells start at 1, 5 and 9
        let cell = table.node_at(1).expect("cell at 1");
        assert_eq!(cell.kind, NodeKind::TableCell);
        let cell = table.node_at(9).expect("cell at 9");
        assert_eq!(cell.kind, NodeKind::TableCell);
        // second row opens at 14, its first cell starts at 15
        let cell = table.node_at(15).expect("cell at 15");
        assert_eq!(cell.kind, NodeKind::TableCell);
        // positions inside a cell land on its content
        let para = table.node_at(2).expect("paragraph at 2");
        assert_eq!(para.kind, NodeKind::Paragraph);
    }
}
