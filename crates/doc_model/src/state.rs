//! Editor state: a document plus its selection

use crate::{Node, ResolvedPos, Selection, Transaction};
use std::sync::Arc;

/// Immutable editor state; every applied transaction yields a new one
#[derive(Debug, Clone)]
pub struct EditorState {
    pub doc: Arc<Node>,
    pub selection: Selection,
}

impl EditorState {
    /// Create a state with the default collapsed selection
    pub fn new(doc: Arc<Node>) -> Self {
        Self {
            doc,
            selection: Selection::default(),
        }
    }

    /// Create a state with an explicit selection
    pub fn with_selection(doc: Arc<Node>, selection: Selection) -> Self {
        Self { doc, selection }
    }

    /// Begin a mutation against the current document
    pub fn tr(&self) -> Transaction {
        Transaction::new(Arc::clone(&self.doc))
    }

    /// Apply a finished transaction, producing the next state. The new
    /// selection is the one the transaction set, or else the old selection
    /// rebased through the transaction's mapping.
    pub fn apply(&self, tr: Transaction) -> EditorState {
        let selection = match tr.selection {
            Some(selection) => selection,
            None => self.selection.map(tr.mapping()),
        };
        EditorState {
            doc: tr.doc,
            selection,
        }
    }

    /// Resolve an offset in the current document
    pub fn resolve(&self, pos: usize) -> ResolvedPos {
        Node::resolve(&self.doc, pos)
    }
}
