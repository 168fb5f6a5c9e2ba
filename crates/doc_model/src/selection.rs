//! Selection model over flattened document offsets

use crate::Mapping;
use serde::{Deserialize, Serialize};

/// A selection in the document
///
/// `Text` carries an anchor (where the selection started) and a head
/// (where the caret is). `Cell` is the table-specific variant: both ends
/// identify the start offset of a concrete grid cell, and the selection
/// covers the minimal solid rectangle containing both footprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    Text { anchor: usize, head: usize },
    Cell { anchor_cell: usize, head_cell: usize },
}

impl Selection {
    /// Create a collapsed text selection (caret only)
    pub fn collapsed(pos: usize) -> Self {
        Self::Text {
            anchor: pos,
            head: pos,
        }
    }

    /// Create a text selection
    pub fn text(anchor: usize, head: usize) -> Self {
        Self::Text { anchor, head }
    }

    /// Create a cell selection between two cell offsets
    pub fn cell(anchor_cell: usize, head_cell: usize) -> Self {
        Self::Cell {
            anchor_cell,
            head_cell,
        }
    }

    /// Check if this is a collapsed text selection
    pub fn is_collapsed(&self) -> bool {
        matches!(self, Selection::Text { anchor, head } if anchor == head)
    }

    /// Check if this is a cell selection
    pub fn is_cell(&self) -> bool {
        matches!(self, Selection::Cell { .. })
    }

    /// Where the selection started
    pub fn anchor(&self) -> usize {
        match *self {
            Selection::Text { anchor, .. } => anchor,
            Selection::Cell { anchor_cell, .. } => anchor_cell,
        }
    }

    /// Where the caret is
    pub fn head(&self) -> usize {
        match *self {
            Selection::Text { head, .. } => head,
            Selection::Cell { head_cell, .. } => head_cell,
        }
    }

    /// Smallest offset covered, regardless of direction
    pub fn start(&self) -> usize {
        self.anchor().min(self.head())
    }

    /// Largest offset covered, regardless of direction
    pub fn end(&self) -> usize {
        self.anchor().max(self.head())
    }

    /// Rebase the selection through the offset adjustments of a mutation
    pub fn map(&self, mapping: &Mapping) -> Selection {
        match *self {
            Selection::Text { anchor, head } => Selection::Text {
                anchor: mapping.map(anchor),
                head: mapping.map(head),
            },
            Selection::Cell {
                anchor_cell,
                head_cell,
            } => Selection::Cell {
                anchor_cell: mapping.map(anchor_cell),
                head_cell: mapping.map(head_cell),
            },
        }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::collapsed(0)
    }
}
