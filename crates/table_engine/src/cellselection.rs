//! Cell-selection behavior: widening constructors and queries
//!
//! The `Selection::Cell` variant only stores its two cell offsets; the
//! behavior that depends on the grid lives here.

use crate::{in_same_table, points_at_cell, selected_rect, TableMap};
use doc_model::{EditorState, Node, Selection};
use std::sync::Arc;

fn cell_context(doc: &Arc<Node>, cell_pos: usize) -> (Arc<Node>, usize) {
    let pos = Node::resolve(doc, cell_pos);
    assert!(
        points_at_cell(&pos),
        "offset {cell_pos} does not point at a table cell"
    );
    let depth = pos.depth();
    (Arc::clone(pos.node(depth - 1)), pos.start(depth - 1))
}

/// Smallest row selection covering both cells: the anchor widens to the
/// first cell of its row, the head to the last cell of its row (mirrored
/// when selecting leftward)
pub fn row_selection(doc: &Arc<Node>, anchor_cell: usize, head_cell: usize) -> Selection {
    debug_assert!(in_same_table(
        &Node::resolve(doc, anchor_cell),
        &Node::resolve(doc, head_cell)
    ));
    let (table, start) = cell_context(doc, anchor_cell);
    let map = TableMap::get(&table);
    let anchor_rect = map.find_cell(anchor_cell - start);
    let head_rect = map.find_cell(head_cell - start);
    let mut anchor = anchor_cell;
    let mut head = head_cell;
    if anchor_rect.left <= head_rect.left {
        if anchor_rect.left > 0 {
            anchor = start + map.map[anchor_rect.top * map.width];
        }
        if head_rect.right < map.width {
            head = start + map.map[map.width * (head_rect.top + 1) - 1];
        }
    } else {
        if head_rect.left > 0 {
            head = start + map.map[head_rect.top * map.width];
        }
        if anchor_rect.right < map.width {
            anchor = start + map.map[map.width * (anchor_rect.top + 1) - 1];
        }
    }
    Selection::cell(anchor, head)
}

/// Smallest column selection covering both cells: the anchor widens to the
/// top cell of its column, the head to the bottom cell of its column
/// (mirrored when selecting upward)
pub fn col_selection(doc: &Arc<Node>, anchor_cell: usize, head_cell: usize) -> Selection {
    debug_assert!(in_same_table(
        &Node::resolve(doc, anchor_cell),
        &Node::resolve(doc, head_cell)
    ));
    let (table, start) = cell_context(doc, anchor_cell);
    let map = TableMap::get(&table);
    let anchor_rect = map.find_cell(anchor_cell - start);
    let head_rect = map.find_cell(head_cell - start);
    let mut anchor = anchor_cell;
    let mut head = head_cell;
    if anchor_rect.top <= head_rect.top {
        if anchor_rect.top > 0 {
            anchor = start + map.map[anchor_rect.left];
        }
        if head_rect.bottom < map.height {
            head = start + map.map[map.width * (map.height - 1) + head_rect.right - 1];
        }
    } else {
        if head_rect.top > 0 {
            head = start + map.map[head_rect.left];
        }
        if anchor_rect.bottom < map.height {
            anchor = start + map.map[map.width * (map.height - 1) + anchor_rect.right - 1];
        }
    }
    Selection::cell(anchor, head)
}

/// Offsets of every distinct cell the current cell selection covers, as
/// absolute document offsets in row-major order
pub fn cells_in_selection(state: &EditorState) -> Option<Vec<usize>> {
    if !state.selection.is_cell() {
        return None;
    }
    let rect = selected_rect(state)?;
    Some(
        rect.map
            .cells_in_rect(&rect.rect)
            .into_iter()
            .map(|pos| pos + rect.table_start)
            .collect(),
    )
}

/// Check whether the selection resolves to a rect spanning the full table
/// width
pub fn is_row_selection(state: &EditorState) -> bool {
    if !state.selection.is_cell() {
        return false;
    }
    match selected_rect(state) {
        Some(rect) => rect.rect.left == 0 && rect.rect.right == rect.map.width,
        None => false,
    }
}

/// Check whether the selection resolves to a rect spanning the full table
/// height
pub fn is_col_selection(state: &EditorState) -> bool {
    if !state.selection.is_cell() {
        return false;
    }
    match selected_rect(state) {
        Some(rect) => rect.rect.top == 0 && rect.rect.bottom == rect.map.height,
        None => false,
    }
}
