//! Helpers for locating cells around positions and selections

use crate::{Rect, TableMap};
use doc_model::{EditorState, Node, ResolvedPos, Selection, TableRole};
use std::sync::Arc;

/// Rectangle selected in a table, together with the grid and table node it
/// was resolved against and the table's content start offset
#[derive(Debug, Clone)]
pub struct SelectedRect {
    pub rect: Rect,
    pub map: Arc<TableMap>,
    pub table: Arc<Node>,
    pub table_start: usize,
}

/// Resolved position of the cell containing the given position, if any
pub fn cell_around(pos: &ResolvedPos) -> Option<ResolvedPos> {
    for depth in (1..=pos.depth()).rev() {
        if pos.node(depth).kind.table_role() == Some(TableRole::Row) {
            if depth + 1 > pos.depth() {
                return None;
            }
            return Some(Node::resolve(pos.doc(), pos.before(depth + 1)));
        }
    }
    None
}

/// The cell node containing the given position, if any
pub fn cell_wrapping(pos: &ResolvedPos) -> Option<Arc<Node>> {
    for depth in (1..=pos.depth()).rev() {
        if pos.node(depth).kind.is_cell() {
            return Some(Arc::clone(pos.node(depth)));
        }
    }
    None
}

/// Check whether the selection head sits inside a table
pub fn is_in_table(state: &EditorState) -> bool {
    let pos = state.resolve(state.selection.head());
    (1..=pos.depth()).any(|depth| pos.node(depth).kind.table_role() == Some(TableRole::Row))
}

/// Check whether a resolved position points directly at a cell
pub fn points_at_cell(pos: &ResolvedPos) -> bool {
    pos.parent().kind.table_role() == Some(TableRole::Row) && pos.node_after().is_some()
}

/// Position just past the cell a resolved position points at
pub fn move_cell_forward(pos: &ResolvedPos) -> Option<usize> {
    let cell = pos.node_after()?;
    Some(pos.pos() + cell.size())
}

/// Check whether two resolved cell positions belong to the same table
pub fn in_same_table(a: &ResolvedPos, b: &ResolvedPos) -> bool {
    a.depth() == b.depth()
        && a.depth() > 0
        && a.pos() >= b.start(b.depth() - 1)
        && a.pos() <= b.end(b.depth() - 1)
}

fn cell_near(pos: &ResolvedPos) -> Option<ResolvedPos> {
    let doc = Arc::clone(pos.doc());
    let mut node = pos.node_after().cloned();
    let mut at = pos.pos();
    while let Some(current) = node {
        if current.kind.is_cell() {
            return Some(Node::resolve(&doc, at));
        }
        node = current.children.first().cloned();
        at += 1;
    }
    let mut node = pos.node_before().cloned();
    let mut at = pos.pos();
    while let Some(current) = node {
        if current.kind.is_cell() {
            return Some(Node::resolve(&doc, at - current.size()));
        }
        node = current.children.last().cloned();
        at -= 1;
    }
    None
}

/// The cell the selection is anchored in: the later end of a cell
/// selection, or the cell around (or next to) a text selection's head
pub fn selection_cell(state: &EditorState) -> Option<ResolvedPos> {
    match state.selection {
        Selection::Cell {
            anchor_cell,
            head_cell,
        } => Some(state.resolve(anchor_cell.max(head_cell))),
        Selection::Text { head, .. } => {
            let pos = state.resolve(head);
            cell_around(&pos).or_else(|| cell_near(&pos))
        }
    }
}

/// The rectangle spanned by the current selection, with grid and table
/// context attached. A cell selection resolves through `rect_between`; any
/// other selection yields the single cell around it.
pub fn selected_rect(state: &EditorState) -> Option<SelectedRect> {
    let cell = selection_cell(state)?;
    let depth = cell.depth();
    if depth == 0 {
        return None;
    }
    let table = Arc::clone(cell.node(depth - 1));
    if table.kind.table_role() != Some(TableRole::Table) {
        return None;
    }
    let table_start = cell.start(depth - 1);
    let map = TableMap::get(&table);
    let rect = match state.selection {
        Selection::Cell {
            anchor_cell,
            head_cell,
        } => map.rect_between(anchor_cell - table_start, head_cell - table_start),
        _ => map.find_cell(cell.pos() - table_start),
    };
    Some(SelectedRect {
        rect,
        map,
        table,
        table_start,
    })
}

/// The cell starting at a table-relative offset. Offsets that do not name
/// a cell are programming errors and fail fast.
pub(crate) fn table_cell_at(table: &Node, pos: usize) -> &Arc<Node> {
    match table.node_at(pos) {
        Some(cell) if cell.kind.is_cell() => cell,
        _ => panic!("no cell at table offset {pos}"),
    }
}

/// Check whether a cell's content is exactly one empty textblock
pub fn cell_is_empty(cell: &Node) -> bool {
    cell.children.len() == 1
        && cell.children[0].kind.is_textblock()
        && cell.children[0].children.is_empty()
}
