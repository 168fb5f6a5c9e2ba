//! Table editing commands
//!
//! Every command follows the same contract: it takes the current editor
//! state plus an optional mutation sink, returns `false` without touching
//! the sink when it is not applicable, and otherwise emits exactly one
//! transaction through the sink and returns `true`. Calling a command
//! without a sink probes its availability (for enabling menu entries and
//! the like) without committing anything.
//!
//! Commands never raise; anything a user can trigger from inside or
//! outside a table is answered with a boolean.

use crate::{
    cell_around, cell_is_empty, cell_wrapping, col_selection, is_in_table, row_selection,
    selected_rect, selection_cell, table_cell_at, Rect, SelectedRect, TableMap,
};
use doc_model::{
    Attrs, CellAttrs, EditorState, Node, NodeKind, ResolvedPos, Selection, TableRole, Transaction,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Mutation sink handed to a command when the caller wants the edit
/// performed rather than probed
pub type Dispatch<'a> = &'a mut dyn FnMut(Transaction);

// =============================================================================
// Column insertion
// =============================================================================

fn column_is_header(map: &TableMap, table: &Node, col: usize) -> bool {
    (0..map.height).all(|row| {
        table_cell_at(table, map.map[row * map.width + col]).kind == NodeKind::TableHeaderCell
    })
}

fn row_is_header(map: &TableMap, table: &Node, row: usize) -> bool {
    if row >= map.height {
        return false;
    }
    (0..map.width).all(|col| {
        table_cell_at(table, map.map[row * map.width + col]).kind == NodeKind::TableHeaderCell
    })
}

/// Add a column at the given grid position
fn add_column(tr: &mut Transaction, rect: &SelectedRect, col: usize) {
    let map = &rect.map;
    let table = &rect.table;

    // column to copy header-ness and cell kind from
    let mut ref_column = Some(if col > 0 { col - 1 } else { col });
    if let Some(rc) = ref_column {
        if column_is_header(map, table, rc) {
            ref_column = if col == 0 || col == map.width {
                None
            } else {
                Some(col)
            };
        }
    }

    let mut row = 0;
    while row < map.height {
        let index = row * map.width + col;
        if col > 0 && col < map.width && map.map[index - 1] == map.map[index] {
            // the insertion point falls inside a colspanning cell
            let pos = map.map[index];
            let cell = table_cell_at(table, pos);
            let attrs = cell.cell_attrs().cloned().unwrap_or_default();
            let at = tr.mapping().map(rect.table_start + pos);
            let grown = attrs.add_colspan(col - map.col_count(pos), 1);
            let rowspan = grown.rowspan;
            tr.set_node_attrs(at, None, Attrs::Cell(grown));
            // skip ahead past the cell's rowspan
            row += rowspan.max(1);
        } else {
            let kind = match ref_column {
                None => NodeKind::TableCell,
                Some(rc) => table_cell_at(table, map.map[row * map.width + rc]).kind,
            };
            let pos = map.position_at(row, col, table);
            let at = tr.mapping().map(rect.table_start + pos);
            tr.insert(at, vec![Node::filled_cell(kind, CellAttrs::default())]);
            row += 1;
        }
    }
}

/// Add a column before the column with the selection
pub fn add_column_before(state: &EditorState, dispatch: Option<Dispatch>) -> bool {
    if !is_in_table(state) {
        return false;
    }
    let Some(rect) = selected_rect(state) else {
        return false;
    };
    if let Some(dispatch) = dispatch {
        let mut tr = state.tr();
        add_column(&mut tr, &rect, rect.rect.left);
        dispatch(tr);
    }
    true
}

/// Add a column after the column with the selection
pub fn add_column_after(state: &EditorState, dispatch: Option<Dispatch>) -> bool {
    if !is_in_table(state) {
        return false;
    }
    let Some(rect) = selected_rect(state) else {
        return false;
    };
    if let Some(dispatch) = dispatch {
        let mut tr = state.tr();
        add_column(&mut tr, &rect, rect.rect.right);
        dispatch(tr);
    }
    true
}

// =============================================================================
// Column removal
// =============================================================================

/// Remove the column at the given grid position
fn remove_column(tr: &mut Transaction, rect: &SelectedRect, col: usize) {
    let map = &rect.map;
    let table = &rect.table;
    let map_start = tr.mapping().len();
    let mut row = 0;
    while row < map.height {
        let index = row * map.width + col;
        let pos = map.map[index];
        let cell = table_cell_at(table, pos);
        let attrs = cell.cell_attrs().cloned().unwrap_or_default();
        if (col > 0 && map.map[index - 1] == pos)
            || (col < map.width - 1 && map.map[index + 1] == pos)
        {
            // the cell spans past the removed column, shrink it
            let at = tr.mapping().slice(map_start).map(rect.table_start + pos);
            tr.set_node_attrs(
                at,
                None,
                Attrs::Cell(attrs.remove_colspan(col - map.col_count(pos), 1)),
            );
        } else {
            let at = tr.mapping().slice(map_start).map(rect.table_start + pos);
            tr.delete(at, at + cell.size());
        }
        row += attrs.rowspan.max(1);
    }
}

/// Remove the selected columns. Refuses to delete the table's whole width;
/// that has to go through [`delete_table`].
pub fn delete_column(state: &EditorState, dispatch: Option<Dispatch>) -> bool {
    if !is_in_table(state) {
        return false;
    }
    let Some(mut rect) = selected_rect(state) else {
        return false;
    };
    if rect.rect.left == 0 && rect.rect.right == rect.map.width {
        return false;
    }
    if let Some(dispatch) = dispatch {
        let mut tr = state.tr();
        let mut col = rect.rect.right;
        loop {
            col -= 1;
            remove_column(&mut tr, &rect, col);
            if col == rect.rect.left {
                break;
            }
            // offsets shifted, rebuild the grid before the next removal
            let table = match tr.doc().node_at(rect.table_start - 1) {
                Some(table) => Arc::clone(table),
                None => panic!("table missing after column removal"),
            };
            rect.map = TableMap::get(&table);
            rect.table = table;
        }
        dispatch(tr);
    }
    true
}

// =============================================================================
// Row insertion
// =============================================================================

/// Add a row at the given grid position
fn add_row(tr: &mut Transaction, rect: &SelectedRect, row: usize) {
    let map = &rect.map;
    let table = &rect.table;

    let mut row_pos = rect.table_start;
    for i in 0..row {
        row_pos += table.child(i).size();
    }

    let mut ref_row = Some(if row > 0 { row - 1 } else { row });
    if let Some(rr) = ref_row {
        if row_is_header(map, table, rr) {
            ref_row = if row == 0 || row == map.height {
                None
            } else {
                Some(row)
            };
        }
    }

    let mut cells = Vec::new();
    let mut col = 0;
    while col < map.width {
        let index = map.width * row + col;
        if row > 0 && row < map.height && map.map[index] == map.map[index - map.width] {
            // covered by a rowspanning cell, bump its rowspan
            let pos = map.map[index];
            let cell = table_cell_at(table, pos);
            let attrs = cell.cell_attrs().cloned().unwrap_or_default();
            let colspan = attrs.colspan.max(1);
            let rowspan = attrs.rowspan;
            tr.set_node_attrs(
                rect.table_start + pos,
                None,
                Attrs::Cell(attrs.with_rowspan(rowspan + 1)),
            );
            col += colspan;
        } else {
            let kind = match ref_row {
                None => NodeKind::TableCell,
                Some(rr) => table_cell_at(table, map.map[rr * map.width + col]).kind,
            };
            cells.push(Node::filled_cell(kind, CellAttrs::default()));
            col += 1;
        }
    }
    tr.insert(row_pos, vec![Node::row(cells)]);
}

/// Add a table row before the selection
pub fn add_row_before(state: &EditorState, dispatch: Option<Dispatch>) -> bool {
    if !is_in_table(state) {
        return false;
    }
    let Some(rect) = selected_rect(state) else {
        return false;
    };
    if let Some(dispatch) = dispatch {
        let mut tr = state.tr();
        add_row(&mut tr, &rect, rect.rect.top);
        dispatch(tr);
    }
    true
}

/// Add a table row after the selection
pub fn add_row_after(state: &EditorState, dispatch: Option<Dispatch>) -> bool {
    if !is_in_table(state) {
        return false;
    }
    let Some(rect) = selected_rect(state) else {
        return false;
    };
    if let Some(dispatch) = dispatch {
        let mut tr = state.tr();
        add_row(&mut tr, &rect, rect.rect.bottom);
        dispatch(tr);
    }
    true
}

// =============================================================================
// Row removal
// =============================================================================

/// Remove the row at the given grid position
fn remove_row(tr: &mut Transaction, rect: &SelectedRect, row: usize) {
    let map = &rect.map;
    let table = &rect.table;

    let mut row_pos = 0;
    for i in 0..row {
        row_pos += table.child(i).size();
    }
    let next_row = row_pos + table.child(row).size();

    let map_from = tr.mapping().len();
    tr.delete(rect.table_start + row_pos, rect.table_start + next_row);

    let mut col = 0;
    while col < map.width {
        let index = row * map.width + col;
        let pos = map.map[index];
        if row > 0 && pos == map.map[index - map.width] {
            // the cell starts in the row above, shrink its rowspan
            let cell = table_cell_at(table, pos);
            let attrs = cell.cell_attrs().cloned().unwrap_or_default();
            let colspan = attrs.colspan.max(1);
            let rowspan = attrs.rowspan;
            let at = tr.mapping().slice(map_from).map(rect.table_start + pos);
            tr.set_node_attrs(at, None, Attrs::Cell(attrs.with_rowspan(rowspan - 1)));
            col += colspan;
        } else if row + 1 < map.height && pos == map.map[index + map.width] {
            // the cell continues below, move a shrunken copy down
            let cell = table_cell_at(table, pos);
            let attrs = cell.cell_attrs().cloned().unwrap_or_default();
            let colspan = attrs.colspan.max(1);
            let rowspan = attrs.rowspan;
            let copy = Node::cell_of_kind(
                cell.kind,
                attrs.with_rowspan(rowspan - 1),
                cell.children.clone(),
            );
            let new_pos = map.position_at(row + 1, col, table);
            let at = tr.mapping().slice(map_from).map(rect.table_start + new_pos);
            tr.insert(at, vec![copy]);
            col += colspan;
        } else {
            col += 1;
        }
    }
}

/// Remove the selected rows. Refuses to delete the table's whole height;
/// that has to go through [`delete_table`].
pub fn delete_row(state: &EditorState, dispatch: Option<Dispatch>) -> bool {
    if !is_in_table(state) {
        return false;
    }
    let Some(mut rect) = selected_rect(state) else {
        return false;
    };
    if rect.rect.top == 0 && rect.rect.bottom == rect.map.height {
        return false;
    }
    if let Some(dispatch) = dispatch {
        let mut tr = state.tr();
        let mut row = rect.rect.bottom;
        loop {
            row -= 1;
            remove_row(&mut tr, &rect, row);
            if row == rect.rect.top {
                break;
            }
            let table = match tr.doc().node_at(rect.table_start - 1) {
                Some(table) => Arc::clone(table),
                None => panic!("table missing after row removal"),
            };
            rect.map = TableMap::get(&table);
            rect.table = table;
        }
        dispatch(tr);
    }
    true
}

// =============================================================================
// Merging and splitting
// =============================================================================

/// Merge the selected cells into one. Only available when the selection
/// covers more than one cell and its outline does not cut through any
/// spanning cell.
pub fn merge_cells(state: &EditorState, dispatch: Option<Dispatch>) -> bool {
    let Selection::Cell {
        anchor_cell,
        head_cell,
    } = state.selection
    else {
        return false;
    };
    if anchor_cell == head_cell {
        return false;
    }
    let Some(rect) = selected_rect(state) else {
        return false;
    };
    if rect.map.cells_overlap_rect(&rect.rect) {
        return false;
    }
    if let Some(dispatch) = dispatch {
        let mut tr = state.tr();
        let mut seen = HashSet::new();
        let mut content: Vec<Arc<Node>> = Vec::new();
        let mut merged: Option<(usize, Arc<Node>)> = None;
        for row in rect.rect.top..rect.rect.bottom {
            for col in rect.rect.left..rect.rect.right {
                let cell_pos = rect.map.map[row * rect.map.width + col];
                if !seen.insert(cell_pos) {
                    continue;
                }
                let cell = Arc::clone(table_cell_at(&rect.table, cell_pos));
                if merged.is_none() {
                    merged = Some((cell_pos, cell));
                } else {
                    if !cell_is_empty(&cell) {
                        content.extend(cell.children.iter().cloned());
                    }
                    let at = tr.mapping().map(rect.table_start + cell_pos);
                    tr.delete(at, at + cell.size());
                }
            }
        }
        let Some((merged_pos, merged_cell)) = merged else {
            return false;
        };
        let attrs = merged_cell.cell_attrs().cloned().unwrap_or_default();
        let colspan = attrs.colspan;
        let grown = attrs
            .add_colspan(colspan, rect.rect.width() - colspan)
            .with_rowspan(rect.rect.height());
        tr.set_node_attrs(rect.table_start + merged_pos, None, Attrs::Cell(grown));
        if !content.is_empty() {
            let content_start = rect.table_start + merged_pos + 1;
            let content_end = content_start + merged_cell.content_size();
            if cell_is_empty(&merged_cell) {
                tr.delete(content_start, content_end);
                tr.insert(content_start, content);
            } else {
                tr.insert(content_end, content);
            }
        }
        tr.set_selection(Selection::cell(
            rect.table_start + merged_pos,
            rect.table_start + merged_pos,
        ));
        dispatch(tr);
    }
    true
}

/// Information handed to the cell-kind selector of
/// [`split_cell_with_kind`]
#[derive(Debug)]
pub struct SplitCellInfo<'a> {
    pub row: usize,
    pub col: usize,
    pub node: &'a Arc<Node>,
}

/// Split the selected spanning cell into single-span cells, keeping the
/// original kind for the new cells
pub fn split_cell(state: &EditorState, dispatch: Option<Dispatch>) -> bool {
    split_cell_with_kind(state, dispatch, |info| info.node.kind)
}

/// Split the selected spanning cell, assigning each produced cell the kind
/// the selector returns
pub fn split_cell_with_kind<F>(state: &EditorState, dispatch: Option<Dispatch>, get_kind: F) -> bool
where
    F: Fn(&SplitCellInfo) -> NodeKind,
{
    let (cell_node, cell_pos) = match state.selection {
        Selection::Cell {
            anchor_cell,
            head_cell,
        } => {
            if anchor_cell != head_cell {
                return false;
            }
            let pos = state.resolve(anchor_cell);
            match pos.node_after() {
                Some(cell) => (Arc::clone(cell), anchor_cell),
                None => return false,
            }
        }
        Selection::Text { .. } => {
            let pos = state.resolve(state.selection.head());
            let Some(cell) = cell_wrapping(&pos) else {
                return false;
            };
            let Some(cell_rp) = cell_around(&pos) else {
                return false;
            };
            (cell, cell_rp.pos())
        }
    };
    let attrs = cell_node.cell_attrs().cloned().unwrap_or_default();
    if attrs.colspan == 1 && attrs.rowspan == 1 {
        return false;
    }
    if let Some(dispatch) = dispatch {
        let Some(rect) = selected_rect(state) else {
            return false;
        };
        let base = attrs
            .clone()
            .with_colspan(1)
            .with_rowspan(1)
            .with_colwidth(None);
        let colwidth = attrs.colwidth.clone();
        let mut split_attrs = Vec::with_capacity(rect.rect.width());
        for i in 0..rect.rect.width() {
            let width = colwidth
                .as_ref()
                .and_then(|cw| cw.get(i).copied())
                .unwrap_or(0);
            split_attrs.push(if width > 0 {
                base.clone().with_colwidth(Some(vec![width]))
            } else {
                base.clone()
            });
        }

        let mut tr = state.tr();
        let mut last_cell = cell_pos;
        for row in rect.rect.top..rect.rect.bottom {
            let mut pos = rect.map.position_at(row, rect.rect.left, &rect.table);
            if row == rect.rect.top {
                pos += cell_node.size();
            }
            for col in rect.rect.left..rect.rect.right {
                if col == rect.rect.left && row == rect.rect.top {
                    continue;
                }
                let i = col - rect.rect.left;
                let kind = get_kind(&SplitCellInfo {
                    row,
                    col,
                    node: &cell_node,
                });
                let at = tr.mapping().map_assoc(rect.table_start + pos, 1);
                last_cell = at;
                tr.insert(at, vec![Node::filled_cell(kind, split_attrs[i].clone())]);
            }
        }
        let top_kind = get_kind(&SplitCellInfo {
            row: rect.rect.top,
            col: rect.rect.left,
            node: &cell_node,
        });
        tr.set_node_attrs(cell_pos, Some(top_kind), Attrs::Cell(split_attrs[0].clone()));
        if state.selection.is_cell() {
            tr.set_selection(Selection::cell(cell_pos, last_cell));
        }
        dispatch(tr);
    }
    true
}

// =============================================================================
// Cell attributes and headers
// =============================================================================

fn extra_attr(attrs: &CellAttrs, name: &str) -> Value {
    attrs.extra(name).cloned().unwrap_or(Value::Null)
}

/// Set an opaque cell attribute on every selected cell. Not applicable
/// when the cell under the selection already holds the value.
pub fn set_cell_attr(
    state: &EditorState,
    dispatch: Option<Dispatch>,
    name: &str,
    value: Value,
) -> bool {
    if !is_in_table(state) {
        return false;
    }
    let Some(cell_rp) = selection_cell(state) else {
        return false;
    };
    let Some(cell) = cell_rp.node_after() else {
        return false;
    };
    let attrs = cell.cell_attrs().cloned().unwrap_or_default();
    if extra_attr(&attrs, name) == value {
        return false;
    }
    if let Some(dispatch) = dispatch {
        let mut tr = state.tr();
        if state.selection.is_cell() {
            let Some(rect) = selected_rect(state) else {
                return false;
            };
            for pos in rect.map.cells_in_rect(&rect.rect) {
                let cell = table_cell_at(&rect.table, pos);
                let current = cell.cell_attrs().cloned().unwrap_or_default();
                if extra_attr(&current, name) != value {
                    tr.set_node_attrs(
                        rect.table_start + pos,
                        None,
                        Attrs::Cell(current.with_extra(name, value.clone())),
                    );
                }
            }
        } else {
            tr.set_node_attrs(
                cell_rp.pos(),
                None,
                Attrs::Cell(attrs.with_extra(name, value.clone())),
            );
        }
        dispatch(tr);
    }
    true
}

/// Which line of the selection a header toggle applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderScope {
    Row,
    Column,
    Cell,
}

/// Toggle header kind on the first row or column of the selected
/// rectangle (or all its cells for [`HeaderScope::Cell`]): when every cell
/// of that line is already a header the line reverts to normal cells,
/// otherwise it is promoted
pub fn toggle_header(state: &EditorState, dispatch: Option<Dispatch>, scope: HeaderScope) -> bool {
    if !is_in_table(state) {
        return false;
    }
    if let Some(dispatch) = dispatch {
        let Some(rect) = selected_rect(state) else {
            return false;
        };
        let line = match scope {
            HeaderScope::Row => Rect::new(
                rect.rect.left,
                rect.rect.top,
                rect.rect.right,
                rect.rect.top + 1,
            ),
            HeaderScope::Column => Rect::new(
                rect.rect.left,
                rect.rect.top,
                rect.rect.left + 1,
                rect.rect.bottom,
            ),
            HeaderScope::Cell => rect.rect,
        };
        let cells = rect.map.cells_in_rect(&line);
        let all_header = cells
            .iter()
            .all(|&pos| table_cell_at(&rect.table, pos).kind == NodeKind::TableHeaderCell);
        let new_kind = if all_header {
            NodeKind::TableCell
        } else {
            NodeKind::TableHeaderCell
        };
        let mut tr = state.tr();
        for pos in cells {
            let cell = table_cell_at(&rect.table, pos);
            if cell.kind != new_kind {
                tr.set_node_attrs(rect.table_start + pos, Some(new_kind), cell.attrs.clone());
            }
        }
        dispatch(tr);
    }
    true
}

/// Toggle header kind on the selection's first row
pub fn toggle_header_row(state: &EditorState, dispatch: Option<Dispatch>) -> bool {
    toggle_header(state, dispatch, HeaderScope::Row)
}

/// Toggle header kind on the selection's first column
pub fn toggle_header_column(state: &EditorState, dispatch: Option<Dispatch>) -> bool {
    toggle_header(state, dispatch, HeaderScope::Column)
}

/// Toggle header kind on every selected cell
pub fn toggle_header_cell(state: &EditorState, dispatch: Option<Dispatch>) -> bool {
    toggle_header(state, dispatch, HeaderScope::Cell)
}

// =============================================================================
// Cell navigation and selection
// =============================================================================

fn find_next_cell(cell: &ResolvedPos, dir: i32) -> Option<usize> {
    let depth = cell.depth();
    if depth < 2 {
        return None;
    }
    if dir < 0 {
        if let Some(before) = cell.node_before() {
            return Some(cell.pos() - before.size());
        }
        let table = cell.node(depth - 1);
        let row_index = cell.index(depth - 1);
        let mut row_end = cell.before(depth);
        for row in (0..row_index).rev() {
            let row_node = table.child(row);
            if let Some(last) = row_node.children.last() {
                return Some(row_end - 1 - last.size());
            }
            row_end -= row_node.size();
        }
        None
    } else {
        if let Some(after) = cell.node_after() {
            let next = cell.pos() + after.size();
            if cell.index(depth) + 1 < cell.parent().child_count() {
                return Some(next);
            }
        }
        let table = cell.node(depth - 1);
        let mut row_start = cell.after(depth);
        for row in cell.index(depth - 1) + 1..table.child_count() {
            let row_node = table.child(row);
            if row_node.child_count() > 0 {
                return Some(row_start + 1);
            }
            row_start += row_node.size();
        }
        None
    }
}

/// Select the next (dir = 1) or previous (dir = -1) cell in document
/// order, covering its whole content. Not applicable at the table edge.
pub fn go_to_next_cell(state: &EditorState, dispatch: Option<Dispatch>, dir: i32) -> bool {
    if !is_in_table(state) {
        return false;
    }
    let Some(cell) = selection_cell(state) else {
        return false;
    };
    let Some(next) = find_next_cell(&cell, dir) else {
        return false;
    };
    if let Some(dispatch) = dispatch {
        let pos = state.resolve(next);
        let Some(target) = pos.node_after() else {
            return false;
        };
        let mut tr = state.tr();
        tr.set_selection(Selection::text(next, next + target.size()));
        dispatch(tr);
    }
    true
}

/// Select the rows from `anchor_row` to `head_row`
pub fn select_row(
    state: &EditorState,
    dispatch: Option<Dispatch>,
    anchor_row: usize,
    head_row: usize,
) -> bool {
    if !is_in_table(state) {
        return false;
    }
    let Some(cell) = selection_cell(state) else {
        return false;
    };
    let depth = cell.depth();
    let table = Arc::clone(cell.node(depth - 1));
    let table_start = cell.start(depth - 1);
    let map = TableMap::get(&table);
    if anchor_row >= map.height || head_row >= map.height {
        return false;
    }
    if let Some(dispatch) = dispatch {
        let anchor = table_start + map.map[anchor_row * map.width];
        let head = table_start + map.map[head_row * map.width];
        let mut tr = state.tr();
        tr.set_selection(row_selection(&state.doc, anchor, head));
        dispatch(tr);
    }
    true
}

/// Select the columns from `anchor_col` to `head_col`
pub fn select_col(
    state: &EditorState,
    dispatch: Option<Dispatch>,
    anchor_col: usize,
    head_col: usize,
) -> bool {
    if !is_in_table(state) {
        return false;
    }
    let Some(cell) = selection_cell(state) else {
        return false;
    };
    let depth = cell.depth();
    let table = Arc::clone(cell.node(depth - 1));
    let table_start = cell.start(depth - 1);
    let map = TableMap::get(&table);
    if anchor_col >= map.width || head_col >= map.width {
        return false;
    }
    if let Some(dispatch) = dispatch {
        let anchor = table_start + map.map[anchor_col];
        let head = table_start + map.map[head_col];
        let mut tr = state.tr();
        tr.set_selection(col_selection(&state.doc, anchor, head));
        dispatch(tr);
    }
    true
}

// =============================================================================
// Whole tables
// =============================================================================

/// Build a fresh rows × cols table node, optionally with a header row
pub fn create_table(rows: usize, cols: usize, with_header_row: bool) -> Arc<Node> {
    let rows = rows.max(1);
    let cols = cols.max(1);
    let mut row_nodes = Vec::with_capacity(rows);
    for row in 0..rows {
        let kind = if with_header_row && row == 0 {
            NodeKind::TableHeaderCell
        } else {
            NodeKind::TableCell
        };
        row_nodes.push(Node::row(
            (0..cols)
                .map(|_| Node::filled_cell(kind, CellAttrs::default()))
                .collect(),
        ));
    }
    Node::table(row_nodes)
}

/// Insert a new table after the top-level block holding the selection and
/// put the cursor into its first cell
pub fn add_table(
    state: &EditorState,
    dispatch: Option<Dispatch>,
    rows: usize,
    cols: usize,
    with_header_row: bool,
) -> bool {
    if let Some(dispatch) = dispatch {
        let pos = state.resolve(state.selection.head());
        let insert_at = if pos.depth() == 0 {
            pos.pos()
        } else {
            pos.after(1)
        };
        let mut tr = state.tr();
        tr.insert(insert_at, vec![create_table(rows, cols, with_header_row)]);
        // table, row, and cell openings precede the first paragraph
        tr.set_selection(Selection::collapsed(insert_at + 4));
        dispatch(tr);
    }
    true
}

/// Delete the table around the selection, if any
pub fn delete_table(state: &EditorState, dispatch: Option<Dispatch>) -> bool {
    let pos = state.resolve(state.selection.anchor());
    for depth in (1..=pos.depth()).rev() {
        if pos.node(depth).kind.table_role() == Some(TableRole::Table) {
            if let Some(dispatch) = dispatch {
                let mut tr = state.tr();
                tr.delete(pos.before(depth), pos.after(depth));
                dispatch(tr);
            }
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{
        cell, cell_pos, empty_cell, grid_size, probe, run, spanning_cell, state_in_cell,
        state_with_cells, table_of, uniform_table,
    };
    use serde_json::json;

    #[test]
    fn test_add_column_after_widens_grid() {
        let state = state_in_cell(uniform_table(3, 3), 0, 1);
        let next = run(&state, add_column_after);
        assert_eq!(grid_size(&next), (4, 3));
        let table = table_of(&next);
        for row in 0..3 {
            assert_eq!(table.child(row).child_count(), 4);
        }
        // cells after the insertion point moved one column right
        let map = TableMap::get(&table);
        let old_map = TableMap::get(&table_of(&state));
        let moved = map.map[3];
        assert_eq!(map.col_count(moved), 3);
        assert_eq!(old_map.col_count(old_map.map[2]), 2);
    }

    #[test]
    fn test_add_column_before_at_left_edge() {
        let state = state_in_cell(uniform_table(2, 2), 0, 0);
        let next = run(&state, add_column_before);
        assert_eq!(grid_size(&next), (3, 2));
    }

    #[test]
    fn test_add_column_bumps_spanning_cell() {
        // [ A A ][ B ]
        // [ C ][ D ][ E ]
        let table = Node::table(vec![
            Node::row(vec![spanning_cell("a", 2, 1), empty_cell()]),
            Node::row(vec![empty_cell(), empty_cell(), empty_cell()]),
        ]);
        let state = state_in_cell(table, 1, 1);
        let next = run(&state, add_column_before);
        assert_eq!(grid_size(&next), (4, 2));
        let map = TableMap::get(&table_of(&next));
        let a = table_of(&next);
        let spanning = table_cell_at(&a, map.map[0]);
        assert_eq!(spanning.cell_attrs().map(|at| at.colspan), Some(3));
        // the spanning row did not gain a cell node
        assert_eq!(a.child(0).child_count(), 2);
        assert_eq!(a.child(1).child_count(), 4);
    }

    #[test]
    fn test_delete_column_shrinks_spanning_cell() {
        // [ A A ][ B ]
        // [ C ][ D ][ E ]
        let table = Node::table(vec![
            Node::row(vec![spanning_cell("a", 2, 1), empty_cell()]),
            Node::row(vec![empty_cell(), empty_cell(), empty_cell()]),
        ]);
        let state = state_in_cell(table, 1, 0);
        let next = run(&state, delete_column);
        assert_eq!(grid_size(&next), (2, 2));
        let table = table_of(&next);
        let map = TableMap::get(&table);
        let spanning = table_cell_at(&table, map.map[0]);
        assert_eq!(spanning.cell_attrs().map(|at| at.colspan), Some(1));
    }

    #[test]
    fn test_delete_column_refuses_whole_width() {
        let state = state_in_cell(uniform_table(3, 1), 1, 0);
        assert!(!probe(&state, delete_column));
        assert!(!delete_column(&state, None));

        // a cell spanning the full width behaves the same
        let table = Node::table(vec![Node::row(vec![spanning_cell("a", 2, 1)])]);
        let state = state_in_cell(table, 0, 0);
        assert!(!probe(&state, delete_column));
    }

    #[test]
    fn test_add_then_delete_row_restores_shape() {
        let state = state_in_cell(uniform_table(3, 3), 1, 1);
        let added = run(&state, add_row_after);
        assert_eq!(grid_size(&added), (3, 4));
        let removed = run(
            &state_in_cell(table_of(&added), 2, 1),
            delete_row,
        );
        assert_eq!(grid_size(&removed), (3, 3));
        assert_eq!(table_of(&removed).child_count(), 3);
    }

    #[test]
    fn test_add_row_bumps_rowspan() {
        // [ A ][ B ]
        // [ A ][ C ]
        let table = Node::table(vec![
            Node::row(vec![spanning_cell("a", 1, 2), empty_cell()]),
            Node::row(vec![empty_cell()]),
        ]);
        let state = state_in_cell(table, 1, 1);
        let next = run(&state, add_row_before);
        assert_eq!(grid_size(&next), (2, 3));
        let table = table_of(&next);
        let map = TableMap::get(&table);
        let spanning = table_cell_at(&table, map.map[0]);
        assert_eq!(spanning.cell_attrs().map(|at| at.rowspan), Some(3));
        // the inserted row holds a single cell next to the spanning one
        assert_eq!(table.child(1).child_count(), 1);
    }

    #[test]
    fn test_delete_row_moves_continuing_cell_down() {
        // [ A ][ B ]
        // [ C ][ B ]
        // [ D ][ E ]
        let table = Node::table(vec![
            Node::row(vec![empty_cell(), spanning_cell("b", 1, 2)]),
            Node::row(vec![empty_cell()]),
            Node::row(vec![empty_cell(), empty_cell()]),
        ]);
        let state = state_in_cell(table, 0, 0);
        let next = run(&state, delete_row);
        assert_eq!(grid_size(&next), (2, 2));
        let table = table_of(&next);
        let map = TableMap::get(&table);
        assert!(map.problems.is_empty());
        let moved = table_cell_at(&table, map.map[1]);
        assert_eq!(moved.cell_attrs().map(|at| at.rowspan), Some(1));
        // content of the moved cell survived
        assert!(!cell_is_empty(moved));
    }

    #[test]
    fn test_delete_row_refuses_whole_height() {
        let state = state_with_cells(uniform_table(2, 2), (0, 0), (1, 1));
        assert!(!probe(&state, delete_row));
    }

    #[test]
    fn test_merge_cells_combines_footprint_and_content() {
        let table = Node::table(vec![
            Node::row(vec![cell("one"), cell("two"), empty_cell()]),
            Node::row(vec![empty_cell(), cell("four"), empty_cell()]),
        ]);
        let state = state_with_cells(table, (0, 0), (1, 1));
        let next = run(&state, merge_cells);
        assert_eq!(grid_size(&next), (3, 2));
        let table = table_of(&next);
        let map = TableMap::get(&table);
        assert!(map.problems.is_empty());
        let merged = table_cell_at(&table, map.map[0]);
        let attrs = merged.cell_attrs().expect("attrs");
        assert_eq!((attrs.colspan, attrs.rowspan), (2, 2));
        // "one" plus the non-empty content of "two" and "four"
        assert_eq!(merged.child_count(), 3);
        assert!(next.selection.is_cell());
    }

    #[test]
    fn test_merge_cells_needs_multi_cell_selection() {
        let state = state_with_cells(uniform_table(2, 2), (0, 0), (0, 0));
        assert!(!probe(&state, merge_cells));
        let cursor = state_in_cell(uniform_table(2, 2), 0, 0);
        assert!(!probe(&cursor, merge_cells));
    }

    #[test]
    fn test_merge_then_split_restores_dimensions() {
        let state = state_with_cells(uniform_table(3, 3), (0, 0), (1, 1));
        let merged = run(&state, merge_cells);
        let split = run(&merged, split_cell);
        assert_eq!(grid_size(&split), (3, 3));
        let map = TableMap::get(&table_of(&split));
        assert!(map.problems.is_empty());
        assert_eq!(
            map.cells_in_rect(&Rect::new(0, 0, 3, 3)).len(),
            9
        );
    }

    #[test]
    fn test_split_cell_requires_span() {
        let state = state_in_cell(uniform_table(2, 2), 0, 0);
        assert!(!probe(&state, split_cell));
    }

    #[test]
    fn test_split_cell_keeps_first_colwidth() {
        let wide = Node::cell(
            CellAttrs::new()
                .with_colspan(2)
                .with_colwidth(Some(vec![120, 0])),
            vec![Node::paragraph_text("a")],
        );
        let table = Node::table(vec![
            Node::row(vec![wide]),
            Node::row(vec![empty_cell(), empty_cell()]),
        ]);
        let state = state_in_cell(table, 0, 0);
        let next = run(&state, split_cell);
        assert_eq!(grid_size(&next), (2, 2));
        let table = table_of(&next);
        let map = TableMap::get(&table);
        let first = table_cell_at(&table, map.map[0]);
        let second = table_cell_at(&table, map.map[1]);
        assert_eq!(
            first.cell_attrs().and_then(|at| at.colwidth.clone()),
            Some(vec![120])
        );
        assert_eq!(second.cell_attrs().and_then(|at| at.colwidth.clone()), None);
    }

    #[test]
    fn test_split_cell_with_kind_selector() {
        let table = Node::table(vec![
            Node::row(vec![spanning_cell("a", 2, 1)]),
            Node::row(vec![empty_cell(), empty_cell()]),
        ]);
        let state = state_in_cell(table, 0, 0);
        let mut emitted = None;
        assert!(split_cell_with_kind(
            &state,
            Some(&mut |tr| emitted = Some(tr)),
            |_| NodeKind::TableHeaderCell,
        ));
        let next = state.apply(emitted.expect("transaction"));
        let table = table_of(&next);
        let map = TableMap::get(&table);
        assert_eq!(
            table_cell_at(&table, map.map[0]).kind,
            NodeKind::TableHeaderCell
        );
        assert_eq!(
            table_cell_at(&table, map.map[1]).kind,
            NodeKind::TableHeaderCell
        );
    }

    #[test]
    fn test_set_cell_attr_is_idempotent() {
        let state = state_in_cell(uniform_table(2, 2), 0, 0);
        let mut emitted = None;
        assert!(set_cell_attr(
            &state,
            Some(&mut |tr| emitted = Some(tr)),
            "background",
            json!("#dfd"),
        ));
        let next = state.apply(emitted.expect("transaction"));
        let table = table_of(&next);
        let map = TableMap::get(&table);
        let painted = table_cell_at(&table, map.map[0]);
        assert_eq!(
            painted.cell_attrs().and_then(|at| at.extra("background").cloned()),
            Some(json!("#dfd"))
        );
        // second application is a no-op
        assert!(!set_cell_attr(&next, None, "background", json!("#dfd")));
    }

    #[test]
    fn test_set_cell_attr_covers_selection() {
        let state = state_with_cells(uniform_table(2, 2), (0, 0), (1, 1));
        let mut emitted = None;
        assert!(set_cell_attr(
            &state,
            Some(&mut |tr| emitted = Some(tr)),
            "background",
            json!("#dfd"),
        ));
        let next = state.apply(emitted.expect("transaction"));
        let table = table_of(&next);
        let map = TableMap::get(&table);
        for &pos in &map.map {
            assert_eq!(
                table_cell_at(&table, pos)
                    .cell_attrs()
                    .and_then(|at| at.extra("background").cloned()),
                Some(json!("#dfd"))
            );
        }
    }

    #[test]
    fn test_toggle_header_row_round_trips() {
        let state = state_with_cells(uniform_table(2, 3), (0, 0), (1, 2));
        let promoted = run(&state, toggle_header_row);
        let table = table_of(&promoted);
        for col in 0..3 {
            assert_eq!(table.child(0).child(col).kind, NodeKind::TableHeaderCell);
            assert_eq!(table.child(1).child(col).kind, NodeKind::TableCell);
        }
        let sel = Selection::cell(cell_pos(&promoted.doc, 0, 0), cell_pos(&promoted.doc, 1, 2));
        let reverted = run(
            &EditorState::with_selection(Arc::clone(&promoted.doc), sel),
            toggle_header_row,
        );
        let table = table_of(&reverted);
        for col in 0..3 {
            assert_eq!(table.child(0).child(col).kind, NodeKind::TableCell);
        }
    }

    #[test]
    fn test_toggle_header_column_affects_first_selected_column() {
        let state = state_with_cells(uniform_table(3, 3), (0, 1), (2, 2));
        let next = run(&state, toggle_header_column);
        let table = table_of(&next);
        for row in 0..3 {
            assert_eq!(table.child(row).child(1).kind, NodeKind::TableHeaderCell);
            assert_eq!(table.child(row).child(0).kind, NodeKind::TableCell);
            assert_eq!(table.child(row).child(2).kind, NodeKind::TableCell);
        }
    }

    #[test]
    fn test_go_to_next_cell() {
        let state = state_in_cell(uniform_table(2, 2), 0, 0);
        let next = run(&state, |s, d| go_to_next_cell(s, d, 1));
        let expected = cell_pos(&state.doc, 0, 1);
        assert_eq!(next.selection, Selection::text(expected, expected + 4));
        // wraps to the next row
        let state = state_in_cell(uniform_table(2, 2), 0, 1);
        let next = run(&state, |s, d| go_to_next_cell(s, d, 1));
        let expected = cell_pos(&state.doc, 1, 0);
        assert_eq!(next.selection, Selection::text(expected, expected + 4));
    }

    #[test]
    fn test_go_to_next_cell_stops_at_edges() {
        let state = state_in_cell(uniform_table(2, 2), 0, 0);
        assert!(!probe(&state, |s, d| go_to_next_cell(s, d, -1)));
        let state = state_in_cell(uniform_table(2, 2), 1, 1);
        assert!(!probe(&state, |s, d| go_to_next_cell(s, d, 1)));
    }

    #[test]
    fn test_select_row_and_col() {
        let state = state_in_cell(uniform_table(3, 3), 1, 1);
        let next = run(&state, |s, d| select_row(s, d, 0, 0));
        assert_eq!(
            next.selection,
            Selection::cell(cell_pos(&state.doc, 0, 0), cell_pos(&state.doc, 0, 2))
        );
        assert!(crate::is_row_selection(&next));

        let next = run(&state, |s, d| select_col(s, d, 2, 2));
        assert_eq!(
            next.selection,
            Selection::cell(cell_pos(&state.doc, 0, 2), cell_pos(&state.doc, 2, 2))
        );
        assert!(crate::is_col_selection(&next));

        assert!(!probe(&state, |s, d| select_row(s, d, 3, 0)));
        assert!(!probe(&state, |s, d| select_col(s, d, 0, 9)));
    }

    #[test]
    fn test_create_and_add_table() {
        let table = create_table(2, 3, true);
        let map = TableMap::compute(&table);
        assert_eq!((map.width, map.height), (3, 2));
        assert_eq!(table.child(0).child(0).kind, NodeKind::TableHeaderCell);
        assert_eq!(table.child(1).child(0).kind, NodeKind::TableCell);

        let doc = Node::doc(vec![Node::paragraph_text("hi")]);
        let state = EditorState::with_selection(doc, Selection::collapsed(1));
        let next = run(&state, |s, d| add_table(s, d, 2, 2, false));
        assert_eq!(next.doc.child_count(), 2);
        assert_eq!(next.doc.child(1).kind, NodeKind::Table);
        // cursor sits in the new table's first cell
        assert_eq!(next.selection, Selection::collapsed(4 + 4));
    }

    #[test]
    fn test_delete_table() {
        let state = state_in_cell(uniform_table(2, 2), 1, 1);
        let next = run(&state, delete_table);
        assert_eq!(next.doc.child_count(), 0);
        let outside = EditorState::new(Node::doc(vec![Node::paragraph_text("x")]));
        assert!(!probe(&outside, delete_table));
    }

    #[test]
    fn test_commands_outside_table_are_inapplicable() {
        let outside = EditorState::new(Node::doc(vec![Node::paragraph_text("x")]));
        assert!(!probe(&outside, add_column_before));
        assert!(!probe(&outside, add_row_after));
        assert!(!probe(&outside, delete_column));
        assert!(!probe(&outside, delete_row));
        assert!(!probe(&outside, merge_cells));
        assert!(!probe(&outside, split_cell));
        assert!(!probe(&outside, toggle_header_row));
        assert!(!probe(&outside, |s, d| go_to_next_cell(s, d, 1)));
    }
}
