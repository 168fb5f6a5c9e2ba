//! Shared test fixtures

use crate::{Dispatch, TableMap};
use doc_model::{CellAttrs, EditorState, Node, NodeKind, Selection, Transaction};
use std::sync::Arc;

/// A cell holding one paragraph with the given text
pub fn cell(text: &str) -> Arc<Node> {
    Node::cell(CellAttrs::default(), vec![Node::paragraph_text(text)])
}

/// A cell holding one empty paragraph
pub fn empty_cell() -> Arc<Node> {
    Node::filled_cell(NodeKind::TableCell, CellAttrs::default())
}

/// A spanning cell holding one paragraph with the given text
pub fn spanning_cell(text: &str, colspan: usize, rowspan: usize) -> Arc<Node> {
    Node::cell(
        CellAttrs::default()
            .with_colspan(colspan)
            .with_rowspan(rowspan),
        vec![Node::paragraph_text(text)],
    )
}

/// A rows × cols table of empty single-span cells
pub fn uniform_table(rows: usize, cols: usize) -> Arc<Node> {
    Node::table(
        (0..rows)
            .map(|_| Node::row((0..cols).map(|_| empty_cell()).collect()))
            .collect(),
    )
}

/// Wrap a table in a document
pub fn doc_with(table: Arc<Node>) -> Arc<Node> {
    Node::doc(vec![table])
}

fn doc_table(doc: &Arc<Node>) -> (Arc<Node>, usize) {
    (Arc::clone(doc.child(0)), 1)
}

/// Absolute offset of the cell occupying grid coordinate (row, col) in a
/// document whose first child is the table
pub fn cell_pos(doc: &Arc<Node>, row: usize, col: usize) -> usize {
    let (table, start) = doc_table(doc);
    let map = TableMap::get(&table);
    start + map.map[row * map.width + col]
}

/// State with a collapsed text cursor inside cell (row, col)
pub fn state_in_cell(table: Arc<Node>, row: usize, col: usize) -> EditorState {
    let doc = doc_with(table);
    let pos = cell_pos(&doc, row, col) + 2;
    EditorState::with_selection(doc, Selection::collapsed(pos))
}

/// State with a cell selection from one grid coordinate to another
pub fn state_with_cells(
    table: Arc<Node>,
    anchor: (usize, usize),
    head: (usize, usize),
) -> EditorState {
    let doc = doc_with(table);
    let anchor_pos = cell_pos(&doc, anchor.0, anchor.1);
    let head_pos = cell_pos(&doc, head.0, head.1);
    EditorState::with_selection(doc, Selection::cell(anchor_pos, head_pos))
}

/// Grid dimensions of the state's table
pub fn grid_size(state: &EditorState) -> (usize, usize) {
    let (table, _) = doc_table(&state.doc);
    let map = TableMap::get(&table);
    (map.width, map.height)
}

/// The state's table node
pub fn table_of(state: &EditorState) -> Arc<Node> {
    doc_table(&state.doc).0
}

/// Run a command, asserting it reported itself applicable, and apply the
/// transaction it dispatched
pub fn run(
    state: &EditorState,
    command: impl Fn(&EditorState, Option<Dispatch>) -> bool,
) -> EditorState {
    let mut emitted: Option<Transaction> = None;
    assert!(
        command(state, Some(&mut |tr| emitted = Some(tr))),
        "command was not applicable"
    );
    state.apply(emitted.expect("command succeeded without dispatching"))
}

/// Probe a command without dispatching
pub fn probe(state: &EditorState, command: impl Fn(&EditorState, Option<Dispatch>) -> bool) -> bool {
    command(state, None)
}
