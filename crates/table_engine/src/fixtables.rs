//! Automatic repair of malformed tables
//!
//! Tables parsed from untrusted markup can have overlapping spans, rows of
//! different widths, rowspans running past the last row, or disagreeing
//! stored column widths. Grid construction records those as problems; this
//! pass consumes the problem list and synthesizes one mutation that makes
//! every table grid-consistent again. The mutation is flagged as not
//! contributing to undo history, so loading a broken document does not
//! leave a phantom undo step.

use crate::{table_cell_at, Problem, TableMap};
use doc_model::{Attrs, CellAttrs, EditorState, Node, NodeKind, TableRole, Transaction};
use serde_json::Value;
use std::sync::Arc;

/// Metadata key marking a mutation that must not enter undo history
pub const ADD_TO_HISTORY_META: &str = "addToHistory";

/// Metadata key marking a repair mutation
pub const FIX_TABLES_META: &str = "fixTables";

fn collect_tables(node: &Arc<Node>, base: usize, out: &mut Vec<(Arc<Node>, usize)>) {
    let mut pos = base;
    for child in &node.children {
        if child.kind.table_role() == Some(TableRole::Table) {
            out.push((Arc::clone(child), pos));
        }
        collect_tables(child, pos + 1, out);
        pos += child.size();
    }
}

/// Inspect every table in the document (tables nested in cells included)
/// and return a repair transaction when any of them is malformed, `None`
/// when the document is already consistent
pub fn fix_tables(state: &EditorState) -> Option<Transaction> {
    let mut tr = state.tr();
    let mut passes = 0;
    loop {
        let mut tables = Vec::new();
        collect_tables(tr.doc(), 0, &mut tables);
        let mut fixed = false;
        for (table, before) in tables {
            let map = TableMap::get(&table);
            if map.problems.is_empty() {
                continue;
            }
            tracing::debug!(problems = map.problems.len(), "repairing malformed table");
            fix_table(&mut tr, &table, before, &map);
            fixed = true;
            // positions of later tables shifted, rescan from the new doc
            break;
        }
        if !fixed {
            break;
        }
        passes += 1;
        if passes > 32 {
            tracing::warn!("table repair did not converge, giving up");
            break;
        }
    }
    if tr.doc_changed() {
        tr.set_meta(ADD_TO_HISTORY_META, Value::Bool(false));
        tr.set_meta(FIX_TABLES_META, Value::Bool(true));
        Some(tr)
    } else {
        None
    }
}

/// Emit repair steps for one table. `table_pos` is the offset just before
/// the table node.
fn fix_table(tr: &mut Transaction, table: &Arc<Node>, table_pos: usize, map: &TableMap) {
    let map_start = tr.mapping().len();
    let mut must_add = vec![0usize; map.height];
    for problem in &map.problems {
        match problem {
            Problem::Collision { row, pos, n } => {
                let cell = table_cell_at(table, *pos);
                let attrs = cell.cell_attrs().cloned().unwrap_or_default();
                let at = tr.mapping().slice(map_start).map(table_pos + 1 + pos);
                if attrs.colspan > *n {
                    let rows = attrs.rowspan.max(1).min(map.height - row);
                    for offset in 0..rows {
                        must_add[row + offset] += n;
                    }
                    let colspan = attrs.colspan;
                    tr.set_node_attrs(
                        at,
                        None,
                        Attrs::Cell(attrs.remove_colspan(colspan - n, *n)),
                    );
                } else {
                    // a fully overlapped single-column cell is removed
                    tr.delete(at, at + cell.size());
                }
            }
            Problem::Missing { row, n } => {
                must_add[*row] += n;
            }
            Problem::OverlongRowspan { pos, n } => {
                let cell = table_cell_at(table, *pos);
                let attrs = cell.cell_attrs().cloned().unwrap_or_default();
                let rowspan = attrs.rowspan;
                let at = tr.mapping().slice(map_start).map(table_pos + 1 + pos);
                tr.set_node_attrs(
                    at,
                    None,
                    Attrs::Cell(attrs.with_rowspan(rowspan.saturating_sub(*n).max(1))),
                );
            }
            Problem::ColwidthMismatch { pos, colwidth } => {
                let cell = table_cell_at(table, *pos);
                let attrs = cell.cell_attrs().cloned().unwrap_or_default();
                let at = tr.mapping().slice(map_start).map(table_pos + 1 + pos);
                tr.set_node_attrs(
                    at,
                    None,
                    Attrs::Cell(attrs.with_colwidth(Some(colwidth.clone()))),
                );
            }
        }
    }
    // pad short rows with empty cells at their end
    let mut pos = table_pos + 1;
    for row in 0..map.height {
        let row_node = table.child(row);
        let end = pos + row_node.size();
        let add = must_add[row];
        if add > 0 {
            let kind = row_node
                .children
                .first()
                .map(|cell| cell.kind)
                .unwrap_or(NodeKind::TableCell);
            let cells = (0..add)
                .map(|_| Node::filled_cell(kind, CellAttrs::default()))
                .collect();
            let at = tr.mapping().slice(map_start).map(end - 1);
            tr.insert(at, cells);
        }
        pos = end;
    }
}
