//! Column-resize interaction and width propagation
//!
//! One `ColumnResizer` instance tracks the resize interaction of one live
//! editor: which column-boundary handle is under the pointer and, once the
//! pointer goes down on it, the running drag. Only one interaction is
//! tracked at a time. Pixel geometry stays behind the [`ViewMetrics`]
//! seam so the engine itself never touches the rendered surface.

use crate::{cell_around, table_cell_at, Dispatch, TableMap};
use doc_model::{Attrs, EditorState, Node, Transaction};
use serde_json::Value;
use std::sync::Arc;

/// Metadata key marking a drag write that should merge with the previous
/// history entry
pub const COALESCE_META: &str = "coalesceResize";

/// Pixel metrics supplied by the view layer
pub trait ViewMetrics {
    /// Document offset under a viewport point, if any
    fn offset_at(&self, x: f64, y: f64) -> Option<usize>;

    /// Rendered left and right edge of the cell starting at `cell_pos`
    fn cell_edges(&self, cell_pos: usize) -> Option<(f64, f64)>;

    /// Rendered width of the cell starting at `cell_pos`
    fn rendered_width(&self, cell_pos: usize) -> f64 {
        self.cell_edges(cell_pos)
            .map(|(left, right)| right - left)
            .unwrap_or(0.0)
    }
}

/// Tuning knobs for the resize interaction
#[derive(Debug, Clone, Copy)]
pub struct ResizeOptions {
    /// Distance from a cell edge, in pixels, within which the boundary
    /// handle activates
    pub handle_width: f64,
    /// Smallest width a drag can shrink a column to
    pub cell_min_width: f64,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        Self {
            handle_width: 5.0,
            cell_min_width: 25.0,
        }
    }
}

/// Interaction state of the resize feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeState {
    Idle,
    /// A column boundary handle is under the pointer; `handle` is the
    /// absolute offset of the cell owning the boundary
    Hovering { handle: usize },
    /// The handle is being dragged
    Dragging {
        handle: usize,
        start_x: f64,
        start_width: f64,
    },
}

type TransitionHook = Box<dyn FnMut(ResizeState, ResizeState)>;

/// Column-resize controller, one per live editor instance
pub struct ColumnResizer {
    options: ResizeOptions,
    state: ResizeState,
    first_drag_write: bool,
    on_transition: Option<TransitionHook>,
}

impl std::fmt::Debug for ColumnResizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnResizer")
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Default for ColumnResizer {
    fn default() -> Self {
        Self::new(ResizeOptions::default())
    }
}

impl ColumnResizer {
    pub fn new(options: ResizeOptions) -> Self {
        Self {
            options,
            state: ResizeState::Idle,
            first_drag_write: false,
            on_transition: None,
        }
    }

    /// Current interaction state
    pub fn state(&self) -> ResizeState {
        self.state
    }

    /// Install a callback observing every state transition
    pub fn set_transition_hook(&mut self, hook: TransitionHook) {
        self.on_transition = Some(hook);
    }

    fn transition(&mut self, next: ResizeState) {
        if next == self.state {
            return;
        }
        tracing::trace!(from = ?self.state, to = ?next, "resize state transition");
        let previous = std::mem::replace(&mut self.state, next);
        if let Some(hook) = &mut self.on_transition {
            hook(previous, next);
        }
    }

    /// Track pointer movement while no drag is active, entering or leaving
    /// the hovering state as the pointer nears a column boundary
    pub fn pointer_move(&mut self, state: &EditorState, view: &dyn ViewMetrics, x: f64, y: f64) {
        if matches!(self.state, ResizeState::Dragging { .. }) {
            return;
        }
        match self.locate_handle(state, view, x, y) {
            Some(handle) => self.transition(ResizeState::Hovering { handle }),
            None => self.transition(ResizeState::Idle),
        }
    }

    fn locate_handle(
        &self,
        state: &EditorState,
        view: &dyn ViewMetrics,
        x: f64,
        y: f64,
    ) -> Option<usize> {
        let pos = view.offset_at(x, y)?;
        let cell = cell_around(&state.resolve(pos))?;
        let (left, right) = view.cell_edges(cell.pos())?;
        if x - left <= self.options.handle_width {
            // the left boundary belongs to the previous column's cell
            let depth = cell.depth();
            let table = cell.node(depth - 1);
            let table_start = cell.start(depth - 1);
            let map = TableMap::get(table);
            let rel = cell.pos() - table_start;
            let index = map.map.iter().position(|&p| p == rel)?;
            if index % map.width == 0 {
                None
            } else {
                Some(table_start + map.map[index - 1])
            }
        } else if right - x <= self.options.handle_width {
            Some(cell.pos())
        } else {
            None
        }
    }

    /// Pointer pressed. Begins a drag when a handle is hovered and returns
    /// whether one started; no drag ever starts from the idle state.
    pub fn pointer_down(&mut self, state: &EditorState, view: &dyn ViewMetrics, x: f64) -> bool {
        let ResizeState::Hovering { handle } = self.state else {
            return false;
        };
        let start_width = current_col_width(state, view, handle);
        self.first_drag_write = true;
        self.transition(ResizeState::Dragging {
            handle,
            start_x: x,
            start_width,
        });
        true
    }

    /// Pointer moved during a drag: writes the clamped width into every
    /// cell of the dragged column. The drag's first write stays a separate
    /// history entry; later writes carry the coalescing flag.
    pub fn drag_move(&mut self, state: &EditorState, x: f64, dispatch: Dispatch) {
        let ResizeState::Dragging {
            handle,
            start_x,
            start_width,
        } = self.state
        else {
            return;
        };
        let pos = state.resolve(handle);
        let Some(cell) = pos.node_after() else {
            return;
        };
        let colspan = cell.cell_attrs().map(|attrs| attrs.colspan).unwrap_or(1);
        let depth = pos.depth();
        let table = Arc::clone(pos.node(depth - 1));
        let table_start = pos.start(depth - 1);
        let map = TableMap::get(&table);
        let col = map.col_count(handle - table_start) + colspan - 1;
        let dragged = (start_width + (x - start_x)).max(self.options.cell_min_width);
        let mut tr = state.tr();
        update_column_width(
            &mut tr,
            &map,
            &table,
            table_start,
            col,
            dragged.round() as u32,
            !self.first_drag_write,
        );
        self.first_drag_write = false;
        if tr.doc_changed() {
            dispatch(tr);
        }
    }

    /// Pointer released anywhere ends a running drag
    pub fn pointer_up(&mut self) {
        if matches!(self.state, ResizeState::Dragging { .. }) {
            self.transition(ResizeState::Idle);
        }
    }

    /// Pointer left the table: clears a hover, never cancels a drag
    pub fn pointer_leave(&mut self) {
        if matches!(self.state, ResizeState::Hovering { .. }) {
            self.transition(ResizeState::Idle);
        }
    }
}

/// Width a drag on the given cell starts from: the last stored column
/// width if set, else the rendered width split evenly across the span
/// after subtracting columns with an explicit stored width
pub fn current_col_width(state: &EditorState, view: &dyn ViewMetrics, cell_pos: usize) -> f64 {
    let pos = state.resolve(cell_pos);
    let Some(cell) = pos.node_after() else {
        return 0.0;
    };
    let Some(attrs) = cell.cell_attrs() else {
        return 0.0;
    };
    if let Some(colwidth) = &attrs.colwidth {
        if let Some(&width) = colwidth.last() {
            if width > 0 {
                return f64::from(width);
            }
        }
    }
    let mut width = view.rendered_width(cell_pos);
    let mut parts = attrs.colspan as f64;
    if let Some(colwidth) = &attrs.colwidth {
        for slot in 0..attrs.colspan {
            let stored = colwidth.get(slot).copied().unwrap_or(0);
            if stored > 0 {
                width -= f64::from(stored);
                parts -= 1.0;
            }
        }
    }
    if parts <= 0.0 {
        0.0
    } else {
        width / parts
    }
}

/// Write `width` into the stored width slot of every cell in a column,
/// touching rowspanning cells once per row group and skipping cells whose
/// entry already matches
pub fn update_column_width(
    tr: &mut Transaction,
    map: &TableMap,
    table: &Node,
    table_start: usize,
    col: usize,
    width: u32,
    coalesce: bool,
) {
    for row in 0..map.height {
        let index = row * map.width + col;
        // rowspanning cell already handled in an earlier row
        if row > 0 && map.map[index] == map.map[index - map.width] {
            continue;
        }
        let pos = map.map[index];
        let cell = table_cell_at(table, pos);
        let attrs = cell.cell_attrs().cloned().unwrap_or_default();
        let slot = if attrs.colspan == 1 {
            0
        } else {
            col - map.col_count(pos)
        };
        if attrs.colwidth.as_ref().and_then(|cw| cw.get(slot)).copied() == Some(width) {
            continue;
        }
        let mut colwidth = attrs
            .colwidth
            .clone()
            .unwrap_or_else(|| vec![0; attrs.colspan]);
        colwidth[slot] = width;
        tr.set_node_attrs(
            table_start + pos,
            None,
            Attrs::Cell(attrs.with_colwidth(Some(colwidth))),
        );
    }
    if tr.doc_changed() {
        tr.set_meta(COALESCE_META, Value::Bool(coalesce));
    }
}
