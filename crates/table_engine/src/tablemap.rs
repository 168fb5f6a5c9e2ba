//! Table grid model
//!
//! Builds a dense `width × height` index over a table node: every grid
//! slot records the table-relative offset of the cell occupying it, with
//! spanning cells repeating their offset across their whole footprint.
//! Layout defects found while building are recorded as problems instead of
//! raised, so a later repair pass can fix the table up.
//!
//! Maps are cached per table-node identity. Since every edit produces new
//! immutable nodes, a superseded table simply never hits the cache again;
//! no invalidation signal is needed beyond reference inequality.

use doc_model::{Node, TableRole};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

/// Half-open rectangle in grid coordinates (`right`/`bottom` exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
}

impl Rect {
    pub fn new(left: usize, top: usize, right: usize, bottom: usize) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> usize {
        self.right - self.left
    }

    pub fn height(&self) -> usize {
        self.bottom - self.top
    }
}

/// Navigation axis for [`TableMap::next_cell`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    /// Move to the adjacent cell within the same row
    Row,
    /// Move to the adjacent cell within the same column
    Column,
}

/// Layout defect detected while building a grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Problem {
    /// A cell's footprint overlaps a slot already taken by another cell;
    /// `n` counts the overlapped columns
    Collision { row: usize, pos: usize, n: usize },
    /// A row covers `n` fewer columns than the table is wide
    Missing { row: usize, n: usize },
    /// A rowspan runs `n` rows past the last table row
    OverlongRowspan { pos: usize, n: usize },
    /// A cell's stored column widths disagree with the widths claimed by
    /// other cells in the same columns
    ColwidthMismatch { pos: usize, colwidth: Vec<u32> },
}

/// Dense grid index over one table node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMap {
    /// Number of grid columns
    pub width: usize,
    /// Number of grid rows
    pub height: usize,
    /// `map[row * width + col]` holds the table-relative offset of the
    /// cell covering that slot; `0` only appears for slots a malformed
    /// table leaves uncovered (cell offsets are always positive)
    pub map: Vec<usize>,
    /// Defects found during construction, empty for well-formed tables
    pub problems: Vec<Problem>,
}

thread_local! {
    static MAP_CACHE: RefCell<HashMap<usize, (Weak<Node>, Arc<TableMap>)>> =
        RefCell::new(HashMap::new());
}

impl TableMap {
    /// Grid for the given table node, cached per node identity
    pub fn get(table: &Arc<Node>) -> Arc<TableMap> {
        let key = Arc::as_ptr(table) as usize;
        MAP_CACHE.with(|cache| {
            let mut cache = cache.borrow_mut();
            if let Some((weak, map)) = cache.get(&key) {
                if let Some(live) = weak.upgrade() {
                    if Arc::ptr_eq(&live, table) {
                        return Arc::clone(map);
                    }
                }
            }
            let map = Arc::new(TableMap::compute(table));
            tracing::trace!(
                width = map.width,
                height = map.height,
                problems = map.problems.len(),
                "computed table map"
            );
            if cache.len() > 64 {
                cache.retain(|_, (weak, _)| weak.upgrade().is_some());
            }
            cache.insert(key, (Arc::downgrade(table), Arc::clone(&map)));
            map
        })
    }

    /// Build the grid for a table node
    pub fn compute(table: &Node) -> TableMap {
        assert_eq!(
            table.kind.table_role(),
            Some(TableRole::Table),
            "not a table node"
        );
        let height = table.child_count();
        let mut grid: Vec<Vec<Option<usize>>> = vec![Vec::new(); height];
        let mut problems = Vec::new();
        let mut pos = 0usize;
        for row in 0..height {
            let row_node = table.child(row);
            pos += 1;
            for cell in &row_node.children {
                let (colspan, rowspan) = match cell.cell_attrs() {
                    Some(attrs) => (attrs.colspan.max(1), attrs.rowspan.max(1)),
                    None => (1, 1),
                };
                // advance past columns still covered by earlier rowspans
                let mut col = 0;
                while grid[row].get(col).map_or(false, |slot| slot.is_some()) {
                    col += 1;
                }
                for h in 0..rowspan {
                    if row + h >= height {
                        problems.push(Problem::OverlongRowspan { pos, n: rowspan - h });
                        break;
                    }
                    let slots = &mut grid[row + h];
                    for w in 0..colspan {
                        let c = col + w;
                        if slots.len() <= c {
                            slots.resize(c + 1, None);
                        }
                        if slots[c].is_none() {
                            slots[c] = Some(pos);
                        } else {
                            problems.push(Problem::Collision {
                                row: row + h,
                                pos,
                                n: colspan - w,
                            });
                            break;
                        }
                    }
                }
                pos += cell.size();
            }
            pos += 1;
        }

        let width = grid.iter().map(|row| row.len()).max().unwrap_or(0);
        let mut map = vec![0usize; width * height];
        for row in 0..height {
            let mut missing = 0;
            for col in 0..width {
                match grid[row].get(col).copied().flatten() {
                    Some(cell_pos) => map[row * width + col] = cell_pos,
                    None => missing += 1,
                }
            }
            if missing > 0 {
                problems.push(Problem::Missing { row, n: missing });
            }
        }

        let mut result = TableMap {
            width,
            height,
            map,
            problems,
        };
        result.check_col_widths(table);
        result
    }

    /// Footprint of the cell whose offset is `pos`. Panics for offsets no
    /// cell starts at; those only arise from programming errors.
    pub fn find_cell(&self, pos: usize) -> Rect {
        for (index, &cur) in self.map.iter().enumerate() {
            if cur != pos {
                continue;
            }
            let left = index % self.width;
            let top = index / self.width;
            let mut right = left + 1;
            let mut bottom = top + 1;
            while right < self.width && self.map[index + (right - left)] == cur {
                right += 1;
            }
            while bottom < self.height && self.map[index + self.width * (bottom - top)] == cur {
                bottom += 1;
            }
            return Rect::new(left, top, right, bottom);
        }
        panic!("no cell with offset {pos} in table map");
    }

    /// Number of full columns before the cell whose offset is `pos`
    pub fn col_count(&self, pos: usize) -> usize {
        for (index, &cur) in self.map.iter().enumerate() {
            if cur == pos {
                return index % self.width;
            }
        }
        panic!("no cell with offset {pos} in table map");
    }

    /// Offset of the grid neighbor beyond the footprint of the cell at
    /// `pos`, or `None` at the table boundary
    pub fn next_cell(&self, pos: usize, axis: Axis, dir: i32) -> Option<usize> {
        let rect = self.find_cell(pos);
        match axis {
            Axis::Row => {
                if dir < 0 {
                    if rect.left == 0 {
                        return None;
                    }
                    Some(self.map[rect.top * self.width + rect.left - 1])
                } else {
                    if rect.right == self.width {
                        return None;
                    }
                    Some(self.map[rect.top * self.width + rect.right])
                }
            }
            Axis::Column => {
                if dir < 0 {
                    if rect.top == 0 {
                        return None;
                    }
                    Some(self.map[(rect.top - 1) * self.width + rect.left])
                } else {
                    if rect.bottom == self.height {
                        return None;
                    }
                    Some(self.map[rect.bottom * self.width + rect.left])
                }
            }
        }
    }

    /// Smallest solid rectangle covering both cells: the bounding box of
    /// the two footprints, grown until no cell's footprint straddles the
    /// boundary
    pub fn rect_between(&self, a: usize, b: usize) -> Rect {
        let rect_a = self.find_cell(a);
        let rect_b = self.find_cell(b);
        let mut rect = Rect::new(
            rect_a.left.min(rect_b.left),
            rect_a.top.min(rect_b.top),
            rect_a.right.max(rect_b.right),
            rect_a.bottom.max(rect_b.bottom),
        );
        loop {
            let mut grown = false;
            let mut seen = HashSet::new();
            for row in rect.top..rect.bottom {
                for col in rect.left..rect.right {
                    let pos = self.map[row * self.width + col];
                    if !seen.insert(pos) {
                        continue;
                    }
                    let cell = self.find_cell(pos);
                    if cell.left < rect.left {
                        rect.left = cell.left;
                        grown = true;
                    }
                    if cell.top < rect.top {
                        rect.top = cell.top;
                        grown = true;
                    }
                    if cell.right > rect.right {
                        rect.right = cell.right;
                        grown = true;
                    }
                    if cell.bottom > rect.bottom {
                        rect.bottom = cell.bottom;
                        grown = true;
                    }
                }
            }
            if !grown {
                return rect;
            }
        }
    }

    /// Offsets of all distinct cells whose footprint intersects the
    /// rectangle, in row-major first-occurrence order
    pub fn cells_in_rect(&self, rect: &Rect) -> Vec<usize> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for row in rect.top..rect.bottom {
            for col in rect.left..rect.right {
                let pos = self.map[row * self.width + col];
                if seen.insert(pos) {
                    result.push(pos);
                }
            }
        }
        result
    }

    /// Check whether any cell's footprint straddles the rectangle's
    /// boundary (partially inside, partially outside)
    pub fn cells_overlap_rect(&self, rect: &Rect) -> bool {
        if rect.left >= rect.right || rect.top >= rect.bottom {
            return false;
        }
        let width = self.width;
        let mut index_top = rect.top * width + rect.left;
        let mut index_left = index_top;
        let mut index_bottom = (rect.bottom - 1) * width + rect.left;
        let mut index_right = index_top + (rect.right - rect.left - 1);
        for _ in rect.top..rect.bottom {
            if (rect.left > 0 && self.map[index_left] == self.map[index_left - 1])
                || (rect.right < width && self.map[index_right] == self.map[index_right + 1])
            {
                return true;
            }
            index_left += width;
            index_right += width;
        }
        for _ in rect.left..rect.right {
            if (rect.top > 0 && self.map[index_top] == self.map[index_top - width])
                || (rect.bottom < self.height
                    && self.map[index_bottom] == self.map[index_bottom + width])
            {
                return true;
            }
            index_top += 1;
            index_bottom += 1;
        }
        false
    }

    /// Table-relative offset at which a new cell for grid coordinate
    /// `(row, col)` would be inserted: the offset of the first cell of that
    /// row at or after the column, or the end of the row's content
    pub fn position_at(&self, row: usize, col: usize, table: &Node) -> usize {
        assert!(row < self.height, "row {row} outside the table");
        let mut row_start = 0usize;
        for i in 0..self.height {
            let row_end = row_start + table.child(i).size();
            if i == row {
                let mut index = row * self.width + col;
                let row_end_index = (row + 1) * self.width;
                // skip cells that started in an earlier row
                while index < row_end_index && self.map[index] < row_start {
                    index += 1;
                }
                return if index == row_end_index {
                    row_end - 1
                } else {
                    self.map[index]
                };
            }
            row_start = row_end;
        }
        unreachable!()
    }

    /// Detect cells whose stored column widths disagree with the widths
    /// other cells claim for the same columns
    fn check_col_widths(&mut self, table: &Node) {
        if self.width == 0 {
            return;
        }
        let mut claimed: Vec<Option<u32>> = vec![None; self.width];
        let mut conflict = false;
        let mut seen = HashSet::new();
        for (index, &pos) in self.map.iter().enumerate() {
            if pos == 0 || !seen.insert(pos) {
                continue;
            }
            let Some(attrs) = table.node_at(pos).and_then(|cell| cell.cell_attrs()) else {
                continue;
            };
            let Some(colwidth) = &attrs.colwidth else {
                continue;
            };
            let left = index % self.width;
            for (offset, &w) in colwidth.iter().take(attrs.colspan).enumerate() {
                let col = left + offset;
                if w == 0 || col >= self.width {
                    continue;
                }
                match claimed[col] {
                    None => claimed[col] = Some(w),
                    Some(prev) if prev != w => conflict = true,
                    _ => {}
                }
            }
        }
        if !conflict {
            return;
        }
        let mut seen = HashSet::new();
        for (index, &pos) in self.map.iter().enumerate() {
            if pos == 0 || !seen.insert(pos) {
                continue;
            }
            let Some(attrs) = table.node_at(pos).and_then(|cell| cell.cell_attrs()) else {
                continue;
            };
            let left = index % self.width;
            let mut updated: Option<Vec<u32>> = None;
            for offset in 0..attrs.colspan {
                let col = left + offset;
                if col >= self.width {
                    break;
                }
                let Some(expected) = claimed[col] else { continue };
                let current = attrs
                    .colwidth
                    .as_ref()
                    .and_then(|cw| cw.get(offset).copied())
                    .unwrap_or(0);
                if current != expected {
                    let slot = updated.get_or_insert_with(|| {
                        attrs
                            .colwidth
                            .clone()
                            .unwrap_or_else(|| vec![0; attrs.colspan])
                    });
                    slot[offset] = expected;
                }
            }
            if let Some(colwidth) = updated {
                self.problems.push(Problem::ColwidthMismatch { pos, colwidth });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{empty_cell, spanning_cell, uniform_table};
    use doc_model::CellAttrs;
    use proptest::prelude::*;

    #[test]
    fn test_uniform_grid_layout() {
        let table = uniform_table(3, 3);
        let map = TableMap::compute(&table);
        assert_eq!((map.width, map.height), (3, 3));
        assert_eq!(map.map, vec![1, 5, 9, 15, 19, 23, 29, 33, 37]);
        assert!(map.problems.is_empty());
    }

    #[test]
    fn test_spanning_cell_repeats_offset() {
        // [ A A ][ B ]
        // [ A A ][ C ]
        let table = Node::table(vec![
            Node::row(vec![spanning_cell("a", 2, 2), empty_cell()]),
            Node::row(vec![empty_cell()]),
        ]);
        let map = TableMap::compute(&table);
        assert_eq!((map.width, map.height), (3, 2));
        let a = map.map[0];
        assert_eq!(map.map[1], a);
        assert_eq!(map.map[3], a);
        assert_eq!(map.map[4], a);
        assert_ne!(map.map[2], a);
        assert!(map.problems.is_empty());
        assert_eq!(map.find_cell(a), Rect::new(0, 0, 2, 2));
    }

    #[test]
    fn test_col_count_and_next_cell() {
        let table = uniform_table(2, 3);
        let map = TableMap::compute(&table);
        let first = map.map[0];
        let second = map.map[1];
        assert_eq!(map.col_count(first), 0);
        assert_eq!(map.col_count(second), 1);
        assert_eq!(map.next_cell(first, Axis::Row, 1), Some(second));
        assert_eq!(map.next_cell(first, Axis::Row, -1), None);
        assert_eq!(map.next_cell(first, Axis::Column, 1), Some(map.map[3]));
        assert_eq!(map.next_cell(map.map[5], Axis::Column, 1), None);
    }

    #[test]
    fn test_next_cell_skips_merged_footprint() {
        let table = Node::table(vec![
            Node::row(vec![spanning_cell("a", 2, 1), empty_cell()]),
            Node::row(vec![empty_cell(), empty_cell(), empty_cell()]),
        ]);
        let map = TableMap::compute(&table);
        let a = map.map[0];
        // moving right from the spanning cell lands beyond its footprint
        assert_eq!(map.next_cell(a, Axis::Row, 1), Some(map.map[2]));
    }

    #[test]
    fn test_rect_between_covers_footprints() {
        // a head inside a rowspanning cell pulls in the cell's whole footprint
        let table = Node::table(vec![
            Node::row(vec![empty_cell(), spanning_cell("b", 1, 2)]),
            Node::row(vec![empty_cell()]),
        ]);
        let map = TableMap::compute(&table);
        let a = map.map[0];
        let b = map.map[1];
        assert_eq!(map.rect_between(a, b), Rect::new(0, 0, 2, 2));
        // degenerate case
        assert_eq!(map.rect_between(a, a), Rect::new(0, 0, 1, 1));
    }

    #[test]
    fn test_rect_between_grows_iteratively() {
        // [ A ][ B ]
        // [ C ][ D ]
        // [ C ][ E ]
        // [ F ][ E ]
        let table = Node::table(vec![
            Node::row(vec![empty_cell(), empty_cell()]),
            Node::row(vec![spanning_cell("c", 1, 2), empty_cell()]),
            Node::row(vec![spanning_cell("e", 1, 2)]),
            Node::row(vec![empty_cell()]),
        ]);
        let map = TableMap::compute(&table);
        assert!(map.problems.is_empty());
        let b = map.map[1];
        let c = map.map[2];
        // bounding box of B and C straddles E, and growing past E pulls in
        // the last row as well
        let rect = map.rect_between(b, c);
        assert_eq!(rect, Rect::new(0, 0, 2, 4));
        assert!(!map.cells_overlap_rect(&rect));
        assert!(map.cells_overlap_rect(&Rect::new(0, 0, 2, 3)));
    }

    #[test]
    fn test_rect_between_is_idempotent() {
        let table = Node::table(vec![
            Node::row(vec![empty_cell(), spanning_cell("b", 1, 2)]),
            Node::row(vec![empty_cell()]),
            Node::row(vec![empty_cell(), empty_cell()]),
        ]);
        let map = TableMap::compute(&table);
        let a = map.map[0];
        let b = map.map[1];
        let rect = map.rect_between(a, b);
        let corner_a = map.map[rect.top * map.width + rect.left];
        let corner_b = map.map[(rect.bottom - 1) * map.width + rect.right - 1];
        assert_eq!(map.rect_between(corner_a, corner_b), rect);
    }

    #[test]
    fn test_cells_in_rect_deduplicates() {
        let table = Node::table(vec![
            Node::row(vec![spanning_cell("a", 2, 2), empty_cell()]),
            Node::row(vec![empty_cell()]),
        ]);
        let map = TableMap::compute(&table);
        let cells = map.cells_in_rect(&Rect::new(0, 0, 2, 2));
        assert_eq!(cells, vec![map.map[0]]);
        let all = map.cells_in_rect(&Rect::new(0, 0, 3, 2));
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_position_at() {
        let table = uniform_table(2, 2);
        let map = TableMap::compute(&table);
        // occupied coordinate: the occupying cell's own offset
        assert_eq!(map.position_at(0, 0, &table), map.map[0]);
        assert_eq!(map.position_at(1, 1, &table), map.map[3]);
        // past the end of a row: just before the row's closing token
        assert_eq!(map.position_at(0, 2, &table), 9);
    }

    #[test]
    fn test_position_at_skips_rowspanning_cells() {
        // [ A ][ B ]
        // [ A ][ C ]
        let table = Node::table(vec![
            Node::row(vec![spanning_cell("a", 1, 2), empty_cell()]),
            Node::row(vec![empty_cell()]),
        ]);
        let map = TableMap::compute(&table);
        let c = map.map[3];
        // inserting at (1, 0) goes before C, not into A
        assert_eq!(map.position_at(1, 0, &table), c);
    }

    #[test]
    fn test_problems_on_malformed_tables() {
        // short second row
        let table = Node::table(vec![
            Node::row(vec![empty_cell(), empty_cell()]),
            Node::row(vec![empty_cell()]),
        ]);
        let map = TableMap::compute(&table);
        assert_eq!(map.problems, vec![Problem::Missing { row: 1, n: 1 }]);

        // rowspan running past the table
        let table = Node::table(vec![Node::row(vec![spanning_cell("a", 1, 2)])]);
        let map = TableMap::compute(&table);
        assert!(matches!(
            map.problems[..],
            [Problem::OverlongRowspan { n: 1, .. }]
        ));

        // colspan colliding with a pending rowspan
        let table = Node::table(vec![
            Node::row(vec![empty_cell(), spanning_cell("b", 1, 2)]),
            Node::row(vec![spanning_cell("c", 2, 1)]),
        ]);
        let map = TableMap::compute(&table);
        assert!(map
            .problems
            .iter()
            .any(|p| matches!(p, Problem::Collision { row: 1, n: 1, .. })));
    }

    #[test]
    fn test_colwidth_mismatch_detection() {
        let wide = |w| {
            Node::cell(
                CellAttrs::new().with_colwidth(Some(vec![w])),
                vec![Node::paragraph(Vec::new())],
            )
        };
        let table = Node::table(vec![
            Node::row(vec![wide(100), empty_cell()]),
            Node::row(vec![wide(150), empty_cell()]),
        ]);
        let map = TableMap::compute(&table);
        assert!(map
            .problems
            .iter()
            .any(|p| matches!(p, Problem::ColwidthMismatch { .. })));
    }

    #[test]
    fn test_cache_hits_on_same_node() {
        let table = uniform_table(2, 2);
        let first = TableMap::get(&table);
        let second = TableMap::get(&table);
        assert!(Arc::ptr_eq(&first, &second));
        // a structurally equal but distinct node gets its own map
        let other = uniform_table(2, 2);
        let third = TableMap::get(&other);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*first, *third);
    }

    fn footprint_area_sum(table: &Node) -> usize {
        let mut sum = 0;
        for row in &table.children {
            for cell in &row.children {
                let attrs = cell.cell_attrs().expect("cell attrs");
                sum += attrs.colspan * attrs.rowspan;
            }
        }
        sum
    }

    #[test]
    fn test_area_invariant_with_spans() {
        let table = Node::table(vec![
            Node::row(vec![spanning_cell("a", 2, 2), empty_cell()]),
            Node::row(vec![empty_cell()]),
            Node::row(vec![empty_cell(), empty_cell(), empty_cell()]),
        ]);
        let map = TableMap::compute(&table);
        assert!(map.problems.is_empty());
        assert_eq!(map.width * map.height, footprint_area_sum(&table));
        // every footprint's area matches the cell's spans
        for &pos in map.cells_in_rect(&Rect::new(0, 0, map.width, map.height)).iter() {
            let rect = map.find_cell(pos);
            let attrs = table.node_at(pos).and_then(|c| c.cell_attrs()).unwrap();
            assert_eq!(rect.width() * rect.height(), attrs.colspan * attrs.rowspan);
        }
    }

    proptest! {
        #[test]
        fn area_invariant_holds_for_uniform_tables(rows in 1usize..6, cols in 1usize..6) {
            let table = uniform_table(rows, cols);
            let map = TableMap::compute(&table);
            prop_assert!(map.problems.is_empty());
            prop_assert_eq!(map.width * map.height, footprint_area_sum(&table));
        }

        #[test]
        fn rect_between_never_straddles(rows in 2usize..5, cols in 2usize..5, r1 in 0usize..4, c1 in 0usize..4, r2 in 0usize..4, c2 in 0usize..4) {
            let table = uniform_table(rows, cols);
            let map = TableMap::compute(&table);
            let a = map.map[(r1 % rows) * cols + (c1 % cols)];
            let b = map.map[(r2 % rows) * cols + (c2 % cols)];
            let rect = map.rect_between(a, b);
            prop_assert!(!map.cells_overlap_rect(&rect));
        }
    }
}
