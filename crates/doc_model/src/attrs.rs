//! Node attributes and cell span manipulation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attributes attached to a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Attrs {
    #[default]
    None,
    Cell(CellAttrs),
}

impl Attrs {
    /// Cell attributes, when present
    pub fn cell(&self) -> Option<&CellAttrs> {
        match self {
            Attrs::Cell(attrs) => Some(attrs),
            Attrs::None => None,
        }
    }
}

/// Attributes of a table cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellAttrs {
    /// Number of grid columns the cell spans
    pub colspan: usize,
    /// Number of grid rows the cell spans
    pub rowspan: usize,
    /// Stored pixel width per spanned column, `0` meaning unset
    pub colwidth: Option<Vec<u32>>,
    /// Opaque extra attributes (background and the like), never interpreted
    /// by the grid model
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl Default for CellAttrs {
    fn default() -> Self {
        Self {
            colspan: 1,
            rowspan: 1,
            colwidth: None,
            extra: BTreeMap::new(),
        }
    }
}

impl CellAttrs {
    /// Create default cell attributes
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the colspan
    pub fn with_colspan(mut self, colspan: usize) -> Self {
        self.colspan = colspan.max(1);
        self
    }

    /// Set the rowspan
    pub fn with_rowspan(mut self, rowspan: usize) -> Self {
        self.rowspan = rowspan.max(1);
        self
    }

    /// Set the stored column widths
    pub fn with_colwidth(mut self, colwidth: Option<Vec<u32>>) -> Self {
        self.colwidth = colwidth;
        self
    }

    /// Set an extra attribute; a `Null` value removes the entry
    pub fn with_extra(mut self, name: &str, value: Value) -> Self {
        if value.is_null() {
            self.extra.remove(name);
        } else {
            self.extra.insert(name.to_string(), value);
        }
        self
    }

    /// Look up an extra attribute
    pub fn extra(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// Grow the colspan by `n` columns at span-relative column `pos`,
    /// keeping the stored widths aligned
    pub fn add_colspan(&self, pos: usize, n: usize) -> CellAttrs {
        let mut result = self.clone();
        result.colspan += n;
        if let Some(colwidth) = &mut result.colwidth {
            let at = pos.min(colwidth.len());
            for _ in 0..n {
                colwidth.insert(at, 0);
            }
        }
        result
    }

    /// Shrink the colspan by `n` columns at span-relative column `pos`,
    /// dropping the stored widths entirely when no set entry remains
    pub fn remove_colspan(&self, pos: usize, n: usize) -> CellAttrs {
        assert!(n < self.colspan, "cannot remove every column of a span");
        let mut result = self.clone();
        result.colspan -= n;
        if let Some(colwidth) = &mut result.colwidth {
            let start = pos.min(colwidth.len());
            let end = (pos + n).min(colwidth.len());
            colwidth.drain(start..end);
            if !colwidth.iter().any(|&w| w > 0) {
                result.colwidth = None;
            }
        }
        result
    }
}
