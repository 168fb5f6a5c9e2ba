//! Table Grid Engine - grid model, cell selections, and structural edits
//!
//! Builds a dense `width × height` index over tables whose cells may span
//! rows and columns, and provides the editing commands (line insertion and
//! removal, merging and splitting, header toggling, selection resolution,
//! column resizing) that keep a document's tables grid-consistent. The
//! document itself lives in the `doc_model` crate; commands only read
//! state and emit transactions for the caller to apply.

mod cellselection;
mod columnresizing;
mod commands;
mod fixtables;
mod tablemap;
mod util;

pub use cellselection::*;
pub use columnresizing::*;
pub use commands::*;
pub use fixtables::*;
pub use tablemap::*;
pub use util::*;

#[cfg(test)]
pub(crate) mod fixtures;
