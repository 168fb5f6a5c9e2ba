//! Document Model - Immutable tree structure, offsets, and transactions
//!
//! This crate provides the document tree the table engine operates on:
//! persistent `Arc`-shared nodes, flattened integer offsets with resolved
//! positions, and a transaction/step/mapping mechanism for structural edits.

mod attrs;
mod error;
mod node;
mod position;
mod selection;
mod state;
mod transform;

pub use attrs::*;
pub use error::*;
pub use node::*;
pub use position::*;
pub use selection::*;
pub use state::*;
pub use transform::*;
