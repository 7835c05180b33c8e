//! Jupyter notebook (nbformat 4) document model, reading, and writing.
//!
//! Only the parts of the format the rewriter touches are typed: cell kind,
//! source text, tags, outputs, and execution count. Everything else is
//! carried as raw JSON so a read/write cycle preserves it.

mod io;
mod model;

pub use io::{parse_notebook, read_notebook, to_json_string, write_notebook};
pub use model::{Cell, CellKind, Notebook, Tags};
