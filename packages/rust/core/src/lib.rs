//! Notebook-to-Colab conversion for nbcolab.
//!
//! This crate ties the rewrite pipeline to the filesystem: single notebooks
//! via [`convert::Converter`] and whole directories via [`batch::convert_dir`].

pub mod batch;
pub mod convert;
pub mod deps;
pub mod links;
pub mod rewriter;

pub use batch::{BatchReport, ProgressReporter, SilentProgress, convert_dir, find_notebooks};
pub use convert::{ConvertOutcome, Converter};
pub use rewriter::{RewriteReport, Rewriter};
