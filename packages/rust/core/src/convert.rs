//! Single-notebook conversion: read, rewrite, write.

use std::path::Path;

use tracing::{info, instrument};

use nbcolab_notebook::{read_notebook, write_notebook};
use nbcolab_shared::{AppConfig, RewriteConfig, Result};

use crate::rewriter::{RewriteReport, Rewriter};

/// What happened to one input notebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertOutcome {
    /// The file name is on the exclusion list; nothing was written.
    Skipped,
    /// The notebook was rewritten and written to the destination.
    Converted(RewriteReport),
}

/// A [`Rewriter`] plus the list of notebooks it must never touch.
#[derive(Debug, Clone)]
pub struct Converter {
    rewriter: Rewriter,
    exclude: Vec<String>,
}

impl Converter {
    pub fn new(rewriter: Rewriter, exclude: Vec<String>) -> Self {
        Self { rewriter, exclude }
    }

    /// Build a converter from the loaded application config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let rewriter = Rewriter::new(RewriteConfig::from(config))?;
        Ok(Self::new(rewriter, config.notebook.exclude.clone()))
    }

    /// Whether `path`'s file name is on the exclusion list (exact match).
    pub fn is_excluded(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.exclude.iter().any(|e| e == name))
    }

    /// Convert `src` into `dest`.
    ///
    /// Excluded inputs leave `dest` untouched. Any read or parse failure
    /// aborts before `dest` is written.
    #[instrument(skip_all, fields(src = %src.display(), dest = %dest.display()))]
    pub fn convert_file(&self, src: &Path, dest: &Path) -> Result<ConvertOutcome> {
        if self.is_excluded(src) {
            let name = src.file_name().unwrap_or_default().to_string_lossy();
            info!("Skipping excluded file: {name}");
            return Ok(ConvertOutcome::Skipped);
        }

        let nb = read_notebook(src)?;
        let (nb, report) = self.rewriter.rewrite(nb);
        write_notebook(&nb, dest)?;

        info!(
            cells_in = report.cells_in,
            cells_out = report.cells_out,
            removed = report.removed,
            cleared = report.cleared,
            uses_viz = report.uses_viz,
            "converted notebook"
        );
        Ok(ConvertOutcome::Converted(report))
    }
}
