//! The notebook rewrite pipeline.
//!
//! Cells are visited once, in order. Each cell goes through the stages
//! below, any of which may leave it untouched:
//!
//! 1. header simplification (first cell only)
//! 2. exercise-answer clearing (`teacher` tag)
//! 3. removal (`remove-input`, `remove-output`, `remove-cell`)
//! 4. `skip-execution` tag removal
//! 5. inline script dependencies → install lines
//! 6. commenting out lines that use the visualization package
//! 7. static asset links → raw-content URLs
//!
//! When a translated dependency cell pulls in the visualization package, a
//! note cell is inserted at the top of the notebook.

use sha2::{Digest, Sha256};
use tracing::debug;

use nbcolab_notebook::{Cell, Notebook};
use nbcolab_shared::{RewriteConfig, Result};

use crate::deps::{DependencySyntax, parse_dependencies};
use crate::links::AssetLinks;

/// Per-notebook counters, also used as the accumulator of the cell pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Cells in the input notebook.
    pub cells_in: usize,
    /// Cells in the output notebook, including an inserted note cell.
    pub cells_out: usize,
    /// Cells dropped by a removal tag.
    pub removed: usize,
    /// Exercise cells whose content was cleared.
    pub cleared: usize,
    /// Cells whose inline dependency list became install lines.
    pub dependency_cells: usize,
    /// Code cells with visualization-package lines commented out.
    pub neutralized: usize,
    /// Cells with at least one static asset link rewritten.
    pub links_rewritten: usize,
    /// A dependency cell installs the visualization package.
    pub uses_viz: bool,
}

/// Applies the rewrite pipeline to whole notebooks.
#[derive(Debug, Clone)]
pub struct Rewriter {
    config: RewriteConfig,
    syntax: DependencySyntax,
    links: AssetLinks,
}

impl Rewriter {
    /// Validate the rule set and compile its link patterns.
    pub fn new(config: RewriteConfig) -> Result<Self> {
        config.validate()?;
        let syntax = DependencySyntax::from(&config);
        let links = AssetLinks::new(&config.static_dir, &config.raw_base_url)?;
        Ok(Self {
            config,
            syntax,
            links,
        })
    }

    /// Rewrite `nb`. Pure: the result depends only on the input and the rules.
    pub fn rewrite(&self, mut nb: Notebook) -> (Notebook, RewriteReport) {
        let cells = std::mem::take(&mut nb.cells);
        let mut report = RewriteReport {
            cells_in: cells.len(),
            ..RewriteReport::default()
        };

        let mut out = Vec::with_capacity(cells.len() + 1);
        for (index, cell) in cells.into_iter().enumerate() {
            if let Some(cell) = self.rewrite_cell(index, cell, &mut report) {
                out.push(cell);
            }
        }

        if report.uses_viz {
            let mut note = Cell::new_code(self.viz_note());
            if nb.requires_cell_ids() {
                note.id = Some(unique_cell_id(&note.source, &out));
            }
            out.insert(0, note);
        }

        report.cells_out = out.len();
        nb.cells = out;
        (nb, report)
    }

    /// Run every stage on one cell. `None` means the cell is dropped.
    fn rewrite_cell(&self, index: usize, cell: Cell, report: &mut RewriteReport) -> Option<Cell> {
        let cell = if index == 0 {
            self.simplify_header(cell)
        } else {
            cell
        };

        let (cell, cleared) = self.clear_exercise(cell);

        if cell.tags().contains_any(&self.config.remove_tags) {
            debug!(index, kind = %cell.kind, "dropping cell with removal tag");
            report.removed += 1;
            return None;
        }
        if cleared {
            report.cleared += 1;
        }

        let mut cell = self.strip_skip_execution(cell);

        if cell.is_code() && cell.source.contains(&self.config.script_marker) {
            if let Some((source, uses_viz)) = self.translate_dependencies(&cell.source) {
                debug!(index, uses_viz, "translated inline dependencies");
                cell.source = source;
                report.dependency_cells += 1;
                report.uses_viz |= uses_viz;
            }
        }

        if cell.is_code() && cell.source.contains(&self.config.viz_package) {
            cell.source = comment_out_lines(&cell.source, &self.config.viz_package);
            report.neutralized += 1;
        }

        if cell.is_markdown() || cell.is_code() {
            if let Some(source) = self.links.rewrite_source(&cell.source) {
                cell.source = source;
                report.links_rewritten += 1;
            }
        }

        Some(cell)
    }

    /// Keep only the title of a first cell that carries the button row.
    fn simplify_header(&self, mut cell: Cell) -> Cell {
        if !cell.is_markdown() || !cell.source.contains(&self.config.header_marker) {
            return cell;
        }
        let title = cell.source.trim().lines().next().unwrap_or_default();
        if title.starts_with("# ") {
            cell.source = title.to_string();
        }
        cell
    }

    /// Blank out an exercise answer, keeping the cell as a placeholder.
    fn clear_exercise(&self, cell: Cell) -> (Cell, bool) {
        let tags = cell.tags();
        if !tags.contains(&self.config.teacher_tag) {
            return (cell, false);
        }

        let mut cell = cell.with_tags(tags.without(&self.config.teacher_tag));
        cell.source.clear();
        if cell.is_code() {
            cell.outputs.clear();
            cell.execution_count = None;
        }
        (cell, true)
    }

    fn strip_skip_execution(&self, cell: Cell) -> Cell {
        let tags = cell.tags();
        if tags.contains(&self.config.skip_execution_tag) {
            cell.with_tags(tags.without(&self.config.skip_execution_tag))
        } else {
            cell
        }
    }

    /// Install lines for an inline dependency list, and whether they pull in
    /// the visualization package. `None` when the list declares nothing.
    fn translate_dependencies(&self, source: &str) -> Option<(String, bool)> {
        let directives = parse_dependencies(source, &self.syntax);
        if directives.is_empty() {
            return None;
        }

        let install = &self.config.install_command;
        let mut lines: Vec<String> = directives.iter().map(|d| d.render(install)).collect();

        let uses_viz = lines.iter().any(|l| l.contains(&self.config.viz_package));
        let has_plot = lines.iter().any(|l| l.contains(&self.config.plot_package));
        if uses_viz && !has_plot {
            lines.push(format!("{install} {}", self.config.plot_package));
        }

        Some((lines.join("\n"), uses_viz))
    }

    fn viz_note(&self) -> String {
        let viz = &self.config.viz_package;
        let plot = &self.config.plot_package;
        format!(
            "# NOTE: The `{viz}` package is not yet supported in Colab. Most of the `{viz}` lines are commented out.\n\
             # The `{plot}` package can be used instead (already included in the pip list)."
        )
    }
}

/// Prefix every line mentioning `needle` with `# `.
fn comment_out_lines(source: &str, needle: &str) -> String {
    source
        .lines()
        .map(|line| {
            if line.contains(needle) {
                format!("# {line}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Deterministic cell id derived from the cell source, unique among `cells`.
fn unique_cell_id(source: &str, cells: &[Cell]) -> String {
    let digest = Sha256::digest(source.as_bytes());
    let base: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();

    let taken = |id: &str| cells.iter().any(|c| c.id.as_deref() == Some(id));
    let mut candidate = base.clone();
    let mut n = 1;
    while taken(&candidate) {
        candidate = format!("{base}-{n}");
        n += 1;
    }
    candidate
}
