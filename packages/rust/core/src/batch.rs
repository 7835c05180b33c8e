//! Converting every notebook under a directory.
//!
//! Notebooks share no state, so one failure is recorded and the walk goes on.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};
use walkdir::WalkDir;

use nbcolab_shared::{NbColabError, Result};

use crate::convert::{ConvertOutcome, Converter};

/// Progress callback for reporting batch status.
pub trait ProgressReporter {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each notebook, whatever its outcome.
    fn notebook_done(&self, path: &Path, current: usize, total: usize);
    /// Called when the batch completes.
    fn done(&self, report: &BatchReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn notebook_done(&self, _path: &Path, _current: usize, _total: usize) {}
    fn done(&self, _report: &BatchReport) {}
}

/// Result of a directory conversion.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Destination paths that were written.
    pub converted: Vec<PathBuf>,
    /// Sources skipped by the exclusion list.
    pub skipped: Vec<PathBuf>,
    /// Sources that failed, with the error message.
    pub failed: Vec<(PathBuf, String)>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Every `.ipynb` file under `root`, sorted, skipping hidden directories
/// such as `.ipynb_checkpoints`.
pub fn find_notebooks(root: &Path) -> Result<Vec<PathBuf>> {
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

    let mut notebooks = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            NbColabError::io(path, e.into())
        })?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "ipynb") {
            notebooks.push(entry.into_path());
        }
    }
    Ok(notebooks)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

/// Convert all notebooks under `src_dir` into the same layout under `out_dir`.
#[instrument(skip_all, fields(src = %src_dir.display(), out = %out_dir.display()))]
pub fn convert_dir(
    src_dir: &Path,
    out_dir: &Path,
    converter: &Converter,
    progress: &dyn ProgressReporter,
) -> Result<BatchReport> {
    let start = Instant::now();

    if !src_dir.is_dir() {
        return Err(NbColabError::io(
            src_dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    progress.phase("Scanning notebooks");
    let notebooks = find_notebooks(src_dir)?;
    let total = notebooks.len();
    info!(total, "found notebooks");

    progress.phase("Converting");
    let mut report = BatchReport::default();

    for (i, src) in notebooks.into_iter().enumerate() {
        let rel = src.strip_prefix(src_dir).unwrap_or(&src);
        let dest = out_dir.join(rel);

        match convert_one(converter, &src, &dest) {
            Ok(ConvertOutcome::Converted(_)) => report.converted.push(dest),
            Ok(ConvertOutcome::Skipped) => report.skipped.push(src.clone()),
            Err(e) => {
                warn!(path = %src.display(), error = %e, "conversion failed");
                report.failed.push((src.clone(), e.to_string()));
            }
        }
        progress.notebook_done(&src, i + 1, total);
    }

    report.elapsed = start.elapsed();
    info!(
        converted = report.converted.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "batch complete"
    );
    progress.done(&report);

    Ok(report)
}

fn convert_one(converter: &Converter, src: &Path, dest: &Path) -> Result<ConvertOutcome> {
    if converter.is_excluded(src) {
        return converter.convert_file(src, dest);
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| NbColabError::io(parent, e))?;
    }
    converter.convert_file(src, dest)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use nbcolab_shared::AppConfig;

    use super::*;

    const NOTEBOOK: &str = r#"{"cells": [{"cell_type": "markdown", "metadata": {}, "source": "![a](../_static/a.png)"}], "metadata": {}, "nbformat": 4, "nbformat_minor": 5}"#;

    fn converter() -> Converter {
        Converter::from_config(&AppConfig::default()).expect("default config")
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, content).expect("write");
    }

    struct Recorder(RefCell<Vec<usize>>);

    impl ProgressReporter for Recorder {
        fn phase(&self, _name: &str) {}
        fn notebook_done(&self, _path: &Path, current: usize, _total: usize) {
            self.0.borrow_mut().push(current);
        }
        fn done(&self, _report: &BatchReport) {}
    }

    #[test]
    fn finds_notebooks_and_skips_hidden_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "b/two.ipynb", NOTEBOOK);
        write(dir.path(), "a/one.ipynb", NOTEBOOK);
        write(dir.path(), "a/.ipynb_checkpoints/one-checkpoint.ipynb", NOTEBOOK);
        write(dir.path(), "a/notes.md", "# notes");

        let found = find_notebooks(dir.path()).expect("walk");
        let rel: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).expect("under root").to_path_buf())
            .collect();
        assert_eq!(rel, vec![PathBuf::from("a/one.ipynb"), PathBuf::from("b/two.ipynb")]);
    }

    #[test]
    fn mirrors_layout_and_isolates_failures() {
        let src = tempfile::tempdir().expect("src");
        let out = tempfile::tempdir().expect("out");
        write(src.path(), "01/intro.ipynb", NOTEBOOK);
        write(src.path(), "02/cellpose_notebook.ipynb", NOTEBOOK);
        write(src.path(), "03/broken.ipynb", "not json");
        write(src.path(), "04/outro.ipynb", NOTEBOOK);

        let recorder = Recorder(RefCell::new(Vec::new()));
        let report = convert_dir(src.path(), out.path(), &converter(), &recorder).expect("batch");

        assert_eq!(report.converted.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_success());
        assert!(report.failed[0].0.ends_with("03/broken.ipynb"));

        assert!(out.path().join("01/intro.ipynb").exists());
        assert!(out.path().join("04/outro.ipynb").exists());
        assert!(!out.path().join("02/cellpose_notebook.ipynb").exists());
        assert!(!out.path().join("03/broken.ipynb").exists());
        assert_eq!(*recorder.0.borrow(), vec![1, 2, 3, 4]);

        let written = std::fs::read_to_string(out.path().join("01/intro.ipynb")).expect("read");
        assert!(written.contains("https://raw.githubusercontent.com/bobiac/bobiac-book/main/_static/a.png"));
    }

    #[test]
    fn missing_source_dir_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = convert_dir(&dir.path().join("nope"), dir.path(), &converter(), &SilentProgress)
            .unwrap_err();
        assert!(matches!(err, NbColabError::Io { .. }));
    }
}
