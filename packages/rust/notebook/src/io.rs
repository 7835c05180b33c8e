//! Reading and writing `.ipynb` files.
//!
//! Output mirrors what nbformat itself writes: sorted keys, one-space
//! indentation, unescaped non-ASCII text, and a trailing newline.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, instrument};

use nbcolab_shared::{NbColabError, Result};

use crate::model::Notebook;

/// The only major format version the rewriter understands.
const SUPPORTED_NBFORMAT: u64 = 4;

/// Parse notebook JSON. `origin` is only used in error messages.
pub fn parse_notebook(json: &str, origin: &Path) -> Result<Notebook> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| NbColabError::format(origin, format!("invalid JSON: {e}")))?;

    let Some(object) = value.as_object() else {
        return Err(NbColabError::format(origin, "top level is not a JSON object"));
    };

    match object.get("nbformat").and_then(Value::as_u64) {
        Some(SUPPORTED_NBFORMAT) => {}
        Some(other) => {
            return Err(NbColabError::format(
                origin,
                format!("expected nbformat {SUPPORTED_NBFORMAT}, found {other}"),
            ));
        }
        None => return Err(NbColabError::format(origin, "missing nbformat version")),
    }

    serde_json::from_value(value).map_err(|e| NbColabError::format(origin, e.to_string()))
}

/// Read and parse the notebook at `path`.
#[instrument]
pub fn read_notebook(path: &Path) -> Result<Notebook> {
    let bytes = std::fs::read(path).map_err(|e| NbColabError::io(path, e))?;
    let text = std::str::from_utf8(&bytes)
        .map_err(|e| NbColabError::format(path, format!("not valid UTF-8: {e}")))?;

    let nb = parse_notebook(text, path)?;
    debug!(cells = nb.cells.len(), minor = nb.nbformat_minor, "notebook loaded");
    Ok(nb)
}

/// Render a notebook the way nbformat writes it.
pub fn to_json_string(nb: &Notebook) -> Result<String> {
    // Going through `Value` sorts every object's keys.
    let value = serde_json::to_value(nb).map_err(|e| NbColabError::Serialize(e.to_string()))?;

    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b" "));
    value
        .serialize(&mut ser)
        .map_err(|e| NbColabError::Serialize(e.to_string()))?;
    buf.push(b'\n');

    String::from_utf8(buf).map_err(|e| NbColabError::Serialize(e.to_string()))
}

/// Write `nb` to `path`, replacing any existing file in one step.
///
/// The document is rendered fully before anything touches the disk, and
/// lands via a sibling temporary file that is renamed into place.
#[instrument(skip(nb))]
pub fn write_notebook(nb: &Notebook, path: &Path) -> Result<()> {
    let rendered = to_json_string(nb)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| NbColabError::io(dir, e))?;
    tmp.write_all(rendered.as_bytes())
        .map_err(|e| NbColabError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| NbColabError::io(path, e.error))?;

    debug!(bytes = rendered.len(), "notebook written");
    Ok(())
}
