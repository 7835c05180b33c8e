//! Core notebook types: [`Notebook`], [`Cell`], [`CellKind`], [`Tags`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Notebook
// ---------------------------------------------------------------------------

/// A whole `.ipynb` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    /// Ordered cells.
    pub cells: Vec<Cell>,
    /// Kernel spec, language info, and whatever else the author's tooling stored.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Major format version (always 4 once parsed).
    pub nbformat: u32,
    /// Minor format version; cell ids are mandatory from 4.5 on.
    pub nbformat_minor: u32,
}

impl Notebook {
    /// Whether cells in this notebook are expected to carry an `id`.
    pub fn requires_cell_ids(&self) -> bool {
        self.nbformat > 4 || (self.nbformat == 4 && self.nbformat_minor >= 5)
    }
}

// ---------------------------------------------------------------------------
// CellKind
// ---------------------------------------------------------------------------

/// The `cell_type` of a cell. Unknown kinds are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CellKind {
    Markdown,
    Code,
    Raw,
    Other(String),
}

impl CellKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Markdown => "markdown",
            Self::Code => "code",
            Self::Raw => "raw",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for CellKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "markdown" => Self::Markdown,
            "code" => Self::Code,
            "raw" => Self::Raw,
            _ => Self::Other(name),
        }
    }
}

impl From<CellKind> for String {
    fn from(kind: CellKind) -> Self {
        match kind {
            CellKind::Other(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for CellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Duplicate-free list of cell tags, in the order they were authored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(Vec<String>);

impl Tags {
    /// Build a tag list, keeping the first occurrence of each tag.
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.into();
            if !out.contains(&tag) {
                out.push(tag);
            }
        }
        Self(out)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    /// Whether any of `candidates` is present.
    pub fn contains_any(&self, candidates: &[String]) -> bool {
        candidates.iter().any(|c| self.contains(c))
    }

    /// A new tag list with `tag` removed; every other tag keeps its position.
    pub fn without(&self, tag: &str) -> Self {
        Self(self.0.iter().filter(|t| *t != tag).cloned().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// One notebook cell.
///
/// `outputs` and `execution_count` only exist on disk for code cells; for
/// other kinds they stay empty and are not written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CellRepr", into = "CellRepr")]
pub struct Cell {
    pub kind: CellKind,
    pub id: Option<String>,
    pub metadata: Map<String, Value>,
    pub source: String,
    pub outputs: Vec<Value>,
    pub execution_count: Option<u64>,
    /// Fields this crate does not model (e.g. `attachments`).
    pub extra: Map<String, Value>,
}

impl Cell {
    /// A fresh, never-executed code cell.
    pub fn new_code(source: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Code,
            id: None,
            metadata: Map::new(),
            source: source.into(),
            outputs: Vec::new(),
            execution_count: None,
            extra: Map::new(),
        }
    }

    /// A markdown cell with the given text.
    pub fn new_markdown(source: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Markdown,
            ..Self::new_code(source)
        }
    }

    pub fn is_code(&self) -> bool {
        self.kind == CellKind::Code
    }

    pub fn is_markdown(&self) -> bool {
        self.kind == CellKind::Markdown
    }

    /// Tags from `metadata.tags`; non-string entries are ignored.
    pub fn tags(&self) -> Tags {
        match self.metadata.get("tags") {
            Some(Value::Array(items)) => Tags::new(items.iter().filter_map(Value::as_str)),
            _ => Tags::default(),
        }
    }

    /// Replace `metadata.tags` with `tags`, consuming the cell.
    pub fn with_tags(mut self, tags: Tags) -> Self {
        let list = tags.0.into_iter().map(Value::String).collect();
        self.metadata.insert("tags".into(), Value::Array(list));
        self
    }
}

/// On-disk shape of a cell.
#[derive(Serialize, Deserialize)]
struct CellRepr {
    cell_type: CellKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    metadata: Map<String, Value>,
    source: MultilineText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    outputs: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    execution_count: Option<Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<CellRepr> for Cell {
    type Error = String;

    fn try_from(repr: CellRepr) -> Result<Self, Self::Error> {
        let execution_count = match repr.execution_count {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_u64().ok_or_else(|| {
                format!("execution_count must be a non-negative integer or null, got {value}")
            })?),
        };
        Ok(Self {
            kind: repr.cell_type,
            id: repr.id,
            metadata: repr.metadata,
            source: repr.source.0,
            outputs: repr.outputs.unwrap_or_default(),
            execution_count,
            extra: repr.extra,
        })
    }
}

impl From<Cell> for CellRepr {
    fn from(cell: Cell) -> Self {
        let (outputs, execution_count) = if cell.is_code() {
            let count = cell.execution_count.map_or(Value::Null, Value::from);
            (Some(cell.outputs), Some(count))
        } else {
            (None, None)
        };
        Self {
            cell_type: cell.kind,
            id: cell.id,
            metadata: cell.metadata,
            source: MultilineText(cell.source),
            outputs,
            execution_count,
            extra: cell.extra,
        }
    }
}

/// Cell source: a string or a list of lines on read, always lines on write.
struct MultilineText(String);

impl Serialize for MultilineText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.split_inclusive('\n'))
    }
}

impl<'de> Deserialize<'de> for MultilineText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Lines(Vec<String>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(text) => Self(text),
            Repr::Lines(lines) => Self(lines.concat()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_dedup_and_without() {
        let tags = Tags::new(["skip-execution", "hide-input", "skip-execution"]);
        assert_eq!(tags.len(), 2);

        let stripped = tags.without("skip-execution");
        assert_eq!(stripped.iter().collect::<Vec<_>>(), vec!["hide-input"]);
        // The original is untouched.
        assert!(tags.contains("skip-execution"));
    }

    #[test]
    fn tags_contains_any() {
        let tags = Tags::new(["remove-output"]);
        let removal = vec!["remove-input".to_string(), "remove-output".to_string()];
        assert!(tags.contains_any(&removal));
        assert!(!Tags::default().contains_any(&removal));
    }

    #[test]
    fn execution_count_must_be_integer_or_null() {
        let cell: Cell = serde_json::from_value(serde_json::json!({
            "cell_type": "code",
            "execution_count": null,
            "metadata": {},
            "outputs": [],
            "source": "x = 1"
        }))
        .expect("null count");
        assert_eq!(cell.execution_count, None);

        let err = serde_json::from_value::<Cell>(serde_json::json!({
            "cell_type": "code",
            "execution_count": "3",
            "metadata": {},
            "outputs": [],
            "source": "x = 1"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("execution_count"));
    }

    #[test]
    fn cell_tags_read_from_metadata() {
        let cell: Cell = serde_json::from_value(serde_json::json!({
            "cell_type": "markdown",
            "metadata": {"tags": ["teacher", 3, "hide-cell"]},
            "source": "text"
        }))
        .expect("deserialize cell");
        let tags = cell.tags();
        assert!(tags.contains("teacher"));
        assert!(tags.contains("hide-cell"));
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn with_tags_writes_metadata() {
        let cell = Cell::new_code("x = 1").with_tags(Tags::new(["a", "b"]));
        assert_eq!(cell.metadata["tags"], serde_json::json!(["a", "b"]));

        let cell = cell.with_tags(Tags::default());
        assert_eq!(cell.metadata["tags"], serde_json::json!([]));
    }

    #[test]
    fn source_accepts_string_or_lines() {
        let from_lines: Cell = serde_json::from_value(serde_json::json!({
            "cell_type": "code",
            "execution_count": 3,
            "metadata": {},
            "outputs": [],
            "source": ["import numpy as np\n", "np.zeros(3)"]
        }))
        .expect("lines");
        assert_eq!(from_lines.source, "import numpy as np\nnp.zeros(3)");
        assert_eq!(from_lines.execution_count, Some(3));

        let from_text: Cell = serde_json::from_value(serde_json::json!({
            "cell_type": "code",
            "execution_count": null,
            "metadata": {},
            "outputs": [],
            "source": "import numpy as np\nnp.zeros(3)"
        }))
        .expect("text");
        assert_eq!(from_text.source, from_lines.source);
        assert_eq!(from_text.execution_count, None);
    }

    #[test]
    fn code_cell_always_writes_execution_fields() {
        let value = serde_json::to_value(Cell::new_code("a\nb\n")).expect("serialize");
        assert_eq!(value["execution_count"], Value::Null);
        assert_eq!(value["outputs"], serde_json::json!([]));
        assert_eq!(value["source"], serde_json::json!(["a\n", "b\n"]));
    }

    #[test]
    fn markdown_cell_omits_execution_fields() {
        let value = serde_json::to_value(Cell::new_markdown("# Title")).expect("serialize");
        assert!(value.get("execution_count").is_none());
        assert!(value.get("outputs").is_none());
        assert_eq!(value["cell_type"], "markdown");
    }

    #[test]
    fn unknown_fields_and_kinds_survive() {
        let input = serde_json::json!({
            "cell_type": "heading",
            "metadata": {"collapsed": true},
            "source": [],
            "attachments": {"img.png": {"image/png": "AAAA"}}
        });
        let cell: Cell = serde_json::from_value(input.clone()).expect("deserialize");
        assert_eq!(cell.kind, CellKind::Other("heading".into()));
        assert_eq!(cell.source, "");

        let back = serde_json::to_value(&cell).expect("serialize");
        assert_eq!(back, input);
    }

    #[test]
    fn cell_ids_required_from_minor_five() {
        let mut nb = Notebook {
            cells: vec![],
            metadata: Map::new(),
            nbformat: 4,
            nbformat_minor: 4,
        };
        assert!(!nb.requires_cell_ids());
        nb.nbformat_minor = 5;
        assert!(nb.requires_cell_ids());
    }
}
