//! Typed outcomes of one executed request.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ── TaskResult ───────────────────────────────────────────────────

/// What a request produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TaskResult {
    /// The tasks ran and returned nothing.
    #[default]
    Empty,
    /// Bulk data returned by a task.
    Data(DataBlock),
    /// A plot descriptor returned by a task.
    Plot(PlotReference),
    /// Name under which the application loaded a dataset.
    DataSet(String),
}

impl TaskResult {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn data(&self) -> Option<&DataBlock> {
        match self {
            Self::Data(block) => Some(block),
            _ => None,
        }
    }

    pub fn plot(&self) -> Option<&PlotReference> {
        match self {
            Self::Plot(plot) => Some(plot),
            _ => None,
        }
    }

    pub fn dataset(&self) -> Option<&str> {
        match self {
            Self::DataSet(name) => Some(name),
            _ => None,
        }
    }
}

// ── DataBlock ────────────────────────────────────────────────────

/// Byte range of one column inside a [`DataBlock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnInfo {
    pub column_name: String,
    pub column_type: String,
    pub bytes_start_index: u64,
    pub bytes_size: u64,
}

/// Raw bulk bytes returned by one task, with their column layout.
///
/// Column values stay encoded; decoding them is up to the caller.
/// `format` names non-columnar content: `"Image"` for an exported
/// capture, `"JSON"` or `"Edgelist"` for network data. Compressed
/// content is already inflated.
#[derive(Debug, Clone, PartialEq)]
pub struct DataBlock {
    task_type: String,
    bytes: Bytes,
    columns: Vec<ColumnInfo>,
    format: Option<String>,
    path: Option<String>,
}

impl DataBlock {
    pub fn new(task_type: impl Into<String>, bytes: Bytes, columns: Vec<ColumnInfo>) -> Self {
        Self {
            task_type: task_type.into(),
            bytes,
            columns,
            format: None,
            path: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_path(mut self, path: Option<String>) -> Self {
        self.path = path;
        self
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Where the application was asked to save an export, if anywhere.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.column_name == name)
    }

    /// The encoded bytes of one column.
    pub fn column_bytes(&self, column: &ColumnInfo) -> Result<Bytes> {
        slice_range(&self.bytes, column.bytes_start_index, column.bytes_size)
    }
}

/// `[start, start + size)` of `bytes`, or a malformed-response error.
pub(crate) fn slice_range(bytes: &Bytes, start: u64, size: u64) -> Result<Bytes> {
    let end = start.checked_add(size);
    match end {
        Some(end) if end <= bytes.len() as u64 => Ok(bytes.slice(start as usize..end as usize)),
        _ => Err(Error::MalformedResponse(format!(
            "byte range {start}+{size} outside payload of {} bytes",
            bytes.len()
        ))),
    }
}

// ── PlotReference ────────────────────────────────────────────────

/// A plot the application rendered, as described in its response.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotReference {
    dataset_name: Option<String>,
    plot_type: Option<String>,
    map_mode: Option<String>,
    name: Option<String>,
    mapping: Map<String, Value>,
}

impl PlotReference {
    /// Build from a task response object.
    pub fn from_task_response(fields: &Map<String, Value>) -> Self {
        let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_owned);
        Self {
            dataset_name: text("DataSetName"),
            plot_type: text("PlotType"),
            map_mode: text("MapMode"),
            name: text("PlotName"),
            mapping: fields.clone(),
        }
    }

    pub fn dataset_name(&self) -> Option<&str> {
        self.dataset_name.as_deref()
    }

    pub fn plot_type(&self) -> Option<&str> {
        self.plot_type.as_deref()
    }

    pub fn map_mode(&self) -> Option<&str> {
        self.map_mode.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Any mapping field (e.g. `X`, `Color`, `ColorNormalization`) that
    /// is present and not null.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.mapping.get(key).filter(|v| !v.is_null())
    }

    pub fn mapping(&self) -> &Map<String, Value> {
        &self.mapping
    }
}
