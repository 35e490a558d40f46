//! Turning a decoded response into a [`TaskResult`].
//!
//! The response header is a JSON status document:
//!
//! ```text
//! AuthStatus / VersionStatus   "Success" or a rejection
//! SpecialResponse              optional message, no task results
//! TaskResponses[]              one object per requested task
//! ```
//!
//! Task objects that ask for data point into the trailing payload with
//! `BytesStartIndex` / `BytesSize`. A few task types carry their own
//! shape:
//!
//! ```text
//! Export      PayloadType "Image": gzip image bytes, optional Path
//! GetNetwork  NetworkDataFormat "JSON" (gzip) or "Edgelist" (columns)
//! DataSet     DataSetName of the loaded dataset
//! ```

use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::codec;
use crate::error::{Error, Result};
use crate::result::{ColumnInfo, DataBlock, PlotReference, TaskResult, slice_range};

const SUCCESS: &str = "Success";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResponseDocument {
    auth_status: Option<String>,
    version_status: Option<String>,
    version_status_fail_reason: Option<String>,
    server_version: Option<String>,
    expected_api_version: Option<String>,
    error: Option<String>,
    special_response: Option<String>,
    #[serde(default)]
    task_responses: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskFields {
    task_status: Option<String>,
    task_type: Option<String>,
    error: Option<String>,
    note: Option<String>,
    return_plot_mapping: Option<bool>,
    return_data: Option<bool>,
    bytes_start_index: Option<u64>,
    bytes_size: Option<u64>,
    #[serde(default)]
    column_info: Vec<ColumnInfo>,
    payload_type: Option<String>,
    path: Option<String>,
    network_data_format: Option<String>,
    data_set_name: Option<String>,
}

/// Everything one response produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dispatched {
    /// The value handed back to the caller.
    pub result: TaskResult,
    /// Every plot descriptor in the response, for local history.
    pub plots: Vec<PlotReference>,
}

/// Interpret a decoded response header and its trailing payload.
pub fn dispatch(header: &[u8], payload: &Bytes) -> Result<Dispatched> {
    let doc: ResponseDocument = serde_json::from_slice(header)?;
    check_status(&doc)?;

    if let Some(message) = doc.special_response {
        info!("{message}");
        return Ok(Dispatched::default());
    }

    let tasks = doc
        .task_responses
        .iter()
        .map(|raw| -> Result<_> {
            let fields: TaskFields = serde_json::from_value(Value::Object(raw.clone()))?;
            Ok((raw, fields))
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some((_, failed)) = tasks
        .iter()
        .find(|(_, t)| t.task_status.as_deref().unwrap_or("Failed") != SUCCESS)
    {
        return Err(task_failure(failed));
    }

    let mut data = None;
    let mut plots = Vec::new();
    let mut dataset = None;
    for (raw, task) in &tasks {
        let task_type = task.task_type.as_deref().unwrap_or("unknown");
        if let Some(note) = &task.note {
            info!(task_type, "note: {}", clean(note));
        }
        if task.return_plot_mapping == Some(true) {
            plots.push(PlotReference::from_task_response(raw));
        }
        let block = match task_type {
            "Export" => export_block(task, payload)?,
            "GetNetwork" => network_block(task, payload)?,
            "DataSet" => {
                if let Some(name) = &task.data_set_name {
                    info!("data set loaded with name '{name}'");
                    if dataset.is_none() {
                        dataset = Some(name.clone());
                    }
                }
                None
            }
            _ if task.return_data == Some(true) => Some(data_block(task_type, task, payload)?),
            _ => None,
        };
        if data.is_none() {
            data = block;
        }
    }

    let result = match (data, plots.first(), dataset) {
        (Some(block), _, _) => TaskResult::Data(block),
        (None, Some(plot), _) => TaskResult::Plot(plot.clone()),
        (None, None, Some(name)) => TaskResult::DataSet(name),
        (None, None, None) => TaskResult::Empty,
    };
    Ok(Dispatched { result, plots })
}

/// Auth failures take priority over version failures.
fn check_status(doc: &ResponseDocument) -> Result<()> {
    let (Some(auth), Some(version)) = (&doc.auth_status, &doc.version_status) else {
        return Err(Error::MalformedResponse(
            "response is missing AuthStatus or VersionStatus".into(),
        ));
    };
    if auth != SUCCESS {
        return Err(Error::Authentication(
            doc.error.clone().unwrap_or_else(|| auth.clone()),
        ));
    }
    if version != SUCCESS {
        return Err(Error::VersionMismatch {
            reason: doc
                .version_status_fail_reason
                .clone()
                .unwrap_or_else(|| version.clone()),
            server_version: doc.server_version.clone().unwrap_or_default(),
            expected_api_version: doc.expected_api_version.clone().unwrap_or_default(),
        });
    }
    Ok(())
}

fn task_failure(task: &TaskFields) -> Error {
    match (&task.task_type, &task.error) {
        (None, None) => Error::UnknownExecutionState,
        (task_type, error) => Error::TaskFailed {
            task_type: task_type.clone().unwrap_or_else(|| "unknown".into()),
            reason: error
                .as_deref()
                .map(clean)
                .unwrap_or_else(|| "(unknown reason)".into()),
            note: task.note.as_deref().map(clean),
        },
    }
}

fn data_block(task_type: &str, task: &TaskFields, payload: &Bytes) -> Result<DataBlock> {
    let bytes = task_bytes(task_type, task, payload)?;
    Ok(DataBlock::new(task_type, bytes, task.column_info.clone()))
}

fn task_bytes(task_type: &str, task: &TaskFields, payload: &Bytes) -> Result<Bytes> {
    let (Some(start), Some(size)) = (task.bytes_start_index, task.bytes_size) else {
        return Err(Error::MalformedResponse(format!(
            "task '{task_type}' returned data without a byte range"
        )));
    };
    slice_range(payload, start, size)
}

/// An exported capture. Other export payloads return nothing.
fn export_block(task: &TaskFields, payload: &Bytes) -> Result<Option<DataBlock>> {
    if task.payload_type.as_deref() != Some("Image") {
        return Ok(None);
    }
    let image = codec::decompress(&task_bytes("Export", task, payload)?)?;
    let block = DataBlock::new("Export", Bytes::from(image), Vec::new())
        .with_format("Image")
        .with_path(task.path.clone());
    Ok(Some(block))
}

/// Network data. A success without a data format means the application
/// did not finish producing it.
fn network_block(task: &TaskFields, payload: &Bytes) -> Result<Option<DataBlock>> {
    match task.network_data_format.as_deref() {
        None => Err(Error::UnknownExecutionState),
        Some("JSON") => {
            let graph = codec::decompress(&task_bytes("GetNetwork", task, payload)?)?;
            Ok(Some(
                DataBlock::new("GetNetwork", Bytes::from(graph), Vec::new()).with_format("JSON"),
            ))
        }
        Some("Edgelist") if task.return_data == Some(true) => {
            Ok(Some(data_block("GetNetwork", task, payload)?.with_format("Edgelist")))
        }
        Some(other) => {
            debug!(data_format = other, "network data not returned");
            Ok(None)
        }
    }
}

/// Strip the markup the application puts in human-readable messages.
fn clean(message: &str) -> String {
    message
        .replace('\n', "")
        .replace("<b>", "")
        .replace("</b>", "")
        .trim()
        .to_owned()
}

// ── Tests ────────────────────────────────────────────────────────
