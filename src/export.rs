use std::sync::Arc;

use crate::error::Error;
use crate::module::Record;

/// How `Engine::export` should encode the merged record list.
#[derive(Clone)]
pub enum ExportFormat {
    /// In-memory list, no encoding.
    Raw,
    /// UTF-8 JSON of the list.
    Json,
    /// CSV; every row must be a JSON object (`Error::UnsupportedFormat`
    /// otherwise). Column order follows first-seen key order.
    Csv,
    /// Caller-supplied encoder.
    Callable(Arc<dyn Fn(&[Record]) -> Record + Send + Sync>),
}

impl ExportFormat {
    /// Only `Raw` counts as "no format" for the override-refresh rule in
    /// `Engine::export`.
    pub fn is_raw(&self) -> bool {
        matches!(self, ExportFormat::Raw)
    }
}

/// The encoded result of an export.
#[derive(Debug, Clone)]
pub enum ExportData {
    Raw(Vec<Record>),
    Json(String),
    Csv(String),
    Called(Record),
}

pub fn encode(format: &ExportFormat, records: Vec<Record>) -> Result<ExportData, Error> {
    match format {
        ExportFormat::Raw => Ok(ExportData::Raw(records)),
        ExportFormat::Json => serde_json::to_string(&records)
            .map(ExportData::Json)
            .map_err(|e| Error::UnsupportedFormat(e.to_string())),
        ExportFormat::Csv => encode_csv(&records).map(ExportData::Csv),
        ExportFormat::Callable(f) => Ok(ExportData::Called(f(&records))),
    }
}

fn encode_csv(records: &[Record]) -> Result<String, Error> {
    let mut headers: Vec<String> = Vec::new();

    for record in records {
        let obj = record
            .as_object()
            .ok_or_else(|| Error::UnsupportedFormat("csv export requires object rows".into()))?;
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let mut writer = csv::WriterBuilder::new().from_writer(vec![]);
    writer
        .write_record(&headers)
        .map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    for record in records {
        let obj = record.as_object().expect("validated as object above");
        let row: Vec<String> = headers
            .iter()
            .map(|h| obj.get(h).map(value_to_cell).unwrap_or_default())
            .collect();
        writer
            .write_record(&row)
            .map_err(|e| Error::UnsupportedFormat(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::UnsupportedFormat(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| Error::UnsupportedFormat(e.to_string()))
}

fn value_to_cell(value: &Record) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
