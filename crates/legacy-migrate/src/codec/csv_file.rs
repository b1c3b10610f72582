//! CSV with a header row.
//!
//! The header is the union of the chunk's columns in first-appearance order.
//! Nulls (and columns a record lacks) are written as `\N`, the marker MySQL's
//! `LOAD DATA` uses, so an empty field stays an empty string. Every other
//! field reads back as text; type restoration is left to the transformer.

use serde_json::Value;

use crate::core::record::value_to_text;
use crate::core::Record;
use crate::error::Result;

/// Field content standing for SQL NULL.
const NULL_MARKER: &str = "\\N";

pub(super) fn encode(records: &[Record]) -> Result<Vec<u8>> {
    let mut headers: Vec<&str> = Vec::new();
    for record in records {
        for column in record.keys() {
            if !headers.contains(&column.as_str()) {
                headers.push(column.as_str());
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    if !headers.is_empty() {
        writer.write_record(&headers)?;
    }
    for record in records {
        let row = headers.iter().map(|column| {
            record
                .get(*column)
                .and_then(value_to_text)
                .unwrap_or_else(|| NULL_MARKER.to_string())
        });
        writer.write_record(row)?;
    }

    writer.into_inner().map_err(|e| e.into_error().into())
}

pub(super) fn decode(bytes: &[u8]) -> Result<Vec<Record>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(column, field)| {
                let value = if field == NULL_MARKER {
                    Value::Null
                } else {
                    Value::String(field.to_string())
                };
                (column.to_string(), value)
            })
            .collect();
        records.push(record);
    }
    Ok(records)
}
