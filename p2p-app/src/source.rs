use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use p2p_core::RawRow;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// CSV export of aggregated P2P quotes, re-read on every refresh.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Vec<RawRow>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let rows = parse_csv(bytes.as_slice())
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        debug!("Loaded {} rows from {}", rows.len(), self.path.display());
        Ok(rows)
    }
}

/// Reads CSV with a header line into raw rows. Every cell stays a string;
/// empty cells become `null` so the parser treats them as missing.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<RawRow>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| {
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                (header.to_string(), value)
            })
            .collect();
        rows.push(row);
    }

    Ok(rows)
}
