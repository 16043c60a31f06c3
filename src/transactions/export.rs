//! JSON-lines warehouse exports (one record per line) used as training and batch input.

use super::{Label, Transaction};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read one JSON record per non-blank line.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, Box<dyn std::error::Error + Send + Sync>> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .map_err(|e| format!("{}:{}: {}", path.display(), lineno + 1, e))?;
        out.push(record);
    }
    Ok(out)
}

pub fn read_transactions(path: &Path) -> Result<Vec<Transaction>, Box<dyn std::error::Error + Send + Sync>> {
    read_jsonl(path)
}

pub fn read_labels(path: &Path) -> Result<Vec<Label>, Box<dyn std::error::Error + Send + Sync>> {
    read_jsonl(path)
}
