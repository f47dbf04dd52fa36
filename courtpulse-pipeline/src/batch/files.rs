//! Batch file discovery and validation

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use courtpulse_common::{Error, Result};

use crate::services::classifier::BatchRequest;

/// Request files in a directory, sorted by filename so batch order is
/// stable across runs. Only `batch_*.jsonl` files count.
pub fn discover_request_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|name| name.starts_with("batch_") && name.ends_with(".jsonl"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Downloaded result files in a directory, sorted by filename. Only
/// `batch_*_results.jsonl` files count.
pub fn discover_results_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|name| name.starts_with("batch_") && name.ends_with("_results.jsonl"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Ordinal embedded in a request filename: `batch_001.jsonl` -> 1.
pub fn extract_batch_num(filename: &str) -> Option<u32> {
    filename
        .strip_prefix("batch_")?
        .strip_suffix(".jsonl")?
        .parse()
        .ok()
}

/// Read a request file into memory for submission.
pub fn read_request_file(path: &Path) -> Result<Vec<BatchRequest>> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut requests = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let request = serde_json::from_str(&line).map_err(|e| {
            Error::InvalidInput(format!("{} line {}: {}", path.display(), index + 1, e))
        })?;
        requests.push(request);
    }
    Ok(requests)
}

/// Check every line of a request file parses as a batch request, returning
/// the request count. Fails on the first malformed line so a broken file is
/// caught before anything is submitted.
pub fn validate_request_file(path: &Path) -> Result<u64> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut count = 0u64;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        serde_json::from_str::<BatchRequest>(&line).map_err(|e| {
            Error::InvalidInput(format!("{} line {}: {}", path.display(), index + 1, e))
        })?;
        count += 1;
    }
    Ok(count)
}
