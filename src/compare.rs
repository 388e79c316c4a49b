// compare.rs - Compare the results recorded in two success logs
//
// Rows are keyed by their leading address triple; when a key repeats within
// one log the later row wins.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

use crate::address::AddressKey;
use crate::resume::key_from_row;

/// Address whose recorded result differs between the two logs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub key: AddressKey,
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Comparison {
    pub matches: usize,
    pub mismatches: Vec<Mismatch>,
    pub only_left: usize,
    pub only_right: usize,
}

impl Comparison {
    /// Keys present in both logs
    pub fn shared(&self) -> usize {
        self.matches + self.mismatches.len()
    }
}

/// Compare two success logs by address
pub fn compare_logs(left: &Path, right: &Path) -> Result<Comparison> {
    let left_results = read_results(left)?;
    let right_results = read_results(right)?;
    Ok(compare_results(&left_results, &right_results))
}

fn compare_results(
    left: &BTreeMap<AddressKey, String>,
    right: &BTreeMap<AddressKey, String>,
) -> Comparison {
    let mut comparison = Comparison::default();

    for (key, left_value) in left {
        match right.get(key) {
            Some(right_value) if right_value == left_value => comparison.matches += 1,
            Some(right_value) => comparison.mismatches.push(Mismatch {
                key: key.clone(),
                left: left_value.clone(),
                right: right_value.clone(),
            }),
            None => comparison.only_left += 1,
        }
    }
    comparison.only_right = right.keys().filter(|key| !left.contains_key(*key)).count();

    comparison
}

/// Map each address in a success log to its result column
fn read_results(path: &Path) -> Result<BTreeMap<AddressKey, String>> {
    let file = File::open(path).with_context(|| format!("Failed to open log {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut results = BTreeMap::new();
    let mut skipped = 0;
    for record in reader.records() {
        let record = record.with_context(|| format!("Failed to read {}", path.display()))?;
        // A row needs an address triple plus a result column.
        let key = match key_from_row(&record).filter(|_| record.len() > 3) {
            Some(key) => key,
            None => {
                skipped += 1;
                continue;
            }
        };
        let result = record.get(record.len() - 1).unwrap_or_default().to_string();
        results.insert(key, result);
    }

    if skipped > 0 {
        warn!("Skipped {} rows without an address and result in {}", skipped, path.display());
    }
    debug!("Read {} results from {}", results.len(), path.display());
    Ok(results)
}
