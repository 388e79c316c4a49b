//! Input table parsing
//!
//! The input is a CSV file with a header row (ignored) and the columns
//! `borough, house number, street, ...extra`. Extra columns are opaque and
//! copied through to the output logs in order.
//!
//! Any malformed row aborts the whole run: a bad borough code means the file
//! is corrupt, not that one address is unlucky.

use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::address::{AddressKey, Borough, WorkItem};

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to read input file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse input CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid borough '{code}' on line {line} (expected one of MN, BX, BK, QN, SI)")]
    InvalidBorough { line: u64, code: String },

    #[error("Line {line} is missing the '{column}' column")]
    MissingColumn { line: u64, column: &'static str },
}

/// Read and parse an input file
pub fn parse_input_file(path: &Path) -> Result<Vec<WorkItem>, InputError> {
    let content = fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let items = parse_input_csv(&content)?;
    info!("Loaded {} addresses from {}", items.len(), path.display());
    Ok(items)
}

/// Parse input CSV content into work items, preserving row order
pub fn parse_input_csv(content: &str) -> Result<Vec<WorkItem>, InputError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut items = Vec::new();

    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let field = |idx: usize, column: &'static str| {
            record
                .get(idx)
                .map(str::trim)
                .ok_or(InputError::MissingColumn { line, column })
        };

        let code = field(0, "borough")?;
        let borough: Borough = code.parse().map_err(|_| InputError::InvalidBorough {
            line,
            code: code.to_string(),
        })?;
        let house_number = field(1, "house number")?;
        let street = field(2, "street")?;

        let extra_columns = record.iter().skip(3).map(str::to_string).collect();

        items.push(WorkItem::new(
            AddressKey::new(house_number, street, borough),
            extra_columns,
        ));
    }

    debug!("Parsed {} input rows", items.len());
    Ok(items)
}
