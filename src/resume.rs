// resume.rs - Rebuild the set of already-recorded addresses from prior logs
//
// Every log row starts with `house number, street, borough`. Replaying those
// triples at startup lets an interrupted batch be restarted without redoing
// finished work. The reader is tolerant: rows that cannot be keyed (short or
// truncated lines left by a crash) are skipped with a warning.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::address::{AddressKey, Borough};

/// Number of unreadable rows reported individually before summarising
const MAX_REPORTED_BAD_ROWS: usize = 3;

/// Addresses that already have a durable outcome
#[derive(Debug, Clone, Default)]
pub struct ResumeIndex {
    keys: HashSet<AddressKey>,
}

impl ResumeIndex {
    /// Union of the keys found in every given log. Missing files count as empty.
    pub fn build<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut index = ResumeIndex::default();
        for path in paths {
            let added = index.replay(path.as_ref())?;
            debug!("Replayed {} keys from {}", added, path.as_ref().display());
        }
        info!("Resume index holds {} addresses", index.len());
        Ok(index)
    }

    /// Add every key in `path` to the index, returning how many rows were read
    fn replay(&mut self, path: &Path) -> Result<usize> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No prior log at {}, nothing to resume", path.display());
                return Ok(0);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to open log {}", path.display()))
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut rows = 0;
        let mut bad_rows = 0;

        for (row_num, record) in reader.records().enumerate() {
            let key = record
                .map_err(|e| e.to_string())
                .and_then(|r| {
                    key_from_row(&r)
                        .ok_or_else(|| "fewer than three columns or unknown borough".to_string())
                });

            match key {
                Ok(key) => {
                    self.keys.insert(key);
                    rows += 1;
                }
                Err(reason) => {
                    bad_rows += 1;
                    if bad_rows <= MAX_REPORTED_BAD_ROWS {
                        warn!("Skipping unreadable row {} in {}: {}", row_num + 1, path.display(), reason);
                    }
                }
            }
        }

        if bad_rows > MAX_REPORTED_BAD_ROWS {
            warn!("{} total unreadable rows skipped in {}", bad_rows, path.display());
        }

        Ok(rows)
    }

    pub fn contains(&self, key: &AddressKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Leading `(house number, street, borough)` triple of a log row
pub(crate) fn key_from_row(record: &csv::StringRecord) -> Option<AddressKey> {
    let house_number = record.get(0)?;
    let street = record.get(1)?;
    let borough: Borough = record.get(2)?.parse().ok()?;
    Some(AddressKey::new(house_number, street, borough))
}
