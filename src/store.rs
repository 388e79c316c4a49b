// store.rs - Append-only success and failure logs
//
// Both logs are header-less CSV so that a restarted run can append to them and
// the resume index can replay them without caring where a previous run stopped.
// Each log has its own lock; a row is written and flushed while the lock is
// held, so concurrent workers never interleave partial rows.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::address::WorkItem;

/// Written in the result column when the results table is absent or empty
pub const NOT_FOUND_MARKER: &str = "None";

/// Separator between extracted values in the result column
pub const RESULT_DELIMITER: &str = ", ";

/// Render the result column for a success row
pub fn format_result(values: Option<&[String]>) -> String {
    match values {
        Some(values) => values.join(RESULT_DELIMITER),
        None => NOT_FOUND_MARKER.to_string(),
    }
}

/// One append-only CSV log
struct LogWriter {
    writer: Mutex<csv::Writer<File>>,
    path: PathBuf,
    count: AtomicUsize,
}

impl LogWriter {
    fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log for appending: {}", path.display()))?;
        terminate_partial_row(&mut file, path)?;

        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(file);

        Ok(Self {
            writer: Mutex::new(writer),
            path: path.to_path_buf(),
            count: AtomicUsize::new(0),
        })
    }

    async fn append(&self, item: &WorkItem, last_column: &str) -> Result<()> {
        let mut row = item.log_prefix();
        row.push(last_column);

        let mut writer = self.writer.lock().await;
        writer
            .write_record(&row)
            .with_context(|| format!("Failed to write row to {}", self.path.display()))?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        drop(writer);

        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// End a row left unterminated by a crash so new rows start on their own line
fn terminate_partial_row(file: &mut File, path: &Path) -> Result<()> {
    let len = file
        .metadata()
        .with_context(|| format!("Failed to stat log: {}", path.display()))?
        .len();
    if len == 0 {
        return Ok(());
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))
        .and_then(|_| file.read_exact(&mut last))
        .with_context(|| format!("Failed to read end of log: {}", path.display()))?;
    if last[0] != b'\n' {
        warn!("{} ends with a partial row, starting a new line", path.display());
        file.write_all(b"\n")
            .with_context(|| format!("Failed to terminate partial row in {}", path.display()))?;
    }
    Ok(())
}

/// Durable sink for lookup outcomes
pub struct RecordStore {
    success: LogWriter,
    failure: Option<LogWriter>,
}

impl RecordStore {
    /// Open (or create) the success log and, if given, the failure log
    pub fn open(success_path: &Path, failure_path: Option<&Path>) -> Result<Self> {
        let success = LogWriter::open(success_path)?;
        let failure = failure_path.map(LogWriter::open).transpose()?;
        debug!(
            "Record store open: success={} failure={}",
            success_path.display(),
            failure_path.map(|p| p.display().to_string()).unwrap_or_else(|| "<none>".to_string())
        );
        Ok(Self { success, failure })
    }

    /// Append a success row. `None` records an explicit absence of results.
    pub async fn append_success(&self, item: &WorkItem, values: Option<&[String]>) -> Result<()> {
        self.success.append(item, &format_result(values)).await
    }

    /// Append a failure row. Returns `Ok(false)` when no failure log is configured.
    pub async fn append_failure(&self, item: &WorkItem, error: &str) -> Result<bool> {
        match &self.failure {
            Some(log) => {
                log.append(item, error).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn has_failure_log(&self) -> bool {
        self.failure.is_some()
    }

    /// Rows appended to the success log by this store
    pub fn success_count(&self) -> usize {
        self.success.count.load(Ordering::Relaxed)
    }

    /// Rows appended to the failure log by this store
    pub fn failure_count(&self) -> usize {
        self.failure
            .as_ref()
            .map(|log| log.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{AddressKey, Borough};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn item(house: &str, extra: &[&str]) -> WorkItem {
        WorkItem::new(
            AddressKey::new(house, "west 73", Borough::Manhattan),
            extra.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_format_result() {
        let values = vec!["A1".to_string(), "B2".to_string()];
        assert_eq!(format_result(Some(values.as_slice())), "A1, B2");
        assert_eq!(format_result(None), "None");
        assert_eq!(format_result(Some(&[][..])), "");
    }

    #[tokio::test]
    async fn test_success_rows_append_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("output.csv");

        {
            let store = RecordStore::open(&path, None).unwrap();
            store
                .append_success(&item("270", &["apt 2"]), Some(&["A1".to_string(), "A2".to_string()][..]))
                .await
                .unwrap();
            assert_eq!(store.success_count(), 1);
        }
        {
            let store = RecordStore::open(&path, None).unwrap();
            store.append_success(&item("272", &[]), None).await.unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "270,west 73,MN,apt 2,\"A1, A2\"\n272,west 73,MN,None\n");
    }

    #[tokio::test]
    async fn test_reopen_after_truncated_row_starts_new_line() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("output.csv");
        std::fs::write(&path, "270,west 73,MN,None\n5,broad").unwrap();

        let store = RecordStore::open(&path, None).unwrap();
        store.append_success(&item("1", &[]), None).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "270,west 73,MN,None\n5,broad\n1,west 73,MN,None\n");

        let index = crate::resume::ResumeIndex::build(&[path.as_path()]).unwrap();
        assert!(index.contains(&AddressKey::new("1", "west 73", Borough::Manhattan)));
        assert!(index.contains(&AddressKey::new("270", "west 73", Borough::Manhattan)));
    }

    #[tokio::test]
    async fn test_failure_without_log_is_reported() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::open(&tmp.path().join("output.csv"), None).unwrap();

        let written = store.append_failure(&item("1", &[]), "boom").await.unwrap();
        assert!(!written);
        assert!(!store.has_failure_log());
        assert_eq!(store.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_rows_go_to_failure_log_only() {
        let tmp = TempDir::new().unwrap();
        let success = tmp.path().join("output.csv");
        let failure = tmp.path().join("nested").join("failed.csv");
        let store = RecordStore::open(&success, Some(failure.as_path())).unwrap();

        assert!(store.append_failure(&item("1", &["x"]), "connection reset").await.unwrap());

        assert_eq!(std::fs::read_to_string(&failure).unwrap(), "1,west 73,MN,x,connection reset\n");
        assert_eq!(std::fs::read_to_string(&success).unwrap(), "");
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("output.csv");
        let store = Arc::new(RecordStore::open(&path, None).unwrap());

        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let values = vec![format!("value-{i}-a"), format!("value-{i}-b")];
                store.append_success(&item(&i.to_string(), &["extra"]), Some(values.as_slice())).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 50);
        for line in lines {
            let house = line.split(',').next().unwrap();
            assert!(line.ends_with(&format!("\"value-{house}-a, value-{house}-b\"")), "bad row: {line}");
        }
    }
}
