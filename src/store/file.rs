use crate::store::error::StoreError;
use crate::store::table::TableData;
use crate::store::{
    KeyCondition, KeyValueStore, QueryPage, DEFAULT_MAX_BATCH_WRITE, DEFAULT_QUERY_PAGE_SIZE,
};
use crate::types::datatype::Table;
use crate::types::record::NormalizedRecord;
use async_trait::async_trait;
use bincode::config::{Configuration, Fixint, LittleEndian};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// Bytes of the little-endian length prefix in front of every log frame.
const FRAME_HEADER: usize = 8;

/// A [`KeyValueStore`] persisting each table in a directory.
///
/// A table lives in a bincode snapshot (`<table>.bin`) plus a log
/// (`<table>.log`) holding one length-prefixed frame per batch write.
/// Opening the store replays the log and compacts it into a fresh snapshot.
/// A frame cut short by a crash is dropped on replay.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    tables: Arc<Mutex<HashMap<Table, TableData>>>,
    max_batch_write: usize,
    query_page_size: usize,
}

impl FileStore {
    /// Opens the store in `dir`, loading and compacting any table files
    /// already present. A missing directory is an empty store.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        let mut tables = HashMap::new();

        for table in Table::ALL {
            let snapshot = dir.join(table.file_name());
            let loaded = tokio::task::spawn_blocking(move || Self::load_table(&snapshot)).await??;
            if let Some(data) = loaded {
                info!("Loaded {} item(s) for table {}", data.len(), table);
                tables.insert(table, data);
            }
        }

        Ok(Self {
            dir,
            tables: Arc::new(Mutex::new(tables)),
            max_batch_write: DEFAULT_MAX_BATCH_WRITE,
            query_page_size: DEFAULT_QUERY_PAGE_SIZE,
        })
    }

    pub fn with_query_page_size(mut self, size: usize) -> Self {
        self.query_page_size = size.max(1);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn log_path(snapshot: &Path) -> PathBuf {
        snapshot.with_extension("log")
    }

    /// Reads the snapshot and replays the log on top of it. When a log was
    /// replayed, the result is written as the new snapshot and the log removed.
    fn load_table(snapshot: &Path) -> Result<Option<TableData>, StoreError> {
        let data = match std::fs::read(snapshot) {
            Ok(bytes) => Some(Self::decode_snapshot(snapshot, &bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(StoreError::Read(snapshot.to_path_buf(), e)),
        };

        let log = Self::log_path(snapshot);
        let frames = match std::fs::read(&log) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(data),
            Err(e) => return Err(StoreError::Read(log, e)),
        };

        let mut data = data.unwrap_or_default();
        let replayed = Self::replay_frames(&log, &frames, &mut data)?;
        Self::write_snapshot(snapshot, &data)?;
        std::fs::remove_file(&log).map_err(|e| StoreError::Write(log.clone(), e))?;
        info!(
            "Compacted {} logged batch(es) into {}",
            replayed,
            snapshot.display()
        );
        Ok(Some(data))
    }

    fn decode_snapshot(path: &Path, bytes: &[u8]) -> Result<TableData, StoreError> {
        let (data, _) = bincode::serde::decode_from_slice::<TableData, _>(bytes, BINCODE_CONFIG)
            .map_err(|e| StoreError::Decode(path.to_path_buf(), Box::from(e)))?;
        Ok(data)
    }

    /// Applies every complete frame of `bytes` to `data`, returning the
    /// number of frames applied.
    fn replay_frames(path: &Path, bytes: &[u8], data: &mut TableData) -> Result<usize, StoreError> {
        let mut rest = bytes;
        let mut replayed = 0;
        while !rest.is_empty() {
            let Some((header, tail)) = rest.split_first_chunk::<FRAME_HEADER>() else {
                warn!("Dropping truncated frame header in {}", path.display());
                break;
            };
            let len = usize::try_from(u64::from_le_bytes(*header)).unwrap_or(usize::MAX);
            let Some(frame) = tail.get(..len) else {
                warn!("Dropping truncated frame in {}", path.display());
                break;
            };
            let (items, _) =
                bincode::serde::decode_from_slice::<Vec<NormalizedRecord>, _>(frame, BINCODE_CONFIG)
                    .map_err(|e| StoreError::Decode(path.to_path_buf(), Box::from(e)))?;
            data.upsert_all(items);
            replayed += 1;
            rest = &tail[len..];
        }
        Ok(replayed)
    }

    fn write_snapshot(path: &Path, data: &TableData) -> Result<(), StoreError> {
        let bytes = bincode::serde::encode_to_vec(data, BINCODE_CONFIG)
            .map_err(|e| StoreError::Encode(Box::new(e)))?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut temp_file =
            NamedTempFile::new_in(dir).map_err(|e| StoreError::Write(path.to_path_buf(), e))?;
        temp_file
            .write_all(&bytes)
            .map_err(|e| StoreError::Write(path.to_path_buf(), e))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| StoreError::Write(path.to_path_buf(), e))?;
        temp_file
            .persist(path)
            .map_err(|e| StoreError::Write(path.to_path_buf(), e.error))?;
        Ok(())
    }

    /// Appends `items` as one frame. A frame that fails to write is cut off
    /// again so the log stays replayable.
    fn append_frame(log: &Path, items: &[NormalizedRecord]) -> Result<usize, StoreError> {
        let payload = bincode::serde::encode_to_vec(items, BINCODE_CONFIG)
            .map_err(|e| StoreError::Encode(Box::new(e)))?;
        let mut frame = Vec::with_capacity(FRAME_HEADER + payload.len());
        frame.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        frame.extend_from_slice(&payload);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log)
            .map_err(|e| StoreError::Write(log.to_path_buf(), e))?;
        let start = file
            .metadata()
            .map_err(|e| StoreError::Write(log.to_path_buf(), e))?
            .len();
        if let Err(e) = file.write_all(&frame).and_then(|()| file.sync_data()) {
            if let Err(truncate) = file.set_len(start) {
                warn!("Failed to cut partial frame from {}: {}", log.display(), truncate);
            }
            return Err(StoreError::Write(log.to_path_buf(), e));
        }
        Ok(frame.len())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    fn max_batch_write(&self) -> usize {
        self.max_batch_write
    }

    async fn batch_write(
        &self,
        table: Table,
        items: Vec<NormalizedRecord>,
    ) -> Result<(), StoreError> {
        TableData::validate(table, &items, self.max_batch_write)?;
        let count = items.len();
        let tables = Arc::clone(&self.tables);
        let log = Self::log_path(&self.dir.join(table.file_name()));

        // The write runs on its own task so a caller that stops waiting
        // cannot leave the log and the live table out of step.
        tokio::spawn(async move {
            let mut tables = tables.lock().await;
            let (items, written) = tokio::task::spawn_blocking(move || {
                let written = Self::append_frame(&log, &items)?;
                Ok::<_, StoreError>((items, written))
            })
            .await??;

            debug!("Logged {} item(s) to {} ({} bytes)", count, table, written);
            tables.entry(table).or_default().upsert_all(items);
            Ok::<(), StoreError>(())
        })
        .await?
    }

    async fn query(
        &self,
        table: Table,
        condition: &KeyCondition,
        exclusive_start_key: Option<String>,
    ) -> Result<QueryPage, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .get(&table)
            .map(|data| {
                data.query_page(
                    condition,
                    exclusive_start_key.as_deref(),
                    self.query_page_size,
                )
            })
            .unwrap_or_default())
    }
}
