//! Event stream delivery.
//!
//! Records travel through the stream as opaque JSON payloads tagged with a
//! partition key. [`EventStream`] is the producer-side contract; the
//! [`channel`] implementation connects a producer and a consumer inside one
//! process.

pub mod channel;
pub mod error;

use crate::stream::error::StreamError;
use crate::types::record::NormalizedRecord;
use async_trait::async_trait;

/// One payload in a stream batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    /// Serialized [`NormalizedRecord`].
    pub data: Vec<u8>,
    pub partition_key: String,
}

impl StreamRecord {
    /// Serializes `record`, using its location as the partition key.
    pub fn encode(record: &NormalizedRecord) -> Result<Self, StreamError> {
        let data = serde_json::to_vec(record).map_err(|source| StreamError::Encode {
            station: record.station.clone(),
            source,
        })?;
        Ok(Self {
            data,
            partition_key: record.location.clone(),
        })
    }

    pub fn decode(&self) -> Result<NormalizedRecord, StreamError> {
        serde_json::from_slice(&self.data).map_err(|source| StreamError::Decode {
            partition_key: self.partition_key.clone(),
            source,
        })
    }
}

/// A stream accepting batches of records.
///
/// A single call delivers at most [`crate::MAX_BATCH_SIZE`] records and
/// either accepts the whole batch or fails.
#[async_trait]
pub trait EventStream: Send + Sync {
    /// Name of the stream, for logging.
    fn name(&self) -> &str;

    async fn put_records(&self, records: Vec<StreamRecord>) -> Result<(), StreamError>;
}
