use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Failed to encode record for station {station}")]
    Encode {
        station: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode stream record with partition key '{partition_key}'")]
    Decode {
        partition_key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Refusing to deliver an empty batch to stream '{0}'")]
    EmptyBatch(String),

    #[error("Batch of {size} records exceeds the limit of {max} for stream '{stream}'")]
    BatchTooLarge {
        stream: String,
        size: usize,
        max: usize,
    },

    #[error("Stream '{0}' is closed")]
    Closed(String),
}
