use crate::batch::MAX_BATCH_SIZE;
use crate::stream::error::StreamError;
use crate::stream::{EventStream, StreamRecord};
use async_trait::async_trait;
use log::debug;
use tokio::sync::mpsc;

/// Creates an in-process stream holding up to `capacity` undelivered batches.
///
/// Producers block in [`EventStream::put_records`] while the buffer is full.
/// The stream closes once every [`ChannelStream`] handle is dropped.
pub fn channel(name: impl Into<String>, capacity: usize) -> (ChannelStream, StreamReceiver) {
    let name = name.into();
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        ChannelStream {
            name: name.clone(),
            sender,
        },
        StreamReceiver { name, receiver },
    )
}

/// Producer side of an in-process stream.
#[derive(Debug, Clone)]
pub struct ChannelStream {
    name: String,
    sender: mpsc::Sender<Vec<StreamRecord>>,
}

#[async_trait]
impl EventStream for ChannelStream {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put_records(&self, records: Vec<StreamRecord>) -> Result<(), StreamError> {
        if records.is_empty() {
            return Err(StreamError::EmptyBatch(self.name.clone()));
        }
        if records.len() > MAX_BATCH_SIZE {
            return Err(StreamError::BatchTooLarge {
                stream: self.name.clone(),
                size: records.len(),
                max: MAX_BATCH_SIZE,
            });
        }

        debug!("Putting {} record(s) on stream {}", records.len(), self.name);
        self.sender
            .send(records)
            .await
            .map_err(|_| StreamError::Closed(self.name.clone()))
    }
}

/// Consumer side of an in-process stream.
#[derive(Debug)]
pub struct StreamReceiver {
    name: String,
    receiver: mpsc::Receiver<Vec<StreamRecord>>,
}

impl StreamReceiver {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits for the next batch. Returns `None` once the stream is closed and drained.
    pub async fn next_batch(&mut self) -> Option<Vec<StreamRecord>> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(i: usize) -> StreamRecord {
        StreamRecord {
            data: i.to_string().into_bytes(),
            partition_key: "1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_batches_arrive_in_order() -> Result<(), StreamError> {
        let (stream, mut receiver) = channel("WeatherStream", 4);
        stream.put_records(vec![record(0), record(1)]).await?;
        stream.put_records(vec![record(2)]).await?;
        drop(stream);

        assert_eq!(receiver.next_batch().await, Some(vec![record(0), record(1)]));
        assert_eq!(receiver.next_batch().await, Some(vec![record(2)]));
        assert_eq!(receiver.next_batch().await, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_rejects_invalid_batches() {
        let (stream, _receiver) = channel("WeatherStream", 1);

        let empty = stream.put_records(Vec::new()).await;
        assert!(matches!(empty, Err(StreamError::EmptyBatch(_))));

        let oversized = stream
            .put_records((0..=MAX_BATCH_SIZE).map(record).collect())
            .await;
        assert!(matches!(
            oversized,
            Err(StreamError::BatchTooLarge { size: 501, max: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_closed_stream() {
        let (stream, receiver) = channel("WeatherStream", 1);
        drop(receiver);
        let result = stream.put_records(vec![record(0)]).await;
        assert!(matches!(result, Err(StreamError::Closed(name)) if name == "WeatherStream"));
    }
}
