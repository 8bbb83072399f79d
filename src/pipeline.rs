//! Producer and consumer roles of the ingestion pipeline.
//!
//! The producer pulls observations from a [`RecordSource`], classifies them
//! and delivers them to an [`EventStream`] in batches. The consumer drains a
//! stream and writes every record into its table. [`run_local`] connects
//! both through an in-process channel.

use crate::batch::{StreamBatcher, MAX_BATCH_SIZE};
use crate::classify::{group_by_table, RecordClassifier};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::fetch::error::FetchError;
use crate::fetch::RecordSource;
use crate::observe::{noop, PipelineObserver};
use crate::store::putter::WeatherPutter;
use crate::store::KeyValueStore;
use crate::stream::channel::{channel, StreamReceiver};
use crate::stream::{EventStream, StreamRecord};
use crate::types::record::{NormalizedRecord, RawRecord};
use chrono::NaiveDate;
use futures_util::{Stream, TryStreamExt};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the stream used by [`run_local`].
pub const STREAM_NAME: &str = "WeatherStream";

/// Counters of one producer run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProducerSummary {
    /// Records received from the source.
    pub seen: usize,
    /// Records accepted by the stream.
    pub delivered: usize,
    /// Records dropped for an unsupported datatype.
    pub skipped: usize,
    pub batches: usize,
}

/// Counters of one consumer run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerSummary {
    pub batches: usize,
    pub records: usize,
}

pub struct Producer<E: EventStream> {
    source: Arc<dyn RecordSource>,
    stream: E,
    classifier: RecordClassifier,
    batch_size: usize,
    observer: Arc<dyn PipelineObserver>,
}

impl<E: EventStream> Producer<E> {
    pub fn new(source: Arc<dyn RecordSource>, stream: E) -> Self {
        Self {
            source,
            stream,
            classifier: RecordClassifier::new(),
            batch_size: MAX_BATCH_SIZE,
            observer: noop(),
        }
    }

    /// Sets the records per delivery, capped at [`MAX_BATCH_SIZE`].
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        if batch_size > MAX_BATCH_SIZE {
            warn!(
                "Batch size {} exceeds the stream limit, using {}",
                batch_size, MAX_BATCH_SIZE
            );
        }
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.classifier = self.classifier.with_observer(Arc::clone(&observer));
        self.observer = observer;
        self
    }

    /// Delivers every supported observation between `start` and `end`.
    pub async fn run(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ProducerSummary, PipelineError> {
        if start > end {
            return Err(PipelineError::InvalidDateRange { start, end });
        }
        let locations = self.source.locations().await?;
        info!("Resolved {} station location(s)", locations.len());

        let summary = self
            .deliver(self.source.records(start, end), &locations)
            .await?;
        info!(
            "Delivered {} of {} record(s) to {} in {} batch(es), skipped {}",
            summary.delivered,
            summary.seen,
            self.stream.name(),
            summary.batches,
            summary.skipped
        );
        Ok(summary)
    }

    /// Attaches locations to `records`, classifies them and delivers the
    /// supported ones. Full batches are delivered before more input is read.
    pub async fn deliver<St>(
        &self,
        records: St,
        locations: &HashMap<String, String>,
    ) -> Result<ProducerSummary, PipelineError>
    where
        St: Stream<Item = Result<RawRecord, FetchError>>,
    {
        let mut records = std::pin::pin!(records);
        let mut summary = ProducerSummary::default();
        let mut batcher = StreamBatcher::new(self.batch_size);

        while let Some(mut record) = records.try_next().await? {
            summary.seen += 1;
            record.attach_location(locations);
            let Some((_, normalized)) = self.classifier.route(record) else {
                summary.skipped += 1;
                continue;
            };
            if let Some(batch) = batcher.push(StreamRecord::encode(&normalized)?) {
                self.flush(batch, &batcher, &mut summary).await?;
            }
        }
        if let Some(batch) = batcher.finish() {
            self.flush(batch, &batcher, &mut summary).await?;
        }
        Ok(summary)
    }

    async fn flush(
        &self,
        batch: Vec<StreamRecord>,
        batcher: &StreamBatcher<StreamRecord>,
        summary: &mut ProducerSummary,
    ) -> Result<(), PipelineError> {
        let size = batch.len();
        self.stream.put_records(batch).await?;
        summary.delivered += size;
        summary.batches += 1;
        self.observer.batch_flushed(size, batcher.flushed());
        info!(
            "Flushed {} record(s) to {}, {} so far",
            size,
            self.stream.name(),
            batcher.flushed()
        );
        Ok(())
    }
}

pub struct Consumer<S: KeyValueStore + ?Sized> {
    putter: WeatherPutter<S>,
}

impl<S: KeyValueStore + ?Sized> Consumer<S> {
    pub fn new(putter: WeatherPutter<S>) -> Self {
        Self { putter }
    }

    /// Decodes one stream batch and writes it to the store, precipitation
    /// first. Nothing is written if any record fails to decode.
    pub async fn handle_batch(&self, batch: Vec<StreamRecord>) -> Result<usize, PipelineError> {
        let records = batch
            .iter()
            .map(StreamRecord::decode)
            .collect::<Result<Vec<NormalizedRecord>, _>>()?;
        let grouped = group_by_table(records);
        debug!(
            "Batch holds {} precipitation and {} temperature record(s)",
            grouped.precipitation.len(),
            grouped.temperature.len()
        );
        Ok(self.putter.put_classified(grouped).await?)
    }

    /// Handles batches until the stream is closed and drained. Stops at the
    /// first failing batch.
    pub async fn run(
        &self,
        receiver: &mut StreamReceiver,
    ) -> Result<ConsumerSummary, PipelineError> {
        let mut summary = ConsumerSummary::default();
        while let Some(batch) = receiver.next_batch().await {
            summary.records += self.handle_batch(batch).await?;
            summary.batches += 1;
        }
        info!(
            "Stream {} closed after {} batch(es), {} record(s) written",
            receiver.name(),
            summary.batches,
            summary.records
        );
        Ok(summary)
    }
}

/// Runs a producer and a consumer for one date range, connected by an
/// in-process stream.
///
/// The consumer runs on its own task. When both sides fail, the consumer's
/// error is returned.
pub async fn run_local<S>(
    config: &PipelineConfig,
    source: Arc<dyn RecordSource>,
    store: Arc<S>,
    start: NaiveDate,
    end: NaiveDate,
    observer: Arc<dyn PipelineObserver>,
) -> Result<(ProducerSummary, ConsumerSummary), PipelineError>
where
    S: KeyValueStore + ?Sized + 'static,
{
    let (stream, mut receiver) = channel(STREAM_NAME, config.channel_capacity);

    let putter = WeatherPutter::new(store)
        .with_write_timeout(Some(config.write_timeout))
        .with_observer(Arc::clone(&observer));
    let consumer = Consumer::new(putter);
    let consumer_task = tokio::spawn(async move { consumer.run(&mut receiver).await });

    let producer = Producer::new(source, stream)
        .with_batch_size(config.batch_size)
        .with_observer(observer);
    let produced = producer.run(start, end).await;
    // Dropping the producer closes the stream and lets the consumer finish.
    drop(producer);

    let consumed = consumer_task.await?;
    let consumer_summary = consumed?;
    let producer_summary = produced?;
    Ok((producer_summary, consumer_summary))
}
