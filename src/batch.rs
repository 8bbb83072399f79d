//! Size-bounded batching for stream delivery.
//!
//! [`StreamBatcher`] is a push-based accumulator: every push that fills a
//! batch hands it back immediately so the caller can deliver it before
//! reading more input. [`batches`] wraps the same logic as a lazy iterator.

/// Maximum number of records per stream delivery call.
pub const MAX_BATCH_SIZE: usize = 500;

/// Accumulates items into batches of at most `max_size`.
#[derive(Debug)]
pub struct StreamBatcher<T> {
    max_size: usize,
    pending: Vec<T>,
    flushed: usize,
}

impl<T> Default for StreamBatcher<T> {
    fn default() -> Self {
        Self::new(MAX_BATCH_SIZE)
    }
}

impl<T> StreamBatcher<T> {
    /// Creates a batcher. A `max_size` of zero is treated as one.
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            max_size,
            pending: Vec::with_capacity(max_size),
            flushed: 0,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Total number of items handed out in batches so far.
    pub fn flushed(&self) -> usize {
        self.flushed
    }

    /// Number of items waiting for the next batch.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Adds an item, returning a full batch as soon as one is complete.
    pub fn push(&mut self, item: T) -> Option<Vec<T>> {
        self.pending.push(item);
        if self.pending.len() >= self.max_size {
            Some(self.take())
        } else {
            None
        }
    }

    /// Returns the remaining partial batch, if any.
    pub fn finish(&mut self) -> Option<Vec<T>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> Vec<T> {
        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.max_size));
        self.flushed += batch.len();
        batch
    }
}

/// Lazy iterator over the batches of an input iterator.
pub struct Batches<I: Iterator> {
    inner: I,
    batcher: StreamBatcher<I::Item>,
    done: bool,
}

impl<I: Iterator> Batches<I> {
    /// Items yielded in batches so far.
    pub fn flushed(&self) -> usize {
        self.batcher.flushed()
    }
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        for item in self.inner.by_ref() {
            if let Some(batch) = self.batcher.push(item) {
                return Some(batch);
            }
        }
        self.done = true;
        self.batcher.finish()
    }
}

/// Groups `items` into batches of at most `max_size`, preserving order.
///
/// # Examples
///
/// ```
/// use weather_pipeline::batches;
///
/// let sizes: Vec<usize> = batches(0..1200, 500).map(|b| b.len()).collect();
/// assert_eq!(sizes, [500, 500, 200]);
/// ```
pub fn batches<I: IntoIterator>(items: I, max_size: usize) -> Batches<I::IntoIter> {
    Batches {
        inner: items.into_iter(),
        batcher: StreamBatcher::new(max_size),
        done: false,
    }
}
