//! Offset/limit pagination over a remote paged API.
//!
//! [`PaginatedFetcher::fetch_all`] turns a request function into one flat,
//! lazy stream of items. Each call starts a new session with its own
//! [`PageCursor`], so a failed session can be retried by simply calling it
//! again.

use crate::fetch::error::FetchError;
use crate::observe::{noop, PipelineObserver};
use crate::types::page::{CursorError, Page, PageCursor};
use futures_util::{stream, Stream, TryStreamExt};
use log::{debug, info};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default pause between consecutive page requests.
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(1);

/// Drives a paged API until exhaustion, pausing between requests.
#[derive(Clone)]
pub struct PaginatedFetcher {
    throttle: Duration,
    request_timeout: Option<Duration>,
    observer: Arc<dyn PipelineObserver>,
}

impl Default for PaginatedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PaginatedFetcher {
    pub fn new() -> Self {
        Self {
            throttle: DEFAULT_THROTTLE,
            request_timeout: None,
            observer: noop(),
        }
    }

    /// Sets the fixed pause awaited between two page requests.
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Sets a deadline for every single page request.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn throttle(&self) -> Duration {
        self.throttle
    }

    /// Fetches every page reachable through `request` and yields their items in order.
    ///
    /// `request` is called with the offset of the page to fetch, starting at
    /// zero. After each page the next offset is `metadata.offset +
    /// metadata.limit`; the session ends once that reaches `metadata.count`.
    /// Pages with no results do not end the session on their own.
    ///
    /// The first error ends the stream. Nothing is retried.
    pub fn fetch_all<T, F, Fut>(&self, request: F) -> impl Stream<Item = Result<T, FetchError>>
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = Result<Page<T>, FetchError>>,
    {
        let session = FetchSession {
            request,
            cursor: PageCursor::new(),
            throttle: self.throttle,
            request_timeout: self.request_timeout,
            observer: Arc::clone(&self.observer),
        };

        stream::try_unfold(session, |mut session| async move {
            if session.cursor.is_exhausted() {
                return Ok(None);
            }
            let results = session.next_page().await?;
            Ok::<_, FetchError>(Some((results, session)))
        })
        .map_ok(|results| stream::iter(results.into_iter().map(Ok::<T, FetchError>)))
        .try_flatten()
    }
}

struct FetchSession<F> {
    request: F,
    cursor: PageCursor,
    throttle: Duration,
    request_timeout: Option<Duration>,
    observer: Arc<dyn PipelineObserver>,
}

impl<F> FetchSession<F> {
    async fn next_page<T, Fut>(&mut self) -> Result<Vec<T>, FetchError>
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = Result<Page<T>, FetchError>>,
    {
        let offset = self.cursor.offset();
        if self.cursor.requests() > 0 && !self.throttle.is_zero() {
            debug!("Sleeping {:?} to throttle the request rate", self.throttle);
            tokio::time::sleep(self.throttle).await;
        }

        info!("Requesting page at offset {}", offset);
        self.observer.page_requested(offset);

        let pending = (self.request)(offset);
        let page = match self.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, pending)
                .await
                .map_err(|_| FetchError::Timeout { offset, timeout })??,
            None => pending.await?,
        };

        let more = self
            .cursor
            .advance(&page.metadata)
            .map_err(|e| FetchError::MalformedMetadata {
                offset,
                reason: match e {
                    CursorError::ZeroLimit => "page limit is zero".to_string(),
                    CursorError::OffsetRegressed {
                        requested,
                        reported,
                    } => format!("reported offset {reported} is behind requested offset {requested}"),
                    CursorError::OffsetOverflow { offset, limit } => {
                        format!("offset {offset} plus limit {limit} overflows")
                    }
                },
            })?;
        debug!(
            "Received {} result(s) at offset {} of {} (more pages: {})",
            page.results.len(),
            page.metadata.offset,
            page.metadata.count,
            more
        );

        Ok(page.results)
    }
}
