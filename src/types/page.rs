use serde::Deserialize;

/// Result-set metadata reported by the remote API with every page.
///
/// Offsets are zero-based. Clients talking to an API with another offset
/// origin convert before handing pages to the fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct PageMetadata {
    /// Offset of the first item in this page.
    pub offset: u64,
    /// Page size used by the server for this page.
    pub limit: u64,
    /// Total number of items available across all pages.
    pub count: u64,
}

impl PageMetadata {
    pub fn new(offset: u64, limit: u64, count: u64) -> Self {
        Self {
            offset,
            limit,
            count,
        }
    }
}

/// One bounded response from a paged API.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub metadata: PageMetadata,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(metadata: PageMetadata, results: Vec<T>) -> Self {
        Self { metadata, results }
    }

    /// A terminal page: nothing available at all.
    pub fn empty(offset: u64, limit: u64) -> Self {
        Self {
            metadata: PageMetadata::new(offset, limit, 0),
            results: Vec::new(),
        }
    }
}

/// Why a page's metadata cannot be used to advance the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorError {
    /// The server reported a zero page size, so the offset could never move.
    ZeroLimit,
    /// The server reported an offset behind the one requested.
    OffsetRegressed { requested: u64, reported: u64 },
    /// The reported offset plus limit does not fit in a `u64`.
    OffsetOverflow { offset: u64, limit: u64 },
}

/// Pagination state for a single fetch session.
///
/// A cursor starts at offset zero, is advanced with the metadata of every
/// page received and reports exhaustion once the next offset has reached the
/// server-reported total. It is never reused across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageCursor {
    offset: u64,
    limit: Option<u64>,
    count: Option<u64>,
    requests: usize,
    exhausted: bool,
}

impl PageCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of the next page to request.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Page size reported by the last response, if any.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Total item count reported by the last response, if any.
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    /// Number of pages received so far.
    pub fn requests(&self) -> usize {
        self.requests
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Records a received page and moves to the next offset.
    ///
    /// Returns `true` while more pages remain.
    pub fn advance(&mut self, metadata: &PageMetadata) -> Result<bool, CursorError> {
        if metadata.limit == 0 {
            return Err(CursorError::ZeroLimit);
        }
        if metadata.offset < self.offset {
            return Err(CursorError::OffsetRegressed {
                requested: self.offset,
                reported: metadata.offset,
            });
        }

        let next_offset =
            metadata
                .offset
                .checked_add(metadata.limit)
                .ok_or(CursorError::OffsetOverflow {
                    offset: metadata.offset,
                    limit: metadata.limit,
                })?;
        self.offset = next_offset;
        self.limit = Some(metadata.limit);
        self.count = Some(metadata.count);
        self.requests += 1;
        self.exhausted = next_offset >= metadata.count;
        Ok(!self.exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_two_pages() {
        let mut cursor = PageCursor::new();
        assert_eq!(cursor.offset(), 0);

        assert_eq!(cursor.advance(&PageMetadata::new(0, 500, 700)), Ok(true));
        assert_eq!(cursor.offset(), 500);
        assert_eq!(cursor.count(), Some(700));

        assert_eq!(cursor.advance(&PageMetadata::new(500, 500, 700)), Ok(false));
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.requests(), 2);
    }

    #[test]
    fn test_cursor_zero_count_terminates() {
        let mut cursor = PageCursor::new();
        assert_eq!(cursor.advance(&PageMetadata::new(0, 500, 0)), Ok(false));
        assert_eq!(cursor.requests(), 1);
    }

    #[test]
    fn test_cursor_exact_multiple_needs_no_trailing_page() {
        let mut cursor = PageCursor::new();
        assert_eq!(cursor.advance(&PageMetadata::new(0, 500, 1000)), Ok(true));
        assert_eq!(cursor.advance(&PageMetadata::new(500, 500, 1000)), Ok(false));
    }

    #[test]
    fn test_cursor_rejects_bad_metadata() {
        let mut cursor = PageCursor::new();
        assert_eq!(
            cursor.advance(&PageMetadata::new(0, 0, 10)),
            Err(CursorError::ZeroLimit)
        );

        cursor.advance(&PageMetadata::new(0, 5, 10)).unwrap();
        assert_eq!(
            cursor.advance(&PageMetadata::new(0, 5, 10)),
            Err(CursorError::OffsetRegressed {
                requested: 5,
                reported: 0
            })
        );
    }

    #[test]
    fn test_cursor_rejects_overflowing_offset() {
        let mut cursor = PageCursor::new();
        assert_eq!(
            cursor.advance(&PageMetadata::new(u64::MAX - 1, 500, u64::MAX)),
            Err(CursorError::OffsetOverflow {
                offset: u64::MAX - 1,
                limit: 500
            })
        );
        assert_eq!(cursor.requests(), 0);
        assert!(!cursor.is_exhausted());
    }
}
