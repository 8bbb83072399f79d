use crate::error::PipelineError;
use chrono::{Days, NaiveDate};
use log::{info, warn};
use std::future::Future;
use std::time::Duration;

/// Default pause between two backfill days.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Iterator over calendar days from `start` to `end`, both inclusive.
#[derive(Debug, Clone)]
pub struct DayRange {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl DayRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            next: (start <= end).then_some(start),
            end,
        }
    }
}

impl Iterator for DayRange {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let day = self.next?;
        self.next = day
            .checked_add_days(Days::new(1))
            .filter(|next| *next <= self.end);
        Some(day)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillSummary {
    pub succeeded: usize,
    /// Days whose run failed, in order.
    pub failed_days: Vec<NaiveDate>,
}

impl BackfillSummary {
    pub fn is_complete(&self) -> bool {
        self.failed_days.is_empty()
    }
}

/// Runs `run_day` once for every day from `start` to `end`, pausing
/// `cooldown` between runs.
///
/// A failing day is logged and recorded, and the backfill moves on to the
/// next day.
pub async fn backfill<F, Fut, T>(
    start: NaiveDate,
    end: NaiveDate,
    cooldown: Duration,
    mut run_day: F,
) -> Result<BackfillSummary, PipelineError>
where
    F: FnMut(NaiveDate) -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    if start > end {
        return Err(PipelineError::InvalidDateRange { start, end });
    }

    let mut summary = BackfillSummary::default();
    for (i, day) in DayRange::new(start, end).enumerate() {
        if i > 0 && !cooldown.is_zero() {
            info!("Sleeping for {:?} before the next day", cooldown);
            tokio::time::sleep(cooldown).await;
        }

        info!("Running pipeline for {}", day);
        match run_day(day).await {
            Ok(_) => summary.succeeded += 1,
            Err(e) => {
                let hint = if e.is_retryable() { " (retryable)" } else { "" };
                warn!("Pipeline run for {} failed{}: {}", day, hint, e);
                summary.failed_days.push(day);
            }
        }
    }

    info!(
        "Backfill finished: {} day(s) succeeded, {} failed",
        summary.succeeded,
        summary.failed_days.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, m, d).unwrap()
    }

    #[test]
    fn test_day_range_is_inclusive() {
        let days: Vec<_> = DayRange::new(day(9, 29), day(10, 2)).collect();
        assert_eq!(days, [day(9, 29), day(9, 30), day(10, 1), day(10, 2)]);

        assert_eq!(DayRange::new(day(10, 1), day(10, 1)).count(), 1);
        assert_eq!(DayRange::new(day(10, 2), day(10, 1)).count(), 0);
    }

    #[tokio::test]
    async fn test_backfill_visits_each_day_once() -> Result<(), PipelineError> {
        let visited = Arc::new(Mutex::new(Vec::new()));
        let summary = backfill(day(10, 1), day(10, 3), Duration::ZERO, |d| {
            let visited = Arc::clone(&visited);
            async move {
                visited.lock().unwrap().push(d);
                Ok::<_, PipelineError>(())
            }
        })
        .await?;

        assert_eq!(*visited.lock().unwrap(), [day(10, 1), day(10, 2), day(10, 3)]);
        assert_eq!(summary.succeeded, 3);
        assert!(summary.is_complete());
        Ok(())
    }

    #[tokio::test]
    async fn test_backfill_records_failed_days_and_continues() -> Result<(), PipelineError> {
        let summary = backfill(day(10, 1), day(10, 4), Duration::ZERO, |d| async move {
            if d == day(10, 2) {
                Err(PipelineError::MissingConfig("boom".to_string()))
            } else {
                Ok(())
            }
        })
        .await?;

        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed_days, [day(10, 2)]);
        assert!(!summary.is_complete());
        Ok(())
    }

    #[tokio::test]
    async fn test_backfill_cools_down_between_days() -> Result<(), PipelineError> {
        let cooldown = Duration::from_millis(20);
        let started = tokio::time::Instant::now();
        backfill(day(10, 1), day(10, 3), cooldown, |_| async {
            Ok::<_, PipelineError>(())
        })
        .await?;
        assert!(started.elapsed() >= cooldown * 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_backfill_rejects_reversed_range() {
        let result = backfill(day(10, 2), day(10, 1), Duration::ZERO, |_| async {
            Ok::<_, PipelineError>(())
        })
        .await;
        assert!(matches!(result, Err(PipelineError::InvalidDateRange { .. })));
    }
}
