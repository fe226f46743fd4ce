use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::SampleRecord;

/// Append-only, bounded log of sampler records in firing order.
///
/// Appending to a full log evicts the oldest record.
#[derive(Debug, Clone)]
pub struct SampleLog {
    inner: Arc<Mutex<LogInner>>,
}

#[derive(Debug)]
struct LogInner {
    records: VecDeque<SampleRecord>,
    capacity: usize,
    evicted: u64,
}

impl SampleLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(LogInner {
                records: VecDeque::with_capacity(capacity.min(4_096)),
                capacity,
                evicted: 0,
            })),
        }
    }

    pub fn append(&self, record: SampleRecord) {
        let mut inner = self.lock();
        if inner.records.len() == inner.capacity {
            inner.records.pop_front();
            inner.evicted = inner.evicted.saturating_add(1);
        }
        inner.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Number of records dropped by the retention bound.
    pub fn evicted(&self) -> u64 {
        self.lock().evicted
    }

    pub fn latest(&self) -> Option<SampleRecord> {
        self.lock().records.back().cloned()
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<SampleRecord> {
        self.lock().records.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, FixedOffset, TimeZone};

    use super::*;

    fn record(minute: u32, value: i32) -> SampleRecord {
        let at = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 14, 9, minute, 0)
            .unwrap();
        SampleRecord::new(at, value)
    }

    #[test]
    fn keeps_insertion_order() {
        let log = SampleLog::with_capacity(10);
        for minute in 0..5 {
            log.append(record(minute, minute as i32));
        }

        let values: Vec<i32> = log.snapshot().iter().map(|r| r.value).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
        assert_eq!(log.latest().map(|r| r.value), Some(4));
    }

    #[test]
    fn evicts_oldest_when_full() {
        let log = SampleLog::with_capacity(3);
        for minute in 0..5 {
            log.append(record(minute, minute as i32));
        }

        let snapshot = log.snapshot();
        assert_eq!(log.len(), 3);
        assert_eq!(log.evicted(), 2);
        assert_eq!(snapshot.first().map(|r| r.value), Some(2));
        assert!(snapshot
            .windows(2)
            .all(|pair| pair[1].taken_at - pair[0].taken_at == Duration::minutes(1)));
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let log = SampleLog::with_capacity(0);
        log.append(record(0, 1));
        log.append(record(1, 2));
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.snapshot().len(), 1);
    }

    #[test]
    fn timestamp_uses_twelve_hour_display_format() {
        assert_eq!(record(5, 40).timestamp, "09:05 AM 14/Mar/2026");
    }
}
