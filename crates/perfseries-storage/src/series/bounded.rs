//! 카디널리티 상한 데코레이터.
//!
//! 키 수가 상한에 도달하면 처음 보는 키는 메타데이터만 유지한 OVERFLOW 키로 합쳐진다.
//! 상한 도달 전부터 있던 키는 계속 자기 시리즈에 쌓인다. total은 항상 정확하다.

use std::borrow::Cow;

use perfseries_core::error::CoreError;
use perfseries_core::models::key::SeriesKey;
use perfseries_core::models::sample::Sample;
use perfseries_core::ports::series_store::SeriesStore;
use perfseries_core::series::CounterSeries;
use tracing::warn;

use super::read_only::ReadOnlySeriesStore;

/// 키 개수 상한을 강제하는 시리즈 저장소
pub struct BoundedSeriesStore {
    inner: Box<dyn SeriesStore>,
    max_unique_counters: usize,
    overflow_reported: bool,
}

impl BoundedSeriesStore {
    pub fn new(
        inner: Box<dyn SeriesStore>,
        max_unique_counters: usize,
    ) -> Result<Self, CoreError> {
        if max_unique_counters == 0 {
            return Err(CoreError::Validation {
                field: "max_unique_counters".to_string(),
                message: "1 이상이어야 합니다".to_string(),
            });
        }
        Ok(Self {
            inner,
            max_unique_counters,
            overflow_reported: false,
        })
    }

    /// 모든 시리즈를 잠그고 읽기 전용으로 전환
    pub fn into_read_only(self) -> Result<ReadOnlySeriesStore, CoreError> {
        ReadOnlySeriesStore::new(Box::new(self))
    }

    fn report_overflow(&mut self, key: &SeriesKey) {
        if !self.overflow_reported {
            warn!(
                "{}: 시리즈 키 상한 {} 도달, 이후 새 키는 OVERFLOW로 합산 (첫 키: {key})",
                self.inner.name(),
                self.max_unique_counters
            );
            self.overflow_reported = true;
        }
    }
}

impl SeriesStore for BoundedSeriesStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn add(&mut self, key: &SeriesKey, sample: Sample) -> Result<(), CoreError> {
        let target = self.resolve_key(key);
        if let Cow::Owned(_) = target {
            self.report_overflow(key);
        }
        self.inner.add(&target, sample)
    }

    fn ensure_series(&mut self, key: &SeriesKey) -> Result<(), CoreError> {
        let target = self.resolve_key(key);
        self.inner.ensure_series(&target)
    }

    fn resolve_key<'k>(&self, key: &'k SeriesKey) -> Cow<'k, SeriesKey> {
        if self.inner.contains(key) || !self.is_overflowing() {
            Cow::Borrowed(key)
        } else {
            Cow::Owned(SeriesKey::overflow_of(key))
        }
    }

    fn get(&self, key: &SeriesKey) -> Option<&CounterSeries> {
        self.inner.get(key)
    }

    fn keys(&self) -> Vec<&SeriesKey> {
        self.inner.keys()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn is_overflowing(&self) -> bool {
        self.inner.len() >= self.max_unique_counters
    }

    fn max_unique_counters(&self) -> Option<usize> {
        Some(self.max_unique_counters)
    }

    fn total(&self) -> &CounterSeries {
        self.inner.total()
    }

    fn series(&self) -> Box<dyn Iterator<Item = &CounterSeries> + '_> {
        self.inner.series()
    }

    fn lock_all(&mut self) -> Result<(), CoreError> {
        self.inner.lock_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::KeyedSeriesStore;
    use perfseries_core::models::period::TimePeriod;

    fn bounded(max: usize) -> BoundedSeriesStore {
        BoundedSeriesStore::new(
            Box::new(KeyedSeriesStore::in_memory("success", TimePeriod::unbounded())),
            max,
        )
        .unwrap()
    }

    fn names(store: &dyn SeriesStore) -> Vec<String> {
        store.keys().iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn third_key_goes_to_overflow() {
        let mut store = bounded(2);
        store.add(&"X".into(), Sample::new(1, 1)).unwrap();
        store.add(&"Y".into(), Sample::new(2, 1)).unwrap();
        assert!(store.is_overflowing());
        store.add(&"Z".into(), Sample::new(3, 7)).unwrap();

        assert_eq!(names(&store), vec!["X", "Y", "OVERFLOW"]);
        assert!(!store.contains(&"Z".into()));

        store.lock_all().unwrap();
        let overflow = store.get(&"OVERFLOW".into()).unwrap();
        let samples: Vec<_> = overflow.iter().unwrap().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![Sample::new(3, 7)]);
        assert_eq!(store.total().len().unwrap(), 3);
    }

    #[test]
    fn tracked_keys_keep_their_identity() {
        let mut store = bounded(2);
        store.add(&"X".into(), Sample::new(1, 1)).unwrap();
        store.add(&"Y".into(), Sample::new(2, 1)).unwrap();
        store.add(&"Z".into(), Sample::new(3, 1)).unwrap();
        store.add(&"X".into(), Sample::new(4, 1)).unwrap();

        assert_eq!(store.get(&"X".into()).unwrap().len().unwrap(), 2);
        assert_eq!(store.total().len().unwrap(), 4);
    }

    #[test]
    fn overflow_preserves_metadata() {
        let mut store = bounded(1);
        store.add(&"X".into(), Sample::new(1, 1)).unwrap();

        let get = SeriesKey::new("/late").with_field("method", "GET");
        let post = SeriesKey::new("/later").with_field("method", "POST");
        store.add(&get, Sample::new(2, 1)).unwrap();
        store.add(&post, Sample::new(3, 1)).unwrap();
        store.add(&SeriesKey::new("/other").with_field("method", "GET"), Sample::new(4, 1))
            .unwrap();

        let overflow_get = SeriesKey::overflow_of(&get);
        assert_eq!(store.get(&overflow_get).unwrap().len().unwrap(), 2);
        assert!(store.contains(&SeriesKey::overflow_of(&post)));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn ensure_series_respects_bound() {
        let mut store = bounded(1);
        store.ensure_series(&"A".into()).unwrap();
        store.ensure_series(&"B".into()).unwrap();
        assert_eq!(names(&store), vec!["A", "OVERFLOW"]);
        assert!(store.total().is_empty().unwrap());
    }

    #[test]
    fn zero_bound_rejected() {
        let inner = Box::new(KeyedSeriesStore::in_memory("s", TimePeriod::unbounded()));
        assert!(BoundedSeriesStore::new(inner, 0).is_err());
    }
}
