//! 읽기 전용 데코레이터.
//!
//! 생성 시 내부 저장소의 모든 시리즈를 잠근다. 이후 추가는 모두 사용 오류.

use perfseries_core::error::CoreError;
use perfseries_core::models::key::SeriesKey;
use perfseries_core::models::sample::Sample;
use perfseries_core::ports::series_store::SeriesStore;
use perfseries_core::series::CounterSeries;

/// 리포트 코드에 넘기는 변경 불가 저장소
pub struct ReadOnlySeriesStore {
    inner: Box<dyn SeriesStore>,
}

impl ReadOnlySeriesStore {
    pub fn new(mut inner: Box<dyn SeriesStore>) -> Result<Self, CoreError> {
        inner.lock_all()?;
        Ok(Self { inner })
    }

    fn rejected(&self) -> CoreError {
        CoreError::Usage(format!(
            "{}: 읽기 전용 저장소는 변경할 수 없습니다",
            self.inner.name()
        ))
    }
}

impl SeriesStore for ReadOnlySeriesStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn add(&mut self, _key: &SeriesKey, _sample: Sample) -> Result<(), CoreError> {
        Err(self.rejected())
    }

    fn ensure_series(&mut self, _key: &SeriesKey) -> Result<(), CoreError> {
        Err(self.rejected())
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
        self.inner.is_overflowing()
    }

    fn max_unique_counters(&self) -> Option<usize> {
        self.inner.max_unique_counters()
    }

    fn total(&self) -> &CounterSeries {
        self.inner.total()
    }

    fn series(&self) -> Box<dyn Iterator<Item = &CounterSeries> + '_> {
        self.inner.series()
    }

    fn lock_all(&mut self) -> Result<(), CoreError> {
        Ok(())
    }
}
