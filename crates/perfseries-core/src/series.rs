//! 카운터 시리즈.
//!
//! 키 하나와 그 샘플 저장소를 묶은 단위. 수집 코드는 `record`로 변경하고
//! 분석 코드는 잠근 뒤 순회/슬라이스한다.

use serde::Serialize;

use crate::error::CoreError;
use crate::models::key::SeriesKey;
use crate::models::period::TimePeriod;
use crate::models::sample::Sample;
use crate::ports::sample_store::{SampleIter, SampleStore, StoreState};
use crate::slice::SliceView;

/// 이름 붙은 샘플 시리즈
pub struct CounterSeries {
    key: SeriesKey,
    store: Box<dyn SampleStore>,
}

/// 잠긴 시리즈 한 번 순회로 얻는 요약
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub count: u64,
    pub hits: u64,
    pub min_duration: Option<u64>,
    pub max_duration: Option<u64>,
    pub mean_duration: Option<f64>,
    pub period: Option<TimePeriod>,
}

impl CounterSeries {
    pub fn new(key: SeriesKey, store: Box<dyn SampleStore>) -> Self {
        Self { key, store }
    }

    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    /// 샘플 기록 (히트 수 1)
    pub fn record(&mut self, timestamp: u64, duration: u64) -> Result<(), CoreError> {
        self.store.record(Sample::new(timestamp, duration))
    }

    pub fn record_sample(&mut self, sample: Sample) -> Result<(), CoreError> {
        self.store.record(sample)
    }

    pub fn len(&self) -> Result<u64, CoreError> {
        self.store.len()
    }

    pub fn is_empty(&self) -> Result<bool, CoreError> {
        self.store.is_empty()
    }

    pub fn time_period(&self) -> Result<Option<TimePeriod>, CoreError> {
        self.store.time_period()
    }

    pub fn is_locked(&self) -> bool {
        self.store.state() == StoreState::Locked
    }

    pub fn lock(&mut self) -> Result<(), CoreError> {
        self.store.lock()
    }

    /// 잠근 뒤 오름차순 순회
    pub fn samples(&mut self) -> Result<SampleIter<'_>, CoreError> {
        self.store.samples()
    }

    /// 잠근 뒤 구간 슬라이스
    pub fn time_slice(&mut self, period: TimePeriod) -> Result<SliceView<'_>, CoreError> {
        self.store.lock()?;
        self.store.time_slice(period)
    }

    /// 이미 잠긴 시리즈 순회
    pub fn iter(&self) -> Result<SampleIter<'_>, CoreError> {
        self.store.iter()
    }

    /// 이미 잠긴 시리즈 슬라이스
    pub fn slice(&self, period: TimePeriod) -> Result<SliceView<'_>, CoreError> {
        self.store.time_slice(period)
    }

    pub fn store(&self) -> &dyn SampleStore {
        self.store.as_ref()
    }

    /// 건수, 히트 합계, 소요 시간 최소/최대/평균
    pub fn summary(&self) -> Result<SeriesSummary, CoreError> {
        let mut count = 0u64;
        let mut hits = 0u64;
        let mut total = 0u128;
        let mut min: Option<u64> = None;
        let mut max: Option<u64> = None;

        for sample in self.iter()? {
            let sample = sample?;
            count += 1;
            hits += u64::from(sample.hit_count);
            total += u128::from(sample.duration);
            min = Some(min.map_or(sample.duration, |m| m.min(sample.duration)));
            max = Some(max.map_or(sample.duration, |m| m.max(sample.duration)));
        }

        Ok(SeriesSummary {
            count,
            hits,
            min_duration: min,
            max_duration: max,
            mean_duration: (count > 0).then(|| total as f64 / count as f64),
            period: self.time_period()?,
        })
    }
}

impl std::fmt::Debug for CounterSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterSeries")
            .field("key", &self.key)
            .field("state", &self.store.state())
            .finish()
    }
}
