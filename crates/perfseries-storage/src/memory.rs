//! 인메모리 샘플 저장소.
//!
//! 추가 순서가 타임스탬프 오름차순인 동안은 정렬 없이 그대로 내주고,
//! 한 번이라도 역순 추가가 있으면 잠금 시 안정 정렬한다.

use perfseries_core::error::CoreError;
use perfseries_core::models::period::TimePeriod;
use perfseries_core::models::sample::Sample;
use perfseries_core::ports::sample_store::{not_locked, SampleIter, SampleStore, StoreState};

/// 메모리 벡터 기반 샘플 저장소
///
/// 디스크/DB 백엔드와 달리 잠금 후 기록도 허용한다. 순서를 깨는 기록이면
/// 다시 `Writable`로 돌아가고 다음 잠금에서 재정렬된다.
#[derive(Debug)]
pub struct InMemorySampleStore {
    samples: Vec<Sample>,
    is_ordered: bool,
    locked: bool,
    bounds: Option<(u64, u64)>,
    filter: TimePeriod,
}

impl InMemorySampleStore {
    pub fn new() -> Self {
        Self::with_filter(TimePeriod::unbounded())
    }

    /// 구간 밖 샘플은 기록 시 버린다
    pub fn with_filter(filter: TimePeriod) -> Self {
        Self {
            samples: Vec::new(),
            is_ordered: true,
            locked: false,
            bounds: None,
            filter,
        }
    }
}

impl Default for InMemorySampleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleStore for InMemorySampleStore {
    fn record(&mut self, sample: Sample) -> Result<(), CoreError> {
        sample.validate()?;
        if !self.filter.contains(sample.timestamp) {
            return Ok(());
        }

        if let Some(last) = self.samples.last() {
            if sample.timestamp < last.timestamp {
                self.is_ordered = false;
            }
        }
        self.samples.push(sample);

        let ts = sample.timestamp;
        self.bounds = Some(match self.bounds {
            Some((min, max)) => (min.min(ts), max.max(ts)),
            None => (ts, ts),
        });
        Ok(())
    }

    fn len(&self) -> Result<u64, CoreError> {
        Ok(self.samples.len() as u64)
    }

    fn time_period(&self) -> Result<Option<TimePeriod>, CoreError> {
        Ok(self.bounds.map(|(min, max)| TimePeriod::new(min, max)))
    }

    fn state(&self) -> StoreState {
        if self.locked && self.is_ordered {
            StoreState::Locked
        } else {
            StoreState::Writable
        }
    }

    fn lock(&mut self) -> Result<(), CoreError> {
        if !self.is_ordered {
            // sort_by는 안정 정렬: 같은 타임스탬프는 추가 순서 유지
            self.samples.sort_by(Sample::cmp_by_time);
            self.is_ordered = true;
        }
        self.locked = true;
        Ok(())
    }

    fn iter(&self) -> Result<SampleIter<'_>, CoreError> {
        if self.state() != StoreState::Locked {
            return Err(not_locked("인메모리 저장소"));
        }
        Ok(Box::new(self.samples.iter().copied().map(Ok)))
    }
}
