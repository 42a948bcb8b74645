//! 시간 구간 슬라이스 뷰.
//!
//! 잠긴 샘플 저장소를 `[start, end)`로 제한한 읽기 전용 투영.
//! 원본 순회가 오름차순이므로 end 이상 샘플을 만나면 바로 멈춘다.

use crate::error::CoreError;
use crate::models::period::TimePeriod;
use crate::models::sample::Sample;
use crate::ports::sample_store::{not_locked, SampleIter, SampleStore, StoreState};

/// 샘플 저장소의 시간 구간 뷰
pub struct SliceView<'a> {
    source: &'a dyn SampleStore,
    period: TimePeriod,
    len: u64,
    bounds: Option<(u64, u64)>,
}

impl<'a> SliceView<'a> {
    /// 슬라이스 생성
    ///
    /// 원본 기간이 구간에 완전히 포함되면 크기를 그대로 가져오고(O(1)),
    /// 아니면 원본을 end까지 한 번 훑어 센다.
    pub fn new(source: &'a dyn SampleStore, period: TimePeriod) -> Result<Self, CoreError> {
        if source.state() != StoreState::Locked {
            return Err(not_locked("슬라이스"));
        }

        let (len, bounds) = match source.time_period()? {
            None => (0, None),
            Some(p) if period.covers_samples(p.start, p.end) => {
                (source.len()?, Some((p.start, p.end)))
            }
            Some(_) => scan(source, period)?,
        };

        Ok(Self {
            source,
            period,
            len,
            bounds,
        })
    }

    pub fn period(&self) -> TimePeriod {
        self.period
    }

    /// 더 좁은 슬라이스. 원본을 직접 다시 자르므로 중첩 비용이 없다.
    pub fn time_slice(&self, period: TimePeriod) -> Result<SliceView<'a>, CoreError> {
        SliceView::new(self.source, self.period.intersect(&period))
    }

    /// 슬라이스 샘플 목록 (테스트/소형 리포트용)
    pub fn to_vec(&self) -> Result<Vec<Sample>, CoreError> {
        self.iter()?.collect()
    }
}

fn scan(
    source: &dyn SampleStore,
    period: TimePeriod,
) -> Result<(u64, Option<(u64, u64)>), CoreError> {
    let mut count = 0;
    let mut bounds: Option<(u64, u64)> = None;
    for sample in source.iter()? {
        let ts = sample?.timestamp;
        if ts >= period.end {
            break;
        }
        if ts >= period.start {
            count += 1;
            bounds = Some(match bounds {
                Some((first, _)) => (first, ts),
                None => (ts, ts),
            });
        }
    }
    Ok((count, bounds))
}

impl SampleStore for SliceView<'_> {
    fn record(&mut self, _sample: Sample) -> Result<(), CoreError> {
        Err(CoreError::Usage(
            "슬라이스 뷰는 읽기 전용입니다".to_string(),
        ))
    }

    fn len(&self) -> Result<u64, CoreError> {
        Ok(self.len)
    }

    fn time_period(&self) -> Result<Option<TimePeriod>, CoreError> {
        Ok(self
            .bounds
            .map(|(first, last)| TimePeriod::new(first, last)))
    }

    fn state(&self) -> StoreState {
        StoreState::Locked
    }

    fn lock(&mut self) -> Result<(), CoreError> {
        Ok(())
    }

    fn iter(&self) -> Result<SampleIter<'_>, CoreError> {
        let period = self.period;
        let inner = self.source.iter()?;
        Ok(Box::new(
            inner
                .filter(move |r| r.as_ref().map_or(true, |s| s.timestamp >= period.start))
                .take_while(move |r| r.as_ref().map_or(true, |s| s.timestamp < period.end)),
        ))
    }
}
