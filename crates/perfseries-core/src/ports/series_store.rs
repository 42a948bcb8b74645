//! 시리즈 저장소 포트.
//!
//! 키별 `CounterSeries` 모음 + 모든 추가를 합산하는 total 시리즈.

use std::borrow::Cow;

use crate::error::CoreError;
use crate::models::key::SeriesKey;
use crate::models::sample::Sample;
use crate::series::CounterSeries;

/// 키 → 시리즈 저장소
pub trait SeriesStore {
    fn name(&self) -> &str;

    /// `key`의 시리즈(없으면 생성)와 total 시리즈에 샘플 기록
    fn add(&mut self, key: &SeriesKey, sample: Sample) -> Result<(), CoreError>;

    /// 샘플 없이 빈 시리즈만 생성 (이미 있으면 무시, total 불변)
    fn ensure_series(&mut self, key: &SeriesKey) -> Result<(), CoreError>;

    /// `add(key)`가 실제로 기록할 키. 카디널리티 제한이 없으면 그대로.
    fn resolve_key<'k>(&self, key: &'k SeriesKey) -> Cow<'k, SeriesKey> {
        Cow::Borrowed(key)
    }

    fn get(&self, key: &SeriesKey) -> Option<&CounterSeries>;

    fn contains(&self, key: &SeriesKey) -> bool {
        self.get(key).is_some()
    }

    /// 키 목록 (생성 순서)
    fn keys(&self) -> Vec<&SeriesKey>;

    /// 키별 시리즈 수 (total 제외)
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 카디널리티 상한 도달 여부
    fn is_overflowing(&self) -> bool {
        false
    }

    /// 카디널리티 상한 (None이면 무제한)
    fn max_unique_counters(&self) -> Option<usize> {
        None
    }

    fn total(&self) -> &CounterSeries;

    /// 키별 시리즈 순회 (생성 순서, total 제외)
    fn series(&self) -> Box<dyn Iterator<Item = &CounterSeries> + '_>;

    /// 모든 시리즈(total 포함)를 읽기 상태로 전이
    fn lock_all(&mut self) -> Result<(), CoreError>;
}
