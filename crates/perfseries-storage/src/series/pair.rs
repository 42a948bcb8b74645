//! 성공/실패 시리즈 저장소 쌍.
//!
//! 어느 쪽이든 새 키를 먼저 보면 반대쪽에 빈 시리즈를 즉시 만든다.
//! 매 변경 뒤 두 쪽의 키 수와 상한 도달 여부가 같아야 한다.

use perfseries_core::error::CoreError;
use perfseries_core::models::key::SeriesKey;
use perfseries_core::models::sample::Sample;
use perfseries_core::ports::series_store::SeriesStore;
use tracing::debug;

use super::bounded::BoundedSeriesStore;
use super::read_only::ReadOnlySeriesStore;

/// 키 집합이 항상 같은 성공/실패 저장소
pub struct SeriesStorePair {
    success: BoundedSeriesStore,
    failure: BoundedSeriesStore,
}

impl std::fmt::Debug for SeriesStorePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeriesStorePair")
            .field("success", &self.success.name())
            .field("failure", &self.failure.name())
            .finish_non_exhaustive()
    }
}

/// 읽기 전용으로 전환된 쌍
pub struct ReadOnlyPair {
    pub success: ReadOnlySeriesStore,
    pub failure: ReadOnlySeriesStore,
}

impl SeriesStorePair {
    /// 두 저장소의 상한이 다르면 설정 에러. 기존 키(DB 재사용)는 양쪽으로 맞춘다.
    pub fn new(
        success: BoundedSeriesStore,
        failure: BoundedSeriesStore,
    ) -> Result<Self, CoreError> {
        if success.max_unique_counters() != failure.max_unique_counters() {
            return Err(CoreError::Config(format!(
                "성공/실패 저장소 상한 불일치: {} = {:?}, {} = {:?}",
                success.name(),
                success.max_unique_counters(),
                failure.name(),
                failure.max_unique_counters()
            )));
        }

        let mut pair = Self { success, failure };
        pair.sync_existing_keys()?;
        Ok(pair)
    }

    fn sync_existing_keys(&mut self) -> Result<(), CoreError> {
        let missing_in_failure: Vec<SeriesKey> = self
            .success
            .keys()
            .into_iter()
            .filter(|k| !self.failure.contains(k))
            .cloned()
            .collect();
        let missing_in_success: Vec<SeriesKey> = self
            .failure
            .keys()
            .into_iter()
            .filter(|k| !self.success.contains(k))
            .cloned()
            .collect();

        for key in &missing_in_failure {
            self.failure.ensure_series(key)?;
        }
        for key in &missing_in_success {
            self.success.ensure_series(key)?;
        }
        if !missing_in_failure.is_empty() || !missing_in_success.is_empty() {
            debug!(
                "저장소 쌍 키 동기화: 실패측 +{}, 성공측 +{}",
                missing_in_failure.len(),
                missing_in_success.len()
            );
        }
        self.check_invariants()
    }

    /// 성공 샘플 기록
    pub fn add_success(
        &mut self,
        key: &SeriesKey,
        timestamp: u64,
        duration: u64,
    ) -> Result<(), CoreError> {
        self.add_success_sample(key, Sample::new(timestamp, duration))
    }

    /// 실패 샘플 기록
    pub fn add_failure(
        &mut self,
        key: &SeriesKey,
        timestamp: u64,
        duration: u64,
    ) -> Result<(), CoreError> {
        self.add_failure_sample(key, Sample::new(timestamp, duration))
    }

    pub fn add_success_sample(&mut self, key: &SeriesKey, sample: Sample) -> Result<(), CoreError> {
        add_mirrored(&mut self.success, &mut self.failure, key, sample)?;
        self.check_invariants()
    }

    pub fn add_failure_sample(&mut self, key: &SeriesKey, sample: Sample) -> Result<(), CoreError> {
        add_mirrored(&mut self.failure, &mut self.success, key, sample)?;
        self.check_invariants()
    }

    pub fn success(&self) -> &BoundedSeriesStore {
        &self.success
    }

    pub fn failure(&self) -> &BoundedSeriesStore {
        &self.failure
    }

    /// 양쪽 모두 잠그고 읽기 전용으로 전환
    pub fn into_read_only(self) -> Result<ReadOnlyPair, CoreError> {
        Ok(ReadOnlyPair {
            success: self.success.into_read_only()?,
            failure: self.failure.into_read_only()?,
        })
    }

    fn check_invariants(&self) -> Result<(), CoreError> {
        if self.success.is_overflowing() != self.failure.is_overflowing() {
            return Err(CoreError::Invariant(format!(
                "상한 도달 상태 불일치: {}={}, {}={}",
                self.success.name(),
                self.success.is_overflowing(),
                self.failure.name(),
                self.failure.is_overflowing()
            )));
        }
        if self.success.len() != self.failure.len() {
            return Err(CoreError::Invariant(format!(
                "키 수 불일치: {}={}, {}={}",
                self.success.name(),
                self.success.len(),
                self.failure.name(),
                self.failure.len()
            )));
        }
        Ok(())
    }
}

/// `primary`에 기록하고, 실제 기록된 키를 `mirror`에도 빈 시리즈로 만든다
fn add_mirrored(
    primary: &mut BoundedSeriesStore,
    mirror: &mut BoundedSeriesStore,
    key: &SeriesKey,
    sample: Sample,
) -> Result<(), CoreError> {
    let target = primary.resolve_key(key);
    primary.add(&target, sample)?;
    if !mirror.contains(&target) {
        mirror.ensure_series(&target)?;
    }
    Ok(())
}
