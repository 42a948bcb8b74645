//! 샘플 저장소 포트.
//!
//! 키 하나의 샘플을 추가 전용으로 모으고, 잠금 이후 타임스탬프 오름차순으로 내준다.

use crate::error::CoreError;
use crate::models::period::TimePeriod;
use crate::models::sample::Sample;
use crate::slice::SliceView;

/// 샘플 스트림. 디스크/DB 백엔드는 읽는 도중 실패할 수 있다.
pub type SampleIter<'a> = Box<dyn Iterator<Item = Result<Sample, CoreError>> + 'a>;

/// 쓰기 → 읽기 상태
///
/// 유일한 전이는 `Writable → Locked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Writable,
    Locked,
}

/// 한 시리즈의 샘플 저장소
pub trait SampleStore {
    /// 샘플 추가
    fn record(&mut self, sample: Sample) -> Result<(), CoreError>;

    /// 저장된 샘플 수
    fn len(&self) -> Result<u64, CoreError>;

    fn is_empty(&self) -> Result<bool, CoreError> {
        Ok(self.len()? == 0)
    }

    /// `[최소 타임스탬프, 최대 타임스탬프)`, 비어 있으면 None
    fn time_period(&self) -> Result<Option<TimePeriod>, CoreError>;

    fn state(&self) -> StoreState;

    /// 읽기 상태로 전이 (정렬, 플러시, 병합). 이미 잠겼으면 아무것도 하지 않음.
    fn lock(&mut self) -> Result<(), CoreError>;

    /// 오름차순 순회. 잠기지 않은 저장소는 `CoreError::Usage`.
    fn iter(&self) -> Result<SampleIter<'_>, CoreError>;
}

impl dyn SampleStore + '_ {
    /// 잠근 뒤 순회
    pub fn samples(&mut self) -> Result<SampleIter<'_>, CoreError> {
        self.lock()?;
        self.iter()
    }

    /// `[start, end)` 구간 뷰. 잠기지 않은 저장소는 `CoreError::Usage`.
    pub fn time_slice(&self, period: TimePeriod) -> Result<SliceView<'_>, CoreError> {
        SliceView::new(self, period)
    }
}

/// 잠기지 않은 저장소를 읽으려 할 때의 에러
pub fn not_locked(what: &str) -> CoreError {
    CoreError::Usage(format!("{what}: 잠기지 않은 저장소는 순회할 수 없습니다"))
}

/// 잠긴 저장소에 기록하려 할 때의 에러
pub fn already_locked(what: &str) -> CoreError {
    CoreError::Usage(format!("{what}: 읽기가 시작된 저장소에는 기록할 수 없습니다"))
}

/// 범위 밖 샘플 거부. 에러 메시지에 저장소 이름을 붙인다.
pub fn check_range(what: &str, sample: &Sample) -> Result<(), CoreError> {
    sample.validate().map_err(|e| match e {
        CoreError::Validation { field, message } => CoreError::Validation {
            field,
            message: format!("{what}: {message}"),
        },
        other => other,
    })
}
