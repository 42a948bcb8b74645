//! 측정 샘플.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::CoreError;

/// 저장 가능한 타임스탬프/소요 시간 최댓값 (디스크·DB 레코드가 int64)
pub const MAX_SAMPLE_VALUE: u64 = i64::MAX as u64;

/// 단일 측정값 `(timestamp, duration, hit_count)`
///
/// 순서는 타임스탬프로만 정해진다. 같은 타임스탬프 간 순서는 백엔드가 정한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sample {
    /// 발생 시각 (epoch 밀리초)
    pub timestamp: u64,
    /// 소요 시간 (밀리초)
    pub duration: u64,
    /// 이 샘플이 대표하는 요청 수 (1 이상)
    pub hit_count: u32,
}

impl Sample {
    /// 히트 수 1인 샘플 생성
    pub fn new(timestamp: u64, duration: u64) -> Self {
        Self {
            timestamp,
            duration,
            hit_count: 1,
        }
    }

    /// 히트 수 지정 샘플 생성 (0은 1로 올림)
    pub fn with_hits(timestamp: u64, duration: u64, hit_count: u32) -> Self {
        Self {
            timestamp,
            duration,
            hit_count: hit_count.max(1),
        }
    }

    /// 타임스탬프와 소요 시간이 int64 범위 안인지 확인
    pub fn validate(&self) -> Result<(), CoreError> {
        for (field, value) in [("timestamp", self.timestamp), ("duration", self.duration)] {
            if value > MAX_SAMPLE_VALUE {
                return Err(CoreError::Validation {
                    field: field.to_string(),
                    message: format!("{value}: 최댓값 {MAX_SAMPLE_VALUE} 초과"),
                });
            }
        }
        Ok(())
    }

    /// 타임스탬프 기준 비교
    pub fn cmp_by_time(&self, other: &Self) -> Ordering {
        self.timestamp.cmp(&other.timestamp)
    }
}
