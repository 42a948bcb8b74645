//! 반열린 시간 구간 `[start, end)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 시간 구간 (start 포함, end 제외, epoch 밀리초)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimePeriod {
    /// 시작 시각 (포함)
    pub start: u64,
    /// 종료 시각 (제외)
    pub end: u64,
}

impl TimePeriod {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// 모든 타임스탬프를 포함하는 구간
    pub fn unbounded() -> Self {
        Self {
            start: 0,
            end: u64::MAX,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        *self == Self::unbounded()
    }

    pub fn contains(&self, timestamp: u64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// 첫/마지막 샘플 타임스탬프가 모두 이 구간 안에 있는지
    ///
    /// 저장소의 기간은 `[min, max)`로 보고되지만 max 샘플 자체도 존재하므로
    /// 여기서는 양 끝을 모두 포함해 판정한다.
    pub fn covers_samples(&self, first: u64, last: u64) -> bool {
        self.start <= first && last < self.end
    }

    /// 두 구간의 교집합 (겹치지 않으면 빈 구간)
    pub fn intersect(&self, other: &Self) -> Self {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end).max(start);
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl Default for TimePeriod {
    fn default() -> Self {
        Self::unbounded()
    }
}

fn format_ms(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", format_ms(self.start), format_ms(self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_open_contains() {
        let p = TimePeriod::new(50, 200);
        assert!(p.contains(50));
        assert!(p.contains(199));
        assert!(!p.contains(200));
        assert!(!p.contains(49));
    }

    #[test]
    fn covers_samples_inclusive_last() {
        let p = TimePeriod::new(50, 200);
        assert!(p.covers_samples(50, 199));
        assert!(!p.covers_samples(50, 200));
        assert!(!p.covers_samples(10, 100));
    }

    #[test]
    fn intersect_disjoint_is_empty() {
        let a = TimePeriod::new(0, 10);
        let b = TimePeriod::new(20, 30);
        assert!(a.intersect(&b).is_empty());
        assert_eq!(
            TimePeriod::new(0, 25).intersect(&b),
            TimePeriod::new(20, 25)
        );
    }

    #[test]
    fn display_uses_utc() {
        let p = TimePeriod::new(0, 1_000);
        assert_eq!(
            p.to_string(),
            "[1970-01-01T00:00:00.000Z, 1970-01-01T00:00:01.000Z)"
        );
    }
}
