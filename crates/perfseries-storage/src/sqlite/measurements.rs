//! DB 기반 샘플 저장소.
//!
//! 기록은 버퍼에 모았다가 가득 차면 한 트랜잭션으로 배치 삽입한다.
//! 건수/기간은 시간 필터를 건 집계 쿼리로, 순회는 페이지 단위 정렬 조회로 처리한다.

use std::collections::VecDeque;

use perfseries_core::error::CoreError;
use perfseries_core::models::period::TimePeriod;
use perfseries_core::models::sample::Sample;
use perfseries_core::ports::sample_store::{
    already_locked, check_range, not_locked, SampleIter, SampleStore, StoreState,
};
use tracing::debug;

use super::{PageCursor, SqliteDatabase};

/// 순회 시 한 번에 가져오는 행 수
pub const FETCH_PAGE_SIZE: usize = 5_000;

/// SQLite `measurement` 테이블 위의 샘플 저장소
pub struct DatabaseSampleStore {
    db: SqliteDatabase,
    counter_id: i64,
    label: String,
    buffer: Vec<Sample>,
    capacity: usize,
    filter: TimePeriod,
    state: StoreState,
}

impl DatabaseSampleStore {
    /// # Arguments
    /// * `counter_id` - `counter` 테이블 id
    /// * `label` - 에러/로그용 `저장소/카운터` 이름
    /// * `capacity` - 배치 삽입 버퍼 크기
    /// * `filter` - 읽기 쿼리에 적용할 시간 구간
    pub fn new(
        db: SqliteDatabase,
        counter_id: i64,
        label: String,
        capacity: usize,
        filter: TimePeriod,
    ) -> Result<Self, CoreError> {
        if capacity == 0 {
            return Err(CoreError::Validation {
                field: "buffer_capacity".to_string(),
                message: "1 이상이어야 합니다".to_string(),
            });
        }
        Ok(Self {
            db,
            counter_id,
            label,
            buffer: Vec::with_capacity(capacity.min(4096)),
            capacity,
            filter,
            state: StoreState::Writable,
        })
    }

    pub fn counter_id(&self) -> i64 {
        self.counter_id
    }

    fn flush_buffer(&mut self) -> Result<(), CoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.db
            .insert_measurements(self.counter_id, &self.buffer)
            .map_err(|e| labeled(&self.label, e))?;
        self.buffer.clear();
        Ok(())
    }

    fn buffered_in_filter(&self) -> impl Iterator<Item = &Sample> {
        let filter = self.filter;
        self.buffer
            .iter()
            .filter(move |s| filter.contains(s.timestamp))
    }
}

/// DB 에러 메시지 앞에 `저장소/카운터` 이름을 붙인다
fn labeled(label: &str, e: CoreError) -> CoreError {
    match e {
        CoreError::Persistence(msg) => CoreError::Persistence(format!("{label}: {msg}")),
        CoreError::Validation { field, message } => CoreError::Validation {
            field,
            message: format!("{label}: {message}"),
        },
        other => other,
    }
}

impl SampleStore for DatabaseSampleStore {
    fn record(&mut self, sample: Sample) -> Result<(), CoreError> {
        if self.state == StoreState::Locked {
            return Err(already_locked(&self.label));
        }
        check_range(&self.label, &sample)?;
        self.buffer.push(sample);
        if self.buffer.len() >= self.capacity {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn len(&self) -> Result<u64, CoreError> {
        let stored = self
            .db
            .count_measurements(self.counter_id, self.filter)
            .map_err(|e| labeled(&self.label, e))?;
        Ok(stored + self.buffered_in_filter().count() as u64)
    }

    fn time_period(&self) -> Result<Option<TimePeriod>, CoreError> {
        let mut bounds = self
            .db
            .measurement_bounds(self.counter_id, self.filter)
            .map_err(|e| labeled(&self.label, e))?;
        for sample in self.buffered_in_filter() {
            let ts = sample.timestamp;
            bounds = Some(match bounds {
                Some((min, max)) => (min.min(ts), max.max(ts)),
                None => (ts, ts),
            });
        }
        Ok(bounds.map(|(min, max)| TimePeriod::new(min, max)))
    }

    fn state(&self) -> StoreState {
        self.state
    }

    fn lock(&mut self) -> Result<(), CoreError> {
        if self.state == StoreState::Locked {
            return Ok(());
        }
        self.flush_buffer()?;
        self.buffer = Vec::new();
        self.state = StoreState::Locked;
        debug!("DB 저장소 잠금: {}", self.label);
        Ok(())
    }

    fn iter(&self) -> Result<SampleIter<'_>, CoreError> {
        if self.state != StoreState::Locked {
            return Err(not_locked(&self.label));
        }
        Ok(Box::new(PagedMeasurements {
            db: self.db.clone(),
            counter_id: self.counter_id,
            label: self.label.clone(),
            filter: self.filter,
            cursor: None,
            page: VecDeque::new(),
            exhausted: false,
        }))
    }
}

/// 페이지 단위로 가져오는 정렬 순회
struct PagedMeasurements {
    db: SqliteDatabase,
    counter_id: i64,
    label: String,
    filter: TimePeriod,
    cursor: Option<PageCursor>,
    page: VecDeque<Sample>,
    exhausted: bool,
}

impl PagedMeasurements {
    fn fill(&mut self) -> Result<(), CoreError> {
        let rows = self
            .db
            .fetch_page(self.counter_id, self.filter, self.cursor, FETCH_PAGE_SIZE)
            .map_err(|e| labeled(&self.label, e))?;
        if rows.len() < FETCH_PAGE_SIZE {
            self.exhausted = true;
        }
        if let Some((cursor, _)) = rows.last() {
            self.cursor = Some(*cursor);
        }
        self.page.extend(rows.into_iter().map(|(_, sample)| sample));
        Ok(())
    }
}

impl Iterator for PagedMeasurements {
    type Item = Result<Sample, CoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.page.is_empty() && !self.exhausted {
            if let Err(e) = self.fill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.page.pop_front().map(Ok)
    }
}
