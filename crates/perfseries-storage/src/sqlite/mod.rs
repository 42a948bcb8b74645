//! SQLite 저장소 어댑터.
//!
//! 실행 하나에서 모든 DB 백엔드 시리즈가 연결 하나를 공유한다.
//! 쓰기는 모두 명시적 트랜잭션 + 커밋으로 묶는다.
//!
//! # 모듈 구조
//! - `measurements`: 카운터 하나의 샘플 저장소 (버퍼링 배치 삽입, 페이지 단위 순회)

mod measurements;

pub use measurements::DatabaseSampleStore;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use perfseries_core::error::CoreError;
use perfseries_core::models::key::{KeyField, SeriesKey};
use perfseries_core::models::period::TimePeriod;
use perfseries_core::models::sample::Sample;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::migration;

/// 공유 SQLite 연결 핸들
#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

/// 페이지 조회 커서: 마지막으로 읽은 (timestamp, rowid)
pub(crate) type PageCursor = (i64, i64);

/// 검증된 샘플 값을 SQLite INTEGER로 변환
fn to_sql_int(field: &str, value: u64) -> Result<i64, CoreError> {
    i64::try_from(value).map_err(|_| CoreError::Validation {
        field: field.to_string(),
        message: format!("{value}: INTEGER 범위 초과"),
    })
}

/// 시간 필터를 SQL 조건 값으로 변환
///
/// 상한이 INTEGER 범위 밖이면 `None`(상한 없음). 하한이 범위 밖이면 저장된 샘플이
/// 있을 수 없으므로 전체가 `None`.
fn sql_range(filter: TimePeriod) -> Option<(i64, Option<i64>)> {
    let start = i64::try_from(filter.start).ok()?;
    Some((start, i64::try_from(filter.end).ok()))
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

impl SqliteDatabase {
    /// 파일 기반 DB 열기
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path)
            .map_err(|e| CoreError::Persistence(format!("SQLite 열기 실패: {e}")))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA cache_size=8000;
            PRAGMA temp_store=MEMORY;
            PRAGMA foreign_keys=ON;
            ",
        )
        .map_err(|e| CoreError::Persistence(format!("PRAGMA 설정 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Persistence(format!("마이그레이션 실패: {e}")))?;

        info!("SQLite 저장소 초기화: {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 인메모리 DB (테스트용)
    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::Persistence(format!("인메모리 SQLite 생성 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Persistence(format!("마이그레이션 실패: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 저장소 이름의 id 조회, 없으면 생성
    pub fn counter_store_id(&self, name: &str) -> Result<i64, CoreError> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| CoreError::Persistence(format!("트랜잭션 시작 실패: {e}")))?;

        tx.execute(
            "INSERT OR IGNORE INTO counter_store (name) VALUES (?1)",
            rusqlite::params![name],
        )
        .map_err(|e| CoreError::Persistence(format!("저장소 생성 실패 ({name}): {e}")))?;

        let id: i64 = tx
            .query_row(
                "SELECT id FROM counter_store WHERE name = ?1",
                rusqlite::params![name],
                |row| row.get(0),
            )
            .map_err(|e| CoreError::Persistence(format!("저장소 조회 실패 ({name}): {e}")))?;

        tx.commit()
            .map_err(|e| CoreError::Persistence(format!("트랜잭션 커밋 실패: {e}")))?;

        debug!("counter_store {name} → id {id}");
        Ok(id)
    }

    /// 카운터 id 조회, 없으면 생성
    pub fn counter_id(
        &self,
        store_id: i64,
        key: &SeriesKey,
        is_total: bool,
    ) -> Result<i64, CoreError> {
        let fields = serde_json::to_string(key.fields())?;
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| CoreError::Persistence(format!("트랜잭션 시작 실패: {e}")))?;

        tx.execute(
            "INSERT OR IGNORE INTO counter (counter_store_id, name, fields, is_total_counter)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![store_id, key.name(), fields, is_total],
        )
        .map_err(|e| CoreError::Persistence(format!("카운터 생성 실패 ({key}): {e}")))?;

        let id: i64 = tx
            .query_row(
                "SELECT id FROM counter
                 WHERE counter_store_id = ?1 AND name = ?2 AND fields = ?3 AND is_total_counter = ?4",
                rusqlite::params![store_id, key.name(), fields, is_total],
                |row| row.get(0),
            )
            .map_err(|e| CoreError::Persistence(format!("카운터 조회 실패 ({key}): {e}")))?;

        tx.commit()
            .map_err(|e| CoreError::Persistence(format!("트랜잭션 커밋 실패: {e}")))?;

        Ok(id)
    }

    /// 저장소에 이미 있는 (total 제외) 카운터 키 목록, 생성 순
    pub fn list_counters(&self, store_id: i64) -> Result<Vec<SeriesKey>, CoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT name, fields FROM counter
                 WHERE counter_store_id = ?1 AND is_total_counter = 0
                 ORDER BY id",
            )
            .map_err(|e| CoreError::Persistence(format!("쿼리 준비 실패: {e}")))?;

        let rows = stmt
            .query_map(rusqlite::params![store_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| CoreError::Persistence(format!("쿼리 실행 실패: {e}")))?;

        let mut keys = Vec::new();
        for row in rows {
            let (name, fields) =
                row.map_err(|e| CoreError::Persistence(format!("행 읽기 실패: {e}")))?;
            let fields: Vec<KeyField> = serde_json::from_str(&fields)?;
            keys.push(SeriesKey::with_fields(name, fields));
        }
        Ok(keys)
    }

    /// 샘플 배치를 한 트랜잭션으로 삽입
    pub fn insert_measurements(&self, counter_id: i64, samples: &[Sample]) -> Result<(), CoreError> {
        if samples.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| CoreError::Persistence(format!("트랜잭션 시작 실패: {e}")))?;

        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO measurement (counter_id, timestamp, duration, hit_count)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(|e| CoreError::Persistence(format!("쿼리 준비 실패: {e}")))?;

            for sample in samples {
                stmt.execute(rusqlite::params![
                    counter_id,
                    to_sql_int("timestamp", sample.timestamp)?,
                    to_sql_int("duration", sample.duration)?,
                    sample.hit_count,
                ])
                .map_err(|e| CoreError::Persistence(format!("배치 저장 실패: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| CoreError::Persistence(format!("트랜잭션 커밋 실패: {e}")))?;

        debug!("측정값 배치 저장: counter {counter_id}, {}건", samples.len());
        Ok(())
    }

    /// 구간 안 측정값 수
    pub fn count_measurements(&self, counter_id: i64, filter: TimePeriod) -> Result<u64, CoreError> {
        let Some((start, end)) = sql_range(filter) else {
            return Ok(0);
        };
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM measurement
                 WHERE counter_id = ?1 AND timestamp >= ?2 AND (?3 IS NULL OR timestamp < ?3)",
                rusqlite::params![counter_id, start, end],
                |row| row.get(0),
            )
            .map_err(|e| CoreError::Persistence(format!("건수 조회 실패: {e}")))?;
        Ok(from_sql_int(count))
    }

    /// 구간 안 최소/최대 타임스탬프
    pub fn measurement_bounds(
        &self,
        counter_id: i64,
        filter: TimePeriod,
    ) -> Result<Option<(u64, u64)>, CoreError> {
        let Some((start, end)) = sql_range(filter) else {
            return Ok(None);
        };
        let conn = self.conn.lock();
        let bounds: (Option<i64>, Option<i64>) = conn
            .query_row(
                "SELECT MIN(timestamp), MAX(timestamp) FROM measurement
                 WHERE counter_id = ?1 AND timestamp >= ?2 AND (?3 IS NULL OR timestamp < ?3)",
                rusqlite::params![counter_id, start, end],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| CoreError::Persistence(format!("기간 조회 실패: {e}")))?;

        Ok(match bounds {
            (Some(min), Some(max)) => Some((from_sql_int(min), from_sql_int(max))),
            _ => None,
        })
    }

    /// 커서 이후 측정값 한 페이지 (timestamp, rowid 오름차순)
    pub(crate) fn fetch_page(
        &self,
        counter_id: i64,
        filter: TimePeriod,
        after: Option<PageCursor>,
        limit: usize,
    ) -> Result<Vec<(PageCursor, Sample)>, CoreError> {
        let Some((start, end)) = sql_range(filter) else {
            return Ok(Vec::new());
        };
        let (after_ts, after_rowid) = after.unwrap_or((-1, -1));
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT rowid, timestamp, duration, hit_count FROM measurement
                 WHERE counter_id = ?1 AND timestamp >= ?2 AND (?3 IS NULL OR timestamp < ?3)
                   AND (timestamp > ?4 OR (timestamp = ?4 AND rowid > ?5))
                 ORDER BY timestamp, rowid
                 LIMIT ?6",
            )
            .map_err(|e| CoreError::Persistence(format!("쿼리 준비 실패: {e}")))?;

        let rows = stmt
            .query_map(
                rusqlite::params![
                    counter_id,
                    start,
                    end,
                    after_ts,
                    after_rowid,
                    i64::try_from(limit).unwrap_or(i64::MAX),
                ],
                |row| {
                    let rowid: i64 = row.get(0)?;
                    let ts: i64 = row.get(1)?;
                    let duration: i64 = row.get(2)?;
                    let hits: u32 = row.get(3)?;
                    Ok((
                        (ts, rowid),
                        Sample::with_hits(from_sql_int(ts), from_sql_int(duration), hits),
                    ))
                },
            )
            .map_err(|e| CoreError::Persistence(format!("쿼리 실행 실패: {e}")))?;

        let mut page = Vec::with_capacity(limit.min(1024));
        for row in rows {
            page.push(row.map_err(|e| CoreError::Persistence(format!("행 읽기 실패: {e}")))?);
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn counter_store_id_is_stable() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let a = db.counter_store_id("success").unwrap();
        let b = db.counter_store_id("failure").unwrap();
        assert_ne!(a, b);
        assert_eq!(db.counter_store_id("success").unwrap(), a);
    }

    #[test]
    fn filter_beyond_int64_range() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let store = db.counter_store_id("s").unwrap();
        let counter = db.counter_id(store, &SeriesKey::new("/a"), false).unwrap();
        db.insert_measurements(counter, &[Sample::new(7, 1), Sample::new(i64::MAX as u64, 1)])
            .unwrap();

        assert_eq!(db.count_measurements(counter, TimePeriod::unbounded()).unwrap(), 2);
        assert_eq!(
            db.count_measurements(counter, TimePeriod::new(0, i64::MAX as u64)).unwrap(),
            1
        );
        let above = TimePeriod::new(i64::MAX as u64 + 1, u64::MAX);
        assert_eq!(db.count_measurements(counter, above).unwrap(), 0);
        assert_eq!(db.measurement_bounds(counter, above).unwrap(), None);

        let err = db
            .insert_measurements(counter, &[Sample::new(u64::MAX, 1)])
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn counter_identity_includes_fields_and_total_flag() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let store = db.counter_store_id("s").unwrap();

        let plain = SeriesKey::new("/a");
        let get = SeriesKey::new("/a").with_field("method", "GET");

        let id1 = db.counter_id(store, &plain, false).unwrap();
        let id2 = db.counter_id(store, &get, false).unwrap();
        let id3 = db.counter_id(store, &plain, true).unwrap();
        assert_ne!(id1, id2);
        assert_ne!(id1, id3);
        assert_eq!(db.counter_id(store, &get, false).unwrap(), id2);

        assert_eq!(db.list_counters(store).unwrap(), vec![plain, get]);
    }

    #[test]
    fn insert_count_and_bounds() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let store = db.counter_store_id("s").unwrap();
        let counter = db.counter_id(store, &SeriesKey::new("c"), false).unwrap();

        let samples: Vec<_> = [30, 10, 20].iter().map(|&ts| Sample::new(ts, 1)).collect();
        db.insert_measurements(counter, &samples).unwrap();

        assert_eq!(
            db.count_measurements(counter, TimePeriod::unbounded()).unwrap(),
            3
        );
        assert_eq!(
            db.count_measurements(counter, TimePeriod::new(10, 30)).unwrap(),
            2
        );
        assert_eq!(
            db.measurement_bounds(counter, TimePeriod::unbounded()).unwrap(),
            Some((10, 30))
        );
        assert_eq!(
            db.measurement_bounds(counter, TimePeriod::new(100, 200)).unwrap(),
            None
        );
    }

    #[test]
    fn pages_are_ordered_and_resume_after_cursor() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let store = db.counter_store_id("s").unwrap();
        let counter = db.counter_id(store, &SeriesKey::new("c"), false).unwrap();

        let samples: Vec<_> = [5, 1, 5, 3, 5].iter().map(|&ts| Sample::new(ts, ts)).collect();
        db.insert_measurements(counter, &samples).unwrap();

        let first = db
            .fetch_page(counter, TimePeriod::unbounded(), None, 3)
            .unwrap();
        assert_eq!(
            first.iter().map(|(_, s)| s.timestamp).collect::<Vec<_>>(),
            vec![1, 3, 5]
        );

        let cursor = first.last().map(|(c, _)| *c);
        let second = db
            .fetch_page(counter, TimePeriod::unbounded(), cursor, 3)
            .unwrap();
        assert_eq!(
            second.iter().map(|(_, s)| s.timestamp).collect::<Vec<_>>(),
            vec![5, 5]
        );
    }

    #[test]
    fn file_database_persists_between_opens() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("series.db");

        {
            let db = SqliteDatabase::open(&path).unwrap();
            let store = db.counter_store_id("s").unwrap();
            let counter = db.counter_id(store, &SeriesKey::new("c"), false).unwrap();
            db.insert_measurements(counter, &[Sample::new(1, 2)]).unwrap();
        }

        let db = SqliteDatabase::open(&path).unwrap();
        let store = db.counter_store_id("s").unwrap();
        let counter = db.counter_id(store, &SeriesKey::new("c"), false).unwrap();
        assert_eq!(
            db.count_measurements(counter, TimePeriod::unbounded()).unwrap(),
            1
        );
    }
}
