//! 스키마 마이그레이션.
//!
//! 버전 기반 SQLite 스키마 관리.

use rusqlite::Connection;
use tracing::{debug, info};

/// 현재 스키마 버전
pub const CURRENT_VERSION: u32 = 2;

/// 스키마 마이그레이션 실행
pub fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current = get_version(conn)?;
    info!("현재 스키마 버전: {current}, 목표: {CURRENT_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }

    if current < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// 현재 스키마 버전 조회
pub fn get_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    let result: Result<u32, _> = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    );
    result.or(Ok(0))
}

/// V1: counter_store + counter + measurement 테이블
fn migrate_v1(conn: &Connection) -> Result<(), rusqlite::Error> {
    debug!("마이그레이션 V1 실행: counter_store/counter/measurement 테이블");

    conn.execute_batch(
        "
        -- 시리즈 저장소 (성공/실패 등)
        CREATE TABLE IF NOT EXISTS counter_store (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        -- 카운터 (시리즈 키 하나, 또는 저장소 total)
        CREATE TABLE IF NOT EXISTS counter (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            counter_store_id INTEGER NOT NULL REFERENCES counter_store(id),
            name TEXT NOT NULL,
            is_total_counter INTEGER NOT NULL DEFAULT 0
        );

        -- 측정값
        CREATE TABLE IF NOT EXISTS measurement (
            counter_id INTEGER NOT NULL REFERENCES counter(id),
            timestamp INTEGER NOT NULL,
            duration INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_measurement_counter ON measurement(counter_id);

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )?;

    info!("마이그레이션 V1 완료");
    Ok(())
}

/// V2: 키 메타데이터, 히트 수, 정렬 조회 인덱스
fn migrate_v2(conn: &Connection) -> Result<(), rusqlite::Error> {
    debug!("마이그레이션 V2 실행: counter.fields, measurement.hit_count");

    conn.execute_batch(
        "
        -- 키 메타데이터 (JSON 배열)
        ALTER TABLE counter ADD COLUMN fields TEXT NOT NULL DEFAULT '[]';

        -- 집계된 요청 수
        ALTER TABLE measurement ADD COLUMN hit_count INTEGER NOT NULL DEFAULT 1;

        CREATE UNIQUE INDEX IF NOT EXISTS idx_counter_identity
            ON counter(counter_store_id, name, fields, is_total_counter);

        CREATE INDEX IF NOT EXISTS idx_measurement_counter_ts
            ON measurement(counter_id, timestamp);

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )?;

    info!("마이그레이션 V2 완료");
    Ok(())
}
