//! 구분자 텍스트 입력 수집.
//!
//! 한 줄 = `key,timestamp,duration,success`. 키는 `name;field=value;...` 형식으로
//! 메타데이터 필드를 붙일 수 있다. 형식이 깨진 줄은 경고 후 건너뛰고,
//! 저장소 에러는 즉시 실행을 중단한다.

use std::io::BufRead;

use anyhow::{Context, Result};
use perfseries_core::config::IngestConfig;
use perfseries_core::models::key::SeriesKey;
use perfseries_core::models::sample::MAX_SAMPLE_VALUE;
use perfseries_storage::series::pair::SeriesStorePair;
use thiserror::Error;
use tracing::{debug, info, warn};

/// 입력 한 줄 파싱 에러
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("필드 수 {0}개 (4개 필요)")]
    FieldCount(usize),

    #[error("빈 키")]
    EmptyKey,

    #[error("잘못된 키 필드: {0}")]
    KeyField(String),

    #[error("잘못된 {field}: {value}")]
    Number { field: &'static str, value: String },

    #[error("잘못된 성공 여부: {0}")]
    Outcome(String),
}

/// 파싱된 입력 한 줄
#[derive(Debug, Clone, PartialEq)]
pub struct IngestRecord {
    pub key: SeriesKey,
    pub timestamp: u64,
    pub duration: u64,
    pub success: bool,
}

/// 수집 결과 집계
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestStats {
    pub lines: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// `name;field=value;...` → 시리즈 키
pub fn parse_key(raw: &str) -> Result<SeriesKey, ParseError> {
    let mut parts = raw.split(';');
    let name = parts.next().unwrap_or_default().trim();
    if name.is_empty() {
        return Err(ParseError::EmptyKey);
    }

    let mut key = SeriesKey::new(name);
    for part in parts {
        let (field, value) = part
            .split_once('=')
            .ok_or_else(|| ParseError::KeyField(part.to_string()))?;
        let field = field.trim();
        if field.is_empty() {
            return Err(ParseError::KeyField(part.to_string()));
        }
        key = key.with_field(field, value.trim());
    }
    Ok(key)
}

fn parse_number(field: &'static str, value: &str) -> Result<u64, ParseError> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|n| *n <= MAX_SAMPLE_VALUE)
        .ok_or_else(|| ParseError::Number {
            field,
            value: value.to_string(),
        })
}

fn parse_outcome(value: &str) -> Result<bool, ParseError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "ok" | "success" => Ok(true),
        "false" | "0" | "fail" | "failure" => Ok(false),
        other => Err(ParseError::Outcome(other.to_string())),
    }
}

/// 입력 한 줄 파싱
pub fn parse_line(line: &str, delimiter: char) -> Result<IngestRecord, ParseError> {
    let fields: Vec<&str> = line.split(delimiter).collect();
    if fields.len() != 4 {
        return Err(ParseError::FieldCount(fields.len()));
    }

    Ok(IngestRecord {
        key: parse_key(fields[0])?,
        timestamp: parse_number("timestamp", fields[1])?,
        duration: parse_number("duration", fields[2])?,
        success: parse_outcome(fields[3])?,
    })
}

/// 입력 전체를 한 번 훑어 성공/실패 저장소 쌍에 기록
pub fn ingest<R: BufRead>(
    reader: R,
    config: &IngestConfig,
    pair: &mut SeriesStorePair,
) -> Result<IngestStats> {
    let mut stats = IngestStats::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("입력 {line_no}번째 줄 읽기 실패"))?;
        if (idx == 0 && config.skip_header) || line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        stats.lines += 1;

        let record = match parse_line(&line, config.delimiter) {
            Ok(record) => record,
            Err(e) => {
                warn!("{line_no}번째 줄 건너뜀: {e}");
                stats.skipped += 1;
                continue;
            }
        };

        if record.success {
            pair.add_success(&record.key, record.timestamp, record.duration)
                .with_context(|| format!("{line_no}번째 줄 기록 실패 ({})", record.key))?;
            stats.succeeded += 1;
        } else {
            pair.add_failure(&record.key, record.timestamp, record.duration)
                .with_context(|| format!("{line_no}번째 줄 기록 실패 ({})", record.key))?;
            stats.failed += 1;
        }

        if stats.lines % 100_000 == 0 {
            debug!("수집 진행: {}줄", stats.lines);
        }
    }

    info!(
        "수집 완료: {}줄 (성공 {}, 실패 {}, 건너뜀 {})",
        stats.lines, stats.succeeded, stats.failed, stats.skipped
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfseries_core::config::StoreConfig;
    use perfseries_core::ports::series_store::SeriesStore;
    use perfseries_storage::factory::{RunContext, SeriesStoreFactory};

    fn memory_pair() -> SeriesStorePair {
        SeriesStoreFactory::new(&StoreConfig::default(), &RunContext::new())
            .unwrap()
            .create_pair("test")
            .unwrap()
    }

    #[test]
    fn parse_key_with_fields() {
        let key = parse_key("/api/orders;method=GET;region = eu").unwrap();
        assert_eq!(key.name(), "/api/orders");
        assert_eq!(key.field("method"), Some("GET"));
        assert_eq!(key.field("region"), Some("eu"));

        assert_eq!(parse_key(" ;a=b"), Err(ParseError::EmptyKey));
        assert!(matches!(parse_key("/a;novalue"), Err(ParseError::KeyField(_))));
    }

    #[test]
    fn parse_line_variants() {
        let record = parse_line("/a,100,5,true", ',').unwrap();
        assert_eq!(record.key, SeriesKey::new("/a"));
        assert_eq!((record.timestamp, record.duration), (100, 5));
        assert!(record.success);

        assert!(!parse_line("/a\t1\t2\t0", '\t').unwrap().success);
        assert_eq!(parse_line("/a,1,2", ','), Err(ParseError::FieldCount(3)));
        assert!(matches!(
            parse_line("/a,-1,2,true", ','),
            Err(ParseError::Number { field: "timestamp", .. })
        ));
        assert!(matches!(
            parse_line("/a,18446744073709551614,2,true", ','),
            Err(ParseError::Number { field: "timestamp", .. })
        ));
        assert!(parse_line("/a,9223372036854775807,2,true", ',').is_ok());
        assert!(matches!(
            parse_line("/a,1,2,maybe", ','),
            Err(ParseError::Outcome(_))
        ));
    }

    #[test]
    fn ingest_routes_by_outcome_and_skips_bad_lines() {
        let input = "key,timestamp,duration,success\n\
                     /a,100,5,true\n\
                     /b,50,3,false\n\
                     # 주석\n\
                     \n\
                     broken line\n\
                     /a,200,1,true\n";
        let config = IngestConfig {
            skip_header: true,
            ..IngestConfig::default()
        };
        let mut pair = memory_pair();

        let stats = ingest(input.as_bytes(), &config, &mut pair).unwrap();
        assert_eq!(
            stats,
            IngestStats {
                lines: 4,
                succeeded: 2,
                failed: 1,
                skipped: 1,
            }
        );
        assert!(pair.success().contains(&"/b".into()));
        assert!(pair.failure().contains(&"/a".into()));
        assert_eq!(pair.success().total().len().unwrap(), 2);
        assert_eq!(pair.failure().total().len().unwrap(), 1);
    }
}
