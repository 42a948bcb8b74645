//! 실행 설정 구조체.
//!
//! 저장소 백엔드 선택, 카디널리티 상한, 버퍼 크기, 시간 필터, 수집 입력 형식.
//! `ConfigManager`를 통해 JSON 파일에서 로드하고 CLI 인자로 덮어쓴다.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::CoreError;
use crate::models::period::TimePeriod;

/// 최상위 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 시계열 저장소 설정
    #[serde(default)]
    pub storage: StoreConfig,
    /// 수집 입력 설정
    #[serde(default)]
    pub ingest: IngestConfig,
}

// ============================================================
// 저장소 설정
// ============================================================

/// 샘플 저장소 백엔드 종류
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// 인메모리 (기본)
    #[default]
    Memory,
    /// 임베디드 SQLite
    Database,
    /// 디스크 버퍼 + k-way 병합
    ExternalSort,
}

/// 시계열 저장소 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// 백엔드 종류
    #[serde(default)]
    pub backend: BackendKind,
    /// 시리즈 키 최대 개수 (초과분은 OVERFLOW로 합쳐짐)
    #[serde(default = "default_max_unique_counters")]
    pub max_unique_counters: usize,
    /// 디스크/DB 백엔드 버퍼 크기 (샘플 수)
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// 외부 정렬 슬라이스 파일 루트 (ExternalSort 필수)
    #[serde(default)]
    pub storage_root: Option<PathBuf>,
    /// SQLite DB 파일 경로 (Database 필수)
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// 리포트 대상 시간 구간
    #[serde(default)]
    pub time_filter: TimePeriod,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            max_unique_counters: default_max_unique_counters(),
            buffer_capacity: default_buffer_capacity(),
            storage_root: None,
            database_path: None,
            time_filter: TimePeriod::unbounded(),
        }
    }
}

impl StoreConfig {
    /// 백엔드별 필수값 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_unique_counters == 0 {
            return Err(CoreError::Validation {
                field: "max_unique_counters".to_string(),
                message: "1 이상이어야 합니다".to_string(),
            });
        }
        if self.buffer_capacity == 0 {
            return Err(CoreError::Validation {
                field: "buffer_capacity".to_string(),
                message: "1 이상이어야 합니다".to_string(),
            });
        }
        match self.backend {
            BackendKind::ExternalSort if self.storage_root.is_none() => Err(CoreError::Config(
                "ExternalSort 백엔드에는 storage_root가 필요합니다".to_string(),
            )),
            BackendKind::Database if self.database_path.is_none() => Err(CoreError::Config(
                "Database 백엔드에는 database_path가 필요합니다".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

fn default_max_unique_counters() -> usize {
    512
}

fn default_buffer_capacity() -> usize {
    100_000
}

// ============================================================
// 수집 설정
// ============================================================

/// 샘플 입력 파일 형식 (`key,timestamp,duration,success`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// 필드 구분자
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// 첫 줄 건너뛰기
    #[serde(default)]
    pub skip_header: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            skip_header: false,
        }
    }
}

fn default_delimiter() -> char {
    ','
}

impl AppConfig {
    /// 기본 설정
    pub fn default_config() -> Self {
        Self {
            storage: StoreConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}
