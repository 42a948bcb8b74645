//! # perfseries-core
//!
//! 성능 로그 시계열 저장소의 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`]: 시리즈 키, 샘플, 시간 구간 (serde Serialize/Deserialize)
//! - [`ports`]: 저장소 포트 인터페이스 (`SampleStore`, `SeriesStore`)
//! - [`series`]: 카운터 시리즈 (키 + 샘플 저장소)
//! - [`slice`]: 시간 구간 슬라이스 뷰
//! - [`error`]: 핵심 에러 타입 (thiserror)
//! - [`config`]: 저장소/수집 설정 구조체
//! - [`config_manager`]: 설정 파일 관리 (로드/저장)

pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod ports;
pub mod series;
pub mod slice;

#[cfg(test)]
mod tests {
    use crate::config::{AppConfig, BackendKind};
    use crate::models::period::TimePeriod;

    #[test]
    fn config_defaults() {
        let config = AppConfig::default_config();
        assert_eq!(config.storage.backend, BackendKind::Memory);
        assert_eq!(config.storage.max_unique_counters, 512);
        assert_eq!(config.storage.buffer_capacity, 100_000);
        assert_eq!(config.storage.time_filter, TimePeriod::unbounded());
        assert!(config.storage.storage_root.is_none());
    }

    #[test]
    fn backend_kind_serde_roundtrip() {
        let json = serde_json::to_string(&BackendKind::ExternalSort).unwrap();
        assert_eq!(json, "\"external_sort\"");

        let parsed: BackendKind = serde_json::from_str("\"database\"").unwrap();
        assert_eq!(parsed, BackendKind::Database);
    }
}
