//! # perfseries-storage
//!
//! 시계열 샘플 저장소 어댑터.
//! 인메모리, 외부 정렬(디스크 슬라이스 + k-way 병합), SQLite 세 가지 백엔드와
//! 키 기반 시리즈 저장소, 카디널리티 상한/읽기 전용 데코레이터를 제공한다.
//!
//! ## 모듈
//! - `memory`: 인메모리 샘플 저장소
//! - `external_sort`: 디스크 버퍼 샘플 저장소
//! - `merge`: 슬라이스 파일 형식과 k-way 병합
//! - `sqlite`: DB 샘플 저장소, 공유 연결
//! - `migration`: 스키마 마이그레이션
//! - `registry`: 실행 단위 (저장소, 카운터) 이름 중복 검사
//! - `series`: 키 → 시리즈 저장소와 데코레이터
//! - `factory`: 설정 기반 저장소 생성

pub mod external_sort;
pub mod factory;
pub mod memory;
pub mod merge;
pub mod migration;
pub mod registry;
pub mod series;
pub mod sqlite;
