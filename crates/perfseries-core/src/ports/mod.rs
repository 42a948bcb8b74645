//! 포트 인터페이스.
//!
//! 구현: `perfseries-storage` crate (인메모리, 외부 정렬, SQLite)

pub mod sample_store;
pub mod series_store;
