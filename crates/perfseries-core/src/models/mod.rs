//! 도메인 데이터 구조체.

pub mod key;
pub mod period;
pub mod sample;
