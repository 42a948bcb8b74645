//! 핵심 에러 타입.
//!
//! 저장소 에러는 모두 현재 실행에 대해 복구 불가능하다.
//! 재시도나 부분 진행 없이 호출자까지 전파된다.

use std::path::PathBuf;
use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류 (저장 루트 누락, DB 누락, 카디널리티 불일치, 이름 중복)
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 ({field}): {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 호출 계약 위반 (잠긴 저장소에 기록, 읽기 전용 뷰 변경 등)
    #[error("사용 오류: {0}")]
    Usage(String),

    /// 파일 I/O 실패 (슬라이스 버퍼 플러시, 병합, 삭제)
    #[error("파일 I/O 실패 ({}): {source}", path.display())]
    FileIo {
        /// 실패한 파일 경로
        path: PathBuf,
        /// 원인 에러
        #[source]
        source: std::io::Error,
    },

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 임베디드 DB 실패 (연결, 배치 삽입, 조회)
    #[error("저장소 에러: {0}")]
    Persistence(String),

    /// 성공/실패 저장소 쌍의 불변식 위반
    #[error("불변식 위반: {0}")]
    Invariant(String),
}

impl CoreError {
    /// 경로 정보를 포함한 파일 I/O 에러 생성
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn file_io_keeps_source() {
        let err = CoreError::file_io(
            "/tmp/a.ser",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/a.ser"));
        assert!(err.source().is_some());
    }

    #[test]
    fn usage_message() {
        let err = CoreError::Usage("잠긴 저장소".to_string());
        assert_eq!(err.to_string(), "사용 오류: 잠긴 저장소");
    }
}
