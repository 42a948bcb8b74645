//! 시리즈 키.
//!
//! 기본 이름 + 순서 있는 메타데이터 필드. 필드는 리포트의 group-by에 쓰인다.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 카디널리티 초과 시 새 키가 합쳐지는 예약 이름
pub const OVERFLOW_KEY_NAME: &str = "OVERFLOW";

/// 저장소 전체 집계 시리즈 이름
pub const TOTAL_KEY_NAME: &str = "TOTAL";

/// 키 메타데이터 필드 (예: `http_method=GET`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyField {
    pub name: String,
    pub value: String,
}

/// 시리즈 식별자 (URL, GC 종류, 트랜잭션 이름 등)
///
/// 동등성은 이름과 필드 전체의 구조적 비교.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    name: String,
    #[serde(default)]
    fields: Vec<KeyField>,
}

impl SeriesKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// 필드를 덧붙인 키 반환 (순서 유지)
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(KeyField {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_fields(name: impl Into<String>, fields: Vec<KeyField>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// 집계(total) 시리즈 키
    pub fn total() -> Self {
        Self::new(TOTAL_KEY_NAME)
    }

    /// 주어진 키의 메타데이터만 유지한 OVERFLOW 키
    pub fn overflow_of(key: &SeriesKey) -> Self {
        Self {
            name: OVERFLOW_KEY_NAME.to_string(),
            fields: key.fields.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[KeyField] {
        &self.fields
    }

    /// 필드 값 조회
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    pub fn is_overflow(&self) -> bool {
        self.name == OVERFLOW_KEY_NAME
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.fields.is_empty() {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", field.name, field.value)?;
        }
        f.write_str("}")
    }
}

impl From<&str> for SeriesKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
