//! (저장소, 카운터) 이름 레지스트리.
//!
//! 같은 (저장소, 카운터) 쌍을 한 실행 안에서 두 번 여는 것은 설정 오류다.
//! 서로 다른 이름이 치환 후 같은 디렉토리가 되면 `-2`, `-3` 접미사로 구분한다.
//! 디렉토리 비교는 대소문자를 무시한다.
//! 레지스트리는 실행 컨텍스트가 소유하고 팩토리에 넘긴다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use perfseries_core::error::CoreError;

/// 실행 단위로 공유되는 레지스트리 핸들
pub type SharedRegistry = Arc<Mutex<NameRegistry>>;

/// `[A-Za-z0-9.-]` 이외 문자를 `_`로 치환
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// 카운터 구분: 키 시리즈 또는 저장소 전체 집계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterRole {
    Key,
    Total,
}

/// 등록된 카운터에 배정된 디렉토리 이름
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceNames {
    /// `serialized-time-stores/` 아래 저장소 디렉토리
    pub store_dir: String,
    /// 저장소 디렉토리 아래 카운터 디렉토리 (파일명 접두사 겸용)
    pub counter_dir: String,
}

#[derive(Debug)]
struct StoreEntry {
    dir: String,
    counters: HashSet<(String, CounterRole)>,
    /// 소문자로 정규화한 사용 중 카운터 디렉토리
    counter_dirs: HashSet<String>,
}

/// 사용 중인 (저장소, 카운터) 이름과 디렉토리
#[derive(Debug, Default)]
pub struct NameRegistry {
    stores: HashMap<String, StoreEntry>,
    store_dirs: HashSet<String>,
}

/// `base`, `base-2`, `base-3`, ... 중 아직 쓰이지 않은 첫 이름
fn allocate(base: String, used: &mut HashSet<String>) -> String {
    let mut candidate = base.clone();
    let mut n = 1;
    while used.contains(&candidate.to_ascii_lowercase()) {
        n += 1;
        candidate = format!("{base}-{n}");
    }
    used.insert(candidate.to_ascii_lowercase());
    candidate
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    /// 이름 쌍 등록 후 디렉토리 이름 배정
    ///
    /// 같은 저장소에서 같은 카운터를 다시 등록하면 `Config` 에러.
    pub fn register(
        &mut self,
        store_name: &str,
        counter_name: &str,
        role: CounterRole,
    ) -> Result<SliceNames, CoreError> {
        let store_dirs = &mut self.store_dirs;
        let entry = self
            .stores
            .entry(store_name.to_string())
            .or_insert_with(|| StoreEntry {
                dir: allocate(sanitize_file_name(store_name), store_dirs),
                counters: HashSet::new(),
                counter_dirs: HashSet::new(),
            });

        if !entry.counters.insert((counter_name.to_string(), role)) {
            return Err(CoreError::Config(format!(
                "저장소/카운터 이름 중복: {store_name}/{counter_name}"
            )));
        }

        let counter_dir = allocate(sanitize_file_name(counter_name), &mut entry.counter_dirs);
        Ok(SliceNames {
            store_dir: entry.dir.clone(),
            counter_dir,
        })
    }

    /// 등록된 카운터 수
    pub fn len(&self) -> usize {
        self.stores.values().map(|s| s.counters.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
