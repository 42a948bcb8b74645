//! 시리즈 저장소 구현.
//!
//! # 모듈 구조
//! - `bounded`: 카디널리티 상한 데코레이터 (초과 키 → OVERFLOW)
//! - `read_only`: 변경 금지 데코레이터 (리포트 전달용)
//! - `pair`: 성공/실패 저장소 쌍 (키 집합 동기화)

pub mod bounded;
pub mod pair;
pub mod read_only;

use std::collections::HashMap;
use std::path::PathBuf;

use perfseries_core::error::CoreError;
use perfseries_core::models::key::SeriesKey;
use perfseries_core::models::period::TimePeriod;
use perfseries_core::models::sample::Sample;
use perfseries_core::ports::sample_store::SampleStore;
use perfseries_core::ports::series_store::SeriesStore;
use perfseries_core::series::CounterSeries;
use tracing::{debug, info};

use crate::external_sort::ExternalSortSampleStore;
use crate::memory::InMemorySampleStore;
use crate::registry::SharedRegistry;
use crate::sqlite::{DatabaseSampleStore, SqliteDatabase};

/// total 시리즈의 디스크 카운터 이름
const TOTAL_COUNTER_NAME: &str = "TOTAL.total";

/// 새 시리즈의 샘플 저장소를 만드는 방식
pub enum SampleBackend {
    /// 인메모리 벡터
    Memory,
    /// 디스크 슬라이스 + 병합
    ExternalSort {
        root: PathBuf,
        registry: SharedRegistry,
        buffer_capacity: usize,
    },
    /// 공유 SQLite 연결
    Database {
        db: SqliteDatabase,
        counter_store_id: i64,
        buffer_capacity: usize,
    },
}

impl SampleBackend {
    fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::ExternalSort { .. } => "external_sort",
            Self::Database { .. } => "database",
        }
    }

    fn create_store(
        &self,
        store_name: &str,
        key: &SeriesKey,
        is_total: bool,
        filter: TimePeriod,
    ) -> Result<Box<dyn SampleStore>, CoreError> {
        match self {
            Self::Memory => Ok(Box::new(InMemorySampleStore::with_filter(filter))),
            Self::ExternalSort {
                root,
                registry,
                buffer_capacity,
            } => {
                let store = if is_total {
                    ExternalSortSampleStore::new_total(
                        root,
                        store_name,
                        TOTAL_COUNTER_NAME,
                        *buffer_capacity,
                        filter,
                        registry,
                    )?
                } else {
                    ExternalSortSampleStore::new(
                        root,
                        store_name,
                        &key.to_string(),
                        *buffer_capacity,
                        filter,
                        registry,
                    )?
                };
                Ok(Box::new(store))
            }
            Self::Database {
                db,
                counter_store_id,
                buffer_capacity,
            } => {
                let counter_id = db.counter_id(*counter_store_id, key, is_total)?;
                Ok(Box::new(DatabaseSampleStore::new(
                    db.clone(),
                    counter_id,
                    format!("{store_name}/{key}"),
                    *buffer_capacity,
                    filter,
                )?))
            }
        }
    }
}

/// 키 → 시리즈 해시맵 기반 저장소
///
/// 백엔드는 생성 시 한 번 정해지고, 새 키마다 같은 백엔드로 저장소를 만든다.
pub struct KeyedSeriesStore {
    name: String,
    backend: SampleBackend,
    filter: TimePeriod,
    index: HashMap<SeriesKey, usize>,
    series: Vec<CounterSeries>,
    total: CounterSeries,
}

impl KeyedSeriesStore {
    /// 인메모리 저장소
    pub fn in_memory(name: impl Into<String>, filter: TimePeriod) -> Self {
        let name = name.into();
        Self {
            total: CounterSeries::new(
                SeriesKey::total(),
                Box::new(InMemorySampleStore::with_filter(filter)),
            ),
            name,
            backend: SampleBackend::Memory,
            filter,
            index: HashMap::new(),
            series: Vec::new(),
        }
    }

    /// 외부 정렬 저장소
    pub fn external_sort(
        name: impl Into<String>,
        root: PathBuf,
        registry: SharedRegistry,
        buffer_capacity: usize,
        filter: TimePeriod,
    ) -> Result<Self, CoreError> {
        Self::with_backend(
            name.into(),
            SampleBackend::ExternalSort {
                root,
                registry,
                buffer_capacity,
            },
            filter,
        )
    }

    /// DB 저장소. 같은 이름의 저장소가 이미 있으면 기존 카운터를 다시 불러온다.
    pub fn database(
        name: impl Into<String>,
        db: SqliteDatabase,
        buffer_capacity: usize,
        filter: TimePeriod,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        let counter_store_id = db.counter_store_id(&name)?;
        let existing = db.list_counters(counter_store_id)?;

        let mut store = Self::with_backend(
            name,
            SampleBackend::Database {
                db,
                counter_store_id,
                buffer_capacity,
            },
            filter,
        )?;

        if !existing.is_empty() {
            info!(
                "기존 카운터 {}개 재사용: {}",
                existing.len(),
                store.name
            );
        }
        for key in existing {
            store.create_series(&key)?;
        }
        Ok(store)
    }

    fn with_backend(
        name: String,
        backend: SampleBackend,
        filter: TimePeriod,
    ) -> Result<Self, CoreError> {
        let total_key = SeriesKey::total();
        let total_store = backend.create_store(&name, &total_key, true, filter)?;
        debug!("시리즈 저장소 생성: {name} ({})", backend.kind());

        Ok(Self {
            total: CounterSeries::new(total_key, total_store),
            name,
            backend,
            filter,
            index: HashMap::new(),
            series: Vec::new(),
        })
    }

    fn create_series(&mut self, key: &SeriesKey) -> Result<usize, CoreError> {
        let store = self
            .backend
            .create_store(&self.name, key, false, self.filter)?;
        let idx = self.series.len();
        self.series.push(CounterSeries::new(key.clone(), store));
        self.index.insert(key.clone(), idx);
        Ok(idx)
    }

    /// 키의 시리즈 가변 참조 (수집 중 직접 기록용)
    pub fn get_mut(&mut self, key: &SeriesKey) -> Option<&mut CounterSeries> {
        let idx = *self.index.get(key)?;
        self.series.get_mut(idx)
    }

    pub fn total_mut(&mut self) -> &mut CounterSeries {
        &mut self.total
    }
}

impl SeriesStore for KeyedSeriesStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn add(&mut self, key: &SeriesKey, sample: Sample) -> Result<(), CoreError> {
        let idx = match self.index.get(key) {
            Some(idx) => *idx,
            None => self.create_series(key)?,
        };
        self.series[idx].record_sample(sample)?;
        self.total.record_sample(sample)
    }

    fn ensure_series(&mut self, key: &SeriesKey) -> Result<(), CoreError> {
        if !self.index.contains_key(key) {
            self.create_series(key)?;
        }
        Ok(())
    }

    fn get(&self, key: &SeriesKey) -> Option<&CounterSeries> {
        self.index.get(key).and_then(|idx| self.series.get(*idx))
    }

    fn keys(&self) -> Vec<&SeriesKey> {
        self.series.iter().map(CounterSeries::key).collect()
    }

    fn len(&self) -> usize {
        self.series.len()
    }

    fn total(&self) -> &CounterSeries {
        &self.total
    }

    fn series(&self) -> Box<dyn Iterator<Item = &CounterSeries> + '_> {
        Box::new(self.series.iter())
    }

    fn lock_all(&mut self) -> Result<(), CoreError> {
        self.total.lock()?;
        for series in &mut self.series {
            series.lock()?;
        }
        info!(
            "시리즈 저장소 잠금: {} ({}개 시리즈)",
            self.name,
            self.series.len()
        );
        Ok(())
    }
}
