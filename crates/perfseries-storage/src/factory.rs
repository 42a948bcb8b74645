//! 설정 기반 시리즈 저장소 생성.
//!
//! 실행 하나의 공유 자원(이름 레지스트리, DB 연결)은 `RunContext`로 명시적으로 넘긴다.

use perfseries_core::config::{BackendKind, StoreConfig};
use perfseries_core::error::CoreError;
use tracing::info;

use crate::registry::{NameRegistry, SharedRegistry};
use crate::series::bounded::BoundedSeriesStore;
use crate::series::pair::SeriesStorePair;
use crate::series::KeyedSeriesStore;
use crate::sqlite::SqliteDatabase;

/// 실행 단위 공유 자원
#[derive(Clone)]
pub struct RunContext {
    pub registry: SharedRegistry,
    pub database: Option<SqliteDatabase>,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            registry: NameRegistry::shared(),
            database: None,
        }
    }

    /// DB 백엔드용 공유 연결 포함
    pub fn with_database(database: SqliteDatabase) -> Self {
        Self {
            registry: NameRegistry::shared(),
            database: Some(database),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// 설정에 맞는 백엔드로 상한이 걸린 시리즈 저장소를 만든다
pub struct SeriesStoreFactory {
    config: StoreConfig,
    context: RunContext,
}

impl SeriesStoreFactory {
    /// 설정 검증 후 팩토리 생성. DB 백엔드는 컨텍스트에 연결이 있어야 한다.
    pub fn new(config: &StoreConfig, context: &RunContext) -> Result<Self, CoreError> {
        config.validate()?;
        if config.backend == BackendKind::Database && context.database.is_none() {
            return Err(CoreError::Config(
                "Database 백엔드에는 열린 DB 연결이 필요합니다".to_string(),
            ));
        }
        Ok(Self {
            config: config.clone(),
            context: context.clone(),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// 이름 하나의 시리즈 저장소
    pub fn create(&self, name: &str) -> Result<BoundedSeriesStore, CoreError> {
        let filter = self.config.time_filter;
        let capacity = self.config.buffer_capacity;

        let inner = match self.config.backend {
            BackendKind::Memory => KeyedSeriesStore::in_memory(name, filter),
            BackendKind::ExternalSort => {
                let root = self.config.storage_root.clone().ok_or_else(|| {
                    CoreError::Config("storage_root가 설정되지 않았습니다".to_string())
                })?;
                KeyedSeriesStore::external_sort(
                    name,
                    root,
                    self.context.registry.clone(),
                    capacity,
                    filter,
                )?
            }
            BackendKind::Database => {
                let db = self.context.database.clone().ok_or_else(|| {
                    CoreError::Config("DB 연결이 없습니다".to_string())
                })?;
                KeyedSeriesStore::database(name, db, capacity, filter)?
            }
        };

        BoundedSeriesStore::new(Box::new(inner), self.config.max_unique_counters)
    }

    /// `<name>-success` / `<name>-failure` 저장소 쌍
    pub fn create_pair(&self, name: &str) -> Result<SeriesStorePair, CoreError> {
        let success = self.create(&format!("{name}-success"))?;
        let failure = self.create(&format!("{name}-failure"))?;
        info!(
            "시리즈 저장소 쌍 생성: {name} ({:?}, 상한 {})",
            self.config.backend, self.config.max_unique_counters
        );
        SeriesStorePair::new(success, failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfseries_core::ports::series_store::SeriesStore;
    use tempfile::TempDir;

    #[test]
    fn database_backend_needs_connection() {
        let config = StoreConfig {
            backend: BackendKind::Database,
            database_path: Some("series.db".into()),
            ..StoreConfig::default()
        };
        assert!(matches!(
            SeriesStoreFactory::new(&config, &RunContext::new()),
            Err(CoreError::Config(_))
        ));

        let context = RunContext::with_database(SqliteDatabase::open_in_memory().unwrap());
        let factory = SeriesStoreFactory::new(&config, &context).unwrap();
        let store = factory.create("requests").unwrap();
        assert_eq!(store.name(), "requests");
    }

    #[test]
    fn created_stores_are_bounded() {
        let config = StoreConfig {
            max_unique_counters: 3,
            ..StoreConfig::default()
        };
        let factory = SeriesStoreFactory::new(&config, &RunContext::new()).unwrap();
        let pair = factory.create_pair("api").unwrap();
        assert_eq!(pair.success().name(), "api-success");
        assert_eq!(pair.failure().name(), "api-failure");
        assert_eq!(pair.success().max_unique_counters(), Some(3));
    }

    #[test]
    fn duplicate_external_sort_names_rejected() {
        let temp = TempDir::new().unwrap();
        let config = StoreConfig {
            backend: BackendKind::ExternalSort,
            storage_root: Some(temp.path().to_path_buf()),
            buffer_capacity: 4,
            ..StoreConfig::default()
        };
        let factory = SeriesStoreFactory::new(&config, &RunContext::new()).unwrap();
        let _first = factory.create("api").unwrap();
        assert!(matches!(factory.create("api"), Err(CoreError::Config(_))));
    }

    #[test]
    fn invalid_config_rejected() {
        let config = StoreConfig {
            buffer_capacity: 0,
            ..StoreConfig::default()
        };
        assert!(SeriesStoreFactory::new(&config, &RunContext::new()).is_err());
    }
}
