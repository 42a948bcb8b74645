//! 외부 정렬 샘플 저장소.
//!
//! 샘플을 고정 크기 버퍼에 모았다가 가득 차면 정렬해 슬라이스 파일로 내린다.
//! 첫 읽기 요청에서 남은 버퍼를 내리고 모든 슬라이스를 하나로 병합한 뒤 잠근다.
//!
//! 구조:
//! `<root>/serialized-time-stores/<store>/<counter>/<counter>.timemeasurements.<n>.ser`
//! `<root>/serialized-time-stores/<store>/<counter>/<counter>.timemeasurements.total.ser`

use std::fs;
use std::path::{Path, PathBuf};

use perfseries_core::error::CoreError;
use perfseries_core::models::period::TimePeriod;
use perfseries_core::models::sample::Sample;
use perfseries_core::ports::sample_store::{
    already_locked, check_range, not_locked, SampleIter, SampleStore, StoreState,
};
use tracing::{debug, info, warn};

use crate::merge::{merge_sorted_files, write_samples, SampleFileReader};
use crate::registry::{CounterRole, SharedRegistry};

/// 슬라이스 루트 하위 디렉토리
pub const STORE_DIR_NAME: &str = "serialized-time-stores";

const FILE_INFIX: &str = "timemeasurements";
const FILE_EXT: &str = "ser";

/// 디스크 버퍼 + k-way 병합 샘플 저장소
pub struct ExternalSortSampleStore {
    /// 이 카운터 전용 디렉토리
    dir: PathBuf,
    /// 파일명 접두사 (배정된 카운터 디렉토리 이름)
    file_stem: String,
    /// 에러/로그용 `저장소/카운터`
    label: String,
    buffer: Vec<Sample>,
    capacity: usize,
    slices: Vec<PathBuf>,
    merged: Option<PathBuf>,
    count: u64,
    bounds: Option<(u64, u64)>,
    filter: TimePeriod,
    state: StoreState,
}

impl ExternalSortSampleStore {
    /// 키 시리즈용 새 저장소 생성
    ///
    /// # Arguments
    /// * `root` - 슬라이스 파일 루트 디렉토리
    /// * `store_name` / `counter_name` - 실행 안에서 유일한 이름 쌍
    /// * `capacity` - 메모리 버퍼 크기 (샘플 수)
    pub fn new(
        root: &Path,
        store_name: &str,
        counter_name: &str,
        capacity: usize,
        filter: TimePeriod,
        registry: &SharedRegistry,
    ) -> Result<Self, CoreError> {
        Self::open(
            root,
            store_name,
            counter_name,
            CounterRole::Key,
            capacity,
            filter,
            registry,
        )
    }

    /// 저장소 전체 집계(total) 시리즈용 저장소 생성
    pub fn new_total(
        root: &Path,
        store_name: &str,
        counter_name: &str,
        capacity: usize,
        filter: TimePeriod,
        registry: &SharedRegistry,
    ) -> Result<Self, CoreError> {
        Self::open(
            root,
            store_name,
            counter_name,
            CounterRole::Total,
            capacity,
            filter,
            registry,
        )
    }

    fn open(
        root: &Path,
        store_name: &str,
        counter_name: &str,
        role: CounterRole,
        capacity: usize,
        filter: TimePeriod,
        registry: &SharedRegistry,
    ) -> Result<Self, CoreError> {
        if capacity == 0 {
            return Err(CoreError::Validation {
                field: "buffer_capacity".to_string(),
                message: "1 이상이어야 합니다".to_string(),
            });
        }
        let names = registry.lock().register(store_name, counter_name, role)?;

        let dir = root
            .join(STORE_DIR_NAME)
            .join(&names.store_dir)
            .join(&names.counter_dir);
        fs::create_dir_all(&dir).map_err(|e| CoreError::file_io(&dir, e))?;
        remove_stale_files(&dir)?;

        debug!("외부 정렬 저장소 생성: {}", dir.display());

        Ok(Self {
            dir,
            file_stem: names.counter_dir,
            label: format!("{store_name}/{counter_name}"),
            buffer: Vec::with_capacity(capacity.min(4096)),
            capacity,
            slices: Vec::new(),
            merged: None,
            count: 0,
            bounds: None,
            filter,
            state: StoreState::Writable,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 병합 파일 경로 (잠긴 뒤에만 존재)
    pub fn merged_path(&self) -> Option<&Path> {
        self.merged.as_deref()
    }

    /// 지금까지 내린 슬라이스 파일 수 (잠긴 뒤에는 0)
    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    fn slice_path(&self, index: usize) -> PathBuf {
        self.dir
            .join(format!("{}.{FILE_INFIX}.{index}.{FILE_EXT}", self.file_stem))
    }

    fn total_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{FILE_INFIX}.total.{FILE_EXT}", self.file_stem))
    }

    /// 버퍼를 정렬해 새 슬라이스 파일로 기록
    fn flush_buffer(&mut self) -> Result<(), CoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.buffer.sort_by(Sample::cmp_by_time);

        let path = self.slice_path(self.slices.len());
        write_samples(&path, &self.buffer)?;

        debug!(
            "슬라이스 기록: {} ({}건)",
            path.display(),
            self.buffer.len()
        );
        self.slices.push(path);
        self.buffer.clear();
        Ok(())
    }
}

/// 이전 실행이 남긴 `.ser` 파일 정리
fn remove_stale_files(dir: &Path) -> Result<(), CoreError> {
    let entries = fs::read_dir(dir).map_err(|e| CoreError::file_io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| CoreError::file_io(dir, e))?.path();
        if path.extension().and_then(|e| e.to_str()) == Some(FILE_EXT) {
            warn!("이전 실행의 슬라이스 파일 삭제: {}", path.display());
            fs::remove_file(&path).map_err(|e| CoreError::file_io(&path, e))?;
        }
    }
    Ok(())
}

impl SampleStore for ExternalSortSampleStore {
    fn record(&mut self, sample: Sample) -> Result<(), CoreError> {
        if self.state == StoreState::Locked {
            return Err(already_locked(&self.label));
        }
        check_range(&self.label, &sample)?;
        if sample.hit_count > 1 {
            return Err(CoreError::Usage(format!(
                "{}: 외부 정렬 저장소는 히트 수를 보존하지 않습니다 (hit_count={})",
                self.label, sample.hit_count
            )));
        }
        if !self.filter.contains(sample.timestamp) {
            return Ok(());
        }

        self.buffer.push(sample);
        self.count += 1;
        let ts = sample.timestamp;
        self.bounds = Some(match self.bounds {
            Some((min, max)) => (min.min(ts), max.max(ts)),
            None => (ts, ts),
        });

        if self.buffer.len() >= self.capacity {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn len(&self) -> Result<u64, CoreError> {
        Ok(self.count)
    }

    fn time_period(&self) -> Result<Option<TimePeriod>, CoreError> {
        Ok(self.bounds.map(|(min, max)| TimePeriod::new(min, max)))
    }

    fn state(&self) -> StoreState {
        self.state
    }

    fn lock(&mut self) -> Result<(), CoreError> {
        if self.state == StoreState::Locked {
            return Ok(());
        }
        self.flush_buffer()?;
        self.buffer = Vec::new();

        let total = self.total_path();
        let written = merge_sorted_files(&self.slices, &total)?;
        if written != self.count {
            return Err(CoreError::Invariant(format!(
                "{}: 병합 결과 {}건, 기록 {}건",
                self.label, written, self.count
            )));
        }

        for slice in self.slices.drain(..) {
            fs::remove_file(&slice).map_err(|e| CoreError::file_io(&slice, e))?;
        }

        info!("외부 정렬 병합 완료: {} ({}건)", self.label, written);
        self.merged = Some(total);
        self.state = StoreState::Locked;
        Ok(())
    }

    fn iter(&self) -> Result<SampleIter<'_>, CoreError> {
        match (&self.merged, self.state) {
            (Some(path), StoreState::Locked) => Ok(Box::new(SampleFileReader::open(path)?)),
            _ => Err(not_locked(&self.label)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NameRegistry;
    use tempfile::TempDir;

    fn create_test_store(temp: &TempDir, capacity: usize) -> ExternalSortSampleStore {
        ExternalSortSampleStore::new(
            temp.path(),
            "success",
            "/api/orders",
            capacity,
            TimePeriod::unbounded(),
            &NameRegistry::shared(),
        )
        .unwrap()
    }

    fn ser_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn directory_layout() {
        let temp = TempDir::new().unwrap();
        let store = create_test_store(&temp, 4);
        assert_eq!(
            store.dir(),
            temp.path()
                .join(STORE_DIR_NAME)
                .join("success")
                .join("_api_orders")
        );
    }

    #[test]
    fn flushes_slice_when_buffer_full() {
        let temp = TempDir::new().unwrap();
        let mut store = create_test_store(&temp, 3);
        for ts in [5, 3, 9, 1] {
            store.record(Sample::new(ts, 1)).unwrap();
        }

        assert_eq!(store.slice_count(), 1);
        assert_eq!(
            ser_files(store.dir()),
            vec!["_api_orders.timemeasurements.0.ser"]
        );
        assert_eq!(store.len().unwrap(), 4);
    }

    #[test]
    fn lock_merges_and_removes_slices() {
        let temp = TempDir::new().unwrap();
        let mut store = create_test_store(&temp, 2);
        for ts in [50, 10, 40, 20, 30] {
            store.record(Sample::new(ts, ts / 10)).unwrap();
        }
        store.lock().unwrap();

        assert_eq!(
            ser_files(store.dir()),
            vec!["_api_orders.timemeasurements.total.ser"]
        );
        let got: Vec<_> = store
            .iter()
            .unwrap()
            .map(|s| s.unwrap().timestamp)
            .collect();
        assert_eq!(got, vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn record_after_lock_is_usage_error() {
        let temp = TempDir::new().unwrap();
        let mut store = create_test_store(&temp, 2);
        store.record(Sample::new(1, 1)).unwrap();
        store.lock().unwrap();

        let err = store.record(Sample::new(2, 1)).unwrap_err();
        assert!(matches!(err, CoreError::Usage(_)));
    }

    #[test]
    fn iter_before_lock_is_usage_error() {
        let temp = TempDir::new().unwrap();
        let store = create_test_store(&temp, 2);
        assert!(matches!(store.iter(), Err(CoreError::Usage(_))));
    }

    #[test]
    fn hit_counts_rejected() {
        let temp = TempDir::new().unwrap();
        let mut store = create_test_store(&temp, 2);
        let err = store.record(Sample::with_hits(1, 1, 3)).unwrap_err();
        assert!(matches!(err, CoreError::Usage(_)));
    }

    #[test]
    fn duplicate_name_is_config_error() {
        let temp = TempDir::new().unwrap();
        let registry = NameRegistry::shared();
        let open = || {
            ExternalSortSampleStore::new(
                temp.path(),
                "s",
                "c",
                8,
                TimePeriod::unbounded(),
                &registry,
            )
        };
        assert!(open().is_ok());
        assert!(matches!(open(), Err(CoreError::Config(_))));
    }

    #[test]
    fn stale_files_removed_on_create() {
        let temp = TempDir::new().unwrap();
        let dir = temp
            .path()
            .join(STORE_DIR_NAME)
            .join("success")
            .join("_api_orders");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("_api_orders.timemeasurements.0.ser"), [0u8; 16]).unwrap();

        let store = create_test_store(&temp, 4);
        assert!(ser_files(store.dir()).is_empty());
    }

    #[test]
    fn empty_store_locks_to_empty_file() {
        let temp = TempDir::new().unwrap();
        let mut store = create_test_store(&temp, 4);
        store.lock().unwrap();
        assert!(store.merged_path().unwrap().exists());
        assert_eq!(store.iter().unwrap().count(), 0);
    }
}
