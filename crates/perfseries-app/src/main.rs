//! # perfseries-app
//!
//! 성능 로그 시계열 수집 바이너리 진입점.
//! 설정 로드, 저장소 와이어링, 한 번의 수집 패스, 요약 리포트 출력.

mod ingest;
mod report;

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use perfseries_core::config::{AppConfig, BackendKind};
use perfseries_core::config_manager::ConfigManager;
use perfseries_core::models::period::TimePeriod;
use perfseries_storage::factory::{RunContext, SeriesStoreFactory};
use perfseries_storage::sqlite::SqliteDatabase;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::ingest::ingest;
use crate::report::{collect_rows, write_rows, ReportFormat};

/// 백엔드 선택 (CLI)
#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Memory,
    Database,
    ExternalSort,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Memory => BackendKind::Memory,
            BackendArg::Database => BackendKind::Database,
            BackendArg::ExternalSort => BackendKind::ExternalSort,
        }
    }
}

/// 성능 로그 시계열 수집기
///
/// `key,timestamp,duration,success` 형식의 입력을 읽어 키별 시리즈 요약을 출력한다.
#[derive(Parser, Debug)]
#[command(name = "perfseries")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 입력 파일 (`-`이면 표준 입력)
    input: PathBuf,

    /// 설정 파일 경로 (없으면 기본 설정)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// CLI 오버라이드를 적용한 설정을 설정 파일에 저장
    #[arg(long, requires = "config")]
    save_config: bool,

    /// 저장소 백엔드
    #[arg(long, short = 'b', value_enum)]
    backend: Option<BackendArg>,

    /// 시리즈 키 최대 개수
    #[arg(long)]
    max_unique_counters: Option<usize>,

    /// 디스크/DB 버퍼 크기 (샘플 수)
    #[arg(long)]
    buffer_capacity: Option<usize>,

    /// 외부 정렬 슬라이스 루트
    #[arg(long)]
    storage_root: Option<PathBuf>,

    /// SQLite DB 파일
    #[arg(long)]
    database: Option<PathBuf>,

    /// 시간 필터 시작 (epoch ms, 포함)
    #[arg(long)]
    from: Option<u64>,

    /// 시간 필터 끝 (epoch ms, 제외)
    #[arg(long)]
    to: Option<u64>,

    /// 저장소 이름 접두사
    #[arg(long, short = 'n', default_value = "requests")]
    name: String,

    /// JSON Lines로 출력
    #[arg(long)]
    json: bool,

    /// 리포트 파일 (없으면 표준 출력)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

/// 설정 파일 + CLI 오버라이드
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut manager = match &args.config {
        Some(path) => Some(ConfigManager::with_path(path.clone()).context("설정 로드 실패")?),
        None => None,
    };
    let mut config = manager
        .as_ref()
        .map_or_else(AppConfig::default_config, |m| m.get().clone());

    let storage = &mut config.storage;
    if let Some(backend) = args.backend {
        storage.backend = backend.into();
    }
    if let Some(max) = args.max_unique_counters {
        storage.max_unique_counters = max;
    }
    if let Some(capacity) = args.buffer_capacity {
        storage.buffer_capacity = capacity;
    }
    if let Some(root) = &args.storage_root {
        storage.storage_root = Some(root.clone());
    }
    if let Some(path) = &args.database {
        storage.database_path = Some(path.clone());
    }
    if args.from.is_some() || args.to.is_some() {
        storage.time_filter = TimePeriod::new(
            args.from.unwrap_or(storage.time_filter.start),
            args.to.unwrap_or(storage.time_filter.end),
        );
    }

    storage.validate().context("저장소 설정 검증 실패")?;

    if args.save_config {
        if let Some(manager) = manager.as_mut() {
            manager.update(config.clone()).context("설정 저장 실패")?;
            info!("설정 저장: {}", manager.config_path().display());
        }
    }
    Ok(config)
}

/// DB 백엔드면 실행 전체가 공유할 연결을 연다
fn build_context(config: &AppConfig) -> Result<RunContext> {
    match (&config.storage.backend, &config.storage.database_path) {
        (BackendKind::Database, Some(path)) => {
            let db = SqliteDatabase::open(path)
                .with_context(|| format!("DB 열기 실패: {}", path.display()))?;
            Ok(RunContext::with_database(db))
        }
        _ => Ok(RunContext::new()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "perfseries_app={},perfseries_core={},perfseries_storage={}",
        args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    let config = load_config(&args)?;
    info!(
        "저장소: {:?}, 상한 {}, 버퍼 {}",
        config.storage.backend, config.storage.max_unique_counters, config.storage.buffer_capacity
    );
    if !config.storage.time_filter.is_unbounded() {
        info!("시간 필터: {}", config.storage.time_filter);
    }

    let context = build_context(&config)?;
    let factory = SeriesStoreFactory::new(&config.storage, &context)?;
    let mut pair = factory.create_pair(&args.name)?;

    let stats = if args.input.as_os_str() == "-" {
        ingest(io::stdin().lock(), &config.ingest, &mut pair)?
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("입력 파일 열기 실패: {}", args.input.display()))?;
        ingest(BufReader::new(file), &config.ingest, &mut pair)?
    };

    let pair = pair.into_read_only()?;
    let rows = collect_rows(&pair)?;
    let format = if args.json {
        ReportFormat::Json
    } else {
        ReportFormat::Text
    };

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("리포트 파일 생성 실패: {}", path.display()))?;
            write_rows(&rows, format, &mut BufWriter::new(file))?;
            info!("리포트 저장: {}", path.display());
        }
        None => write_rows(&rows, format, &mut io::stdout().lock())?,
    }

    info!(
        "완료: {}줄 수집, {}개 행 출력 (건너뜀 {})",
        stats.lines,
        rows.len(),
        stats.skipped
    );
    Ok(())
}
