//! 시리즈 요약 리포트.
//!
//! 모든 읽기가 끝난 뒤에만 출력한다. 중간에 저장소 에러가 나면 아무것도 쓰지 않는다.

use std::io::Write;

use anyhow::{Context, Result};
use perfseries_core::models::period::TimePeriod;
use perfseries_core::ports::series_store::SeriesStore;
use perfseries_core::series::{CounterSeries, SeriesSummary};
use perfseries_storage::series::pair::ReadOnlyPair;
use serde::Serialize;

/// 리포트 한 행
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub store: String,
    pub key: String,
    pub is_total: bool,
    #[serde(flatten)]
    pub summary: SeriesSummary,
}

/// 출력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

fn row(store: &dyn SeriesStore, series: &CounterSeries, is_total: bool) -> Result<ReportRow> {
    let summary = series
        .summary()
        .with_context(|| format!("{}/{} 요약 실패", store.name(), series.key()))?;
    Ok(ReportRow {
        store: store.name().to_string(),
        key: series.key().to_string(),
        is_total,
        summary,
    })
}

/// 저장소 하나의 total + 키별 행
fn store_rows(store: &dyn SeriesStore, out: &mut Vec<ReportRow>) -> Result<()> {
    out.push(row(store, store.total(), true)?);
    for series in store.series() {
        out.push(row(store, series, false)?);
    }
    Ok(())
}

/// 성공/실패 양쪽 전체 행 수집 (읽기 실패 시 전체 실패)
pub fn collect_rows(pair: &ReadOnlyPair) -> Result<Vec<ReportRow>> {
    let mut rows = Vec::new();
    store_rows(&pair.success, &mut rows)?;
    store_rows(&pair.failure, &mut rows)?;
    Ok(rows)
}

fn fmt_opt(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn fmt_period(period: Option<TimePeriod>) -> String {
    period.map_or_else(|| "-".to_string(), |p| p.to_string())
}

/// 행 목록을 지정 형식으로 기록
pub fn write_rows<W: Write>(rows: &[ReportRow], format: ReportFormat, out: &mut W) -> Result<()> {
    match format {
        ReportFormat::Json => {
            for row in rows {
                serde_json::to_writer(&mut *out, row).context("JSON 직렬화 실패")?;
                writeln!(out)?;
            }
        }
        ReportFormat::Text => {
            writeln!(
                out,
                "{:<20} {:<40} {:>10} {:>10} {:>8} {:>8} {:>10}  period",
                "store", "key", "count", "hits", "min", "max", "mean"
            )?;
            for row in rows {
                let s = &row.summary;
                let key = if row.is_total {
                    format!("[{}]", row.key)
                } else {
                    row.key.clone()
                };
                writeln!(
                    out,
                    "{:<20} {:<40} {:>10} {:>10} {:>8} {:>8} {:>10}  {}",
                    row.store,
                    key,
                    s.count,
                    s.hits,
                    fmt_opt(s.min_duration),
                    fmt_opt(s.max_duration),
                    s.mean_duration
                        .map_or_else(|| "-".to_string(), |m| format!("{m:.2}")),
                    fmt_period(s.period),
                )?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
