//! Per-ad-set daily series used for trend comparison.

use chrono::NaiveDate;
use insights_core::types::InsightSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::extractor::MetricsExtractor;
use crate::ratio::ratio;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    #[serde(default)]
    pub spend: f64,
    #[serde(default)]
    pub revenue: f64,
}

/// Daily points keyed by ad-set id. Ad-set names are only unique within a
/// campaign, so the name is used only for rows that carry no id. Only what
/// was fetched for the current request; nothing is persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoricalSeries {
    series: BTreeMap<String, Vec<DailyPoint>>,
}

impl HistoricalSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, point: DailyPoint) {
        self.series.entry(key.into()).or_default().push(point);
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn points(&self, key: &str) -> &[DailyPoint] {
        self.series.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Build from ad-set level daily insight rows (`time_increment=1`).
    /// Rows without an ad-set id or name, or without a parseable
    /// `date_start`, are ignored.
    pub fn from_daily_rows(extractor: &MetricsExtractor, rows: &[InsightSnapshot]) -> Self {
        let mut history = Self::new();
        for row in rows {
            let (Some(key), Some(date)) = (
                row.text("adset_id").or_else(|| row.text("adset_name")),
                row.text("date_start")
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            ) else {
                continue;
            };
            let metrics = extractor.extract(row);
            history.push(
                key,
                DailyPoint {
                    date,
                    spend: metrics.spend,
                    revenue: metrics.revenue,
                },
            );
        }
        history
    }

    /// ROAS over the most recent `window` days with data, as a ratio of
    /// sums. `None` when fewer than `min_days` points exist or the window
    /// had no spend.
    pub fn trailing_roas(&self, key: &str, window: u32, min_days: usize) -> Option<f64> {
        let mut points: Vec<&DailyPoint> = self.points(key).iter().collect();
        points.sort_by(|a, b| b.date.cmp(&a.date));
        points.truncate(window as usize);
        if points.len() < min_days.max(1) {
            return None;
        }
        let spend: f64 = points.iter().map(|p| p.spend).sum();
        let revenue: f64 = points.iter().map(|p| p.revenue).sum();
        Some(ratio(revenue, spend)).filter(|roas| *roas > 0.0)
    }
}
