use chrono::NaiveDate;
use serde::Serialize;

use crate::core::aggregate::{DailyTotals, ModelTotals};
use crate::core::dates::DateRange;
use crate::core::models::usage::TokenPair;

#[derive(Debug, Clone, Serialize)]
pub struct ModelRow {
    pub snapshot_id: String,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Serializable summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: usize,
    pub models: Vec<ModelRow>,
    pub total: TokenPair,
    pub rate_limit_hits: u32,
}

impl UsageReport {
    pub fn new(
        range: &DateRange,
        daily: &DailyTotals,
        totals: &ModelTotals,
        rate_limit_hits: u32,
    ) -> Self {
        Self {
            start: range.start(),
            end: range.end(),
            days: daily.days().len(),
            models: totals
                .rows()
                .map(|(id, tokens)| ModelRow {
                    snapshot_id: id.to_string(),
                    tokens,
                })
                .collect(),
            total: totals.total(),
            rate_limit_hits,
        }
    }
}
