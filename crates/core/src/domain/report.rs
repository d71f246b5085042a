use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::record::RankingRecord;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    pub country: String,
    pub category_code: String,
    pub depth: u32,
}

impl PartitionKey {
    pub fn new(country: impl Into<String>, category_code: impl Into<String>, depth: u32) -> Self {
        Self {
            country: country.into(),
            category_code: category_code.into(),
            depth,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.country, self.category_code, self.depth)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub top_products: Vec<RankedProduct>,
    pub top_no_brand_products: Vec<RankedProduct>,
    pub brand_shares: Vec<BrandShare>,
    pub fastest_growing: Vec<GrowthEntry>,
    pub latest_timestamp: String,
    pub record_count: usize,
    pub malformed_numbers: usize,
}

impl AggregationResult {
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Date part of `latest_timestamp` (`"2025-06-30 00:00:00 UTC"` → `"2025-06-30"`).
    pub fn latest_date(&self) -> &str {
        self.latest_timestamp
            .split(' ')
            .next()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedProduct {
    pub record: RankingRecord,
    pub price_range: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandShare {
    pub brand: String,
    pub count: usize,
    /// Percent of the partition's records in tenths, apportioned by largest remainder so
    /// the shares add up to exactly 100.0. A single share can therefore differ by 0.1 from
    /// `count / total * 100` rounded on its own (three equal brands: 33.4, 33.3, 33.3).
    pub percentage: f64,
}

impl BrandShare {
    pub fn share_label(&self) -> String {
        format!("{:.1}%", self.percentage)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "positions", rename_all = "snake_case")]
pub enum RankChange {
    /// `previous_rank - rank`; positive means the product climbed.
    Moved(f64),
    NewEntry,
}

impl RankChange {
    pub fn positions(&self) -> Option<f64> {
        match self {
            RankChange::Moved(d) => Some(*d),
            RankChange::NewEntry => None,
        }
    }
}

impl fmt::Display for RankChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankChange::Moved(d) if *d > 0.0 => write!(f, "+{d} positions"),
            RankChange::Moved(d) if *d < 0.0 => write!(f, "{d} positions"),
            RankChange::Moved(_) => f.write_str("Stable"),
            RankChange::NewEntry => f.write_str("New entry"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthEntry {
    pub record: RankingRecord,
    pub rank_change: RankChange,
    pub demand_change: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSummary {
    pub key: PartitionKey,
    pub category_name: String,
    /// Codes from the root down to this category.
    pub category_path: Vec<String>,
    pub result: AggregationResult,
}

/// Same views as a partition summary, over every record of one country whose title holds
/// the keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordSummary {
    pub country: String,
    pub keyword: String,
    pub result: AggregationResult,
}
