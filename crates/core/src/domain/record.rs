use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::numeric::parse_numeric;

/// Brand label used for missing, blank, or explicitly unbranded products.
pub const NO_BRAND: &str = "no brand";

/// Blank cells decode to `None`. Numeric columns keep their raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingRecord {
    pub ranking_category: Option<String>,
    pub ranking_country: Option<String>,
    pub rank: Option<String>,
    pub previous_rank: Option<String>,
    pub product_title: Option<String>,
    pub brand: Option<String>,
    pub price_min: Option<String>,
    pub price_max: Option<String>,
    pub price_currency: Option<String>,
    pub relative_demand_bucket: Option<String>,
    pub previous_relative_demand_bucket: Option<String>,
    pub rank_timestamp: Option<String>,
}

impl RankingRecord {
    pub fn rank_value(&self) -> Result<f64, PipelineError> {
        parse_numeric(self.rank.as_deref())
    }

    pub fn previous_rank_value(&self) -> Result<f64, PipelineError> {
        parse_numeric(self.previous_rank.as_deref())
    }

    /// Rank used for ordering; a malformed rank orders like a missing one (`0`).
    pub fn rank_or_zero(&self) -> f64 {
        self.rank_value().unwrap_or(0.0)
    }

    pub fn has_rank(&self) -> bool {
        is_present(self.rank.as_deref())
    }

    pub fn has_previous_rank(&self) -> bool {
        is_present(self.previous_rank.as_deref())
    }

    pub fn is_unbranded(&self) -> bool {
        match self.brand.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(b) => b == NO_BRAND,
        }
    }

    /// Brand grouping key: trimmed, case kept, blank or missing is `no brand`.
    pub fn brand_label(&self) -> &str {
        match self.brand.as_deref().map(str::trim) {
            Some(b) if !b.is_empty() => b,
            _ => NO_BRAND,
        }
    }

    /// Numeric fields that are present but do not normalize.
    pub fn malformed_numeric_fields(&self) -> usize {
        [self.rank.as_deref(), self.previous_rank.as_deref()]
            .into_iter()
            .filter(|v| is_present(*v) && parse_numeric(*v).is_err())
            .count()
    }
}

fn is_present(v: Option<&str>) -> bool {
    v.map(|s| !s.trim().is_empty()).unwrap_or(false)
}

pub trait Categorized {
    fn category_code(&self) -> Option<&str>;
}

impl Categorized for RankingRecord {
    fn category_code(&self) -> Option<&str> {
        self.ranking_category.as_deref()
    }
}

impl<T: Categorized + ?Sized> Categorized for &T {
    fn category_code(&self) -> Option<&str> {
        (**self).category_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_brand(brand: Option<&str>) -> RankingRecord {
        RankingRecord {
            brand: brand.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn unbranded_covers_missing_blank_and_literal_token() {
        assert!(with_brand(None).is_unbranded());
        assert!(with_brand(Some("   ")).is_unbranded());
        assert!(with_brand(Some("no brand")).is_unbranded());
        assert!(!with_brand(Some("No Brand")).is_unbranded());
        assert!(!with_brand(Some("Nike")).is_unbranded());
    }

    #[test]
    fn brand_label_is_case_sensitive() {
        assert_eq!(with_brand(Some("nike")).brand_label(), "nike");
        assert_eq!(with_brand(Some("Nike")).brand_label(), "Nike");
        assert_eq!(with_brand(Some("")).brand_label(), NO_BRAND);
    }

    #[test]
    fn missing_rank_orders_as_zero() {
        let r = RankingRecord::default();
        assert!(!r.has_rank());
        assert_eq!(r.rank_or_zero(), 0.0);
    }

    #[test]
    fn counts_malformed_numeric_fields() {
        let r = RankingRecord {
            rank: Some("abc".into()),
            previous_rank: Some("12".into()),
            ..Default::default()
        };
        assert_eq!(r.malformed_numeric_fields(), 1);
        assert_eq!(r.rank_or_zero(), 0.0);
    }
}
