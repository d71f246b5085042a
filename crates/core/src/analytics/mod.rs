pub mod brands;
pub mod growth;

use std::collections::HashSet;

use crate::domain::record::RankingRecord;
use crate::domain::report::{AggregationResult, RankedProduct};
use crate::numeric::price_range;

pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct RankingAggregator {
    top_n: usize,
}

impl Default for RankingAggregator {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl RankingAggregator {
    pub fn with_top_n(top_n: usize) -> Self {
        Self { top_n }
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub fn aggregate(&self, records: &[RankingRecord]) -> AggregationResult {
        AggregationResult {
            top_products: self.top_products(records),
            top_no_brand_products: self.top_no_brand_products(records),
            brand_shares: brands::brand_shares(records, self.top_n),
            fastest_growing: growth::fastest_growing(records, self.top_n),
            latest_timestamp: latest_timestamp(records),
            record_count: records.len(),
            malformed_numbers: records.iter().map(RankingRecord::malformed_numeric_fields).sum(),
        }
    }

    /// One per title. Missing or malformed ranks order as `0`, so they come first.
    pub fn top_products(&self, records: &[RankingRecord]) -> Vec<RankedProduct> {
        let mut seen: HashSet<&str> = HashSet::new();
        by_rank(records.iter())
            .into_iter()
            .filter(|r| match r.product_title.as_deref() {
                Some(title) => seen.insert(title),
                None => false,
            })
            .take(self.top_n)
            .map(ranked)
            .collect()
    }

    pub fn top_no_brand_products(&self, records: &[RankingRecord]) -> Vec<RankedProduct> {
        by_rank(records.iter().filter(|r| r.is_unbranded()))
            .into_iter()
            .take(self.top_n)
            .map(ranked)
            .collect()
    }
}

/// Lexical maximum of the non-empty `rank_timestamp` values.
pub fn latest_timestamp(records: &[RankingRecord]) -> String {
    records
        .iter()
        .filter_map(|r| r.rank_timestamp.as_deref())
        .filter(|t| !t.is_empty())
        .max()
        .unwrap_or_default()
        .to_string()
}

fn by_rank<'a>(records: impl Iterator<Item = &'a RankingRecord>) -> Vec<&'a RankingRecord> {
    let mut keyed: Vec<(f64, &RankingRecord)> = records.map(|r| (r.rank_or_zero(), r)).collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    keyed.into_iter().map(|(_, r)| r).collect()
}

fn ranked(record: &RankingRecord) -> RankedProduct {
    RankedProduct {
        price_range: price_range(record),
        record: record.clone(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn product(title: &str, rank: Option<&str>) -> RankingRecord {
        RankingRecord {
            product_title: Some(title.to_string()),
            rank: rank.map(str::to_string),
            ..Default::default()
        }
    }

    fn titles(products: &[RankedProduct]) -> Vec<&str> {
        products
            .iter()
            .map(|p| p.record.product_title.as_deref().unwrap_or(""))
            .collect()
    }

    #[test]
    fn top_products_sorted_and_deduplicated_by_title() {
        let records = vec![
            product("A", Some("5")),
            product("B", Some("2")),
            product("A", Some("1")),
            product("C", Some("3")),
        ];
        let top = RankingAggregator::default().top_products(&records);
        assert_eq!(titles(&top), vec!["A", "B", "C"]);
        assert_eq!(top[0].record.rank.as_deref(), Some("1"));
    }

    #[test]
    fn top_products_truncate_to_ten() {
        let records: Vec<_> = (1..=25)
            .map(|i| product(&format!("P{i}"), Some(&i.to_string())))
            .collect();
        let top = RankingAggregator::default().top_products(&records);
        assert_eq!(top.len(), 10);
        assert_eq!(top[9].record.product_title.as_deref(), Some("P10"));
    }

    // Ranks default to zero when absent, so unranked rows lead the list. Kept deliberately.
    #[test]
    fn missing_rank_sorts_first_in_top_products() {
        let records = vec![
            product("ranked", Some("1")),
            product("unranked", None),
            product("garbled", Some("n/a")),
        ];
        let top = RankingAggregator::default().top_products(&records);
        assert_eq!(titles(&top), vec!["unranked", "garbled", "ranked"]);
    }

    #[test]
    fn top_products_skip_untitled_rows() {
        let mut untitled = product("x", Some("1"));
        untitled.product_title = None;
        let records = vec![untitled, product("B", Some("2"))];
        let top = RankingAggregator::default().top_products(&records);
        assert_eq!(titles(&top), vec!["B"]);
    }

    #[test]
    fn no_brand_view_keeps_duplicates() {
        let mut branded = product("Branded", Some("1"));
        branded.brand = Some("Acme".into());
        let mut literal = product("Dup", Some("3"));
        literal.brand = Some("no brand".into());
        let mut blank = product("Dup", Some("2"));
        blank.brand = Some("  ".into());
        let records = vec![branded, literal, blank, product("Bare", Some("9"))];
        let top = RankingAggregator::default().top_no_brand_products(&records);
        assert_eq!(titles(&top), vec!["Dup", "Dup", "Bare"]);
    }

    #[test]
    fn ranks_compare_numerically() {
        let records = vec![
            product("ten", Some("10")),
            product("nine", Some("9")),
            product("thousand", Some("1,000")),
        ];
        let top = RankingAggregator::default().top_products(&records);
        assert_eq!(titles(&top), vec!["nine", "ten", "thousand"]);
    }

    #[test]
    fn latest_timestamp_is_lexical_max() {
        let mut a = product("a", None);
        a.rank_timestamp = Some("2025-06-02 00:00:00 UTC".into());
        let mut b = product("b", None);
        b.rank_timestamp = Some("2025-06-16 00:00:00 UTC".into());
        let mut c = product("c", None);
        c.rank_timestamp = Some(String::new());
        assert_eq!(latest_timestamp(&[a, b, c]), "2025-06-16 00:00:00 UTC");
        assert_eq!(latest_timestamp(&[]), "");
    }

    #[test]
    fn aggregate_on_empty_partition_has_empty_views() {
        let result = RankingAggregator::default().aggregate(&[]);
        assert!(result.is_empty());
        assert!(result.top_products.is_empty());
        assert!(result.top_no_brand_products.is_empty());
        assert!(result.brand_shares.is_empty());
        assert!(result.fastest_growing.is_empty());
        assert_eq!(result.latest_timestamp, "");
    }

    #[test]
    fn aggregate_does_not_depend_on_call_history() {
        let records = vec![product("A", Some("2")), product("B", Some("1"))];
        let agg = RankingAggregator::default();
        assert_eq!(agg.aggregate(&records), agg.aggregate(&records));
    }

    #[test]
    fn mixed_scenario_orders_top_products_by_rank() {
        let records = growth::tests::scenario_records();
        let top = RankingAggregator::default().top_products(&records);
        assert_eq!(titles(&top), vec!["B", "A", "C"]);
    }
}
