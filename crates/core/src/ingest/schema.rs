use std::borrow::Cow;
use std::collections::HashMap;

use csv::StringRecord;

use crate::domain::record::RankingRecord;

pub const RANKING_CATEGORY: &str = "ranking_category";
pub const RANKING_COUNTRY: &str = "ranking_country";
pub const RANK: &str = "rank";
pub const PREVIOUS_RANK: &str = "previous_rank";
pub const PRODUCT_TITLE: &str = "product_title";
pub const BRAND: &str = "brand";
pub const PRICE_MIN: &str = "price_min";
pub const PRICE_MAX: &str = "price_max";
pub const PRICE_CURRENCY: &str = "price_currency";
pub const RELATIVE_DEMAND_BUCKET: &str = "relative_demand_bucket";
pub const PREVIOUS_RELATIVE_DEMAND_BUCKET: &str = "previous_relative_demand_bucket";
pub const RANK_TIMESTAMP: &str = "rank_timestamp";

#[derive(Debug, Clone, Default)]
struct Columns {
    ranking_category: Option<usize>,
    ranking_country: Option<usize>,
    rank: Option<usize>,
    previous_rank: Option<usize>,
    product_title: Option<usize>,
    brand: Option<usize>,
    price_min: Option<usize>,
    price_max: Option<usize>,
    price_currency: Option<usize>,
    relative_demand_bucket: Option<usize>,
    previous_relative_demand_bucket: Option<usize>,
    rank_timestamp: Option<usize>,
}

/// Export header, kept verbatim, with known columns resolved to positions.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    header: StringRecord,
    index: HashMap<String, usize>,
    columns: Columns,
}

impl RecordSchema {
    pub fn from_header(header: StringRecord) -> Self {
        let mut index = HashMap::with_capacity(header.len());
        for (i, name) in header.iter().enumerate() {
            let name = name.trim_start_matches('\u{feff}').trim();
            index.entry(name.to_string()).or_insert(i);
        }
        let at = |name: &str| index.get(name).copied();
        let columns = Columns {
            ranking_category: at(RANKING_CATEGORY),
            ranking_country: at(RANKING_COUNTRY),
            rank: at(RANK),
            previous_rank: at(PREVIOUS_RANK),
            product_title: at(PRODUCT_TITLE),
            brand: at(BRAND),
            price_min: at(PRICE_MIN),
            price_max: at(PRICE_MAX),
            price_currency: at(PRICE_CURRENCY),
            relative_demand_bucket: at(RELATIVE_DEMAND_BUCKET),
            previous_relative_demand_bucket: at(PREVIOUS_RELATIVE_DEMAND_BUCKET),
            rank_timestamp: at(RANK_TIMESTAMP),
        };
        Self {
            header,
            index,
            columns,
        }
    }

    pub fn header(&self) -> &StringRecord {
        &self.header
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_category_column(&self) -> bool {
        self.columns.ranking_category.is_some()
    }

    pub fn category_of<'r>(&self, row: &'r StringRecord) -> Option<&'r str> {
        cell(row, self.columns.ranking_category)
    }

    pub fn country_of<'r>(&self, row: &'r StringRecord) -> Option<&'r str> {
        cell(row, self.columns.ranking_country)
    }

    pub fn decode(&self, row: &StringRecord) -> RankingRecord {
        let c = &self.columns;
        let get = |idx: Option<usize>| cell(row, idx).map(str::to_string);
        RankingRecord {
            ranking_category: get(c.ranking_category),
            ranking_country: get(c.ranking_country),
            rank: get(c.rank),
            previous_rank: get(c.previous_rank),
            product_title: get(c.product_title),
            brand: get(c.brand),
            price_min: get(c.price_min),
            price_max: get(c.price_max),
            price_currency: get(c.price_currency),
            relative_demand_bucket: get(c.relative_demand_bucket),
            previous_relative_demand_bucket: get(c.previous_relative_demand_bucket),
            rank_timestamp: get(c.rank_timestamp),
        }
    }

    /// How to rewrite rows of this schema into `target`'s column order.
    pub fn projection_onto(&self, target: &RecordSchema) -> HeaderProjection {
        if self.header == target.header {
            return HeaderProjection { map: None };
        }
        let map = target
            .header
            .iter()
            .map(|name| self.position(name.trim_start_matches('\u{feff}').trim()))
            .collect();
        HeaderProjection { map: Some(map) }
    }
}

fn cell(row: &StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| row.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Maps rows from one header layout onto another by column name. Columns the source lacks
/// come out empty.
#[derive(Debug, Clone)]
pub struct HeaderProjection {
    map: Option<Vec<Option<usize>>>,
}

impl HeaderProjection {
    pub fn is_identity(&self) -> bool {
        self.map.is_none()
    }

    pub fn apply<'r>(&self, row: &'r StringRecord) -> Cow<'r, StringRecord> {
        match &self.map {
            None => Cow::Borrowed(row),
            Some(map) => Cow::Owned(
                map.iter()
                    .map(|idx| idx.and_then(|i| row.get(i)).unwrap_or(""))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cols: &[&str]) -> StringRecord {
        StringRecord::from(cols.to_vec())
    }

    #[test]
    fn decodes_known_columns_and_blanks_as_none() {
        let schema = RecordSchema::from_header(header(&[
            "\u{feff}rank",
            "product_title",
            "brand",
            "ranking_category",
            "extra",
        ]));
        let row = StringRecord::from(vec!["3", " Kettle ", "  ", "166", "x"]);
        let record = schema.decode(&row);
        assert_eq!(record.rank.as_deref(), Some("3"));
        assert_eq!(record.product_title.as_deref(), Some("Kettle"));
        assert_eq!(record.brand, None);
        assert_eq!(record.ranking_category.as_deref(), Some("166"));
        assert_eq!(record.previous_rank, None);
        assert_eq!(schema.category_of(&row), Some("166"));
    }

    #[test]
    fn short_rows_decode_missing_cells_as_none() {
        let schema = RecordSchema::from_header(header(&["ranking_category", "rank"]));
        let row = StringRecord::from(vec!["166"]);
        assert_eq!(schema.decode(&row).rank, None);
    }

    #[test]
    fn projects_rows_by_column_name() {
        let target = RecordSchema::from_header(header(&["a", "b", "c"]));
        let source = RecordSchema::from_header(header(&["c", "a"]));
        let projection = source.projection_onto(&target);
        assert!(!projection.is_identity());
        let row = StringRecord::from(vec!["3", "1"]);
        let out = projection.apply(&row);
        assert_eq!(out.iter().collect::<Vec<_>>(), vec!["1", "", "3"]);

        let same = target.projection_onto(&target);
        assert!(same.is_identity());
    }
}
