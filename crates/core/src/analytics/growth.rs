use crate::domain::record::RankingRecord;
use crate::domain::report::{GrowthEntry, RankChange};

const NEW_ENTRY: &str = "New entry";

/// Biggest climbers by `previous_rank - rank`. New entries only fill slots left free.
pub fn fastest_growing(records: &[RankingRecord], top_n: usize) -> Vec<GrowthEntry> {
    let mut growth: Vec<(f64, &RankingRecord)> = Vec::new();
    for record in records {
        if !(record.has_rank() && record.has_previous_rank()) {
            continue;
        }
        match (record.rank_value(), record.previous_rank_value()) {
            (Ok(rank), Ok(previous)) => growth.push((previous - rank, record)),
            _ => {
                tracing::trace!(
                    rank = ?record.rank,
                    previous_rank = ?record.previous_rank,
                    "skipping growth row with malformed rank"
                );
            }
        }
    }
    growth.sort_by(|a, b| b.0.total_cmp(&a.0));
    growth.truncate(top_n);

    let free = top_n.saturating_sub(growth.len());
    let mut out: Vec<GrowthEntry> = growth
        .into_iter()
        .map(|(delta, record)| GrowthEntry {
            demand_change: demand_change(record),
            rank_change: RankChange::Moved(delta),
            record: record.clone(),
        })
        .collect();

    out.extend(
        records
            .iter()
            .filter(|r| r.has_rank() && !r.has_previous_rank())
            .take(free)
            .map(|record| GrowthEntry {
                record: record.clone(),
                rank_change: RankChange::NewEntry,
                demand_change: NEW_ENTRY.to_string(),
            }),
    );
    out.truncate(top_n);
    out
}

/// `"High → Low"` when the bucket moved, `"Stable (High)"` when it did not, empty when the
/// current bucket is unknown.
pub fn demand_change(record: &RankingRecord) -> String {
    match (
        record.previous_relative_demand_bucket.as_deref(),
        record.relative_demand_bucket.as_deref(),
    ) {
        (Some(prev), Some(cur)) if prev != cur => format!("{prev} → {cur}"),
        (_, Some(cur)) => format!("Stable ({cur})"),
        _ => String::new(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn growth_record(
        title: &str,
        rank: Option<&str>,
        previous: Option<&str>,
        bucket: Option<&str>,
        previous_bucket: Option<&str>,
    ) -> RankingRecord {
        RankingRecord {
            product_title: Some(title.to_string()),
            rank: rank.map(str::to_string),
            previous_rank: previous.map(str::to_string),
            relative_demand_bucket: bucket.map(str::to_string),
            previous_relative_demand_bucket: previous_bucket.map(str::to_string),
            ..Default::default()
        }
    }

    pub(crate) fn scenario_records() -> Vec<RankingRecord> {
        vec![
            growth_record("A", Some("2"), Some("5"), Some("Low"), Some("High")),
            growth_record("B", Some("1"), Some("1"), Some("High"), Some("High")),
            growth_record("C", Some("3"), None, None, None),
        ]
    }

    fn titles(entries: &[GrowthEntry]) -> Vec<&str> {
        entries
            .iter()
            .map(|e| e.record.product_title.as_deref().unwrap_or(""))
            .collect()
    }

    #[test]
    fn scenario_orders_growth_then_new_entries() {
        let out = fastest_growing(&scenario_records(), 10);
        assert_eq!(titles(&out), vec!["A", "B", "C"]);
        assert_eq!(out[0].rank_change, RankChange::Moved(3.0));
        assert_eq!(out[0].demand_change, "High → Low");
        assert_eq!(out[1].rank_change, RankChange::Moved(0.0));
        assert_eq!(out[1].demand_change, "Stable (High)");
        assert_eq!(out[2].rank_change, RankChange::NewEntry);
        assert_eq!(out[2].demand_change, "New entry");
    }

    #[test]
    fn new_entries_never_displace_growth_rows() {
        let mut records: Vec<_> = (0..12)
            .map(|i| growth_record(&format!("G{i}"), Some("5"), Some(&(10 + i).to_string()), None, None))
            .collect();
        records.insert(0, growth_record("N", Some("1"), None, None, None));
        let out = fastest_growing(&records, 10);
        assert_eq!(out.len(), 10);
        assert!(out.iter().all(|e| e.rank_change != RankChange::NewEntry));
        assert_eq!(out[0].record.product_title.as_deref(), Some("G11"));
    }

    #[test]
    fn new_entries_fill_free_slots_in_record_order() {
        let mut records = vec![growth_record("G", Some("4"), Some("6"), None, None)];
        for i in 0..15 {
            records.push(growth_record(&format!("N{i}"), Some("9"), None, None, None));
        }
        let out = fastest_growing(&records, 10);
        assert_eq!(out.len(), 10);
        assert_eq!(out[0].record.product_title.as_deref(), Some("G"));
        assert_eq!(out[1].record.product_title.as_deref(), Some("N0"));
        assert_eq!(out[9].record.product_title.as_deref(), Some("N8"));
    }

    #[test]
    fn length_is_min_of_ten_and_eligible_rows() {
        for (growth_rows, new_rows) in [(0, 0), (3, 2), (4, 9), (11, 0), (0, 14)] {
            let mut records = Vec::new();
            for i in 0..growth_rows {
                records.push(growth_record(&format!("G{i}"), Some("2"), Some("3"), None, None));
            }
            for i in 0..new_rows {
                records.push(growth_record(&format!("N{i}"), Some("2"), None, None, None));
            }
            records.push(growth_record("no-rank", None, None, None, None));
            let out = fastest_growing(&records, 10);
            assert_eq!(out.len(), 10.min(growth_rows + new_rows));
        }
    }

    #[test]
    fn malformed_ranks_are_left_out_of_growth() {
        let records = vec![
            growth_record("bad", Some("x"), Some("3"), None, None),
            growth_record("ok", Some("1"), Some("2"), None, None),
        ];
        let out = fastest_growing(&records, 10);
        assert_eq!(titles(&out), vec!["ok"]);
    }

    #[test]
    fn declines_sort_after_climbs() {
        let records = vec![
            growth_record("down", Some("9"), Some("4"), None, None),
            growth_record("up", Some("2"), Some("7"), None, None),
        ];
        let out = fastest_growing(&records, 10);
        assert_eq!(titles(&out), vec!["up", "down"]);
        assert_eq!(out[1].rank_change, RankChange::Moved(-5.0));
    }

    #[test]
    fn demand_change_labels() {
        let r = growth_record("x", None, None, Some("High"), Some("Low"));
        assert_eq!(demand_change(&r), "Low → High");
        let r = growth_record("x", None, None, Some("High"), None);
        assert_eq!(demand_change(&r), "Stable (High)");
        let r = growth_record("x", None, None, None, Some("Low"));
        assert_eq!(demand_change(&r), "");
    }
}
