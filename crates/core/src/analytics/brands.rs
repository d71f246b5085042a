use std::collections::HashMap;

use crate::domain::record::RankingRecord;
use crate::domain::report::BrandShare;

pub const OTHER_BRANDS: &str = "other brands";

/// Share of records per brand: the `top_n` most frequent brands plus an `other brands`
/// remainder when there is one.
///
/// Percentages are rounded to tenths with the largest-remainder method, so the emitted
/// shares always add up to exactly 100.0. Brands with equal counts keep first-seen order.
pub fn brand_shares(records: &[RankingRecord], top_n: usize) -> Vec<BrandShare> {
    let total = records.len();
    if total == 0 {
        return Vec::new();
    }

    let mut order: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for record in records {
        let brand = record.brand_label();
        let next = counts.len();
        let i = *order.entry(brand).or_insert(next);
        if i == next {
            counts.push((brand, 0));
        }
        counts[i].1 += 1;
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let other: usize = counts.iter().skip(top_n).map(|(_, c)| c).sum();
    let mut rows: Vec<(String, usize)> = counts
        .into_iter()
        .take(top_n)
        .map(|(b, c)| (b.to_string(), c))
        .collect();
    if other > 0 {
        rows.push((OTHER_BRANDS.to_string(), other));
    }

    let tenths = largest_remainder_tenths(rows.iter().map(|(_, c)| *c), total);
    rows.into_iter()
        .zip(tenths)
        .map(|((brand, count), t)| BrandShare {
            brand,
            count,
            percentage: t as f64 / 10.0,
        })
        .collect()
}

/// Apportions 1000 tenths-of-a-percent across `counts` (which must sum to `total`).
fn largest_remainder_tenths(counts: impl Iterator<Item = usize>, total: usize) -> Vec<u64> {
    let total = total as u64;
    let mut parts: Vec<(u64, u64)> = counts
        .map(|c| {
            let scaled = c as u64 * 1000;
            (scaled / total, scaled % total)
        })
        .collect();

    let assigned: u64 = parts.iter().map(|(q, _)| q).sum();
    let mut leftover = 1000u64.saturating_sub(assigned);

    let mut by_remainder: Vec<usize> = (0..parts.len()).collect();
    by_remainder.sort_by(|&a, &b| parts[b].1.cmp(&parts[a].1));
    for i in by_remainder {
        if leftover == 0 {
            break;
        }
        if parts[i].1 > 0 {
            parts[i].0 += 1;
            leftover -= 1;
        }
    }

    parts.into_iter().map(|(q, _)| q).collect()
}
