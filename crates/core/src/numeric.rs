use crate::domain::record::RankingRecord;
use crate::error::PipelineError;

const THOUSANDS_SEPARATORS: &[char] = &[',', '_', '\'', ' ', '\u{a0}', '\u{202f}', '\u{2009}'];

const CURRENCY_SYMBOLS: &[char] = &[
    '$', '¢', '£', '¤', '¥', '֏', '؋', '৳', '฿', '៛', '₡', '₦', '₩', '₪', '₫', '€', '₭', '₮', '₱',
    '₲', '₴', '₵', '₸', '₹', '₺', '₼', '₽', '₾', '₿', '﷼', '円', '元',
];

pub fn parse_numeric(value: Option<&str>) -> Result<f64, PipelineError> {
    let Some(raw) = value else {
        return Ok(0.0);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }

    let cleaned: String = trimmed
        .chars()
        .filter(|c| !THOUSANDS_SEPARATORS.contains(c) && !CURRENCY_SYMBOLS.contains(c))
        .collect();

    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(PipelineError::MalformedNumber {
            value: raw.to_string(),
        }),
    }
}

/// Display string for a product's price.
///
/// Equality is checked on the raw text, so `"10"` and `"10.00"` render as a range while two
/// identical strings collapse to a single value.
pub fn price_range(record: &RankingRecord) -> String {
    let currency = record.price_currency.as_deref().unwrap_or("");
    let out = match (record.price_min.as_deref(), record.price_max.as_deref()) {
        (Some(min), Some(max)) if min != max => format!("{min} - {max} {currency}"),
        (Some(min), _) => format!("{min} {currency}"),
        _ => String::new(),
    };
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_missing_are_zero() {
        assert_eq!(parse_numeric(None).unwrap(), 0.0);
        assert_eq!(parse_numeric(Some("")).unwrap(), 0.0);
        assert_eq!(parse_numeric(Some("   ")).unwrap(), 0.0);
    }

    #[test]
    fn strips_separators_and_currency() {
        assert_eq!(parse_numeric(Some("1,234")).unwrap(), 1234.0);
        assert_eq!(parse_numeric(Some(" $19.99 ")).unwrap(), 19.99);
        assert_eq!(parse_numeric(Some("€1 200,5")).unwrap(), 12005.0);
        assert_eq!(parse_numeric(Some("₹2\u{a0}500")).unwrap(), 2500.0);
        assert_eq!(parse_numeric(Some("-3")).unwrap(), -3.0);
    }

    #[test]
    fn rejects_non_numeric_remainder() {
        let err = parse_numeric(Some("n/a")).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedNumber { ref value } if value == "n/a"));
        assert!(parse_numeric(Some("$")).is_err());
        assert!(parse_numeric(Some("NaN")).is_err());
        assert!(parse_numeric(Some("inf")).is_err());
    }

    fn priced(min: Option<&str>, max: Option<&str>, currency: Option<&str>) -> RankingRecord {
        RankingRecord {
            price_min: min.map(str::to_string),
            price_max: max.map(str::to_string),
            price_currency: currency.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn price_range_variants() {
        assert_eq!(price_range(&priced(Some("10"), Some("20"), Some("USD"))), "10 - 20 USD");
        assert_eq!(price_range(&priced(Some("10"), Some("10"), Some("USD"))), "10 USD");
        assert_eq!(price_range(&priced(Some("10"), None, Some("EUR"))), "10 EUR");
        assert_eq!(price_range(&priced(None, Some("20"), Some("EUR"))), "");
        assert_eq!(price_range(&priced(Some("5"), None, None)), "5");
    }

    #[test]
    fn price_equality_is_on_raw_text() {
        assert_eq!(
            price_range(&priced(Some("10"), Some("10.00"), Some("USD"))),
            "10 - 10.00 USD"
        );
    }
}
