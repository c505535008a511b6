use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

/// Interprets free-form posting-date text into a timestamp. Treated as an
/// external collaborator by the specification (only this interface is
/// modeled here); `HeuristicDateParser` is a working default so the
/// traversal/extraction pipeline has something real to call end to end.
pub trait PostingDateParser: Send + Sync {
    fn parse(&self, text: &str, reference: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

#[derive(Debug, Default)]
pub struct HeuristicDateParser;

impl PostingDateParser for HeuristicDateParser {
    fn parse(&self, text: &str, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }

        if let Ok(d) = NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
            return Some(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0)?));
        }

        if text == "today" {
            return Some(reference);
        }
        if text == "yesterday" {
            return Some(reference - Duration::days(1));
        }

        if let Some(parsed) = parse_relative(&text, reference) {
            return Some(parsed);
        }

        for fmt in ["%d %b %Y", "%d %B %Y"] {
            if let Ok(d) = NaiveDate::parse_from_str(&text, fmt) {
                return Some(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0)?));
            }
        }

        parse_month_year(&text, reference)
    }
}

/// Handles bare "Mon YYYY" / "Month YYYY" phrasing (e.g. "Dec 2024"), common
/// in possession-date and contextual-inference text (spec §4.3 status
/// extraction's contextual-inference fallback).
fn parse_month_year(text: &str, _reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
    for fmt in ["%b %Y", "%B %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(&format!("01 {text}"), &format!("%d {fmt}")) {
            return Some(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0)?));
        }
    }
    None
}

/// Handles "N day(s)/week(s)/month(s) ago" phrasing.
fn parse_relative(text: &str, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if !text.ends_with("ago") {
        return None;
    }
    let mut parts = text.split_whitespace();
    let n: i64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?;

    let delta = if unit.starts_with("day") {
        Duration::days(n)
    } else if unit.starts_with("week") {
        Duration::weeks(n)
    } else if unit.starts_with("month") {
        Duration::days(n * 30)
    } else if unit.starts_with("hour") {
        Duration::hours(n)
    } else {
        return None;
    };

    Some(reference - delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap()
    }

    #[test]
    fn parses_today_and_yesterday() {
        let parser = HeuristicDateParser;
        assert_eq!(parser.parse("Today", reference()), Some(reference()));
        assert_eq!(parser.parse("Yesterday", reference()), Some(reference() - Duration::days(1)));
    }

    #[test]
    fn parses_relative_days_ago() {
        let parser = HeuristicDateParser;
        let parsed = parser.parse("3 days ago", reference()).unwrap();
        assert_eq!(parsed, reference() - Duration::days(3));
    }

    #[test]
    fn unparseable_text_returns_none() {
        let parser = HeuristicDateParser;
        assert_eq!(parser.parse("whenever", reference()), None);
    }

    #[test]
    fn parses_month_year() {
        let parser = HeuristicDateParser;
        assert!(parser.parse("Dec 2024", reference()).is_some());
    }
}
