use crate::record::{AreaUnit, Bhk, PriceUnit, PropertyRecord};
use crate::stats::FilterStats;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Fallback base the validator absolutizes relative URLs against, matching
/// the extractor's static vendor host (`propscout-scraper::traversal::base_host`).
const VENDOR_BASE_URL: &str = "https://www.example-realty.test";

fn vendor_base() -> &'static Url {
    static BASE: OnceLock<Url> = OnceLock::new();
    BASE.get_or_init(|| Url::parse(VENDOR_BASE_URL).expect("static vendor base host parses"))
}

fn numeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+\.?\d*)").unwrap())
}

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").unwrap())
}

fn collapse_whitespace(s: &str) -> String {
    s.replace('\n', " ").replace('\t', " ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts the first numeric token from a number+int cell (bathrooms, balconies).
fn first_int(s: &str) -> Option<i32> {
    digits_re().find(s).and_then(|m| m.as_str().parse().ok())
}

/// Extracts the first numeric price figure, ported from the original
/// extract_numeric_price logic but expressed as a unit-tagged value rather
/// than an absolute currency amount (see DESIGN.md Open Question 2).
fn extract_price(price_text: &str) -> Option<(f64, PriceUnit)> {
    let lower = price_text.to_lowercase();
    if lower.contains("on request") || lower.contains("price on request") {
        return Some((0.0, PriceUnit::OnRequest));
    }
    let cleaned: String = price_text.chars().filter(|c| !matches!(c, '₹' | ',')).collect();
    let cleaned = cleaned.trim();
    let number = numeric_re().find(cleaned).and_then(|m| m.as_str().parse::<f64>().ok())?;

    if lower.contains("crore") || lower.contains("cr") {
        Some((number, PriceUnit::Crore))
    } else if lower.contains("lac") || lower.contains("lakh") {
        Some((number, PriceUnit::Lac))
    } else if lower.contains("per sqft") || lower.contains("/sqft") || lower.contains("psf") {
        Some((number, PriceUnit::PerSqft))
    } else {
        Some((number, PriceUnit::Unspecified))
    }
}

fn extract_area(area_text: &str) -> Option<(f64, AreaUnit)> {
    let lower = area_text.to_lowercase();
    let cleaned: String = area_text.chars().filter(|c| *c != ',').collect();
    let number = numeric_re().find(&cleaned).and_then(|m| m.as_str().parse::<f64>().ok())?;

    let unit = if lower.contains("sq yard") || lower.contains("sq. yard") || lower.contains("sqyd") {
        AreaUnit::SqYards
    } else if lower.contains("sq m") || lower.contains("sqm") || lower.contains("square meter") {
        AreaUnit::SqMeters
    } else if lower.contains("acre") {
        AreaUnit::Acres
    } else if lower.contains("bigha") {
        AreaUnit::Bigha
    } else if lower.contains("katha") {
        AreaUnit::Katha
    } else if lower.contains("sqft") || lower.contains("sq ft") || lower.contains("square feet") {
        AreaUnit::Sqft
    } else {
        AreaUnit::Unspecified
    };
    Some((number, unit))
}

/// Converts an area value to sqft using fixed conversion factors. Unknown
/// units return None so range filters on them are skipped rather than applied
/// incorrectly.
fn area_to_sqft(value: f64, unit: AreaUnit) -> Option<f64> {
    match unit {
        AreaUnit::Sqft => Some(value),
        AreaUnit::SqYards => Some(value * 9.0),
        AreaUnit::SqMeters => Some(value * 10.7639),
        AreaUnit::Acres => Some(value * 43_560.0),
        AreaUnit::Bigha => Some(value * 27_000.0),
        AreaUnit::Katha => Some(value * 1_361.25),
        AreaUnit::Unspecified => None,
    }
}

/// Normalizes a price value + unit to lac, mandated at the validator boundary
/// regardless of how the source text expressed it (spec §9 Open Question 2).
fn normalize_to_lac(value: f64, unit: PriceUnit) -> Option<f64> {
    match unit {
        PriceUnit::Lac => Some(value),
        PriceUnit::Crore => Some(value * 100.0),
        PriceUnit::PerSqft | PriceUnit::Unspecified | PriceUnit::OnRequest => None,
    }
}

/// Raw field map handed to the validator by the DOM extractor, before cleaning.
#[derive(Debug, Clone, Default)]
pub struct RawFields {
    pub url: String,
    pub title: String,
    pub price_text: String,
    pub area_text: String,
    pub locality: String,
    pub society: String,
    pub city: String,
    pub property_type: String,
    pub bhk_text: String,
    pub bathrooms_text: String,
    pub balconies_text: String,
    pub status_text: String,
    pub posting_date_text: String,
    pub description: String,
    pub is_premium: bool,
    pub premium_indicators: Vec<String>,
}

fn parse_bhk(title: &str, bhk_text: &str) -> Bhk {
    let combined = format!("{title} {bhk_text}").to_lowercase();
    if combined.contains("studio") {
        return Bhk::Studio;
    }
    if let Some(caps) = Regex::new(r"(\d+(?:\.\d+)?)\s*bhk").unwrap().captures(&combined) {
        let raw = &caps[1];
        if raw.contains('.') {
            if let Ok(f) = raw.parse::<f64>() {
                return Bhk::Fractional(f.floor() as u8);
            }
        } else if let Ok(n) = raw.parse::<u8>() {
            return Bhk::Rooms(n);
        }
    }
    if let Some(caps) = Regex::new(r"(\d+)\s*rk").unwrap().captures(&combined) {
        if let Ok(n) = caps[1].parse::<u8>() {
            return Bhk::NRk(n);
        }
    }
    Bhk::Unspecified
}

/// Parses a BHK allow-list entry (e.g. "2", "2 BHK", "studio", "1 RK") into
/// the same `Bhk` vocabulary `parse_bhk` assigns records, so filtering
/// compares structured values instead of doing substring matching against
/// title/area text (which false-positives on digits inside area figures).
fn parse_bhk_filter(raw: &str) -> Bhk {
    let lower = raw.trim().to_lowercase();
    if lower.contains("studio") {
        return Bhk::Studio;
    }
    if let Some(caps) = Regex::new(r"^(\d+)\s*rk$").unwrap().captures(&lower) {
        if let Ok(n) = caps[1].parse::<u8>() {
            return Bhk::NRk(n);
        }
    }
    if let Some(caps) = numeric_re().captures(&lower) {
        let raw_num = &caps[1];
        if raw_num.contains('.') {
            if let Ok(f) = raw_num.parse::<f64>() {
                return Bhk::Fractional(f.floor() as u8);
            }
        } else if let Ok(n) = raw_num.parse::<u8>() {
            return Bhk::Rooms(n);
        }
    }
    Bhk::Unspecified
}

/// Allow/deny-list filter configuration (spec §4.4, all optional and
/// AND-combined).
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    pub price_min_lac: Option<f64>,
    pub price_max_lac: Option<f64>,
    pub area_min_sqft: Option<f64>,
    pub area_max_sqft: Option<f64>,
    pub property_types: Vec<String>,
    pub bhk_values: Vec<String>,
    pub localities: Vec<String>,
    pub exclude_keywords: Vec<String>,
}

impl FilterConfig {
    fn is_empty(&self) -> bool {
        self.price_min_lac.is_none()
            && self.price_max_lac.is_none()
            && self.area_min_sqft.is_none()
            && self.area_max_sqft.is_none()
            && self.property_types.is_empty()
            && self.bhk_values.is_empty()
            && self.localities.is_empty()
            && self.exclude_keywords.is_empty()
    }
}

pub struct Validator;

impl Validator {
    /// Cleans a raw field map into a PropertyRecord, computing its
    /// data_quality_score. Idempotent: re-running on an already-cleaned
    /// record's fields yields the same output (spec §8 testable property 3).
    pub fn validate_and_clean(raw: RawFields, page_number: u32, position_on_page: u32, session_id: u64) -> PropertyRecord {
        let title = collapse_whitespace(raw.title.trim());
        let locality = collapse_whitespace(raw.locality.trim());
        let society = collapse_whitespace(raw.society.trim());
        let posting_date_raw = collapse_whitespace(raw.posting_date_text.trim());

        let price_text = raw.price_text.trim().to_string();
        let (price_value, price_unit) = match extract_price(&price_text) {
            Some((v, unit)) => (normalize_to_lac(v, unit), unit),
            None => (None, PriceUnit::Unspecified),
        };

        let area_text = raw.area_text.trim().replace(',', "");
        let (area_value, area_unit) = match extract_area(&area_text) {
            Some((v, unit)) => (Some(v), unit),
            None => (None, AreaUnit::Unspecified),
        };

        let url = {
            let trimmed = raw.url.trim();
            if trimmed.is_empty() {
                String::new()
            } else if trimmed.starts_with("http") {
                trimmed.to_string()
            } else {
                vendor_base().join(trimmed).map(|u| u.to_string()).unwrap_or_else(|_| trimmed.to_string())
            }
        };

        let bhk = parse_bhk(&title, &raw.bhk_text);
        let bathrooms = first_int(&raw.bathrooms_text);
        let balconies = first_int(&raw.balconies_text);

        let url_hash = crate::tracker::hash_url(&crate::tracker::normalize_url(&url));

        let mut record = PropertyRecord {
            url,
            url_hash,
            title,
            price_text,
            area_text,
            price_value,
            price_unit,
            area_value,
            area_unit,
            area_kind: Default::default(),
            locality,
            society,
            city: raw.city.trim().to_string(),
            property_type: raw.property_type.trim().to_string(),
            bhk,
            bathrooms,
            balconies,
            status: crate::status::normalize_status(&raw.status_text),
            posting_date_raw,
            posting_date_parsed: None,
            page_number,
            position_on_page,
            scraped_at: chrono::Utc::now(),
            session_id,
            is_premium: raw.is_premium,
            premium_indicators: raw.premium_indicators,
            data_quality_score: 0.0,
            validation_issues: Vec::new(),
            extended_fields: Default::default(),
        };

        let mut issues = Vec::new();
        if record.title.is_empty() {
            issues.push("missing title".to_string());
        }
        if record.price_text.is_empty() {
            issues.push("missing price".to_string());
        }
        if record.area_text.is_empty() {
            issues.push("missing area".to_string());
        }
        if !record.has_minimum_content(record.is_premium) {
            issues.push("insufficient content".to_string());
        }

        record.data_quality_score = Self::quality_score(&record);
        record.validation_issues = issues;
        record
    }

    /// filled canonical fields / total canonical fields * 100
    pub fn quality_score(record: &PropertyRecord) -> f64 {
        let total = PropertyRecord::CANONICAL_FIELDS.len() as f64;
        let mut filled = 0.0;
        if !record.url.is_empty() {
            filled += 1.0;
        }
        if !record.title.is_empty() {
            filled += 1.0;
        }
        if !record.price_text.is_empty() {
            filled += 1.0;
        }
        if !record.area_text.is_empty() {
            filled += 1.0;
        }
        if record.price_value.is_some() {
            filled += 1.0;
        }
        if record.area_value.is_some() {
            filled += 1.0;
        }
        if !record.locality.is_empty() {
            filled += 1.0;
        }
        if !record.society.is_empty() {
            filled += 1.0;
        }
        if !record.city.is_empty() {
            filled += 1.0;
        }
        if !record.property_type.is_empty() {
            filled += 1.0;
        }
        if record.bhk != Bhk::Unspecified {
            filled += 1.0;
        }
        if record.bathrooms.is_some() {
            filled += 1.0;
        }
        if record.balconies.is_some() {
            filled += 1.0;
        }
        if record.status != crate::record::PropertyStatus::Unspecified {
            filled += 1.0;
        }
        if !record.posting_date_raw.is_empty() {
            filled += 1.0;
        }
        ((filled / total) * 100.0 * 10.0).round() / 10.0
    }

    /// Applies the optional, AND-combined filter criteria and updates `stats`.
    pub fn apply_filters(record: &PropertyRecord, filters: &FilterConfig, stats: &mut FilterStats) -> bool {
        if filters.is_empty() {
            stats.record_pass();
            return true;
        }

        if let Some(min) = filters.price_min_lac {
            if let Some(p) = record.price_value {
                if p < min {
                    stats.record_exclusion();
                    return false;
                }
            }
        }
        if let Some(max) = filters.price_max_lac {
            if let Some(p) = record.price_value {
                if p > max {
                    stats.record_exclusion();
                    return false;
                }
            }
        }

        let area_sqft = record.area_value.and_then(|v| area_to_sqft(v, record.area_unit));
        if let Some(min) = filters.area_min_sqft {
            if let Some(a) = area_sqft {
                if a < min {
                    stats.record_exclusion();
                    return false;
                }
            }
        }
        if let Some(max) = filters.area_max_sqft {
            if let Some(a) = area_sqft {
                if a > max {
                    stats.record_exclusion();
                    return false;
                }
            }
        }

        if !filters.property_types.is_empty() {
            let haystack = format!("{} {}", record.title, record.property_type).to_lowercase();
            if !filters.property_types.iter().any(|t| haystack.contains(&t.to_lowercase())) {
                stats.record_exclusion();
                return false;
            }
        }

        if !filters.bhk_values.is_empty() {
            let found = filters.bhk_values.iter().any(|want| parse_bhk_filter(want) == record.bhk);
            if !found {
                stats.record_exclusion();
                return false;
            }
        }

        if !filters.localities.is_empty() {
            let combined = format!("{} {}", record.locality, record.society).to_lowercase();
            if !filters.localities.iter().any(|loc| combined.contains(&loc.to_lowercase())) {
                stats.record_exclusion();
                return false;
            }
        }

        if !filters.exclude_keywords.is_empty() {
            let combined = format!("{} {}", record.title, record.extended_fields.get("description").cloned().unwrap_or_default()).to_lowercase();
            if filters.exclude_keywords.iter().any(|kw| combined.contains(&kw.to_lowercase())) {
                stats.record_exclusion();
                return false;
            }
        }

        stats.record_pass();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raw() -> RawFields {
        RawFields {
            url: "https://example.com/pdpid-123".to_string(),
            title: "  2  BHK  \n Apartment ".to_string(),
            price_text: "₹ 1.5 Crore".to_string(),
            area_text: "1,200 sqft".to_string(),
            locality: "Santacruz East".to_string(),
            society: "Palm Residency".to_string(),
            city: "mumbai".to_string(),
            property_type: "apartment".to_string(),
            bhk_text: String::new(),
            bathrooms_text: "2 Bathrooms".to_string(),
            balconies_text: "1".to_string(),
            status_text: "Ready to Move".to_string(),
            posting_date_text: "2 days ago".to_string(),
            description: "spacious flat".to_string(),
            is_premium: false,
            premium_indicators: vec![],
        }
    }

    #[test]
    fn quality_score_within_bounds() {
        let record = Validator::validate_and_clean(sample_raw(), 1, 0, 1);
        assert!(record.data_quality_score >= 0.0 && record.data_quality_score <= 100.0);
    }

    #[test]
    fn crore_normalizes_to_lac() {
        let record = Validator::validate_and_clean(sample_raw(), 1, 0, 1);
        assert_eq!(record.price_value, Some(150.0));
    }

    #[test]
    fn validation_is_idempotent_over_clean_fields() {
        let record = Validator::validate_and_clean(sample_raw(), 1, 0, 1);
        let rescored = Validator::quality_score(&record);
        assert_eq!(record.data_quality_score, rescored);
    }

    #[test]
    fn filter_stats_total_equals_filtered_plus_excluded() {
        let mut stats = FilterStats::default();
        let filters = FilterConfig {
            price_max_lac: Some(100.0),
            ..Default::default()
        };
        let record = Validator::validate_and_clean(sample_raw(), 1, 0, 1);
        Validator::apply_filters(&record, &filters, &mut stats);
        assert!(stats.is_consistent());
    }

    #[test]
    fn price_over_filter_max_is_excluded() {
        let mut stats = FilterStats::default();
        let filters = FilterConfig {
            price_max_lac: Some(100.0),
            ..Default::default()
        };
        let record = Validator::validate_and_clean(sample_raw(), 1, 0, 1);
        assert!(!Validator::apply_filters(&record, &filters, &mut stats));
        assert_eq!(stats.excluded, 1);
    }

    #[test]
    fn bhk_filter_does_not_false_positive_on_area_digits() {
        let mut raw = sample_raw();
        raw.area_text = "1300 sqft".to_string(); // contains a literal "3"
        let record = Validator::validate_and_clean(raw, 1, 0, 1);
        assert_eq!(record.bhk, Bhk::Rooms(2));

        let mut stats = FilterStats::default();
        let filters = FilterConfig {
            bhk_values: vec!["3".to_string()],
            ..Default::default()
        };
        assert!(!Validator::apply_filters(&record, &filters, &mut stats));
    }

    #[test]
    fn bhk_filter_matches_the_parsed_room_count() {
        let record = Validator::validate_and_clean(sample_raw(), 1, 0, 1);
        assert_eq!(record.bhk, Bhk::Rooms(2));

        let mut stats = FilterStats::default();
        let filters = FilterConfig {
            bhk_values: vec!["2".to_string()],
            ..Default::default()
        };
        assert!(Validator::apply_filters(&record, &filters, &mut stats));
    }
}
