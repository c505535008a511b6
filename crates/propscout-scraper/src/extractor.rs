use crate::selectors::{
    CardSchema, PdpSchema, CARD_SCHEMA, PDP_PATH_FRAGMENTS, PDP_SCHEMA, PLACEHOLDER_STRINGS, PREMIUM_INDICATORS,
};
use propscout_core::RawFields;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::OnceLock;
use url::Url;

fn price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(₹|rs\.?)\s?[\d,.]+\s?(crore|cr|lac|lakh)").unwrap())
}

fn area_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)[\d,]+\.?\d*\s?(sq\s?ft|sqft|sq\s?yard|sq\s?m|acre|bigha|katha)").unwrap())
}

fn bhk_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+(\.\d+)?\s?bhk|studio|\d+\s?rk)").unwrap())
}

fn labeled_status_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:status|possession)\s*:?\s*([a-zA-Z0-9 /,-]{3,40})").unwrap())
}

/// Keyword scan fallback, ordered by specificity so "ready to move" matches
/// before the looser "ready" (spec §4.3 status extraction).
const STATUS_KEYWORDS_ORDERED: &[&str] = &[
    "ready to move",
    "immediate possession",
    "under construction",
    "new launch",
    "pre launch",
    "resale",
    "possession",
    "ready",
];

fn select_first(fragment: &Html, selectors: &[&str]) -> Option<String> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else { continue };
        if let Some(el) = fragment.select(&selector).next() {
            let text = collapse(&el.text().collect::<String>());
            if !text.is_empty() && !is_placeholder(&text) {
                return Some(text);
            }
        }
    }
    None
}

fn select_first_href(fragment: &Html, selectors: &[&str]) -> Option<String> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else { continue };
        if let Some(el) = fragment.select(&selector).next() {
            if let Some(href) = el.value().attr("href") {
                if !href.trim().is_empty() {
                    return Some(href.trim().to_string());
                }
            }
        }
    }
    None
}

fn select_all_text(fragment: &Html, selectors: &[&str]) -> Vec<String> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else { continue };
        let items: Vec<String> = fragment
            .select(&selector)
            .map(|el| collapse(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect();
        if !items.is_empty() {
            return items;
        }
    }
    Vec::new()
}

fn is_placeholder(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    PLACEHOLDER_STRINGS.contains(&lower.as_str())
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// True if `class_tokens`/`text` carry any of the premium/sponsored indicator
/// markers (spec §4.3 premium detection).
fn detect_premium(class_tokens: &str, text: &str) -> Vec<String> {
    let lower_class = class_tokens.to_lowercase();
    let lower_text = text.to_lowercase();
    PREMIUM_INDICATORS
        .iter()
        .filter(|ind| lower_class.contains(*ind) || lower_text.contains(*ind))
        .map(|s| s.to_string())
        .collect()
}

/// Four-level status strategy: selector match → labeled-regex match →
/// keyword scan (ordered by specificity) → contextual inference from date
/// strings (spec §4.3).
fn extract_status_text(fragment: &Html, schema_selectors: &[&str], card_text: &str, posting_date_text: &str) -> String {
    if let Some(text) = select_first(fragment, schema_selectors) {
        return text;
    }
    if let Some(caps) = labeled_status_re().captures(card_text) {
        return caps[1].trim().to_string();
    }
    let lower = card_text.to_lowercase();
    for kw in STATUS_KEYWORDS_ORDERED {
        if lower.contains(kw) {
            return kw.to_string();
        }
    }
    if !posting_date_text.is_empty() {
        return format!("possession: {posting_date_text}");
    }
    String::new()
}

/// Candidate href must match a known PDP path fragment or a configured
/// city-name path segment (spec §4.3 URL extraction). Relative URLs are
/// resolved against `base_url`.
pub fn resolve_pdp_url(href: &str, base_url: &Url, city_slugs: &[String]) -> Option<String> {
    let looks_like_pdp = PDP_PATH_FRAGMENTS.iter().any(|f| href.to_lowercase().contains(f))
        || city_slugs.iter().any(|slug| href.to_lowercase().contains(&slug.to_lowercase()));
    if !looks_like_pdp {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    base_url.join(href).ok().map(|u| u.to_string())
}

/// One listing card's raw field map plus the secondary posting-date text
/// when a second date-bearing element is present (spec §9 Open Question 1:
/// both candidates are recorded, canonical selection happens downstream
/// where the date parser is available).
pub struct ExtractedCard {
    pub raw: RawFields,
    pub secondary_posting_date_text: Option<String>,
}

/// Pure function over one listing card's HTML fragment (spec §4.3 contract).
pub fn extract_card(card_html: &str, base_url: &Url, city: &str, city_slugs: &[String]) -> ExtractedCard {
    extract_card_with_schema(card_html, base_url, city, city_slugs, &CARD_SCHEMA)
}

fn extract_card_with_schema(card_html: &str, base_url: &Url, city: &str, city_slugs: &[String], schema: &CardSchema) -> ExtractedCard {
    let fragment = Html::parse_fragment(card_html);
    let card_text = collapse(&fragment.root_element().text().collect::<String>());

    let title = select_first(&fragment, schema.title).unwrap_or_default();
    let price_text = select_first(&fragment, schema.price).or_else(|| price_re().find(&card_text).map(|m| m.as_str().to_string())).unwrap_or_default();
    let area_text = select_first(&fragment, schema.area).or_else(|| area_re().find(&card_text).map(|m| m.as_str().to_string())).unwrap_or_default();
    let locality = select_first(&fragment, schema.locality).unwrap_or_default();
    let society = select_first(&fragment, schema.society).unwrap_or_default();
    let bathrooms_text = select_first(&fragment, schema.bathrooms).unwrap_or_default();
    let balconies_text = select_first(&fragment, schema.balconies).unwrap_or_default();

    let bhk_text = bhk_re().find(&card_text).map(|m| m.as_str().to_string()).unwrap_or_default();

    let posting_date_text = select_first(&fragment, schema.posting_date).unwrap_or_default();
    let secondary_posting_date_text = select_first(&fragment, schema.posting_date_secondary);

    let status_text = extract_status_text(&fragment, schema.status, &card_text, &posting_date_text);

    let class_tokens = fragment
        .root_element()
        .first_child()
        .and_then(ElementRef::wrap)
        .and_then(|el| el.value().attr("class").map(|s| s.to_string()))
        .unwrap_or_default();
    let premium_indicators = detect_premium(&class_tokens, &card_text);
    let is_premium = !premium_indicators.is_empty();

    let url = select_first_href(&fragment, schema.property_url)
        .and_then(|href| resolve_pdp_url(&href, base_url, city_slugs))
        .unwrap_or_default();

    let raw = RawFields {
        url,
        title,
        price_text,
        area_text,
        locality,
        society,
        city: city.to_string(),
        property_type: String::new(),
        bhk_text,
        bathrooms_text,
        balconies_text,
        status_text,
        posting_date_text,
        description: String::new(),
        is_premium,
        premium_indicators,
    };

    ExtractedCard { raw, secondary_posting_date_text }
}

/// Locates listing cards on a full page by walking the prioritized container
/// selector list. Accepts the first selector that returns at least
/// `min_cards` cards (spec §4.6 step c: fewer than that is treated as likely
/// selector drift rather than end-of-results). If no selector clears the
/// threshold, falls back to whichever selector matched the most cards, so a
/// genuinely short last page still yields something rather than nothing.
pub fn locate_cards(page_html: &str, min_cards: usize) -> (Vec<String>, Option<&'static str>) {
    let document = Html::parse_document(page_html);
    let mut best: (Vec<String>, Option<&'static str>) = (Vec::new(), None);

    for selector_str in CARD_SCHEMA.container {
        let Ok(selector) = Selector::parse(selector_str) else { continue };
        let cards: Vec<String> = document.select(&selector).map(|el| el.html()).collect();
        if cards.len() >= min_cards {
            return (cards, Some(selector_str));
        }
        if cards.len() > best.0.len() {
            best = (cards, Some(selector_str));
        }
    }
    best
}

/// PDP-specific extended fields not present on listing cards (spec §4.3,
/// §4.7 stage 3 "Extract").
#[derive(Debug, Default)]
pub struct PdpFields {
    pub raw: RawFields,
    pub amenities: Vec<String>,
    pub description: String,
    pub builder_name: String,
    pub specifications: Vec<String>,
}

/// Extracts the richer PDP field set (spec §4.7 stage 3). At least a title
/// or price present is the caller's definition of "successful".
pub fn extract_pdp(page_html: &str, url: &str, city: &str) -> PdpFields {
    extract_pdp_with_schema(page_html, url, city, &PDP_SCHEMA)
}

fn extract_pdp_with_schema(page_html: &str, url: &str, city: &str, schema: &PdpSchema) -> PdpFields {
    let document = Html::parse_document(page_html);
    let page_text = collapse(&document.root_element().text().collect::<String>());

    let title = select_first(&document, schema.title).unwrap_or_default();
    let price_text = select_first(&document, schema.price).or_else(|| price_re().find(&page_text).map(|m| m.as_str().to_string())).unwrap_or_default();
    let area_text = select_first(&document, schema.area).or_else(|| area_re().find(&page_text).map(|m| m.as_str().to_string())).unwrap_or_default();
    let description = select_first(&document, schema.description).unwrap_or_default();
    let builder_name = select_first(&document, schema.builder).unwrap_or_default();
    let amenities = select_all_text(&document, schema.amenities);
    let specifications = select_all_text(&document, schema.specifications);

    let bhk_text = bhk_re().find(&page_text).map(|m| m.as_str().to_string()).unwrap_or_default();
    let status_text = extract_status_text(&document, &[], &page_text, "");

    let mut extended: HashMap<String, String> = HashMap::new();
    if !amenities.is_empty() {
        extended.insert("amenities".to_string(), amenities.join(", "));
    }
    if !builder_name.is_empty() {
        extended.insert("builder_name".to_string(), builder_name.clone());
    }
    if !specifications.is_empty() {
        extended.insert("specifications".to_string(), specifications.join(", "));
    }

    let raw = RawFields {
        url: url.to_string(),
        title,
        price_text,
        area_text,
        locality: String::new(),
        society: String::new(),
        city: city.to_string(),
        property_type: String::new(),
        bhk_text,
        bathrooms_text: String::new(),
        balconies_text: String::new(),
        status_text,
        posting_date_text: String::new(),
        description: description.clone(),
        is_premium: false,
        premium_indicators: Vec::new(),
    };

    PdpFields {
        raw,
        amenities,
        description,
        builder_name,
        specifications,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com").unwrap()
    }

    #[test]
    fn extracts_title_price_area_from_card() {
        let html = r#"<div class="mb-srp__card">
            <h2 class="mb-srp__card--title">2 BHK Apartment</h2>
            <div class="mb-srp__card__price--amount">₹ 85 Lac</div>
            <div class="mb-srp__card__summary--value">1200 sqft</div>
            <a class="mb-srp__card--title" href="/pdpid-123">link</a>
        </div>"#;
        let extracted = extract_card(html, &base(), "mumbai", &[]);
        assert_eq!(extracted.raw.title, "2 BHK Apartment");
        assert!(extracted.raw.price_text.contains("85"));
        assert!(extracted.raw.area_text.contains("1200"));
        assert_eq!(extracted.raw.url, "https://example.com/pdpid-123");
    }

    #[test]
    fn falls_back_to_regex_price_when_selector_absent() {
        let html = r#"<div class="srp-card"><p>Spacious flat priced at Rs. 1.2 Crore near the station</p></div>"#;
        let extracted = extract_card(html, &base(), "pune", &[]);
        assert!(extracted.raw.price_text.to_lowercase().contains("crore"));
    }

    #[test]
    fn premium_card_flagged_by_class_token() {
        let html = r#"<div class="mb-srp__card card-luxury"><h2 class="mb-srp__card--title">Luxury Villa</h2></div>"#;
        let extracted = extract_card(html, &base(), "pune", &[]);
        assert!(extracted.raw.is_premium);
        assert!(extracted.raw.premium_indicators.contains(&"card-luxury".to_string()));
    }

    #[test]
    fn status_keyword_scan_prefers_specific_phrase() {
        let html = r#"<div class="mb-srp__card"><p>This flat is Ready to Move in immediately</p></div>"#;
        let extracted = extract_card(html, &base(), "pune", &[]);
        assert_eq!(extracted.raw.status_text, "ready to move");
    }

    #[test]
    fn url_extraction_rejects_non_pdp_hrefs() {
        let html = r#"<div class="mb-srp__card"><a class="mb-srp__card--title" href="/blog/some-article">link</a></div>"#;
        let extracted = extract_card(html, &base(), "pune", &[]);
        assert!(extracted.raw.url.is_empty());
    }

    #[test]
    fn locate_cards_requires_container_selector_to_match() {
        let page = r#"<html><body>
            <div class="mb-srp__card">one</div>
            <div class="mb-srp__card">two</div>
        </body></html>"#;
        let (cards, selector) = locate_cards(page, 1);
        assert_eq!(cards.len(), 2);
        assert_eq!(selector, Some("div.mb-srp__card"));
    }

    #[test]
    fn pdp_extraction_pulls_amenities_and_builder() {
        let html = r#"<html><body>
            <h1 class="pdp__title">3 BHK Villa</h1>
            <div class="pdp__price--amount">₹ 2.1 Crore</div>
            <ul class="pdp__amenities"><li>Gym</li><li>Pool</li></ul>
            <div class="pdp__builder--name">Acme Builders</div>
        </body></html>"#;
        let fields = extract_pdp(html, "https://example.com/pdpid-9", "mumbai");
        assert_eq!(fields.raw.title, "3 BHK Villa");
        assert_eq!(fields.builder_name, "Acme Builders");
        assert_eq!(fields.amenities, vec!["Gym".to_string(), "Pool".to_string()]);
    }
}
