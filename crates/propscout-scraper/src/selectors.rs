/// Centralized selector/regex data for card and PDP extraction (spec §4.3,
/// §9 DOM-extractor pluggability note: these drift as the target site
/// changes and should live in one place, not scattered across extractor
/// logic).
pub struct CardSchema {
    pub container: &'static [&'static str],
    pub title: &'static [&'static str],
    pub price: &'static [&'static str],
    pub area: &'static [&'static str],
    pub locality: &'static [&'static str],
    pub society: &'static [&'static str],
    pub property_url: &'static [&'static str],
    pub status: &'static [&'static str],
    pub posting_date: &'static [&'static str],
    pub posting_date_secondary: &'static [&'static str],
    pub bathrooms: &'static [&'static str],
    pub balconies: &'static [&'static str],
}

pub const CARD_SCHEMA: CardSchema = CardSchema {
    container: &[
        "div.mb-srp__card",
        "div.srp-card",
        "div[data-summary='srp-tuple']",
        "article.property-card",
    ],
    title: &["h2.mb-srp__card--title", ".srp-card__title", "a.property-title", "h2 a"],
    price: &[".mb-srp__card__price--amount", ".srp-card__price", ".price-value"],
    area: &[".mb-srp__card__summary--value", ".srp-card__area", ".area-value"],
    locality: &[".mb-srp__card--address", ".srp-card__locality"],
    society: &[".mb-srp__card--society", ".srp-card__society"],
    property_url: &["a.mb-srp__card--title", "a.srp-card__title-link", "a[href*='pdpid']"],
    status: &[".mb-srp__card__summary--status", ".srp-card__status", ".possession-status"],
    posting_date: &[".mb-srp__card--date", ".srp-card__date"],
    posting_date_secondary: &[".mb-srp__card__photo--date", ".srp-card__date-secondary"],
    bathrooms: &[".mb-srp__card__summary--bathroom", ".srp-card__bathroom"],
    balconies: &[".mb-srp__card__summary--balcony", ".srp-card__balcony"],
};

/// Known PDP path fragments (spec §4.3 URL extraction, §6 target site
/// contract).
pub const PDP_PATH_FRAGMENTS: &[&str] = &["pdpid", "propertydetail", "property-details"];

/// Vendor placeholder strings that must not be accepted as a valid field
/// value even though a selector matched.
pub const PLACEHOLDER_STRINGS: &[&str] = &["n/a", "na", "-", "--", "not available", "unknown"];

/// Premium/sponsored card indicators (spec §4.3 premium detection).
pub const PREMIUM_INDICATORS: &[&str] = &[
    "preferred-agent",
    "card-luxury",
    "premium",
    "sponsored",
    "featured",
    "highlighted",
];

/// Boilerplate "about" page title the vendor serves when it suspects
/// automation (spec §4.1, §6).
pub const BOILERPLATE_ABOUT_TITLE: &str = "about us";

/// Detection keywords scanned over page HTML/title (spec §4.1), grounded on
/// the original bot_detection_handler's indicator set.
pub const DETECTION_KEYWORDS: &[&str] = &[
    "captcha",
    "are you a robot",
    "access denied",
    "unusual traffic",
    "cloudflare",
    "checking your browser",
    "automated access",
    "verify you are human",
    "blocked",
    "403 forbidden",
];

pub struct PdpSchema {
    pub title: &'static [&'static str],
    pub price: &'static [&'static str],
    pub area: &'static [&'static str],
    pub amenities: &'static [&'static str],
    pub description: &'static [&'static str],
    pub builder: &'static [&'static str],
    pub specifications: &'static [&'static str],
}

pub const PDP_SCHEMA: PdpSchema = PdpSchema {
    title: &["h1.pdp__title", "h1.details-heading", "h1"],
    price: &[".pdp__price--amount", ".details-price"],
    area: &[".pdp__size--value", ".details-area"],
    amenities: &[".pdp__amenities li", ".amenities-list li"],
    description: &[".pdp__description", ".details-description"],
    builder: &[".pdp__builder--name", ".details-builder"],
    specifications: &[".pdp__specifications li", ".details-specs li"],
};
