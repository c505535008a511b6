use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Price unit a raw price string was expressed in, before validator normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceUnit {
    Lac,
    Crore,
    PerSqft,
    Unspecified,
    OnRequest,
}

impl Default for PriceUnit {
    fn default() -> Self {
        PriceUnit::Unspecified
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    Sqft,
    SqYards,
    SqMeters,
    Acres,
    Bigha,
    Katha,
    Unspecified,
}

impl Default for AreaUnit {
    fn default() -> Self {
        AreaUnit::Unspecified
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaKind {
    Carpet,
    BuiltUp,
    Super,
    Plot,
    Land,
    Unspecified,
}

impl Default for AreaKind {
    fn default() -> Self {
        AreaKind::Unspecified
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bhk {
    Studio,
    Rooms(u8),
    Fractional(u8),
    NRk(u8),
    Unspecified,
}

impl Default for Bhk {
    fn default() -> Self {
        Bhk::Unspecified
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    ReadyToMove,
    UnderConstruction,
    NewLaunch,
    Resale,
    PreLaunch,
    ImmediatePossession,
    PossessionDated,
    Unspecified,
}

impl Default for PropertyStatus {
    fn default() -> Self {
        PropertyStatus::Unspecified
    }
}

/// One scraped listing, as defined by the data model's canonical attributes.
///
/// `url_hash` is the dedup key; `data_quality_score` is always in [0, 100].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub url: String,
    pub url_hash: String,

    pub title: String,
    pub price_text: String,
    pub area_text: String,

    pub price_value: Option<f64>,
    pub price_unit: PriceUnit,

    pub area_value: Option<f64>,
    pub area_unit: AreaUnit,
    pub area_kind: AreaKind,

    pub locality: String,
    pub society: String,
    pub city: String,

    pub property_type: String,
    pub bhk: Bhk,

    pub bathrooms: Option<i32>,
    pub balconies: Option<i32>,

    pub status: PropertyStatus,

    pub posting_date_raw: String,
    pub posting_date_parsed: Option<DateTime<Utc>>,

    pub page_number: u32,
    pub position_on_page: u32,
    pub scraped_at: DateTime<Utc>,
    /// Non-canonical: the session this record was scraped under. Excluded from
    /// the quality-score denominator along with the other provenance fields.
    pub session_id: u64,

    pub is_premium: bool,
    pub premium_indicators: Vec<String>,

    pub data_quality_score: f64,
    pub validation_issues: Vec<String>,

    pub extended_fields: HashMap<String, String>,
}

impl PropertyRecord {
    /// Canonical field names used for the quality-score denominator.
    /// Provenance fields (scraped_at, session_id, page_number, position_on_page)
    /// are deliberately excluded.
    pub const CANONICAL_FIELDS: &'static [&'static str] = &[
        "url",
        "title",
        "price_text",
        "area_text",
        "price_value",
        "area_value",
        "locality",
        "society",
        "city",
        "property_type",
        "bhk",
        "bathrooms",
        "balconies",
        "status",
        "posting_date_raw",
    ];

    /// True if at least a title, or both price and area, are present.
    /// Premium cards are exempt and only need one of title/price/area.
    pub fn has_minimum_content(&self, is_premium: bool) -> bool {
        if is_premium {
            return !self.title.trim().is_empty()
                || !self.price_text.trim().is_empty()
                || !self.area_text.trim().is_empty();
        }
        !self.title.trim().is_empty() || (!self.price_text.trim().is_empty() && !self.area_text.trim().is_empty())
    }

    /// Merge PDP-phase fields into this listing-phase record. Only fields the
    /// PDP pass can actually improve are overwritten; extended_fields are unioned.
    pub fn merge_pdp(&mut self, pdp: PropertyRecord) {
        if !pdp.title.trim().is_empty() {
            self.title = pdp.title;
        }
        if pdp.price_value.is_some() {
            self.price_value = pdp.price_value;
            self.price_unit = pdp.price_unit;
            self.price_text = pdp.price_text;
        }
        if pdp.area_value.is_some() {
            self.area_value = pdp.area_value;
            self.area_unit = pdp.area_unit;
            self.area_kind = pdp.area_kind;
            self.area_text = pdp.area_text;
        }
        if pdp.bathrooms.is_some() {
            self.bathrooms = pdp.bathrooms;
        }
        if pdp.balconies.is_some() {
            self.balconies = pdp.balconies;
        }
        if pdp.status != PropertyStatus::Unspecified {
            self.status = pdp.status;
        }
        self.extended_fields.extend(pdp.extended_fields);
        self.data_quality_score = crate::validator::Validator::quality_score(self);
    }
}
