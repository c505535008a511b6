//! S6-style scenario (spec §8): filter configuration excludes a record that
//! fails any AND-combined criterion, and the FilterStats invariant
//! (total = filtered + excluded) holds across a session.

use propscout_core::{FilterConfig, FilterStats, RawFields, Validator};

fn apartment_over_budget() -> propscout_core::PropertyRecord {
    Validator::validate_and_clean(
        RawFields {
            url: "https://www.example-realty.test/pdpid-501".to_string(),
            title: "Spacious 3 BHK Apartment, under construction".to_string(),
            price_text: "2 Crore".to_string(),
            area_text: "1500 sqft".to_string(),
            city: "gurgaon".to_string(),
            property_type: "apartment".to_string(),
            description: "under construction, possession in 2027".to_string(),
            ..Default::default()
        },
        1,
        0,
        1,
    )
}

#[test]
fn price_cap_and_keyword_deny_list_exclude_the_record() {
    let mut stats = FilterStats::default();
    let filters = FilterConfig {
        price_max_lac: Some(100.0),
        property_types: vec!["apartment".to_string()],
        exclude_keywords: vec!["under construction".to_string()],
        ..Default::default()
    };

    let record = apartment_over_budget();
    // Price is 2 Crore -> normalized to 200 lac, over the 100 lac cap.
    assert_eq!(record.price_value, Some(200.0));

    let passed = Validator::apply_filters(&record, &filters, &mut stats);
    assert!(!passed);
    assert_eq!(stats.excluded, 1);
    assert_eq!(stats.filtered, 0);
    assert!(stats.is_consistent());
}

#[test]
fn property_type_allow_list_passes_a_matching_record() {
    let mut stats = FilterStats::default();
    let filters = FilterConfig {
        property_types: vec!["apartment".to_string()],
        ..Default::default()
    };

    let record = apartment_over_budget();
    let passed = Validator::apply_filters(&record, &filters, &mut stats);
    assert!(passed);
    assert_eq!(stats.filtered, 1);
    assert!(stats.is_consistent());
}

#[test]
fn filter_stats_invariant_holds_across_a_mixed_batch() {
    let mut stats = FilterStats::default();
    let filters = FilterConfig {
        price_max_lac: Some(100.0),
        ..Default::default()
    };

    let cheap = Validator::validate_and_clean(
        RawFields {
            title: "1 BHK Flat".to_string(),
            price_text: "40 Lac".to_string(),
            area_text: "500 sqft".to_string(),
            city: "pune".to_string(),
            ..Default::default()
        },
        1,
        0,
        1,
    );
    let expensive = apartment_over_budget();

    Validator::apply_filters(&cheap, &filters, &mut stats);
    Validator::apply_filters(&expensive, &filters, &mut stats);

    assert_eq!(stats.total, 2);
    assert_eq!(stats.filtered, 1);
    assert_eq!(stats.excluded, 1);
    assert!(stats.is_consistent());
}
