//! S1-style scenario (spec §8): validated records flow through the
//! Exporter and the CSV row count matches the JSON metadata's
//! total_properties.

use propscout_core::{ExportFormat, Exporter, RawFields, ScrapingMode, SessionStats, Validator};
use std::collections::HashSet;

fn sample_records(n: usize) -> Vec<propscout_core::PropertyRecord> {
    (0..n)
        .map(|i| {
            Validator::validate_and_clean(
                RawFields {
                    url: format!("https://www.example-realty.test/pdpid-{i}"),
                    title: format!("{} BHK Apartment", (i % 4) + 1),
                    price_text: "1.2 Crore".to_string(),
                    area_text: "1100 sqft".to_string(),
                    city: "gurgaon".to_string(),
                    locality: "Sector 50".to_string(),
                    ..Default::default()
                },
                1,
                i as u32,
                1,
            )
        })
        .collect()
}

#[test]
fn csv_row_count_matches_json_metadata_total() {
    let dir = tempfile::tempdir().unwrap();
    let records = sample_records(42);
    let mut stats = SessionStats::new(1, ScrapingMode::Full);
    stats.pages_scraped = 2;
    stats.properties_found = records.len() as u64;
    stats.properties_saved = records.len() as u64;
    stats.finalize();

    let mut formats = HashSet::new();
    formats.insert(ExportFormat::Csv);
    formats.insert(ExportFormat::Json);

    let written = Exporter::export(&records, &stats, &formats, dir.path(), "full").unwrap();
    assert_eq!(written.len(), 2);

    let csv_path = written.iter().find(|p| p.extension().and_then(|e| e.to_str()) == Some("csv")).unwrap();
    let json_path = written.iter().find(|p| p.extension().and_then(|e| e.to_str()) == Some("json")).unwrap();

    let csv_contents = std::fs::read_to_string(csv_path).unwrap();
    let csv_row_count = csv_contents.lines().count() - 1; // minus header

    let json_contents = std::fs::read_to_string(json_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json_contents).unwrap();
    let json_total = value["metadata"]["total_properties"].as_u64().unwrap() as usize;

    assert_eq!(csv_row_count, json_total);
    assert_eq!(json_total, 42);
}

#[test]
fn exported_records_all_have_bounded_quality_scores() {
    let records = sample_records(10);
    for record in &records {
        assert!(record.data_quality_score >= 0.0);
        assert!(record.data_quality_score <= 100.0);
    }
}

#[test]
fn zero_records_produces_no_export_file() {
    let dir = tempfile::tempdir().unwrap();
    let stats = SessionStats::new(1, ScrapingMode::Full);
    let mut formats = HashSet::new();
    formats.insert(ExportFormat::Csv);
    formats.insert(ExportFormat::Json);
    formats.insert(ExportFormat::Spreadsheet);

    let written = Exporter::export(&[], &stats, &formats, dir.path(), "full").unwrap();
    assert!(written.is_empty());
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn spreadsheet_export_writes_a_valid_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let records = sample_records(3);
    let stats = SessionStats::new(1, ScrapingMode::Full);
    let mut formats = HashSet::new();
    formats.insert(ExportFormat::Spreadsheet);

    let written = Exporter::export(&records, &stats, &formats, dir.path(), "full").unwrap();
    assert_eq!(written.len(), 1);
    let bytes = std::fs::read(&written[0]).unwrap();
    assert!(!bytes.is_empty());
    // XLSX files are zip archives; the local file header signature is "PK".
    assert_eq!(&bytes[0..2], b"PK");
}
