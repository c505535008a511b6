use crate::config::ExportFormat;
use crate::error::{Result, ScoutError};
use crate::record::PropertyRecord;
use crate::stats::SessionStats;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Serialize)]
struct ExportMetadata<'a> {
    scrape_timestamp: chrono::DateTime<Utc>,
    total_properties: usize,
    session_stats: &'a SessionStats,
    scraper_version: &'static str,
}

#[derive(Debug, Serialize)]
struct JsonEnvelope<'a> {
    metadata: ExportMetadata<'a>,
    properties: &'a [PropertyRecord],
}

/// Writes `contents` to `path` atomically: temp file in the same directory,
/// fsync, then rename (spec §4.9, testable property #8 — no partial file with
/// the target name exists on a write failure).
fn atomic_write(path: &Path, contents: impl FnOnce(&mut std::fs::File) -> Result<()>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let file = tmp.as_file_mut();
        contents(file)?;
        file.sync_all()?;
    }
    tmp.persist(path).map_err(|e| ScoutError::Export(e.to_string()))?;
    Ok(())
}

fn default_filename(mode: &str, ext: &str, timestamp: chrono::DateTime<Utc>) -> String {
    format!("scrape_{}_{}.{}", mode.to_lowercase(), timestamp.format("%Y%m%d_%H%M%S"), ext)
}

pub struct Exporter;

impl Exporter {
    /// Writes every requested sink for `records`, returning the paths written.
    /// Zero records produces no file and a warning, per sink (spec §4.9).
    pub fn export(
        records: &[PropertyRecord],
        stats: &SessionStats,
        formats: &std::collections::HashSet<ExportFormat>,
        output_dir: &Path,
        mode: &str,
    ) -> Result<Vec<PathBuf>> {
        if records.is_empty() {
            warn!("export requested with zero records; no files written");
            return Ok(Vec::new());
        }

        let timestamp = Utc::now();
        let mut written = Vec::new();

        if formats.contains(&ExportFormat::Csv) {
            let path = output_dir.join(default_filename(mode, "csv", timestamp));
            Self::export_csv(records, &path)?;
            written.push(path);
        }
        if formats.contains(&ExportFormat::Json) {
            let path = output_dir.join(default_filename(mode, "json", timestamp));
            Self::export_json(records, stats, timestamp, &path)?;
            written.push(path);
        }
        if formats.contains(&ExportFormat::Spreadsheet) {
            let path = output_dir.join(default_filename(mode, "xlsx", timestamp));
            Self::export_spreadsheet(records, stats, &path)?;
            written.push(path);
        }

        Ok(written)
    }

    fn export_csv(records: &[PropertyRecord], path: &Path) -> Result<()> {
        atomic_write(path, |file| {
            let mut writer = csv::Writer::from_writer(file);
            writer.write_record([
                "url_hash",
                "url",
                "title",
                "price_text",
                "price_value_lac",
                "area_text",
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
                "data_quality_score",
                "is_premium",
            ])?;
            for r in records {
                writer.write_record([
                    r.url_hash.clone(),
                    r.url.clone(),
                    r.title.clone(),
                    r.price_text.clone(),
                    r.price_value.map(|v| v.to_string()).unwrap_or_default(),
                    r.area_text.clone(),
                    r.area_value.map(|v| v.to_string()).unwrap_or_default(),
                    r.locality.clone(),
                    r.society.clone(),
                    r.city.clone(),
                    r.property_type.clone(),
                    format!("{:?}", r.bhk),
                    r.bathrooms.map(|v| v.to_string()).unwrap_or_default(),
                    r.balconies.map(|v| v.to_string()).unwrap_or_default(),
                    format!("{:?}", r.status),
                    r.posting_date_raw.clone(),
                    r.data_quality_score.to_string(),
                    r.is_premium.to_string(),
                ])?;
            }
            writer.flush()?;
            Ok(())
        })
    }

    fn export_json(records: &[PropertyRecord], stats: &SessionStats, timestamp: chrono::DateTime<Utc>, path: &Path) -> Result<()> {
        let envelope = JsonEnvelope {
            metadata: ExportMetadata {
                scrape_timestamp: timestamp,
                total_properties: records.len(),
                session_stats: stats,
                scraper_version: env!("CARGO_PKG_VERSION"),
            },
            properties: records,
        };
        atomic_write(path, |file| {
            serde_json::to_writer_pretty(&mut *file, &envelope)?;
            file.write_all(b"\n")?;
            Ok(())
        })
    }

    fn export_spreadsheet(records: &[PropertyRecord], stats: &SessionStats, path: &Path) -> Result<()> {
        use rust_xlsxwriter::Workbook;

        let mut workbook = Workbook::new();

        let records_sheet = workbook.add_worksheet().set_name("Records").map_err(ScoutError::Xlsx)?;
        let headers = ["url", "title", "price_value_lac", "area_value", "city", "status", "data_quality_score"];
        for (col, header) in headers.iter().enumerate() {
            records_sheet.write_string(0, col as u16, *header).map_err(ScoutError::Xlsx)?;
        }
        for (row, r) in records.iter().enumerate() {
            let row = (row + 1) as u32;
            records_sheet.write_string(row, 0, &r.url).map_err(ScoutError::Xlsx)?;
            records_sheet.write_string(row, 1, &r.title).map_err(ScoutError::Xlsx)?;
            if let Some(v) = r.price_value {
                records_sheet.write_number(row, 2, v).map_err(ScoutError::Xlsx)?;
            }
            if let Some(v) = r.area_value {
                records_sheet.write_number(row, 3, v).map_err(ScoutError::Xlsx)?;
            }
            records_sheet.write_string(row, 4, &r.city).map_err(ScoutError::Xlsx)?;
            records_sheet.write_string(row, 5, format!("{:?}", r.status)).map_err(ScoutError::Xlsx)?;
            records_sheet.write_number(row, 6, r.data_quality_score).map_err(ScoutError::Xlsx)?;
        }

        let summary_sheet = workbook.add_worksheet().set_name("Summary").map_err(ScoutError::Xlsx)?;
        let rows: [(&str, String); 6] = [
            ("session_id", stats.session_id.to_string()),
            ("mode", format!("{:?}", stats.mode)),
            ("pages_scraped", stats.pages_scraped.to_string()),
            ("properties_found", stats.properties_found.to_string()),
            ("properties_saved", stats.properties_saved.to_string()),
            ("incremental_stopped", stats.incremental_stopped.to_string()),
        ];
        for (i, (label, value)) in rows.iter().enumerate() {
            summary_sheet.write_string(i as u32, 0, *label).map_err(ScoutError::Xlsx)?;
            summary_sheet.write_string(i as u32, 1, value).map_err(ScoutError::Xlsx)?;
        }

        let mut by_city: HashMap<&str, usize> = HashMap::new();
        for r in records {
            *by_city.entry(r.city.as_str()).or_default() += 1;
        }
        if by_city.len() > 1 {
            let city_sheet = workbook.add_worksheet().set_name("CityBreakdown").map_err(ScoutError::Xlsx)?;
            city_sheet.write_string(0, 0, "city").map_err(ScoutError::Xlsx)?;
            city_sheet.write_string(0, 1, "count").map_err(ScoutError::Xlsx)?;
            for (i, (city, count)) in by_city.iter().enumerate() {
                let row = (i + 1) as u32;
                city_sheet.write_string(row, 0, *city).map_err(ScoutError::Xlsx)?;
                city_sheet.write_number(row, 1, *count as f64).map_err(ScoutError::Xlsx)?;
            }
        }

        atomic_write(path, |file| {
            let bytes = workbook.save_to_buffer().map_err(ScoutError::Xlsx)?;
            file.write_all(&bytes)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::ScrapingMode;

    fn sample_record() -> PropertyRecord {
        crate::validator::Validator::validate_and_clean(
            crate::validator::RawFields {
                url: "https://example.com/pdpid-1".to_string(),
                title: "2 BHK Apartment".to_string(),
                price_text: "1 Crore".to_string(),
                area_text: "1000 sqft".to_string(),
                city: "mumbai".to_string(),
                ..Default::default()
            },
            1,
            0,
            1,
        )
    }

    #[test]
    fn zero_records_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let stats = SessionStats::new(1, ScrapingMode::Full);
        let mut formats = std::collections::HashSet::new();
        formats.insert(ExportFormat::Csv);
        let written = Exporter::export(&[], &stats, &formats, dir.path(), "full").unwrap();
        assert!(written.is_empty());
    }

    #[test]
    fn csv_export_produces_one_row_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![sample_record()];
        let stats = SessionStats::new(1, ScrapingMode::Full);
        let mut formats = std::collections::HashSet::new();
        formats.insert(ExportFormat::Csv);
        let written = Exporter::export(&records, &stats, &formats, dir.path(), "full").unwrap();
        assert_eq!(written.len(), 1);
        let contents = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn json_metadata_total_matches_record_count() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![sample_record(), sample_record()];
        let stats = SessionStats::new(1, ScrapingMode::Full);
        let mut formats = std::collections::HashSet::new();
        formats.insert(ExportFormat::Json);
        let written = Exporter::export(&records, &stats, &formats, dir.path(), "full").unwrap();
        let contents = std::fs::read_to_string(&written[0]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["metadata"]["total_properties"], 2);
        assert_eq!(value["properties"].as_array().unwrap().len(), 2);
    }
}
