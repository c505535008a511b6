use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScoutError>;

/// Errors surfaced across the propscout-core crate boundary.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("tracker store error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("spreadsheet export error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("export error: {0}")]
    Export(String),
}
