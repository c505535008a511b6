use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Errors surfaced across the propscout-scraper crate boundary. Transient
/// network and detection errors are recovered locally (spec §7 propagation
/// policy) and never reach this type unless the local retry/recovery budget
/// is exhausted.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("browser error: {0}")]
    Browser(String),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("core error: {0}")]
    Core(#[from] propscout_core::ScoutError),

    #[error("fatal configuration error: {0}")]
    Config(String),
}
