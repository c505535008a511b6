pub mod config;
pub mod cooldown;
pub mod error;
pub mod exporter;
pub mod record;
pub mod stats;
pub mod status;
pub mod tracker;
pub mod validator;

pub use config::{ExportFormat, RuntimeConfig, RuntimeConfigOverrides};
pub use cooldown::{segment_key, CooldownTracker};
pub use error::{Result, ScoutError};
pub use exporter::Exporter;
pub use record::{AreaKind, AreaUnit, Bhk, PriceUnit, PropertyRecord, PropertyStatus};
pub use stats::{FilterStats, ScrapingMode, SessionStats};
pub use tracker::{hash_url, normalize_url, SmartFilterLabel, SmartFilterSummary, Tracker, TrackerEntry};
pub use validator::{FilterConfig, RawFields, Validator};
