pub mod anti_detection;
pub mod browser;
pub mod city_slugs;
pub mod coordinator;
pub mod date_text;
pub mod error;
pub mod extractor;
pub mod pdp_engine;
pub mod selectors;
pub mod traversal;
pub mod user_agents;

pub use anti_detection::AntiDetectionController;
pub use browser::{BrowserOptions, BrowserSession, NavigateOutcome};
pub use coordinator::{run_session, CoordinatorOutcome};
pub use date_text::{HeuristicDateParser, PostingDateParser};
pub use error::{Result, ScrapeError};
pub use extractor::{extract_card, extract_pdp, locate_cards, ExtractedCard, PdpFields};
pub use pdp_engine::{scrape_pdps, BatchQualityMetrics, PdpEngineOutcome};
pub use traversal::{traverse, TraversalOutcome};
