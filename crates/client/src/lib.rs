//! Client code for prts-sync.
//!
//! This crate provides the static HTTP fetch path, the section extractors,
//! the shared render surface with glossary tooltip scraping, the detail page
//! pipeline and the batch sync steps used by the CLI.

pub mod detail;
pub mod extract;
pub mod fetch;
pub mod render;
pub mod sync;
pub mod terms;

pub use detail::{DetailPipeline, Stage};
pub use extract::{Sections, clean_desc, clean_text, parse_glossary, parse_roster, parse_sections};
pub use fetch::{FetchClient, FetchConfig, article_url};
pub use render::{HoverSurface, Launcher, PageTab, RenderError, RenderPool, RenderSurface};
#[cfg(feature = "render")]
pub use render::{ChromeLauncher, ChromeSurface, ChromeTab};
pub use sync::{BatchOptions, CancelFlag, SyncReport, store_detail, sync_details, sync_roster, sync_terms};
pub use terms::{TermExtractor, TermTally};
