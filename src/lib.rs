//! `Restamp` - Visual text search and replace for PDF documents
//!
//! # Features
//!
//! - **Text reconstruction**: page text rebuilt from positioned glyph runs,
//!   with heuristic word and line breaks
//! - **Search**: literal, case-insensitive by default, optional whole-word
//! - **Geometry**: every match mapped to a page-coordinate rectangle
//! - **Visual replacement**: erase-and-redraw with font-metric fit scaling,
//!   committed through load/mutate/save transactions
//!
//! # Example
//!
//! ```rust,no_run
//! use restamp::{PdfEditSession, ReplaceOptions, SearchOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bytes = std::fs::read("report.pdf")?;
//!     let mut session = PdfEditSession::new(bytes);
//!     let matches = session
//!         .find_text_matches(&SearchOptions::new("DRAFT"))
//!         .await?;
//!     println!("{} matches", matches.len());
//!     let outcome = session
//!         .replace_text(&ReplaceOptions {
//!             search: SearchOptions::new("DRAFT"),
//!             replacement: "FINAL".to_string(),
//!         })
//!         .await?;
//!     println!("{} replaced, {} skipped", outcome.replacements, outcome.skipped);
//!     std::fs::write("report.pdf", session.bytes())?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod geometry;
pub mod layout;
pub mod matcher;
pub mod metrics;
pub mod provider;
pub mod replace;
pub mod session;

pub use error::{EngineError, Result};
pub use geometry::{Rect, RunRefinement, TextMatch};
pub use layout::{LayoutConfig, PageText, TextEntry};
pub use matcher::{Matcher, SearchOptions};
pub use provider::{GlyphRun, GlyphRunProvider, LopdfRunProvider, PageRuns};
pub use replace::{BulkReplaceOutcome, ReplaceOutcome, SkipReason};
pub use session::{PdfEditSession, ReplaceOptions};

/// Version of restamp
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
