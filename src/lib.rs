//! # Period Shift
//!
//! Detects period expressions in financial disclosure documents and moves
//! the period of every tagged fact onto a new reporting period when a report
//! is rolled forward (Q1 becomes Q2, FY2019 becomes FY2020).
//!
//! ## Core Concepts
//!
//! - **Period markers**: header or cell text such as "Q1 2019", "Jan. 1, 2019"
//!   or "Six months ended June 30", classified into a [`PeriodFormat`]
//! - **Date wrappers**: a classified marker plus the one sibling marker that
//!   disambiguates it (a bare "Q2" under a "2019" header)
//! - **Fiscal periods**: reporting-period literals (`q119`, `ar23`, `mr0424`)
//!   turned into absolute start and end dates
//! - **Shifting**: every fact keeps its relation to the reporting period
//!   (year start, quarter, running total, prior-year comparative)
//!
//! ## Example
//!
//! ```rust,ignore
//! use period_shift::*;
//!
//! let config = ShiftConfig::default();
//! let store = InMemoryMappingStore::new();
//! store.insert("acme", MappingCluster::new("f1", vec![MappingEntry::internal("20190101_20191231")]))?;
//!
//! let shifter = PeriodShifter::new(&store, &config);
//! let report = shifter
//!     .shift(&ShiftRequest {
//!         project_id: "acme".to_string(),
//!         document: r#"<p><span fact-id="f1">100</span></p>"#.to_string(),
//!         base: "ar19".to_string(),
//!         target: "ar20".to_string(),
//!         strategy: ShiftStrategy::BaseRelative,
//!     })
//!     .await;
//! assert_eq!(report.counts.shifted, 1);
//! ```

pub mod classifier;
pub mod config;
pub mod document;
pub mod error;
pub mod fiscal;
pub mod format;
pub mod locale;
pub mod period;
pub mod report;
pub mod resolve;
pub mod shift;
pub mod store;
pub mod table;
pub mod utils;
pub mod wrapper;

pub use classifier::{Classification, Locale, LocaleRules, PatternClassifier, PeriodMatch};
pub use config::ShiftConfig;
pub use document::{Document, FactContext, ProcessingInstruction};
pub use error::{Result, ShiftError};
pub use fiscal::{FiscalPeriod, ProjectType};
pub use format::{PeriodFormat, PeriodType};
pub use period::{FactPeriod, ParsedFactPeriod};
pub use report::{Diagnostics, LogEntry, LogLevel, ShiftCounts, ShiftReport, SourceLocation};
pub use resolve::{resolve_period, ResolvedPeriod};
pub use shift::{shift_base_relative, PeriodShifter, ShiftRequest, ShiftStrategy};
#[cfg(feature = "http")]
pub use store::HttpMappingStore;
pub use store::{InMemoryMappingStore, MappingCluster, MappingEntry, MappingStore};
pub use table::{normalize_header, FactAssignment, Table, TableCell, TableContextResolver, TableRow};
pub use wrapper::{DateAttributes, DateWrapper, Fragments};
