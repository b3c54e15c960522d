//! Version ledger reconstructed from the tag namespace
//!
//! The tag namespace is the only durable record of release state. Every run
//! reads the full listing, folds it into a [`VersionLedger`] and discards it
//! at the end:
//!
//! - **tag**: grammar for classifying and formatting tag names
//! - **parser**: the fold from tag events to ledger
//! - **resolver**: bumped and published versions per environment
//! - **build_id**: next build id and changelog comparison bound
//! - **environment**: release channel keys and their ordering

pub mod build_id;
pub mod environment;
pub mod parser;
pub mod resolver;
pub mod tag;

pub use build_id::{ComparisonBuild, comparison_build_id, next_build_id};
pub use environment::{Environment, sort_environments};
pub use parser::{AppLedger, VersionLedger};
pub use resolver::{PublishedVersion, VersionResolver};
pub use tag::{BuildOutcome, LedgerScope, Marker, TagKind, VersionFlags};
