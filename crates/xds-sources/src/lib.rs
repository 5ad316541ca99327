//! # xds-sources
//!
//! Backend instance records for the discovery engine.
//!
//! This crate owns the data that templates render from:
//!
//! - [`Source`] - A backend that produces instance records
//! - [`SourceManager`] - Fetches all sources and publishes a [`SourceSnapshot`]
//! - [`SnapshotProvider`] - The read/refresh capability the engine depends on
//! - [`RefreshStats`] - Counters for refresh cycles
//!
//! ## Key Design Decisions
//!
//! - Snapshots are immutable and replaced wholesale through `ArcSwap`
//! - Readers never take a lock; a reader holds one snapshot for a whole request
//! - Refreshes are serialized: a refresh that finds another in flight is skipped
//! - A failed refresh keeps the previous snapshot in place
//!
//! ## Example
//!
//! ```rust,ignore
//! use xds_sources::{InlineSource, SourceManager};
//!
//! let manager = SourceManager::new(vec![Box::new(InlineSource::new("static", records))]);
//! manager.refresh_now().await;
//!
//! let instances = manager.get_snapshot("T1");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod manager;
mod snapshot;
mod source;
mod stats;

pub use manager::{RefreshOutcome, SnapshotProvider, SourceManager};
pub use snapshot::SourceSnapshot;
pub use source::{FileSource, InlineSource, Source, SourceConfig};
pub use stats::RefreshStats;

/// Default record attribute naming the partitions a record belongs to.
pub const DEFAULT_MATCH_KEY: &str = "service_clusters";

/// Partition name that matches every partition.
pub const WILDCARD_PARTITION: &str = "*";
