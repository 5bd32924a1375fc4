//! SensWatch Sync - Keeps the detection index in step with the filesystem.
//!
//! - [`event`] - Change log line classification
//! - [`tailer`] - Incremental change log reader with commit-after-success offsets
//! - [`reconciler`] - Two-phase transactional index updates
//! - [`batch`] - Full scans from a file index or directory walk
//! - [`runner`] - The live polling loop
//!
//! # Example
//!
//! ```ignore
//! use senswatch_sync::{ChangeLogTailer, EventParser, LiveRunner, Reconciler};
//!
//! let tailer = ChangeLogTailer::new("simple_everything.log", EventParser::new(&config.watch));
//! let reconciler = Reconciler::new(db, FileScanner::from_config(&config));
//! let mut runner = LiveRunner::new(tailer, reconciler, Duration::from_secs(3));
//! runner.run_until(shutdown).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod batch;
pub mod error;
pub mod event;
pub mod reconciler;
pub mod runner;
pub mod tailer;

pub use batch::{collect_targets, run_batch, write_json_export, FileIndex};
pub use error::{Result, SyncError};
pub use event::{ChangeEvent, EventParser};
pub use reconciler::{PendingScans, ReconcileReport, Reconciler};
pub use runner::LiveRunner;
pub use tailer::{ChangeLogTailer, TailBatch};
