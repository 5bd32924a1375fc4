//! SensWatch Detect - Sensitive data detection for local files.
//!
//! This crate holds the rule catalog and everything needed to turn one file
//! into a [`DetectionRecord`]:
//!
//! - [`validators`] - Checksum and date validators for rule candidates
//! - [`rules`] - The 18 built-in rules and their numbers
//! - [`matcher`] - Boundary-safe windowed matching over byte streams
//! - [`extractor`] - Text streams for plain files, Office documents and PDFs
//! - [`recognizer`] - Optional address/name recognition (rule 19)
//! - [`scanner`] - The per-file pipeline
//!
//! # Example
//!
//! ```rust
//! use senswatch_detect::{matcher::scan_text, RuleSet};
//!
//! let table = scan_text(RuleSet::builtin(), "联系电话 13812345678");
//! assert_eq!(table.get("phone"), ["13812345678"]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod decode;
pub mod error;
pub mod extractor;
pub mod hash;
pub mod matcher;
pub mod recognizer;
pub mod record;
pub mod rules;
pub mod scanner;
pub mod validators;

pub use error::{DetectError, Result};
pub use extractor::{ExtractorSet, TextExtractor};
pub use matcher::{MatchTable, StreamMatcher};
pub use recognizer::{CommandRecognizer, EntityRecognizer};
pub use record::{index_key, DetectionRecord, RULE_NUMBER_SEPARATOR};
pub use rules::{Rule, RuleSet, ADDRESS_NAME};
pub use scanner::{FileScanner, PathScanner};
