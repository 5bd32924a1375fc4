//! Per-file detection records.

use crate::matcher::MatchTable;
use crate::rules::RuleSet;
use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// `detect_time` format: local time, second precision.
pub const DETECT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Separator used when rule numbers are stored as a single string.
pub const RULE_NUMBER_SEPARATOR: &str = "、";

/// Detection result for one file.
///
/// Only records with a non-zero `total_sensitive_count` are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// File name component of `file_path`
    pub file_name: String,
    /// Absolute path, the record's unique key
    pub file_path: String,
    /// MD5 hex digest of the raw file bytes
    pub md5: String,
    /// Local time of the scan, `YYYY-MM-DD HH:MM:SS`
    pub detect_time: String,
    /// Rule name to number of matches
    pub match_counts: BTreeMap<String, usize>,
    /// Rule name to matched values
    pub matches: MatchTable,
    /// Sum of `match_counts`
    pub total_sensitive_count: usize,
    /// Ascending, deduplicated numbers of the rules that matched
    pub rule_numbers: Vec<u8>,
}

impl DetectionRecord {
    /// Build a record from a file's match table.
    ///
    /// Rule numbers come from the catalog; names it does not know contribute
    /// counts but no number.
    #[must_use]
    pub fn build(
        path: &Path,
        matches: MatchTable,
        md5: String,
        detect_time: NaiveDateTime,
        rules: &RuleSet,
    ) -> Self {
        let match_counts = matches.counts();
        let total_sensitive_count = matches.total();
        let rule_numbers = match_counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .filter_map(|(name, _)| rules.number_of(name))
            .collect::<BTreeSet<u8>>()
            .into_iter()
            .collect();

        Self {
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_path: index_key(path),
            md5,
            detect_time: detect_time.format(DETECT_TIME_FORMAT).to_string(),
            match_counts,
            matches,
            total_sensitive_count,
            rule_numbers,
        }
    }

    /// Whether anything sensitive was found.
    #[must_use]
    pub fn has_findings(&self) -> bool {
        self.total_sensitive_count > 0
    }

    /// Rule numbers joined for storage, e.g. `"1、8"`.
    #[must_use]
    pub fn rule_numbers_joined(&self) -> String {
        join_rule_numbers(&self.rule_numbers)
    }
}

/// Key a file is stored under: its absolute path. Relative paths resolve
/// against the working directory; symlinks are not followed.
#[must_use]
pub fn index_key(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

/// Current local time truncated to seconds.
#[must_use]
pub fn detect_time_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Join rule numbers with [`RULE_NUMBER_SEPARATOR`].
#[must_use]
pub fn join_rule_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(RULE_NUMBER_SEPARATOR)
}

/// Parse a joined rule number string; unparsable parts are dropped.
#[must_use]
pub fn parse_rule_numbers(joined: &str) -> Vec<u8> {
    joined
        .split(RULE_NUMBER_SEPARATOR)
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ADDRESS_NAME;
    use chrono::NaiveDate;

    fn fixed_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|date| date.and_hms_opt(9, 30, 5))
            .expect("valid timestamp")
    }

    #[test]
    fn test_build_record() {
        let mut matches = MatchTable::new();
        matches.push("id_number", "110101199003074514".to_string());
        matches.push("phone", "13812345678".to_string());
        matches.push("phone", "13912345678".to_string());
        matches.push(ADDRESS_NAME, "张三".to_string());

        let record = DetectionRecord::build(
            Path::new("/docs/a.txt"),
            matches,
            "abc123".to_string(),
            fixed_time(),
            RuleSet::builtin(),
        );

        assert_eq!(record.file_name, "a.txt");
        assert_eq!(record.file_path, "/docs/a.txt");
        assert_eq!(record.detect_time, "2024-03-15 09:30:05");
        assert_eq!(record.total_sensitive_count, 4);
        assert_eq!(record.match_counts.get("phone"), Some(&2));
        assert_eq!(record.rule_numbers, vec![1, 8, 19]);
        assert_eq!(record.rule_numbers_joined(), "1、8、19");
        assert!(record.has_findings());
    }

    #[test]
    fn test_empty_record() {
        let record = DetectionRecord::build(
            Path::new("/docs/clean.txt"),
            MatchTable::new(),
            "d41d8cd98f00b204e9800998ecf8427e".to_string(),
            fixed_time(),
            RuleSet::builtin(),
        );
        assert!(!record.has_findings());
        assert!(record.rule_numbers.is_empty());
        assert_eq!(record.rule_numbers_joined(), "");
    }

    #[test]
    fn test_relative_path_is_keyed_absolute() {
        let record = DetectionRecord::build(
            Path::new("docs/a.txt"),
            MatchTable::new(),
            "abc".to_string(),
            fixed_time(),
            RuleSet::builtin(),
        );

        let expected = std::env::current_dir()
            .expect("working directory")
            .join("docs/a.txt");
        assert!(Path::new(&record.file_path).is_absolute());
        assert_eq!(record.file_path, expected.to_string_lossy());
        assert_eq!(record.file_name, "a.txt");
        assert_eq!(index_key(Path::new("docs/a.txt")), record.file_path);
        assert_eq!(index_key(Path::new("/docs/a.txt")), "/docs/a.txt");
    }

    #[test]
    fn test_rule_number_parsing() {
        assert_eq!(parse_rule_numbers("1、8、19"), vec![1, 8, 19]);
        assert_eq!(parse_rule_numbers("8"), vec![8]);
        assert!(parse_rule_numbers("").is_empty());
        assert_eq!(join_rule_numbers(&[2, 6]), "2、6");
    }

    #[test]
    fn test_json_shape() {
        let mut matches = MatchTable::new();
        matches.push("id_number", "110101199003074514".to_string());
        let record = DetectionRecord::build(
            Path::new("/docs/a.txt"),
            matches,
            "abc".to_string(),
            fixed_time(),
            RuleSet::builtin(),
        );

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["matches"]["id_number"][0], "110101199003074514");
        assert_eq!(json["match_counts"]["id_number"], 1);
        assert_eq!(json["rule_numbers"], serde_json::json!([8]));
        assert_eq!(json["total_sensitive_count"], 1);
    }

    #[test]
    fn test_detect_time_now_has_no_fraction() {
        let now = detect_time_now();
        assert_eq!(now.nanosecond(), 0);
    }
}
