//! Built-in detection rule catalog.
//!
//! Each rule pairs a length-bounded pattern with an optional validator. The
//! candidate text of every pattern is the named group `c`; anything around it
//! is a consumed boundary delimiter. Bounded patterns let the stream matcher
//! compute a finite overlap between windows.

use crate::validators;
use once_cell::sync::Lazy;
use regex::{Match, Regex};
use std::fmt;

/// Name of the recognizer-only rule for addresses and person names.
pub const ADDRESS_NAME: &str = "address_name";

/// Rule number reported for recognizer matches.
pub const ADDRESS_NAME_NUMBER: u8 = 19;

/// Boundary context added on top of the longest rule match when sizing the
/// window overlap (one trailing delimiter of up to 4 bytes plus slack).
const BOUNDARY_CONTEXT: usize = 8;

// Boundary delimiters. `^`/`$` cover the start and end of the text.
const NOT_DIGIT_BEFORE: &str = r"(?:^|[^0-9])";
const NOT_DIGIT_AFTER: &str = r"(?:$|[^0-9])";

static BUILTIN: Lazy<RuleSet> = Lazy::new(RuleSet::compile_builtin);

/// A single detection rule.
pub struct Rule {
    name: &'static str,
    number: u8,
    pattern: Regex,
    validator: Option<fn(&str) -> bool>,
    upper_case: bool,
    max_len: usize,
}

/// One raw pattern hit, before validation.
#[derive(Debug, Clone, Copy)]
pub struct RawMatch<'t> {
    /// Byte offset where the whole match (delimiters included) starts
    pub start: usize,
    /// The candidate text itself
    pub candidate: Match<'t>,
}

impl Rule {
    fn new(name: &'static str, number: u8, pattern: &str, max_len: usize) -> Self {
        let pattern = Regex::new(pattern)
            .unwrap_or_else(|err| panic!("{name} regex is hardcoded and valid: {err}"));
        Self {
            name,
            number,
            pattern,
            validator: None,
            upper_case: false,
            max_len,
        }
    }

    fn digit_bounded(name: &'static str, number: u8, core: &str, max_len: usize) -> Self {
        Self::new(
            name,
            number,
            &format!("{NOT_DIGIT_BEFORE}(?P<c>{core}){NOT_DIGIT_AFTER}"),
            max_len,
        )
    }

    fn validated(mut self, validator: fn(&str) -> bool) -> Self {
        self.validator = Some(validator);
        self
    }

    fn reported_upper_case(mut self) -> Self {
        self.upper_case = true;
        self
    }

    /// Rule name, used as the key in match tables.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stable rule number.
    #[must_use]
    pub fn number(&self) -> u8 {
        self.number
    }

    /// Upper bound in bytes of one raw match, boundary delimiters included.
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Find the leftmost raw match starting at or after byte offset `start`.
    ///
    /// Text before `start` is context only, so `^` never matches past the
    /// beginning of `text`.
    #[must_use]
    pub fn find_at<'t>(&self, text: &'t str, start: usize) -> Option<RawMatch<'t>> {
        let caps = self.pattern.captures_at(text, start)?;
        let whole = caps.get(0)?;
        let candidate = caps.name("c")?;
        Some(RawMatch {
            start: whole.start(),
            candidate,
        })
    }

    /// Normalize and validate a candidate. Returns the reported value.
    #[must_use]
    pub fn accept(&self, candidate: &str) -> Option<String> {
        let value = if self.upper_case {
            candidate.to_ascii_uppercase()
        } else {
            candidate.to_string()
        };

        match self.validator {
            Some(validate) if !validate(&value) => None,
            _ => Some(value),
        }
    }

    /// Scan a complete text and return every accepted value in order.
    ///
    /// The next search resumes at the end of the previous candidate, so one
    /// delimiter between two adjacent candidates serves both.
    #[must_use]
    pub fn find_all(&self, text: &str) -> Vec<String> {
        let mut found = Vec::new();
        let mut cursor = 0;

        while let Some(raw) = self.find_at(text, cursor) {
            cursor = next_cursor(text, cursor, raw.candidate.end());
            if let Some(value) = self.accept(raw.candidate.as_str()) {
                found.push(value);
            }
        }

        found
    }
}

/// Cursor after a candidate ending at `end`; always makes progress.
pub(crate) fn next_cursor(text: &str, cursor: usize, end: usize) -> usize {
    if end > cursor {
        return end;
    }
    text[cursor..]
        .chars()
        .next()
        .map_or(text.len(), |ch| cursor + ch.len_utf8())
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("number", &self.number)
            .field("validated", &self.validator.is_some())
            .field("max_len", &self.max_len)
            .finish_non_exhaustive()
    }
}

/// Ordered, immutable catalog of rules.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<Rule>,
    overlap: usize,
}

impl RuleSet {
    /// The 18 built-in rules, compiled once.
    #[must_use]
    pub fn builtin() -> &'static RuleSet {
        &BUILTIN
    }

    fn compile_builtin() -> Self {
        let ip_octet = "(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])";
        let host = r"(?:[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}|[A-Za-z0-9_.-]{1,253})";
        let port = "(?::[0-9]{1,5})?";
        let national = NATIONALITIES.join("|");

        Self::from_rules(vec![
            Rule::digit_bounded(
                "phone",
                1,
                "1(?:3[0-9]|4[5-9]|5[0-35-9]|6[56]|7[0-8]|8[0-9]|9[189])[0-9]{8}",
                19,
            ),
            Rule::digit_bounded("ip", 2, &format!(r"(?:{ip_octet}\.){{3}}{ip_octet}"), 23),
            Rule::new(
                "mac",
                3,
                "(?P<c>(?:[0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}|(?:[0-9A-Fa-f]{2}-){5}[0-9A-Fa-f]{2})",
                17,
            ),
            Rule::new("ipv6", 4, "(?P<c>[0-9A-Fa-f:]{2,39})", 39).validated(validators::ipv6),
            Rule::digit_bounded("bank_card", 5, "[0-9]{16,19}", 27).validated(validators::luhn),
            Rule::new(
                "email",
                6,
                r"(?P<c>[A-Za-z0-9_.-]{1,64}@[A-Za-z0-9_.-]{1,253}\.[A-Za-z]{2,4})",
                323,
            ),
            Rule::digit_bounded(
                "passport",
                7,
                "[GgTtSsLlQqDdAaFf][0-9]{8}|[PpSs][0-9]{7}|1[45][0-9]{7}",
                18,
            ),
            Rule::digit_bounded(
                "id_number",
                8,
                "[1-9][0-9]{5}(?:18|19|[23][0-9])[0-9]{2}(?:0[1-9]|1[0-2])(?:[0-2][1-9]|10|20|30|31)[0-9]{3}[0-9Xx]\
                 |[1-9][0-9]{7}(?:0[1-9]|1[0-2])(?:[0-2][1-9]|10|20|30|31)[0-9]{3}",
                26,
            )
            .validated(validators::national_id),
            Rule::new("gender", 9, "(?P<c>(?i:男|male|女|female))", 12),
            Rule::new("national", 10, &format!("(?P<c>{national})"), 15),
            Rule::new(
                "carnum",
                11,
                "(?P<c>[京津沪渝冀豫云辽黑湘皖鲁新苏浙赣鄂桂甘晋蒙陕吉闽贵粤青藏川宁琼使领A-Z][A-Z][A-Z0-9]{4}[A-Z0-9挂学警港澳])",
                11,
            ),
            Rule::digit_bounded(
                "telephone",
                12,
                "(?:0[0-9]{2,3}-)?(?:[2-9][0-9]{6,7}){1,2}(?:-[0-9]{1,4})?",
                34,
            )
            .validated(validators::telephone_length),
            Rule::new("officer", 13, "(?P<c>[^\\x00-\\x7F]字第[0-9A-Za-z]{4,8}号?)", 21),
            Rule::digit_bounded("HM_pass", 14, "[HMhm][0-9]{8,10}", 19),
            Rule::new(
                "jdbc",
                15,
                &format!(
                    "(?P<c>jdbc:(?:mysql://{host}{port}/[A-Za-z0-9_-]{{1,64}}(?:\\?[A-Za-z0-9_=&%-]{{1,256}})?\
                     |oracle:thin:@{host}{port}:[A-Za-z0-9_]{{1,64}}\
                     |(?:microsoft:)?sqlserver://{host}{port}(?:;[A-Za-z0-9_=%-]{{1,64}}){{0,16}}))"
                ),
                1326,
            ),
            Rule::new(
                "organization",
                16,
                "(?:^|[^0-9A-Za-z-])(?P<c>[0-9A-Za-z]{8}[0-9Xx])(?:$|[^0-9A-Za-z-])",
                17,
            )
            .validated(validators::organization_code)
            .reported_upper_case(),
            Rule::digit_bounded("business", 17, "[0-9]{15}", 23)
                .validated(validators::business_registration),
            Rule::new(
                "credit",
                18,
                "(?:^|[^0-9A-Za-z])(?P<c>[1-9Yy][0-9A-Za-z]{17})(?:$|[^0-9A-Za-z])",
                26,
            )
            .validated(validators::credit_code)
            .reported_upper_case(),
        ])
    }

    fn from_rules(rules: Vec<Rule>) -> Self {
        let overlap = rules.iter().map(Rule::max_len).max().unwrap_or(0) + BOUNDARY_CONTEXT;
        Self { rules, overlap }
    }

    /// Iterate rules in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Number of rules in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Look up a rule by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    /// Rule number for a rule name, including the recognizer-only rule.
    #[must_use]
    pub fn number_of(&self, name: &str) -> Option<u8> {
        if name == ADDRESS_NAME {
            return Some(ADDRESS_NAME_NUMBER);
        }
        self.get(name).map(Rule::number)
    }

    /// Bytes of already-scanned text a window must retain so that no match
    /// straddling the window edge is missed.
    #[must_use]
    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

/// The 56 ethnic group names, with the `族` suffix forms first so they win.
const NATIONALITIES: [&str; 112] = [
    "汉族", "满族", "蒙古族", "回族", "藏族", "维吾尔族", "苗族", "彝族", "壮族", "布依族",
    "侗族", "瑶族", "白族", "土家族", "哈尼族", "哈萨克族", "傣族", "黎族", "傈僳族", "佤族",
    "畲族", "高山族", "拉祜族", "水族", "东乡族", "纳西族", "景颇族", "柯尔克孜族", "土族",
    "达斡尔族", "仫佬族", "羌族", "布朗族", "撒拉族", "毛南族", "仡佬族", "锡伯族", "阿昌族",
    "普米族", "朝鲜族", "塔吉克族", "怒族", "乌孜别克族", "俄罗斯族", "鄂温克族", "德昂族",
    "保安族", "裕固族", "京族", "塔塔尔族", "独龙族", "鄂伦春族", "赫哲族", "门巴族", "珞巴族",
    "基诺族", "汉", "满", "蒙古", "回", "藏", "维吾尔", "苗", "彝", "壮", "布依", "侗", "瑶",
    "白", "土家", "哈尼", "哈萨克", "傣", "黎", "傈僳", "佤", "畲", "高山", "拉祜", "水", "东乡",
    "纳西", "景颇", "柯尔克孜", "土", "达斡尔", "仫佬", "羌", "布朗", "撒拉", "毛南", "仡佬",
    "锡伯", "阿昌", "普米", "朝鲜", "塔吉克", "怒", "乌孜别克", "俄罗斯", "鄂温克", "德昂",
    "保安", "裕固", "京", "塔塔尔", "独龙", "鄂伦春", "赫哲", "门巴", "珞巴", "基诺",
];
