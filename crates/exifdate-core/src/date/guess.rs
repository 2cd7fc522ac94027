use regex::Regex;
use std::sync::LazyLock;

use super::ExtractedDate;

/// How much of a calendar date a pattern captures. Missing fields default to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Year,
    YearMonth,
    YearMonthDay,
    /// `YYYYMMDD` behind a camera prefix, with arbitrary text before the extension.
    YearMonthDayWithSuffix,
}

/// How the captured digits are separated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Hyphenated,
    Compact,
}

pub struct FilenamePattern {
    pub name: &'static str,
    pub granularity: Granularity,
    regex: &'static LazyLock<Regex>,
    layout: Layout,
}

/// A pattern hit that survived calendar validation.
#[derive(Debug, Clone, Copy)]
pub struct PatternMatch {
    pub pattern: &'static str,
    pub date: ExtractedDate,
}

static RE_PREFIXED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"IMG_(?P<date>[0-9]{8}).*\.(?i:jpe?g)$").unwrap());
static RE_YMD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<date>[0-9]{4}-[0-9]{1,2}-[0-9]{1,2})").unwrap());
static RE_YM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<date>[0-9]{4}-[0-9]{1,2})").unwrap());
static RE_YM_PADDED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<date>[0-9]{4}-[0-9]{2})").unwrap());
static RE_COMPACT_8: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?P<date>[0-9]{8})").unwrap());
static RE_COMPACT_6: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?P<date>[0-9]{6})").unwrap());
static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?P<date>[0-9]{4})").unwrap());

/// Priority order: most specific first. New conventions are appended here.
static PATTERNS: &[FilenamePattern] = &[
    FilenamePattern {
        name: "IMG_yyyymmdd*.jpg",
        granularity: Granularity::YearMonthDayWithSuffix,
        regex: &RE_PREFIXED,
        layout: Layout::Compact,
    },
    FilenamePattern {
        name: "yyyy-mm-dd",
        granularity: Granularity::YearMonthDay,
        regex: &RE_YMD,
        layout: Layout::Hyphenated,
    },
    FilenamePattern {
        name: "yyyy-m",
        granularity: Granularity::YearMonth,
        regex: &RE_YM,
        layout: Layout::Hyphenated,
    },
    FilenamePattern {
        name: "yyyy-mm",
        granularity: Granularity::YearMonth,
        regex: &RE_YM_PADDED,
        layout: Layout::Hyphenated,
    },
    FilenamePattern {
        name: "yyyymmdd",
        granularity: Granularity::YearMonthDay,
        regex: &RE_COMPACT_8,
        layout: Layout::Compact,
    },
    FilenamePattern {
        name: "yyyymm",
        granularity: Granularity::YearMonth,
        regex: &RE_COMPACT_6,
        layout: Layout::Compact,
    },
    FilenamePattern {
        name: "yyyy",
        granularity: Granularity::Year,
        regex: &RE_YEAR,
        layout: Layout::Compact,
    },
];

impl FilenamePattern {
    /// Turn the captured digits into a canonical `YYYY-MM-DD` string and validate it.
    fn normalize(&self, captured: &str) -> Option<ExtractedDate> {
        let (year, month, day) = match self.layout {
            Layout::Hyphenated => {
                let mut parts = captured.split('-');
                (parts.next()?, parts.next(), parts.next())
            }
            Layout::Compact => (
                captured.get(..4)?,
                captured.get(4..6),
                captured.get(6..8),
            ),
        };

        let (month, day) = match self.granularity {
            Granularity::Year => ("1", "1"),
            Granularity::YearMonth => (month?, "1"),
            Granularity::YearMonthDay | Granularity::YearMonthDayWithSuffix => {
                let day = day?;
                // Camera exports write `00` when the day is unknown.
                let day = if self.layout == Layout::Compact && day == "00" { "01" } else { day };
                (month?, day)
            }
        };

        ExtractedDate::from_canonical(&format!("{}-{:0>2}-{:0>2}", year, month, day))
    }
}

/// The ordered pattern table.
pub fn patterns() -> &'static [FilenamePattern] {
    PATTERNS
}

/// Find the first pattern, in priority order, whose candidate is a real calendar date.
///
/// A candidate that fails validation is skipped and its digits are masked, so
/// a coarser pattern cannot reinterpret part of it (e.g. `2007-13-40` never
/// degrades to the bare year `2007`).
pub fn match_filename(filename: &str) -> Option<PatternMatch> {
    let basename = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let mut working = basename.to_string();

    for pat in PATTERNS {
        let mut rejected = Vec::new();
        for caps in pat.regex.captures_iter(&working) {
            let Some(m) = caps.name("date") else { continue };
            if let Some(date) = pat.normalize(m.as_str()) {
                return Some(PatternMatch { pattern: pat.name, date });
            }
            rejected.push(m.range());
        }
        for range in rejected {
            let mask = "#".repeat(range.len());
            working.replace_range(range, &mask);
        }
    }

    None
}

pub fn extract_date_from_filename(filename: &str) -> Option<ExtractedDate> {
    match_filename(filename).map(|m| m.date)
}
