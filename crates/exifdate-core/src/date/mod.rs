pub mod exif;
pub mod guess;

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Layout of EXIF `DateTime*` tags, e.g. `2010:05:02 00:00:00`.
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// A capture date inferred from a filename.
///
/// Always a valid calendar day at midnight; there is no way to build one
/// that is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExtractedDate(NaiveDateTime);

impl ExtractedDate {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        Self::from_canonical(&format!("{:04}-{:02}-{:02}", year, month, day))
    }

    /// Strictly parse a canonical `YYYY-MM-DD` string. Year 0 is rejected.
    pub fn from_canonical(s: &str) -> Option<Self> {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
        if date.year() < 1 {
            return None;
        }
        Some(Self(date.and_hms_opt(0, 0, 0)?))
    }

    /// Parse a value in [`EXIF_DATETIME_FORMAT`]. Anything but midnight is rejected.
    pub fn parse_exif(s: &str) -> Option<Self> {
        let dt = NaiveDateTime::parse_from_str(s, EXIF_DATETIME_FORMAT).ok()?;
        if dt.num_seconds_from_midnight() != 0 {
            return None;
        }
        Self::from_ymd(dt.year(), dt.month(), dt.day())
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    /// The value written into the EXIF date tags.
    pub fn to_exif_string(&self) -> String {
        self.0.format(EXIF_DATETIME_FORMAT).to_string()
    }
}

impl fmt::Display for ExtractedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(EXIF_DATETIME_FORMAT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exif_round_trip() {
        for name in ["20050615 beach.jpg", "2007 reunion.jpg", "2007-3 x.jpg", "IMG_20190509_1.jpg"] {
            let date = guess::extract_date_from_filename(name).unwrap();
            assert_eq!(ExtractedDate::parse_exif(&date.to_string()), Some(date));
        }
    }

    #[test]
    fn test_midnight_only() {
        let date = ExtractedDate::from_ymd(2010, 5, 2).unwrap();
        assert_eq!(date.to_exif_string(), "2010:05:02 00:00:00");
        assert!(ExtractedDate::parse_exif("2010:05:02 13:45:00").is_none());
    }

    #[test]
    fn test_rejects_impossible_dates() {
        assert!(ExtractedDate::from_ymd(2007, 13, 1).is_none());
        assert!(ExtractedDate::from_ymd(2007, 4, 31).is_none());
        assert!(ExtractedDate::from_canonical("2007-4-3").is_some());
    }
}
