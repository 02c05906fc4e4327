// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Date and CRC extraction from `;A`/`;S` header lines, with filename and
//! mtime fallbacks.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

/// Year assumed for headers that carry a weekday and day-month but no year.
const DEFAULT_HEADER_YEAR: i32 = 1989;

const WEEKDAYS: &str = "Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday";
const MONTHS: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";

lazy_static! {
    /// `... Friday, July 3, 1992 -- Day number 185 ...`
    static ref FULL_DATE_RE: Regex = Regex::new(&format!(
        r"(?i)\b(?:{WEEKDAYS})\b[,\s]+({MONTHS})\s+(\d{{1,2}}),?\s+(\d{{4}}).*?Day\s+number\s+(\d{{1,3}})"
    ))
    .expect("static regex");

    /// `... Day number 185 : Friday, July 3, 1992 ...`
    static ref DAY_FIRST_RE: Regex = Regex::new(&format!(
        r"(?i)Day\s+number\s+(\d{{1,3}})\s*:?\s*\b(?:{WEEKDAYS})\b[,\s]+({MONTHS})\s+(\d{{1,2}}),?\s+(\d{{4}})"
    ))
    .expect("static regex");

    /// `... Friday, 3 July ...`, year optional elsewhere on the line.
    static ref YEARLESS_RE: Regex = Regex::new(&format!(
        r"(?i)\b(?:{WEEKDAYS})\b[,\s]+(\d{{1,2}})\s+({MONTHS})"
    ))
    .expect("static regex");

    static ref INLINE_YEAR_RE: Regex = Regex::new(r"\b((?:19|20)\d{2})\b").expect("static regex");

    static ref CRC_RE: Regex = Regex::new(r"\bCRC-?([0-9A-Fa-f]{1,8})\b").expect("static regex");

    static ref FILENAME_DAY_RE: Regex =
        Regex::new(r"(?i)^nodelist\.(\d{1,3})$").expect("static regex");
    static ref FILENAME_ZONE_RE: Regex =
        Regex::new(r"(?i)^z\d+-(\d{1,3})\.(\d{2})$").expect("static regex");
    static ref FILENAME_YEAR_DAY_RE: Regex =
        Regex::new(r"(?i)^nodelist[_-](\d{4})[_-](\d{1,3})").expect("static regex");
}

/// What one header line yielded. Fields stay `None` when the line carried
/// nothing usable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderInfo {
    pub date: Option<NaiveDate>,
    pub day_of_year: Option<u32>,
    pub crc: Option<u32>,
}

impl HeaderInfo {
    pub fn merge(&mut self, other: HeaderInfo) {
        if self.date.is_none() {
            self.date = other.date;
        }
        if self.day_of_year.is_none() {
            self.day_of_year = other.day_of_year;
        }
        if self.crc.is_none() {
            self.crc = other.crc;
        }
    }
}

fn month_number(name: &str) -> Option<u32> {
    let index = MONTHS
        .split('|')
        .position(|m| m.eq_ignore_ascii_case(name))?;
    Some(index as u32 + 1)
}

/// Parse one `;A`/`;S` header line. The three date patterns are tried in
/// order; the first that yields a valid calendar date wins.
pub fn parse_header_line(line: &str) -> HeaderInfo {
    let mut info = HeaderInfo::default();

    if let Some(caps) = FULL_DATE_RE.captures(line) {
        let date = month_number(&caps[1]).and_then(|month| {
            NaiveDate::from_ymd_opt(
                caps[3].parse().ok()?,
                month,
                caps[2].parse().ok()?,
            )
        });
        if let Some(date) = date {
            info.date = Some(date);
            info.day_of_year = caps[4].parse().ok();
        }
    }

    if info.date.is_none() {
        if let Some(caps) = DAY_FIRST_RE.captures(line) {
            let date = month_number(&caps[2]).and_then(|month| {
                NaiveDate::from_ymd_opt(
                    caps[4].parse().ok()?,
                    month,
                    caps[3].parse().ok()?,
                )
            });
            if let Some(date) = date {
                info.date = Some(date);
                info.day_of_year = caps[1].parse().ok();
            }
        }
    }

    if info.date.is_none() {
        if let Some(caps) = YEARLESS_RE.captures(line) {
            let year = INLINE_YEAR_RE
                .captures(line)
                .and_then(|y| y[1].parse().ok())
                .unwrap_or(DEFAULT_HEADER_YEAR);
            info.date = month_number(&caps[2]).and_then(|month| {
                NaiveDate::from_ymd_opt(year, month, caps[1].parse().ok()?)
            });
        }
    }

    if let Some(caps) = CRC_RE.captures(line) {
        info.crc = u32::from_str_radix(&caps[1], 16).ok();
    }

    info
}

/// Recover a date from the filename, trying `nodelist.NNN`, `zN-NNN.YY`
/// and `nodelist[_-]YYYY[_-]NNN`, with the directory path supplying a year
/// for the day-only pattern.
pub fn date_from_filename(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;

    if let Some(caps) = FILENAME_DAY_RE.captures(name) {
        let day: u32 = caps[1].parse().ok()?;
        let year = year_from_directory(path)?;
        return NaiveDate::from_yo_opt(year, day);
    }

    if let Some(caps) = FILENAME_ZONE_RE.captures(name) {
        let day: u32 = caps[1].parse().ok()?;
        let two_digit: i32 = caps[2].parse().ok()?;
        let year = if two_digit >= 70 {
            1900 + two_digit
        } else {
            2000 + two_digit
        };
        return NaiveDate::from_yo_opt(year, day);
    }

    if let Some(caps) = FILENAME_YEAR_DAY_RE.captures(name) {
        let year: i32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        return NaiveDate::from_yo_opt(year, day);
    }

    None
}

/// First 4-digit year found among the ancestor directory names.
fn year_from_directory(path: &Path) -> Option<i32> {
    for ancestor in path.ancestors().skip(1) {
        let Some(name) = ancestor.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(caps) = INLINE_YEAR_RE.captures(name) {
            return caps[1].parse().ok();
        }
    }
    None
}

/// Last resort: the file's modification time.
pub fn date_from_mtime(path: &Path) -> Option<NaiveDate> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let datetime: DateTime<Utc> = modified.into();
    Some(datetime.date_naive())
}

/// Day-of-year for a date, used when the header did not state one.
pub fn day_of_year(date: NaiveDate) -> u32 {
    date.ordinal()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_date_pattern_with_day_number() {
        let info =
            parse_header_line(";A FidoNet Nodelist for Friday, July 3, 1992 -- Day number 185");
        assert_eq!(info.date, NaiveDate::from_ymd_opt(1992, 7, 3));
        assert_eq!(info.day_of_year, Some(185));
    }

    #[test]
    fn day_number_first_pattern() {
        let info = parse_header_line(";S Day number 60 : Friday, March 1, 1991");
        assert_eq!(info.date, NaiveDate::from_ymd_opt(1991, 3, 1));
        assert_eq!(info.day_of_year, Some(60));
    }

    #[test]
    fn yearless_pattern_defaults_to_1989() {
        let info = parse_header_line(";A Nodelist for Friday, 3 February");
        assert_eq!(info.date, NaiveDate::from_ymd_opt(1989, 2, 3));
    }

    #[test]
    fn yearless_pattern_prefers_inline_year() {
        let info = parse_header_line(";A Nodelist for Friday, 3 February -- 1995 edition");
        assert_eq!(info.date, NaiveDate::from_ymd_opt(1995, 2, 3));
    }

    #[test]
    fn crc_token_parses_as_hex_with_and_without_dash() {
        assert_eq!(parse_header_line(";A whatever CRC-1A2B").crc, Some(0x1a2b));
        assert_eq!(parse_header_line(";A whatever CRC00FF").crc, Some(0xff));
        assert_eq!(parse_header_line(";A no checksum here").crc, None);
    }

    #[test]
    fn filename_day_pattern_takes_year_from_directory() {
        let date = date_from_filename(Path::new("/archive/1994/nodelist.185"));
        assert_eq!(date, NaiveDate::from_yo_opt(1994, 185));
    }

    #[test]
    fn filename_zone_pattern_expands_two_digit_years() {
        assert_eq!(
            date_from_filename(Path::new("z2-123.95")),
            NaiveDate::from_yo_opt(1995, 123)
        );
        assert_eq!(
            date_from_filename(Path::new("z2-005.03")),
            NaiveDate::from_yo_opt(2003, 5)
        );
    }

    #[test]
    fn filename_year_day_pattern() {
        assert_eq!(
            date_from_filename(Path::new("nodelist_2023_123.gz")),
            NaiveDate::from_yo_opt(2023, 123)
        );
        assert_eq!(
            date_from_filename(Path::new("nodelist-2020-001")),
            NaiveDate::from_yo_opt(2020, 1)
        );
    }

    #[test]
    fn unknown_filename_yields_none() {
        assert_eq!(date_from_filename(Path::new("README.txt")), None);
    }
}
