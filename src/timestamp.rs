use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

/// Matches a file name stem that ends with the File History backup timestamp,
/// for example `Report (2019_04_02 09_30_00 UTC)`.
///
/// The base is greedy so that only the last suffix is stripped from names
/// that carry more than one.
static RE_HISTORY_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<base>.*) \((?P<year>\d{4})_(?P<month>\d{2})_(?P<day>\d{2}) (?P<hour>\d{2})_(?P<minute>\d{2})_(?P<second>\d{2}) UTC\)$",
    )
    .expect("Failed to create regex pattern for the File History timestamp suffix")
});

/// A file name stem split into the base name and the backup timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitStem {
    pub base: String,
    pub timestamp: NaiveDateTime,
}

/// Split the File History timestamp suffix from a file name stem.
///
/// Returns `None` when the stem does not end with a structurally valid
/// suffix. Digit groups that do not form a real calendar timestamp
/// (month 13, hour 25) are also treated as no match,
/// so such files are never touched.
#[must_use]
pub fn split_history_suffix(stem: &str) -> Option<SplitStem> {
    let caps = RE_HISTORY_SUFFIX.captures(stem)?;
    let year: i32 = caps["year"].parse().ok()?;
    let month: u32 = caps["month"].parse().ok()?;
    let day: u32 = caps["day"].parse().ok()?;
    let hour: u32 = caps["hour"].parse().ok()?;
    let minute: u32 = caps["minute"].parse().ok()?;
    let second: u32 = caps["second"].parse().ok()?;

    let timestamp = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;

    Some(SplitStem {
        base: caps["base"].to_string(),
        timestamp,
    })
}

/// Reconstruct the original timestamped stem from a base name and timestamp.
///
/// Inverse of [`split_history_suffix`]:
/// ```rust
/// use fhclean::timestamp::{join_history_suffix, split_history_suffix};
///
/// let split = split_history_suffix("Notes (2016_06_22 13_39_28 UTC)").unwrap();
/// assert_eq!(split.base, "Notes");
/// assert_eq!(join_history_suffix(&split.base, &split.timestamp), "Notes (2016_06_22 13_39_28 UTC)");
/// ```
#[must_use]
pub fn join_history_suffix(base: &str, timestamp: &NaiveDateTime) -> String {
    format!("{base} ({} UTC)", timestamp.format("%Y_%m_%d %H_%M_%S"))
}
