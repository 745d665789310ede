//! Clip timestamps.
//!
//! Three dialects are accepted wherever a script names a point in a media
//! file:
//!
//! - FFmpeg: `hh:mm:ss` or `hh:mm:ss.SSS` (hours have at least two digits)
//! - YouTube: `mm:ss` or `hh:mm:ss`
//! - SSML: `5s` or `5000ms`
//!
//! All of them normalize to one canonical form, `HH:MM:SS.mmm`, which is what
//! trim variants are keyed by.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static FFMPEG_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{2,}):([0-9]{2}):([0-9]{2})(?:\.([0-9]{3}))?$").unwrap());
static YOUTUBE_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:([0-9]{2,}):)?([0-9]{2}):([0-9]{2})$").unwrap());
static SSML_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)(ms|s)$").unwrap());

/// Which notation a timestamp string was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Ffmpeg,
    Youtube,
    Ssml,
}

/// A parsed timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub milliseconds: u64,
    pub milliseconds_total: u64,
}

impl Timestamp {
    /// Build a timestamp from a total number of milliseconds.
    pub fn from_millis(total: u64) -> Self {
        Self {
            hours: total / 3_600_000,
            minutes: total / 60_000 % 60,
            seconds: total / 1000 % 60,
            milliseconds: total % 1000,
            milliseconds_total: total,
        }
    }

    /// The canonical `HH:MM:SS.mmm` rendering.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = Timestamp::from_millis(self.milliseconds_total);
        write!(
            f,
            "{:02}:{:02}:{:02}.{:03}",
            t.hours, t.minutes, t.seconds, t.milliseconds
        )
    }
}

/// Detect the dialect of a timestamp string.
///
/// `hh:mm:ss` is valid in both FFmpeg and YouTube notation; it is reported
/// as FFmpeg since both parse to the same value.
pub fn dialect(s: &str) -> Option<Dialect> {
    if FFMPEG_TIMESTAMP.is_match(s) {
        Some(Dialect::Ffmpeg)
    } else if YOUTUBE_TIMESTAMP.is_match(s) {
        Some(Dialect::Youtube)
    } else if SSML_TIMESTAMP.is_match(s) {
        Some(Dialect::Ssml)
    } else {
        None
    }
}

/// Check if a string is a timestamp in any supported dialect.
///
/// # Examples
///
/// ```
/// use lsml::timestamp::is_valid;
///
/// assert!(is_valid("00:01:30.250"));
/// assert!(is_valid("01:30"));
/// assert!(is_valid("90s"));
/// assert!(is_valid("1500ms"));
/// assert!(!is_valid("1:30"));
/// assert!(!is_valid("1.5s"));
/// ```
pub fn is_valid(s: &str) -> bool {
    dialect(s).is_some()
}

/// Parse a timestamp in any supported dialect.
///
/// Returns `None` for strings that are not timestamps or whose values do not
/// fit into 64 bits of milliseconds.
pub fn parse(s: &str) -> Option<Timestamp> {
    let total = match dialect(s)? {
        Dialect::Ffmpeg => {
            let caps = FFMPEG_TIMESTAMP.captures(s)?;
            let ms = caps.get(4).map_or(Some(0), |m| m.as_str().parse().ok())?;
            hms_to_millis(&caps[1], &caps[2], &caps[3], ms)?
        }
        Dialect::Youtube => {
            let caps = YOUTUBE_TIMESTAMP.captures(s)?;
            let hours = caps.get(1).map_or("0", |m| m.as_str());
            hms_to_millis(hours, &caps[2], &caps[3], 0)?
        }
        Dialect::Ssml => {
            let caps = SSML_TIMESTAMP.captures(s)?;
            let value: u64 = caps[1].parse().ok()?;
            match &caps[2] {
                "ms" => value,
                _ => value.checked_mul(1000)?,
            }
        }
    };
    Some(Timestamp::from_millis(total))
}

fn hms_to_millis(hours: &str, minutes: &str, seconds: &str, millis: u64) -> Option<u64> {
    let hours: u64 = hours.parse().ok()?;
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;
    hours
        .checked_mul(60)?
        .checked_add(minutes)?
        .checked_mul(60)?
        .checked_add(seconds)?
        .checked_mul(1000)?
        .checked_add(millis)
}

/// Convert a timestamp in any dialect to the canonical `HH:MM:SS.mmm` form.
///
/// # Examples
///
/// ```
/// use lsml::timestamp::to_canonical_form;
///
/// assert_eq!(to_canonical_form("2s").as_deref(), Some("00:00:02.000"));
/// assert_eq!(to_canonical_form("01:05").as_deref(), Some("00:01:05.000"));
/// assert_eq!(to_canonical_form("00:00:04").as_deref(), Some("00:00:04.000"));
/// assert_eq!(to_canonical_form("soon"), None);
/// ```
pub fn to_canonical_form(s: &str) -> Option<String> {
    parse(s).map(|t| t.canonical())
}
