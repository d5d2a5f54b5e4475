//! Conversion between typed duration text and [`Duration`] values.
//!
//! The watch accepts targets typed as positional text (`"1:30:00"`, `"90"`,
//! `"::5"`) and renders its running value the same way. Both directions are
//! total: [`decode`] degrades to `None` instead of failing and [`encode`]
//! formats every duration.
//!
//! # Examples
//!
//! ```rust
//! use bubbletea_watch::duration::{decode, encode};
//! use std::time::Duration;
//!
//! assert_eq!(decode("1:30"), Some(Duration::from_secs(90)));
//! assert_eq!(encode(Some(Duration::from_secs(3661))), "1:01:01");
//! assert_eq!(encode(None), "");
//! ```

use std::time::Duration;

/// Separator between hour, minute and second fields.
pub const SEPARATOR: char = ':';

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * 60;

/// Formats a duration as positional clock text.
///
/// The value is rounded to the nearest whole second. Durations under an hour
/// render as `M:SS`, longer ones as `H:MM:SS`; the leading field is never
/// padded. `None` renders as the empty string.
///
/// ```rust
/// use bubbletea_watch::duration::encode;
/// use std::time::Duration;
///
/// assert_eq!(encode(Some(Duration::ZERO)), "0:00");
/// assert_eq!(encode(Some(Duration::from_secs(600))), "10:00");
/// assert_eq!(encode(Some(Duration::from_millis(59_600))), "1:00");
/// ```
pub fn encode(duration: Option<Duration>) -> String {
    let Some(duration) = duration else {
        return String::new();
    };

    let total = round_to_secs(duration);
    let hours = total / SECS_PER_HOUR;
    let minutes = (total % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let secs = total % SECS_PER_MINUTE;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Parses positional duration text.
///
/// Returns `None` for empty text or text containing anything other than
/// ASCII digits and [`SEPARATOR`]. Otherwise fields are read right to left as
/// seconds, minutes and hours. Empty fields count as zero. Fields left of the
/// hours position are ignored; whether that lenience was ever intended is
/// unknown, it is kept so existing input keeps its meaning.
///
/// Field values too large for `u64` saturate, as does the total.
///
/// ```rust
/// use bubbletea_watch::duration::decode;
/// use std::time::Duration;
///
/// assert_eq!(decode("12:34:56"), Some(Duration::from_secs(45_296)));
/// assert_eq!(decode("::5"), Some(Duration::from_secs(5)));
/// assert_eq!(decode("1:x"), None);
/// ```
pub fn decode(text: &str) -> Option<Duration> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit() || c == SEPARATOR) {
        return None;
    }

    let mut seconds = 0;
    let mut minutes = 0;
    let mut hours = 0;
    for (position, field) in text.rsplit(SEPARATOR).enumerate() {
        match position {
            0 => seconds = field_value(field),
            1 => minutes = field_value(field),
            2 => hours = field_value(field),
            _ => break,
        }
    }

    let total = hours
        .saturating_mul(SECS_PER_HOUR)
        .saturating_add(minutes.saturating_mul(SECS_PER_MINUTE))
        .saturating_add(seconds);
    Some(Duration::from_secs(total))
}

// Fields are already known to be digits only, so a parse failure is overflow.
fn field_value(field: &str) -> u64 {
    if field.is_empty() {
        return 0;
    }
    field.parse().unwrap_or(u64::MAX)
}

fn round_to_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() >= 500_000_000 {
        secs.saturating_add(1)
    } else {
        secs
    }
}
