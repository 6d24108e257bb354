use crate::{CoreError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Inclusive window in unix seconds.
///
/// Built from millisecond inputs so that integer block times compare exactly as
/// `block_time >= start_ms / 1000 && block_time <= end_ms / 1000` would with
/// fractional division. A sub-second input window can therefore be empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn from_millis(start_ms: i64, end_ms: i64) -> Result<Self> {
        if start_ms > end_ms {
            return Err(CoreError::InvalidTimestamp(format!(
                "window start {} is after end {}",
                start_ms, end_ms
            )));
        }

        Ok(Self {
            start: ceil_seconds(start_ms),
            end: end_ms.div_euclid(1000),
        })
    }

    pub fn from_seconds(start: i64, end: i64) -> Result<Self> {
        Self::from_millis(
            start.saturating_mul(1000),
            end.saturating_mul(1000),
        )
    }

    pub fn contains(&self, block_time: i64) -> bool {
        block_time >= self.start && block_time <= self.end
    }

    /// Strictly older than the window; newest-first history cannot match past this point
    pub fn is_before_start(&self, block_time: i64) -> bool {
        block_time < self.start
    }
}

fn ceil_seconds(ms: i64) -> i64 {
    let secs = ms.div_euclid(1000);
    if ms.rem_euclid(1000) == 0 {
        secs
    } else {
        secs + 1
    }
}

/// Parse a user-supplied instant into unix milliseconds.
///
/// Accepts integer milliseconds, RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` (UTC) and
/// `YYYY-MM-DD` (midnight UTC).
pub fn parse_time_input(input: &str) -> Result<i64> {
    let input = input.trim();

    if !input.is_empty()
        && input
            .strip_prefix('-')
            .unwrap_or(input)
            .chars()
            .all(|c| c.is_ascii_digit())
    {
        return input
            .parse::<i64>()
            .map_err(|e| CoreError::InvalidTimestamp(format!("{}: {}", input, e)));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc).timestamp_millis());
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            let ms = Utc.from_utc_datetime(&naive).timestamp_millis();
            debug!("Parsed local datetime {} as UTC => {}ms", input, ms);
            return Ok(ms);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let naive = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| CoreError::InvalidTimestamp(input.to_string()))?;
        return Ok(Utc.from_utc_datetime(&naive).timestamp_millis());
    }

    Err(CoreError::InvalidTimestamp(format!(
        "unrecognized time format: '{}'",
        input
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_rounds_inward() {
        let window = TimeWindow::from_millis(1_500, 9_800).unwrap();
        assert_eq!(window.start, 2);
        assert_eq!(window.end, 9);
        assert!(!window.contains(1));
        assert!(window.contains(2));
        assert!(window.contains(9));
        assert!(!window.contains(10));
    }

    #[test]
    fn test_window_bounds_inclusive() {
        let window = TimeWindow::from_seconds(100, 200).unwrap();
        assert!(window.contains(100));
        assert!(window.contains(200));
        assert!(!window.contains(99));
        assert!(window.is_before_start(99));
        assert!(!window.is_before_start(100));
    }

    #[test]
    fn test_sub_second_window_is_empty() {
        let window = TimeWindow::from_millis(1_200, 1_800).unwrap();
        assert!(!window.contains(1));
        assert!(!window.contains(2));
    }

    #[test]
    fn test_epoch_window_matches_missing_block_time() {
        let window = TimeWindow::from_millis(0, 10_000).unwrap();
        assert!(window.contains(0));
    }

    #[test]
    fn test_inverted_window() {
        assert!(TimeWindow::from_millis(2_000, 1_000).is_err());
    }

    #[test]
    fn test_parse_time_input_formats() {
        assert_eq!(parse_time_input("1700000000000").unwrap(), 1_700_000_000_000);
        assert_eq!(
            parse_time_input("2023-11-14T22:13:20Z").unwrap(),
            1_700_000_000_000
        );
        assert_eq!(
            parse_time_input("2023-11-14T22:13").unwrap(),
            1_699_999_980_000
        );
        assert_eq!(parse_time_input("2024-01-01").unwrap(), 1_704_067_200_000);
        assert!(parse_time_input("yesterday").is_err());
        assert!(parse_time_input("").is_err());
    }
}
