use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Time zone every human-readable timestamp is rendered in.
pub const REFERENCE_TIME_ZONE: Tz = chrono_tz::US::Pacific;

/// Renders `instant` as `M/D/YYYY, h:mm:ss AM PT` in the reference time zone.
pub fn format_reference_time(instant: DateTime<Utc>) -> String {
    let local = REFERENCE_TIME_ZONE.from_utc_datetime(&instant.naive_utc());
    format!("{} PT", local.format("%-m/%-d/%Y, %-I:%M:%S %p"))
}

/// Parses a Slack message timestamp (`"1712345678.000200"`) into a UTC instant.
pub fn parse_slack_ts(ts: &str) -> Option<DateTime<Utc>> {
    let seconds = ts.trim().split('.').next()?.parse::<i64>().ok()?;
    Utc.timestamp_opt(seconds, 0).single()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{format_reference_time, parse_slack_ts};

    #[test]
    fn unit_format_reference_time_uses_pacific_clock() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 10, 20, 5, 9).unwrap();
        assert_eq!(format_reference_time(instant), "1/10/2024, 12:05:09 PM PT");

        let summer = Utc.with_ymd_and_hms(2024, 7, 4, 7, 30, 0).unwrap();
        assert_eq!(format_reference_time(summer), "7/4/2024, 12:30:00 AM PT");
    }

    #[test]
    fn regression_parse_slack_ts_ignores_fraction_and_rejects_garbage() {
        let parsed = parse_slack_ts("1704917109.000200").expect("ts");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 10, 20, 5, 9).unwrap());
        assert!(parse_slack_ts("not-a-ts").is_none());
        assert!(parse_slack_ts("").is_none());
    }
}
