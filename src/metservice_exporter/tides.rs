// metservice_exporter - Prometheus metrics exporter for MetService NZ
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;

/// Time zone MetService reports local times in.
pub const LOCAL_TIMEZONE: Tz = chrono_tz::Pacific::Auckland;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TideKind {
    High,
    Low,
}

impl TideKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Low => "LOW",
        }
    }
}

/// Current time in [`LOCAL_TIMEZONE`].
pub fn local_now() -> DateTime<Tz> {
    Utc::now().with_timezone(&LOCAL_TIMEZONE)
}

/// Find the next tide of the given kind after `now`.
///
/// `events` is expected to be an array of `{"type": "HIGH"|"LOW", "time": "..."}`
/// objects in chronological order. The first matching event after `now` in array
/// order is returned; events are not sorted. Events with a missing type or a time
/// that can't be parsed are ignored.
pub fn next_tide(events: &Value, kind: TideKind, now: DateTime<Tz>) -> Option<DateTime<FixedOffset>> {
    let now = now.with_timezone(&Utc);

    events
        .as_array()?
        .iter()
        .filter(|e| e.get("type").and_then(Value::as_str) == Some(kind.as_str()))
        .filter_map(|e| e.get("time").and_then(Value::as_str))
        .filter_map(|t| parse_local_time(t, &LOCAL_TIMEZONE))
        .find(|t| t.with_timezone(&Utc) > now)
}

/// Parse an ISO-8601 timestamp, treating times without an offset as local to `tz`.
pub fn parse_local_time(s: &str, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }

    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .ok()?;
    let local = tz.from_local_datetime(&naive).earliest()?;
    Some(local.with_timezone(&local.offset().fix()))
}

#[cfg(test)]
mod tests {
    use super::{next_tide, parse_local_time, TideKind, LOCAL_TIMEZONE};
    use chrono::{DateTime, TimeZone, Timelike};
    use chrono_tz::Tz;
    use serde_json::json;

    fn now() -> DateTime<Tz> {
        LOCAL_TIMEZONE.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_next_high_tide_first_future_match() {
        let events = json!([
            {"type": "LOW", "time": "2024-01-10T09:00:00+13:00"},
            {"type": "HIGH", "time": "2024-01-10T15:10:00+13:00"},
            {"type": "HIGH", "time": "2024-01-11T03:30:00+13:00"},
        ]);

        let tide = next_tide(&events, TideKind::High, now()).unwrap();
        assert_eq!("2024-01-10T15:10:00+13:00", tide.to_rfc3339());
    }

    #[test]
    fn test_next_tide_uses_array_order() {
        let events = json!([
            {"type": "LOW", "time": "2024-01-11T04:00:00+13:00"},
            {"type": "LOW", "time": "2024-01-10T21:00:00+13:00"},
        ]);

        let tide = next_tide(&events, TideKind::Low, now()).unwrap();
        assert_eq!("2024-01-11T04:00:00+13:00", tide.to_rfc3339());
    }

    #[test]
    fn test_next_tide_skips_past_and_unparseable() {
        let events = json!([
            {"type": "HIGH", "time": "2024-01-10T02:00:00+13:00"},
            {"type": "HIGH", "time": "soon"},
            {"time": "2024-01-10T18:00:00+13:00"},
            {"type": "HIGH", "time": "2024-01-10T14:20:00"},
        ]);

        let tide = next_tide(&events, TideKind::High, now()).unwrap();
        assert_eq!(14, tide.hour());
        assert_eq!("2024-01-10T14:20:00+13:00", tide.to_rfc3339());
    }

    #[test]
    fn test_next_tide_none() {
        let past = json!([{"type": "HIGH", "time": "2024-01-09T12:00:00+13:00"}]);

        assert_eq!(None, next_tide(&past, TideKind::High, now()));
        assert_eq!(None, next_tide(&past, TideKind::Low, now()));
        assert_eq!(None, next_tide(&json!([]), TideKind::Low, now()));
        assert_eq!(None, next_tide(&json!({"tides": []}), TideKind::Low, now()));
    }

    #[test]
    fn test_strictly_after_now() {
        let events = json!([{"type": "LOW", "time": "2024-01-10T12:00:00+13:00"}]);
        assert_eq!(None, next_tide(&events, TideKind::Low, now()));
    }

    #[test]
    fn test_parse_local_time_winter_offset() {
        let parsed = parse_local_time("2024-07-01T06:00:00", &LOCAL_TIMEZONE).unwrap();
        assert_eq!("2024-07-01T06:00:00+12:00", parsed.to_rfc3339());
    }
}
