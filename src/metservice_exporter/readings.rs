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

use crate::condition::ConditionMap;
use crate::fields::{Field, FieldTable};
use crate::tides::{next_tide, parse_local_time, TideKind, LOCAL_TIMEZONE};
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::Value;

const MAX_STATE_CHARS: usize = 255;
const MAX_POLLEN_SENTENCES: usize = 20;
const NO_DESCRIPTION: &str = "No description";
const NO_WARNINGS: &str = "No warnings";

/// Current conditions for a location, extracted from the current conditions document.
///
/// Fields the provider didn't include are `None` rather than a placeholder value
/// so that consumers can leave previous values alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurrentConditions {
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub pressure_trend: Option<String>,
    pub wind_speed: Option<f64>,
    pub wind_gust: Option<f64>,
    pub wind_direction: Option<String>,
    pub condition: Option<String>,
    pub description: String,
    pub full_description: Option<String>,
    pub uv_index: Option<String>,
    pub valid_time: Option<DateTime<FixedOffset>>,
    pub fire_season: Option<String>,
    pub fire_danger: Option<String>,
    pub drying_morning: Option<String>,
    pub drying_afternoon: Option<String>,
    pub pollen_levels: Option<String>,
    pub pollen_type: Option<String>,
    pub warnings: String,
    pub next_high_tide: Option<DateTime<FixedOffset>>,
    pub next_low_tide: Option<DateTime<FixedOffset>>,
}

impl CurrentConditions {
    /// True when the provider reported at least one active weather warning.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty() && self.warnings != NO_WARNINGS
    }

    pub fn from_document(table: &FieldTable, conditions: &ConditionMap, current: &Value, now: DateTime<Tz>) -> Self {
        let number = |field| table.resolve(field, current).and_then(as_number);
        let text = |field| table.resolve(field, current).and_then(as_text);
        let description = text(Field::Description).filter(|d| !d.is_empty());
        let tides = table.resolve(Field::Tides, current);

        CurrentConditions {
            temperature: number(Field::Temperature),
            feels_like: number(Field::FeelsLike),
            humidity: number(Field::Humidity),
            pressure: number(Field::Pressure),
            pressure_trend: text(Field::PressureTrend),
            wind_speed: number(Field::WindSpeed),
            wind_gust: number(Field::WindGust),
            wind_direction: text(Field::WindDirection),
            condition: text(Field::Condition).map(|c| conditions.classify(&c).to_owned()),
            description: description
                .as_deref()
                .map(truncate_state)
                .unwrap_or_else(|| NO_DESCRIPTION.to_owned()),
            full_description: description,
            uv_index: text(Field::UvIndex),
            valid_time: text(Field::ValidTimeLocal).and_then(|t| parse_local_time(&t, &LOCAL_TIMEZONE)),
            fire_season: text(Field::FireSeason),
            fire_danger: text(Field::FireDanger),
            drying_morning: text(Field::DryingMorning).map(|d| d.replace("Morning: ", "")),
            drying_afternoon: text(Field::DryingAfternoon).map(|d| d.replace("Afternoon: ", "")),
            pollen_levels: text(Field::PollenLevels),
            pollen_type: text(Field::PollenType).map(|p| capitalize_sentences(&p)),
            warnings: text(Field::Warnings)
                .filter(|w| !w.is_empty())
                .map(|w| truncate_state(&w))
                .unwrap_or_else(|| NO_WARNINGS.to_owned()),
            next_high_tide: tides.and_then(|t| next_tide(t, TideKind::High, now)),
            next_low_tide: tides.and_then(|t| next_tide(t, TideKind::Low, now)),
        }
    }
}

/// Numeric value of a JSON number or a string containing one.
pub fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text of a JSON string or the rendering of a number.
pub fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Limit a value to 255 characters, ending in `...` when cut short.
pub fn truncate_state(s: &str) -> String {
    if s.chars().count() > MAX_STATE_CHARS {
        let mut out: String = s.chars().take(MAX_STATE_CHARS - 3).collect();
        out.push_str("...");
        out
    } else {
        s.to_owned()
    }
}

/// Capitalize each `". "` separated sentence (first letter upper, rest lower)
/// keeping at most 20 sentences and 255 characters.
pub fn capitalize_sentences(s: &str) -> String {
    let joined = s
        .trim_start_matches(' ')
        .split(". ")
        .take(MAX_POLLEN_SENTENCES)
        .map(|sentence| {
            let mut chars = sentence.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(". ");

    let mut out: String = joined.chars().take(MAX_STATE_CHARS).collect();
    if s.chars().count() > MAX_STATE_CHARS {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{as_number, capitalize_sentences, truncate_state, CurrentConditions};
    use crate::condition::ConditionMap;
    use crate::fields::{ApiVariant, FieldTable};
    use crate::tides::LOCAL_TIMEZONE;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_as_number() {
        assert_eq!(Some(3.5), as_number(&json!(3.5)));
        assert_eq!(Some(12.0), as_number(&json!(" 12 ")));
        assert_eq!(None, as_number(&json!("N/A")));
        assert_eq!(None, as_number(&json!(null)));
    }

    #[test]
    fn test_truncate_state() {
        assert_eq!("short", truncate_state("short"));

        let long = "a".repeat(300);
        let truncated = truncate_state(&long);
        assert_eq!(255, truncated.chars().count());
        assert!(truncated.ends_with("aaa..."));

        let exact = "ā".repeat(255);
        assert_eq!(exact, truncate_state(&exact));
    }

    #[test]
    fn test_capitalize_sentences() {
        assert_eq!(
            "Grass pollen high. Tree pollen low",
            capitalize_sentences("  grass POLLEN high. tree pollen low")
        );
        assert_eq!("", capitalize_sentences(""));
    }

    #[test]
    fn test_from_public_document() {
        let table = FieldTable::for_variant(ApiVariant::Public);
        let now = LOCAL_TIMEZONE.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let doc = json!({
            "location": {"key": "tauranga", "type": "town"},
            "observations": {
                "temperature": [{"current": 19.2, "feelsLike": "18"}],
                "pressure": [{"atSeaLevel": 1012, "trend": "rising"}],
                "rain": [{"relativeHumidity": 81}],
                "wind": [{"averageSpeed": 15, "gustSpeed": 28, "direction": "NE"}],
            },
            "days": [{"forecastWord": "fine", "forecast": "", "issuedAt": "2024-01-10T11:00:00+13:00"}],
            "dryingIndex": {"morning": "Morning: 3 hours", "afternoon": "Afternoon: 2 hours"},
            "weather_warnings": "",
            "tideImport": [
                {"type": "HIGH", "time": "2024-01-10T16:00:00+13:00"},
                {"type": "LOW", "time": "2024-01-10T22:10:00+13:00"},
            ],
        });

        let conditions = CurrentConditions::from_document(&table, &ConditionMap::metservice(), &doc, now);

        assert_eq!(Some(19.2), conditions.temperature);
        assert_eq!(Some(18.0), conditions.feels_like);
        assert_eq!(Some(81.0), conditions.humidity);
        assert_eq!(Some(1012.0), conditions.pressure);
        assert_eq!(Some("rising".to_owned()), conditions.pressure_trend);
        assert_eq!(Some(28.0), conditions.wind_gust);
        assert_eq!(Some("sunny".to_owned()), conditions.condition);
        assert_eq!("No description", conditions.description);
        assert_eq!(None, conditions.full_description);
        assert_eq!(Some("3 hours".to_owned()), conditions.drying_morning);
        assert_eq!(Some("2 hours".to_owned()), conditions.drying_afternoon);
        assert_eq!("No warnings", conditions.warnings);
        assert!(!conditions.has_warnings());
        assert_eq!(None, conditions.pollen_type);
        assert_eq!(
            "2024-01-10T16:00:00+13:00",
            conditions.next_high_tide.unwrap().to_rfc3339()
        );
        assert_eq!(
            "2024-01-10T22:10:00+13:00",
            conditions.next_low_tide.unwrap().to_rfc3339()
        );
        assert_eq!(
            "2024-01-10T11:00:00+13:00",
            conditions.valid_time.unwrap().to_rfc3339()
        );
    }

    #[test]
    fn test_from_empty_document() {
        let table = FieldTable::for_variant(ApiVariant::Mobile);
        let now = LOCAL_TIMEZONE.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();

        let conditions = CurrentConditions::from_document(&table, &ConditionMap::metservice(), &json!({}), now);

        assert_eq!(None, conditions.temperature);
        assert_eq!(None, conditions.condition);
        assert_eq!(None, conditions.next_high_tide);
        assert_eq!("No description", conditions.description);
        assert_eq!("No warnings", conditions.warnings);
    }
}
