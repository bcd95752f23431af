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

use crate::path::{KeyPath, ResolveMode};
use clap::ValueEnum;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Which MetService API a location is polled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ApiVariant {
    /// The JSON endpoints backing the metservice.com website.
    Public,
    /// The endpoints used by the MetService phone app. Requires an API key.
    Mobile,
}

impl fmt::Display for ApiVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Mobile => f.write_str("mobile"),
        }
    }
}

/// Logical values extracted from MetService documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Temperature,
    FeelsLike,
    Humidity,
    Pressure,
    PressureTrend,
    WindSpeed,
    WindGust,
    WindDirection,
    Condition,
    Description,
    UvIndex,
    ValidTimeLocal,
    FireSeason,
    FireDanger,
    DryingMorning,
    DryingAfternoon,
    PollenLevels,
    PollenType,
    Warnings,
    Tides,
    HourlyReadings,
    HourlySkip,
    HourlyCount,
    DayDate,
    DayHigh,
    DayLow,
    DayCondition,
    DayDescription,
}

/// Key the coordinator stores joined warning text under in the current document.
pub const WARNINGS_KEY: &str = "weather_warnings";
/// Key the coordinator stores tide events under in the current document.
pub const TIDES_KEY: &str = "tideImport";

const PUBLIC_FIELDS: &[(Field, &str)] = &[
    (Field::Temperature, "observations.temperature.0.current"),
    (Field::FeelsLike, "observations.temperature.0.feelsLike"),
    (Field::Humidity, "observations.rain.0.relativeHumidity"),
    (Field::Pressure, "observations.pressure.0.atSeaLevel"),
    (Field::PressureTrend, "observations.pressure.0.trend"),
    (Field::WindSpeed, "observations.wind.0.averageSpeed"),
    (Field::WindGust, "observations.wind.0.gustSpeed"),
    (Field::WindDirection, "observations.wind.0.direction"),
    (Field::Condition, "days.0.forecastWord"),
    (Field::Description, "days.0.forecast"),
    (Field::UvIndex, "days.0.uv.value"),
    (Field::ValidTimeLocal, "days.0.issuedAt"),
    (Field::FireSeason, "fireWeather.season"),
    (Field::FireDanger, "fireWeather.danger"),
    (Field::DryingMorning, "dryingIndex.morning"),
    (Field::DryingAfternoon, "dryingIndex.afternoon"),
    (Field::PollenLevels, "pollen.level"),
    (Field::PollenType, "pollen.type"),
    (Field::Warnings, WARNINGS_KEY),
    (Field::Tides, TIDES_KEY),
    (Field::HourlyReadings, "graph.columns"),
    (Field::HourlySkip, "graph.observationCount"),
    (Field::HourlyCount, "graph.forecastCount"),
    (Field::HourlySkip, "graph.startIndex"),
    (Field::HourlyCount, "graph.columnCount"),
    (Field::DayDate, "date"),
    (Field::DayHigh, "highTemp"),
    (Field::DayLow, "lowTemp"),
    (Field::DayCondition, "forecastWord"),
    (Field::DayDescription, "forecast"),
];

const MOBILE_FIELDS: &[(Field, &str)] = &[
    (Field::Temperature, "result.observationData.temperature"),
    (Field::FeelsLike, "result.observationData.feelsLike"),
    (Field::Humidity, "result.observationData.relativeHumidity"),
    (Field::Pressure, "result.observationData.pressure"),
    (Field::PressureTrend, "result.observationData.pressureTrend"),
    (Field::WindSpeed, "result.observationData.windSpeed"),
    (Field::WindGust, "result.observationData.windGust"),
    (Field::WindDirection, "result.observationData.windDirection"),
    (Field::Condition, "result.forecastData.days.0.condition"),
    (Field::Description, "result.forecastData.days.0.forecast"),
    (Field::UvIndex, "result.uv.alert"),
    (Field::ValidTimeLocal, "result.forecastData.days.0.issuedAt"),
    (Field::FireSeason, "result.fireWeather.season"),
    (Field::FireDanger, "result.fireWeather.danger"),
    (Field::DryingMorning, "result.dryingIndex.morning"),
    (Field::DryingAfternoon, "result.dryingIndex.afternoon"),
    (Field::Warnings, WARNINGS_KEY),
    (Field::Tides, TIDES_KEY),
    (Field::HourlyReadings, "result.forecastData.hourly.columns"),
    (Field::HourlySkip, "result.forecastData.hourly.skip"),
    (Field::HourlyCount, "result.forecastData.hourly.count"),
    (Field::HourlySkip, "result.observationData.hourly.skip"),
    (Field::HourlyCount, "result.observationData.hourly.count"),
    (Field::DayDate, "date"),
    (Field::DayHigh, "max"),
    (Field::DayLow, "min"),
    (Field::DayCondition, "condition"),
    (Field::DayDescription, "forecast"),
];

/// Which fetched document a structural location refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Current,
    Daily,
}

/// Static field to path table for one API variant.
///
/// A field may have more than one path. They form a fallback chain tried in
/// order. Both shipped tables are meant for [`ResolveMode::Permissive`] since
/// the exact nesting of these fields varies between responses. Structural
/// locations like the list of forecast days are stable and are resolved
/// with [`ResolveMode::Strict`].
#[derive(Debug, Clone)]
pub struct FieldTable {
    mode: ResolveMode,
    paths: HashMap<Field, Vec<KeyPath>>,
    days: (Source, KeyPath),
}

impl FieldTable {
    pub fn new(mode: ResolveMode, entries: &[(Field, &str)], days: (Source, &str)) -> Self {
        let mut paths: HashMap<Field, Vec<KeyPath>> = HashMap::new();
        for (field, path) in entries {
            paths.entry(*field).or_default().push(KeyPath::parse(path));
        }

        FieldTable {
            mode,
            paths,
            days: (days.0, KeyPath::parse(days.1)),
        }
    }

    pub fn for_variant(api: ApiVariant) -> Self {
        match api {
            ApiVariant::Public => Self::new(
                ResolveMode::Permissive,
                PUBLIC_FIELDS,
                (Source::Daily, "layout.primary.slots.main.modules.0.days"),
            ),
            ApiVariant::Mobile => Self::new(
                ResolveMode::Permissive,
                MOBILE_FIELDS,
                (Source::Current, "result.forecastData.days"),
            ),
        }
    }

    pub fn mode(&self) -> ResolveMode {
        self.mode
    }

    /// All paths for a field in fallback order. Empty when the variant doesn't
    /// provide the field.
    pub fn paths(&self, field: Field) -> &[KeyPath] {
        self.paths.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolve the first path for `field` that yields a value.
    pub fn resolve<'a>(&self, field: Field, doc: &'a Value) -> Option<&'a Value> {
        self.paths(field).iter().find_map(|p| self.mode.resolve(doc, p))
    }

    /// Location of the list of daily forecasts.
    pub fn days(&self) -> (Source, &KeyPath) {
        (self.days.0, &self.days.1)
    }
}
