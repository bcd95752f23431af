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

use crate::condition::{forecast_icon, ConditionMap};
use crate::fields::{Field, FieldTable};
use crate::path::ResolveMode;
use crate::readings::as_number;
use crate::tides::{parse_local_time, LOCAL_TIMEZONE};
use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use serde_json::Value;

/// Slice `hourly[skip..skip + count]`, clamped to the array.
///
/// A missing bound means no forecast is available.
pub fn forecast_window(hourly: &[Value], skip: Option<usize>, count: Option<usize>) -> Option<&[Value]> {
    let skip = skip?;
    let count = count?;
    let start = skip.min(hourly.len());
    let end = skip.saturating_add(count).min(hourly.len());
    Some(&hourly[start..end])
}

/// Resolve the `(skip, count)` pair for the hourly window.
///
/// Each skip path is paired with the count path at the same position in the
/// field table. The first pair where both values are present wins.
pub fn window_bounds(table: &FieldTable, doc: &Value) -> Option<(usize, usize)> {
    let skips = table.paths(Field::HourlySkip);
    let counts = table.paths(Field::HourlyCount);

    skips.iter().zip(counts).find_map(|(skip, count)| {
        let skip = table.mode().resolve(doc, skip).and_then(as_index)?;
        let count = table.mode().resolve(doc, count).and_then(as_index)?;
        Some((skip, count))
    })
}

fn as_index(v: &Value) -> Option<usize> {
    let n = as_number(v)?;
    if n >= 0.0 && n.fract() == 0.0 {
        Some(n as usize)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyForecast {
    /// One-based position of the column in the forecast window.
    pub offset: usize,
    pub time: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub rainfall: Option<f64>,
    pub wind_speed: Option<f64>,
    pub condition: &'static str,
}

impl HourlyForecast {
    /// Build a forecast from the column at `offset` in the forecast window. Columns
    /// without a usable `date` are skipped.
    pub fn from_column(offset: usize, column: &Value) -> Option<Self> {
        let strict = |p: &str| ResolveMode::Strict.resolve(column, &p.into()).and_then(as_number);

        let date = ResolveMode::Strict.resolve(column, &"date".into())?.as_str()?;
        let local = parse_local_time(date, &LOCAL_TIMEZONE)?;
        let temperature = strict("temperature");
        let rainfall = strict("rainfall");
        let wind_speed = strict("wind.speed");
        let condition = forecast_icon(
            rainfall.unwrap_or(0.0),
            wind_speed.unwrap_or(0.0),
            local.with_timezone(&LOCAL_TIMEZONE).hour(),
        );

        Some(HourlyForecast {
            offset,
            time: local.with_timezone(&Utc),
            temperature,
            rainfall,
            wind_speed,
            condition,
        })
    }
}

/// Extract the forecast hours from the current conditions document.
pub fn hourly_forecast(table: &FieldTable, current: &Value) -> Vec<HourlyForecast> {
    let columns = match table.resolve(Field::HourlyReadings, current).and_then(Value::as_array) {
        Some(c) => c,
        None => return Vec::new(),
    };

    let (skip, count) = match window_bounds(table, current) {
        Some(bounds) => bounds,
        None => {
            tracing::debug!(message = "no hourly forecast window available");
            return Vec::new();
        }
    };

    forecast_window(columns, Some(skip), Some(count))
        .unwrap_or_default()
        .iter()
        .enumerate()
        .filter_map(|(i, column)| HourlyForecast::from_column(i + 1, column))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyForecast {
    pub date: Option<String>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub condition: Option<String>,
    pub description: Option<String>,
}

/// List of forecast days, resolved strictly from its known location.
pub fn forecast_days<'a>(table: &FieldTable, doc: &'a Value) -> &'a [Value] {
    let (_, path) = table.days();
    ResolveMode::Strict
        .resolve(doc, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Build daily forecasts, resolving each field within a single day.
pub fn daily_forecast(table: &FieldTable, conditions: &ConditionMap, doc: &Value) -> Vec<DailyForecast> {
    forecast_days(table, doc)
        .iter()
        .map(|day| {
            let text = |field| table.resolve(field, day).and_then(Value::as_str);
            DailyForecast {
                date: text(Field::DayDate).map(str::to_owned),
                high: table.resolve(Field::DayHigh, day).and_then(as_number),
                low: table.resolve(Field::DayLow, day).and_then(as_number),
                condition: text(Field::DayCondition).map(|c| conditions.classify(c).to_owned()),
                description: text(Field::DayDescription).map(str::to_owned),
            }
        })
        .collect()
}
