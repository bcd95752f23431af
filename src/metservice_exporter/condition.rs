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

use std::collections::HashMap;

pub const SUNNY: &str = "sunny";
pub const CLEAR_NIGHT: &str = "clear-night";
pub const PARTLY_CLOUDY: &str = "partlycloudy";
pub const CLOUDY: &str = "cloudy";
pub const RAINY: &str = "rainy";
pub const POURING: &str = "pouring";
pub const WINDY: &str = "windy";
pub const LIGHTNING_RAINY: &str = "lightning-rainy";
pub const HAIL: &str = "hail";
pub const SNOWY: &str = "snowy";
pub const FOG: &str = "fog";

const METSERVICE_CONDITIONS: &[(&str, &str)] = &[
    ("fine", SUNNY),
    ("mostly-fine", PARTLY_CLOUDY),
    ("partly-cloudy", PARTLY_CLOUDY),
    ("cloudy", CLOUDY),
    ("few-showers", RAINY),
    ("showers", RAINY),
    ("drizzle", RAINY),
    ("rain", RAINY),
    ("wind-rain", RAINY),
    ("heavy-rain", POURING),
    ("windy", WINDY),
    ("thunder", LIGHTNING_RAINY),
    ("hail", HAIL),
    ("snow", SNOWY),
    ("fog", FOG),
    ("night", CLEAR_NIGHT),
];

/// Lookup from provider condition tokens to canonical condition names.
///
/// Tokens without an entry are passed through as-is.
#[derive(Debug, Clone, Default)]
pub struct ConditionMap {
    entries: HashMap<String, String>,
}

impl ConditionMap {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        ConditionMap {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Conditions used by both the public and mobile MetService APIs.
    pub fn metservice() -> Self {
        Self::new(METSERVICE_CONDITIONS.iter().copied())
    }

    pub fn classify<'a>(&'a self, token: &'a str) -> &'a str {
        self.entries.get(token).map(String::as_str).unwrap_or(token)
    }
}

/// Pick a condition for an hourly forecast that only has rainfall and wind.
///
/// Rainfall is in millimeters, wind speed in km/h, and `hour` is the local hour
/// of day (0-23).
pub fn forecast_icon(rainfall: f64, wind_speed: f64, hour: u32) -> &'static str {
    if rainfall > 6.0 {
        POURING
    } else if rainfall > 0.0 {
        RAINY
    } else if wind_speed > 40.0 {
        WINDY
    } else if hour > 7 && hour < 19 {
        PARTLY_CLOUDY
    } else {
        CLEAR_NIGHT
    }
}
