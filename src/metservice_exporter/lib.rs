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

//! Prometheus metrics exporter for MetService NZ
//!
//! ## Features
//!
//! `metservice_exporter` fetches current conditions and forecasts for a New Zealand location from
//! [MetService] and emits them as Prometheus metrics. Either the public website JSON or the mobile
//! app API can be used. MetService documents frequently contain `{"dataUrl": "..."}` objects that
//! point at other documents: these are fetched one at a time and spliced into place before any
//! values are read. The following metrics are emitted when available.
//!
//! * `metservice_temperature_degrees{location=$LOCATION}` - Temperature, in degrees celsius.
//! * `metservice_feels_like_degrees{location=$LOCATION}` - Apparent temperature, in degrees celsius.
//! * `metservice_relative_humidity{location=$LOCATION}` - Relative humidity (0-100).
//! * `metservice_pressure_hpa{location=$LOCATION}` - Sea level pressure, in hectopascals.
//! * `metservice_wind_speed_kph{location=$LOCATION}` - Average wind speed, in km/h.
//! * `metservice_wind_gust_kph{location=$LOCATION}` - Wind gust speed, in km/h.
//! * `metservice_condition{location=$LOCATION, condition=$CONDITION}` - Current condition, always 1.
//! * `metservice_pressure_trend{location=$LOCATION, state=$TREND}` - Pressure trend, always 1.
//! * `metservice_wind_direction{location=$LOCATION, state=$DIRECTION}` - Wind direction, always 1.
//! * `metservice_uv_index{location=$LOCATION, state=$UV}` - UV index, always 1.
//! * `metservice_fire_season{location=$LOCATION, state=$SEASON}` - Fire season, always 1.
//! * `metservice_fire_danger{location=$LOCATION, state=$DANGER}` - Fire danger, always 1.
//! * `metservice_drying_morning{location=$LOCATION, state=$HOURS}` - Morning drying index, always 1.
//! * `metservice_drying_afternoon{location=$LOCATION, state=$HOURS}` - Afternoon drying index, always 1.
//! * `metservice_pollen_level{location=$LOCATION, state=$LEVEL}` - Pollen level, always 1.
//! * `metservice_warnings_active{location=$LOCATION}` - 1 when weather warnings are active, 0 otherwise.
//! * `metservice_next_high_tide_timestamp_seconds{location=$LOCATION}` - Next high tide (tides enabled only).
//! * `metservice_next_low_tide_timestamp_seconds{location=$LOCATION}` - Next low tide (tides enabled only).
//! * `metservice_hourly_forecast_temperature_degrees{location=$LOCATION, hour=$HOUR}` - Forecast temperature.
//! * `metservice_hourly_forecast_rainfall_mm{location=$LOCATION, hour=$HOUR}` - Forecast rainfall.
//! * `metservice_forecast_days{location=$LOCATION}` - Number of days in the daily forecast.
//! * `metservice_last_update_timestamp_seconds{location=$LOCATION}` - Time of the last successful update.
//!
//! [MetService]: https://www.metservice.com/
//!
//! ## Usage
//!
//! ### Public website data
//!
//! Locations are named the way they appear in MetService URLs, e.g. `tauranga` for
//! `https://www.metservice.com/towns-cities/locations/tauranga`.
//!
//! ```text
//! ./metservice_exporter --location tauranga
//! ```
//!
//! ### Mobile API
//!
//! The mobile API is queried by coordinates and requires an API key.
//!
//! ```text
//! ./metservice_exporter --api mobile --location tauranga --latitude -37.68 --longitude 176.17 --api-key $KEY
//! ```
//!
//! ### Tides
//!
//! Tide times are fetched only when a tide page URL is given.
//!
//! ```text
//! ./metservice_exporter --location tauranga \
//!   --tide-url https://www.metservice.com/publicData/webdata/marine/regions/bay-of-plenty/tides/locations/tauranga
//! ```
//!
//! ### Prometheus
//!
//! Prometheus metrics are exposed on port `9783` at `/metrics`. Add the host running
//! `metservice_exporter` as a target under the Prometheus `scrape_configs` section.
//!
//! ```yaml
//! scrape_configs:
//! - job_name: metservice_exporter
//!   static_configs:
//!   - targets: ['example:9783']
//! ```
//!

pub mod client;
pub mod condition;
pub mod coordinator;
pub mod expand;
pub mod fields;
pub mod forecast;
pub mod http;
pub mod metrics;
pub mod path;
pub mod readings;
pub mod tides;
