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

use crate::forecast::{DailyForecast, HourlyForecast};
use crate::readings::CurrentConditions;
use chrono::{DateTime, FixedOffset, Utc};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicU64;

type FloatGauge = Family<LocationLabels, Gauge<f64, AtomicU64>>;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct LocationLabels {
    location: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ConditionLabels {
    location: String,
    condition: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct HourLabels {
    location: String,
    hour: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct StateLabels {
    location: String,
    state: String,
}

type StateGauge = Family<StateLabels, Gauge<f64, AtomicU64>>;

/// Holder for metrics that can be set from current conditions and forecasts.
///
/// All metrics are created and registered upon call to `WeatherMetrics::new()`. Metrics
/// all share the prefix "metservice_" and have a "location" label set to the configured
/// location name (e.g. `{location="tauranga"}`). Text values like the fire danger are
/// exported as a "state" label on a gauge that is always 1.
#[derive(Debug)]
pub struct WeatherMetrics {
    temperature: FloatGauge,
    feels_like: FloatGauge,
    humidity: FloatGauge,
    pressure: FloatGauge,
    wind_speed: FloatGauge,
    wind_gust: FloatGauge,
    condition: Family<ConditionLabels, Gauge<f64, AtomicU64>>,
    pressure_trend: StateGauge,
    wind_direction: StateGauge,
    uv_index: StateGauge,
    fire_season: StateGauge,
    fire_danger: StateGauge,
    drying_morning: StateGauge,
    drying_afternoon: StateGauge,
    pollen_level: StateGauge,
    warnings: FloatGauge,
    next_high_tide: FloatGauge,
    next_low_tide: FloatGauge,
    hourly_temperature: Family<HourLabels, Gauge<f64, AtomicU64>>,
    hourly_rainfall: Family<HourLabels, Gauge<f64, AtomicU64>>,
    forecast_days: FloatGauge,
    last_update: FloatGauge,
}

impl WeatherMetrics {
    /// Create a new `WeatherMetrics` and register each metric with the provided `Registry`.
    pub fn new(reg: &mut Registry) -> Self {
        let metrics = Self {
            temperature: FloatGauge::default(),
            feels_like: FloatGauge::default(),
            humidity: FloatGauge::default(),
            pressure: FloatGauge::default(),
            wind_speed: FloatGauge::default(),
            wind_gust: FloatGauge::default(),
            condition: Family::default(),
            pressure_trend: StateGauge::default(),
            wind_direction: StateGauge::default(),
            uv_index: StateGauge::default(),
            fire_season: StateGauge::default(),
            fire_danger: StateGauge::default(),
            drying_morning: StateGauge::default(),
            drying_afternoon: StateGauge::default(),
            pollen_level: StateGauge::default(),
            warnings: FloatGauge::default(),
            next_high_tide: FloatGauge::default(),
            next_low_tide: FloatGauge::default(),
            hourly_temperature: Family::default(),
            hourly_rainfall: Family::default(),
            forecast_days: FloatGauge::default(),
            last_update: FloatGauge::default(),
        };

        reg.register("metservice_temperature_degrees", "Temperature in celsius", metrics.temperature.clone());
        reg.register(
            "metservice_feels_like_degrees",
            "Apparent temperature in celsius",
            metrics.feels_like.clone(),
        );
        reg.register("metservice_relative_humidity", "Relative humidity (0-100)", metrics.humidity.clone());
        reg.register("metservice_pressure_hpa", "Sea level pressure in hectopascals", metrics.pressure.clone());
        reg.register("metservice_wind_speed_kph", "Average wind speed in km/h", metrics.wind_speed.clone());
        reg.register("metservice_wind_gust_kph", "Wind gust speed in km/h", metrics.wind_gust.clone());
        reg.register(
            "metservice_condition",
            "Current weather condition, always 1",
            metrics.condition.clone(),
        );
        reg.register(
            "metservice_pressure_trend",
            "Pressure trend, always 1",
            metrics.pressure_trend.clone(),
        );
        reg.register(
            "metservice_wind_direction",
            "Wind direction, always 1",
            metrics.wind_direction.clone(),
        );
        reg.register("metservice_uv_index", "UV index, always 1", metrics.uv_index.clone());
        reg.register("metservice_fire_season", "Fire season, always 1", metrics.fire_season.clone());
        reg.register("metservice_fire_danger", "Fire danger, always 1", metrics.fire_danger.clone());
        reg.register(
            "metservice_drying_morning",
            "Drying index for the morning, always 1",
            metrics.drying_morning.clone(),
        );
        reg.register(
            "metservice_drying_afternoon",
            "Drying index for the afternoon, always 1",
            metrics.drying_afternoon.clone(),
        );
        reg.register("metservice_pollen_level", "Pollen level, always 1", metrics.pollen_level.clone());
        reg.register(
            "metservice_warnings_active",
            "1 if there are active weather warnings, 0 otherwise",
            metrics.warnings.clone(),
        );
        reg.register(
            "metservice_next_high_tide_timestamp_seconds",
            "Time of the next high tide",
            metrics.next_high_tide.clone(),
        );
        reg.register(
            "metservice_next_low_tide_timestamp_seconds",
            "Time of the next low tide",
            metrics.next_low_tide.clone(),
        );
        reg.register(
            "metservice_hourly_forecast_temperature_degrees",
            "Forecast temperature in celsius, by hours ahead",
            metrics.hourly_temperature.clone(),
        );
        reg.register(
            "metservice_hourly_forecast_rainfall_mm",
            "Forecast rainfall in millimeters, by hours ahead",
            metrics.hourly_rainfall.clone(),
        );
        reg.register(
            "metservice_forecast_days",
            "Number of days in the daily forecast",
            metrics.forecast_days.clone(),
        );
        reg.register(
            "metservice_last_update_timestamp_seconds",
            "Time of the last successful update",
            metrics.last_update.clone(),
        );

        metrics
    }

    /// Set metrics from the provided conditions if the relevant value exists.
    ///
    /// If the conditions don't contain a value for a particular metric, the metric will
    /// not be updated. Tide times are the exception: a missing next tide removes the
    /// metric since a tide in the past is never the next one.
    pub fn conditions(&self, location: &str, conditions: &CurrentConditions) {
        set_if_present(location, &self.temperature, conditions.temperature);
        set_if_present(location, &self.feels_like, conditions.feels_like);
        set_if_present(location, &self.humidity, conditions.humidity);
        set_if_present(location, &self.pressure, conditions.pressure);
        set_if_present(location, &self.wind_speed, conditions.wind_speed);
        set_if_present(location, &self.wind_gust, conditions.wind_gust);
        set_or_remove(location, &self.next_high_tide, conditions.next_high_tide.map(timestamp));
        set_or_remove(location, &self.next_low_tide, conditions.next_low_tide.map(timestamp));

        let warnings = if conditions.has_warnings() { 1.0 } else { 0.0 };
        set_if_present(location, &self.warnings, Some(warnings));

        set_state(location, &self.pressure_trend, conditions.pressure_trend.as_deref());
        set_state(location, &self.wind_direction, conditions.wind_direction.as_deref());
        set_state(location, &self.uv_index, conditions.uv_index.as_deref());
        set_state(location, &self.fire_season, conditions.fire_season.as_deref());
        set_state(location, &self.fire_danger, conditions.fire_danger.as_deref());
        set_state(location, &self.drying_morning, conditions.drying_morning.as_deref());
        set_state(location, &self.drying_afternoon, conditions.drying_afternoon.as_deref());
        set_state(location, &self.pollen_level, conditions.pollen_levels.as_deref());

        if let Some(condition) = &conditions.condition {
            self.condition.clear();
            self.condition
                .get_or_create(&ConditionLabels {
                    location: location.to_owned(),
                    condition: condition.clone(),
                })
                .set(1.0);
        }
    }

    /// Replace forecast metrics with values from the latest forecast.
    pub fn forecast(&self, location: &str, hourly: &[HourlyForecast], daily: &[DailyForecast]) {
        self.hourly_temperature.clear();
        self.hourly_rainfall.clear();

        for hour in hourly {
            let labels = HourLabels {
                location: location.to_owned(),
                hour: hour.offset.to_string(),
            };

            if let Some(t) = hour.temperature {
                self.hourly_temperature.get_or_create(&labels).set(t);
            }
            if let Some(r) = hour.rainfall {
                self.hourly_rainfall.get_or_create(&labels).set(r);
            }
        }

        set_if_present(location, &self.forecast_days, Some(daily.len() as f64));
    }

    pub fn updated(&self, location: &str, at: DateTime<Utc>) {
        set_if_present(location, &self.last_update, Some(at.timestamp() as f64));
    }
}

fn timestamp(dt: DateTime<FixedOffset>) -> f64 {
    dt.timestamp() as f64
}

fn location_labels(location: &str) -> LocationLabels {
    LocationLabels {
        location: location.to_owned(),
    }
}

fn set_if_present(location: &str, gauge: &FloatGauge, value: Option<f64>) {
    if let Some(v) = value {
        gauge.get_or_create(&location_labels(location)).set(v);
    }
}

fn set_or_remove(location: &str, gauge: &FloatGauge, value: Option<f64>) {
    match value {
        Some(v) => {
            gauge.get_or_create(&location_labels(location)).set(v);
        }
        None => {
            gauge.remove(&location_labels(location));
        }
    }
}

fn set_state(location: &str, gauge: &StateGauge, state: Option<&str>) {
    if let Some(state) = state {
        gauge.clear();
        gauge
            .get_or_create(&StateLabels {
                location: location.to_owned(),
                state: state.to_owned(),
            })
            .set(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::WeatherMetrics;
    use crate::forecast::HourlyForecast;
    use crate::readings::CurrentConditions;
    use chrono::{TimeZone, Utc};
    use prometheus_client::encoding::text::encode;
    use prometheus_client::registry::Registry;

    fn render(reg: &Registry) -> String {
        let mut buf = String::new();
        encode(&mut buf, reg).unwrap();
        buf
    }

    #[test]
    fn test_conditions_only_present_values() {
        let mut reg = Registry::default();
        let metrics = WeatherMetrics::new(&mut reg);
        let conditions = CurrentConditions {
            temperature: Some(18.5),
            condition: Some("sunny".to_owned()),
            ..Default::default()
        };

        metrics.conditions("tauranga", &conditions);
        let out = render(&reg);

        assert!(out.contains("metservice_temperature_degrees{location=\"tauranga\"} 18.5"));
        assert!(out.contains("metservice_condition{location=\"tauranga\",condition=\"sunny\"} 1"));
        assert!(!out.contains("metservice_wind_gust_kph{"));
    }

    #[test]
    fn test_condition_replaced() {
        let mut reg = Registry::default();
        let metrics = WeatherMetrics::new(&mut reg);

        for condition in ["sunny", "rainy"] {
            let conditions = CurrentConditions {
                condition: Some(condition.to_owned()),
                ..Default::default()
            };
            metrics.conditions("tauranga", &conditions);
        }

        let out = render(&reg);
        assert!(!out.contains("condition=\"sunny\""));
        assert!(out.contains("condition=\"rainy\""));
    }

    #[test]
    fn test_forecast_hours() {
        let mut reg = Registry::default();
        let metrics = WeatherMetrics::new(&mut reg);
        let hour = HourlyForecast {
            offset: 1,
            time: Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
            temperature: Some(21.0),
            rainfall: None,
            wind_speed: Some(10.0),
            condition: "partlycloudy",
        };

        metrics.forecast("tauranga", &[hour], &[]);
        let out = render(&reg);

        assert!(out.contains("metservice_hourly_forecast_temperature_degrees{location=\"tauranga\",hour=\"1\"} 21"));
        assert!(!out.contains("metservice_hourly_forecast_rainfall_mm{"));
        assert!(out.contains("metservice_forecast_days{location=\"tauranga\"} 0"));
    }

    #[test]
    fn test_forecast_hours_labelled_by_offset() {
        let mut reg = Registry::default();
        let metrics = WeatherMetrics::new(&mut reg);
        let hour = |offset, temperature| HourlyForecast {
            offset,
            time: Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
            temperature: Some(temperature),
            rainfall: None,
            wind_speed: None,
            condition: "partlycloudy",
        };

        // Column at offset 2 had no usable date and was skipped
        metrics.forecast("tauranga", &[hour(1, 20.0), hour(3, 22.0)], &[]);
        let out = render(&reg);

        assert!(out.contains("metservice_hourly_forecast_temperature_degrees{location=\"tauranga\",hour=\"1\"} 20"));
        assert!(out.contains("metservice_hourly_forecast_temperature_degrees{location=\"tauranga\",hour=\"3\"} 22"));
        assert!(!out.contains("hour=\"2\""));
    }

    #[test]
    fn test_conditions_text_states() {
        let mut reg = Registry::default();
        let metrics = WeatherMetrics::new(&mut reg);
        let conditions = CurrentConditions {
            fire_danger: Some("Low".to_owned()),
            uv_index: Some("7".to_owned()),
            drying_morning: Some("3 hours".to_owned()),
            pollen_levels: Some("High".to_owned()),
            warnings: "Strong Wind Watch, Gales., Sun".to_owned(),
            ..Default::default()
        };

        metrics.conditions("tauranga", &conditions);
        let out = render(&reg);

        assert!(out.contains("metservice_fire_danger{location=\"tauranga\",state=\"Low\"} 1"));
        assert!(out.contains("metservice_uv_index{location=\"tauranga\",state=\"7\"} 1"));
        assert!(out.contains("metservice_drying_morning{location=\"tauranga\",state=\"3 hours\"} 1"));
        assert!(out.contains("metservice_pollen_level{location=\"tauranga\",state=\"High\"} 1"));
        assert!(out.contains("metservice_warnings_active{location=\"tauranga\"} 1"));
        assert!(!out.contains("metservice_fire_season{"));

        let conditions = CurrentConditions {
            fire_danger: Some("High".to_owned()),
            warnings: "No warnings".to_owned(),
            ..Default::default()
        };
        metrics.conditions("tauranga", &conditions);
        let out = render(&reg);

        assert!(!out.contains("state=\"Low\""));
        assert!(out.contains("metservice_fire_danger{location=\"tauranga\",state=\"High\"} 1"));
        assert!(out.contains("metservice_warnings_active{location=\"tauranga\"} 0"));
    }

    #[test]
    fn test_past_tides_removed() {
        let mut reg = Registry::default();
        let metrics = WeatherMetrics::new(&mut reg);
        let high = chrono::DateTime::parse_from_rfc3339("2024-01-10T16:41:00+13:00").unwrap();
        let conditions = CurrentConditions {
            next_high_tide: Some(high),
            ..Default::default()
        };

        metrics.conditions("tauranga", &conditions);
        assert!(render(&reg).contains("metservice_next_high_tide_timestamp_seconds{location=\"tauranga\"} 1704858060"));

        metrics.conditions("tauranga", &CurrentConditions::default());
        assert!(!render(&reg).contains("metservice_next_high_tide_timestamp_seconds{"));
    }
}
