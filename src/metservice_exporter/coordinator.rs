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

use crate::client::{provider_errors, ClientError, Fetch};
use crate::expand::{Expander, DEFAULT_MAX_DEPTH};
use crate::fields::{ApiVariant, Source, TIDES_KEY, WARNINGS_KEY};
use crate::path::{KeyPath, ResolveMode};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::error;
use std::fmt;
use url::Url;

pub const DEFAULT_PUBLIC_URL: &str = "https://www.metservice.com/publicData/webdata/towns-cities/locations/";
pub const DEFAULT_MOBILE_URL: &str = "https://api.metservice.com/mobile/nz/weatherData/";
pub const DEFAULT_WARNINGS_URL: &str = "https://www.metservice.com/publicData/webdata/warnings/";
pub const DEFAULT_BASE_URL: &str = "https://www.metservice.com/";

const TIDE_DATA_PATH: &str = "layout.primary.slots.main.modules.0.tideData";

/// Failure of a whole poll cycle. The previous snapshot is kept.
#[derive(Debug)]
pub enum UpdateFailed {
    Fetch(&'static str, ClientError),
    Empty(&'static str, Url),
    Provider(&'static str, Url, String),
    Malformed(&'static str, String),
}

impl fmt::Display for UpdateFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(doc, e) => write!(f, "error fetching {} data: {}", doc, e),
            Self::Empty(doc, url) => write!(f, "no {} data received from {}", doc, url),
            Self::Provider(doc, url, msg) => write!(f, "error from {} for {} data: {}", url, doc, msg),
            Self::Malformed(doc, msg) => write!(f, "malformed {} data: {}", doc, msg),
        }
    }
}

impl error::Error for UpdateFailed {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Fetch(_, e) => Some(e),
            _ => None,
        }
    }
}

/// Where and what to poll for a single location.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub api: ApiVariant,
    pub location: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub api_url: Url,
    pub warnings_url: Url,
    pub base_url: Url,
    pub tide_url: Option<Url>,
    pub max_expand_depth: usize,
}

impl CoordinatorConfig {
    pub fn new(api: ApiVariant, location: &str, api_url: Url) -> Self {
        CoordinatorConfig {
            api,
            location: location.to_owned(),
            latitude: None,
            longitude: None,
            api_url,
            // Both defaults are valid URLs
            warnings_url: Url::parse(DEFAULT_WARNINGS_URL).expect("invalid default warnings URL"),
            base_url: Url::parse(DEFAULT_BASE_URL).expect("invalid default base URL"),
            tide_url: None,
            max_expand_depth: DEFAULT_MAX_DEPTH,
        }
    }

    fn current_url(&self) -> Url {
        match self.api {
            ApiVariant::Public => with_segments(&self.api_url, &[self.location.as_str()]),
            ApiVariant::Mobile => with_segments(
                &self.api_url,
                &[
                    self.latitude.as_deref().unwrap_or_default(),
                    self.longitude.as_deref().unwrap_or_default(),
                ],
            ),
        }
    }

    fn daily_url(&self) -> Url {
        match self.api {
            ApiVariant::Public => with_segments(&self.api_url, &[self.location.as_str(), "7-days"]),
            ApiVariant::Mobile => with_segments(&self.api_url, &["locations", self.location.as_str(), "7-days"]),
        }
    }

    fn warnings_url(&self, kind: &str, key: &str) -> Url {
        with_segments(&self.warnings_url, &[kind, key])
    }
}

fn with_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }

    url
}

/// Documents from one successful poll cycle, fully expanded.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub current: Value,
    pub daily: Value,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn document(&self, source: Source) -> &Value {
        match source {
            Source::Current => &self.current,
            Source::Daily => &self.daily,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PublicWarning {
    #[serde(default)]
    name: String,
    #[serde(default)]
    text: String,
    #[serde(default, alias = "threatPeriod")]
    threat_period: String,
}

#[derive(Debug, Deserialize)]
struct MobileWarning {
    #[serde(default)]
    name: String,
    #[serde(default)]
    markdown: String,
}

/// Polls all documents for a single location and holds on to the last
/// successful result.
#[derive(Debug)]
pub struct WeatherCoordinator<F> {
    fetcher: F,
    config: CoordinatorConfig,
    latest: Option<Snapshot>,
}

impl<F> WeatherCoordinator<F>
where
    F: Fetch,
{
    pub fn new(fetcher: F, config: CoordinatorConfig) -> Self {
        WeatherCoordinator {
            fetcher,
            config,
            latest: None,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Most recent successful snapshot, if any cycle has succeeded.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }

    /// Run one poll cycle. Requests are made one at a time. On failure the
    /// previous snapshot is left in place.
    pub async fn refresh(&mut self) -> Result<&Snapshot, UpdateFailed> {
        let res = match self.config.api {
            ApiVariant::Public => self.fetch_public().await,
            ApiVariant::Mobile => self.fetch_mobile().await,
        };

        match res {
            Ok(snapshot) => Ok(&*self.latest.insert(snapshot)),
            Err(e) => {
                tracing::error!(message = "failed to update weather data", location = %self.config.location, error = %e);
                Err(e)
            }
        }
    }

    async fn fetch_public(&self) -> Result<Snapshot, UpdateFailed> {
        let url = self.config.current_url();
        tracing::info!(message = "fetching current conditions", url = %url);
        let mut current = self.fetch_document("current", url).await?;
        self.expand(&mut current).await;

        let kind = strict_str(&current, "location.type");
        let key = strict_str(&current, "location.key");
        let (kind, key) = match (kind, key) {
            (Some(kind), Some(key)) => (kind.to_owned(), key.to_owned()),
            _ => return Err(UpdateFailed::Malformed("current", "missing location type or key".to_owned())),
        };

        let mut warnings = self.fetch_document("warnings", self.config.warnings_url(&kind, &key)).await?;
        self.expand(&mut warnings).await;
        let warnings_text = public_warnings_text(&warnings);

        let mut daily = self.fetch_document("daily", self.config.daily_url()).await?;
        self.expand(&mut daily).await;

        self.finish(current, daily, warnings_text).await
    }

    async fn fetch_mobile(&self) -> Result<Snapshot, UpdateFailed> {
        let url = self.config.current_url();
        tracing::info!(message = "fetching current conditions", url = %url);
        let mut current = self.fetch_document("current", url).await?;
        let warnings_text = mobile_warnings_text(&current);

        let mut daily = self.fetch_document("daily", self.config.daily_url()).await?;
        self.expand(&mut current).await;
        self.expand(&mut daily).await;

        self.finish(current, daily, warnings_text).await
    }

    async fn finish(&self, mut current: Value, daily: Value, warnings: String) -> Result<Snapshot, UpdateFailed> {
        let tides = match &self.config.tide_url {
            Some(url) => Some(self.fetch_tides(url.clone()).await?),
            None => None,
        };

        let map = current
            .as_object_mut()
            .ok_or_else(|| UpdateFailed::Malformed("current", "response is not an object".to_owned()))?;
        map.insert(WARNINGS_KEY.to_owned(), Value::String(warnings));
        if let Some(tides) = tides {
            map.insert(TIDES_KEY.to_owned(), tides);
        }

        tracing::info!(message = "fetched new weather data", location = %self.config.location);
        Ok(Snapshot {
            current,
            daily,
            fetched_at: Utc::now(),
        })
    }

    async fn fetch_tides(&self, url: Url) -> Result<Value, UpdateFailed> {
        tracing::info!(message = "fetching tides", url = %url);
        let mut tides = self.fetch_document("tides", url).await?;
        self.expand(&mut tides).await;

        ResolveMode::Strict
            .resolve(&tides, &KeyPath::parse(TIDE_DATA_PATH))
            .cloned()
            .ok_or_else(|| UpdateFailed::Malformed("tides", format!("missing {}", TIDE_DATA_PATH)))
    }

    async fn fetch_document(&self, name: &'static str, url: Url) -> Result<Value, UpdateFailed> {
        let doc = self
            .fetcher
            .fetch(&url)
            .await
            .map_err(|e| UpdateFailed::Fetch(name, e))?;

        if doc.is_null() {
            return Err(UpdateFailed::Empty(name, url));
        }

        if let Some(msg) = provider_errors(&doc) {
            return Err(UpdateFailed::Provider(name, url, msg));
        }

        Ok(doc)
    }

    async fn expand(&self, doc: &mut Value) {
        let stats = Expander::new(&self.fetcher, self.config.base_url.clone())
            .with_max_depth(self.config.max_expand_depth)
            .expand(doc)
            .await;

        tracing::debug!(message = "expanded document", fetched = stats.fetched, failed = stats.failed);
    }
}

fn strict_str<'a>(doc: &'a Value, path: &str) -> Option<&'a str> {
    ResolveMode::Strict.resolve(doc, &KeyPath::parse(path))?.as_str()
}

fn public_warnings_text(warnings: &Value) -> String {
    let items = warnings.get("warnings").cloned().unwrap_or(Value::Null);
    let warnings: Vec<PublicWarning> = serde_json::from_value(items).unwrap_or_default();

    warnings
        .iter()
        .map(|w| format!("{}, {}, {}", w.name, w.text, w.threat_period))
        .collect::<Vec<String>>()
        .join("\n")
}

fn mobile_warnings_text(current: &Value) -> String {
    let items = ResolveMode::Strict
        .resolve(current, &KeyPath::parse("result.warnings.previews"))
        .cloned()
        .unwrap_or(Value::Null);
    let previews: Vec<MobileWarning> = serde_json::from_value(items).unwrap_or_default();

    previews
        .iter()
        .map(|w| format!("{}, {}", w.name, w.markdown))
        .collect::<Vec<String>>()
        .join("\n")
        .replace("**", "")
        .replace('#', "")
        .replace('\n', " ")
}
