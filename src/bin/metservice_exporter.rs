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

use axum::Server;
use clap::Parser;
use metservice_exporter::client::MetServiceClient;
use metservice_exporter::condition::ConditionMap;
use metservice_exporter::coordinator::{
    CoordinatorConfig, WeatherCoordinator, DEFAULT_BASE_URL, DEFAULT_MOBILE_URL, DEFAULT_PUBLIC_URL,
    DEFAULT_WARNINGS_URL,
};
use metservice_exporter::expand::DEFAULT_MAX_DEPTH;
use metservice_exporter::fields::{ApiVariant, FieldTable};
use metservice_exporter::forecast::{daily_forecast, hourly_forecast};
use metservice_exporter::http::RequestContext;
use metservice_exporter::metrics::WeatherMetrics;
use metservice_exporter::readings::CurrentConditions;
use metservice_exporter::tides::local_now;
use prometheus_client::registry::Registry;
use reqwest::{Client, Url};
use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{self, SignalKind};
use tracing::{Instrument, Level};

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 9783);
const DEFAULT_REFERSH_SECS: u64 = 1200;
const DEFAULT_TIMEOUT_MILLIS: u64 = 10000;

#[derive(Debug, Parser)]
#[clap(name = "metservice_exporter", version = clap::crate_version!())]
struct MetServiceExporterApplication {
    /// Location to fetch weather for, as it appears in MetService URLs (e.g. 'tauranga')
    #[clap(long)]
    location: String,

    /// Which MetService API to use
    #[clap(long, value_enum, default_value_t = ApiVariant::Public)]
    api: ApiVariant,

    /// Base URL for current conditions and forecasts. Defaults to the URL for the selected API.
    #[clap(long)]
    api_url: Option<Url>,

    /// Base URL for weather warnings (public API only)
    #[clap(long, default_value = DEFAULT_WARNINGS_URL)]
    warnings_url: Url,

    /// URL relative 'dataUrl' references in MetService responses are resolved against
    #[clap(long, default_value = DEFAULT_BASE_URL)]
    base_url: Url,

    /// URL of a MetService tide page. Tide times are only fetched when this is set.
    #[clap(long)]
    tide_url: Option<Url>,

    /// Latitude of the location (mobile API only)
    #[clap(long, allow_hyphen_values = true)]
    latitude: Option<String>,

    /// Longitude of the location (mobile API only)
    #[clap(long, allow_hyphen_values = true)]
    longitude: Option<String>,

    /// API key for the mobile API (required when using it)
    #[clap(long)]
    api_key: Option<String>,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Fetch weather data from MetService at this interval, in seconds.
    #[clap(long, default_value_t = DEFAULT_REFERSH_SECS)]
    refresh_secs: u64,

    /// Timeout for each request made to MetService, in milliseconds.
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_MILLIS)]
    timeout_millis: u64,

    /// Maximum number of nested 'dataUrl' references followed in a single branch of a response.
    #[clap(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_expand_depth: usize,

    /// Address to bind to. By default, metservice_exporter will bind to public address since
    /// the purpose is to expose metrics to an external system (Prometheus or another
    /// agent for ingestion)
    #[clap(long, default_value_t = DEFAULT_BIND_ADDR.into())]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opts = MetServiceExporterApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    if opts.api == ApiVariant::Mobile && (opts.latitude.is_none() || opts.longitude.is_none()) {
        tracing::error!(message = "latitude and longitude are required for the mobile API");
        process::exit(1)
    }

    if opts.api == ApiVariant::Mobile && opts.api_key.is_none() {
        tracing::error!(message = "an API key is required for the mobile API");
        process::exit(1)
    }

    let timeout = Duration::from_millis(opts.timeout_millis);
    let http_client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let client = MetServiceClient::new(http_client, opts.api, opts.api_key.as_deref()).unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize MetService client", error = %e);
        process::exit(1)
    });

    let api_url = opts.api_url.clone().unwrap_or_else(|| {
        let default = match opts.api {
            ApiVariant::Public => DEFAULT_PUBLIC_URL,
            ApiVariant::Mobile => DEFAULT_MOBILE_URL,
        };
        // Both defaults are valid URLs
        Url::parse(default).expect("invalid default API URL")
    });

    let mut config = CoordinatorConfig::new(opts.api, &opts.location, api_url);
    config.latitude = opts.latitude.clone();
    config.longitude = opts.longitude.clone();
    config.warnings_url = opts.warnings_url.clone();
    config.base_url = opts.base_url.clone();
    config.tide_url = opts.tide_url.clone();
    config.max_expand_depth = opts.max_expand_depth;

    let mut coordinator = WeatherCoordinator::new(client, config);
    let table = FieldTable::for_variant(opts.api);
    let conditions = ConditionMap::metservice();

    let mut registry = Registry::default();
    let metrics = WeatherMetrics::new(&mut registry);
    let api = opts.api;
    let location = opts.location.clone();
    let mut interval = tokio::time::interval(Duration::from_secs(opts.refresh_secs));

    tokio::spawn(async move {
        tracing::info!(
            message = "weather polling started",
            api = %api,
            api_url = %coordinator.config().api_url,
            location = %location,
        );

        loop {
            let _ = interval.tick().await;
            match coordinator
                .refresh()
                .instrument(tracing::span!(Level::DEBUG, "metservice_refresh"))
                .await
            {
                Ok(snapshot) => {
                    let current = CurrentConditions::from_document(&table, &conditions, &snapshot.current, local_now());
                    let hourly = hourly_forecast(&table, &snapshot.current);
                    let daily = daily_forecast(&table, &conditions, snapshot.document(table.days().0));

                    metrics.conditions(&location, &current);
                    metrics.forecast(&location, &hourly, &daily);
                    metrics.updated(&location, snapshot.fetched_at);
                    tracing::info!(
                        message = "updated weather metrics",
                        condition = ?current.condition,
                        description = %current.description,
                        warnings = %current.warnings,
                        pollen_type = ?current.pollen_type,
                        valid_time = ?current.valid_time,
                        hours = hourly.len(),
                        days = daily.len(),
                    );
                }
                Err(e) => {
                    // The coordinator keeps the last good snapshot, metrics keep their last values
                    tracing::debug!(message = "keeping previous weather data", error = %e);
                }
            }
        }
    });

    let context = Arc::new(RequestContext::new(registry));
    let router = metservice_exporter::http::text_metrics(context);
    let server = Server::try_bind(&opts.bind)
        .unwrap_or_else(|e| {
            tracing::error!(message = "error binding to address", address = %opts.bind, error = %e);
            process::exit(1)
        })
        .serve(router.into_make_service());

    tracing::info!(message = "server started", address = %server.local_addr());

    server
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    tracing::info!("server shutdown");
    Ok(())
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    unix::signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}
