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

use crate::fields::ApiVariant;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::error;
use std::fmt;

#[derive(Debug)]
pub enum ClientError {
    Internal(reqwest::Error),
    InvalidApiKey,
    Unexpected(StatusCode, Url),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(e) => write!(f, "{}", e),
            Self::InvalidApiKey => write!(f, "API key is not a valid header value"),
            Self::Unexpected(status, url) => write!(f, "unexpected status {} for {}", status, url),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e),
            _ => None,
        }
    }
}

/// Retrieve a JSON document from a URL.
///
/// Implemented by [`MetServiceClient`] for real requests and by scripted
/// fetchers in tests.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Value, ClientError>;
}

#[derive(Debug)]
pub struct MetServiceClient {
    client: Client,
    headers: HeaderMap,
}

impl MetServiceClient {
    const BROWSER_USER_AGENT: &'static str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/111.0.0.0 Safari/537.36";
    const MOBILE_USER_AGENT: &'static str =
        "MetServiceNZ/2.19.3 (com.metservice.iphoneapp; build:332; iOS 17.1.1) Alamofire/5.4.3";
    const API_KEY_HEADER: &'static str = "apikey";

    /// Create a client that sends the headers the given API variant expects.
    ///
    /// The mobile API requires an API key which is sent verbatim with every request. The
    /// key is not sent to the public API.
    pub fn new(client: Client, api: ApiVariant, api_key: Option<&str>) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        match api {
            ApiVariant::Public => {
                headers.insert(USER_AGENT, HeaderValue::from_static(Self::BROWSER_USER_AGENT));
            }
            ApiVariant::Mobile => {
                headers.insert(USER_AGENT, HeaderValue::from_static(Self::MOBILE_USER_AGENT));
                headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
                headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-NZ;q=1.0"));

                if let Some(key) = api_key {
                    let value = HeaderValue::from_str(key).map_err(|_| ClientError::InvalidApiKey)?;
                    headers.insert(Self::API_KEY_HEADER, value);
                }
            }
        }

        Ok(MetServiceClient { client, headers })
    }
}

#[async_trait]
impl Fetch for MetServiceClient {
    async fn fetch(&self, url: &Url) -> Result<Value, ClientError> {
        tracing::debug!(message = "making request", url = %url);

        let res = self
            .client
            .get(url.clone())
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(ClientError::Internal)?;

        let status = res.status();
        if status != StatusCode::OK {
            return Err(ClientError::Unexpected(status, url.clone()));
        }

        res.json::<Value>().await.map_err(ClientError::Internal)
    }
}

/// Collect provider reported errors from a top-level response.
///
/// MetService signals some failures with a `200` response carrying a non-empty
/// `errors` array of `{"message": ...}` objects. A single error object or a bare
/// message in place of the array counts too. Returns the joined messages.
pub fn provider_errors(response: &Value) -> Option<String> {
    let errors = response.get("errors")?;
    let messages: Vec<&str> = match errors {
        Value::Array(items) => items.iter().map(error_message).collect(),
        Value::Object(map) if !map.is_empty() => vec![error_message(errors)],
        Value::String(s) if !s.is_empty() => vec![s.as_str()],
        Value::Bool(true) => vec![UNKNOWN_ERROR],
        Value::Number(n) if n.as_f64() != Some(0.0) => vec![UNKNOWN_ERROR],
        _ => Vec::new(),
    };

    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}

const UNKNOWN_ERROR: &str = "unknown error";

fn error_message(error: &Value) -> &str {
    error.get("message").and_then(Value::as_str).unwrap_or(UNKNOWN_ERROR)
}
