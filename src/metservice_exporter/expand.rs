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

use crate::client::{ClientError, Fetch};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::error;
use std::fmt;
use url::Url;

pub const DEFAULT_MARKER_KEY: &str = "dataUrl";
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Reason a single pointer was replaced with `null`.
#[derive(Debug)]
pub enum BranchError {
    NotAString,
    InvalidUrl(String, url::ParseError),
    Cycle(Url),
    TooDeep(Url, usize),
    Fetch(ClientError),
}

impl fmt::Display for BranchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAString => write!(f, "pointer value is not a string"),
            Self::InvalidUrl(u, e) => write!(f, "invalid pointer URL {}: {}", u, e),
            Self::Cycle(u) => write!(f, "pointer {} refers back to a document being expanded", u),
            Self::TooDeep(u, depth) => write!(f, "pointer {} exceeds max depth {}", u, depth),
            Self::Fetch(e) => write!(f, "{}", e),
        }
    }
}

impl error::Error for BranchError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::InvalidUrl(_, e) => Some(e),
            Self::Fetch(e) => Some(e),
            _ => None,
        }
    }
}

/// Counts of pointers handled by a single call to [`Expander::expand`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpandStats {
    pub fetched: usize,
    pub failed: usize,
}

/// State for one walk of a document: the chain of pointer URLs being expanded
/// above the current node, used to detect cycles and bound nesting.
#[derive(Debug, Default)]
struct Walk {
    branch: Vec<Url>,
    stats: ExpandStats,
}

/// Replaces `{"dataUrl": "..."}` pointer objects with the documents they point to.
///
/// Documents are walked depth-first, fetching each pointer one at a time in document
/// order. Fetched documents are walked too since they may contain more pointers. A
/// pointer that can't be fetched is replaced with `null` and the rest of the document
/// is still expanded.
#[derive(Debug)]
pub struct Expander<'f, F: ?Sized> {
    fetcher: &'f F,
    base_url: Url,
    marker_key: String,
    max_depth: usize,
}

impl<'f, F> Expander<'f, F>
where
    F: Fetch + ?Sized,
{
    /// Create an expander resolving relative pointer URLs against `base_url`.
    pub fn new(fetcher: &'f F, base_url: Url) -> Self {
        Expander {
            fetcher,
            base_url,
            marker_key: DEFAULT_MARKER_KEY.to_owned(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_marker_key<S: Into<String>>(mut self, key: S) -> Self {
        self.marker_key = key.into();
        self
    }

    /// Maximum number of pointers that may be nested inside each other.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Expand every pointer in `doc`, in place.
    ///
    /// When `doc` is itself a pointer it is replaced as a whole.
    pub async fn expand(&self, doc: &mut Value) -> ExpandStats {
        let mut walk = Walk::default();
        self.expand_node(doc, &mut walk).await;
        walk.stats
    }

    fn expand_node<'a>(&'a self, node: &'a mut Value, walk: &'a mut Walk) -> BoxFuture<'a, ()> {
        async move {
            let pointer = match &*node {
                Value::Object(map) => map.get(&self.marker_key).map(|v| v.as_str().map(str::to_owned)),
                _ => None,
            };

            if let Some(target) = pointer {
                match self.resolve_pointer(target.as_deref(), walk).await {
                    Ok((url, fetched)) => {
                        tracing::debug!(message = "expanded pointer", url = %url);
                        walk.stats.fetched += 1;
                        *node = fetched;

                        walk.branch.push(url);
                        self.expand_node(node, walk).await;
                        walk.branch.pop();
                    }
                    Err(e) => {
                        tracing::warn!(message = "failed to expand pointer", pointer = ?target, error = %e);
                        walk.stats.failed += 1;
                        *node = Value::Null;
                    }
                }

                return;
            }

            match node {
                Value::Object(map) => {
                    for value in map.values_mut() {
                        self.expand_node(value, walk).await;
                    }
                }
                Value::Array(items) => {
                    for item in items.iter_mut() {
                        self.expand_node(item, walk).await;
                    }
                }
                _ => {}
            }
        }
        .boxed()
    }

    async fn resolve_pointer(&self, target: Option<&str>, walk: &Walk) -> Result<(Url, Value), BranchError> {
        let target = target.ok_or(BranchError::NotAString)?;
        let url = self
            .base_url
            .join(target)
            .map_err(|e| BranchError::InvalidUrl(target.to_owned(), e))?;

        if walk.branch.contains(&url) {
            return Err(BranchError::Cycle(url));
        }

        if walk.branch.len() >= self.max_depth {
            return Err(BranchError::TooDeep(url, self.max_depth));
        }

        let fetched = self.fetcher.fetch(&url).await.map_err(BranchError::Fetch)?;
        Ok((url, fetched))
    }
}

#[cfg(test)]
mod tests {
    use super::{ExpandStats, Expander};
    use crate::client::{ClientError, Fetch};
    use async_trait::async_trait;
    use reqwest::{StatusCode, Url};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedFetch {
        responses: HashMap<String, Value>,
        requested: Mutex<Vec<String>>,
    }

    impl ScriptedFetch {
        fn with(mut self, url: &str, body: Value) -> Self {
            self.responses.insert(url.to_owned(), body);
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetch for ScriptedFetch {
        async fn fetch(&self, url: &Url) -> Result<Value, ClientError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.responses
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| ClientError::Unexpected(StatusCode::NOT_FOUND, url.clone()))
        }
    }

    fn base() -> Url {
        Url::parse("https://www.metservice.com").unwrap()
    }

    #[tokio::test]
    async fn test_expand_root_pointer() {
        let fetch = ScriptedFetch::default().with("https://x/y", json!({"z": 1}));
        let mut doc = json!({"dataUrl": "https://x/y"});

        let stats = Expander::new(&fetch, base()).expand(&mut doc).await;

        assert_eq!(json!({"z": 1}), doc);
        assert_eq!(ExpandStats { fetched: 1, failed: 0 }, stats);
    }

    #[tokio::test]
    async fn test_expand_relative_url_uses_base() {
        let fetch = ScriptedFetch::default().with("https://www.metservice.com/publicData/uv", json!({"uv": 3}));
        let mut doc = json!({"modules": [{"dataUrl": "/publicData/uv"}]});

        Expander::new(&fetch, base()).expand(&mut doc).await;

        assert_eq!(json!({"modules": [{"uv": 3}]}), doc);
    }

    #[tokio::test]
    async fn test_expand_failure_is_local_to_branch() {
        let fetch = ScriptedFetch::default()
            .with("https://x/a", json!({"a": true}))
            .with("https://x/c", json!([1, 2]));
        let mut doc = json!({
            "first": {"dataUrl": "https://x/a"},
            "second": {"dataUrl": "https://x/missing"},
            "third": [{"dataUrl": "https://x/c"}],
        });

        let stats = Expander::new(&fetch, base()).expand(&mut doc).await;

        assert_eq!(
            json!({"first": {"a": true}, "second": null, "third": [[1, 2]]}),
            doc
        );
        assert_eq!(ExpandStats { fetched: 2, failed: 1 }, stats);
    }

    #[tokio::test]
    async fn test_expand_sequential_document_order() {
        let fetch = ScriptedFetch::default()
            .with("https://x/1", json!({"inner": {"dataUrl": "https://x/2"}}))
            .with("https://x/2", json!("two"))
            .with("https://x/3", json!("three"));
        let mut doc = json!([
            {"dataUrl": "https://x/1"},
            {"other": {"dataUrl": "https://x/3"}},
        ]);

        Expander::new(&fetch, base()).expand(&mut doc).await;

        assert_eq!(json!([{"inner": "two"}, {"other": "three"}]), doc);
        assert_eq!(vec!["https://x/1", "https://x/2", "https://x/3"], fetch.requested());
    }

    #[tokio::test]
    async fn test_expand_fetched_pointer_to_pointer() {
        let fetch = ScriptedFetch::default()
            .with("https://x/1", json!({"dataUrl": "https://x/2"}))
            .with("https://x/2", json!({"done": 1}));
        let mut doc = json!({"v": {"dataUrl": "https://x/1"}});

        Expander::new(&fetch, base()).expand(&mut doc).await;

        assert_eq!(json!({"v": {"done": 1}}), doc);
    }

    #[tokio::test]
    async fn test_expand_cycle_terminates() {
        let fetch = ScriptedFetch::default()
            .with("https://x/a", json!({"next": {"dataUrl": "https://x/b"}}))
            .with("https://x/b", json!({"next": {"dataUrl": "https://x/a"}}));
        let mut doc = json!({"dataUrl": "https://x/a"});

        let stats = Expander::new(&fetch, base()).expand(&mut doc).await;

        assert_eq!(json!({"next": {"next": null}}), doc);
        assert_eq!(ExpandStats { fetched: 2, failed: 1 }, stats);
    }

    #[tokio::test]
    async fn test_expand_same_url_in_siblings_is_not_a_cycle() {
        let fetch = ScriptedFetch::default().with("https://x/a", json!(5));
        let mut doc = json!([{"dataUrl": "https://x/a"}, {"dataUrl": "https://x/a"}]);

        Expander::new(&fetch, base()).expand(&mut doc).await;

        assert_eq!(json!([5, 5]), doc);
    }

    #[tokio::test]
    async fn test_expand_max_depth() {
        let fetch = ScriptedFetch::default()
            .with("https://x/1", json!({"dataUrl": "https://x/2"}))
            .with("https://x/2", json!({"dataUrl": "https://x/3"}))
            .with("https://x/3", json!(3));
        let mut doc = json!({"v": {"dataUrl": "https://x/1"}});

        let stats = Expander::new(&fetch, base()).with_max_depth(2).expand(&mut doc).await;

        assert_eq!(json!({"v": null}), doc);
        assert_eq!(ExpandStats { fetched: 2, failed: 1 }, stats);
    }

    #[tokio::test]
    async fn test_expand_non_string_pointer() {
        let fetch = ScriptedFetch::default();
        let mut doc = json!({"a": {"dataUrl": 12}, "b": 1});

        Expander::new(&fetch, base()).expand(&mut doc).await;

        assert_eq!(json!({"a": null, "b": 1}), doc);
        assert!(fetch.requested().is_empty());
    }

    #[tokio::test]
    async fn test_expand_invalid_pointer_url() {
        let fetch = ScriptedFetch::default().with("https://x/ok", json!(2));
        let mut doc = json!({"a": {"dataUrl": "http://[oops/data"}, "b": {"dataUrl": "https://x/ok"}});

        let stats = Expander::new(&fetch, base()).expand(&mut doc).await;

        assert_eq!(json!({"a": null, "b": 2}), doc);
        assert_eq!(ExpandStats { fetched: 1, failed: 1 }, stats);
        assert_eq!(vec!["https://x/ok"], fetch.requested());
    }

    #[tokio::test]
    async fn test_expand_custom_marker_key() {
        let fetch = ScriptedFetch::default().with("https://x/a", json!("a"));
        let mut doc = json!({"k": {"href": "https://x/a"}, "j": {"dataUrl": "https://x/a"}});

        Expander::new(&fetch, base()).with_marker_key("href").expand(&mut doc).await;

        assert_eq!(json!({"k": "a", "j": {"dataUrl": "https://x/a"}}), doc);
    }
}
