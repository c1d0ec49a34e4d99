//! Pagination drivers.
//!
//! After each page the driver decides whether another request is needed
//! and, if so, rewrites the pending request. Two styles are supported:
//! header-count (a response header carries the total number of records)
//! and link-based (follow `rel="next"` in the `Link` header).

use std::collections::BTreeMap;

use serde_json::Value;
use url::Url;

use crate::config::{PageTarget, PageValue, PaginationConfig};
use crate::error::{Result, TinError};
use crate::response::ResponseMeta;

/// State of a paginated call after a page has been processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Another request is needed.
    Fetching,
    /// The aggregate is complete.
    Done,
}

/// Record counts after a page has been aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCounts {
    /// Records on the page just fetched.
    pub current: usize,
    /// Records in the aggregate so far.
    pub total: usize,
}

/// The request the next loop iteration will issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// URL of the next request.
    pub url: String,
    /// Query parameters of the next request.
    pub params: BTreeMap<String, String>,
    origin: String,
}

impl PendingRequest {
    pub fn new(url: impl Into<String>, params: BTreeMap<String, String>) -> Self {
        let url = url.into();
        Self {
            origin: url.clone(),
            url,
            params,
        }
    }
}

/// Decides, page by page, whether a call needs more requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationDriver {
    HeaderCount {
        header: String,
        value: PageValue,
        target: PageTarget,
    },
    Link,
}

impl PaginationDriver {
    /// Link-based unless header-count pagination is configured.
    pub fn from_config(config: Option<&PaginationConfig>) -> Self {
        match config {
            Some(PaginationConfig::HeaderCount {
                header,
                value,
                target,
            }) => Self::HeaderCount {
                header: header.clone(),
                value: *value,
                target: target.clone(),
            },
            Some(PaginationConfig::Link) | None => Self::Link,
        }
    }

    /// Inspect the last response and prepare the next request, if any.
    ///
    /// # Errors
    ///
    /// Returns [`TinError::InvalidPaginationHeader`] if the count header is
    /// present but not an integer.
    pub fn advance(
        &self,
        response: &ResponseMeta,
        counts: PageCounts,
        pending: &mut PendingRequest,
    ) -> Result<PageState> {
        match self {
            Self::HeaderCount {
                header,
                value,
                target,
            } => {
                // A missing header means no more pages.
                let raw = response.header(header).unwrap_or("0").trim();
                let expected: u64 = raw.parse().map_err(|_| TinError::InvalidPaginationHeader {
                    header: header.clone(),
                    value: raw.to_string(),
                })?;

                if counts.total as u64 >= expected {
                    return Ok(PageState::Done);
                }
                if counts.current == 0 {
                    tracing::warn!(
                        total = counts.total,
                        expected,
                        "empty page before reaching the advertised record count, stopping"
                    );
                    return Ok(PageState::Done);
                }

                let next = match value {
                    PageValue::Current => counts.current,
                    PageValue::Total => counts.total,
                };
                match target {
                    PageTarget::Param(param) => {
                        pending.params.insert(param.clone(), next.to_string());
                    }
                    PageTarget::Path(template) => {
                        pending.url = format!(
                            "{}/{}",
                            pending.origin.trim_end_matches('/'),
                            render_segment(template, next)
                        );
                    }
                }
                tracing::debug!(total = counts.total, expected, next, "fetching next page");
                Ok(PageState::Fetching)
            }
            Self::Link => match response.links.get("next") {
                None => Ok(PageState::Done),
                Some(next) => {
                    tracing::debug!(next = %next, "following next link");
                    pending.url = next.clone();
                    // The next link carries its own query string.
                    pending.params.clear();
                    Ok(PageState::Fetching)
                }
            },
        }
    }
}

fn render_segment(template: &str, value: usize) -> String {
    let value = value.to_string();
    ["%s", "%d", "{}"]
        .iter()
        .find(|placeholder| template.contains(*placeholder))
        .map(|placeholder| template.replacen(placeholder, &value, 1))
        .unwrap_or_else(|| format!("{template}/{value}"))
}

/// Number of records in a page or aggregate.
pub(crate) fn record_count(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::Null => 0,
        _ => 1,
    }
}

/// Fold a page into the running aggregate: lists extend, mappings merge
/// keys, anything else is replaced by the page.
pub(crate) fn aggregate(running: Option<Value>, page: Value) -> Value {
    match (running, page) {
        (Some(Value::Array(mut items)), Value::Array(more)) => {
            items.extend(more);
            Value::Array(items)
        }
        (Some(Value::Array(mut items)), other) => {
            items.push(other);
            Value::Array(items)
        }
        (Some(Value::Object(mut map)), Value::Object(more)) => {
            map.extend(more);
            Value::Object(map)
        }
        (_, page) => page,
    }
}

/// Parse an RFC 8288 `Link` header into `rel` to URL pairs.
///
/// Relative targets are resolved against `base` when given.
pub fn parse_link_header(value: &str, base: Option<&Url>) -> BTreeMap<String, String> {
    let mut links = BTreeMap::new();
    let mut rest = value;

    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start..].find('>') else {
            break;
        };
        let target = &rest[start + 1..start + len];
        rest = &rest[start + len + 1..];

        let params_end = rest.find('<').unwrap_or(rest.len());
        let resolved = match base.map(|b| b.join(target)) {
            Some(Ok(url)) => url.to_string(),
            _ => target.to_string(),
        };

        for param in rest[..params_end].split(';') {
            let Some((key, val)) = param.split_once('=') else {
                continue;
            };
            if !key.trim().eq_ignore_ascii_case("rel") {
                continue;
            }
            let rels = val.trim().trim_end_matches(',').trim().trim_matches('"');
            for rel in rels.split_whitespace() {
                links.insert(rel.to_lowercase(), resolved.clone());
            }
        }

        rest = &rest[params_end..];
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta_with_header(name: &str, value: &str) -> ResponseMeta {
        ResponseMeta {
            headers: BTreeMap::from([(name.to_lowercase(), value.to_string())]),
            ..Default::default()
        }
    }

    fn header_driver(target: PageTarget, value: PageValue) -> PaginationDriver {
        PaginationDriver::HeaderCount {
            header: "X-Total-Count".to_string(),
            value,
            target,
        }
    }

    #[test]
    fn test_parse_link_header() {
        let base = Url::parse("https://api.example.com/things?page=1").unwrap();
        let links = parse_link_header(
            r#"<https://api.example.com/things?page=2>; rel="next", </things?page=9>; rel="last""#,
            Some(&base),
        );
        assert_eq!(links["next"], "https://api.example.com/things?page=2");
        assert_eq!(links["last"], "https://api.example.com/things?page=9");
    }

    #[test]
    fn test_parse_link_header_multiple_rels() {
        let links = parse_link_header(r#"<http://x/a>; rel="prev first""#, None);
        assert_eq!(links["prev"], "http://x/a");
        assert_eq!(links["first"], "http://x/a");
        assert!(parse_link_header("garbage", None).is_empty());
    }

    #[test]
    fn test_header_count_sets_param() {
        let driver = header_driver(PageTarget::Param("offset".to_string()), PageValue::Total);
        let mut pending = PendingRequest::new("http://x/things", BTreeMap::new());
        let meta = meta_with_header("X-Total-Count", "5");

        let state = driver
            .advance(&meta, PageCounts { current: 2, total: 2 }, &mut pending)
            .unwrap();
        assert_eq!(state, PageState::Fetching);
        assert_eq!(pending.params["offset"], "2");

        let state = driver
            .advance(&meta, PageCounts { current: 1, total: 5 }, &mut pending)
            .unwrap();
        assert_eq!(state, PageState::Done);
    }

    #[test]
    fn test_header_count_path_is_not_cumulative() {
        let driver = header_driver(PageTarget::Path("page/%d".to_string()), PageValue::Current);
        let mut pending = PendingRequest::new("http://x/things/", BTreeMap::new());
        let meta = meta_with_header("X-Total-Count", "10");

        driver
            .advance(&meta, PageCounts { current: 3, total: 3 }, &mut pending)
            .unwrap();
        assert_eq!(pending.url, "http://x/things/page/3");
        driver
            .advance(&meta, PageCounts { current: 3, total: 6 }, &mut pending)
            .unwrap();
        assert_eq!(pending.url, "http://x/things/page/3");
    }

    #[test]
    fn test_header_count_missing_header_is_done() {
        let driver = header_driver(PageTarget::Param("offset".to_string()), PageValue::Total);
        let mut pending = PendingRequest::new("http://x", BTreeMap::new());
        let state = driver
            .advance(&ResponseMeta::default(), PageCounts { current: 2, total: 2 }, &mut pending)
            .unwrap();
        assert_eq!(state, PageState::Done);
    }

    #[test]
    fn test_header_count_rejects_non_integer() {
        let driver = header_driver(PageTarget::Param("offset".to_string()), PageValue::Total);
        let mut pending = PendingRequest::new("http://x", BTreeMap::new());
        let err = driver
            .advance(&meta_with_header("X-Total-Count", "lots"), PageCounts { current: 1, total: 1 }, &mut pending)
            .unwrap_err();
        assert!(matches!(err, TinError::InvalidPaginationHeader { .. }));
    }

    #[test]
    fn test_link_driver_follows_next_and_clears_params() {
        let mut meta = ResponseMeta::default();
        meta.links.insert("next".to_string(), "http://x/things?page=2".to_string());
        let mut pending = PendingRequest::new(
            "http://x/things",
            BTreeMap::from([("q".to_string(), "a".to_string())]),
        );

        let state = PaginationDriver::Link
            .advance(&meta, PageCounts { current: 1, total: 1 }, &mut pending)
            .unwrap();
        assert_eq!(state, PageState::Fetching);
        assert_eq!(pending.url, "http://x/things?page=2");
        assert!(pending.params.is_empty());

        let state = PaginationDriver::Link
            .advance(&ResponseMeta::default(), PageCounts { current: 1, total: 2 }, &mut pending)
            .unwrap();
        assert_eq!(state, PageState::Done);
    }

    #[test]
    fn test_aggregate_rules() {
        assert_eq!(aggregate(None, json!({"a": 1})), json!({"a": 1}));
        assert_eq!(aggregate(Some(json!([1])), json!([2, 3])), json!([1, 2, 3]));
        assert_eq!(
            aggregate(Some(json!({"a": 1})), json!({"b": 2})),
            json!({"a": 1, "b": 2})
        );
        assert_eq!(aggregate(Some(json!("x")), json!("y")), json!("y"));
    }

    #[test]
    fn test_render_segment() {
        assert_eq!(render_segment("page/%s", 4), "page/4");
        assert_eq!(render_segment("{}", 4), "4");
        assert_eq!(render_segment("page", 4), "page/4");
    }
}
