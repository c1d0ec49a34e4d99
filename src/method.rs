//! Endpoint methods: the callable leaves of the endpoint tree.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use reqwest::header::{HeaderMap, HeaderName};
use reqwest::Response;
use serde_json::{Map, Value};

use crate::client::TinClient;
use crate::config::{scalar_to_string, ResolvedConfig};
use crate::error::{Result, TinError};
use crate::pagination::{aggregate, record_count, PageCounts, PageState, PaginationDriver, PendingRequest};
use crate::response::{shape, ApiResponse, ResponseMeta};
use crate::tree::NodeBinding;

/// Matches `:token` placeholders in path templates.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([a-zA-Z0-9_-]+)").expect("Invalid path token regex"));

const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// Statuses whose empty body decodes as `null`.
const NO_CONTENT: [u16; 2] = [204, 205];

/// HTTP verb of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Options,
    Post,
    Patch,
    Put,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Options => "OPTIONS",
            Verb::Post => "POST",
            Verb::Patch => "PATCH",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }

    /// Whether a JSON body is sent with this verb.
    pub fn carries_body(&self) -> bool {
        matches!(self, Verb::Post | Verb::Patch | Verb::Put | Verb::Delete)
    }

    fn as_method(&self) -> reqwest::Method {
        match self {
            Verb::Get => reqwest::Method::GET,
            Verb::Options => reqwest::Method::OPTIONS,
            Verb::Post => reqwest::Method::POST,
            Verb::Patch => reqwest::Method::PATCH,
            Verb::Put => reqwest::Method::PUT,
            Verb::Delete => reqwest::Method::DELETE,
        }
    }
}

impl FromStr for Verb {
    type Err = TinError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Verb::Get),
            "OPTIONS" => Ok(Verb::Options),
            "POST" => Ok(Verb::Post),
            "PATCH" => Ok(Verb::Patch),
            "PUT" => Ok(Verb::Put),
            "DELETE" => Ok(Verb::Delete),
            other => Err(TinError::Config(format!("unsupported HTTP method '{other}'"))),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Call-time arguments of a method invocation.
///
/// # Example
///
/// ```
/// use tin::Call;
///
/// let call = Call::new()
///     .id(7)
///     .token("org", "acme")
///     .param("expand", "members")
///     .body(serde_json::json!({"name": "x"}));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Call {
    id: Option<Value>,
    tokens: Map<String, Value>,
    params: Map<String, Value>,
    body: Option<Value>,
}

impl Call {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply the `id` token. Takes precedence over `token("id", ..)`.
    pub fn id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn token(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tokens.insert(name.into(), value.into());
        self
    }

    pub fn tokens(mut self, tokens: Map<String, Value>) -> Self {
        self.tokens.extend(tokens);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params.extend(params);
        self
    }

    /// JSON body, sent for POST, PUT, PATCH and DELETE.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A method definition as parsed from the endpoint definitions.
#[derive(Debug, Clone)]
pub(crate) struct MethodSpec {
    pub(crate) verb: Verb,
    pub(crate) path: String,
    pub(crate) expected: Vec<u16>,
    pub(crate) default_params: Map<String, Value>,
    pub(crate) default_tokens: Map<String, Value>,
    pub(crate) object_method: bool,
    pub(crate) singleton: bool,
    pub(crate) data: Value,
}

impl MethodSpec {
    /// Parse one method definition; `where_` names it in errors.
    pub(crate) fn parse(where_: &str, data: &Value) -> Result<Self> {
        let Value::Object(def) = data else {
            return Err(TinError::Config(format!("method '{where_}' must be a mapping")));
        };

        let verb = match def.get("method") {
            Some(Value::String(verb)) => verb.parse::<Verb>().map_err(|_| {
                TinError::Config(format!("method '{where_}' has unsupported HTTP method '{verb}'"))
            })?,
            _ => return Err(TinError::Config(format!("method '{where_}' is missing 'method'"))),
        };
        let path = match def.get("path") {
            Some(Value::String(path)) => path.clone(),
            _ => return Err(TinError::Config(format!("method '{where_}' is missing 'path'"))),
        };

        Ok(Self {
            verb,
            path,
            expected: parse_expected(where_, def.get("return"))?,
            default_params: mapping_key(where_, def, "default_params")?,
            default_tokens: mapping_key(where_, def, "default_tokens")?,
            object_method: def.get("object_method").and_then(Value::as_bool).unwrap_or(false),
            singleton: def.get("singleton").and_then(Value::as_bool).unwrap_or(false),
            data: data.clone(),
        })
    }
}

/// Accepted status codes: a code, a list of codes, or a mapping keyed by code.
fn parse_expected(where_: &str, value: Option<&Value>) -> Result<Vec<u16>> {
    let invalid = || TinError::Config(format!("method '{where_}' has an invalid 'return'"));
    let code = |v: &Value| -> Result<u16> {
        match v {
            Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()).ok_or_else(invalid),
            Value::String(s) => s.trim().parse().map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    };

    match value {
        None | Some(Value::Null) => Ok(vec![DEFAULT_EXPECTED_STATUS]),
        Some(Value::Array(codes)) => codes.iter().map(code).collect(),
        Some(Value::Object(codes)) => codes
            .keys()
            .map(|k| k.trim().parse().map_err(|_| invalid()))
            .collect(),
        Some(single) => Ok(vec![code(single)?]),
    }
}

fn mapping_key(where_: &str, def: &Map<String, Value>, key: &str) -> Result<Map<String, Value>> {
    match def.get(key) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(TinError::Config(format!("'{key}' of method '{where_}' must be a mapping"))),
    }
}

/// A callable operation bound to a verb, a path template and
/// response-shaping rules.
///
/// Method definitions are immutable; every invocation works on its own copy
/// of the default parameters and tokens.
pub struct EndpointMethod {
    name: String,
    verb: Verb,
    path: String,
    url: String,
    expected: Vec<u16>,
    default_params: Map<String, Value>,
    default_tokens: Map<String, Value>,
    object_method: bool,
    singleton: bool,
    data: Value,
    binding: Arc<NodeBinding>,
    config: Arc<ResolvedConfig>,
}

impl EndpointMethod {
    pub(crate) fn new(
        name: impl Into<String>,
        spec: MethodSpec,
        binding: Arc<NodeBinding>,
        config: Arc<ResolvedConfig>,
    ) -> Self {
        // API-wide defaults first, then the method's own.
        let mut default_params = config.default_params.clone();
        default_params.extend(spec.default_params);
        let mut default_tokens = config.default_tokens.clone();
        default_tokens.extend(spec.default_tokens);

        Self {
            name: name.into(),
            verb: spec.verb,
            url: format!("{}{}", config.base_url(), spec.path),
            path: spec.path,
            expected: spec.expected,
            default_params,
            default_tokens,
            object_method: spec.object_method,
            singleton: spec.singleton,
            data: spec.data,
            binding,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// The path template, e.g. `/users/:id`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Base URL joined with the (unresolved) path template.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Accepted status codes.
    pub fn expected(&self) -> &[u16] {
        &self.expected
    }

    pub fn default_params(&self) -> &Map<String, Value> {
        &self.default_params
    }

    pub fn default_tokens(&self) -> &Map<String, Value> {
        &self.default_tokens
    }

    /// Whether the method is also exposed on model instances.
    pub fn is_object_method(&self) -> bool {
        self.object_method
    }

    /// Whether the response represents exactly one resource.
    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    /// Token names in the path template, in order of appearance.
    pub fn path_tokens(&self) -> Vec<String> {
        TOKEN_RE
            .captures_iter(&self.path)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    /// Debugging summary: connection details, credentials, URL template and
    /// the method definition.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&serde_json::json!({
            "scheme": self.config.scheme,
            "host": self.config.host,
            "port": self.config.port,
            "credentials": self.config.credentials,
            "url": self.url,
            "method_data": self.data,
        }))?)
    }

    /// Substitute tokens into the path template and prefix the base URL.
    fn resolve_url(&self, tokens: &Map<String, Value>) -> Result<String> {
        if let Some(missing) = self
            .path_tokens()
            .into_iter()
            .find(|token| !tokens.contains_key(token))
        {
            return Err(TinError::InvalidArguments {
                method: self.to_string(),
                token: missing,
                path: self.path.clone(),
            });
        }

        let path = TOKEN_RE.replace_all(&self.path, |caps: &Captures<'_>| {
            tokens
                .get(&caps[1])
                .map(scalar_to_string)
                .unwrap_or_else(|| caps[0].to_string())
        });
        Ok(format!("{}{}", self.config.base_url(), path))
    }

    /// Call the method.
    ///
    /// Issues one request per page until the pagination driver reports the
    /// aggregate complete, then shapes the result. A failed page abandons the
    /// whole call.
    ///
    /// # Errors
    ///
    /// - [`TinError::InvalidArguments`] before any request if a path token
    ///   has no value
    /// - [`TinError::ObjectNotFound`] on a 404, whatever the accepted set
    /// - [`TinError::UnexpectedStatus`] on any other status outside the
    ///   accepted set
    /// - [`TinError::ResponseDecode`] if a body is not JSON
    #[tracing::instrument(skip(self, client, call), fields(method = %self))]
    pub async fn invoke(&self, client: &TinClient, call: Call) -> Result<ApiResponse> {
        let Call {
            id,
            tokens: token_overrides,
            params: param_overrides,
            body,
        } = call;

        let mut tokens = self.default_tokens.clone();
        tokens.extend(token_overrides);
        if let Some(id) = id {
            tokens.insert("id".to_string(), id);
        }
        let mut params = self.default_params.clone();
        params.extend(param_overrides);

        let url = self.resolve_url(&tokens)?;
        let params: BTreeMap<String, String> = params
            .iter()
            .map(|(k, v)| (k.clone(), scalar_to_string(v)))
            .collect();

        let http = client.http()?;
        let auth = client.auth();
        let driver = PaginationDriver::from_config(self.config.pagination.as_ref());
        let mut pending = PendingRequest::new(url, params);
        let mut running: Option<Value> = None;

        let (aggregated, last) = loop {
            let mut request = http
                .request(self.verb.as_method(), pending.url.as_str())
                .query(&pending.params)
                .headers(client.header_map()?);
            if self.verb.carries_body() {
                if let Some(body) = &body {
                    request = request.json(body);
                }
            }
            let mut request = auth.authenticate(request).build()?;
            collapse_headers(request.headers_mut());

            tracing::debug!(verb = %self.verb, url = %pending.url, "issuing request");
            let (page, meta) = self.read_page(http.execute(request).await?).await?;

            let current = record_count(&page);
            let merged = aggregate(running.take(), page);
            let counts = PageCounts {
                current,
                total: record_count(&merged),
            };
            running = Some(merged);

            if driver.advance(&meta, counts, &mut pending)? == PageState::Done {
                break (running.take().unwrap_or(Value::Null), meta);
            }
        };

        Ok(shape(aggregated, last, &self.binding, self.singleton))
    }

    async fn read_page(&self, response: Response) -> Result<(Value, ResponseMeta)> {
        let meta = ResponseMeta::from_response(&response);
        let text = response.text().await?;

        if meta.status == 404 {
            return Err(TinError::ObjectNotFound {
                url: meta.url,
                body: text,
            });
        }
        if !self.expected.contains(&meta.status) {
            return Err(TinError::UnexpectedStatus {
                url: meta.url,
                status: meta.status,
                expected: self.expected.clone(),
                body: text,
            });
        }

        if text.trim().is_empty() && NO_CONTENT.contains(&meta.status) {
            return Ok((Value::Null, meta));
        }
        match serde_json::from_str(&text) {
            Ok(page) => Ok((page, meta)),
            Err(_) => Err(TinError::ResponseDecode {
                url: meta.url,
                raw: text,
            }),
        }
    }
}

/// Keep only the last value of each header: authenticator headers replace
/// configured ones of the same name.
fn collapse_headers(headers: &mut HeaderMap) {
    let names: Vec<HeaderName> = headers.keys().cloned().collect();
    for name in names {
        if let Some(last) = headers.get_all(&name).iter().last().cloned() {
            headers.insert(name, last);
        }
    }
}

// The shared config carries credentials; keep it out of debug output.
impl fmt::Debug for EndpointMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointMethod")
            .field("name", &self.name)
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for EndpointMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.binding.obj_path {
            Some(obj_path) => write!(f, "{}.{}.{}", self.config.api_name, obj_path, self.name),
            None => write!(f, "{}.{}", self.config.api_name, self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verb_parsing() {
        assert_eq!("get".parse::<Verb>().unwrap(), Verb::Get);
        assert_eq!("DELETE".parse::<Verb>().unwrap(), Verb::Delete);
        assert!("TRACE".parse::<Verb>().is_err());
        assert!(Verb::Delete.carries_body());
        assert!(!Verb::Options.carries_body());
    }

    #[test]
    fn test_expected_status_forms() {
        assert_eq!(parse_expected("m", None).unwrap(), vec![200]);
        assert_eq!(parse_expected("m", Some(&json!(201))).unwrap(), vec![201]);
        assert_eq!(parse_expected("m", Some(&json!([200, "204"]))).unwrap(), vec![200, 204]);
        assert_eq!(
            parse_expected("m", Some(&json!({"200": "ok", "202": "accepted"}))).unwrap(),
            vec![200, 202]
        );
        assert!(parse_expected("m", Some(&json!("abc"))).is_err());
        assert!(parse_expected("m", Some(&json!(70000))).is_err());
    }

    #[test]
    fn test_spec_requires_method_and_path() {
        let err = MethodSpec::parse("things.get", &json!({"path": "/x"})).unwrap_err();
        assert!(matches!(err, TinError::Config(ref m) if m.contains("things.get") && m.contains("'method'")));

        let err = MethodSpec::parse("things.get", &json!({"method": "GET"})).unwrap_err();
        assert!(matches!(err, TinError::Config(ref m) if m.contains("'path'")));
    }

    #[test]
    fn test_spec_flags_and_defaults() {
        let spec = MethodSpec::parse(
            "things.get",
            &json!({
                "method": "get",
                "path": "/things/:id",
                "singleton": true,
                "object_method": true,
                "default_params": {"expand": "all"},
            }),
        )
        .unwrap();
        assert!(spec.singleton);
        assert!(spec.object_method);
        assert_eq!(spec.default_params["expand"], "all");
        assert!(spec.default_tokens.is_empty());
    }

    #[test]
    fn test_collapse_headers_keeps_last_value() {
        let mut headers = HeaderMap::new();
        headers.append("authorization", "placeholder".parse().unwrap());
        headers.append("Authorization", "Token real".parse().unwrap());
        headers.insert("accept", "application/json".parse().unwrap());

        collapse_headers(&mut headers);

        let values: Vec<_> = headers.get_all("authorization").iter().collect();
        assert_eq!(values, vec!["Token real"]);
        assert_eq!(headers["accept"], "application/json");
    }

    #[test]
    fn test_call_id_overrides_token() {
        let call = Call::new().id(7).token("id", 3);
        assert_eq!(call.tokens["id"], json!(3));
        assert_eq!(call.id, Some(json!(7)));
    }
}
