//! Resolved API configuration.
//!
//! A [`ResolvedConfig`] is everything the endpoint tree and the request
//! engine need to know about a remote API: where it lives, how to
//! authenticate, how it paginates, and the endpoint/model definitions.
//!
//! Configuration files may be YAML or JSON and come in two layouts.
//! Multi-environment:
//!
//! ```yaml
//! common:
//!   api_file: myapi-api.yml
//! environments:
//!   staging:
//!     host: staging.example.com
//! ```
//!
//! or single-environment, with every key at the top level. After loading,
//! environment variables of the form `TIN__<SEGMENT>__<KEY>` override nested
//! keys. In multi-environment configs the first segment is an environment
//! name or `COMMON`.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TinError};
use crate::model::ModelDefinition;

/// Default content type for requests and accepted responses.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

const ENV_CONFIG: &str = "TIN_CONFIG";
const ENV_ENVIRONMENT: &str = "TIN_ENV";
const ENV_OVERRIDE_PREFIX: &str = "TIN__";

/// How requests are authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    /// No credentials are attached.
    #[default]
    None,
    /// HTTP basic auth from a username/password pair.
    Basic,
    /// Credentials are merged into the request headers.
    Header,
    /// Credentials are merged into the query parameters.
    Param,
}

/// Which running count is written into the next request when paginating
/// by header count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageValue {
    /// Number of records on the page just fetched.
    Current,
    /// Number of records fetched so far.
    Total,
}

/// Where the pagination value goes in the next request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PageTarget {
    /// Set this query parameter.
    Param(String),
    /// Append a path segment rendered from this template (`%s`, `%d` or `{}`).
    Path(String),
}

/// Pagination style of the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPagination")]
pub enum PaginationConfig {
    /// A response header carries the total record count.
    HeaderCount {
        header: String,
        value: PageValue,
        target: PageTarget,
    },
    /// Follow `Link: <...>; rel="next"` headers.
    Link,
}

#[derive(Debug, Deserialize)]
struct RawPagination {
    #[serde(rename = "type")]
    kind: String,
    header: Option<String>,
    value: Option<PageValue>,
    param: Option<String>,
    path: Option<String>,
}

impl TryFrom<RawPagination> for PaginationConfig {
    type Error = String;

    fn try_from(raw: RawPagination) -> core::result::Result<Self, Self::Error> {
        match raw.kind.as_str() {
            "link" => Ok(Self::Link),
            "header_count" => {
                let header = raw
                    .header
                    .ok_or("header_count pagination requires 'header'")?;
                let value = raw.value.ok_or("header_count pagination requires 'value'")?;
                let target = match (raw.param, raw.path) {
                    (Some(param), _) => PageTarget::Param(param),
                    (None, Some(path)) => PageTarget::Path(path),
                    (None, None) => {
                        return Err("header_count pagination requires 'param' or 'path'".into())
                    }
                };
                Ok(Self::HeaderCount {
                    header,
                    value,
                    target,
                })
            }
            other => Err(format!("unknown pagination type '{other}'")),
        }
    }
}

/// TLS options passed through to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslConfig {
    /// Verify server certificates.
    #[serde(default = "default_true")]
    pub verify: bool,
}

impl Default for SslConfig {
    fn default() -> Self {
        Self { verify: true }
    }
}

fn default_true() -> bool {
    true
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_port() -> u16 {
    443
}

/// Settings as they appear in the merged configuration data.
#[derive(Debug, Deserialize)]
struct Settings {
    api_name: Option<String>,
    #[serde(default = "default_scheme")]
    scheme: String,
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    basepath: String,
    content_type: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default, alias = "authtype")]
    auth_type: AuthType,
    credentials: Option<Value>,
    #[serde(default)]
    default_params: Map<String, Value>,
    #[serde(default)]
    default_tokens: Map<String, Value>,
    pagination: Option<PaginationConfig>,
    #[serde(default = "default_true")]
    use_session: bool,
    #[serde(default)]
    ssl: SslConfig,
    timeout_secs: Option<u64>,
    endpoints: Option<Map<String, Value>>,
    api_file: Option<String>,
    models: Option<BTreeMap<String, ModelDefinition>>,
    model_file: Option<String>,
}

/// Fully resolved configuration for one API environment.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Name of the API, used as the prefix of method names.
    pub api_name: String,
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Path prefix shared by every endpoint (e.g. `/api`).
    pub basepath: String,
    /// Default headers sent with every request.
    pub headers: BTreeMap<String, String>,
    pub auth_type: AuthType,
    /// Credentials whose shape depends on `auth_type`.
    pub credentials: Option<Value>,
    /// Query parameters applied to every method.
    pub default_params: Map<String, Value>,
    /// Path tokens applied to every method.
    pub default_tokens: Map<String, Value>,
    /// Pagination style; `None` means link-based.
    pub pagination: Option<PaginationConfig>,
    /// Reuse one pooled HTTP client for every request.
    pub use_session: bool,
    pub ssl: SslConfig,
    /// Request timeout passed through to the transport.
    pub timeout_secs: Option<u64>,
    /// Nested endpoint definitions.
    pub endpoint_tree: Map<String, Value>,
    /// Model definitions by name.
    pub models: BTreeMap<String, ModelDefinition>,
}

impl ResolvedConfig {
    /// Load configuration from a YAML or JSON file.
    ///
    /// Relative `api_file`, `model_file` and credential paths are resolved
    /// against the file's directory first, then the working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or the
    /// resulting configuration is incomplete.
    pub fn from_file(path: impl AsRef<Path>, environment: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let path = find_file(&path.to_string_lossy(), None)
            .ok_or_else(|| TinError::Config(format!("config file not found: {}", path.display())))?;

        let mut data = load_file(&path)?;
        apply_env_overrides(&mut data, environment, env::vars());

        tracing::info!(
            config = %path.display(),
            environment = environment.unwrap_or("default (none)"),
            "loading API configuration"
        );

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned());
        Self::resolve(data, environment, path.parent(), stem)
    }

    /// Load configuration from the process environment.
    ///
    /// `TIN_CONFIG` is either a path to a config file or the configuration
    /// itself as JSON or YAML; `TIN_ENV` selects the environment. Individual
    /// `TIN__...` variables are applied on top, so a configuration can be
    /// built entirely from variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration is empty or incomplete.
    pub fn from_env() -> Result<Self> {
        let environment = env::var(ENV_ENVIRONMENT).ok();

        if let Ok(config) = env::var(ENV_CONFIG) {
            if Path::new(&config).is_file() {
                return Self::from_file(&config, environment.as_deref());
            }
        }

        let mut data = env::var(ENV_CONFIG)
            .ok()
            .and_then(|inline| parse_inline(&inline))
            .unwrap_or_else(|| Value::Object(Map::new()));
        apply_env_overrides(&mut data, environment.as_deref(), env::vars());

        tracing::info!(
            environment = environment.as_deref().unwrap_or("default (none)"),
            "loading API configuration from environment"
        );

        Self::resolve(data, environment.as_deref(), None, None)
    }

    /// Build configuration from already-parsed data.
    ///
    /// Environment variable overrides are not applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is empty or incomplete.
    pub fn from_value(data: Value, environment: Option<&str>, base_dir: Option<&Path>) -> Result<Self> {
        Self::resolve(data, environment, base_dir, None)
    }

    /// Scheme, host, port and base path joined into a URL prefix.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.basepath)
    }

    fn resolve(
        data: Value,
        environment: Option<&str>,
        base_dir: Option<&Path>,
        fallback_name: Option<String>,
    ) -> Result<Self> {
        let Value::Object(data) = data else {
            return Err(TinError::Config("configuration must be a mapping".to_string()));
        };
        if data.is_empty() {
            return Err(TinError::Config("empty config".to_string()));
        }

        let mut merged = defaults();
        match (environment, data.get("environments")) {
            (None, Some(_)) => {
                return Err(TinError::Config(
                    "environment-based config but no environment selected".to_string(),
                ))
            }
            (Some(env), Some(environments)) => {
                let env_data = environments.get(env).ok_or_else(|| {
                    TinError::Config(format!("environment set but not found in config: {env}"))
                })?;
                if let Some(common) = data.get("common") {
                    deep_merge(&mut merged, common.clone());
                }
                deep_merge(&mut merged, env_data.clone());
            }
            (Some(env), None) => {
                return Err(TinError::Config(format!(
                    "environment '{env}' selected but config has no environments"
                )))
            }
            (None, None) => deep_merge(&mut merged, Value::Object(data)),
        }

        let settings: Settings = serde_json::from_value(merged)
            .map_err(|e| TinError::Config(format!("invalid settings: {e}")))?;

        let content_type = settings
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let mut headers = BTreeMap::from([
            ("Content-type".to_string(), content_type.clone()),
            ("Accept".to_string(), content_type),
        ]);
        for (name, value) in settings.headers {
            merge_header(&mut headers, name, value);
        }

        let credentials = resolve_credentials(settings.auth_type, settings.credentials, base_dir)?;

        let endpoint_tree = match (settings.endpoints, settings.api_file) {
            (Some(endpoints), _) => endpoints,
            (None, Some(api_file)) => load_endpoint_file(&api_file, base_dir)?,
            (None, None) => {
                return Err(TinError::Config(
                    "no endpoint definitions: set 'endpoints' or 'api_file'".to_string(),
                ))
            }
        };

        let models = match (settings.models, settings.model_file) {
            (Some(models), _) => models,
            (None, Some(model_file)) => {
                let path = require_file(&model_file, base_dir)?;
                serde_json::from_value(load_file(&path)?)
                    .map_err(|e| TinError::Config(format!("invalid model file {model_file}: {e}")))?
            }
            (None, None) => BTreeMap::new(),
        };

        Ok(Self {
            api_name: settings
                .api_name
                .or(fallback_name)
                .unwrap_or_else(|| "api".to_string()),
            scheme: settings.scheme,
            host: settings.host,
            port: settings.port,
            basepath: settings.basepath,
            headers,
            auth_type: settings.auth_type,
            credentials,
            default_params: settings.default_params,
            default_tokens: settings.default_tokens,
            pagination: settings.pagination,
            use_session: settings.use_session,
            ssl: settings.ssl,
            timeout_secs: settings.timeout_secs,
            endpoint_tree,
            models,
        })
    }
}

fn defaults() -> Value {
    serde_json::json!({
        "scheme": "https",
        "port": 443,
        "use_session": true,
        "ssl": { "verify": true },
    })
}

fn resolve_credentials(
    auth_type: AuthType,
    raw: Option<Value>,
    base_dir: Option<&Path>,
) -> Result<Option<Value>> {
    if auth_type == AuthType::None {
        return Ok(None);
    }
    match raw {
        Some(Value::String(s)) => match find_file(&s, base_dir) {
            Some(path) => load_file(&path).map(Some),
            // Not a file: inline JSON/YAML, or an opaque credential string.
            None => Ok(Some(parse_inline(&s).unwrap_or(Value::String(s)))),
        },
        other => Ok(other),
    }
}

fn load_endpoint_file(api_file: &str, base_dir: Option<&Path>) -> Result<Map<String, Value>> {
    let path = require_file(api_file, base_dir)?;
    match load_file(&path)? {
        Value::Object(mut tree) => match tree.remove("classes") {
            Some(Value::Object(classes)) => Ok(classes),
            Some(_) => Err(TinError::Config(format!(
                "'classes' in {api_file} must be a mapping"
            ))),
            None => Ok(tree),
        },
        _ => Err(TinError::Config(format!("{api_file} must contain a mapping"))),
    }
}

/// Locate a file: absolute paths as-is, relative paths against `base_dir`
/// first and then the working directory. A leading `~/` expands to `$HOME`.
fn find_file(name: &str, base_dir: Option<&Path>) -> Option<PathBuf> {
    let expanded = match (name.strip_prefix("~/"), env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(name),
    };

    if expanded.is_absolute() {
        return expanded.is_file().then_some(expanded);
    }

    if let Some(dir) = base_dir {
        let candidate = dir.join(&expanded);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    expanded.is_file().then_some(expanded)
}

fn require_file(name: &str, base_dir: Option<&Path>) -> Result<PathBuf> {
    find_file(name, base_dir).ok_or_else(|| TinError::Config(format!("file not found: {name}")))
}

/// Parse a file as YAML or JSON based on its extension.
pub(crate) fn load_file(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yml") | Some("yaml") => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(&content)?;
            Ok(yaml_to_json(yaml))
        }
        Some("json") => Ok(serde_json::from_str(&content)?),
        _ => Err(TinError::Config(format!(
            "unsupported config file type: {}",
            path.display()
        ))),
    }
}

/// Parse inline data as JSON, falling back to YAML. Only mappings count;
/// a plain string that happens to be valid YAML is not configuration.
fn parse_inline(data: &str) -> Option<Value> {
    let parsed = serde_json::from_str::<Value>(data)
        .ok()
        .or_else(|| serde_yaml::from_str::<serde_yaml::Value>(data).ok().map(yaml_to_json))?;
    parsed.is_object().then_some(parsed)
}

/// Convert YAML into JSON, stringifying non-string mapping keys
/// (e.g. `return: {200: ok}`).
fn yaml_to_json(yaml: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64().map(Value::from).unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(k, v)| {
                    let key = match yaml_to_json(k) {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (key, yaml_to_json(v))
                })
                .collect(),
        ),
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

/// Insert a header, replacing any existing entry whose name matches
/// case-insensitively.
pub(crate) fn merge_header(
    headers: &mut BTreeMap<String, String>,
    name: String,
    value: String,
) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
    headers.insert(name, value);
}

/// Recursively merge `other` into `base`: mappings merge per key, sequences
/// are concatenated, anything else is replaced.
pub(crate) fn deep_merge(base: &mut Value, other: Value) {
    match (base, other) {
        (Value::Object(base), Value::Object(other)) => {
            for (key, value) in other {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(base), Value::Array(other)) => base.extend(other),
        (base, other) => *base = other,
    }
}

/// Apply `TIN__A__B=value` variables as overrides of nested key `a.b`.
pub(crate) fn apply_env_overrides<I>(data: &mut Value, environment: Option<&str>, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    if !data.is_object() {
        *data = Value::Object(Map::new());
    }
    let multi_environment = data.get("environments").is_some();

    for (name, raw) in vars {
        let Some(rest) = name.strip_prefix(ENV_OVERRIDE_PREFIX) else {
            continue;
        };
        let mut parts: Vec<String> = rest.split("__").map(str::to_lowercase).collect();
        if parts.iter().any(String::is_empty) {
            continue;
        }

        if multi_environment {
            match environment {
                _ if parts[0] == "common" => {}
                Some(env) if parts[0] == env.to_lowercase() => {
                    parts[0] = env.to_string();
                    parts.insert(0, "environments".to_string());
                }
                _ => continue,
            }
        }

        tracing::debug!(variable = %name, "applying environment override");
        let patch = parts.into_iter().rev().fold(parse_scalar(&raw), |acc, key| {
            let mut layer = Map::new();
            layer.insert(key, acc);
            Value::Object(layer)
        });
        deep_merge(data, patch);
    }
}

/// Interpret a variable's value as a YAML scalar so `5000` and `true`
/// keep their types.
fn parse_scalar(raw: &str) -> Value {
    match serde_yaml::from_str::<serde_yaml::Value>(raw) {
        Ok(yaml @ (serde_yaml::Value::Bool(_) | serde_yaml::Value::Number(_))) => yaml_to_json(yaml),
        _ => Value::String(raw.to_string()),
    }
}

/// Render a parameter or token value for use in a URL.
pub(crate) fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
