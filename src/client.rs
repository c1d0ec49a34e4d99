//! The API client.
//!
//! Owns the resolved configuration, the endpoint tree, the default headers
//! and the authentication strategy. Methods are invoked through it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;

use crate::auth::{AuthStrategy, Authenticator};
use crate::config::{merge_header, ResolvedConfig};
use crate::error::{Result, TinError};
use crate::method::{Call, EndpointMethod};
use crate::response::ApiResponse;
use crate::tree::{EndpointNode, TreeBuilder};

const USER_AGENT: &str = concat!("tin/", env!("CARGO_PKG_VERSION"));

/// A configured REST API client.
///
/// This struct is cheaply cloneable; clones share the endpoint tree and,
/// with `use_session` enabled, the underlying connection pool. Headers and
/// the authenticator are per clone.
///
/// # Example
///
/// ```no_run
/// use tin::{Call, TinClient};
///
/// # async fn example() -> tin::Result<()> {
/// let client = TinClient::from_file("github.yml", Some("production"))?;
///
/// let user = client
///     .call("users.get", Call::new().id("octocat"))
///     .await?;
/// println!("{:?}", user.model());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TinClient {
    config: Arc<ResolvedConfig>,
    session: Option<Client>,
    headers: BTreeMap<String, String>,
    auth: Arc<dyn Authenticator>,
    root: Arc<EndpointNode>,
}

impl fmt::Debug for TinClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TinClient")
            .field("api", &self.config.api_name)
            .field("base_url", &self.config.base_url())
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl TinClient {
    /// Build a client from a resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint tree is malformed, the credentials
    /// don't fit the auth type, or the HTTP client cannot be built.
    pub fn new(config: ResolvedConfig) -> Result<Self> {
        let config = Arc::new(config);
        let root = TreeBuilder::new(Arc::clone(&config)).build()?;
        let auth = AuthStrategy::from_config(config.auth_type, config.credentials.as_ref())?;
        let session = if config.use_session {
            Some(build_http(&config)?)
        } else {
            None
        };

        tracing::debug!(
            api = %config.api_name,
            base_url = %config.base_url(),
            auth = ?config.auth_type,
            "client ready"
        );

        Ok(Self {
            headers: config.headers.clone(),
            config,
            session,
            auth: Arc::new(auth),
            root: Arc::new(root),
        })
    }

    /// Load the configuration from a file and build a client.
    ///
    /// # Errors
    ///
    /// See [`ResolvedConfig::from_file`] and [`TinClient::new`].
    pub fn from_file(path: impl AsRef<Path>, environment: Option<&str>) -> Result<Self> {
        Self::new(ResolvedConfig::from_file(path, environment)?)
    }

    /// Load the configuration from `TIN_CONFIG`, `TIN_ENV` and `TIN__...`
    /// variables and build a client.
    ///
    /// # Errors
    ///
    /// See [`ResolvedConfig::from_env`] and [`TinClient::new`].
    pub fn from_env() -> Result<Self> {
        Self::new(ResolvedConfig::from_env()?)
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// The root of the endpoint tree.
    pub fn root(&self) -> &EndpointNode {
        &self.root
    }

    /// Look up a node by dotted path.
    pub fn node(&self, path: &str) -> Result<&EndpointNode> {
        self.root.descend(path)
    }

    /// Look up a method by dotted path, e.g. `orgs.members.list`.
    ///
    /// # Errors
    ///
    /// Returns [`TinError::UnknownEndpoint`] if no such method exists.
    pub fn endpoint(&self, path: &str) -> Result<&EndpointMethod> {
        let (node, method) = match path.rsplit_once('.') {
            Some((node, method)) => (node, method),
            None => ("", path),
        };
        self.root
            .descend(node)
            .ok()
            .and_then(|node| node.method(method))
            .ok_or_else(|| TinError::UnknownEndpoint(path.to_string()))
    }

    /// Invoke the method at `path`.
    pub async fn call(&self, path: &str, call: Call) -> Result<ApiResponse> {
        self.endpoint(path)?.invoke(self, call).await
    }

    /// Names of the tree's nodes and methods. See [`EndpointNode::tree`].
    pub fn tree(&self) -> serde_json::Value {
        self.root.tree()
    }

    pub fn to_json(&self) -> Result<String> {
        self.root.to_json()
    }

    /// Headers sent with every request.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Merge headers into those sent with every subsequent request, or
    /// replace them entirely when `replace` is set.
    pub fn set_headers<I, K, V>(&mut self, headers: I, replace: bool)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if replace {
            self.headers.clear();
        }
        for (name, value) in headers {
            merge_header(&mut self.headers, name.into(), value.into());
        }
    }

    /// The configured headers as a request header map.
    ///
    /// # Errors
    ///
    /// Returns [`TinError::Config`] if a name or value is not a valid header.
    pub(crate) fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TinError::Config(format!("invalid header name '{name}'")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| TinError::Config(format!("invalid value for header '{name}'")))?;
            map.insert(header, value);
        }
        Ok(map)
    }

    pub fn auth(&self) -> Arc<dyn Authenticator> {
        Arc::clone(&self.auth)
    }

    /// Replace the authentication strategy for subsequent requests.
    pub fn set_auth(&mut self, auth: impl Authenticator + 'static) {
        self.auth = Arc::new(auth);
    }

    /// The HTTP client for the next request: the shared session, or a
    /// fresh client when sessions are disabled.
    pub(crate) fn http(&self) -> Result<Client> {
        match &self.session {
            Some(session) => Ok(session.clone()),
            None => build_http(&self.config),
        }
    }
}

fn build_http(config: &ResolvedConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .brotli(true)
        .gzip(true)
        .deflate(true)
        .danger_accept_invalid_certs(!config.ssl.verify);
    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}
