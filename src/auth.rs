//! Authentication strategies.
//!
//! An [`Authenticator`] decorates a pending request with credentials. The
//! client resolves one from the configuration at construction time; it can
//! be replaced at any point with [`TinClient::set_auth`](crate::TinClient::set_auth).

use std::collections::BTreeMap;
use std::fmt;

use reqwest::RequestBuilder;
use serde_json::Value;

use crate::config::{scalar_to_string, AuthType};
use crate::error::{Result, TinError};

/// Decorate an outgoing request with credentials.
pub trait Authenticator: Send + Sync + fmt::Debug {
    /// Return the request with credentials attached.
    fn authenticate(&self, request: RequestBuilder) -> RequestBuilder;
}

/// The built-in authentication strategies.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// No credentials.
    None,
    /// HTTP basic credentials.
    Basic {
        username: String,
        password: Option<String>,
    },
    /// Headers merged into every request.
    Header(BTreeMap<String, String>),
    /// Query parameters merged into every request.
    Param(BTreeMap<String, String>),
}

impl AuthStrategy {
    /// Select a strategy from the configured auth type and credentials.
    ///
    /// # Errors
    ///
    /// Returns [`TinError::Config`] if the credentials do not have the shape
    /// the auth type needs.
    pub fn from_config(auth_type: AuthType, credentials: Option<&Value>) -> Result<Self> {
        match auth_type {
            AuthType::None => Ok(Self::None),
            AuthType::Basic => {
                let creds = credentials.and_then(Value::as_object).ok_or_else(|| {
                    TinError::Config("basic auth requires username/password credentials".to_string())
                })?;
                let username = creds
                    .get("username")
                    .map(scalar_to_string)
                    .ok_or_else(|| TinError::Config("basic auth requires a username".to_string()))?;
                Ok(Self::Basic {
                    username,
                    password: creds.get("password").map(scalar_to_string),
                })
            }
            AuthType::Header => Ok(Self::Header(credential_map(auth_type, credentials)?)),
            AuthType::Param => Ok(Self::Param(credential_map(auth_type, credentials)?)),
        }
    }

    /// The auth type this strategy implements.
    pub fn auth_type(&self) -> AuthType {
        match self {
            Self::None => AuthType::None,
            Self::Basic { .. } => AuthType::Basic,
            Self::Header(_) => AuthType::Header,
            Self::Param(_) => AuthType::Param,
        }
    }
}

fn credential_map(auth_type: AuthType, credentials: Option<&Value>) -> Result<BTreeMap<String, String>> {
    let creds = credentials.and_then(Value::as_object).ok_or_else(|| {
        TinError::Config(format!("{auth_type:?} auth requires a mapping of credentials"))
    })?;
    Ok(creds
        .iter()
        .map(|(k, v)| (k.clone(), scalar_to_string(v)))
        .collect())
}

impl Authenticator for AuthStrategy {
    fn authenticate(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::None => request,
            Self::Basic { username, password } => request.basic_auth(username, password.as_ref()),
            Self::Header(headers) => headers
                .iter()
                .fold(request, |request, (name, value)| request.header(name.as_str(), value.as_str())),
            Self::Param(params) => request.query(params),
        }
    }
}

// Credentials never appear in debug output.
impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("AuthStrategy::None"),
            Self::Basic { username, .. } => f
                .debug_struct("AuthStrategy::Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Header(headers) => f
                .debug_tuple("AuthStrategy::Header")
                .field(&headers.keys().collect::<Vec<_>>())
                .finish(),
            Self::Param(params) => f
                .debug_tuple("AuthStrategy::Param")
                .field(&params.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_from_config() {
        let creds = json!({"username": "fakeuser", "password": "fakepassword"});
        let auth = AuthStrategy::from_config(AuthType::Basic, Some(&creds)).unwrap();
        assert_eq!(
            auth,
            AuthStrategy::Basic {
                username: "fakeuser".to_string(),
                password: Some("fakepassword".to_string()),
            }
        );
        assert_eq!(auth.auth_type(), AuthType::Basic);
    }

    #[test]
    fn test_basic_requires_username() {
        let creds = json!({"password": "x"});
        assert!(AuthStrategy::from_config(AuthType::Basic, Some(&creds)).is_err());
        assert!(AuthStrategy::from_config(AuthType::Basic, None).is_err());
    }

    #[test]
    fn test_header_and_param_from_config() {
        let creds = json!({"X-Api-Key": "secret", "version": 2});
        let header = AuthStrategy::from_config(AuthType::Header, Some(&creds)).unwrap();
        let param = AuthStrategy::from_config(AuthType::Param, Some(&creds)).unwrap();

        let expected = BTreeMap::from([
            ("X-Api-Key".to_string(), "secret".to_string()),
            ("version".to_string(), "2".to_string()),
        ]);
        assert_eq!(header, AuthStrategy::Header(expected.clone()));
        assert_eq!(param, AuthStrategy::Param(expected));
    }

    #[test]
    fn test_plain_string_credentials_rejected_for_header() {
        let creds = json!("token");
        assert!(AuthStrategy::from_config(AuthType::Header, Some(&creds)).is_err());
    }

    #[test]
    fn test_none_ignores_credentials() {
        let auth = AuthStrategy::from_config(AuthType::None, Some(&json!("whatever"))).unwrap();
        assert_eq!(auth, AuthStrategy::None);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let auth = AuthStrategy::Basic {
            username: "user".to_string(),
            password: Some("hunter2".to_string()),
        };
        let debug = format!("{auth:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));

        let auth = AuthStrategy::Header(BTreeMap::from([("X-Key".to_string(), "s3cret".to_string())]));
        assert!(!format!("{auth:?}").contains("s3cret"));
    }
}
