//! Shared fixtures for integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use tin::{ResolvedConfig, TinClient};
use url::Url;
use wiremock::MockServer;

/// Endpoint definitions used across the integration tests.
pub fn endpoints() -> Value {
    json!({
        "users": {
            "model": "User",
            "response_single_path": "user",
            "methods": {
                "list": {"method": "GET", "path": "/users"},
                "get": {"method": "GET", "path": "/users/:id", "singleton": true, "object_method": true},
                "create": {"method": "POST", "path": "/users", "return": [201], "singleton": true, "object_method": true},
                "update": {"method": "PUT", "path": "/users/:id", "singleton": true, "object_method": true},
                "delete": {"method": "DELETE", "path": "/users/:id", "return": 204, "object_method": true},
                "lookup": {"method": "GET", "path": "/users/:id/lookup", "return": [200, 404]}
            }
        },
        "orgs": {
            "members": {
                "model": "User",
                "response_list_path": "members",
                "methods": {
                    "list": {"method": "GET", "path": "/orgs/:org/members"}
                }
            }
        },
        "things": {
            "methods": {
                "search": {"method": "GET", "path": "/things", "default_params": {"per_page": 2}},
                "parts": {"method": "GET", "path": "/things/:identifier/parts/:id"}
            }
        },
        "status": {
            "methods": {
                "ping": {"method": "GET", "path": "/status"}
            }
        }
    })
}

/// Configuration data pointing at the mock server, with `extra` merged on top.
pub fn config_data(server: &MockServer, extra: Value) -> Value {
    let uri = Url::parse(&server.uri()).expect("mock server URI");
    let mut data = json!({
        "api_name": "testapi",
        "scheme": uri.scheme(),
        "host": uri.host_str().expect("host"),
        "port": uri.port_or_known_default().expect("port"),
        "models": {
            "User": {
                "must": ["name"],
                "read": ["created_at"],
                "methods": {"read": "get"}
            }
        },
        "endpoints": endpoints(),
    });
    if let (Value::Object(base), Value::Object(extra)) = (&mut data, extra) {
        base.extend(extra);
    }
    data
}

/// Client pointing at the mock server.
pub fn client(server: &MockServer, extra: Value) -> TinClient {
    let config = ResolvedConfig::from_value(config_data(server, extra), None, None)
        .expect("valid config");
    TinClient::new(config).expect("client")
}
