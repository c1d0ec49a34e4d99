//! Configuration-driven REST API client.
//!
//! Describe a REST API once, as data: where it lives, how it authenticates,
//! how it paginates, and a nested tree of endpoints with their methods and
//! models. `tin` turns that description into a navigable tree of callable
//! methods and executes them, shaping JSON responses into models.
//!
//! # Quick Start
//!
//! ```no_run
//! use tin::{Call, TinClient};
//!
//! #[tokio::main]
//! async fn main() -> tin::Result<()> {
//!     // Load `myapi.yml` and select its `staging` environment
//!     let client = TinClient::from_file("myapi.yml", Some("staging"))?;
//!
//!     // Fetch a single resource; a bound model wraps the result
//!     let user = client.call("users.get", Call::new().id(42)).await?;
//!     if let Some(user) = user.model() {
//!         println!("{user}: {:?}", user.get("name"));
//!     }
//!
//!     // Fetch every page of a list
//!     let members = client
//!         .call("orgs.members.list", Call::new().token("org", "acme"))
//!         .await?;
//!     println!("{} members", members.models().len());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! ```yaml
//! api_name: myapi
//! host: api.example.com
//! basepath: /v1
//! authtype: header
//! credentials:
//!   X-Api-Key: secret
//! pagination:
//!   type: header_count
//!   header: X-Total-Count
//!   value: total
//!   param: offset
//! models:
//!   User:
//!     must: [name]
//!     read: [created_at]
//! endpoints:
//!   users:
//!     model: User
//!     methods:
//!       get: {method: GET, path: "/users/:id", singleton: true, object_method: true}
//!       list: {method: GET, path: /users}
//! ```
//!
//! [`TinClient::from_env`] reads the same configuration from `TIN_CONFIG`
//! and `TIN_ENV`, with `TIN__<KEY>` variables overriding individual keys.

mod auth;
mod client;
mod config;
mod error;
mod method;
mod model;
mod pagination;
mod response;
mod tree;

pub mod cli;
pub mod output;

// Re-export core types
pub use client::TinClient;
pub use error::{Result, TinError};

// Configuration
pub use config::{
    AuthType, PageTarget, PageValue, PaginationConfig, ResolvedConfig, SslConfig,
    DEFAULT_CONTENT_TYPE,
};

// Tree and methods
pub use method::{Call, EndpointMethod, Verb};
pub use tree::{EndpointNode, NodeBinding, TreeBuilder};

// Requests and responses
pub use auth::{AuthStrategy, Authenticator};
pub use pagination::{parse_link_header, PageCounts, PageState, PaginationDriver, PendingRequest};
pub use response::{ApiResponse, Body, Entry, ResponseMeta};

// Models
pub use model::{CrudMethods, Model, ModelDefinition, ModelType};
