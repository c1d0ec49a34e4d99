//! Output formatting for CLI display.
//!
//! Provides the [`PrettyPrint`] trait for human-readable output
//! as an alternative to JSON serialization.

use serde_json::Value;

use crate::{ApiResponse, Body, EndpointMethod, Entry, Model};

/// Trait for human-readable key-value output.
///
/// Implemented by result types to provide formatted output
/// suitable for terminal display when `--json` is not specified.
pub trait PrettyPrint {
    /// Returns a formatted string for terminal display.
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for Model {
    fn pretty_print(&self) -> String {
        let header = self.to_string();
        let width = self.data().keys().map(String::len).max().unwrap_or(0);
        let divider = "─".repeat(header.len().max(30));

        let mut lines = vec![header, divider];
        for (key, value) in self.data() {
            lines.push(format!("{:<width$}  {}", format!("{key}:"), scalar(value), width = width + 1));
        }
        lines.join("\n")
    }
}

impl PrettyPrint for Entry {
    fn pretty_print(&self) -> String {
        match self {
            Entry::Model(model) => model.pretty_print(),
            Entry::Value(value) => scalar(value),
            Entry::List(entries) => entries
                .iter()
                .map(PrettyPrint::pretty_print)
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

impl PrettyPrint for ApiResponse {
    fn pretty_print(&self) -> String {
        let mut out = match self.body() {
            Body::Single(entry) => entry.pretty_print(),
            Body::List(entries) => entries
                .iter()
                .map(PrettyPrint::pretty_print)
                .collect::<Vec<_>>()
                .join("\n\n"),
            Body::Mapping(fields) => fields
                .iter()
                .map(|(key, entry)| match entry {
                    Entry::List(_) => format!("{key}:\n{}", entry.pretty_print()),
                    _ => format!("{key}: {}", entry.pretty_print()),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Body::Scalar(value) => scalar(value),
        };

        let meta = self.response();
        if meta.status != 0 {
            out.push_str(&format!("\n\n{} {}", meta.status, meta.url));
        }
        out
    }
}

impl PrettyPrint for EndpointMethod {
    fn pretty_print(&self) -> String {
        let header = format!("Method: {self}");
        let divider = "─".repeat(header.len().max(30));

        let mut lines = vec![
            header,
            divider,
            format!("Verb:           {}", self.verb()),
            format!("URL:            {}", self.url()),
            format!(
                "Returns:        {}",
                self.expected()
                    .iter()
                    .map(u16::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ];

        let tokens = self.path_tokens();
        if !tokens.is_empty() {
            lines.push(format!("Tokens:         {}", tokens.join(", ")));
        }
        if !self.default_params().is_empty() {
            lines.push(format!("Default params: {}", Value::Object(self.default_params().clone())));
        }
        if self.is_singleton() {
            lines.push("Singleton:      yes".to_string());
        }
        if self.is_object_method() {
            lines.push("Object method:  yes".to_string());
        }

        lines.join("\n")
    }
}

/// Strings print bare; everything else as compact JSON.
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ResolvedConfig, TinClient};
    use serde_json::json;

    fn client() -> TinClient {
        let config = ResolvedConfig::from_value(
            json!({
                "api_name": "svc",
                "host": "api.example.com",
                "models": {"User": {}},
                "endpoints": {
                    "users": {
                        "model": "User",
                        "methods": {
                            "get": {"method": "GET", "path": "/users/:id", "singleton": true, "object_method": true}
                        }
                    }
                }
            }),
            None,
            None,
        )
        .unwrap();
        TinClient::new(config).unwrap()
    }

    #[test]
    fn test_method_pretty_print() {
        let client = client();
        let out = client.endpoint("users.get").unwrap().pretty_print();
        assert!(out.starts_with("Method: svc.users.get"));
        assert!(out.contains("https://api.example.com:443/users/:id"));
        assert!(out.contains("Tokens:         id"));
        assert!(out.contains("Singleton:      yes"));
    }

    #[test]
    fn test_model_pretty_print() {
        let client = client();
        let kind = client.node("users").unwrap().model().unwrap().clone();
        let data = json!({"id": 3, "name": "Ada"}).as_object().unwrap().clone();
        let user = Model::new(kind, data).unwrap();

        let out = user.pretty_print();
        assert!(out.starts_with("User(3)"));
        assert!(out.contains("name:  Ada"));
    }
}
