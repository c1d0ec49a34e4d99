//! Response shaping.
//!
//! The decoded JSON of a call is classified by its runtime type into one of
//! a closed set of shapes and, where the owning node has a bound model,
//! wrapped into [`Model`] instances.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::Response;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::{Model, ModelType};
use crate::pagination::parse_link_header;
use crate::tree::NodeBinding;

/// Transport metadata kept from the last response of a call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResponseMeta {
    /// Final URL of the request.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers with lowercase names; repeated headers are joined
    /// with `", "`.
    pub headers: BTreeMap<String, String>,
    /// `Link` header relations (`rel` to absolute URL).
    pub links: BTreeMap<String, String>,
}

impl ResponseMeta {
    pub(crate) fn from_response(response: &Response) -> Self {
        let mut headers = BTreeMap::new();
        for name in response.headers().keys() {
            let values: Vec<&str> = response
                .headers()
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect();
            headers.insert(name.as_str().to_string(), values.join(", "));
        }

        let links = headers
            .get("link")
            .map(|link| parse_link_header(link, Some(response.url())))
            .unwrap_or_default();

        Self {
            url: response.url().to_string(),
            status: response.status().as_u16(),
            headers,
            links,
        }
    }

    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// One element of a shaped response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entry {
    /// A model instance.
    Model(Model),
    /// A value left as decoded.
    Value(Value),
    /// A list of entries (the response list path of a mapping).
    List(Vec<Entry>),
}

impl Entry {
    pub fn as_model(&self) -> Option<&Model> {
        match self {
            Self::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Entry]> {
        match self {
            Self::List(entries) => Some(entries),
            _ => None,
        }
    }
}

/// The classified content of a response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Body {
    /// Result of a singleton method: exactly one resource.
    Single(Entry),
    /// The response was a JSON array.
    List(Vec<Entry>),
    /// The response was a JSON object.
    Mapping(BTreeMap<String, Entry>),
    /// The response was any other JSON value.
    Scalar(Value),
}

/// The shaped result of a method call.
///
/// The raw aggregate and the transport metadata are available regardless
/// of the shape.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    body: Body,
    raw: Value,
    response: ResponseMeta,
}

impl ApiResponse {
    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    /// The aggregated response payload before shaping.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Metadata of the last transport response.
    pub fn response(&self) -> &ResponseMeta {
        &self.response
    }

    /// The model of a singleton call, if one was built.
    pub fn model(&self) -> Option<&Model> {
        match &self.body {
            Body::Single(entry) => entry.as_model(),
            _ => None,
        }
    }

    pub fn into_model(self) -> Option<Model> {
        match self.body {
            Body::Single(Entry::Model(model)) => Some(model),
            _ => None,
        }
    }

    /// Entries of a list response.
    pub fn entries(&self) -> &[Entry] {
        match &self.body {
            Body::List(entries) => entries,
            _ => &[],
        }
    }

    /// Model instances of a list response, or of the list path of a
    /// mapping response.
    pub fn models(&self) -> Vec<&Model> {
        match &self.body {
            Body::List(entries) => entries.iter().filter_map(Entry::as_model).collect(),
            Body::Mapping(fields) => fields
                .values()
                .filter_map(Entry::as_list)
                .flatten()
                .filter_map(Entry::as_model)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The single resource record carried by this response, if any.
    pub(crate) fn record(&self) -> Option<Map<String, Value>> {
        match &self.body {
            Body::Single(Entry::Model(model)) => Some(model.data().clone()),
            Body::Single(Entry::Value(Value::Object(map))) => Some(map.clone()),
            _ => self.raw.as_object().cloned(),
        }
    }
}

impl Serialize for ApiResponse {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}

/// Classify and wrap an aggregated response.
pub(crate) fn shape(
    aggregate: Value,
    response: ResponseMeta,
    binding: &NodeBinding,
    singleton: bool,
) -> ApiResponse {
    let model = binding.model.as_ref();

    let body = if singleton {
        let payload = match (&binding.response_single_path, &aggregate) {
            (Some(key), Value::Object(map)) if map.contains_key(key) => map[key].clone(),
            _ => aggregate.clone(),
        };
        let entry = match (model, payload) {
            (Some(kind), Value::Object(data)) => Entry::Model(
                Model::from_remote(Arc::clone(kind), data)
                    .with_response(aggregate.clone(), response.clone()),
            ),
            (_, payload) => Entry::Value(payload),
        };
        Body::Single(entry)
    } else {
        match &aggregate {
            Value::Array(items) => Body::List(entries(model, items)),
            Value::Object(map) => {
                let mut fields: BTreeMap<String, Entry> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), Entry::Value(v.clone())))
                    .collect();
                if let Some(key) = &binding.response_list_path {
                    if let Some(Value::Array(items)) = map.get(key) {
                        fields.insert(key.clone(), Entry::List(entries(model, items)));
                    }
                }
                Body::Mapping(fields)
            }
            other => Body::Scalar(other.clone()),
        }
    };

    ApiResponse {
        body,
        raw: aggregate,
        response,
    }
}

fn entries(model: Option<&Arc<ModelType>>, items: &[Value]) -> Vec<Entry> {
    items
        .iter()
        .map(|item| match (model, item) {
            (Some(kind), Value::Object(data)) => {
                Entry::Model(Model::from_remote(Arc::clone(kind), data.clone()))
            }
            _ => Entry::Value(item.clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelDefinition;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn binding(model: bool, list_path: Option<&str>, single_path: Option<&str>) -> NodeBinding {
        NodeBinding {
            obj_path: Some("users".to_string()),
            model: model.then(|| {
                Arc::new(ModelType::new(
                    "User",
                    ModelDefinition::default(),
                    "users",
                    BTreeSet::new(),
                ))
            }),
            response_list_path: list_path.map(str::to_string),
            response_single_path: single_path.map(str::to_string),
        }
    }

    #[test]
    fn test_singleton_unwraps_single_path() {
        let aggregate = json!({"user": {"id": 7, "name": "x"}});
        let shaped = shape(aggregate.clone(), ResponseMeta::default(), &binding(true, None, Some("user")), true);

        let model = shaped.model().expect("model");
        assert_eq!(model.id(), Some(&json!(7)));
        assert_eq!(model.get("name"), Some(&json!("x")));
        assert_eq!(model.raw(), &aggregate);
        assert!(model.response().is_some());
    }

    #[test]
    fn test_singleton_without_single_path_uses_whole_payload() {
        let shaped = shape(json!({"id": 3}), ResponseMeta::default(), &binding(true, None, Some("user")), true);
        assert_eq!(shaped.model().unwrap().id(), Some(&json!(3)));
    }

    #[test]
    fn test_singleton_without_model_is_raw_payload() {
        let shaped = shape(json!({"user": {"id": 1}}), ResponseMeta::default(), &binding(false, None, Some("user")), true);
        assert_eq!(shaped.body(), &Body::Single(Entry::Value(json!({"id": 1}))));
    }

    #[test]
    fn test_list_is_mapped_through_model() {
        let shaped = shape(json!([{"id": 1}, {"id": 2}]), ResponseMeta::default(), &binding(true, None, None), false);
        assert_eq!(shaped.entries().len(), 2);
        assert_eq!(shaped.models().len(), 2);
    }

    #[test]
    fn test_mapping_replaces_only_list_path() {
        let aggregate = json!({"users": [{"id": 1}], "total": 1});
        let shaped = shape(aggregate.clone(), ResponseMeta::default(), &binding(true, Some("users"), None), false);

        let Body::Mapping(fields) = shaped.body() else {
            panic!("expected mapping");
        };
        assert_eq!(fields["total"], Entry::Value(json!(1)));
        assert_eq!(fields["users"].as_list().unwrap().len(), 1);
        assert_eq!(shaped.models()[0].id(), Some(&json!(1)));
        assert_eq!(shaped.raw(), &aggregate);
        assert_eq!(serde_json::to_value(&shaped).unwrap(), aggregate);
    }

    #[test]
    fn test_scalar_shape() {
        let shaped = shape(json!("ok"), ResponseMeta::default(), &binding(false, None, None), false);
        assert_eq!(shaped.body(), &Body::Scalar(json!("ok")));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let meta = ResponseMeta {
            headers: BTreeMap::from([("x-total-count".to_string(), "5".to_string())]),
            ..Default::default()
        };
        assert_eq!(meta.header("X-Total-Count"), Some("5"));
    }
}
