//! Models: typed wrappers around single remote resources.
//!
//! A [`ModelType`] is bound to exactly one endpoint node. Methods on that
//! node marked as object methods can be called on a [`Model`] instance, in
//! which case the instance's identifier is bound as the `id` token.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::client::TinClient;
use crate::config::deep_merge;
use crate::error::{Result, TinError};
use crate::method::Call;
use crate::response::{ApiResponse, ResponseMeta};

fn default_id_attr() -> String {
    "id".to_string()
}

/// Declared shape of a model, as found in the model definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Attributes that must be present before a model is created or saved.
    #[serde(default)]
    pub must: Vec<String>,
    /// Read-only attributes, stripped from the payload on save.
    #[serde(default, alias = "read_only")]
    pub read: Vec<String>,
    /// Attribute holding the resource identifier.
    #[serde(default = "default_id_attr")]
    pub id_attr: String,
    /// Names of the object methods used for the CRUD lifecycle.
    #[serde(default)]
    pub methods: CrudMethods,
}

impl Default for ModelDefinition {
    fn default() -> Self {
        Self {
            must: Vec::new(),
            read: Vec::new(),
            id_attr: default_id_attr(),
            methods: CrudMethods::default(),
        }
    }
}

/// Object method names backing [`Model::save`], [`Model::refresh`] and
/// [`Model::delete`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrudMethods {
    pub create: String,
    pub read: String,
    pub update: String,
    pub delete: String,
}

impl Default for CrudMethods {
    fn default() -> Self {
        Self {
            create: "create".to_string(),
            read: "read".to_string(),
            update: "update".to_string(),
            delete: "delete".to_string(),
        }
    }
}

/// A model definition bound to an endpoint node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelType {
    name: String,
    definition: ModelDefinition,
    node_path: String,
    object_methods: BTreeSet<String>,
}

impl ModelType {
    pub(crate) fn new(
        name: impl Into<String>,
        definition: ModelDefinition,
        node_path: impl Into<String>,
        object_methods: BTreeSet<String>,
    ) -> Self {
        Self {
            name: name.into(),
            definition,
            node_path: node_path.into(),
            object_methods,
        }
    }

    /// The model's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &ModelDefinition {
        &self.definition
    }

    /// Dotted path of the endpoint node this model is bound to.
    pub fn node_path(&self) -> &str {
        &self.node_path
    }

    /// Names of the node methods exposed on instances.
    pub fn object_methods(&self) -> impl Iterator<Item = &str> {
        self.object_methods.iter().map(String::as_str)
    }

    pub fn has_object_method(&self, name: &str) -> bool {
        self.object_methods.contains(name)
    }
}

/// A single remote resource.
///
/// Equality and serialization consider only the resource data; the raw
/// response payload and transport metadata ride along out of band.
#[derive(Debug, Clone)]
pub struct Model {
    kind: Arc<ModelType>,
    data: Map<String, Value>,
    raw: Value,
    response: Option<ResponseMeta>,
}

impl Model {
    /// Create a new, unsaved instance.
    ///
    /// # Errors
    ///
    /// Returns [`TinError::Validation`] if a required attribute is missing.
    pub fn new(kind: Arc<ModelType>, data: Map<String, Value>) -> Result<Self> {
        let model = Self::from_remote(kind, data);
        model.validate()?;
        Ok(model)
    }

    /// Wrap data returned by the API. Remote data is not validated.
    pub(crate) fn from_remote(kind: Arc<ModelType>, data: Map<String, Value>) -> Self {
        Self {
            kind,
            data,
            raw: Value::Null,
            response: None,
        }
    }

    pub(crate) fn with_response(mut self, raw: Value, response: ResponseMeta) -> Self {
        self.raw = raw;
        self.response = Some(response);
        self
    }

    pub fn kind(&self) -> &ModelType {
        &self.kind
    }

    /// The resource identifier, if the instance has one.
    pub fn id(&self) -> Option<&Value> {
        self.data
            .get(&self.kind.definition.id_attr)
            .filter(|id| !id.is_null())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn into_data(self) -> Map<String, Value> {
        self.data
    }

    /// The full response payload this instance was built from.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Transport metadata of the response this instance was built from.
    pub fn response(&self) -> Option<&ResponseMeta> {
        self.response.as_ref()
    }

    /// Check that every required attribute is present.
    pub fn validate(&self) -> Result<()> {
        match self
            .kind
            .definition
            .must
            .iter()
            .find(|attr| !self.data.contains_key(attr.as_str()))
        {
            Some(missing) => Err(TinError::Validation(format!(
                "required attribute {missing} not present on {}",
                self.kind.name
            ))),
            None => Ok(()),
        }
    }

    /// The data without read-only attributes.
    pub fn clean(&self) -> Map<String, Value> {
        let mut data = self.data.clone();
        for attr in &self.kind.definition.read {
            data.remove(attr);
        }
        data
    }

    /// Replace the data.
    ///
    /// # Errors
    ///
    /// Refuses data carrying a different identifier.
    pub fn load(&mut self, data: Map<String, Value>) -> Result<()> {
        self.check_id(&data)?;
        self.data = data;
        Ok(())
    }

    /// Deep-merge data into the instance.
    ///
    /// # Errors
    ///
    /// Refuses data carrying a different identifier.
    pub fn merge(&mut self, data: Map<String, Value>) -> Result<()> {
        self.check_id(&data)?;
        let mut merged = Value::Object(std::mem::take(&mut self.data));
        deep_merge(&mut merged, Value::Object(data));
        if let Value::Object(map) = merged {
            self.data = map;
        }
        Ok(())
    }

    fn check_id(&self, data: &Map<String, Value>) -> Result<()> {
        match (self.id(), data.get(&self.kind.definition.id_attr)) {
            (Some(mine), Some(theirs)) if mine != theirs => Err(TinError::Validation(format!(
                "given data has a different ID value ({theirs}) than mine ({mine}), cannot load or merge"
            ))),
            _ => Ok(()),
        }
    }

    fn require_id(&self, action: &str) -> Result<Value> {
        self.id().cloned().ok_or_else(|| {
            TinError::Validation(format!(
                "attempt to call {action}() on a {} instance that isn't saved yet",
                self.kind.name
            ))
        })
    }

    /// Call an object method with this instance's identifier bound as `id`.
    ///
    /// # Errors
    ///
    /// Returns [`TinError::UnknownEndpoint`] if `name` is not an object
    /// method of this model, and [`TinError::Validation`] if the instance
    /// has no identifier yet.
    pub async fn invoke(&self, client: &TinClient, name: &str, call: Call) -> Result<ApiResponse> {
        let id = self.require_id(name)?;
        self.invoke_unbound(client, name, call.id(id)).await
    }

    async fn invoke_unbound(&self, client: &TinClient, name: &str, call: Call) -> Result<ApiResponse> {
        if !self.kind.has_object_method(name) {
            return Err(TinError::UnknownEndpoint(format!("{}.{name}", self.kind.name)));
        }
        client
            .endpoint(&format!("{}.{name}", self.kind.node_path))?
            .invoke(client, call)
            .await
    }

    /// Create or update the remote resource.
    ///
    /// Instances with an identifier are updated; others are created without
    /// one. The instance then takes on the data the API returned.
    pub async fn save(&mut self, client: &TinClient) -> Result<()> {
        self.validate()?;
        let mut data = self.clean();
        let methods = self.kind.definition.methods.clone();

        let response = if self.id().is_some() {
            self.invoke(client, &methods.update, Call::new().body(Value::Object(data)))
                .await?
        } else {
            data.remove(&self.kind.definition.id_attr);
            self.invoke_unbound(client, &methods.create, Call::new().body(Value::Object(data)))
                .await?
        };

        self.absorb(response);
        Ok(())
    }

    /// Reload the data from the API.
    pub async fn refresh(&mut self, client: &TinClient) -> Result<()> {
        let read = self.kind.definition.methods.read.clone();
        let response = self.invoke(client, &read, Call::new()).await?;
        self.absorb(response);
        Ok(())
    }

    /// Delete the remote resource and clear the local data.
    pub async fn delete(&mut self, client: &TinClient) -> Result<()> {
        let delete = self.kind.definition.methods.delete.clone();
        self.invoke(client, &delete, Call::new()).await?;
        self.data.clear();
        Ok(())
    }

    fn absorb(&mut self, response: ApiResponse) {
        if let Some(record) = response.record() {
            self.data = record;
        }
        self.raw = response.raw().clone();
        self.response = Some(response.response().clone());
    }

    /// The data as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.data)?)
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.kind.name == other.kind.name && self.data == other.data
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "{}({id})", self.kind.name),
            None => write!(f, "{}(unsaved)", self.kind.name),
        }
    }
}
