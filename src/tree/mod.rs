//! The navigable endpoint tree.
//!
//! Nodes mirror the API's logical grouping (`users`, `orgs.members`, ...).
//! A node either holds methods (a leaf endpoint) or child nodes. The tree is
//! built once by [`TreeBuilder`] and is read-only afterwards.

mod builder;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{Result, TinError};
use crate::method::EndpointMethod;
use crate::model::ModelType;

pub use builder::TreeBuilder;

/// Per-node data shared with the node's methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeBinding {
    /// Dotted ancestry of the node (`orgs.members`); `None` for the root.
    pub obj_path: Option<String>,
    /// Model bound to this node.
    pub model: Option<Arc<ModelType>>,
    /// Key of a list payload inside mapping responses.
    pub response_list_path: Option<String>,
    /// Key of the resource payload inside singleton responses.
    pub response_single_path: Option<String>,
}

/// A container in the endpoint tree.
#[derive(Debug, Default)]
pub struct EndpointNode {
    name: String,
    binding: Arc<NodeBinding>,
    children: BTreeMap<String, EndpointNode>,
    methods: BTreeMap<String, EndpointMethod>,
}

impl EndpointNode {
    pub(crate) fn new(name: impl Into<String>, binding: Arc<NodeBinding>) -> Self {
        Self {
            name: name.into(),
            binding,
            children: BTreeMap::new(),
            methods: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted ancestry of this node; `None` for the root.
    pub fn obj_path(&self) -> Option<&str> {
        self.binding.obj_path.as_deref()
    }

    pub fn model(&self) -> Option<&Arc<ModelType>> {
        self.binding.model.as_ref()
    }

    pub fn response_list_path(&self) -> Option<&str> {
        self.binding.response_list_path.as_deref()
    }

    pub fn response_single_path(&self) -> Option<&str> {
        self.binding.response_single_path.as_deref()
    }

    /// Look up a direct child node.
    pub fn child(&self, name: &str) -> Option<&EndpointNode> {
        self.children.get(name)
    }

    /// Look up a method on this node.
    pub fn method(&self, name: &str) -> Option<&EndpointMethod> {
        self.methods.get(name)
    }

    pub fn children(&self) -> impl Iterator<Item = &EndpointNode> {
        self.children.values()
    }

    pub fn methods(&self) -> impl Iterator<Item = &EndpointMethod> {
        self.methods.values()
    }

    /// Follow a dotted path of child names. An empty path is this node.
    ///
    /// # Errors
    ///
    /// Returns [`TinError::UnknownEndpoint`] naming the full path if any
    /// segment is missing.
    pub fn descend(&self, path: &str) -> Result<&EndpointNode> {
        if path.is_empty() {
            return Ok(self);
        }
        path.split('.').try_fold(self, |node, segment| {
            node.child(segment)
                .ok_or_else(|| TinError::UnknownEndpoint(path.to_string()))
        })
    }

    /// Every method in this subtree, depth first.
    pub fn all_methods(&self) -> Vec<&EndpointMethod> {
        let mut found: Vec<&EndpointMethod> = self.methods.values().collect();
        for child in self.children.values() {
            found.extend(child.all_methods());
        }
        found
    }

    /// Names of the children and methods, recursively.
    ///
    /// Each layer is `{"classes": {...}, "methods": [...]}` with empty
    /// entries omitted, so an empty node is `{}`.
    pub fn tree(&self) -> Value {
        let mut layer = Map::new();
        if !self.children.is_empty() {
            let classes = self
                .children
                .iter()
                .map(|(name, child)| (name.clone(), child.tree()))
                .collect();
            layer.insert("classes".to_string(), Value::Object(classes));
        }
        if !self.methods.is_empty() {
            let methods = self.methods.keys().cloned().map(Value::String).collect();
            layer.insert("methods".to_string(), Value::Array(methods));
        }
        Value::Object(layer)
    }

    /// [`tree`](Self::tree) as a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.tree())?)
    }

    /// Register a child; a second child of the same name replaces the first.
    pub(crate) fn add_child(&mut self, child: EndpointNode) -> Option<EndpointNode> {
        self.children.insert(child.name.clone(), child)
    }

    pub(crate) fn add_method(&mut self, method: EndpointMethod) {
        self.methods.insert(method.name().to_string(), method);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.children.is_empty() && self.methods.is_empty()
    }
}
