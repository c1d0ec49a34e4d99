//! Builds the endpoint tree from the nested endpoint definitions.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::{EndpointNode, NodeBinding};
use crate::config::ResolvedConfig;
use crate::error::{Result, TinError};
use crate::method::{EndpointMethod, MethodSpec};
use crate::model::ModelType;

/// Keys of a node definition that configure the node itself rather than
/// naming a child.
const NODE_KEYS: [&str; 4] = ["methods", "model", "response_list_path", "response_single_path"];

/// Walks the endpoint definitions once and produces the node/method graph.
///
/// An entry holding a `methods` mapping is a leaf endpoint; any other entry
/// is a container whose non-reserved keys are child definitions.
#[derive(Debug)]
pub struct TreeBuilder {
    config: Arc<ResolvedConfig>,
}

impl TreeBuilder {
    pub fn new(config: Arc<ResolvedConfig>) -> Self {
        Self { config }
    }

    /// Build the tree rooted at a node named after the API.
    ///
    /// # Errors
    ///
    /// Returns [`TinError::Config`] identifying the offending dotted path if
    /// a definition is malformed, names an unknown model, or declares
    /// neither methods nor children.
    pub fn build(&self) -> Result<EndpointNode> {
        let mut root = EndpointNode::new(self.config.api_name.clone(), Arc::new(NodeBinding::default()));
        self.populate(&mut root, &self.config.endpoint_tree, None)?;
        tracing::debug!(
            api = %self.config.api_name,
            methods = root.all_methods().len(),
            "endpoint tree built"
        );
        Ok(root)
    }

    fn populate(&self, parent: &mut EndpointNode, defs: &Map<String, Value>, parent_path: Option<&str>) -> Result<()> {
        for (name, def) in defs {
            if parent_path.is_some() && NODE_KEYS.contains(&name.as_str()) {
                continue;
            }
            let obj_path = match parent_path {
                Some(parent) => format!("{parent}.{name}"),
                None => name.clone(),
            };
            let Value::Object(def) = def else {
                return Err(TinError::Config(format!("endpoint '{obj_path}' must be a mapping")));
            };

            let node = self.build_node(name, &obj_path, def)?;
            if parent.add_child(node).is_some() {
                // Precedence between duplicate definitions is undefined.
                tracing::warn!(endpoint = %obj_path, "duplicate endpoint definition replaced");
            }
        }
        Ok(())
    }

    fn build_node(&self, name: &str, obj_path: &str, def: &Map<String, Value>) -> Result<EndpointNode> {
        let model_name = string_key(def, "model", obj_path)?;
        let response_list_path = string_key(def, "response_list_path", obj_path)?;
        let response_single_path = string_key(def, "response_single_path", obj_path)?;

        let specs = match def.get("methods") {
            None => None,
            Some(Value::Object(methods)) if !methods.is_empty() => Some(
                methods
                    .iter()
                    .map(|(method, data)| {
                        let spec = MethodSpec::parse(&format!("{obj_path}.{method}"), data)?;
                        Ok((method.clone(), spec))
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            Some(_) => {
                return Err(TinError::Config(format!(
                    "'methods' of endpoint '{obj_path}' must be a non-empty mapping"
                )))
            }
        };

        let model = match model_name {
            Some(model_name) => {
                let definition = self.config.models.get(&model_name).ok_or_else(|| {
                    TinError::Config(format!("endpoint '{obj_path}' references unknown model '{model_name}'"))
                })?;
                let object_methods: BTreeSet<String> = specs
                    .iter()
                    .flatten()
                    .filter(|(_, spec)| spec.object_method)
                    .map(|(method, _)| method.clone())
                    .collect();
                Some(Arc::new(ModelType::new(
                    model_name,
                    definition.clone(),
                    obj_path,
                    object_methods,
                )))
            }
            None => None,
        };

        let binding = Arc::new(NodeBinding {
            obj_path: Some(obj_path.to_string()),
            model,
            response_list_path,
            response_single_path,
        });
        let mut node = EndpointNode::new(name, Arc::clone(&binding));

        match specs {
            Some(specs) => {
                for (method, spec) in specs {
                    node.add_method(EndpointMethod::new(
                        method,
                        spec,
                        Arc::clone(&binding),
                        Arc::clone(&self.config),
                    ));
                }
            }
            None => self.populate(&mut node, def, Some(obj_path))?,
        }

        if node.is_empty() {
            return Err(TinError::Config(format!(
                "endpoint '{obj_path}' declares neither methods nor child endpoints"
            )));
        }
        Ok(node)
    }
}

fn string_key(def: &Map<String, Value>, key: &str, obj_path: &str) -> Result<Option<String>> {
    match def.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(TinError::Config(format!(
            "'{key}' of endpoint '{obj_path}' must be a string"
        ))),
    }
}
