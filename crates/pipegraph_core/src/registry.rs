// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of node types.
//!
//! Maps a type tag (for example `pipegraph.math.Add`) to a factory producing
//! fresh nodes of that kind. Each tag is registered once, each display name
//! belongs to one tag, and aliases share the tag namespace.
//!
//! Registries are populated explicitly at startup:
//!
//! ```
//! use pipegraph_core::{Node, NodeRegistry, NodeType};
//!
//! let registry = NodeRegistry::builder()
//!     .register(NodeType::new("demo.Source", "Source", || Node::new("").with_output("out")))?
//!     .register(NodeType::new("demo.Sink", "Sink", || Node::new("").with_input("in")))?
//!     .build();
//!
//! let node = registry.create("demo.Source")?;
//! assert_eq!(node.type_tag(), "demo.Source");
//! assert_eq!(node.name, "Source");
//! # Ok::<(), pipegraph_core::RegistryError>(())
//! ```

use crate::node::{Node, NodeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Zero-argument node constructor
pub type NodeFactory = Arc<dyn Fn() -> Node + Send + Sync>;

/// Node type definition
#[derive(Clone)]
pub struct NodeType {
    /// Unique type tag
    pub type_tag: String,
    /// Unique display name
    pub display_name: String,
    /// Optional alternative tag
    pub alias: Option<String>,
    /// Description
    pub description: String,
    factory: NodeFactory,
}

impl NodeType {
    /// Create a node type definition
    pub fn new(
        type_tag: impl Into<String>,
        display_name: impl Into<String>,
        factory: impl Fn() -> Node + Send + Sync + 'static,
    ) -> Self {
        Self {
            type_tag: type_tag.into(),
            display_name: display_name.into(),
            alias: None,
            description: String::new(),
            factory: Arc::new(factory),
        }
    }

    /// Set an alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Namespace part of the tag (everything before the last `.`)
    pub fn namespace(&self) -> &str {
        namespace_of(&self.type_tag)
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("type_tag", &self.type_tag)
            .field("display_name", &self.display_name)
            .field("alias", &self.alias)
            .finish_non_exhaustive()
    }
}

fn namespace_of(tag: &str) -> &str {
    tag.rsplit_once('.').map_or("", |(namespace, _)| namespace)
}

/// Error from registering or creating node types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Tag already registered (as a tag or an alias)
    #[error("node type already registered: {0}")]
    DuplicateType(String),

    /// Display name already used by another type
    #[error("display name '{name}' already used by {existing}")]
    DuplicateName {
        /// Display name
        name: String,
        /// Tag holding the name
        existing: String,
    },

    /// Alias collides with a registered tag or alias
    #[error("alias already registered: {0}")]
    DuplicateAlias(String),

    /// No type with this tag or alias
    #[error("unknown node type: {0}")]
    UnknownType(String),
}

/// Registry of available node types
#[derive(Debug, Default)]
pub struct NodeRegistry {
    types: BTreeMap<String, NodeType>,
    names: HashMap<String, String>,
    aliases: HashMap<String, String>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a chained registration
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            registry: Self::new(),
        }
    }

    /// Register a node type. The registry is unchanged on error.
    pub fn register(&mut self, node_type: NodeType) -> Result<(), RegistryError> {
        let tag = &node_type.type_tag;
        if self.types.contains_key(tag) || self.aliases.contains_key(tag) {
            return Err(RegistryError::DuplicateType(tag.clone()));
        }
        if let Some(existing) = self.names.get(&node_type.display_name) {
            return Err(RegistryError::DuplicateName {
                name: node_type.display_name.clone(),
                existing: existing.clone(),
            });
        }
        if let Some(alias) = &node_type.alias {
            if alias == tag || self.types.contains_key(alias) || self.aliases.contains_key(alias) {
                return Err(RegistryError::DuplicateAlias(alias.clone()));
            }
        }

        tracing::debug!("Registered node type {tag}");
        self.names
            .insert(node_type.display_name.clone(), tag.clone());
        if let Some(alias) = &node_type.alias {
            self.aliases.insert(alias.clone(), tag.clone());
        }
        self.types.insert(tag.clone(), node_type);
        Ok(())
    }

    /// Resolve a tag or alias to the registered tag
    pub fn resolve(&self, tag_or_alias: &str) -> Option<&str> {
        if let Some((tag, _)) = self.types.get_key_value(tag_or_alias) {
            return Some(tag);
        }
        self.aliases.get(tag_or_alias).map(String::as_str)
    }

    /// Get a node type by tag or alias
    pub fn get(&self, tag_or_alias: &str) -> Option<&NodeType> {
        self.resolve(tag_or_alias).and_then(|tag| self.types.get(tag))
    }

    /// Display name of a type
    pub fn display_name(&self, tag_or_alias: &str) -> Option<&str> {
        self.get(tag_or_alias).map(|t| t.display_name.as_str())
    }

    /// Create a fresh node of a registered type
    pub fn create(&self, tag_or_alias: &str) -> Result<Node, RegistryError> {
        let node_type = self
            .get(tag_or_alias)
            .ok_or_else(|| RegistryError::UnknownType(tag_or_alias.to_string()))?;

        let mut node = (node_type.factory)();
        // Factories may hand out clones of a prototype
        node.assign_id(NodeId::new());
        node.clear_connections();
        node.set_type_tag(&node_type.type_tag);
        if node.name.is_empty() {
            node.name = node_type.display_name.clone();
        }
        Ok(node)
    }

    /// Registered tags in lexicographic order
    pub fn list_types(&self) -> impl Iterator<Item = &str> + Clone + '_ {
        self.types.keys().map(String::as_str)
    }

    /// Registered types in tag order
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Tags whose namespace is exactly `namespace`
    pub fn types_in_namespace<'a>(
        &'a self,
        namespace: &'a str,
    ) -> impl Iterator<Item = &'a str> + Clone + 'a {
        self.list_types()
            .filter(move |tag| namespace_of(tag) == namespace)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Chained registry construction, stopping at the first error
#[derive(Debug)]
pub struct RegistryBuilder {
    registry: NodeRegistry,
}

impl RegistryBuilder {
    /// Register a node type
    pub fn register(mut self, node_type: NodeType) -> Result<Self, RegistryError> {
        self.registry.register(node_type)?;
        Ok(self)
    }

    /// Finish building
    pub fn build(self) -> NodeRegistry {
        self.registry
    }
}
