// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.

use crate::port::{normalize_name, Port, PortDirection, PortId, PortSpec};
use crate::property::{Properties, PropertyError, PropertyValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse the textual form of an ID
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text).ok().map(Self)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// RGBA node color.
///
/// Serialized as `[r, g, b, a]`; three-component lists are accepted with
/// an opaque alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct Color {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
    /// Alpha
    pub a: u8,
}

impl Color {
    /// Opaque color
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Color with alpha
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::rgb(13, 18, 23)
    }
}

impl TryFrom<Vec<u8>> for Color {
    type Error = String;

    fn try_from(components: Vec<u8>) -> Result<Self, Self::Error> {
        match components.as_slice() {
            [r, g, b] => Ok(Self::rgb(*r, *g, *b)),
            [r, g, b, a] => Ok(Self::rgba(*r, *g, *b, *a)),
            other => Err(format!(
                "color needs 3 or 4 components, got {}",
                other.len()
            )),
        }
    }
}

impl From<Color> for Vec<u8> {
    fn from(color: Color) -> Self {
        vec![color.r, color.g, color.b, color.a]
    }
}

/// Error when editing a node's ports
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    /// Another port with this name and direction exists
    #[error("duplicate {direction} port name: {name}")]
    DuplicatePortName {
        /// Normalized port name
        name: String,
        /// Port direction
        direction: PortDirection,
    },

    /// Port name is empty after normalization
    #[error("port name is empty")]
    EmptyPortName,
}

/// A node instance in the graph
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    type_tag: String,
    /// Display name (not unique)
    pub name: String,
    /// Node color
    pub color: Color,
    /// Position on the canvas
    pub position: [f32; 2],
    /// Whether the node is selected
    pub selected: bool,
    /// Whether the node is disabled
    pub disabled: bool,
    /// Whether the node is drawn
    pub visible: bool,
    /// Whether a disabled node forwards its inputs to its outputs
    pub pass_through: bool,
    properties: Properties,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
}

impl Node {
    /// Create a new node without a registered type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            type_tag: String::new(),
            name: name.into(),
            color: Color::default(),
            position: [0.0, 0.0],
            selected: false,
            disabled: false,
            visible: true,
            pass_through: false,
            properties: Properties::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Node ID
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Registry type tag (empty for unregistered nodes)
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Set the color
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Mark the node kind as forwarding inputs to outputs while disabled
    pub fn with_pass_through(mut self) -> Self {
        self.pass_through = true;
        self
    }

    /// Add an input port while building a node definition.
    ///
    /// A name already taken by another input is skipped with a warning.
    pub fn with_input(mut self, spec: impl Into<PortSpec>) -> Self {
        if let Err(err) = self.add_input(spec) {
            tracing::warn!("Skipping input on '{}': {err}", self.name);
        }
        self
    }

    /// Add an output port while building a node definition.
    ///
    /// A name already taken by another output is skipped with a warning.
    pub fn with_output(mut self, spec: impl Into<PortSpec>) -> Self {
        if let Err(err) = self.add_output(spec) {
            tracing::warn!("Skipping output on '{}': {err}", self.name);
        }
        self
    }

    /// Add a property while building a node definition
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        if let Err(err) = self.properties.set(name, value) {
            tracing::warn!("Skipping property on '{}': {err}", self.name);
        }
        self
    }

    /// Add an input port
    pub fn add_input(&mut self, spec: impl Into<PortSpec>) -> Result<PortId, NodeError> {
        self.add_port(PortDirection::Input, spec.into())
    }

    /// Add an output port
    pub fn add_output(&mut self, spec: impl Into<PortSpec>) -> Result<PortId, NodeError> {
        self.add_port(PortDirection::Output, spec.into())
    }

    fn add_port(&mut self, direction: PortDirection, spec: PortSpec) -> Result<PortId, NodeError> {
        let name = normalize_name(&spec.name);
        if name.is_empty() {
            return Err(NodeError::EmptyPortName);
        }
        let ports = match direction {
            PortDirection::Input => &mut self.inputs,
            PortDirection::Output => &mut self.outputs,
        };
        if ports.iter().any(|p| p.name() == name) {
            return Err(NodeError::DuplicatePortName { name, direction });
        }
        let port = Port::from_spec(self.id, direction, spec);
        let id = port.id();
        ports.push(port);
        Ok(id)
    }

    /// Input ports in order
    pub fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    /// Output ports in order
    pub fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    /// Get an input port by index
    pub fn input(&self, index: usize) -> Option<&Port> {
        self.inputs.get(index)
    }

    /// Get an output port by index
    pub fn output(&self, index: usize) -> Option<&Port> {
        self.outputs.get(index)
    }

    /// First input port with this name
    pub fn input_by_name(&self, name: &str) -> Option<&Port> {
        let name = normalize_name(name);
        self.inputs.iter().find(|p| p.name() == name)
    }

    /// First output port with this name
    pub fn output_by_name(&self, name: &str) -> Option<&Port> {
        let name = normalize_name(name);
        self.outputs.iter().find(|p| p.name() == name)
    }

    /// Get a port by ID
    pub fn port(&self, port_id: &PortId) -> Option<&Port> {
        self.ports().find(|p| p.id() == *port_id)
    }

    pub(crate) fn port_mut(&mut self, port_id: &PortId) -> Option<&mut Port> {
        self.inputs
            .iter_mut()
            .chain(self.outputs.iter_mut())
            .find(|p| p.id() == *port_id)
    }

    /// Get all ports, inputs first
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Get a property value
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Set a property; the value kind must match any existing value
    pub fn set_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<(), PropertyError> {
        self.properties.set(name, value).map(|_| ())
    }

    /// Remove a property
    pub fn remove_property(&mut self, name: &str) -> Option<PropertyValue> {
        self.properties.remove(name)
    }

    /// All properties
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub(crate) fn set_type_tag(&mut self, type_tag: &str) {
        self.type_tag = type_tag.to_string();
    }

    /// Move the node (and its ports) to a new ID
    pub(crate) fn assign_id(&mut self, id: NodeId) {
        self.id = id;
        for port in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            port.rebind(id);
        }
    }

    pub(crate) fn clear_connections(&mut self) {
        for port in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            port.clear_connections();
        }
    }

    pub(crate) fn remove_port(&mut self, port_id: &PortId) -> Option<Port> {
        if let Some(index) = self.inputs.iter().position(|p| p.id() == *port_id) {
            return Some(self.inputs.remove(index));
        }
        let index = self.outputs.iter().position(|p| p.id() == *port_id)?;
        Some(self.outputs.remove(index))
    }

    /// Copy with fresh node and port IDs and no connections.
    ///
    /// Returns the copy and a map from this node's port IDs to the copy's.
    pub(crate) fn fork(&self) -> (Node, HashMap<PortId, PortId>) {
        let mut copy = self.clone();
        copy.assign_id(NodeId::new());
        copy.clear_connections();
        let mut port_map = HashMap::new();
        for port in copy.inputs.iter_mut().chain(copy.outputs.iter_mut()) {
            let old = port.id();
            port_map.insert(old, port.regenerate_id());
        }
        (copy, port_map)
    }
}

/// Editable view of a node held by a graph.
///
/// Covers presentation state only. Ports, properties and the node itself are
/// changed through the owning [`Graph`](crate::Graph) so its connections stay
/// consistent.
#[derive(Debug)]
pub struct NodeMut<'a> {
    node: &'a mut Node,
}

impl<'a> NodeMut<'a> {
    pub(crate) fn new(node: &'a mut Node) -> Self {
        Self { node }
    }

    /// Rename the node
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.node.name = name.into();
    }

    /// Move the node
    pub fn set_position(&mut self, x: f32, y: f32) {
        self.node.position = [x, y];
    }

    /// Recolor the node
    pub fn set_color(&mut self, color: Color) {
        self.node.color = color;
    }

    /// Enable or disable the node
    pub fn set_disabled(&mut self, disabled: bool) {
        self.node.disabled = disabled;
    }

    /// Show or hide the node
    pub fn set_visible(&mut self, visible: bool) {
        self.node.visible = visible;
    }
}

impl Deref for NodeMut<'_> {
    type Target = Node;

    fn deref(&self) -> &Node {
        self.node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyKind;

    #[test]
    fn test_port_names_unique_per_direction() {
        let mut node = Node::new("Mix");
        node.add_input("value").unwrap();
        node.add_output("value").unwrap();

        let err = node.add_input(" value ").unwrap_err();
        assert_eq!(
            err,
            NodeError::DuplicatePortName {
                name: "value".to_string(),
                direction: PortDirection::Input,
            }
        );
        assert_eq!(node.add_output("   ").unwrap_err(), NodeError::EmptyPortName);
        assert_eq!(node.inputs().len(), 1);
    }

    #[test]
    fn test_ports_know_their_node() {
        let mut node = Node::new("A");
        let port = node.add_input("base color").unwrap();
        assert_eq!(node.port(&port).unwrap().node_id(), node.id());
        assert_eq!(node.input_by_name("base_color").unwrap().id(), port);

        let new_id = NodeId::new();
        node.assign_id(new_id);
        assert!(node.ports().all(|p| p.node_id() == new_id));
    }

    #[test]
    fn test_property_type_pinning() {
        let mut node = Node::new("A").with_property("scale", 1.0);
        node.set_property("scale", 2.5).unwrap();
        let err = node.set_property("scale", "big").unwrap_err();
        assert!(matches!(
            err,
            PropertyError::KindMismatch { expected: PropertyKind::Float, .. }
        ));
        assert_eq!(node.property("scale"), Some(&PropertyValue::Float(2.5)));
    }

    #[test]
    fn test_fork_renews_ids() {
        let node = Node::new("A").with_input("in").with_output("out");
        let (copy, port_map) = node.fork();
        assert_ne!(copy.id(), node.id());
        assert_eq!(port_map.len(), 2);
        for port in node.ports() {
            let new_port = copy.port(&port_map[&port.id()]).unwrap();
            assert_eq!(new_port.name(), port.name());
            assert_eq!(new_port.node_id(), copy.id());
        }
    }

    #[test]
    fn test_color_accepts_rgb_and_rgba() {
        let rgb: Color = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(rgb, Color::rgb(1, 2, 3));
        let rgba: Color = serde_json::from_str("[1, 2, 3, 4]").unwrap();
        assert_eq!(serde_json::to_string(&rgba).unwrap(), "[1,2,3,4]");
        assert!(serde_json::from_str::<Color>("[1, 2]").is_err());
    }
}
