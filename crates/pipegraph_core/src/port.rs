// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::connection::ConnectionId;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId(pub Uuid);

impl PortId {
    /// Create a new random port ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PortId {
    fn default() -> Self {
        Self::new()
    }
}

/// Address of a port inside a graph: the owning node plus the port itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    /// Owning node
    pub node: NodeId,
    /// Port on that node
    pub port: PortId,
}

impl PortRef {
    /// Create a port reference
    pub fn new(node: NodeId, port: PortId) -> Self {
        Self { node, port }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.port.0)
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

impl PortDirection {
    /// The other direction
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Data type tag carried by a port.
///
/// Tags are free-form and compared case-insensitively. An empty tag or
/// `"any"` is the wildcard and connects to everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DataType(String);

impl DataType {
    /// Tag of the wildcard type
    pub const ANY: &'static str = "any";

    /// Create a data type from a tag
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().trim().to_ascii_lowercase())
    }

    /// The wildcard type
    pub fn any() -> Self {
        Self(String::new())
    }

    /// Raw tag
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the wildcard type
    pub fn is_any(&self) -> bool {
        self.0.is_empty() || self.0 == Self::ANY
    }
}

impl From<&str> for DataType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for DataType {
    fn from(tag: String) -> Self {
        Self::new(tag)
    }
}

impl From<DataType> for String {
    fn from(data_type: DataType) -> Self {
        data_type.0
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            f.write_str(Self::ANY)
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Implicit conversions accepted between data types, on top of equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCompatibility {
    pairs: HashSet<(DataType, DataType)>,
}

impl TypeCompatibility {
    /// A table accepting only equal types and the wildcard
    pub fn empty() -> Self {
        Self {
            pairs: HashSet::new(),
        }
    }

    /// The standard scalar/vector conversion table
    pub fn standard() -> Self {
        let mut table = Self::empty();
        // Numeric widening
        table.allow("int", "float");
        // Vector promotion
        for target in ["vec2", "vec3", "vec4"] {
            table.allow("float", target);
        }
        table.allow("vec2", "vec3");
        table.allow("vec2", "vec4");
        table.allow("vec3", "vec4");
        // Colors are plain 4-vectors
        table.allow_both("color", "vec4");
        table
    }

    /// Accept values of `output` type on inputs of `input` type
    pub fn allow(&mut self, output: impl Into<DataType>, input: impl Into<DataType>) {
        self.pairs.insert((output.into(), input.into()));
    }

    /// Accept the conversion in both directions
    pub fn allow_both(&mut self, a: impl Into<DataType>, b: impl Into<DataType>) {
        let (a, b) = (a.into(), b.into());
        self.pairs.insert((a.clone(), b.clone()));
        self.pairs.insert((b, a));
    }

    /// Check whether an output of type `output` may feed an input of type `input`
    pub fn accepts(&self, output: &DataType, input: &DataType) -> bool {
        if output.is_any() || input.is_any() || output == input {
            return true;
        }
        self.pairs.contains(&(output.clone(), input.clone()))
    }

    /// Number of extra conversions in the table
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the table only accepts equal types
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl Default for TypeCompatibility {
    fn default() -> Self {
        Self::standard()
    }
}

/// Normalize a port name: trimmed, with spaces replaced by underscores.
pub fn normalize_name(name: &str) -> String {
    name.trim().replace(' ', "_")
}

/// Declarative description of a port, used when adding ports to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSpec {
    /// Port name (normalized on creation)
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Multi-connection override; `None` uses the direction default
    pub allows_multiple: Option<bool>,
    /// Whether a view should draw the port label
    pub display_name: bool,
    /// Whether the port refuses new connections
    pub locked: bool,
}

impl PortSpec {
    /// Create a spec with default options
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::any(),
            allows_multiple: None,
            display_name: true,
            locked: false,
        }
    }

    /// Set the data type
    pub fn data_type(mut self, data_type: impl Into<DataType>) -> Self {
        self.data_type = data_type.into();
        self
    }

    /// Allow or forbid multiple connections
    pub fn multiple(mut self, allows_multiple: bool) -> Self {
        self.allows_multiple = Some(allows_multiple);
        self
    }

    /// Hide the port label
    pub fn hide_name(mut self) -> Self {
        self.display_name = false;
        self
    }

    /// Lock the port
    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }
}

impl From<&str> for PortSpec {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PortSpec {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// A port on a node
#[derive(Debug, Clone)]
pub struct Port {
    id: PortId,
    node: NodeId,
    name: String,
    direction: PortDirection,
    allows_multiple: bool,
    connections: Vec<ConnectionId>,
    /// Data type
    pub data_type: DataType,
    /// Whether a view should draw the port label
    pub display_name: bool,
    /// Locked ports keep their connections but refuse new ones
    pub locked: bool,
}

impl Port {
    pub(crate) fn from_spec(node: NodeId, direction: PortDirection, spec: PortSpec) -> Self {
        // Outputs fan out by default, inputs accept a single pipe
        let allows_multiple = spec
            .allows_multiple
            .unwrap_or(direction == PortDirection::Output);
        Self {
            id: PortId::new(),
            node,
            name: normalize_name(&spec.name),
            direction,
            allows_multiple,
            connections: Vec::new(),
            data_type: spec.data_type,
            display_name: spec.display_name,
            locked: spec.locked,
        }
    }

    /// Port ID
    pub fn id(&self) -> PortId {
        self.id
    }

    /// Owning node
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Graph address of this port
    pub fn port_ref(&self) -> PortRef {
        PortRef::new(self.node, self.id)
    }

    /// Port name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Port direction
    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    /// Whether this is an input port
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    /// Whether this is an output port
    pub fn is_output(&self) -> bool {
        self.direction == PortDirection::Output
    }

    /// Whether the port accepts more than one connection
    pub fn allows_multiple(&self) -> bool {
        self.allows_multiple
    }

    /// Connections this port participates in, oldest first
    pub fn connections(&self) -> &[ConnectionId] {
        &self.connections
    }

    /// Whether the port has any connection
    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Check direction and type compatibility with another port
    pub fn can_connect(&self, other: &Port, table: &TypeCompatibility) -> bool {
        if self.direction == other.direction {
            return false;
        }
        let (output, input) = if self.is_output() {
            (self, other)
        } else {
            (other, self)
        };
        table.accepts(&output.data_type, &input.data_type)
    }

    pub(crate) fn attach(&mut self, connection: ConnectionId) {
        if !self.connections.contains(&connection) {
            self.connections.push(connection);
        }
    }

    pub(crate) fn detach(&mut self, connection: ConnectionId) {
        self.connections.retain(|c| *c != connection);
    }

    pub(crate) fn clear_connections(&mut self) {
        self.connections.clear();
    }

    pub(crate) fn rebind(&mut self, node: NodeId) {
        self.node = node;
    }

    pub(crate) fn regenerate_id(&mut self) -> PortId {
        self.id = PortId::new();
        self.id
    }
}
