// SPDX-License-Identifier: MIT OR Apache-2.0
//! Session files: graph snapshots on disk.
//!
//! A session document lists nodes keyed by ID and connections as
//! `{ "in": { node: port }, "out": { node: port } }` pairs:
//!
//! ```json
//! {
//!   "nodes": {
//!     "5a0c...": {
//!       "type": "pipegraph.math.Add",
//!       "name": "Add",
//!       "color": [13, 18, 23, 255],
//!       "pos": [120.0, 40.0],
//!       "selected": false,
//!       "properties": { "bias": 0.5 },
//!       "inputs": ["a", "b", "c"],
//!       "outputs": ["sum"],
//!       "input_options": { "c": { "type": "float", "multiple": true } }
//!     }
//!   },
//!   "connections": [
//!     { "in": { "5a0c...": "a" }, "out": { "91fe...": "value" } }
//!   ]
//! }
//! ```
//!
//! Ports whose options differ from the defaults get an `input_options` or
//! `output_options` entry, so ports added at runtime come back as they were.
//!
//! Loading never gives up on the whole document because of one bad entry:
//! nodes, properties and connections that are broken or do not fit the
//! schema are skipped and listed in the [`LoadReport`].

use crate::graph::Graph;
use crate::node::{Color, Node, NodeError, NodeId};
use crate::port::{DataType, Port, PortSpec};
use crate::property::{PropertyError, PropertyValue};
use crate::registry::NodeRegistry;
use crate::validation::ConnectionError;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// Encoding of a session document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionFormat {
    /// JSON
    #[default]
    Json,
    /// Rusty Object Notation
    Ron,
}

impl SessionFormat {
    /// Format named by the file extension, if recognised
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("ron") {
            Some(Self::Ron)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    /// Choose a format from a file extension (`.ron` is RON, anything else JSON)
    pub fn from_path(path: &Path) -> Self {
        Self::from_extension(path).unwrap_or_default()
    }

    /// Canonical file extension
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Ron => "ron",
        }
    }
}

/// A document entry that is kept even when it does not decode.
///
/// An undecodable entry becomes [`Entry::Invalid`] instead of failing the
/// whole document, and is written back as `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry<T> {
    /// Decoded value
    Valid(T),
    /// Value of the wrong shape
    Invalid,
}

impl<T> Entry<T> {
    /// The decoded value, if any
    pub fn valid(&self) -> Option<&T> {
        match self {
            Self::Valid(value) => Some(value),
            Self::Invalid => None,
        }
    }
}

impl<T> From<T> for Entry<T> {
    fn from(value: T) -> Self {
        Self::Valid(value)
    }
}

impl<T: Serialize> Serialize for Entry<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Valid(value) => value.serialize(serializer),
            Self::Invalid => serializer.serialize_unit(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Entry<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw<T> {
            Valid(T),
            Invalid(serde::de::IgnoredAny),
        }

        Ok(match Raw::<T>::deserialize(deserializer)? {
            Raw::Valid(value) => Self::Valid(value),
            Raw::Invalid(_) => Self::Invalid,
        })
    }
}

/// Persisted graph snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    /// Nodes keyed by ID
    #[serde(default)]
    pub nodes: IndexMap<String, Entry<NodeRecord>>,
    /// Connections
    #[serde(default)]
    pub connections: Vec<Entry<ConnectionRecord>>,
}

/// Persisted node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Registry type tag
    #[serde(rename = "type", default)]
    pub type_tag: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Node color
    #[serde(default)]
    pub color: Color,
    /// Canvas position
    #[serde(default)]
    pub pos: [f32; 2],
    /// Selection state
    #[serde(default)]
    pub selected: bool,
    /// Disabled state
    #[serde(default)]
    pub disabled: bool,
    /// Visibility
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Property values
    #[serde(default)]
    pub properties: IndexMap<String, Entry<PropertyValue>>,
    /// Input port names in order
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Output port names in order
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Non-default input port options by name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub input_options: IndexMap<String, PortRecord>,
    /// Non-default output port options by name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub output_options: IndexMap<String, PortRecord>,
}

fn default_visible() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Persisted port options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    /// Data type tag
    #[serde(rename = "type", default, skip_serializing_if = "DataType::is_any")]
    pub data_type: DataType,
    /// Accepts more than one connection
    #[serde(default)]
    pub multiple: bool,
    /// Locked against edits
    #[serde(default, skip_serializing_if = "is_false")]
    pub locked: bool,
    /// Label hidden
    #[serde(default, skip_serializing_if = "is_false")]
    pub hide_name: bool,
}

impl PortRecord {
    /// Options of `port`, or `None` when they are all defaults
    fn from_port(port: &Port) -> Option<Self> {
        let record = Self {
            data_type: port.data_type.clone(),
            multiple: port.allows_multiple(),
            locked: port.locked,
            hide_name: !port.display_name,
        };
        let customised = !record.data_type.is_any()
            || record.multiple != port.is_output()
            || record.locked
            || record.hide_name;
        customised.then_some(record)
    }

    fn spec(&self, name: &str) -> PortSpec {
        let mut spec = PortSpec::new(name)
            .data_type(self.data_type.clone())
            .multiple(self.multiple);
        if self.locked {
            spec = spec.locked();
        }
        if self.hide_name {
            spec = spec.hide_name();
        }
        spec
    }
}

fn port_options(ports: &[Port]) -> IndexMap<String, PortRecord> {
    ports
        .iter()
        .filter_map(|port| PortRecord::from_port(port).map(|record| (port.name().to_string(), record)))
        .collect()
}

impl NodeRecord {
    fn from_node(node: &Node) -> Self {
        Self {
            type_tag: node.type_tag().to_string(),
            name: node.name.clone(),
            color: node.color,
            pos: node.position,
            selected: node.selected,
            disabled: node.disabled,
            visible: node.visible,
            properties: node
                .properties()
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone().into()))
                .collect(),
            inputs: node.inputs().iter().map(|p| p.name().to_string()).collect(),
            outputs: node.outputs().iter().map(|p| p.name().to_string()).collect(),
            input_options: port_options(node.inputs()),
            output_options: port_options(node.outputs()),
        }
    }
}

/// Persisted connection: one `node ID -> port name` entry per side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Input end
    #[serde(rename = "in", default)]
    pub input: IndexMap<String, String>,
    /// Output end
    #[serde(rename = "out", default)]
    pub output: IndexMap<String, String>,
}

impl ConnectionRecord {
    /// Create a record from `(node ID, port name)` pairs
    pub fn new(output: (&str, &str), input: (&str, &str)) -> Self {
        let mut record = Self::default();
        record.output.insert(output.0.to_string(), output.1.to_string());
        record.input.insert(input.0.to_string(), input.1.to_string());
        record
    }

    fn endpoint(side: &IndexMap<String, String>) -> Option<(&str, &str)> {
        match side.len() {
            1 => side.first().map(|(node, port)| (node.as_str(), port.as_str())),
            _ => None,
        }
    }
}

/// An entry the loader could not apply
#[derive(Debug, Clone, PartialEq)]
pub enum SkippedEntry {
    /// Node record without a type
    MissingType {
        /// Node key in the document
        node: String,
    },
    /// Node type not in the registry
    UnknownType {
        /// Node key in the document
        node: String,
        /// Requested type
        type_tag: String,
    },
    /// Node record that does not decode
    MalformedNode {
        /// Node key in the document
        node: String,
    },
    /// Node ID that could not be inserted
    DuplicateNode {
        /// Node key in the document
        node: String,
    },
    /// Property value that does not decode
    MalformedProperty {
        /// Node key in the document
        node: String,
        /// Property name
        name: String,
    },
    /// Property value refused by the node
    Property {
        /// Node key in the document
        node: String,
        /// Underlying error
        error: PropertyError,
    },
    /// Port listed in the document that could not be recreated
    Port {
        /// Node key in the document
        node: String,
        /// Underlying error
        error: NodeError,
    },
    /// Connection without exactly one entry per side
    MalformedConnection {
        /// Index in the connection list
        index: usize,
    },
    /// Connection naming a node that was not loaded
    DanglingNode {
        /// Index in the connection list
        index: usize,
        /// Node key
        node: String,
    },
    /// Connection naming a port the node does not have
    MissingPort {
        /// Index in the connection list
        index: usize,
        /// Node key
        node: String,
        /// Port name
        port: String,
    },
    /// Connection refused by the validator
    Rejected {
        /// Index in the connection list
        index: usize,
        /// Violated rule
        reason: ConnectionError,
    },
    /// Connection that replaced one made earlier in the same load
    Displaced {
        /// Index in the connection list
        index: usize,
    },
}

impl fmt::Display for SkippedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingType { node } => write!(f, "node {node}: no type"),
            Self::UnknownType { node, type_tag } => {
                write!(f, "node {node}: unknown type '{type_tag}'")
            }
            Self::MalformedNode { node } => write!(f, "node {node}: malformed record"),
            Self::DuplicateNode { node } => write!(f, "node {node}: duplicate ID"),
            Self::MalformedProperty { node, name } => {
                write!(f, "node {node}: malformed value for property '{name}'")
            }
            Self::Property { node, error } => write!(f, "node {node}: {error}"),
            Self::Port { node, error } => write!(f, "node {node}: {error}"),
            Self::MalformedConnection { index } => {
                write!(f, "connection #{index}: needs one 'in' and one 'out' entry")
            }
            Self::DanglingNode { index, node } => {
                write!(f, "connection #{index}: unknown node {node}")
            }
            Self::MissingPort { index, node, port } => {
                write!(f, "connection #{index}: node {node} has no port '{port}'")
            }
            Self::Rejected { index, reason } => write!(f, "connection #{index}: {reason}"),
            Self::Displaced { index } => write!(
                f,
                "connection #{index}: replaced an earlier connection on a single-connection port"
            ),
        }
    }
}

/// Outcome of loading a document into a graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Nodes created, in document order
    pub created: Vec<NodeId>,
    /// Connections made
    pub connected: usize,
    /// Entries that were not applied
    pub skipped: Vec<SkippedEntry>,
}

impl LoadReport {
    /// Whether every entry was applied
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Error reading or writing a session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid JSON document
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid RON document
    #[error("RON parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    /// RON encoding failure
    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),
}

/// Snapshot the whole graph
pub fn serialize(graph: &Graph) -> SessionDocument {
    let ids = graph.all_nodes();
    serialize_nodes(graph, &ids)
}

/// Snapshot a set of nodes and the connections internal to it
pub fn serialize_nodes(graph: &Graph, node_ids: &[NodeId]) -> SessionDocument {
    let wanted: HashSet<NodeId> = node_ids.iter().copied().collect();
    let mut document = SessionDocument::default();

    for node in graph.nodes().filter(|n| wanted.contains(&n.id())) {
        document
            .nodes
            .insert(node.id().to_string(), NodeRecord::from_node(node).into());
    }

    for connection in graph.connections() {
        if !wanted.contains(&connection.from_node) || !wanted.contains(&connection.to_node) {
            continue;
        }
        let (Some(output), Some(input)) = (
            graph.port(connection.output()),
            graph.port(connection.input()),
        ) else {
            continue;
        };
        let (from, to) = (connection.from_node.to_string(), connection.to_node.to_string());
        document.connections.push(
            ConnectionRecord::new((from.as_str(), output.name()), (to.as_str(), input.name())).into(),
        );
    }

    document
}

/// Rebuild nodes and connections from a document into `graph`.
///
/// Nodes are created through the registry before any connection is
/// resolved. Document IDs are kept unless they are not UUIDs or collide
/// with nodes already in the graph (as when pasting), in which case fresh
/// IDs are used. Pairs that are already connected are left alone.
///
/// `connected` counts the connections present at the end of the load, so a
/// connection that displaced an earlier one on a single-connection port is
/// counted once and reported as [`SkippedEntry::Displaced`].
pub fn deserialize(graph: &mut Graph, registry: &NodeRegistry, document: &SessionDocument) -> LoadReport {
    let mut report = LoadReport::default();
    let mut id_map: HashMap<&str, NodeId> = HashMap::new();
    let initial_connections = graph.connection_count();

    for (key, entry) in &document.nodes {
        let Entry::Valid(record) = entry else {
            skip(&mut report, SkippedEntry::MalformedNode { node: key.clone() });
            continue;
        };
        if let Some(node) = build_node(graph, registry, key, record, &mut report) {
            match graph.add_node(node) {
                Ok(id) => {
                    id_map.insert(key.as_str(), id);
                    report.created.push(id);
                }
                Err(err) => {
                    tracing::warn!("Skipping node {key}: {err}");
                    report.skipped.push(SkippedEntry::DuplicateNode { node: key.clone() });
                }
            }
        }
    }

    for (index, entry) in document.connections.iter().enumerate() {
        let endpoints = entry.valid().and_then(|record| {
            ConnectionRecord::endpoint(&record.input).zip(ConnectionRecord::endpoint(&record.output))
        });
        let Some(((in_node, in_port), (out_node, out_port))) = endpoints else {
            skip(&mut report, SkippedEntry::MalformedConnection { index });
            continue;
        };

        let resolve = |node_key: &str, port_name: &str, inputs: bool| {
            let Some(&node_id) = id_map.get(node_key) else {
                return Err(SkippedEntry::DanglingNode {
                    index,
                    node: node_key.to_string(),
                });
            };
            let port = graph.node(node_id).and_then(|node| {
                if inputs {
                    node.input_by_name(port_name)
                } else {
                    node.output_by_name(port_name)
                }
            });
            port.map(Port::port_ref).ok_or_else(|| SkippedEntry::MissingPort {
                index,
                node: node_key.to_string(),
                port: port_name.to_string(),
            })
        };

        let ends = resolve(in_node, in_port, true).and_then(|input| {
            resolve(out_node, out_port, false).map(|output| (output, input))
        });
        let (output, input) = match ends {
            Ok(ends) => ends,
            Err(entry) => {
                skip(&mut report, entry);
                continue;
            }
        };

        if graph.connection_between(output, input).is_some() {
            continue;
        }
        let before = graph.connection_count();
        match graph.connect(output, input) {
            Ok(_) if graph.connection_count() <= before => {
                skip(&mut report, SkippedEntry::Displaced { index });
            }
            Ok(_) => {}
            Err(reason) => skip(&mut report, SkippedEntry::Rejected { index, reason }),
        }
    }

    report.connected = graph.connection_count().saturating_sub(initial_connections);
    report
}

/// Paste a document into the graph.
///
/// Loads like [`deserialize`], then shifts the new nodes by `offset` and
/// makes them the selection.
pub fn paste(
    graph: &mut Graph,
    registry: &NodeRegistry,
    document: &SessionDocument,
    offset: [f32; 2],
) -> LoadReport {
    let report = deserialize(graph, registry, document);
    graph.clear_selection();
    for &id in &report.created {
        if let Some(mut node) = graph.node_mut(id) {
            let [x, y] = node.position;
            node.set_position(x + offset[0], y + offset[1]);
        }
        graph.set_selected(id, true);
    }
    report
}

fn build_node(
    graph: &Graph,
    registry: &NodeRegistry,
    key: &str,
    record: &NodeRecord,
    report: &mut LoadReport,
) -> Option<Node> {
    if record.type_tag.is_empty() {
        skip(report, SkippedEntry::MissingType { node: key.to_string() });
        return None;
    }
    let mut node = match registry.create(&record.type_tag) {
        Ok(node) => node,
        Err(_) => {
            skip(
                report,
                SkippedEntry::UnknownType {
                    node: key.to_string(),
                    type_tag: record.type_tag.clone(),
                },
            );
            return None;
        }
    };

    if let Some(id) = NodeId::parse(key).filter(|id| graph.node(*id).is_none()) {
        node.assign_id(id);
    }
    if !record.name.is_empty() {
        node.name = record.name.clone();
    }
    node.color = record.color;
    node.position = record.pos;
    node.selected = record.selected;
    node.disabled = record.disabled;
    node.visible = record.visible;

    for (name, value) in &record.properties {
        let Entry::Valid(value) = value else {
            skip(
                report,
                SkippedEntry::MalformedProperty {
                    node: key.to_string(),
                    name: name.clone(),
                },
            );
            continue;
        };
        if let Err(error) = node.set_property(name.as_str(), value.clone()) {
            skip(report, SkippedEntry::Property { node: key.to_string(), error });
        }
    }

    // Ports added after creation are not known to the factory
    for name in &record.inputs {
        if node.input_by_name(name).is_none() {
            let spec = saved_spec(name, record.input_options.get(name));
            if let Err(error) = node.add_input(spec) {
                skip(report, SkippedEntry::Port { node: key.to_string(), error });
            }
        }
    }
    for name in &record.outputs {
        if node.output_by_name(name).is_none() {
            let spec = saved_spec(name, record.output_options.get(name));
            if let Err(error) = node.add_output(spec) {
                skip(report, SkippedEntry::Port { node: key.to_string(), error });
            }
        }
    }

    Some(node)
}

fn saved_spec(name: &str, options: Option<&PortRecord>) -> PortSpec {
    options.map_or_else(|| PortSpec::new(name), |record| record.spec(name))
}

fn skip(report: &mut LoadReport, entry: SkippedEntry) {
    tracing::debug!("Skipping session entry: {entry}");
    report.skipped.push(entry);
}

/// Encode a document
pub fn to_string(document: &SessionDocument, format: SessionFormat) -> Result<String, SessionError> {
    match format {
        SessionFormat::Json => Ok(serde_json::to_string_pretty(document)?),
        SessionFormat::Ron => Ok(ron::ser::to_string_pretty(
            document,
            ron::ser::PrettyConfig::default(),
        )?),
    }
}

/// Decode a document
pub fn from_str(text: &str, format: SessionFormat) -> Result<SessionDocument, SessionError> {
    match format {
        SessionFormat::Json => Ok(serde_json::from_str(text)?),
        SessionFormat::Ron => Ok(ron::from_str(text)?),
    }
}

/// Save the graph to a file, choosing the format from the extension
pub fn save(graph: &Graph, path: &Path) -> Result<(), SessionError> {
    let text = to_string(&serialize(graph), SessionFormat::from_path(path))?;
    std::fs::write(path, text)?;
    tracing::info!("Saved session {} ({} nodes)", path.display(), graph.node_count());
    Ok(())
}

/// Load a session file into the graph, choosing the format from the extension
pub fn load(graph: &mut Graph, registry: &NodeRegistry, path: &Path) -> Result<LoadReport, SessionError> {
    let text = std::fs::read_to_string(path)?;
    let document = from_str(&text, SessionFormat::from_path(path))?;
    let report = deserialize(graph, registry, &document);
    tracing::info!(
        "Loaded session {} ({} nodes, {} connections, {} skipped)",
        path.display(),
        report.created.len(),
        report.connected,
        report.skipped.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortSpec;
    use crate::registry::NodeType;

    fn registry() -> NodeRegistry {
        NodeRegistry::builder()
            .register(NodeType::new("test.Source", "Source", || {
                Node::new("")
                    .with_output(PortSpec::new("out").data_type("float"))
                    .with_property("value", 1.0)
            }))
            .unwrap()
            .register(NodeType::new("test.Sink", "Sink", || {
                Node::new("")
                    .with_input(PortSpec::new("in").data_type("float"))
                    .with_property("label", "sink")
            }))
            .unwrap()
            .register(NodeType::new("test.Relay", "Relay", || {
                Node::new("").with_input("in").with_output("out")
            }))
            .unwrap()
            .build()
    }

    fn two_nodes(registry: &NodeRegistry) -> (Graph, NodeId, NodeId) {
        let mut graph = Graph::new("session");
        let a = graph
            .add_node(registry.create("test.Source").unwrap().with_position(10.0, 20.0))
            .unwrap();
        let b = graph.add_node(registry.create("test.Sink").unwrap()).unwrap();
        graph.set_property(a, "value", 2.5).unwrap();
        let out = graph.node(a).unwrap().output(0).unwrap().port_ref();
        let input = graph.node(b).unwrap().input(0).unwrap().port_ref();
        graph.connect(out, input).unwrap();
        (graph, a, b)
    }

    fn assert_same_shape(original: &Graph, loaded: &Graph) {
        assert_eq!(loaded.node_count(), original.node_count());
        assert_eq!(loaded.connection_count(), original.connection_count());
        for node in original.nodes() {
            let copy = loaded.node(node.id()).unwrap();
            assert_eq!(copy.type_tag(), node.type_tag());
            assert_eq!(copy.name, node.name);
            assert_eq!(copy.properties(), node.properties());
            assert_eq!(copy.position, node.position);
            let names = |ports: &[Port]| ports.iter().map(|p| p.name().to_string()).collect::<Vec<_>>();
            assert_eq!(names(copy.inputs()), names(node.inputs()));
            assert_eq!(names(copy.outputs()), names(node.outputs()));
        }
    }

    #[test]
    fn test_round_trip_json() {
        let registry = registry();
        let (graph, _, _) = two_nodes(&registry);
        let text = to_string(&serialize(&graph), SessionFormat::Json).unwrap();

        let mut loaded = Graph::new("loaded");
        let report = deserialize(&mut loaded, &registry, &from_str(&text, SessionFormat::Json).unwrap());
        assert!(report.is_clean());
        assert_eq!(report.connected, 1);
        assert_same_shape(&graph, &loaded);
    }

    #[test]
    fn test_round_trip_ron() {
        let registry = registry();
        let (graph, _, _) = two_nodes(&registry);
        let text = to_string(&serialize(&graph), SessionFormat::Ron).unwrap();

        let mut loaded = Graph::new("loaded");
        let report = deserialize(&mut loaded, &registry, &from_str(&text, SessionFormat::Ron).unwrap());
        assert!(report.is_clean());
        assert_same_shape(&graph, &loaded);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let registry = registry();
        let (graph, a, _) = two_nodes(&registry);
        let document = serialize(&graph);
        assert_eq!(document.nodes.keys().next(), Some(&a.to_string()));
        assert_eq!(
            to_string(&document, SessionFormat::Json).unwrap(),
            to_string(&serialize(&graph), SessionFormat::Json).unwrap()
        );
    }

    #[test]
    fn test_corrupt_entries_are_skipped() {
        let registry = registry();
        let text = r#"{
            "nodes": {
                "src": { "type": "test.Source", "properties": { "value": "text" } },
                "dst": { "type": "test.Sink", "name": "Out" },
                "odd": { "type": "test.Unknown" },
                "bare": { "name": "no type" }
            },
            "connections": [
                { "in": { "dst": "in" }, "out": { "src": "out" } },
                { "in": { "dst": "in" } },
                { "in": { "dst": "in" }, "out": { "ghost": "out" } },
                { "in": { "dst": "nope" }, "out": { "src": "out" } }
            ]
        }"#;
        let document = from_str(text, SessionFormat::Json).unwrap();
        let mut graph = Graph::new("corrupt");
        let report = deserialize(&mut graph, &registry, &document);

        assert_eq!(report.created.len(), 2);
        assert_eq!(report.connected, 1);
        assert_eq!(graph.connection_count(), 1);
        assert_eq!(graph.find_node_by_name("Out").map(Node::type_tag), Some("test.Sink"));
        assert_eq!(
            report.skipped,
            vec![
                SkippedEntry::Property {
                    node: "src".to_string(),
                    error: PropertyError::KindMismatch {
                        name: "value".to_string(),
                        expected: crate::property::PropertyKind::Float,
                        found: crate::property::PropertyKind::Str,
                    },
                },
                SkippedEntry::UnknownType {
                    node: "odd".to_string(),
                    type_tag: "test.Unknown".to_string(),
                },
                SkippedEntry::MissingType { node: "bare".to_string() },
                SkippedEntry::MalformedConnection { index: 1 },
                SkippedEntry::DanglingNode { index: 2, node: "ghost".to_string() },
                SkippedEntry::MissingPort {
                    index: 3,
                    node: "dst".to_string(),
                    port: "nope".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_duplicate_connection_entries_are_ignored() {
        let registry = registry();
        let (graph, _, _) = two_nodes(&registry);
        let mut document = serialize(&graph);
        let repeated = document.connections[0].clone();
        document.connections.push(repeated);

        let mut loaded = Graph::new("loaded");
        let report = deserialize(&mut loaded, &registry, &document);
        assert!(report.is_clean());
        assert_eq!(report.connected, 1);
        assert_eq!(loaded.connection_count(), 1);
    }

    #[test]
    fn test_rejected_connection_reported() {
        let registry = registry();
        let mut graph = Graph::new("cycle");
        let a = graph.add_node(registry.create("test.Relay").unwrap()).unwrap();
        let b = graph.add_node(registry.create("test.Relay").unwrap()).unwrap();
        let out = |g: &Graph, n| g.node(n).unwrap().output(0).unwrap().port_ref();
        let inp = |g: &Graph, n| g.node(n).unwrap().input(0).unwrap().port_ref();
        graph.connect(out(&graph, a), inp(&graph, b)).unwrap();

        let mut document = serialize(&graph);
        document.connections.push(
            ConnectionRecord::new((b.to_string().as_str(), "out"), (a.to_string().as_str(), "in")).into(),
        );

        let mut loaded = Graph::new("loaded");
        let report = deserialize(&mut loaded, &registry, &document);
        assert_eq!(report.connected, 1);
        assert_eq!(
            report.skipped,
            vec![SkippedEntry::Rejected { index: 1, reason: ConnectionError::Cycle }]
        );
    }

    #[test]
    fn test_paste_into_same_graph_remaps_ids() {
        let registry = registry();
        let (mut graph, a, b) = two_nodes(&registry);
        let document = serialize_nodes(&graph, &[a, b]);

        let report = deserialize(&mut graph, &registry, &document);
        assert_eq!(report.created.len(), 2);
        assert!(!report.created.contains(&a) && !report.created.contains(&b));
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.connection_count(), 2);
        assert_eq!(graph.downstream_nodes(report.created[0]), vec![report.created[1]]);
    }

    #[test]
    fn test_serialize_subset_drops_boundary_connections() {
        let registry = registry();
        let (mut graph, a, _) = two_nodes(&registry);
        let relay = graph.add_node(registry.create("test.Relay").unwrap()).unwrap();
        let a_out = graph.node(a).unwrap().output(0).unwrap().port_ref();
        let relay_in = graph.node(relay).unwrap().input(0).unwrap().port_ref();
        graph.connect(a_out, relay_in).unwrap();

        let document = serialize_nodes(&graph, &[a, relay]);
        assert_eq!(document.nodes.len(), 2);
        assert_eq!(document.connections.len(), 1);
    }

    #[test]
    fn test_dynamic_ports_are_recreated() {
        let registry = registry();
        let mut graph = Graph::new("dynamic");
        let relay = graph.add_node(registry.create("test.Relay").unwrap()).unwrap();
        graph.add_input(relay, PortSpec::new("extra")).unwrap();

        let mut loaded = Graph::new("loaded");
        deserialize(&mut loaded, &registry, &serialize(&graph));
        let node = loaded.node(relay).unwrap();
        assert_eq!(node.inputs().len(), 2);
        assert!(node.input_by_name("extra").is_some());
    }

    #[test]
    fn test_runtime_port_options_survive_round_trip() {
        let registry = registry();
        let mut graph = Graph::new("options");
        let relay = graph.add_node(registry.create("test.Relay").unwrap()).unwrap();
        let items = graph
            .add_input(relay, PortSpec::new("items").data_type("Float").multiple(true).hide_name())
            .unwrap();
        graph.add_output(relay, PortSpec::new("frozen").locked()).unwrap();
        for _ in 0..2 {
            let source = graph.add_node(registry.create("test.Source").unwrap()).unwrap();
            let out = graph.node(source).unwrap().output(0).unwrap().port_ref();
            graph.connect(out, items).unwrap();
        }
        assert_eq!(graph.connection_count(), 2);

        for format in [SessionFormat::Json, SessionFormat::Ron] {
            let text = to_string(&serialize(&graph), format).unwrap();
            let mut loaded = Graph::new("loaded");
            let report = deserialize(&mut loaded, &registry, &from_str(&text, format).unwrap());
            assert!(report.is_clean(), "{:?}", report.skipped);
            assert_eq!(report.connected, 2);
            assert_same_shape(&graph, &loaded);

            let node = loaded.node(relay).unwrap();
            let port = node.input_by_name("items").unwrap();
            assert!(port.allows_multiple());
            assert!(!port.display_name);
            assert_eq!(port.data_type, DataType::new("float"));
            assert_eq!(loaded.connected_ports(port.port_ref()).len(), 2);
            let frozen = node.output_by_name("frozen").unwrap();
            assert!(frozen.locked);
            assert!(frozen.allows_multiple());
        }
    }

    #[test]
    fn test_default_ports_write_no_options() {
        let registry = registry();
        let mut graph = Graph::new("plain");
        let relay = graph.add_node(registry.create("test.Relay").unwrap()).unwrap();
        let document = serialize(&graph);
        let record = document.nodes[&relay.to_string()].valid().unwrap();
        assert!(record.input_options.is_empty());
        assert!(record.output_options.is_empty());
        assert!(!to_string(&document, SessionFormat::Json).unwrap().contains("_options"));
    }

    #[test]
    fn test_displaced_connection_counted_once() {
        let registry = registry();
        let text = r#"{
            "nodes": {
                "first": { "type": "test.Source" },
                "second": { "type": "test.Source" },
                "sink": { "type": "test.Sink" }
            },
            "connections": [
                { "in": { "sink": "in" }, "out": { "first": "out" } },
                { "in": { "sink": "in" }, "out": { "second": "out" } }
            ]
        }"#;
        let mut graph = Graph::new("displaced");
        let report = deserialize(&mut graph, &registry, &from_str(text, SessionFormat::Json).unwrap());

        assert_eq!(report.connected, 1);
        assert_eq!(graph.connection_count(), 1);
        assert_eq!(report.skipped, vec![SkippedEntry::Displaced { index: 1 }]);
        let second = report.created[1];
        let sink = report.created[2];
        assert_eq!(graph.upstream_nodes(sink), vec![second]);
    }

    #[test]
    fn test_malformed_values_skip_only_their_entry() {
        let registry = registry();
        let text = r#"{
            "nodes": {
                "src": { "type": "test.Source", "properties": { "value": null, "flag": true } },
                "dst": { "type": "test.Sink", "properties": { "label": "kept" } },
                "bad": { "type": "test.Relay", "pos": "left" },
                "worse": 42
            },
            "connections": [
                "oops",
                { "in": { "dst": "in" }, "out": { "src": "out" } },
                { "in": 3 }
            ]
        }"#;
        let document = from_str(text, SessionFormat::Json).unwrap();
        let mut graph = Graph::new("lenient");
        let report = deserialize(&mut graph, &registry, &document);

        assert_eq!(report.created.len(), 2);
        assert_eq!(report.connected, 1);
        let source = graph.node(report.created[0]).unwrap();
        assert_eq!(source.property("value"), Some(&PropertyValue::Float(1.0)));
        let sink = graph.node(report.created[1]).unwrap();
        assert_eq!(sink.property("label"), Some(&PropertyValue::from("kept")));
        assert_eq!(
            report.skipped,
            vec![
                SkippedEntry::MalformedProperty {
                    node: "src".to_string(),
                    name: "value".to_string(),
                },
                SkippedEntry::MalformedProperty {
                    node: "src".to_string(),
                    name: "flag".to_string(),
                },
                SkippedEntry::MalformedNode { node: "bad".to_string() },
                SkippedEntry::MalformedNode { node: "worse".to_string() },
                SkippedEntry::MalformedConnection { index: 0 },
                SkippedEntry::MalformedConnection { index: 2 },
            ]
        );
    }

    #[test]
    fn test_non_finite_property_never_reaches_a_document() {
        let registry = registry();
        let (mut graph, a, _) = two_nodes(&registry);
        assert!(graph.set_property(a, "value", f64::NAN).is_err());
        assert!(graph.set_property(a, "value", f64::INFINITY).is_err());

        let text = to_string(&serialize(&graph), SessionFormat::Json).unwrap();
        assert!(!text.contains("null"));
        let mut loaded = Graph::new("loaded");
        let report = deserialize(&mut loaded, &registry, &from_str(&text, SessionFormat::Json).unwrap());
        assert!(report.is_clean());
        assert_eq!(loaded.node(a).unwrap().property("value"), Some(&PropertyValue::Float(2.5)));
    }

    #[test]
    fn test_non_finite_document_value_is_refused() {
        let registry = registry();
        let mut document = SessionDocument::default();
        let mut record = serialize(&two_nodes(&registry).0).nodes[0].valid().unwrap().clone();
        record.properties.insert("value".to_string(), PropertyValue::Float(f64::NAN).into());
        document.nodes.insert("n".to_string(), record.into());

        let mut graph = Graph::new("nan");
        let report = deserialize(&mut graph, &registry, &document);
        assert_eq!(report.created.len(), 1);
        assert!(matches!(
            report.skipped.as_slice(),
            [SkippedEntry::Property { error: PropertyError::NonFinite { .. }, .. }]
        ));
    }

    #[test]
    fn test_paste_offsets_and_selects() {
        let registry = registry();
        let (mut graph, a, b) = two_nodes(&registry);
        graph.set_selected(a, true);
        let document = serialize_nodes(&graph, &[a, b]);

        let report = paste(&mut graph, &registry, &document, [20.0, 5.0]);
        assert_eq!(report.created.len(), 2);
        assert_eq!(report.connected, 1);
        assert_eq!(graph.selected_nodes(), report.created);
        let copy = graph.node(report.created[0]).unwrap();
        assert_eq!(copy.position, [30.0, 25.0]);
        assert_eq!(graph.node(a).unwrap().position, [10.0, 20.0]);
    }

    #[test]
    fn test_rgb_color_and_missing_fields() {
        let registry = registry();
        let text = r#"{ "nodes": { "n": { "type": "test.Relay", "color": [255, 0, 0] } } }"#;
        let mut graph = Graph::new("colors");
        let report = deserialize(&mut graph, &registry, &from_str(text, SessionFormat::Json).unwrap());
        let node = graph.node(report.created[0]).unwrap();
        assert_eq!(node.color, Color::rgb(255, 0, 0));
        assert_eq!(node.name, "Relay");
        assert!(node.visible);
    }

    #[test]
    fn test_save_and_load_file() {
        let registry = registry();
        let (graph, _, _) = two_nodes(&registry);
        let dir = tempfile::tempdir().unwrap();

        for file in ["session.json", "session.ron"] {
            let path = dir.path().join(file);
            save(&graph, &path).unwrap();
            let mut loaded = Graph::new("loaded");
            let report = load(&mut loaded, &registry, &path).unwrap();
            assert!(report.is_clean());
            assert_same_shape(&graph, &loaded);
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(SessionFormat::from_path(Path::new("a.RON")), SessionFormat::Ron);
        assert_eq!(SessionFormat::from_path(Path::new("a.json")), SessionFormat::Json);
        assert_eq!(SessionFormat::from_path(Path::new("a")), SessionFormat::Json);
        assert_eq!(SessionFormat::from_extension(Path::new("a.txt")), None);
    }

    #[test]
    fn test_invalid_document() {
        assert!(matches!(
            from_str("{ nodes: 3 }", SessionFormat::Json),
            Err(SessionError::Json(_))
        ));
        assert!(matches!(from_str("(", SessionFormat::Ron), Err(SessionError::RonParse(_))));
    }
}
