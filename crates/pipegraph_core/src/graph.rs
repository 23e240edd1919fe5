// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and connections.
//!
//! Nodes own their ports; connections live here and each port keeps the IDs
//! of the connections it takes part in. Every mutation either completes or
//! fails before touching anything.

use crate::connection::{Connection, ConnectionId};
use crate::events::GraphEvent;
use crate::node::{Node, NodeError, NodeId, NodeMut};
use crate::port::{Port, PortRef, PortSpec};
use crate::property::{PropertyError, PropertyValue};
use crate::validation::{self, ConnectionError, ValidationOptions};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// A node graph
#[derive(Debug, Clone)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Connections between nodes
    connections: IndexMap<ConnectionId, Connection>,
    /// Optional validation layers
    options: ValidationOptions,
    /// Pending notifications for the view
    events: Vec<GraphEvent>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            options: ValidationOptions::default(),
            events: Vec::new(),
        }
    }

    /// Use the given validation options
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Validation options
    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Replace the validation options. Existing connections are kept.
    pub fn set_options(&mut self, options: ValidationOptions) {
        self.options = options;
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, mut node: Node) -> Result<NodeId, GraphError> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateId(id));
        }
        // Connection IDs from another graph mean nothing here
        node.clear_connections();
        tracing::debug!("Added node {} ({id})", node.name);
        self.nodes.insert(id, node);
        self.events.push(GraphEvent::NodeAdded(id));
        Ok(id)
    }

    /// Remove a node and its connections
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let ports: Vec<PortRef> = self
            .nodes
            .get(&node_id)?
            .ports()
            .map(Port::port_ref)
            .collect();
        for port in ports {
            self.disconnect_all(port);
        }
        let node = self.nodes.shift_remove(&node_id)?;
        tracing::debug!("Removed node {} ({node_id})", node.name);
        self.events.push(GraphEvent::NodeRemoved(node_id));
        Some(node)
    }

    /// Remove every node and connection
    pub fn clear(&mut self) {
        for id in self.all_nodes() {
            self.remove_node(id);
        }
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Edit a node's presentation state
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<NodeMut<'_>> {
        self.nodes.get_mut(&node_id).map(NodeMut::new)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Snapshot of all node IDs
    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.node_ids().collect()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// First node with this name. Names are not unique.
    pub fn find_node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.values().find(|n| n.name == name)
    }

    /// Nodes created from this registry type
    pub fn nodes_by_type<'a>(&'a self, type_tag: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.values().filter(move |n| n.type_tag() == type_tag)
    }

    /// `base`, or `base 1`, `base 2`, ... whichever is unused first
    pub fn unique_name(&self, base: &str) -> String {
        let taken: HashSet<&str> = self.nodes.values().map(|n| n.name.as_str()).collect();
        if !taken.contains(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{base} {i}"))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| base.to_string())
    }

    /// Get a port by reference
    pub fn port(&self, port: PortRef) -> Option<&Port> {
        self.nodes.get(&port.node)?.port(&port.port)
    }

    fn port_mut(&mut self, port: PortRef) -> Option<&mut Port> {
        self.nodes.get_mut(&port.node)?.port_mut(&port.port)
    }

    /// Add an input port to a node in the graph
    pub fn add_input(
        &mut self,
        node_id: NodeId,
        spec: impl Into<PortSpec>,
    ) -> Result<PortRef, GraphError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        let port = node.add_input(spec)?;
        Ok(PortRef::new(node_id, port))
    }

    /// Add an output port to a node in the graph
    pub fn add_output(
        &mut self,
        node_id: NodeId,
        spec: impl Into<PortSpec>,
    ) -> Result<PortRef, GraphError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        let port = node.add_output(spec)?;
        Ok(PortRef::new(node_id, port))
    }

    /// Set a node property, notifying the view
    pub fn set_property(
        &mut self,
        node_id: NodeId,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        node.set_property(name, value)?;
        self.events.push(GraphEvent::PropertyChanged {
            node: node_id,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Connect two ports, given in either order.
    ///
    /// Connections already held by a single-connection port on either end
    /// are replaced. Connecting an already connected pair returns the
    /// existing connection.
    pub fn connect(&mut self, a: PortRef, b: PortRef) -> Result<ConnectionId, ConnectionError> {
        let (output, input) = match validation::check_connection(self, a, b, &self.options) {
            Ok(pair) => pair,
            Err(reason) => {
                tracing::debug!("Rejected connection {a} -> {b}: {reason}");
                self.events.push(GraphEvent::ConnectionRejected {
                    a,
                    b,
                    reason: reason.clone(),
                });
                return Err(reason);
            }
        };

        if let Some(existing) = self.connection_between(output, input) {
            return Ok(existing);
        }

        for end in [output, input] {
            let replaced: Vec<ConnectionId> = match self.port(end) {
                Some(port) if !port.allows_multiple() => port.connections().to_vec(),
                _ => Vec::new(),
            };
            for connection_id in replaced {
                self.disconnect(connection_id);
            }
        }

        let connection = Connection::new(output, input);
        let id = connection.id;
        for end in [output, input] {
            if let Some(port) = self.port_mut(end) {
                port.attach(id);
            }
        }
        self.connections.insert(id, connection);
        tracing::debug!("Connected {output} -> {input}");
        self.events.push(GraphEvent::PortsConnected {
            connection: id,
            output,
            input,
        });
        Ok(id)
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.shift_remove(&connection_id)?;
        for end in [connection.output(), connection.input()] {
            if let Some(port) = self.port_mut(end) {
                port.detach(connection_id);
            }
        }
        tracing::debug!(
            "Disconnected {} -> {}",
            connection.output(),
            connection.input()
        );
        self.events.push(GraphEvent::PortsDisconnected {
            connection: connection_id,
            output: connection.output(),
            input: connection.input(),
        });
        Some(connection)
    }

    /// Remove the connection between two ports, if there is one
    pub fn disconnect_ports(&mut self, a: PortRef, b: PortRef) -> Option<Connection> {
        let id = self.connection_between(a, b)?;
        self.disconnect(id)
    }

    /// Remove every connection of a port
    pub fn disconnect_all(&mut self, port: PortRef) -> Vec<Connection> {
        let ids = self
            .port(port)
            .map(|p| p.connections().to_vec())
            .unwrap_or_default();
        ids.into_iter().filter_map(|id| self.disconnect(id)).collect()
    }

    /// Disconnect a port and remove it from its node
    pub fn remove_port(&mut self, port: PortRef) -> Option<Port> {
        self.port(port)?;
        self.disconnect_all(port);
        self.nodes.get_mut(&port.node)?.remove_port(&port.port)
    }

    /// Connection joining two ports, in either order
    pub fn connection_between(&self, a: PortRef, b: PortRef) -> Option<ConnectionId> {
        let port = self.port(a)?;
        port.connections()
            .iter()
            .copied()
            .find(|id| self.connections.get(id).is_some_and(|c| c.joins(a, b)))
    }

    /// Ports at the other end of each of this port's connections
    pub fn connected_ports(&self, port: PortRef) -> Vec<PortRef> {
        let Some(p) = self.port(port) else {
            return Vec::new();
        };
        p.connections()
            .iter()
            .filter_map(|id| self.connections.get(id))
            .filter_map(|c| c.other_end(port))
            .collect()
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Nodes feeding this node's inputs, in connection order
    pub fn upstream_nodes(&self, node_id: NodeId) -> Vec<NodeId> {
        self.neighbours(node_id, |node| node.inputs())
    }

    /// Nodes fed by this node's outputs, in connection order
    pub fn downstream_nodes(&self, node_id: NodeId) -> Vec<NodeId> {
        self.neighbours(node_id, |node| node.outputs())
    }

    fn neighbours(&self, node_id: NodeId, side: impl Fn(&Node) -> &[Port]) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(&node_id) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        side(node)
            .iter()
            .flat_map(|port| self.connected_ports(port.port_ref()))
            .map(|p| p.node)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Select a node
    pub fn select(&mut self, node_id: NodeId) {
        self.set_selected(node_id, true);
    }

    /// Set a node's selection state
    pub fn set_selected(&mut self, node_id: NodeId, selected: bool) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.selected = selected;
        }
    }

    /// Select every node
    pub fn select_all(&mut self) {
        for node in self.nodes.values_mut() {
            node.selected = true;
        }
    }

    /// Deselect every node
    pub fn clear_selection(&mut self) {
        for node in self.nodes.values_mut() {
            node.selected = false;
        }
    }

    /// Snapshot of selected node IDs
    pub fn selected_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.selected)
            .map(Node::id)
            .collect()
    }

    /// Copy nodes with fresh IDs, keeping only connections internal to the set.
    ///
    /// Copies are moved by `offset` and become the selection. Unknown IDs are
    /// ignored. Returns the new node IDs in the order given.
    pub fn duplicate(&mut self, node_ids: &[NodeId], offset: [f32; 2]) -> Vec<NodeId> {
        let mut node_map: HashMap<NodeId, NodeId> = HashMap::new();
        let mut port_map: HashMap<PortRef, PortRef> = HashMap::new();
        let mut copies = Vec::new();

        for id in node_ids {
            if node_map.contains_key(id) {
                continue;
            }
            let Some(original) = self.nodes.get(id) else {
                continue;
            };
            let (mut copy, ports) = original.fork();
            copy.position = [copy.position[0] + offset[0], copy.position[1] + offset[1]];
            copy.selected = true;
            for (old, new) in ports {
                port_map.insert(PortRef::new(*id, old), PortRef::new(copy.id(), new));
            }
            node_map.insert(*id, copy.id());
            copies.push(copy);
        }

        let internal: Vec<(PortRef, PortRef)> = self
            .connections
            .values()
            .filter(|c| node_map.contains_key(&c.from_node) && node_map.contains_key(&c.to_node))
            .filter_map(|c| Some((*port_map.get(&c.output())?, *port_map.get(&c.input())?)))
            .collect();

        self.clear_selection();
        let mut created = Vec::with_capacity(copies.len());
        for copy in copies {
            match self.add_node(copy) {
                Ok(id) => created.push(id),
                Err(err) => tracing::warn!("Dropped duplicate: {err}"),
            }
        }
        for (output, input) in internal {
            if let Err(err) = self.connect(output, input) {
                tracing::warn!("Dropped duplicated connection {output} -> {input}: {err}");
            }
        }
        created
    }

    /// Input feeding output `output_index` while the node is bypassed.
    ///
    /// Only disabled pass-through nodes forward; the input index is clamped
    /// to the last input.
    pub fn pass_through_source(&self, node_id: NodeId, output_index: usize) -> Option<PortRef> {
        let node = self.nodes.get(&node_id)?;
        if !node.disabled || !node.pass_through || node.output(output_index).is_none() {
            return None;
        }
        let last = node.inputs().len().checked_sub(1)?;
        node.input(output_index.min(last)).map(Port::port_ref)
    }

    /// Get nodes in topological order (producers before consumers)
    pub fn topological_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let mut visited = HashSet::new();
        let mut temp_mark = HashSet::new();
        let mut order = Vec::new();

        for node_id in self.nodes.keys() {
            if !visited.contains(node_id) {
                self.visit(*node_id, &mut visited, &mut temp_mark, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        node_id: NodeId,
        visited: &mut HashSet<NodeId>,
        temp_mark: &mut HashSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) -> Result<(), CycleError> {
        if temp_mark.contains(&node_id) {
            return Err(CycleError);
        }
        if visited.contains(&node_id) {
            return Ok(());
        }

        temp_mark.insert(node_id);

        // Visit all nodes that this node depends on
        for upstream in self.upstream_nodes(node_id) {
            self.visit(upstream, visited, temp_mark, order)?;
        }

        temp_mark.remove(&node_id);
        visited.insert(node_id);
        order.push(node_id);

        Ok(())
    }

    /// Pending notifications
    pub fn events(&self) -> &[GraphEvent] {
        &self.events
    }

    /// Drain pending notifications
    pub fn take_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error from a graph mutation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A node with this ID is already present
    #[error("Duplicate node ID: {0}")]
    DuplicateId(NodeId),

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Rejected property write
    #[error(transparent)]
    Property(#[from] PropertyError),

    /// Rejected port edit
    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Error when graph contains a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Graph contains a cycle")]
pub struct CycleError;
