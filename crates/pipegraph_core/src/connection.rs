// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (pipe) definitions for the graph.

use crate::node::NodeId;
use crate::port::{PortId, PortRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A pipe from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Source (output side) node ID
    pub from_node: NodeId,
    /// Source output port ID
    pub from_port: PortId,
    /// Target (input side) node ID
    pub to_node: NodeId,
    /// Target input port ID
    pub to_port: PortId,
}

impl Connection {
    /// Create a new connection from an output port to an input port
    pub fn new(output: PortRef, input: PortRef) -> Self {
        Self {
            id: ConnectionId::new(),
            from_node: output.node,
            from_port: output.port,
            to_node: input.node,
            to_port: input.port,
        }
    }

    /// The output endpoint
    pub fn output(&self) -> PortRef {
        PortRef::new(self.from_node, self.from_port)
    }

    /// The input endpoint
    pub fn input(&self) -> PortRef {
        PortRef::new(self.to_node, self.to_port)
    }

    /// The endpoint opposite to `port`, if `port` is one of the two ends
    pub fn other_end(&self, port: PortRef) -> Option<PortRef> {
        if self.output() == port {
            Some(self.input())
        } else if self.input() == port {
            Some(self.output())
        } else {
            None
        }
    }

    /// Whether this connection joins the two ports, in either order
    pub fn joins(&self, a: PortRef, b: PortRef) -> bool {
        (self.output() == a && self.input() == b) || (self.output() == b && self.input() == a)
    }
}
