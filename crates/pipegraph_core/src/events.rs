// SPDX-License-Identifier: MIT OR Apache-2.0
//! Change notifications for the view layer.
//!
//! Every graph mutation queues a [`GraphEvent`]. A view drains the queue with
//! [`Graph::take_events`](crate::Graph::take_events) after forwarding a user
//! intent and updates its presentation from the result.

use crate::connection::ConnectionId;
use crate::node::NodeId;
use crate::port::PortRef;
use crate::validation::ConnectionError;

/// A change applied to (or refused by) a graph
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// A node was inserted
    NodeAdded(NodeId),

    /// A node and all its connections were removed
    NodeRemoved(NodeId),

    /// Two ports were connected
    PortsConnected {
        /// New connection
        connection: ConnectionId,
        /// Output end
        output: PortRef,
        /// Input end
        input: PortRef,
    },

    /// A connection was removed
    PortsDisconnected {
        /// Removed connection
        connection: ConnectionId,
        /// Output end
        output: PortRef,
        /// Input end
        input: PortRef,
    },

    /// A connection request failed validation
    ConnectionRejected {
        /// First requested port
        a: PortRef,
        /// Second requested port
        b: PortRef,
        /// Violated rule
        reason: ConnectionError,
    },

    /// A property value changed through the graph
    PropertyChanged {
        /// Node
        node: NodeId,
        /// Property name
        name: String,
    },
}
