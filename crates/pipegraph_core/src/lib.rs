// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connectivity model for node-graph editors.
//!
//! This crate holds the data side of a node editor: nodes with named input
//! and output ports, the pipes joining them, and the rules deciding which
//! pipes are legal. Rendering and interaction live in the host.
//!
//! ## Architecture
//!
//! - [`Graph`] owns every node and connection, addressed by id
//! - [`validation`] decides whether two ports may be joined
//! - [`NodeRegistry`] maps type tags to node factories
//! - [`session`] saves and restores graphs as JSON or RON
//! - [`GraphSettings`] configures validation and editing defaults
//!
//! ```
//! use pipegraph_core::{Graph, Node};
//!
//! let mut graph = Graph::new("demo");
//! let source = Node::new("source").with_output("out");
//! let sink = Node::new("sink").with_input("in");
//! let out = source.output(0).unwrap().port_ref();
//! let input = sink.input(0).unwrap().port_ref();
//! graph.add_node(source)?;
//! graph.add_node(sink)?;
//!
//! graph.connect(out, input).unwrap();
//! assert_eq!(graph.connection_count(), 1);
//! # Ok::<(), pipegraph_core::GraphError>(())
//! ```

pub mod connection;
pub mod events;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod port;
pub mod property;
pub mod registry;
pub mod session;
pub mod settings;
pub mod shared;
pub mod validation;

pub use connection::{Connection, ConnectionId};
pub use events::GraphEvent;
pub use graph::{CycleError, Graph, GraphError};
pub use node::{Color, Node, NodeError, NodeId, NodeMut};
pub use port::{DataType, Port, PortDirection, PortId, PortRef, PortSpec, TypeCompatibility};
pub use property::{PropertyError, PropertyKind, PropertyValue};
pub use registry::{NodeRegistry, NodeType, RegistryBuilder, RegistryError};
pub use session::{LoadReport, SessionDocument, SessionError, SessionFormat, SkippedEntry};
pub use settings::{GraphSettings, SettingsError};
pub use shared::SharedGraph;
pub use validation::{ConnectionError, ValidationOptions};
