// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection legality checks.
//!
//! The checks run in a fixed order and stop at the first failure:
//!
//! 1. both ports exist
//! 2. they are not the same port
//! 3. their directions differ
//! 4. they belong to different nodes
//! 5. neither is locked
//! 6. the pipe would not close a cycle (optional)
//! 7. the data types are compatible (optional)
//!
//! Nothing here mutates the graph.

use crate::graph::Graph;
use crate::node::NodeId;
use crate::port::{DataType, PortDirection, PortRef, TypeCompatibility};
use std::collections::{HashSet, VecDeque};

/// Reason a connection was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(PortRef),

    /// Both ends are the same port
    #[error("Cannot connect a port to itself")]
    SamePort,

    /// Both ports are inputs or both are outputs
    #[error("Both ports are {0}s")]
    SameDirection(PortDirection),

    /// Both ports are on the same node
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// A port is locked
    #[error("Port is locked: {0}")]
    PortLocked(PortRef),

    /// The pipe would close a cycle
    #[error("Connection would create a cycle")]
    Cycle,

    /// Incompatible port types
    #[error("Incompatible port types: {output} -> {input}")]
    IncompatiblePorts {
        /// Output port type
        output: DataType,
        /// Input port type
        input: DataType,
    },
}

/// Optional validation layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Refuse pipes that close a cycle
    pub check_cycles: bool,
    /// Refuse pipes between incompatible data types
    pub check_types: bool,
    /// Implicit conversions accepted by the type check
    pub compatibility: TypeCompatibility,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            check_cycles: true,
            check_types: true,
            compatibility: TypeCompatibility::standard(),
        }
    }
}

/// Check whether `a` and `b` may be connected.
///
/// The ports may be given in either order. On success the pair is returned
/// as `(output, input)`.
pub fn check_connection(
    graph: &Graph,
    a: PortRef,
    b: PortRef,
    options: &ValidationOptions,
) -> Result<(PortRef, PortRef), ConnectionError> {
    let port_a = graph.port(a).ok_or(ConnectionError::PortNotFound(a))?;
    let port_b = graph.port(b).ok_or(ConnectionError::PortNotFound(b))?;

    if a == b {
        return Err(ConnectionError::SamePort);
    }
    if port_a.direction() == port_b.direction() {
        return Err(ConnectionError::SameDirection(port_a.direction()));
    }
    if a.node == b.node {
        return Err(ConnectionError::SelfLoop);
    }
    if port_a.locked {
        return Err(ConnectionError::PortLocked(a));
    }
    if port_b.locked {
        return Err(ConnectionError::PortLocked(b));
    }

    let (output, input, output_port, input_port) = if port_a.is_output() {
        (a, b, port_a, port_b)
    } else {
        (b, a, port_b, port_a)
    };

    if options.check_cycles && would_create_cycle(graph, output.node, input.node) {
        return Err(ConnectionError::Cycle);
    }
    if options.check_types && !output_port.can_connect(input_port, &options.compatibility) {
        return Err(ConnectionError::IncompatiblePorts {
            output: output_port.data_type.clone(),
            input: input_port.data_type.clone(),
        });
    }

    Ok((output, input))
}

/// Boolean form of [`check_connection`]
pub fn is_legal(graph: &Graph, a: PortRef, b: PortRef, options: &ValidationOptions) -> bool {
    check_connection(graph, a, b, options).is_ok()
}

/// Whether a pipe from `upstream` into `downstream` would close a cycle.
///
/// Walks forward from `downstream` through output pipes, breadth first; the
/// pipe is cyclic if `upstream` is reachable. Each node is visited at most
/// once, so graphs that already contain cycles still terminate.
pub fn would_create_cycle(graph: &Graph, upstream: NodeId, downstream: NodeId) -> bool {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(downstream);
    queue.push_back(downstream);

    while let Some(node_id) = queue.pop_front() {
        if node_id == upstream {
            return true;
        }
        let Some(node) = graph.node(node_id) else {
            continue;
        };
        for port in node.outputs() {
            for next in graph.connected_ports(port.port_ref()) {
                if visited.insert(next.node) {
                    queue.push_back(next.node);
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::port::{PortId, PortSpec};

    struct Chain {
        graph: Graph,
        ins: Vec<PortRef>,
        outs: Vec<PortRef>,
    }

    /// Nodes `0 -> 1 -> ... -> n-1`, each with one input and one output
    fn chain(n: usize) -> Chain {
        let mut graph = Graph::new("chain");
        let mut ins = Vec::new();
        let mut outs = Vec::new();
        for i in 0..n {
            let node = Node::new(format!("n{i}")).with_input("in").with_output("out");
            ins.push(node.input(0).unwrap().port_ref());
            outs.push(node.output(0).unwrap().port_ref());
            graph.add_node(node).unwrap();
        }
        for i in 1..n {
            graph.connect(outs[i - 1], ins[i]).unwrap();
        }
        Chain { graph, ins, outs }
    }

    #[test]
    fn test_rule_order() {
        let Chain { graph, ins, outs } = chain(2);
        let options = ValidationOptions::default();
        let ghost = PortRef::new(ins[0].node, PortId::new());

        assert_eq!(
            check_connection(&graph, ghost, ins[1], &options),
            Err(ConnectionError::PortNotFound(ghost))
        );
        assert_eq!(
            check_connection(&graph, outs[0], outs[0], &options),
            Err(ConnectionError::SamePort)
        );
        assert_eq!(
            check_connection(&graph, outs[0], outs[1], &options),
            Err(ConnectionError::SameDirection(PortDirection::Output))
        );
        assert_eq!(
            check_connection(&graph, outs[0], ins[0], &options),
            Err(ConnectionError::SelfLoop)
        );
    }

    #[test]
    fn test_order_of_arguments_is_normalized() {
        let Chain { graph, ins, outs } = chain(3);
        let options = ValidationOptions::default();
        assert_eq!(
            check_connection(&graph, ins[2], outs[0], &options),
            Ok((outs[0], ins[2]))
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let Chain { graph, ins, outs } = chain(3);
        let options = ValidationOptions::default();
        assert_eq!(
            check_connection(&graph, outs[2], ins[0], &options),
            Err(ConnectionError::Cycle)
        );
        assert!(would_create_cycle(&graph, outs[2].node, ins[0].node));
        assert!(!would_create_cycle(&graph, outs[0].node, ins[2].node));

        let relaxed = ValidationOptions {
            check_cycles: false,
            ..ValidationOptions::default()
        };
        assert!(is_legal(&graph, outs[2], ins[0], &relaxed));
    }

    #[test]
    fn test_cycle_check_terminates_on_cyclic_graph() {
        let Chain { mut graph, ins, outs } = chain(3);
        graph.set_options(ValidationOptions {
            check_cycles: false,
            ..ValidationOptions::default()
        });
        graph.connect(outs[2], ins[0]).unwrap();

        let extra = Node::new("extra").with_input("in");
        let extra_in = extra.input(0).unwrap().port_ref();
        graph.add_node(extra).unwrap();

        assert!(!would_create_cycle(&graph, outs[1].node, extra_in.node));
        assert!(would_create_cycle(&graph, outs[1].node, ins[0].node));
    }

    #[test]
    fn test_type_check() {
        let mut graph = Graph::new("types");
        let source = Node::new("source").with_output(PortSpec::new("out").data_type("string"));
        let sink = Node::new("sink")
            .with_input(PortSpec::new("f").data_type("float"))
            .with_input(PortSpec::new("any"));
        let out = source.output(0).unwrap().port_ref();
        let float_in = sink.input(0).unwrap().port_ref();
        let any_in = sink.input(1).unwrap().port_ref();
        graph.add_node(source).unwrap();
        graph.add_node(sink).unwrap();

        let options = ValidationOptions::default();
        assert_eq!(
            check_connection(&graph, out, float_in, &options),
            Err(ConnectionError::IncompatiblePorts {
                output: DataType::new("string"),
                input: DataType::new("float"),
            })
        );
        assert!(is_legal(&graph, out, any_in, &options));
    }

    #[test]
    fn test_locked_port() {
        let mut graph = Graph::new("locked");
        let source = Node::new("source").with_output(PortSpec::new("out").locked());
        let sink = Node::new("sink").with_input("in");
        let out = source.output(0).unwrap().port_ref();
        let input = sink.input(0).unwrap().port_ref();
        graph.add_node(source).unwrap();
        graph.add_node(sink).unwrap();

        assert_eq!(
            check_connection(&graph, input, out, &ValidationOptions::default()),
            Err(ConnectionError::PortLocked(out))
        );
    }
}
