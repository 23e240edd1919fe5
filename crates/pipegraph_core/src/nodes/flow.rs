// SPDX-License-Identifier: MIT OR Apache-2.0
//! Routing nodes.

use crate::node::{Color, Node};
use crate::port::PortSpec;
use crate::registry::{NodeRegistry, NodeType, RegistryError};

/// Picks one of two inputs; forwards `a` when disabled
pub const SWITCH: &str = "pipegraph.flow.Switch";
/// Collects any number of values into one list
pub const GROUP: &str = "pipegraph.flow.Group";
/// Labelled wire junction
pub const REROUTE: &str = "pipegraph.flow.Reroute";

const FLOW_COLOR: Color = Color::rgb(70, 50, 90);

pub(crate) fn register(registry: &mut NodeRegistry) -> Result<(), RegistryError> {
    registry.register(
        NodeType::new(SWITCH, "Switch", || {
            Node::new("")
                .with_color(FLOW_COLOR)
                .with_pass_through()
                .with_input("a")
                .with_input("b")
                .with_input(PortSpec::new("select").data_type("int"))
                .with_output("out")
        })
        .with_description("Forward one of two inputs"),
    )?;

    registry.register(
        NodeType::new(GROUP, "Group", || {
            Node::new("")
                .with_color(FLOW_COLOR)
                .with_input(PortSpec::new("items").multiple(true))
                .with_output(PortSpec::new("list").data_type("list"))
        })
        .with_description("Collect connected values into a list"),
    )?;

    registry.register(
        NodeType::new(REROUTE, "Reroute", || {
            Node::new("")
                .with_color(FLOW_COLOR)
                .with_pass_through()
                .with_input(PortSpec::new("in").hide_name())
                .with_output(PortSpec::new("out").hide_name())
        })
        .with_alias("dot")
        .with_description("Pass a value through unchanged"),
    )?;

    Ok(())
}
