// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constant sources and the graph output sink.

use crate::node::{Color, Node};
use crate::port::PortSpec;
use crate::registry::{NodeRegistry, NodeType, RegistryError};

/// Integer constant
pub const INTEGER: &str = "pipegraph.basic.Integer";
/// Float constant
pub const FLOAT: &str = "pipegraph.basic.Float";
/// Text constant
pub const TEXT: &str = "pipegraph.basic.Text";
/// Graph output
pub const OUTPUT: &str = "pipegraph.basic.Output";

const CONSTANT_COLOR: Color = Color::rgb(40, 60, 90);
const OUTPUT_COLOR: Color = Color::rgb(90, 40, 40);

pub(crate) fn register(registry: &mut NodeRegistry) -> Result<(), RegistryError> {
    registry.register(
        NodeType::new(INTEGER, "Integer", || {
            Node::new("")
                .with_color(CONSTANT_COLOR)
                .with_output(PortSpec::new("value").data_type("int"))
                .with_property("value", 0_i64)
        })
        .with_alias("int")
        .with_description("Constant integer value"),
    )?;

    registry.register(
        NodeType::new(FLOAT, "Float", || {
            Node::new("")
                .with_color(CONSTANT_COLOR)
                .with_output(PortSpec::new("value").data_type("float"))
                .with_property("value", 0.0_f64)
        })
        .with_alias("float")
        .with_description("Constant float value"),
    )?;

    registry.register(
        NodeType::new(TEXT, "Text", || {
            Node::new("")
                .with_color(CONSTANT_COLOR)
                .with_output(PortSpec::new("text").data_type("string"))
                .with_property("text", "")
        })
        .with_description("Constant string"),
    )?;

    registry.register(
        NodeType::new(OUTPUT, "Output", || {
            Node::new("")
                .with_color(OUTPUT_COLOR)
                .with_input(PortSpec::new("result"))
        })
        .with_description("Final result of the graph"),
    )?;

    Ok(())
}
