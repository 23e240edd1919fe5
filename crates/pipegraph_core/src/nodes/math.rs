// SPDX-License-Identifier: MIT OR Apache-2.0
//! Arithmetic nodes.

use crate::node::{Color, Node};
use crate::port::PortSpec;
use crate::registry::{NodeRegistry, NodeType, RegistryError};

/// `a + b`
pub const ADD: &str = "pipegraph.math.Add";
/// `a - b`
pub const SUBTRACT: &str = "pipegraph.math.Subtract";
/// `a * b`
pub const MULTIPLY: &str = "pipegraph.math.Multiply";
/// `a / b`
pub const DIVIDE: &str = "pipegraph.math.Divide";

const MATH_COLOR: Color = Color::rgb(45, 75, 45);

fn binary(symbol: &'static str) -> impl Fn() -> Node + Send + Sync + 'static {
    move || {
        Node::new("")
            .with_color(MATH_COLOR)
            .with_input(PortSpec::new("a").data_type("float"))
            .with_input(PortSpec::new("b").data_type("float"))
            .with_output(PortSpec::new("result").data_type("float"))
            .with_property("operator", symbol)
    }
}

pub(crate) fn register(registry: &mut NodeRegistry) -> Result<(), RegistryError> {
    let ops = [
        (ADD, "Add", "+", "Sum of two values"),
        (SUBTRACT, "Subtract", "-", "Difference of two values"),
        (MULTIPLY, "Multiply", "*", "Product of two values"),
        (DIVIDE, "Divide", "/", "Quotient of two values"),
    ];
    for (tag, name, symbol, description) in ops {
        registry.register(NodeType::new(tag, name, binary(symbol)).with_description(description))?;
    }
    Ok(())
}
