// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node types.
//!
//! Hosts usually start from [`builtin_registry`] and register their own types
//! on top. Every built-in tag lives under the `pipegraph.` namespace.

pub mod basic;
pub mod flow;
pub mod math;

use crate::registry::{NodeRegistry, RegistryError};

/// Register every built-in node type
pub fn register_builtins(registry: &mut NodeRegistry) -> Result<(), RegistryError> {
    basic::register(registry)?;
    math::register(registry)?;
    flow::register(registry)?;
    Ok(())
}

/// Registry holding only the built-in node types
pub fn builtin_registry() -> Result<NodeRegistry, RegistryError> {
    let mut registry = NodeRegistry::new();
    register_builtins(&mut registry)?;
    Ok(registry)
}
