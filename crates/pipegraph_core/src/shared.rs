// SPDX-License-Identifier: MIT OR Apache-2.0
//! Single-writer access to a graph from several threads.
//!
//! The graph itself is not synchronised. Hosts that touch it from more than
//! one thread go through a [`SharedGraph`], which serialises every access.

use crate::graph::Graph;
use parking_lot::Mutex;
use std::sync::Arc;

/// Cloneable handle to a graph behind a mutex
#[derive(Debug, Clone, Default)]
pub struct SharedGraph {
    inner: Arc<Mutex<Graph>>,
}

impl SharedGraph {
    /// Wrap a graph
    pub fn new(graph: Graph) -> Self {
        Self {
            inner: Arc::new(Mutex::new(graph)),
        }
    }

    /// Run `f` with exclusive access to the graph
    pub fn with<R>(&self, f: impl FnOnce(&mut Graph) -> R) -> R {
        let mut graph = self.inner.lock();
        f(&mut graph)
    }

    /// Clone the current graph state
    pub fn snapshot(&self) -> Graph {
        self.inner.lock().clone()
    }

    /// Take the graph back if this is the last handle
    pub fn try_unwrap(self) -> Result<Graph, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}
