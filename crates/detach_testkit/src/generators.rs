//! Property-based test generators using proptest.
//!
//! Generates random entity graphs with arbitrary edges: self loops, cycles
//! of any length, shared targets and randomly proxied nodes.

use detach_core::{EntityClass, EntityRef, MemoryStore, Value};
use proptest::prelude::*;
use std::sync::Arc;

/// Shape of one generated node.
#[derive(Debug, Clone)]
pub struct NodeShape {
    /// Scalar payload.
    pub label: i64,
    /// Target of the `next` field.
    pub next: Option<usize>,
    /// Target of the `other` field.
    pub other: Option<usize>,
    /// Targets held in the `edges` list, in order. May repeat.
    pub edges: Vec<usize>,
    /// Whether references to this node are proxies.
    pub proxied: bool,
}

/// Shape of a generated graph. Node indices double as store keys.
#[derive(Debug, Clone)]
pub struct GraphShape {
    /// Nodes, indexed by position.
    pub nodes: Vec<NodeShape>,
}

/// A materialized [`GraphShape`].
pub struct GeneratedGraph {
    /// Store holding every node; keeps proxies resolvable.
    pub store: Arc<MemoryStore>,
    /// The `Vertex` class shared by every node.
    pub class: Arc<EntityClass>,
    /// Instances, indexed like the shape.
    pub nodes: Vec<EntityRef>,
    root_proxied: bool,
}

impl GraphShape {
    /// Builds the graph in a fresh store.
    pub fn build(&self) -> GeneratedGraph {
        let class = EntityClass::builder("Vertex")
            .field("label")
            .field("next")
            .field("other")
            .field("edges")
            .build();
        let store = MemoryStore::new();

        let nodes: Vec<EntityRef> = self
            .nodes
            .iter()
            .map(|shape| {
                EntityRef::with_fields(&class, [("label", Value::from(shape.label))])
                    .expect("Failed to build vertex")
            })
            .collect();
        for (key, node) in nodes.iter().enumerate() {
            store.insert(key as i64, node).expect("Failed to store vertex");
        }

        let reference = |target: usize| -> Value {
            if self.nodes[target].proxied {
                Value::from(store.proxy_of(&class, target as i64))
            } else {
                Value::from(&nodes[target])
            }
        };

        for (shape, node) in self.nodes.iter().zip(&nodes) {
            node.set("next", shape.next.map(&reference))
                .expect("Failed to set next");
            node.set("other", shape.other.map(&reference))
                .expect("Failed to set other");
            node.set("edges", Value::list(shape.edges.iter().map(|&t| reference(t))))
                .expect("Failed to set edges");
        }

        GeneratedGraph {
            root_proxied: self.nodes.first().is_some_and(|n| n.proxied),
            store,
            class,
            nodes,
        }
    }
}

impl GeneratedGraph {
    /// Returns the root (node 0), as a proxy if that node is proxied.
    pub fn root(&self) -> EntityRef {
        if self.root_proxied {
            self.store.proxy_of(&self.class, 0)
        } else {
            self.nodes[0].clone()
        }
    }
}

/// Strategy for generating one node of a graph with `node_count` nodes.
pub fn node_shape_strategy(node_count: usize) -> impl Strategy<Value = NodeShape> {
    (
        any::<i64>(),
        prop::option::of(0..node_count),
        prop::option::of(0..node_count),
        prop::collection::vec(0..node_count, 0..4),
        any::<bool>(),
    )
        .prop_map(|(label, next, other, edges, proxied)| NodeShape {
            label,
            next,
            other,
            edges,
            proxied,
        })
}

/// Strategy for generating graphs of 1 to `max_nodes` nodes.
pub fn graph_shape_strategy(max_nodes: usize) -> impl Strategy<Value = GraphShape> {
    (1..=max_nodes.max(1))
        .prop_flat_map(|n| prop::collection::vec(node_shape_strategy(n), n))
        .prop_map(|nodes| GraphShape { nodes })
}
