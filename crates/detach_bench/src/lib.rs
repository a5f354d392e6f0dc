//! Benchmark utilities.

#![warn(missing_docs)]

use detach_core::{EntityClass, EntityRef, Value};
use rand::Rng;

/// Generate a random graph of `nodes` vertices with `degree` outgoing edges
/// each, held in an `edges` list. Returns the first vertex.
///
/// Edges point anywhere, so the graph has cycles and shared targets.
pub fn random_graph(nodes: usize, degree: usize) -> EntityRef {
    let class = EntityClass::builder("Vertex")
        .field("label")
        .field("edges")
        .build();
    let mut rng = rand::thread_rng();

    let vertices: Vec<EntityRef> = (0..nodes.max(1))
        .map(|n| {
            EntityRef::with_fields(&class, [("label", Value::from(n as i64))])
                .expect("Failed to build vertex")
        })
        .collect();

    for vertex in &vertices {
        let edges = (0..degree).map(|_| Value::from(&vertices[rng.gen_range(0..vertices.len())]));
        vertex
            .set("edges", Value::list(edges))
            .expect("Failed to set edges");
    }
    vertices[0].clone()
}

/// Generate a wide entity whose `items` list holds `len` distinct leaves.
pub fn wide_entity(len: usize) -> EntityRef {
    let leaf = EntityClass::builder("Leaf").field("value").build();
    let root = EntityClass::builder("Root").field("items").build();
    let items = (0..len).map(|n| {
        Value::from(
            EntityRef::with_fields(&leaf, [("value", Value::from(n as i64))])
                .expect("Failed to build leaf"),
        )
    });
    EntityRef::with_fields(&root, [("items", Value::list(items))]).expect("Failed to build root")
}
