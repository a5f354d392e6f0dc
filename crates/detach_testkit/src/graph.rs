//! Graph assertions.
//!
//! Compares an original entity graph with its deep copy. Proxies in the
//! original are resolved while walking, so an original should only be
//! checked against a copy made from it.

use detach_core::{unproxy, EntityRef, NodeId, Value, ValueKind};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Node correspondence established by [`check_isomorphic`].
#[derive(Debug, Default)]
pub struct Correspondence {
    forward: HashMap<NodeId, EntityRef>,
    backward: HashMap<NodeId, NodeId>,
}

impl Correspondence {
    /// Returns the copy paired with the (resolved) original node.
    pub fn copy_of(&self, original: &EntityRef) -> Option<&EntityRef> {
        let original = unproxy(original).ok()?;
        self.forward.get(&original.node_id())
    }

    /// Returns the number of paired nodes.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Returns true if no node was paired.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

struct Checker {
    pairs: Correspondence,
    queue: VecDeque<(EntityRef, EntityRef)>,
    unordered: Vec<(Value, Value)>,
}

/// Checks that `copy` has the same shape as `original`.
///
/// Every resolved original node must pair with exactly one copy node of the
/// same class, and vice versa; copyable fields must match under that pairing.
/// Containers must keep their category, array element type and element
/// order. Copy nodes must not be proxies.
///
/// Entities held only inside a set or as a map key are matched through the
/// pairing established elsewhere, so each of them must also be reachable
/// through a field, an array or a list.
pub fn check_isomorphic(original: &EntityRef, copy: &EntityRef) -> Result<Correspondence, String> {
    let mut checker = Checker {
        pairs: Correspondence::default(),
        queue: VecDeque::new(),
        unordered: Vec::new(),
    };
    checker.pair(original, copy)?;

    loop {
        while let Some((original, copy)) = checker.queue.pop_front() {
            checker.compare_nodes(&original, &copy)?;
        }
        match checker.unordered.pop() {
            Some((original, copy)) => checker.compare_unordered(&original, &copy)?,
            None => break,
        }
    }
    Ok(checker.pairs)
}

/// Asserts that `copy` has the same shape as `original`.
///
/// # Panics
///
/// Panics with the first difference found.
pub fn assert_isomorphic(original: &EntityRef, copy: &EntityRef) -> Correspondence {
    check_isomorphic(original, copy).unwrap_or_else(|diff| panic!("graphs differ: {diff}"))
}

impl Checker {
    fn pair(&mut self, original: &EntityRef, copy: &EntityRef) -> Result<(), String> {
        let original = unproxy(original).map_err(|e| format!("cannot resolve original: {e}"))?;
        if copy.is_proxy() {
            return Err(format!("copy of {original:?} is a proxy"));
        }

        if let Some(paired) = self.pairs.forward.get(&original.node_id()) {
            return if paired.ptr_eq(copy) {
                Ok(())
            } else {
                Err(format!("{original:?} maps to both {paired:?} and {copy:?}"))
            };
        }
        if let Some(other) = self.pairs.backward.get(&copy.node_id()) {
            return Err(format!(
                "{copy:?} is the copy of two originals ({other} and {})",
                original.node_id()
            ));
        }

        self.pairs
            .backward
            .insert(copy.node_id(), original.node_id());
        self.pairs
            .forward
            .insert(original.node_id(), copy.clone());
        self.queue.push_back((original, copy.clone()));
        Ok(())
    }

    fn compare_nodes(&mut self, original: &EntityRef, copy: &EntityRef) -> Result<(), String> {
        let class = original.class();
        if !Arc::ptr_eq(class, copy.class()) {
            return Err(format!(
                "{original:?} copied as class {}",
                copy.class().name()
            ));
        }

        for (path, field) in class.fields() {
            if !field.is_copyable() {
                continue;
            }
            let a = original
                .read_path(&path)
                .ok_or_else(|| format!("{original:?} has no slot {path}"))?;
            let b = copy
                .read_path(&path)
                .ok_or_else(|| format!("{copy:?} has no slot {path}"))?;
            self.compare_values(&a, &b)
                .map_err(|diff| format!("{path}: {diff}"))?;
        }
        Ok(())
    }

    fn compare_values(&mut self, a: &Value, b: &Value) -> Result<(), String> {
        match (a, b) {
            (Value::Entity(a), Value::Entity(b)) => self.pair(a, b),
            (Value::Array(a), Value::Array(b)) => {
                if a.element_type() != b.element_type() || a.len() != b.len() {
                    return Err(format!(
                        "array {}[{}] copied as {}[{}]",
                        a.element_type(),
                        a.len(),
                        b.element_type(),
                        b.len()
                    ));
                }
                a.iter().zip(b.iter()).try_for_each(|(x, y)| self.compare_values(x, y))
            }
            (Value::List(a), Value::List(b)) => {
                if a.len() != b.len() {
                    return Err(format!("list of {} copied with {}", a.len(), b.len()));
                }
                a.iter().zip(b).try_for_each(|(x, y)| self.compare_values(x, y))
            }
            (Value::Set(_), Value::Set(_)) | (Value::Map(_), Value::Map(_)) => {
                let (p, q) = (container_len(a), container_len(b));
                if p != q {
                    return Err(format!("{p} entries copied as {q}"));
                }
                self.unordered.push((a.clone(), b.clone()));
                Ok(())
            }
            _ if is_plain(a) && a == b => Ok(()),
            _ => Err(format!("{a:?} copied as {b:?}")),
        }
    }

    fn compare_unordered(&mut self, a: &Value, b: &Value) -> Result<(), String> {
        match (a, b) {
            (Value::Set(a), Value::Set(b)) => {
                for item in a {
                    let expected = self.expected(item)?;
                    if !b.contains(&expected) {
                        return Err(format!("set element {item:?} missing from copy"));
                    }
                }
                Ok(())
            }
            (Value::Map(a), Value::Map(b)) => {
                for (key, value) in a {
                    let expected = self.expected(key)?;
                    let copied = b
                        .get(&expected)
                        .ok_or_else(|| format!("map key {key:?} missing from copy"))?;
                    self.compare_values(value, copied)?;
                }
                Ok(())
            }
            _ => Err(format!("{a:?} copied as {b:?}")),
        }
    }

    /// Maps an original set element or map key to the value the copy must
    /// hold in its place.
    fn expected(&self, item: &Value) -> Result<Value, String> {
        match item {
            Value::Entity(entity) => self
                .pairs
                .copy_of(entity)
                .map(Value::from)
                .ok_or_else(|| format!("{entity:?} is only reachable through a set or map key")),
            _ if is_plain(item) => Ok(item.clone()),
            _ => Err(format!("unsupported nested container {:?}", item.kind())),
        }
    }
}

fn is_plain(value: &Value) -> bool {
    matches!(value.kind(), ValueKind::Null | ValueKind::Scalar)
}

fn container_len(value: &Value) -> usize {
    match value {
        Value::Set(set) => set.len(),
        Value::Map(map) => map.len(),
        _ => 0,
    }
}

/// Returns every node reachable from `root` through any instance field,
/// proxies included. Initialized proxies are followed to their target;
/// uninitialized proxies are not loaded.
pub fn reachable(root: &EntityRef) -> Vec<EntityRef> {
    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    let mut stack = vec![Value::from(root)];

    while let Some(value) = stack.pop() {
        match value {
            Value::Entity(entity) => {
                if !seen.insert(entity.node_id()) {
                    continue;
                }
                if entity.is_proxy() {
                    if entity.is_initialized() {
                        if let Ok(target) = unproxy(&entity) {
                            stack.push(Value::from(target));
                        }
                    }
                } else {
                    for (path, field) in entity.class().fields() {
                        if !field.is_instance_field() {
                            continue;
                        }
                        if let Some(value) = entity.read_path(&path) {
                            stack.push(value);
                        }
                    }
                }
                nodes.push(entity);
            }
            Value::Array(array) => stack.extend(array.iter().cloned()),
            Value::Set(set) => stack.extend(set),
            Value::Map(map) => stack.extend(map.into_iter().flat_map(|(k, v)| [k, v])),
            Value::List(list) => stack.extend(list),
            _ => {}
        }
    }
    nodes
}

/// Asserts that `original` and `copy` share no node and that the copy
/// contains no proxy.
///
/// # Panics
///
/// Panics on the first shared node or proxy found.
pub fn assert_disjoint(original: &EntityRef, copy: &EntityRef) {
    let originals: HashSet<NodeId> = reachable(original).iter().map(EntityRef::node_id).collect();
    for node in reachable(copy) {
        assert!(!node.is_proxy(), "copy contains proxy {node:?}");
        assert!(
            !originals.contains(&node.node_id()),
            "copy shares node {node:?} with the original"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use detach_core::EntityClass;

    fn pair_class() -> Arc<EntityClass> {
        EntityClass::builder("Pair").field("left").field("right").build()
    }

    #[test]
    fn detects_lost_sharing() {
        let class = pair_class();
        let shared = EntityRef::instantiate(&class).unwrap();
        let original = EntityRef::with_fields(
            &class,
            [("left", Value::from(&shared)), ("right", Value::from(&shared))],
        )
        .unwrap();

        let copy = EntityRef::with_fields(
            &class,
            [
                ("left", Value::from(EntityRef::instantiate(&class).unwrap())),
                ("right", Value::from(EntityRef::instantiate(&class).unwrap())),
            ],
        )
        .unwrap();

        assert!(check_isomorphic(&original, &copy).is_err());
    }

    #[test]
    fn detects_scalar_difference() {
        let class = pair_class();
        let original = EntityRef::with_fields(&class, [("left", Value::from(1))]).unwrap();
        let copy = EntityRef::with_fields(&class, [("left", Value::from(2))]).unwrap();

        let diff = check_isomorphic(&original, &copy).unwrap_err();
        assert!(diff.starts_with("Pair.left"));
    }

    #[test]
    fn identical_shapes_match() {
        let class = pair_class();
        let original = EntityRef::instantiate(&class).unwrap();
        original.set("left", &original).unwrap();
        original
            .set("right", Value::set([Value::from(&original), Value::from(3)]))
            .unwrap();

        let copy = EntityRef::instantiate(&class).unwrap();
        copy.set("left", &copy).unwrap();
        copy.set("right", Value::set([Value::from(&copy), Value::from(3)]))
            .unwrap();

        let pairs = assert_isomorphic(&original, &copy);
        assert_eq!(pairs.len(), 1);
        assert!(pairs.copy_of(&original).unwrap().ptr_eq(&copy));
    }

    #[test]
    fn reachable_walks_containers() {
        let class = pair_class();
        let a = EntityRef::instantiate(&class).unwrap();
        let b = EntityRef::instantiate(&class).unwrap();
        let root = EntityRef::with_fields(
            &class,
            [
                ("left", Value::map([(Value::from(&a), Value::from(1))])),
                ("right", Value::list([Value::from(&b), Value::from(&a)])),
            ],
        )
        .unwrap();

        assert_eq!(reachable(&root).len(), 3);
    }
}
