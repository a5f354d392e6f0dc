//! Lazy reference resolution.
//!
//! Resolving forces a proxy to load its own fields and returns the
//! materialized instance behind it. Nested references are left as they are;
//! use [`crate::deep_copy`] to materialize a whole graph.

use crate::entity::{EntityRef, Node, Value};
use crate::error::{CoreError, CoreResult};

/// Initializes `entity` and returns the concrete, non-proxy instance.
///
/// Instances are returned unchanged. A proxy is materialized through its
/// loader on first resolution; the result is cached, so resolving the same
/// proxy again yields the same instance without loading.
///
/// # Errors
///
/// - `InvalidArgument` if `entity` is absent, if the proxy's loader is gone,
///   or if the loader breaks its contract (returns a proxy, or an instance of
///   an unrelated class).
/// - Any error the loader reports, unchanged.
///
/// # Example
///
/// ```rust
/// use detach_core::{unproxy, CoreError, EntityClass, EntityRef};
///
/// let class = EntityClass::builder("Note").field("text").build();
/// let note = EntityRef::instantiate(&class).unwrap();
/// assert!(unproxy(&note).unwrap().ptr_eq(&note));
///
/// let absent: Option<&EntityRef> = None;
/// assert!(matches!(unproxy(absent), Err(CoreError::InvalidArgument { .. })));
/// ```
pub fn unproxy<'a>(entity: impl Into<Option<&'a EntityRef>>) -> CoreResult<EntityRef> {
    let entity = entity
        .into()
        .ok_or_else(|| CoreError::invalid_argument("entity passed for unproxy is absent"))?;

    let proxy = match entity.node() {
        Node::Instance(_) => return Ok(entity.clone()),
        Node::Proxy(proxy) => proxy,
    };

    if let Some(target) = proxy.target.read().as_ref() {
        return Ok(target.clone());
    }

    let loader = proxy.loader.upgrade().ok_or_else(|| {
        CoreError::invalid_argument(format!(
            "could not initialize proxy {}#{}: loader is gone",
            proxy.class.name(),
            proxy.key
        ))
    })?;

    let loaded = loader.load(&proxy.class, &proxy.key)?;
    if loaded.is_proxy() {
        return Err(CoreError::invalid_argument(format!(
            "loader returned a proxy for {}#{}",
            proxy.class.name(),
            proxy.key
        )));
    }
    if !loaded.class().is_a(proxy.class.name()) {
        return Err(CoreError::invalid_argument(format!(
            "loader returned {} for {}#{}",
            loaded.class().name(),
            proxy.class.name(),
            proxy.key
        )));
    }

    tracing::trace!(class = proxy.class.name(), key = %proxy.key, "initialized proxy");

    // A concurrent resolution may have won; keep the first target.
    let mut target = proxy.target.write();
    Ok(target.get_or_insert(loaded).clone())
}

/// Resolves the entity held by a field value.
///
/// # Errors
///
/// `InvalidArgument` if `value` is `Null` or not an entity reference, plus
/// everything [`unproxy`] reports.
pub fn unproxy_value(value: &Value) -> CoreResult<EntityRef> {
    match value {
        Value::Entity(entity) => unproxy(entity),
        Value::Null => Err(CoreError::invalid_argument(
            "entity passed for unproxy is absent",
        )),
        other => Err(CoreError::invalid_argument(format!(
            "expected an entity reference, found {:?}",
            other.kind()
        ))),
    }
}

/// Returns true if `entity` can be read without loading.
#[must_use]
pub fn is_initialized(entity: &EntityRef) -> bool {
    entity.is_initialized()
}
