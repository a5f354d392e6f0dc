//! Integration tests: resolution, deep copy and transactions over the shop
//! fixture and generated graphs.

use detach_testkit::prelude::*;
use proptest::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};

fn entity(value: Value) -> EntityRef {
    value.as_entity().cloned().expect("entity value")
}

#[test]
fn resolution_is_idempotent() {
    init_tracing();
    let fixture = ShopFixture::populated();
    let proxy = fixture.customer_proxy();

    let first = unproxy(&proxy).unwrap();
    let again = unproxy(&proxy).unwrap();
    let of_instance = unproxy(&first).unwrap();

    assert!(first.ptr_eq(&again));
    assert!(first.ptr_eq(&of_instance));
    assert!(!first.is_proxy());
    assert_eq!(fixture.store.load_count(), 1);
}

#[test]
fn shop_graph_copy_is_isomorphic_and_detached() {
    init_tracing();
    let fixture = ShopFixture::populated();
    let root = fixture.customer_proxy();

    let copy = deep_copy(&root).unwrap();

    let pairs = assert_isomorphic(&root, &copy);
    assert_eq!(pairs.len(), POPULATED_NODES);
    assert_disjoint(&root, &copy);
}

#[test]
fn shop_graph_copy_preserves_sharing() {
    let fixture = ShopFixture::populated();
    let copy = deep_copy(&fixture.customer_proxy()).unwrap();

    let orders = copy.get("orders").unwrap();
    let orders = orders.as_list().unwrap();
    let first_order = entity(orders[0].clone());
    let favourite = entity(copy.get("favourite").unwrap());

    // Two distinct proxies for order 10 in the original, one node in the copy.
    assert!(favourite.ptr_eq(&first_order));

    // Back references close the cycles onto the copied customer.
    let owner = entity(first_order.get("customer").unwrap());
    assert!(owner.ptr_eq(&copy));

    let lines = first_order.get("lines").unwrap();
    let lines = lines.as_array().unwrap();
    assert_eq!(lines.element_type(), "Line");
    assert_eq!(lines.len(), 2);
    let first_line = entity(lines.get(0).unwrap().clone());
    assert_eq!(first_line.get("sku").unwrap(), Value::from("KB-01"));
    assert!(entity(first_line.get("order").unwrap()).ptr_eq(&first_order));

    let attributes = first_order.get("attributes").unwrap();
    let attributes = attributes.as_map().unwrap();
    assert_eq!(
        attributes.get(&Value::from(&first_line)),
        Some(&Value::from("gift"))
    );
    assert_eq!(
        attributes.get(&Value::from("channel")),
        Some(&Value::from("web"))
    );
}

#[test]
fn shop_graph_copy_skips_non_copyable_fields() {
    let fixture = ShopFixture::populated();
    let original = unproxy(&fixture.customer_proxy()).unwrap();
    original.set("audit_log", "touched").unwrap();

    let copy = deep_copy(&original).unwrap();

    assert_eq!(copy.get("created_by").unwrap(), Value::from("import"));
    assert_eq!(copy.get("version").unwrap(), Value::from(1));
    assert_eq!(copy.get("audit_log").unwrap(), Value::from("fresh"));
}

#[test]
fn copy_fails_on_unconstructible_class() {
    let fixture = ShopFixture::populated();
    let order = unproxy(&fixture.order_proxy(ORDER_KEYS[0])).unwrap();
    order
        .set(
            "attributes",
            Value::map([(Value::from("total"), Value::from(fixture.money(30)))]),
        )
        .unwrap();

    let err = deep_copy(&fixture.customer_proxy()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "cannot copy instance of Money: no accessible no-argument constructor"
    );
}

#[test]
fn copy_of_rings() {
    for len in [1, 2, 3, 17] {
        let head = ring(len);
        let copy = deep_copy(&head).unwrap();

        let pairs = assert_isomorphic(&head, &copy);
        assert_eq!(pairs.len(), len);
        assert_disjoint(&head, &copy);
    }
}

#[test]
fn copy_of_long_chain() {
    let head = linked_chain(1_000);
    let copy = deep_copy(&head).unwrap();
    assert_eq!(assert_isomorphic(&head, &copy).len(), 1_000);
}

#[test]
fn copy_inside_transaction() {
    let fixture = ShopFixture::populated();
    let mut session = fixture.session();

    let detached = run_in_transaction(&mut session, |s| {
        let customer = find_or_fail_labeled(s, "Customer", CUSTOMER_KEY, "Customer")?;
        Ok(deep_copy(&customer)?)
    })
    .unwrap();

    assert!(session.is_released());
    assert_eq!(
        session.events(),
        &[TxEvent::Begin, TxEvent::Commit, TxEvent::Release]
    );
    // The detached copy stays usable after the session is gone.
    assert_eq!(detached.get("name").unwrap(), Value::from("Ada"));
    assert!(!entity(detached.get("favourite").unwrap()).is_proxy());
}

#[test]
fn transaction_begin_commit_release() {
    let mut session = ShopFixture::populated().session();

    run_in_transaction(&mut session, |_| Ok(())).unwrap();

    assert_eq!(
        session.events(),
        &[TxEvent::Begin, TxEvent::Commit, TxEvent::Release]
    );
}

#[test]
fn transaction_rollback_only() {
    let mut session = ShopFixture::populated().session();

    run_in_transaction_with(
        &mut session,
        |s| {
            s.transaction().set_rollback_only()?;
            Ok(())
        },
        false,
    )
    .unwrap();

    assert_eq!(session.events(), &[TxEvent::Begin, TxEvent::Rollback]);
}

#[test]
fn nested_transaction_passthrough() {
    let mut session = ShopFixture::populated().session();

    let name = run_in_transaction(&mut session, |outer| {
        let name = run_in_transaction(outer, |inner| {
            let customer = find_or_fail(inner, "Customer", CUSTOMER_KEY)?;
            Ok(customer.get("name")?)
        })?;
        Ok(name)
    })
    .unwrap();

    assert_eq!(name, Value::from("Ada"));
    assert_eq!(
        session.events(),
        &[TxEvent::Begin, TxEvent::Commit, TxEvent::Release]
    );
}

#[test]
fn not_found_contract() {
    let mut session = ShopFixture::populated().session();

    let err = find_or_fail_labeled(&mut session, "Order", 999, "Order").unwrap_err();
    assert_eq!(err.to_string(), "Order with id 999 was not found");
    assert!(matches!(
        &err,
        CoreError::NotFound { label, key } if label == "Order" && *key == EntityKey::from(999)
    ));

    let err = find_or_fail(&mut session, "Order", "missing").unwrap_err();
    assert_eq!(err.to_string(), "Entity with id missing was not found");
}

#[test]
fn cleanup_on_panic() {
    let mut session = ShopFixture::populated().session();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        run_in_transaction(&mut session, |_| -> WorkResult<()> {
            panic!("unit of work crashed")
        })
    }));

    assert!(outcome.is_err());
    assert_eq!(
        session.events(),
        &[TxEvent::Begin, TxEvent::Rollback, TxEvent::Release]
    );
}

#[test]
fn executor_with_config() {
    let executor = TransactionExecutor::new(Config::new().not_found_label("Customer"));
    let mut session = ShopFixture::populated().session();

    let err = executor
        .run(&mut session, |s| {
            executor.find_or_fail(s, "Customer", 2)?;
            Ok(())
        })
        .unwrap_err();

    assert_eq!(err.to_string(), "Customer with id 2 was not found");
    assert_eq!(
        session.events(),
        &[TxEvent::Begin, TxEvent::Rollback, TxEvent::Release]
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn generated_graph_copies_are_isomorphic(shape in graph_shape_strategy(12)) {
        let graph = shape.build();
        let root = graph.root();

        let copy = deep_copy(&root).unwrap();

        let pairs = check_isomorphic(&root, &copy);
        prop_assert!(pairs.is_ok(), "{}", pairs.unwrap_err());
        assert_disjoint(&root, &copy);
    }

    #[test]
    fn generated_graph_resolution_is_idempotent(shape in graph_shape_strategy(6)) {
        let graph = shape.build();
        let root = graph.root();

        let first = unproxy(&root).unwrap();
        let second = unproxy(&root).unwrap();
        prop_assert!(first.ptr_eq(&second));
        prop_assert!(first.ptr_eq(&graph.nodes[0]));
    }

    #[test]
    fn copy_count_matches_reachable_instances(shape in graph_shape_strategy(10)) {
        let graph = shape.build();
        let root = graph.root();
        let copy = deep_copy(&root).unwrap();

        // Every reachable instance is copied exactly once.
        let instances = reachable(&root).iter().filter(|n| !n.is_proxy()).count();
        prop_assert_eq!(reachable(&copy).len(), instances);
    }
}
