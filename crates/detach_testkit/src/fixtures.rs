//! Test fixtures.
//!
//! Provides a small shop schema and a populated store whose graph exercises
//! everything the copier has to handle: a class hierarchy, lazy references,
//! back references forming cycles, shared nodes and every container kind.

use detach_core::{
    EntityClass, EntityRef, FieldDescriptor, FieldModifiers, MemorySession, MemoryStore, Value,
};
use std::sync::Arc;

/// Key of the populated customer.
pub const CUSTOMER_KEY: i64 = 1;

/// Keys of the populated orders.
pub const ORDER_KEYS: [i64; 2] = [10, 11];

/// Number of distinct instances reachable from the populated customer.
pub const POPULATED_NODES: usize = 6;

/// Classes of the shop schema.
#[derive(Debug, Clone)]
pub struct ShopSchema {
    /// Base class: `created_by`, final `version`, transient `audit_log`.
    pub auditable: Arc<EntityClass>,
    /// `Auditable` subclass: `name`, `email`, `orders` (list), `favourite`,
    /// `tags` (set) and a static `REGISTRY`.
    pub customer: Arc<EntityClass>,
    /// `Auditable` subclass: `number`, `status`, `customer`, `lines`
    /// (array of `Line`) and `attributes` (map).
    pub order: Arc<EntityClass>,
    /// `sku`, `quantity` and the owning `order`.
    pub line: Arc<EntityClass>,
    /// Value class without a no-argument constructor.
    pub money: Arc<EntityClass>,
}

impl ShopSchema {
    /// Builds the schema.
    pub fn new() -> Self {
        let auditable = EntityClass::builder("Auditable")
            .field("created_by")
            .declare(
                FieldDescriptor::new("version")
                    .modifiers(FieldModifiers::FINAL)
                    .default_value(1),
            )
            .declare(
                FieldDescriptor::new("audit_log")
                    .modifiers(FieldModifiers::TRANSIENT)
                    .default_value("fresh"),
            )
            .build();

        let customer = EntityClass::builder("Customer")
            .extends(&auditable)
            .field("name")
            .field("email")
            .field("orders")
            .field("favourite")
            .field("tags")
            .declare(FieldDescriptor::new("REGISTRY").modifiers(FieldModifiers::STATIC))
            .build();

        let order = EntityClass::builder("Order")
            .extends(&auditable)
            .field("number")
            .field("status")
            .field("customer")
            .field("lines")
            .field("attributes")
            .build();

        let line = EntityClass::builder("Line")
            .field("sku")
            .field("quantity")
            .field("order")
            .build();

        let money = EntityClass::builder("Money")
            .field("amount")
            .field("currency")
            .no_default_constructor()
            .build();

        Self {
            auditable,
            customer,
            order,
            line,
            money,
        }
    }

    /// Registers every class with `store`.
    pub fn register(&self, store: &MemoryStore) {
        for class in [&self.customer, &self.order, &self.line, &self.money] {
            store.register_class(class);
        }
    }
}

impl Default for ShopSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// A store with the shop schema registered.
pub struct ShopFixture {
    /// The schema.
    pub schema: ShopSchema,
    /// The backing store.
    pub store: Arc<MemoryStore>,
}

impl ShopFixture {
    /// Creates a fixture with an empty store.
    pub fn empty() -> Self {
        let schema = ShopSchema::new();
        let store = MemoryStore::new();
        schema.register(&store);
        Self { schema, store }
    }

    /// Creates a fixture with one customer, two orders and three lines.
    ///
    /// The customer's `orders` and `favourite` and every order's `customer`
    /// are proxies; lines and their back references are plain instances.
    /// `favourite` and the first entry of `orders` are distinct proxies for
    /// the same order.
    pub fn populated() -> Self {
        let fixture = Self::empty();
        let schema = &fixture.schema;
        let store = &fixture.store;

        let customer = EntityRef::with_fields(
            &schema.customer,
            [
                ("created_by", Value::from("import")),
                ("name", Value::from("Ada")),
                ("email", Value::from("ada@example.com")),
                ("tags", Value::set([Value::from("vip"), Value::from("early")])),
                (
                    "orders",
                    Value::list(ORDER_KEYS.iter().map(|&key| Value::from(fixture.order_proxy(key)))),
                ),
                ("favourite", Value::from(fixture.order_proxy(ORDER_KEYS[0]))),
            ],
        )
        .expect("Failed to build customer");
        store
            .insert(CUSTOMER_KEY, &customer)
            .expect("Failed to store customer");

        let lines_per_order: [&[(&str, i64)]; 2] =
            [&[("KB-01", 1), ("MS-02", 2)], &[("MN-27", 1)]];

        for (key, lines) in ORDER_KEYS.iter().zip(lines_per_order) {
            let order = EntityRef::with_fields(
                &schema.order,
                [
                    ("number", Value::from(*key)),
                    ("status", Value::from(if *key == ORDER_KEYS[0] { "open" } else { "shipped" })),
                    ("customer", Value::from(fixture.customer_proxy())),
                ],
            )
            .expect("Failed to build order");

            let mut items = Vec::new();
            for (index, (sku, quantity)) in lines.iter().enumerate() {
                let line = EntityRef::with_fields(
                    &schema.line,
                    [
                        ("sku", Value::from(*sku)),
                        ("quantity", Value::from(*quantity)),
                        ("order", Value::from(&order)),
                    ],
                )
                .expect("Failed to build line");
                store
                    .insert(key * 10 + index as i64, &line)
                    .expect("Failed to store line");
                items.push(line);
            }

            let mut attributes = vec![(Value::from("channel"), Value::from("web"))];
            if let Some(first) = items.first() {
                attributes.push((Value::from(first), Value::from("gift")));
            }

            order
                .set(
                    "lines",
                    Value::array("Line", items.iter().map(Value::from)),
                )
                .expect("Failed to set lines");
            order
                .set("attributes", Value::map(attributes))
                .expect("Failed to set attributes");
            store.insert(*key, &order).expect("Failed to store order");
        }

        tracing::debug!(entities = store.len(), "populated shop fixture");
        fixture
    }

    /// Returns a fresh proxy for the populated customer.
    pub fn customer_proxy(&self) -> EntityRef {
        self.store
            .proxy("Customer", CUSTOMER_KEY)
            .expect("Customer class not registered")
    }

    /// Returns a fresh proxy for the order with `key`.
    pub fn order_proxy(&self, key: i64) -> EntityRef {
        self.store
            .proxy("Order", key)
            .expect("Order class not registered")
    }

    /// Opens a session over the fixture's store.
    pub fn session(&self) -> MemorySession {
        MemorySession::new(Arc::clone(&self.store))
    }

    /// Builds a `Money` instance, bypassing its missing constructor.
    pub fn money(&self, amount: i64) -> EntityRef {
        EntityRef::hydrate(
            &self.schema.money,
            [
                ("amount", Value::from(amount)),
                ("currency", Value::from("EUR")),
            ],
        )
        .expect("Failed to hydrate money")
    }
}

/// Builds a singly linked chain of `len` nodes of class `Link` and returns
/// its head. Each node stores its position in `n`.
pub fn linked_chain(len: usize) -> EntityRef {
    let class = EntityClass::builder("Link").field("n").field("next").build();
    let head = EntityRef::with_fields(&class, [("n", Value::from(0))]).expect("Failed to build link");
    let mut tail = head.clone();
    for n in 1..len {
        let link = EntityRef::with_fields(&class, [("n", Value::from(n as i64))])
            .expect("Failed to build link");
        tail.set("next", &link).expect("Failed to link");
        tail = link;
    }
    head
}

/// Builds a ring of `len` nodes (the last links back to the head) and
/// returns its head. A ring of one node references itself.
pub fn ring(len: usize) -> EntityRef {
    let head = linked_chain(len.max(1));
    let mut tail = head.clone();
    while let Some(next) = tail.get("next").expect("Failed to read link").as_entity().cloned() {
        tail = next;
    }
    tail.set("next", &head).expect("Failed to close ring");
    head
}
