#![allow(dead_code)]

use aggrepo_core::{
    entity_identity, new_sequential_id, AggregateRoot, Entity, EntityId, Repository,
    RepositoryContext, SqliteStore, TimestampLayout,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: EntityId,
    pub customer: String,
    pub status: String,
    pub rank: i64,
    pub total: f64,
    #[serde(default)]
    pub lines: Option<Vec<OrderLine>>,
}

impl Entity for Order {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl AggregateRoot for Order {
    const KIND: &'static str = "order";
    const RELATIONS: &'static [&'static str] = &["lines"];
}

entity_identity!(Order);

pub fn order(rank: i64, status: &str) -> Order {
    Order {
        id: new_sequential_id(TimestampLayout::TimeFirst),
        customer: format!("customer-{rank}"),
        status: status.to_string(),
        rank,
        total: rank as f64 * 10.0,
        lines: None,
    }
}

pub fn line(sku: &str, quantity: u32) -> OrderLine {
    OrderLine {
        sku: sku.to_string(),
        quantity,
    }
}

pub fn memory_context() -> RepositoryContext<SqliteStore> {
    RepositoryContext::new(SqliteStore::open_in_memory().unwrap())
}

/// Context whose store already holds `orders`.
pub fn seeded_context(orders: &[Order]) -> RepositoryContext<SqliteStore> {
    let context = memory_context();
    let repo = context.repository::<Order>();
    for order in orders {
        repo.add(order).unwrap();
    }
    context.commit().unwrap();
    context
}
