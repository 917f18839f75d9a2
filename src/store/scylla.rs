use async_trait::async_trait;
use futures_util::future::try_join_all;
use scylla::client::session::Session;
use scylla::statement::batch::Batch;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::cart::Cart;
use crate::domain::order::{Order, OrderEvent, OrderPage, OrderQuery};
use crate::outbox::{EventEnvelope, OutboxMessage};
use super::error::StoreError;
use super::ports::{page_of, CartStore, OrderStore};

// ============================================================================
// ScyllaDB Stores
// ============================================================================
//
// Orders and carts are stored as JSON documents keyed by id. Every order
// write goes out as one batch together with its outbox row, so the order
// and its event are persisted together or not at all.
//
// ============================================================================

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS orders (
        id uuid PRIMARY KEY,
        user_id uuid,
        status text,
        payload text,
        created_at timestamp,
        updated_at timestamp
    )",
    "CREATE TABLE IF NOT EXISTS orders_by_user (
        user_id uuid,
        created_at timestamp,
        order_id uuid,
        PRIMARY KEY (user_id, created_at, order_id)
    ) WITH CLUSTERING ORDER BY (created_at DESC, order_id ASC)",
    "CREATE TABLE IF NOT EXISTS carts (
        user_id uuid PRIMARY KEY,
        payload text,
        updated_at timestamp
    )",
    "CREATE TABLE IF NOT EXISTS outbox_messages (
        id uuid PRIMARY KEY,
        aggregate_id uuid,
        aggregate_type text,
        event_id uuid,
        event_type text,
        event_version int,
        payload text,
        topic text,
        partition_key text,
        correlation_id uuid,
        created_at timestamp
    )",
];

const INSERT_OUTBOX: &str = "INSERT INTO outbox_messages (
        id, aggregate_id, aggregate_type, event_id, event_type, event_version,
        payload, topic, partition_key, correlation_id, created_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// Create the keyspace and tables if missing and switch the session to it
pub async fn ensure_schema(session: &Session, keyspace: &str) -> Result<(), StoreError> {
    session
        .query_unpaged(
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                 {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                keyspace
            ),
            &[],
        )
        .await
        .map_err(StoreError::backend)?;

    session
        .use_keyspace(keyspace, false)
        .await
        .map_err(StoreError::backend)?;

    for statement in SCHEMA {
        session
            .query_unpaged(*statement, &[])
            .await
            .map_err(StoreError::backend)?;
    }

    tracing::info!(keyspace = %keyspace, "ScyllaDB schema ready");
    Ok(())
}

type OutboxValues = (Uuid, Uuid, String, Uuid, String, i32, String, String, String, Uuid, chrono::DateTime<chrono::Utc>);

fn outbox_values(message: OutboxMessage) -> OutboxValues {
    (
        message.id,
        message.aggregate_id,
        message.aggregate_type,
        message.event_id,
        message.event_type,
        message.event_version,
        message.payload,
        message.topic,
        message.partition_key,
        message.correlation_id,
        message.created_at,
    )
}

pub struct ScyllaOrderStore {
    session: Arc<Session>,
    topic_name: String,
}

impl ScyllaOrderStore {
    pub fn new(session: Arc<Session>, topic_name: &str) -> Self {
        Self {
            session,
            topic_name: topic_name.to_string(),
        }
    }

    async fn select_payloads(&self, query: &str, values: impl scylla::serialize::row::SerializeRow) -> Result<Vec<String>, StoreError> {
        let result = self
            .session
            .query_unpaged(query, values)
            .await
            .map_err(StoreError::backend)?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(Vec::new()),
        };

        let mut payloads = Vec::new();
        for row in rows_result.rows::<(String,)>().map_err(StoreError::backend)? {
            let (payload,) = row.map_err(StoreError::backend)?;
            payloads.push(payload);
        }
        Ok(payloads)
    }
}

#[async_trait]
impl OrderStore for ScyllaOrderStore {
    async fn insert(&self, order: &Order, event: &EventEnvelope<OrderEvent>) -> Result<(), StoreError> {
        let payload = serde_json::to_string(order)?;
        let message = OutboxMessage::from_envelope("Order", &self.topic_name, event)?;

        let mut batch = Batch::default();
        batch.append_statement(
            "INSERT INTO orders (id, user_id, status, payload, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        );
        batch.append_statement(
            "INSERT INTO orders_by_user (user_id, created_at, order_id) VALUES (?, ?, ?)",
        );
        batch.append_statement(INSERT_OUTBOX);

        tracing::debug!(
            order_id = %order.id,
            event_id = %message.event_id,
            "Persisting order with outbox event"
        );

        self.session
            .batch(
                &batch,
                (
                    (
                        order.id,
                        order.user_id,
                        order.status.as_str(),
                        payload,
                        order.created_at,
                        order.updated_at,
                    ),
                    (order.user_id, order.created_at, order.id),
                    outbox_values(message),
                ),
            )
            .await
            .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let payloads = self
            .select_payloads("SELECT payload FROM orders WHERE id = ?", (id,))
            .await?;

        match payloads.first() {
            Some(payload) => Ok(Some(serde_json::from_str(payload)?)),
            None => Ok(None),
        }
    }

    async fn update_status(&self, order: &Order, event: &EventEnvelope<OrderEvent>) -> Result<(), StoreError> {
        let payload = serde_json::to_string(order)?;
        let message = OutboxMessage::from_envelope("Order", &self.topic_name, event)?;

        let mut batch = Batch::default();
        batch.append_statement(
            "UPDATE orders SET status = ?, payload = ?, updated_at = ? WHERE id = ?",
        );
        batch.append_statement(INSERT_OUTBOX);

        self.session
            .batch(
                &batch,
                (
                    (order.status.as_str(), payload, order.updated_at, order.id),
                    outbox_values(message),
                ),
            )
            .await
            .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT order_id FROM orders_by_user WHERE user_id = ?",
                (user_id,),
            )
            .await
            .map_err(StoreError::backend)?;

        let ids = {
            let rows_result = match result.into_rows_result() {
                Ok(rows) => rows,
                Err(_) => return Ok(Vec::new()),
            };

            let mut ids = Vec::new();
            for row in rows_result.rows::<(Uuid,)>().map_err(StoreError::backend)? {
                let (order_id,) = row.map_err(StoreError::backend)?;
                ids.push(order_id);
            }
            ids
        };

        let orders = try_join_all(ids.into_iter().map(|id| self.get(id))).await?;
        Ok(orders.into_iter().flatten().collect())
    }

    async fn list(&self, query: &OrderQuery) -> Result<OrderPage<Order>, StoreError> {
        let orders = self
            .select_payloads("SELECT payload FROM orders", &[])
            .await?
            .iter()
            .map(|payload| serde_json::from_str(payload))
            .collect::<Result<Vec<Order>, _>>()?;

        Ok(page_of(orders, query))
    }
}

pub struct ScyllaCartStore {
    session: Arc<Session>,
}

impl ScyllaCartStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl CartStore for ScyllaCartStore {
    async fn load(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        let result = self
            .session
            .query_unpaged("SELECT payload FROM carts WHERE user_id = ?", (user_id,))
            .await
            .map_err(StoreError::backend)?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(None),
        };

        match rows_result.maybe_first_row::<(String,)>() {
            Ok(Some((payload,))) => Ok(Some(serde_json::from_str(&payload)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::backend(e)),
        }
    }

    async fn save(&self, cart: &Cart) -> Result<(), StoreError> {
        let payload = serde_json::to_string(cart)?;

        self.session
            .query_unpaged(
                "INSERT INTO carts (user_id, payload, updated_at) VALUES (?, ?, ?)",
                (cart.user_id, payload, cart.updated_at),
            )
            .await
            .map_err(StoreError::backend)?;

        Ok(())
    }
}
