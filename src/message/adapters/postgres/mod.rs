//! `PostgreSQL` implementation of the `MessageStore` port using Diesel ORM.
//!
//! Messages live in the `chat_messages` table (see
//! `migrations/2026-01-05-000000_create_chat_messages`). Appends are
//! idempotent through `ON CONFLICT DO NOTHING` on the primary key, and
//! deletes only stamp `deleted_at`.

mod blocking_helpers;
pub mod models;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use mockable::{Clock, DefaultClock};

use crate::message::{
    domain::{Message, MessageId, ParticipantId},
    ports::store::{AppendOutcome, MessageStore, StoreError, StoreResult},
};
use models::{ChatMessageRow, NewChatMessage};
use schema::chat_messages;

pub use blocking_helpers::PgPool;
use blocking_helpers::{get_conn, run_blocking};

/// `PostgreSQL` implementation of [`MessageStore`].
///
/// Uses Diesel with r2d2 connection pooling. All database operations are
/// offloaded to a blocking thread pool via [`tokio::task::spawn_blocking`].
///
/// # Example
///
/// ```ignore
/// use diesel::r2d2::{ConnectionManager, Pool};
/// use diesel::PgConnection;
/// use chat_relay::message::adapters::postgres::PostgresMessageStore;
///
/// let manager = ConnectionManager::<PgConnection>::new("postgres://...");
/// let pool = Pool::builder().build(manager).expect("pool");
/// let store = PostgresMessageStore::new(pool);
/// ```
#[derive(Clone)]
pub struct PostgresMessageStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PostgresMessageStore {
    /// Creates a store backed by the given connection pool, stamping soft
    /// deletes with the system clock.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            clock: Arc::new(DefaultClock),
        }
    }

    /// Replaces the clock used to stamp soft deletes.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds a pool for `database_url` and wraps it in a store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] when the pool cannot be created.
    pub fn connect(database_url: &str) -> StoreResult<Self> {
        let manager = diesel::r2d2::ConnectionManager::<PgConnection>::new(database_url);
        let pool = diesel::r2d2::Pool::builder()
            .build(manager)
            .map_err(|e| StoreError::connection(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl std::fmt::Debug for PostgresMessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresMessageStore")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    async fn append(&self, message: &Message) -> StoreResult<AppendOutcome> {
        let pool = self.pool.clone();
        let row = NewChatMessage::from_domain(message);

        run_blocking(move || {
            let mut conn = get_conn(&pool)?;
            let inserted = diesel::insert_into(chat_messages::table)
                .values(&row)
                .on_conflict(chat_messages::id)
                .do_nothing()
                .execute(&mut conn)
                .map_err(StoreError::database)?;

            Ok(if inserted == 0 {
                AppendOutcome::AlreadyPresent
            } else {
                AppendOutcome::Inserted
            })
        })
        .await
    }

    async fn find_by_participant(
        &self,
        participant: &ParticipantId,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Message>> {
        let pool = self.pool.clone();
        let identity = participant.as_str().to_owned();
        let max_rows = limit
            .map(i64::try_from)
            .transpose()
            .map_err(|e| StoreError::serialization(e.to_string()))?;

        run_blocking(move || {
            let mut conn = get_conn(&pool)?;

            let mut query = chat_messages::table
                .filter(chat_messages::deleted_at.is_null())
                .filter(
                    chat_messages::sender
                        .eq(identity.clone())
                        .or(chat_messages::recipient.eq(identity)),
                )
                .order((chat_messages::created_at.desc(), chat_messages::id.desc()))
                .select(ChatMessageRow::as_select())
                .into_boxed();
            if let Some(max) = max_rows {
                query = query.limit(max);
            }

            let rows = query
                .load::<ChatMessageRow>(&mut conn)
                .map_err(StoreError::database)?;

            rows.into_iter().map(ChatMessageRow::into_domain).collect()
        })
        .await
    }

    async fn soft_delete(&self, id: MessageId) -> StoreResult<bool> {
        let pool = self.pool.clone();
        let now = self.clock.utc();

        run_blocking(move || {
            let mut conn = get_conn(&pool)?;
            let updated = diesel::update(
                chat_messages::table
                    .filter(chat_messages::id.eq(id.value()))
                    .filter(chat_messages::deleted_at.is_null()),
            )
            .set(chat_messages::deleted_at.eq(Some(now)))
            .execute(&mut conn)
            .map_err(StoreError::database)?;

            Ok(updated > 0)
        })
        .await
    }
}
