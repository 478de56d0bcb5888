//! SQLite-backed message cache: durable records plus live subscriptions.
//!
//! Uses SqlitePoolManager and the `messages` table (see [`MessageRow`]). Every mutation runs in one
//! transaction; a rejected write rolls back. The subscriber hub mutex is held from the start of a
//! mutation until its snapshot is published, which serializes writers and keeps snapshot order
//! identical to commit order.

use async_trait::async_trait;
use chat_core::{MessageRecord, MessageStatus};
use sqlx::SqliteConnection;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::cache::{check_overwrite, MessageCache};
use crate::error::StorageError;
use crate::models::MessageRow;
use crate::sqlite_pool::SqlitePoolManager;
use crate::subscription::{SnapshotStream, SubscriberHub};

const SELECT_COLUMNS: &str = "SELECT id, conversation_id, sender_id, sender_name, text, \
     timestamp_ms, is_ai_authored, suggestions, status FROM messages";

pub struct SqliteMessageCache {
    pool_manager: SqlitePoolManager,
    hub: Mutex<SubscriberHub>,
}

impl SqliteMessageCache {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool_manager = SqlitePoolManager::new(database_url).await?;
        let cache = Self {
            pool_manager,
            hub: Mutex::new(SubscriberHub::new()),
        };
        cache.init().await?;
        Ok(cache)
    }

    async fn init(&self) -> Result<(), StorageError> {
        info!("Creating message cache tables if not exist");

        let pool = self.pool_manager.pool();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL,
                conversation_id TEXT NOT NULL,
                sender_id TEXT NOT NULL,
                sender_name TEXT NOT NULL,
                text TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                is_ai_authored INTEGER NOT NULL,
                suggestions TEXT NOT NULL,
                status TEXT NOT NULL,
                UNIQUE (conversation_id, id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation_order \
             ON messages(conversation_id, timestamp_ms, seq)",
        )
        .execute(pool)
        .await?;

        info!("Message cache tables ready");
        Ok(())
    }

    /// Pushes the committed state to subscribers. Runs after commit, so a failed reload is logged
    /// and the write still reports success.
    async fn publish(&self, hub: &mut MutexGuard<'_, SubscriberHub>, conversation_id: &str) {
        if !hub.has_subscribers(conversation_id) {
            return;
        }
        let loaded = match self.pool_manager.pool().acquire().await {
            Ok(mut conn) => load_conversation(&mut conn, conversation_id).await,
            Err(e) => Err(e.into()),
        };
        match loaded {
            Ok(snapshot) => hub.publish(conversation_id, snapshot),
            Err(e) => warn!(
                conversation_id = %conversation_id,
                error = %e,
                "Failed to reload snapshot after commit, subscribers not notified"
            ),
        }
    }

    /// Live subscribers for a conversation.
    pub async fn subscriber_count(&self, conversation_id: &str) -> usize {
        self.hub.lock().await.subscriber_count(conversation_id)
    }
}

async fn load_conversation(
    conn: &mut SqliteConnection,
    conversation_id: &str,
) -> Result<Vec<MessageRecord>, StorageError> {
    let sql = format!(
        "{} WHERE conversation_id = ? ORDER BY timestamp_ms ASC, seq ASC",
        SELECT_COLUMNS
    );
    let rows: Vec<MessageRow> = sqlx::query_as(&sql)
        .bind(conversation_id)
        .fetch_all(&mut *conn)
        .await?;
    rows.into_iter().map(MessageRow::into_record).collect()
}

async fn load_one(
    conn: &mut SqliteConnection,
    conversation_id: &str,
    id: &str,
) -> Result<Option<MessageRecord>, StorageError> {
    let sql = format!("{} WHERE conversation_id = ? AND id = ?", SELECT_COLUMNS);
    let row: Option<MessageRow> = sqlx::query_as(&sql)
        .bind(conversation_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(MessageRow::into_record).transpose()
}

async fn existing_status(
    conn: &mut SqliteConnection,
    conversation_id: &str,
    id: &str,
) -> Result<Option<MessageStatus>, StorageError> {
    let status: Option<String> =
        sqlx::query_scalar("SELECT status FROM messages WHERE conversation_id = ? AND id = ?")
            .bind(conversation_id)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    status
        .map(|s| s.parse::<MessageStatus>().map_err(StorageError::Serialization))
        .transpose()
}

/// Validates against the stored status, then inserts or updates in place (keeps `seq`).
async fn write_record(
    conn: &mut SqliteConnection,
    record: &MessageRecord,
) -> Result<(), StorageError> {
    let existing = existing_status(conn, &record.conversation_id, &record.id).await?;
    check_overwrite(existing, record)?;

    let row = MessageRow::from_record(record)?;
    sqlx::query(
        r#"
        INSERT INTO messages (id, conversation_id, sender_id, sender_name, text, timestamp_ms, is_ai_authored, suggestions, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(conversation_id, id) DO UPDATE SET
            sender_id = excluded.sender_id,
            sender_name = excluded.sender_name,
            text = excluded.text,
            timestamp_ms = excluded.timestamp_ms,
            is_ai_authored = excluded.is_ai_authored,
            suggestions = excluded.suggestions,
            status = excluded.status
        "#,
    )
    .bind(&row.id)
    .bind(&row.conversation_id)
    .bind(&row.sender_id)
    .bind(&row.sender_name)
    .bind(&row.text)
    .bind(row.timestamp_ms)
    .bind(row.is_ai_authored)
    .bind(&row.suggestions)
    .bind(&row.status)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl MessageCache for SqliteMessageCache {
    async fn upsert(&self, record: MessageRecord) -> Result<(), StorageError> {
        let mut hub = self.hub.lock().await;
        let mut tx = self.pool_manager.pool().begin().await?;
        write_record(&mut tx, &record).await?;
        tx.commit().await?;

        debug!(
            conversation_id = %record.conversation_id,
            message_id = %record.id,
            status = %record.status,
            "Record upserted"
        );
        self.publish(&mut hub, &record.conversation_id).await;
        Ok(())
    }

    async fn upsert_all(&self, records: Vec<MessageRecord>) -> Result<(), StorageError> {
        let mut hub = self.hub.lock().await;
        let mut tx = self.pool_manager.pool().begin().await?;
        let mut touched: Vec<&str> = Vec::new();
        for record in &records {
            write_record(&mut tx, record).await?;
            if !touched.contains(&record.conversation_id.as_str()) {
                touched.push(&record.conversation_id);
            }
        }
        tx.commit().await?;

        info!(count = records.len(), conversations = touched.len(), "Bulk upsert applied");
        for conversation_id in touched {
            self.publish(&mut hub, conversation_id).await;
        }
        Ok(())
    }

    async fn delete_by_conversation(&self, conversation_id: &str) -> Result<u64, StorageError> {
        let mut hub = self.hub.lock().await;
        let result = sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(self.pool_manager.pool())
            .await?;

        info!(
            conversation_id = %conversation_id,
            removed = result.rows_affected(),
            "Conversation cleared"
        );
        self.publish(&mut hub, conversation_id).await;
        Ok(result.rows_affected())
    }

    async fn update_status(
        &self,
        conversation_id: &str,
        id: &str,
        status: MessageStatus,
    ) -> Result<MessageRecord, StorageError> {
        let mut hub = self.hub.lock().await;
        let mut tx = self.pool_manager.pool().begin().await?;
        let mut record = load_one(&mut tx, conversation_id, id)
            .await?
            .ok_or_else(|| StorageError::not_found(conversation_id, id))?;
        record.status = record
            .status
            .transition(status)
            .map_err(|e| StorageError::transition(id, e))?;

        sqlx::query("UPDATE messages SET status = ? WHERE conversation_id = ? AND id = ?")
            .bind(status.as_str())
            .bind(conversation_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(conversation_id = %conversation_id, message_id = %id, status = %status, "Status updated");
        self.publish(&mut hub, conversation_id).await;
        Ok(record)
    }

    async fn promote(
        &self,
        conversation_id: &str,
        old_id: &str,
        new_id: &str,
        status: MessageStatus,
    ) -> Result<MessageRecord, StorageError> {
        let mut hub = self.hub.lock().await;
        let mut tx = self.pool_manager.pool().begin().await?;
        let mut record = load_one(&mut tx, conversation_id, old_id)
            .await?
            .ok_or_else(|| StorageError::not_found(conversation_id, old_id))?;
        record.status = record
            .status
            .transition(status)
            .map_err(|e| StorageError::transition(old_id, e))?;
        record.id = new_id.to_string();

        let replaced = if new_id != old_id {
            sqlx::query("DELETE FROM messages WHERE conversation_id = ? AND id = ?")
                .bind(conversation_id)
                .bind(new_id)
                .execute(&mut *tx)
                .await?
                .rows_affected()
        } else {
            0
        };

        sqlx::query("UPDATE messages SET id = ?, status = ? WHERE conversation_id = ? AND id = ?")
            .bind(new_id)
            .bind(status.as_str())
            .bind(conversation_id)
            .bind(old_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            conversation_id = %conversation_id,
            old_id = %old_id,
            new_id = %new_id,
            replaced_existing = replaced > 0,
            "Record promoted"
        );
        self.publish(&mut hub, conversation_id).await;
        Ok(record)
    }

    async fn replace_confirmed(
        &self,
        conversation_id: &str,
        records: Vec<MessageRecord>,
    ) -> Result<(), StorageError> {
        let mut hub = self.hub.lock().await;
        let mut tx = self.pool_manager.pool().begin().await?;
        let removed = sqlx::query("DELETE FROM messages WHERE conversation_id = ? AND status = ?")
            .bind(conversation_id)
            .bind(MessageStatus::Sent.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        for record in &records {
            write_record(&mut tx, record).await?;
        }
        tx.commit().await?;

        info!(
            conversation_id = %conversation_id,
            removed,
            fetched = records.len(),
            "Confirmed records replaced"
        );
        self.publish(&mut hub, conversation_id).await;
        Ok(())
    }

    async fn get(
        &self,
        conversation_id: &str,
        id: &str,
    ) -> Result<Option<MessageRecord>, StorageError> {
        let mut conn = self.pool_manager.pool().acquire().await?;
        load_one(&mut conn, conversation_id, id).await
    }

    async fn snapshot_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<MessageRecord>, StorageError> {
        let mut conn = self.pool_manager.pool().acquire().await?;
        let records = load_conversation(&mut conn, conversation_id).await?;
        debug!(conversation_id = %conversation_id, count = records.len(), "Snapshot read");
        Ok(records)
    }

    async fn observe_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<SnapshotStream, StorageError> {
        let mut hub = self.hub.lock().await;
        let mut conn = self.pool_manager.pool().acquire().await?;
        let current = load_conversation(&mut conn, conversation_id).await?;
        Ok(hub.subscribe(conversation_id, current))
    }
}
