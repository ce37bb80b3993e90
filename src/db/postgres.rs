use super::{ChatRepository, PairKey, StoreError};
use crate::models::{Conversation, ConversationParticipant, Message, MessageType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::Instrument;
use uuid::Uuid;

const CONVERSATION_COLUMNS: &str = "id, title, is_group, created_at, last_message_id";
const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, content, message_type, sent_at, is_read, read_at";

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: String,
    message_type: String,
    sent_at: DateTime<Utc>,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        let message_type = row.message_type.parse().unwrap_or_else(|err| {
            tracing::warn!("Stored message {} has {}, reading as text", row.id, err);
            MessageType::Text
        });

        Message {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            content: row.content,
            message_type,
            sent_at: row.sent_at,
            is_read: row.is_read,
            read_at: row.read_at,
        }
    }
}

fn unavailable(context: &str) -> impl Fn(sqlx::Error) -> StoreError + '_ {
    move |err| {
        tracing::error!("{}: {:?}", context, err);
        StoreError::Unavailable(format!("{}: {}", context, err))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_participants(
        tx: &mut Transaction<'_, Postgres>,
        participants: &[ConversationParticipant],
    ) -> Result<(), sqlx::Error> {
        for participant in participants {
            sqlx::query(
                r#"
                INSERT INTO conversation_participants (user_id, conversation_id, joined_at, is_admin)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(participant.user_id)
            .bind(participant.conversation_id)
            .bind(participant.joined_at)
            .bind(participant.is_admin)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn find_private(&self, pair: &PairKey) -> Result<Option<Conversation>, StoreError> {
        let query_span = tracing::info_span!("Fetch private conversation by pair key.");
        sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE private_pair_key = $1"
        ))
        .bind(pair.to_string())
        .fetch_optional(&self.pool)
        .instrument(query_span)
        .await
        .map_err(unavailable("Failed to fetch private conversation"))
    }

    async fn insert_private(
        &self,
        pair: &PairKey,
        conversation: Conversation,
        participants: Vec<ConversationParticipant>,
    ) -> Result<Conversation, StoreError> {
        let query_span = tracing::info_span!("Saving new private conversation into the database");
        async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(unavailable("Failed to start transaction"))?;

            let inserted = sqlx::query(
                r#"
                INSERT INTO conversations (id, title, is_group, created_at, last_message_id, private_pair_key)
                VALUES ($1, '', FALSE, $2, NULL, $3)
                "#,
            )
            .bind(conversation.id)
            .bind(conversation.created_at)
            .bind(pair.to_string())
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {}
                // dropping `tx` rolls back
                Err(err) if is_unique_violation(&err) => {
                    return Err(StoreError::DuplicatePrivatePair(*pair));
                }
                Err(err) => return Err(unavailable("Failed to insert conversation")(err)),
            }

            Self::insert_participants(&mut tx, &participants)
                .await
                .map_err(unavailable("Failed to insert participants"))?;

            tx.commit()
                .await
                .map_err(|err| {
                    if is_unique_violation(&err) {
                        StoreError::DuplicatePrivatePair(*pair)
                    } else {
                        unavailable("Failed to commit transaction")(err)
                    }
                })?;

            Ok::<_, StoreError>(conversation)
        }
        .instrument(query_span)
        .await
    }

    async fn insert_group(
        &self,
        conversation: Conversation,
        participants: Vec<ConversationParticipant>,
    ) -> Result<Conversation, StoreError> {
        let query_span = tracing::info_span!("Saving new group conversation into the database");
        async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(unavailable("Failed to start transaction"))?;

            sqlx::query(
                r#"
                INSERT INTO conversations (id, title, is_group, created_at, last_message_id, private_pair_key)
                VALUES ($1, $2, TRUE, $3, NULL, NULL)
                "#,
            )
            .bind(conversation.id)
            .bind(&conversation.title)
            .bind(conversation.created_at)
            .execute(&mut *tx)
            .await
            .map_err(unavailable("Failed to insert conversation"))?;

            Self::insert_participants(&mut tx, &participants)
                .await
                .map_err(unavailable("Failed to insert participants"))?;

            tx.commit()
                .await
                .map_err(unavailable("Failed to commit transaction"))?;

            Ok::<_, StoreError>(conversation)
        }
        .instrument(query_span)
        .await
    }

    async fn fetch_conversation(&self, id: Uuid) -> Result<Option<Conversation>, StoreError> {
        let query_span = tracing::info_span!("Fetch conversation by id.");
        sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .instrument(query_span)
        .await
        .map_err(unavailable("Failed to fetch conversation"))
    }

    async fn participants(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<ConversationParticipant>, StoreError> {
        let query_span = tracing::info_span!("Fetch conversation participants.");
        sqlx::query_as::<_, ConversationParticipant>(
            r#"
            SELECT user_id, conversation_id, joined_at, is_admin
            FROM conversation_participants
            WHERE conversation_id = $1
            ORDER BY joined_at, user_id
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .instrument(query_span)
        .await
        .map_err(unavailable("Failed to fetch participants"))
    }

    async fn conversations_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>, StoreError> {
        let query_span = tracing::info_span!("Fetch conversations for user.");
        sqlx::query_as::<_, Conversation>(
            r#"
            SELECT c.id, c.title, c.is_group, c.created_at, c.last_message_id
            FROM conversations c
            JOIN conversation_participants p ON p.conversation_id = c.id
            LEFT JOIN messages m ON m.id = c.last_message_id
            WHERE p.user_id = $1
            ORDER BY COALESCE(m.sent_at, c.created_at) DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .instrument(query_span)
        .await
        .map_err(unavailable("Failed to fetch user conversations"))
    }

    async fn append_message(&self, mut message: Message) -> Result<Message, StoreError> {
        let query_span = tracing::info_span!("Saving new message into the database");
        async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(unavailable("Failed to start transaction"))?;

            // Row lock serializes appends per conversation, so the pointer
            // always lands on the newest committed message.
            let locked = sqlx::query_scalar::<_, Uuid>(
                "SELECT id FROM conversations WHERE id = $1 FOR UPDATE",
            )
            .bind(message.conversation_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(unavailable("Failed to lock conversation"))?;

            if locked.is_none() {
                return Err(StoreError::ConversationNotFound(message.conversation_id));
            }

            let latest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
                "SELECT MAX(sent_at) FROM messages WHERE conversation_id = $1",
            )
            .bind(message.conversation_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(unavailable("Failed to read latest message time"))?;

            if let Some(latest) = latest {
                if message.sent_at < latest {
                    message.sent_at = latest;
                }
            }

            sqlx::query(
                r#"
                INSERT INTO messages (id, conversation_id, sender_id, content, message_type, sent_at, is_read, read_at)
                VALUES ($1, $2, $3, $4, $5, $6, FALSE, NULL)
                "#,
            )
            .bind(message.id)
            .bind(message.conversation_id)
            .bind(message.sender_id)
            .bind(&message.content)
            .bind(message.message_type.as_str())
            .bind(message.sent_at)
            .execute(&mut *tx)
            .await
            .map_err(unavailable("Failed to insert message"))?;

            sqlx::query("UPDATE conversations SET last_message_id = $2 WHERE id = $1")
                .bind(message.conversation_id)
                .bind(message.id)
                .execute(&mut *tx)
                .await
                .map_err(unavailable("Failed to advance last message pointer"))?;

            tx.commit()
                .await
                .map_err(unavailable("Failed to commit transaction"))?;

            Ok::<_, StoreError>(message)
        }
        .instrument(query_span)
        .await
    }

    async fn fetch_message(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
        let query_span = tracing::info_span!("Fetch message by id.");
        sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .instrument(query_span)
        .await
        .map(|row| row.map(Message::from))
        .map_err(unavailable("Failed to fetch message"))
    }

    async fn messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
        before: Option<Uuid>,
    ) -> Result<Vec<Message>, StoreError> {
        let query_span = tracing::info_span!("Fetch conversation messages.");
        // (sent_at, seq) orders messages that share a timestamp
        sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM (
                SELECT {MESSAGE_COLUMNS}, seq FROM messages
                WHERE conversation_id = $1
                  AND (
                    $2::uuid IS NULL
                    OR (sent_at, seq) < (
                        SELECT cursor.sent_at, cursor.seq FROM messages cursor
                        WHERE cursor.id = $2 AND cursor.conversation_id = $1
                    )
                  )
                ORDER BY sent_at DESC, seq DESC
                LIMIT $3
            ) page
            ORDER BY sent_at ASC, seq ASC
            "#
        ))
        .bind(conversation_id)
        .bind(before)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .instrument(query_span)
        .await
        .map(|rows| rows.into_iter().map(Message::from).collect())
        .map_err(unavailable("Failed to fetch messages"))
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, StoreError> {
        if self.fetch_conversation(conversation_id).await?.is_none() {
            return Err(StoreError::ConversationNotFound(conversation_id));
        }

        let query_span = tracing::info_span!("Mark conversation messages as read.");
        sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE messages
            SET is_read = TRUE, read_at = $3
            WHERE conversation_id = $1 AND sender_id <> $2 AND is_read = FALSE
            RETURNING id
            "#,
        )
        .bind(conversation_id)
        .bind(reader_id)
        .bind(read_at)
        .fetch_all(&self.pool)
        .instrument(query_span)
        .await
        .map_err(unavailable("Failed to mark messages as read"))
    }

    async fn user_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError> {
        let query_span = tracing::info_span!("Fetch user names.");
        sqlx::query_as::<_, (Uuid, String)>("SELECT id, name FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .instrument(query_span)
            .await
            .map(|rows| rows.into_iter().collect())
            .map_err(unavailable("Failed to fetch user names"))
    }

    async fn count_private(&self, pair: &PairKey) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM conversations WHERE private_pair_key = $1",
        )
        .bind(pair.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable("Failed to count private conversations"))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(unavailable("Database ping failed"))
    }
}
