use crate::{
    client::{DbClient, Result},
    record::{MessageChangeRecord, MessageOwnerRecord, MessageRecord},
};
use tracing::debug;
use uuid::Uuid;
use warble_common::{
    error::DomainError,
    model::{
        Id, ModelValidationError,
        conversation::ConversationMarker,
        message::{
            CreateMessage, EditMessage, MESSAGE_TEXT_MAX_LEN, Message, MessageChange,
            MessageMarker,
        },
        user::UserMarker,
    },
    page::{MESSAGES_PER_PAGE, Page, Paged},
};

const MESSAGE_COLUMNS: &str = "
    SELECT
        m.id,
        m.conversation_id,
        m.text,
        m.original_id,
        m.response_to_id,
        m.post_id,
        m.created_at,
        m.updated_at,
        m.is_deleted,
        u.id AS user_id,
        u.username,
        u.name,
        u.avatar_url,
        u.avatar_type,
        u.is_deleted AS user_deleted
    FROM
        messages AS m
        LEFT JOIN users AS u ON u.id = m.user_id
";

fn check_message_text(text: Option<&str>) -> Result<(), DomainError> {
    match text {
        Some(text) if text.chars().count() > MESSAGE_TEXT_MAX_LEN => Err(DomainError::WrongData),
        _ => Ok(()),
    }
}

impl DbClient {
    pub async fn fetch_message(&self, message_id: Id<MessageMarker>) -> Result<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!("{MESSAGE_COLUMNS} WHERE m.id = $1"))
            .bind(message_id.get())
            .fetch_optional(self.pool())
            .await?
            .ok_or(DomainError::NotFound)?;

        Ok(record.try_into()?)
    }

    async fn message_owner(&self, message_id: Id<MessageMarker>) -> Result<MessageOwnerRecord> {
        let record = sqlx::query_as::<_, MessageOwnerRecord>(
            "
            SELECT user_id, conversation_id, text, is_deleted FROM messages WHERE id = $1
            ",
        )
        .bind(message_id.get())
        .fetch_optional(self.pool())
        .await?
        .ok_or(DomainError::NotFound)?;

        Ok(record)
    }

    /// A live message the caller wrote.
    async fn own_message(
        &self,
        caller: Id<UserMarker>,
        message_id: Id<MessageMarker>,
    ) -> Result<MessageOwnerRecord> {
        let message = self.message_owner(message_id).await?;
        if message.is_deleted {
            return Err(DomainError::NotFound.into());
        }
        if message.user_id != caller.get() {
            return Err(DomainError::Forbidden.into());
        }
        Ok(message)
    }

    pub async fn send_message(
        &self,
        caller: Id<UserMarker>,
        message: &CreateMessage,
    ) -> Result<Message> {
        if !message.has_content() {
            return Err(DomainError::EmptyString.into());
        }
        check_message_text(message.text.as_deref())?;
        self.require_participant(message.conversation_id, caller)
            .await?;

        if let Some(response_to_id) = message.response_to_id {
            let parent = self.message_owner(response_to_id).await?;
            if parent.conversation_id != message.conversation_id.get() {
                return Err(DomainError::WrongData.into());
            }
        }
        if let Some(original_id) = message.original_id {
            let original = self.message_owner(original_id).await?;
            if original.is_deleted {
                return Err(DomainError::NotFound.into());
            }
            self.require_participant(original.conversation_id.into(), caller)
                .await?;
        }

        let message_id = Id::<MessageMarker>::random();
        debug!(%message_id, conversation_id = %message.conversation_id, "Sending message");

        sqlx::query(
            "
            INSERT INTO messages
                (id, conversation_id, user_id, text, original_id, response_to_id, post_id)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(message_id.get())
        .bind(message.conversation_id.get())
        .bind(caller.get())
        .bind(message.text.as_deref().map(str::trim))
        .bind(message.original_id.map(Id::get))
        .bind(message.response_to_id.map(Id::get))
        .bind(message.post_id.map(Id::get))
        .execute(self.pool())
        .await?;

        self.fetch_message(message_id).await
    }

    pub async fn edit_message(
        &self,
        caller: Id<UserMarker>,
        message_id: Id<MessageMarker>,
        edit: &EditMessage,
    ) -> Result<Message> {
        let text = edit.text.trim();
        if text.is_empty() {
            return Err(DomainError::EmptyString.into());
        }
        check_message_text(Some(text))?;

        let mut tx = self.begin().await?;

        let previous = sqlx::query_as::<_, MessageOwnerRecord>(
            "
            SELECT user_id, conversation_id, text, is_deleted FROM messages WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(message_id.get())
        .fetch_optional(&mut *tx)
        .await?
        .filter(|message| !message.is_deleted)
        .ok_or(DomainError::NotFound)?;
        if previous.user_id != caller.get() {
            return Err(DomainError::Forbidden.into());
        }

        if previous.text.as_deref() != Some(text) {
            sqlx::query(
                "
                INSERT INTO message_changes (message_id, text) VALUES ($1, $2)
                ",
            )
            .bind(message_id.get())
            .bind(previous.text)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "
                UPDATE messages SET text = $2, updated_at = now() WHERE id = $1
                ",
            )
            .bind(message_id.get())
            .bind(text)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.fetch_message(message_id).await
    }

    pub async fn delete_message(
        &self,
        caller: Id<UserMarker>,
        message_id: Id<MessageMarker>,
    ) -> Result<()> {
        self.own_message(caller, message_id).await?;

        sqlx::query(
            "
            UPDATE messages SET is_deleted = TRUE, updated_at = now() WHERE id = $1
            ",
        )
        .bind(message_id.get())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Earlier versions of a message, oldest first.
    pub async fn message_changes(
        &self,
        caller: Id<UserMarker>,
        message_id: Id<MessageMarker>,
    ) -> Result<Vec<MessageChange>> {
        let message = self.message_owner(message_id).await?;
        self.require_participant(message.conversation_id.into(), caller)
            .await?;
        if message.is_deleted {
            return Err(DomainError::NotFound.into());
        }

        let records = sqlx::query_as::<_, MessageChangeRecord>(
            "
            SELECT id, created_at, text
            FROM message_changes
            WHERE message_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(message_id.get())
        .fetch_all(self.pool())
        .await?;

        Ok(records.into_iter().map(MessageChange::from).collect())
    }

    /// One page of a conversation, newest first. Everything on it counts as
    /// read by the caller afterwards.
    pub async fn messages(
        &self,
        caller: Id<UserMarker>,
        conversation_id: Id<ConversationMarker>,
        page: Page,
    ) -> Result<Paged<Message>> {
        self.require_participant(conversation_id, caller).await?;

        let window = page.window(MESSAGES_PER_PAGE);
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            "
            {MESSAGE_COLUMNS}
            WHERE m.conversation_id = $1
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(conversation_id.get())
        .bind(window.limit)
        .bind(window.offset)
        .fetch_all(self.pool())
        .await?;

        let read: Vec<Uuid> = records.iter().map(|record| record.id).collect();
        if !read.is_empty() {
            sqlx::query(
                "
                INSERT INTO message_read (message_id, user_id)
                SELECT message_id, $2 FROM UNNEST($1::uuid[]) AS message_id
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(&read)
            .bind(caller.get())
            .execute(self.pool())
            .await?;
        }

        let messages = records
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<_, ModelValidationError>>()?;
        let total = self.count_messages(conversation_id).await?;
        Ok(Paged::new(messages, page.has_more(total, MESSAGES_PER_PAGE)))
    }
}

#[cfg(test)]
mod tests {
    use crate::messages::check_message_text;
    use warble_common::{error::DomainError, model::message::MESSAGE_TEXT_MAX_LEN};

    #[test]
    fn message_text_length() {
        assert_eq!(check_message_text(None), Ok(()));
        assert_eq!(
            check_message_text(Some(&"a".repeat(MESSAGE_TEXT_MAX_LEN))),
            Ok(())
        );
        assert_eq!(
            check_message_text(Some(&"a".repeat(MESSAGE_TEXT_MAX_LEN + 1))),
            Err(DomainError::WrongData)
        );
    }
}
