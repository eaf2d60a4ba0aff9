use crate::{
    client::{DbClient, Result},
    record::{
        ConversationInfoRecord, ConversationRecord, JoinTargetRecord, ParticipantRecord,
        PolicyRecord, SummaryRecord,
    },
};
use sqlx::{Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;
use warble_common::{
    error::DomainError,
    model::{
        Id, ModelValidationError,
        conversation::{
            AddPermission, AddUsers, Conversation, ConversationInfo, ConversationMarker,
            ConversationPolicy, ConversationType, CreateConversation, NewConversation,
        },
        user::UserMarker,
    },
};

impl DbClient {
    pub async fn create_conversation(
        &self,
        creator: Id<UserMarker>,
        conversation: CreateConversation,
    ) -> Result<Id<ConversationMarker>> {
        let conversation = conversation.validate(creator)?;
        let conversation_id = Id::<ConversationMarker>::random();

        debug!(%conversation_id, %creator, "Creating conversation");

        let mut tx = self.begin().await?;
        match conversation {
            NewConversation::Private { creator, other } => {
                if private_exists(&mut tx, creator, other).await? {
                    return Err(DomainError::AlreadyExists.into());
                }

                sqlx::query(
                    "
                    INSERT INTO conversations (id, type, creator_id) VALUES ($1, 'private', $2)
                    ",
                )
                .bind(conversation_id.get())
                .bind(creator.get())
                .execute(&mut *tx)
                .await?;

                add_participants(&mut tx, conversation_id, &[creator.get(), other.get()]).await?;
            }
            NewConversation::Group {
                creator,
                name,
                can_add_users,
                has_invite_link,
            } => {
                sqlx::query(
                    "
                    INSERT INTO conversations
                        (id, type, name, creator_id, can_add_users, has_invite_link)
                    VALUES
                        ($1, 'group', $2, $3, $4, $5)
                    ",
                )
                .bind(conversation_id.get())
                .bind(name)
                .bind(creator.get())
                .bind(can_add_users)
                .bind(has_invite_link)
                .execute(&mut *tx)
                .await?;

                add_participants(&mut tx, conversation_id, &[creator.get()]).await?;
            }
        }
        tx.commit().await?;

        Ok(conversation_id)
    }

    /// Conversations the caller takes part in, most recently active first.
    pub async fn conversations(&self, caller: Id<UserMarker>) -> Result<Vec<Conversation>> {
        let records = sqlx::query_as::<_, ConversationRecord>(
            "
            SELECT
                c.id,
                c.type,
                c.name AS conversation_name,
                (
                    SELECT COUNT(*)
                    FROM messages AS m
                    WHERE
                        m.conversation_id = c.id
                        AND m.user_id <> $1
                        AND m.is_deleted = FALSE
                        AND NOT EXISTS (
                            SELECT 1 FROM message_read AS r
                            WHERE r.message_id = m.id AND r.user_id = $1
                        )
                ) AS unread_count,
                other.id AS user_id,
                other.username,
                other.name,
                other.avatar_url,
                other.avatar_type,
                other.is_deleted AS user_deleted,
                last.text AS last_text,
                last.created_at AS last_created_at,
                last.original_id IS NOT NULL AS last_is_repost,
                last.post_id IS NOT NULL AS last_is_post,
                lu.id AS last_user_id,
                lu.username AS last_username,
                lu.name AS last_name,
                lu.avatar_url AS last_avatar_url,
                lu.avatar_type AS last_avatar_type,
                lu.is_deleted AS last_user_deleted
            FROM
                participants AS p
                INNER JOIN conversations AS c ON c.id = p.conversation_id
                LEFT JOIN LATERAL (
                    SELECT u.id, u.username, u.name, u.avatar_url, u.avatar_type, u.is_deleted
                    FROM participants AS op INNER JOIN users AS u ON u.id = op.user_id
                    WHERE c.type = 'private' AND op.conversation_id = c.id AND op.user_id <> $1
                    LIMIT 1
                ) AS other ON TRUE
                LEFT JOIN LATERAL (
                    SELECT m.text, m.created_at, m.original_id, m.post_id, m.user_id
                    FROM messages AS m
                    WHERE m.conversation_id = c.id AND m.is_deleted = FALSE
                    ORDER BY m.created_at DESC
                    LIMIT 1
                ) AS last ON TRUE
                LEFT JOIN users AS lu ON lu.id = last.user_id
            WHERE
                p.user_id = $1
                AND p.has_left = FALSE
                AND p.is_kicked = FALSE
                AND c.is_deleted = FALSE
            ORDER BY COALESCE(last.created_at, c.created_at) DESC, c.id
            ",
        )
        .bind(caller.get())
        .fetch_all(self.pool())
        .await?;

        let conversations = records
            .into_iter()
            .map(Conversation::try_from)
            .collect::<Result<_, ModelValidationError>>()?;
        Ok(conversations)
    }

    pub async fn conversation_policy(
        &self,
        conversation_id: Id<ConversationMarker>,
    ) -> Result<ConversationPolicy> {
        let record = sqlx::query_as::<_, PolicyRecord>(
            "
            SELECT type, creator_id, can_add_users
            FROM conversations
            WHERE id = $1 AND is_deleted = FALSE
            ",
        )
        .bind(conversation_id.get())
        .fetch_optional(self.pool())
        .await?
        .ok_or(DomainError::NotFound)?;

        Ok(record.try_into()?)
    }

    pub(crate) async fn participant(
        &self,
        conversation_id: Id<ConversationMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<Option<ParticipantRecord>> {
        let record = sqlx::query_as::<_, ParticipantRecord>(
            "
            SELECT has_left, is_kicked
            FROM participants
            WHERE conversation_id = $1 AND user_id = $2
            ",
        )
        .bind(conversation_id.get())
        .bind(user_id.get())
        .fetch_optional(self.pool())
        .await?;

        Ok(record)
    }

    /// Fails with `Forbidden` unless the user currently takes part in the conversation.
    pub(crate) async fn require_participant(
        &self,
        conversation_id: Id<ConversationMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<()> {
        match self.participant(conversation_id, user_id).await? {
            Some(participant) if participant.is_active() => Ok(()),
            _ => Err(DomainError::Forbidden.into()),
        }
    }

    pub async fn add_users(
        &self,
        caller: Id<UserMarker>,
        conversation_id: Id<ConversationMarker>,
        users: &AddUsers,
    ) -> Result<()> {
        let policy = self.conversation_policy(conversation_id).await?;
        if policy.check_add(caller)? == AddPermission::IfParticipant {
            self.require_participant(conversation_id, caller).await?;
        }
        if users.users.is_empty() {
            return Err(DomainError::WrongData.into());
        }

        debug!(%conversation_id, count = users.users.len(), "Adding users");

        let user_ids: Vec<Uuid> = users.users.iter().map(|user| user.get()).collect();
        let mut tx = self.begin().await?;
        add_participants(&mut tx, conversation_id, &user_ids).await?;
        tx.commit().await?;

        Ok(())
    }

    pub async fn kick_user(
        &self,
        caller: Id<UserMarker>,
        conversation_id: Id<ConversationMarker>,
        target: Id<UserMarker>,
    ) -> Result<()> {
        let policy = self.conversation_policy(conversation_id).await?;
        policy.check_kick(caller, target)?;

        let result = sqlx::query(
            "
            UPDATE participants SET is_kicked = TRUE
            WHERE conversation_id = $1 AND user_id = $2 AND is_kicked = FALSE
            ",
        )
        .bind(conversation_id.get())
        .bind(target.get())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound.into());
        }
        Ok(())
    }

    /// Leaves a group. A leaving creator hands the group to the longest
    /// standing participant; the last one out deletes it.
    pub async fn leave_conversation(
        &self,
        caller: Id<UserMarker>,
        conversation_id: Id<ConversationMarker>,
    ) -> Result<()> {
        let mut tx = self.begin().await?;

        let policy: ConversationPolicy = sqlx::query_as::<_, PolicyRecord>(
            "
            SELECT type, creator_id, can_add_users
            FROM conversations
            WHERE id = $1 AND is_deleted = FALSE
            FOR UPDATE
            ",
        )
        .bind(conversation_id.get())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DomainError::NotFound)?
        .try_into()?;
        policy.check_leave()?;

        let result = sqlx::query(
            "
            UPDATE participants SET has_left = TRUE
            WHERE
                conversation_id = $1 AND user_id = $2 AND has_left = FALSE AND is_kicked = FALSE
            ",
        )
        .bind(conversation_id.get())
        .bind(caller.get())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::Forbidden.into());
        }

        if policy.creator == caller {
            let successor = sqlx::query_scalar::<_, Uuid>(
                "
                SELECT user_id
                FROM participants
                WHERE conversation_id = $1 AND has_left = FALSE AND is_kicked = FALSE
                ORDER BY joined_at, user_id
                LIMIT 1
                ",
            )
            .bind(conversation_id.get())
            .fetch_optional(&mut *tx)
            .await?;

            match successor {
                Some(successor) => {
                    debug!(%conversation_id, %successor, "Reassigning conversation creator");
                    sqlx::query("UPDATE conversations SET creator_id = $2 WHERE id = $1")
                        .bind(conversation_id.get())
                        .bind(successor)
                        .execute(&mut *tx)
                        .await?;
                }
                None => {
                    debug!(%conversation_id, "Last participant left, deleting conversation");
                    sqlx::query("UPDATE conversations SET is_deleted = TRUE WHERE id = $1")
                        .bind(conversation_id.get())
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Joins a group through its invite link, or rejoins one the caller left.
    pub async fn join_conversation(
        &self,
        caller: Id<UserMarker>,
        conversation_id: Id<ConversationMarker>,
    ) -> Result<()> {
        let target = sqlx::query_as::<_, JoinTargetRecord>(
            "
            SELECT type, has_invite_link
            FROM conversations
            WHERE id = $1 AND is_deleted = FALSE
            ",
        )
        .bind(conversation_id.get())
        .fetch_optional(self.pool())
        .await?
        .ok_or(DomainError::NotFound)?;

        let kind: ConversationType = target.kind.parse().map_err(ModelValidationError::from)?;
        if kind == ConversationType::Private {
            return Err(DomainError::PrivateConversation.into());
        }

        match self.participant(conversation_id, caller).await? {
            Some(participant) if participant.is_kicked => Err(DomainError::UserKicked.into()),
            Some(participant) if !participant.has_left => Err(DomainError::AlreadyExists.into()),
            Some(_) => {
                sqlx::query(
                    "
                    UPDATE participants SET has_left = FALSE
                    WHERE conversation_id = $1 AND user_id = $2
                    ",
                )
                .bind(conversation_id.get())
                .bind(caller.get())
                .execute(self.pool())
                .await?;
                Ok(())
            }
            None if target.has_invite_link => {
                sqlx::query(
                    "
                    INSERT INTO participants (conversation_id, user_id) VALUES ($1, $2)
                    ",
                )
                .bind(conversation_id.get())
                .bind(caller.get())
                .execute(self.pool())
                .await?;
                Ok(())
            }
            None => Err(DomainError::Forbidden.into()),
        }
    }

    pub async fn conversation_info(
        &self,
        caller: Id<UserMarker>,
        conversation_id: Id<ConversationMarker>,
    ) -> Result<ConversationInfo> {
        let record = sqlx::query_as::<_, ConversationInfoRecord>(
            "
            SELECT id, name, can_add_users, has_invite_link
            FROM conversations
            WHERE id = $1 AND is_deleted = FALSE
            ",
        )
        .bind(conversation_id.get())
        .fetch_optional(self.pool())
        .await?
        .ok_or(DomainError::NotFound)?;

        self.require_participant(conversation_id, caller).await?;

        let users = sqlx::query_as::<_, SummaryRecord>(
            "
            SELECT
                u.id AS user_id,
                u.username,
                u.name,
                u.avatar_url,
                u.avatar_type,
                u.is_deleted AS user_deleted
            FROM
                participants AS p
                INNER JOIN users AS u ON u.id = p.user_id
            WHERE
                p.conversation_id = $1 AND p.has_left = FALSE AND p.is_kicked = FALSE
            ORDER BY p.joined_at, p.user_id
            ",
        )
        .bind(conversation_id.get())
        .fetch_all(self.pool())
        .await?;

        Ok(record.with_users(users)?)
    }
}

async fn private_exists(
    tx: &mut Transaction<'static, Postgres>,
    first: Id<UserMarker>,
    second: Id<UserMarker>,
) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "
        SELECT EXISTS (
            SELECT 1
            FROM
                conversations AS c
                INNER JOIN participants AS a ON a.conversation_id = c.id AND a.user_id = $1
                INNER JOIN participants AS b ON b.conversation_id = c.id AND b.user_id = $2
            WHERE
                c.type = 'private' AND c.is_deleted = FALSE
        )
        ",
    )
    .bind(first.get())
    .bind(second.get())
    .fetch_one(&mut **tx)
    .await?;

    Ok(exists)
}

/// Adds users to a conversation. Users that were kicked or left are let back in.
async fn add_participants(
    tx: &mut Transaction<'static, Postgres>,
    conversation_id: Id<ConversationMarker>,
    user_ids: &[Uuid],
) -> Result<()> {
    sqlx::query(
        "
        INSERT INTO participants (conversation_id, user_id)
        SELECT $1, user_id FROM UNNEST($2::uuid[]) AS user_id
        ON CONFLICT ON CONSTRAINT participants_pkey
        DO UPDATE SET is_kicked = FALSE, has_left = FALSE
        ",
    )
    .bind(conversation_id.get())
    .bind(user_ids)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
