use crate::{
    client::{DbClient, Result},
    record::{CredentialsRecord, FollowInfoRecord, UserInfoRecord},
};
use tracing::debug;
use uuid::Uuid;
use warble_common::{
    error::DomainError,
    model::{
        Id, ModelValidationError,
        auth::{check_password_strength, hash_password, verify_password},
        user::{
            ChangeUser, FollowInfo, LoginUser, NewUser, UserCredentials, UserInfo, UserMarker,
            Username,
        },
    },
    page::{Page, Paged, USERS_PER_PAGE},
};

fn caller_uuid(caller: Option<Id<UserMarker>>) -> Uuid {
    caller.map_or_else(Uuid::nil, Id::get)
}

impl DbClient {
    pub async fn create_user(&self, user: &NewUser) -> Result<Id<UserMarker>> {
        check_password_strength(&user.password)?;
        let password_hash = hash_password(&user.password)?;
        let user_id = Id::<UserMarker>::random();

        debug!(%user_id, "Registering user");

        sqlx::query(
            "
            INSERT INTO users (id, email, username, password, name)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(user_id.get())
        .bind(&user.email)
        .bind(user.username.get())
        .bind(password_hash)
        .bind(&user.name)
        .execute(self.pool())
        .await?;

        Ok(user_id)
    }

    pub async fn fetch_credentials(
        &self,
        user_id: Id<UserMarker>,
    ) -> Result<Option<UserCredentials>> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "
            SELECT id, password, is_deleted FROM users WHERE id = $1
            ",
        )
        .bind(user_id.get())
        .fetch_optional(self.pool())
        .await?;

        Ok(record.map(UserCredentials::from))
    }

    /// The id of the live user the login belongs to.
    pub async fn login(&self, login: &LoginUser) -> Result<Id<UserMarker>> {
        let credentials: UserCredentials = sqlx::query_as::<_, CredentialsRecord>(
            "
            SELECT id, password, is_deleted FROM users WHERE email = $1
            ",
        )
        .bind(&login.email)
        .fetch_optional(self.pool())
        .await?
        .ok_or(DomainError::NotFound)?
        .into();

        if credentials.is_deleted {
            return Err(DomainError::DeletedUser.into());
        }
        if !verify_password(&login.password, &credentials.password_hash)? {
            return Err(DomainError::WrongPassword.into());
        }

        Ok(credentials.id)
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "
            SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)
            ",
        )
        .bind(email)
        .fetch_one(self.pool())
        .await?;

        Ok(exists)
    }

    /// Whether someone other than the caller already uses the username.
    pub async fn username_exists(
        &self,
        username: &Username,
        caller: Option<Id<UserMarker>>,
    ) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "
            SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 AND id <> $2)
            ",
        )
        .bind(username.get())
        .bind(caller_uuid(caller))
        .fetch_one(self.pool())
        .await?;

        Ok(exists)
    }

    pub async fn user_info(
        &self,
        user_id: Id<UserMarker>,
        caller: Option<Id<UserMarker>>,
    ) -> Result<UserInfo> {
        let record = sqlx::query_as::<_, UserInfoRecord>(
            "
            SELECT
                u.id,
                u.name,
                u.username,
                u.created_at,
                u.is_private,
                u.avatar_url,
                u.avatar_type,
                u.bio,
                u.is_deleted,
                (
                    SELECT COUNT(*)
                    FROM users_followers AS f INNER JOIN users AS fu ON f.follower_id = fu.id
                    WHERE f.user_id = u.id AND fu.is_deleted = FALSE
                ) AS followers,
                (
                    SELECT COUNT(*)
                    FROM users_followers AS f INNER JOIN users AS fu ON f.user_id = fu.id
                    WHERE f.follower_id = u.id AND fu.is_deleted = FALSE
                ) AS following,
                (
                    SELECT COUNT(*)
                    FROM posts AS p
                    WHERE p.user_id = u.id AND p.comment_to_id IS NULL AND p.is_deleted = FALSE
                ) AS post_count,
                EXISTS (
                    SELECT 1 FROM users_followers AS s
                    WHERE s.user_id = u.id AND s.follower_id = $2
                ) AS is_subscribed
            FROM
                users AS u
            WHERE
                u.id = $1
            ",
        )
        .bind(user_id.get())
        .bind(caller_uuid(caller))
        .fetch_optional(self.pool())
        .await?
        .ok_or(DomainError::NotFound)?;

        if record.is_deleted {
            return Err(DomainError::DeletedUser.into());
        }

        Ok(record.try_into()?)
    }

    pub async fn change_user(&self, user_id: Id<UserMarker>, change: &ChangeUser) -> Result<()> {
        if change.is_empty() {
            return Err(DomainError::WrongData.into());
        }

        let password_hash = match &change.password {
            Some(password) => {
                check_password_strength(password)?;
                let confirm = change
                    .confirm_password
                    .as_deref()
                    .ok_or(DomainError::WrongPassword)?;
                let credentials = self
                    .fetch_credentials(user_id)
                    .await?
                    .ok_or(DomainError::NotFound)?;
                if !verify_password(confirm, &credentials.password_hash)? {
                    return Err(DomainError::WrongPassword.into());
                }
                Some(hash_password(password)?)
            }
            None => None,
        };

        // An avatar with an empty url clears both columns.
        let avatar = change
            .avatar
            .as_ref()
            .map(|avatar| (!avatar.url.is_empty()).then_some(avatar));

        sqlx::query(
            "
            UPDATE users SET
                name = COALESCE($2, name),
                username = COALESCE($3, username),
                bio = COALESCE($4, bio),
                password = COALESCE($5, password),
                avatar_url = CASE WHEN $6 THEN $7 ELSE avatar_url END,
                avatar_type = CASE WHEN $6 THEN $8 ELSE avatar_type END,
                updated_at = now()
            WHERE id = $1 AND is_deleted = FALSE
            ",
        )
        .bind(user_id.get())
        .bind(change.name.as_deref())
        .bind(change.username.as_ref().map(Username::get))
        .bind(change.bio.as_deref())
        .bind(password_hash)
        .bind(avatar.is_some())
        .bind(avatar.flatten().map(|avatar| avatar.url.as_str()))
        .bind(avatar.flatten().map(|avatar| avatar.kind.as_str()))
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn follow(&self, user_id: Id<UserMarker>, follower: Id<UserMarker>) -> Result<()> {
        if user_id == follower {
            return Err(DomainError::WrongData.into());
        }

        sqlx::query(
            "
            INSERT INTO users_followers (user_id, follower_id) VALUES ($1, $2)
            ",
        )
        .bind(user_id.get())
        .bind(follower.get())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn unfollow(&self, user_id: Id<UserMarker>, follower: Id<UserMarker>) -> Result<()> {
        let result = sqlx::query(
            "
            DELETE FROM users_followers WHERE user_id = $1 AND follower_id = $2
            ",
        )
        .bind(user_id.get())
        .bind(follower.get())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound.into());
        }
        Ok(())
    }

    /// Users that `user_id` follows, flagged by whether the caller follows them too.
    pub async fn following(
        &self,
        user_id: Id<UserMarker>,
        caller: Option<Id<UserMarker>>,
        page: Page,
    ) -> Result<Paged<FollowInfo>> {
        let window = page.window(USERS_PER_PAGE);
        let records = sqlx::query_as::<_, FollowInfoRecord>(
            "
            SELECT
                u.id, u.name, u.username, u.created_at, u.is_private, u.avatar_url, u.avatar_type,
                EXISTS (
                    SELECT 1 FROM users_followers AS s
                    WHERE s.user_id = u.id AND s.follower_id = $2
                ) AS is_subscribed
            FROM
                users_followers AS f
                INNER JOIN users AS u ON f.user_id = u.id
            WHERE
                f.follower_id = $1 AND u.is_deleted = FALSE
            ORDER BY u.username, u.id
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(user_id.get())
        .bind(caller_uuid(caller))
        .bind(window.limit)
        .bind(window.offset)
        .fetch_all(self.pool())
        .await?;

        let users = records
            .into_iter()
            .map(FollowInfo::try_from)
            .collect::<Result<_, ModelValidationError>>()?;
        let total = self.count_following(user_id).await?;
        Ok(Paged::new(users, page.has_more(total, USERS_PER_PAGE)))
    }

    pub async fn followers(
        &self,
        user_id: Id<UserMarker>,
        caller: Option<Id<UserMarker>>,
        page: Page,
    ) -> Result<Paged<FollowInfo>> {
        let window = page.window(USERS_PER_PAGE);
        let records = sqlx::query_as::<_, FollowInfoRecord>(
            "
            SELECT
                u.id, u.name, u.username, u.created_at, u.is_private, u.avatar_url, u.avatar_type,
                EXISTS (
                    SELECT 1 FROM users_followers AS s
                    WHERE s.user_id = u.id AND s.follower_id = $2
                ) AS is_subscribed
            FROM
                users_followers AS f
                INNER JOIN users AS u ON f.follower_id = u.id
            WHERE
                f.user_id = $1 AND u.is_deleted = FALSE
            ORDER BY u.username, u.id
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(user_id.get())
        .bind(caller_uuid(caller))
        .bind(window.limit)
        .bind(window.offset)
        .fetch_all(self.pool())
        .await?;

        let users = records
            .into_iter()
            .map(FollowInfo::try_from)
            .collect::<Result<_, ModelValidationError>>()?;
        let total = self.count_followers(user_id).await?;
        Ok(Paged::new(users, page.has_more(total, USERS_PER_PAGE)))
    }

    pub async fn block(&self, user_id: Id<UserMarker>, blocked: Id<UserMarker>) -> Result<()> {
        if user_id == blocked {
            return Err(DomainError::WrongData.into());
        }

        sqlx::query(
            "
            INSERT INTO users_blocked (user_id, blocked_id) VALUES ($1, $2)
            ",
        )
        .bind(user_id.get())
        .bind(blocked.get())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn unblock(&self, user_id: Id<UserMarker>, blocked: Id<UserMarker>) -> Result<()> {
        let result = sqlx::query(
            "
            DELETE FROM users_blocked WHERE user_id = $1 AND blocked_id = $2
            ",
        )
        .bind(user_id.get())
        .bind(blocked.get())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound.into());
        }
        Ok(())
    }

    /// Whether `user_id` has blocked `other`.
    pub async fn is_blocked(
        &self,
        user_id: Id<UserMarker>,
        other: Id<UserMarker>,
    ) -> Result<bool> {
        let blocked = sqlx::query_scalar::<_, bool>(
            "
            SELECT EXISTS (SELECT 1 FROM users_blocked WHERE user_id = $1 AND blocked_id = $2)
            ",
        )
        .bind(user_id.get())
        .bind(other.get())
        .fetch_one(self.pool())
        .await?;

        Ok(blocked)
    }
}
