use sqlx::{PgPool, Postgres, Transaction, migrate::MigrateError, postgres::PgPoolOptions};
use thiserror::Error;
use tracing::debug;
use warble_common::{
    error::DomainError,
    model::{ModelValidationError, auth::PasswordHashError},
};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Password(#[from] PasswordHashError),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl DbError {
    #[must_use]
    pub fn domain(&self) -> Option<DomainError> {
        match self {
            DbError::Domain(err) => Some(*err),
            _ => None,
        }
    }
}

/// Constraint violations are the caller's fault, so they surface as domain errors.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::Domain(DomainError::NotFound),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::Domain(DomainError::AlreadyExists)
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DbError::Domain(DomainError::NotFound)
            }
            _ => DbError::Sqlx(err),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        debug!(max_connections, "Connecting to database");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Rolls back when dropped without [`Transaction::commit`].
    pub(crate) async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }
}
