use async_trait::async_trait;
use sqlx::PgPool;

use crate::service::{
    error::{self, Result},
    sql_executor::UserSqlExecutor,
};

#[derive(Clone, Debug, Eq, PartialEq, sqlx::FromRow)]
pub struct UserRecord {
    pub first_name: String,

    pub last_name: String,
}

/// Source of the user rows a notification refers to.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_users(&self, user_id: &str) -> Result<Vec<UserRecord>>;
}

/// Looks users up with a parameterized query on the shared pool.
#[derive(Clone, Debug)]
pub struct PgUserDirectory {
    database: PgPool,
    query: String,
}

impl PgUserDirectory {
    /// `query` must select `first_name` and `last_name` and take the user id
    /// as `$1`.
    #[must_use]
    pub const fn new(database: PgPool, query: String) -> Self { Self { database, query } }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_users(&self, user_id: &str) -> Result<Vec<UserRecord>> {
        let mut conn = self
            .database
            .acquire()
            .await
            .map_err(|source| error::Error::FindUsers { user_id: user_id.to_string(), source })?;

        UserSqlExecutor::find_users(&mut *conn, &self.query, user_id).await
    }
}
