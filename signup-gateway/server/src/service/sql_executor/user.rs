use async_trait::async_trait;
use snafu::ResultExt;
use sqlx::{Executor, Postgres};

use crate::service::{
    error::{self, Result},
    sign_up::UserRecord,
};

#[async_trait]
pub trait UserSqlExecutor {
    /// Runs `query` with `user_id` bound as its only text parameter.
    async fn find_users(&mut self, query: &str, user_id: &str) -> Result<Vec<UserRecord>>;
}

#[async_trait]
impl<E> UserSqlExecutor for E
where
    E: Send,
    for<'c> &'c mut E: Executor<'c, Database = Postgres>,
{
    async fn find_users(&mut self, query: &str, user_id: &str) -> Result<Vec<UserRecord>> {
        let users = sqlx::query_as::<_, UserRecord>(query)
            .bind(user_id)
            .fetch_all(&mut *self)
            .await
            .context(error::FindUsersSnafu { user_id })?;

        Ok(users)
    }
}
