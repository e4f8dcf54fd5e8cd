use std::sync::Arc;

use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;

use super::{jwt::Claims, sql::Statement};

/// How the transaction of a request ends.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Commit,
    Rollback,
}

impl Outcome {
    /// Only a response without errors is committed.
    pub fn of(response: &async_graphql::Response) -> Self {
        if response.is_ok() {
            Self::Commit
        } else {
            Self::Rollback
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Commit => "ok",
            Self::Rollback => "error",
        }
    }
}

/// Transaction shared by all resolvers of one GraphQL request.
#[derive(Clone)]
pub struct Session {
    transaction: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
}

impl Session {
    /// Opens the transaction and applies the claims and role as
    /// transaction-local settings.
    pub async fn begin(
        database: &PgPool,
        claims: Option<&Claims>,
        role: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        let mut transaction = database.begin().await?;

        for (name, value) in claims.map(Claims::settings).unwrap_or_default() {
            let _ = sqlx::query("SELECT set_config($1, $2, true)")
                .bind(name)
                .bind(value)
                .execute(&mut *transaction)
                .await?;
        }

        if let Some(role) = role {
            let _ = sqlx::query("SELECT set_config('role', $1, true)")
                .bind(role)
                .execute(&mut *transaction)
                .await?;
        }

        Ok(Self { transaction: Arc::new(Mutex::new(Some(transaction))) })
    }

    pub async fn fetch_all(
        &self,
        statement: &Statement,
    ) -> async_graphql::Result<Vec<serde_json::Value>> {
        let mut guard = self.transaction.lock().await;
        let transaction = guard.as_mut().ok_or("request transaction is already finished")?;
        Ok(statement.fetch_all(&mut **transaction).await?)
    }

    pub async fn fetch_optional(
        &self,
        statement: &Statement,
    ) -> async_graphql::Result<Option<serde_json::Value>> {
        let mut guard = self.transaction.lock().await;
        let transaction = guard.as_mut().ok_or("request transaction is already finished")?;
        Ok(statement.fetch_optional(&mut **transaction).await?)
    }

    /// Commits or rolls back. Later calls are no-ops.
    pub async fn finish(&self, outcome: Outcome) -> Result<(), sqlx::Error> {
        let Some(transaction) = self.transaction.lock().await.take() else {
            return Ok(());
        };

        match outcome {
            Outcome::Commit => transaction.commit().await,
            Outcome::Rollback => transaction.rollback().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use async_graphql::{Response, ServerError, Value};

    use super::Outcome;

    #[test]
    fn test_outcome_of_response() {
        assert_eq!(Outcome::of(&Response::new(Value::Null)), Outcome::Commit);

        let failed = Response::from_errors(vec![ServerError::new("permission denied", None)]);
        assert_eq!(Outcome::of(&failed), Outcome::Rollback);

        // partial data with an error still rolls back
        let mut partial = Response::new(Value::String("partial".to_string()));
        partial.errors.push(ServerError::new("permission denied", None));
        assert_eq!(Outcome::of(&partial), Outcome::Rollback);
    }
}
