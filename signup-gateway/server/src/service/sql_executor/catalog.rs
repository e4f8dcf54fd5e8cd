use async_trait::async_trait;
use snafu::ResultExt;
use sqlx::{Executor, Postgres};

use crate::{
    graphql::catalog::{Catalog, ColumnRow, FunctionRow},
    service::error::{self, Result},
};

#[async_trait]
pub trait CatalogSqlExecutor {
    async fn introspect_catalog(&mut self, schema: &str) -> Result<Catalog>;
}

#[async_trait]
impl<E> CatalogSqlExecutor for E
where
    E: Send,
    for<'c> &'c mut E: Executor<'c, Database = Postgres>,
{
    async fn introspect_catalog(&mut self, schema: &str) -> Result<Catalog> {
        let columns = sqlx::query_as::<_, ColumnRow>(include_str!("../../../sql/catalog/columns.sql"))
            .bind(schema)
            .fetch_all(&mut *self)
            .await
            .context(error::IntrospectColumnsSnafu { schema })?;

        let functions =
            sqlx::query_as::<_, FunctionRow>(include_str!("../../../sql/catalog/functions.sql"))
                .bind(schema)
                .fetch_all(&mut *self)
                .await
                .context(error::IntrospectFunctionsSnafu { schema })?;

        Ok(Catalog::from_rows(schema, columns, functions))
    }
}
