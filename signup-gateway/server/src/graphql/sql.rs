//! SQL generation for the GraphQL resolvers.
//!
//! Identifiers come from the catalog and are always quoted. Values never
//! appear in the SQL text: they travel as one `jsonb` parameter and are
//! unpacked with `jsonb_populate_record` or a cast of `->>`.

use sqlx::PgConnection;

/// Double-quotes an identifier, doubling embedded quotes.
pub fn quote_ident(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

fn populate(schema: &str, relation: &str, param: usize) -> String {
    format!("jsonb_populate_record(NULL::{}, ${param}::jsonb)", qualified(schema, relation))
}

fn key_predicate(alias: &str, columns: &[String]) -> String {
    columns
        .iter()
        .map(|column| {
            let column = quote_ident(column);
            format!("t.{column} = {alias}.{column}")
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Bind {
    Json(serde_json::Value),
    Int(Option<i64>),
}

/// SQL text plus its positional parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,

    pub binds: Vec<Bind>,
}

impl Statement {
    /// Rows of the single `jsonb` column produced by the statement.
    pub async fn fetch_all(
        &self,
        connection: &mut PgConnection,
    ) -> Result<Vec<serde_json::Value>, sqlx::Error> {
        let mut query = sqlx::query_scalar::<_, Option<serde_json::Value>>(&self.sql);
        for bind in &self.binds {
            query = match bind {
                Bind::Json(value) => query.bind(value.clone()),
                Bind::Int(value) => query.bind(*value),
            };
        }

        let rows = query.fetch_all(connection).await?;
        Ok(rows.into_iter().map(Option::unwrap_or_default).collect())
    }

    pub async fn fetch_optional(
        &self,
        connection: &mut PgConnection,
    ) -> Result<Option<serde_json::Value>, sqlx::Error> {
        Ok(self.fetch_all(connection).await?.into_iter().next().filter(|value| !value.is_null()))
    }
}

/// `all<Relation>` query.
pub struct SelectList<'a> {
    pub schema: &'a str,
    pub relation: &'a str,
    /// Columns compared with `IS NOT DISTINCT FROM` against `condition`.
    pub condition_columns: Vec<String>,
    pub condition: serde_json::Value,
    pub order_by: Vec<(String, Direction)>,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl SelectList<'_> {
    pub fn build(self) -> Statement {
        let mut sql = format!(
            "SELECT to_jsonb(t) FROM {} AS t, {} AS c",
            qualified(self.schema, self.relation),
            populate(self.schema, self.relation, 1)
        );

        if !self.condition_columns.is_empty() {
            let predicate = self
                .condition_columns
                .iter()
                .map(|column| {
                    let column = quote_ident(column);
                    format!("t.{column} IS NOT DISTINCT FROM c.{column}")
                })
                .collect::<Vec<_>>()
                .join(" AND ");
            sql.push_str(&format!(" WHERE {predicate}"));
        }

        if !self.order_by.is_empty() {
            let order = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("t.{} {}", quote_ident(column), direction.as_sql()))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {order}"));
        }

        sql.push_str(" LIMIT $2 OFFSET $3");

        Statement {
            sql,
            binds: vec![Bind::Json(self.condition), Bind::Int(self.limit), Bind::Int(Some(self.offset))],
        }
    }
}

/// `<relation>By<Key>` query.
pub fn select_by_key(
    schema: &str,
    relation: &str,
    key_columns: &[String],
    key: serde_json::Value,
) -> Statement {
    Statement {
        sql: format!(
            "SELECT to_jsonb(t) FROM {} AS t, {} AS k WHERE {}",
            qualified(schema, relation),
            populate(schema, relation, 1),
            key_predicate("k", key_columns)
        ),
        binds: vec![Bind::Json(key)],
    }
}

/// `create<Relation>` mutation. `columns` are the keys present in `values`.
pub fn insert(schema: &str, relation: &str, columns: &[String], values: serde_json::Value) -> Statement {
    let table = qualified(schema, relation);
    if columns.is_empty() {
        return Statement {
            sql: format!("INSERT INTO {table} AS t DEFAULT VALUES RETURNING to_jsonb(t)"),
            binds: Vec::new(),
        };
    }

    let target = columns.iter().map(|column| quote_ident(column)).collect::<Vec<_>>().join(", ");
    let source =
        columns.iter().map(|column| format!("v.{}", quote_ident(column))).collect::<Vec<_>>().join(", ");

    Statement {
        sql: format!(
            "INSERT INTO {table} AS t ({target}) SELECT {source} FROM {} AS v RETURNING to_jsonb(t)",
            populate(schema, relation, 1)
        ),
        binds: vec![Bind::Json(values)],
    }
}

/// `update<Relation>By<Key>` mutation. An empty patch selects the row.
pub fn update(
    schema: &str,
    relation: &str,
    key_columns: &[String],
    key: serde_json::Value,
    patch_columns: &[String],
    patch: serde_json::Value,
) -> Statement {
    if patch_columns.is_empty() {
        return select_by_key(schema, relation, key_columns, key);
    }

    let assignments = patch_columns
        .iter()
        .map(|column| {
            let column = quote_ident(column);
            format!("{column} = p.{column}")
        })
        .collect::<Vec<_>>()
        .join(", ");

    Statement {
        sql: format!(
            "UPDATE {} AS t SET {assignments} FROM {} AS p, {} AS k WHERE {} RETURNING to_jsonb(t)",
            qualified(schema, relation),
            populate(schema, relation, 1),
            populate(schema, relation, 2),
            key_predicate("k", key_columns)
        ),
        binds: vec![Bind::Json(patch), Bind::Json(key)],
    }
}

/// `delete<Relation>By<Key>` mutation.
pub fn delete(
    schema: &str,
    relation: &str,
    key_columns: &[String],
    key: serde_json::Value,
) -> Statement {
    Statement {
        sql: format!(
            "DELETE FROM {} AS t USING {} AS k WHERE {} RETURNING to_jsonb(t)",
            qualified(schema, relation),
            populate(schema, relation, 1),
            key_predicate("k", key_columns)
        ),
        binds: vec![Bind::Json(key)],
    }
}

/// Argument of a function call: JSON key and the SQL type to cast to.
pub struct CallArgument<'a> {
    pub key: &'a str,
    pub sql_type: &'a str,
    pub is_array: bool,
}

/// Calls a function with arguments taken from one `jsonb` object. Set
/// returning functions yield one row per element.
pub fn call_function(
    schema: &str,
    function: &str,
    arguments: &[CallArgument<'_>],
    returns_set: bool,
    values: serde_json::Value,
) -> Statement {
    let arguments = arguments
        .iter()
        .map(|CallArgument { key, sql_type, is_array }| {
            let key = key.replace('\'', "''");
            if *is_array {
                format!(
                    "(SELECT array_agg(e) FROM jsonb_array_elements_text($1::jsonb -> '{key}') AS \
                     e)::{sql_type}"
                )
            } else {
                format!("($1::jsonb ->> '{key}')::{sql_type}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    let call = format!("{}({arguments})", qualified(schema, function));
    let sql = if returns_set {
        format!("SELECT to_jsonb(r) FROM {call} AS r")
    } else {
        format!("SELECT to_jsonb({call})")
    };

    Statement { sql, binds: vec![Bind::Json(values)] }
}
