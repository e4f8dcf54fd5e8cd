//! Snapshot of the parts of the Postgres catalog exposed through GraphQL.

use std::collections::BTreeMap;

/// Relations and functions of one schema.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Catalog {
    pub schema: String,

    pub relations: Vec<Relation>,

    pub functions: Vec<Function>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Relation {
    pub name: String,

    pub kind: RelationKind,

    pub columns: Vec<Column>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelationKind {
    Table,
    View,
    MaterializedView,
}

impl RelationKind {
    fn from_relkind(relkind: &str) -> Option<Self> {
        match relkind {
            "r" | "p" => Some(Self::Table),
            "v" => Some(Self::View),
            "m" => Some(Self::MaterializedView),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Column {
    pub name: String,

    pub ty: PgType,

    pub not_null: bool,

    pub has_default: bool,

    /// 1-based position inside the primary key.
    pub primary_key_position: Option<i32>,
}

/// Column or argument type, reduced to what the type mapping needs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PgType {
    /// Name of the element type for arrays.
    pub name: String,

    /// `pg_type.typtype` of the element type.
    pub kind: String,

    pub is_array: bool,
}

impl PgType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: "b".to_string(), is_array: false }
    }

    #[must_use]
    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Volatility {
    Immutable,
    Stable,
    Volatile,
}

impl Volatility {
    fn from_provolatile(provolatile: &str) -> Self {
        match provolatile {
            "i" => Self::Immutable,
            "s" => Self::Stable,
            _ => Self::Volatile,
        }
    }

    /// Volatile functions may write and are exposed as mutations.
    pub const fn is_mutation(self) -> bool { matches!(self, Self::Volatile) }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Function {
    pub name: String,

    pub volatility: Volatility,

    pub returns_set: bool,

    pub return_type: ReturnType,

    pub arguments: Vec<FunctionArgument>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReturnType {
    pub schema: String,

    pub ty: PgType,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FunctionArgument {
    pub name: String,

    /// Type as rendered by `format_type`, usable in a cast.
    pub sql_type: String,

    pub ty: PgType,
}

/// One row of the column introspection query.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct ColumnRow {
    pub relation_name: String,
    pub relation_kind: String,
    pub column_name: String,
    pub type_name: String,
    pub type_kind: String,
    pub is_array: bool,
    pub not_null: bool,
    pub has_default: bool,
    pub primary_key_position: Option<i32>,
}

/// One row of the function introspection query.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct FunctionRow {
    pub function_name: String,
    pub volatility: String,
    pub returns_set: bool,
    pub return_type_schema: String,
    pub return_type_name: String,
    pub return_type_kind: String,
    pub returns_array: bool,
    pub argument_names: Vec<String>,
    pub argument_sql_types: Vec<String>,
    pub argument_type_names: Vec<String>,
    pub argument_type_kinds: Vec<String>,
    pub argument_is_array: Vec<bool>,
}

impl Catalog {
    /// Groups introspection rows. Column rows must be ordered by relation
    /// name and attribute number.
    pub fn from_rows(
        schema: impl Into<String>,
        column_rows: Vec<ColumnRow>,
        function_rows: Vec<FunctionRow>,
    ) -> Self {
        let mut relations: BTreeMap<String, Relation> = BTreeMap::new();
        for row in column_rows {
            let Some(kind) = RelationKind::from_relkind(&row.relation_kind) else {
                continue;
            };
            let relation = relations.entry(row.relation_name.clone()).or_insert_with(|| Relation {
                name: row.relation_name.clone(),
                kind,
                columns: Vec::new(),
            });
            relation.columns.push(Column {
                name: row.column_name,
                ty: PgType { name: row.type_name, kind: row.type_kind, is_array: row.is_array },
                not_null: row.not_null,
                has_default: row.has_default,
                primary_key_position: row.primary_key_position,
            });
        }

        let functions = function_rows.into_iter().map(Function::from).collect();

        Self { schema: schema.into(), relations: relations.into_values().collect(), functions }
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|relation| relation.name == name)
    }
}

impl From<FunctionRow> for Function {
    fn from(row: FunctionRow) -> Self {
        let arguments = row
            .argument_sql_types
            .into_iter()
            .enumerate()
            .map(|(index, sql_type)| FunctionArgument {
                name: row
                    .argument_names
                    .get(index)
                    .filter(|name| !name.is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("arg{index}")),
                sql_type,
                ty: PgType {
                    name: row.argument_type_names.get(index).cloned().unwrap_or_default(),
                    kind: row.argument_type_kinds.get(index).cloned().unwrap_or_default(),
                    is_array: row.argument_is_array.get(index).copied().unwrap_or_default(),
                },
            })
            .collect();

        Self {
            name: row.function_name,
            volatility: Volatility::from_provolatile(&row.volatility),
            returns_set: row.returns_set,
            return_type: ReturnType {
                schema: row.return_type_schema,
                ty: PgType {
                    name: row.return_type_name,
                    kind: row.return_type_kind,
                    is_array: row.returns_array,
                },
            },
            arguments,
        }
    }
}

impl Relation {
    /// Primary key columns in key order.
    pub fn primary_key(&self) -> Vec<&Column> {
        let mut key: Vec<&Column> =
            self.columns.iter().filter(|column| column.primary_key_position.is_some()).collect();
        key.sort_by_key(|column| column.primary_key_position);
        key
    }

    pub const fn is_writable(&self) -> bool { matches!(self.kind, RelationKind::Table) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_row(relation: &str, column: &str, type_name: &str, pk: Option<i32>) -> ColumnRow {
        ColumnRow {
            relation_name: relation.to_string(),
            relation_kind: "r".to_string(),
            column_name: column.to_string(),
            type_name: type_name.to_string(),
            type_kind: "b".to_string(),
            is_array: false,
            not_null: pk.is_some(),
            has_default: false,
            primary_key_position: pk,
        }
    }

    #[test]
    fn test_from_rows_groups_columns() {
        let mut view_column = column_row("active_users", "id", "int4", None);
        view_column.relation_kind = "v".to_string();
        let mut sequence = column_row("users_id_seq", "last_value", "int8", None);
        sequence.relation_kind = "S".to_string();

        let catalog = Catalog::from_rows(
            "app_public",
            vec![
                view_column,
                column_row("memberships", "user_id", "int4", Some(2)),
                column_row("memberships", "org_id", "int4", Some(1)),
                sequence,
                column_row("users", "id", "int4", Some(1)),
                column_row("users", "first_name", "text", None),
            ],
            Vec::new(),
        );

        assert_eq!(catalog.relations.len(), 3);
        assert_eq!(catalog.relation("active_users").unwrap().kind, RelationKind::View);
        assert!(catalog.relation("users_id_seq").is_none());

        let users = catalog.relation("users").unwrap();
        assert!(users.is_writable());
        assert_eq!(users.columns.len(), 2);

        let key: Vec<&str> = catalog
            .relation("memberships")
            .unwrap()
            .primary_key()
            .iter()
            .map(|column| column.name.as_str())
            .collect();
        assert_eq!(key, ["org_id", "user_id"]);
    }

    #[test]
    fn test_function_from_row() {
        let function = Function::from(FunctionRow {
            function_name: "authenticate".to_string(),
            volatility: "v".to_string(),
            returns_set: false,
            return_type_schema: "app_public".to_string(),
            return_type_name: "jwt".to_string(),
            return_type_kind: "c".to_string(),
            returns_array: false,
            argument_names: vec!["email".to_string(), String::new()],
            argument_sql_types: vec!["text".to_string(), "integer[]".to_string()],
            argument_type_names: vec!["text".to_string(), "int4".to_string()],
            argument_type_kinds: vec!["b".to_string(), "b".to_string()],
            argument_is_array: vec![false, true],
        });

        assert!(function.volatility.is_mutation());
        assert_eq!(function.arguments[0].name, "email");
        assert_eq!(function.arguments[1].name, "arg1");
        assert!(function.arguments[1].ty.is_array);
        assert_eq!(function.arguments[1].sql_type, "integer[]");
    }
}
