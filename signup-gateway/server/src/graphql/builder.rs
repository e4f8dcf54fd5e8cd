//! Builds the dynamic GraphQL schema of a [`Catalog`].

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_graphql::{
    dynamic::{
        Enum, EnumItem, Field, FieldFuture, FieldValue, InputObject, InputValue, Object,
        ResolverContext, Scalar, Schema, Type, TypeRef,
    },
    Value,
};

use super::{
    catalog::{Catalog, Column, Function, PgType, Relation},
    error::Error,
    jwt::JwtKeys,
    naming,
    session::Session,
    sql::{self, CallArgument, Direction, SelectList},
};

pub const BIG_INT: &str = "BigInt";
pub const BIG_FLOAT: &str = "BigFloat";
pub const DATETIME: &str = "Datetime";
pub const DATE: &str = "Date";
pub const UUID: &str = "UUID";
pub const JSON: &str = "JSON";
pub const JWT_TOKEN: &str = "JwtToken";

const QUERY: &str = "Query";
const MUTATION: &str = "Mutation";
const NATURAL: &str = "NATURAL";
const PRIMARY_KEY_ASC: &str = "PRIMARY_KEY_ASC";
const PRIMARY_KEY_DESC: &str = "PRIMARY_KEY_DESC";

/// Options of schema generation that do not come from the catalog.
#[derive(Clone, Debug, Default)]
pub struct SchemaSettings {
    /// `schema.type` of the composite signed into a token.
    pub jwt_type_identifier: Option<String>,

    pub jwt: Option<Arc<JwtKeys>>,

    /// `first` applied when the client does not pass one.
    pub default_page_size: Option<u32>,
}

impl SchemaSettings {
    fn jwt_type(&self, default_schema: &str) -> Option<(String, String)> {
        let identifier = self.jwt_type_identifier.as_deref()?;
        Some(identifier.split_once('.').map_or_else(
            || (default_schema.to_string(), identifier.to_string()),
            |(schema, name)| (schema.to_string(), name.to_string()),
        ))
    }
}

fn scalar_name(ty: &PgType) -> &'static str {
    match ty.name.as_str() {
        "int2" | "int4" => TypeRef::INT,
        "int8" => BIG_INT,
        "float4" | "float8" => TypeRef::FLOAT,
        "numeric" => BIG_FLOAT,
        "bool" => TypeRef::BOOLEAN,
        "uuid" => UUID,
        "date" => DATE,
        "timestamp" | "timestamptz" => DATETIME,
        "json" | "jsonb" => JSON,
        _ if ty.kind == "c" => JSON,
        _ => TypeRef::STRING,
    }
}

fn type_ref(ty: &PgType, non_null: bool) -> TypeRef {
    let name = scalar_name(ty);
    match (ty.is_array, non_null) {
        (true, true) => TypeRef::named_list_nn(name),
        (true, false) => TypeRef::named_list(name),
        (false, true) => TypeRef::named_nn(name),
        (false, false) => TypeRef::named(name),
    }
}

fn json_value<'a>(value: Option<&serde_json::Value>) -> async_graphql::Result<Option<FieldValue<'a>>> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => Ok(Some(FieldValue::value(Value::from_json(value.clone())?))),
    }
}

fn row_list<'a>(rows: Vec<serde_json::Value>) -> FieldValue<'a> {
    FieldValue::list(rows.into_iter().map(FieldValue::owned_any))
}

/// Converts a GraphQL input object into a JSON object keyed by column name.
fn columns_json(
    value: &async_graphql::Value,
    field_columns: &HashMap<String, String>,
) -> async_graphql::Result<(Vec<String>, serde_json::Value)> {
    let mut columns = Vec::new();
    let mut object = serde_json::Map::new();

    if let async_graphql::Value::Object(fields) = value {
        for (name, value) in fields {
            let column = field_columns
                .get(name.as_str())
                .ok_or_else(|| format!("unknown field `{name}`"))?;
            columns.push(column.clone());
            drop(object.insert(column.clone(), value.clone().into_json()?));
        }
    }

    Ok((columns, serde_json::Value::Object(object)))
}

/// What the resolvers of one relation need to know.
#[derive(Debug)]
struct RelationPlan {
    schema: String,
    relation: String,
    field_columns: HashMap<String, String>,
    key: Vec<(String, String)>,
    order_by: HashMap<String, Vec<(String, Direction)>>,
    default_order: &'static str,
    default_page_size: Option<u32>,
}

impl RelationPlan {
    fn new(schema: &str, relation: &Relation, default_page_size: Option<u32>) -> Self {
        let field_columns = relation
            .columns
            .iter()
            .map(|column| (naming::camel_case(&column.name), column.name.clone()))
            .collect();

        let key: Vec<(String, String)> = relation
            .primary_key()
            .into_iter()
            .map(|column| (naming::camel_case(&column.name), column.name.clone()))
            .collect();

        let mut order_by = HashMap::from([(NATURAL.to_string(), Vec::new())]);
        if !key.is_empty() {
            let columns = |direction: Direction| -> Vec<(String, Direction)> {
                key.iter().map(|(_, column)| (column.clone(), direction)).collect()
            };
            drop(order_by.insert(PRIMARY_KEY_ASC.to_string(), columns(Direction::Asc)));
            drop(order_by.insert(PRIMARY_KEY_DESC.to_string(), columns(Direction::Desc)));
        }
        for column in &relation.columns {
            let constant = naming::constant_case(&column.name);
            drop(order_by.insert(format!("{constant}_ASC"), vec![(column.name.clone(), Direction::Asc)]));
            drop(order_by.insert(format!("{constant}_DESC"), vec![(column.name.clone(), Direction::Desc)]));
        }

        Self {
            schema: schema.to_string(),
            relation: relation.name.clone(),
            field_columns,
            default_order: if key.is_empty() { NATURAL } else { PRIMARY_KEY_ASC },
            key,
            order_by,
            default_page_size,
        }
    }

    fn key_columns(&self) -> Vec<String> { self.key.iter().map(|(_, column)| column.clone()).collect() }

    fn key_json(&self, ctx: &ResolverContext<'_>) -> async_graphql::Result<serde_json::Value> {
        let mut object = serde_json::Map::new();
        for (field, column) in &self.key {
            let value = ctx.args.try_get(field)?.as_value().clone().into_json()?;
            drop(object.insert(column.clone(), value));
        }
        Ok(serde_json::Value::Object(object))
    }

    fn select_list(&self, ctx: &ResolverContext<'_>) -> async_graphql::Result<sql::Statement> {
        let limit = match ctx.args.get("first") {
            Some(first) => Some(first.i64()?),
            None => self.default_page_size.map(i64::from),
        };
        let offset = ctx.args.get("offset").map(|offset| offset.i64()).transpose()?.unwrap_or(0);

        let (condition_columns, condition) = match ctx.args.get("condition") {
            Some(condition) => columns_json(condition.as_value(), &self.field_columns)?,
            None => (Vec::new(), serde_json::json!({})),
        };

        let mut order_by = Vec::new();
        let mut push_order = |name: &str| -> async_graphql::Result<()> {
            let columns =
                self.order_by.get(name).ok_or_else(|| format!("unknown ordering `{name}`"))?;
            order_by.extend(columns.iter().cloned());
            Ok(())
        };
        match ctx.args.get("orderBy") {
            Some(order) => {
                for item in order.list()?.iter() {
                    push_order(item.enum_name()?)?;
                }
            }
            None => push_order(self.default_order)?,
        }

        Ok(SelectList {
            schema: &self.schema,
            relation: &self.relation,
            condition_columns,
            condition,
            order_by,
            limit,
            offset,
        }
        .build())
    }
}

fn column_field(column: &Column) -> Field {
    let column_name = column.name.clone();
    Field::new(naming::camel_case(&column.name), type_ref(&column.ty, column.not_null), move |ctx| {
        let column_name = column_name.clone();
        FieldFuture::new(async move {
            let row = ctx.parent_value.try_downcast_ref::<serde_json::Value>()?;
            json_value(row.get(&column_name))
        })
    })
}

/// Names registered so far, so that colliding catalog objects are skipped
/// instead of failing the whole schema.
#[derive(Default)]
struct Registry {
    types: HashSet<String>,
    query_fields: HashSet<String>,
    mutation_fields: HashSet<String>,
}

impl Registry {
    fn claim_type(&mut self, name: &str) -> bool { self.types.insert(name.to_string()) }

    fn claim_query(&mut self, name: &str) -> bool { self.query_fields.insert(name.to_string()) }

    fn claim_mutation(&mut self, name: &str) -> bool {
        self.mutation_fields.insert(name.to_string())
    }
}

/// Generates the schema: one object type per relation with list and by-key
/// queries, CRUD mutations for tables and one field per function.
///
/// # Errors
///
/// Returns an error if the generated type system is inconsistent.
pub fn build_schema(catalog: &Catalog, settings: &SchemaSettings) -> Result<Schema, Error> {
    let mut registry = Registry::default();
    registry.types.extend(
        [QUERY, MUTATION, BIG_INT, BIG_FLOAT, DATETIME, DATE, UUID, JSON, JWT_TOKEN]
            .map(ToString::to_string),
    );

    let mut types: Vec<Type> = Vec::new();
    for (name, description) in [
        (BIG_INT, "A signed eight-byte integer."),
        (BIG_FLOAT, "An arbitrary precision decimal number."),
        (DATETIME, "A point in time as described by the ISO 8601 standard."),
        (DATE, "A calendar date."),
        (UUID, "A universally unique identifier."),
        (JSON, "A JSON value."),
        (JWT_TOKEN, "A signed JSON Web Token."),
    ] {
        types.push(Scalar::new(name).description(description).into());
    }

    let mut query = Object::new(QUERY).field(Field::new("query", TypeRef::named_nn(QUERY), |_| {
        FieldFuture::new(async { Ok(Some(FieldValue::owned_any(()))) })
    }));
    let mut mutation = Object::new(MUTATION);
    let mut has_mutation = false;

    let mut relation_types = HashMap::new();

    for relation in &catalog.relations {
        let type_name = naming::type_name(&relation.name);
        if let Some(invalid) = invalid_relation_name(relation, &type_name) {
            tracing::warn!(relation = %relation.name, "Skipping relation, `{invalid}` is not a valid GraphQL name");
            continue;
        }
        if relation.columns.is_empty() || !registry.claim_type(&type_name) {
            tracing::warn!(relation = %relation.name, "Skipping relation, type `{type_name}` is not available");
            continue;
        }
        let plural = naming::plural_type_name(&relation.name);
        let plan = Arc::new(RelationPlan::new(&catalog.schema, relation, settings.default_page_size));

        let object = relation
            .columns
            .iter()
            .fold(Object::new(type_name.as_str()), |object, column| object.field(column_field(column)));
        types.push(object.into());

        let condition_name = format!("{type_name}Condition");
        let order_name = format!("{plural}OrderBy");
        if registry.claim_type(&condition_name) && registry.claim_type(&order_name) {
            types.push(optional_input(&condition_name, &relation.columns).into());

            let mut order_items: Vec<&String> = plan.order_by.keys().collect();
            order_items.sort();
            types.push(
                order_items
                    .into_iter()
                    .fold(Enum::new(order_name.as_str()), |order, item| order.item(EnumItem::new(item)))
                    .into(),
            );

            let field_name = format!("all{plural}");
            if registry.claim_query(&field_name) {
                query = query.field(list_field(&field_name, &type_name, &condition_name, &order_name, &plan));
            }
        }

        let key = relation.primary_key();
        if !key.is_empty() {
            let by_key =
                key.iter().map(|column| naming::pascal_case(&column.name)).collect::<Vec<_>>().join("And");
            let field_name = format!("{}By{by_key}", naming::camel_case(&naming::singularize(&relation.name)));
            if registry.claim_query(&field_name) {
                query = query.field(key_args(
                    row_field(&field_name, &type_name, &plan, |plan, ctx| {
                        Ok(sql::select_by_key(&plan.schema, &plan.relation, &plan.key_columns(), plan.key_json(ctx)?))
                    }),
                    &key,
                ));
            }

            if relation.is_writable() {
                let patch_name = format!("{type_name}Patch");
                if registry.claim_type(&patch_name) {
                    types.push(optional_input(&patch_name, &relation.columns).into());

                    let field_name = format!("update{type_name}By{by_key}");
                    if registry.claim_mutation(&field_name) {
                        has_mutation = true;
                        mutation = mutation.field(
                            key_args(
                                row_field(&field_name, &type_name, &plan, |plan, ctx| {
                                    let patch = ctx.args.try_get("patch")?;
                                    let (columns, patch) = columns_json(patch.as_value(), &plan.field_columns)?;
                                    Ok(sql::update(
                                        &plan.schema,
                                        &plan.relation,
                                        &plan.key_columns(),
                                        plan.key_json(ctx)?,
                                        &columns,
                                        patch,
                                    ))
                                }),
                                &key,
                            )
                            .argument(InputValue::new("patch", TypeRef::named_nn(patch_name.as_str()))),
                        );
                    }
                }

                let field_name = format!("delete{type_name}By{by_key}");
                if registry.claim_mutation(&field_name) {
                    has_mutation = true;
                    mutation = mutation.field(key_args(
                        row_field(&field_name, &type_name, &plan, |plan, ctx| {
                            Ok(sql::delete(&plan.schema, &plan.relation, &plan.key_columns(), plan.key_json(ctx)?))
                        }),
                        &key,
                    ));
                }
            }
        }

        if relation.is_writable() {
            let input_name = format!("{type_name}Input");
            let field_name = format!("create{type_name}");
            if registry.claim_type(&input_name) && registry.claim_mutation(&field_name) {
                types.push(
                    relation
                        .columns
                        .iter()
                        .fold(InputObject::new(input_name.as_str()), |input, column| {
                            input.field(InputValue::new(
                                naming::camel_case(&column.name),
                                type_ref(&column.ty, column.not_null && !column.has_default),
                            ))
                        })
                        .into(),
                );

                has_mutation = true;
                mutation = mutation.field(
                    row_field(&field_name, &type_name, &plan, |plan, ctx| {
                        let input = ctx.args.try_get("input")?;
                        let (columns, values) = columns_json(input.as_value(), &plan.field_columns)?;
                        Ok(sql::insert(&plan.schema, &plan.relation, &columns, values))
                    })
                    .argument(InputValue::new("input", TypeRef::named_nn(input_name.as_str()))),
                );
            }
        }

        drop(relation_types.insert(relation.name.clone(), type_name));
    }

    let jwt_type = settings.jwt_type(&catalog.schema);
    for function in &catalog.functions {
        let field_name = naming::camel_case(&function.name);
        if let Some(invalid) = invalid_function_name(function, &field_name) {
            tracing::warn!(function = %function.name, "Skipping function, `{invalid}` is not a valid GraphQL name");
            continue;
        }
        let output = FunctionOutput::resolve(catalog, function, &relation_types, jwt_type.as_ref(), settings);

        if function.volatility.is_mutation() {
            if registry.claim_mutation(&field_name) {
                has_mutation = true;
                mutation = mutation.field(function_field(&field_name, &catalog.schema, function, output));
            } else {
                tracing::warn!(function = %function.name, "Skipping function, field `{field_name}` is taken");
            }
        } else if registry.claim_query(&field_name) {
            query = query.field(function_field(&field_name, &catalog.schema, function, output));
        } else {
            tracing::warn!(function = %function.name, "Skipping function, field `{field_name}` is taken");
        }
    }

    let mut builder = Schema::build(QUERY, has_mutation.then_some(MUTATION), None).register(query);
    if has_mutation {
        builder = builder.register(mutation);
    }
    builder = types.into_iter().fold(builder, |builder, ty| builder.register(ty));

    builder.finish().map_err(|err| Error::BuildSchema { message: err.to_string() })
}

/// First generated name of `relation` that GraphQL would reject.
fn invalid_relation_name(relation: &Relation, type_name: &str) -> Option<String> {
    std::iter::once(type_name.to_string())
        .chain(relation.columns.iter().flat_map(|column| {
            [naming::camel_case(&column.name), format!("{}_ASC", naming::constant_case(&column.name))]
        }))
        .find(|name| !naming::is_graphql_name(name))
}

fn invalid_function_name(function: &Function, field_name: &str) -> Option<String> {
    std::iter::once(field_name.to_string())
        .chain(function.arguments.iter().map(|argument| naming::camel_case(&argument.name)))
        .find(|name| !naming::is_graphql_name(name))
}

/// Input object whose fields are all nullable.
fn optional_input(name: &str, columns: &[Column]) -> InputObject {
    columns.iter().fold(InputObject::new(name), |input, column| {
        input.field(InputValue::new(naming::camel_case(&column.name), type_ref(&column.ty, false)))
    })
}

fn list_field(
    field_name: &str,
    type_name: &str,
    condition_name: &str,
    order_name: &str,
    plan: &Arc<RelationPlan>,
) -> Field {
    let plan = Arc::clone(plan);
    Field::new(field_name, TypeRef::named_nn_list_nn(type_name), move |ctx| {
        let plan = Arc::clone(&plan);
        FieldFuture::new(async move {
            let statement = plan.select_list(&ctx)?;
            let rows = ctx.data::<Session>()?.fetch_all(&statement).await?;
            Ok(Some(row_list(rows)))
        })
    })
    .argument(InputValue::new("first", TypeRef::named(TypeRef::INT)))
    .argument(InputValue::new("offset", TypeRef::named(TypeRef::INT)))
    .argument(InputValue::new("condition", TypeRef::named(condition_name)))
    .argument(InputValue::new("orderBy", TypeRef::named_nn_list(order_name)))
}

/// Field resolving to at most one row produced by `statement`.
fn row_field<F>(field_name: &str, type_name: &str, plan: &Arc<RelationPlan>, statement: F) -> Field
where
    F: Fn(&RelationPlan, &ResolverContext<'_>) -> async_graphql::Result<sql::Statement>
        + Send
        + Sync
        + 'static,
{
    let plan = Arc::clone(plan);
    let statement = Arc::new(statement);
    Field::new(field_name, TypeRef::named(type_name), move |ctx| {
        let plan = Arc::clone(&plan);
        let statement = Arc::clone(&statement);
        FieldFuture::new(async move {
            let query = (*statement)(&plan, &ctx)?;
            let row = ctx.data::<Session>()?.fetch_optional(&query).await?;
            Ok(row.map(FieldValue::owned_any))
        })
    })
}

fn key_args(field: Field, key: &[&Column]) -> Field {
    key.iter().fold(field, |field, column| {
        field.argument(InputValue::new(naming::camel_case(&column.name), type_ref(&column.ty, true)))
    })
}

/// How the value returned by a function is exposed.
#[derive(Clone)]
enum FunctionOutput {
    Rows { type_name: String },
    Jwt { keys: Arc<JwtKeys> },
    Scalar { ty: PgType },
}

impl FunctionOutput {
    fn resolve(
        catalog: &Catalog,
        function: &Function,
        relation_types: &HashMap<String, String>,
        jwt_type: Option<&(String, String)>,
        settings: &SchemaSettings,
    ) -> Self {
        let ret = &function.return_type;

        if let (Some((schema, name)), Some(keys)) = (jwt_type, settings.jwt.as_ref()) {
            if !function.returns_set && !ret.ty.is_array && ret.schema == *schema && ret.ty.name == *name {
                return Self::Jwt { keys: Arc::clone(keys) };
            }
        }

        if ret.ty.kind == "c" && !ret.ty.is_array && ret.schema == catalog.schema {
            if let Some(type_name) = relation_types.get(&ret.ty.name) {
                return Self::Rows { type_name: type_name.clone() };
            }
        }

        Self::Scalar { ty: ret.ty.clone() }
    }

    fn type_ref(&self, returns_set: bool) -> TypeRef {
        match (self, returns_set) {
            (Self::Rows { type_name }, true) => TypeRef::named_nn_list_nn(type_name.as_str()),
            (Self::Rows { type_name }, false) => TypeRef::named(type_name.as_str()),
            (Self::Jwt { .. }, _) => TypeRef::named(JWT_TOKEN),
            (Self::Scalar { ty }, true) => TypeRef::named_list(scalar_name(ty)),
            (Self::Scalar { ty }, false) => type_ref(ty, false),
        }
    }
}

fn function_field(field_name: &str, schema: &str, function: &Function, output: FunctionOutput) -> Field {
    let output_type = output.type_ref(function.returns_set);
    let arguments: Vec<(String, String, String, bool)> = function
        .arguments
        .iter()
        .map(|argument| {
            (
                naming::camel_case(&argument.name),
                argument.name.clone(),
                argument.sql_type.clone(),
                argument.ty.is_array,
            )
        })
        .collect();
    let call = Arc::new((schema.to_string(), function.name.clone(), function.returns_set, arguments.clone(), output));

    let field = Field::new(field_name, output_type, move |ctx| {
        let call = Arc::clone(&call);
        FieldFuture::new(async move {
            let (schema, name, returns_set, arguments, output) = &*call;

            let mut values = serde_json::Map::new();
            for (field, key, _, _) in arguments {
                if let Some(value) = ctx.args.get(field) {
                    drop(values.insert(key.clone(), value.as_value().clone().into_json()?));
                }
            }
            let call_arguments: Vec<CallArgument<'_>> = arguments
                .iter()
                .map(|(_, key, sql_type, is_array)| CallArgument { key, sql_type, is_array: *is_array })
                .collect();
            let statement = sql::call_function(
                schema,
                name,
                &call_arguments,
                *returns_set,
                serde_json::Value::Object(values),
            );

            let session = ctx.data::<Session>()?;
            if *returns_set {
                let rows = session.fetch_all(&statement).await?;
                return match output {
                    FunctionOutput::Rows { .. } => Ok(Some(row_list(rows))),
                    _ => {
                        let values = rows
                            .into_iter()
                            .map(|row| Value::from_json(row).map(FieldValue::value))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(Some(FieldValue::list(values)))
                    }
                };
            }

            let row = session.fetch_optional(&statement).await?;
            match output {
                FunctionOutput::Rows { .. } => Ok(row.map(FieldValue::owned_any)),
                FunctionOutput::Jwt { keys } => match row {
                    Some(serde_json::Value::Object(claims))
                        if claims.values().any(|value| !value.is_null()) =>
                    {
                        Ok(Some(FieldValue::value(Value::String(keys.sign(claims)?))))
                    }
                    _ => Ok(None),
                },
                FunctionOutput::Scalar { .. } => json_value(row.as_ref()),
            }
        })
    });

    arguments.iter().zip(&function.arguments).fold(field, |field, ((name, ..), argument)| {
        field.argument(InputValue::new(name.as_str(), type_ref(&argument.ty, false)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::catalog::{FunctionArgument, RelationKind, ReturnType, Volatility};

    fn column(name: &str, ty: &str, not_null: bool, pk: Option<i32>) -> Column {
        Column {
            name: name.to_string(),
            ty: PgType::new(ty),
            not_null,
            has_default: pk.is_some(),
            primary_key_position: pk,
        }
    }

    pub(crate) fn sample_catalog() -> Catalog {
        Catalog {
            schema: "app_public".to_string(),
            relations: vec![
                Relation {
                    name: "users".to_string(),
                    kind: RelationKind::Table,
                    columns: vec![
                        column("id", "int4", true, Some(1)),
                        column("first_name", "text", true, None),
                        column("last_name", "text", true, None),
                        column("email", "citext", true, None),
                        column("created_at", "timestamptz", true, None),
                        Column { ty: PgType::new("text").array(), ..column("tags", "text", false, None) },
                    ],
                },
                Relation {
                    name: "active_users".to_string(),
                    kind: RelationKind::View,
                    columns: vec![column("id", "int4", false, None), column("email", "citext", false, None)],
                },
            ],
            functions: vec![
                Function {
                    name: "authenticate".to_string(),
                    volatility: Volatility::Volatile,
                    returns_set: false,
                    return_type: ReturnType {
                        schema: "app_public".to_string(),
                        ty: PgType { name: "jwt".to_string(), kind: "c".to_string(), is_array: false },
                    },
                    arguments: vec![
                        FunctionArgument {
                            name: "email".to_string(),
                            sql_type: "text".to_string(),
                            ty: PgType::new("text"),
                        },
                        FunctionArgument {
                            name: "password".to_string(),
                            sql_type: "text".to_string(),
                            ty: PgType::new("text"),
                        },
                    ],
                },
                Function {
                    name: "current_user_account".to_string(),
                    volatility: Volatility::Stable,
                    returns_set: false,
                    return_type: ReturnType {
                        schema: "app_public".to_string(),
                        ty: PgType { name: "users".to_string(), kind: "c".to_string(), is_array: false },
                    },
                    arguments: Vec::new(),
                },
                Function {
                    name: "search_users".to_string(),
                    volatility: Volatility::Stable,
                    returns_set: true,
                    return_type: ReturnType {
                        schema: "app_public".to_string(),
                        ty: PgType { name: "users".to_string(), kind: "c".to_string(), is_array: false },
                    },
                    arguments: vec![FunctionArgument {
                        name: "search".to_string(),
                        sql_type: "text".to_string(),
                        ty: PgType::new("text"),
                    }],
                },
            ],
        }
    }

    fn settings() -> SchemaSettings {
        SchemaSettings {
            jwt_type_identifier: Some("app_public.jwt".to_string()),
            jwt: Some(Arc::new(JwtKeys::new("secret", "postgraphile"))),
            default_page_size: None,
        }
    }

    async fn field_names(schema: &Schema, type_name: &str) -> Vec<String> {
        let response = schema
            .execute(format!("{{ __type(name: \"{type_name}\") {{ fields {{ name }} }} }}"))
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        let data = response.data.into_json().unwrap();
        data["__type"]["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|field| field["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_relation_fields() {
        let schema = build_schema(&sample_catalog(), &settings()).unwrap();

        let queries = field_names(&schema, "Query").await;
        for expected in ["query", "allUsers", "userById", "allActiveUsers", "currentUserAccount", "searchUsers"] {
            assert!(queries.contains(&expected.to_string()), "missing {expected} in {queries:?}");
        }
        assert!(!queries.contains(&"activeUserById".to_string()));

        let mutations = field_names(&schema, "Mutation").await;
        for expected in ["createUser", "updateUserById", "deleteUserById", "authenticate"] {
            assert!(mutations.contains(&expected.to_string()), "missing {expected} in {mutations:?}");
        }
        assert!(!mutations.iter().any(|name| name.contains("ActiveUser")));

        let user_fields = field_names(&schema, "User").await;
        assert_eq!(user_fields, ["id", "firstName", "lastName", "email", "createdAt", "tags"]);
    }

    #[tokio::test]
    async fn test_type_mapping() {
        let schema = build_schema(&sample_catalog(), &settings()).unwrap();
        let response = schema
            .execute(
                "{ user: __type(name: \"User\") { fields { name type { kind name ofType { name } } } } \
                 input: __type(name: \"UserInput\") { inputFields { name type { kind } } } \
                 auth: __type(name: \"Mutation\") { fields { name type { name } } } }",
            )
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        let data = response.data.into_json().unwrap();

        let user_type = |field: &str| {
            data["user"]["fields"]
                .as_array()
                .unwrap()
                .iter()
                .find(|f| f["name"] == field)
                .unwrap()["type"]
                .clone()
        };
        assert_eq!(user_type("id")["ofType"]["name"], "Int");
        assert_eq!(user_type("createdAt")["ofType"]["name"], "Datetime");
        assert_eq!(user_type("email")["ofType"]["name"], "String");
        assert_eq!(user_type("tags")["kind"], "LIST");

        let input_kind = |field: &str| {
            data["input"]["inputFields"]
                .as_array()
                .unwrap()
                .iter()
                .find(|f| f["name"] == field)
                .unwrap()["type"]["kind"]
                .clone()
        };
        // defaults make the key optional on create
        assert_eq!(input_kind("id"), "SCALAR");
        assert_eq!(input_kind("firstName"), "NON_NULL");

        let authenticate = data["auth"]["fields"]
            .as_array()
            .unwrap()
            .iter()
            .find(|f| f["name"] == "authenticate")
            .unwrap()["type"]["name"]
            .clone();
        assert_eq!(authenticate, "JwtToken");
    }

    #[tokio::test]
    async fn test_resolver_requires_session() {
        let schema = build_schema(&sample_catalog(), &settings()).unwrap();
        let response = schema.execute("{ allUsers { id } }").await;

        assert!(!response.errors.is_empty());
    }

    #[tokio::test]
    async fn test_read_only_catalog_has_no_write_mutations() {
        let mut catalog = sample_catalog();
        catalog.relations.retain(|relation| relation.kind == RelationKind::View);
        catalog.functions.clear();

        let schema = build_schema(&catalog, &SchemaSettings::default()).unwrap();
        let response = schema.execute("{ __schema { mutationType { name } } }").await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        let data = response.data.into_json().unwrap();
        assert!(data["__schema"]["mutationType"].is_null());
        assert!(schema.sdl().contains("allActiveUsers"));
    }

    #[tokio::test]
    async fn test_invalid_identifiers_are_skipped() {
        let mut catalog = sample_catalog();
        catalog.relations.push(Relation {
            name: "prices".to_string(),
            kind: RelationKind::Table,
            columns: vec![column("id", "int4", true, Some(1)), column("amount$usd", "numeric", false, None)],
        });
        catalog.functions.push(Function {
            name: "2fa_codes".to_string(),
            volatility: Volatility::Stable,
            returns_set: false,
            return_type: ReturnType { schema: "pg_catalog".to_string(), ty: PgType::new("text") },
            arguments: Vec::new(),
        });

        let schema = build_schema(&catalog, &settings()).unwrap();

        let queries = field_names(&schema, "Query").await;
        assert!(queries.contains(&"allUsers".to_string()));
        assert!(!queries.contains(&"allPrices".to_string()));
        assert!(!schema.sdl().contains("type Price "));
    }

    #[tokio::test]
    async fn test_set_returning_scalar_function_is_nullable_list() {
        let mut catalog = sample_catalog();
        catalog.functions.push(Function {
            name: "user_ids".to_string(),
            volatility: Volatility::Stable,
            returns_set: true,
            return_type: ReturnType { schema: "pg_catalog".to_string(), ty: PgType::new("int4") },
            arguments: Vec::new(),
        });

        let schema = build_schema(&catalog, &settings()).unwrap();
        let response = schema
            .execute("{ __type(name: \"Query\") { fields { name type { kind ofType { kind name } } } } }")
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        let data = response.data.into_json().unwrap();
        let user_ids = data["__type"]["fields"]
            .as_array()
            .unwrap()
            .iter()
            .find(|field| field["name"] == "userIds")
            .unwrap()["type"]
            .clone();

        assert_eq!(user_ids["kind"], "LIST");
        assert_eq!(user_ids["ofType"]["kind"], "SCALAR");
        assert_eq!(user_ids["ofType"]["name"], "Int");
    }
}
