//! GraphQL API generated from the Postgres catalog.

mod builder;
pub mod catalog;
mod error;
mod jwt;
mod naming;
mod session;
mod sql;

use std::{future::Future, sync::Arc, time::Duration};

use async_graphql::{dynamic::Schema, Request, Response};
use signup_gateway_core::config::GraphqlConfig;
use snafu::ResultExt;
use sqlx::PgPool;
use tokio::sync::RwLock;

pub use self::{
    builder::{build_schema, SchemaSettings},
    catalog::Catalog,
    error::Error,
    jwt::{Claims, JwtKeys},
    session::{Outcome, Session},
};
use crate::{metrics::GraphqlMetrics, service::CatalogSqlExecutor};

pub type Result<T> = std::result::Result<T, Error>;

/// Current schema, swapped when the catalog changes.
#[derive(Clone)]
struct SchemaHandle(Arc<RwLock<Schema>>);

impl SchemaHandle {
    fn new(schema: Schema) -> Self { Self(Arc::new(RwLock::new(schema))) }

    async fn current(&self) -> Schema { self.0.read().await.clone() }

    async fn replace(&self, schema: Schema) { *self.0.write().await = schema; }
}

#[derive(Clone)]
pub struct GraphqlService {
    database: PgPool,
    schema_name: String,
    settings: SchemaSettings,
    schema: SchemaHandle,
    default_role: Option<String>,
    metrics: GraphqlMetrics,
}

impl GraphqlService {
    /// Introspects the configured schema and builds the initial GraphQL
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the introspection or the schema generation fails.
    #[tracing::instrument(skip_all, fields(schema = %config.schema))]
    pub async fn initialize(
        database: PgPool,
        config: &GraphqlConfig,
        metrics: GraphqlMetrics,
    ) -> Result<(Self, Catalog)> {
        let settings = SchemaSettings {
            jwt_type_identifier: Some(config.jwt_type_identifier.clone()),
            jwt: config
                .jwt_secret
                .as_deref()
                .map(|secret| Arc::new(JwtKeys::new(secret, config.jwt_audience.clone()))),
            default_page_size: config.default_page_size,
        };

        let catalog = introspect(&database, &config.schema).await?;
        let schema = build_schema(&catalog, &settings)?;
        tracing::info!(
            relations = catalog.relations.len(),
            functions = catalog.functions.len(),
            "GraphQL schema is generated"
        );

        let service = Self {
            database,
            schema_name: config.schema.clone(),
            settings,
            schema: SchemaHandle::new(schema),
            default_role: config.default_role.clone(),
            metrics,
        };
        Ok((service, catalog))
    }

    /// Service over an already built schema.
    pub fn with_schema(
        database: PgPool,
        schema_name: impl Into<String>,
        schema: Schema,
        settings: SchemaSettings,
        default_role: Option<String>,
        metrics: GraphqlMetrics,
    ) -> Self {
        Self {
            database,
            schema_name: schema_name.into(),
            settings,
            schema: SchemaHandle::new(schema),
            default_role,
            metrics,
        }
    }

    /// Schema definition language of the current schema.
    pub async fn sdl(&self) -> String { self.schema.current().await.sdl() }

    /// Executes `request` in its own transaction carrying the role and claims
    /// of `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is rejected or the transaction cannot be
    /// opened or finished.
    pub async fn execute(&self, request: Request, token: Option<&str>) -> Result<Response> {
        let claims = match token {
            Some(token) => {
                let Some(keys) = self.settings.jwt.as_ref() else {
                    self.metrics.requests.with_label_values(&["unauthorized"]).inc();
                    return Err(Error::MissingJwtSecret);
                };
                match keys.verify(token) {
                    Ok(claims) => Some(claims),
                    Err(source) => {
                        self.metrics.requests.with_label_values(&["unauthorized"]).inc();
                        return Err(Error::InvalidToken { source });
                    }
                }
            }
            None => None,
        };
        let role = claims.as_ref().and_then(Claims::role).or(self.default_role.as_deref());

        let session = Session::begin(&self.database, claims.as_ref(), role)
            .await
            .context(error::BeginSessionSnafu)?;

        let response = self.schema.current().await.execute(request.data(session.clone())).await;

        let outcome = Outcome::of(&response);
        session.finish(outcome).await.context(error::FinishSessionSnafu)?;
        self.metrics.requests.with_label_values(&[outcome.as_str()]).inc();

        Ok(response)
    }

    /// Re-introspects every `interval` and swaps the schema when the catalog
    /// changed, until `shutdown` resolves.
    pub async fn watch<S>(&self, interval: Duration, mut catalog: Catalog, shutdown: S)
    where
        S: Future<Output = ()> + Send,
    {
        if interval.is_zero() {
            tracing::warn!("Catalog watch interval is zero, GraphQL schema is not watched");
            return;
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        let _instant = ticker.tick().await;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    match self.refresh(&catalog).await {
                        Ok(Some(next)) => catalog = next,
                        Ok(None) => {}
                        Err(err) => tracing::warn!("Keep current GraphQL schema, {err}"),
                    }
                }
            }
        }
        tracing::info!("GraphQL schema watcher is stopped");
    }

    async fn refresh(&self, current: &Catalog) -> Result<Option<Catalog>> {
        let catalog = introspect(&self.database, &self.schema_name).await?;
        self.apply_catalog(current, catalog).await
    }

    /// Rebuilds the schema from `catalog` unless it equals `current`.
    async fn apply_catalog(&self, current: &Catalog, catalog: Catalog) -> Result<Option<Catalog>> {
        if catalog == *current {
            return Ok(None);
        }

        let schema = build_schema(&catalog, &self.settings)?;
        self.schema.replace(schema).await;
        self.metrics.schema_rebuilds.inc();
        tracing::info!("Catalog of schema `{}` changed, GraphQL schema is rebuilt", self.schema_name);

        Ok(Some(catalog))
    }
}

/// Reads the catalog of `schema` through one pooled connection.
///
/// # Errors
///
/// Returns an error if a catalog query fails.
pub async fn introspect(database: &PgPool, schema: &str) -> Result<Catalog> {
    let mut conn = database
        .acquire()
        .await
        .map_err(|source| crate::service::Error::IntrospectColumns { schema: schema.to_string(), source })?;

    Ok(CatalogSqlExecutor::introspect_catalog(&mut *conn, schema).await?)
}
