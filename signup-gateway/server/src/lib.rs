mod error;
pub mod graphql;
pub mod metrics;
pub mod service;
mod web;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures::{future::BoxFuture, FutureExt};
use gateway_metrics::DefaultMetrics;
use notification::{gmail, oauth, NotificationClient};
use signup_gateway_core::{
    config::{
        Config, GmailConfig, GmailCredentials, GraphqlConfig, PostgresConfig, SignUpConfig,
    },
    ServerInfo, PROJECT_NAME,
};
use sigfinn::{ExitStatus, LifecycleManager, Shutdown};
use snafu::ResultExt;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    Executor, PgPool,
};

pub use self::{
    error::{Error, Result},
    web::{router, ServiceState},
};
use self::{
    graphql::{Catalog, GraphqlService},
    metrics::{GraphqlMetrics, SignUpMetrics},
    service::sign_up::{PgUserDirectory, RetryPolicy, SignUpDispatcher, SignUpListener},
};

/// # Errors
/// Returns errors when server fails to start
pub async fn serve_with_shutdown(config: Config, server_info: ServerInfo) -> Result<()> {
    let Config { web, postgres, metrics, graphql, sign_up, gmail } = config;

    let database = initialize_postgres_pool(&postgres).await?;

    let default_metrics = DefaultMetrics::new(&PROJECT_NAME.replace('-', "_"))?;
    let graphql_metrics =
        GraphqlMetrics::register(default_metrics.registry()).context(error::RegisterMetricsSnafu)?;
    let sign_up_metrics =
        SignUpMetrics::register(default_metrics.registry()).context(error::RegisterMetricsSnafu)?;

    let (graphql_service, catalog) =
        GraphqlService::initialize(database.clone(), &graphql, graphql_metrics).await?;

    let lifecycle_manager = LifecycleManager::<Error>::new();

    let _handle = lifecycle_manager.spawn(
        "Http Server",
        create_web_http_server_future(
            web.listen_address,
            ServiceState::new(graphql_service.clone(), web.graphiql),
            server_info,
        ),
    );

    if let Some(interval) = graphql.watch_interval {
        let _handle = lifecycle_manager.spawn(
            "GraphQL schema watcher",
            create_schema_watcher_future(graphql_service, interval, catalog),
        );
    }

    if sign_up.enable {
        let client = initialize_notification_client(&gmail).await?;
        let dispatcher = SignUpDispatcher::new(
            Arc::new(PgUserDirectory::new(database.clone(), sign_up.user_query.clone())),
            client,
            RetryPolicy::from(sign_up.retry),
            sign_up_metrics,
        );
        let listener = initialize_sign_up_listener(&database, &sign_up).await?;

        let _handle = lifecycle_manager
            .spawn("Sign-up listener", create_sign_up_listener_future(listener, dispatcher));
    } else {
        tracing::info!("Sign-up listener is disabled");
    }

    if metrics.enable {
        let _handle = lifecycle_manager.spawn(
            "Metrics server",
            create_metrics_server_future(metrics.listen_address, default_metrics),
        );
    }

    if let Ok(Err(err)) = lifecycle_manager.serve().await {
        tracing::error!("{err}");
        Err(err)
    } else {
        Ok(())
    }
}

/// Generates the schema of the configured database and returns its SDL.
///
/// # Errors
/// Returns errors when the database is not reachable or the schema can not
/// be generated
pub async fn print_schema(postgres: &PostgresConfig, graphql: &GraphqlConfig) -> Result<String> {
    let database = initialize_postgres_pool(postgres).await?;
    let metrics = GraphqlMetrics::unregistered().context(error::RegisterMetricsSnafu)?;
    let (service, _catalog) = GraphqlService::initialize(database, graphql, metrics).await?;
    Ok(service.sdl().await)
}

#[tracing::instrument(
    skip(password, database, ssl_mode, max_connections),
    fields(
        host = %host,
        port = port,
        username = %username
    )
)]
async fn initialize_postgres_pool(
    PostgresConfig {
        host,
        port,
        username,
        role,
        password,
        database,
        ssl_mode,
        max_connections,
        application_name,
    }: &PostgresConfig,
) -> Result<PgPool> {
    tracing::info!("Initializing database");

    let connect_opts = PgConnectOptions::new_without_pgpass()
        .host(host)
        .port(*port)
        .username(username)
        .password(password)
        .database(database)
        .ssl_mode(*ssl_mode);

    let connect_opts = if let Some(app_name) = application_name {
        connect_opts.application_name(app_name)
    } else {
        connect_opts
    };

    let pool_opts = {
        let opts = PgPoolOptions::new().max_connections(*max_connections);

        if let Some(role) = role {
            let set_role = format!(r#"SET SESSION ROLE = "{}";"#, role.replace('"', "\"\""));
            opts.after_connect(move |conn, _meta| {
                let set_role = set_role.clone();
                async move {
                    let _result = conn.execute(set_role.as_str()).await?;
                    Ok(())
                }
                .boxed()
            })
        } else {
            opts
        }
    };

    pool_opts.connect_with(connect_opts).await.context(error::InitializePostgresPoolSnafu {
        host: host.to_string(),
        port: *port,
        username: username.to_string(),
        database: database.to_string(),
    })
}

#[tracing::instrument(skip(gmail), fields(from_address = %gmail.from_address))]
async fn initialize_notification_client(
    gmail: &GmailConfig,
) -> Result<Arc<dyn NotificationClient>> {
    tracing::info!("Initializing Gmail client");

    let client = match &gmail.credentials {
        GmailCredentials::InstalledApplication { client_secret_path, token_path, refresh_token } => {
            let token_source = oauth::Authorizer::new(client_secret_path, token_path)
                .with_refresh_token(refresh_token.clone())
                .authorize(&oauth::ConsolePrompt)
                .await
                .context(error::InitializeNotificationClientSnafu)?;
            gmail::Client::with_token_source(gmail.from_address.clone(), Arc::new(token_source))
        }
        GmailCredentials::DomainWideDelegation { impersonate_user } => {
            gmail::Client::new(gmail::Config { impersonate_user: impersonate_user.clone() })
                .await
                .context(error::InitializeNotificationClientSnafu)?
                .with_from_address(gmail.from_address.clone())
        }
    };

    Ok(Arc::new(client))
}

#[tracing::instrument(skip_all, fields(channel = %sign_up.channel))]
async fn initialize_sign_up_listener(
    database: &PgPool,
    sign_up: &SignUpConfig,
) -> Result<SignUpListener> {
    tracing::info!("Initializing sign-up listener");

    let listener = SignUpListener::connect(database, &sign_up.channel)
        .await?
        .with_limits(sign_up.max_concurrent_deliveries, sign_up.delivery_timeout);
    Ok(listener)
}

fn create_web_http_server_future(
    listen_address: SocketAddr,
    service_state: ServiceState,
    server_info: ServerInfo,
) -> impl FnOnce(Shutdown) -> BoxFuture<'static, ExitStatus<Error>> {
    move |shutdown_signal| {
        async move {
            tracing::info!("Listen Web HTTP server endpoint on {listen_address}");

            let result =
                web::new_api_server(listen_address, service_state, server_info, shutdown_signal)
                    .await;

            match result {
                Ok(()) => {
                    tracing::info!("HTTP server is shut down gracefully");
                    ExitStatus::Success
                }
                Err(err) => ExitStatus::FatalError(Error::from(err)),
            }
        }
        .boxed()
    }
}

fn create_schema_watcher_future(
    graphql_service: GraphqlService,
    interval: Duration,
    catalog: Catalog,
) -> impl FnOnce(Shutdown) -> BoxFuture<'static, ExitStatus<Error>> {
    move |shutdown_signal| {
        async move {
            tracing::info!("Watch database catalog every {interval:?}");
            graphql_service.watch(interval, catalog, shutdown_signal).await;
            ExitStatus::Success
        }
        .boxed()
    }
}

fn create_sign_up_listener_future(
    listener: SignUpListener,
    dispatcher: SignUpDispatcher,
) -> impl FnOnce(Shutdown) -> BoxFuture<'static, ExitStatus<Error>> {
    move |shutdown_signal| {
        async move {
            listener.run(dispatcher, shutdown_signal).await;
            ExitStatus::Success
        }
        .boxed()
    }
}

fn create_metrics_server_future<Metrics>(
    listen_address: SocketAddr,
    metrics: Metrics,
) -> impl FnOnce(Shutdown) -> BoxFuture<'static, ExitStatus<Error>>
where
    Metrics: gateway_metrics::Metrics + 'static,
{
    move |signal| {
        async move {
            tracing::info!("Listen metrics endpoint on {listen_address}");
            let result = gateway_metrics::start_metrics_server(listen_address, metrics, signal).await;
            match result {
                Ok(()) => {
                    tracing::info!("Metrics server is shut down gracefully");
                    ExitStatus::Success
                }
                Err(err) => ExitStatus::FatalError(Error::from(err)),
            }
        }
        .boxed()
    }
}
