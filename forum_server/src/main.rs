//! Forum server.
//!
//! `forum-server` serves HTTP on `BIND_ADDR`.
//! `forum-server add-tenant <name> <db server> <db user> <db password> <db name>` registers a
//! tenant in the host database and exits.

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tenant_forum::{
    common_routes_with_ready, ensure_host_tables, forum_routes, with_http_layers, AppState, MediaStore,
    PgTenantDirectory, Settings, Tenant,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tenant_forum=info,forum_server=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let host_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.host_database_url)
        .await?;
    ensure_host_tables(&host_pool, &settings.host_schema).await?;
    let directory = PgTenantDirectory::new(host_pool.clone(), &settings.host_schema);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => {}
        Some("add-tenant") => return add_tenant(&directory, &args[1..]).await,
        Some(other) => return Err(format!("unknown command: {}", other).into()),
    }

    let mut state = AppState::new(Arc::new(directory), settings.tenant_pool.clone());
    if let Some(media) = &settings.media {
        state = state.with_media(Arc::new(MediaStore::from_env(media).await));
        tracing::info!(bucket = %media.bucket, "media storage enabled");
    }
    let pools = state.pools.clone();

    let app = with_http_layers(
        common_routes_with_ready(host_pool.clone()).merge(forum_routes(state)),
        settings.max_body_bytes,
        settings.environment,
    );
    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        environment = ?settings.environment,
        "forum server listening"
    );
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    pools.close_all().await;
    host_pool.close().await;
    tracing::info!("forum server stopped");
    Ok(())
}

async fn add_tenant(directory: &PgTenantDirectory, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let [name, server, user, password, database] = args else {
        return Err("usage: forum-server add-tenant <name> <db server> <db user> <db password> <db name>".into());
    };
    let tenant = Tenant::new(name, server, user, password, database);
    directory.insert(&tenant).await?;
    tracing::info!(tenant = %tenant.name, id = %tenant.id, "tenant registered");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
