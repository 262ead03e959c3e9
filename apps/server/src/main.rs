use anyhow::Context;
use courier_auth::Authenticator;
use courier_config::load as load_config;
use courier_database::initialize_database;
use courier_gateway::{build_router, AppState};
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    info!("starting Courier backend");

    let config = load_config().context("failed to load configuration")?;

    let pool = initialize_database(&config.database).await?;
    let authenticator = Authenticator::new(pool.clone(), &config.auth);
    let state = AppState::new(pool, authenticator);

    // Persisted chats must be live in the registry before the first
    // connection is accepted.
    state
        .manager()
        .sync_persistent_and_memory_chat_storage()
        .await
        .context("failed to reconcile chat registry with persistent storage")?;

    let app = build_router(state.clone());

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    state.manager().shutdown();
    info!("backend shut down");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = SubscriberBuilder::default()
        .with_max_level(Level::INFO)
        .with_env_filter(env_filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
