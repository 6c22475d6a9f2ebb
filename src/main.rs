// region:    --- Imports
use auction_integrity::auction::events::spawn_event_logger;
use auction_integrity::config::Config;
use auction_integrity::database::DatabaseManager;
use auction_integrity::gateway::WriteGateway;
use auction_integrity::handlers;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional; real deployments inject the environment directly
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    let gateway = match config.database_url.as_deref() {
        Some(database_url) => {
            let db_manager =
                Arc::new(DatabaseManager::connect(database_url, config.max_connections).await?);
            if let Err(e) = db_manager
                .initialize_database(config.reset_database, config.engine.initial_clock)
                .await
            {
                error!("{:<12} --> database initialization failed: {:?}", "Main", e);
                return Err(e.into());
            }
            info!("{:<12} --> postgres store ready", "Main");
            WriteGateway::postgres(db_manager, config.engine.clone())
        }
        None => {
            info!("{:<12} --> DATABASE_URL not set, using in-memory store", "Main");
            WriteGateway::in_memory(config.engine.clone())
        }
    };
    let gateway = Arc::new(gateway);

    let _event_log = spawn_event_logger(gateway.subscribe());

    let routes_all = handlers::routes(Arc::clone(&gateway));

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
