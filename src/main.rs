#![warn(clippy::all)]

use tracing_subscriber::fmt::format::FmtSpan;

use questions::config::Config;
use questions::routes::forgery::ForgeryProtection;
use questions::store::Store;

#[tokio::main]
async fn main() -> Result<(), handle_errors::Error> {
    let config = Config::new()?;

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_filter());

    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        // Record an event when each span closes, which times every route.
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let store = match &config.database_url {
        Some(db_url) => {
            let store = Store::new(db_url, config.max_connections).await?;
            store.migrate().await?;
            store
        }
        None => {
            tracing::warn!("no database_url configured, questions are kept in memory");
            Store::in_memory()
        }
    };

    let forgery = ForgeryProtection::from_config(&config);
    if !forgery.is_enabled() {
        tracing::warn!("forgery protection is disabled");
    }

    let (host, port) = (config.host, config.port);
    let routes = questions::build_routes(store, forgery, config);

    tracing::info!(host = %host, port, "questions service listening");
    warp::serve(routes).run((host, port)).await;

    Ok(())
}
