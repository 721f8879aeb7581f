use panama_quiz::{build_state, config::Config, routes::build_router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();
    let state = build_state(&config).await?;
    let app = build_router(state);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(storage = ?config.storage, "quiz api listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
