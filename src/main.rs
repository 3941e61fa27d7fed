use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use ludex_api::{
    api::{create_router, AppState},
    config::Config,
    db,
    services::{
        cache_store::PgRecommendationCacheStore, collection::PgCollectionReader,
        engine::HttpRecommendationEngine, recommendations::RecommendationService,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ludex_api=debug,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    sqlx::migrate!().run(&pool).await?;

    let reader = Arc::new(PgCollectionReader::new(pool.clone()));
    let store = Arc::new(PgRecommendationCacheStore::new(pool.clone()));
    let engine = Arc::new(HttpRecommendationEngine::new(
        config.engine_url.clone(),
        config.engine_api_key.clone(),
    ));

    let recommendations = Arc::new(RecommendationService::new(reader, store, engine));
    let app = create_router(AppState::new(recommendations));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
