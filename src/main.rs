use kanji_atlas::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    storage::{S3ArtworkStore, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global tracing subscriber. RUST_LOG wins when set; otherwise
/// the crate logs at debug with quieter defaults for the HTTP stack. Local
/// gets human-readable output, production gets JSON for log aggregation.
fn init_tracing(env: &Env) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kanji_atlas=debug,tower_http=info,axum=trace".into());

    let registry = tracing_subscriber::registry().with(filter);
    match env {
        Env::Local => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .init(),
        Env::Production => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = AppConfig::load();
    init_tracing(&config.env);

    tracing::info!("kanji-atlas starting in {:?} mode", config.env);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    // The schema ships with the binary; bring the database up to date before
    // accepting traffic.
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("FATAL: Failed to run database migrations.");
    tracing::info!("database migrations applied");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    let s3_client = S3ArtworkStore::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    )
    .await;

    // Local runs provision their own MinIO artwork bucket.
    if config.env == Env::Local {
        use kanji_atlas::storage::ArtworkStorage;
        s3_client.ensure_bucket_exists().await;
    }
    let storage = Arc::new(s3_client) as StorageState;

    let port = config.port;
    let app = create_router(AppState {
        repo,
        storage,
        config,
    });

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .expect("FATAL: Failed to bind the server port.");

    tracing::info!("listening on 0.0.0.0:{port}");
    tracing::info!("swagger UI at http://localhost:{port}/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
