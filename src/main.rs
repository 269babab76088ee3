use yatube_api::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    identity::{IdentityState, MockIdentityProvider, SupabaseIdentityProvider},
    repository::{InMemoryRepository, PostgresRepository, RepositoryState},
    storage::{S3StorageClient, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Startup order: configuration, logging, persistence, storage, identity,
/// then the HTTP server. Any failure before the server is bound is fatal.
#[tokio::main]
async fn main() {
    // 1. Configuration (.env first, then the process environment).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise a development default.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "yatube_api=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Persistence. Without DATABASE_URL (local only) the service runs on
    // the in-memory repository and loses its data on exit.
    let repo: RepositoryState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            let postgres = PostgresRepository::new(pool);
            postgres
                .migrate()
                .await
                .expect("FATAL: Failed to apply database migrations.");
            tracing::info!("Connected to Postgres, migrations applied.");
            Arc::new(postgres)
        }
        None => {
            tracing::warn!("DATABASE_URL not set: using the in-memory repository.");
            Arc::new(InMemoryRepository::new())
        }
    };

    // 4. Attachment storage (MinIO locally, Supabase Storage in production).
    let s3_client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    )
    .await;

    if config.env == Env::Local {
        s3_client.ensure_bucket_exists().await;
    }
    let storage = Arc::new(s3_client) as StorageState;

    // 5. Identity provider. Local runs without Supabase credentials register
    // accounts against the mock provider.
    let identity: IdentityState = match (&config.identity_url, &config.identity_key, &config.env) {
        (None, _, Env::Local) | (_, None, Env::Local) => {
            tracing::warn!("SUPABASE_URL/SUPABASE_KEY not set: using the mock identity provider.");
            Arc::new(MockIdentityProvider::new())
        }
        _ => Arc::new(SupabaseIdentityProvider::new(
            config.identity_url.clone(),
            config.identity_key.clone(),
        )),
    };

    // 6. Shared state and router.
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        storage,
        identity,
        config,
    };
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check APP_BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
