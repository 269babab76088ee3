use std::env;

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// AppConfig
///
/// The application's entire configuration, loaded once at startup and shared
/// immutably through `AppState` (pulled into handlers via `FromRef`).
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string. Optional locally: without it the service
    // runs on the in-memory repository.
    pub db_url: Option<String>,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // S3-compatible storage endpoint URL (MinIO in local, Supabase in prod).
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_key: String,
    pub s3_secret: String,
    // Bucket holding post images.
    pub s3_bucket: String,
    // Identity provider base URL and API key, used by POST /register.
    pub identity_url: Option<String>,
    pub identity_key: Option<String>,
    // Runtime environment marker. Controls the local auth bypass and log format.
    pub env: Env,
    // Secret used to validate incoming JWTs issued by the identity provider.
    pub jwt_secret: String,
}

/// Env
///
/// Runtime context: `Local` enables development conveniences (MinIO defaults,
/// `x-user-id` bypass, in-memory fallback); `Production` demands real secrets.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Non-panicking configuration for test state setup.
    fn default() -> Self {
        Self {
            db_url: None,
            bind_addr: "127.0.0.1:0".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_key: "admin".to_string(),
            s3_secret: "password".to_string(),
            s3_bucket: "yatube-test".to_string(),
            identity_url: None,
            identity_key: None,
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables.
    ///
    /// # Panics
    /// Panics if a variable required in production is missing, so the service
    /// never starts with an incomplete or insecure configuration.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let bind_addr = env::var("APP_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let jwt_secret = match env {
            Env::Production => env::var("SUPABASE_JWT_SECRET")
                .expect("FATAL: SUPABASE_JWT_SECRET must be set in production."),
            Env::Local => {
                env::var("SUPABASE_JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string())
            }
        };

        match env {
            Env::Local => Self {
                env: Env::Local,
                db_url: env::var("DATABASE_URL").ok(),
                bind_addr,
                // Local storage (MinIO) uses known default credentials.
                s3_endpoint: "http://localhost:9000".to_string(),
                s3_region: "us-east-1".to_string(),
                s3_key: "admin".to_string(),
                s3_secret: "password".to_string(),
                s3_bucket: "yatube-uploads".to_string(),
                identity_url: env::var("SUPABASE_URL").ok(),
                identity_key: env::var("SUPABASE_KEY").ok(),
                jwt_secret,
            },
            Env::Production => {
                let project_url =
                    env::var("SUPABASE_URL").expect("FATAL: SUPABASE_URL required in prod");
                // Supabase exposes its S3-compatible gateway under the project URL.
                let s3_endpoint = format!("{}/storage/v1/s3", project_url);

                Self {
                    env: Env::Production,
                    db_url: Some(
                        env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                    ),
                    bind_addr,
                    s3_endpoint,
                    s3_region: "stub".to_string(),
                    s3_key: env::var("S3_ACCESS_KEY")
                        .expect("FATAL: S3_ACCESS_KEY required in prod"),
                    s3_secret: env::var("S3_SECRET_KEY")
                        .expect("FATAL: S3_SECRET_KEY required in prod"),
                    s3_bucket: env::var("S3_BUCKET_NAME")
                        .unwrap_or_else(|_| "yatube-uploads".to_string()),
                    identity_url: Some(project_url),
                    identity_key: Some(
                        env::var("SUPABASE_KEY").expect("FATAL: SUPABASE_KEY required in prod"),
                    ),
                    jwt_secret,
                }
            }
        }
    }
}
