use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use classroom_forum::auth::JwtKeys;
use classroom_forum::config::AppConfig;
use classroom_forum::openapi::ApiDoc;
use classroom_forum::{config, AppState, ForumService};

#[cfg(feature = "postgres-store")]
async fn postgres_service(cfg: &AppConfig, url: &str) -> anyhow::Result<ForumService> {
    use anyhow::Context;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
    use std::str::FromStr;
    use std::sync::Arc;

    let statement_timeout = cfg.store_timeout.as_millis().to_string();
    let options = PgConnectOptions::from_str(url)
        .context("invalid DATABASE_URL")?
        .options([("statement_timeout", statement_timeout.as_str())]);
    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_max_connections)
        .acquire_timeout(cfg.store_timeout)
        .connect_lazy_with(options);
    if cfg.run_migrations {
        sqlx::migrate!().run(&pool).await.context("running migrations")?;
        info!("Migrations applied");
    }
    info!("Using Postgres repository backend");
    let repo = Arc::new(classroom_forum::repo::pg::PgRepo::new(pool));
    Ok(ForumService::new(repo, cfg.store_timeout))
}

#[cfg(feature = "inmem-store")]
fn inmem_service(cfg: &AppConfig) -> anyhow::Result<ForumService> {
    let repo = std::sync::Arc::new(classroom_forum::repo::inmem::InMemRepo::new());
    info!("Using in-memory repository backend");
    Ok(ForumService::new(repo, cfg.store_timeout))
}

#[cfg(not(feature = "inmem-store"))]
fn inmem_service(_cfg: &AppConfig) -> anyhow::Result<ForumService> {
    anyhow::bail!("DATABASE_URL is not set and the in-memory store is not compiled in")
}

#[cfg(feature = "postgres-store")]
async fn build_service(cfg: &AppConfig) -> anyhow::Result<ForumService> {
    match cfg.database_url.as_deref() {
        Some(url) => postgres_service(cfg, url).await,
        None => inmem_service(cfg),
    }
}

#[cfg(not(feature = "postgres-store"))]
async fn build_service(cfg: &AppConfig) -> anyhow::Result<ForumService> {
    if cfg.database_url.is_some() {
        tracing::warn!("DATABASE_URL ignored: built without postgres-store");
    }
    inmem_service(cfg)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = AppConfig::from_env()?;
    info!(bind = %cfg.bind_addr, timeout_ms = cfg.store_timeout.as_millis() as u64, "Bootstrapping classroom forum");

    let service = build_service(&cfg).await?;
    let state = web::Data::new(AppState { service });
    let keys = web::Data::new(JwtKeys::new(&cfg.jwt_secret));
    let openapi = ApiDoc::openapi();
    let frontend_url = cfg.frontend_url.clone();

    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            // during local dev allow React/Vite default ports
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://127.0.0.1:5173")
            .allow_any_header()
            .allowed_methods(["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .supports_credentials()
            .max_age(3600);
        if let Some(front) = &frontend_url {
            cors = cors.allowed_origin(front);
        }

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(state.clone())
            .app_data(keys.clone())
            .configure(config)
            .service(SwaggerUi::new("/docs").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(cfg.bind_addr.as_str())?;

    info!("Listening on http://{}", cfg.bind_addr);
    server.run().await?;
    Ok(())
}
