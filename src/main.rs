use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use bulletin::openapi::ApiDoc;
use bulletin::repo::Repo;
use bulletin::{configure, AppConfig, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping bulletin server");

    let cfg = AppConfig::from_env()?;
    info!(
        "Frontend URL: {}",
        cfg.frontend_url.as_deref().unwrap_or("http://localhost:5173")
    );

    let repo = build_repo(&cfg)?;
    let state = web::Data::new(AppState::new(repo));
    let openapi = ApiDoc::openapi();
    info!("OpenAPI spec generated");

    let frontend = cfg.frontend_url.clone();
    let server = HttpServer::new(move || {
        let cors = {
            let mut c = Cors::default()
                // local dev frontends
                .allowed_origin("http://localhost:5173")
                .allowed_origin("http://127.0.0.1:5173")
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allow_any_header()
                .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .max_age(3600);
            if let Some(front) = &frontend {
                c = c.allowed_origin(front);
            }
            c
        };

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
            .service(SwaggerUi::new("/docs").url("/docs/openapi.json", openapi.clone()))
    })
    .bind((cfg.bind_addr.as_str(), cfg.port))?;

    info!("Listening on http://{}:{}", cfg.bind_addr, cfg.port);

    server.run().await?;
    Ok(())
}

#[cfg(feature = "postgres-store")]
fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    use bulletin::repo::pg::PgRepo;
    use sqlx::postgres::PgPoolOptions;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_max_connections)
        .connect_lazy(cfg.require_database_url()?)?;
    info!(max_connections = cfg.db_max_connections, "Using Postgres repository backend");
    Ok(Arc::new(PgRepo::new(pool)))
}

#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    use bulletin::repo::inmem::InMemRepo;

    let repo = match &cfg.data_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "Using in-memory repository backend with snapshots");
            InMemRepo::with_snapshot_dir(dir)
        }
        None => {
            info!("Using in-memory repository backend");
            InMemRepo::new()
        }
    };
    Ok(Arc::new(repo))
}

#[cfg(not(any(feature = "inmem-store", feature = "postgres-store")))]
fn build_repo(_cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    anyhow::bail!("no repository backend compiled in; enable `inmem-store` or `postgres-store`")
}
