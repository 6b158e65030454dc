use anyhow::Context;

use itemgate_api::config::AppConfig;
use itemgate_infra::{Database, UserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    itemgate_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let db = Database::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;

    if let Some(admin) = &config.admin {
        let user = UserStore::new(&db)
            .ensure_admin(&admin.email, &admin.password)
            .await
            .context("failed to bootstrap admin account")?;
        tracing::info!(user_id = %user.id, "admin account ready");
    }

    let app = itemgate_api::app::build_app(&config.jwt_secret, &db);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
