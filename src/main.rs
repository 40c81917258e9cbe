// src/main.rs

use axum::{
    routing::{delete, get, patch, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;

use locacao::{
    config::{AppState, Config},
    docs::ApiDoc,
    handlers,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logger: RUST_LOG controla o nível, padrão "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let config = Config::from_env()?;
    let app_state = AppState::new(&config).await?;

    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let app = router(app_state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(app_state: AppState) -> Router {
    let inventory_routes = Router::new()
        .route(
            "/api/asset-types",
            post(handlers::inventory::create_asset_type).get(handlers::inventory::list_asset_types),
        )
        .route("/api/asset-types/{id}/availability", get(handlers::inventory::get_availability))
        .route("/api/asset-types/{id}/batches", get(handlers::inventory::list_batches))
        .route("/api/batches", post(handlers::inventory::create_batch))
        .route("/api/batches/{id}", delete(handlers::inventory::delete_batch));

    let contract_routes = Router::new()
        .route("/", post(handlers::contracts::create_contract))
        .route("/{id}", get(handlers::contracts::get_contract))
        .route("/{id}/activate", post(handlers::contracts::activate_contract))
        .route("/{id}/cancel", post(handlers::contracts::cancel_contract))
        .route("/{id}/finish", post(handlers::contracts::finish_contract))
        // Itens (só em rascunho)
        .route("/{id}/items", post(handlers::contracts::add_item))
        .route(
            "/{id}/items/{item_id}",
            patch(handlers::contracts::update_item).delete(handlers::contracts::remove_item),
        )
        // Aditivos (só em contratos ativos)
        .route(
            "/{id}/amendments",
            post(handlers::amendments::create_amendment).get(handlers::amendments::list_amendments),
        )
        .route(
            "/{id}/amendments/{amendment_id}/activate",
            post(handlers::amendments::activate_amendment),
        )
        .route(
            "/{id}/amendments/{amendment_id}/cancel",
            post(handlers::amendments::cancel_amendment),
        );

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(inventory_routes)
        .nest("/api/contracts", contract_routes)
        .with_state(app_state)
}
